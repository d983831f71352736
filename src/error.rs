use bluer::gatt::local::ReqError;
use thiserror::Error;

use crate::url::UrlError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bluetooth error: {0}")]
    BluetoothError(#[from] bluer::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid URL: {0}")]
    UrlError(#[from] UrlError),
    #[error("Invalid lock key: {0}")]
    InvalidLockKey(String),
    #[error("BLE peripheral mode unavailable: {0}")]
    PeripheralUnavailable(String),
    #[error("Configuration service already started")]
    AlreadyStarted,
    #[error("Configuration service closed while starting")]
    Closed,
}

pub type Result<T> = std::result::Result<T, AppError>;

/// ATT status returned to the client for a single rejected request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    #[error("read not permitted")]
    ReadNotPermitted,
    #[error("write not permitted")]
    WriteNotPermitted,
    #[error("invalid offset")]
    InvalidOffset,
    #[error("insufficient authorization")]
    InsufficientAuthorization,
    #[error("invalid attribute value length")]
    InvalidAttributeValueLength,
    #[error("value not allowed")]
    ValueNotAllowed,
}

impl GattStatus {
    pub fn code(self) -> u8 {
        match self {
            GattStatus::ReadNotPermitted => 0x02,
            GattStatus::WriteNotPermitted => 0x03,
            GattStatus::InvalidOffset => 0x07,
            GattStatus::InsufficientAuthorization => 0x08,
            GattStatus::InvalidAttributeValueLength => 0x0D,
            GattStatus::ValueNotAllowed => 0x13,
        }
    }
}

// BlueZ has no dedicated reply for offset or value-range errors.
impl From<GattStatus> for ReqError {
    fn from(status: GattStatus) -> Self {
        match status {
            GattStatus::ReadNotPermitted | GattStatus::WriteNotPermitted => ReqError::NotPermitted,
            GattStatus::InsufficientAuthorization => ReqError::NotAuthorized,
            GattStatus::InvalidAttributeValueLength => ReqError::InvalidValueLength,
            GattStatus::InvalidOffset => ReqError::NotSupported,
            GattStatus::ValueNotAllowed => ReqError::Failed,
        }
    }
}
