use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;
use std::io::Cursor;
use uuid::Uuid;

use crate::beacon::{BeaconConfiguration, TxPowerMode};
use crate::constants::*;
use crate::error::GattStatus;
use crate::lock::Block;
use crate::url;

#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash)]
pub enum ConfigCharacteristic {
    LockState,
    Unlock,
    UriData,
    Flags,
    TxPowerLevels,
    TxPowerMode,
    BeaconPeriod,
    Reset,
}

impl ConfigCharacteristic {
    pub const ALL: [ConfigCharacteristic; 8] = [
        ConfigCharacteristic::LockState,
        ConfigCharacteristic::Unlock,
        ConfigCharacteristic::UriData,
        ConfigCharacteristic::Flags,
        ConfigCharacteristic::TxPowerLevels,
        ConfigCharacteristic::TxPowerMode,
        ConfigCharacteristic::BeaconPeriod,
        ConfigCharacteristic::Reset,
    ];

    pub fn uuid(self) -> Uuid {
        match self {
            ConfigCharacteristic::LockState => *LOCK_STATE_UUID,
            ConfigCharacteristic::Unlock => *UNLOCK_UUID,
            ConfigCharacteristic::UriData => *URI_DATA_UUID,
            ConfigCharacteristic::Flags => *FLAGS_UUID,
            ConfigCharacteristic::TxPowerLevels => *TX_POWER_LEVELS_UUID,
            ConfigCharacteristic::TxPowerMode => *TX_POWER_MODE_UUID,
            ConfigCharacteristic::BeaconPeriod => *BEACON_PERIOD_UUID,
            ConfigCharacteristic::Reset => *RESET_UUID,
        }
    }

    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|ch| ch.uuid() == *uuid)
    }

    pub fn is_readable(self) -> bool {
        self != ConfigCharacteristic::Reset
    }

    pub fn name(self) -> &'static str {
        match self {
            ConfigCharacteristic::LockState => "lock_state",
            ConfigCharacteristic::Unlock => "unlock",
            ConfigCharacteristic::UriData => "uri_data",
            ConfigCharacteristic::Flags => "flags",
            ConfigCharacteristic::TxPowerLevels => "tx_power_levels",
            ConfigCharacteristic::TxPowerMode => "tx_power_mode",
            ConfigCharacteristic::BeaconPeriod => "beacon_period",
            ConfigCharacteristic::Reset => "reset",
        }
    }
}

/// A client write that passed validation and can be applied as a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigWrite {
    Lock { wrapped_key: Option<Block> },
    DisableAutoRelock,
    Unlock(Block),
    Url(String),
    Flags(u8),
    TxPowerLevels([i8; TX_POWER_LEVEL_COUNT]),
    TxPowerMode(TxPowerMode),
    BeaconPeriod(u16),
    Reset,
    NoOp,
}

pub fn decode_write(characteristic: ConfigCharacteristic, value: &[u8]) -> Result<ConfigWrite, GattStatus> {
    match characteristic {
        ConfigCharacteristic::LockState => match value {
            [0x00] => Ok(ConfigWrite::Lock { wrapped_key: None }),
            [0x00, wrapped @ ..] if wrapped.len() == LOCK_KEY_LEN => Ok(ConfigWrite::Lock {
                wrapped_key: Some(to_block(wrapped)?),
            }),
            [0x02] => Ok(ConfigWrite::DisableAutoRelock),
            [_] => Err(GattStatus::ValueNotAllowed),
            _ => Err(GattStatus::InvalidAttributeValueLength),
        },
        ConfigCharacteristic::Unlock => Ok(ConfigWrite::Unlock(to_block(value)?)),
        ConfigCharacteristic::UriData => {
            if value.is_empty() || value.len() > MAX_URI_DATA_LEN {
                return Err(GattStatus::InvalidAttributeValueLength);
            }
            let decoded = url::decode(value).map_err(|_| GattStatus::ValueNotAllowed)?;
            Ok(ConfigWrite::Url(decoded))
        }
        ConfigCharacteristic::Flags => Ok(ConfigWrite::Flags(single_byte(value)?)),
        ConfigCharacteristic::TxPowerLevels => {
            if value.len() != TX_POWER_LEVEL_COUNT {
                return Err(GattStatus::InvalidAttributeValueLength);
            }
            let mut levels = [0i8; TX_POWER_LEVEL_COUNT];
            let mut cursor = Cursor::new(value);
            for level in levels.iter_mut() {
                *level = cursor.read_i8().map_err(|_| GattStatus::InvalidAttributeValueLength)?;
                if !(MIN_TX_POWER_DBM..=MAX_TX_POWER_DBM).contains(level) {
                    return Err(GattStatus::ValueNotAllowed);
                }
            }
            Ok(ConfigWrite::TxPowerLevels(levels))
        }
        ConfigCharacteristic::TxPowerMode => TxPowerMode::from_u8(single_byte(value)?)
            .map(ConfigWrite::TxPowerMode)
            .ok_or(GattStatus::ValueNotAllowed),
        ConfigCharacteristic::BeaconPeriod => {
            if value.len() != 2 {
                return Err(GattStatus::InvalidAttributeValueLength);
            }
            let period = Cursor::new(value)
                .read_u16::<LittleEndian>()
                .map_err(|_| GattStatus::InvalidAttributeValueLength)?;
            match period {
                0 => Err(GattStatus::ValueNotAllowed),
                p => Ok(ConfigWrite::BeaconPeriod(p.max(MIN_BEACON_PERIOD_MS))),
            }
        }
        ConfigCharacteristic::Reset => match single_byte(value)? {
            0 => Ok(ConfigWrite::NoOp),
            _ => Ok(ConfigWrite::Reset),
        },
    }
}

/// Encodes the characteristics whose value is a plain projection of the configuration.
pub fn read_value(characteristic: ConfigCharacteristic, config: &BeaconConfiguration) -> Result<Vec<u8>, GattStatus> {
    let mut value = Vec::new();
    match characteristic {
        ConfigCharacteristic::UriData => {
            value = url::encode(&config.advertised_url).map_err(|_| GattStatus::ValueNotAllowed)?;
        }
        ConfigCharacteristic::Flags => value.push(config.flags),
        ConfigCharacteristic::TxPowerLevels => {
            for level in config.tx_power_levels {
                value.write_i8(level).map_err(|_| GattStatus::ValueNotAllowed)?;
            }
        }
        ConfigCharacteristic::TxPowerMode => value.push(config.advertised_tx_power_mode as u8),
        ConfigCharacteristic::BeaconPeriod => {
            value
                .write_u16::<LittleEndian>(config.beacon_period)
                .map_err(|_| GattStatus::ValueNotAllowed)?;
        }
        ConfigCharacteristic::LockState => value.push(config.lock_state as u8),
        ConfigCharacteristic::Unlock | ConfigCharacteristic::Reset => return Err(GattStatus::ReadNotPermitted),
    }
    Ok(value)
}

fn single_byte(value: &[u8]) -> Result<u8, GattStatus> {
    match value {
        [byte] => Ok(*byte),
        _ => Err(GattStatus::InvalidAttributeValueLength),
    }
}

fn to_block(value: &[u8]) -> Result<Block, GattStatus> {
    value.try_into().map_err(|_| GattStatus::InvalidAttributeValueLength)
}
