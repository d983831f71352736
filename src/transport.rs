//! Seams between the configuration state machine and the BLE stack.

use futures::future::BoxFuture;
use std::sync::Arc;
use uuid::Uuid;

use crate::characteristic::ConfigCharacteristic;
use crate::error::GattStatus;
use crate::Result;

pub type ClientId = bluer::Address;

/// Inbound events from the GATT server. The stack delivers them serially.
pub trait GattHandler: Send + Sync {
    /// A link known to be a configuration client. Transports that cannot tell
    /// skip this and let the first read or write open the session.
    fn on_connect(&self, client: ClientId);
    fn on_disconnect(&self, client: ClientId);
    /// Link loss or a failed GATT operation that ends the current session.
    fn on_transport_error(&self, reason: &str);
    fn on_read(&self, client: ClientId, characteristic: ConfigCharacteristic) -> std::result::Result<Vec<u8>, GattStatus>;
    fn on_write(
        &self,
        client: ClientId,
        characteristic: ConfigCharacteristic,
        value: &[u8],
    ) -> std::result::Result<(), GattStatus>;
}

/// Advertiser plus GATT server. Teardown methods must be idempotent.
pub trait Peripheral: Send + Sync {
    fn serve(&self, handler: Arc<dyn GattHandler>) -> BoxFuture<'_, Result<()>>;
    fn advertise(&self, service: Uuid) -> BoxFuture<'_, Result<()>>;
    fn stop_advertising(&self);
    fn disconnect(&self, client: ClientId);
    fn release(&self);
}
