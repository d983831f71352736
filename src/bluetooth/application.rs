use crate::characteristic::ConfigCharacteristic;
use crate::constants::SERVICE_UUID;
use crate::transport::GattHandler;
use bluer::gatt::local::{Application, Service};
use std::sync::Arc;
use super::characteristics;

pub fn create_application(handler: &Arc<dyn GattHandler>) -> Application {
    Application {
        services: vec![Service {
            uuid: *SERVICE_UUID,
            primary: true,
            characteristics: ConfigCharacteristic::ALL
                .into_iter()
                .map(|characteristic| characteristics::create_characteristic(handler, characteristic))
                .collect(),
            ..Default::default()
        }],
        ..Default::default()
    }
}
