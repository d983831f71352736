use crate::characteristic::ConfigCharacteristic;
use crate::error::GattStatus;
use crate::transport::GattHandler;
use bluer::gatt::local::{Characteristic, CharacteristicRead, CharacteristicWrite, CharacteristicWriteMethod, ReqError};
use futures::FutureExt;
use std::sync::Arc;
use tracing::debug;

pub fn create_characteristic(handler: &Arc<dyn GattHandler>, characteristic: ConfigCharacteristic) -> Characteristic {
    let handler_r = handler.clone();
    let handler_w = handler.clone();
    let read = characteristic.is_readable().then(|| CharacteristicRead {
        read: true,
        fun: Box::new(move |req| {
            let handler = handler_r.clone();
            async move {
                let value = handler
                    .on_read(req.device_address, characteristic)
                    .map_err(ReqError::from);
                debug!(target: "characteristics", "Read request {:?} on {} with value {:x?}", &req, characteristic.name(), &value);
                value.map(|value| value.get(req.offset as usize..).map(<[u8]>::to_vec).unwrap_or_default())
            }
            .boxed()
        }),
        ..Default::default()
    });

    Characteristic {
        uuid: characteristic.uuid(),
        read,
        write: Some(CharacteristicWrite {
            write: true,
            method: CharacteristicWriteMethod::Fun(Box::new(move |new_value, req| {
                let handler = handler_w.clone();
                async move {
                    debug!(target: "characteristics", "Write request {:?} on {} with value {:x?}", &req, characteristic.name(), &new_value);
                    if req.offset != 0 {
                        return Err(ReqError::from(GattStatus::InvalidOffset));
                    }
                    handler
                        .on_write(req.device_address, characteristic, &new_value)
                        .map_err(ReqError::from)
                }
                .boxed()
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}
