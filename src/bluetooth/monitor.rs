//! Turns BlueZ device property changes into disconnect events.
//!
//! A link alone never opens a configuration session: any peer may connect to the
//! adapter, so the session belongs to whoever issues the first GATT request.

use crate::transport::GattHandler;
use bluer::{Adapter, AdapterEvent, Address, DeviceEvent, DeviceProperty};
use futures::{
    pin_mut,
    stream::{BoxStream, SelectAll},
    StreamExt,
};
use std::sync::Arc;
use tracing::{debug, warn};

type DeviceEvents = SelectAll<BoxStream<'static, (Address, DeviceEvent)>>;

pub async fn watch_connections(adapter: Adapter, handler: Arc<dyn GattHandler>) {
    let adapter_events = match adapter.events().await {
        Ok(events) => events,
        Err(err) => {
            warn!(target: "monitor", "Adapter events unavailable: {}", err);
            handler.on_transport_error(&format!("adapter events unavailable: {}", err));
            return;
        }
    };
    pin_mut!(adapter_events);

    let mut device_events = DeviceEvents::new();
    match adapter.device_addresses().await {
        Ok(addresses) => {
            for address in addresses {
                watch_device(&adapter, address, &mut device_events).await;
            }
        }
        Err(err) => warn!(target: "monitor", "Failed to list known devices: {}", err),
    }

    loop {
        tokio::select! {
            event = adapter_events.next() => match event {
                Some(AdapterEvent::DeviceAdded(address)) => watch_device(&adapter, address, &mut device_events).await,
                Some(AdapterEvent::DeviceRemoved(address)) => handler.on_disconnect(address),
                Some(_) => {}
                None => {
                    handler.on_transport_error("adapter event stream ended");
                    break;
                }
            },
            Some((address, event)) = device_events.next(), if !device_events.is_empty() => {
                forward_device_event(handler.as_ref(), address, event);
            }
        }
    }
}

fn forward_device_event(handler: &dyn GattHandler, address: Address, event: DeviceEvent) {
    if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(connected)) = event {
        debug!(target: "monitor", "Device {} connected={}", address, connected);
        if !connected {
            handler.on_disconnect(address);
        }
    }
}

async fn watch_device(adapter: &Adapter, address: Address, streams: &mut DeviceEvents) {
    let events = match adapter.device(address) {
        Ok(device) => device.events().await,
        Err(err) => Err(err),
    };
    match events {
        Ok(events) => streams.push(events.map(move |event| (address, event)).boxed()),
        Err(err) => debug!(target: "monitor", "Cannot watch device {}: {}", address, err),
    }
}
