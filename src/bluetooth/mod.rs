pub mod advertisement;
pub mod application;
pub mod characteristics;
pub mod monitor;

use crate::error::AppError;
use crate::transport::{ClientId, GattHandler, Peripheral};
use crate::Result;
use bluer::{
    Adapter,
    adv::AdvertisementHandle,
    gatt::local::ApplicationHandle,
    Session,
};
use futures::{future::BoxFuture, FutureExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

pub async fn setup_bluetooth() -> Result<Session> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    info!(
        "Using Bluetooth adapter {} with address {}",
        adapter.name(),
        adapter.address().await?
    );

    Ok(session)
}

#[derive(Default)]
struct Handles {
    advertisement: Option<AdvertisementHandle>,
    application: Option<ApplicationHandle>,
    monitor: Option<JoinHandle<()>>,
}

/// BlueZ peripheral. Dropping a handle unregisters the matching D-Bus object.
pub struct BluerPeripheral {
    adapter: Adapter,
    name: String,
    handles: Mutex<Handles>,
}

impl BluerPeripheral {
    pub fn new(adapter: Adapter, name: impl Into<String>) -> Self {
        Self {
            adapter,
            name: name.into(),
            handles: Mutex::new(Handles::default()),
        }
    }

    fn handles(&self) -> MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Peripheral for BluerPeripheral {
    fn serve(&self, handler: Arc<dyn GattHandler>) -> BoxFuture<'_, Result<()>> {
        async move {
            let app = application::create_application(&handler);
            let app_handle = self.adapter.serve_gatt_application(app).await?;
            let monitor = tokio::spawn(monitor::watch_connections(self.adapter.clone(), handler));

            let mut handles = self.handles();
            handles.application = Some(app_handle);
            if let Some(previous) = handles.monitor.replace(monitor) {
                previous.abort();
            }
            info!("GATT application is now being served");
            Ok(())
        }
        .boxed()
    }

    fn advertise(&self, service: Uuid) -> BoxFuture<'_, Result<()>> {
        async move {
            if self.adapter.supported_advertising_instances().await? == 0 {
                return Err(AppError::PeripheralUnavailable(format!(
                    "adapter {} has no free advertising instance",
                    self.adapter.name()
                )));
            }
            let handle = advertisement::create_advertisement(&self.adapter, service, &self.name).await?;
            self.handles().advertisement = Some(handle);
            info!("Started advertising");
            Ok(())
        }
        .boxed()
    }

    fn stop_advertising(&self) {
        if self.handles().advertisement.take().is_some() {
            info!("Stopped advertising");
        }
    }

    fn disconnect(&self, client: ClientId) {
        let device = match self.adapter.device(client) {
            Ok(device) => device,
            Err(err) => {
                warn!("Cannot disconnect {}: {}", client, err);
                return;
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = device.disconnect().await {
                        warn!("Failed to disconnect {}: {}", client, err);
                    }
                });
            }
            Err(_) => warn!("No runtime to disconnect {}", client),
        }
    }

    fn release(&self) {
        let handles = std::mem::take(&mut *self.handles());
        if let Some(monitor) = handles.monitor {
            monitor.abort();
        }
        if handles.application.is_some() || handles.advertisement.is_some() {
            info!("Cleaning up Bluetooth resources");
        }
    }
}
