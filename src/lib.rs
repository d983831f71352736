pub mod beacon;
pub mod bluetooth;
pub mod characteristic;
pub mod config;
pub mod constants;
pub mod error;
pub mod lock;
pub mod service;
pub mod session;
pub mod transport;
pub mod url;
pub mod utils;

pub use beacon::{BeaconConfiguration, LockState, TxPowerMode};
pub use config::Config;
pub use error::{AppError, GattStatus, Result};
pub use service::{ConfigGattService, ServiceState};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(config: Config) -> Result<()> {
    // Initialize logger
    tracing_subscriber::fmt::init();

    info!(target: "eddystone_config", "Starting Eddystone configuration server '{}' for {}", &config.name, &config.url);

    let seed = config.beacon_configuration()?;
    let session = bluetooth::setup_bluetooth().await?;
    let adapter = session.default_adapter().await?;
    let peripheral = bluetooth::BluerPeripheral::new(adapter, config.name.clone());

    let (configured_tx, mut configured_rx) = mpsc::unbounded_channel();
    let service = ConfigGattService::with_configuration(
        peripheral,
        move |configured| {
            let _ = configured_tx.send(configured);
        },
        seed,
    );
    service.set_logger(|tag, message| info!(target: "eddystone_config", "[{}] {}", tag, message));

    service.start(&config.url).await?;
    if let Some(beacon) = service.configuration() {
        info!(target: "eddystone_config", "Lock key: {}", beacon.lock_key.to_hex());
    }

    tokio::select! {
        configured = configured_rx.recv() => match configured.flatten() {
            Some(beacon) => info!(target: "eddystone_config", "Beacon configured: {}", beacon),
            None => warn!(target: "eddystone_config", "Configuration session ended without a result"),
        },
        result = utils::handle_signals() => result?,
    }

    service.close();
    drop(service);
    // Give BlueZ time to unregister the application and advertisement.
    tokio::time::sleep(Duration::from_secs(1)).await;

    Ok(())
}
