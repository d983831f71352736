//! Eddystone configuration GATT service.
//!
//! One run of the service advertises the configuration service, serves a single
//! client and reports the outcome to the listener exactly once. Whoever removes
//! the session from [`Phase::Session`] under the lock owns that delivery.

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::beacon::BeaconConfiguration;
use crate::characteristic::ConfigCharacteristic;
use crate::constants::{LOG_TAG, SERVICE_UUID};
use crate::error::{AppError, GattStatus, Result};
use crate::lock::LockKey;
use crate::session::{AuthStatus, ConnectionSession, WriteOutcome};
use crate::transport::{ClientId, GattHandler, Peripheral};
use crate::url;

pub type ConfigureListener = Box<dyn Fn(Option<BeaconConfiguration>) + Send + Sync>;
pub type LogSink = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Starting,
    Advertising,
    Connected,
    Authenticating,
    Authenticated,
    Closing,
}

#[derive(Debug)]
struct Run {
    base: BeaconConfiguration,
    initial_url: String,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Starting(Run),
    Advertising(Run),
    Session(ConnectionSession),
    Closing,
}

struct Inner {
    phase: Phase,
    generation: u64,
    persisted: Option<BeaconConfiguration>,
}

impl Inner {
    /// Opens a session if the service is waiting for a client.
    fn accept(&mut self, client: ClientId) -> bool {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Advertising(run) => {
                self.phase = Phase::Session(ConnectionSession::new(client, run.base, run.initial_url));
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    fn session_mut(&mut self, client: ClientId) -> Option<&mut ConnectionSession> {
        match &mut self.phase {
            Phase::Session(session) if session.client() == client => Some(session),
            _ => None,
        }
    }

    fn take_session(&mut self, client: Option<ClientId>) -> Option<ConnectionSession> {
        let owned = match (&self.phase, client) {
            (Phase::Session(session), Some(client)) => session.client() == client,
            (Phase::Session(_), None) => true,
            _ => false,
        };
        if !owned {
            return None;
        }
        match mem::replace(&mut self.phase, Phase::Closing) {
            Phase::Session(session) => Some(session),
            _ => None,
        }
    }
}

struct Shared {
    peripheral: Box<dyn Peripheral>,
    listener: ConfigureListener,
    logger: RwLock<Option<LogSink>>,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self, message: &str) {
        debug!(target: "config_gatt_service", "{}", message);
        let sink = self.logger.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(sink) = sink {
            if panic::catch_unwind(AssertUnwindSafe(|| sink(LOG_TAG, message))).is_err() {
                warn!(target: "config_gatt_service", "Logger panicked, message dropped");
            }
        }
    }

    /// Tears down the run and hands `result` to the listener. Callers must have
    /// moved the phase to `Closing` while taking the session.
    fn finish_session(&self, client: ClientId, disconnect: bool, result: Option<BeaconConfiguration>) {
        self.peripheral.stop_advertising();
        if disconnect {
            self.peripheral.disconnect(client);
        }
        self.peripheral.release();

        {
            let mut inner = self.lock();
            if let Some(config) = &result {
                inner.persisted = Some(config.clone());
            }
            if matches!(inner.phase, Phase::Closing) {
                inner.phase = Phase::Idle;
            }
        }

        match &result {
            Some(config) => self.log(&format!("Session with {} committed: {}", client, config)),
            None => self.log(&format!("Session with {} ended without configuration", client)),
        }
        (self.listener)(result);
    }
}

impl GattHandler for Shared {
    fn on_connect(&self, client: ClientId) {
        let (accepted, busy) = {
            let mut inner = self.lock();
            let accepted = inner.accept(client);
            let busy = !accepted
                && match &inner.phase {
                    Phase::Session(session) => session.client() != client,
                    Phase::Closing => true,
                    _ => false,
                };
            (accepted, busy)
        };

        if accepted {
            self.peripheral.stop_advertising();
            self.log(&format!("Client {} connected", client));
        } else if busy {
            self.log(&format!("Rejecting {} while another session is open", client));
            self.peripheral.disconnect(client);
        } else {
            debug!(target: "config_gatt_service", "Ignoring connection from {}", client);
        }
    }

    fn on_disconnect(&self, client: ClientId) {
        let session = self.lock().take_session(Some(client));
        if let Some(session) = session {
            self.log(&format!("Client {} disconnected", client));
            let result = session.finish();
            self.finish_session(client, false, result);
        }
    }

    fn on_transport_error(&self, reason: &str) {
        let session = self.lock().take_session(None);
        if let Some(session) = session {
            warn!(target: "config_gatt_service", "Transport failure: {}", reason);
            self.log(&format!("Transport failure: {}", reason));
            self.finish_session(session.client(), true, None);
        }
    }

    fn on_read(&self, client: ClientId, characteristic: ConfigCharacteristic) -> std::result::Result<Vec<u8>, GattStatus> {
        let (accepted, value) = {
            let mut inner = self.lock();
            let accepted = inner.accept(client);
            let value = inner
                .session_mut(client)
                .map(|session| session.read(characteristic))
                .unwrap_or(Err(GattStatus::ReadNotPermitted));
            (accepted, value)
        };
        if accepted {
            self.peripheral.stop_advertising();
        }
        debug!(target: "config_gatt_service", "Read {} by {}: {:x?}", characteristic.name(), client, &value);
        value
    }

    fn on_write(
        &self,
        client: ClientId,
        characteristic: ConfigCharacteristic,
        value: &[u8],
    ) -> std::result::Result<(), GattStatus> {
        debug!(target: "config_gatt_service", "Write {} by {}: {:x?}", characteristic.name(), client, value);
        let (accepted, outcome, finished) = {
            let mut inner = self.lock();
            let accepted = inner.accept(client);
            let outcome = inner
                .session_mut(client)
                .map(|session| session.write(characteristic, value))
                .unwrap_or(Err(GattStatus::WriteNotPermitted));
            let finished = match outcome {
                Ok(WriteOutcome::Committed) | Ok(WriteOutcome::Rejected) => inner.take_session(Some(client)),
                _ => None,
            };
            (accepted, outcome, finished)
        };
        if accepted {
            self.peripheral.stop_advertising();
        }

        match (outcome, finished) {
            (Ok(WriteOutcome::Committed), Some(session)) => {
                self.log(&format!("Client {} locked the beacon", client));
                let result = session.finish();
                self.finish_session(client, true, result);
                Ok(())
            }
            (Ok(WriteOutcome::Rejected), Some(_)) => {
                self.log(&format!("Client {} failed to unlock, disconnecting", client));
                self.finish_session(client, true, None);
                Err(GattStatus::InsufficientAuthorization)
            }
            (Ok(WriteOutcome::Rejected), None) => Err(GattStatus::InsufficientAuthorization),
            (Ok(_), _) => Ok(()),
            (Err(status), _) => {
                debug!(target: "config_gatt_service", "Rejected {} write: {}", characteristic.name(), status);
                Err(status)
            }
        }
    }
}

/// Handle owned by the caller. Dropping it closes the service.
pub struct ConfigGattService {
    shared: Arc<Shared>,
}

impl ConfigGattService {
    pub fn new<P, F>(peripheral: P, listener: F) -> Self
    where
        P: Peripheral + 'static,
        F: Fn(Option<BeaconConfiguration>) + Send + Sync + 'static,
    {
        Self::build(Box::new(peripheral), Box::new(listener), None)
    }

    /// Starts from a previously persisted configuration, reusing its lock key and lock state.
    pub fn with_configuration<P, F>(peripheral: P, listener: F, configuration: BeaconConfiguration) -> Self
    where
        P: Peripheral + 'static,
        F: Fn(Option<BeaconConfiguration>) + Send + Sync + 'static,
    {
        Self::build(Box::new(peripheral), Box::new(listener), Some(configuration))
    }

    fn build(
        peripheral: Box<dyn Peripheral>,
        listener: ConfigureListener,
        persisted: Option<BeaconConfiguration>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                peripheral,
                listener,
                logger: RwLock::new(None),
                inner: Mutex::new(Inner {
                    phase: Phase::Idle,
                    generation: 0,
                    persisted,
                }),
            }),
        }
    }

    pub fn set_logger<F>(&self, logger: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        *self.shared.logger.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(logger));
    }

    pub fn state(&self) -> ServiceState {
        match &self.shared.lock().phase {
            Phase::Idle => ServiceState::Idle,
            Phase::Starting(_) => ServiceState::Starting,
            Phase::Advertising(_) => ServiceState::Advertising,
            Phase::Session(session) => match session.auth() {
                AuthStatus::Authenticated => ServiceState::Authenticated,
                AuthStatus::Rejected => ServiceState::Closing,
                AuthStatus::Pending if session.lock_state_read() => ServiceState::Authenticating,
                AuthStatus::Pending => ServiceState::Connected,
            },
            Phase::Closing => ServiceState::Closing,
        }
    }

    /// Configuration of the current run, or the last committed one when idle.
    pub fn configuration(&self) -> Option<BeaconConfiguration> {
        let inner = self.shared.lock();
        match &inner.phase {
            Phase::Starting(run) | Phase::Advertising(run) => Some(run.base.clone()),
            Phase::Session(session) => Some(session.staging().clone()),
            Phase::Idle | Phase::Closing => inner.persisted.clone(),
        }
    }

    /// Registers the GATT server and begins advertising. Fails if a run is already active.
    pub async fn start(&self, initial_url: &str) -> Result<()> {
        url::encode(initial_url)?;

        let generation = {
            let mut inner = self.shared.lock();
            if !matches!(inner.phase, Phase::Idle) {
                return Err(AppError::AlreadyStarted);
            }
            let base = match &inner.persisted {
                Some(persisted) => {
                    let mut base = persisted.clone();
                    base.advertised_url = initial_url.to_string();
                    base
                }
                None => BeaconConfiguration::new(initial_url, LockKey::generate()),
            };
            inner.generation += 1;
            inner.phase = Phase::Starting(Run {
                base,
                initial_url: initial_url.to_string(),
            });
            inner.generation
        };

        let handler: Arc<dyn GattHandler> = self.shared.clone();
        let started = match self.shared.peripheral.serve(handler).await {
            Ok(()) => self.shared.peripheral.advertise(*SERVICE_UUID).await,
            Err(err) => Err(err),
        };

        let (promoted, current) = {
            let mut inner = self.shared.lock();
            let current = inner.generation == generation;
            let promoted = match mem::replace(&mut inner.phase, Phase::Idle) {
                Phase::Starting(run) if current && started.is_ok() => {
                    inner.phase = Phase::Advertising(run);
                    true
                }
                Phase::Starting(_) if current => false,
                other => {
                    inner.phase = other;
                    false
                }
            };
            (promoted, current)
        };

        if promoted {
            self.shared.log(&format!("Advertising configuration service for {}", initial_url));
            return Ok(());
        }

        // A newer run owns the peripheral now.
        if current {
            self.shared.peripheral.release();
        }
        match started {
            Ok(()) => Err(AppError::Closed),
            Err(err) => {
                self.shared.log(&format!("Failed to start: {}", err));
                Err(err)
            }
        }
    }

    /// Stops advertising, drops any client and releases the GATT server. Safe to repeat.
    pub fn close(&self) {
        let (previous, session) = {
            let mut inner = self.shared.lock();
            // A session being finished elsewhere owns the move back to Idle.
            if matches!(inner.phase, Phase::Idle | Phase::Closing) {
                return;
            }
            match mem::replace(&mut inner.phase, Phase::Idle) {
                Phase::Session(session) => {
                    inner.phase = Phase::Closing;
                    (ServiceState::Connected, Some(session))
                }
                Phase::Starting(_) => (ServiceState::Starting, None),
                _ => (ServiceState::Advertising, None),
            }
        };

        match session {
            Some(session) => {
                self.shared.log(&format!("Closing with client {} still connected", session.client()));
                self.shared.finish_session(session.client(), true, None);
            }
            None => {
                self.shared.peripheral.stop_advertising();
                self.shared.peripheral.release();
                self.shared.log(&format!("Closed from {:?}", previous));
            }
        }
    }
}

impl Drop for ConfigGattService {
    fn drop(&mut self) {
        self.close();
    }
}
