use crate::beacon::{BeaconConfiguration, LockState};
use crate::characteristic::{self, ConfigCharacteristic, ConfigWrite};
use crate::constants::MAX_UNLOCK_ATTEMPTS;
use crate::error::GattStatus;
use crate::lock::{self, Block};
use crate::transport::ClientId;

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Pending,
    Authenticated,
    Rejected,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Staged,
    Unlocked,
    /// The client re-locked the beacon; the staging copy is final.
    Committed,
    /// Too many failed unlocks; the session must be dropped.
    Rejected,
}

/// State of the single client allowed to configure the beacon.
#[derive(Debug)]
pub struct ConnectionSession {
    client: ClientId,
    auth: AuthStatus,
    lock_state_read: bool,
    challenge: Option<Block>,
    failed_unlocks: u8,
    relock_on_commit: bool,
    accepted_writes: u32,
    initial_url: String,
    staging: BeaconConfiguration,
}

impl ConnectionSession {
    pub fn new(client: ClientId, base: BeaconConfiguration, initial_url: String) -> Self {
        Self {
            client,
            auth: AuthStatus::Pending,
            lock_state_read: false,
            challenge: None,
            failed_unlocks: 0,
            relock_on_commit: base.lock_state.is_locked(),
            accepted_writes: 0,
            initial_url,
            staging: base,
        }
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn auth(&self) -> AuthStatus {
        self.auth
    }

    pub fn lock_state_read(&self) -> bool {
        self.lock_state_read
    }

    pub fn staging(&self) -> &BeaconConfiguration {
        &self.staging
    }

    fn is_authorized(&self) -> bool {
        match self.auth {
            AuthStatus::Authenticated => true,
            AuthStatus::Rejected => false,
            AuthStatus::Pending => !self.staging.lock_state.is_locked(),
        }
    }

    pub fn read(&mut self, characteristic: ConfigCharacteristic) -> Result<Vec<u8>, GattStatus> {
        match characteristic {
            ConfigCharacteristic::LockState => {
                self.lock_state_read = true;
                if self.is_authorized() {
                    self.auth = AuthStatus::Authenticated;
                }
                Ok(vec![self.staging.lock_state as u8])
            }
            ConfigCharacteristic::Unlock => {
                let challenge = lock::new_challenge();
                self.challenge = Some(challenge);
                Ok(challenge.to_vec())
            }
            other => characteristic::read_value(other, &self.staging),
        }
    }

    /// Checks authorization, then validates `value` completely before anything in the
    /// staging copy changes.
    pub fn write(&mut self, characteristic: ConfigCharacteristic, value: &[u8]) -> Result<WriteOutcome, GattStatus> {
        if characteristic != ConfigCharacteristic::Unlock && !self.is_authorized() {
            return Err(GattStatus::InsufficientAuthorization);
        }
        let write = characteristic::decode_write(characteristic, value)?;
        if let ConfigWrite::Unlock(response) = write {
            return self.unlock(&response);
        }
        self.auth = AuthStatus::Authenticated;

        let outcome = self.apply(write);
        self.accepted_writes += 1;
        Ok(outcome)
    }

    fn unlock(&mut self, response: &Block) -> Result<WriteOutcome, GattStatus> {
        if self.auth == AuthStatus::Rejected {
            return Err(GattStatus::InsufficientAuthorization);
        }
        if !self.staging.lock_state.is_locked() {
            self.challenge = None;
            return Ok(WriteOutcome::Unlocked);
        }

        // A challenge answers exactly one attempt.
        let verified = self
            .challenge
            .take()
            .map(|challenge| self.staging.lock_key.verify(&challenge, response))
            .unwrap_or(false);

        if verified {
            self.failed_unlocks = 0;
            self.auth = AuthStatus::Authenticated;
            self.staging.lock_state = LockState::Unlocked;
            return Ok(WriteOutcome::Unlocked);
        }

        self.failed_unlocks += 1;
        if self.failed_unlocks >= MAX_UNLOCK_ATTEMPTS {
            self.auth = AuthStatus::Rejected;
            return Ok(WriteOutcome::Rejected);
        }
        Err(GattStatus::InsufficientAuthorization)
    }

    fn apply(&mut self, write: ConfigWrite) -> WriteOutcome {
        let staging = &mut self.staging;
        match write {
            ConfigWrite::Lock { wrapped_key } => {
                if let Some(wrapped) = wrapped_key {
                    staging.lock_key = staging.lock_key.unwrap_key(&wrapped);
                }
                staging.lock_state = LockState::Locked;
                return WriteOutcome::Committed;
            }
            ConfigWrite::DisableAutoRelock => {
                staging.lock_state = LockState::UnlockedAutomatic;
                self.relock_on_commit = false;
            }
            ConfigWrite::Url(url) => staging.advertised_url = url,
            ConfigWrite::Flags(flags) => staging.flags = flags,
            ConfigWrite::TxPowerLevels(levels) => staging.tx_power_levels = levels,
            ConfigWrite::TxPowerMode(mode) => staging.advertised_tx_power_mode = mode,
            ConfigWrite::BeaconPeriod(period) => staging.beacon_period = period,
            ConfigWrite::Reset => staging.reset(&self.initial_url),
            ConfigWrite::Unlock(_) | ConfigWrite::NoOp => {}
        }
        WriteOutcome::Staged
    }

    /// Configuration to hand over when the session ends cleanly, if any.
    pub fn finish(self) -> Option<BeaconConfiguration> {
        if self.auth != AuthStatus::Authenticated || self.accepted_writes == 0 {
            return None;
        }
        let mut config = self.staging;
        if self.relock_on_commit && config.lock_state == LockState::Unlocked {
            config.lock_state = LockState::Locked;
        }
        Some(config)
    }
}
