use num_derive::FromPrimitive;
use std::fmt;

use crate::constants::{DEFAULT_BEACON_PERIOD_MS, DEFAULT_FLAGS, DEFAULT_TX_POWER_LEVELS, TX_POWER_LEVEL_COUNT};
use crate::lock::LockKey;

#[derive(Clone, Debug, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum LockState {
    Locked = 0,
    Unlocked = 1,
    // Unlocked, and stays unlocked after the client leaves.
    UnlockedAutomatic = 2,
}

impl LockState {
    pub fn is_locked(self) -> bool {
        self == LockState::Locked
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum TxPowerMode {
    Lowest = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

/// Result of a configuration session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeaconConfiguration {
    pub advertised_url: String,
    pub lock_key: LockKey,
    pub lock_state: LockState,
    pub tx_power_levels: [i8; TX_POWER_LEVEL_COUNT],
    pub advertised_tx_power_mode: TxPowerMode,
    pub beacon_period: u16,
    pub flags: u8,
}

impl BeaconConfiguration {
    pub fn new(advertised_url: impl Into<String>, lock_key: LockKey) -> Self {
        Self {
            advertised_url: advertised_url.into(),
            lock_key,
            lock_state: LockState::Unlocked,
            tx_power_levels: DEFAULT_TX_POWER_LEVELS,
            advertised_tx_power_mode: TxPowerMode::Low,
            beacon_period: DEFAULT_BEACON_PERIOD_MS,
            flags: DEFAULT_FLAGS,
        }
    }

    /// Calibrated power at 0 m for the selected mode.
    pub fn advertised_tx_power(&self) -> i8 {
        self.tx_power_levels[self.advertised_tx_power_mode as usize]
    }

    /// Restores factory values while keeping the lock key and lock state.
    pub fn reset(&mut self, advertised_url: &str) {
        let lock_key = self.lock_key.clone();
        let lock_state = self.lock_state;
        *self = Self::new(advertised_url, lock_key);
        self.lock_state = lock_state;
    }
}

impl fmt::Display for BeaconConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "url={} lock={:?} tx_power={:?}/{} dBm period={} ms flags=0x{:02x}",
            self.advertised_url,
            self.lock_state,
            self.advertised_tx_power_mode,
            self.advertised_tx_power(),
            self.beacon_period,
            self.flags
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn wire_values_round_trip_through_from_primitive() {
        assert_eq!(LockState::from_u8(2), Some(LockState::UnlockedAutomatic));
        assert_eq!(LockState::from_u8(3), None);
        assert_eq!(TxPowerMode::from_u8(3), Some(TxPowerMode::High));
        assert_eq!(TxPowerMode::from_u8(4), None);
    }

    #[test]
    fn lock_state_uses_eddystone_gatt_values() {
        assert_eq!(LockState::Locked as u8, 0x00);
        assert_eq!(LockState::Unlocked as u8, 0x01);
        assert_eq!(LockState::UnlockedAutomatic as u8, 0x02);
    }

    #[test]
    fn advertised_power_follows_mode() {
        let mut config = BeaconConfiguration::new("https://example.com", LockKey::generate());
        assert_eq!(config.advertised_tx_power(), DEFAULT_TX_POWER_LEVELS[1]);
        config.advertised_tx_power_mode = TxPowerMode::High;
        assert_eq!(config.advertised_tx_power(), DEFAULT_TX_POWER_LEVELS[3]);
    }

    #[test]
    fn reset_keeps_key_and_lock_state() {
        let key = LockKey::generate();
        let mut config = BeaconConfiguration::new("https://example.org", key.clone());
        config.lock_state = LockState::UnlockedAutomatic;
        config.beacon_period = 250;
        config.flags = 0x10;
        config.reset("https://example.com");
        assert_eq!(config.advertised_url, "https://example.com");
        assert_eq!(config.beacon_period, DEFAULT_BEACON_PERIOD_MS);
        assert_eq!(config.flags, DEFAULT_FLAGS);
        assert_eq!(config.lock_key, key);
        assert_eq!(config.lock_state, LockState::UnlockedAutomatic);
    }

    #[test]
    fn display_omits_lock_key() {
        let config = BeaconConfiguration::new("https://example.com", LockKey::generate());
        let text = config.to_string();
        assert!(text.contains("url=https://example.com"));
        assert!(!text.contains(&config.lock_key.to_hex()));
    }
}
