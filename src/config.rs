use clap::Parser;
use num_traits::FromPrimitive;

use crate::beacon::{BeaconConfiguration, LockState, TxPowerMode};
use crate::constants::{DEFAULT_BEACON_PERIOD_MS, MIN_BEACON_PERIOD_MS};
use crate::lock::LockKey;
use crate::Result;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[arg(short, long, default_value = "Eddystone-Config", help = "Advertised local name")]
    pub name: String,
    #[arg(short, long, default_value = "https://google.com", help = "URL the beacon starts with")]
    pub url: String,
    #[arg(short = 'k', long, help = "Lock key as 32 hex digits, generated when omitted")]
    pub lock_key: Option<String>,
    #[arg(short, long, help = "Require the lock key before accepting writes")]
    pub locked: bool,
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_BEACON_PERIOD_MS,
        value_parser = clap::value_parser!(u16).range(MIN_BEACON_PERIOD_MS as i64..),
        help = "Beacon period in milliseconds"
    )]
    pub period: u16,
    #[arg(
        short,
        long,
        default_value_t = TxPowerMode::Low as u8,
        value_parser = clap::value_parser!(u8).range(0..=3),
        help = "Advertised tx power mode (0 lowest .. 3 high)"
    )]
    pub tx_power_mode: u8,
}

impl Config {
    /// Configuration the first session starts from.
    pub fn beacon_configuration(&self) -> Result<BeaconConfiguration> {
        let lock_key = match &self.lock_key {
            Some(hex) => LockKey::from_hex(hex)?,
            None => LockKey::generate(),
        };
        let mut beacon = BeaconConfiguration::new(self.url.clone(), lock_key);
        beacon.lock_state = if self.locked { LockState::Locked } else { LockState::Unlocked };
        beacon.beacon_period = self.period;
        beacon.advertised_tx_power_mode = TxPowerMode::from_u8(self.tx_power_mode).unwrap_or(TxPowerMode::Low);
        Ok(beacon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_host_demo() {
        let config = Config::parse_from(["eddystone-config"]);
        assert_eq!(config.url, "https://google.com");
        let beacon = config.beacon_configuration().unwrap();
        assert_eq!(beacon.lock_state, LockState::Unlocked);
        assert_eq!(beacon.beacon_period, DEFAULT_BEACON_PERIOD_MS);
        assert_eq!(beacon.advertised_tx_power_mode, TxPowerMode::Low);
    }

    #[test]
    fn locked_with_supplied_key() {
        let config = Config::parse_from([
            "eddystone-config",
            "--locked",
            "--lock-key",
            "000102030405060708090a0b0c0d0e0f",
            "--tx-power-mode",
            "3",
        ]);
        let beacon = config.beacon_configuration().unwrap();
        assert_eq!(beacon.lock_state, LockState::Locked);
        assert_eq!(beacon.lock_key.to_hex(), "000102030405060708090a0b0c0d0e0f");
        assert_eq!(beacon.advertised_tx_power_mode, TxPowerMode::High);
    }

    #[test]
    fn period_below_minimum_is_refused() {
        assert!(Config::try_parse_from(["eddystone-config", "--period", "50"]).is_err());
        assert!(Config::try_parse_from(["eddystone-config", "--tx-power-mode", "4"]).is_err());
    }
}
