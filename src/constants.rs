use once_cell::sync::Lazy;

pub const LOCK_KEY_LEN: usize = 16;
pub const MAX_URI_DATA_LEN: usize = 18;
pub const MAX_UNLOCK_ATTEMPTS: u8 = 3;
pub const TX_POWER_LEVEL_COUNT: usize = 4;
pub const MIN_TX_POWER_DBM: i8 = -100;
pub const MAX_TX_POWER_DBM: i8 = 20;
pub const MIN_BEACON_PERIOD_MS: u16 = 100;

pub const DEFAULT_BEACON_PERIOD_MS: u16 = 1000;
pub const DEFAULT_FLAGS: u8 = 0x00;
// Radio levels -21, -15, -7 and +1 dBm calibrated with 41 dB loss at 0 m.
pub const DEFAULT_TX_POWER_LEVELS: [i8; TX_POWER_LEVEL_COUNT] = [-62, -56, -48, -40];

pub const LOG_TAG: &str = "EddystoneConfig";

pub static SERVICE_UUID: Lazy<uuid::Uuid> = Lazy::new(|| uuid::Uuid::from_u128(0xee0c2080_8786_40ba_ab96_99b91ac981d8));
/// Lock State values follow Eddystone GATT: `0x00` locked, `0x01` unlocked,
/// `0x02` unlocked with automatic relock disabled. This differs from the boolean
/// (`0x01` = locked) that legacy URL Config clients expect on this UUID.
pub static LOCK_STATE_UUID: Lazy<uuid::Uuid> = Lazy::new(|| uuid::Uuid::from_u128(0xee0c2081_8786_40ba_ab96_99b91ac981d8));
pub static UNLOCK_UUID: Lazy<uuid::Uuid> = Lazy::new(|| uuid::Uuid::from_u128(0xee0c2083_8786_40ba_ab96_99b91ac981d8));
pub static URI_DATA_UUID: Lazy<uuid::Uuid> = Lazy::new(|| uuid::Uuid::from_u128(0xee0c2084_8786_40ba_ab96_99b91ac981d8));
pub static FLAGS_UUID: Lazy<uuid::Uuid> = Lazy::new(|| uuid::Uuid::from_u128(0xee0c2085_8786_40ba_ab96_99b91ac981d8));
pub static TX_POWER_LEVELS_UUID: Lazy<uuid::Uuid> = Lazy::new(|| uuid::Uuid::from_u128(0xee0c2086_8786_40ba_ab96_99b91ac981d8));
pub static TX_POWER_MODE_UUID: Lazy<uuid::Uuid> = Lazy::new(|| uuid::Uuid::from_u128(0xee0c2087_8786_40ba_ab96_99b91ac981d8));
pub static BEACON_PERIOD_UUID: Lazy<uuid::Uuid> = Lazy::new(|| uuid::Uuid::from_u128(0xee0c2088_8786_40ba_ab96_99b91ac981d8));
pub static RESET_UUID: Lazy<uuid::Uuid> = Lazy::new(|| uuid::Uuid::from_u128(0xee0c2089_8786_40ba_ab96_99b91ac981d8));
