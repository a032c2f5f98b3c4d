use serde::{Deserialize, Serialize};

use crate::bus_scan::{BusPins, ScanConfig};
use crate::sensors::{AHT2X_ADDRESS, ENS160_ADDRESS_HIGH};

/// SSD1306 panel address with SA0 low.
pub const OLED_ADDRESS: u8 = 0x3C;

/// Monitor settings. Every field has a default, so partial files are fine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    pub pins: BusPins,
    pub bus_frequency_khz: u32,
    pub scan: ScanConfig,
    pub ens160_address: u8,
    pub aht2x_address: u8,
    pub oled_address: u8,
    pub poll_interval_ms: u32,
    pub startup_delay_ms: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            pins: BusPins::default(),
            bus_frequency_khz: 100,
            scan: ScanConfig::default(),
            ens160_address: ENS160_ADDRESS_HIGH,
            aht2x_address: AHT2X_ADDRESS,
            oled_address: OLED_ADDRESS,
            poll_interval_ms: 500,
            startup_delay_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{"pins": {"sda": 21, "scl": 22}, "scan": {"address_low": 8, "address_high": 119}}"#,
        )
        .unwrap();

        assert_eq!(config.pins, BusPins { sda: 21, scl: 22 });
        assert_eq!(config.scan.address_low, 0x08);
        assert_eq!(config.ens160_address, 0x53);
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn test_invalid_scan_range_is_rejected() {
        let result =
            serde_json::from_str::<MonitorConfig>(r#"{"scan": {"address_low": 0}}"#);
        assert!(result.is_err());
    }
}
