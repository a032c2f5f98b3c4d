//! JSON-described bench setups for the simulator.

use std::fs;
use std::path::Path;

use airq_core::config::MonitorConfig;
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::bus::{Device, SimulatedBus};
use crate::devices::{SimAht2x, SimEns160, SimOled, SimPlaceholder};

/// What is wired to the simulated bus and how long to run.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Scenario {
    pub monitor: MonitorConfig,
    pub ens160: bool,
    /// Part ID the simulated ENS160 reports; anything but 0x0160 fails init.
    pub ens160_part_id: u16,
    pub aht2x: bool,
    pub aht2x_calibrated: bool,
    pub oled: bool,
    /// Extra addresses that acknowledge and do nothing else.
    pub extra_devices: Vec<u8>,
    /// Addresses that make the controller report a bus error.
    pub faulty_addresses: Vec<u8>,
    pub cycles: u32,
    /// Sleep for real between probes and polls.
    pub realtime: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            ens160: true,
            ens160_part_id: 0x0160,
            aht2x: true,
            aht2x_calibrated: false,
            oled: true,
            extra_devices: Vec::new(),
            faulty_addresses: Vec::new(),
            cycles: 5,
            realtime: true,
        }
    }
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn build_bus(&self) -> SimulatedBus {
        let mut bus = SimulatedBus::new();
        for &address in &self.extra_devices {
            bus.attach(address, Device::Placeholder(SimPlaceholder));
        }
        if self.ens160 {
            bus.attach(
                self.monitor.ens160_address,
                Device::Ens160(SimEns160::new(self.ens160_part_id)),
            );
        }
        if self.aht2x {
            bus.attach(
                self.monitor.aht2x_address,
                Device::Aht2x(SimAht2x::new(self.aht2x_calibrated)),
            );
        }
        if self.oled {
            bus.attach(self.monitor.oled_address, Device::Oled(SimOled::default()));
        }
        for &address in &self.faulty_addresses {
            bus.mark_faulty(address);
        }
        bus
    }
}
