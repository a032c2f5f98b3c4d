//! An in-process I2C bus that routes transactions to simulated devices.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
use log::trace;

use crate::devices::{SimAht2x, SimDevice, SimEns160, SimOled, SimPlaceholder};

#[derive(Debug)]
pub enum Device {
    Ens160(SimEns160),
    Aht2x(SimAht2x),
    Oled(SimOled),
    Placeholder(SimPlaceholder),
}

impl Device {
    fn as_sim(&mut self) -> &mut dyn SimDevice {
        match self {
            Device::Ens160(d) => d,
            Device::Aht2x(d) => d,
            Device::Oled(d) => d,
            Device::Placeholder(d) => d,
        }
    }
}

#[derive(Debug, Default)]
pub struct SimulatedBus {
    devices: BTreeMap<u8, Device>,
    /// Addresses that make the controller report a non-NACK failure.
    faulty: BTreeSet<u8>,
    transactions: usize,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, address: u8, device: Device) -> &mut Self {
        self.devices.insert(address, device);
        self
    }

    pub fn mark_faulty(&mut self, address: u8) -> &mut Self {
        self.faulty.insert(address);
        self
    }

    pub fn transactions(&self) -> usize {
        self.transactions
    }

    pub fn oled(&self) -> Option<&SimOled> {
        self.devices.values().find_map(|d| match d {
            Device::Oled(oled) => Some(oled),
            _ => None,
        })
    }

    pub fn ens160(&self) -> Option<&SimEns160> {
        self.devices.values().find_map(|d| match d {
            Device::Ens160(sensor) => Some(sensor),
            _ => None,
        })
    }

    fn run(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        self.transactions += 1;
        if self.faulty.contains(&address) {
            trace!("0x{:02X}: arbitration lost", address);
            return Err(ErrorKind::ArbitrationLoss);
        }
        let device = self
            .devices
            .get_mut(&address)
            .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?
            .as_sim();

        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    trace!("0x{:02X} <- {:02X?}", address, bytes);
                    device.write(*bytes)?;
                }
                Operation::Read(buf) => {
                    device.read(buf)?;
                    trace!("0x{:02X} -> {:02X?}", address, buf);
                }
            }
        }
        Ok(())
    }
}

impl ErrorType for SimulatedBus {
    type Error = ErrorKind;
}

impl embedded_hal::i2c::I2c for SimulatedBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.run(address, operations)
    }
}

impl embedded_hal_async::i2c::I2c for SimulatedBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.run(address, operations)
    }
}

/// Delay that either sleeps the thread or returns immediately.
#[derive(Clone, Copy, Debug)]
pub struct SimDelay {
    pub realtime: bool,
}

impl SimDelay {
    fn sleep(&self, ns: u32) {
        if self.realtime {
            std::thread::sleep(Duration::from_nanos(ns.into()));
        }
    }
}

impl embedded_hal::delay::DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.sleep(ns);
    }
}

impl embedded_hal_async::delay::DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.sleep(ns);
    }
}
