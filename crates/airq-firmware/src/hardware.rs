//! Hardware initialization for the airq board
//!
//! The I2C master starts out blocking so the bus scan can own it outright.
//! After the scan it is converted to async and parked in a static mutex that
//! the sensor and display handles share.

use airq_core::async_i2c_bus::{AsyncI2cDevice, SharedI2cBus};
use embassy_sync::mutex::Mutex as AsyncMutex;
use esp_hal::i2c::master::{Config as I2cConfig, ConfigError, I2c};
use esp_hal::time::Rate;
use esp_hal::{Async, Blocking};
use log::info;
use static_cell::StaticCell;

/// GPIO wired to SDA. Matches `BusPins::default()`.
pub const SDA_GPIO: u8 = 8;
/// GPIO wired to SCL.
pub const SCL_GPIO: u8 = 9;

pub type BusMaster = I2c<'static, Async>;
pub type BusDevice = AsyncI2cDevice<'static, BusMaster>;

/// Create the blocking I2C master used for the bus scan
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO8<'static>,
    scl: esp_hal::peripherals::GPIO9<'static>,
    frequency_khz: u32,
) -> Result<I2c<'static, Blocking>, ConfigError> {
    let i2c = I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(frequency_khz)),
    )?
    .with_sda(sda)
    .with_scl(scl);

    info!(
        "I2C initialized on SDA=GPIO{}, SCL=GPIO{} at {} kHz",
        SDA_GPIO, SCL_GPIO, frequency_khz
    );
    Ok(i2c)
}

/// Switch the master to async mode and make it shareable
///
/// Can only be called once; the bus lives for the rest of the program.
pub fn share_i2c_bus(i2c: I2c<'static, Blocking>) -> &'static SharedI2cBus<BusMaster> {
    static I2C0_BUS: StaticCell<SharedI2cBus<BusMaster>> = StaticCell::new();
    I2C0_BUS.init(AsyncMutex::new(i2c.into_async()))
}

/// A fresh handle onto the shared bus
pub fn device(bus: &'static SharedI2cBus<BusMaster>) -> BusDevice {
    AsyncI2cDevice::new(bus)
}
