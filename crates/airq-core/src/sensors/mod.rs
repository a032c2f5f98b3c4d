//! Sensor drivers and the traits the monitor consumes them through.

mod aht2x;
mod ens160;

pub use aht2x::{AHT2X_ADDRESS, Aht2x};
pub use ens160::{ENS160_ADDRESS_HIGH, ENS160_ADDRESS_LOW, Ens160, FirmwareVersion};

use core::fmt::Debug;

use log::error;
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} read failed during {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} timed out during {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor} reported part id 0x{found:04X}, expected 0x{expected:04X}")]
    UnexpectedPartId {
        sensor: &'static str,
        expected: u16,
        found: u16,
    },
    #[error("{sensor} frame failed its checksum")]
    ChecksumMismatch { sensor: &'static str },
    #[error("{sensor} used before begin() succeeded")]
    NotInitialized { sensor: &'static str },
}

/// Readings from the ENS160 gas sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirQualityReading {
    /// UBA air quality index, 1 (excellent) to 5 (unhealthy).
    pub aqi: u8,
    pub tvoc_ppb: u16,
    pub eco2_ppm: u16,
    pub validity: Validity,
}

/// How far the ENS160 trusts its own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Normal,
    /// First 3 minutes after power-on.
    WarmUp,
    /// First hour of operation ever.
    InitialStartUp,
    Invalid,
}

impl Validity {
    pub(crate) const fn from_status(status: u8) -> Self {
        match (status >> 2) & 0b11 {
            0 => Self::Normal,
            1 => Self::WarmUp,
            2 => Self::InitialStartUp,
            _ => Self::Invalid,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "ok",
            Self::WarmUp => "warm-up",
            Self::InitialStartUp => "start-up",
            Self::Invalid => "invalid",
        }
    }
}

/// Readings from the AHT2x climate sensor, in milli-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClimateReading {
    pub temperature_milli_celsius: i32,
    pub humidity_milli_percent: i32,
}

/// Trait for sensors that produce typed readings.
pub trait Sensor {
    /// The type of readings this sensor produces.
    type Readings;

    /// Bring the device up. Must succeed before `read`.
    fn begin(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Whether `begin` completed and the device identified itself.
    fn is_available(&self) -> bool;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> impl Future<Output = Result<Self::Readings, SensorError>>;
}

/// A gas sensor that can use ambient temperature and humidity to correct its output.
pub trait AirQualitySensor: Sensor<Readings = AirQualityReading> {
    fn compensate(
        &mut self,
        climate: &ClimateReading,
    ) -> impl Future<Output = Result<(), SensorError>>;
}

pub(crate) fn init_failure<E: Debug>(
    sensor: &'static str,
    details: &'static str,
) -> impl FnOnce(E) -> SensorError {
    move |e| {
        error!("{} init: {}: {:?}", sensor, details, e);
        SensorError::InitializationFailed { sensor, details }
    }
}

pub(crate) fn read_failure<E: Debug>(
    sensor: &'static str,
    operation: &'static str,
) -> impl FnOnce(E) -> SensorError {
    move |e| {
        error!("{} {} failed: {:?}", sensor, operation, e);
        SensorError::ReadFailed {
            sensor,
            operation,
            details: "I2C communication error",
        }
    }
}
