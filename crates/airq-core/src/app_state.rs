//! Monitor orchestration and application-wide error types for airq
//!
//! The monitor owns its sensors (handed in by the caller, never global) and
//! drives the init-then-poll cycle. Fatal init failures are returned, not
//! looped on: the caller picks the halt/retry policy.

use core::fmt;

use log::{error, info, warn};
use thiserror_no_std::Error;

use embedded_hal::delay::DelayNs;

use crate::bus_scan::{BusScanner, ProbeCapability, ScanError, ScanReport};
use crate::config::MonitorConfig;
use crate::metrics::AirQualityLevel;
use crate::sensors::{AirQualityReading, AirQualitySensor, ClimateReading, Sensor, SensorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    SensorsStarting,
    Running,
    Halted,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("bus scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("sensor initialization failed: {0}")]
    SensorInit(SensorError),
    #[error("sensor error: {0}")]
    Sensor(SensorError),
    #[error("monitor is not running")]
    NotRunning,
}

/// Which expected peripherals answered the bus scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePresence {
    pub air_quality: bool,
    pub climate: bool,
    pub oled: bool,
}

impl DevicePresence {
    /// Scan `config.scan` and check which of the configured peripherals answered.
    pub fn discover<P, D>(
        scanner: &mut BusScanner<P, D>,
        config: &MonitorConfig,
    ) -> Result<(ScanReport, Self), AppError>
    where
        P: ProbeCapability,
        D: DelayNs,
    {
        let report = scanner.scan(&config.scan)?;
        let presence = Self::from_report(&report, config);
        Ok((report, presence))
    }

    pub fn from_report(report: &ScanReport, config: &MonitorConfig) -> Self {
        let presence = Self {
            air_quality: report.contains(config.ens160_address),
            climate: report.contains(config.aht2x_address),
            oled: report.contains(config.oled_address),
        };
        if !presence.air_quality {
            warn!(
                "ENS160 did not answer at 0x{:02X}. Check address, power, and wiring.",
                config.ens160_address
            );
        }
        presence
    }
}

/// Fixed-point milli-unit value, printed with the formatter's precision (default 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milli(pub i32);

impl fmt::Display for Milli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        match f.precision().unwrap_or(2).min(3) {
            0 => write!(f, "{sign}{}", magnitude / 1000),
            precision => {
                let divisor = 10u32.pow(3 - precision as u32);
                let fraction = (magnitude % 1000) / divisor;
                write!(f, "{sign}{}.{:0width$}", magnitude / 1000, fraction, width = precision)
            }
        }
    }
}

/// One poll cycle's worth of readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub air: AirQualityReading,
    /// Absent when no climate sensor is fitted or its read failed.
    pub climate: Option<ClimateReading>,
}

impl Sample {
    pub const fn level(&self) -> Option<AirQualityLevel> {
        AirQualityLevel::from_aqi(self.air.aqi)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.level().map_or("?", AirQualityLevel::label);
        write!(
            f,
            "AQI: {} ({}) | TVOC: {} ppb | eCO2: {} ppm",
            self.air.aqi, label, self.air.tvoc_ppb, self.air.eco2_ppm
        )?;
        if let Some(climate) = self.climate {
            write!(
                f,
                " | T: {} C | RH: {} %",
                Milli(climate.temperature_milli_celsius),
                Milli(climate.humidity_milli_percent)
            )?;
        }
        Ok(())
    }
}

/// Owns the sensors and runs the init-then-poll cycle.
pub struct Monitor<A, C> {
    air: A,
    climate: Option<C>,
    run_state: AppRunState,
}

impl<A, C> Monitor<A, C>
where
    A: AirQualitySensor,
    C: Sensor<Readings = ClimateReading>,
{
    /// Create a monitor. Pass `None` for `climate` when no AHT2x is fitted.
    pub fn new(air: A, climate: Option<C>) -> Self {
        Self {
            air,
            climate,
            run_state: AppRunState::Uninitialized,
        }
    }

    pub const fn run_state(&self) -> AppRunState {
        self.run_state
    }

    /// Whether readings are being temperature/humidity compensated.
    pub fn is_compensated(&self) -> bool {
        self.climate.as_ref().is_some_and(|c| c.is_available())
    }

    /// Bring up the sensors.
    ///
    /// A failing air-quality sensor halts the monitor and is returned to the
    /// caller. A failing climate sensor only disables compensation.
    pub async fn start(&mut self) -> Result<(), AppError> {
        self.run_state = AppRunState::SensorsStarting;

        if let Err(e) = self.air.begin().await {
            error!("Air quality sensor init failed: {}", e);
            self.run_state = AppRunState::Halted;
            return Err(AppError::SensorInit(e));
        }

        if let Some(climate) = self.climate.as_mut() {
            if let Err(e) = climate.begin().await {
                warn!("Climate sensor init failed, continuing uncompensated: {}", e);
            }
        }

        info!(
            "Monitor running ({})",
            if self.is_compensated() {
                "compensated"
            } else {
                "uncompensated"
            }
        );
        self.run_state = AppRunState::Running;
        Ok(())
    }

    /// Take one sample.
    ///
    /// Climate and compensation problems degrade the sample; only an
    /// air-quality read failure is an error.
    pub async fn poll(&mut self) -> Result<Sample, AppError> {
        if self.run_state != AppRunState::Running {
            return Err(AppError::NotRunning);
        }

        let mut climate = None;
        if let Some(sensor) = self.climate.as_mut().filter(|c| c.is_available()) {
            match sensor.read().await {
                Ok(reading) => climate = Some(reading),
                Err(e) => warn!("Climate read failed: {}", e),
            }
        }

        if let Some(reading) = &climate {
            if let Err(e) = self.air.compensate(reading).await {
                warn!("Compensation update failed: {}", e);
            }
        }

        let air = self.air.read().await.map_err(AppError::Sensor)?;
        Ok(Sample { air, climate })
    }

    /// Hand the sensors back.
    pub fn into_parts(self) -> (A, Option<C>) {
        (self.air, self.climate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus_scan::{ScanConfig, StatusCode};
    use crate::sensors::Validity;
    use embassy_futures::block_on;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use std::vec::Vec;

    const AIR: AirQualityReading = AirQualityReading {
        aqi: 2,
        tvoc_ppb: 120,
        eco2_ppm: 450,
        validity: Validity::Normal,
    };

    const CLIMATE: ClimateReading = ClimateReading {
        temperature_milli_celsius: 22_517,
        humidity_milli_percent: 39_727,
    };

    #[derive(Default)]
    struct FakeAir {
        fail_begin: bool,
        fail_read: bool,
        started: bool,
        compensations: Vec<ClimateReading>,
    }

    impl Sensor for FakeAir {
        type Readings = AirQualityReading;

        async fn begin(&mut self) -> Result<(), SensorError> {
            if self.fail_begin {
                return Err(SensorError::InitializationFailed {
                    sensor: "fake",
                    details: "no answer",
                });
            }
            self.started = true;
            Ok(())
        }

        fn is_available(&self) -> bool {
            self.started
        }

        async fn read(&mut self) -> Result<AirQualityReading, SensorError> {
            if self.fail_read {
                return Err(SensorError::Timeout {
                    sensor: "fake",
                    operation: "read",
                });
            }
            Ok(AIR)
        }
    }

    impl AirQualitySensor for FakeAir {
        async fn compensate(&mut self, climate: &ClimateReading) -> Result<(), SensorError> {
            self.compensations.push(*climate);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeClimate {
        fail_begin: bool,
        fail_read: bool,
        started: bool,
    }

    impl Sensor for FakeClimate {
        type Readings = ClimateReading;

        async fn begin(&mut self) -> Result<(), SensorError> {
            self.started = !self.fail_begin;
            if self.fail_begin {
                return Err(SensorError::NotInitialized { sensor: "climate" });
            }
            Ok(())
        }

        fn is_available(&self) -> bool {
            self.started
        }

        async fn read(&mut self) -> Result<ClimateReading, SensorError> {
            if self.fail_read {
                return Err(SensorError::ChecksumMismatch { sensor: "climate" });
            }
            Ok(CLIMATE)
        }
    }

    #[test]
    fn test_poll_compensates_then_reads() {
        let mut monitor = Monitor::new(FakeAir::default(), Some(FakeClimate::default()));
        block_on(monitor.start()).unwrap();
        assert_eq!(monitor.run_state(), AppRunState::Running);
        assert!(monitor.is_compensated());

        let sample = block_on(monitor.poll()).unwrap();
        assert_eq!(sample.air, AIR);
        assert_eq!(sample.climate, Some(CLIMATE));

        let (air, _) = monitor.into_parts();
        assert_eq!(air.compensations, [CLIMATE]);
    }

    #[test]
    fn test_air_sensor_failure_halts() {
        let air = FakeAir {
            fail_begin: true,
            ..FakeAir::default()
        };
        let mut monitor = Monitor::new(air, None::<FakeClimate>);

        let err = block_on(monitor.start()).unwrap_err();
        assert!(matches!(err, AppError::SensorInit(_)));
        assert_eq!(monitor.run_state(), AppRunState::Halted);
        assert_eq!(block_on(monitor.poll()), Err(AppError::NotRunning));
    }

    #[test]
    fn test_climate_failure_runs_uncompensated() {
        let climate = FakeClimate {
            fail_begin: true,
            ..FakeClimate::default()
        };
        let mut monitor = Monitor::new(FakeAir::default(), Some(climate));
        block_on(monitor.start()).unwrap();
        assert!(!monitor.is_compensated());

        let sample = block_on(monitor.poll()).unwrap();
        assert_eq!(sample.climate, None);
        assert!(monitor.into_parts().0.compensations.is_empty());
    }

    #[test]
    fn test_climate_read_failure_degrades_sample() {
        let climate = FakeClimate {
            fail_read: true,
            ..FakeClimate::default()
        };
        let mut monitor = Monitor::new(FakeAir::default(), Some(climate));
        block_on(monitor.start()).unwrap();

        let sample = block_on(monitor.poll()).unwrap();
        assert_eq!(sample.air, AIR);
        assert_eq!(sample.climate, None);
    }

    #[test]
    fn test_air_read_failure_is_reported() {
        let air = FakeAir {
            fail_read: true,
            ..FakeAir::default()
        };
        let mut monitor = Monitor::new(air, None::<FakeClimate>);
        block_on(monitor.start()).unwrap();

        let err = block_on(monitor.poll()).unwrap_err();
        assert!(matches!(err, AppError::Sensor(SensorError::Timeout { .. })));
    }

    #[test]
    fn test_poll_before_start_is_rejected() {
        let mut monitor = Monitor::new(FakeAir::default(), None::<FakeClimate>);
        assert_eq!(block_on(monitor.poll()), Err(AppError::NotRunning));
    }

    #[test]
    fn test_sample_console_line() {
        let sample = Sample {
            air: AIR,
            climate: Some(CLIMATE),
        };
        assert_eq!(
            sample.to_string(),
            "AQI: 2 (Good) | TVOC: 120 ppb | eCO2: 450 ppm | T: 22.51 C | RH: 39.72 %"
        );

        let bare = Sample {
            air: AirQualityReading { aqi: 0, ..AIR },
            climate: None,
        };
        assert_eq!(bare.to_string(), "AQI: 0 (?) | TVOC: 120 ppb | eCO2: 450 ppm");
    }

    #[test]
    fn test_milli_formatting() {
        assert_eq!(Milli(-500).to_string(), "-0.50");
        assert_eq!(format!("{:.1}", Milli(22_517)), "22.5");
        assert_eq!(format!("{:.0}", Milli(1_999)), "1");
        assert_eq!(format!("{:.3}", Milli(7)), "0.007");
    }

    struct AckList(&'static [u8], u8);

    impl ProbeCapability for AckList {
        fn begin_probe(&mut self, address: u8) {
            self.1 = address;
        }

        fn end_probe(&mut self) -> StatusCode {
            if self.0.contains(&self.1) {
                StatusCode::ACKNOWLEDGED
            } else {
                StatusCode::ADDRESS_NACK
            }
        }
    }

    #[test]
    fn test_device_presence_from_scan() {
        let report = BusScanner::new(AckList(&[0x3C, 0x53], 0), NoopDelay)
            .scan(&ScanConfig::default())
            .unwrap();
        let presence = DevicePresence::from_report(&report, &MonitorConfig::default());
        assert_eq!(
            presence,
            DevicePresence {
                air_quality: true,
                climate: false,
                oled: true,
            }
        );
    }

    #[test]
    fn test_discover_reports_bad_scan_range_as_app_error() {
        let config = MonitorConfig {
            scan: ScanConfig {
                address_low: 9,
                address_high: 8,
                ..ScanConfig::default()
            },
            ..MonitorConfig::default()
        };
        let mut scanner = BusScanner::new(AckList(&[0x53], 0), NoopDelay);

        let err = DevicePresence::discover(&mut scanner, &config).unwrap_err();
        assert_eq!(
            err,
            AppError::Scan(ScanError::Configuration { low: 9, high: 8 })
        );
        // Nothing was probed.
        assert_eq!(scanner.release().0.1, 0);
    }

    #[test]
    fn test_discover_returns_report_and_presence() {
        let mut scanner = BusScanner::new(AckList(&[0x38, 0x53], 0), NoopDelay);
        let (report, presence) =
            DevicePresence::discover(&mut scanner, &MonitorConfig::default()).unwrap();
        assert_eq!(report.device_count(), 2);
        assert!(presence.air_quality && presence.climate && !presence.oled);
    }
}
