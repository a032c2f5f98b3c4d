//! I2C bus discovery.
//!
//! Probes every address of a configured 7-bit range in ascending order and
//! classifies the transport's status code for each one. The scanner is a
//! single sequential pass: I2C is a shared single-master bus, so probes are
//! never reordered, retried or issued in parallel.

mod i2c_probe;
mod report;

pub use i2c_probe::I2cProbe;
pub use report::{BusPins, WithPins};

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Lowest usable 7-bit address (0x00 is the general-call address).
pub const FIRST_USABLE_ADDRESS: u8 = 1;
/// Highest usable 7-bit address (0x7F is reserved).
pub const LAST_USABLE_ADDRESS: u8 = 126;
/// Number of addresses in the full usable range.
pub const MAX_PROBES: usize = (LAST_USABLE_ADDRESS - FIRST_USABLE_ADDRESS + 1) as usize;

const DEFAULT_INTER_PROBE_DELAY_US: u32 = 1_000;

/// Status code returned by a transport when a probe transaction ends.
///
/// The numbering follows the classic two-wire master convention, so any
/// platform driver can be adapted by translating its own errors into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u8);

impl StatusCode {
    /// A device acknowledged its address.
    pub const ACKNOWLEDGED: Self = Self(0);
    /// The transmit buffer was too long for the transport.
    pub const DATA_TOO_LONG: Self = Self(1);
    /// Nobody acknowledged the address byte.
    pub const ADDRESS_NACK: Self = Self(2);
    /// The address was acknowledged but a data byte was not.
    pub const DATA_NACK: Self = Self(3);
    /// Any other bus condition (arbitration loss, clock-stretch timeout, ...).
    pub const OTHER: Self = Self(4);

    /// Map the raw code onto a probe outcome.
    pub const fn classify(self) -> ProbeStatus {
        match self.0 {
            0 => ProbeStatus::Acknowledged,
            4 => ProbeStatus::BusError,
            _ => ProbeStatus::NoResponse,
        }
    }
}

/// Outcome of probing a single address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeStatus {
    /// A device is present and answered the addressing phase.
    Acknowledged,
    /// Nothing answered. This is the normal outcome for an empty address.
    NoResponse,
    /// An anomalous bus condition that is distinct from a plain NACK.
    BusError,
}

/// One probed address and what happened there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeResult {
    pub address: u8,
    pub status: ProbeStatus,
}

/// The minimal transport a scan needs.
///
/// `begin_probe` must never fail on a silent address; the outcome is only
/// reported once the transaction is ended.
pub trait ProbeCapability {
    /// Start a transaction addressed to `address`.
    fn begin_probe(&mut self, address: u8);

    /// Complete the pending transaction and report its status.
    fn end_probe(&mut self) -> StatusCode;
}

impl<T: ProbeCapability + ?Sized> ProbeCapability for &mut T {
    fn begin_probe(&mut self, address: u8) {
        (**self).begin_probe(address)
    }

    fn end_probe(&mut self) -> StatusCode {
        (**self).end_probe()
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    #[error(
        "invalid scan range 0x{low:02X}..=0x{high:02X}: bounds must satisfy 0x01 <= low <= high <= 0x7E"
    )]
    Configuration { low: u8, high: u8 },
}

/// Inclusive address range to probe and the pacing between probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScanConfig")]
pub struct ScanConfig {
    pub address_low: u8,
    pub address_high: u8,
    /// Minimum wait between two consecutive probes, in microseconds.
    pub inter_probe_delay_us: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            address_low: FIRST_USABLE_ADDRESS,
            address_high: LAST_USABLE_ADDRESS,
            inter_probe_delay_us: DEFAULT_INTER_PROBE_DELAY_US,
        }
    }
}

impl ScanConfig {
    /// Build a validated config for `low..=high` with the default pacing.
    pub fn new(low: u8, high: u8) -> Result<Self, ScanError> {
        let config = Self {
            address_low: low,
            address_high: high,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub const fn with_inter_probe_delay_us(mut self, delay_us: u32) -> Self {
        self.inter_probe_delay_us = delay_us;
        self
    }

    /// Reject ranges that touch the reserved addresses or are inverted.
    ///
    /// Out-of-range requests are refused rather than clamped.
    pub const fn validate(&self) -> Result<(), ScanError> {
        let low = self.address_low;
        let high = self.address_high;
        if low < FIRST_USABLE_ADDRESS || high > LAST_USABLE_ADDRESS || low > high {
            return Err(ScanError::Configuration { low, high });
        }
        Ok(())
    }

    /// Number of addresses `low..=high` spans. An inverted range spans none.
    pub const fn probe_count(&self) -> usize {
        if self.address_high < self.address_low {
            return 0;
        }
        (self.address_high - self.address_low) as usize + 1
    }
}

#[derive(Deserialize)]
struct RawScanConfig {
    #[serde(default = "default_low")]
    address_low: u8,
    #[serde(default = "default_high")]
    address_high: u8,
    #[serde(default = "default_delay")]
    inter_probe_delay_us: u32,
}

fn default_low() -> u8 {
    FIRST_USABLE_ADDRESS
}

fn default_high() -> u8 {
    LAST_USABLE_ADDRESS
}

fn default_delay() -> u32 {
    DEFAULT_INTER_PROBE_DELAY_US
}

impl TryFrom<RawScanConfig> for ScanConfig {
    type Error = ScanError;

    fn try_from(raw: RawScanConfig) -> Result<Self, Self::Error> {
        let config = Self {
            address_low: raw.address_low,
            address_high: raw.address_high,
            inter_probe_delay_us: raw.inter_probe_delay_us,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Everything one scan found.
///
/// `found` and `error_entries` are in ascending address order, and
/// `device_count()` is always `found().len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    config: ScanConfig,
    found: Vec<ProbeResult, MAX_PROBES>,
    error_entries: Vec<ProbeResult, MAX_PROBES>,
    last_probed: Option<u8>,
    complete: bool,
}

impl ScanReport {
    fn new(config: ScanConfig) -> Self {
        Self {
            config,
            found: Vec::new(),
            error_entries: Vec::new(),
            last_probed: None,
            complete: false,
        }
    }

    fn record(&mut self, result: ProbeResult) {
        self.last_probed = Some(result.address);
        let list = match result.status {
            ProbeStatus::Acknowledged => &mut self.found,
            ProbeStatus::BusError => &mut self.error_entries,
            ProbeStatus::NoResponse => return,
        };
        // Capacity covers the whole usable range and each address is probed once.
        let pushed = list.push(result);
        debug_assert!(pushed.is_ok());
    }

    /// The range that was requested.
    pub const fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Addresses that acknowledged.
    pub fn found(&self) -> &[ProbeResult] {
        &self.found
    }

    /// Addresses that reported a bus error.
    pub fn error_entries(&self) -> &[ProbeResult] {
        &self.error_entries
    }

    pub fn device_count(&self) -> usize {
        self.found.len()
    }

    /// `false` when the scan was cancelled before the end of its range.
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// The last address that was actually probed, if any.
    pub const fn last_probed(&self) -> Option<u8> {
        self.last_probed
    }

    /// Whether a device acknowledged at `address`.
    pub fn contains(&self, address: u8) -> bool {
        self.found.iter().any(|r| r.address == address)
    }
}

/// Sequential I2C bus scanner.
///
/// Holds the transport exclusively while it exists; call [`BusScanner::release`]
/// to hand the bus back for sensor traffic. No state survives between scans.
pub struct BusScanner<P, D> {
    transport: P,
    delay: D,
}

impl<P, D> BusScanner<P, D>
where
    P: ProbeCapability,
    D: DelayNs,
{
    pub const fn new(transport: P, delay: D) -> Self {
        Self { transport, delay }
    }

    /// Probe every address of `config` once, in ascending order.
    pub fn scan(&mut self, config: &ScanConfig) -> Result<ScanReport, ScanError> {
        self.scan_until(config, || false)
    }

    /// Like [`BusScanner::scan`], but checks `should_stop` before every probe.
    ///
    /// A stop request leaves the already probed prefix in the report and marks
    /// it incomplete.
    pub fn scan_until<F>(
        &mut self,
        config: &ScanConfig,
        mut should_stop: F,
    ) -> Result<ScanReport, ScanError>
    where
        F: FnMut() -> bool,
    {
        config.validate()?;

        let mut report = ScanReport::new(*config);
        for address in config.address_low..=config.address_high {
            if should_stop() {
                debug!("I2C scan cancelled before 0x{:02X}", address);
                return Ok(report);
            }
            if address != config.address_low {
                self.delay.delay_us(config.inter_probe_delay_us);
            }

            self.transport.begin_probe(address);
            let status = self.transport.end_probe().classify();
            if status != ProbeStatus::NoResponse {
                debug!("I2C probe 0x{:02X}: {:?}", address, status);
            }
            report.record(ProbeResult { address, status });
        }

        report.complete = true;
        Ok(report)
    }

    /// Give the transport and delay back to the caller.
    pub fn release(self) -> (P, D) {
        (self.transport, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transport that answers from a fixed table and records every call.
    struct ScriptedBus {
        acks: &'static [u8],
        errors: &'static [u8],
        pending: Option<u8>,
        calls: std::vec::Vec<u8>,
    }

    impl ScriptedBus {
        fn new(acks: &'static [u8], errors: &'static [u8]) -> Self {
            Self {
                acks,
                errors,
                pending: None,
                calls: std::vec::Vec::new(),
            }
        }
    }

    impl ProbeCapability for ScriptedBus {
        fn begin_probe(&mut self, address: u8) {
            assert!(self.pending.is_none(), "probe started twice");
            self.pending = Some(address);
            self.calls.push(address);
        }

        fn end_probe(&mut self) -> StatusCode {
            let address = self.pending.take().expect("end without begin");
            if self.acks.contains(&address) {
                StatusCode::ACKNOWLEDGED
            } else if self.errors.contains(&address) {
                StatusCode::OTHER
            } else {
                StatusCode::ADDRESS_NACK
            }
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        waits: std::vec::Vec<u32>,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.waits.push(ns);
        }

        fn delay_us(&mut self, us: u32) {
            self.waits.push(us * 1_000);
        }
    }

    fn scanner(
        acks: &'static [u8],
        errors: &'static [u8],
    ) -> BusScanner<ScriptedBus, CountingDelay> {
        BusScanner::new(ScriptedBus::new(acks, errors), CountingDelay::default())
    }

    fn addresses(results: &[ProbeResult]) -> std::vec::Vec<u8> {
        results.iter().map(|r| r.address).collect()
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(StatusCode(0).classify(), ProbeStatus::Acknowledged);
        assert_eq!(StatusCode(4).classify(), ProbeStatus::BusError);
        for code in [1, 2, 3, 5, 0xFF] {
            assert_eq!(StatusCode(code).classify(), ProbeStatus::NoResponse);
        }
    }

    #[test]
    fn test_visits_every_address_once_in_order() {
        let mut scanner = scanner(&[], &[]);
        let config = ScanConfig::new(0x10, 0x20).unwrap();
        scanner.scan(&config).unwrap();

        let (bus, _) = scanner.release();
        let expected: std::vec::Vec<u8> = (0x10..=0x20).collect();
        assert_eq!(bus.calls, expected);
    }

    #[test]
    fn test_full_range_finds_acknowledged_devices() {
        let mut scanner = scanner(&[0x53, 0x08], &[]);
        let report = scanner.scan(&ScanConfig::default()).unwrap();

        assert_eq!(addresses(report.found()), [0x08, 0x53]);
        assert!(report.found().iter().all(|r| r.status == ProbeStatus::Acknowledged));
        assert_eq!(report.device_count(), 2);
        assert_eq!(report.device_count(), report.found().len());
        assert!(report.error_entries().is_empty());
        assert!(report.is_complete());
        assert!(report.contains(0x53));
        assert!(!report.contains(0x52));

        let (bus, _) = scanner.release();
        assert_eq!(bus.calls.len(), MAX_PROBES);
        assert_eq!(bus.calls.first(), Some(&1));
        assert_eq!(bus.calls.last(), Some(&126));
    }

    #[test]
    fn test_status_four_is_reported_as_bus_error() {
        let mut scanner = scanner(&[], &[0x40]);
        let report = scanner.scan(&ScanConfig::default()).unwrap();

        assert_eq!(
            report.error_entries(),
            [ProbeResult {
                address: 0x40,
                status: ProbeStatus::BusError
            }]
        );
        assert!(report.found().is_empty());
        assert_eq!(report.device_count(), 0);
    }

    #[test]
    fn test_inverted_range_fails_without_probing() {
        let mut scanner = scanner(&[0x08], &[]);
        let config = ScanConfig {
            address_low: 1,
            address_high: 0,
            ..ScanConfig::default()
        };

        assert_eq!(
            scanner.scan(&config),
            Err(ScanError::Configuration { low: 1, high: 0 })
        );
        let (bus, delay) = scanner.release();
        assert!(bus.calls.is_empty());
        assert!(delay.waits.is_empty());
    }

    #[test]
    fn test_reserved_addresses_are_rejected() {
        for (low, high) in [(0, 126), (1, 127), (0, 127), (0x50, 0x40)] {
            let mut scanner = scanner(&[], &[]);
            let config = ScanConfig {
                address_low: low,
                address_high: high,
                ..ScanConfig::default()
            };
            assert_eq!(
                scanner.scan(&config),
                Err(ScanError::Configuration { low, high })
            );
            assert!(ScanConfig::new(low, high).is_err());
            assert!(scanner.release().0.calls.is_empty());
        }
    }

    #[test]
    fn test_single_address_range() {
        let mut scanner = scanner(&[0x3C], &[]);
        let report = scanner.scan(&ScanConfig::new(0x3C, 0x3C).unwrap()).unwrap();
        assert_eq!(addresses(report.found()), [0x3C]);

        let (bus, delay) = scanner.release();
        assert_eq!(bus.calls, [0x3C]);
        assert!(delay.waits.is_empty());
    }

    #[test]
    fn test_waits_between_probes_only() {
        let mut scanner = scanner(&[], &[]);
        let config = ScanConfig::new(0x20, 0x24)
            .unwrap()
            .with_inter_probe_delay_us(250);
        scanner.scan(&config).unwrap();

        let (_, delay) = scanner.release();
        assert_eq!(delay.waits, [250_000; 4]);
    }

    #[test]
    fn test_repeated_scans_are_identical() {
        let mut scanner = scanner(&[0x08, 0x38, 0x53], &[0x40]);
        let first = scanner.scan(&ScanConfig::default()).unwrap();
        let second = scanner.scan(&ScanConfig::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cancellation_keeps_probed_prefix() {
        let mut scanner = scanner(&[0x08, 0x53], &[]);
        let mut budget = 0x10;
        let report = scanner
            .scan_until(&ScanConfig::default(), || {
                budget -= 1;
                budget < 0
            })
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.last_probed(), Some(0x10));
        assert_eq!(addresses(report.found()), [0x08]);

        let (bus, _) = scanner.release();
        assert_eq!(bus.calls, (1..=0x10).collect::<std::vec::Vec<u8>>());
    }

    #[test]
    fn test_scan_config_deserialization_validates() {
        let config: ScanConfig =
            serde_json::from_str(r#"{"address_low": 8, "address_high": 119}"#).unwrap();
        assert_eq!(config.address_low, 0x08);
        assert_eq!(config.address_high, 0x77);
        assert_eq!(config.inter_probe_delay_us, 1_000);
        assert_eq!(config.probe_count(), 112);

        let inverted = serde_json::from_str::<ScanConfig>(r#"{"address_low": 9, "address_high": 8}"#);
        assert!(inverted.is_err());
        let reserved = serde_json::from_str::<ScanConfig>(r#"{"address_high": 127}"#);
        assert!(reserved.is_err());
    }

    #[test]
    fn test_probe_count_of_inverted_range_is_zero() {
        let config = ScanConfig {
            address_low: 9,
            address_high: 8,
            ..ScanConfig::default()
        };
        assert_eq!(config.probe_count(), 0);
        assert!(config.validate().is_err());

        let single = ScanConfig {
            address_low: 0x3C,
            address_high: 0x3C,
            ..ScanConfig::default()
        };
        assert_eq!(single.probe_count(), 1);
        assert_eq!(ScanConfig::default().probe_count(), MAX_PROBES);
    }
}
