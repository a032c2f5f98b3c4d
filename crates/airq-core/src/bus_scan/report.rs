//! Console rendering of a [`ScanReport`].

use core::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use super::{ProbeResult, ProbeStatus, ScanReport};

const HEADER: &str = "--- I2C Bus Scanning ---";
const FOOTER: &str = "------------------------";

/// GPIO numbers the bus was brought up on. Only used for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusPins {
    pub sda: u8,
    pub scl: u8,
}

impl Default for BusPins {
    fn default() -> Self {
        Self { sda: 8, scl: 9 }
    }
}

impl ScanReport {
    /// Write the human-readable scan log.
    ///
    /// Found devices and bus errors are listed together in address order,
    /// followed by a summary line. When `pins` is known the summary points
    /// at them if nothing answered.
    pub fn render<W: Write>(&self, out: &mut W, pins: Option<BusPins>) -> fmt::Result {
        writeln!(out, "{HEADER}")?;
        if let Some(pins) = pins {
            writeln!(out, "I2C initialized on SDA=GPIO{}, SCL=GPIO{}.", pins.sda, pins.scl)?;
        }

        for entry in merged(self.found(), self.error_entries()) {
            match entry.status {
                ProbeStatus::Acknowledged => writeln!(
                    out,
                    "I2C device found at address 0x{:02X}  <-- SUCCESS",
                    entry.address
                )?,
                ProbeStatus::BusError => {
                    writeln!(out, "Unknown error at address 0x{:02X}", entry.address)?
                }
                ProbeStatus::NoResponse => {}
            }
        }

        if !self.is_complete() {
            match self.last_probed() {
                Some(address) => writeln!(out, "Scan cancelled after 0x{address:02X}.")?,
                None => writeln!(out, "Scan cancelled before the first probe.")?,
            }
        }

        match (self.device_count(), pins) {
            (0, Some(pins)) => writeln!(
                out,
                "No I2C devices found. Check wiring (SDA={}, SCL={}) and pull-up resistors!",
                pins.sda, pins.scl
            )?,
            (0, None) => writeln!(out, "No I2C devices found. Check wiring and pull-up resistors!")?,
            (count, _) => writeln!(out, "Scan complete. Found {count} device(s).")?,
        }
        writeln!(out, "{FOOTER}")
    }
}

/// A [`ScanReport`] rendered together with the pins it was taken on.
pub struct WithPins<'a> {
    report: &'a ScanReport,
    pins: BusPins,
}

impl fmt::Display for WithPins<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.report.render(f, Some(self.pins))
    }
}

impl ScanReport {
    pub const fn with_pins(&self, pins: BusPins) -> WithPins<'_> {
        WithPins { report: self, pins }
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, None)
    }
}

/// Merge two address-ordered lists into one address-ordered sequence.
fn merged<'a>(
    found: &'a [ProbeResult],
    errors: &'a [ProbeResult],
) -> impl Iterator<Item = &'a ProbeResult> + 'a {
    let mut found = found.iter().peekable();
    let mut errors = errors.iter().peekable();
    core::iter::from_fn(move || {
        let next_found = found.peek().map(|r| r.address);
        let next_error = errors.peek().map(|r| r.address);
        match (next_found, next_error) {
            (Some(a), Some(b)) if b < a => errors.next(),
            (Some(_), _) => found.next(),
            (None, _) => errors.next(),
        }
    })
}
