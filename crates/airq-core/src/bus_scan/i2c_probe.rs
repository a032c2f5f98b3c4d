use embedded_hal::i2c::{Error, ErrorKind, I2c, NoAcknowledgeSource};

use super::{ProbeCapability, StatusCode};

/// Adapts an `embedded-hal` I2C master into a [`ProbeCapability`].
///
/// Each probe is an address-only write: the device either acknowledges its
/// address or it doesn't, and no register pointer is disturbed.
pub struct I2cProbe<I> {
    i2c: I,
    pending: Option<u8>,
}

impl<I: I2c> I2cProbe<I> {
    pub const fn new(i2c: I) -> Self {
        Self { i2c, pending: None }
    }

    /// Give back the wrapped bus.
    pub fn into_inner(self) -> I {
        self.i2c
    }
}

impl<I: I2c> ProbeCapability for I2cProbe<I> {
    fn begin_probe(&mut self, address: u8) {
        self.pending = Some(address);
    }

    fn end_probe(&mut self) -> StatusCode {
        let Some(address) = self.pending.take() else {
            return StatusCode::OTHER;
        };

        match self.i2c.write(address, &[]) {
            Ok(()) => StatusCode::ACKNOWLEDGED,
            Err(e) => status_for(e.kind()),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => StatusCode::DATA_NACK,
        ErrorKind::NoAcknowledge(_) => StatusCode::ADDRESS_NACK,
        _ => StatusCode::OTHER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    #[test]
    fn test_address_only_write_per_probe() {
        let expectations = [
            Transaction::write(0x53, vec![]),
            Transaction::write(0x52, vec![])
                .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
            Transaction::write(0x40, vec![]).with_error(ErrorKind::ArbitrationLoss),
            Transaction::write(0x41, vec![])
                .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
            Transaction::write(0x42, vec![]).with_error(ErrorKind::Bus),
        ];
        let mut probe = I2cProbe::new(I2cMock::new(&expectations));

        probe.begin_probe(0x53);
        assert_eq!(probe.end_probe(), StatusCode::ACKNOWLEDGED);
        probe.begin_probe(0x52);
        assert_eq!(probe.end_probe(), StatusCode::ADDRESS_NACK);
        probe.begin_probe(0x40);
        assert_eq!(probe.end_probe(), StatusCode::OTHER);
        probe.begin_probe(0x41);
        assert_eq!(probe.end_probe(), StatusCode::DATA_NACK);
        probe.begin_probe(0x42);
        assert_eq!(probe.end_probe(), StatusCode::OTHER);

        probe.into_inner().done();
    }

    #[test]
    fn test_end_without_begin_touches_nothing() {
        let mut probe = I2cProbe::new(I2cMock::new(&[]));
        assert_eq!(probe.end_probe(), StatusCode::OTHER);
        probe.into_inner().done();
    }

    #[test]
    fn test_scanner_over_i2c_master() {
        use crate::bus_scan::{BusScanner, ProbeStatus, ScanConfig};
        use embedded_hal_mock::eh1::delay::NoopDelay;

        let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
        let expectations: std::vec::Vec<Transaction> = (0x50..=0x54)
            .map(|address| match address {
                0x53 => Transaction::write(address, vec![]),
                0x51 => Transaction::write(address, vec![]).with_error(ErrorKind::Other),
                _ => Transaction::write(address, vec![]).with_error(nack),
            })
            .collect();

        let mut scanner = BusScanner::new(I2cProbe::new(I2cMock::new(&expectations)), NoopDelay);
        let report = scanner.scan(&ScanConfig::new(0x50, 0x54).unwrap()).unwrap();

        assert_eq!(report.device_count(), 1);
        assert_eq!(report.found()[0].address, 0x53);
        assert_eq!(report.error_entries()[0].address, 0x51);
        assert_eq!(report.error_entries()[0].status, ProbeStatus::BusError);

        let (probe, _) = scanner.release();
        probe.into_inner().done();
    }
}
