use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{error, info};

use super::{ClimateReading, Sensor, SensorError, init_failure, read_failure};

/// Fixed address of the AHT20/AHT21.
pub const AHT2X_ADDRESS: u8 = 0x38;

const SENSOR: &str = "AHT2x";

const CMD_STATUS: u8 = 0x71;
const CMD_INITIALIZE: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];

const STATUS_BUSY: u8 = 1 << 7;
const STATUS_CALIBRATED: u8 = 1 << 3;

const POWER_ON_MS: u32 = 40;
const INITIALIZE_MS: u32 = 10;
const MEASUREMENT_MS: u32 = 80;
const BUSY_RETRY_MS: u32 = 10;
const MAX_BUSY_RETRIES: u8 = 5;

/// Aosong AHT20/AHT21 temperature and humidity sensor.
pub struct Aht2x<I, D> {
    i2c: I,
    delay: D,
    ready: bool,
}

impl<I: I2c, D: DelayNs> Aht2x<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            ready: false,
        }
    }

    /// Give back the bus handle and delay.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    async fn status(&mut self) -> Result<u8, I::Error> {
        let mut status = [0u8; 1];
        self.i2c
            .write_read(AHT2X_ADDRESS, &[CMD_STATUS], &mut status)
            .await?;
        Ok(status[0])
    }
}

impl<I: I2c, D: DelayNs> Sensor for Aht2x<I, D> {
    type Readings = ClimateReading;

    async fn begin(&mut self) -> Result<(), SensorError> {
        self.ready = false;
        self.delay.delay_ms(POWER_ON_MS).await;

        let status = self
            .status()
            .await
            .map_err(init_failure(SENSOR, "failed to read status"))?;

        if status & STATUS_CALIBRATED == 0 {
            info!("AHT2x not calibrated, sending initialize");
            self.i2c
                .write(AHT2X_ADDRESS, &CMD_INITIALIZE)
                .await
                .map_err(init_failure(SENSOR, "failed to send initialize"))?;
            self.delay.delay_ms(INITIALIZE_MS).await;

            let status = self
                .status()
                .await
                .map_err(init_failure(SENSOR, "failed to read status"))?;
            if status & STATUS_CALIBRATED == 0 {
                error!("AHT2x still uncalibrated (status 0x{:02X})", status);
                return Err(SensorError::InitializationFailed {
                    sensor: SENSOR,
                    details: "calibration bit never set",
                });
            }
        }

        info!("AHT2x ready at 0x{:02X}", AHT2X_ADDRESS);
        self.ready = true;
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.ready
    }

    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        if !self.ready {
            return Err(SensorError::NotInitialized { sensor: SENSOR });
        }

        self.i2c
            .write(AHT2X_ADDRESS, &CMD_TRIGGER)
            .await
            .map_err(read_failure(SENSOR, "trigger measurement"))?;
        self.delay.delay_ms(MEASUREMENT_MS).await;

        let mut frame = [0u8; 7];
        for attempt in 0..=MAX_BUSY_RETRIES {
            if attempt > 0 {
                self.delay.delay_ms(BUSY_RETRY_MS).await;
            }
            self.i2c
                .read(AHT2X_ADDRESS, &mut frame)
                .await
                .map_err(read_failure(SENSOR, "read measurement"))?;
            if frame[0] & STATUS_BUSY == 0 {
                return decode(&frame);
            }
        }

        error!("AHT2x stayed busy after {} retries", MAX_BUSY_RETRIES);
        Err(SensorError::Timeout {
            sensor: SENSOR,
            operation: "wait for measurement",
        })
    }
}

/// Status byte, 20 bits humidity, 20 bits temperature, CRC.
fn decode(frame: &[u8; 7]) -> Result<ClimateReading, SensorError> {
    if crc8(&frame[..6]) != frame[6] {
        error!("AHT2x checksum mismatch on frame {:02X?}", frame);
        return Err(SensorError::ChecksumMismatch { sensor: SENSOR });
    }

    let raw_humidity =
        (u32::from(frame[1]) << 12) | (u32::from(frame[2]) << 4) | (u32::from(frame[3]) >> 4);
    let raw_temperature =
        (u32::from(frame[3] & 0x0F) << 16) | (u32::from(frame[4]) << 8) | u32::from(frame[5]);

    let humidity_milli_percent = ((i64::from(raw_humidity) * 100_000) >> 20) as i32;
    let temperature_milli_celsius = (((i64::from(raw_temperature) * 200_000) >> 20) - 50_000) as i32;

    Ok(ClimateReading {
        temperature_milli_celsius,
        humidity_milli_percent,
    })
}

/// CRC-8, polynomial 0x31, initial value 0xFF.
fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0xFFu8;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}
