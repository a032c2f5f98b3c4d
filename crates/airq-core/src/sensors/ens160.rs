use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{error, info, warn};

use super::{
    AirQualityReading, AirQualitySensor, ClimateReading, Sensor, SensorError, Validity,
    init_failure, read_failure,
};

/// ENS160 address with ADDR tied low.
pub const ENS160_ADDRESS_LOW: u8 = 0x52;
/// ENS160 address with ADDR tied high.
pub const ENS160_ADDRESS_HIGH: u8 = 0x53;

const SENSOR: &str = "ENS160";
const PART_ID: u16 = 0x0160;

const REG_PART_ID: u8 = 0x00;
const REG_OPMODE: u8 = 0x10;
const REG_COMMAND: u8 = 0x12;
const REG_TEMP_IN: u8 = 0x13;
const REG_DEVICE_STATUS: u8 = 0x20;
const REG_DATA_AQI: u8 = 0x21;
const REG_GPR_READ_4: u8 = 0x4C;

const OPMODE_IDLE: u8 = 0x01;
const OPMODE_STANDARD: u8 = 0x02;
const OPMODE_RESET: u8 = 0xF0;

const COMMAND_GET_APPVER: u8 = 0x0E;
const COMMAND_CLEAR_GPR: u8 = 0xCC;

const STATUS_ERROR: u8 = 1 << 6;
const STATUS_NEW_DATA: u8 = 1 << 1;

const SETTLE_MS: u32 = 10;
const DATA_POLL_INTERVAL_MS: u32 = 100;
const MAX_DATA_POLLS: u8 = 15;

/// ENS160 application firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub release: u8,
}

/// ScioSense ENS160 digital metal-oxide gas sensor.
pub struct Ens160<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    firmware: Option<FirmwareVersion>,
}

impl<I: I2c, D: DelayNs> Ens160<I, D> {
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            firmware: None,
        }
    }

    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Firmware version read during `begin`.
    pub const fn firmware(&self) -> Option<FirmwareVersion> {
        self.firmware
    }

    /// Give back the bus handle and delay.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), I::Error> {
        self.i2c.write(self.address, &[register, value]).await
    }

    async fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<(), I::Error> {
        self.i2c.write_read(self.address, &[register], buf).await
    }

    async fn set_mode(&mut self, mode: u8) -> Result<(), SensorError> {
        self.write_register(REG_OPMODE, mode)
            .await
            .map_err(init_failure(SENSOR, "failed to set operating mode"))?;
        self.delay.delay_ms(SETTLE_MS).await;
        Ok(())
    }

    async fn command(&mut self, command: u8) -> Result<(), SensorError> {
        self.write_register(REG_COMMAND, command)
            .await
            .map_err(init_failure(SENSOR, "failed to issue command"))?;
        self.delay.delay_ms(SETTLE_MS).await;
        Ok(())
    }

    async fn wait_for_new_data(&mut self) -> Result<u8, SensorError> {
        for _ in 0..MAX_DATA_POLLS {
            let mut status = [0u8; 1];
            self.read_registers(REG_DEVICE_STATUS, &mut status)
                .await
                .map_err(read_failure(SENSOR, "read device status"))?;
            let status = status[0];

            if status & STATUS_ERROR != 0 {
                error!("ENS160 status 0x{:02X} flags an error", status);
                return Err(SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation: "read device status",
                    details: "device reports an error condition",
                });
            }
            if status & STATUS_NEW_DATA != 0 {
                return Ok(status);
            }
            self.delay.delay_ms(DATA_POLL_INTERVAL_MS).await;
        }

        error!("ENS160 produced no new data after {} polls", MAX_DATA_POLLS);
        Err(SensorError::Timeout {
            sensor: SENSOR,
            operation: "wait for new data",
        })
    }
}

impl<I: I2c, D: DelayNs> Sensor for Ens160<I, D> {
    type Readings = AirQualityReading;

    async fn begin(&mut self) -> Result<(), SensorError> {
        self.firmware = None;
        self.set_mode(OPMODE_RESET).await?;

        let mut id = [0u8; 2];
        self.read_registers(REG_PART_ID, &mut id)
            .await
            .map_err(init_failure(SENSOR, "failed to read part id"))?;
        let part_id = u16::from_le_bytes(id);
        if part_id != PART_ID {
            error!("ENS160 at 0x{:02X} answered with part id 0x{:04X}", self.address, part_id);
            return Err(SensorError::UnexpectedPartId {
                sensor: SENSOR,
                expected: PART_ID,
                found: part_id,
            });
        }

        self.set_mode(OPMODE_IDLE).await?;
        self.command(COMMAND_CLEAR_GPR).await?;
        self.command(COMMAND_GET_APPVER).await?;

        let mut version = [0u8; 3];
        self.read_registers(REG_GPR_READ_4, &mut version)
            .await
            .map_err(init_failure(SENSOR, "failed to read firmware version"))?;

        self.set_mode(OPMODE_STANDARD).await?;

        let firmware = FirmwareVersion {
            major: version[0],
            minor: version[1],
            release: version[2],
        };
        info!(
            "ENS160 ready at 0x{:02X}, firmware {}.{}.{}",
            self.address, firmware.major, firmware.minor, firmware.release
        );
        self.firmware = Some(firmware);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.firmware.is_some()
    }

    async fn read(&mut self) -> Result<AirQualityReading, SensorError> {
        if !self.is_available() {
            return Err(SensorError::NotInitialized { sensor: SENSOR });
        }

        let status = self.wait_for_new_data().await?;

        // AQI, TVOC (LE) and eCO2 (LE) are contiguous.
        let mut data = [0u8; 5];
        self.read_registers(REG_DATA_AQI, &mut data)
            .await
            .map_err(read_failure(SENSOR, "read measurement data"))?;

        let validity = Validity::from_status(status);
        if validity != Validity::Normal {
            warn!("ENS160 data validity: {}", validity.label());
        }

        Ok(AirQualityReading {
            aqi: data[0] & 0x07,
            tvoc_ppb: u16::from_le_bytes([data[1], data[2]]),
            eco2_ppm: u16::from_le_bytes([data[3], data[4]]),
            validity,
        })
    }
}

impl<I: I2c, D: DelayNs> AirQualitySensor for Ens160<I, D> {
    async fn compensate(&mut self, climate: &ClimateReading) -> Result<(), SensorError> {
        if !self.is_available() {
            return Err(SensorError::NotInitialized { sensor: SENSOR });
        }

        let temperature = temperature_word(climate.temperature_milli_celsius).to_le_bytes();
        let humidity = humidity_word(climate.humidity_milli_percent).to_le_bytes();
        // TEMP_IN and RH_IN are adjacent, so one burst covers both.
        let frame = [REG_TEMP_IN, temperature[0], temperature[1], humidity[0], humidity[1]];
        self.i2c
            .write(self.address, &frame)
            .await
            .map_err(read_failure(SENSOR, "write compensation"))
    }
}

/// Kelvin in 1/64 K steps.
fn temperature_word(milli_celsius: i32) -> u16 {
    let milli_kelvin = i64::from(milli_celsius) + 273_150;
    (milli_kelvin * 64 / 1000).clamp(0, i64::from(u16::MAX)) as u16
}

/// Relative humidity in 1/512 % steps.
fn humidity_word(milli_percent: i32) -> u16 {
    let clamped = i64::from(milli_percent.clamp(0, 100_000));
    (clamped * 512 / 1000) as u16
}
