//! Register-level models of the peripherals on the airq board.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// A device that can sit on the [`SimulatedBus`](crate::bus::SimulatedBus).
pub trait SimDevice {
    /// Handle one write phase. An empty write is a bare address probe.
    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind>;
    /// Fill `buf` for one read phase.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), ErrorKind>;
}

// ---------------------------------------------------------------------------
// ENS160
// ---------------------------------------------------------------------------

const ENS_OPMODE: u8 = 0x10;
const ENS_COMMAND: u8 = 0x12;
const ENS_TEMP_IN: u8 = 0x13;
const ENS_STATUS: u8 = 0x20;
const ENS_DATA_AQI: u8 = 0x21;
const ENS_GPR_READ: u8 = 0x48;

/// Data reads that report the warm-up validity flag.
const WARM_UP_READS: u32 = 3;

#[derive(Debug)]
pub struct SimEns160 {
    regs: [u8; 256],
    pointer: u8,
    part_id: u16,
    firmware: [u8; 3],
    standard_mode: bool,
    tick: u32,
}

impl SimEns160 {
    pub fn new(part_id: u16) -> Self {
        let mut sensor = Self {
            regs: [0; 256],
            pointer: 0,
            part_id,
            firmware: [5, 4, 6],
            standard_mode: false,
            tick: 0,
        };
        sensor.reset();
        sensor
    }

    fn reset(&mut self) {
        self.regs = [0; 256];
        self.regs[..2].copy_from_slice(&self.part_id.to_le_bytes());
        self.standard_mode = false;
    }

    /// Last TEMP_IN / RH_IN words written by the host.
    pub fn compensation(&self) -> (u16, u16) {
        (
            u16::from_le_bytes([self.regs[0x13], self.regs[0x14]]),
            u16::from_le_bytes([self.regs[0x15], self.regs[0x16]]),
        )
    }

    fn refresh_data(&mut self) {
        let t = f64::from(self.tick);
        let eco2 = (600.0 + 250.0 * (t / 9.0).sin() + 40.0 * (t / 4.0).cos()) as u16;
        let tvoc = (150.0 + 100.0 * (t / 7.0).sin()).max(0.0) as u16;
        let aqi = match eco2 {
            0..600 => 1,
            600..800 => 2,
            800..1000 => 3,
            1000..1500 => 4,
            _ => 5,
        };
        let validity: u8 = if self.tick < WARM_UP_READS { 1 } else { 0 };

        self.regs[usize::from(ENS_STATUS)] = 0x80 | (validity << 2) | 0x02;
        self.regs[usize::from(ENS_DATA_AQI)] = aqi;
        self.regs[0x22..0x24].copy_from_slice(&tvoc.to_le_bytes());
        self.regs[0x24..0x26].copy_from_slice(&eco2.to_le_bytes());
    }

    fn write_register(&mut self, register: u8, value: u8) {
        match (register, value) {
            (ENS_OPMODE, 0xF0) => self.reset(),
            (ENS_OPMODE, mode) => {
                self.regs[usize::from(ENS_OPMODE)] = mode;
                self.standard_mode = mode == 0x02;
                if self.standard_mode {
                    self.refresh_data();
                } else {
                    self.regs[usize::from(ENS_STATUS)] = 0;
                }
            }
            (ENS_COMMAND, 0xCC) => {
                self.regs[usize::from(ENS_GPR_READ)..usize::from(ENS_GPR_READ) + 8].fill(0)
            }
            (ENS_COMMAND, 0x0E) => {
                let start = usize::from(ENS_GPR_READ) + 4;
                self.regs[start..start + 3].copy_from_slice(&self.firmware);
            }
            (register, value) => self.regs[usize::from(register)] = value,
        }
    }
}

impl SimDevice for SimEns160 {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        let Some((&register, data)) = bytes.split_first() else {
            return Ok(());
        };
        self.pointer = register;
        for (offset, &value) in data.iter().enumerate() {
            self.write_register(register.wrapping_add(offset as u8), value);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), ErrorKind> {
        for (offset, byte) in buf.iter_mut().enumerate() {
            *byte = self.regs[usize::from(self.pointer.wrapping_add(offset as u8))];
        }
        if self.pointer == ENS_DATA_AQI && self.standard_mode {
            self.tick += 1;
            self.refresh_data();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AHT2x
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum AhtPending {
    Status,
    Frame([u8; 7]),
}

#[derive(Debug)]
pub struct SimAht2x {
    calibrated: bool,
    pending: AhtPending,
    tick: u32,
}

impl SimAht2x {
    pub fn new(calibrated: bool) -> Self {
        Self {
            calibrated,
            pending: AhtPending::Status,
            tick: 0,
        }
    }

    fn status(&self) -> u8 {
        if self.calibrated { 0x18 } else { 0x10 }
    }

    /// Current simulated climate in milli-units.
    pub fn climate(&self) -> (i32, i32) {
        let t = f64::from(self.tick);
        let temperature = 23.0 + 2.0 * (t / 11.0).sin();
        let humidity = 45.0 + 8.0 * (t / 13.0).cos();
        ((temperature * 1000.0) as i32, (humidity * 1000.0) as i32)
    }

    fn measure(&mut self) -> [u8; 7] {
        let (temperature, humidity) = self.climate();
        self.tick += 1;

        let raw_h = ((i64::from(humidity) << 20) / 100_000).clamp(0, 0xF_FFFF) as u32;
        let raw_t = ((i64::from(temperature + 50_000) << 20) / 200_000).clamp(0, 0xF_FFFF) as u32;

        let mut frame = [
            self.status(),
            (raw_h >> 12) as u8,
            (raw_h >> 4) as u8,
            (((raw_h & 0x0F) << 4) | ((raw_t >> 16) & 0x0F)) as u8,
            (raw_t >> 8) as u8,
            raw_t as u8,
            0,
        ];
        frame[6] = crc8(&frame[..6]);
        frame
    }
}

impl SimDevice for SimAht2x {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        match bytes.first() {
            None => {}
            Some(0x71) => self.pending = AhtPending::Status,
            Some(0xBE) => {
                self.calibrated = true;
                self.pending = AhtPending::Status;
            }
            Some(0xAC) => self.pending = AhtPending::Frame(self.measure()),
            Some(_) => return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), ErrorKind> {
        match &self.pending {
            AhtPending::Status => buf.fill(self.status()),
            AhtPending::Frame(frame) => {
                let len = buf.len().min(frame.len());
                buf[..len].copy_from_slice(&frame[..len]);
            }
        }
        Ok(())
    }
}

fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0xFF, |mut crc, byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x31 } else { crc << 1 };
        }
        crc
    })
}

// ---------------------------------------------------------------------------
// SSD1306
// ---------------------------------------------------------------------------

const OLED_WIDTH: usize = 128;
const OLED_PAGES: usize = 8;

/// SSD1306 GDDRAM model. Understands the addressing commands and ignores the rest.
#[derive(Debug)]
pub struct SimOled {
    ram: [u8; OLED_WIDTH * OLED_PAGES],
    columns: (usize, usize),
    pages: (usize, usize),
    cursor: (usize, usize),
    on: bool,
}

impl Default for SimOled {
    fn default() -> Self {
        Self {
            ram: [0; OLED_WIDTH * OLED_PAGES],
            columns: (0, OLED_WIDTH - 1),
            pages: (0, OLED_PAGES - 1),
            cursor: (0, 0),
            on: false,
        }
    }
}

impl SimOled {
    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.ram[(y / 8) * OLED_WIDTH + x] & (1 << (y % 8)) != 0
    }

    /// Two pixel rows per text line using half blocks.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((OLED_WIDTH + 3) * OLED_PAGES * 4);
        out.push('+');
        out.push_str(&"-".repeat(OLED_WIDTH));
        out.push_str("+\n");
        for y in (0..OLED_PAGES * 8).step_by(2) {
            out.push('|');
            for x in 0..OLED_WIDTH {
                out.push(match (self.pixel(x, y), self.pixel(x, y + 1)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
            }
            out.push_str("|\n");
        }
        out.push('+');
        out.push_str(&"-".repeat(OLED_WIDTH));
        out.push_str("+\n");
        out
    }

    fn commands(&mut self, mut bytes: &[u8]) -> Result<(), ErrorKind> {
        while let Some((&command, rest)) = bytes.split_first() {
            let argc = match command {
                0x21 | 0x22 => 2,
                0x20 | 0x81 | 0x8D | 0xA8 | 0xD3 | 0xD5 | 0xD9 | 0xDA | 0xDB => 1,
                _ => 0,
            };
            if rest.len() < argc {
                return Err(ErrorKind::Other);
            }
            let (args, rest) = rest.split_at(argc);
            match command {
                0x21 => {
                    self.columns = (usize::from(args[0]), usize::from(args[1]).min(OLED_WIDTH - 1));
                    self.cursor.0 = self.columns.0;
                }
                0x22 => {
                    self.pages = (usize::from(args[0]), usize::from(args[1]).min(OLED_PAGES - 1));
                    self.cursor.1 = self.pages.0;
                }
                0xAE => self.on = false,
                0xAF => self.on = true,
                _ => {}
            }
            bytes = rest;
        }
        Ok(())
    }

    fn data(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let (column, page) = self.cursor;
            self.ram[page * OLED_WIDTH + column] = byte;
            if column >= self.columns.1 {
                self.cursor.0 = self.columns.0;
                self.cursor.1 = if page >= self.pages.1 { self.pages.0 } else { page + 1 };
            } else {
                self.cursor.0 = column + 1;
            }
        }
    }
}

impl SimDevice for SimOled {
    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        match bytes.split_first() {
            None => Ok(()),
            Some((0x00, commands)) => self.commands(commands),
            Some((0x40, data)) => {
                self.data(data);
                Ok(())
            }
            Some(_) => Err(ErrorKind::Other),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), ErrorKind> {
        // Status byte: display on/off in bit 6 (inverted).
        buf.fill(if self.on { 0x00 } else { 0x40 });
        Ok(())
    }
}

/// Something that acknowledges its address and nothing more.
#[derive(Debug, Default)]
pub struct SimPlaceholder;

impl SimDevice for SimPlaceholder {
    fn write(&mut self, _bytes: &[u8]) -> Result<(), ErrorKind> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), ErrorKind> {
        buf.fill(0xFF);
        Ok(())
    }
}
