//! Minimal SSD1306 transport over async I2C.

use embedded_hal_async::i2c::I2c;
use log::debug;

use super::framebuffer::{DISPLAY_WIDTH_PX, MonoFrameBuffer};

const CONTROL_COMMAND: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;

/// Bytes of pixel data per I2C write.
const DATA_CHUNK: usize = 16;

/// Power-up sequence for a 128x64 panel with the internal charge pump.
const INIT_SEQUENCE: [u8; 26] = [
    CONTROL_COMMAND,
    0xAE, // display off
    0xD5, 0x80, // clock divide
    0xA8, 0x3F, // multiplex 64
    0xD3, 0x00, // no display offset
    0x40, // start line 0
    0x8D, 0x14, // charge pump on
    0x20, 0x00, // horizontal addressing
    0xA1, // segment remap
    0xC8, // COM scan descending
    0xDA, 0x12, // COM pins
    0x81, 0xCF, // contrast
    0xD9, 0xF1, // pre-charge
    0xDB, 0x40, // VCOMH deselect
    0xA4, // follow RAM
    0xA6, // not inverted
    0xAF, // display on
];

pub struct Ssd1306<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Ssd1306<I> {
    pub const fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    pub async fn init(&mut self) -> Result<(), I::Error> {
        self.i2c.write(self.address, &INIT_SEQUENCE).await
    }

    /// Push the changed pages of `fb` to the panel.
    ///
    /// Returns `false` without touching the bus when nothing changed. The
    /// buffer is only marked clean once every write went through, so a failed
    /// flush is retried in full next time.
    pub async fn flush(&mut self, fb: &mut MonoFrameBuffer) -> Result<bool, I::Error> {
        let Some((pages, bytes)) = fb.dirty() else {
            return Ok(false);
        };
        debug!("SSD1306 flushing pages {}..={}", pages.first, pages.last);

        let window = [
            CONTROL_COMMAND,
            0x21, // column range
            0,
            (DISPLAY_WIDTH_PX - 1) as u8,
            0x22, // page range
            pages.first as u8,
            pages.last as u8,
        ];
        self.i2c.write(self.address, &window).await?;

        let mut frame = [0u8; DATA_CHUNK + 1];
        frame[0] = CONTROL_DATA;
        for chunk in bytes.chunks(DATA_CHUNK) {
            frame[1..=chunk.len()].copy_from_slice(chunk);
            self.i2c.write(self.address, &frame[..=chunk.len()]).await?;
        }
        fb.mark_clean();
        Ok(true)
    }

    pub fn release(self) -> I {
        self.i2c
    }
}
