//! Monochrome framebuffer with dirty page tracking.

use core::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

pub const DISPLAY_WIDTH_PX: u32 = 128;
pub const DISPLAY_HEIGHT_PX: u32 = 64;

const WIDTH: usize = DISPLAY_WIDTH_PX as usize;
const HEIGHT: usize = DISPLAY_HEIGHT_PX as usize;
/// One page is a horizontal strip 8 pixels tall, one byte per column.
pub(crate) const PAGE_COUNT: usize = HEIGHT / 8;
pub(crate) const BUFFER_LEN: usize = WIDTH * PAGE_COUNT;

/// Span of pages that changed since the last flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DirtyPages {
    pub first: usize,
    pub last: usize,
}

impl DirtyPages {
    fn expand(&mut self, page: usize) {
        self.first = self.first.min(page);
        self.last = self.last.max(page);
    }
}

/// 128x64 `DrawTarget<Color = BinaryColor>` stored in SSD1306 page order.
///
/// Byte `page * 128 + x` holds rows `page * 8 ..= page * 8 + 7` of column
/// `x`, least significant bit on top.
pub struct MonoFrameBuffer {
    pixels: [u8; BUFFER_LEN],
    dirty: Option<DirtyPages>,
}

impl Default for MonoFrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MonoFrameBuffer {
    /// A blank buffer. It starts dirty so the first flush wipes the panel.
    pub const fn new() -> Self {
        Self {
            pixels: [0; BUFFER_LEN],
            dirty: Some(DirtyPages {
                first: 0,
                last: PAGE_COUNT - 1,
            }),
        }
    }

    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: BinaryColor) {
        let page = y / 8;
        let idx = page * WIDTH + x;
        let mask = 1u8 << (y % 8);
        let byte = match color {
            BinaryColor::On => self.pixels[idx] | mask,
            BinaryColor::Off => self.pixels[idx] & !mask,
        };
        if byte != self.pixels[idx] {
            self.pixels[idx] = byte;
            match &mut self.dirty {
                Some(pages) => pages.expand(page),
                None => self.dirty = Some(DirtyPages { first: page, last: page }),
            }
        }
    }

    /// Whether the pixel at (`x`, `y`) is lit. Out-of-range reads are dark.
    pub fn pixel(&self, x: u32, y: u32) -> bool {
        let (x, y) = (x as usize, y as usize);
        if x >= WIDTH || y >= HEIGHT {
            return false;
        }
        self.pixels[(y / 8) * WIDTH + x] & (1 << (y % 8)) != 0
    }

    pub const fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// The dirty span and the bytes it covers. The buffer stays dirty until
    /// [`MonoFrameBuffer::mark_clean`] is called.
    pub(crate) fn dirty(&self) -> Option<(DirtyPages, &[u8])> {
        let pages = self.dirty?;
        let bytes = &self.pixels[pages.first * WIDTH..(pages.last + 1) * WIDTH];
        Some((pages, bytes))
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = None;
    }
}

impl OriginDimensions for MonoFrameBuffer {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX)
    }
}

impl DrawTarget for MonoFrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            let x = coord.x;
            let y = coord.y;
            if x >= 0 && y >= 0 && (x as usize) < WIDTH && (y as usize) < HEIGHT {
                self.set_pixel(x as usize, y as usize, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let clip = |start: i32, len: u32, limit: usize| {
            let start = i64::from(start);
            let end = start + i64::from(len);
            let limit = limit as i64;
            (start.clamp(0, limit) as usize, end.clamp(0, limit) as usize)
        };
        let (x_start, x_end) = clip(area.top_left.x, area.size.width, WIDTH);
        let (y_start, y_end) = clip(area.top_left.y, area.size.height, HEIGHT);

        for y in y_start..y_end {
            for x in x_start..x_end {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }
}
