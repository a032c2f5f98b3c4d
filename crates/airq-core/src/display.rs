//! OLED readings panel.
//!
//! All drawing targets a RAM framebuffer laid out the way the SSD1306 wants
//! it. Only the pages touched since the last flush go over the bus.

mod framebuffer;
mod ssd1306;

pub use framebuffer::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX, MonoFrameBuffer};
pub use ssd1306::Ssd1306;

use core::fmt::{self, Write};

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_9X15_BOLD};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use heapless::String;

use crate::app_state::{Milli, Sample};
use crate::metrics::AirQualityLevel;
use crate::sensors::Validity;

const LINE_HEIGHT: i32 = 10;
const HEADLINE_HEIGHT: i32 = 16;

type Line = String<32>;

fn line(args: fmt::Arguments<'_>) -> Line {
    let mut text = Line::new();
    // Overflow only truncates the text on screen.
    let _ = text.write_fmt(args);
    text
}

/// Draw a full readings screen.
pub fn render_sample<D>(target: &mut D, sample: &Sample) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let headline = MonoTextStyle::new(&FONT_9X15_BOLD, BinaryColor::On);
    let body = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

    target.clear(BinaryColor::Off)?;

    let label = sample.level().map_or("--", AirQualityLevel::label);
    let aqi = line(format_args!("AQI {} {}", sample.air.aqi, label));
    Text::with_baseline(&aqi, Point::zero(), headline, Baseline::Top).draw(target)?;

    let mut y = HEADLINE_HEIGHT;
    let tvoc = line(format_args!("TVOC {:>5} ppb", sample.air.tvoc_ppb));
    Text::with_baseline(&tvoc, Point::new(0, y), body, Baseline::Top).draw(target)?;
    y += LINE_HEIGHT;

    let eco2 = line(format_args!("eCO2 {:>5} ppm", sample.air.eco2_ppm));
    Text::with_baseline(&eco2, Point::new(0, y), body, Baseline::Top).draw(target)?;
    y += LINE_HEIGHT;

    if let Some(climate) = sample.climate {
        let text = line(format_args!(
            "{:.1}C  {:.1}%RH",
            Milli(climate.temperature_milli_celsius),
            Milli(climate.humidity_milli_percent)
        ));
        Text::with_baseline(&text, Point::new(0, y), body, Baseline::Top).draw(target)?;
        y += LINE_HEIGHT;
    }

    if sample.air.validity != Validity::Normal {
        let text = line(format_args!("[{}]", sample.air.validity.label()));
        Text::with_baseline(&text, Point::new(0, y), body, Baseline::Top).draw(target)?;
    }

    Ok(())
}

/// Draw a two-line status screen (boot progress, faults).
pub fn render_status<D>(target: &mut D, title: &str, detail: &str) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let headline = MonoTextStyle::new(&FONT_9X15_BOLD, BinaryColor::On);
    let body = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

    target.clear(BinaryColor::Off)?;
    Text::with_baseline(title, Point::zero(), headline, Baseline::Top).draw(target)?;
    Text::with_baseline(detail, Point::new(0, HEADLINE_HEIGHT), body, Baseline::Top)
        .draw(target)?;
    Ok(())
}
