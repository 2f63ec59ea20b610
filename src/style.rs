//! # Paint Styles and Face Metrics
//!
//! Two pure resolutions used by the renderer:
//!
//! - [`FaceStyle::resolve`]: {display mode, device capabilities} → colour and
//!   anti-aliasing per text role. Recomputed on every mode or properties change
//!   instead of toggling flags on shared paints.
//! - [`FaceMetrics::for_shape`]: round or rectangular screen → fonts, divider
//!   stroke and the cached colon width. Resolved once per insets change.
//!
//! ## Low-bit ambient
//! Mono fonts have no coverage values to anti-alias, so on this target
//! "anti-aliasing off" means the panel only gets pure black and white: every
//! paint with `anti_alias == false` snaps its colour to the nearer of the two.

use crate::layout::{TextMeasure, TextRole, COLON};
use crate::{Capabilities, DisplayMode};
use embedded_graphics::{
    mono_font::{
        ascii::{FONT_6X10, FONT_7X13},
        MonoFont, MonoTextStyle,
    },
    pixelcolor::Rgb565,
    prelude::*,
};

/// Theme background, `#03A9F4`
pub const PRIMARY: Rgb565 = Rgb565::new(0, 42, 30);
/// Secondary text, `#B3E5FC`
pub const PRIMARY_LIGHT: Rgb565 = Rgb565::new(22, 57, 31);
/// Low temperature text, `#E1F5FE`
pub const FORECAST_LOW: Rgb565 = Rgb565::new(28, 61, 31);

/// Luma above which a low-bit pixel is drawn white (0-255 scale).
const LOW_BIT_THRESHOLD: u32 = 128;

/// A colour plus whether intermediate shades may be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paint {
    pub color: Rgb565,
    pub anti_alias: bool,
}

impl Paint {
    /// The colour actually sent to the panel.
    pub fn effective_color(&self) -> Rgb565 {
        if self.anti_alias {
            self.color
        } else if luma(self.color) >= LOW_BIT_THRESHOLD {
            Rgb565::WHITE
        } else {
            Rgb565::BLACK
        }
    }
}

fn luma(color: Rgb565) -> u32 {
    let r = color.r() as u32 * 255 / Rgb565::MAX_R as u32;
    let g = color.g() as u32 * 255 / Rgb565::MAX_G as u32;
    let b = color.b() as u32 * 255 / Rgb565::MAX_B as u32;
    (299 * r + 587 * g + 114 * b) / 1000
}

/// All paints used by one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceStyle {
    pub background: Paint,
    pub hour: Paint,
    pub colon: Paint,
    pub minute: Paint,
    pub am_pm: Paint,
    pub date: Paint,
    pub divider: Paint,
    pub high_temp: Paint,
    pub low_temp: Paint,
}

impl FaceStyle {
    pub fn resolve(mode: DisplayMode, capabilities: Capabilities) -> Self {
        let anti_alias = !(mode.is_ambient() && capabilities.low_bit_ambient);
        let paint = |color| Paint { color, anti_alias };

        FaceStyle {
            background: paint(if mode.is_ambient() { Rgb565::BLACK } else { PRIMARY }),
            hour: paint(Rgb565::WHITE),
            colon: paint(Rgb565::WHITE),
            minute: paint(Rgb565::WHITE),
            am_pm: paint(PRIMARY_LIGHT),
            date: paint(PRIMARY_LIGHT),
            divider: paint(PRIMARY_LIGHT),
            high_temp: paint(Rgb565::WHITE),
            low_temp: paint(FORECAST_LOW),
        }
    }

    pub fn anti_alias(&self) -> bool {
        self.hour.anti_alias
    }

    pub fn for_role(&self, role: TextRole) -> Paint {
        match role {
            TextRole::Hour => self.hour,
            TextRole::Colon => self.colon,
            TextRole::Minute => self.minute,
            TextRole::AmPm => self.am_pm,
            TextRole::Date => self.date,
            TextRole::HighTemp => self.high_temp,
            TextRole::LowTemp => self.low_temp,
        }
    }
}

/// Screen shape reported by the host's insets callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Round,
    Rectangular,
}

/// Fonts and fixed sizes for one screen shape.
#[derive(Clone, Copy, Debug)]
pub struct FaceMetrics {
    pub shape: Shape,
    pub time_font: &'static MonoFont<'static>,
    pub am_pm_font: &'static MonoFont<'static>,
    pub date_font: &'static MonoFont<'static>,
    pub temp_font: &'static MonoFont<'static>,
    pub divider_stroke: u32,
    /// Width of [`COLON`] in the time font, measured once
    pub colon_width: f32,
}

impl FaceMetrics {
    /// Round screens get larger digits and a thinner divider.
    pub fn for_shape(shape: Shape) -> Self {
        let (time_font, am_pm_font, temp_font, divider_stroke) = match shape {
            Shape::Round => (
                &profont::PROFONT_24_POINT,
                &profont::PROFONT_12_POINT,
                &profont::PROFONT_18_POINT,
                1,
            ),
            Shape::Rectangular => (
                &profont::PROFONT_18_POINT,
                &profont::PROFONT_10_POINT,
                &profont::PROFONT_14_POINT,
                2,
            ),
        };
        let date_font = match shape {
            Shape::Round => &FONT_7X13,
            Shape::Rectangular => &FONT_6X10,
        };
        let colon_width = MonoTextStyle::new(time_font, Rgb565::WHITE).width(COLON);

        FaceMetrics {
            shape,
            time_font,
            am_pm_font,
            date_font,
            temp_font,
            divider_stroke,
            colon_width,
        }
    }

    pub fn font_for_role(&self, role: TextRole) -> &'static MonoFont<'static> {
        match role {
            TextRole::Hour | TextRole::Colon | TextRole::Minute => self.time_font,
            TextRole::AmPm => self.am_pm_font,
            TextRole::Date => self.date_font,
            TextRole::HighTemp | TextRole::LowTemp => self.temp_font,
        }
    }

    /// Measuring style for `role`; colour is irrelevant to width.
    pub fn measure(&self, role: TextRole) -> MonoTextStyle<'static, Rgb565> {
        MonoTextStyle::new(self.font_for_role(role), Rgb565::WHITE)
    }
}
