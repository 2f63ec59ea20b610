//! # Watch Face Rendering
//!
//! Produces one complete frame from the clock reading, display mode and the
//! cached weather snapshot. Rendering is split in two:
//!
//! 1. [`FaceRenderer::layout`] turns the frame inputs into an ordered list of
//!    [`DrawOp`]s with concrete pixel positions. Pure, so tests assert on
//!    geometry without decoding pixels.
//! 2. [`FaceRenderer::paint`] executes the ops on any `Rgb565` `DrawTarget`.
//!
//! ## Frame Order
//! 1. Background: black in ambient mode, theme colour otherwise
//! 2. Time row (hour, blinking colon, minute, AM/PM) centered at `y_offset`
//! 3. Uppercase date one time-font line below
//! 4. Divider, four colon widths long, centered
//! 5. Weather row: icon (interactive only), high, low
//!
//! Step 5 is skipped while no snapshot with both temperatures exists, so a
//! fresh face renders cleanly before the first sync push.

use crate::layout::{self, center_row, center_start, Span, TextMeasure, TextRole, TimeRowStyles};
use crate::style::{FaceMetrics, FaceStyle};
use crate::{ClockReading, DisplayMode, IconBitmap, WeatherIcon, WeatherSnapshot, ICON_SIZE};
use embedded_graphics::{
    mono_font::MonoTextStyle,
    pixelcolor::Rgb565,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Baseline, Text},
};

/// The icon's bottom edge sits this far below the temperature baseline.
const ICON_BASELINE_DROP: f32 = 20.0;

/// Everything that varies from frame to frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    pub reading: ClockReading,
    pub mode: DisplayMode,
    pub use_24_hour: bool,
    pub weather: Option<&'a WeatherSnapshot>,
    /// Size of the surface being drawn
    pub size: Size,
}

/// One positioned drawing instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp<'a> {
    Background,
    /// `position` is the left end of the text baseline
    Text {
        role: TextRole,
        text: String,
        position: Point,
    },
    Divider {
        start: Point,
        end: Point,
    },
    Icon {
        icon: WeatherIcon,
        bitmap: &'a IconBitmap,
        top_left: Point,
    },
}

/// Renderer configured for one screen shape.
#[derive(Clone, Copy, Debug)]
pub struct FaceRenderer {
    metrics: FaceMetrics,
    y_offset: f32,
}

fn to_point(x: f32, y: f32) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

impl FaceRenderer {
    /// `y_offset` is the baseline of the time row.
    pub fn new(metrics: FaceMetrics, y_offset: f32) -> Self {
        Self { metrics, y_offset }
    }

    pub fn metrics(&self) -> &FaceMetrics {
        &self.metrics
    }

    pub fn layout<'a>(&self, frame: &FrameInput<'a>) -> Vec<DrawOp<'a>> {
        let m = &self.metrics;
        let center_x = frame.size.width as f32 / 2.0;
        let mut ops = vec![DrawOp::Background];

        // Time row
        let hour = m.measure(TextRole::Hour);
        let minute = m.measure(TextRole::Minute);
        let am_pm = m.measure(TextRole::AmPm);
        let styles = TimeRowStyles {
            hour: &hour,
            minute: &minute,
            am_pm: &am_pm,
            colon_width: m.colon_width,
        };
        let mut y = self.y_offset;
        let spans = layout::time_row(&frame.reading, frame.use_24_hour, frame.mode, &styles);
        for placed in center_row(center_x, spans) {
            if placed.span.visible {
                ops.push(DrawOp::Text {
                    role: placed.span.role,
                    text: placed.span.text,
                    position: to_point(placed.x, y),
                });
            }
        }

        // Date
        let date_measure = m.measure(TextRole::Date);
        let date = layout::date_label(&frame.reading);
        y += hour.line_height();
        ops.push(DrawOp::Text {
            role: TextRole::Date,
            position: to_point(center_start(center_x, date_measure.width(&date)), y),
            text: date,
        });

        // Divider
        y += date_measure.line_height();
        let x = center_x - m.colon_width * 2.0;
        ops.push(DrawOp::Divider {
            start: to_point(x, y),
            end: to_point(x + m.colon_width * 4.0, y),
        });

        // Weather
        let Some(weather) = frame.weather.filter(|w| w.has_temperatures()) else {
            return ops;
        };
        y += date_measure.line_height() * 2.0;
        let temp = m.measure(TextRole::HighTemp);
        let high_width = temp.width(&weather.high);
        let low_width = temp.width(&weather.low);
        let icon_size = ICON_SIZE as f32;

        let mut x = center_x - icon_size / 2.0 - m.colon_width - high_width / 2.0 - low_width / 2.0;
        let icon_advance = icon_size + m.colon_width;
        match (&weather.bitmap, frame.mode) {
            (Some(bitmap), DisplayMode::Interactive) => {
                ops.push(DrawOp::Icon {
                    icon: weather.icon,
                    bitmap,
                    top_left: to_point(x, y - (icon_size - ICON_BASELINE_DROP)),
                });
                x += icon_advance;
            }
            // No icon slot: shift so the temperatures stay centered
            _ => x += icon_advance / 2.0,
        }

        let row = [
            Span::new(TextRole::HighTemp, weather.high.clone(), high_width),
            Span::new(TextRole::LowTemp, weather.low.clone(), low_width),
        ];
        for span in row {
            ops.push(DrawOp::Text {
                role: span.role,
                position: to_point(x, y),
                text: span.text,
            });
            x += span.width + m.colon_width;
        }

        ops
    }

    pub fn paint<D>(&self, ops: &[DrawOp<'_>], style: &FaceStyle, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        for op in ops {
            match op {
                DrawOp::Background => target.clear(style.background.effective_color())?,
                DrawOp::Text {
                    role,
                    text,
                    position,
                } => {
                    let font = self.metrics.font_for_role(*role);
                    let text_style = MonoTextStyle::new(font, style.for_role(*role).effective_color());
                    Text::with_baseline(text, *position, text_style, Baseline::Alphabetic).draw(target)?;
                }
                DrawOp::Divider { start, end } => {
                    Line::new(*start, *end)
                        .into_styled(PrimitiveStyle::with_stroke(
                            style.divider.effective_color(),
                            self.metrics.divider_stroke,
                        ))
                        .draw(target)?;
                }
                DrawOp::Icon {
                    bitmap, top_left, ..
                } => bitmap.draw(target, *top_left)?,
            }
        }
        Ok(())
    }

    /// Lay out and paint one frame.
    pub fn render<D>(&self, frame: &FrameInput<'_>, style: &FaceStyle, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let ops = self.layout(frame);
        self.paint(&ops, style, target)
    }
}
