//! # Text Layout
//!
//! String formatting and horizontal placement for the time, date and weather
//! rows. Everything here is pure arithmetic over measured widths; nothing
//! touches a draw target.
//!
//! ## Centering
//! A row is a list of [`Span`]s. Their widths are summed, the row starts at
//! `center_x - total / 2`, and each span is placed at the cursor, which then
//! advances by that span's width. A span that is hidden this frame (the
//! blinking colon) keeps its slot so the digits never shift.
//!
//! ## Formatting
//! - 24-hour clock: hours zero-padded to two digits (`"00"`..`"23"`)
//! - 12-hour clock: hour 0 and 12 read `"12"`, no leading zero, plus AM/PM
//! - Date: `"TUE, MAR 5 2024"` from fixed English tables, never the locale

use crate::{ClockReading, DisplayMode};
use chrono::Weekday;
use embedded_graphics::{
    mono_font::MonoTextStyle,
    prelude::*,
    text::{renderer::TextRenderer, Baseline},
};

pub const COLON: &str = ":";

/// Interactive colon blink period; the colon shows for the first half.
const BLINK_PERIOD_MS: i64 = 1000;
const BLINK_ON_MS: i64 = 500;

/// Measures rendered string widths for one font/style.
///
/// Widths must depend only on the string and the style.
pub trait TextMeasure {
    fn width(&self, text: &str) -> f32;

    /// Nominal line height, used to step from one row to the next.
    fn line_height(&self) -> f32;
}

impl<C: PixelColor> TextMeasure for MonoTextStyle<'_, C> {
    fn width(&self, text: &str) -> f32 {
        self.measure_string(text, Point::zero(), Baseline::Alphabetic)
            .next_position
            .x as f32
    }

    fn line_height(&self) -> f32 {
        self.font.character_size.height as f32
    }
}

/// What a piece of text is, so the painter can pick its style.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextRole {
    Hour,
    Colon,
    Minute,
    AmPm,
    Date,
    HighTemp,
    LowTemp,
}

/// One measured piece of a row.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub role: TextRole,
    pub text: String,
    pub width: f32,
    /// Hidden spans still occupy `width`
    pub visible: bool,
}

impl Span {
    pub fn new(role: TextRole, text: impl Into<String>, width: f32) -> Self {
        Span {
            role,
            text: text.into(),
            width,
            visible: true,
        }
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.visible = !hidden;
        self
    }
}

/// A span with its left edge resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedSpan {
    pub span: Span,
    pub x: f32,
}

pub fn total_width(spans: &[Span]) -> f32 {
    spans.iter().map(|s| s.width).sum()
}

/// Left edge of a block of `total` width centered on `center_x`.
pub fn center_start(center_x: f32, total: f32) -> f32 {
    center_x - total / 2.0
}

/// Place `spans` left-to-right so the whole row is centered on `center_x`.
pub fn center_row(center_x: f32, spans: Vec<Span>) -> Vec<PlacedSpan> {
    let mut x = center_start(center_x, total_width(&spans));
    spans
        .into_iter()
        .map(|span| {
            let placed = PlacedSpan { x, span };
            x += placed.span.width;
            placed
        })
        .collect()
}

pub fn format_hour(hour: u32, use_24_hour: bool) -> String {
    if use_24_hour {
        format!("{:02}", hour)
    } else {
        let hour = hour % 12;
        if hour == 0 {
            "12".to_string()
        } else {
            hour.to_string()
        }
    }
}

pub fn format_minute(minute: u32) -> String {
    format!("{:02}", minute)
}

pub fn am_pm_label(is_pm: bool) -> &'static str {
    if is_pm {
        "PM"
    } else {
        "AM"
    }
}

/// Whether the blinking colon is drawn at `epoch_millis`.
///
/// Ambient mode redraws once a minute, so the colon stays on there.
pub fn colon_visible(epoch_millis: i64, mode: DisplayMode) -> bool {
    mode.is_ambient() || epoch_millis.rem_euclid(BLINK_PERIOD_MS) < BLINK_ON_MS
}

pub fn weekday_abbrev(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sun => "sun",
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
    }
}

/// Three-letter month name for a 1-based month; `"n/a"` outside 1-12.
pub fn month_abbrev(month: u32) -> &'static str {
    match month {
        1 => "jan",
        2 => "feb",
        3 => "mar",
        4 => "apr",
        5 => "may",
        6 => "jun",
        7 => "jul",
        8 => "aug",
        9 => "sep",
        10 => "oct",
        11 => "nov",
        12 => "dec",
        _ => "n/a",
    }
}

pub fn date_label(reading: &ClockReading) -> String {
    format!(
        "{}, {} {} {}",
        weekday_abbrev(reading.weekday),
        month_abbrev(reading.month),
        reading.day,
        reading.year
    )
    .to_uppercase()
}

/// Measures for each segment of the time row.
pub struct TimeRowStyles<'a> {
    pub hour: &'a dyn TextMeasure,
    pub minute: &'a dyn TextMeasure,
    pub am_pm: &'a dyn TextMeasure,
    /// Cached width of [`COLON`] in the time font
    pub colon_width: f32,
}

/// Build the hour / colon / minute / am-pm spans for one frame.
pub fn time_row(
    reading: &ClockReading,
    use_24_hour: bool,
    mode: DisplayMode,
    styles: &TimeRowStyles<'_>,
) -> Vec<Span> {
    let hour = format_hour(reading.hour, use_24_hour);
    let minute = format_minute(reading.minute);

    let hour_width = styles.hour.width(&hour);
    let minute_width = styles.minute.width(&minute);

    let mut spans = vec![
        Span::new(TextRole::Hour, hour, hour_width),
        Span::new(TextRole::Colon, COLON, styles.colon_width)
            .hidden(!colon_visible(reading.epoch_millis, mode)),
        Span::new(TextRole::Minute, minute, minute_width),
    ];

    if !use_24_hour {
        let label = am_pm_label(reading.is_pm);
        spans.push(Span::new(TextRole::AmPm, label, styles.am_pm.width(label)));
    }
    spans
}
