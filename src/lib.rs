//! # Sunshine Watch Face Core Library
//!
//! This library provides the data structures, layout arithmetic and state machine
//! for a digital weather watch face. The face shows the time, the date and the
//! current forecast (condition icon plus high/low temperature) pushed from a
//! companion device over a key/value sync channel.
//!
//! ## Design Philosophy
//!
//! ### Host Independence
//! - **Any surface**: rendering targets any `embedded_graphics::DrawTarget` with
//!   `Rgb565` colour, so the same face runs on a panel driver, an in-memory
//!   [`framebuffer::Framebuffer`] or a `MockDisplay` in tests
//! - **Framework as traits**: the hosting framework ([`engine::FaceHost`]), the
//!   sync transport ([`sync::DataClient`]) and timers ([`scheduler::Scheduler`])
//!   are seams, so the engine is driven deterministically in tests
//!
//! ### Single Thread of Control
//! Every callback (timer fires, data pushes, connection results, time ticks) is
//! an [`engine::EngineEvent`] dispatched one at a time by the loop in
//! [`runtime`]. No locks are needed; the cached [`WeatherSnapshot`] is replaced
//! wholesale, never partially mutated.
//!
//! ### Data Flow
//! 1. **Lifecycle**: visibility connects the sync channel and starts the blink timer
//! 2. **Sync**: a `/weather` push replaces the cached snapshot
//! 3. **Render**: clock + snapshot → [`renderer::DrawOp`] list → pixels
//!
//! ## Core Types
//!
//! - [`ClockReading`]: calendar fields for one frame, recomputed every draw
//! - [`WeatherSnapshot`]: the last accepted forecast push
//! - [`DisplayMode`] and [`Capabilities`]: what the device is doing and can do

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};

// Module declarations
pub mod clock;
pub mod config;
pub mod engine;
pub mod framebuffer;
pub mod layout;
pub mod renderer;
pub mod runtime;
pub mod scheduler;
pub mod spool;
pub mod style;
pub mod sync;
pub mod weather_icon;

pub use weather_icon::{IconBitmap, WeatherIcon, ICON_SIZE};

/// Whether the device is fully awake or in its low-power ambient state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    Interactive,
    Ambient,
}

impl DisplayMode {
    pub fn from_ambient(in_ambient: bool) -> Self {
        if in_ambient {
            DisplayMode::Ambient
        } else {
            DisplayMode::Interactive
        }
    }

    pub fn is_ambient(self) -> bool {
        self == DisplayMode::Ambient
    }
}

/// Device constraints reported by the host's properties-changed callback.
///
/// - `low_bit_ambient`: the panel cannot show intermediate colours in ambient
///   mode, so anti-aliasing must be turned off
/// - `burn_in_protection`: avoid static bright content in ambient mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub low_bit_ambient: bool,
    pub burn_in_protection: bool,
}

/// Calendar fields for one rendered frame.
///
/// A reading carries no identity: it is derived from wall-clock milliseconds
/// and the current time-zone offset every time the face is drawn.
///
/// # Example
/// ```
/// use chrono::{FixedOffset, Weekday};
/// use watchface_lib::ClockReading;
///
/// // 2024-03-05 13:07:00.250 UTC
/// let reading = ClockReading::from_millis(1_709_644_020_250, FixedOffset::east_opt(0).unwrap());
/// assert_eq!(reading.hour, 13);
/// assert_eq!(reading.minute, 7);
/// assert!(reading.is_pm);
/// assert_eq!(reading.weekday, Weekday::Tue);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockReading {
    /// Hour of day, 0-23
    pub hour: u32,
    /// Minute of hour, 0-59
    pub minute: u32,
    /// True from 12:00 to 23:59
    pub is_pm: bool,
    pub weekday: Weekday,
    /// Month of year, 1-12
    pub month: u32,
    /// Day of month, 1-31
    pub day: u32,
    pub year: i32,
    /// Wall-clock instant the reading was taken from
    pub epoch_millis: i64,
}

impl ClockReading {
    pub fn from_millis(epoch_millis: i64, offset: FixedOffset) -> Self {
        let utc: DateTime<Utc> = DateTime::from_timestamp_millis(epoch_millis).unwrap_or_default();
        Self::from_datetime(&utc.with_timezone(&offset), epoch_millis)
    }

    fn from_datetime(local: &DateTime<FixedOffset>, epoch_millis: i64) -> Self {
        let (is_pm, _) = local.hour12();
        ClockReading {
            hour: local.hour(),
            minute: local.minute(),
            is_pm,
            weekday: local.weekday(),
            month: local.month(),
            day: local.day(),
            year: local.year(),
            epoch_millis,
        }
    }
}

/// The most recent forecast accepted from the companion device.
///
/// Created from a `/weather` push by [`sync::apply_data_events`]. The icon is
/// resolved from the condition code and its bitmap scaled to [`ICON_SIZE`]
/// once, at construction, so rendering never rasterizes glyphs.
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherSnapshot {
    /// Meteorological condition code (e.g. 800 = clear sky)
    pub condition_code: i32,
    /// High temperature label, may include a degree glyph
    pub high: String,
    /// Low temperature label, may include a degree glyph
    pub low: String,
    pub icon: WeatherIcon,
    /// `None` when the condition code maps to no icon
    pub bitmap: Option<IconBitmap>,
}

impl WeatherSnapshot {
    pub fn new(condition_code: i32, high: impl Into<String>, low: impl Into<String>) -> Self {
        let icon = WeatherIcon::from_condition_code(condition_code);
        let bitmap = icon.bitmap().map(|b| b.scaled(ICON_SIZE, ICON_SIZE));
        WeatherSnapshot {
            condition_code,
            high: high.into(),
            low: low.into(),
            icon,
            bitmap,
        }
    }

    /// True when both temperature labels are present, i.e. the weather row can be drawn.
    pub fn has_temperatures(&self) -> bool {
        !self.high.is_empty() && !self.low.is_empty()
    }
}
