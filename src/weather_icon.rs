//! # Weather Condition Icons
//!
//! Maps a meteorological condition code to one of a fixed set of icons and
//! rasterizes each icon into a small transparent bitmap.
//!
//! ## Condition Code Table
//!
//! | Codes | Icon |
//! |---|---|
//! | 200-232 | storm |
//! | 300-321 | light rain |
//! | 500-504, 520-531 | rain |
//! | 511, 600-622 | snow |
//! | 701-761 | fog |
//! | 781 | storm |
//! | 800 | clear |
//! | 801 | light clouds |
//! | 802-804 | clouds |
//!
//! Code 761 appears in both the fog range and the storm list; fog is checked
//! first and wins. Everything else is [`WeatherIcon::Unknown`].
//!
//! ## Bitmaps
//! Glyphs are drawn with `embedded-graphics` primitives on a
//! [`NATIVE_SIZE`] grid, then nearest-neighbour scaled to the on-face
//! footprint ([`ICON_SIZE`]). No filtering is applied, so scaled icons keep
//! hard edges on low-bit panels.

use embedded_graphics::{
    pixelcolor::{Rgb565, Rgb888},
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, Rectangle, Triangle},
};
use std::convert::Infallible;

/// Edge length of the icon as drawn on the face, in pixels
pub const ICON_SIZE: u32 = 60;

/// Edge length of the design grid the glyphs are drawn on
pub const NATIVE_SIZE: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WeatherIcon {
    Storm,
    LightRain,
    Rain,
    Snow,
    Fog,
    Clear,
    LightClouds,
    Clouds,
    Unknown,
}

impl WeatherIcon {
    /// Resolve a condition code. Ranges are inclusive and checked in table order.
    pub fn from_condition_code(code: i32) -> Self {
        match code {
            200..=232 => WeatherIcon::Storm,
            300..=321 => WeatherIcon::LightRain,
            500..=504 => WeatherIcon::Rain,
            511 => WeatherIcon::Snow,
            520..=531 => WeatherIcon::Rain,
            600..=622 => WeatherIcon::Snow,
            701..=761 => WeatherIcon::Fog,
            // 761 never reaches this arm
            #[allow(unreachable_patterns)]
            761 | 781 => WeatherIcon::Storm,
            800 => WeatherIcon::Clear,
            801 => WeatherIcon::LightClouds,
            802..=804 => WeatherIcon::Clouds,
            _ => WeatherIcon::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WeatherIcon::Storm => "storm",
            WeatherIcon::LightRain => "light-rain",
            WeatherIcon::Rain => "rain",
            WeatherIcon::Snow => "snow",
            WeatherIcon::Fog => "fog",
            WeatherIcon::Clear => "clear",
            WeatherIcon::LightClouds => "light-clouds",
            WeatherIcon::Clouds => "clouds",
            WeatherIcon::Unknown => "unknown",
        }
    }

    /// Rasterize the glyph at [`NATIVE_SIZE`]. `None` for [`WeatherIcon::Unknown`].
    pub fn bitmap(self) -> Option<IconBitmap> {
        if self == WeatherIcon::Unknown {
            return None;
        }
        let mut bitmap = IconBitmap::new(NATIVE_SIZE, NATIVE_SIZE);
        draw_glyph(self, &mut bitmap);
        Some(bitmap)
    }
}

/// A small image with per-pixel transparency.
///
/// Acts as a `DrawTarget` while a glyph is rasterized into it, and draws
/// itself onto any `Rgb565` target with [`IconBitmap::draw`], skipping
/// transparent pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IconBitmap {
    width: u32,
    height: u32,
    pixels: Vec<Option<Rgb565>>,
}

impl IconBitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![None; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb565> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels[(y * self.width + x) as usize]
    }

    /// Number of non-transparent pixels.
    pub fn opaque_count(&self) -> usize {
        self.pixels.iter().filter(|p| p.is_some()).count()
    }

    /// Nearest-neighbour resample to `width` x `height`.
    pub fn scaled(&self, width: u32, height: u32) -> IconBitmap {
        let mut out = IconBitmap::new(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..height {
            let src_y = y * self.height / height;
            for x in 0..width {
                let src_x = x * self.width / width;
                out.pixels[(y * width + x) as usize] = self.pixel(src_x, src_y);
            }
        }
        out
    }

    /// Draw the opaque pixels with the bitmap's top-left corner at `top_left`.
    pub fn draw<D>(&self, target: &mut D, top_left: Point) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let width = self.width;
        target.draw_iter(self.pixels.iter().enumerate().filter_map(|(i, p)| {
            p.map(|color| {
                let i = i as u32;
                let offset = Point::new((i % width) as i32, (i / width) as i32);
                Pixel(top_left + offset, color)
            })
        }))
    }
}

impl OriginDimensions for IconBitmap {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for IconBitmap {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.width && y < self.height {
                self.pixels[(y * self.width + x) as usize] = Some(color);
            }
        }
        Ok(())
    }
}

// -- Glyph drawing --

fn sun_yellow() -> Rgb565 {
    Rgb888::new(0xFF, 0xC1, 0x07).into()
}

fn cloud_gray() -> Rgb565 {
    Rgb888::new(0xEC, 0xEF, 0xF1).into()
}

fn storm_gray() -> Rgb565 {
    Rgb888::new(0x90, 0xA4, 0xAE).into()
}

fn rain_blue() -> Rgb565 {
    Rgb888::new(0x29, 0x79, 0xFF).into()
}

fn draw_glyph(icon: WeatherIcon, bitmap: &mut IconBitmap) {
    match icon {
        WeatherIcon::Clear => draw_sun(bitmap, Point::new(15, 15), 14),
        WeatherIcon::LightClouds => {
            draw_sun(bitmap, Point::new(11, 10), 10);
            draw_cloud(bitmap, Point::new(4, 8), cloud_gray());
        }
        WeatherIcon::Clouds => {
            draw_cloud(bitmap, Point::new(6, 2), storm_gray());
            draw_cloud(bitmap, Point::new(2, 8), cloud_gray());
        }
        WeatherIcon::LightRain => {
            draw_cloud(bitmap, Point::new(2, 2), cloud_gray());
            draw_drops(bitmap, &[10, 18]);
        }
        WeatherIcon::Rain => {
            draw_cloud(bitmap, Point::new(2, 2), storm_gray());
            draw_drops(bitmap, &[7, 12, 17, 22]);
        }
        WeatherIcon::Snow => {
            draw_cloud(bitmap, Point::new(2, 2), cloud_gray());
            for (x, y) in [(8, 22), (14, 25), (20, 22), (11, 27), (17, 27)] {
                Circle::new(Point::new(x, y), 3)
                    .into_styled(PrimitiveStyle::with_fill(Rgb565::WHITE))
                    .draw(bitmap)
                    .ok();
            }
        }
        WeatherIcon::Storm => {
            draw_cloud(bitmap, Point::new(2, 2), storm_gray());
            Triangle::new(Point::new(15, 17), Point::new(10, 24), Point::new(15, 24))
                .into_styled(PrimitiveStyle::with_fill(sun_yellow()))
                .draw(bitmap)
                .ok();
            Triangle::new(Point::new(13, 23), Point::new(18, 23), Point::new(12, 29))
                .into_styled(PrimitiveStyle::with_fill(sun_yellow()))
                .draw(bitmap)
                .ok();
        }
        WeatherIcon::Fog => {
            for (i, y) in [8, 13, 18, 23].into_iter().enumerate() {
                let inset = if i % 2 == 0 { 3 } else { 6 };
                Line::new(Point::new(inset, y), Point::new(29 - inset, y))
                    .into_styled(PrimitiveStyle::with_stroke(storm_gray(), 2))
                    .draw(bitmap)
                    .ok();
            }
        }
        WeatherIcon::Unknown => {}
    }
}

fn draw_sun(bitmap: &mut IconBitmap, center: Point, diameter: u32) {
    let ray_style = PrimitiveStyle::with_stroke(sun_yellow(), 1);
    let inner = diameter as i32 / 2 + 2;
    let outer = inner + 3;
    // Eight rays at 45 degree steps, unit directions scaled by hand
    for (dx, dy) in [(1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0), (-1, -1), (0, -1), (1, -1)] {
        let scale = |r: i32| {
            if dx != 0 && dy != 0 {
                r * 7 / 10
            } else {
                r
            }
        };
        let start = center + Point::new(dx * scale(inner), dy * scale(inner));
        let end = center + Point::new(dx * scale(outer), dy * scale(outer));
        Line::new(start, end).into_styled(ray_style).draw(bitmap).ok();
    }
    Circle::with_center(center, diameter)
        .into_styled(PrimitiveStyle::with_fill(sun_yellow()))
        .draw(bitmap)
        .ok();
}

/// Cloud body spanning roughly 26x16 pixels from `origin`.
fn draw_cloud(bitmap: &mut IconBitmap, origin: Point, color: Rgb565) {
    let fill = PrimitiveStyle::with_fill(color);
    Circle::new(origin + Point::new(0, 6), 10).into_styled(fill).draw(bitmap).ok();
    Circle::new(origin + Point::new(6, 0), 14).into_styled(fill).draw(bitmap).ok();
    Circle::new(origin + Point::new(15, 4), 11).into_styled(fill).draw(bitmap).ok();
    Rectangle::new(origin + Point::new(5, 9), Size::new(17, 7))
        .into_styled(fill)
        .draw(bitmap)
        .ok();
}

fn draw_drops(bitmap: &mut IconBitmap, columns: &[i32]) {
    let style = PrimitiveStyle::with_stroke(rain_blue(), 2);
    for &x in columns {
        Line::new(Point::new(x, 21), Point::new(x - 2, 27))
            .into_styled(style)
            .draw(bitmap)
            .ok();
    }
}
