//! In-memory RGB565 frame buffer.
//!
//! Used as the render surface for the `--stdout` preview and the run loop on
//! hosts without a panel driver. Pixels outside the buffer are dropped.

use embedded_graphics::{pixelcolor::Rgb565, prelude::*};
use std::convert::Infallible;

/// Characters from darkest to brightest for the ASCII preview
const SHADES: &[u8] = b" .:-=+*#%@";

pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgb565>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb565::BLACK; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn count(&self, color: Rgb565) -> usize {
        self.pixels.iter().filter(|&&p| p == color).count()
    }

    /// Downsample to a character grid, one char per `cell_w` x `cell_h` block.
    ///
    /// Each cell shows the brightest pixel it contains, so one-pixel strokes
    /// survive the downsampling.
    pub fn to_ascii(&self, cell_w: u32, cell_h: u32) -> String {
        let cell_w = cell_w.max(1);
        let cell_h = cell_h.max(1);
        let mut out = String::new();
        for cy in (0..self.height).step_by(cell_h as usize) {
            for cx in (0..self.width).step_by(cell_w as usize) {
                let mut brightest = 0u32;
                for y in cy..(cy + cell_h).min(self.height) {
                    for x in cx..(cx + cell_w).min(self.width) {
                        let p = self.pixels[(y * self.width + x) as usize];
                        let level = p.r() as u32 * 2 + p.g() as u32 + p.b() as u32 * 2;
                        brightest = brightest.max(level);
                    }
                }
                // 31*2 + 63 + 31*2 = 187 is full white
                let index = (brightest * (SHADES.len() as u32 - 1) / 187) as usize;
                out.push(SHADES[index] as char);
            }
            out.push('\n');
        }
        out
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Framebuffer {
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
                self.pixels[(y * self.width + x) as usize] = color;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixels.fill(color);
        Ok(())
    }
}
