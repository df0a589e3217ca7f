//! Block-average downsampling of the canvas to the grid resolution.
//!
//! Bounds are trimmed down to the largest exact multiple of the target size
//! before blocks are laid out, so trailing canvas rows and columns never
//! contribute to any cell. Each block is reduced to `sqrt(mean(channel))`
//! over the 16-bit samples, which lands the result in 8-bit range with a
//! brightness curve instead of a linear rescale.

use crate::composite::Canvas;
use crate::palette::Rgb;

/// Downsampled image, one 8-bit RGBA sample per grid cell, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmallImage {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl SmallImage {
    /// Columns, equal to the grid width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Rows, equal to the grid height.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// RGBA sample of the cell at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Color channels of [`SmallImage::pixel`], alpha dropped.
    pub fn rgb(&self, x: u32, y: u32) -> Rgb {
        let [r, g, b, _] = self.pixel(x, y);
        Rgb(r, g, b)
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }
}

/// Extent after dropping the remainder that does not divide evenly into `target`.
pub fn trimmed_extent(extent: u32, target: u32) -> u32 {
    extent - extent % target
}

/// Downsamples `canvas` to `width` x `height` cells.
///
/// # Panics
///
/// Panics if either target dimension is zero or exceeds the canvas extent;
/// callers validate dimensions against the canvas before playback.
pub fn resize(canvas: &Canvas, width: u32, height: u32) -> SmallImage {
    assert!(
        width > 0 && height > 0,
        "target dimensions must be positive, got {width}x{height}"
    );
    assert!(
        width <= canvas.width() && height <= canvas.height(),
        "target {width}x{height} exceeds canvas {}x{}",
        canvas.width(),
        canvas.height()
    );

    let scale_x = trimmed_extent(canvas.width(), width) / width;
    let scale_y = trimmed_extent(canvas.height(), height) / height;

    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(block_average(
                canvas,
                x * scale_x,
                (x + 1) * scale_x,
                y * scale_y,
                (y + 1) * scale_y,
            ));
        }
    }

    SmallImage {
        width,
        height,
        pixels,
    }
}

fn block_average(canvas: &Canvas, min_x: u32, max_x: u32, min_y: u32, max_y: u32) -> [u8; 4] {
    let scale = 1.0 / f64::from((max_x - min_x) * (max_y - min_y));
    let mut sums = [0.0f64; 4];

    for x in min_x..max_x {
        for y in min_y..max_y {
            let sample = canvas.sample(x, y);
            sums[0] += f64::from(sample.r) * scale;
            sums[1] += f64::from(sample.g) * scale;
            sums[2] += f64::from(sample.b) * scale;
            sums[3] += f64::from(sample.a) * scale;
        }
    }

    sums.map(|sum| sum.sqrt() as u8)
}
