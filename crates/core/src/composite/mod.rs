//! Persistent canvas and source-over compositing of animation frames.
//!
//! The canvas stores premultiplied RGBA8. Source frames arrive as straight
//! (non-premultiplied) RGBA8 at their own offset and are blended on top with
//! 16-bit intermediate precision, so partial and transparent frames leave
//! earlier content visible.

use image::RgbaImage;

const MAX16: u32 = 0xffff;

/// Wide-range color sample (16 bits per channel, premultiplied alpha).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    pub r: u16,
    pub g: u16,
    pub b: u16,
    pub a: u16,
}

impl Sample {
    fn from_premul8(px: [u8; 4]) -> Self {
        Self {
            r: widen(px[0]),
            g: widen(px[1]),
            b: widen(px[2]),
            a: widen(px[3]),
        }
    }
}

fn widen(v: u8) -> u16 {
    u16::from(v) * 0x101
}

/// Pixel extent shared by every frame of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasBounds {
    pub width: u32,
    pub height: u32,
}

impl CanvasBounds {
    /// Bounding box over all frame rectangles. The origin is pinned at (0, 0).
    pub fn from_frames<'a>(frames: impl IntoIterator<Item = &'a Frame>) -> Self {
        let mut width = 0;
        let mut height = 0;
        for frame in frames {
            width = width.max(frame.left + frame.image.width());
            height = height.max(frame.top + frame.image.height());
        }
        Self { width, height }
    }
}

/// One authored animation tick: a (possibly partial) bitmap and its delay.
#[derive(Debug, Clone)]
pub struct Frame {
    pub left: u32,
    pub top: u32,
    /// Straight-alpha RGBA pixels covering `left..left+width, top..top+height`.
    pub image: RgbaImage,
    /// Authored delay in hundredths of a second.
    pub delay: u32,
}

impl Frame {
    pub fn new(image: RgbaImage, left: u32, top: u32, delay: u32) -> Self {
        Self {
            left,
            top,
            image,
            delay,
        }
    }

    /// Full-canvas frame placed at the origin.
    pub fn full(image: RgbaImage, delay: u32) -> Self {
        Self::new(image, 0, 0, delay)
    }
}

/// Full-resolution composited bitmap carried across ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    premul: RgbaImage,
}

impl Canvas {
    /// Fully transparent canvas.
    pub fn new(bounds: CanvasBounds) -> Self {
        Self {
            premul: RgbaImage::new(bounds.width, bounds.height),
        }
    }

    /// Canvas seeded by copying the first frame in (no blending); the rest
    /// stays transparent.
    pub fn from_first_frame(bounds: CanvasBounds, frame: &Frame) -> Self {
        let mut canvas = Self::new(bounds);
        canvas.for_each_overlap(frame, |dst, src| {
            let s = premultiply(src);
            *dst = [
                (s[0] >> 8) as u8,
                (s[1] >> 8) as u8,
                (s[2] >> 8) as u8,
                (s[3] >> 8) as u8,
            ];
        });
        canvas
    }

    pub fn width(&self) -> u32 {
        self.premul.width()
    }

    pub fn height(&self) -> u32 {
        self.premul.height()
    }

    pub fn bounds(&self) -> CanvasBounds {
        CanvasBounds {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Premultiplied RGBA8 value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.premul.get_pixel(x, y).0
    }

    /// [`Canvas::pixel`] widened to 16 bits per channel.
    pub fn sample(&self, x: u32, y: u32) -> Sample {
        Sample::from_premul8(self.pixel(x, y))
    }

    /// Source-over composite of `frame` at its native offset. Canvas pixels
    /// outside the frame rectangle are untouched; pixels beyond the canvas are
    /// clipped.
    pub fn composite(&mut self, frame: &Frame) {
        self.for_each_overlap(frame, |dst, src| {
            let [sr, sg, sb, sa] = premultiply(src);
            if sa == 0 {
                return;
            }
            let inv = (MAX16 - sa) * 0x101;
            *dst = [
                blend(dst[0], inv, sr),
                blend(dst[1], inv, sg),
                blend(dst[2], inv, sb),
                blend(dst[3], inv, sa),
            ];
        });
    }

    fn for_each_overlap(&mut self, frame: &Frame, mut f: impl FnMut(&mut [u8; 4], [u8; 4])) {
        let x_end = (frame.left + frame.image.width()).min(self.width());
        let y_end = (frame.top + frame.image.height()).min(self.height());

        for y in frame.top..y_end {
            for x in frame.left..x_end {
                let src = frame.image.get_pixel(x - frame.left, y - frame.top).0;
                f(&mut self.premul.get_pixel_mut(x, y).0, src);
            }
        }
    }
}

/// Straight RGBA8 to premultiplied 16-bit channels.
fn premultiply(px: [u8; 4]) -> [u32; 4] {
    let a = u32::from(widen(px[3]));
    [
        u32::from(widen(px[0])) * a / MAX16,
        u32::from(widen(px[1])) * a / MAX16,
        u32::from(widen(px[2])) * a / MAX16,
        a,
    ]
}

fn blend(dst: u8, inv: u32, src: u32) -> u8 {
    let kept = u64::from(dst) * u64::from(inv) / u64::from(MAX16);
    ((kept + u64::from(src)) >> 8) as u8
}
