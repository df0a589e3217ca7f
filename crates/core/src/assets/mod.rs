use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::RgbaImage;
use tracing::debug;

use crate::composite::{CanvasBounds, Frame};
use crate::{PlayerError, Result};

/// Decoded animated bitmap: frames in playback order plus their shared extent.
#[derive(Debug, Clone)]
pub struct Animation {
    frames: Vec<Frame>,
    bounds: CanvasBounds,
}

impl Animation {
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        let bounds = CanvasBounds::from_frames(&frames);
        Self { frames, bounds }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn bounds(&self) -> CanvasBounds {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sum of authored delays, in hundredths of a second.
    pub fn total_delay(&self) -> u64 {
        self.frames.iter().map(|frame| u64::from(frame.delay)).sum()
    }
}

/// Reads and decodes an animated GIF.
///
/// Frames are returned as authored: each keeps its own sub-rectangle, offset
/// and transparency, and disposal methods are ignored. Blending them onto
/// the persistent canvas is left to the compositor.
pub fn load_animation(path: impl AsRef<Path>) -> Result<Animation> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| PlayerError::resource(path, err))?;

    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options
        .read_info(BufReader::new(file))
        .map_err(|err| PlayerError::decode(path, err))?;

    let mut frames = Vec::new();
    while let Some(raw) = decoder
        .read_next_frame()
        .map_err(|err| PlayerError::decode(path, err))?
    {
        let (width, height) = (u32::from(raw.width), u32::from(raw.height));
        let image = RgbaImage::from_raw(width, height, raw.buffer.to_vec()).ok_or_else(|| {
            PlayerError::decode(
                path,
                format!("frame {} pixel data does not cover {width}x{height}", frames.len()),
            )
        })?;
        frames.push(Frame::new(
            image,
            u32::from(raw.left),
            u32::from(raw.top),
            u32::from(raw.delay),
        ));
    }

    if frames.is_empty() {
        return Err(PlayerError::decode(path, "animation contains no frames"));
    }

    let animation = Animation::from_frames(frames);
    debug!(
        path = %path.display(),
        frames = animation.len(),
        width = animation.bounds().width,
        height = animation.bounds().height,
        "decoded animation"
    );
    Ok(animation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Write;

    struct RawFrame {
        left: u16,
        top: u16,
        image: RgbaImage,
        delay: u16,
    }

    fn write_gif(path: &Path, width: u16, height: u16, frames: &[RawFrame]) {
        let file = File::create(path).unwrap();
        let mut encoder = gif::Encoder::new(file, width, height, &[]).unwrap();
        for raw in frames {
            let mut pixels = raw.image.clone().into_raw();
            let mut frame = gif::Frame::from_rgba_speed(
                raw.image.width() as u16,
                raw.image.height() as u16,
                &mut pixels,
                10,
            );
            frame.left = raw.left;
            frame.top = raw.top;
            frame.delay = raw.delay;
            encoder.write_frame(&frame).unwrap();
        }
    }

    fn full(color: [u8; 4], width: u32, height: u32, delay: u16) -> RawFrame {
        RawFrame {
            left: 0,
            top: 0,
            image: RgbaImage::from_pixel(width, height, Rgba(color)),
            delay,
        }
    }

    #[test]
    fn loads_frames_and_delays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.gif");
        write_gif(
            &path,
            6,
            4,
            &[
                full([255, 0, 0, 255], 6, 4, 10),
                full([0, 0, 255, 255], 6, 4, 20),
            ],
        );

        let animation = load_animation(&path).unwrap();
        assert_eq!(animation.len(), 2);
        assert_eq!(
            animation.bounds(),
            CanvasBounds {
                width: 6,
                height: 4
            }
        );
        let delays: Vec<u32> = animation.frames().iter().map(|f| f.delay).collect();
        assert_eq!(delays, vec![10, 20]);
        assert_eq!(animation.total_delay(), 30);
        assert_eq!(animation.frames()[0].image.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn sub_frames_keep_their_rectangle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.gif");
        let mut patch = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        patch.put_pixel(1, 1, Rgba([0, 0, 0, 0]));
        write_gif(
            &path,
            8,
            8,
            &[
                full([0, 0, 0, 255], 8, 8, 5),
                RawFrame {
                    left: 3,
                    top: 4,
                    image: patch,
                    delay: 7,
                },
            ],
        );

        let animation = load_animation(&path).unwrap();
        let second = &animation.frames()[1];
        assert_eq!((second.left, second.top), (3, 4));
        assert_eq!(second.image.dimensions(), (2, 2));
        assert_eq!(second.delay, 7);
        assert_eq!(second.image.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(second.image.get_pixel(1, 1).0[3], 0);

        // The patch lands at its offset; its transparent pixel keeps the
        // black underneath.
        let mut canvas = crate::Canvas::from_first_frame(animation.bounds(), &animation.frames()[0]);
        canvas.composite(second);
        assert_eq!(canvas.pixel(3, 4), [255, 255, 255, 255]);
        assert_eq!(canvas.pixel(4, 5), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn missing_file_is_a_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_animation(dir.path().join("absent.gif")).unwrap_err();
        assert!(matches!(err, PlayerError::Resource { .. }));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not a gif").unwrap();
        file.flush().unwrap();

        let err = load_animation(file.path()).unwrap_err();
        assert!(matches!(err, PlayerError::Decode { .. }));
    }

    #[test]
    fn bounds_follow_largest_frame() {
        let animation = Animation::from_frames(vec![
            Frame::new(RgbaImage::new(5, 5), 0, 0, 3),
            Frame::new(RgbaImage::new(2, 2), 6, 1, 4),
        ]);
        assert_eq!(
            animation.bounds(),
            CanvasBounds {
                width: 8,
                height: 5
            }
        );
        assert_eq!(animation.total_delay(), 7);
    }
}
