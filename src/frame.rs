//! In-memory raster frames shared by capture devices and the compositor.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use serde::Serialize;
use tracing::trace;

use crate::error::{PhotoboothError, Result};

/// JPEG quality used for every photo and collage written to disk.
pub const JPEG_QUALITY: u8 = 92;

/// Byte order of the three channels stored in a [`Frame`].
///
/// Some camera stacks hand out BGR buffers. Geometric operations do not
/// care, but anything that encodes or blends against RGB data must convert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// An 8-bit, three channel image with an explicit channel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: RgbImage,
    order: ChannelOrder,
}

impl Frame {
    /// Wrap an RGB buffer.
    #[must_use]
    pub fn new(pixels: RgbImage) -> Self {
        Self::with_order(pixels, ChannelOrder::Rgb)
    }

    /// Wrap a buffer whose channels are stored in `order`.
    #[must_use]
    pub const fn with_order(pixels: RgbImage, order: ChannelOrder) -> Self {
        Self { pixels, order }
    }

    /// Build a frame from a packed `width * height * 3` byte buffer.
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>, order: ChannelOrder) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|pixels| Self::with_order(pixels, order))
    }

    /// A frame filled with one RGB colour.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    /// Decode an encoded image (JPEG, PNG, ...) held in memory.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::new(img.to_rgb8()))
    }

    /// Load an image file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PhotoboothError::ImageNotFound {
                path: path.display().to_string(),
            });
        }
        let img = image::open(path).map_err(|e| PhotoboothError::image(path, e))?;
        Ok(Self::new(img.to_rgb8()))
    }

    /// Encode the frame to `path`, converting to RGB first.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_rgb(&self.to_rgb(), path)
    }

    pub const fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Raw pixel buffer in the frame's own channel order.
    pub const fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbImage {
        self.pixels
    }

    /// Pixel buffer converted to RGB order.
    pub fn to_rgb(&self) -> RgbImage {
        match self.order {
            ChannelOrder::Rgb => self.pixels.clone(),
            ChannelOrder::Bgr => swap_red_blue(&self.pixels),
        }
    }

    /// Convert the frame itself to RGB order.
    #[must_use]
    pub fn into_rgb(self) -> Self {
        match self.order {
            ChannelOrder::Rgb => self,
            ChannelOrder::Bgr => Self::new(swap_red_blue(&self.pixels)),
        }
    }

    /// Apply a channel-agnostic pixel transform, keeping the channel order.
    #[must_use]
    pub fn map(&self, f: impl FnOnce(&RgbImage) -> RgbImage) -> Self {
        Self::with_order(f(&self.pixels), self.order)
    }
}

fn swap_red_blue(pixels: &RgbImage) -> RgbImage {
    let mut out = pixels.clone();
    for px in out.pixels_mut() {
        px.0.swap(0, 2);
    }
    out
}

/// Write an RGB buffer, creating parent directories as needed.
///
/// JPEG files are written with [`JPEG_QUALITY`]; every other extension uses
/// the encoder defaults.
pub fn write_rgb(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    trace!(path = %path.display(), width = image.width(), height = image.height(), "Writing image");
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Jpeg) => {
            let writer = BufWriter::new(File::create(path)?);
            let encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
            image
                .write_with_encoder(encoder)
                .map_err(|e| PhotoboothError::image(path, e))
        }
        _ => image.save(path).map_err(|e| PhotoboothError::image(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgr_conversion() {
        let frame = Frame::from_raw(1, 1, vec![10, 20, 30], ChannelOrder::Bgr).unwrap();
        assert_eq!(frame.to_rgb().get_pixel(0, 0).0, [30, 20, 10]);
        assert_eq!(frame.into_rgb().order(), ChannelOrder::Rgb);
    }

    #[test]
    fn test_from_raw_rejects_short_buffer() {
        assert!(Frame::from_raw(2, 2, vec![0; 11], ChannelOrder::Rgb).is_none());
    }

    #[test]
    fn test_map_keeps_order() {
        let frame = Frame::with_order(RgbImage::new(4, 2), ChannelOrder::Bgr);
        let flipped = frame.map(image::imageops::flip_horizontal);
        assert_eq!(flipped.order(), ChannelOrder::Bgr);
        assert_eq!(flipped.dimensions(), (4, 2));
    }

    #[test]
    fn test_save_and_open_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gray.jpg");
        Frame::solid(64, 32, [117, 117, 117]).save(&path).unwrap();

        let loaded = Frame::open(&path).unwrap();
        assert_eq!(loaded.dimensions(), (64, 32));
    }

    #[test]
    fn test_open_missing_file() {
        let result = Frame::open(Path::new("/definitely/not/here.jpg"));
        assert!(matches!(result, Err(PhotoboothError::ImageNotFound { .. })));
    }
}
