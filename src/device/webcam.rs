//! Generic webcam backend.
//!
//! Preview and capture both read one frame from a continuously open stream.

use std::path::Path;
use std::sync::Mutex;

use image::imageops;
use tracing::{debug, info};

use super::{
    BackendKind, CaptureDevice, FlashCallback, capture_failed, crop_preview, lock, with_flash,
    write_capture,
};
use crate::error::{PhotoboothError, Result};
use crate::frame::Frame;

/// Device indices tried, in order, when none is configured.
pub const PROBE_INDICES: [u32; 3] = [0, 1, 2];

/// An open video stream.
pub trait VideoSource: Send {
    /// Block until the next frame is available.
    fn read_frame(&mut self) -> Result<Frame>;
}

/// Opens video streams by device index.
pub trait VideoOpener {
    fn open(&self, index: u32) -> Result<Box<dyn VideoSource>>;
}

/// Webcam capture device. No physical flash.
pub struct Webcam {
    source: Mutex<Box<dyn VideoSource>>,
    index: u32,
    flip_preview: bool,
}

impl Webcam {
    /// Open the configured index, or the first of [`PROBE_INDICES`] that opens.
    ///
    /// With `flip_preview`, preview frames are rotated by 180 degrees for
    /// cameras mounted upside down. Captures are written as taken.
    pub fn discover(
        opener: &dyn VideoOpener,
        index: Option<u32>,
        flip_preview: bool,
    ) -> Result<Self> {
        let candidates: &[u32] = match &index {
            Some(index) => std::slice::from_ref(index),
            None => &PROBE_INDICES,
        };

        let mut last_error = None;
        for &candidate in candidates {
            match opener.open(candidate) {
                Ok(source) => {
                    info!(index = candidate, "Webcam opened");
                    return Ok(Self {
                        source: Mutex::new(source),
                        index: candidate,
                        flip_preview,
                    });
                }
                Err(e) => {
                    debug!(index = candidate, error = %e, "No webcam at index");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PhotoboothError::DeviceCommunication("no webcam index to try".to_string())
        }))
    }

    /// Index of the opened device.
    pub const fn index(&self) -> u32 {
        self.index
    }
}

impl CaptureDevice for Webcam {
    fn kind(&self) -> BackendKind {
        BackendKind::Webcam
    }

    fn get_preview(&self, aspect_ratio: Option<f64>) -> Option<Frame> {
        let mut source = self.source.try_lock().ok()?;
        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Webcam preview read failed");
                return None;
            }
        };
        drop(source);

        let frame = if self.flip_preview {
            frame.map(imageops::rotate180)
        } else {
            frame
        };
        crop_preview(&frame, aspect_ratio)
    }

    fn capture(
        &self,
        output_path: &Path,
        aspect_ratio: Option<f64>,
        flash: Option<FlashCallback<'_>>,
    ) -> Result<()> {
        let frame = with_flash(self.has_physical_flash(), flash, || lock(&self.source).read_frame())
            .map_err(|e| capture_failed(output_path, e))?;
        write_capture(&frame, output_path, aspect_ratio)?;
        info!(path = %output_path.display(), "Captured photo");
        Ok(())
    }

    fn has_physical_flash(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockVideoOpener;

    #[test]
    fn test_discovery_picks_first_opening_index() {
        let opener = MockVideoOpener::with_indices(&[1, 2]);
        let cam = Webcam::discover(&opener, None, false).unwrap();
        assert_eq!(cam.index(), 1);
        assert_eq!(*opener.attempts(), vec![0, 1]);
    }

    #[test]
    fn test_configured_index_only() {
        let opener = MockVideoOpener::with_indices(&[0, 4]);
        let cam = Webcam::discover(&opener, Some(4), false).unwrap();
        assert_eq!(cam.index(), 4);
        assert_eq!(*opener.attempts(), vec![4]);

        let opener = MockVideoOpener::with_indices(&[0]);
        assert!(Webcam::discover(&opener, Some(3), false).is_err());
    }

    #[test]
    fn test_no_webcam() {
        let opener = MockVideoOpener::with_indices(&[]);
        assert!(Webcam::discover(&opener, None, false).is_err());
        assert_eq!(*opener.attempts(), vec![0, 1, 2]);
    }

    #[test]
    fn test_flipped_preview() {
        let opener = MockVideoOpener::with_indices(&[0]);
        let straight = Webcam::discover(&opener, None, false).unwrap();
        let flipped = Webcam::discover(&opener, None, true).unwrap();

        let a = straight.get_preview(None).unwrap();
        let b = flipped.get_preview(None).unwrap();
        let (w, h) = a.dimensions();
        assert_eq!(a.pixels().get_pixel(0, 0), b.pixels().get_pixel(w - 1, h - 1));
    }

    #[test]
    fn test_capture_crops_to_aspect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture-1.jpg");
        let cam = Webcam::discover(&MockVideoOpener::with_indices(&[0]), None, false).unwrap();

        cam.capture(&path, Some(0.5), None).unwrap();
        let photo = Frame::open(&path).unwrap();
        let ratio = f64::from(photo.width()) / f64::from(photo.height());
        assert!((ratio - 0.5).abs() < 0.02);
    }
}
