//! Single-board-computer camera module backend.
//!
//! The module runs in one of two configurations: a low-latency preview
//! stream or a full-resolution still mode. A capture switches to still, grabs
//! one frame and always switches back so live view resumes right away.

use std::path::Path;
use std::sync::Mutex;

use image::imageops;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    BackendKind, CaptureDevice, FlashCallback, capture_failed, crop_preview, lock, with_flash,
    write_capture,
};
use crate::error::{PhotoboothError, Result};
use crate::frame::Frame;

/// Sensor configuration of the board camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardMode {
    Preview,
    Still,
}

/// Transport to the camera module.
pub trait BoardCameraDriver: Send {
    /// Reconfigure the sensor. Switching to the current mode is a no-op.
    fn configure(&mut self, mode: BoardMode) -> Result<()>;

    /// In preview mode, the newest streamed frame (`None` until the first
    /// arrives). In still mode, one freshly exposed full-resolution frame.
    fn grab(&mut self) -> Result<Option<Frame>>;
}

/// Board camera capture device. No physical flash.
pub struct BoardCamera {
    driver: Mutex<Box<dyn BoardCameraDriver>>,
    mirror_still: bool,
}

impl BoardCamera {
    /// Take ownership of the driver and start live view.
    pub fn open(mut driver: Box<dyn BoardCameraDriver>, mirror_still: bool) -> Result<Self> {
        driver.configure(BoardMode::Preview)?;
        info!(mirror_still, "Board camera ready");
        Ok(Self {
            driver: Mutex::new(driver),
            mirror_still,
        })
    }

    fn grab_still(driver: &mut dyn BoardCameraDriver) -> Result<Frame> {
        driver.configure(BoardMode::Still)?;
        let still = driver.grab();
        let restored = driver.configure(BoardMode::Preview);

        if let Err(e) = &restored {
            warn!(error = %e, "Board camera failed to return to preview");
        }
        let still = still?.ok_or_else(|| {
            PhotoboothError::DeviceCommunication("still mode produced no frame".to_string())
        })?;
        restored?;
        Ok(still)
    }
}

impl CaptureDevice for BoardCamera {
    fn kind(&self) -> BackendKind {
        BackendKind::BoardCamera
    }

    fn get_preview(&self, aspect_ratio: Option<f64>) -> Option<Frame> {
        // A capture holds the driver; skip this tick instead of waiting for it
        let mut driver = self.driver.try_lock().ok()?;
        match driver.grab() {
            Ok(frame) => crop_preview(&frame?, aspect_ratio),
            Err(e) => {
                debug!(error = %e, "Board camera preview grab failed");
                None
            }
        }
    }

    fn capture(
        &self,
        output_path: &Path,
        aspect_ratio: Option<f64>,
        flash: Option<FlashCallback<'_>>,
    ) -> Result<()> {
        let still = with_flash(self.has_physical_flash(), flash, || {
            let mut driver = lock(&self.driver);
            Self::grab_still(driver.as_mut())
        })
        .map_err(|e| capture_failed(output_path, e))?;

        let still = if self.mirror_still {
            still.map(imageops::flip_horizontal)
        } else {
            still
        };
        write_capture(&still, output_path, aspect_ratio)?;
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
    use crate::device::FlashPhase;
    use crate::device::mock::MockBoardDriver;

    #[test]
    fn test_open_starts_preview() {
        let driver = MockBoardDriver::new();
        let modes = driver.modes();
        let _camera = BoardCamera::open(Box::new(driver), false).unwrap();
        assert_eq!(*modes.lock().unwrap(), vec![BoardMode::Preview]);
    }

    #[test]
    fn test_capture_returns_to_preview() {
        let dir = tempfile::tempdir().unwrap();
        let driver = MockBoardDriver::new();
        let modes = driver.modes();
        let camera = BoardCamera::open(Box::new(driver), true).unwrap();

        camera.capture(&dir.path().join("capture-0.jpg"), Some(1.0), None).unwrap();

        assert_eq!(
            *modes.lock().unwrap(),
            vec![BoardMode::Preview, BoardMode::Still, BoardMode::Preview]
        );
        let photo = Frame::open(&dir.path().join("capture-0.jpg")).unwrap();
        assert_eq!(photo.width(), photo.height());
    }

    #[test]
    fn test_failed_still_still_returns_to_preview() {
        let dir = tempfile::tempdir().unwrap();
        let driver = MockBoardDriver::new().failing_still();
        let modes = driver.modes();
        let camera = BoardCamera::open(Box::new(driver), false).unwrap();

        assert!(camera.capture(&dir.path().join("x.jpg"), None, None).is_err());
        assert_eq!(modes.lock().unwrap().last(), Some(&BoardMode::Preview));
        assert!(!dir.path().join("x.jpg").exists());
    }

    #[test]
    fn test_software_flash_brackets_still() {
        let dir = tempfile::tempdir().unwrap();
        let camera = BoardCamera::open(Box::new(MockBoardDriver::new()), false).unwrap();
        let phases = Mutex::new(Vec::new());
        let cb = |phase: FlashPhase| phases.lock().unwrap().push(phase);

        camera.capture(&dir.path().join("f.jpg"), None, Some(&cb)).unwrap();
        assert_eq!(*phases.lock().unwrap(), vec![FlashPhase::Start, FlashPhase::Stop]);
    }

    #[test]
    fn test_preview_is_cropped() {
        let camera = BoardCamera::open(Box::new(MockBoardDriver::new()), false).unwrap();
        let frame = camera.get_preview(Some(1.0)).unwrap();
        assert_eq!(frame.width(), frame.height());
        assert!(camera.get_preview(None).unwrap().width() > frame.width());
    }
}
