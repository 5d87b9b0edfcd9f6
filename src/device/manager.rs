//! Composition root for the booth hardware.
//!
//! [`DeviceManager`] probes every backend once, assigns the preview and
//! capture roles by a fixed priority and owns the optional printer. When the
//! two roles are served by different cameras, a [`Calibration`] reconciles
//! their fields of view.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    BackendKind, BoardCamera, CaptureDevice, FlashCallback, Gphoto2Cli, JobId, LpSpooler,
    PrintDevice, PrintParams, PrintStatus, ProbeResult, RpicamDriver, SpoolPrinter, VendorCamera,
    probe,
};
use crate::config::{DevicesConfig, PrinterConfig};
use crate::error::{PhotoboothError, Result};
use crate::frame::Frame;
use crate::image_ops;

/// Zoom and pan that make the preview camera frame what the capture camera
/// will photograph.
///
/// `zoom >= 1.0` zooms every preview frame by `zoom`. `0 < zoom < 1.0` means
/// the capture camera sees less than the preview one, so captured photos are
/// zoomed by `1 / zoom` instead. Offsets pan the zoomed stream, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub zoom: f64,
    #[serde(default)]
    pub x_offset: i32,
    #[serde(default)]
    pub y_offset: i32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            x_offset: 0,
            y_offset: 0,
        }
    }
}

impl Calibration {
    pub fn new(zoom: f64, x_offset: i32, y_offset: i32) -> Result<Self> {
        let calibration = Self {
            zoom,
            x_offset,
            y_offset,
        };
        calibration.validate()?;
        Ok(calibration)
    }

    /// # Errors
    ///
    /// Returns [`PhotoboothError::InvalidCalibration`] unless `zoom` is a
    /// finite positive number.
    pub fn validate(&self) -> Result<()> {
        if self.zoom.is_finite() && self.zoom > 0.0 {
            Ok(())
        } else {
            Err(PhotoboothError::InvalidCalibration { zoom: self.zoom })
        }
    }

    pub fn is_identity(&self) -> bool {
        (self.zoom - 1.0).abs() < f64::EPSILON && self.x_offset == 0 && self.y_offset == 0
    }

    /// Zoom factor for preview frames, if the preview side is adjusted.
    pub fn preview_zoom(&self) -> Option<f64> {
        (self.zoom >= 1.0 && !self.is_identity()).then_some(self.zoom)
    }

    /// Zoom factor for captured photos, if the capture side is adjusted.
    pub fn capture_zoom(&self) -> Option<f64> {
        (self.zoom < 1.0).then(|| 1.0 / self.zoom)
    }

    fn apply(&self, frame: &Frame, factor: f64) -> Result<Frame> {
        image_ops::zoom(frame, factor, self.x_offset, self.y_offset)
    }
}

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zoom {:.2}, offset ({}, {})", self.zoom, self.x_offset, self.y_offset)
    }
}

/// How the camera roles were assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CameraMode {
    /// One camera serves both roles.
    Single { device: BackendKind },
    /// A fast camera feeds live view, another takes the photos.
    Hybrid {
        preview: BackendKind,
        capture: BackendKind,
    },
}

/// Results of probing every backend.
pub struct Probes {
    pub vendor: ProbeResult<Arc<dyn CaptureDevice>>,
    pub board: ProbeResult<Arc<dyn CaptureDevice>>,
    pub webcam: ProbeResult<Arc<dyn CaptureDevice>>,
    pub printer: ProbeResult<Arc<dyn PrintDevice>>,
}

impl Probes {
    /// Probe the real hardware. Never fails: every problem becomes
    /// [`ProbeResult::NotAvailable`].
    pub fn hardware(devices: &DevicesConfig, printer: &PrinterConfig) -> Self {
        let vendor = if devices.vendor.enabled {
            let port = devices.vendor.port.clone();
            probe("vendor", move || {
                let session = Gphoto2Cli::detect(port.as_deref())?;
                let camera: Arc<dyn CaptureDevice> =
                    Arc::new(VendorCamera::open(Box::new(session))?);
                Ok(camera)
            })
        } else {
            disabled()
        };

        let board = if devices.board.enabled {
            let (index, mirror) = (devices.board.camera, devices.board.mirror_still);
            probe("board", move || {
                let driver = RpicamDriver::detect(index)?;
                let camera: Arc<dyn CaptureDevice> =
                    Arc::new(BoardCamera::open(Box::new(driver), mirror)?);
                Ok(camera)
            })
        } else {
            disabled()
        };

        let webcam = if devices.webcam.enabled {
            probe_webcam(devices.webcam.index, devices.webcam.flip_preview)
        } else {
            disabled()
        };

        let printer = if printer.enabled {
            let name = printer.name.clone();
            probe("printer", move || {
                let printer: Arc<dyn PrintDevice> =
                    Arc::new(SpoolPrinter::connect(Box::new(LpSpooler), name.as_deref())?);
                Ok(printer)
            })
        } else {
            disabled()
        };

        Self {
            vendor,
            board,
            webcam,
            printer,
        }
    }
}

fn disabled<T>() -> ProbeResult<T> {
    ProbeResult::not_available("disabled in configuration")
}

#[cfg(feature = "v4l2")]
fn probe_webcam(index: Option<u32>, flip_preview: bool) -> ProbeResult<Arc<dyn CaptureDevice>> {
    probe("webcam", move || {
        let camera: Arc<dyn CaptureDevice> =
            Arc::new(super::Webcam::discover(&super::V4lOpener, index, flip_preview)?);
        Ok(camera)
    })
}

#[cfg(not(feature = "v4l2"))]
fn probe_webcam(_index: Option<u32>, _flip_preview: bool) -> ProbeResult<Arc<dyn CaptureDevice>> {
    ProbeResult::not_available("built without the v4l2 feature")
}

/// A backend that was probed but is not in use.
#[derive(Debug, Clone, Serialize)]
pub struct Unavailable {
    pub backend: String,
    pub reason: String,
}

/// Assign preview and capture roles by the fixed priority order.
fn select_roles(
    vendor: Option<Arc<dyn CaptureDevice>>,
    board: Option<Arc<dyn CaptureDevice>>,
    webcam: Option<Arc<dyn CaptureDevice>>,
) -> Result<(Arc<dyn CaptureDevice>, Arc<dyn CaptureDevice>)> {
    match (board, vendor, webcam) {
        (Some(board), Some(vendor), _) => Ok((board, vendor)),
        (None, Some(vendor), Some(webcam)) => Ok((webcam, vendor)),
        (Some(board), None, _) => Ok((Arc::clone(&board), board)),
        (None, Some(vendor), None) => Ok((Arc::clone(&vendor), vendor)),
        (None, None, Some(webcam)) => Ok((Arc::clone(&webcam), webcam)),
        (None, None, None) => Err(PhotoboothError::NoCameraAvailable),
    }
}

/// Owns the selected cameras and the optional printer for the whole run.
pub struct DeviceManager {
    preview: Arc<dyn CaptureDevice>,
    capture: Arc<dyn CaptureDevice>,
    printer: Option<Arc<dyn PrintDevice>>,
    calibration: Option<Calibration>,
    unavailable: Vec<Unavailable>,
}

impl DeviceManager {
    /// Probe the real hardware and build the manager.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoboothError::NoCameraAvailable`] if no camera backend
    /// could be opened; a missing printer is not an error.
    pub fn probe(
        devices: &DevicesConfig,
        printer: &PrinterConfig,
        calibration: Option<Calibration>,
    ) -> Result<Self> {
        Self::from_probes(Probes::hardware(devices, printer), calibration)
    }

    /// Build the manager from already probed backends.
    pub fn from_probes(probes: Probes, calibration: Option<Calibration>) -> Result<Self> {
        if let Some(calibration) = &calibration {
            calibration.validate()?;
        }

        let mut unavailable = Vec::new();
        let mut keep = |label: &str, result: ProbeResult<Arc<dyn CaptureDevice>>| {
            if let Some(reason) = result.reason() {
                unavailable.push(Unavailable {
                    backend: label.to_string(),
                    reason: reason.to_string(),
                });
            }
            result.found()
        };
        let vendor = keep("vendor", probes.vendor);
        let board = keep("board", probes.board);
        let webcam = keep("webcam", probes.webcam);

        let (preview, capture) = select_roles(vendor, board, webcam)?;

        let printer = match probes.printer {
            ProbeResult::Found(printer) => Some(printer),
            ProbeResult::NotAvailable { reason } => {
                info!(%reason, "No printer, printing disabled");
                unavailable.push(Unavailable {
                    backend: "printer".to_string(),
                    reason,
                });
                None
            }
        };

        let manager = Self {
            preview,
            capture,
            printer,
            calibration: calibration.filter(|c| !c.is_identity()),
            unavailable,
        };
        if !manager.is_hybrid() && manager.calibration.is_some() {
            debug!("Single camera, calibration ignored");
        }
        info!(mode = ?manager.mode(), printer = manager.printer_name(), "Devices ready");
        Ok(manager)
    }

    pub fn mode(&self) -> CameraMode {
        if self.is_hybrid() {
            CameraMode::Hybrid {
                preview: self.preview.kind(),
                capture: self.capture.kind(),
            }
        } else {
            CameraMode::Single {
                device: self.capture.kind(),
            }
        }
    }

    /// True when preview and capture are different physical devices.
    pub fn is_hybrid(&self) -> bool {
        !Arc::ptr_eq(&self.preview, &self.capture)
    }

    /// Calibration in effect, only ever `Some` in hybrid mode.
    pub fn calibration(&self) -> Option<Calibration> {
        self.calibration.filter(|_| self.is_hybrid())
    }

    pub fn unavailable(&self) -> &[Unavailable] {
        &self.unavailable
    }

    /// Live view frame from the preview device, calibrated and cropped.
    pub fn get_preview(&self, aspect_ratio: Option<f64>) -> Option<Frame> {
        match self.calibration().and_then(|c| c.preview_zoom().map(|z| (c, z))) {
            Some((calibration, factor)) => {
                let frame = self.preview.get_preview(None)?;
                let zoomed = calibration.apply(&frame, factor).ok()?;
                super::crop_preview(&zoomed, aspect_ratio)
            }
            None => self.preview.get_preview(aspect_ratio),
        }
    }

    /// Take a photo with the capture device.
    pub fn capture(
        &self,
        output_path: &Path,
        aspect_ratio: Option<f64>,
        flash: Option<FlashCallback<'_>>,
    ) -> Result<()> {
        match self.calibration().and_then(|c| c.capture_zoom().map(|z| (c, z))) {
            Some((calibration, factor)) => {
                self.capture.capture(output_path, None, flash)?;
                let photo = Frame::open(output_path)?;
                let zoomed = calibration.apply(&photo, factor)?;
                super::write_capture(&zoomed, output_path, aspect_ratio)
            }
            None => self.capture.capture(output_path, aspect_ratio, flash),
        }
    }

    pub fn has_physical_flash(&self) -> bool {
        self.capture.has_physical_flash()
    }

    pub fn has_printer(&self) -> bool {
        self.printer.is_some()
    }

    pub fn printer_name(&self) -> Option<&str> {
        self.printer.as_deref().map(|printer| printer.name())
    }

    pub fn print(&self, file_path: &Path, params: &PrintParams) -> Result<JobId> {
        self.printer
            .as_ref()
            .ok_or(PhotoboothError::PrinterUnavailable)?
            .print(file_path, params)
    }

    pub fn get_print_status(&self, job: &JobId) -> Result<PrintStatus> {
        self.printer
            .as_ref()
            .ok_or(PhotoboothError::PrinterUnavailable)?
            .get_print_status(job)
    }

    /// Half-transparent overlay of the two camera views under `candidate`,
    /// used to tune a calibration by eye.
    ///
    /// The zoomed stream is blended over the other one. Returns `None` when
    /// not in hybrid mode or when either camera has no frame yet.
    pub fn calibration_overlay(&self, candidate: &Calibration) -> Result<Option<Frame>> {
        if !self.is_hybrid() {
            return Ok(None);
        }
        candidate.validate()?;

        let (Some(preview), Some(capture)) =
            (self.preview.get_preview(None), self.capture.get_preview(None))
        else {
            warn!("Calibration overlay skipped, no live view frame");
            return Ok(None);
        };

        let (base, overlay) = match (candidate.preview_zoom(), candidate.capture_zoom()) {
            (_, Some(factor)) => (preview, candidate.apply(&capture, factor)?),
            (Some(factor), None) => (capture, candidate.apply(&preview, factor)?),
            (None, None) => (capture, preview),
        };
        let (width, height) = base.dimensions();
        let overlay = image_ops::resize_and_crop(&overlay, Some(height), Some(width))?;
        image_ops::blend(&base, &overlay, 0.5).map(Some)
    }
}
