//! Device abstraction layer for cameras and printers.
//!
//! Every backend implements [`CaptureDevice`] or [`PrintDevice`] on top of a
//! narrow transport trait, so the backend logic runs against mocks in tests
//! and against the real tools (`gphoto2`, `rpicam-*`, V4L2, CUPS) on a booth.

pub mod board;
mod gphoto2_cli;
pub mod mailbox;
pub mod manager;
mod mjpeg;
pub mod mock;
pub mod printer;
mod rpicam;
#[cfg(feature = "v4l2")]
mod v4l2;
pub mod vendor;
pub mod webcam;

pub use board::{BoardCamera, BoardCameraDriver, BoardMode};
pub use gphoto2_cli::Gphoto2Cli;
pub use mailbox::LatestFrame;
pub use manager::{Calibration, CameraMode, DeviceManager, Probes, Unavailable};
pub use mjpeg::MjpegSplitter;
pub use printer::{JobState, LpSpooler, SpoolPrinter, Spooler};
pub use rpicam::RpicamDriver;
#[cfg(feature = "v4l2")]
pub use v4l2::V4lOpener;
pub use vendor::{CameraSettings, Setting, VendorCamera, VendorSession};
pub use webcam::{VideoOpener, VideoSource, Webcam};

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PhotoboothError, Result};
use crate::frame::Frame;
use crate::image_ops;

/// The three camera backend families, in decreasing preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// DSLR driven over a widget-tree configuration protocol.
    VendorProtocol,
    /// Single-board-computer camera module.
    BoardCamera,
    /// Generic USB webcam.
    Webcam,
}

impl BackendKind {
    pub const ALL: [Self; 3] = [Self::VendorProtocol, Self::BoardCamera, Self::Webcam];

    pub const fn name(self) -> &'static str {
        match self {
            Self::VendorProtocol => "vendor-protocol camera",
            Self::BoardCamera => "board camera",
            Self::Webcam => "webcam",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Phase of a software flash driven around an exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashPhase {
    Start,
    Stop,
}

/// Callback driving a software flash (ring light, screen whiteout).
pub type FlashCallback<'a> = &'a (dyn Fn(FlashPhase) + Sync);

/// Capability contract shared by every camera backend.
///
/// Implementations are `Send + Sync` so a single `Arc` can serve both the
/// preview and the capture role. Each backend serializes access to its own
/// transport; callers still never issue two overlapping captures.
pub trait CaptureDevice: Send + Sync {
    /// Backend family of this device.
    fn kind(&self) -> BackendKind;

    /// Most recent viewfinder frame, optionally center-cropped to
    /// `aspect_ratio`.
    ///
    /// Never blocks on the hardware. `None` means no frame is available right
    /// now and the caller should try again on its next tick.
    fn get_preview(&self, aspect_ratio: Option<f64>) -> Option<Frame>;

    /// Take one full-resolution photo and write it to `output_path`.
    ///
    /// When `flash` is given and the device has no physical flash, it is
    /// called with [`FlashPhase::Start`] right before the exposure and
    /// [`FlashPhase::Stop`] right after, even if the exposure fails.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoboothError::CaptureFailed`] if no photo was produced.
    fn capture(
        &self,
        output_path: &Path,
        aspect_ratio: Option<f64>,
        flash: Option<FlashCallback<'_>>,
    ) -> Result<()>;

    /// Whether the hardware handles illumination itself.
    fn has_physical_flash(&self) -> bool;
}

/// Run `expose` inside a software flash window.
///
/// The callback is suppressed entirely when the device has a physical flash.
pub(crate) fn with_flash<T>(
    physical_flash: bool,
    flash: Option<FlashCallback<'_>>,
    expose: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let flash = flash.filter(|_| !physical_flash);
    if let Some(cb) = flash {
        cb(FlashPhase::Start);
    }
    let result = expose();
    if let Some(cb) = flash {
        cb(FlashPhase::Stop);
    }
    result
}

/// Crop a frame to the requested aspect ratio and write it.
pub(crate) fn write_capture(
    frame: &Frame,
    output_path: &Path,
    aspect_ratio: Option<f64>,
) -> Result<()> {
    let cropped = image_ops::crop_to_aspect_ratio(frame, aspect_ratio)?;
    cropped.save(output_path)
}

/// Preview helper: crop a frame, logging instead of failing.
pub(crate) fn crop_preview(frame: &Frame, aspect_ratio: Option<f64>) -> Option<Frame> {
    match image_ops::crop_to_aspect_ratio(frame, aspect_ratio) {
        Ok(frame) => Some(frame),
        Err(e) => {
            debug!(error = %e, "Dropping preview frame");
            None
        }
    }
}

/// Lock a transport mutex. A panic while holding it leaves the transport
/// usable, so poisoning is ignored.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn capture_failed(path: &Path, reason: impl fmt::Display) -> PhotoboothError {
    PhotoboothError::CaptureFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Outcome of probing one backend.
#[derive(Debug)]
pub enum ProbeResult<T> {
    Found(T),
    NotAvailable { reason: String },
}

impl<T> ProbeResult<T> {
    pub fn not_available(reason: impl Into<String>) -> Self {
        Self::NotAvailable {
            reason: reason.into(),
        }
    }

    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotAvailable { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Found(_) => None,
            Self::NotAvailable { reason } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProbeResult<U> {
        match self {
            Self::Found(value) => ProbeResult::Found(f(value)),
            Self::NotAvailable { reason } => ProbeResult::NotAvailable { reason },
        }
    }
}

/// Run one backend constructor, collapsing errors and panics into
/// [`ProbeResult::NotAvailable`].
pub fn probe<T>(label: &str, open: impl FnOnce() -> Result<T>) -> ProbeResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(open)) {
        Ok(Ok(handle)) => {
            debug!(backend = label, "Probe succeeded");
            ProbeResult::Found(handle)
        }
        Ok(Err(e)) => {
            debug!(backend = label, error = %e, "Probe found nothing");
            ProbeResult::not_available(e.to_string())
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "backend panicked".to_string());
            warn!(backend = label, %reason, "Probe panicked");
            ProbeResult::not_available(reason)
        }
    }
}

/// Opaque spooler job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a submitted print job. Only ever moves from pending to done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintStatus {
    Pending,
    Done,
}

/// Spooler options forwarded verbatim (`media`, `copies`, ...).
pub type PrintParams = BTreeMap<String, String>;

/// Capability contract of a print spooler destination.
pub trait PrintDevice: Send + Sync {
    /// Resolved destination (queue) name.
    fn name(&self) -> &str;

    /// Submit exactly one job for `file_path`.
    fn print(&self, file_path: &Path, params: &PrintParams) -> Result<JobId>;

    /// Current status of `job`. Once [`PrintStatus::Done`] is reported for a
    /// job it is reported for every later call.
    fn get_print_status(&self, job: &JobId) -> Result<PrintStatus>;
}
