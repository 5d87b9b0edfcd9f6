//! Mock devices and transports for testing without hardware.
//!
//! The device mocks record every operation for later assertions and support
//! error injection. The transport mocks plug into the real backends
//! ([`VendorCamera`](super::VendorCamera), [`BoardCamera`](super::BoardCamera),
//! [`Webcam`](super::Webcam), [`SpoolPrinter`](super::SpoolPrinter)) so their
//! logic runs unchanged in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use photobooth::device::mock::{MockCamera, Operation};
//! use photobooth::device::{BackendKind, CaptureDevice};
//!
//! let camera = MockCamera::new(BackendKind::Webcam);
//! camera.capture(Path::new("/tmp/capture-0.jpg"), Some(1.0), None).unwrap();
//!
//! camera.assert_operations(&[Operation::Capture {
//!     path: "/tmp/capture-0.jpg".to_string(),
//!     aspect_ratio: Some(1.0),
//!     flash: false,
//! }]);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tracing::{debug, trace};

use super::{
    BackendKind, BoardCameraDriver, BoardMode, CaptureDevice, FlashCallback, JobId, JobState,
    PrintDevice, PrintParams, PrintStatus, Spooler, VendorSession, VideoOpener, VideoSource,
    crop_preview, lock, with_flash, write_capture,
};
use crate::error::{PhotoboothError, Result};
use crate::frame::Frame;

/// Live view size of the mock cameras.
pub const MOCK_PREVIEW_SIZE: (u32, u32) = (160, 120);
/// Photo size of the mock cameras.
pub const MOCK_PHOTO_SIZE: (u32, u32) = (320, 240);

/// Deterministic test pattern: red follows x, green follows y.
#[must_use]
pub fn test_pattern(width: u32, height: u32, blue: u8) -> Frame {
    Frame::new(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            blue,
        ])
    }))
}

fn encode_jpeg(frame: &Frame) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut bytes, 90);
    if let Err(e) = frame.to_rgb().write_with_encoder(encoder) {
        debug!(error = %e, "Mock JPEG encoding failed");
    }
    bytes.into_inner()
}

const fn shade(kind: BackendKind) -> u8 {
    match kind {
        BackendKind::VendorProtocol => 40,
        BackendKind::BoardCamera => 120,
        BackendKind::Webcam => 200,
    }
}

/// Recorded operation for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GetPreview {
        aspect_ratio: Option<f64>,
    },
    Capture {
        path: String,
        aspect_ratio: Option<f64>,
        flash: bool,
    },
    Print {
        path: String,
        params: PrintParams,
    },
    PrintStatus {
        job: String,
    },
}

/// Mock camera for testing without real hardware.
pub struct MockCamera {
    kind: BackendKind,
    physical_flash: bool,
    preview_size: (u32, u32),
    photo_size: (u32, u32),
    capture_delay: Duration,
    preview_available: AtomicBool,
    operation_log: Mutex<Vec<Operation>>,
    error_injection: Mutex<Option<PhotoboothError>>,
}

impl MockCamera {
    /// Create a mock of the given backend family. Only the vendor-protocol
    /// mock has a physical flash, like the real backends.
    #[must_use]
    pub fn new(kind: BackendKind) -> Self {
        debug!(?kind, "Creating mock camera");
        Self {
            kind,
            physical_flash: kind == BackendKind::VendorProtocol,
            preview_size: MOCK_PREVIEW_SIZE,
            photo_size: MOCK_PHOTO_SIZE,
            capture_delay: Duration::ZERO,
            preview_available: AtomicBool::new(true),
            operation_log: Mutex::new(Vec::new()),
            error_injection: Mutex::new(None),
        }
    }

    // === Configuration ===

    #[must_use]
    pub const fn with_physical_flash(mut self, physical_flash: bool) -> Self {
        self.physical_flash = physical_flash;
        self
    }

    #[must_use]
    pub const fn with_photo_size(mut self, width: u32, height: u32) -> Self {
        self.photo_size = (width, height);
        self
    }

    /// Make every capture block for `delay`.
    #[must_use]
    pub const fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = delay;
        self
    }

    /// Simulate a live view that has no frame yet.
    pub fn set_preview_available(&self, available: bool) {
        self.preview_available.store(available, Ordering::SeqCst);
    }

    /// Inject an error for the next capture.
    pub fn inject_error(&self, error: PhotoboothError) {
        *lock(&self.error_injection) = Some(error);
    }

    // === Assertions ===

    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        lock(&self.operation_log).clone()
    }

    #[must_use]
    pub fn capture_count(&self) -> usize {
        lock(&self.operation_log)
            .iter()
            .filter(|op| matches!(op, Operation::Capture { .. }))
            .count()
    }

    /// Assert specific operations were performed.
    ///
    /// # Panics
    ///
    /// Panics if the operations don't match.
    pub fn assert_operations(&self, expected: &[Operation]) {
        let actual = self.operations();
        assert_eq!(
            actual, expected,
            "Operation mismatch.\nExpected: {expected:#?}\nActual: {actual:#?}",
        );
    }

    fn record_op(&self, op: Operation) {
        trace!(?op, "Recording operation");
        lock(&self.operation_log).push(op);
    }
}

impl CaptureDevice for MockCamera {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn get_preview(&self, aspect_ratio: Option<f64>) -> Option<Frame> {
        self.record_op(Operation::GetPreview { aspect_ratio });
        if !self.preview_available.load(Ordering::SeqCst) {
            return None;
        }
        let (width, height) = self.preview_size;
        crop_preview(&test_pattern(width, height, shade(self.kind)), aspect_ratio)
    }

    fn capture(
        &self,
        output_path: &Path,
        aspect_ratio: Option<f64>,
        flash: Option<FlashCallback<'_>>,
    ) -> Result<()> {
        self.record_op(Operation::Capture {
            path: output_path.display().to_string(),
            aspect_ratio,
            flash: flash.is_some(),
        });

        let photo = with_flash(self.physical_flash, flash, || {
            if !self.capture_delay.is_zero() {
                thread::sleep(self.capture_delay);
            }
            if let Some(error) = lock(&self.error_injection).take() {
                return Err(error);
            }
            let (width, height) = self.photo_size;
            Ok(test_pattern(width, height, shade(self.kind)))
        })?;
        write_capture(&photo, output_path, aspect_ratio)
    }

    fn has_physical_flash(&self) -> bool {
        self.physical_flash
    }
}

/// Mock printer. Each job reports pending for a configurable number of
/// status polls, then done.
pub struct MockPrinter {
    name: String,
    pending_polls: Option<usize>,
    next_id: AtomicU32,
    submitted: Mutex<Vec<(PathBuf, PrintParams)>>,
    polls: Mutex<HashMap<JobId, usize>>,
    operation_log: Mutex<Vec<Operation>>,
    error_injection: Mutex<Option<PhotoboothError>>,
}

impl MockPrinter {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pending_polls: Some(1),
            next_id: AtomicU32::new(1),
            submitted: Mutex::new(Vec::new()),
            polls: Mutex::new(HashMap::new()),
            operation_log: Mutex::new(Vec::new()),
            error_injection: Mutex::new(None),
        }
    }

    /// Report pending for the first `polls` status queries of each job.
    #[must_use]
    pub const fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = Some(polls);
        self
    }

    /// Jobs never finish, for timeout tests.
    #[must_use]
    pub const fn stuck(mut self) -> Self {
        self.pending_polls = None;
        self
    }

    /// Inject an error for the next submission.
    pub fn inject_error(&self, error: PhotoboothError) {
        *lock(&self.error_injection) = Some(error);
    }

    #[must_use]
    pub fn submitted(&self) -> Vec<(PathBuf, PrintParams)> {
        lock(&self.submitted).clone()
    }

    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        lock(&self.operation_log).clone()
    }
}

impl PrintDevice for MockPrinter {
    fn name(&self) -> &str {
        &self.name
    }

    fn print(&self, file_path: &Path, params: &PrintParams) -> Result<JobId> {
        lock(&self.operation_log).push(Operation::Print {
            path: file_path.display().to_string(),
            params: params.clone(),
        });
        if let Some(error) = lock(&self.error_injection).take() {
            return Err(error);
        }
        lock(&self.submitted).push((file_path.to_path_buf(), params.clone()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(JobId::new(format!("{}-{id}", self.name)))
    }

    fn get_print_status(&self, job: &JobId) -> Result<PrintStatus> {
        lock(&self.operation_log).push(Operation::PrintStatus {
            job: job.to_string(),
        });
        let mut polls = lock(&self.polls);
        let seen = polls.entry(job.clone()).or_insert(0);
        *seen += 1;
        Ok(match self.pending_polls {
            Some(pending) if *seen > pending => PrintStatus::Done,
            _ => PrintStatus::Pending,
        })
    }
}

/// Call recorded by [`MockVendorSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Manufacturer,
    Get { path: String },
    Set { path: String, value: String },
    Preview,
    Capture { path: String },
}

/// Scripted camera for [`VendorCamera`](super::VendorCamera).
pub struct MockVendorSession {
    manufacturer: String,
    settings: HashMap<String, String>,
    refused: HashSet<String>,
    fail_capture: bool,
    preview_jpeg: Vec<u8>,
    calls: Arc<Mutex<Vec<SessionCall>>>,
}

impl MockVendorSession {
    #[must_use]
    pub fn new(manufacturer: &str) -> Self {
        let (width, height) = MOCK_PREVIEW_SIZE;
        Self {
            manufacturer: manufacturer.to_string(),
            settings: HashMap::new(),
            refused: HashSet::new(),
            fail_capture: false,
            preview_jpeg: encode_jpeg(&test_pattern(width, height, 40)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the call log, usable after the session is boxed away.
    #[must_use]
    pub fn calls(&self) -> Arc<Mutex<Vec<SessionCall>>> {
        Arc::clone(&self.calls)
    }

    #[must_use]
    pub fn with_setting(mut self, path: &str, value: &str) -> Self {
        self.settings.insert(path.to_string(), value.to_string());
        self
    }

    /// Reject writes to `path`.
    #[must_use]
    pub fn refusing(mut self, path: &str) -> Self {
        self.refused.insert(path.to_string());
        self
    }

    #[must_use]
    pub const fn failing_capture(mut self) -> Self {
        self.fail_capture = true;
        self
    }

    fn record(&self, call: SessionCall) {
        lock(&self.calls).push(call);
    }
}

impl VendorSession for MockVendorSession {
    fn manufacturer(&mut self) -> Result<String> {
        self.record(SessionCall::Manufacturer);
        Ok(self.manufacturer.clone())
    }

    fn get_setting(&mut self, path: &str) -> Result<String> {
        self.record(SessionCall::Get {
            path: path.to_string(),
        });
        self.settings
            .get(path)
            .cloned()
            .ok_or_else(|| PhotoboothError::DeviceCommunication(format!("no such setting {path}")))
    }

    fn set_setting(&mut self, path: &str, value: &str) -> Result<()> {
        self.record(SessionCall::Set {
            path: path.to_string(),
            value: value.to_string(),
        });
        if self.refused.contains(path) {
            return Err(PhotoboothError::DeviceCommunication(format!("{path} is read-only")));
        }
        self.settings.insert(path.to_string(), value.to_string());
        Ok(())
    }

    fn capture_preview(&mut self) -> Result<Vec<u8>> {
        self.record(SessionCall::Preview);
        Ok(self.preview_jpeg.clone())
    }

    fn capture_image(&mut self, output_path: &Path) -> Result<()> {
        self.record(SessionCall::Capture {
            path: output_path.display().to_string(),
        });
        if self.fail_capture {
            return Err(PhotoboothError::DeviceCommunication("shutter jammed".to_string()));
        }
        let (width, height) = MOCK_PHOTO_SIZE;
        test_pattern(width, height, 40).save(output_path)
    }
}

/// Scripted driver for [`BoardCamera`](super::BoardCamera).
pub struct MockBoardDriver {
    mode: Option<BoardMode>,
    modes: Arc<Mutex<Vec<BoardMode>>>,
    fail_still: bool,
}

impl MockBoardDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: None,
            modes: Arc::new(Mutex::new(Vec::new())),
            fail_still: false,
        }
    }

    /// Handle to the history of configured modes.
    #[must_use]
    pub fn modes(&self) -> Arc<Mutex<Vec<BoardMode>>> {
        Arc::clone(&self.modes)
    }

    #[must_use]
    pub const fn failing_still(mut self) -> Self {
        self.fail_still = true;
        self
    }
}

impl Default for MockBoardDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardCameraDriver for MockBoardDriver {
    fn configure(&mut self, mode: BoardMode) -> Result<()> {
        lock(&self.modes).push(mode);
        self.mode = Some(mode);
        Ok(())
    }

    fn grab(&mut self) -> Result<Option<Frame>> {
        match self.mode {
            Some(BoardMode::Preview) => {
                let (width, height) = MOCK_PREVIEW_SIZE;
                Ok(Some(test_pattern(width, height, 120)))
            }
            Some(BoardMode::Still) if self.fail_still => Err(PhotoboothError::DeviceCommunication(
                "sensor timeout".to_string(),
            )),
            Some(BoardMode::Still) => {
                let (width, height) = MOCK_PHOTO_SIZE;
                Ok(Some(test_pattern(width, height, 120)))
            }
            None => Err(PhotoboothError::DeviceCommunication("not configured".to_string())),
        }
    }
}

/// Opens mock streams on a fixed set of indices.
pub struct MockVideoOpener {
    available: Vec<u32>,
    attempts: Mutex<Vec<u32>>,
}

impl MockVideoOpener {
    #[must_use]
    pub fn with_indices(available: &[u32]) -> Self {
        Self {
            available: available.to_vec(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Indices tried so far, in order.
    pub fn attempts(&self) -> MutexGuard<'_, Vec<u32>> {
        lock(&self.attempts)
    }
}

impl VideoOpener for MockVideoOpener {
    fn open(&self, index: u32) -> Result<Box<dyn VideoSource>> {
        lock(&self.attempts).push(index);
        if self.available.contains(&index) {
            Ok(Box::new(MockVideoSource))
        } else {
            Err(PhotoboothError::DeviceCommunication(format!("/dev/video{index} not found")))
        }
    }
}

struct MockVideoSource;

impl VideoSource for MockVideoSource {
    fn read_frame(&mut self) -> Result<Frame> {
        let (width, height) = MOCK_PREVIEW_SIZE;
        Ok(test_pattern(width, height, 200))
    }
}

/// Scripted spooler for [`SpoolPrinter`](super::SpoolPrinter).
pub struct MockSpooler {
    destinations: Vec<String>,
    default: Option<String>,
    script: Arc<Mutex<VecDeque<JobState>>>,
    fail_status: bool,
    next_id: AtomicU32,
}

impl MockSpooler {
    #[must_use]
    pub fn new(destinations: &[&str]) -> Self {
        Self {
            destinations: destinations.iter().map(ToString::to_string).collect(),
            default: None,
            script: Arc::new(Mutex::new(VecDeque::new())),
            fail_status: false,
            next_id: AtomicU32::new(1),
        }
    }

    #[must_use]
    pub fn with_default(mut self, destination: &str) -> Self {
        self.default = Some(destination.to_string());
        self
    }

    /// Handle to the queue of job states returned by successive queries.
    /// An empty queue reports [`JobState::Pending`].
    #[must_use]
    pub fn script(&self) -> Arc<Mutex<VecDeque<JobState>>> {
        Arc::clone(&self.script)
    }

    #[must_use]
    pub const fn failing_status(mut self) -> Self {
        self.fail_status = true;
        self
    }
}

impl Spooler for MockSpooler {
    fn default_destination(&self) -> Result<Option<String>> {
        Ok(self.default.clone())
    }

    fn destinations(&self) -> Result<Vec<String>> {
        Ok(self.destinations.clone())
    }

    fn submit(&self, destination: &str, _file: &Path, _params: &PrintParams) -> Result<JobId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(JobId::new(format!("{destination}-{id}")))
    }

    fn job_state(&self, _destination: &str, _job: &JobId) -> Result<JobState> {
        if self.fail_status {
            return Err(PhotoboothError::PrintFailed("scheduler not running".to_string()));
        }
        Ok(lock(&self.script).pop_front().unwrap_or(JobState::Pending))
    }
}
