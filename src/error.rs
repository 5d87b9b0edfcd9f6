//! Error types for photobooth operations.

use std::path::Path;

use thiserror::Error;

/// Primary error type for photobooth operations.
#[derive(Error, Debug)]
pub enum PhotoboothError {
    // Startup errors
    #[error("No usable camera found: a board camera, a DSLR or a webcam is required")]
    NoCameraAvailable,

    #[error("No valid collage template found in {dir}")]
    NoTemplates { dir: String },

    // Device errors
    #[error("Device communication error: {0}")]
    DeviceCommunication(String),

    #[error("Capture to '{path}' failed: {reason}")]
    CaptureFailed { path: String, reason: String },

    #[error("Shot {requested} requested out of order, expected shot {expected}")]
    ShotOutOfOrder { requested: usize, expected: usize },

    #[error("A {task} worker is still running")]
    WorkerBusy { task: String },

    #[error("Worker '{name}' panicked")]
    WorkerPanicked { name: String },

    // Printer errors
    #[error("No printer available")]
    PrinterUnavailable,

    #[error("Printer '{name}' not found in spooler")]
    PrinterNotFound { name: String },

    #[error("Print submission failed: {0}")]
    PrintFailed(String),

    #[error("Print job {job_id} not finished after {waited_secs}s, printer may be stuck")]
    PrintTimeout { job_id: String, waited_secs: u64 },

    // Image errors
    #[error("Invalid target dimensions {width}x{height}: both must be greater than 0")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid zoom factor {factor}: must be at least 1.0")]
    InvalidZoom { factor: f64 },

    #[error("Invalid aspect ratio {ratio}: must be a positive number")]
    InvalidAspectRatio { ratio: f64 },

    #[error("Invalid calibration zoom {zoom}: must be greater than 0")]
    InvalidCalibration { zoom: f64 },

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Image file not found: {path}")]
    ImageNotFound { path: String },

    // Configuration errors
    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid template '{path}': {reason}")]
    TemplateInvalid { path: String, reason: String },

    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl PhotoboothError {
    /// Returns true if the application cannot start without operator intervention.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::NoCameraAvailable | Self::NoTemplates { .. })
    }

    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoCameraAvailable
                | Self::NoTemplates { .. }
                | Self::PrinterUnavailable
                | Self::PrinterNotFound { .. }
                | Self::PrintTimeout { .. }
                | Self::ImageNotFound { .. }
                | Self::TemplateNotFound { .. }
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NoCameraAvailable => {
                Some("Connect a DSLR over USB, enable the camera module or plug in a webcam")
            }
            Self::NoTemplates { .. } => {
                Some("Add a .json, .yaml or .toml template document to the templates directory")
            }
            Self::PrinterUnavailable | Self::PrinterNotFound { .. } => {
                Some("Check the printer queue at http://localhost:631")
            }
            Self::PrintTimeout { .. } => Some("Check paper and ink, the collage has been saved"),
            Self::InvalidZoom { .. } | Self::InvalidCalibration { .. } => {
                Some("Run: photobooth calibrate")
            }
            Self::TemplateNotFound { .. } => Some("Run: photobooth templates"),
            _ => None,
        }
    }

    pub(crate) fn image(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::ImageProcessing(format!("{}: {err}", path.display()))
    }
}

impl From<image::ImageError> for PhotoboothError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing(err.to_string())
    }
}

/// Convenience type alias for Results using PhotoboothError.
pub type Result<T> = std::result::Result<T, PhotoboothError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| PhotoboothError::Other(format!("{}: {e}", f().into())))
    }
}
