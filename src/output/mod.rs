//! Output mode abstraction for robot and human output.

use std::path::Path;

use serde::Serialize;

use crate::cli::Cli;
use crate::collage::TemplateCollage;
use crate::config::AppConfig;
use crate::device::{BackendKind, Calibration, CameraMode, DeviceManager, Unavailable};
use crate::error::PhotoboothError;

pub mod human;
pub mod robot;

pub use human::HumanOutput;
pub use robot::RobotOutput;

// === Report Types ===

/// Result of probing the hardware.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    #[serde(flatten)]
    pub mode: CameraMode,
    pub physical_flash: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<Calibration>,
    pub unavailable: Vec<Unavailable>,
}

impl ProbeReport {
    #[must_use]
    pub fn new(devices: &DeviceManager) -> Self {
        Self {
            mode: devices.mode(),
            physical_flash: devices.has_physical_flash(),
            printer: devices.printer_name().map(ToString::to_string),
            calibration: devices.calibration(),
            unavailable: devices.unavailable().to_vec(),
        }
    }

    /// Backends serving the preview and capture roles.
    #[must_use]
    pub const fn roles(&self) -> (BackendKind, BackendKind) {
        match self.mode {
            CameraMode::Single { device } => (device, device),
            CameraMode::Hybrid { preview, capture } => (preview, capture),
        }
    }
}

/// One loaded template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub photos: usize,
    pub aspect_ratio: f64,
    pub page_width: u32,
    pub page_height: u32,
    pub duplicate_horizontal: bool,
}

impl From<&TemplateCollage> for TemplateSummary {
    fn from(template: &TemplateCollage) -> Self {
        let page = template.page_size();
        Self {
            name: template.name().to_string(),
            description: template.description().to_string(),
            file: template.source().map(|p| p.display().to_string()),
            photos: template.photos_required(),
            aspect_ratio: template.get_aspect_ratio(),
            page_width: page.width,
            page_height: page.height,
            duplicate_horizontal: template.duplicates_horizontally(),
        }
    }
}

/// Result of a print submission.
#[derive(Debug, Clone, Serialize)]
pub struct PrintReport {
    pub job_id: String,
    pub file: String,
    pub printer: String,
    pub copies: u32,
    /// `Some(true)` once waited for and finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Result of a complete photo session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    pub template: String,
    pub shots: Vec<String>,
    pub failed_shots: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print: Option<PrintReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<String>,
}

/// JSON formatting options for robot mode.
#[derive(Debug, Clone, Copy)]
pub enum RobotFormat {
    /// Pretty-printed JSON (default for --robot).
    Json,
    /// Single-line JSON (--format=json-compact).
    JsonCompact,
}

/// Determines how command output is rendered.
#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    /// JSON output for scripting.
    Robot(RobotFormat),
    /// Styled terminal output for human users.
    Human { color: bool, quiet: bool },
}

impl OutputMode {
    /// Create OutputMode from CLI arguments.
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.use_json() {
            let format = if cli.use_compact_json() {
                RobotFormat::JsonCompact
            } else {
                RobotFormat::Json
            };
            Self::Robot(format)
        } else {
            Self::Human {
                color: !cli.no_color,
                quiet: cli.quiet,
            }
        }
    }

    /// Returns true if output should be JSON.
    #[must_use]
    pub const fn is_robot(&self) -> bool {
        matches!(self, Self::Robot(_))
    }

    /// Convert into the appropriate Output implementation.
    #[must_use]
    pub fn into_output(self) -> Box<dyn Output> {
        match self {
            Self::Robot(format) => Box::new(RobotOutput::new(format)),
            Self::Human { color, quiet } => Box::new(HumanOutput::new(color, quiet)),
        }
    }
}

/// Trait for all output operations.
///
/// Commands call these methods without knowing the output mode.
pub trait Output {
    // Basic messages
    fn success(&self, message: &str);
    fn error(&self, error: &PhotoboothError);
    fn error_message(&self, message: &str);
    fn warning(&self, message: &str);
    fn info(&self, message: &str);

    // Hardware
    fn probe_report(&self, report: &ProbeReport);
    fn photo_captured(&self, path: &Path);
    fn calibration_written(&self, calibration: &Calibration, overlay: &Path, saved: bool);
    fn print_submitted(&self, report: &PrintReport);

    // Collages
    fn template_list(&self, templates: &[TemplateSummary]);
    fn collage_written(&self, path: &Path, width: u32, height: u32);
    fn preview_written(&self, template: &str, path: &Path);
    fn session_finished(&self, report: &SessionReport);

    // Configuration and metadata
    fn config(&self, path: Option<&Path>, config: &AppConfig);
    fn config_path(&self, path: Option<&Path>);
    fn version_info(&self, version: &str, git_sha: Option<&str>, build_time: Option<&str>);
}
