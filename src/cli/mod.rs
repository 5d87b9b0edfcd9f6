//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Photobooth - cameras, collages and printing for a touchscreen booth.
///
/// Robot Mode: Use --robot or --format=json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "photobooth", version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Output format (text for humans, json for scripts)
    #[arg(long, short = 'f', default_value = "text", global = true, env = "PHOTOBOOTH_FORMAT")]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file
    #[arg(long, short = 'c', global = true, env = "PHOTOBOOTH_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // === Hardware ===
    /// Probe cameras and printer and show the role assignment
    Probe,

    /// Take one photo
    Capture(CaptureArgs),

    /// Write a half-transparent overlay of both cameras to tune a hybrid setup
    Calibrate(CalibrateArgs),

    /// Send a file to the printer
    Print(PrintArgs),

    // === Collages ===
    /// List the collage templates
    Templates(TemplatesArgs),

    /// Assemble a collage from photo files
    Assemble(AssembleArgs),

    /// Render a template with placeholder photos
    TemplatePreview(TemplatePreviewArgs),

    // === Workflow ===
    /// Run a complete photo session: shots, collage, print, save
    Session(SessionArgs),

    // === Utilities ===
    /// Show the effective configuration
    Config(ConfigArgs),

    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// === Argument Structs ===

/// Template selection shared by the collage commands.
#[derive(Parser, Debug, Clone)]
pub struct TemplateSelector {
    /// Template name, or path to a template document
    #[arg(long, short = 't')]
    pub template: Option<String>,

    /// Templates directory (overrides the configuration)
    #[arg(long, value_name = "DIR")]
    pub templates_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct CaptureArgs {
    /// Output JPEG path
    pub output: PathBuf,

    /// Crop to this width/height ratio
    #[arg(long, short = 'a')]
    pub aspect_ratio: Option<f64>,

    /// Fire the status light as a flash when the camera has none
    #[arg(long)]
    pub flash: bool,
}

/// Arguments for the calibration overlay.
///
/// # Examples
///
/// ```bash
/// # Preview camera sees more: zoom it in
/// photobooth calibrate overlay.jpg --zoom 1.3 --x-offset -10
///
/// # Keep the values
/// photobooth calibrate overlay.jpg --zoom 1.3 --save
/// ```
#[derive(Parser, Debug)]
pub struct CalibrateArgs {
    /// Output JPEG path for the overlay
    pub output: PathBuf,

    /// Zoom factor (>= 1 zooms the preview, < 1 zooms the capture)
    #[arg(long, short = 'z', default_value = "1.0")]
    pub zoom: f64,

    /// Horizontal pan in pixels
    #[arg(long, short = 'x', default_value = "0", allow_negative_numbers = true)]
    pub x_offset: i32,

    /// Vertical pan in pixels
    #[arg(long, short = 'y', default_value = "0", allow_negative_numbers = true)]
    pub y_offset: i32,

    /// Store the calibration in the configuration file
    #[arg(long)]
    pub save: bool,
}

#[derive(Parser, Debug)]
pub struct PrintArgs {
    /// File to print
    pub file: PathBuf,

    /// Number of copies
    #[arg(long, short = 'n', default_value = "1")]
    pub copies: u32,

    /// Take print options from this template
    #[command(flatten)]
    pub selector: TemplateSelector,

    /// Wait until the job leaves the queue
    #[arg(long, short = 'w')]
    pub wait: bool,
}

#[derive(Parser, Debug)]
pub struct TemplatesArgs {
    /// Templates directory (overrides the configuration)
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct AssembleArgs {
    /// Photos, in slot order
    #[arg(required = true, value_name = "PHOTO")]
    pub photos: Vec<PathBuf>,

    /// Output JPEG path (a `_small` companion is written next to it)
    #[arg(long, short = 'o')]
    pub output: PathBuf,

    #[command(flatten)]
    pub selector: TemplateSelector,

    /// Apply print-time duplication
    #[arg(long)]
    pub for_print: bool,
}

#[derive(Parser, Debug)]
pub struct TemplatePreviewArgs {
    #[command(flatten)]
    pub selector: TemplateSelector,

    /// Copy the preview here instead of leaving it in the temp directory
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct SessionArgs {
    #[command(flatten)]
    pub selector: TemplateSelector,

    /// Print the collage (copies from the configuration unless given)
    #[arg(long, short = 'p')]
    pub print: bool,

    /// Number of copies
    #[arg(long, short = 'n')]
    pub copies: Option<u32>,

    /// Seconds of countdown before each shot (overrides the configuration)
    #[arg(long)]
    pub countdown: Option<u64>,

    /// Leave the files in the temp directory instead of archiving them
    #[arg(long)]
    pub no_save: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Only print the configuration file path
    #[arg(long)]
    pub path: bool,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
