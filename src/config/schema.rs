//! Application configuration schema.
//!
//! # Example `config.toml`
//!
//! ```toml
//! templates_dir = "~/photobooth/templates"
//!
//! [session]
//! dcim_dir = "~/DCIM"
//! countdown_secs = 3
//! print_timeout_secs = 30
//! copies = 1
//!
//! [devices.vendor]
//! port = "usb:001,004"
//!
//! [devices.webcam]
//! index = 0
//! flip_preview = true
//!
//! [printer]
//! name = "Canon_SELPHY_CP1300"
//!
//! [calibration]
//! zoom = 1.35
//! x_offset = -12
//! y_offset = 40
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::device::Calibration;
use crate::error::{PhotoboothError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding template documents.
    pub templates_dir: Option<PathBuf>,

    pub session: SessionConfig,

    pub devices: DevicesConfig,

    pub printer: PrinterConfig,

    /// Preview/capture alignment for hybrid camera setups.
    pub calibration: Option<Calibration>,
}

impl AppConfig {
    /// Check values serde cannot check.
    pub fn validate(&self) -> Result<()> {
        if let Some(calibration) = &self.calibration {
            calibration.validate()?;
        }
        if self.session.copies == 0 {
            return Err(PhotoboothError::ConfigInvalid(
                "session.copies must be at least 1".to_string(),
            ));
        }
        if self.session.print_timeout_secs == 0 {
            return Err(PhotoboothError::ConfigInvalid(
                "session.print_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Photo session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Root of the `tmp/` and `save/` session directories.
    pub dcim_dir: PathBuf,

    /// Seconds of countdown before each shot.
    pub countdown_secs: u64,

    /// Seconds a print job may stay pending before it counts as stuck.
    pub print_timeout_secs: u64,

    /// Copies requested per print.
    pub copies: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dcim_dir: PathBuf::from("DCIM"),
            countdown_secs: 3,
            print_timeout_secs: 30,
            copies: 1,
        }
    }
}

/// Per-backend probing switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DevicesConfig {
    pub vendor: VendorConfig,
    pub board: BoardConfig,
    pub webcam: WebcamConfig,
}

/// DSLR reached through gphoto2.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VendorConfig {
    pub enabled: bool,
    /// gphoto2 port (`usb:001,004`); first detected camera when unset.
    pub port: Option<String>,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: None,
        }
    }
}

/// Raspberry Pi camera module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BoardConfig {
    pub enabled: bool,
    /// rpicam camera number.
    pub camera: u32,
    /// Mirror still photos like the preview.
    pub mirror_still: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            camera: 0,
            mirror_still: false,
        }
    }
}

/// USB webcam.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebcamConfig {
    pub enabled: bool,
    /// Video device index; the first of 0, 1, 2 that opens when unset.
    pub index: Option<u32>,
    /// Rotate preview frames by 180 degrees.
    pub flip_preview: bool,
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index: None,
            flip_preview: false,
        }
    }
}

/// Print spooler destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PrinterConfig {
    pub enabled: bool,
    /// Spooler destination; system default when unset or `"default"`.
    pub name: Option<String>,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: None,
        }
    }
}
