//! Configuration loading.
//!
//! The application reads one TOML file, by default
//! `<config dir>/photobooth/config.toml`. A missing file yields the defaults.
//! Template documents share the format detection in [`ConfigFormat`].

mod format;
mod path;
mod schema;

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::error::{PhotoboothError, Result};

pub use format::ConfigFormat;
pub use path::{home_dir, resolve_path};
pub use schema::{
    AppConfig, BoardConfig, DevicesConfig, PrinterConfig, SessionConfig, VendorConfig,
    WebcamConfig,
};

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "PHOTOBOOTH_CONFIG";

const DEFAULT_TEMPLATES_DIR: &str = "templates";

/// `<config dir>/photobooth/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("photobooth").join("config.toml"))
}

impl AppConfig {
    /// Load the configuration file at `path`.
    ///
    /// A missing file yields [`AppConfig::default`]. Relative directories in
    /// the file are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(PhotoboothError::Io(e)),
        };
        debug!(bytes = content.len(), "Read configuration file");

        let mut config = Self::parse(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base)?;
        info!(
            dcim = %config.session.dcim_dir.display(),
            printer = ?config.printer.name,
            calibrated = config.calibration.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load from `path`, else from [`default_config_path`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => Self::load(&path),
            None => {
                warn!("No configuration directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate TOML content without resolving paths.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = ConfigFormat::Toml.parse(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve `~` and file-relative directories.
    pub fn resolve_paths(&mut self, base: &Path) -> Result<()> {
        self.session.dcim_dir = resolve_path(&self.session.dcim_dir, base)?;
        if let Some(dir) = self.templates_dir.take() {
            self.templates_dir = Some(resolve_path(&dir, base)?);
        }
        Ok(())
    }

    /// Configured templates directory, `./templates` when unset.
    pub fn templates_dir(&self) -> PathBuf {
        self.templates_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR))
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = ConfigFormat::Toml.render(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}
