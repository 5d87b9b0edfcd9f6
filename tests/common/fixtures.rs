//! Test fixture helpers for creating temporary test data.
//!
//! Photos, template documents and configuration files live in temporary
//! directories that are cleaned up on drop.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tempfile::TempDir;

/// Solid-color photos in a temporary directory.
pub struct TestPhotos {
    pub dir: TempDir,
    pub paths: Vec<PathBuf>,
}

impl TestPhotos {
    /// `colors.len()` JPEG photos named `photo-<i>.jpg`.
    ///
    /// # Panics
    ///
    /// Panics if image creation fails.
    #[must_use]
    pub fn solid(colors: &[[u8; 3]], width: u32, height: u32) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let paths = colors
            .iter()
            .enumerate()
            .map(|(i, &rgb)| {
                let path = dir.path().join(format!("photo-{i}.jpg"));
                RgbImage::from_pixel(width, height, Rgb(rgb))
                    .save(&path)
                    .unwrap_or_else(|_| panic!("Failed to save image at {path:?}"));
                path
            })
            .collect();
        Self { dir, paths }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// A directory of template documents.
pub struct TemplateDir {
    pub dir: TempDir,
}

impl TemplateDir {
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `content` as `file_name` and return its path.
    ///
    /// # Panics
    ///
    /// Panics if the write fails.
    pub fn write(&self, file_name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(file_name);
        fs::write(&path, content).unwrap_or_else(|_| panic!("Failed to write {path:?}"));
        path
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TemplateDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Three-photo strip on a 4x6 inch page at 300 DPI, duplicated for printing.
pub const STRIP_TEMPLATE_JSON: &str = r#"{
    "name": "Photo Strip",
    "description": "Three photos, printed twice side by side",
    "page": {"width": 1240, "height": 3688},
    "photos": [
        {"x": 60, "y": 60, "width": 1120, "height": 840},
        {"x": 60, "y": 960, "width": 1120, "height": 840},
        {"x": 60, "y": 1860, "width": 1120, "height": 840}
    ],
    "duplicate_horizontal": true,
    "print_params": {"media": "Postcard", "fit-to-page": true}
}"#;

/// Single landscape photo with a bottom banner.
pub const POSTCARD_TEMPLATE_YAML: &str = "\
name: Postcard
page:
  width: 1800
  height: 1200
photos:
  - x: 0
    y: 0
    width: 1800
    height: 1000
margin_percent: 0
";

/// Two square photos side by side.
pub const PAIR_TEMPLATE_TOML: &str = r#"
name = "Pair"

[page]
width = 800
height = 400

[[photos]]
x = 0
y = 0
width = 400
height = 400

[[photos]]
x = 400
y = 0
width = 400
height = 400
"#;

/// Write a configuration file with every camera backend disabled.
///
/// # Panics
///
/// Panics if the write fails.
pub fn write_offline_config(dir: &Path, templates_dir: &Path) -> PathBuf {
    let path = dir.join("photobooth.toml");
    let content = format!(
        r#"templates_dir = "{}"

[session]
dcim_dir = "DCIM"

[devices.vendor]
enabled = false

[devices.board]
enabled = false

[devices.webcam]
enabled = false

[printer]
enabled = false
"#,
        templates_dir.display()
    );
    fs::write(&path, content).unwrap_or_else(|_| panic!("Failed to write {path:?}"));
    path
}
