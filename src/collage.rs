//! Template-driven collage compositor.
//!
//! A template document describes a fixed-size page and an ordered list of
//! photo slots. Assembling a collage pastes one photo per slot (cover fit,
//! clipped at the page edge) between an optional background and foreground.
//!
//! # Example template
//!
//! ```json
//! {
//!   "name": "Strip",
//!   "page": { "width": 1240, "height": 3688 },
//!   "photos": [
//!     { "x": 60, "y": 60, "width": 1120, "height": 840 },
//!     { "x": 60, "y": 960, "width": 1120, "height": 840 }
//!   ],
//!   "foreground": "strip_fg.png",
//!   "duplicate_horizontal": true,
//!   "print_params": { "media": "Postcard.Fullbleed" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use image::imageops;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfigFormat, resolve_path};
use crate::device::PrintParams;
use crate::error::{PhotoboothError, Result};
use crate::frame::Frame;
use crate::image_ops::{
    SMALL_MAX_HEIGHT, SMALL_MAX_WIDTH, alpha_composite, blend, downscale_to_bounds,
    resize_and_crop, stretch,
};

/// Gray used for the placeholder photos of a layout preview.
const PLACEHOLDER_GRAY: u8 = 0x75;
/// Size of the placeholder photos of a layout preview.
const PLACEHOLDER_SIZE: (u32, u32) = (1920, 1080);
/// Opacity of a foreground without an alpha channel.
const FOREGROUND_OPACITY: f32 = 0.5;

const DEFAULT_NAME: &str = "Unnamed Template";
const DEFAULT_MARGIN_PERCENT: f64 = 5.0;

/// Page size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

/// Rectangle on the page receiving one photo. May extend past the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PhotoSlot {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Scalar print option as written in a template document.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// A template document as stored on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Template {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub page: PageSize,

    #[serde(default)]
    pub photos: Vec<PhotoSlot>,

    /// Image stretched under the photos.
    #[serde(default)]
    pub background: Option<PathBuf>,

    /// Image composited over the photos, with its alpha channel if it has one.
    #[serde(default)]
    pub foreground: Option<PathBuf>,

    #[serde(default = "default_margin_percent")]
    pub margin_percent: f64,

    /// Print two copies side by side on a double-wide page.
    #[serde(default)]
    pub duplicate_horizontal: bool,

    #[serde(default)]
    pub print_params: BTreeMap<String, ParamValue>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

const fn default_margin_percent() -> f64 {
    DEFAULT_MARGIN_PERCENT
}

impl Template {
    /// Parse a template document in the given format.
    pub fn parse(text: &str, format: ConfigFormat) -> Result<Self> {
        let template: Self = format.parse(text)?;
        template.validate()?;
        Ok(template)
    }

    fn validate(&self) -> Result<()> {
        if self.page.width == 0 || self.page.height == 0 {
            return Err(PhotoboothError::InvalidDimensions {
                width: self.page.width,
                height: self.page.height,
            });
        }
        if let Some(slot) = self.photos.iter().find(|s| s.width == 0 || s.height == 0) {
            return Err(PhotoboothError::InvalidDimensions {
                width: slot.width,
                height: slot.height,
            });
        }
        Ok(())
    }
}

/// A loaded template, ready to assemble collages.
#[derive(Debug, Clone)]
pub struct TemplateCollage {
    template: Template,
    source: Option<PathBuf>,
}

impl TemplateCollage {
    /// Wrap an already parsed template. Relative overlay paths stay relative
    /// to the working directory.
    pub fn new(template: Template) -> Result<Self> {
        template.validate()?;
        Ok(Self {
            template,
            source: None,
        })
    }

    /// Load a template document, detecting its format from the extension.
    ///
    /// Background and foreground paths are resolved relative to the
    /// document's directory.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self> {
        let invalid = |reason: String| PhotoboothError::TemplateInvalid {
            path: path.display().to_string(),
            reason,
        };

        let format = ConfigFormat::from_extension(path)
            .ok_or_else(|| invalid("unsupported file extension".to_string()))?;
        let text = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let mut template = Template::parse(&text, format).map_err(|e| invalid(e.to_string()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for overlay in [&mut template.background, &mut template.foreground] {
            if let Some(p) = overlay.take() {
                *overlay = Some(resolve_path(&p, base)?);
            }
        }

        debug!(name = %template.name, slots = template.photos.len(), "Template parsed");
        Ok(Self {
            template,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn description(&self) -> &str {
        &self.template.description
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Document this template was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub const fn page_size(&self) -> PageSize {
        self.template.page
    }

    pub fn margin_percent(&self) -> f64 {
        self.template.margin_percent
    }

    pub const fn duplicates_horizontally(&self) -> bool {
        self.template.duplicate_horizontal
    }

    /// One photo per slot.
    pub fn photos_required(&self) -> usize {
        self.template.photos.len()
    }

    /// Width over height of the first slot, `1.0` without slots.
    pub fn get_aspect_ratio(&self) -> f64 {
        self.template.photos.first().map_or(1.0, |slot| {
            f64::from(slot.width) / f64::from(slot.height)
        })
    }

    /// Spooler options with every value stringified.
    pub fn print_params(&self) -> PrintParams {
        self.template
            .print_params
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect()
    }

    /// Assemble the collage from photo files.
    ///
    /// Slots beyond the number of photos stay empty; a photo that cannot be
    /// read is logged and its slot left as background. The page is only
    /// duplicated when `for_print` is set. With `output_path`, the collage
    /// and its `_small` companion are written.
    #[instrument(
        skip(self, photo_paths),
        fields(template = %self.template.name, photos = photo_paths.len())
    )]
    pub fn assemble<P: AsRef<Path>>(
        &self,
        photo_paths: &[P],
        output_path: Option<&Path>,
        for_print: bool,
    ) -> Result<Frame> {
        let photos = photo_paths.iter().map(|path| {
            let path = path.as_ref();
            Frame::open(path)
                .inspect_err(|e| warn!(path = %path.display(), error = %e, "Could not load photo"))
                .ok()
        });
        let canvas = self.compose(photos, for_print)?;

        if let Some(output) = output_path {
            write_with_small(&canvas, output)?;
            info!(
                output = %output.display(),
                width = canvas.width(),
                height = canvas.height(),
                "Collage written"
            );
        }
        Ok(canvas)
    }

    /// Render the layout with gray placeholder photos to a temp JPEG.
    ///
    /// Needs no hardware. Returns the path of the written file.
    pub fn get_preview(&self) -> Result<PathBuf> {
        let (w, h) = PLACEHOLDER_SIZE;
        let placeholder = Frame::solid(w, h, [PLACEHOLDER_GRAY; 3]);
        let photos = (0..self.photos_required()).map(|_| Some(placeholder.clone()));
        let canvas = self.compose(photos, false)?;
        let small = downscale_to_bounds(&canvas, SMALL_MAX_WIDTH, SMALL_MAX_HEIGHT);

        let name = format!("photobooth-layout-{}.jpg", uuid::Uuid::new_v4());
        let path = std::env::temp_dir().join(name);
        small.save(&path)?;
        debug!(template = %self.template.name, path = %path.display(), "Layout preview written");
        Ok(path)
    }

    /// Write every artifact of a finished session.
    ///
    /// `output` receives the display collage and its `_small` companion.
    /// Duplicating templates also get a `_print` companion at double width.
    /// Returns the path to hand to the printer.
    pub fn render_artifacts<P: AsRef<Path>>(
        &self,
        photo_paths: &[P],
        output: &Path,
    ) -> Result<PathBuf> {
        self.assemble(photo_paths, Some(output), false)?;
        if !self.template.duplicate_horizontal {
            return Ok(output.to_path_buf());
        }

        let printable = print_path(output);
        let page = self.assemble(photo_paths, None, true)?;
        page.save(&printable)?;
        info!(output = %printable.display(), width = page.width(), "Print companion written");
        Ok(printable)
    }

    fn compose(
        &self,
        photos: impl Iterator<Item = Option<Frame>>,
        for_print: bool,
    ) -> Result<Frame> {
        let PageSize { width, height } = self.template.page;

        let mut canvas = self
            .template
            .background
            .as_deref()
            .and_then(|path| load_overlay(path, "background"))
            .map(|bg| stretch(&Frame::new(bg.to_rgb8()), width, height))
            .transpose()?
            .unwrap_or_else(|| Frame::solid(width, height, [255; 3]))
            .into_pixels();

        for (slot, photo) in self.template.photos.iter().zip(photos) {
            let Some(photo) = photo else {
                continue;
            };
            let fitted = resize_and_crop(&photo, Some(slot.height), Some(slot.width))?.into_rgb();
            imageops::replace(&mut canvas, fitted.pixels(), slot.x, slot.y);
        }

        let mut canvas = Frame::new(canvas);
        if let Some(fg) = self
            .template
            .foreground
            .as_deref()
            .and_then(|path| load_overlay(path, "foreground"))
        {
            canvas = if fg.color().has_alpha() {
                let overlay =
                    imageops::resize(&fg.to_rgba8(), width, height, imageops::FilterType::Triangle);
                alpha_composite(&canvas, &overlay)
            } else {
                blend(&canvas, &Frame::new(fg.to_rgb8()), FOREGROUND_OPACITY)?
            };
        }

        if self.template.duplicate_horizontal && for_print {
            let mut doubled = image::RgbImage::new(width * 2, height);
            imageops::replace(&mut doubled, canvas.pixels(), 0, 0);
            imageops::replace(&mut doubled, canvas.pixels(), i64::from(width), 0);
            canvas = Frame::new(doubled);
        }
        Ok(canvas)
    }
}

fn load_overlay(path: &Path, role: &str) -> Option<image::DynamicImage> {
    if !path.exists() {
        debug!(role, path = %path.display(), "Overlay missing, skipped");
        return None;
    }
    image::open(path)
        .inspect_err(|e| {
            warn!(role, path = %path.display(), error = %e, "Overlay unreadable, skipped");
        })
        .ok()
}

fn write_with_small(canvas: &Frame, output: &Path) -> Result<()> {
    canvas.save(output)?;
    downscale_to_bounds(canvas, SMALL_MAX_WIDTH, SMALL_MAX_HEIGHT).save(&small_path(output))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

/// `collage.jpg` → `collage_small.jpg`.
pub fn small_path(path: &Path) -> PathBuf {
    with_suffix(path, "_small")
}

/// `collage.jpg` → `collage_print.jpg`.
pub fn print_path(path: &Path) -> PathBuf {
    with_suffix(path, "_print")
}

/// Load every template document in `dir`, in file name order.
///
/// Invalid documents are logged and skipped.
///
/// # Errors
///
/// Returns [`PhotoboothError::NoTemplates`] if the directory is missing or
/// holds no valid template.
#[instrument]
pub fn load_templates(dir: &Path) -> Result<Vec<TemplateCollage>> {
    let no_templates = || PhotoboothError::NoTemplates {
        dir: dir.display().to_string(),
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Templates directory not readable");
            return Err(no_templates());
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && ConfigFormat::from_extension(path).is_some())
        .collect();
    paths.sort();

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        match TemplateCollage::load(&path) {
            Ok(template) => {
                info!(name = %template.name(), file = %path.display(), "Loaded template");
                templates.push(template);
            }
            Err(e) => error!(file = %path.display(), error = %e, "Error loading template"),
        }
    }

    if templates.is_empty() {
        return Err(no_templates());
    }
    Ok(templates)
}
