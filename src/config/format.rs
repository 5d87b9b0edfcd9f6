//! Document format detection and parsing.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::{PhotoboothError, Result};

/// Format of a configuration or template document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json).
    Json,
    /// YAML format (.yaml, .yml).
    Yaml,
    /// TOML format (.toml).
    Toml,
}

impl ConfigFormat {
    /// Detect format from file extension.
    ///
    /// Returns `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        trace!(extension = %ext, "Detecting document format from extension");
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// Get the canonical file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        }
    }

    /// Deserialize a document.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoboothError::ConfigParse`] with the format's message.
    pub fn parse<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        match self {
            Self::Json => serde_json::from_str(content)
                .map_err(|e| PhotoboothError::ConfigParse(format!("JSON: {e}"))),
            Self::Yaml => serde_yaml::from_str(content)
                .map_err(|e| PhotoboothError::ConfigParse(format!("YAML: {e}"))),
            Self::Toml => toml::from_str(content)
                .map_err(|e| PhotoboothError::ConfigParse(format!("TOML: {e}"))),
        }
    }

    /// Serialize a document.
    pub fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            Self::Json => serde_json::to_string_pretty(value)
                .map_err(|e| PhotoboothError::ConfigParse(format!("JSON: {e}"))),
            Self::Yaml => serde_yaml::to_string(value)
                .map_err(|e| PhotoboothError::ConfigParse(format!("YAML: {e}"))),
            Self::Toml => toml::to_string_pretty(value)
                .map_err(|e| PhotoboothError::ConfigParse(format!("TOML: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_extension(Path::new("strip.json")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension(Path::new("a.yml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension(Path::new("a.YAML")), Some(ConfigFormat::Yaml));
        assert_eq!(
            ConfigFormat::from_extension(Path::new("config.toml")),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(ConfigFormat::from_extension(Path::new("notes.txt")), None);
        assert_eq!(ConfigFormat::from_extension(Path::new("README")), None);
    }

    #[test]
    fn test_parse_errors_name_the_format() {
        let err = ConfigFormat::Json.parse::<BTreeMap<String, u32>>("{").unwrap_err();
        assert!(err.to_string().contains("JSON"));
        let err = ConfigFormat::Toml.parse::<BTreeMap<String, u32>>("= 3").unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    fn test_render_then_parse() {
        let mut map = BTreeMap::new();
        map.insert("copies".to_string(), 2_u32);
        for format in [ConfigFormat::Json, ConfigFormat::Yaml, ConfigFormat::Toml] {
            let text = format.render(&map).unwrap();
            assert_eq!(format.parse::<BTreeMap<String, u32>>(&text).unwrap(), map);
        }
    }
}
