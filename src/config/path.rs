//! Path resolution for configuration and template documents.
//!
//! Supports absolute paths, paths relative to the document, and "~" home
//! directory expansion.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{PhotoboothError, Result};

/// Resolve a path written in a document living in `base_dir`.
///
/// Resolution rules:
/// 1. Paths starting with `~`: expanded to home directory
/// 2. Absolute paths: used as-is
/// 3. Relative paths: resolved relative to `base_dir`
pub fn resolve_path(path: &Path, base_dir: &Path) -> Result<PathBuf> {
    trace!(path = %path.display(), base_dir = %base_dir.display(), "Resolving path");

    let path_str = path.to_string_lossy();
    if path_str == "~" || path_str.starts_with("~/") {
        let home = home_dir()?;
        let resolved = match path_str.strip_prefix("~/") {
            Some(rest) if !rest.is_empty() => home.join(rest),
            _ => home,
        };
        debug!(
            original = %path.display(),
            resolved = %resolved.display(),
            "Expanded home directory path"
        );
        return Ok(resolved);
    }

    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(base_dir.join(path))
}

/// Resolve the user's home directory (cross-platform).
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        PhotoboothError::ConfigInvalid("Could not determine home directory".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path() {
        let resolved =
            resolve_path(Path::new("/srv/overlays/fg.png"), Path::new("/etc/photobooth")).unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/overlays/fg.png"));
    }

    #[test]
    fn test_relative_path() {
        let resolved =
            resolve_path(Path::new("overlays/fg.png"), Path::new("/home/pi/templates")).unwrap();
        assert_eq!(resolved, PathBuf::from("/home/pi/templates/overlays/fg.png"));
    }

    #[test]
    fn test_home_expansion() {
        let home = home_dir().unwrap();
        let resolved = resolve_path(Path::new("~/DCIM"), Path::new("/etc")).unwrap();
        assert_eq!(resolved, home.join("DCIM"));
        assert_eq!(resolve_path(Path::new("~"), Path::new("/etc")).unwrap(), home);
    }

    #[test]
    fn test_tilde_inside_name_is_literal() {
        let resolved = resolve_path(Path::new("~backup/x.png"), Path::new("/t")).unwrap();
        assert_eq!(resolved, PathBuf::from("/t/~backup/x.png"));
    }
}
