//! The tracked-series file.
//!
//! Two shapes are accepted on load: the keyed form
//!
//! ```yaml
//! series:
//!   - name: Solo Leveling
//!     url: https://example.com/manga/solo-leveling/
//!     last_chapter: 200
//! ```
//!
//! and a bare top-level list of the same entries. Saving always writes the
//! keyed form, replacing the file in one rename. Keys this crate does not
//! know about, per entry or at the top level, are written back unchanged.

use crate::error::{ConfigError, PersistenceError};
use crate::models::{Library, TrackedSource};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub fn load_library(path: &Path) -> Result<Library, ConfigError> {
    if !path.exists() {
        log::warn!("Library {} not found, nothing to track", path.display());
        return Ok(Library::default());
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_library(&content).map_err(|source| ConfigError::Library {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse library YAML, normalizing the legacy bare-list shape
pub fn parse_library(content: &str) -> Result<Library, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Library::default());
    }
    let library = match serde_yaml::from_str::<Value>(content)? {
        Value::Null => return Ok(Library::default()),
        Value::Sequence(items) => {
            log::debug!("Library uses the legacy list layout");
            let series: Vec<TrackedSource> = serde_yaml::from_value(Value::Sequence(items))?;
            Library::new(series)
        }
        other => serde_yaml::from_value::<Library>(other)?,
    };
    // Blank entries stay in the file; the run reports them as "missing url"
    for blank in library.series.iter().filter(|s| s.url.trim().is_empty()) {
        log::warn!("Library entry {} has no url", blank.display_name());
    }
    Ok(library)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Write the whole library through a temporary file and a rename
pub fn save_library(path: &Path, library: &Library) -> Result<(), PersistenceError> {
    let yaml = serde_yaml::to_string(library)?;
    let tmp = sibling(path, ".tmp");
    fs::write(&tmp, yaml).map_err(|source| PersistenceError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Saved {} series to {}", library.series.len(), path.display());
    Ok(())
}

/// Copy the current file to `<file>.bak`; returns the backup path
pub fn backup_library(path: &Path) -> Result<PathBuf, PersistenceError> {
    let backup = sibling(path, ".bak");
    fs::copy(path, &backup).map_err(|source| PersistenceError::Write {
        path: backup.clone(),
        source,
    })?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_layout() {
        let lib = parse_library(
            "series:\n  - name: A\n    site: zonatmo\n    url: https://zonatmo.com/library/manga/1/a\n    last_chapter: 54.1\n",
        )
        .unwrap();
        assert_eq!(lib.series.len(), 1);
        assert_eq!(lib.series[0].site_hint.as_deref(), Some("zonatmo"));
        assert_eq!(lib.series[0].last_chapter, Some(54.1));
    }

    #[test]
    fn test_legacy_list_layout() {
        let lib = parse_library("- name: A\n  url: https://a\n- name: B\n  url: https://b\n  last_chapter: 3\n")
            .unwrap();
        assert_eq!(lib.series.len(), 2);
        assert_eq!(lib.series[1].last_chapter, Some(3.0));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(parse_library("").unwrap().series.is_empty());
        assert!(parse_library("   \n").unwrap().series.is_empty());
        assert!(parse_library("~\n").unwrap().series.is_empty());
        assert!(parse_library("series:\n").unwrap().series.is_empty());
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(parse_library("series: [unclosed").is_err());
        assert!(parse_library("just a string").is_err());
    }

    #[test]
    fn test_blank_entries_are_kept() {
        let lib = parse_library("series:\n  - name: ''\n    url: ''\n    notes: fill in later\n  - name: B\n    url: https://b\n")
            .unwrap();
        assert_eq!(lib.series.len(), 2);
        assert_eq!(lib.series[0].display_name(), "<unnamed>");
        let yaml = serde_yaml::to_string(&lib).unwrap();
        assert!(yaml.contains("notes: fill in later"));
    }

    #[test]
    fn test_sibling_paths() {
        assert_eq!(sibling(Path::new("/d/lib.yml"), ".bak"), PathBuf::from("/d/lib.yml.bak"));
    }
}
