use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings file looked up in the working directory at startup.
pub const SETTINGS_FILE: &str = "rusty-sieve.json";

// ---------------------------------------------------------------------------
// Runtime settings
// ---------------------------------------------------------------------------

/// Tunables for ingestion and the derived-column calculator.
///
/// Every field has a default, so a settings file only needs the keys it wants
/// to change:
///
/// ```json
/// { "encoding_candidates": ["UTF-8", "GB18030"], "numeric_sample_rows": 20 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Files larger than this are rejected before reading.
    pub max_file_bytes: u64,
    /// Encoding labels tried in order when decoding a CSV file.
    pub encoding_candidates: Vec<String>,
    /// Run a BOM-sniffing / lossy UTF-8 pass when every candidate fails.
    pub auto_detect_fallback: bool,
    /// Rows sampled when deciding whether a column is numeric.
    pub numeric_sample_rows: usize,
    /// Rows shown in the derived-column preview.
    pub preview_rows: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * 1024 * 1024,
            encoding_candidates: ["UTF-8", "GBK", "GB2312", "GB18030", "BIG5"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            auto_detect_fallback: true,
            numeric_sample_rows: 10,
            preview_rows: 5,
        }
    }
}

impl Settings {
    /// Parse settings from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing settings JSON")
    }

    /// Read settings from `path`; a missing file yields the defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Load [`SETTINGS_FILE`] from the working directory, falling back to the
    /// defaults (with a warning) when it cannot be parsed.
    pub fn load() -> Self {
        match Self::from_path(Path::new(SETTINGS_FILE)) {
            Ok(settings) => {
                log::debug!("Using settings {settings:?}");
                settings
            }
            Err(e) => {
                log::warn!("Ignoring {SETTINGS_FILE}: {e:#}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings = Settings::from_json_str(r#"{ "numeric_sample_rows": 25 }"#).unwrap();
        assert_eq!(settings.numeric_sample_rows, 25);
        assert_eq!(settings.max_file_bytes, 50 * 1024 * 1024);
        assert_eq!(settings.encoding_candidates[0], "UTF-8");
        assert!(settings.auto_detect_fallback);
    }

    #[test]
    fn test_malformed_settings_are_an_error() {
        assert!(Settings::from_json_str("{ not json").is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_settings_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "encoding_candidates": ["GB18030"], "preview_rows": 3 }"#)
            .unwrap();
        let settings = Settings::from_path(&path).unwrap();
        assert_eq!(settings.encoding_candidates, vec!["GB18030".to_string()]);
        assert_eq!(settings.preview_rows, 3);
    }
}
