//! Configuration for the conversion pipeline.
//!
//! Covers the converter binaries, the shared scratch directory, and the
//! opt-in resource guards. Admission control and process timeouts are
//! disabled unless explicitly configured.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Conversion pipeline configuration.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Shared scratch directory for uploaded inputs and produced outputs.
    ///
    /// Falls back to the system temp directory when unset.
    pub scratch_dir: Option<PathBuf>,

    /// LibreOffice executable used for document conversions.
    pub libreoffice_bin: String,

    /// Ghostscript executable used for PDF compression.
    pub ghostscript_bin: String,

    /// Encoder quality for image compression (1-100).
    #[validate(range(min = 1, max = 100))]
    pub image_quality: u8,

    /// Kill a converter process that runs longer than this many seconds.
    #[validate(range(min = 1, max = 86400))]
    pub timeout_seconds: Option<u64>,

    /// Cap on simultaneously running conversions.
    #[validate(range(min = 1, max = 1024))]
    pub max_concurrent_jobs: Option<usize>,

    /// Operation ids (e.g. `"compress-image"`) that should not be served.
    pub disabled_operations: Vec<String>,

    /// Maximum stderr characters kept in a failure diagnostic.
    #[validate(range(min = 1))]
    pub max_stderr_chars: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            libreoffice_bin: default_libreoffice_bin(),
            ghostscript_bin: default_ghostscript_bin(),
            image_quality: default_image_quality(),
            timeout_seconds: None,
            max_concurrent_jobs: None,
            disabled_operations: Vec::new(),
            max_stderr_chars: default_max_stderr_chars(),
        }
    }
}

fn default_libreoffice_bin() -> String {
    "libreoffice".to_string()
}

fn default_ghostscript_bin() -> String {
    "gs".to_string()
}

fn default_image_quality() -> u8 {
    80
}

fn default_max_stderr_chars() -> usize {
    2000
}

impl ConversionConfig {
    /// Resolve the effective scratch directory.
    pub fn effective_scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
