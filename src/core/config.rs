//! Capture configuration, loadable from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capture::sink::{SinkOptions, Verbosity};
use crate::{BuildLogError, BuildLogResult};

pub const DEFAULT_ARTIFACT_EXTENSION: &str = "buildlog";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Directory that receives per-build artifacts (platform temp dir if unset)
    pub artifact_dir: Option<PathBuf>,
    /// Extension appended to every artifact file name
    pub artifact_extension: String,
    pub verbosity: Verbosity,
    /// Keep project-import events in artifacts
    pub collect_imports: bool,
    /// Whether capture is enabled as soon as the listing is created
    pub start_enabled: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            artifact_dir: None,
            artifact_extension: DEFAULT_ARTIFACT_EXTENSION.to_string(),
            verbosity: Verbosity::Diagnostic,
            collect_imports: false,
            start_enabled: true,
        }
    }
}

impl CaptureConfig {
    pub fn from_toml_str(s: &str) -> BuildLogResult<Self> {
        let cfg: CaptureConfig =
            toml::from_str(s).map_err(|e| BuildLogError::Message(format!("invalid capture config: {e}")))?;
        if cfg.artifact_extension.is_empty() || cfg.artifact_extension.contains(['/', '\\']) {
            return Err(BuildLogError::Message(format!(
                "invalid artifact extension: {:?}",
                cfg.artifact_extension
            )));
        }
        Ok(cfg)
    }

    pub fn load(path: &Path) -> BuildLogResult<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| BuildLogError::io("failed to read config", path, e))?;
        Self::from_toml_str(&s)
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.artifact_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn sink_options(&self) -> SinkOptions {
        SinkOptions {
            verbosity: self.verbosity,
            collect_imports: self.collect_imports,
        }
    }
}
