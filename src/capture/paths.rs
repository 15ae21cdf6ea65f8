//! Unique artifact path allocation.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::core::CaptureConfig;

/// Allocates a fresh, never-reused path for each captured context.
pub trait ArtifactPathGenerator: Send + Sync {
    fn next_path(&self) -> PathBuf;
}

/// `<dir>/<uuid-v4>.<extension>`
#[derive(Debug, Clone)]
pub struct UuidPathGenerator {
    dir: PathBuf,
    extension: String,
}

impl UuidPathGenerator {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        UuidPathGenerator {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.artifact_dir(), config.artifact_extension.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactPathGenerator for UuidPathGenerator {
    fn next_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", Uuid::new_v4(), self.extension))
    }
}
