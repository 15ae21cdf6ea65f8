//! Build record: lifecycle state machine and metadata for one build or evaluation.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{BuildLogError, BuildLogResult};

use super::field::{BuildField, FieldValue};

/// What kind of unit a record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildKind {
    /// Regular (command-line or IDE-triggered) build
    Build,
    /// Design-time build issued by tooling
    DesignTimeBuild,
    /// Evaluation-only pass, no targets executed
    Evaluation,
}

impl BuildKind {
    pub fn display_name(self) -> &'static str {
        match self {
            BuildKind::Build => "Build",
            BuildKind::DesignTimeBuild => "Design-time Build",
            BuildKind::Evaluation => "Evaluation",
        }
    }
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lifecycle status. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Running,
    Finished,
    Failed,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Running => "Running",
            BuildStatus::Finished => "Finished",
            BuildStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// One in-progress or completed build/evaluation.
///
/// Dropping a record disposes it, which deletes its artifact file (if any).
#[derive(Debug)]
pub struct BuildRecord {
    kind: BuildKind,
    dimensions: Vec<String>,
    targets: Vec<String>,
    start_time: OffsetDateTime,
    elapsed: Duration,
    status: BuildStatus,
    project_path: PathBuf,
    log_path: Option<PathBuf>,
}

impl BuildRecord {
    /// Create a record in the `Running` state.
    pub fn new<D, T>(
        project_path: impl Into<PathBuf>,
        dimensions: D,
        targets: Option<T>,
        kind: BuildKind,
        start_time: OffsetDateTime,
    ) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        BuildRecord {
            kind,
            dimensions: dimensions.into_iter().map(Into::into).collect(),
            targets: targets
                .map(|t| t.into_iter().map(Into::into).collect())
                .unwrap_or_default(),
            start_time,
            elapsed: Duration::ZERO,
            status: BuildStatus::Running,
            project_path: project_path.into(),
            log_path: None,
        }
    }

    pub fn kind(&self) -> BuildKind {
        self.kind
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn start_time(&self) -> OffsetDateTime {
        self.start_time
    }

    /// Zero until the record reaches a terminal state.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// File name of the project without its extension.
    pub fn project_name(&self) -> String {
        self.project_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Extension of the project file including the leading dot, or empty.
    pub fn project_type(&self) -> String {
        self.project_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default()
    }

    /// Move out of `Running` into `Finished` or `Failed`.
    ///
    /// # Errors
    /// Returns `InvalidState` if the record already left `Running`; the record
    /// is left untouched in that case.
    pub fn finish(
        &mut self,
        succeeded: bool,
        time: OffsetDateTime,
        log_path: Option<PathBuf>,
    ) -> BuildLogResult<()> {
        if self.status != BuildStatus::Running {
            return Err(BuildLogError::InvalidState(self.status));
        }

        self.status = if succeeded { BuildStatus::Finished } else { BuildStatus::Failed };
        self.elapsed = time - self.start_time;
        if log_path.is_some() {
            self.log_path = log_path;
        }
        Ok(())
    }

    pub fn set_log_path(&mut self, log_path: impl Into<PathBuf>) {
        self.log_path = Some(log_path.into());
    }

    /// Detach the artifact so disposal no longer deletes it; the caller owns the file.
    pub fn take_log_path(&mut self) -> Option<PathBuf> {
        self.log_path.take()
    }

    /// Delete the artifact file, if one is attached.
    ///
    /// The stored path is cleared before deletion so repeated calls do no I/O.
    /// Deletion failures are logged and swallowed.
    pub fn dispose(&mut self) {
        let Some(path) = self.log_path.take() else {
            return;
        };

        if let Err(e) = std::fs::remove_file(&path) {
            tracing::debug!(path = %path.display(), error = %e, "failed to delete build log");
        }
    }

    /// Look up a displayable field.
    ///
    /// Returns `None` for fields with no value, e.g. `LogPath` before an
    /// artifact is attached.
    pub fn try_get_field(&self, field: BuildField) -> Option<FieldValue> {
        let value = match field {
            BuildField::Dimensions => FieldValue::List(self.dimensions.clone()),
            BuildField::Targets => FieldValue::List(self.targets.clone()),
            BuildField::Elapsed => FieldValue::Duration(self.elapsed),
            BuildField::Kind => FieldValue::Kind(self.kind),
            BuildField::Status => FieldValue::Status(self.status),
            BuildField::ProjectName => FieldValue::Text(self.project_name()),
            BuildField::ProjectType => FieldValue::Text(self.project_type()),
            BuildField::StartTime => FieldValue::Timestamp(self.start_time),
            BuildField::LogPath => FieldValue::Path(self.log_path.clone()?),
        };
        Some(value)
    }

    /// Lookup by external field name; unknown names yield `None`.
    pub fn try_get_field_by_name(&self, name: &str) -> Option<FieldValue> {
        name.parse::<BuildField>()
            .ok()
            .and_then(|field| self.try_get_field(field))
    }

    /// Display ordering key: start time, then project path (ordinal).
    pub fn sort_key(&self) -> (OffsetDateTime, &OsStr) {
        (self.start_time, self.project_path.as_os_str())
    }

    pub fn compare(&self, other: &BuildRecord) -> Ordering {
        if std::ptr::eq(self, other) {
            return Ordering::Equal;
        }
        self.sort_key().cmp(&other.sort_key())
    }
}

impl Drop for BuildRecord {
    fn drop(&mut self) {
        self.dispose();
    }
}
