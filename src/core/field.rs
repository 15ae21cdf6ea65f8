//! Named field surface that rendering layers query on a build record.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use time::{Duration, OffsetDateTime};

use crate::BuildLogError;

use super::record::{BuildKind, BuildStatus};

/// Well-known fields exposed by `BuildRecord::try_get_field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildField {
    Dimensions,
    Targets,
    Elapsed,
    Kind,
    Status,
    ProjectName,
    ProjectType,
    StartTime,
    LogPath,
}

impl BuildField {
    pub const ALL: [BuildField; 9] = [
        BuildField::Dimensions,
        BuildField::Targets,
        BuildField::Elapsed,
        BuildField::Kind,
        BuildField::Status,
        BuildField::ProjectName,
        BuildField::ProjectType,
        BuildField::StartTime,
        BuildField::LogPath,
    ];

    /// External key name used by table/column layers.
    pub fn key_name(self) -> &'static str {
        match self {
            BuildField::Dimensions => "dimensions",
            BuildField::Targets => "targets",
            BuildField::Elapsed => "elapsed",
            BuildField::Kind => "buildtype",
            BuildField::Status => "status",
            BuildField::ProjectName => "projectname",
            BuildField::ProjectType => "projecttype",
            BuildField::StartTime => "starttime",
            BuildField::LogPath => "logpath",
        }
    }
}

impl fmt::Display for BuildField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_name())
    }
}

impl FromStr for BuildField {
    type Err = BuildLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildField::ALL
            .into_iter()
            .find(|field| field.key_name() == s)
            .ok_or_else(|| BuildLogError::Message(format!("unknown build field: {s}")))
    }
}

/// Typed value of a build field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    List(Vec<String>),
    Duration(Duration),
    Kind(BuildKind),
    Status(BuildStatus),
    Text(String),
    Timestamp(OffsetDateTime),
    Path(PathBuf),
}
