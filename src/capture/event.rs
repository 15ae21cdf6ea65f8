//! Events delivered by the build engine's global event stream.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Placeholder project path reported for anonymous evaluations.
pub const NULL_PROJECT_PATH: &str = "(null)";

/// Correlates all events that belong to one running build or evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub i32);

impl ContextId {
    /// Sentinel for events that do not belong to any context.
    pub const INVALID: ContextId = ContextId(-1);

    pub fn is_valid(self) -> bool {
        self != ContextId::INVALID
    }
}

impl Default for ContextId {
    fn default() -> Self {
        ContextId::INVALID
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message importance, ordered from most to least important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Normal,
    Low,
}

/// Payload of events that are neither a unit start nor a unit finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    Message {
        importance: Importance,
        text: String,
    },
    Warning {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        text: String,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        text: String,
    },
    TargetStarted {
        target: String,
    },
    TargetFinished {
        target: String,
        succeeded: bool,
    },
    ProjectImported {
        import_path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Started {
        project_path: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        dimensions: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        targets: Option<Vec<String>>,
    },
    Finished {
        project_path: String,
        /// Absent for evaluations, which carry no verdict.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        succeeded: Option<bool>,
    },
    #[serde(untagged)]
    Other(EventPayload),
}

/// One timestamped event from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEvent {
    #[serde(default)]
    pub context: ContextId,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub kind: EventKind,
}

impl BuildEvent {
    pub fn started(context: ContextId, timestamp: OffsetDateTime, project_path: impl Into<String>) -> Self {
        BuildEvent {
            context,
            timestamp,
            kind: EventKind::Started {
                project_path: project_path.into(),
                dimensions: Vec::new(),
                targets: None,
            },
        }
    }

    pub fn finished(
        context: ContextId,
        timestamp: OffsetDateTime,
        project_path: impl Into<String>,
        succeeded: Option<bool>,
    ) -> Self {
        BuildEvent {
            context,
            timestamp,
            kind: EventKind::Finished {
                project_path: project_path.into(),
                succeeded,
            },
        }
    }

    pub fn other(context: ContextId, timestamp: OffsetDateTime, payload: EventPayload) -> Self {
        BuildEvent {
            context,
            timestamp,
            kind: EventKind::Other(payload),
        }
    }

    pub fn message(context: ContextId, timestamp: OffsetDateTime, importance: Importance, text: impl Into<String>) -> Self {
        Self::other(
            context,
            timestamp,
            EventPayload::Message {
                importance,
                text: text.into(),
            },
        )
    }

    /// Attach dimensions and targets to a start event; no-op for other kinds.
    pub fn with_build_info(mut self, new_dimensions: Vec<String>, new_targets: Option<Vec<String>>) -> Self {
        if let EventKind::Started { dimensions, targets, .. } = &mut self.kind {
            *dimensions = new_dimensions;
            *targets = new_targets;
        }
        self
    }
}

/// Whether a start event's project path names a real unit.
pub fn is_real_project(project_path: &str) -> bool {
    let trimmed = project_path.trim();
    !trimmed.is_empty() && trimmed != NULL_PROJECT_PATH
}
