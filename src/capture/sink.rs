//! Log sinks: isolated write targets that serialize one context's events.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::jsonl::{ARTIFACT_FORMAT_VERSION, ArtifactHeader};
use crate::{BuildLogError, BuildLogResult};

use super::event::{BuildEvent, EventKind, EventPayload, Importance};

/// Detail level of a sink, from least to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    Minimal,
    Normal,
    Detailed,
    Diagnostic,
}

impl Verbosity {
    /// Least important message level still written at this verbosity.
    fn lowest_importance(self) -> Option<Importance> {
        match self {
            Verbosity::Quiet => None,
            Verbosity::Minimal => Some(Importance::High),
            Verbosity::Normal => Some(Importance::Normal),
            Verbosity::Detailed | Verbosity::Diagnostic => Some(Importance::Low),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkOptions {
    pub verbosity: Verbosity,
    /// Keep project-import events; off by default to bound artifact size
    pub collect_imports: bool,
}

impl Default for SinkOptions {
    fn default() -> Self {
        SinkOptions {
            verbosity: Verbosity::Diagnostic,
            collect_imports: false,
        }
    }
}

impl SinkOptions {
    /// Whether an event passes this sink's verbosity and import filters.
    ///
    /// Lifecycle events, warnings and errors always pass.
    pub fn accepts(&self, event: &BuildEvent) -> bool {
        match &event.kind {
            EventKind::Started { .. } | EventKind::Finished { .. } => true,
            EventKind::Other(payload) => match payload {
                EventPayload::Warning { .. } | EventPayload::Error { .. } => true,
                EventPayload::Message { importance, .. } => self
                    .verbosity
                    .lowest_importance()
                    .is_some_and(|lowest| *importance <= lowest),
                EventPayload::TargetStarted { .. } | EventPayload::TargetFinished { .. } => {
                    self.verbosity >= Verbosity::Normal
                }
                EventPayload::ProjectImported { .. } => self.collect_imports,
            },
        }
    }
}

/// A write target bound to one artifact.
pub trait LogSink: Send {
    /// Forward one event into the artifact.
    fn write_event(&mut self, event: &BuildEvent) -> BuildLogResult<()>;

    /// Flush and close. Irreversible; calling it again is a no-op.
    fn shutdown(&mut self) -> BuildLogResult<()>;
}

/// Opens sinks bound to filesystem paths.
pub trait SinkFactory: Send + Sync {
    fn open(&self, path: &Path, options: &SinkOptions) -> BuildLogResult<Box<dyn LogSink>>;
}

/// Sink writing a header line followed by one JSON line per accepted event.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    options: SinkOptions,
    writer: Option<BufWriter<File>>,
}

impl JsonlSink {
    /// Create the artifact file and write its header.
    ///
    /// # Errors
    /// Fails if the file already exists or cannot be created.
    pub fn create(path: impl AsRef<Path>, options: SinkOptions) -> BuildLogResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| BuildLogError::io("failed to create build log", &path, e))?;

        let mut sink = JsonlSink {
            path,
            options,
            writer: Some(BufWriter::new(file)),
        };
        let header = ArtifactHeader {
            format_version: ARTIFACT_FORMAT_VERSION,
            verbosity: options.verbosity,
            collect_imports: options.collect_imports,
        };
        sink.write_line(&header)?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> BuildLogResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| BuildLogError::Message("sink is closed".to_string()))?;

        let json = serde_json::to_string(value)
            .map_err(|e| BuildLogError::Message(format!("failed to serialize event: {e}")))?;
        writeln!(writer, "{}", json).map_err(|e| BuildLogError::io("failed to write build log", &self.path, e))
    }
}

impl LogSink for JsonlSink {
    fn write_event(&mut self, event: &BuildEvent) -> BuildLogResult<()> {
        if self.is_closed() {
            return Err(BuildLogError::Message("sink is closed".to_string()));
        }
        if !self.options.accepts(event) {
            return Ok(());
        }
        self.write_line(event)
    }

    fn shutdown(&mut self) -> BuildLogResult<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .flush()
            .map_err(|e| BuildLogError::io("failed to flush build log", &self.path, e))
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::debug!(error = %e, "failed to close build log on drop");
        }
    }
}

/// Factory for `JsonlSink`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonlSinkFactory;

impl SinkFactory for JsonlSinkFactory {
    fn open(&self, path: &Path, options: &SinkOptions) -> BuildLogResult<Box<dyn LogSink>> {
        Ok(Box::new(JsonlSink::create(path, *options)?))
    }
}
