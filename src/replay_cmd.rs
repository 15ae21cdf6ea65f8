//! CLI command handler for `replay`.
//!
//! Feeds a recorded event stream through the demultiplexer, then lists the
//! captured builds that match a search query.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::capture::{EventDemultiplexer, Verbosity};
use crate::core::{BuildField, BuildKind, CaptureConfig};
use crate::search::{SearchMatcher, SearchQuery};
use crate::storage::{CsvExporter, JsonlEventLog};
use crate::table::{BuildRow, BuildTable, DEFAULT_COLUMNS};
use crate::{BuildLogError, BuildLogResult};

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Recorded event stream (JSONL)
    pub events: PathBuf,
    pub config: Option<PathBuf>,
    pub kind: BuildKind,
    /// Overrides the configured sink verbosity
    pub verbosity: Option<Verbosity>,
    pub query: Option<String>,
    /// Visible columns; defaults to `DEFAULT_COLUMNS`
    pub columns: Vec<BuildField>,
    pub csv: Option<PathBuf>,
    /// Leave artifact files on disk instead of deleting them on exit
    pub keep_artifacts: bool,
}

impl ReplayOptions {
    pub fn new(events: impl Into<PathBuf>, kind: BuildKind) -> Self {
        ReplayOptions {
            events: events.into(),
            config: None,
            kind,
            verbosity: None,
            query: None,
            columns: Vec::new(),
            csv: None,
            keep_artifacts: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub captured: usize,
    /// Builds still running when the stream ended
    pub unfinished: usize,
    pub matched: usize,
    /// Artifacts left on disk (only with `keep_artifacts`)
    pub kept_artifacts: Vec<PathBuf>,
}

/// Parse a comma-separated column list such as `status,targets`.
pub fn parse_columns(list: &str) -> BuildLogResult<Vec<BuildField>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase().parse::<BuildField>())
        .collect()
}

/// Run the `replay` command, writing the matching rows to `out`.
pub fn run(opts: &ReplayOptions, out: &mut impl Write) -> BuildLogResult<ReplaySummary> {
    let mut config = match &opts.config {
        Some(path) => CaptureConfig::load(path)?,
        None => CaptureConfig::default(),
    };
    if let Some(verbosity) = opts.verbosity {
        config.verbosity = verbosity;
    }

    let events = JsonlEventLog::new(&opts.events).read_all()?;
    tracing::info!(events = events.len(), path = %opts.events.display(), "replaying event stream");

    let table = Arc::new(BuildTable::new(config.start_enabled));
    let demux = EventDemultiplexer::from_config(opts.kind, &config, table.clone());
    for event in &events {
        demux.handle_event(event)?;
    }

    let unfinished = demux.active_count();
    if unfinished > 0 {
        tracing::warn!(unfinished, "event stream ended with builds still running");
    }
    drop(demux);

    let columns = if opts.columns.is_empty() {
        DEFAULT_COLUMNS.to_vec()
    } else {
        opts.columns.clone()
    };
    let query = SearchQuery::parse(opts.query.as_deref().unwrap_or_default());
    let matcher = SearchMatcher::new(&query, columns.clone());

    let rows: Vec<BuildRow> = table.entries().into_iter().map(BuildRow::new).collect();
    let matched: Vec<BuildRow> = matcher.filter(&rows).into_iter().cloned().collect();

    write_rows(&matched, &columns, out)?;
    if let Some(csv_path) = &opts.csv {
        CsvExporter::new(columns.clone()).export(&matched, csv_path)?;
        tracing::info!(path = %csv_path.display(), rows = matched.len(), "wrote CSV");
    }

    let mut kept_artifacts = Vec::new();
    if opts.keep_artifacts {
        for row in &rows {
            if let Some(path) = row.build().lock().take_log_path() {
                kept_artifacts.push(path);
            }
        }
    }

    let summary = ReplaySummary {
        events: events.len(),
        captured: rows.len(),
        unfinished,
        matched: matched.len(),
        kept_artifacts,
    };
    tracing::info!(captured = summary.captured, matched = summary.matched, "replay complete");
    Ok(summary)
}

fn write_rows(rows: &[BuildRow], columns: &[BuildField], out: &mut impl Write) -> BuildLogResult<()> {
    let write_err = |e: std::io::Error| BuildLogError::Message(format!("failed to write output: {e}"));

    let headers: Vec<&str> = columns.iter().map(|c| crate::table::columns::header(*c)).collect();
    writeln!(out, "{}", headers.join("\t")).map_err(write_err)?;
    for row in rows {
        writeln!(out, "{}", row.cells(columns).join("\t")).map_err(write_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_columns() {
        assert_eq!(
            parse_columns("Status, targets,,").unwrap(),
            vec![BuildField::Status, BuildField::Targets]
        );
        assert!(parse_columns("status,bogus").is_err());
    }
}
