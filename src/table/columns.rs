//! Column rendering for build rows.
//!
//! Columns are the record's well-known fields; each renders through
//! `BuildRecord::try_get_field` so records stay free of display concerns.

use time::Duration;
use time::macros::format_description;

use crate::core::{BuildField, BuildHandle, BuildRecord, BuildStatus, FieldValue};
use crate::search::TableRow;

/// Default visible columns, in display order.
pub const DEFAULT_COLUMNS: &[BuildField] = &[
    BuildField::ProjectName,
    BuildField::ProjectType,
    BuildField::Dimensions,
    BuildField::Targets,
    BuildField::Kind,
    BuildField::StartTime,
    BuildField::Elapsed,
    BuildField::Status,
];

pub fn header(column: BuildField) -> &'static str {
    match column {
        BuildField::Dimensions => "Dimensions",
        BuildField::Targets => "Targets",
        BuildField::Elapsed => "Elapsed",
        BuildField::Kind => "Type",
        BuildField::Status => "Status",
        BuildField::ProjectName => "Project",
        BuildField::ProjectType => "Project Type",
        BuildField::StartTime => "Start Time",
        BuildField::LogPath => "Log",
    }
}

/// Render one column of a record; `None` when the record has nothing to show.
pub fn render(record: &BuildRecord, column: BuildField) -> Option<String> {
    // Elapsed is meaningless until the build stops
    if column == BuildField::Elapsed && record.status() == BuildStatus::Running {
        return None;
    }

    let text = match record.try_get_field(column)? {
        FieldValue::List(items) => items.join(";"),
        FieldValue::Duration(elapsed) => format_elapsed(elapsed),
        FieldValue::Kind(kind) => kind.display_name().to_string(),
        FieldValue::Status(status) => status.to_string(),
        FieldValue::Text(text) => text,
        FieldValue::Timestamp(ts) => ts
            .format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"))
            .ok()?,
        FieldValue::Path(path) => path.display().to_string(),
    };
    Some(text)
}

/// `seconds.milliseconds`, e.g. `5.250`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.whole_milliseconds().max(0);
    format!("{}.{:03}", millis / 1000, millis % 1000)
}

/// A build record exposed as a searchable table row.
#[derive(Debug, Clone)]
pub struct BuildRow {
    build: BuildHandle,
}

impl BuildRow {
    pub fn new(build: BuildHandle) -> Self {
        BuildRow { build }
    }

    pub fn build(&self) -> &BuildHandle {
        &self.build
    }

    pub fn cells(&self, columns: &[BuildField]) -> Vec<String> {
        let record = self.build.lock();
        columns
            .iter()
            .map(|c| render(&record, *c).unwrap_or_default())
            .collect()
    }
}

impl TableRow for BuildRow {
    type Column = BuildField;

    fn details_text(&self) -> Option<String> {
        None
    }

    fn column_text(&self, column: &BuildField) -> Option<String> {
        render(&self.build.lock(), *column)
    }
}
