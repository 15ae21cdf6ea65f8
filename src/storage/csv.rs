//! CSV export of the build listing.

use std::io::Write;
use std::path::Path;

use crate::core::BuildField;
use crate::table::BuildRow;
use crate::table::columns::header;
use crate::{BuildLogError, BuildLogResult};

/// Exports build rows as CSV, one column per selected field, in the given order.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    columns: Vec<BuildField>,
}

impl CsvExporter {
    pub fn new(columns: Vec<BuildField>) -> Self {
        CsvExporter { columns }
    }

    /// Export rows to a CSV file, creating its parent directory if needed.
    pub fn export(&self, rows: &[BuildRow], output: &Path) -> BuildLogResult<()> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BuildLogError::io("failed to create directory", parent, e))?;
            }
        }

        let file = std::fs::File::create(output)
            .map_err(|e| BuildLogError::io("failed to create file", output, e))?;

        self.export_to_writer(rows, file)
    }

    pub fn export_to_writer<W: Write>(&self, rows: &[BuildRow], writer: W) -> BuildLogResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer
            .write_record(self.columns.iter().map(|c| header(*c)))
            .map_err(|e| BuildLogError::Message(format!("failed to write CSV headers: {e}")))?;

        for row in rows {
            csv_writer
                .write_record(row.cells(&self.columns))
                .map_err(|e| BuildLogError::Message(format!("failed to write CSV row: {e}")))?;
        }

        csv_writer
            .flush()
            .map_err(|e| BuildLogError::Message(format!("failed to flush CSV writer: {e}")))?;

        Ok(())
    }
}
