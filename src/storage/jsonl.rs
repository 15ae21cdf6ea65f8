//! JSONL (JSON Lines) codec for event streams and build log artifacts.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capture::event::BuildEvent;
use crate::capture::sink::Verbosity;
use crate::{BuildLogError, BuildLogResult};

/// Format version written in every artifact header
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// First line of every build log artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub format_version: u32,
    pub verbosity: Verbosity,
    pub collect_imports: bool,
}

/// Event stream stored as one JSON event per line.
///
/// Used for recorded event streams fed to the demultiplexer. Appending never
/// rewrites earlier lines.
#[derive(Debug, Clone)]
pub struct JsonlEventLog {
    path: PathBuf,
}

impl JsonlEventLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonlEventLog {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single event, creating the file and parent directory if needed.
    pub fn append(&self, event: &BuildEvent) -> BuildLogResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BuildLogError::io("failed to create directory", parent, e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BuildLogError::io("failed to open file", &self.path, e))?;

        let json = serde_json::to_string(event)
            .map_err(|e| BuildLogError::Message(format!("failed to serialize event: {e}")))?;

        writeln!(file, "{}", json).map_err(|e| BuildLogError::io("failed to write event", &self.path, e))
    }

    /// Read every event in file order.
    ///
    /// # Errors
    /// Returns an error if the file is missing or any non-empty line fails to parse;
    /// the message names the offending line.
    pub fn read_all(&self) -> BuildLogResult<Vec<BuildEvent>> {
        let lines = read_lines(&self.path)?;
        lines
            .iter()
            .map(|(line_num, line)| parse_line(line, *line_num))
            .collect()
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Number of non-empty lines; zero if the file does not exist.
    pub fn count(&self) -> BuildLogResult<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        Ok(read_lines(&self.path)?.len())
    }
}

/// Read a build log artifact back: its header and the events it captured.
pub fn read_artifact(path: &Path) -> BuildLogResult<(ArtifactHeader, Vec<BuildEvent>)> {
    let lines = read_lines(path)?;
    let mut iter = lines.into_iter();

    let (header_line_num, header_line) = iter
        .next()
        .ok_or_else(|| BuildLogError::Message(format!("empty build log: {}", path.display())))?;
    let header: ArtifactHeader = parse_line(&header_line, header_line_num)?;
    if header.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(BuildLogError::Message(format!(
            "build log format mismatch: file has v{}, expected v{}",
            header.format_version, ARTIFACT_FORMAT_VERSION
        )));
    }

    let events = iter
        .map(|(line_num, line)| parse_line(&line, line_num))
        .collect::<BuildLogResult<Vec<BuildEvent>>>()?;
    Ok((header, events))
}

/// Non-empty lines with their 1-based line numbers.
fn read_lines(path: &Path) -> BuildLogResult<Vec<(usize, String)>> {
    if !path.exists() {
        return Err(BuildLogError::Message(format!("file not found: {}", path.display())));
    }

    let file = File::open(path).map_err(|e| BuildLogError::io("failed to open file", path, e))?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result
            .map_err(|e| BuildLogError::Message(format!("failed to read line {}: {e}", idx + 1)))?;
        if line.trim().is_empty() {
            continue;
        }
        lines.push((idx + 1, line));
    }

    Ok(lines)
}

fn parse_line<T: for<'de> Deserialize<'de>>(line: &str, line_num: usize) -> BuildLogResult<T> {
    serde_json::from_str(line)
        .map_err(|e| BuildLogError::Message(format!("failed to parse line {line_num}: {e}")))
}
