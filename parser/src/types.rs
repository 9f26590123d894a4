use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Overall peak reported for a source that could not be found.
pub const SOURCE_NOT_FOUND_PEAK: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connect,
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: NaiveDateTime,
    pub kind: EventKind,
}

impl LogEvent {
    pub fn new(timestamp: NaiveDateTime, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPeak {
    pub date: NaiveDate,
    /// Signed: a disconnect with nobody online drives the counter below zero.
    pub peak_players: i64,
}

/// A line the parser gave up on. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    pub line_number: usize,
    pub reason: String,
}

/// Events pulled out of a log, already in timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLog {
    pub events: Vec<LogEvent>,
    pub skipped: Vec<SkippedLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakReport {
    pub overall_peak: i64,
    /// One entry per date, ascending.
    pub daily_peaks: Vec<DailyPeak>,
    #[serde(default)]
    pub event_count: usize,
    #[serde(default)]
    pub skipped_lines: Vec<SkippedLine>,
}

/// Result of loading a log source.
///
/// A missing source is a normal outcome rather than an error so callers can
/// tell it apart from a source that exists but holds no usable events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParseOutcome {
    Parsed(PeakReport),
    SourceNotFound { path: PathBuf },
}

impl ParseOutcome {
    /// Overall peak, or [`SOURCE_NOT_FOUND_PEAK`] when the source was missing.
    pub fn overall_peak(&self) -> i64 {
        match self {
            ParseOutcome::Parsed(report) => report.overall_peak,
            ParseOutcome::SourceNotFound { .. } => SOURCE_NOT_FOUND_PEAK,
        }
    }

    pub fn daily_peaks(&self) -> &[DailyPeak] {
        match self {
            ParseOutcome::Parsed(report) => &report.daily_peaks,
            ParseOutcome::SourceNotFound { .. } => &[],
        }
    }

    pub fn is_source_not_found(&self) -> bool {
        matches!(self, ParseOutcome::SourceNotFound { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing closing bracket for timestamp")]
    MissingTimestampBracket,
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
