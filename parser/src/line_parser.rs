use crate::{base_parser::Parser, EventKind, LogEvent, ParseError, ParsedLog, SkippedLine};
use chrono::NaiveDateTime;
use std::io::{BufRead, BufReader, Read};
use tracing::{debug, info, warn};

/// `MM/DD/YYYY HH:MM:SS`, 24-hour clock
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Marker that classifies a line as a connect. Everything else is a disconnect.
pub const CONNECT_MARKER: &str = "[CONNECT]";

// Byte layout of a timestamp token: 'd' is a digit, anything else is literal.
const TIMESTAMP_SHAPE: &[u8] = b"dd/dd/dddd dd:dd:dd";

// Windows editors often prefix logs with a UTF-8 byte order mark
const BOM: char = '\u{feff}';

/// Parser for bracketed player logs:
///
/// ```text
/// [01/10/2024 10:00:00] [CONNECT] alice
/// [01/10/2024 23:00:00] [DISCONNECT] alice
/// ```
pub struct BracketedLogParser;

impl BracketedLogParser {
    /// Parse a single log line into an event.
    pub fn parse_line(line: &str) -> Result<LogEvent, ParseError> {
        let close = line.find(']').ok_or(ParseError::MissingTimestampBracket)?;
        let token = line[..close].trim_matches(|c: char| c == '[' || c == ']');

        let timestamp = parse_timestamp(token)?;
        let kind = if line.contains(CONNECT_MARKER) {
            EventKind::Connect
        } else {
            EventKind::Disconnect
        };

        Ok(LogEvent::new(timestamp, kind))
    }

    /// Parse a whole log held in memory.
    pub fn parse_str(&self, content: &str) -> ParsedLog {
        let mut parsed = ParsedLog::default();
        for (idx, line) in content.lines().enumerate() {
            self.push_line(&mut parsed, idx + 1, line);
        }
        sort_events(&mut parsed.events);
        parsed
    }

    fn push_line(&self, parsed: &mut ParsedLog, line_number: usize, line: &str) {
        let line = if line_number == 1 {
            line.strip_prefix(BOM).unwrap_or(line)
        } else {
            line
        };

        if line.trim().is_empty() {
            return;
        }

        match Self::parse_line(line) {
            Ok(event) => parsed.events.push(event),
            Err(e) => {
                warn!("Skipping line {}: {}", line_number, e);
                parsed.skipped.push(SkippedLine {
                    line_number,
                    reason: e.to_string(),
                });
            }
        }
    }
}

impl Parser for BracketedLogParser {
    fn name(&self) -> &'static str {
        "bracketed"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["txt", "log"]
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        let decoded = String::from_utf8_lossy(data);
        let sample = decoded.strip_prefix(BOM).unwrap_or(decoded.as_ref());

        match sample.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(first_line) => first_line.starts_with('[') && first_line.contains(']'),
            None => false,
        }
    }

    fn parse(&self, reader: Box<dyn Read>) -> Result<ParsedLog, ParseError> {
        info!("Starting bracketed log parsing");
        let mut buf_reader = BufReader::new(reader);
        let mut parsed = ParsedLog::default();
        let mut raw = Vec::new();
        let mut line_number = 0;

        // Decode line by line so a stray non-UTF-8 byte only affects its own line
        while buf_reader.read_until(b'\n', &mut raw)? > 0 {
            line_number += 1;
            if raw.ends_with(b"\n") {
                raw.pop();
            }
            if raw.ends_with(b"\r") {
                raw.pop();
            }

            let line = String::from_utf8_lossy(&raw);
            self.push_line(&mut parsed, line_number, &line);
            raw.clear();
        }

        sort_events(&mut parsed.events);

        info!(
            "Log parsing complete: {} events, {} skipped lines",
            parsed.events.len(),
            parsed.skipped.len()
        );
        Ok(parsed)
    }
}

fn parse_timestamp(token: &str) -> Result<NaiveDateTime, ParseError> {
    // chrono accepts unpadded fields, so check the exact layout first
    let shape_ok = token.len() == TIMESTAMP_SHAPE.len()
        && token
            .bytes()
            .zip(TIMESTAMP_SHAPE)
            .all(|(b, &s)| if s == b'd' { b.is_ascii_digit() } else { b == s });

    if !shape_ok {
        return Err(ParseError::InvalidTimestamp(token.to_string()));
    }

    NaiveDateTime::parse_from_str(token, TIMESTAMP_FORMAT)
        .map_err(|_| ParseError::InvalidTimestamp(token.to_string()))
}

/// Stable: events sharing a timestamp keep their file order.
fn sort_events(events: &mut [LogEvent]) {
    events.sort_by_key(|e| e.timestamp);
    debug!("Sorted {} events by timestamp", events.len());
}
