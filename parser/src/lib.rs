// Parser crate for player connect/disconnect logs
// Line parsing, peak aggregation, and the views derived from the result

pub mod types;
pub mod base_parser;
pub mod line_parser;
pub mod aggregator;
pub mod chart;
pub mod export;

// Re-export main types
pub use types::*;
pub use base_parser::Parser;
pub use line_parser::BracketedLogParser;
pub use aggregator::{aggregate, AggregationRules, PeakAggregator, UnderflowPolicy};
pub use chart::{chart_bars, ChartBar};
pub use export::write_daily_peaks_csv;

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{info, warn};

/// Parse and aggregate a log from any reader.
pub fn parse_log<R: Read + 'static>(
    reader: R,
    rules: AggregationRules,
) -> Result<PeakReport, ParseError> {
    let parsed = BracketedLogParser.parse(Box::new(reader))?;
    Ok(build_report(parsed, rules))
}

/// Parse and aggregate a log already held in memory.
pub fn parse_log_str(content: &str, rules: AggregationRules) -> PeakReport {
    build_report(BracketedLogParser.parse_str(content), rules)
}

/// Parse and aggregate a log file.
///
/// A missing file yields [`ParseOutcome::SourceNotFound`]; a file that exists
/// but cannot be read is an error.
pub fn parse_log_file(
    path: impl AsRef<Path>,
    rules: AggregationRules,
) -> Result<ParseOutcome, ParseError> {
    let path = path.as_ref();
    info!("Loading log file: {}", path.display());

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Log file not found: {}", path.display());
            return Ok(ParseOutcome::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    Ok(ParseOutcome::Parsed(parse_log(file, rules)?))
}

fn build_report(parsed: ParsedLog, rules: AggregationRules) -> PeakReport {
    let mut report = aggregate(&parsed.events, rules);
    report.skipped_lines = parsed.skipped;
    report
}
