use crate::{DailyPeak, ParseError};
use csv::Writer;
use serde::Serialize;
use std::io::Write;
use tracing::debug;

#[derive(Debug, Serialize)]
struct CsvRecord {
    date: String,
    peak_players: i64,
}

/// Write daily peaks as `date,peak_players` rows with ISO dates.
pub fn write_daily_peaks_csv<W: Write>(writer: W, peaks: &[DailyPeak]) -> Result<(), ParseError> {
    let mut csv_writer = Writer::from_writer(writer);

    for peak in peaks {
        csv_writer.serialize(CsvRecord {
            date: peak.date.format("%Y-%m-%d").to_string(),
            peak_players: peak.peak_players,
        })?;
    }

    // header is only emitted with the first record
    if peaks.is_empty() {
        csv_writer.write_record(["date", "peak_players"])?;
    }

    csv_writer.flush()?;
    debug!("Wrote {} daily peaks as CSV", peaks.len());
    Ok(())
}
