use crate::DailyPeak;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Day/month label shown under each bar
pub const LABEL_FORMAT: &str = "%d/%m";

/// One bar of the daily peak chart. `height_ratio` is in `0.0..=1.0`
/// relative to the busiest day; the renderer multiplies it by its own height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub date: NaiveDate,
    pub label: String,
    pub peak_players: i64,
    pub height_ratio: f64,
}

pub fn chart_bars(peaks: &[DailyPeak]) -> Vec<ChartBar> {
    let max_peak = peaks.iter().map(|p| p.peak_players).max().unwrap_or(0);

    peaks
        .iter()
        .map(|peak| {
            let height_ratio = if max_peak > 0 && peak.peak_players > 0 {
                peak.peak_players as f64 / max_peak as f64
            } else {
                0.0
            };

            ChartBar {
                date: peak.date,
                label: peak.date.format(LABEL_FORMAT).to_string(),
                peak_players: peak.peak_players,
                height_ratio,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(month: u32, day: u32, peak_players: i64) -> DailyPeak {
        DailyPeak {
            date: NaiveDate::from_ymd_opt(2024, month, day).unwrap(),
            peak_players,
        }
    }

    #[test]
    fn test_bars_scale_to_busiest_day() {
        let bars = chart_bars(&[peak(1, 9, 2), peak(1, 10, 4), peak(2, 1, 1)]);

        let labels: Vec<_> = bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["09/01", "10/01", "01/02"]);

        let ratios: Vec<_> = bars.iter().map(|b| b.height_ratio).collect();
        assert_eq!(ratios, vec![0.5, 1.0, 0.25]);
    }

    #[test]
    fn test_flat_or_negative_peaks_have_no_height() {
        let bars = chart_bars(&[peak(1, 10, 0), peak(1, 11, -1)]);
        assert!(bars.iter().all(|b| b.height_ratio == 0.0));

        let bars = chart_bars(&[peak(1, 10, -1), peak(1, 11, 3)]);
        assert_eq!(bars[0].height_ratio, 0.0);
        assert_eq!(bars[1].height_ratio, 1.0);
    }

    #[test]
    fn test_empty_chart() {
        assert!(chart_bars(&[]).is_empty());
    }
}
