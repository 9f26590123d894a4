use crate::{DailyPeak, EventKind, LogEvent, PeakReport};
use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What happens when a disconnect arrives while the counter is already zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderflowPolicy {
    /// Decrement anyway; the counter goes negative.
    #[default]
    Allow,
    /// Keep the counter at zero.
    ClampAtZero,
}

/// Knobs for the event replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRules {
    /// Drop disconnects stamped exactly 00:00:00 while nobody is online.
    /// These are rollover records from the previous session's log.
    #[serde(default = "default_midnight_guard")]
    pub midnight_guard: bool,
    #[serde(default)]
    pub underflow: UnderflowPolicy,
}

fn default_midnight_guard() -> bool {
    true
}

impl Default for AggregationRules {
    fn default() -> Self {
        Self {
            midnight_guard: default_midnight_guard(),
            underflow: UnderflowPolicy::default(),
        }
    }
}

/// Midnight guard rule: a disconnect at exactly midnight with an empty server
/// is a rollover artifact and is ignored.
pub fn is_midnight_rollover(event: &LogEvent, current_players: i64) -> bool {
    event.kind == EventKind::Disconnect
        && event.timestamp.num_seconds_from_midnight() == 0
        && current_players == 0
}

/// Replays connect/disconnect events and tracks per-day and overall peaks.
///
/// Fresh counters per instance; feed events in timestamp order.
#[derive(Debug, Default)]
pub struct PeakAggregator {
    rules: AggregationRules,
    current_players: i64,
    overall_peak: i64,
    daily: BTreeMap<NaiveDate, i64>,
    event_count: usize,
}

impl PeakAggregator {
    pub fn new(rules: AggregationRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn current_players(&self) -> i64 {
        self.current_players
    }

    /// Apply one event. Returns false when the event was discarded.
    pub fn apply(&mut self, event: &LogEvent) -> bool {
        match event.kind {
            EventKind::Connect => self.current_players += 1,
            EventKind::Disconnect => {
                if self.rules.midnight_guard && is_midnight_rollover(event, self.current_players) {
                    debug!("Ignoring midnight rollover disconnect at {}", event.timestamp);
                    // the day is still seen, but its peak is left alone
                    self.daily
                        .entry(event.timestamp.date())
                        .or_insert(self.current_players);
                    return false;
                }

                if self.current_players <= 0 {
                    debug!(
                        "Disconnect at {} with {} players online ({:?})",
                        event.timestamp, self.current_players, self.rules.underflow
                    );
                }

                self.current_players = match self.rules.underflow {
                    UnderflowPolicy::Allow => self.current_players - 1,
                    UnderflowPolicy::ClampAtZero => (self.current_players - 1).max(0),
                };
            }
        }

        let current = self.current_players;
        self.daily
            .entry(event.timestamp.date())
            .and_modify(|peak| *peak = (*peak).max(current))
            .or_insert(current);

        if current > self.overall_peak {
            self.overall_peak = current;
        }

        self.event_count += 1;
        true
    }

    pub fn finish(self) -> PeakReport {
        let daily_peaks: Vec<DailyPeak> = self
            .daily
            .into_iter()
            .map(|(date, peak_players)| DailyPeak { date, peak_players })
            .collect();

        info!(
            "Aggregation complete: {} days, overall peak {}",
            daily_peaks.len(),
            self.overall_peak
        );

        PeakReport {
            overall_peak: self.overall_peak,
            daily_peaks,
            event_count: self.event_count,
            skipped_lines: Vec::new(),
        }
    }
}

/// Aggregate a sorted event list in one pass.
pub fn aggregate(events: &[LogEvent], rules: AggregationRules) -> PeakReport {
    let mut aggregator = PeakAggregator::new(rules);
    for event in events {
        aggregator.apply(event);
    }
    debug!("Replay ended with {} players online", aggregator.current_players());
    aggregator.finish()
}
