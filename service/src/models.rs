use chrono::{DateTime, Utc};
use peak_parser::{AggregationRules, PeakReport};
use serde::{Deserialize, Serialize};

/// Analysis result kept on disk for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session_id: String,
    /// Upload file name or local path the log came from
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub rules: AggregationRules,
    pub report: PeakReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub report: PeakReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub path: String,
    #[serde(default)]
    pub rules: AggregationRules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub sources: Vec<String>,
}
