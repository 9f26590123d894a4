use axum::{
    Router,
    routing::{get, post, delete},
    response::{IntoResponse, Response},
    http::{StatusCode, header},
    extract::{Path, Query, State, Multipart},
    Json,
};
use crate::history::RecentSources;
use crate::models::{AnalyzeRequest, CreateSessionResponse, HistoryResponse, StoredSession};
use crate::storage::{SessionStorage, StorageError};
use chrono::Utc;
use peak_parser::{AggregationRules, BracketedLogParser, ChartBar, ParseOutcome, PeakReport, Parser};
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, debug, warn, error, instrument};

// Bytes inspected when the upload's file name gives no hint
const SNIFF_LEN: usize = 512;

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<SessionStorage>,
    pub history: Arc<Mutex<RecentSources>>,
}

impl AppState {
    pub fn new(storage: SessionStorage) -> Self {
        Self {
            storage: Arc::new(storage),
            history: Arc::new(Mutex::new(RecentSources::default())),
        }
    }
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/analyze", post(analyze_path))
        .route("/sessions/:id", delete(delete_session))
        .route("/sessions/:id/peaks", get(get_peaks))
        .route("/sessions/:id/peaks.csv", get(get_peaks_csv))
        .route("/sessions/:id/chart", get(get_chart))
        .route("/history", get(get_history).delete(clear_history))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn storage_error(e: StorageError) -> ApiError {
    match e {
        StorageError::NotFound(id) => {
            warn!("Session not found: {}", id);
            (StatusCode::NOT_FOUND, format!("Session not found: {}", id))
        }
        other => {
            error!("Storage error: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Storage error: {}", other))
        }
    }
}

/// Persist a finished report under a fresh session id
fn store_report(
    storage: &SessionStorage,
    source: String,
    rules: AggregationRules,
    report: PeakReport,
) -> Result<StoredSession, ApiError> {
    let session = storage
        .store_session(|session_id| StoredSession {
            session_id,
            source,
            created_at: Utc::now(),
            rules,
            report,
        })
        .map_err(storage_error)?;

    info!("Stored session {} for {}", session.session_id, session.source);
    Ok(session)
}

#[instrument(skip(state, multipart))]
async fn create_session(
    State(state): State<AppState>,
    Query(rules): Query<AggregationRules>,
    mut multipart: Multipart,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    info!("Received log upload request");

    let mut file_data = Vec::new();
    let mut filename = String::new();

    while let Some(field) = multipart.next_field().await
        .map_err(|e| {
            error!("Multipart error: {}", e);
            (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
        })?
    {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("unknown").to_string();
            info!("Receiving file: {}", filename);

            let data = field.bytes().await
                .map_err(|e| {
                    error!("Failed to read file data: {}", e);
                    (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
                })?;
            file_data = data.to_vec();
            info!("File data received: {} bytes", file_data.len());
        }
    }

    if file_data.is_empty() {
        error!("No file data provided in request");
        return Err((StatusCode::BAD_REQUEST, "No file provided".to_string()));
    }

    let parser = BracketedLogParser;
    let sample = &file_data[..file_data.len().min(SNIFF_LEN)];
    if !parser.supports_file(&filename) && !parser.can_parse(sample) {
        warn!("Rejecting upload '{}': not a player log", filename);
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Unsupported log format: {}", filename),
        ));
    }

    debug!("Parsing upload '{}' with {} parser, rules {:?}", filename, parser.name(), rules);
    let report = peak_parser::parse_log(Cursor::new(file_data), rules)
        .map_err(|e| {
            error!("Parse error for file '{}': {}", filename, e);
            (StatusCode::BAD_REQUEST, format!("Parse error: {}", e))
        })?;

    let session = store_report(&state.storage, filename, rules, report)?;
    Ok(Json(CreateSessionResponse {
        session_id: session.session_id,
        report: session.report,
    }))
}

#[instrument(skip(state))]
async fn analyze_path(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    info!("Analyzing local log: {}", request.path);

    let path = request.path.clone();
    let rules = request.rules;
    let outcome = tokio::task::spawn_blocking(move || peak_parser::parse_log_file(path, rules))
        .await
        .map_err(|e| {
            error!("Parse task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Parse task failed: {}", e))
        })?
        .map_err(|e| {
            error!("Failed to read '{}': {}", request.path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error loading log data: {}", e))
        })?;

    let report = match outcome {
        ParseOutcome::Parsed(report) => report,
        ParseOutcome::SourceNotFound { path } => {
            return Err((
                StatusCode::NOT_FOUND,
                format!("Log file not found: {}", path.display()),
            ));
        }
    };

    let session = store_report(&state.storage, request.path.clone(), rules, report)?;
    state.history.lock().await.add(&request.path);

    Ok(Json(CreateSessionResponse {
        session_id: session.session_id,
        report: session.report,
    }))
}

async fn get_peaks(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StoredSession>, ApiError> {
    let session = state.storage.read_session(&session_id).map_err(storage_error)?;
    Ok(Json(session))
}

async fn get_peaks_csv(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let session = state.storage.read_session(&session_id).map_err(storage_error)?;

    let mut buffer = Vec::new();
    peak_parser::write_daily_peaks_csv(&mut buffer, &session.report.daily_peaks)
        .map_err(|e| {
            error!("CSV export failed for session {}: {}", session_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("CSV export failed: {}", e))
        })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv")],
        buffer,
    ).into_response())
}

async fn get_chart(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChartBar>>, ApiError> {
    let session = state.storage.read_session(&session_id).map_err(storage_error)?;
    Ok(Json(peak_parser::chart_bars(&session.report.daily_peaks)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.storage.delete_session(&session_id).map_err(storage_error)?;
    info!("Deleted session {}", session_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn get_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let sources = state.history.lock().await.entries();
    Json(HistoryResponse { sources })
}

async fn clear_history(State(state): State<AppState>) -> StatusCode {
    state.history.lock().await.clear();
    info!("Cleared recent source history");
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::fs;
    use tower::ServiceExt;

    const BOUNDARY: &str = "peak-upload-boundary";

    const LOG: &str = "[01/10/2024 10:00:00] [CONNECT] a\n\
                       [01/10/2024 10:05:00] [CONNECT] b\n\
                       [01/11/2024 09:00:00] [DISCONNECT] a\n";

    fn test_state(dir: &tempfile::TempDir) -> AppState {
        AppState::new(SessionStorage::new(dir.path().join("data")).unwrap())
    }

    async fn analyze(state: &AppState, path: String) -> Result<Json<CreateSessionResponse>, ApiError> {
        analyze_path(
            State(state.clone()),
            Json(AnalyzeRequest { path, rules: AggregationRules::default() }),
        )
        .await
    }

    #[tokio::test]
    async fn test_analyze_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let log_path = dir.path().join("players.log");
        fs::write(&log_path, LOG).unwrap();
        let log_path = log_path.display().to_string();

        let Json(created) = analyze(&state, log_path.clone()).await.unwrap();
        assert_eq!(created.report.overall_peak, 2);
        assert_eq!(created.report.daily_peaks.len(), 2);

        let Json(stored) = get_peaks(State(state.clone()), Path(created.session_id.clone()))
            .await
            .unwrap();
        assert_eq!(stored.report, created.report);
        assert_eq!(stored.source, log_path);

        let Json(bars) = get_chart(State(state.clone()), Path(created.session_id.clone()))
            .await
            .unwrap();
        let labels: Vec<_> = bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["10/01", "11/01"]);
        assert_eq!(bars[0].height_ratio, 1.0);
        assert_eq!(bars[1].height_ratio, 0.5);

        let Json(history) = get_history(State(state.clone())).await;
        assert_eq!(history.sources, vec![log_path]);
    }

    #[tokio::test]
    async fn test_analyze_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let missing = dir.path().join("missing.log").display().to_string();

        let (status, message) = analyze(&state, missing.clone()).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(message.contains(&missing));

        let Json(history) = get_history(State(state)).await;
        assert!(history.sources.is_empty());
    }

    #[tokio::test]
    async fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let log_path = dir.path().join("players.txt");
        fs::write(&log_path, LOG).unwrap();

        let Json(created) = analyze(&state, log_path.display().to_string()).await.unwrap();
        let response = get_peaks_csv(State(state), Path(created.session_id))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"date,peak_players\n2024-01-10,2\n2024-01-11,1\n");
    }

    #[tokio::test]
    async fn test_delete_and_clear_history() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let log_path = dir.path().join("players.log");
        fs::write(&log_path, LOG).unwrap();

        let Json(created) = analyze(&state, log_path.display().to_string()).await.unwrap();
        let status = delete_session(State(state.clone()), Path(created.session_id.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = get_peaks(State(state.clone()), Path(created.session_id))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert_eq!(clear_history(State(state.clone())).await, StatusCode::NO_CONTENT);
        let Json(history) = get_history(State(state)).await;
        assert!(history.sources.is_empty());
    }

    fn upload_request(uri: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/plain\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = create_routes(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_upload_creates_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let (status, body) = send(&state, upload_request("/sessions", "players.log", LOG.as_bytes())).await;
        assert_eq!(status, StatusCode::OK);

        let created: CreateSessionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.report.overall_peak, 2);
        assert_eq!(created.report.daily_peaks.len(), 2);

        let stored = state.storage.read_session(&created.session_id).unwrap();
        assert_eq!(stored.source, "players.log");
        assert_eq!(stored.report, created.report);

        // uploads are not reopenable paths, so history stays empty
        assert!(state.history.lock().await.entries().is_empty());
    }

    #[tokio::test]
    async fn test_upload_sniffs_content_without_known_extension() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let (status, _) = send(&state, upload_request("/sessions", "server-output", LOG.as_bytes())).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let (status, body) = send(&state, upload_request("/sessions", "players.log", b"")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(String::from_utf8(body).unwrap(), "No file provided");
        assert_eq!(fs::read_dir(dir.path().join("data")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_non_log_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let csv = b"ts_iso,dir,s,f\n2025-11-03T09:12:14Z,E->H,6,11\n";
        let (status, body) = send(&state, upload_request("/sessions", "data.csv", csv)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().contains("Unsupported log format"));
        assert_eq!(fs::read_dir(dir.path().join("data")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_upload_rules_from_query() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let ghost = b"[01/10/2024 00:00:00] [DISCONNECT] ghost\n[01/10/2024 08:00:00] [DISCONNECT] stray\n";

        let (status, body) = send(&state, upload_request("/sessions", "players.log", ghost)).await;
        assert_eq!(status, StatusCode::OK);
        let guarded: CreateSessionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(guarded.report.daily_peaks[0].peak_players, 0);

        let (status, body) = send(
            &state,
            upload_request("/sessions?midnight_guard=false", "players.log", ghost),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let unguarded: CreateSessionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(unguarded.report.daily_peaks[0].peak_players, -1);
        assert_eq!(unguarded.report.event_count, 2);

        let (status, body) = send(
            &state,
            upload_request(
                "/sessions?midnight_guard=false&underflow=clamp_at_zero",
                "players.log",
                ghost,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let clamped: CreateSessionResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(clamped.report.daily_peaks[0].peak_players, 0);

        let stored = state.storage.read_session(&clamped.session_id).unwrap();
        assert!(!stored.rules.midnight_guard);
        assert_eq!(stored.rules.underflow, peak_parser::UnderflowPolicy::ClampAtZero);
    }
}
