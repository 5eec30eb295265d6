use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: checks DB connectivity with timeout protection
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: counters plus the current session and lock gauges
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_snapshot();
    let open_sessions = state.sessions.read().await.len();
    Json(serde_json::json!({
        "counters": snapshot,
        "open_sessions": open_sessions,
        "active_locks": state.locks.len(),
    }))
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let open_sessions = state.sessions.read().await.len();
    let body = format!(
        "# HELP seitenwerk_sessions_opened Editor sessions opened\n# TYPE seitenwerk_sessions_opened counter\nseitenwerk_sessions_opened {}\n\
# HELP seitenwerk_saves_completed Metadata saves completed\n# TYPE seitenwerk_saves_completed counter\nseitenwerk_saves_completed {}\n\
# HELP seitenwerk_saves_failed Metadata saves failed\n# TYPE seitenwerk_saves_failed counter\nseitenwerk_saves_failed {}\n\
# HELP seitenwerk_lock_expiries Edits rejected after lock expiry\n# TYPE seitenwerk_lock_expiries counter\nseitenwerk_lock_expiries {}\n\
# HELP seitenwerk_pages_created Pages created by reconciliation\n# TYPE seitenwerk_pages_created counter\nseitenwerk_pages_created {}\n\
# HELP seitenwerk_pages_deleted Pages deleted\n# TYPE seitenwerk_pages_deleted counter\nseitenwerk_pages_deleted {}\n\
# HELP seitenwerk_previews_generated Previews rendered\n# TYPE seitenwerk_previews_generated counter\nseitenwerk_previews_generated {}\n\
# HELP seitenwerk_open_sessions Open editor sessions\n# TYPE seitenwerk_open_sessions gauge\nseitenwerk_open_sessions {}\n\
# HELP seitenwerk_active_locks Process locks held\n# TYPE seitenwerk_active_locks gauge\nseitenwerk_active_locks {}\n\
# HELP seitenwerk_uptime_seconds Uptime seconds\n# TYPE seitenwerk_uptime_seconds gauge\nseitenwerk_uptime_seconds {}\n",
        m.sessions_opened,
        m.saves_completed,
        m.saves_failed,
        m.lock_expiries,
        m.pages_created,
        m.pages_deleted,
        m.previews_generated,
        open_sessions,
        state.locks.len(),
        m.uptime_seconds,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
