//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::app::AppState;
use crate::game::MatchPhase;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);
    let client_bundle = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(client_bundle)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `*` allows any origin; otherwise a comma-separated allow list
fn cors_layer(client_origin: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return base.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| match s.trim().parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = s, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(allowed_origins)
}

// ============================================================================
// Status endpoint
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    players: usize,
    game_active: bool,
    game_time: u32,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.relay.status();

    Json(StatusResponse {
        players: status.players,
        game_active: status.game_active(),
        game_time: status.game_time,
    })
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    connections: usize,
    phase: MatchPhase,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        connections: state.session_count(),
        phase: state.relay.status().phase,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn test_state(static_dir: Option<PathBuf>) -> AppState {
        let mut config = Config::from_lookup(|_| None).unwrap();
        if let Some(dir) = static_dir {
            config.static_dir = dir;
        }
        // The match task is not spawned; handlers only read published status
        let (state, _game_match) = AppState::new(config);
        state
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_shape() {
        let (code, body) = get_json(build_router(test_state(None)), "/status").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["players"], 0);
        assert_eq!(body["gameActive"], false);
        assert_eq!(body["gameTime"], 300);
    }

    #[tokio::test]
    async fn test_health_reports_phase_and_sessions() {
        let state = test_state(None);
        state.open_session(uuid::Uuid::new_v4());
        let (code, body) = get_json(build_router(state), "/health").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 1);
        assert_eq!(body["phase"], "waiting");
        assert!(body["uptimeSecs"].is_u64());
    }

    #[tokio::test]
    async fn test_root_serves_client_bundle() {
        let dir = std::env::temp_dir().join(format!("relay-static-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<html>paintball</html>").unwrap();

        let router = build_router(test_state(Some(dir.clone())));
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<html>paintball</html>");

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_asset_is_not_found() {
        let router = build_router(test_state(Some(PathBuf::from("/nonexistent-relay-dir"))));
        let response = router
            .oneshot(Request::builder().uri("/missing.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let router = build_router(test_state(None));
        let response = router
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[test]
    fn test_cors_origin_list_skips_invalid() {
        // Builds without panicking for both forms
        let _ = cors_layer("*");
        let _ = cors_layer("https://a.example, bad\nvalue ,https://b.example");
    }
}
