// HTTP API for the debug runtime.
//
// Navigation requests go through the frame loop's command channel. Session
// requests lock the shared session manager directly; its operations are async
// and must not run inside a frame.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::signal;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, warn};
use wayfinder::session::SessionType;
use wayfinder::SessionManager;

use crate::commands::{
    FrameSnapshot, InputPatch, InputResult, RuntimeCommand, TeleportRequest, TeleportResult,
};

#[derive(Clone)]
pub struct AppState {
    pub commands: mpsc::UnboundedSender<RuntimeCommand>,
    pub sessions: Arc<Mutex<SessionManager>>,
}

type ApiError = (StatusCode, Json<Value>);

fn frame_loop_gone() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "frame loop is not running" })),
    )
}

impl AppState {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RuntimeCommand,
    ) -> Result<T, ApiError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .map_err(|_| frame_loop_gone())?;
        reply_rx.await.map_err(|_| frame_loop_gone())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health_check))
        .route("/v1/navigation", get(get_navigation))
        .route("/v1/input", post(post_input))
        .route("/v1/teleport", post(post_teleport))
        .route("/v1/session/start", post(start_session))
        .route("/v1/session/end", post(end_session))
        .route("/v1/sessions", get(get_sessions))
        .with_state(state)
}

/// Start the HTTP server
pub async fn serve(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    // Bind to localhost only
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Debug runtime listening on http://{}", addr);

    info!("Available endpoints:");
    info!("  GET  /v1/health           - Health check and server status");
    info!("  GET  /v1/navigation       - Navigation state snapshot");
    info!("  POST /v1/input            - Keys, thumbstick, trigger and tuning");
    info!("  POST /v1/teleport         - Aim and execute a teleport");
    info!("  POST /v1/session/start    - Start a VR or AR session");
    info!("  POST /v1/session/end      - End the active session");
    info!("  GET  /v1/sessions         - Export session metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "debug_runtime",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_navigation(State(state): State<AppState>) -> Result<Json<FrameSnapshot>, ApiError> {
    state.request(RuntimeCommand::GetNavigation).await.map(Json)
}

async fn post_input(
    State(state): State<AppState>,
    Json(patch): Json<InputPatch>,
) -> Result<Json<InputResult>, ApiError> {
    let result = state
        .request(|reply| RuntimeCommand::SetInput(patch, reply))
        .await?;
    if result.applied {
        state.sessions.lock().await.record_interaction();
    }
    Ok(Json(result))
}

async fn post_teleport(
    State(state): State<AppState>,
    Json(request): Json<TeleportRequest>,
) -> Result<Json<TeleportResult>, ApiError> {
    let result = state
        .request(|reply| RuntimeCommand::Teleport(request, reply))
        .await?;
    if result.success {
        let mut sessions = state.sessions.lock().await;
        sessions.record_interaction();
        sessions.track_feature_usage("teleport");
    }
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    #[serde(rename = "type")]
    session_type: SessionType,
    user_id: Option<String>,
}

async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut sessions = state.sessions.lock().await;
    let started = sessions
        .start_session(request.session_type, request.user_id)
        .await;

    if started {
        state
            .commands
            .send(RuntimeCommand::SetImmersive(Some(request.session_type)))
            .map_err(|_| frame_loop_gone())?;
    }

    Ok(Json(json!({
        "started": started,
        "deviceType": sessions.current_device_type(),
        "session": sessions.current_session_state(),
    })))
}

async fn end_session(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let mut sessions = state.sessions.lock().await;
    let was_active = sessions.is_session_active();
    sessions.end_session().await;

    state
        .commands
        .send(RuntimeCommand::SetImmersive(None))
        .map_err(|_| frame_loop_gone())?;

    Ok(Json(json!({ "ended": was_active })))
}

async fn get_sessions(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let export = state.sessions.lock().await.export_session_data();
    serde_json::from_str(&export).map(Json).map_err(|err| {
        warn!("Session export did not parse: {}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
