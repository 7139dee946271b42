//! Webhook server for the WhatsApp Cloud API

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::api::{CloudApiClient, VerifyQuery, WebhookPayload, verify_challenge, verify_signature};
use crate::error::{Result, WhatsAppError};
use crate::responder::Responder;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Webhook server state
pub struct WebhookState {
    pub whatsapp: CloudApiClient,
    pub responder: Responder,
    pub verify_token: String,
    /// When set, POST bodies must be signed with it
    pub app_secret: Option<String>,
}

/// Create the webhook router
pub fn create_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook", get(verify).post(receive))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({"status": "running"}))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

/// Subscription handshake
async fn verify(State(state): State<Arc<WebhookState>>, Query(query): Query<VerifyQuery>) -> Response {
    match verify_challenge(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        &state.verify_token,
    ) {
        Ok(challenge) => plain_text(StatusCode::OK, challenge),
        Err(_) => plain_text(StatusCode::FORBIDDEN, "Invalid token".to_string()),
    }
}

/// Message delivery. Answers `{"status":"ok"}` whatever happens while handling.
async fn receive(State(state): State<Arc<WebhookState>>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(secret) = state.app_secret.as_deref() {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        if !verify_signature(secret, &body, signature) {
            warn!("Rejected webhook with missing or invalid signature");
            return (StatusCode::UNAUTHORIZED, Json(json!({"status": "unauthorized"}))).into_response();
        }
    }

    debug!("Webhook payload: {}", String::from_utf8_lossy(&body));

    match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => handle_payload(&state, payload).await,
        Err(e) => error!("Invalid webhook payload: {}", e),
    }

    Json(json!({"status": "ok"})).into_response()
}

async fn handle_payload(state: &WebhookState, payload: WebhookPayload) {
    for message in payload.incoming() {
        info!("Received WhatsApp message from {}: {}", message.from, message.text);

        let reply = state.responder.respond(&message, Utc::now()).await;
        if let Err(e) = state.whatsapp.send_text(&message.from, &reply).await {
            error!("Failed to send reply to {}: {}", message.from, e);
        }
    }
}

/// Webhook server
pub struct WebhookServer {
    addr: SocketAddr,
    state: Arc<WebhookState>,
}

impl WebhookServer {
    pub fn new(addr: SocketAddr, state: WebhookState) -> Self {
        Self {
            addr,
            state: Arc::new(state),
        }
    }

    /// Serve until `shutdown` completes
    pub async fn start(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        info!("Starting WhatsApp webhook server on {}", self.addr);

        let app = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| WhatsAppError::Server(e.to_string()))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| WhatsAppError::Server(e.to_string()))?;

        info!("Webhook server stopped");
        Ok(())
    }
}
