use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::clock::SystemClock;
use crate::config::RelayConfig;
use crate::envelope::InboundEnvelope;
use crate::error::RelayError;
use crate::ollama::{InferenceError, OllamaClient};
use crate::sanitize::sanitize;
use crate::signal::shutdown_signal;
use crate::signature;

/// Reply to anything that is not a text message.
pub const TEXT_ONLY_REPLY: &str = "当前仅支持文本消息。";
/// Reply to a text message with no content.
pub const EMPTY_MESSAGE_REPLY: &str = "你发了空消息，我接不到内容。";
/// Reply when the model could not answer in time.
pub const BACKEND_FALLBACK_REPLY: &str = "我这边刚刚没算出来，你再发一次我就能接上。";

/// Query parameters WeChat appends to every callback.
///
/// Missing parameters are read as empty strings, which then fail verification.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackQuery {
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
    /// Only sent on the GET handshake.
    pub echostr: String,
}

#[derive(Clone)]
pub struct AppState {
    token: Arc<str>,
    ollama: OllamaClient,
    style_directive: Option<Arc<str>>,
    clock: SystemClock,
}

impl AppState {
    pub fn from_config(config: &RelayConfig) -> Result<Self, InferenceError> {
        Ok(Self {
            token: Arc::from(config.token.as_str()),
            ollama: OllamaClient::new(config.ollama.clone())?,
            style_directive: config.style_directive.as_deref().map(Arc::from),
            clock: SystemClock,
        })
    }

    fn verify(&self, query: &CallbackQuery) -> Result<(), RelayError> {
        if signature::verify(&self.token, &query.signature, &query.timestamp, &query.nonce) {
            Ok(())
        } else {
            Err(RelayError::SignatureInvalid)
        }
    }

    /// Picks the reply text for a parsed message. Never fails: backend errors
    /// become [`BACKEND_FALLBACK_REPLY`].
    async fn answer(&self, envelope: &InboundEnvelope) -> String {
        if !envelope.is_text() {
            return TEXT_ONLY_REPLY.to_string();
        }

        let user_text = envelope.content.trim();
        if user_text.is_empty() {
            return EMPTY_MESSAGE_REPLY.to_string();
        }

        match self.ollama.ask(user_text, self.style_directive.as_deref()).await {
            Ok(raw) => sanitize(&raw),
            Err(e) => {
                warn!(error = %e, model = self.ollama.model(), "Inference failed, sending fallback reply");
                BACKEND_FALLBACK_REPLY.to_string()
            }
        }
    }
}

/// Builds the callback router: `GET`/`POST` on `path`, plus `GET /health`.
pub fn router(state: AppState, path: &str) -> Router {
    Router::new()
        .route(path, get(handle_handshake).post(handle_message))
        .route("/health", get(health))
        .with_state(state)
}

/// Starts the relay HTTP server and runs until SIGINT/SIGTERM.
pub async fn serve(config: RelayConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = AppState::from_config(&config)?;
    let app = router(state, &config.path);

    let listener = bind(&config.host, config.port).await?;
    let addr = listener.local_addr()?;
    info!(
        addr = %addr,
        path = %config.path,
        model = %config.ollama.model,
        timeout_ms = config.ollama.timeout.as_millis() as u64,
        "WeChat relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("WeChat relay stopped");
    Ok(())
}

/// Binds to `host`, which may be an IP literal or a name such as `localhost`.
async fn bind(host: &str, port: u16) -> std::io::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind((host, port)).await
}

#[instrument(name = "wechat.handshake", skip_all)]
async fn handle_handshake(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<String, RelayError> {
    state.verify(&query)?;
    info!("Handshake verified");
    Ok(query.echostr)
}

#[instrument(
    name = "wechat.message",
    skip_all,
    fields(
        msg_type = tracing::field::Empty,
        from_user = tracing::field::Empty,
    )
)]
async fn handle_message(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Result<Response, RelayError> {
    state.verify(&query)?;

    let envelope = InboundEnvelope::parse(&body)?;

    let span = tracing::Span::current();
    span.record("msg_type", envelope.msg_type.as_str());
    span.record("from_user", envelope.from_user.as_str());

    let content = state.answer(&envelope).await;
    let xml = envelope.reply(content).to_xml(&state.clock);

    info!("Replied to message");
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml).into_response())
}

async fn health() -> &'static str {
    "ok"
}
