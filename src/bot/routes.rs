//! HTTP surface: transport webhook, payment callback, liveness.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::bot::Bot;
use crate::channels::{InboundMessage, strip_whatsapp_prefix};
use crate::error::{Error, PaymentError};
use crate::payment::PaymentCallback;

/// Shared state for the routes.
#[derive(Clone)]
pub struct BotRouteState {
    pub bot: Arc<Bot>,
}

/// Twilio-style webhook form payload.
#[derive(Debug, Deserialize)]
pub struct WhatsAppWebhook {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "MediaUrl0")]
    pub media_url: Option<String>,
}

/// POST /webhook/whatsapp
///
/// Processes one inbound message and returns the reply body. Transport
/// retries of the same message are safe: invalid-input re-prompts are
/// stateless and booking commitment is idempotent.
async fn inbound_webhook(
    State(state): State<BotRouteState>,
    Form(payload): Form<WhatsAppWebhook>,
) -> impl IntoResponse {
    let message = InboundMessage {
        sender: strip_whatsapp_prefix(&payload.from).to_string(),
        text: payload.body,
        attachment_url: payload.media_url,
    };

    match state.bot.handle_inbound(&message).await {
        Ok(reply) => (StatusCode::OK, reply).into_response(),
        Err(e) => {
            tracing::error!(sender = %message.sender, "Webhook processing failed: {e}");
            (
                StatusCode::OK,
                "Something went wrong. Please try again.".to_string(),
            )
                .into_response()
        }
    }
}

/// POST /api/payments/callback
async fn payment_callback(
    State(state): State<BotRouteState>,
    Json(callback): Json<PaymentCallback>,
) -> impl IntoResponse {
    match state.bot.handle_payment_callback(&callback).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))).into_response(),
        Err(Error::Payment(PaymentError::UnknownReference(reference))) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "unknown reference", "reference": reference})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Payment callback failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal"})),
            )
                .into_response()
        }
    }
}

/// GET /healthz
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Build the bot's HTTP routes.
pub fn bot_routes(state: BotRouteState) -> Router {
    Router::new()
        .route("/webhook/whatsapp", post(inbound_webhook))
        .route("/api/payments/callback", post(payment_callback))
        .route("/healthz", get(healthz))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
