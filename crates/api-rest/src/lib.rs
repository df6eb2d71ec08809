//! # API REST
//!
//! HTTP front end for the PIX gateway.
//!
//! Handles:
//! - event intake with axum (`POST /events`)
//! - health checks and the OpenAPI document
//! - REST-specific concerns (JSON errors, CORS, waiting for the gateway reply)
//!
//! The gateway itself lives in `pix-core`; this crate only holds a [`GatewayHandle`].

#![warn(rust_2018_idioms)]

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use pix_core::{EventPayload, GatewayHandle, GatewayReply};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};

/// Default time a caller waits for the registry outcome.
pub const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 60;

/// Application state shared across REST handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub gateway: GatewayHandle,
    pub reply_timeout: Duration,
}

impl AppState {
    pub fn new(gateway: GatewayHandle) -> Self {
        Self {
            gateway,
            reply_timeout: Duration::from_secs(DEFAULT_REPLY_TIMEOUT_SECS),
        }
    }

    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorRes {
    pub ok: bool,
    pub message: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, submit_event),
    components(schemas(HealthRes, ErrorRes))
)]
pub struct ApiDoc;

/// Builds the REST router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events", post(submit_event))
        .route("/api-docs/openapi.json", get(openapi))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint.
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "PIX gateway is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/events",
    request_body(
        content = String,
        content_type = "application/json",
        description = "Identity change notification from the master patient index"
    ),
    responses(
        (status = 200, description = "Registry accepted the feed; body is the HL7 acknowledgement"),
        (status = 400, description = "Malformed event", body = ErrorRes),
        (status = 502, description = "Registry rejected the feed (when rejections are reported)"),
        (status = 503, description = "Gateway is not running", body = ErrorRes),
        (status = 504, description = "No reply for this event", body = ErrorRes)
    )
)]
/// Submit an identity change event.
///
/// The request is held open until the gateway answers or `reply_timeout` passes. Events the
/// gateway does not answer (unrecognized, rejected, failed) end as `504 Gateway Timeout`.
#[axum::debug_handler]
async fn submit_event(State(state): State<AppState>, body: String) -> Response {
    let payload = match EventPayload::from_json(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!("rejecting malformed event: {e}");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let (reply, outcome) = oneshot::channel();
    if let Err(e) = state.gateway.submit_event(payload, reply).await {
        tracing::error!("failed to submit event: {e}");
        return error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string());
    }

    match tokio::time::timeout(state.reply_timeout, outcome).await {
        Ok(Ok(reply)) => reply_response(reply),
        Ok(Err(_)) => error_response(
            StatusCode::GATEWAY_TIMEOUT,
            "no reply for this event".into(),
        ),
        Err(_) => error_response(
            StatusCode::GATEWAY_TIMEOUT,
            format!("no reply within {:?}", state.reply_timeout),
        ),
    }
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn reply_response(reply: GatewayReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, [(header::CONTENT_TYPE, reply.content_type)], reply.body).into_response()
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorRes { ok: false, message })).into_response()
}
