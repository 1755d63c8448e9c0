// SPDX-License-Identifier: MIT

//! HTTP surface over [`ChatService`]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::error::TrellisError;
use crate::trellis::service::{ChatRequest, ChatService};

/// JSON error body with a status code
struct ApiError(StatusCode, String);

impl From<TrellisError> for ApiError {
    fn from(e: TrellisError) -> Self {
        let status = match &e {
            TrellisError::Other(_) => StatusCode::BAD_REQUEST,
            TrellisError::Model(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

pub fn router(service: ChatService) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(stream_chat))
        .route(
            "/api/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/api/sessions", get(list_sessions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

pub async fn serve(host: &str, port: u16, service: ChatService) -> Result<(), TrellisError> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| TrellisError::config(format!("invalid listen address {}:{}: {}", host, port, e)))?;
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(service)).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn chat(State(service): State<ChatService>, Json(request): Json<ChatRequest>) -> Result<Response, ApiError> {
    let response = service.handle(request).await?;
    Ok(Json(response).into_response())
}

async fn get_conversation(State(service): State<ChatService>, Path(id): Path<String>) -> Result<Response, ApiError> {
    match service.history(&id).await? {
        Some(messages) => Ok(Json(json!({ "session_id": id, "messages": messages })).into_response()),
        None => Err(ApiError(StatusCode::NOT_FOUND, "Conversation not found".to_string())),
    }
}

async fn delete_conversation(
    State(service): State<ChatService>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    if service.delete(&id).await? {
        Ok(Json(json!({ "message": format!("Conversation {} deleted", id) })).into_response())
    } else {
        Err(ApiError(StatusCode::NOT_FOUND, "Conversation not found".to_string()))
    }
}

async fn list_sessions(State(service): State<ChatService>) -> Result<Response, ApiError> {
    let sessions = service.sessions().await?;
    Ok(Json(json!({ "total": sessions.len(), "sessions": sessions })).into_response())
}

fn json_event(name: &str, data: impl serde::Serialize) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// Run events as they happen, then one `done` (or `error`) event with the
/// final response. The run is cancelled when the client goes away.
async fn stream_chat(
    State(service): State<ChatService>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(100);
    let cancel = CancellationToken::new();

    tokio::spawn(async move {
        let (events_tx, mut events_rx) = mpsc::channel(100);

        let forward_tx = tx.clone();
        let forward_cancel = cancel.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if forward_tx.send(Ok(json_event("event", &event))).await.is_err() {
                    log::info!("Stream client disconnected; cancelling run");
                    forward_cancel.cancel();
                    break;
                }
            }
        });

        let result = service.handle_stream(request, events_tx, cancel).await;
        let _ = forwarder.await;

        let last = match result {
            Ok(response) => json_event("done", &response),
            Err(e) => {
                log::error!("Streaming chat failed: {}", e);
                json_event("error", json!({ "error": e.to_string() }))
            }
        };
        let _ = tx.send(Ok(last)).await;
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
}
