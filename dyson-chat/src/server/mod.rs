//! Local development server.
//!
//! Stands in for the remote chat service so the client can be exercised
//! without one, and exposes the saved-chat library read-only.
//!
//! Endpoints:
//! - POST /chat - Echo responder (`{"message"}` in, `{"response"}` out)
//! - GET /api/chats - List saved chats, newest first
//! - GET /api/chats/{id} - One saved chat

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::client::{ChatRequest, ChatResponse};
use crate::error::LibraryError;
use crate::library::{ChatLibrary, SavedChat};

/// Shared server state.
pub struct ServerState {
    library: ChatLibrary,
}

/// Saved chat summary for listing.
#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub saved_at: String,
}

impl From<SavedChat> for ChatSummary {
    fn from(chat: SavedChat) -> Self {
        Self {
            id: chat.id,
            title: chat.title,
            saved_at: chat.saved_at.to_rfc3339(),
        }
    }
}

/// Build the router. CORS is open so a browser page on another origin can
/// talk to it.
pub fn router(library: ChatLibrary) -> Router {
    let state = Arc::new(ServerState { library });

    Router::new()
        .route("/chat", post(chat))
        .route("/api/chats", get(list_chats))
        .route("/api/chats/{id}", get(get_chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the process is stopped.
pub async fn start_server(port: u16, library: ChatLibrary) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(%addr, library = %library.dir().display(), "dev server listening");
    println!("Dyson dev server on http://{addr}/chat");

    axum::serve(listener, router(library))
        .await
        .context("Server error")
}

/// Reply text for the echo responder. Multi-line input is echoed as a list.
fn echo_reply(message: &str) -> String {
    let lines: Vec<&str> = message
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    match lines.as_slice() {
        [] => String::new(),
        [one] => format!("You said: {one}"),
        many => {
            let items: Vec<String> = many.iter().map(|l| format!("- {l}")).collect();
            format!("You said:\n{}", items.join("\n"))
        }
    }
}

// === Handlers ===

async fn chat(Json(req): Json<ChatRequest>) -> Json<ChatResponse> {
    Json(ChatResponse {
        response: Some(echo_reply(&req.message)),
    })
}

async fn list_chats(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<ChatSummary>>, StatusCode> {
    let chats = state.library.list().await.map_err(|e| {
        warn!(error = %e, "failed to list saved chats");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(chats.into_iter().map(ChatSummary::from).collect()))
}

async fn get_chat(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<SavedChat>, StatusCode> {
    match state.library.load(&id).await {
        Ok(chat) => Ok(Json(chat)),
        Err(LibraryError::NotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!(error = %e, id, "failed to load saved chat");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
