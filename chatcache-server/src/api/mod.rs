// Copyright 2025 Chatcache Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

pub mod chat;
pub mod health;
pub mod metrics;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chatcache_core::ChatService;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::metrics::ChatMetrics;

pub use chat::{chat, ChatAnswer, ChatRequest};
pub use health::health_check;
pub use metrics::metrics_exposition;

/// Body returned for every internal failure; detail stays in the logs
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERIC_ERROR_MESSAGE.to_string(),
            ),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub metrics: Arc<ChatMetrics>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(chat: Arc<ChatService>, metrics: Arc<ChatMetrics>) -> Self {
        Self {
            chat,
            metrics,
            started_at: Instant::now(),
        }
    }
}

/// Routes served by the chat service
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_exposition))
}
