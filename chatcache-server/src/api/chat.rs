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

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::{ApiError, AppState};
use crate::metrics::RequestOutcome;

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
}

/// POST /chat - Answer a question, from cache when possible
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatAnswer>, ApiError> {
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let request = state.metrics.start_request();

    match state.chat.ask(&req.question).await {
        Ok(outcome) => {
            let result = if outcome.cache_hit {
                RequestOutcome::CacheHit
            } else {
                RequestOutcome::Generated
            };
            let elapsed = request.finish(result);
            info!(
                cache_hit = outcome.cache_hit,
                "Response time: {:.2} seconds",
                elapsed.as_secs_f64()
            );

            Ok(Json(ChatAnswer {
                answer: outcome.answer,
            }))
        }
        Err(e) => {
            let elapsed = request.finish(RequestOutcome::Failed);
            error!(
                question = %req.question,
                stage = e.kind(),
                "Error processing question: {} (Response time: {:.2} seconds)",
                e,
                elapsed.as_secs_f64()
            );

            Err(ApiError::Internal(e.to_string()))
        }
    }
}
