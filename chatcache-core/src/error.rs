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

use thiserror::Error;

/// Failures surfaced by the chat pipeline.
///
/// Request validation is not represented here; malformed bodies are
/// rejected by the HTTP layer before they reach the core.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The key-value store could not be reached or rejected a command
    #[error("cache store unavailable: {0}")]
    CacheUnavailable(String),

    /// The language-model backend failed or returned malformed output
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),
}

impl ChatError {
    /// Short stage label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::CacheUnavailable(_) => "cache",
            ChatError::ModelInvocation(_) => "model",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
