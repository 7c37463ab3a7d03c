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

//! Chatcache Core
//!
//! Cache-and-context policy for answering questions with a language
//! model: a TTL key-value store abstraction, the rolling context window,
//! prompt rendering and the per-request orchestration.

pub mod chat;
pub mod context;
pub mod error;
pub mod generator;
pub mod prompt;
pub mod store;

pub use chat::{CachePolicy, ChatOutcome, ChatService, DEFAULT_ANSWER_TTL, DEFAULT_CONTEXT_TTL};
pub use context::{ContextWindow, CONTEXT_KEY, DEFAULT_MAX_CONTEXT_LINES};
pub use error::{ChatError, Result};
pub use generator::{AnswerGenerator, LanguageModel, PromptMode};
pub use prompt::{PromptTemplate, BARE_TEMPLATE, HISTORY_TEMPLATE};
pub use store::{CacheStore, Clock, ManualClock, MemoryStore, SystemClock};
