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

//! Cache-and-context protocol for a single chat request
//!
//! ```text
//! exists(question)? ──yes──▶ get(question) ─────────────────────────────▶ answer (hit)
//!        │no
//!        ▼
//! get(context) ▶ trim ▶ generate ▶ set(question, 600s) ▶ set(context, 3600s) ▶ answer
//! ```
//!
//! The shared context key is read, extended and rewritten without any
//! versioning. Two misses processed at the same time can both read the
//! same transcript and the later write wins, dropping one exchange.
//!
//! The two writes are not transactional. If the transcript write fails
//! the request fails, but the answer written just before it stays cached.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::context::{ContextWindow, CONTEXT_KEY, DEFAULT_MAX_CONTEXT_LINES};
use crate::error::Result;
use crate::generator::AnswerGenerator;
use crate::store::CacheStore;

pub const DEFAULT_ANSWER_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_CONTEXT_TTL: Duration = Duration::from_secs(3600);

/// Expiry and windowing knobs for [`ChatService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub answer_ttl: Duration,
    pub context_ttl: Duration,
    pub context_key: String,
    pub max_context_lines: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            answer_ttl: DEFAULT_ANSWER_TTL,
            context_ttl: DEFAULT_CONTEXT_TTL,
            context_key: CONTEXT_KEY.to_string(),
            max_context_lines: DEFAULT_MAX_CONTEXT_LINES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub answer: String,
    pub cache_hit: bool,
}

pub struct ChatService {
    store: Arc<dyn CacheStore>,
    generator: AnswerGenerator,
    window: ContextWindow,
    policy: CachePolicy,
}

impl ChatService {
    pub fn new(store: Arc<dyn CacheStore>, generator: AnswerGenerator, policy: CachePolicy) -> Self {
        Self {
            store,
            generator,
            window: ContextWindow::new(policy.max_context_lines),
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Answer `question`, serving from cache when possible.
    ///
    /// A hit leaves the transcript untouched. A miss generates an answer
    /// from the trimmed transcript, caches it and rewrites the transcript
    /// with the new exchange appended.
    pub async fn ask(&self, question: &str) -> Result<ChatOutcome> {
        if let Some(answer) = self.cached_answer(question).await? {
            info!(question = %question, "Cache hit for question");
            return Ok(ChatOutcome {
                answer,
                cache_hit: true,
            });
        }

        let context = self
            .store
            .get(&self.policy.context_key)
            .await?
            .unwrap_or_default();
        let trimmed = self.window.trim(&context);

        let answer = self.generator.generate(question, &trimmed).await?;

        if self.answer_cacheable(question) {
            self.store
                .set_with_ttl(question, &answer, self.policy.answer_ttl)
                .await?;
        }

        let updated = ContextWindow::append(&trimmed, question, &answer);
        self.store
            .set_with_ttl(&self.policy.context_key, &updated, self.policy.context_ttl)
            .await?;

        info!(answer = %answer, "Generated answer");

        Ok(ChatOutcome {
            answer,
            cache_hit: false,
        })
    }

    async fn cached_answer(&self, question: &str) -> Result<Option<String>> {
        if !self.answer_cacheable(question) || !self.store.exists(question).await? {
            return Ok(None);
        }

        let answer = self.store.get(question).await?;
        if answer.is_none() {
            debug!(question = %question, "Cached answer expired between lookup and read");
        }
        Ok(answer)
    }

    // The transcript shares the keyspace with answers; a question spelled
    // exactly like the context key must never read or overwrite it.
    fn answer_cacheable(&self, question: &str) -> bool {
        question != self.policy.context_key
    }
}
