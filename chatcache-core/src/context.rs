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

//! Rolling conversation window
//!
//! The transcript is stored as newline-delimited `User: …` / `AI: …`
//! lines. Storage is unbounded; only the trailing `max_lines` lines are
//! ever handed to the model.

/// Sentinel key of the shared transcript slot
pub const CONTEXT_KEY: &str = "context";

/// Five user/AI exchanges
pub const DEFAULT_MAX_CONTEXT_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    max_lines: usize,
}

impl ContextWindow {
    pub fn new(max_lines: usize) -> Self {
        Self { max_lines }
    }

    /// Keep the last `max_lines` lines of `raw`, in order.
    ///
    /// Surrounding whitespace is stripped first. An empty result means
    /// there is no prior conversation. Line contents are not validated.
    pub fn trim(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.is_empty() {
            return String::new();
        }

        let lines: Vec<&str> = raw.split('\n').collect();
        let start = lines.len().saturating_sub(self.max_lines);
        lines[start..].join("\n")
    }

    /// Append one exchange to an already trimmed transcript
    pub fn append(trimmed: &str, question: &str, answer: &str) -> String {
        let exchange = format!("User: {}\nAI: {}", question, answer);
        if trimmed.is_empty() {
            exchange
        } else {
            format!("{}\n{}", trimmed, exchange)
        }
    }
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_LINES)
    }
}
