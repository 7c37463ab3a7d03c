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

//! Prompt templates for answer generation

/// Question asked with prior conversation in view
pub const HISTORY_TEMPLATE: &str = "\nConversation history: {context}\n\nBased on this conversation history, respond only to the following question. \n\nQuestion: {question}\n";

/// Question asked on its own
pub const BARE_TEMPLATE: &str = "\n{question}\n";

/// Template with `{name}` placeholders.
///
/// Substitution is single-pass: placeholder-like text inside a
/// substituted value is left alone, and unknown placeholders are kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn bare() -> Self {
        Self::new(BARE_TEMPLATE)
    }

    pub fn with_history() -> Self {
        Self::new(HISTORY_TEMPLATE)
    }

    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let value = after.find('}').and_then(|close| {
                let name = &after[..close];
                vars.iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| (*value, close))
            });

            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}
