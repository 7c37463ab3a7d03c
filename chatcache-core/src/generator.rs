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

//! Answer generation on top of an opaque language model

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::prompt::PromptTemplate;

/// A language-model backend that turns a rendered prompt into text.
///
/// Implementations own transport concerns such as timeouts; callers get
/// either the generated text or a `ChatError::ModelInvocation`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Only the question is sent
    Bare,
    /// Trimmed history and question are sent together
    WithHistory,
}

impl PromptMode {
    pub fn for_context(trimmed_context: &str) -> Self {
        if trimmed_context.is_empty() {
            PromptMode::Bare
        } else {
            PromptMode::WithHistory
        }
    }
}

pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    bare: PromptTemplate,
    with_history: PromptTemplate,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self::with_templates(model, PromptTemplate::bare(), PromptTemplate::with_history())
    }

    pub fn with_templates(
        model: Arc<dyn LanguageModel>,
        bare: PromptTemplate,
        with_history: PromptTemplate,
    ) -> Self {
        Self {
            model,
            bare,
            with_history,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Render the prompt for `question`, choosing the mode from whether
    /// `trimmed_context` is empty
    pub fn render(&self, question: &str, trimmed_context: &str) -> (PromptMode, String) {
        let mode = PromptMode::for_context(trimmed_context);
        let prompt = match mode {
            PromptMode::Bare => self.bare.render(&[("question", question)]),
            PromptMode::WithHistory => self
                .with_history
                .render(&[("context", trimmed_context), ("question", question)]),
        };
        (mode, prompt)
    }

    pub async fn generate(&self, question: &str, trimmed_context: &str) -> Result<String> {
        let (mode, prompt) = self.render(question, trimmed_context);
        debug!(
            model = %self.model.name(),
            mode = ?mode,
            prompt_len = prompt.len(),
            "Invoking language model"
        );
        self.model.complete(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use parking_lot::Mutex;

    struct EchoModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            Ok(format!("echo:{}", prompt.trim()))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl LanguageModel for BrokenModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(ChatError::ModelInvocation("backend offline".into()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(PromptMode::for_context(""), PromptMode::Bare);
        assert_eq!(PromptMode::for_context("User: Hi\nAI: Hello"), PromptMode::WithHistory);
    }

    #[tokio::test]
    async fn test_bare_prompt_carries_only_question() {
        let model = Arc::new(EchoModel {
            prompts: Mutex::new(Vec::new()),
        });
        let generator = AnswerGenerator::new(model.clone());

        let answer = generator.generate("Hello", "").await.unwrap();

        assert_eq!(answer, "echo:Hello");
        assert_eq!(*model.prompts.lock(), vec!["\nHello\n".to_string()]);
    }

    #[tokio::test]
    async fn test_history_prompt_carries_context() {
        let model = Arc::new(EchoModel {
            prompts: Mutex::new(Vec::new()),
        });
        let generator = AnswerGenerator::new(model.clone());

        generator
            .generate("How are you?", "User: Hi\nAI: Hello")
            .await
            .unwrap();

        let prompts = model.prompts.lock();
        assert!(prompts[0].contains("Conversation history: User: Hi\nAI: Hello"));
        assert!(prompts[0].contains("Question: How are you?"));
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let generator = AnswerGenerator::new(Arc::new(BrokenModel));
        let err = generator.generate("Hello", "").await.unwrap_err();
        assert!(matches!(err, ChatError::ModelInvocation(_)));
    }
}
