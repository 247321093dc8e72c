// Generator module
// Prompt construction and text generation over retrieved context


use std::sync::Arc;
use tracing::{debug, warn};

use crate::embeddings::OllamaClient;

/// Returned when the model produces no text
pub const NO_INFORMATION: &str = "No relevant information found.";

/// Opaque text-in, text-out language model.
///
/// Implementations may block; call from a blocking thread in async code.
pub trait TextGenerator: Send + Sync {
    fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

impl TextGenerator for OllamaClient {
    #[inline]
    fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.generate_completion(prompt)
    }
}

/// Wraps a [`TextGenerator`] so answering never fails.
#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGenerator").finish_non_exhaustive()
    }
}

impl AnswerGenerator {
    #[inline]
    pub fn new(model: Arc<dyn TextGenerator>) -> Self {
        Self { model }
    }

    #[inline]
    pub fn build_prompt(question: &str, context: &str) -> String {
        format!(
            "You are a hotel booking analytics assistant. Use the provided data to answer the query.\n\
             Insights available: revenue trends, cancellation rates, lead time, booking locations.\n\
             \n\
             User Query: {question}\n\
             Relevant Data: {context}\n\
             \n\
             Provide a clear and concise response."
        )
    }

    /// Answer `question` from `context`.
    ///
    /// Model failures come back as `"Error: <reason>"` and empty output as
    /// [`NO_INFORMATION`].
    #[inline]
    pub fn generate(&self, question: &str, context: &str) -> String {
        let prompt = Self::build_prompt(question, context);
        debug!("Generating answer (prompt length: {})", prompt.len());

        match self.model.complete(&prompt) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    warn!("Generator returned empty output");
                    NO_INFORMATION.to_string()
                } else {
                    text.to_string()
                }
            }
            Err(e) => {
                warn!("Generator call failed: {:#}", e);
                error_message(&format!("{:#}", e))
            }
        }
    }

    /// [`generate`](Self::generate) on a blocking thread
    #[inline]
    pub async fn generate_blocking(&self, question: &str, context: &str) -> String {
        let generator = self.clone();
        let question = question.to_string();
        let context = context.to_string();

        tokio::task::spawn_blocking(move || generator.generate(&question, &context))
            .await
            .unwrap_or_else(|e| error_message(&e.to_string()))
    }
}

fn error_message(reason: &str) -> String {
    format!("Error: {}", reason)
}
