// Retrieval module
// Embed a question and collect the nearest stored passages as context

#[cfg(test)]
mod tests;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::{Encoder, OllamaClient};
use crate::index::{IndexError, PassageHit, PassageIndex};

/// Passages retrieved per open-ended question
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),
    #[error("failed to encode query: {0}")]
    Encoding(String),
    #[error("index unavailable: {0}")]
    Index(#[from] IndexError),
    #[error("index returned no passages")]
    NoPassages,
}

/// Builds the encoder on first use
pub type EncoderFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Encoder>> + Send + Sync>;

/// Passages returned for one question, nearest first
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedContext {
    passages: Vec<PassageHit>,
}

impl RetrievedContext {
    #[inline]
    pub fn passages(&self) -> &[PassageHit] {
        &self.passages
    }

    /// Passage texts joined by newlines in retrieval order
    #[inline]
    pub fn context_block(&self) -> String {
        self.passages
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Embeds questions and searches a read-only passage index.
///
/// The encoder is created at most once per retriever, even when several
/// first questions arrive concurrently. A failed initialisation leaves the
/// cell empty so a later question can try again.
pub struct Retriever {
    index: Arc<dyn PassageIndex>,
    encoder: OnceCell<Arc<dyn Encoder>>,
    factory: EncoderFactory,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("encoder_ready", &self.encoder.initialized())
            .finish_non_exhaustive()
    }
}

impl Retriever {
    #[inline]
    pub fn new(index: Arc<dyn PassageIndex>, factory: EncoderFactory) -> Self {
        Self {
            index,
            encoder: OnceCell::new(),
            factory,
        }
    }

    /// Retriever with an encoder that is already initialised
    #[inline]
    pub fn with_encoder(index: Arc<dyn PassageIndex>, encoder: Arc<dyn Encoder>) -> Self {
        let ready = Arc::clone(&encoder);
        Self {
            index,
            encoder: OnceCell::new_with(Some(encoder)),
            factory: Arc::new(move || Ok(Arc::clone(&ready))),
        }
    }

    /// Retriever whose encoder is an Ollama client checked against the server on first use
    #[inline]
    pub fn from_config(config: &Config, index: Arc<dyn PassageIndex>) -> Self {
        let config = config.clone();
        let factory: EncoderFactory = Arc::new(move || {
            let client = OllamaClient::new(&config)?;
            client.validate_embedding_model()?;
            info!("Embedding model {} ready", config.ollama.embedding_model);
            Ok(Arc::new(client) as Arc<dyn Encoder>)
        });
        Self::new(index, factory)
    }

    #[inline]
    pub fn index(&self) -> &Arc<dyn PassageIndex> {
        &self.index
    }

    async fn encoder(&self) -> Result<Arc<dyn Encoder>, RetrievalError> {
        self.encoder
            .get_or_try_init(|| async {
                debug!("Initialising query encoder");
                let factory = Arc::clone(&self.factory);
                tokio::task::spawn_blocking(move || factory())
                    .await
                    .map_err(|e| RetrievalError::EncoderUnavailable(e.to_string()))
                    .and_then(|built| {
                        built.map_err(|e| {
                            warn!("Encoder initialisation failed: {:#}", e);
                            RetrievalError::EncoderUnavailable(format!("{:#}", e))
                        })
                    })
            })
            .await
            .cloned()
    }

    /// Embed `query` with the shared encoder
    #[inline]
    pub async fn encode(&self, query: &str) -> Result<Vec<f32>, RetrievalError> {
        let encoder = self.encoder().await?;
        let text = query.to_string();

        tokio::task::spawn_blocking(move || encoder.encode(&text))
            .await
            .map_err(|e| RetrievalError::Encoding(e.to_string()))
            .and_then(|encoded| encoded.map_err(|e| RetrievalError::Encoding(format!("{:#}", e))))
    }

    /// Nearest `k` passages for `query`.
    ///
    /// An index that returns nothing is reported as unavailable rather than
    /// producing an empty context.
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievedContext, RetrievalError> {
        let vector = self.encode(query).await?;
        let passages = self.index.search(&vector, k).await?;

        if passages.is_empty() {
            warn!("Index returned no passages for query");
            return Err(RetrievalError::NoPassages);
        }

        debug!(
            "Retrieved {} passages, nearest distance {:.4}",
            passages.len(),
            passages[0].distance
        );
        Ok(RetrievedContext { passages })
    }
}
