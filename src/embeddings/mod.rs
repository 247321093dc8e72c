// Embeddings module
// Query encoding through Ollama

pub mod ollama;

pub use ollama::OllamaClient;

/// Deterministic text to vector encoder.
///
/// Implementations block on I/O; async callers should run them on a blocking
/// thread.
pub trait Encoder: Send + Sync {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

impl Encoder for OllamaClient {
    #[inline]
    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.generate_embedding(text)
    }
}
