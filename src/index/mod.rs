// Retrieval index module
// Nearest-neighbour search over pre-built passage embeddings

pub mod flat;
pub mod lancedb;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, IndexBackend};

pub use self::flat::FlatIndex;
pub use self::lancedb::LanceIndex;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index not found at {0}")]
    NotFound(String),
    #[error("Query vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Malformed index entry at line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("Database error: {0}")]
    Database(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored passage together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPassage {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A passage returned by a nearest-neighbour search
#[derive(Debug, Clone, PartialEq)]
pub struct PassageHit {
    pub id: String,
    pub text: String,
    /// Squared Euclidean distance to the query vector
    pub distance: f32,
}

/// Read-only k-nearest-neighbour search over stored passages.
///
/// Results are ordered nearest first, and identical index, vector and `k`
/// always produce the same ordering.
#[async_trait]
pub trait PassageIndex: Send + Sync {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<PassageHit>, IndexError>;

    async fn count(&self) -> Result<usize, IndexError>;
}

/// Open the index described by the configuration
#[inline]
pub async fn open_index(config: &Config) -> Result<Arc<dyn PassageIndex>, IndexError> {
    let path = config.index_path();
    info!(
        "Opening {:?} index at {}",
        config.index.backend,
        path.display()
    );

    match config.index.backend {
        IndexBackend::Flat => Ok(Arc::new(FlatIndex::load(&path)?)),
        IndexBackend::Lancedb => Ok(Arc::new(
            LanceIndex::open(&path, &config.index.table).await?,
        )),
    }
}

/// Sort hits nearest first, breaking distance ties by id
pub(crate) fn sort_hits(hits: &mut [PassageHit]) {
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Stands in for an index that could not be opened.
///
/// Every search fails with the original reason, so questions needing
/// retrieval report it while analytics questions still work.
#[derive(Debug, Clone)]
pub struct UnavailableIndex {
    reason: String,
}

impl UnavailableIndex {
    #[inline]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PassageIndex for UnavailableIndex {
    async fn search(&self, _vector: &[f32], _k: usize) -> Result<Vec<PassageHit>, IndexError> {
        Err(IndexError::NotFound(self.reason.clone()))
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Err(IndexError::NotFound(self.reason.clone()))
    }
}
