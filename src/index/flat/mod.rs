#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use super::{IndexError, IndexedPassage, PassageHit, PassageIndex};

/// Exhaustive in-memory index loaded from a JSON-lines file.
///
/// Each line holds one `{"id", "text", "vector"}` object. Every search
/// compares the query against all stored vectors.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    entries: Vec<IndexedPassage>,
    dimension: usize,
}

impl FlatIndex {
    /// Build an index from passages that all share one vector length
    #[inline]
    pub fn from_entries(entries: Vec<IndexedPassage>) -> Result<Self, IndexError> {
        let dimension = entries.first().map_or(0, |entry| entry.vector.len());

        for (position, entry) in entries.iter().enumerate() {
            if entry.vector.len() != dimension {
                return Err(IndexError::Malformed {
                    line: position + 1,
                    message: format!(
                        "vector has {} dimensions, expected {}",
                        entry.vector.len(),
                        dimension
                    ),
                });
            }
        }

        Ok(Self { entries, dimension })
    }

    #[inline]
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        if !path.is_file() {
            return Err(IndexError::NotFound(path.display().to_string()));
        }

        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();

        for (position, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: IndexedPassage =
                serde_json::from_str(&line).map_err(|e| IndexError::Malformed {
                    line: position + 1,
                    message: e.to_string(),
                })?;
            entries.push(entry);
        }

        info!(
            "Loaded {} passages from {}",
            entries.len(),
            path.display()
        );
        Self::from_entries(entries)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nearest `k` passages by squared Euclidean distance, ties kept in insertion order
    #[inline]
    pub fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<PassageHit>, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, squared_l2(vector, &entry.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);

        debug!(
            "Flat search returned {} of {} passages",
            scored.len(),
            self.entries.len()
        );

        Ok(scored
            .into_iter()
            .map(|(position, distance)| {
                let entry = &self.entries[position];
                PassageHit {
                    id: entry.id.clone(),
                    text: entry.text.clone(),
                    distance,
                }
            })
            .collect())
    }
}

#[async_trait]
impl PassageIndex for FlatIndex {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<PassageHit>, IndexError> {
        self.nearest(vector, k)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.entries.len())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

