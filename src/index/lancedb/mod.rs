
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{IndexError, IndexedPassage, PassageHit, PassageIndex, sort_hits};

/// Passage index stored as a LanceDB table with `id`, `vector` and `text` columns
pub struct LanceIndex {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

impl std::fmt::Debug for LanceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceIndex")
            .field("table_name", &self.table_name)
            .field("vector_dimension", &self.vector_dimension)
            .finish_non_exhaustive()
    }
}

impl LanceIndex {
    /// Open an existing index for searching.
    ///
    /// Fails with [`IndexError::NotFound`] when the directory or table is missing,
    /// so a query never runs against an empty index.
    #[inline]
    pub async fn open(path: &Path, table_name: &str) -> Result<Self, IndexError> {
        if !path.is_dir() {
            return Err(IndexError::NotFound(path.display().to_string()));
        }

        let mut index = Self::connect(path, table_name).await?;

        if !index.table_exists().await? {
            return Err(IndexError::NotFound(format!(
                "{} (table '{}')",
                path.display(),
                table_name
            )));
        }

        index.vector_dimension = Some(index.detect_vector_dimension().await?);
        info!(
            "Opened passage index '{}' with {:?} dimensions",
            table_name, index.vector_dimension
        );
        Ok(index)
    }

    /// Connect to the database directory, creating it when absent
    #[inline]
    pub async fn create(path: &Path, table_name: &str) -> Result<Self, IndexError> {
        std::fs::create_dir_all(path).map_err(|e| {
            IndexError::Database(format!("Failed to create index directory: {}", e))
        })?;
        Self::connect(path, table_name).await
    }

    async fn connect(path: &Path, table_name: &str) -> Result<Self, IndexError> {
        let uri = format!("file://{}", path.display());
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            table_name: table_name.to_string(),
            vector_dimension: None,
        })
    }

    #[inline]
    pub fn vector_dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    async fn table_exists(&self) -> Result<bool, IndexError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table, IndexError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to open table: {}", e)))
    }

    async fn detect_vector_dimension(&self) -> Result<usize, IndexError> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                IndexError::Database("Could not find vector column or determine dimension".into())
            })
    }

    fn create_schema(vector_dim: usize) -> Result<Arc<Schema>, IndexError> {
        let size = i32::try_from(vector_dim)
            .map_err(|_| IndexError::Database(format!("Vector dimension {} too large", vector_dim)))?;

        Ok(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    size,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
        ])))
    }

    /// Replace the table contents with `passages`.
    ///
    /// All passages must share one vector length, which becomes the index dimension.
    #[inline]
    pub async fn store_passages(&mut self, passages: &[IndexedPassage]) -> Result<(), IndexError> {
        let Some(first) = passages.first() else {
            debug!("No passages to store");
            return Ok(());
        };

        let vector_dim = first.vector.len();
        let record_batch = Self::create_record_batch(passages, vector_dim)?;

        self.drop_table_if_exists().await?;
        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(vector_dim)?)
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to create table: {}", e)))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        self.open_table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to insert passages: {}", e)))?;

        self.vector_dimension = Some(vector_dim);
        info!(
            "Stored {} passages with {} dimensions in '{}'",
            passages.len(),
            vector_dim,
            self.table_name
        );
        Ok(())
    }

    fn create_record_batch(
        passages: &[IndexedPassage],
        vector_dim: usize,
    ) -> Result<RecordBatch, IndexError> {
        let mut ids = Vec::with_capacity(passages.len());
        let mut texts = Vec::with_capacity(passages.len());
        let mut flat_values = Vec::with_capacity(passages.len() * vector_dim);

        for (position, passage) in passages.iter().enumerate() {
            if passage.vector.len() != vector_dim {
                return Err(IndexError::Malformed {
                    line: position + 1,
                    message: format!(
                        "vector has {} dimensions, expected {}",
                        passage.vector.len(),
                        vector_dim
                    ),
                });
            }
            ids.push(passage.id.as_str());
            texts.push(passage.text.as_str());
            flat_values.extend_from_slice(&passage.vector);
        }

        let schema = Self::create_schema(vector_dim)?;
        let size = i32::try_from(vector_dim)
            .map_err(|_| IndexError::Database(format!("Vector dimension {} too large", vector_dim)))?;

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, size, Arc::new(Float32Array::from(flat_values)), None)
                .map_err(|e| {
                    IndexError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| IndexError::Database(format!("Failed to create record batch: {}", e)))
    }

    async fn drop_table_if_exists(&self) -> Result<(), IndexError> {
        if self.table_exists().await? {
            warn!("Dropping existing passage table '{}'", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| IndexError::Database(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }

    /// Number of stored passages
    #[inline]
    pub async fn count_passages(&self) -> Result<usize, IndexError> {
        self.open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| IndexError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Exhaustive L2 search over the vector column
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<PassageHit>, IndexError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.vector_dimension {
            if query_vector.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        debug!("Searching for similar passages with limit: {}", limit);

        let mut results = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| IndexError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| IndexError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(Self::parse_search_batch(&batch)?);
        }

        sort_hits(&mut hits);
        hits.truncate(limit);
        debug!("Parsed {} search results", hits.len());
        Ok(hits)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<PassageHit>, IndexError> {
        let ids = string_column(batch, "id")?;
        let texts = string_column(batch, "text")?;

        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| IndexError::Database("Missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| IndexError::Database("Invalid _distance column type".to_string()))?;

        Ok((0..batch.num_rows())
            .map(|row| PassageHit {
                id: ids.value(row).to_string(),
                text: texts.value(row).to_string(),
                distance: if distances.is_null(row) {
                    f32::INFINITY
                } else {
                    distances.value(row)
                },
            })
            .collect())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, IndexError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| IndexError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| IndexError::Database(format!("Invalid {} column type", name)))
}

#[async_trait]
impl PassageIndex for LanceIndex {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<PassageHit>, IndexError> {
        self.search_similar(vector, k).await
    }

    async fn count(&self) -> Result<usize, IndexError> {
        self.count_passages().await
    }
}
