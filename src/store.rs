use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::Surreal;
use tracing::{debug, info, warn};

use crate::error::{FileSearchError, Result};
use crate::models::{DocumentMetadata, SearchDocument, StoreHit};

pub const NAMESPACE: &str = "file_search";
pub const DATABASE: &str = "semantic";

const DOCUMENT_FIELDS: &str = "file_id, file_path, file_name, file_stem, file_extension, \
     file_parent_dir, searchable_text, file_size_bytes, document, embedding";

#[async_trait(?Send)]
pub trait VectorStore {
    /// Replaces the whole collection with `documents` and returns how many were
    /// written. An empty input leaves the collection untouched.
    async fn rebuild_index(&self, documents: Vec<SearchDocument>) -> Result<usize>;

    /// Up to `k` nearest documents by ascending cosine distance.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<StoreHit>>;

    async fn count(&self) -> Result<usize>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Row layout of the collection table.
#[derive(Debug, Serialize, Deserialize, Clone)]
struct StoredDocument {
    file_id: String,
    file_path: String,
    file_name: String,
    file_stem: String,
    file_extension: String,
    file_parent_dir: String,
    searchable_text: String,
    file_size_bytes: u64,
    document: String,
    embedding: Vec<f32>,
}

impl From<SearchDocument> for StoredDocument {
    fn from(doc: SearchDocument) -> Self {
        let DocumentMetadata {
            file_path,
            file_name,
            file_stem,
            file_extension,
            file_parent_dir,
            searchable_text,
            file_size_bytes,
        } = doc.metadata;

        Self {
            file_id: doc.id,
            file_path,
            file_name,
            file_stem,
            file_extension,
            file_parent_dir,
            searchable_text,
            file_size_bytes,
            document: doc.document,
            embedding: doc.embedding,
        }
    }
}

impl StoredDocument {
    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            file_path: self.file_path.clone(),
            file_name: self.file_name.clone(),
            file_stem: self.file_stem.clone(),
            file_extension: self.file_extension.clone(),
            file_parent_dir: self.file_parent_dir.clone(),
            searchable_text: self.searchable_text.clone(),
            file_size_bytes: self.file_size_bytes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

/// Embedded SurrealDB (RocksDB engine) holding one table per collection.
pub struct SurrealVectorStore {
    db: Surreal<Db>,
    collection: String,
}

impl SurrealVectorStore {
    pub async fn open(path: &Path, collection: &str) -> Result<Self> {
        let db_path = path.to_string_lossy().to_string();
        let db = Surreal::new::<RocksDb>(db_path.as_str()).await?;
        db.use_ns(NAMESPACE).use_db(DATABASE).await?;

        info!("Vector store opened at {} (collection '{}')", path.display(), collection);

        Ok(Self {
            db,
            collection: collection.to_string(),
        })
    }

    fn rebuild_statement(&self) -> String {
        let t = &self.collection;
        // The first DEFINE makes REMOVE safe on a store that never had the table.
        format!(
            "
            BEGIN TRANSACTION;
            DEFINE TABLE {t} SCHEMAFULL;
            REMOVE TABLE {t};
            DEFINE TABLE {t} SCHEMAFULL;
            DEFINE FIELD file_id ON {t} TYPE string;
            DEFINE FIELD file_path ON {t} TYPE string;
            DEFINE FIELD file_name ON {t} TYPE string;
            DEFINE FIELD file_stem ON {t} TYPE string;
            DEFINE FIELD file_extension ON {t} TYPE string;
            DEFINE FIELD file_parent_dir ON {t} TYPE string;
            DEFINE FIELD searchable_text ON {t} TYPE string;
            DEFINE FIELD file_size_bytes ON {t} TYPE number;
            DEFINE FIELD document ON {t} TYPE string;
            DEFINE FIELD embedding ON {t} TYPE array<float>;
            DEFINE INDEX {t}_file_id ON {t} FIELDS file_id UNIQUE;
            INSERT INTO {t} $documents;
            COMMIT TRANSACTION;
            "
        )
    }

    /// Runs the rebuild transaction. Any failing statement cancels the whole
    /// transaction, so the previous table survives.
    async fn replace_rows(&self, rows: Vec<StoredDocument>) -> Result<()> {
        let response = self
            .db
            .query(self.rebuild_statement())
            .bind(("documents", rows))
            .await?;
        response.check()?;
        Ok(())
    }
}

/// Keeps the last document for each id, in input order.
fn dedup_by_id(documents: Vec<SearchDocument>) -> Vec<SearchDocument> {
    let mut seen = HashSet::new();
    let mut unique: Vec<SearchDocument> = documents
        .into_iter()
        .rev()
        .filter(|doc| seen.insert(doc.id.clone()))
        .collect();
    unique.reverse();
    unique
}

fn check_dimensions(documents: &[SearchDocument]) -> Result<()> {
    let Some(first) = documents.first() else {
        return Ok(());
    };
    let expected = first.embedding.len();
    match documents.iter().find(|doc| doc.embedding.len() != expected) {
        Some(doc) => Err(FileSearchError::DimensionMismatch {
            expected,
            found: doc.embedding.len(),
        }),
        None => Ok(()),
    }
}

#[async_trait(?Send)]
impl VectorStore for SurrealVectorStore {
    async fn rebuild_index(&self, documents: Vec<SearchDocument>) -> Result<usize> {
        if documents.is_empty() {
            debug!("No documents to index, leaving '{}' unchanged", self.collection);
            return Ok(0);
        }

        let documents = dedup_by_id(documents);
        check_dimensions(&documents)?;

        let rows: Vec<StoredDocument> = documents.into_iter().map(StoredDocument::from).collect();
        let count = rows.len();
        self.replace_rows(rows).await?;

        info!("Rebuilt collection '{}' with {} documents", self.collection, count);
        Ok(count)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<StoreHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<StoredDocument> = self
            .db
            .query(format!("SELECT {} FROM {}", DOCUMENT_FIELDS, self.collection))
            .await?
            .take(0)?;

        if let Some(stored) = rows.first() {
            if stored.embedding.len() != vector.len() {
                warn!(
                    "Query vector has {} dimensions but '{}' holds {}-dimensional embeddings",
                    vector.len(),
                    self.collection,
                    stored.embedding.len()
                );
                return Err(FileSearchError::DimensionMismatch {
                    expected: stored.embedding.len(),
                    found: vector.len(),
                });
            }
        }

        // Similarities are computed here rather than with SurrealDB vector functions.
        let mut scored: Vec<(f32, StoredDocument)> = rows
            .into_iter()
            .map(|row| (cosine_distance(vector, &row.embedding), row))
            .collect();

        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.file_path.cmp(&b.1.file_path))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, row)| StoreHit {
                metadata: row.metadata(),
                document: row.document,
                distance: Some(distance),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let rows: Vec<CountRow> = self
            .db
            .query(format!("SELECT count() AS count FROM {} GROUP ALL", self.collection))
            .await?
            .take(0)?;

        Ok(rows.first().map_or(0, |row| row.count))
    }
}
