use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file found by discovery. Only lives until its embedding is generated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FileRecord {
    pub id: String,
    pub path: String,
    pub name: String,
    pub stem: String,
    /// Lower-cased with the leading dot, or empty.
    pub extension: String,
    pub parent_dir: String,
    pub size_bytes: u64,
    pub modified_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub file_path: String,
    pub file_name: String,
    pub file_stem: String,
    pub file_extension: String,
    pub file_parent_dir: String,
    pub searchable_text: String,
    pub file_size_bytes: u64,
}

impl DocumentMetadata {
    pub fn from_record(record: &FileRecord, searchable_text: String) -> Self {
        Self {
            file_path: record.path.clone(),
            file_name: record.name.clone(),
            file_stem: record.stem.clone(),
            file_extension: record.extension.clone(),
            file_parent_dir: record.parent_dir.clone(),
            searchable_text,
            file_size_bytes: record.size_bytes,
        }
    }
}

/// The persisted unit of a collection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchDocument {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: DocumentMetadata,
    pub document: String,
}

impl SearchDocument {
    pub fn new(record: &FileRecord, searchable_text: String, embedding: Vec<f32>) -> Self {
        Self {
            id: record.id.clone(),
            embedding,
            document: searchable_text.clone(),
            metadata: DocumentMetadata::from_record(record, searchable_text),
        }
    }
}

/// A nearest-neighbour hit as returned by a vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub metadata: DocumentMetadata,
    pub document: String,
    pub distance: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResult {
    pub rank: usize,
    pub similarity_score: f32,
    /// Text the match was embedded from.
    pub document_text: String,
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct IndexReport {
    pub discovered: usize,
    pub indexed_count: usize,
    pub failed_batches: usize,
    /// Ids of records whose embedding batch failed.
    pub skipped_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CollectionStats {
    pub count: usize,
    pub collection_name: String,
    pub storage_path: String,
    pub embedding_model: String,
}
