use clap::{Args, ValueEnum};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{FileSearchError, Result};

pub const DEFAULT_COLLECTION: &str = "file_embeddings";
pub const DEFAULT_STORAGE_PATH: &str = "./db";
pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const INDEXED_EXTENSIONS: &[&str] = &[
    // documents
    ".txt", ".docx", ".pdf", ".md", ".json", ".xml", ".csv", ".xlsx", ".pptx",
    // code
    ".py", ".js", ".html", ".css", ".zip",
    // images
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".tga", ".psd",
    // audio / video
    ".mp3", ".wav", ".flac", ".mp4", ".avi", ".mov",
    // unreal engine assets
    ".uasset", ".umap", ".upk",
    // 3d / dcc
    ".fbx", ".obj", ".3ds", ".dae", ".blend",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingProvider {
    /// Local ONNX model run through fastembed
    Fastembed,
    /// OpenAI-compatible `/embeddings` endpoint
    Openai,
}

impl EmbeddingProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Fastembed => "AllMiniLML6V2",
            Self::Openai => "text-embedding-3-small",
        }
    }
}

/// Command line / environment surface for [`SearchConfig`].
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Embedding backend
    #[arg(long, env = "FILE_SEARCH_PROVIDER", value_enum, default_value = "fastembed")]
    pub provider: EmbeddingProvider,

    /// Embedding model identifier (defaults per provider)
    #[arg(long, env = "FILE_SEARCH_MODEL")]
    pub model: Option<String>,

    /// Directory holding the vector store
    #[arg(long, env = "FILE_SEARCH_DB_PATH", default_value = DEFAULT_STORAGE_PATH)]
    pub db_path: PathBuf,

    /// Name of the collection (table) holding the file embeddings
    #[arg(long, env = "FILE_SEARCH_COLLECTION", default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    /// Default number of results per query
    #[arg(long, env = "FILE_SEARCH_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Texts per embedding request
    #[arg(long, env = "FILE_SEARCH_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Only index files with these extensions (repeatable, e.g. `--ext .tga`)
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Index every file regardless of extension
    #[arg(long, conflicts_with = "extensions")]
    pub all_files: bool,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub provider: EmbeddingProvider,
    pub embedding_model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub storage_path: PathBuf,
    pub collection_name: String,
    pub top_k: usize,
    pub batch_size: usize,
    /// Empty means every extension is accepted.
    pub indexed_extensions: HashSet<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Fastembed,
            embedding_model: EmbeddingProvider::Fastembed.default_model().to_string(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            collection_name: DEFAULT_COLLECTION.to_string(),
            top_k: DEFAULT_TOP_K,
            batch_size: DEFAULT_BATCH_SIZE,
            indexed_extensions: default_extensions(),
        }
    }
}

impl SearchConfig {
    pub fn from_args(args: ConfigArgs) -> Result<Self> {
        let indexed_extensions = if args.all_files {
            HashSet::new()
        } else if args.extensions.is_empty() {
            default_extensions()
        } else {
            args.extensions.iter().map(|ext| normalize_extension(ext)).collect()
        };

        let config = Self {
            provider: args.provider,
            embedding_model: args
                .model
                .unwrap_or_else(|| args.provider.default_model().to_string()),
            openai_api_key: args.openai_api_key.filter(|key| !key.trim().is_empty()),
            openai_base_url: args.openai_base_url,
            storage_path: args.db_path,
            collection_name: args.collection,
            top_k: args.top_k,
            batch_size: args.batch_size,
            indexed_extensions,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider == EmbeddingProvider::Openai && self.openai_api_key.is_none() {
            return Err(FileSearchError::configuration(
                "OPENAI_API_KEY is required for the openai provider",
            ));
        }
        if !is_valid_collection_name(&self.collection_name) {
            return Err(FileSearchError::configuration(format!(
                "invalid collection name '{}': use letters, digits and underscores",
                self.collection_name
            )));
        }
        if self.top_k == 0 {
            return Err(FileSearchError::configuration("top_k must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(FileSearchError::configuration("batch_size must be at least 1"));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(FileSearchError::configuration("embedding model is empty"));
        }
        Ok(())
    }
}

pub fn default_extensions() -> HashSet<String> {
    INDEXED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Collection names are spliced into SurrealQL as table names.
fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
