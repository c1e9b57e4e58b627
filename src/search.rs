use std::path::Path;
use tracing::{info, warn};

use crate::config::SearchConfig;
use crate::discovery::discover_files;
use crate::embedding::{embed_batches, EmbeddingClient};
use crate::error::Result;
use crate::models::{CollectionStats, FileRecord, IndexReport, SearchDocument, SearchResult};
use crate::normalize::searchable_text;
use crate::store::VectorStore;

/// Score reported for a hit whose store returned no distance.
const UNKNOWN_DISTANCE_SCORE: f32 = 0.5;

/// Ties the normalizer, the embedding client and the vector store together.
/// Holds no state of its own besides the store it wraps.
pub struct SearchEngine {
    config: SearchConfig,
    embedder: Box<dyn EmbeddingClient>,
    store: Box<dyn VectorStore>,
}

impl SearchEngine {
    pub fn new(
        config: SearchConfig,
        embedder: Box<dyn EmbeddingClient>,
        store: Box<dyn VectorStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Rebuilds the collection from `records`.
    ///
    /// Records whose embedding batch failed are left out and listed in
    /// [`IndexReport::skipped_ids`]. Nothing is written when no record could be
    /// embedded.
    pub async fn index_files(&self, records: Vec<FileRecord>) -> Result<IndexReport> {
        let mut report = IndexReport {
            discovered: records.len(),
            ..IndexReport::default()
        };
        if records.is_empty() {
            info!("No files to index");
            return Ok(report);
        }

        let texts: Vec<String> = records.iter().map(searchable_text).collect();
        info!(
            "Generating embeddings for {} files with {}",
            texts.len(),
            self.embedder.model()
        );
        let outcome = embed_batches(self.embedder.as_ref(), &texts, self.config.batch_size).await;

        report.failed_batches = outcome.failed.len();
        report.skipped_ids = outcome
            .failed_indices()
            .map(|i| records[i].id.clone())
            .collect();

        let documents: Vec<SearchDocument> = outcome
            .embedded
            .into_iter()
            .map(|item| SearchDocument::new(&records[item.index], texts[item.index].clone(), item.vector))
            .collect();

        if documents.is_empty() {
            warn!("No embeddings were generated, keeping the existing collection");
            return Ok(report);
        }
        if !report.skipped_ids.is_empty() {
            warn!(
                "{} of {} files were skipped after embedding failures",
                report.skipped_ids.len(),
                report.discovered
            );
        }

        report.indexed_count = self.store.rebuild_index(documents).await?;
        info!("Indexed {} files", report.indexed_count);
        Ok(report)
    }

    /// Walks `root` for files with the configured extensions and indexes them.
    pub async fn index_directory(&self, root: &Path) -> Result<IndexReport> {
        let records = discover_files(root, &self.config.indexed_extensions)?;
        self.index_files(records).await
    }

    /// Nearest files to `query`, best first. `top_k` falls back to the
    /// configured default. Failures to embed the query yield no results; a
    /// query vector that doesn't fit the collection is an error.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        let k = top_k.unwrap_or(self.config.top_k);
        if query.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if self.store.count().await? == 0 {
            info!("Collection is empty, nothing to search");
            return Ok(Vec::new());
        }

        let query_vector = match self.embedder.embed(&[query.to_string()]).await {
            Ok(vectors) => match vectors.into_iter().next() {
                Some(vector) => vector,
                None => {
                    warn!("Embedding backend returned no vector for the query");
                    return Ok(Vec::new());
                }
            },
            Err(e) => {
                warn!("Failed to embed query '{}': {}", query, e);
                return Ok(Vec::new());
            }
        };

        let hits = self.store.query(&query_vector, k).await?;
        let results: Vec<SearchResult> = hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| SearchResult {
                rank: i + 1,
                similarity_score: hit.distance.map_or(UNKNOWN_DISTANCE_SCORE, |d| 1.0 - d),
                document_text: hit.document,
                metadata: hit.metadata,
            })
            .collect();

        info!("Found {} results for '{}'", results.len(), query);
        Ok(results)
    }

    pub async fn stats(&self) -> Result<CollectionStats> {
        Ok(CollectionStats {
            count: self.store.count().await?,
            collection_name: self.config.collection_name.clone(),
            storage_path: self.config.storage_path.display().to_string(),
            embedding_model: self.embedder.model().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::file_id;
    use crate::embedding::tests::OneHotClient;
    use crate::error::FileSearchError;
    use crate::models::{DocumentMetadata, StoreHit};
    use crate::store::SurrealVectorStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn record(path: &str) -> FileRecord {
        let p = Path::new(path);
        FileRecord {
            id: file_id(path),
            path: path.to_string(),
            name: p.file_name().unwrap().to_string_lossy().to_string(),
            stem: p.file_stem().unwrap().to_string_lossy().to_string(),
            extension: crate::discovery::extension_of(p),
            parent_dir: p.parent().unwrap().to_string_lossy().to_string(),
            size_bytes: 1,
            modified_time: Utc::now(),
        }
    }

    fn asset_records() -> Vec<FileRecord> {
        [
            "/game/Items/Weapons/Warrior_Sword.uasset",
            "/game/Textures/Characters/T_Dragon_Diffuse.tga",
            "/game/Audio/Music/BattleTheme.mp3",
            "/game/Scripts/Tools/build_atlas.py",
            "/game/Textures/Environment/T_Stone_Wall_Normal.tga",
            "/game/Meshes/Props/SM_Barrel.fbx",
        ]
        .iter()
        .map(|p| record(p))
        .collect()
    }

    fn vocabulary(records: &[FileRecord]) -> Vec<String> {
        records.iter().map(searchable_text).collect()
    }

    async fn setup_engine(client: OneHotClient, batch_size: usize) -> (SearchEngine, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test_db");
        let config = SearchConfig {
            storage_path: db_path.clone(),
            batch_size,
            top_k: 3,
            ..SearchConfig::default()
        };
        let store = SurrealVectorStore::open(&db_path, &config.collection_name)
            .await
            .expect("Failed to open vector store");

        (SearchEngine::new(config, Box::new(client), Box::new(store)), temp_dir)
    }

    /// Store double that counts rebuilds and serves canned hits.
    struct RecordingStore {
        rebuilds: Rc<Cell<usize>>,
        hits: Vec<StoreHit>,
    }

    impl RecordingStore {
        fn with_hits(hits: Vec<StoreHit>) -> Self {
            Self {
                rebuilds: Rc::new(Cell::new(0)),
                hits,
            }
        }
    }

    #[async_trait(?Send)]
    impl VectorStore for RecordingStore {
        async fn rebuild_index(&self, documents: Vec<SearchDocument>) -> Result<usize> {
            self.rebuilds.set(self.rebuilds.get() + 1);
            Ok(documents.len())
        }

        async fn query(&self, _vector: &[f32], k: usize) -> Result<Vec<StoreHit>> {
            Ok(self.hits.iter().take(k).cloned().collect())
        }

        async fn count(&self) -> Result<usize> {
            Ok(self.hits.len())
        }
    }

    fn hit(name: &str, distance: Option<f32>) -> StoreHit {
        StoreHit {
            metadata: DocumentMetadata {
                file_path: format!("/x/{}", name),
                file_name: name.to_string(),
                file_stem: name.to_string(),
                file_extension: String::new(),
                file_parent_dir: "/x".to_string(),
                searchable_text: name.to_string(),
                file_size_bytes: 0,
            },
            document: name.to_string(),
            distance,
        }
    }

    #[tokio::test]
    async fn test_index_then_exact_query_ranks_document_first() -> anyhow::Result<()> {
        let records = asset_records();
        let vocab = vocabulary(&records);
        let (engine, _temp_dir) = setup_engine(OneHotClient::new(vocab.clone()), 100).await;

        let report = engine.index_files(records.clone()).await?;
        assert_eq!(report.indexed_count, records.len());
        assert!(report.skipped_ids.is_empty());

        for (i, text) in vocab.iter().enumerate() {
            let results = engine.search(text, None).await?;
            assert_eq!(results[0].rank, 1);
            assert_eq!(results[0].metadata.file_path, records[i].path);
            assert_eq!(results[0].metadata.searchable_text, *text);
            assert_eq!(results[0].document_text, *text);
            assert!((results[0].similarity_score - 1.0).abs() < 1e-5);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_results_are_ranked_and_sorted() -> anyhow::Result<()> {
        let records = asset_records();
        let (engine, _temp_dir) = setup_engine(OneHotClient::new(vocabulary(&records)), 100).await;
        engine.index_files(records.clone()).await?;

        let results = engine.search("dragon texture", Some(5)).await?;
        assert_eq!(results.len(), 5);
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert!(results
            .windows(2)
            .all(|w| w[0].similarity_score >= w[1].similarity_score));

        // default top_k from config
        assert_eq!(engine.search("dragon texture", None).await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_dragon_query_ranks_texture_above_sword() -> anyhow::Result<()> {
        let sword = record("/game/Items/Weapons/Warrior_Sword.uasset");
        let dragon = record("/game/Textures/Characters/T_Dragon_Diffuse.tga");
        let dragon_text = searchable_text(&dragon);

        // the query lands on the dragon document's axis
        let client = OneHotClient::new(vec![dragon_text.clone(), searchable_text(&sword)])
            .with_alias("dragon texture", &dragon_text);
        let (engine, _temp_dir) = setup_engine(client, 100).await;
        engine.index_files(vec![sword, dragon]).await?;

        let results = engine.search("dragon texture", Some(2)).await?;
        assert_eq!(results[0].metadata.file_name, "T_Dragon_Diffuse.tga");
        assert_eq!(results[1].metadata.file_name, "Warrior_Sword.uasset");
        assert!(results[0].similarity_score > results[1].similarity_score);
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_batch_failure_indexes_remaining_batches() -> anyhow::Result<()> {
        let records = asset_records();
        let client = OneHotClient::new(vocabulary(&records)).failing_on(&[2]);
        let (engine, _temp_dir) = setup_engine(client, 2).await;

        let report = engine.index_files(records.clone()).await?;

        assert_eq!(report.discovered, 6);
        assert_eq!(report.indexed_count, 4);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.skipped_ids, vec![records[2].id.clone(), records[3].id.clone()]);
        assert_eq!(engine.stats().await?.count, 4);

        // surviving documents keep their own vectors
        let results = engine.search(&searchable_text(&records[4]), Some(1)).await?;
        assert_eq!(results[0].metadata.file_path, records[4].path);
        assert!((results[0].similarity_score - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_index_leaves_store_untouched() -> anyhow::Result<()> {
        let store = RecordingStore::with_hits(Vec::new());
        let rebuilds = Rc::clone(&store.rebuilds);
        let client = OneHotClient::new(Vec::new());
        let engine = SearchEngine::new(SearchConfig::default(), Box::new(client), Box::new(store));

        let report = engine.index_files(Vec::new()).await?;
        assert_eq!(report, IndexReport::default());
        assert_eq!(rebuilds.get(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_index_keeps_existing_collection() -> anyhow::Result<()> {
        let records = asset_records();
        let (engine, _temp_dir) = setup_engine(OneHotClient::new(vocabulary(&records)), 100).await;
        engine.index_files(records).await?;

        let report = engine.index_files(Vec::new()).await?;
        assert_eq!(report.indexed_count, 0);
        assert_eq!(engine.stats().await?.count, 6);
        Ok(())
    }

    #[tokio::test]
    async fn test_all_batches_failing_keeps_existing_collection() -> anyhow::Result<()> {
        let records = asset_records();
        let vocab = vocabulary(&records);
        let (engine, _temp_dir) = setup_engine(OneHotClient::new(vocab.clone()), 100).await;
        engine.index_files(records.clone()).await?;

        let failing = OneHotClient::new(vocab).failing_on(&[1]);
        let engine = SearchEngine::new(
            engine.config().clone(),
            Box::new(failing),
            engine.store,
        );
        let report = engine.index_files(records).await?;
        assert_eq!(report.indexed_count, 0);
        assert_eq!(report.skipped_ids.len(), 6);
        assert_eq!(engine.stats().await?.count, 6);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_with_other_model_dimension_fails() -> anyhow::Result<()> {
        let records = asset_records();
        let (engine, _temp_dir) = setup_engine(OneHotClient::new(vocabulary(&records)), 100).await;
        engine.index_files(records).await?;

        // a different model produces vectors of another length
        let other_model = OneHotClient::new(vec!["only".to_string()]);
        let engine = SearchEngine::new(engine.config().clone(), Box::new(other_model), engine.store);

        let result = engine.search("dragon texture", None).await;
        assert!(matches!(
            result,
            Err(FileSearchError::DimensionMismatch { expected: 7, found: 2 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_search_on_empty_collection_returns_nothing() -> anyhow::Result<()> {
        let (engine, _temp_dir) = setup_engine(OneHotClient::new(Vec::new()), 100).await;
        assert!(engine.search("anything", None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_query_embedding_returns_nothing() -> anyhow::Result<()> {
        let store = RecordingStore::with_hits(vec![hit("a", Some(0.1))]);
        let engine = SearchEngine::new(
            SearchConfig::default(),
            Box::new(OneHotClient::new(Vec::new()).failing_on(&[1])),
            Box::new(store),
        );
        assert!(engine.search("anything", None).await?.is_empty());
        assert!(engine.search("   ", None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_distance_scores_half() -> anyhow::Result<()> {
        let store = RecordingStore::with_hits(vec![hit("a", Some(0.25)), hit("b", None)]);
        let engine = SearchEngine::new(
            SearchConfig::default(),
            Box::new(OneHotClient::new(Vec::new())),
            Box::new(store),
        );

        let results = engine.search("a", None).await?;
        assert_eq!(results.len(), 2);
        assert!((results[0].similarity_score - 0.75).abs() < 1e-6);
        assert_eq!(results[1].similarity_score, 0.5);
        assert_eq!(results[1].rank, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_index_directory_uses_configured_extensions() -> anyhow::Result<()> {
        let assets = TempDir::new()?;
        for file in ["Textures/Characters/T_Orc_Skin.tga", "Items/Potions/Potion_Health.uasset", "cache.tmp"] {
            let path = assets.path().join(file);
            fs::create_dir_all(path.parent().unwrap())?;
            fs::write(&path, b"asset")?;
        }

        let (engine, _temp_dir) = setup_engine(OneHotClient::new(Vec::new()), 100).await;
        let report = engine.index_directory(assets.path()).await?;

        assert_eq!(report.discovered, 2);
        assert_eq!(report.indexed_count, 2);
        assert_eq!(engine.stats().await?.count, 2);
        Ok(())
    }
}
