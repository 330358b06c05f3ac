//! Caption indexing orchestrator
//!
//! Owns the caption index exclusively: embeds captions on build, embeds
//! queries on search, and persists/restores the index artifacts.

use std::path::Path;
use std::sync::Arc;
use tsva_core::{read_caption_file, CaptionRecord, Result, TsvaError};
use tsva_vector::{
    load_index, save_index, EmbeddingClient, FlatIndex, IndexPaths, ScoredRecord, VectorStore,
};

/// Builds, queries and persists the caption index
pub struct CaptionIndexer {
    embedder: Arc<dyn EmbeddingClient>,
    index: Option<FlatIndex>,
}

impl CaptionIndexer {
    pub fn new(embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            embedder,
            index: None,
        }
    }

    /// Embed every caption and replace the current index.
    ///
    /// An empty batch yields an empty index whose searches return nothing.
    /// On failure the previous index is kept.
    pub async fn build(&mut self, records: Vec<CaptionRecord>) -> Result<()> {
        let index = self.prepare(records).await?;
        self.install(index);
        Ok(())
    }

    /// Embed every caption into a new index without replacing the current one
    pub async fn prepare(&self, records: Vec<CaptionRecord>) -> Result<FlatIndex> {
        if records.is_empty() {
            return Ok(FlatIndex::new(self.embedder.dimension()));
        }

        let captions: Vec<String> = records.iter().map(|r| r.caption().to_string()).collect();
        let vectors = self.embedder.embed_batch(&captions).await?;

        if vectors.len() != records.len() {
            return Err(TsvaError::DataIntegrity(format!(
                "Embedder returned {} vectors for {} captions",
                vectors.len(),
                records.len()
            )));
        }

        FlatIndex::from_parts(records, vectors)
    }

    /// Make a prepared index the current one
    pub fn install(&mut self, index: FlatIndex) {
        tracing::info!(
            captions = index.len(),
            dimension = index.dimension(),
            model = self.embedder.model_name(),
            "Index built with {} captions",
            index.len()
        );
        self.index = Some(index);
    }

    /// Build from an intermediate caption file
    pub async fn build_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let records = read_caption_file(path)?;
        let count = records.len();
        self.build(records).await?;
        Ok(count)
    }

    /// Nearest `top_k` records to `query`, nearest first
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<CaptionRecord>> {
        Ok(self
            .search_scored(query, top_k)
            .await?
            .into_iter()
            .map(|hit| hit.record)
            .collect())
    }

    /// Like [`search`](Self::search), with distances
    pub async fn search_scored(&self, query: &str, top_k: usize) -> Result<Vec<ScoredRecord>> {
        let index = self.built()?;

        if top_k == 0 {
            return Err(TsvaError::ValidationError(
                "top_k must be at least 1".to_string(),
            ));
        }
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        if query_vector.len() != index.dimension() {
            return Err(TsvaError::DataIntegrity(format!(
                "Query embedding has dimension {} but the index holds {}-dimensional vectors",
                query_vector.len(),
                index.dimension()
            )));
        }
        let hits = index.search(&query_vector, top_k)?;
        tracing::debug!(query, top_k, hits = hits.len(), "Caption search");
        Ok(hits)
    }

    /// The single nearest record (`top_k = 1`), `None` when the index is empty
    pub async fn query(&self, text: &str) -> Result<Option<CaptionRecord>> {
        Ok(self.search(text, 1).await?.into_iter().next())
    }

    /// Persist the index artifacts
    pub fn save(&self, paths: &IndexPaths) -> Result<()> {
        let index = self.built()?;
        save_index(index, paths)?;
        tracing::info!(
            vectors = %paths.vectors.display(),
            metadata = %paths.metadata.display(),
            "Saved caption index"
        );
        Ok(())
    }

    /// Replace the index with previously saved artifacts.
    ///
    /// A non-empty index built by an embedder of another dimension is
    /// rejected and the current index is kept.
    pub fn load(&mut self, paths: &IndexPaths) -> Result<()> {
        let index = load_index(paths)?;

        let expected = self.embedder.dimension();
        if !index.is_empty() && index.dimension() != expected {
            return Err(TsvaError::DataIntegrity(format!(
                "Saved index has dimension {} but embedding model {} produces {expected}",
                index.dimension(),
                self.embedder.model_name()
            )));
        }

        tracing::info!(captions = index.len(), "Loaded caption index");
        self.index = Some(index);
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.index.is_some()
    }

    /// Number of indexed captions (zero when not built)
    pub fn len(&self) -> usize {
        self.index.as_ref().map_or(0, |i| i.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed records in build order
    pub fn records(&self) -> Result<Vec<CaptionRecord>> {
        Ok(self.built()?.records().cloned().collect())
    }

    fn built(&self) -> Result<&FlatIndex> {
        self.index.as_ref().ok_or(TsvaError::IndexNotBuilt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tsva_vector::HashingEmbedding;

    fn indexer() -> CaptionIndexer {
        CaptionIndexer::new(Arc::new(HashingEmbedding::new(512)))
    }

    fn records(captions: &[&str]) -> Vec<CaptionRecord> {
        captions
            .iter()
            .enumerate()
            .map(|(i, c)| {
                CaptionRecord::new(
                    format!("frame_{i}.jpg"),
                    *c,
                    format!("00:00:{:02}", i * 2),
                    "junction.mp4",
                )
            })
            .collect()
    }

    const TRAFFIC: [&str; 3] = [
        "car waiting at red light",
        "pedestrian crossing on green",
        "car running red light",
    ];

    #[tokio::test]
    async fn test_red_light_violation_ranking() {
        let mut indexer = indexer();
        indexer.build(records(&TRAFFIC)).await.unwrap();

        let results = indexer.search("red light violation", 3).await.unwrap();
        let position = results
            .iter()
            .position(|r| r.caption() == "car running red light")
            .unwrap();
        assert!(position < 2, "ranked at {position}");
    }

    #[tokio::test]
    async fn test_search_before_build_fails_every_time() {
        let indexer = indexer();
        for _ in 0..3 {
            assert!(matches!(
                indexer.search("anything", 1).await,
                Err(TsvaError::IndexNotBuilt)
            ));
        }
        assert!(matches!(
            indexer.query("anything").await,
            Err(TsvaError::IndexNotBuilt)
        ));
        assert!(matches!(
            indexer.save(&IndexPaths::default()),
            Err(TsvaError::IndexNotBuilt)
        ));
        assert!(!indexer.is_built());
    }

    #[tokio::test]
    async fn test_empty_build_searches_return_nothing() {
        let mut indexer = indexer();
        indexer.build(Vec::new()).await.unwrap();

        assert!(indexer.is_built());
        assert!(indexer.is_empty());
        assert!(indexer.search("red light", 5).await.unwrap().is_empty());
        assert_eq!(indexer.query("red light").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_result_bounds_and_order() {
        let mut indexer = indexer();
        indexer.build(records(&TRAFFIC)).await.unwrap();

        for k in 1..6 {
            let hits = indexer.search_scored("car at light", k).await.unwrap();
            assert_eq!(hits.len(), k.min(3));
            assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        }

        assert!(matches!(
            indexer.search("car", 0).await,
            Err(TsvaError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_query_returns_nearest() {
        let mut indexer = indexer();
        indexer.build(records(&TRAFFIC)).await.unwrap();

        let record = indexer.query("pedestrian crossing").await.unwrap().unwrap();
        assert_eq!(record.image_id(), "frame_1.jpg");
    }

    #[tokio::test]
    async fn test_build_replaces_prior_index() {
        let mut indexer = indexer();
        indexer.build(records(&TRAFFIC)).await.unwrap();
        indexer
            .build(records(&["bus stopped at bus stop"]))
            .await
            .unwrap();

        assert_eq!(indexer.len(), 1);
        let all = indexer.search("car", 10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].caption(), "bus stopped at bus stop");
    }

    #[tokio::test]
    async fn test_save_load_roundtrip_preserves_results() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("captions.index"), dir.path().join("m.json"));

        let mut saved = indexer();
        saved.build(records(&TRAFFIC)).await.unwrap();
        saved.save(&paths).unwrap();

        let mut restored = indexer();
        restored.load(&paths).unwrap();

        assert_eq!(restored.len(), 3);
        assert_eq!(restored.records().unwrap(), saved.records().unwrap());
        for query in ["red light violation", "green", "pedestrian"] {
            for k in 1..4 {
                assert_eq!(
                    restored.search_scored(query, k).await.unwrap(),
                    saved.search_scored(query, k).await.unwrap()
                );
            }
        }
    }

    #[tokio::test]
    async fn test_load_mismatched_pair_fails() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("captions.index"), dir.path().join("m.json"));

        let mut saved = indexer();
        saved.build(records(&TRAFFIC)).await.unwrap();
        saved.save(&paths).unwrap();

        let fewer = records(&TRAFFIC[..2]);
        std::fs::write(&paths.metadata, serde_json::to_vec(&fewer).unwrap()).unwrap();

        let mut restored = indexer();
        assert!(matches!(
            restored.load(&paths),
            Err(TsvaError::DataIntegrity(_))
        ));
        assert!(!restored.is_built());
    }

    #[tokio::test]
    async fn test_build_from_caption_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captions_output.json");
        tsva_core::write_caption_file(&path, &records(&TRAFFIC)).unwrap();

        let mut indexer = indexer();
        assert_eq!(indexer.build_from_file(&path).await.unwrap(), 3);
        assert_eq!(indexer.len(), 3);
    }

    #[tokio::test]
    async fn test_load_rejects_index_from_other_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("captions.index"), dir.path().join("m.json"));

        let mut saved = indexer();
        saved.build(records(&TRAFFIC)).await.unwrap();
        saved.save(&paths).unwrap();

        let mut smaller = CaptionIndexer::new(Arc::new(HashingEmbedding::new(256)));
        let err = smaller.load(&paths).unwrap_err();
        assert!(matches!(err, TsvaError::DataIntegrity(_)), "{err}");
        assert!(!smaller.is_built());
    }

    #[tokio::test]
    async fn test_prepare_leaves_current_index() {
        let mut indexer = indexer();
        indexer.build(records(&TRAFFIC)).await.unwrap();

        let candidate = indexer
            .prepare(records(&["bus stopped at bus stop"]))
            .await
            .unwrap();
        assert_eq!(candidate.len(), 1);
        assert_eq!(indexer.len(), 3);

        indexer.install(candidate);
        assert_eq!(indexer.len(), 1);
    }

    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingClient for ShortEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }

        fn dimension(&self) -> usize {
            1
        }

        fn model_name(&self) -> &str {
            "short"
        }
    }

    #[tokio::test]
    async fn test_embedder_count_mismatch_keeps_prior_index() {
        let mut indexer = CaptionIndexer::new(Arc::new(ShortEmbedder));
        indexer.build(records(&["only one"])).await.unwrap();

        let err = indexer.build(records(&TRAFFIC)).await.unwrap_err();
        assert!(matches!(err, TsvaError::DataIntegrity(_)));
        assert_eq!(indexer.len(), 1);
    }

    /// Reports one dimension but embeds queries with another
    struct DriftingEmbedder;

    #[async_trait]
    impl EmbeddingClient for DriftingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }

        fn dimension(&self) -> usize {
            1
        }

        fn model_name(&self) -> &str {
            "drifting"
        }
    }

    #[tokio::test]
    async fn test_query_dimension_drift_is_integrity_error() {
        let mut indexer = CaptionIndexer::new(Arc::new(DriftingEmbedder));
        indexer.build(records(&TRAFFIC)).await.unwrap();

        let err = indexer.search("red light", 1).await.unwrap_err();
        assert!(matches!(err, TsvaError::DataIntegrity(_)), "{err}");
    }
}
