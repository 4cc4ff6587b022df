//! lawdb-hybrid
//!
//! Hybrid statute retrieval: the query is classified, both indexes are
//! searched, the candidate lists are fused with weighted RRF and the fused
//! top-k is reranked by a cross-encoder.

use std::path::Path;

use lawdb_core::config::{SearchSettings, Settings};
use lawdb_core::error::{Error, Result};
use lawdb_core::traits::CrossEncoder;
use lawdb_core::types::{LawMetadata, SearchResult};
use lawdb_embed::{get_default_embedder, OverlapCrossEncoder};
use lawdb_text::AnalyzerTokenizer;

pub mod classify;
pub mod fusion;
pub mod rerank;
pub mod store;

pub use classify::{Classification, QueryClass, QueryClassifier};
pub use fusion::{FusedHit, FusionWeights, RankFusion};
pub use rerank::Reranker;
pub use store::{CorpusStats, DocumentStore, RebuildReport};

pub struct HybridRetriever {
    store: DocumentStore,
    classifier: QueryClassifier,
    fusion: RankFusion,
    reranker: Reranker,
    defaults: SearchSettings,
}

impl HybridRetriever {
    pub fn new(store: DocumentStore, cross_encoder: Box<dyn CrossEncoder>, settings: &Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            store,
            classifier: QueryClassifier::new()?,
            fusion: RankFusion::new(settings.fusion),
            reranker: Reranker::new(cross_encoder),
            defaults: settings.search,
        })
    }

    /// In-tree providers over the snapshot in `settings.data.index_dir`,
    /// resolved against `base`.
    pub fn from_settings(settings: &Settings, base: &Path) -> Result<Self> {
        let embedder = get_default_embedder(&settings.embedding).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let store = DocumentStore::load_or_create(
            settings.data.index_dir(base),
            embedder,
            Box::new(AnalyzerTokenizer::default()),
            settings.bm25,
        )?;
        Self::new(store, Box::new(OverlapCrossEncoder::new()), settings)
    }

    pub fn store(&self) -> &DocumentStore { &self.store }

    pub fn classify(&self, query: &str) -> Classification { self.classifier.classify(query) }

    /// Classify, fetch `2 * top_k` candidates from each index, fuse to
    /// `top_k`, rerank to `top_n`. Blank queries, zero limits and an empty
    /// corpus return an empty list without calling any provider.
    pub fn search(&self, query: &str, top_k: usize, top_n: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() || top_k == 0 || top_n == 0 || self.store.is_empty() {
            return Ok(Vec::new());
        }
        let classification = self.classifier.classify(query);
        let fetch = top_k.saturating_mul(2);
        let vector_hits = self.store.vector_index().search(query, fetch)?;
        let lexical_hits = self.store.lexical_index().search(query, fetch)?;
        tracing::debug!(
            query,
            class = ?classification.class,
            exact = classification.exact_score,
            semantic = classification.semantic_score,
            vector = vector_hits.len(),
            lexical = lexical_hits.len(),
            "retrieved candidates"
        );

        let fused = self.fusion.fuse(&vector_hits, &lexical_hits, classification.class, top_k);
        let candidates = fused.into_iter().map(|hit| self.resolve(hit)).collect::<Result<Vec<_>>>()?;
        let results = self.reranker.rerank(query, candidates, top_n)?;
        tracing::debug!(query, results = results.len(), "search complete");
        Ok(results)
    }

    /// Attach text and metadata to a fused hit. An id the store cannot
    /// resolve means the indexes are out of alignment.
    fn resolve(&self, hit: FusedHit) -> Result<SearchResult> {
        let doc = self.store.get(hit.id).ok_or_else(|| {
            Error::IndexIntegrity(format!("fused id {} is outside a corpus of {}", hit.id, self.store.len()))
        })?;
        Ok(SearchResult {
            id: doc.id,
            text: doc.text,
            metadata: doc.metadata,
            score: hit.score,
            source: hit.source,
            vector_score: hit.vector_score,
            lexical_score: hit.lexical_score,
            fused_score: Some(hit.score),
        })
    }

    /// `search` with the configured `top_k` / `top_n`.
    pub fn search_with_defaults(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.search(query, self.defaults.top_k, self.defaults.top_n)
    }

    pub fn add_documents(&mut self, texts: Vec<String>, metadatas: Vec<LawMetadata>) -> Result<()> {
        self.store.add_documents(texts, metadatas)
    }

    pub fn stats(&self) -> CorpusStats { self.store.stats() }

    pub fn rebuild_deduplicated(&mut self) -> Result<RebuildReport> { self.store.rebuild_deduplicated() }
}
