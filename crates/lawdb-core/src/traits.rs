//! Provider contracts consumed by the retrieval core.
//!
//! Implementations live outside the core (model runtimes, remote APIs) or in
//! `lawdb-embed` / `lawdb-text` for the deterministic in-tree versions. Every
//! call blocks until complete; failures are returned as-is and the core never
//! retries them.

/// Maps text to a fixed-length real vector.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `hash:xxh64:d512`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// One vector per input text, in input order. Vectors need not be
    /// normalized; the vector index normalizes on insert and on query.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Scores `(query, passage)` pairs. Higher is more relevant.
pub trait CrossEncoder: Send + Sync {
    fn score_pairs(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>>;
}

/// Segments text into normalized tokens.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> anyhow::Result<Vec<String>>;
}
