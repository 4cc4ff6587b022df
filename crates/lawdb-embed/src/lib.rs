//! Deterministic in-tree providers.
//!
//! `HashEmbedder` projects character n-grams into a fixed-size vector with
//! xxHash64 feature hashing; `OverlapCrossEncoder` scores query/passage pairs
//! by shared terms. Neither loads model weights. Real model runtimes plug in
//! through the same `Embedder` / `CrossEncoder` traits.

use anyhow::{bail, Result};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use lawdb_core::config::EmbeddingSettings;
use lawdb_core::traits::Embedder;
use lawdb_text::legal::is_cjk;

pub mod cross;

pub use cross::OverlapCrossEncoder;

pub const DEFAULT_DIM: usize = 512;

pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 { bail!("embedding dimension must be > 0"); }
        Ok(Self { dim, id: format!("hash:xxh64:d{dim}") })
    }

    /// L2-normalized feature vector. Text without any features maps to the
    /// zero vector.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (feature, weight) in features(text) {
            let mut hasher = XxHash64::with_seed(0);
            feature.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign * weight;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// CJK unigrams (0.5) and bigrams (1.0) plus lowercased Latin/digit words (1.0).
fn features(text: &str) -> Vec<(String, f32)> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if is_cjk(c) {
            out.push((c.to_string(), 0.5));
            if let Some(&next) = chars.get(i + 1).filter(|n| is_cjk(**n)) {
                out.push((format!("{c}{next}"), 1.0));
            }
            i += 1;
        } else if c.is_alphanumeric() {
            let start = i;
            while i < chars.len() && chars[i].is_alphanumeric() && !is_cjk(chars[i]) { i += 1; }
            let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
            out.push((word, 1.0));
        } else {
            i += 1;
        }
    }
    out
}

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let embedder = HashEmbedder::new(settings.dim)?;
    tracing::info!(embedder = embedder.embedder_id(), "using hashing embedder");
    Ok(Box::new(embedder))
}
