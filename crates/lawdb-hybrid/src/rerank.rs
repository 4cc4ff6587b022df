use anyhow::anyhow;

use lawdb_core::error::{Error, Result};
use lawdb_core::traits::CrossEncoder;
use lawdb_core::types::SearchResult;

/// Final precision pass over fused candidates.
pub struct Reranker {
    encoder: Box<dyn CrossEncoder>,
}

impl Reranker {
    pub fn new(encoder: Box<dyn CrossEncoder>) -> Self { Self { encoder } }

    /// Scores every candidate in a single provider call and keeps the best
    /// `top_n`. The fused score is preserved in `fused_score`.
    pub fn rerank(&self, query: &str, mut candidates: Vec<SearchResult>, top_n: usize) -> Result<Vec<SearchResult>> {
        if candidates.is_empty() || top_n == 0 { return Ok(Vec::new()); }
        let pairs: Vec<(String, String)> = candidates.iter().map(|c| (query.to_string(), c.text.clone())).collect();
        let scores = self.encoder.score_pairs(&pairs).map_err(|e| Error::provider("cross-encoder", e))?;
        if scores.len() != pairs.len() {
            return Err(Error::provider(
                "cross-encoder",
                anyhow!("returned {} scores for {} pairs", scores.len(), pairs.len()),
            ));
        }
        for (candidate, score) in candidates.iter_mut().zip(scores) {
            if candidate.fused_score.is_none() { candidate.fused_score = Some(candidate.score); }
            candidate.score = score;
        }
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(top_n);
        Ok(candidates)
    }
}
