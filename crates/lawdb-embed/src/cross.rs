use anyhow::Result;
use std::collections::HashSet;

use lawdb_core::traits::{CrossEncoder, Tokenizer};
use lawdb_text::legal::{is_citation, keep_token};
use lawdb_text::AnalyzerTokenizer;

/// Added per query citation (`第十三条`, `《民法典》`) found verbatim in the passage.
pub const CITATION_BONUS: f32 = 0.5;

/// Term-overlap relevance: the share of the query's terms present in the
/// passage, plus a bonus for each cited article or law title it contains.
#[derive(Clone, Default)]
pub struct OverlapCrossEncoder {
    tokenizer: AnalyzerTokenizer,
}

impl OverlapCrossEncoder {
    pub fn new() -> Self { Self::default() }

    pub fn score(&self, query: &str, passage: &str) -> Result<f32> {
        let query_terms: HashSet<String> =
            self.tokenizer.tokenize(query)?.into_iter().filter(|t| keep_token(t)).collect();
        if query_terms.is_empty() { return Ok(0.0); }
        let passage_terms: HashSet<String> = self.tokenizer.tokenize(passage)?.into_iter().collect();

        let shared = query_terms.iter().filter(|t| passage_terms.contains(*t)).count();
        let citations = query_terms.iter().filter(|t| is_citation(t) && passage_terms.contains(*t)).count();
        Ok(shared as f32 / query_terms.len() as f32 + CITATION_BONUS * citations as f32)
    }
}

impl CrossEncoder for OverlapCrossEncoder {
    fn score_pairs(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        pairs.iter().map(|(q, p)| self.score(q, p)).collect()
    }
}
