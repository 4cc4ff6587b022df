//! BM25 lexical index over tokenized statute passages.
//!
//! Statistics (term frequencies, document frequencies, average length) are a
//! pure function of the indexed documents and are recomputed in a single
//! pass whenever documents are appended or rolled back.

use std::collections::HashMap;

use lawdb_core::config::Bm25Settings;
use lawdb_core::error::{Error, Result};
use lawdb_core::traits::Tokenizer;
use lawdb_core::types::{DocId, SearchHit};

use crate::legal::keep_token;

/// Tokenized form of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocTerms {
    pub term_freqs: HashMap<String, u32>,
    /// Number of kept tokens.
    pub len: usize,
}

impl DocTerms {
    pub fn from_tokens<I: IntoIterator<Item = String>>(tokens: I) -> Self {
        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        let mut len = 0;
        for token in tokens {
            *term_freqs.entry(token).or_insert(0) += 1;
            len += 1;
        }
        Self { term_freqs, len }
    }
}

pub struct LexicalIndex {
    tokenizer: Box<dyn Tokenizer>,
    params: Bm25Settings,
    docs: Vec<DocTerms>,
    doc_freqs: HashMap<String, u32>,
    avg_len: f64,
}

impl LexicalIndex {
    pub fn new(tokenizer: Box<dyn Tokenizer>, params: Bm25Settings) -> Self {
        Self { tokenizer, params, docs: Vec::new(), doc_freqs: HashMap::new(), avg_len: 0.0 }
    }

    /// Provider tokens passed through the legal keep rule. Used for both
    /// documents and queries.
    pub fn analyze(&self, text: &str) -> Result<Vec<String>> {
        let tokens = self.tokenizer.tokenize(text).map_err(|e| Error::provider("tokenizer", e))?;
        Ok(tokens.into_iter().filter(|t| keep_token(t)).collect())
    }

    /// Tokenize a batch without touching the index.
    pub fn prepare(&self, texts: &[String]) -> Result<Vec<DocTerms>> {
        texts.iter().map(|t| self.analyze(t).map(DocTerms::from_tokens)).collect()
    }

    /// Append documents and rebuild statistics once.
    pub fn extend(&mut self, docs: Vec<DocTerms>) {
        if docs.is_empty() { return; }
        self.docs.extend(docs);
        self.rebuild_stats();
    }

    /// Drop every document at position `len` and after.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.docs.len() { return; }
        self.docs.truncate(len);
        self.rebuild_stats();
    }

    fn rebuild_stats(&mut self) {
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        let mut total = 0usize;
        for doc in &self.docs {
            total += doc.len;
            for term in doc.term_freqs.keys() { *doc_freqs.entry(term.clone()).or_insert(0) += 1; }
        }
        self.doc_freqs = doc_freqs;
        self.avg_len = if self.docs.is_empty() { 0.0 } else { total as f64 / self.docs.len() as f64 };
        tracing::debug!(docs = self.docs.len(), terms = self.doc_freqs.len(), avg_len = self.avg_len, "rebuilt BM25 statistics");
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn avg_len(&self) -> f64 { self.avg_len }

    pub fn doc_freq(&self, term: &str) -> u32 { self.doc_freqs.get(term).copied().unwrap_or(0) }

    pub fn doc_terms(&self, id: DocId) -> Option<&DocTerms> { self.docs.get(id) }

    /// `ln((N - df + 0.5) / (df + 0.5))`. Negative for terms in more than half
    /// the corpus; never clamped.
    pub fn idf(&self, term: &str) -> f64 {
        let n = self.docs.len() as f64;
        let df = f64::from(self.doc_freq(term));
        ((n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Sum of per-term BM25 contributions for the query terms present in the
    /// document. Repeated query terms contribute once per occurrence.
    pub fn score(&self, id: DocId, query_terms: &[String]) -> f64 {
        let Some(doc) = self.docs.get(id) else { return 0.0 };
        let k1 = f64::from(self.params.k1);
        let b = f64::from(self.params.b);
        let norm = if self.avg_len > 0.0 { doc.len as f64 / self.avg_len } else { 0.0 };
        query_terms
            .iter()
            .filter_map(|term| doc.term_freqs.get(term).map(|&tf| (term, f64::from(tf))))
            .map(|(term, tf)| self.idf(term) * tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * norm)))
            .sum()
    }

    /// Documents with a positive score, best first, ties by ascending id.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if self.docs.is_empty() || top_k == 0 { return Ok(Vec::new()); }
        let terms = self.analyze(query)?;
        if terms.is_empty() { return Ok(Vec::new()); }

        let mut hits: Vec<SearchHit> = (0..self.docs.len())
            .filter_map(|id| {
                let score = self.score(id, &terms);
                (score > 0.0).then_some(SearchHit { id, score: score as f32 })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(top_k);
        tracing::debug!(query, terms = terms.len(), hits = hits.len(), "lexical search");
        Ok(hits)
    }
}
