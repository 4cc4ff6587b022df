//! lawdb-text
//!
//! Lexical side of retrieval: a statute-aware tantivy analyzer used as the
//! tokenizer provider, and an in-memory BM25 index over its output.
pub mod bm25;
pub mod legal;
pub mod tantivy_utils;

pub use bm25::{DocTerms, LexicalIndex};
pub use tantivy_utils::{build_analyzer, AnalyzerTokenizer, LegalTokenizer};
