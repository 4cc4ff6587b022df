//! Domain types shared by the lexical, vector and hybrid engines.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Position of a document in the corpus. Assigned at insertion, never reused.
pub type DocId = usize;
pub type Meta = HashMap<String, String>;

pub const LAW_KEY: &str = "law";
pub const ARTICLE_KEY: &str = "article";
pub const LINE_NUMBER_KEY: &str = "line_number";

/// Metadata attached to a statute passage.
///
/// - `law`: bracketed law title, e.g. `《个人信息保护法》`
/// - `article`: article citation, e.g. `第十三条`
/// - `line_number`: 1-based line in the source corpus file
/// - `extra`: any other key (source file, chapter, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub law: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl LawMetadata {
    pub fn with_law(mut self, law: impl Into<String>) -> Self {
        self.law = Some(law.into());
        self
    }

    pub fn with_article(mut self, article: impl Into<String>) -> Self {
        self.article = Some(article.into());
        self
    }

    pub fn with_line_number(mut self, line_number: usize) -> Self {
        self.line_number = Some(line_number);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Build from a loose string map. Known keys fill the named fields; a
    /// `line_number` that is not an integer is kept verbatim in `extra`.
    pub fn from_map(map: Meta) -> Self {
        let mut meta = Self::default();
        for (key, value) in map {
            match key.as_str() {
                LAW_KEY => meta.law = Some(value),
                ARTICLE_KEY => meta.article = Some(value),
                LINE_NUMBER_KEY => match value.trim().parse::<usize>() {
                    Ok(n) => meta.line_number = Some(n),
                    Err(_) => {
                        meta.extra.insert(key, value);
                    }
                },
                _ => {
                    meta.extra.insert(key, value);
                }
            }
        }
        meta
    }

    pub fn to_map(&self) -> Meta {
        let mut map: Meta = self.extra.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        if let Some(law) = &self.law { map.insert(LAW_KEY.to_string(), law.clone()); }
        if let Some(article) = &self.article { map.insert(ARTICLE_KEY.to_string(), article.clone()); }
        if let Some(n) = self.line_number { map.insert(LINE_NUMBER_KEY.to_string(), n.to_string()); }
        map
    }

    pub fn is_empty(&self) -> bool {
        self.law.is_none() && self.article.is_none() && self.line_number.is_none() && self.extra.is_empty()
    }
}

impl From<Meta> for LawMetadata {
    fn from(map: Meta) -> Self { Self::from_map(map) }
}

/// A stored passage. `id` is its position in the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: String,
    pub metadata: LawMetadata,
}

/// Indicates which engine(s) produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Lexical,
    Hybrid,
}

/// A ranked `(corpus position, score)` pair as returned by a single index.
/// Higher is better.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: DocId,
    pub score: f32,
}

/// One passage returned from a query.
///
/// `score` is the final ranking score (the cross-encoder score once the
/// reranker has run). Component scores are present only when the document
/// appeared in the corresponding candidate list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: DocId,
    pub text: String,
    pub metadata: LawMetadata,
    pub score: f32,
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fused_score: Option<f32>,
}
