//! The document store owns the corpus: texts, metadata, the vector index and
//! the lexical index, kept aligned by position. Every successful mutation is
//! followed by a full snapshot rewrite.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::Serialize;

use lawdb_core::config::Bm25Settings;
use lawdb_core::error::{Error, Result};
use lawdb_core::traits::{Embedder, Tokenizer};
use lawdb_core::types::{DocId, Document, LawMetadata};
use lawdb_text::LexicalIndex;
use lawdb_vector::{SnapshotDir, VectorIndex};

/// Bucket for passages without a law title.
pub const UNKNOWN_LAW: &str = "未知";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub count: usize,
    pub dim: Option<usize>,
    pub embedder_id: String,
    /// Passage count per law title.
    pub laws: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub before: usize,
    pub after: usize,
}

pub struct DocumentStore {
    texts: Vec<String>,
    metadatas: Vec<LawMetadata>,
    vectors: VectorIndex,
    lexical: LexicalIndex,
    snapshots: Option<SnapshotDir>,
}

impl DocumentStore {
    /// A store that never touches disk.
    pub fn in_memory(embedder: Box<dyn Embedder>, tokenizer: Box<dyn Tokenizer>, bm25: Bm25Settings) -> Self {
        Self {
            texts: Vec::new(),
            metadatas: Vec::new(),
            vectors: VectorIndex::new(embedder),
            lexical: LexicalIndex::new(tokenizer, bm25),
            snapshots: None,
        }
    }

    /// Open the snapshot under `index_dir`, or start empty if none exists.
    /// The lexical statistics are rebuilt from the loaded texts.
    pub fn load_or_create(
        index_dir: impl Into<PathBuf>,
        embedder: Box<dyn Embedder>,
        tokenizer: Box<dyn Tokenizer>,
        bm25: Bm25Settings,
    ) -> Result<Self> {
        let snapshots = SnapshotDir::new(index_dir);
        let mut store = Self::in_memory(embedder, tokenizer, bm25);
        if let Some(snapshot) = snapshots.load()? {
            if snapshot.manifest.embedder_id != store.vectors.embedder_id() {
                tracing::warn!(
                    stored = %snapshot.manifest.embedder_id,
                    current = store.vectors.embedder_id(),
                    "snapshot was built with a different embedder"
                );
            }
            store.vectors.restore(snapshot.vectors, snapshot.manifest.dim)?;
            let terms = store.lexical.prepare(&snapshot.texts)?;
            store.lexical.extend(terms);
            store.texts = snapshot.texts;
            store.metadatas = snapshot.metadatas;
            store.check_alignment()?;
        } else {
            tracing::info!(root = %snapshots.root().display(), "no snapshot found; starting an empty corpus");
        }
        store.snapshots = Some(snapshots);
        Ok(store)
    }

    /// Append passages. `metadatas` may be empty (every passage gets empty
    /// metadata) or must match `texts` in length.
    ///
    /// The batch is embedded in one provider call and tokenized before any
    /// state changes, so a provider failure leaves the store untouched. If the
    /// snapshot cannot be written the in-memory append is rolled back.
    pub fn add_documents(&mut self, texts: Vec<String>, metadatas: Vec<LawMetadata>) -> Result<()> {
        if !metadatas.is_empty() && metadatas.len() != texts.len() {
            return Err(Error::InvalidInput(format!(
                "{} metadata records for {} texts",
                metadatas.len(),
                texts.len()
            )));
        }
        if texts.is_empty() { return Ok(()); }
        let metadatas = if metadatas.is_empty() { vec![LawMetadata::default(); texts.len()] } else { metadatas };

        let rows = self.vectors.embed_documents(&texts)?;
        let terms = self.lexical.prepare(&texts)?;

        let before = self.texts.len();
        let added = texts.len();
        self.vectors.append(rows)?;
        self.lexical.extend(terms);
        self.texts.extend(texts);
        self.metadatas.extend(metadatas);
        if let Err(e) = self.check_alignment().and_then(|()| self.persist()) {
            self.rollback(before);
            return Err(e);
        }
        tracing::info!(added, total = self.texts.len(), "documents added");
        Ok(())
    }

    fn rollback(&mut self, len: usize) {
        tracing::warn!(keep = len, discard = self.texts.len().saturating_sub(len), "rolling back append");
        self.truncate(len);
    }

    fn truncate(&mut self, len: usize) {
        self.vectors.truncate(len);
        self.lexical.truncate(len);
        self.texts.truncate(len);
        self.metadatas.truncate(len);
    }

    fn check_alignment(&self) -> Result<()> {
        let n = self.texts.len();
        if self.metadatas.len() != n || self.vectors.len() != n || self.lexical.len() != n {
            return Err(Error::IndexIntegrity(format!(
                "corpus out of alignment: texts {n}, metadata {}, vectors {}, lexical {}",
                self.metadatas.len(),
                self.vectors.len(),
                self.lexical.len()
            )));
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let Some(snapshots) = &self.snapshots else { return Ok(()) };
        snapshots.write(
            self.vectors.embedder_id(),
            self.vectors.dim().unwrap_or(0),
            self.vectors.as_flat(),
            &self.texts,
            &self.metadatas,
        )?;
        Ok(())
    }

    pub fn len(&self) -> usize { self.texts.len() }

    pub fn is_empty(&self) -> bool { self.texts.is_empty() }

    pub fn dimension(&self) -> Option<usize> { self.vectors.dim() }

    pub fn text(&self, id: DocId) -> Option<&str> { self.texts.get(id).map(String::as_str) }

    pub fn metadata(&self, id: DocId) -> Option<&LawMetadata> { self.metadatas.get(id) }

    pub fn get(&self, id: DocId) -> Option<Document> {
        Some(Document { id, text: self.texts.get(id)?.clone(), metadata: self.metadatas.get(id)?.clone() })
    }

    pub fn documents(&self) -> impl Iterator<Item = Document> + '_ {
        (0..self.len()).filter_map(|id| self.get(id))
    }

    pub fn vector_index(&self) -> &VectorIndex { &self.vectors }

    pub fn lexical_index(&self) -> &LexicalIndex { &self.lexical }

    pub fn snapshot_dir(&self) -> Option<&SnapshotDir> { self.snapshots.as_ref() }

    pub fn stats(&self) -> CorpusStats {
        let mut laws = BTreeMap::new();
        for meta in &self.metadatas {
            let law = meta.law.clone().unwrap_or_else(|| UNKNOWN_LAW.to_string());
            *laws.entry(law).or_insert(0) += 1;
        }
        CorpusStats {
            count: self.len(),
            dim: self.dimension(),
            embedder_id: self.vectors.embedder_id().to_string(),
            laws,
        }
    }

    /// Drop duplicate passages (by text, first occurrence wins), delete the
    /// persisted snapshot and re-add the survivors in a single call.
    pub fn rebuild_deduplicated(&mut self) -> Result<RebuildReport> {
        let before = self.len();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut texts = Vec::new();
        let mut metadatas = Vec::new();
        for (text, meta) in self.texts.iter().zip(&self.metadatas) {
            if seen.insert(text) {
                texts.push(text.clone());
                metadatas.push(meta.clone());
            }
        }

        if let Some(snapshots) = &self.snapshots {
            snapshots.clear()?;
        }
        self.truncate(0);
        self.add_documents(texts, metadatas)?;
        let report = RebuildReport { before, after: self.len() };
        tracing::info!(before = report.before, after = report.after, "corpus rebuilt without duplicates");
        Ok(report)
    }
}
