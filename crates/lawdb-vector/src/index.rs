use anyhow::anyhow;

use lawdb_core::error::{Error, Result};
use lawdb_core::traits::Embedder;
use lawdb_core::types::{DocId, SearchHit};

/// Flat row-major matrix of unit vectors, searched exhaustively.
pub struct VectorIndex {
    embedder: Box<dyn Embedder>,
    vectors: Vec<f32>,
    dim: Option<usize>,
    rows: usize,
}

impl VectorIndex {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self { embedder, vectors: Vec::new(), dim: None, rows: 0 }
    }

    pub fn embedder_id(&self) -> &str { self.embedder.embedder_id() }

    /// Fixed by the first insert (or by a loaded snapshot).
    pub fn dim(&self) -> Option<usize> { self.dim }

    pub fn len(&self) -> usize { self.rows }

    pub fn is_empty(&self) -> bool { self.rows == 0 }

    pub fn as_flat(&self) -> &[f32] { &self.vectors }

    pub fn row(&self, id: DocId) -> Option<&[f32]> {
        let dim = self.dim?;
        (id < self.rows).then(|| &self.vectors[id * dim..(id + 1) * dim])
    }

    fn expected_dim(&self) -> usize { self.dim.unwrap_or_else(|| self.embedder.dim()) }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed_batch(texts).map_err(|e| Error::provider("embedding", e))?;
        if vectors.len() != texts.len() {
            return Err(Error::provider(
                "embedding",
                anyhow!("returned {} vectors for {} texts", vectors.len(), texts.len()),
            ));
        }
        Ok(vectors)
    }

    /// Embed a batch in one provider call and check every row against the
    /// index dimension. Does not modify the index.
    pub fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let vectors = self.embed(texts)?;
        self.check_rows(&vectors)?;
        Ok(vectors)
    }

    fn check_rows(&self, rows: &[Vec<f32>]) -> Result<()> {
        let expected = self.expected_dim();
        if expected == 0 {
            return Err(Error::InvalidInput("embedding dimension is zero".to_string()));
        }
        match rows.iter().find(|v| v.len() != expected) {
            Some(bad) => Err(Error::DimensionMismatch { expected, found: bad.len() }),
            None => Ok(()),
        }
    }

    /// Normalize and append rows produced by `embed_documents`.
    pub fn append(&mut self, rows: Vec<Vec<f32>>) -> Result<()> {
        if rows.is_empty() { return Ok(()); }
        self.check_rows(&rows)?;
        let dim = self.expected_dim();
        self.vectors.reserve(rows.len() * dim);
        for mut row in rows {
            normalize(&mut row);
            self.vectors.extend_from_slice(&row);
        }
        self.rows = self.vectors.len() / dim;
        self.dim = Some(dim);
        Ok(())
    }

    /// Replace the contents with rows loaded from disk. The vectors are
    /// stored as-is; they were normalized before they were persisted.
    pub fn restore(&mut self, vectors: Vec<f32>, dim: usize) -> Result<()> {
        if vectors.is_empty() {
            self.clear();
            return Ok(());
        }
        let expected = self.embedder.dim();
        if dim != expected {
            return Err(Error::DimensionMismatch { expected, found: dim });
        }
        if dim == 0 || vectors.len() % dim != 0 {
            return Err(Error::IndexIntegrity(format!("{} values do not form rows of {dim}", vectors.len())));
        }
        self.rows = vectors.len() / dim;
        self.vectors = vectors;
        self.dim = Some(dim);
        Ok(())
    }

    pub fn truncate(&mut self, len: usize) {
        if len >= self.rows { return; }
        match self.dim {
            Some(dim) if len > 0 => {
                self.vectors.truncate(len * dim);
                self.rows = len;
            }
            _ => self.clear(),
        }
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
        self.rows = 0;
        self.dim = None;
    }

    /// Embed `query` and return the `k` rows with the highest inner product.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.rows == 0 || k == 0 { return Ok(Vec::new()); }
        let mut embedded = self.embed(&[query.to_string()])?;
        match embedded.pop() {
            Some(q) => self.search_vec(&q, k),
            None => Ok(Vec::new()),
        }
    }

    /// Ties are broken by ascending corpus position.
    pub fn search_vec(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let Some(dim) = self.dim else { return Ok(Vec::new()) };
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, found: query.len() });
        }
        let mut q = query.to_vec();
        normalize(&mut q);
        let mut hits: Vec<SearchHit> = self
            .vectors
            .chunks_exact(dim)
            .enumerate()
            .map(|(id, row)| SearchHit { id, score: dot(row, &q) })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(k);
        tracing::debug!(rows = self.rows, k, hits = hits.len(), "vector search");
        Ok(hits)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

/// Scale to unit length. Zero vectors are left unchanged.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 { for x in v.iter_mut() { *x /= norm; } }
}
