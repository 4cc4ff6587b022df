//! Generation-based on-disk snapshots.
//!
//! ```text
//! <index_dir>/
//!   CURRENT                 "gen-<n>"
//!   gen-<n>/
//!     vectors.safetensors   tensor "vectors", F32, shape [count, dim]
//!     texts.json            ["...", ...]
//!     metadata.json         [{"law": "...", ...}, ...]
//!     manifest.json         generation, counts and blake3 checksums
//! ```
//!
//! A new generation is fully written into a staging directory before it is
//! renamed into place, and `CURRENT` is swapped with an atomic rename.
//! Readers therefore see either the previous generation or the new one.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use safetensors::tensor::{Dtype, SafeTensors, TensorView};
use serde::{Deserialize, Serialize};

use lawdb_core::error::{Error, Result};
use lawdb_core::types::LawMetadata;

pub const CURRENT_FILE: &str = "CURRENT";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const VECTORS_FILE: &str = "vectors.safetensors";
pub const TEXTS_FILE: &str = "texts.json";
pub const METADATA_FILE: &str = "metadata.json";
const TENSOR_NAME: &str = "vectors";
const GEN_PREFIX: &str = "gen-";
const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub embedder_id: String,
    pub count: usize,
    pub dim: usize,
    /// File name -> blake3 hex digest.
    pub checksums: BTreeMap<String, String>,
}

/// Everything needed to rebuild an in-memory corpus.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub manifest: Manifest,
    /// Row-major `[count, dim]`.
    pub vectors: Vec<f32>,
    pub texts: Vec<String>,
    pub metadatas: Vec<LawMetadata>,
}

pub struct SnapshotDir {
    root: PathBuf,
}

impl SnapshotDir {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    fn gen_dir(&self, generation: u64) -> PathBuf { self.root.join(format!("{GEN_PREFIX}{generation}")) }

    /// Generation named by `CURRENT`, if any.
    pub fn current_generation(&self) -> Result<Option<u64>> {
        let path = self.root.join(CURRENT_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::persistence(format!("reading {}", path.display()), e)),
        };
        raw.trim()
            .strip_prefix(GEN_PREFIX)
            .and_then(|n| n.parse::<u64>().ok())
            .map(Some)
            .ok_or_else(|| Error::IndexIntegrity(format!("{CURRENT_FILE} does not name a generation: {:?}", raw.trim())))
    }

    /// Write a new generation and make it current. Older generations are
    /// removed afterwards on a best-effort basis.
    pub fn write(
        &self,
        embedder_id: &str,
        dim: usize,
        vectors: &[f32],
        texts: &[String],
        metadatas: &[LawMetadata],
    ) -> Result<Manifest> {
        let count = texts.len();
        if metadatas.len() != count || vectors.len() != count * dim {
            return Err(Error::IndexIntegrity(format!(
                "refusing to persist misaligned corpus: {} texts, {} metadata entries, {} values for dim {dim}",
                count,
                metadatas.len(),
                vectors.len()
            )));
        }
        fs::create_dir_all(&self.root)
            .map_err(|e| Error::persistence(format!("creating {}", self.root.display()), e))?;
        let generation = self.current_generation()?.map_or(1, |g| g + 1);

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| Error::persistence("creating staging directory", e))?;

        let vector_bytes = encode_vectors(vectors, count, dim)?;
        let text_bytes = serde_json::to_vec(texts).map_err(|e| Error::persistence("encoding texts", e))?;
        let maps: Vec<BTreeMap<String, String>> = metadatas.iter().map(|m| m.to_map().into_iter().collect()).collect();
        let meta_bytes = serde_json::to_vec(&maps).map_err(|e| Error::persistence("encoding metadata", e))?;

        let mut checksums = BTreeMap::new();
        for (name, bytes) in [(VECTORS_FILE, &vector_bytes), (TEXTS_FILE, &text_bytes), (METADATA_FILE, &meta_bytes)] {
            write_file(&staging.path().join(name), bytes)?;
            checksums.insert(name.to_string(), blake3::hash(bytes).to_hex().to_string());
        }
        let manifest = Manifest {
            generation,
            created_at: Utc::now(),
            embedder_id: embedder_id.to_string(),
            count,
            dim,
            checksums,
        };
        let manifest_bytes =
            serde_json::to_vec_pretty(&manifest).map_err(|e| Error::persistence("encoding manifest", e))?;
        write_file(&staging.path().join(MANIFEST_FILE), &manifest_bytes)?;

        let target = self.gen_dir(generation);
        if target.exists() {
            // left over from an interrupted write that never became current
            fs::remove_dir_all(&target)
                .map_err(|e| Error::persistence(format!("removing stale {}", target.display()), e))?;
        }
        fs::rename(staging.path(), &target)
            .map_err(|e| Error::persistence(format!("publishing {}", target.display()), e))?;
        drop(staging);

        let mut pointer = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| Error::persistence("creating CURRENT pointer", e))?;
        pointer
            .write_all(format!("{GEN_PREFIX}{generation}\n").as_bytes())
            .and_then(|()| pointer.as_file().sync_all())
            .map_err(|e| Error::persistence("writing CURRENT pointer", e))?;
        pointer
            .persist(self.root.join(CURRENT_FILE))
            .map_err(|e| Error::persistence("swapping CURRENT pointer", e.error))?;

        self.prune(generation);
        tracing::info!(generation, count, dim, root = %self.root.display(), "snapshot written");
        Ok(manifest)
    }

    /// Remove every generation except `keep`, plus staging directories left
    /// behind by writes that never finished.
    fn prune(&self, keep: u64) {
        let Ok(entries) = fs::read_dir(&self.root) else { return };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(STAGING_PREFIX) {
                if let Err(e) = fs::remove_dir_all(entry.path()) {
                    tracing::warn!(dir = name, error = %e, "failed to remove abandoned staging directory");
                }
                continue;
            }
            let Some(generation) = name.strip_prefix(GEN_PREFIX).and_then(|n| n.parse::<u64>().ok()) else {
                continue;
            };
            if generation == keep { continue; }
            if let Err(e) = fs::remove_dir_all(entry.path()) {
                tracing::warn!(generation, error = %e, "failed to remove old snapshot generation");
            }
        }
    }

    /// Load the current generation. `Ok(None)` when nothing was ever written.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let Some(generation) = self.current_generation()? else { return Ok(None) };
        let dir = self.gen_dir(generation);

        let manifest_bytes = read_artifact(&dir, MANIFEST_FILE)?;
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| Error::IndexIntegrity(format!("unreadable manifest in {}: {e}", dir.display())))?;
        if manifest.generation != generation {
            return Err(Error::IndexIntegrity(format!(
                "manifest generation {} does not match {CURRENT_FILE} ({generation})",
                manifest.generation
            )));
        }

        let vector_bytes = read_verified(&dir, VECTORS_FILE, &manifest)?;
        let text_bytes = read_verified(&dir, TEXTS_FILE, &manifest)?;
        let meta_bytes = read_verified(&dir, METADATA_FILE, &manifest)?;

        let (rows, dim, vectors) = decode_vectors(&vector_bytes)?;
        let texts: Vec<String> = serde_json::from_slice(&text_bytes)
            .map_err(|e| Error::IndexIntegrity(format!("unreadable {TEXTS_FILE}: {e}")))?;
        let maps: Vec<BTreeMap<String, String>> = serde_json::from_slice(&meta_bytes)
            .map_err(|e| Error::IndexIntegrity(format!("unreadable {METADATA_FILE}: {e}")))?;

        if rows != manifest.count || texts.len() != manifest.count || maps.len() != manifest.count {
            return Err(Error::IndexIntegrity(format!(
                "artifact lengths disagree: manifest {}, vectors {rows}, texts {}, metadata {}",
                manifest.count,
                texts.len(),
                maps.len()
            )));
        }
        if rows > 0 && dim != manifest.dim {
            return Err(Error::IndexIntegrity(format!("vector dim {dim} does not match manifest dim {}", manifest.dim)));
        }

        let metadatas = maps.into_iter().map(|m| LawMetadata::from_map(m.into_iter().collect())).collect();
        tracing::info!(generation, count = rows, dim, "snapshot loaded");
        Ok(Some(Snapshot { manifest, vectors, texts, metadatas }))
    }

    /// Remove every persisted artifact.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::persistence(format!("removing {}", self.root.display()), e)),
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| Error::persistence(format!("creating {}", path.display()), e))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| Error::persistence(format!("writing {}", path.display()), e))
}

fn read_artifact(dir: &Path, name: &str) -> Result<Vec<u8>> {
    let path = dir.join(name);
    match fs::read(&path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(Error::IndexIntegrity(format!("missing artifact {}", path.display())))
        }
        Err(e) => Err(Error::persistence(format!("reading {}", path.display()), e)),
    }
}

fn read_verified(dir: &Path, name: &str, manifest: &Manifest) -> Result<Vec<u8>> {
    let bytes = read_artifact(dir, name)?;
    let expected = manifest
        .checksums
        .get(name)
        .ok_or_else(|| Error::IndexIntegrity(format!("manifest has no checksum for {name}")))?;
    let actual = blake3::hash(&bytes).to_hex();
    if actual.as_str() != expected {
        return Err(Error::IndexIntegrity(format!("checksum mismatch for {name}")));
    }
    Ok(bytes)
}

fn encode_vectors(vectors: &[f32], count: usize, dim: usize) -> Result<Vec<u8>> {
    let bytes: Vec<u8> = vectors.iter().flat_map(|x| x.to_le_bytes()).collect();
    let view = TensorView::new(Dtype::F32, vec![count, dim], &bytes)
        .map_err(|e| Error::persistence("building vector tensor", e))?;
    safetensors::serialize([(TENSOR_NAME, view)], &None).map_err(|e| Error::persistence("encoding vectors", e))
}

fn decode_vectors(buf: &[u8]) -> Result<(usize, usize, Vec<f32>)> {
    let tensors = SafeTensors::deserialize(buf)
        .map_err(|e| Error::IndexIntegrity(format!("unreadable {VECTORS_FILE}: {e}")))?;
    let view = tensors
        .tensor(TENSOR_NAME)
        .map_err(|e| Error::IndexIntegrity(format!("{VECTORS_FILE}: {e}")))?;
    if view.dtype() != Dtype::F32 {
        return Err(Error::IndexIntegrity(format!("{VECTORS_FILE} has dtype {:?}, expected F32", view.dtype())));
    }
    let (rows, dim) = match view.shape() {
        [rows, dim] => (*rows, *dim),
        other => return Err(Error::IndexIntegrity(format!("{VECTORS_FILE} has shape {other:?}, expected 2-D"))),
    };
    let vectors = view
        .data()
        .chunks_exact(4)
        .map(|chunk| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(chunk);
            f32::from_le_bytes(raw)
        })
        .collect();
    Ok((rows, dim, vectors))
}
