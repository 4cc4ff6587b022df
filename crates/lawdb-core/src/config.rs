//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g. `APP_BM25__K1`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Wrap an already assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration, validated.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        match env {
            "prod" | "production" => {
                if settings.embedding.dim < 64 {
                    anyhow::bail!("Prod config has a tiny embedding dimension: {}", settings.embedding.dim);
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub data: DataSettings,
    pub search: SearchSettings,
    pub bm25: Bm25Settings,
    pub fusion: FusionSettings,
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    /// Directory holding the snapshot generations and the `CURRENT` pointer.
    pub index_dir: String,
    /// Statute text file (or directory of `.txt` files) used by `ingest`.
    pub corpus_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub top_k: usize,
    pub top_n: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Settings {
    pub k1: f32,
    pub b: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightPair {
    pub vector: f32,
    pub lexical: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionSettings {
    pub k: f32,
    /// Multiplier applied to the lexical weight inside the RRF term.
    pub lexical_boost: f32,
    pub exact: WeightPair,
    pub semantic: WeightPair,
    pub mixed: WeightPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub dim: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data: DataSettings {
                index_dir: "data/index".to_string(),
                corpus_path: "chinese_law.txt".to_string(),
            },
            search: SearchSettings { top_k: 10, top_n: 5 },
            bm25: Bm25Settings::default(),
            fusion: FusionSettings::default(),
            embedding: EmbeddingSettings { dim: 512 },
        }
    }
}

impl Default for Bm25Settings {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            k: 20.0,
            lexical_boost: 2.0,
            exact: WeightPair { vector: 0.3, lexical: 0.7 },
            semantic: WeightPair { vector: 0.8, lexical: 0.2 },
            mixed: WeightPair { vector: 0.6, lexical: 0.4 },
        }
    }
}

impl WeightPair {
    fn validate(&self, name: &str) -> Result<()> {
        let ok = self.vector.is_finite() && self.lexical.is_finite() && self.vector >= 0.0 && self.lexical >= 0.0;
        if !ok || self.vector + self.lexical <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "fusion.{name} weights must be non-negative and not both zero (got {} / {})",
                self.vector, self.lexical
            )));
        }
        Ok(())
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if !(self.bm25.k1.is_finite() && self.bm25.k1 > 0.0) {
            return Err(Error::InvalidConfig(format!("bm25.k1 must be > 0 (got {})", self.bm25.k1)));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(Error::InvalidConfig(format!("bm25.b must be within [0, 1] (got {})", self.bm25.b)));
        }
        if !(self.fusion.k.is_finite() && self.fusion.k > 0.0) {
            return Err(Error::InvalidConfig(format!("fusion.k must be > 0 (got {})", self.fusion.k)));
        }
        if !(self.fusion.lexical_boost.is_finite() && self.fusion.lexical_boost >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "fusion.lexical_boost must be >= 0 (got {})",
                self.fusion.lexical_boost
            )));
        }
        self.fusion.exact.validate("exact")?;
        self.fusion.semantic.validate("semantic")?;
        self.fusion.mixed.validate("mixed")?;
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be > 0".to_string()));
        }
        Ok(())
    }
}

impl DataSettings {
    pub fn index_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.index_dir)
    }

    pub fn corpus_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.corpus_path)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
