use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// Persisted or in-memory artifacts disagree (lengths, checksums, missing files).
    #[error("Index integrity violated: {0}")]
    IndexIntegrity(String),

    #[error("Embedding dimension mismatch: index has {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Persistence failure ({context})")]
    Persistence {
        context: String,
        #[source]
        source: BoxError,
    },

    /// An embedding, cross-encoder or tokenizer call failed.
    #[error("{provider} provider failed")]
    Provider {
        provider: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn persistence<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Persistence { context: context.into(), source: source.into() }
    }

    pub fn provider(provider: &'static str, source: anyhow::Error) -> Self {
        Self::Provider { provider, source: source.into() }
    }

    /// True for errors that indicate a corrupted or misconfigured corpus.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::IndexIntegrity(_) | Self::DimensionMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
