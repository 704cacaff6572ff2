/// Semtable error types
#[derive(Debug, thiserror::Error)]
pub enum SemtableError {
    /// Tabular source could not be parsed at all
    #[error("Parse error: {0}")]
    Parse(String),

    /// Column sets of two record sets do not match
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Cosine similarity against a zero-norm vector
    #[error("Degenerate vector: {0}")]
    DegenerateVector(String),

    /// No embedding matrix stored under the requested column name
    #[error("Missing embedding column: {0}")]
    MissingColumn(String),

    /// Row-count or dimension disagreement between metadata and embeddings
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Search target column has no embeddings
    #[error("No embeddings: {0}")]
    NoEmbeddings(String),

    /// Search query was blank
    #[error("Query cannot be empty")]
    EmptyQuery,

    /// Embedder failed to encode a batch
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SemtableError {
    /// Create parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }

    /// Create schema mismatch error
    pub fn schema_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    /// Create degenerate vector error
    pub fn degenerate_vector<S: Into<String>>(msg: S) -> Self {
        Self::DegenerateVector(msg.into())
    }

    /// Create missing column error
    pub fn missing_column<S: Into<String>>(msg: S) -> Self {
        Self::MissingColumn(msg.into())
    }

    /// Create invariant violation error
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create no-embeddings error
    pub fn no_embeddings<S: Into<String>>(msg: S) -> Self {
        Self::NoEmbeddings(msg.into())
    }

    /// Create encoding error
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether the error is a recoverable user-input problem rather than a
    /// fault in the store or the pipeline
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyQuery | Self::NoEmbeddings(_) | Self::NotFound(_)
        )
    }
}
