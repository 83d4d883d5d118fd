//! Error types for the transformation substrate.

/// Failure taxonomy shared by the engines and the dispatcher.
///
/// Resolution and graph-build failures are advisory: callers log them and carry
/// on without the hint. Patch, transform, and syntax failures are fatal for the
/// change step that raised them, never for the whole run.
#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("No confident match for '{0}'")]
    Resolution(String),

    #[error("Dependency graph build failed: {0}")]
    GraphBuild(String),

    #[error("Failed to apply patches: none of {attempted} block(s) matched")]
    PatchApplication { attempted: usize, failures: Vec<String> },

    #[error("Atomic patch rejected: {failed} of {attempted} block(s) did not match")]
    PatchRejected { attempted: usize, failed: usize },

    #[error("Structural transform failed: {0}")]
    StructuralTransform(String),

    #[error("Generated content still invalid after {attempts} attempt(s): {message}")]
    SyntaxRegression { attempts: usize, message: String },

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Malformed generator output: {0}")]
    WireFormat(String),

    #[error("Path escapes the project: {0}")]
    UnsafePath(String),

    #[error("Unsupported change: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SpliceResult<T> = Result<T, SpliceError>;
