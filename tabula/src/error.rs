use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Duplicate value for {model}.{column}: {value}")]
    DuplicateProperty {
        model: String,
        column: String,
        value: String,
    },

    #[error("{model} has no identifier")]
    MissingIdentifier { model: String },

    #[error("{model} not found: {id}")]
    NotFound { model: String, id: String },

    #[error("Cannot delete {model}: referenced by {referenced_by}.{column}")]
    RestrictedDelete {
        model: String,
        referenced_by: String,
        column: String,
    },

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal at startup: bad schema, bad transformer setup, bad config.
    Configuration,
    /// Recoverable per-operation violations.
    Integrity,
    NotFound,
    /// Query or value rejected before it reached the database.
    Invalid,
    Transport,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Schema(_) | Error::Config(_) => ErrorKind::Configuration,
            Error::DuplicateProperty { .. }
            | Error::MissingIdentifier { .. }
            | Error::RestrictedDelete { .. } => ErrorKind::Integrity,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Query(_) | Error::Conversion(_) => ErrorKind::Invalid,
            Error::Internal(_) => ErrorKind::Transport,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        // Full detail goes to the log only; callers get a sanitized message.
        log::error!("sqlite failure: {err}");
        Error::Internal("database operation failed".into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Conversion(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
