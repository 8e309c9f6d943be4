use thiserror::Error;

/// Errors that can occur while maintaining or querying the reference index.
#[derive(Error, Debug)]
pub enum RefIndexError {
    #[error("reference index unavailable while resolving {element}: {message}")]
    IndexUnavailable { element: String, message: String },

    #[error("database error: {message} (operation: {operation})")]
    Database { message: String, operation: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("import error: {message} (path: {path})")]
    Import { message: String, path: String },

    #[error("invalid element reference '{input}', expected <table>:<id>")]
    InvalidElement { input: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results using `RefIndexError`.
pub type Result<T> = std::result::Result<T, RefIndexError>;
