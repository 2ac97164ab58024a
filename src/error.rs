//! Error types for the leads engine.

/// Top-level error type for a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lead store error: {0}")]
    Store(#[from] StoreError),

    #[error("Search provider error: {0}")]
    Search(#[from] SearchError),

    #[error("Email provider error: {0}")]
    Email(#[from] EmailError),

    #[error("Inbox error: {0}")]
    Inbox(#[from] InboxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Lead store errors. `Auth` is fatal to the run; everything else is
/// item-scoped and the run continues past it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Http(String),

    #[error("Store rejected credentials (HTTP {status})")]
    Auth { status: u16 },

    #[error("Store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Store returned an unexpected row shape: {0}")]
    Serialization(String),

    #[error("Store returned no row for {entity} {key}")]
    MissingRow { entity: String, key: String },
}

/// Search/enrichment provider errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Http(String),

    #[error("Search provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Transactional email provider errors.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email send request failed: {0}")]
    Http(String),

    #[error("Email provider rejected the send (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Email provider response missing delivery id")]
    MissingDeliveryId,
}

/// Inbox (IMAP) errors.
#[derive(Debug, thiserror::Error)]
pub enum InboxError {
    #[error("IMAP connect failed: {0}")]
    Connect(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("IMAP login failed")]
    Login,

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
