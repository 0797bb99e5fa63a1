//! Error types for gator.

use thiserror::Error;

/// Common error type for gator.
#[derive(Error, Debug)]
pub enum GatorError {
    /// The feed set is empty, so a poll cycle has nothing to select.
    #[error("no feeds registered")]
    NoFeedsRegistered,

    /// Fetching or decoding a feed failed.
    #[error("failed to fetch feed {feed}: {source}")]
    Fetch {
        /// Name of the feed being polled.
        feed: String,
        #[source]
        source: FetchError,
    },

    /// Store failure outside of entry writing (selection, setup, migrations).
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Store failure while writing an entry, other than a duplicate link.
    #[error("failed to store entry {link} for feed {feed}: {source}")]
    Write {
        /// Name of the feed being polled.
        feed: String,
        /// Link of the entry that could not be written.
        link: String,
        #[source]
        source: StoreError,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for GatorError {
    fn from(e: sqlx::Error) -> Self {
        GatorError::Storage(e.into())
    }
}

/// Errors raised while fetching a feed over HTTP.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The URL could not be parsed or has an unsupported shape.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL points at a host the fetcher refuses to contact.
    #[error("forbidden host: {0}")]
    Forbidden(String),

    /// The HTTP client could not be built.
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Transport failure (connect, timeout, body read).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A redirect chain went past the configured hop limit.
    #[error("too many redirects (max {0})")]
    TooManyRedirects(usize),

    /// The server answered with a non-success status.
    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),

    /// The body exceeds the configured size limit.
    #[error("feed too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    /// The body is not a decodable RSS document.
    #[error("failed to decode feed: {0}")]
    Decode(#[from] quick_xml::DeError),
}

/// Errors reported by the store boundary.
///
/// Unique violations carry the identity of the offending constraint so
/// callers can tell an expected duplicate apart from a genuine failure
/// without inspecting driver-specific codes.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be converted back into a record.
    #[error("corrupt record: {0}")]
    Decode(String),
}

impl StoreError {
    /// Returns true if this is a unique violation on the given constraint.
    pub fn is_unique_violation_on(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                let constraint = db_err
                    .constraint()
                    .map(str::to_string)
                    .or_else(|| crate::db::unique_constraint_from_message(db_err.message()))
                    .unwrap_or_default();
                return StoreError::UniqueViolation { constraint };
            }
        }
        StoreError::Database(e.to_string())
    }
}

/// Result type alias for gator operations.
pub type Result<T> = std::result::Result<T, GatorError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
