//! Scrape error handling
//!
//! Provides typed errors for every stage of a scrape run, with descriptive
//! messages and recovery suggestions. Problems with individual records are
//! never errors: they are logged as warnings and the field is left out.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while scraping highlights
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// The service rejected the login
    #[error("Failed to log in to {url}: {reason}")]
    Auth { url: String, reason: String },

    /// Credential source missing or malformed
    #[error("Invalid credentials: {0}")]
    Credentials(String),

    /// A configured URL could not be parsed
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    /// Transport failure
    #[error("Request to {url} failed during {stage}: {source}")]
    Transport {
        stage: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with an unexpected status code
    #[error("Request to {url} failed during {stage}: HTTP {status}")]
    HttpStatus {
        stage: &'static str,
        url: String,
        status: u16,
    },

    /// Markup did not have the structure the scraper depends on
    #[error("Unexpected page structure: {0}")]
    DataIntegrity(String),

    /// The pagination endpoint never signalled the end of the collection
    #[error("Pagination did not terminate after {limit} requests")]
    PaginationLimit { limit: usize },

    /// Unknown text encoding label
    #[error("Invalid encoding '{0}'")]
    InvalidEncoding(String),

    /// Output contains characters the chosen encoding cannot represent
    #[error("Output cannot be represented in encoding '{encoding}'")]
    Unencodable { encoding: String },

    /// Permission denied on the output destination
    #[error("Permission denied: cannot write to '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Output destination cannot be written
    #[error("Cannot open output filepath '{path}' for writing: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON serialization failure
    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ScrapeError {
    /// Create an error from an I/O error on the output destination
    ///
    /// Classifies the error based on its kind.
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => ScrapeError::PermissionDenied {
                path,
                source: error,
            },
            _ => ScrapeError::Output {
                path,
                source: error,
            },
        }
    }

    /// Build a network error for a failed request
    pub fn transport(stage: &'static str, url: impl Into<String>, source: reqwest::Error) -> Self {
        ScrapeError::Transport {
            stage,
            url: url.into(),
            source,
        }
    }

    /// Whether this error belongs to the network category
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ScrapeError::Transport { .. } | ScrapeError::HttpStatus { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ScrapeError::Auth { .. } => Some("Check your email and password and try again."),
            ScrapeError::Credentials(_) => Some(
                "The credentials file must be JSON of the form {\"email\": \"...\", \"password\": \"...\"}.",
            ),
            ScrapeError::PaginationLimit { .. } => {
                Some("Raise max_pages in the config file if your library is very large.")
            }
            ScrapeError::InvalidEncoding(_) => {
                Some("Use a standard label such as 'utf-8' or 'unicode-escape'.")
            }
            ScrapeError::Unencodable { .. } => {
                Some("Use 'utf-8' or 'unicode-escape' to keep every character.")
            }
            ScrapeError::PermissionDenied { .. } => {
                Some("Choose an output path in a directory you can write to.")
            }
            _ => None,
        }
    }
}

/// Result type for scrape operations
pub type ScrapeResult<T> = Result<T, ScrapeError>;
