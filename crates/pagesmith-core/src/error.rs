//! Unified error types for Pagesmith
//!
//! Every failure carries an explicit [`ErrorKind`] tag. Retry predicates in the
//! resilient call executor look only at that tag, never at message text.

use thiserror::Error;

/// Unified error type for all Pagesmith operations
#[derive(Error, Debug)]
pub enum PagesmithError {
    // Intake errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // Network errors
    #[error("Transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    #[error("HTTP {status} from {operation}: {body}")]
    Http {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // Hosting provider signals
    #[error("Repository name already taken: {0}")]
    NameConflict(String),

    #[error("Hosting already configured for {0}")]
    AlreadyConfigured(String),

    #[error("Primary branch not yet available: {0}")]
    BranchNotFound(String),

    // Content errors
    #[error("Content contract violation: {0}")]
    ContentContract(String),

    #[error("Path validation failed: {0}")]
    PathValidation(String),

    #[error("Invalid attachment: {0}")]
    Attachment(String),

    // Git errors
    #[error("Git command failed: {0}")]
    GitCommand(String),

    // Exhaustion errors
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<PagesmithError>,
    },

    #[error("Code generation failed after {attempts} attempts: {last}")]
    GenerationFailed {
        attempts: u32,
        #[source]
        last: Box<PagesmithError>,
    },

    #[error("Hosting activation failed after {attempts} attempts: {last}")]
    ActivationExhausted {
        attempts: u32,
        #[source]
        last: Box<PagesmithError>,
    },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Explicit classification tag for a [`PagesmithError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    Validation,
    Configuration,
    Transport,
    HttpStatus,
    MalformedResponse,
    NameConflict,
    AlreadyConfigured,
    BranchNotFound,
    ContentContract,
    Git,
    Exhausted,
    Io,
    Other,
}

impl PagesmithError {
    /// Classification tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Authorization,
            Self::InvalidTask(_) | Self::PathValidation(_) | Self::Attachment(_) => {
                ErrorKind::Validation
            }
            Self::Config(_) => ErrorKind::Configuration,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Http { .. } => ErrorKind::HttpStatus,
            Self::MalformedResponse(_) | Self::Serialization(_) => ErrorKind::MalformedResponse,
            Self::NameConflict(_) => ErrorKind::NameConflict,
            Self::AlreadyConfigured(_) => ErrorKind::AlreadyConfigured,
            Self::BranchNotFound(_) => ErrorKind::BranchNotFound,
            Self::ContentContract(_) => ErrorKind::ContentContract,
            Self::GitCommand(_) => ErrorKind::Git,
            Self::RetriesExhausted { .. }
            | Self::GenerationFailed { .. }
            | Self::ActivationExhausted { .. } => ErrorKind::Exhausted,
            Self::Io(_) => ErrorKind::Io,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// The failure that ended a retry budget, if this is an exhaustion error
    pub fn last_failure(&self) -> Option<&PagesmithError> {
        match self {
            Self::RetriesExhausted { last, .. }
            | Self::GenerationFailed { last, .. }
            | Self::ActivationExhausted { last, .. } => Some(last),
            _ => None,
        }
    }

    /// Build a transport error for the named operation
    pub fn transport(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Build an HTTP status error for the named operation
    pub fn http(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }
}

/// Result type alias using PagesmithError
pub type Result<T> = std::result::Result<T, PagesmithError>;
