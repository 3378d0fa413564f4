//! Error types for logutils
//!
//! Setup-time problems (bad identifiers, bad levels, unwritable paths) are
//! returned to the caller immediately. Write failures inside a handler are
//! also expressed with this type, but the logger dispatch routes them to the
//! registry's error hook instead of returning them to the logging call site.

use crate::sinks::database::connection::DbError;
use thiserror::Error;

/// Main error type for logutils operations
#[derive(Error, Debug)]
pub enum LogUtilsError {
    /// Invalid argument supplied by the caller (identifiers, options)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigFileMissing(String),

    /// Initialization errors
    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// I/O errors (file sink, stream sink)
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// Serialization errors
    #[error("Serialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML parsing error: {source}")]
    TomlError {
        #[from]
        source: toml::de::Error,
    },

    /// Errors raised by the database connection while writing
    #[error("Database error: {source}")]
    Database {
        #[from]
        source: DbError,
    },

    /// A handler panicked while emitting a record
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),

    /// The log table does not have the columns the handler writes to
    #[error("Table '{table}' is missing columns: {}", missing.join(", "))]
    SchemaMismatch { table: String, missing: Vec<String> },
}

/// Result type alias for logutils operations
pub type Result<T> = std::result::Result<T, LogUtilsError>;

impl LogUtilsError {
    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new initialization error
    pub fn initialization<S: Into<String>>(msg: S) -> Self {
        Self::InitializationError(msg.into())
    }

    /// Check if this error is recoverable
    ///
    /// Only write-time failures are considered transient; everything else
    /// is a programming or configuration error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::IoError { .. } => true,
            Self::Database { source } => source.is_connectivity(),
            _ => false,
        }
    }

    /// Get the error category for logging purposes
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) | Self::InvalidLogLevel(_) => "invalid_argument",
            Self::ConfigError(_) | Self::ConfigFileMissing(_) | Self::TomlError { .. } => "config",
            Self::InitializationError(_) => "initialization",
            Self::IoError { .. } => "io",
            Self::SerializationError { .. } => "serialization",
            Self::HandlerPanicked(_) => "handler",
            Self::Database { .. } | Self::SchemaMismatch { .. } => "database",
        }
    }
}
