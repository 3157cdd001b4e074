//! Error types for Purser
//!
//! Uses `thiserror` for library errors; the binary wraps these in `anyhow`
//! at the very top only.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Purser operations
pub type PurserResult<T> = Result<T, PurserError>;

/// Main error type for Purser operations
#[derive(Error, Debug)]
pub enum PurserError {
    /// Document text does not match the grammar
    #[error("{file}:{line}: {message}")]
    Syntax {
        file: String,
        line: usize,
        message: String,
    },

    /// Structurally valid document with invalid meaning (bad node nesting,
    /// missing template file, include cycle, unsupported hypervisor, ...)
    #[error("invalid document: {message}")]
    Document { message: String },

    /// A template referenced an undefined key, or rendered invalid syntax
    #[error("failed to render {context}: {message}")]
    Attribute { context: String, message: String },

    /// Malformed directive line (wrong arity, unknown keyword, bad source)
    #[error("invalid directive: {message}")]
    DirectiveConfig { message: String },

    /// A requested secret is absent from the local credential store
    #[error("secret '{name}' not found in credential store")]
    SecretLookup { name: String },

    /// Failed to resolve a build artifact fingerprint
    #[error("failed to resolve build artifact: {message}")]
    Artifact { message: String },

    /// A remote command exited non-zero or a pipe operation failed
    #[error("remote execution failed: {message}")]
    RemoteExecution { message: String },

    /// The remote channel could not be established or closed cleanly
    #[error("channel error: {message}")]
    Channel { message: String },

    /// Invalid configuration file
    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PurserError {
    /// Construct a syntax error for `file` at 1-based `line`.
    pub fn syntax(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        PurserError::Syntax {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn document(message: impl Into<String>) -> Self {
        PurserError::Document {
            message: message.into(),
        }
    }

    pub fn directive(message: impl Into<String>) -> Self {
        PurserError::DirectiveConfig {
            message: message.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        PurserError::RemoteExecution {
            message: message.into(),
        }
    }

    pub fn channel(message: impl Into<String>) -> Self {
        PurserError::Channel {
            message: message.into(),
        }
    }
}
