//! Error handling for sentiflow
//!
//! This module defines the crate-level error type and a Result alias used by
//! configuration loading, record loading and the scripting layer. Errors
//! raised by the running pipeline live in [`crate::pipeline::error`].

use thiserror::Error;

/// Main error type for sentiflow operations
#[derive(Error, Debug)]
pub enum SentiflowError {
    /// Errors related to Rhai filter scripts
    #[error("Script error: {0}")]
    Script(String),

    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to loading source records
    #[error("Record error at line {line}: {message}")]
    Record { line: usize, message: String },

    /// Errors reported by a sentiment model
    #[error("Classification error: {0}")]
    Classification(String),

    /// Errors raised by the running pipeline
    #[error(transparent)]
    Pipeline(#[from] crate::pipeline::PipelineError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SentiflowError>,
    },
}

impl SentiflowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SentiflowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        SentiflowError::Script(err.to_string())
    }
}

/// Result type alias for sentiflow operations
pub type Result<T> = std::result::Result<T, SentiflowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SentiflowError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SentiflowError::from_rhai_error(e).with_context(f()))
    }
}
