//! Error handling for KernelFlow-RS
//!
//! This module defines the crate-level error type and a Result alias.
//! Runtime errors raised inside the map live in
//! [`PipelineError`](crate::pipeline::PipelineError) and convert into
//! [`KernelFlowError::Pipeline`].

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for KernelFlow-RS operations
#[derive(Error, Debug)]
pub enum KernelFlowError {
    /// Errors raised while building or running a map
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<KernelFlowError>,
    },
}

impl KernelFlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        KernelFlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The pipeline error underneath any context layers, if there is one.
    pub fn as_pipeline(&self) -> Option<&PipelineError> {
        match self {
            KernelFlowError::Pipeline(e) => Some(e),
            KernelFlowError::WithContext { source, .. } => source.as_pipeline(),
            _ => None,
        }
    }
}

/// Result type alias for KernelFlow-RS operations
pub type Result<T> = std::result::Result<T, KernelFlowError>;

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

impl<T> ResultExt<T> for std::result::Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| KernelFlowError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| KernelFlowError::from(e).with_context(f()))
    }
}
