//! Layered error definitions
//!
//! Categorized by source: stream / validation / buffer / runtime / source /
//! lifecycle / config.

use thiserror::Error;

use crate::SampleType;

/// Unified error type shared by all pipeline crates
#[derive(Debug, Error)]
pub enum PipelineError {
    // ===== Stream Errors =====
    /// Typed accessor used against a stream of a different element kind
    #[error("sample type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: SampleType,
        actual: SampleType,
    },

    /// Incompatible stream geometry (num/dim/rate)
    #[error("stream shape mismatch: {message}")]
    ShapeMismatch { message: String },

    /// Operation not available for this element kind
    #[error("sample type {kind} does not support {operation}")]
    UnsupportedKind {
        kind: SampleType,
        operation: &'static str,
    },

    // ===== Validation Errors =====
    /// Bad shape or option detected while a component enters the graph;
    /// disables that single component
    #[error("validation error in '{component}': {message}")]
    Validation { component: String, message: String },

    // ===== Buffer Errors =====
    /// A reader fell behind the writer and buffered samples were overwritten
    #[error("overrun on provider '{provider}': reader {reader} lost {lost} samples")]
    Overrun {
        provider: String,
        reader: usize,
        lost: u64,
    },

    /// The provider was closed while a reader was waiting; end-of-stream
    #[error("provider '{provider}' closed")]
    Closed { provider: String },

    // ===== Runtime Errors =====
    /// Recoverable failure inside one processing cycle; the cycle is skipped
    #[error("transform error in '{component}': {message}")]
    RuntimeTransform { component: String, message: String },

    /// Explicit fatal signal from a component; the component stops
    #[error("fatal abort in '{component}': {message}")]
    FatalAbort { component: String, message: String },

    // ===== Source Errors =====
    /// Acquisition failure reported by a signal source
    #[error("source '{source_name}' error: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    // ===== Lifecycle Errors =====
    /// API misuse, e.g. mutating a running graph or restarting a stopped
    /// pipeline; rejected immediately with no partial effect
    #[error("lifecycle error: {message}")]
    Lifecycle { message: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create a validation error for a named component
    pub fn validation(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a recoverable per-cycle transform error
    pub fn runtime(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuntimeTransform {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a fatal abort request
    pub fn fatal(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FatalAbort {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a source acquisition error
    pub fn source_error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source.into(),
            message: message.into(),
        }
    }

    /// Create a lifecycle misuse error
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle {
            message: message.into(),
        }
    }

    /// Create a configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error must stop the owning component instead of merely
    /// skipping the current cycle
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalAbort { .. })
    }
}
