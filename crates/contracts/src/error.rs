//! Layered error definitions
//!
//! Categorized by source: config / integration (connection, delivery, lifecycle)

use thiserror::Error;

/// Configuration and general errors
#[derive(Debug, Error)]
pub enum ContractError {
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

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by integrator operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrationError {
    /// Invalid configuration; the integration never enters service
    #[error("integration '{sink}' config error: {message}")]
    Config { sink: String, message: String },

    /// Transport could not be established
    #[error("integration '{sink}' connection error: {message}")]
    Connection { sink: String, message: String },

    /// Publish rejected or failed
    #[error("integration '{sink}' delivery error: {message}")]
    Delivery { sink: String, message: String },

    /// Transport currently down; reconnect runs in the background
    #[error("integration '{sink}' is not connected")]
    NotConnected { sink: String },

    /// Payload could not be encoded
    #[error("integration '{sink}' codec error: {message}")]
    Codec { sink: String, message: String },

    /// Caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Caller deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Operation attempted after close
    #[error("integration '{sink}' is closed")]
    Closed { sink: String },

    /// Close called twice
    #[error("integration '{sink}' already closed")]
    AlreadyClosed { sink: String },
}

impl IntegrationError {
    pub fn config(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn connection(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn delivery(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn codec(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Codec {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Fatal at startup
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Per-call failure of an outbound operation
    pub fn is_delivery(&self) -> bool {
        matches!(
            self,
            Self::Delivery { .. } | Self::NotConnected { .. } | Self::Codec { .. }
        )
    }

    /// Caller-side cancellation or deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}
