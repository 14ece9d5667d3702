//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid command-line argument
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// Some integrations rejected an event
    #[error("{failed} of {total} dispatches had failing integrations")]
    DispatchFailed { failed: usize, total: usize },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            CliError::config_not_found("a.toml").to_string(),
            "Configuration file not found: a.toml"
        );
        assert_eq!(
            CliError::invalid_argument("dev-eui", "bad length").to_string(),
            "Invalid argument 'dev-eui': bad length"
        );
        assert_eq!(
            CliError::DispatchFailed { failed: 1, total: 2 }.to_string(),
            "1 of 2 dispatches had failing integrations"
        );
    }
}
