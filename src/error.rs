//! Error types for splitcast
//!
//! All modules use `SplitcastResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for splitcast operations
pub type SplitcastResult<T> = Result<T, SplitcastError>;

/// All errors that can occur in splitcast
#[derive(Error, Debug)]
pub enum SplitcastError {
    // Configuration errors
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // Remote errors
    #[error("The remote does not exist: {0}")]
    RemoteNotFound(String),

    #[error("Failed to initialize remote {alias}: {source}")]
    RemoteInit {
        alias: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to parse reference listing: {0}")]
    ReferenceParse(String),

    // Split errors
    #[error("Failed to split reference {reference}: {reason}")]
    SplitFailed { reference: String, reason: String },

    // Object store errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}: {output}")]
    CommandExecution { command: String, output: String },

    // Pool errors
    #[error("Background task panicked: {0}")]
    TaskPanic(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SplitcastError {
    /// User-facing hint for recoverable situations
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound(_) => {
                Some("Create a .splitcast.yml in the project root, or pass --config")
            }
            Self::CommandFailed { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Some("Make sure git and splitsh-lite are installed and on PATH")
            }
            _ => None,
        }
    }

    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            output: output.into(),
        }
    }

    /// Create a split failure error
    pub fn split_failed(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SplitFailed {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SplitcastError::RemoteNotFound("upstream".to_string());
        assert!(err.to_string().contains("upstream"));
    }

    #[test]
    fn command_exec_includes_output() {
        let err = SplitcastError::command_exec("git push", "rejected");
        assert!(err.to_string().contains("git push"));
        assert!(err.to_string().contains("rejected"));
    }
}
