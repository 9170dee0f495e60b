//! Error types for depmap.
//!
//! Every failure carries an [`ErrorClass`] so callers can tell a recoverable
//! fault (a single bad node, a single bad rule) from one that must abort the
//! generation run.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::ast::AstKind;

/// Broad classification of a [`DepmapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unexpected structure in a single AST node.
    Visitor,
    /// A malformed allow/block rule.
    FilterConfig,
    /// A pre-execution statement failed.
    PreExecution,
    /// The graph backend rejected a statement or could not be reached.
    Backend,
    /// An accessor was used outside its `Ready` state.
    Lifecycle,
    /// Configuration could not be loaded or is inconsistent.
    Config,
    /// Local I/O, serialization, or source parsing.
    Io,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Visitor => "visitor",
            ErrorClass::FilterConfig => "filter_config",
            ErrorClass::PreExecution => "pre_execution",
            ErrorClass::Backend => "backend",
            ErrorClass::Lifecycle => "lifecycle",
            ErrorClass::Config => "config",
            ErrorClass::Io => "io",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DepmapError {
    #[error("visitor for {kind} failed: {message}")]
    Visitor { kind: AstKind, message: String },

    #[error("invalid rule \"{rule}\": {source}")]
    InvalidRule {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("pre-execution statement \"{statement}\" failed: {source}")]
    PreExecution {
        statement: String,
        #[source]
        source: Box<DepmapError>,
    },

    #[error("error.response: {status} {detail}")]
    Backend { status: u16, detail: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unsupported statement \"{statement}\": {reason}")]
    UnsupportedStatement { statement: String, reason: String },

    #[error("missing statement parameter ${0}")]
    MissingParameter(String),

    #[error("cannot {operation} while accessor is {state}")]
    Lifecycle {
        operation: &'static str,
        state: &'static str,
    },

    #[error("graph store is locked: {0}")]
    StoreLocked(PathBuf),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),
}

impl DepmapError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DepmapError::Visitor { .. } => ErrorClass::Visitor,
            DepmapError::InvalidRule { .. } => ErrorClass::FilterConfig,
            DepmapError::PreExecution { .. } => ErrorClass::PreExecution,
            DepmapError::Backend { .. }
            | DepmapError::Transport(_)
            | DepmapError::UnsupportedStatement { .. }
            | DepmapError::MissingParameter(_) => ErrorClass::Backend,
            DepmapError::Lifecycle { .. } | DepmapError::StoreLocked(_) => ErrorClass::Lifecycle,
            DepmapError::Config(_) | DepmapError::Toml(_) => ErrorClass::Config,
            DepmapError::Parse { .. }
            | DepmapError::Io(_)
            | DepmapError::Json(_)
            | DepmapError::Snapshot(_) => ErrorClass::Io,
        }
    }

    /// Whether this error must stop the current generation run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.class(),
            ErrorClass::Visitor | ErrorClass::FilterConfig
        )
    }

    pub fn visitor(kind: AstKind, message: impl Into<String>) -> Self {
        DepmapError::Visitor {
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported(statement: &str, reason: impl Into<String>) -> Self {
        DepmapError::UnsupportedStatement {
            statement: statement.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DepmapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display_carries_status() {
        let err = DepmapError::Backend {
            status: 500,
            detail: "Internal Server Error".to_string(),
        };
        assert_eq!(err.to_string(), "error.response: 500 Internal Server Error");
        assert_eq!(err.class(), ErrorClass::Backend);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_recoverable_classes() {
        let err = DepmapError::visitor(AstKind::MethodInvocation, "no name");
        assert_eq!(err.class(), ErrorClass::Visitor);
        assert!(!err.is_fatal());

        let bad = regex::Regex::new("(").unwrap_err();
        let err = DepmapError::InvalidRule {
            rule: "(".to_string(),
            source: bad,
        };
        assert_eq!(err.class(), ErrorClass::FilterConfig);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_lifecycle_errors_are_fatal() {
        let err = DepmapError::Lifecycle {
            operation: "execute",
            state: "closed",
        };
        assert_eq!(err.to_string(), "cannot execute while accessor is closed");
        assert!(err.is_fatal());

        let err = DepmapError::StoreLocked(PathBuf::from("/tmp/graph.db"));
        assert_eq!(err.class(), ErrorClass::Lifecycle);
    }

    #[test]
    fn test_pre_execution_wraps_source() {
        use std::error::Error;

        let err = DepmapError::PreExecution {
            statement: "MATCH (n) DETACH DELETE n".to_string(),
            source: Box::new(DepmapError::Backend {
                status: 503,
                detail: "Service Unavailable".to_string(),
            }),
        };
        assert_eq!(err.class(), ErrorClass::PreExecution);
        assert!(err.source().unwrap().to_string().contains("503"));
    }
}
