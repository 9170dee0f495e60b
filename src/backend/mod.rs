//! Graph accessors: where statements get executed.
//!
//! Two backends satisfy the same [`GraphAccessor`] contract:
//!
//! - [`EmbeddedAccessor`]: an in-process store on local disk, held under an
//!   exclusive lock while the accessor is `Ready`.
//! - [`RestAccessor`]: a graph server's transactional HTTP endpoint.
//!
//! Callers pick one through [`open_accessor`] and never branch on which.

pub mod cypher;
pub mod embedded;
pub mod rest;
pub mod store;

pub use embedded::EmbeddedAccessor;
pub use rest::RestAccessor;
pub use store::{GraphStore, StoreStats};

use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::config::DepmapConfig;
use crate::error::{DepmapError, Result};
use crate::graph::{Params, Statement};

/// Lifecycle of an accessor: `Uninitialized -> Ready -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        }
    }

    /// Fail with a lifecycle fault unless `Ready`.
    pub fn require_ready(&self, operation: &'static str) -> Result<()> {
        match self {
            SessionState::Ready => Ok(()),
            other => Err(DepmapError::Lifecycle {
                operation,
                state: other.as_str(),
            }),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executes graph statements against one backend.
///
/// `startup` is valid only from `Uninitialized`. `shutdown` from `Ready`
/// releases the backend; from `Closed` it does nothing. Every `execute*`
/// call outside `Ready` is a [`DepmapError::Lifecycle`] fault.
pub trait GraphAccessor: Send {
    fn backend_name(&self) -> &'static str;

    fn state(&self) -> SessionState;

    fn startup(&mut self) -> Result<()>;

    fn shutdown(&mut self) -> Result<()>;

    /// Shut down automatically when the accessor is dropped while `Ready`.
    fn config_auto_shutdown(&mut self);

    /// Execute statements as one transaction.
    fn execute_batch(&mut self, statements: &[Statement]) -> Result<()>;

    fn execute(&mut self, statement: &str) -> Result<()> {
        self.execute_batch(&[Statement::raw(statement)])
    }

    fn execute_with(&mut self, statement: &str, params: Params) -> Result<()> {
        self.execute_batch(&[Statement::with_params(statement, params)])
    }
}

/// Build the accessor the config selects. Relative store paths resolve
/// against `base`. The accessor is returned `Uninitialized`.
pub fn open_accessor(config: &DepmapConfig, base: &Path) -> Result<Box<dyn GraphAccessor>> {
    if config.use_embedded_backend {
        Ok(Box::new(EmbeddedAccessor::new(
            config.resolve_store_path(base),
        )))
    } else {
        let timeout = config.request_timeout_secs.map(Duration::from_secs);
        Ok(Box::new(RestAccessor::new(
            &config.networked_root_url,
            timeout,
        )?))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! An accessor that records what it is asked to run.

    use super::*;
    use std::sync::{Arc, Mutex};

    /// Shared log of executed batches.
    pub type BatchLog = Arc<Mutex<Vec<Vec<Statement>>>>;

    pub struct RecordingAccessor {
        state: SessionState,
        pub log: BatchLog,
        /// Fail any batch containing a statement with this text.
        pub fail_on: Option<String>,
    }

    impl RecordingAccessor {
        pub fn new() -> Self {
            Self {
                state: SessionState::Uninitialized,
                log: BatchLog::default(),
                fail_on: None,
            }
        }

        pub fn ready() -> Self {
            let mut accessor = Self::new();
            accessor.state = SessionState::Ready;
            accessor
        }

        pub fn failing_on(mut self, text: &str) -> Self {
            self.fail_on = Some(text.to_string());
            self
        }

        /// Every executed statement text, in order.
        pub fn texts(log: &BatchLog) -> Vec<String> {
            log.lock()
                .unwrap()
                .iter()
                .flatten()
                .map(|s| s.statement.clone())
                .collect()
        }
    }

    impl GraphAccessor for RecordingAccessor {
        fn backend_name(&self) -> &'static str {
            "recording"
        }

        fn state(&self) -> SessionState {
            self.state
        }

        fn startup(&mut self) -> Result<()> {
            self.state = SessionState::Ready;
            Ok(())
        }

        fn shutdown(&mut self) -> Result<()> {
            self.state = SessionState::Closed;
            Ok(())
        }

        fn config_auto_shutdown(&mut self) {}

        fn execute_batch(&mut self, statements: &[Statement]) -> Result<()> {
            self.state.require_ready("execute")?;
            if let Some(fail) = &self.fail_on {
                if statements.iter().any(|s| &s.statement == fail) {
                    return Err(DepmapError::Backend {
                        status: 500,
                        detail: "Internal Server Error".to_string(),
                    });
                }
            }
            self.log.lock().unwrap().push(statements.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_ready() {
        assert!(SessionState::Ready.require_ready("execute").is_ok());
        let err = SessionState::Uninitialized
            .require_ready("execute")
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot execute while accessor is uninitialized");
        assert!(SessionState::Closed.require_ready("execute").is_err());
    }

    #[test]
    fn test_open_accessor_selects_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DepmapConfig::default();
        let rest = open_accessor(&config, dir.path()).unwrap();
        assert_eq!(rest.backend_name(), "rest");
        assert_eq!(rest.state(), SessionState::Uninitialized);

        config.use_embedded_backend = true;
        let embedded = open_accessor(&config, dir.path()).unwrap();
        assert_eq!(embedded.backend_name(), "embedded");
    }

    #[test]
    fn test_default_execute_wraps_raw_statement() {
        let mut accessor = testing::RecordingAccessor::ready();
        let log = accessor.log.clone();
        accessor.execute("MATCH (n) DETACH DELETE n").unwrap();
        let batches = log.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].parameters, None);
    }
}
