//! Embedded backend: a [`GraphStore`] persisted under a local directory.
//!
//! Layout of the store directory:
//!
//! ```text
//! <store>/depmap.lock   advisory lock file, holds the last owner's pid
//! <store>/graph.bin     bincode snapshot, written on shutdown
//! ```
//!
//! The lock is an OS file lock on `depmap.lock`, so it dies with its
//! process. A lock file left behind by a crash is simply taken over.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::cypher::{self, ApplyStats, BoundStatement};
use super::store::GraphStore;
use super::{GraphAccessor, SessionState};
use crate::error::{DepmapError, Result};
use crate::graph::Statement;

pub const LOCK_FILE: &str = "depmap.lock";
pub const SNAPSHOT_FILE: &str = "graph.bin";

/// Exclusive ownership of a store directory.
///
/// Held as an OS lock on the open lock file; closing the file (drop, or
/// the process exiting) releases it. The file itself stays in place.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Lock `dir/depmap.lock`, creating it if needed.
    ///
    /// Fails with [`DepmapError::StoreLocked`] while another handle, in this
    /// process or any other, holds the lock.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(DepmapError::StoreLocked(dir.to_path_buf()));
            }
            Err(TryLockError::Error(e)) => return Err(e.into()),
        }

        // Informational only; the OS lock is what excludes other owners.
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        debug!(path = %path.display(), "store lock acquired");
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}

/// [`GraphAccessor`] over a store directory on the local disk.
///
/// `startup` takes the directory lock and loads the snapshot; `shutdown`
/// writes it back. Every batch is all-or-nothing.
pub struct EmbeddedAccessor {
    path: PathBuf,
    state: SessionState,
    store: GraphStore,
    lock: Option<StoreLock>,
    auto_shutdown: bool,
}

impl EmbeddedAccessor {
    /// An accessor for the store directory `path`. Nothing is touched
    /// until [`GraphAccessor::startup`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: SessionState::Uninitialized,
            store: GraphStore::new(),
            lock: None,
            auto_shutdown: false,
        }
    }

    /// The store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory store. Meaningful while `Ready`.
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    fn snapshot_path(&self) -> PathBuf {
        self.path.join(SNAPSHOT_FILE)
    }

    fn apply_all(store: &mut GraphStore, statements: &[BoundStatement]) -> Result<ApplyStats> {
        let mut total = ApplyStats::default();
        for statement in statements {
            total.add(cypher::apply(store, statement)?);
        }
        Ok(total)
    }
}

impl GraphAccessor for EmbeddedAccessor {
    fn backend_name(&self) -> &'static str {
        "embedded"
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn startup(&mut self) -> Result<()> {
        if self.state != SessionState::Uninitialized {
            return Err(DepmapError::Lifecycle {
                operation: "startup",
                state: self.state.as_str(),
            });
        }
        fs::create_dir_all(&self.path)?;
        let lock = StoreLock::acquire(&self.path)?;

        let snapshot = self.snapshot_path();
        self.store = if snapshot.exists() {
            GraphStore::load(&snapshot)?
        } else {
            GraphStore::new()
        };
        self.lock = Some(lock);
        self.state = SessionState::Ready;
        info!(path = %self.path.display(), nodes = self.store.node_count(), "embedded store opened");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        match self.state {
            SessionState::Closed => return Ok(()),
            SessionState::Uninitialized => {
                self.state = SessionState::Closed;
                return Ok(());
            }
            SessionState::Ready => {}
        }
        self.state = SessionState::Closed;
        let saved = self.store.save(&self.snapshot_path());
        // Release the lock even when the snapshot could not be written.
        self.lock = None;
        saved?;
        info!(
            path = %self.path.display(),
            nodes = self.store.node_count(),
            relationships = self.store.edge_count(),
            "embedded store closed"
        );
        Ok(())
    }

    fn config_auto_shutdown(&mut self) {
        self.auto_shutdown = true;
    }

    fn execute_batch(&mut self, statements: &[Statement]) -> Result<()> {
        self.state.require_ready("execute")?;

        let bound = statements
            .iter()
            .map(|s| cypher::prepare(&s.statement, s.params()))
            .collect::<Result<Vec<_>>>()?;

        // Binding has already rejected whatever an infallible batch could
        // trip over, so only fallible ones pay for a staged copy.
        let stats = if bound.iter().any(BoundStatement::is_fallible) {
            let mut staged = self.store.clone();
            let stats = Self::apply_all(&mut staged, &bound)?;
            self.store = staged;
            stats
        } else {
            Self::apply_all(&mut self.store, &bound)?
        };
        debug!(
            statements = statements.len(),
            nodes = stats.nodes_touched,
            relationships = stats.relationships_touched,
            deleted = stats.deleted,
            "batch applied"
        );
        Ok(())
    }
}

impl Drop for EmbeddedAccessor {
    fn drop(&mut self) {
        if self.auto_shutdown && self.state == SessionState::Ready {
            if let Err(e) = self.shutdown() {
                warn!(path = %self.path.display(), error = %e, "auto-shutdown failed");
            }
        }
    }
}
