//! Networked backend: a graph server's transactional HTTP endpoint.
//!
//! Each batch becomes one `POST <root>/transaction/commit` with body
//! `{"statements": [{"statement": ..., "parameters": ...}, ...]}`. Only
//! `200 OK` counts as success. Response bodies are logged, never parsed.

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{GraphAccessor, SessionState};
use crate::error::{DepmapError, Result};
use crate::graph::Statement;

const COMMIT_PATH: &str = "transaction/commit";

#[derive(Serialize)]
struct CommitRequest<'a> {
    statements: &'a [Statement],
}

/// [`GraphAccessor`] that posts each batch to a server's commit endpoint.
pub struct RestAccessor {
    client: Client,
    commit_url: String,
    state: SessionState,
}

impl RestAccessor {
    /// An accessor for the server rooted at `root_url`. A trailing `/` is
    /// ignored. `timeout` bounds each request when given.
    pub fn new(root_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            commit_url: format!("{}/{COMMIT_PATH}", root_url.trim_end_matches('/')),
            state: SessionState::Uninitialized,
        })
    }

    pub fn commit_url(&self) -> &str {
        &self.commit_url
    }
}

impl GraphAccessor for RestAccessor {
    fn backend_name(&self) -> &'static str {
        "rest"
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
        self.state = SessionState::Ready;
        info!(url = %self.commit_url, "networked backend ready");
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.state = SessionState::Closed;
        Ok(())
    }

    // Nothing is held open between requests.
    fn config_auto_shutdown(&mut self) {}

    fn execute_batch(&mut self, statements: &[Statement]) -> Result<()> {
        self.state.require_ready("execute")?;
        if statements.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.commit_url)
            .header(ACCEPT, "application/json")
            .json(&CommitRequest { statements })
            .send()?;
        // The status decides the outcome; the body is only for the log.
        let status = response.status();
        let body = response.text().unwrap_or_else(|e| {
            warn!(status = status.as_u16(), error = %e, "could not read response body");
            String::new()
        });
        debug!(status = status.as_u16(), body = %body, ">>> response");

        if status != StatusCode::OK {
            return Err(DepmapError::Backend {
                status: status.as_u16(),
                detail: status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or(body),
            });
        }
        Ok(())
    }
}
