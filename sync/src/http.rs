//! Blocking HTTP snapshot source (feature `http`).
//!
//! POSTs `{"seed": n}` to the floor endpoint and `{}` to the step endpoint,
//! returning the raw response bodies for the synchronizer to decode.

use crate::config::ServerConfig;
use crate::driver::SnapshotSource;
use crate::error::{SyncError, SyncResult};
use ureq::Agent;

/// [`SnapshotSource`] backed by the simulation server.
pub struct HttpSnapshotSource {
    agent: Agent,
    floor_url: String,
    step_url: String,
}

impl HttpSnapshotSource {
    pub fn new(server: &ServerConfig) -> Self {
        Self {
            agent: Agent::new(),
            floor_url: server.floor_url.clone(),
            step_url: server.step_url.clone(),
        }
    }

    fn post_json(&self, url: &str, body: &str) -> SyncResult<String> {
        let response = self
            .agent
            .post(url)
            .set("Content-Type", "application/json")
            .send_string(body)
            .map_err(|e| SyncError::Transport(format!("POST {url}: {e}")))?;
        response
            .into_string()
            .map_err(|e| SyncError::Transport(format!("POST {url}: reading body: {e}")))
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn load_world(&mut self, seed: i64) -> SyncResult<String> {
        tracing::info!("Requesting floor from {} (seed {})", self.floor_url, seed);
        let body = serde_json::json!({ "seed": seed }).to_string();
        self.post_json(&self.floor_url, &body)
    }

    fn advance_step(&mut self) -> SyncResult<String> {
        self.post_json(&self.step_url, "{}")
    }
}
