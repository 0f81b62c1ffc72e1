//! Poll driver.
//!
//! [`StepDriver`] pulls JSON bodies from a [`SnapshotSource`] and feeds them
//! to a [`WorldSynchronizer`]: one load, then one step per trigger until the
//! simulation reports it is done. Once finished the source is never asked
//! for another step.

use crate::error::{SyncError, SyncResult};
use crate::reconcile::VisualHost;
use crate::sync::{SyncReport, WorldSynchronizer};
use std::collections::VecDeque;

/// Where snapshot bodies come from.
pub trait SnapshotSource {
    /// Start a run and return the full world body.
    fn load_world(&mut self, seed: i64) -> SyncResult<String>;

    /// Advance the simulation one step and return the step body.
    fn advance_step(&mut self) -> SyncResult<String>;
}

/// Drives a synchronizer from a snapshot source.
pub struct StepDriver<S: SnapshotSource, V: VisualHost> {
    source: S,
    sync: WorldSynchronizer<V>,
    steps: u64,
}

impl<S: SnapshotSource, V: VisualHost> StepDriver<S, V> {
    pub fn new(source: S, sync: WorldSynchronizer<V>) -> Self {
        Self {
            source,
            sync,
            steps: 0,
        }
    }

    /// Request a new run and build the world from it.
    ///
    /// Once finished, returns `Finished` without contacting the source.
    pub fn load(&mut self, seed: i64) -> SyncResult<SyncReport> {
        if self.sync.is_finished() {
            return Err(SyncError::Finished);
        }
        let body = self.source.load_world(seed).map_err(log_transport)?;
        self.sync.on_world_loaded(&body)
    }

    /// Request and apply one step.
    ///
    /// Returns `Ok(None)` without touching the source once finished.
    pub fn step(&mut self) -> SyncResult<Option<SyncReport>> {
        if self.sync.is_finished() {
            return Ok(None);
        }
        if !self.sync.is_loaded() {
            return Err(SyncError::NotLoaded);
        }
        let body = self.source.advance_step().map_err(log_transport)?;
        let report = self.sync.on_step_applied(&body)?;
        self.steps += 1;
        Ok(Some(report))
    }

    /// Step until finished or `max_steps` steps were applied.
    ///
    /// Returns the number of steps applied by this call.
    pub fn run_to_completion(&mut self, max_steps: u64) -> SyncResult<u64> {
        let mut applied = 0;
        while applied < max_steps {
            match self.step()? {
                Some(_) => applied += 1,
                None => break,
            }
        }
        Ok(applied)
    }

    pub fn is_finished(&self) -> bool {
        self.sync.is_finished()
    }

    /// Steps applied over the driver's lifetime.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn synchronizer(&self) -> &WorldSynchronizer<V> {
        &self.sync
    }

    pub fn synchronizer_mut(&mut self) -> &mut WorldSynchronizer<V> {
        &mut self.sync
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_parts(self) -> (S, WorldSynchronizer<V>) {
        (self.source, self.sync)
    }
}

fn log_transport(err: SyncError) -> SyncError {
    if let SyncError::Transport(msg) = &err {
        tracing::warn!("Snapshot request failed: {}", msg);
    }
    err
}

// ============================================================================
// REPLAY SOURCE
// ============================================================================

/// In-memory source replaying recorded bodies in order.
///
/// Counts requests so callers can check the driver stopped asking.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    floor: String,
    steps: VecDeque<String>,
    /// Seeds passed to `load_world`, in order.
    pub seeds: Vec<i64>,
    /// Number of `advance_step` calls, including failed ones.
    pub step_requests: usize,
}

impl ReplaySource {
    pub fn new(floor: impl Into<String>, steps: impl IntoIterator<Item = String>) -> Self {
        Self {
            floor: floor.into(),
            steps: steps.into_iter().collect(),
            seeds: Vec::new(),
            step_requests: 0,
        }
    }

    /// Queue another step body.
    pub fn push_step(&mut self, body: impl Into<String>) {
        self.steps.push_back(body.into());
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl SnapshotSource for ReplaySource {
    fn load_world(&mut self, seed: i64) -> SyncResult<String> {
        self.seeds.push(seed);
        Ok(self.floor.clone())
    }

    fn advance_step(&mut self) -> SyncResult<String> {
        self.step_requests += 1;
        self.steps
            .pop_front()
            .ok_or_else(|| SyncError::Transport("replay exhausted".to_string()))
    }
}
