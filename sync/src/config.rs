//! Synchronizer configuration.
//!
//! Everything a scene needs to tune lives in [`SyncConfig`]: grid layout,
//! per-layer placement offsets, archetype slots, tracking policies and the
//! server endpoints. It can be built in code or read from a TOML file; any
//! field left out of the file keeps its default.

use crate::error::{SyncError, SyncResult};
use crate::grid::{GridConfig, WorldPos};
use crate::prefabs::PrefabTable;
use crate::snapshot::{EdgeKind, HazardKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How victims, which carry no identity, are tracked between snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictimPolicy {
    /// Key victims by cell; a stationary victim keeps its visual and skin.
    #[default]
    TrackByPosition,
    /// Destroy and recreate every victim visual each cycle.
    FullReplace,
}

/// What a step does with agents missing from its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRetention {
    /// Destroy them, so live agents always match the latest snapshot.
    #[default]
    EvictMissing,
    /// Keep them until the next full world load.
    KeepAll,
}

/// Extra placement applied after grid mapping, per layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerOffsets {
    /// Visual height of a wall; walls are lifted by half of it.
    pub wall_height: f32,
    pub wall_offset: WorldPos,
    /// Visual height of a door; doors are lifted by half of it.
    pub door_height: f32,
    pub door_offset: WorldPos,
    pub fire_offset: WorldPos,
    pub smoke_offset: WorldPos,
    /// Lift for agents and victims so they stand on the floor.
    pub actor_lift: f32,
}

impl Default for LayerOffsets {
    fn default() -> Self {
        Self {
            wall_height: 2.0,
            wall_offset: WorldPos::default(),
            door_height: 2.0,
            door_offset: WorldPos::default(),
            fire_offset: WorldPos::new(0.0, 0.05, 0.0),
            smoke_offset: WorldPos::new(0.0, 0.05, 0.0),
            actor_lift: 0.05,
        }
    }
}

impl LayerOffsets {
    /// Offset for an edge: half its height plus the per-kind nudge.
    pub fn edge(&self, kind: EdgeKind) -> WorldPos {
        if kind.is_door() {
            self.door_offset + WorldPos::new(0.0, self.door_height * 0.5, 0.0)
        } else {
            self.wall_offset + WorldPos::new(0.0, self.wall_height * 0.5, 0.0)
        }
    }

    pub fn hazard(&self, kind: HazardKind) -> WorldPos {
        match kind {
            HazardKind::Fire => self.fire_offset,
            HazardKind::Smoke => self.smoke_offset,
            HazardKind::Unknown => WorldPos::default(),
        }
    }

    pub fn actor(&self) -> WorldPos {
        WorldPos::new(0.0, self.actor_lift, 0.0)
    }
}

/// Simulation server endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// POST `{"seed": n}` here to start a run.
    pub floor_url: String,
    /// POST `{}` here to advance one step.
    pub step_url: String,
    /// Seed sent with the initial load.
    pub seed: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            floor_url: "http://localhost:8585/floor".to_string(),
            step_url: "http://localhost:8585/step".to_string(),
            seed: 897,
        }
    }
}

/// Full synchronizer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub grid: GridConfig,
    pub offsets: LayerOffsets,
    pub prefabs: PrefabTable,
    pub victim_policy: VictimPolicy,
    pub agent_retention: AgentRetention,
    pub server: ServerConfig,
}

impl SyncConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> SyncResult<Self> {
        toml::from_str(source).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Render as TOML, e.g. to write out a starting file.
    pub fn to_toml_string(&self) -> SyncResult<String> {
        toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))
    }
}
