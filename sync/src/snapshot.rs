//! Snapshot wire types and the decode boundary.
//!
//! The server answers `/floor` and `/step` with the same JSON shape; a load
//! carries the tile list, a step does not. Decoding and validation happen here,
//! before any registry is touched, so a bad body never produces a partial
//! scene update.

use crate::error::DecodeError;
use crate::grid::{GridDims, GridPos};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// SEMANTIC KINDS
// ============================================================================

/// Floor tile kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Inside,
    Outside,
    Kitchen,
    Garage,
    Safe,
    Spawn,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Wall or door kind of an edge between two cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Wall,
    /// `"door"` is the legacy spelling of a closed door.
    #[serde(alias = "door")]
    DoorClosed,
    DoorOpen,
    #[serde(other)]
    Unknown,
}

impl EdgeKind {
    /// Doors share placement offsets regardless of state.
    pub fn is_door(self) -> bool {
        matches!(self, EdgeKind::DoorClosed | EdgeKind::DoorOpen)
    }
}

/// Orientation of an edge, derived from its two cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeOrientation {
    /// The cells differ along x.
    Vertical,
    /// The cells differ along y only.
    Horizontal,
}

/// Hazard kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    Fire,
    Smoke,
    #[serde(other)]
    Unknown,
}

// ============================================================================
// PER-CATEGORY SNAPSHOTS
// ============================================================================

/// One floor tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSnapshot {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type", default)]
    pub kind: TileKind,
}

impl TileSnapshot {
    pub fn new(x: i32, y: i32, kind: TileKind) -> Self {
        Self { x, y, kind }
    }

    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

/// A wall or door between cells `a` and `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub ax: i32,
    pub ay: i32,
    pub bx: i32,
    pub by: i32,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

impl EdgeSnapshot {
    pub fn new(a: GridPos, b: GridPos, kind: EdgeKind) -> Self {
        Self {
            ax: a.x,
            ay: a.y,
            bx: b.x,
            by: b.y,
            kind,
        }
    }

    pub fn a(&self) -> GridPos {
        GridPos::new(self.ax, self.ay)
    }

    pub fn b(&self) -> GridPos {
        GridPos::new(self.bx, self.by)
    }

    /// Vertical when x differs, horizontal when only y differs.
    ///
    /// Returns `None` for a degenerate edge whose cells coincide.
    pub fn orientation(&self) -> Option<EdgeOrientation> {
        if self.ax != self.bx {
            Some(EdgeOrientation::Vertical)
        } else if self.ay != self.by {
            Some(EdgeOrientation::Horizontal)
        } else {
            None
        }
    }
}

/// Fire or smoke on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardSnapshot {
    pub x: i32,
    pub y: i32,
    pub kind: HazardKind,
}

impl HazardSnapshot {
    pub fn new(x: i32, y: i32, kind: HazardKind) -> Self {
        Self { x, y, kind }
    }

    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

/// A firefighter agent with a stable server-side id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: i32,
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl AgentSnapshot {
    pub fn new(id: i32, x: i32, y: i32) -> Self {
        Self { id, x, y, role: None }
    }

    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

/// A victim. The server gives no identity, only a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictimSnapshot {
    pub x: i32,
    pub y: i32,
}

impl VictimSnapshot {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

// ============================================================================
// EPISODE BOOKKEEPING
// ============================================================================

/// Counters reported per episode and accumulated over the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeStats {
    pub victims_rescued: i32,
    pub victims_picked: i32,
    pub fires_extinguished: i32,
    pub smokes_extinguished: i32,
    pub doors_opened: i32,
    pub action_points: i32,
}

impl fmt::Display for EpisodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VR={} VP={} F={} S={} D={} AP={}",
            self.victims_rescued,
            self.victims_picked,
            self.fires_extinguished,
            self.smokes_extinguished,
            self.doors_opened,
            self.action_points
        )
    }
}

/// Multi-episode progress carried by every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeInfo {
    pub episode: i32,
    pub max_episodes: i32,
    pub wins: i32,
    pub losses: i32,
    pub others: i32,
    pub current_seed: i64,
    pub episode_finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_stats: Option<EpisodeStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_stats: Option<EpisodeStats>,
}

// ============================================================================
// WORLD SNAPSHOT
// ============================================================================

/// Which endpoint produced a snapshot; decides the required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// `/floor`: full world, tiles required.
    Load,
    /// `/step`: incremental update, hazards required.
    Step,
}

/// Complete server response for one load or step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub width: i32,
    pub height: i32,
    /// Present only on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<TileSnapshot>>,
    #[serde(default)]
    pub edges: Vec<EdgeSnapshot>,
    /// Always sent by `/step`; an absent list marks a truncated body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazards: Option<Vec<HazardSnapshot>>,
    #[serde(default)]
    pub agents: Vec<AgentSnapshot>,
    #[serde(default)]
    pub victims: Vec<VictimSnapshot>,
    /// The current episode ended.
    #[serde(default)]
    pub game_over: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Every episode has been played; no further steps will be served.
    #[serde(default)]
    pub simulation_done: bool,
    #[serde(flatten)]
    pub episode: EpisodeInfo,
}

impl WorldSnapshot {
    /// Empty snapshot of the given dimensions.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn dims(&self) -> GridDims {
        GridDims::new(self.width, self.height)
    }

    /// Terminal condition for the whole run.
    pub fn is_terminal(&self) -> bool {
        self.simulation_done
    }

    pub fn tiles(&self) -> &[TileSnapshot] {
        self.tiles.as_deref().unwrap_or(&[])
    }

    pub fn hazards(&self) -> &[HazardSnapshot] {
        self.hazards.as_deref().unwrap_or(&[])
    }

    /// Decode and validate a `/floor` body.
    pub fn from_load_json(json: &str) -> Result<Self, DecodeError> {
        Self::decode(json, SnapshotKind::Load)
    }

    /// Decode and validate a `/step` body.
    pub fn from_step_json(json: &str) -> Result<Self, DecodeError> {
        Self::decode(json, SnapshotKind::Step)
    }

    /// Decode a body and validate it as `kind`.
    pub fn decode(json: &str, kind: SnapshotKind) -> Result<Self, DecodeError> {
        let snapshot: WorldSnapshot = serde_json::from_str(json)?;
        snapshot.validate(kind)?;
        Ok(snapshot)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Check required fields and cell bounds.
    ///
    /// Tiles and edges are checked against this snapshot's own dimensions,
    /// as are hazards, agents and victims, since every body carries its size.
    pub fn validate(&self, kind: SnapshotKind) -> Result<(), DecodeError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(DecodeError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        match kind {
            SnapshotKind::Load if self.tiles.is_none() => {
                return Err(DecodeError::MissingField("tiles"));
            }
            SnapshotKind::Step if self.hazards.is_none() => {
                return Err(DecodeError::MissingField("hazards"));
            }
            _ => {}
        }

        let dims = self.dims();
        let check = |category: &'static str, pos: GridPos| -> Result<(), DecodeError> {
            if dims.contains(pos) {
                Ok(())
            } else {
                Err(DecodeError::OutOfBounds {
                    category,
                    x: pos.x,
                    y: pos.y,
                    width: dims.width,
                    height: dims.height,
                })
            }
        };

        if kind == SnapshotKind::Load {
            for tile in self.tiles() {
                check("tile", tile.pos())?;
            }
        }
        for edge in &self.edges {
            check("edge", edge.a())?;
            check("edge", edge.b())?;
        }
        for hazard in self.hazards() {
            check("hazard", hazard.pos())?;
        }
        for agent in &self.agents {
            check("agent", agent.pos())?;
        }
        for victim in &self.victims {
            check("victim", victim.pos())?;
        }
        Ok(())
    }
}
