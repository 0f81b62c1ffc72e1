//! Flashpoint Rescue Viewer - Snapshot Synchronization Core
//!
//! Keeps a 3D scene in step with a remote fire-rescue simulation. The server
//! owns all game state and answers with JSON snapshots; this crate decodes
//! them, maps grid cells into world space, picks a visual archetype per
//! entity and reconciles the scene so each simulated entity has exactly one
//! visual.
//!
//! The engine side plugs in through [`VisualHost`]. A headless `bevy_ecs`
//! host ([`EcsScene`]) ships with the crate for tests and tooling.

pub mod config;
pub mod driver;
pub mod error;
pub mod grid;
#[cfg(feature = "http")]
pub mod http;
pub mod layers;
pub mod prefabs;
pub mod reconcile;
pub mod registry;
pub mod scene;
pub mod snapshot;
pub mod sync;

pub use config::{AgentRetention, LayerOffsets, ServerConfig, SyncConfig, VictimPolicy};
pub use driver::{ReplaySource, SnapshotSource, StepDriver};
pub use error::{DecodeError, RegistryError, SyncError, SyncResult};
pub use grid::{GridConfig, GridDims, GridMapper, GridPos, WorldPos};
#[cfg(feature = "http")]
pub use http::HttpSnapshotSource;
pub use prefabs::{ArchetypeId, PrefabSelector, PrefabTable};
pub use reconcile::{Eviction, ReconcileStats, VisualHost};
pub use registry::EntityRegistry;
pub use scene::EcsScene;
pub use snapshot::{EpisodeInfo, EpisodeStats, SnapshotKind, WorldSnapshot};
pub use sync::{SyncPhase, SyncReport, WorldSynchronizer};
