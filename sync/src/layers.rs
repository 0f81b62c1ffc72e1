//! Per-category synchronization passes.
//!
//! Each function binds one category's key, placement and archetype policy to
//! the generic [`reconcile`] / [`rebuild`] loop:
//!
//! | Layer   | Key                | Policy                          |
//! |---------|--------------------|---------------------------------|
//! | tiles   | cell               | rebuild (load only)             |
//! | edges   | cells + kind       | rebuild every cycle             |
//! | hazards | cell + kind        | rebuild every cycle             |
//! | agents  | server id          | reconcile, eviction configurable|
//! | victims | `"x_y"` cell key   | reconcile or rebuild per policy |

use crate::config::{AgentRetention, SyncConfig, VictimPolicy};
use crate::error::RegistryError;
use crate::grid::{GridDims, GridMapper, GridPos};
use crate::prefabs::PrefabSelector;
use crate::reconcile::{clear, rebuild, reconcile, Eviction, ReconcileStats, VisualHost};
use crate::registry::EntityRegistry;
use crate::snapshot::{
    AgentSnapshot, EdgeKind, EdgeSnapshot, HazardKind, HazardSnapshot, TileSnapshot,
    VictimSnapshot,
};

/// Identity of an edge visual within one rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub a: GridPos,
    pub b: GridPos,
    pub kind: EdgeKind,
}

/// Identity of a hazard visual within one rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HazardKey {
    pub cell: GridPos,
    pub kind: HazardKind,
}

/// Synthetic victim key built from the cell, e.g. `"2_3"`.
pub fn victim_key(victim: &VictimSnapshot) -> String {
    format!("{}_{}", victim.x, victim.y)
}

/// One registry per category, all holding host handles.
#[derive(Debug)]
pub struct SceneRegistries<H> {
    pub tiles: EntityRegistry<GridPos, H>,
    pub edges: EntityRegistry<EdgeKey, H>,
    pub hazards: EntityRegistry<HazardKey, H>,
    pub agents: EntityRegistry<i32, H>,
    pub victims: EntityRegistry<String, H>,
}

impl<H> Default for SceneRegistries<H> {
    fn default() -> Self {
        Self {
            tiles: EntityRegistry::default(),
            edges: EntityRegistry::default(),
            hazards: EntityRegistry::default(),
            agents: EntityRegistry::default(),
            victims: EntityRegistry::default(),
        }
    }
}

impl<H> SceneRegistries<H> {
    /// Destroy every visual of every category.
    pub fn clear_all<V>(&mut self, host: &mut V) -> usize
    where
        V: VisualHost<Handle = H>,
    {
        clear(host, &mut self.tiles)
            + clear(host, &mut self.edges)
            + clear(host, &mut self.hazards)
            + clear(host, &mut self.agents)
            + clear(host, &mut self.victims)
    }

    /// Total live visuals across categories.
    pub fn len(&self) -> usize {
        self.tiles.len()
            + self.edges.len()
            + self.hazards.len()
            + self.agents.len()
            + self.victims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// PASSES
// ============================================================================

/// Rebuild the floor. Tiles get no placement offset.
pub fn sync_tiles<V: VisualHost>(
    host: &mut V,
    registry: &mut EntityRegistry<GridPos, V::Handle>,
    config: &SyncConfig,
    dims: GridDims,
    tiles: &[TileSnapshot],
) -> Result<ReconcileStats, RegistryError> {
    let mapper = GridMapper::new(&config.grid, dims);
    let selector = PrefabSelector::new(&config.prefabs);
    rebuild(
        host,
        registry,
        tiles,
        |tile| tile.pos(),
        |tile| mapper.place(tile.pos()),
        |tile, _| selector.select_floor(tile.kind),
    )
}

/// Rebuild walls and doors.
///
/// Placement is the midpoint of the two mirrored cells plus the kind's lift.
/// Degenerate edges and unset orientation slots produce nothing.
pub fn sync_edges<V: VisualHost>(
    host: &mut V,
    registry: &mut EntityRegistry<EdgeKey, V::Handle>,
    config: &SyncConfig,
    dims: GridDims,
    edges: &[EdgeSnapshot],
) -> Result<ReconcileStats, RegistryError> {
    let mapper = GridMapper::new(&config.grid, dims);
    let selector = PrefabSelector::new(&config.prefabs);
    let stats = rebuild(
        host,
        registry,
        edges,
        |edge| EdgeKey {
            a: edge.a(),
            b: edge.b(),
            kind: edge.kind,
        },
        |edge| mapper.place_edge(edge.a(), edge.b()) + config.offsets.edge(edge.kind),
        |edge, _| {
            let orientation = edge.orientation()?;
            selector.select_edge(edge.kind, orientation)
        },
    )?;
    if stats.skipped > 0 {
        tracing::debug!("Edges: {} without a visual", stats.skipped);
    }
    Ok(stats)
}

/// Rebuild fire and smoke.
pub fn sync_hazards<V: VisualHost>(
    host: &mut V,
    registry: &mut EntityRegistry<HazardKey, V::Handle>,
    config: &SyncConfig,
    dims: GridDims,
    hazards: &[HazardSnapshot],
) -> Result<ReconcileStats, RegistryError> {
    let mapper = GridMapper::new(&config.grid, dims);
    let selector = PrefabSelector::new(&config.prefabs);
    rebuild(
        host,
        registry,
        hazards,
        |hazard| HazardKey {
            cell: hazard.pos(),
            kind: hazard.kind,
        },
        |hazard| mapper.place(hazard.pos()) + config.offsets.hazard(hazard.kind),
        |hazard, _| selector.select_hazard(hazard.kind),
    )
}

/// Move known agents, create new ones, and evict absent ones unless the
/// configuration keeps them.
pub fn sync_agents<V: VisualHost>(
    host: &mut V,
    registry: &mut EntityRegistry<i32, V::Handle>,
    config: &SyncConfig,
    dims: GridDims,
    agents: &[AgentSnapshot],
) -> Result<ReconcileStats, RegistryError> {
    let mapper = GridMapper::new(&config.grid, dims);
    let selector = PrefabSelector::new(&config.prefabs);
    let eviction = match config.agent_retention {
        AgentRetention::EvictMissing => Eviction::RemoveMissing,
        AgentRetention::KeepAll => Eviction::Keep,
    };
    reconcile(
        host,
        registry,
        agents,
        eviction,
        |agent| agent.id,
        |agent| mapper.place(agent.pos()) + config.offsets.actor(),
        |_, id| selector.select_agent(*id),
    )
}

/// Synchronize victims according to [`VictimPolicy`].
pub fn sync_victims<V: VisualHost>(
    host: &mut V,
    registry: &mut EntityRegistry<String, V::Handle>,
    config: &SyncConfig,
    dims: GridDims,
    victims: &[VictimSnapshot],
) -> Result<ReconcileStats, RegistryError> {
    let mapper = GridMapper::new(&config.grid, dims);
    let selector = PrefabSelector::new(&config.prefabs);
    let pos_of = |victim: &VictimSnapshot| mapper.place(victim.pos()) + config.offsets.actor();
    let select = |_: &VictimSnapshot, key: &String| selector.select_victim(key);

    match config.victim_policy {
        VictimPolicy::TrackByPosition => reconcile(
            host,
            registry,
            victims,
            Eviction::RemoveMissing,
            victim_key,
            pos_of,
            select,
        ),
        VictimPolicy::FullReplace => rebuild(host, registry, victims, victim_key, pos_of, select),
    }
}
