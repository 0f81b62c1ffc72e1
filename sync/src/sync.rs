//! World synchronizer.
//!
//! [`WorldSynchronizer`] owns the visual host, the five category registries
//! and the load/step/finish state machine. It is the only type the engine
//! side talks to:
//!
//! ```text
//! Uninitialized --load--> Ready --step--> Ready
//!                           |                |
//!                           +--terminal------+--> Finished
//! ```
//!
//! Every snapshot is decoded and validated before the first registry or host
//! mutation, so a rejected snapshot leaves the scene exactly as it was.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::grid::GridDims;
use crate::layers::{
    sync_agents, sync_edges, sync_hazards, sync_tiles, sync_victims, SceneRegistries,
};
use crate::reconcile::{ReconcileStats, VisualHost};
use crate::snapshot::{EpisodeInfo, SnapshotKind, WorldSnapshot};

/// Lifecycle of a synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// No world has been loaded.
    #[default]
    Uninitialized,
    /// A world is loaded and steps are accepted.
    Ready,
    /// The terminal snapshot was applied; nothing more is accepted.
    Finished,
}

/// What one accepted snapshot did to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub kind: SnapshotKind,
    /// Visuals destroyed up front by a full load.
    pub cleared: usize,
    pub tiles: ReconcileStats,
    pub edges: ReconcileStats,
    pub hazards: ReconcileStats,
    pub agents: ReconcileStats,
    pub victims: ReconcileStats,
    /// Phase after the snapshot was applied.
    pub phase: SyncPhase,
}

impl SyncReport {
    fn new(kind: SnapshotKind) -> Self {
        Self {
            kind,
            cleared: 0,
            tiles: ReconcileStats::default(),
            edges: ReconcileStats::default(),
            hazards: ReconcileStats::default(),
            agents: ReconcileStats::default(),
            victims: ReconcileStats::default(),
            phase: SyncPhase::Ready,
        }
    }

    /// Sum over all categories.
    pub fn total(&self) -> ReconcileStats {
        let mut total = self.tiles;
        total += self.edges;
        total += self.hazards;
        total += self.agents;
        total += self.victims;
        total
    }
}

/// Keeps a host scene in step with server snapshots.
pub struct WorldSynchronizer<V: VisualHost> {
    config: SyncConfig,
    host: V,
    registries: SceneRegistries<V::Handle>,
    phase: SyncPhase,
    dims: Option<GridDims>,
    episode: EpisodeInfo,
}

impl<V: VisualHost> WorldSynchronizer<V> {
    pub fn new(config: SyncConfig, host: V) -> Self {
        Self {
            config,
            host,
            registries: SceneRegistries::default(),
            phase: SyncPhase::Uninitialized,
            dims: None,
            episode: EpisodeInfo::default(),
        }
    }

    // ========================================================================
    // JSON ENTRY POINTS
    // ========================================================================

    /// Decode a `/floor` body and build the world from it.
    pub fn on_world_loaded(&mut self, json: &str) -> SyncResult<SyncReport> {
        self.ensure_accepts(SnapshotKind::Load)?;
        let snapshot = WorldSnapshot::from_load_json(json).map_err(|e| reject(e.into()))?;
        self.apply_validated(&snapshot, SnapshotKind::Load)
    }

    /// Decode a `/step` body and apply it.
    pub fn on_step_applied(&mut self, json: &str) -> SyncResult<SyncReport> {
        self.ensure_accepts(SnapshotKind::Step)?;
        let snapshot = WorldSnapshot::from_step_json(json).map_err(|e| reject(e.into()))?;
        self.apply_validated(&snapshot, SnapshotKind::Step)
    }

    // ========================================================================
    // TYPED ENTRY POINTS
    // ========================================================================

    /// Destroy everything and build the world from a full snapshot.
    ///
    /// Also valid while [`SyncPhase::Ready`], where it acts as a reload.
    pub fn build_world(&mut self, snapshot: &WorldSnapshot) -> SyncResult<SyncReport> {
        self.ensure_accepts(SnapshotKind::Load)?;
        snapshot
            .validate(SnapshotKind::Load)
            .map_err(|e| reject(e.into()))?;
        self.apply_validated(snapshot, SnapshotKind::Load)
    }

    /// Apply an incremental snapshot. Tiles are never touched.
    pub fn apply_step(&mut self, snapshot: &WorldSnapshot) -> SyncResult<SyncReport> {
        self.ensure_accepts(SnapshotKind::Step)?;
        snapshot
            .validate(SnapshotKind::Step)
            .map_err(|e| reject(e.into()))?;
        self.apply_validated(snapshot, SnapshotKind::Step)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// True once the terminal snapshot has been applied.
    pub fn is_finished(&self) -> bool {
        self.phase == SyncPhase::Finished
    }

    pub fn is_loaded(&self) -> bool {
        self.phase != SyncPhase::Uninitialized
    }

    /// Dimensions of the last applied snapshot.
    pub fn dims(&self) -> Option<GridDims> {
        self.dims
    }

    /// Episode bookkeeping from the last applied snapshot.
    pub fn episode(&self) -> &EpisodeInfo {
        &self.episode
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn registries(&self) -> &SceneRegistries<V::Handle> {
        &self.registries
    }

    pub fn host(&self) -> &V {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut V {
        &mut self.host
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn ensure_accepts(&self, kind: SnapshotKind) -> SyncResult<()> {
        match (self.phase, kind) {
            (SyncPhase::Finished, _) => Err(reject(SyncError::Finished)),
            (SyncPhase::Uninitialized, SnapshotKind::Step) => Err(reject(SyncError::NotLoaded)),
            _ if !self.host.is_attached() => Err(reject(SyncError::HostDetached)),
            _ => Ok(()),
        }
    }

    fn apply_validated(
        &mut self,
        snapshot: &WorldSnapshot,
        kind: SnapshotKind,
    ) -> SyncResult<SyncReport> {
        let dims = snapshot.dims();
        let mut report = SyncReport::new(kind);
        let registries = &mut self.registries;
        let host = &mut self.host;
        let config = &self.config;

        if kind == SnapshotKind::Load {
            if self.phase == SyncPhase::Ready {
                tracing::info!("Reloading world ({}x{})", dims.width, dims.height);
            } else {
                tracing::info!("Loading world ({}x{})", dims.width, dims.height);
            }
            report.cleared = registries.clear_all(host);
            report.tiles = sync_tiles(host, &mut registries.tiles, config, dims, snapshot.tiles())?;
        }

        report.edges = sync_edges(host, &mut registries.edges, config, dims, &snapshot.edges)?;
        report.hazards =
            sync_hazards(host, &mut registries.hazards, config, dims, snapshot.hazards())?;
        report.agents = sync_agents(host, &mut registries.agents, config, dims, &snapshot.agents)?;
        report.victims =
            sync_victims(host, &mut registries.victims, config, dims, &snapshot.victims)?;

        tracing::debug!(
            "{:?} applied: tiles={:?} edges={:?} hazards={:?} agents={:?} victims={:?}",
            kind,
            report.tiles,
            report.edges,
            report.hazards,
            report.agents,
            report.victims
        );

        self.dims = Some(dims);
        self.log_episode(snapshot);
        self.episode = snapshot.episode.clone();
        self.phase = if snapshot.is_terminal() {
            tracing::info!(
                "Simulation complete: wins={} losses={} others={}",
                snapshot.episode.wins,
                snapshot.episode.losses,
                snapshot.episode.others
            );
            if let Some(totals) = &snapshot.episode.total_stats {
                tracing::info!("Totals: {}", totals);
            }
            SyncPhase::Finished
        } else {
            SyncPhase::Ready
        };
        report.phase = self.phase;
        Ok(report)
    }

    fn log_episode(&self, snapshot: &WorldSnapshot) {
        let info = &snapshot.episode;
        if info.episode != self.episode.episode && info.episode > 0 {
            tracing::info!(
                "Episode {}/{} (seed {})",
                info.episode,
                info.max_episodes,
                info.current_seed
            );
        }
        if snapshot.game_over {
            tracing::info!(
                "Game over: {}",
                snapshot.result.as_deref().unwrap_or("unknown")
            );
        }
        if info.episode_finished {
            if let Some(stats) = &info.episode_stats {
                tracing::info!("Episode {} stats: {}", info.episode, stats);
            }
        }
    }
}

fn reject(err: SyncError) -> SyncError {
    tracing::warn!("Snapshot rejected: {}", err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VictimPolicy;
    use crate::error::DecodeError;
    use crate::grid::GridPos;
    use crate::prefabs::PrefabTable;
    use crate::scene::EcsScene;
    use crate::snapshot::{
        AgentSnapshot, EdgeKind, EdgeSnapshot, HazardKind, HazardSnapshot, TileKind,
        TileSnapshot, VictimSnapshot,
    };

    fn synchronizer() -> WorldSynchronizer<EcsScene> {
        let config = SyncConfig {
            prefabs: PrefabTable::with_standard_names(4),
            ..Default::default()
        };
        WorldSynchronizer::new(config, EcsScene::new())
    }

    /// 3x3 all-inside floor with one wall between (0,0) and (1,0).
    fn floor_3x3() -> WorldSnapshot {
        let mut snapshot = WorldSnapshot::new(3, 3);
        snapshot.tiles = Some(
            (0..3)
                .flat_map(|y| (0..3).map(move |x| TileSnapshot::new(x, y, TileKind::Inside)))
                .collect(),
        );
        snapshot.edges = vec![EdgeSnapshot::new(
            GridPos::new(0, 0),
            GridPos::new(1, 0),
            EdgeKind::Wall,
        )];
        snapshot.hazards = Some(Vec::new());
        snapshot
    }

    fn step_3x3() -> WorldSnapshot {
        let mut snapshot = WorldSnapshot::new(3, 3);
        snapshot.hazards = Some(Vec::new());
        snapshot
    }

    #[test]
    fn test_initial_load_builds_floor_and_walls() {
        let mut sync = synchronizer();
        let report = sync.build_world(&floor_3x3()).unwrap();

        assert_eq!(report.tiles.created, 9);
        assert_eq!(report.edges.created, 1);
        assert_eq!(report.phase, SyncPhase::Ready);
        assert_eq!(sync.host_mut().count_archetype("floor_inside"), 9);
        assert_eq!(sync.host_mut().count_archetype("wall_vertical"), 1);
        assert!(sync.registries().agents.is_empty());
        assert!(sync.registries().victims.is_empty());
        assert_eq!(sync.host_mut().visual_count(), 10);
    }

    #[test]
    fn test_agent_moves_in_place() {
        let mut sync = synchronizer();
        sync.build_world(&floor_3x3()).unwrap();

        let mut step = step_3x3();
        step.agents = vec![AgentSnapshot::new(1, 0, 0)];
        sync.apply_step(&step).unwrap();
        let handle = *sync.registries().agents.get(&1).unwrap();
        let before = sync.host().position_of(handle).unwrap();

        step.agents = vec![AgentSnapshot::new(1, 1, 0)];
        let report = sync.apply_step(&step).unwrap();

        assert_eq!(report.agents.created, 0);
        assert_eq!(report.agents.destroyed, 0);
        assert_eq!(report.agents.updated, 1);
        assert_eq!(sync.registries().agents.get(&1), Some(&handle));
        let after = sync.host().position_of(handle).unwrap();
        // mirror_x: grid x 0 -> 2, grid x 1 -> 1
        assert_eq!(before.x - after.x, 1.0);
        assert_eq!(sync.host().move_count(handle), Some(1));
    }

    #[test]
    fn test_victim_removed_when_absent() {
        let mut sync = synchronizer();
        sync.build_world(&floor_3x3()).unwrap();

        let mut step = step_3x3();
        step.victims = vec![VictimSnapshot::new(2, 2)];
        sync.apply_step(&step).unwrap();
        let handle = *sync.registries().victims.get(&"2_2".to_string()).unwrap();

        step.victims.clear();
        let report = sync.apply_step(&step).unwrap();

        assert_eq!(report.victims.destroyed, 1);
        assert!(sync.registries().victims.is_empty());
        assert!(!sync.host().is_alive(handle));
    }

    #[test]
    fn test_stationary_victim_keeps_handle() {
        let mut sync = synchronizer();
        sync.build_world(&floor_3x3()).unwrap();

        let mut step = step_3x3();
        step.victims = vec![VictimSnapshot::new(2, 2)];
        sync.apply_step(&step).unwrap();
        let handle = *sync.registries().victims.get(&"2_2".to_string()).unwrap();
        let skin = sync.host().archetype_of(handle).cloned();

        let report = sync.apply_step(&step).unwrap();

        assert!(!report.victims.churned());
        assert_eq!(sync.registries().victims.get(&"2_2".to_string()), Some(&handle));
        assert_eq!(sync.host().archetype_of(handle).cloned(), skin);
    }

    #[test]
    fn test_full_replace_victims_recreated_each_step() {
        let mut config = synchronizer().config().clone();
        config.victim_policy = VictimPolicy::FullReplace;
        let mut sync = WorldSynchronizer::new(config, EcsScene::new());
        sync.build_world(&floor_3x3()).unwrap();

        let mut step = step_3x3();
        step.victims = vec![VictimSnapshot::new(2, 2)];
        sync.apply_step(&step).unwrap();
        let report = sync.apply_step(&step).unwrap();

        assert_eq!(report.victims.created, 1);
        assert_eq!(report.victims.destroyed, 1);
        assert_eq!(sync.host_mut().count_prefix("victim"), 1);
    }

    #[test]
    fn test_terminal_snapshot_finishes() {
        let mut sync = synchronizer();
        sync.build_world(&floor_3x3()).unwrap();

        let mut last = step_3x3();
        last.agents = vec![AgentSnapshot::new(1, 2, 2)];
        last.game_over = true;
        last.simulation_done = true;
        let report = sync.apply_step(&last).unwrap();

        // the final snapshot is still reconciled
        assert_eq!(report.agents.created, 1);
        assert_eq!(report.phase, SyncPhase::Finished);
        assert!(sync.is_finished());

        let visuals = sync.host_mut().visual_count();
        assert_eq!(sync.apply_step(&step_3x3()).unwrap_err(), SyncError::Finished);
        assert_eq!(sync.build_world(&floor_3x3()).unwrap_err(), SyncError::Finished);
        assert_eq!(sync.host_mut().visual_count(), visuals);
    }

    #[test]
    fn test_game_over_alone_is_not_terminal() {
        let mut sync = synchronizer();
        sync.build_world(&floor_3x3()).unwrap();

        let mut step = step_3x3();
        step.game_over = true;
        step.result = Some("win".to_string());
        step.episode.episode_finished = true;
        sync.apply_step(&step).unwrap();

        assert_eq!(sync.phase(), SyncPhase::Ready);
    }

    #[test]
    fn test_step_before_load_rejected() {
        let mut sync = synchronizer();
        assert_eq!(sync.apply_step(&step_3x3()).unwrap_err(), SyncError::NotLoaded);
        assert_eq!(sync.phase(), SyncPhase::Uninitialized);
    }

    #[test]
    fn test_rejected_load_leaves_scene_untouched() {
        let mut sync = synchronizer();
        sync.build_world(&floor_3x3()).unwrap();
        let visuals = sync.host_mut().visual_count();

        let mut missing_tiles = floor_3x3();
        missing_tiles.tiles = None;
        let err = sync.build_world(&missing_tiles).unwrap_err();
        assert_eq!(err, SyncError::Decode(DecodeError::MissingField("tiles")));

        let mut out_of_bounds = step_3x3();
        out_of_bounds.agents = vec![AgentSnapshot::new(1, 3, 0)];
        let err = sync.apply_step(&out_of_bounds).unwrap_err();
        assert!(matches!(err, SyncError::Decode(DecodeError::OutOfBounds { .. })));

        assert_eq!(sync.host_mut().visual_count(), visuals);
        assert_eq!(sync.registries().tiles.len(), 9);
        assert_eq!(sync.phase(), SyncPhase::Ready);
    }

    #[test]
    fn test_same_step_twice_is_idempotent() {
        let mut sync = synchronizer();
        sync.build_world(&floor_3x3()).unwrap();

        let mut step = step_3x3();
        step.agents = vec![AgentSnapshot::new(1, 0, 0), AgentSnapshot::new(2, 1, 1)];
        step.victims = vec![VictimSnapshot::new(0, 2), VictimSnapshot::new(2, 0)];
        sync.apply_step(&step).unwrap();
        let agents: Vec<_> = {
            let mut v: Vec<_> = sync.registries().agents.iter().map(|(k, h)| (*k, *h)).collect();
            v.sort_by_key(|(k, _)| *k);
            v
        };

        let report = sync.apply_step(&step).unwrap();

        assert!(!report.agents.churned());
        assert!(!report.victims.churned());
        let mut again: Vec<_> = sync.registries().agents.iter().map(|(k, h)| (*k, *h)).collect();
        again.sort_by_key(|(k, _)| *k);
        assert_eq!(agents, again);
    }

    #[test]
    fn test_step_never_touches_tiles() {
        let mut sync = synchronizer();
        sync.build_world(&floor_3x3()).unwrap();
        let tile = *sync.registries().tiles.get(&GridPos::new(1, 1)).unwrap();

        let mut step = floor_3x3();
        step.tiles = Some(vec![TileSnapshot::new(0, 0, TileKind::Garage)]);
        let report = sync.apply_step(&step).unwrap();

        assert_eq!(report.tiles, ReconcileStats::default());
        assert_eq!(sync.registries().tiles.get(&GridPos::new(1, 1)), Some(&tile));
        assert_eq!(sync.host_mut().count_archetype("floor_garage"), 0);
    }

    #[test]
    fn test_hazards_and_doors_rebuilt_each_step() {
        let mut sync = synchronizer();
        sync.build_world(&floor_3x3()).unwrap();

        let mut step = step_3x3();
        step.hazards = Some(vec![HazardSnapshot::new(1, 1, HazardKind::Fire)]);
        let door = EdgeSnapshot::new(GridPos::new(0, 1), GridPos::new(0, 2), EdgeKind::DoorOpen);
        step.edges = vec![door];
        let report = sync.apply_step(&step).unwrap();

        assert_eq!(report.edges.destroyed, 1);
        assert_eq!(report.hazards.created, 1);
        assert_eq!(sync.host_mut().count_archetype("wall_vertical"), 0);
        assert_eq!(sync.host_mut().count_archetype("door_open_horizontal"), 1);
        assert_eq!(sync.host_mut().count_archetype("fire"), 1);
    }

    #[test]
    fn test_reload_rebuilds_everything() {
        let mut sync = synchronizer();
        sync.build_world(&floor_3x3()).unwrap();
        let mut step = step_3x3();
        step.agents = vec![AgentSnapshot::new(1, 0, 0)];
        sync.apply_step(&step).unwrap();

        let report = sync.build_world(&floor_3x3()).unwrap();

        // 9 tiles and the agent; the step carried no edges
        assert_eq!(report.cleared, 10);
        assert_eq!(report.tiles.created, 9);
        assert!(sync.registries().agents.is_empty());
        assert_eq!(sync.host_mut().visual_count(), 10);
    }

    #[test]
    fn test_json_entry_points() {
        let mut sync = synchronizer();
        let floor = floor_3x3().to_json().unwrap();
        sync.on_world_loaded(&floor).unwrap();

        let step = r#"{"width": 3, "height": 3, "hazards": [{"x": 0, "y": 0, "kind": "smoke"}],
                       "agents": [{"id": 7, "x": 2, "y": 1}],
                       "episode": 2, "max_episodes": 5, "current_seed": 12}"#;
        let report = sync.on_step_applied(step).unwrap();

        assert_eq!(report.hazards.created, 1);
        assert_eq!(report.agents.created, 1);
        assert_eq!(sync.episode().episode, 2);
        assert_eq!(sync.dims(), Some(GridDims::new(3, 3)));

        let err = sync.on_step_applied("not json").unwrap_err();
        assert!(matches!(err, SyncError::Decode(DecodeError::Json(_))));
        assert_eq!(sync.registries().agents.len(), 1);
    }

    /// Scene that can be switched to refuse visuals, like an engine node
    /// that is not in the tree yet.
    struct DetachableScene {
        scene: EcsScene,
        attached: bool,
    }

    impl VisualHost for DetachableScene {
        type Handle = bevy_ecs::entity::Entity;

        fn is_attached(&self) -> bool {
            self.attached
        }

        fn instantiate(
            &mut self,
            archetype: &crate::prefabs::ArchetypeId,
            position: crate::grid::WorldPos,
        ) -> Option<Self::Handle> {
            self.scene.instantiate(archetype, position)
        }

        fn set_position(&mut self, handle: &Self::Handle, position: crate::grid::WorldPos) {
            self.scene.set_position(handle, position);
        }

        fn destroy(&mut self, handle: Self::Handle) {
            self.scene.destroy(handle);
        }
    }

    #[test]
    fn test_detached_host_refuses_load_until_attached() {
        let host = DetachableScene {
            scene: EcsScene::new(),
            attached: false,
        };
        let config = synchronizer().config().clone();
        let mut sync = WorldSynchronizer::new(config, host);

        assert_eq!(sync.build_world(&floor_3x3()).unwrap_err(), SyncError::HostDetached);
        assert_eq!(sync.phase(), SyncPhase::Uninitialized);
        assert!(sync.registries().is_empty());

        sync.host_mut().attached = true;
        let report = sync.build_world(&floor_3x3()).unwrap();
        assert_eq!(report.tiles.created, 9);

        sync.host_mut().attached = false;
        let mut step = step_3x3();
        step.agents = vec![AgentSnapshot::new(1, 0, 0)];
        assert_eq!(sync.apply_step(&step).unwrap_err(), SyncError::HostDetached);
        assert!(sync.registries().agents.is_empty());
        assert_eq!(sync.host_mut().scene.visual_count(), 10);
    }

    #[test]
    fn test_report_total() {
        let mut sync = synchronizer();
        let report = sync.build_world(&floor_3x3()).unwrap();
        assert_eq!(report.total().created, 10);
    }
}
