//! RescueSceneBridge - Godot node that mirrors server snapshots as scenes.
//!
//! Archetypes are bound to `PackedScene`s from GDScript, then every JSON body
//! received from the simulation server is handed to `on_world_loaded` or
//! `on_step_applied`. Visuals are instantiated as children of the bridge node.
//!
//! Usage in GDScript:
//! ```gdscript
//! var bridge = RescueSceneBridge.new()
//! add_child(bridge)
//! bridge.load_config("res://flashpoint.toml")
//! bridge.register_archetype("wall_vertical", preload("res://wall_v.tscn"))
//! bridge.on_world_loaded(floor_json)
//! bridge.on_step_applied(step_json)
//! ```

use flashpoint_sync::{
    ArchetypeId, SyncConfig, SyncError, VisualHost, WorldPos, WorldSynchronizer,
};
use godot::classes::{FileAccess, INode3D, Node3D, PackedScene};
use godot::prelude::*;
use std::collections::HashMap;

// ============================================================================
// VISUAL HOST
// ============================================================================

/// Scene-tree side of the synchronizer. Handles are node instance ids.
#[derive(Default)]
pub struct GodotScene {
    root: Option<Gd<Node3D>>,
    scenes: HashMap<ArchetypeId, Gd<PackedScene>>,
}

impl GodotScene {
    fn node(id: InstanceId) -> Option<Gd<Node3D>> {
        Gd::<Node3D>::try_from_instance_id(id).ok()
    }
}

fn to_vector(pos: WorldPos) -> Vector3 {
    Vector3::new(pos.x, pos.y, pos.z)
}

impl VisualHost for GodotScene {
    type Handle = InstanceId;

    /// Visuals are parented to the bridge node, which is only known after `ready`.
    fn is_attached(&self) -> bool {
        self.root.is_some()
    }

    fn instantiate(&mut self, archetype: &ArchetypeId, position: WorldPos) -> Option<InstanceId> {
        let root = self.root.as_mut()?;
        let scene = self.scenes.get(archetype)?;
        let mut node = scene.try_instantiate_as::<Node3D>()?;
        node.set_position(to_vector(position));
        root.add_child(&node);
        Some(node.instance_id())
    }

    fn set_position(&mut self, handle: &InstanceId, position: WorldPos) {
        if let Some(mut node) = Self::node(*handle) {
            node.set_position(to_vector(position));
        }
    }

    fn destroy(&mut self, handle: InstanceId) {
        if let Some(mut node) = Self::node(handle) {
            node.queue_free();
        }
    }
}

// ============================================================================
// BRIDGE CLASS
// ============================================================================

/// Node exposing the snapshot synchronizer to Godot.
#[derive(GodotClass)]
#[class(base=Node3D)]
pub struct RescueSceneBridge {
    base: Base<Node3D>,
    sync: WorldSynchronizer<GodotScene>,
}

#[godot_api]
impl INode3D for RescueSceneBridge {
    fn init(base: Base<Node3D>) -> Self {
        Self {
            base,
            sync: WorldSynchronizer::new(SyncConfig::default(), GodotScene::default()),
        }
    }

    fn ready(&mut self) {
        let root = self.base().clone();
        self.sync.host_mut().root = Some(root);
    }
}

#[godot_api]
impl RescueSceneBridge {
    /// Replace the configuration from a TOML file. Only before the first load.
    #[func]
    fn load_config(&mut self, path: GString) -> bool {
        if self.sync.is_loaded() {
            godot_warn!("[RescueSceneBridge] Config can only be changed before the world loads");
            return false;
        }
        // FileAccess resolves res:// and user:// as well as absolute paths
        let text = FileAccess::get_file_as_string(&path).to_string();
        if text.is_empty() {
            godot_error!("[RescueSceneBridge] Cannot read config {}", path);
            return false;
        }
        match SyncConfig::from_toml_str(&text) {
            Ok(config) => {
                let host = std::mem::take(self.sync.host_mut());
                self.sync = WorldSynchronizer::new(config, host);
                godot_print!("[RescueSceneBridge] Config loaded from {}", path);
                true
            }
            Err(e) => {
                godot_error!("[RescueSceneBridge] {}", e);
                false
            }
        }
    }

    /// Bind an archetype name to the scene instantiated for it.
    #[func]
    fn register_archetype(&mut self, name: GString, scene: Gd<PackedScene>) {
        self.sync
            .host_mut()
            .scenes
            .insert(ArchetypeId::new(name.to_string()), scene);
    }

    /// Number of archetypes bound to scenes.
    #[func]
    fn get_archetype_count(&self) -> i32 {
        self.sync.host().scenes.len() as i32
    }

    /// Build the world from a `/floor` response body.
    #[func]
    fn on_world_loaded(&mut self, json: GString) -> bool {
        match self.sync.on_world_loaded(&json.to_string()) {
            Ok(report) => {
                godot_print!(
                    "[RescueSceneBridge] World loaded: {} visuals",
                    report.total().created
                );
                true
            }
            Err(e) => {
                report_error(&e);
                false
            }
        }
    }

    /// Apply a `/step` response body.
    #[func]
    fn on_step_applied(&mut self, json: GString) -> bool {
        match self.sync.on_step_applied(&json.to_string()) {
            Ok(_) => true,
            Err(e) => {
                report_error(&e);
                false
            }
        }
    }

    /// True once the simulation reported it is done; stop polling then.
    #[func]
    fn is_finished(&self) -> bool {
        self.sync.is_finished()
    }

    /// Episode counters from the last snapshot as JSON.
    #[func]
    fn get_episode_json(&self) -> GString {
        match serde_json::to_string(self.sync.episode()) {
            Ok(json) => GString::from(json.as_str()),
            Err(_) => GString::from("{}"),
        }
    }

    /// Number of live visuals tracked across all categories.
    #[func]
    fn get_visual_count(&self) -> i32 {
        self.sync.registries().len() as i32
    }

    /// Floor URL, step URL and seed, for the GDScript poller.
    #[func]
    fn get_floor_url(&self) -> GString {
        GString::from(self.sync.config().server.floor_url.as_str())
    }

    #[func]
    fn get_step_url(&self) -> GString {
        GString::from(self.sync.config().server.step_url.as_str())
    }

    #[func]
    fn get_seed(&self) -> i64 {
        self.sync.config().server.seed
    }
}

fn report_error(err: &SyncError) {
    match err {
        SyncError::Finished => {
            godot_print!("[RescueSceneBridge] Simulation finished; snapshot ignored")
        }
        SyncError::Reconciliation(_) => godot_error!("[RescueSceneBridge] {}", err),
        SyncError::HostDetached => {
            godot_error!("[RescueSceneBridge] Snapshot refused: node is not in the tree yet")
        }
        _ => godot_warn!("[RescueSceneBridge] Snapshot rejected: {}", err),
    }
}
