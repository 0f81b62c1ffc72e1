//! Flashpoint Rescue Viewer - GDExtension bindings
//!
//! Exposes the snapshot synchronizer to Godot 4 via GDExtension.

use godot::prelude::*;

mod scene_bridge;

/// GDExtension entry point.
struct FlashpointExtension;

#[gdextension]
unsafe impl ExtensionLibrary for FlashpointExtension {}
