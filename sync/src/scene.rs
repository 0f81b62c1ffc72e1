//! Headless scene backed by a `bevy_ecs` world.
//!
//! Each visual is an entity carrying its [`Archetype`] and [`Transform`].
//! Useful wherever no engine is attached: tests, the demo, benchmarks, or a
//! server-side mirror of what a client would be showing.

use crate::grid::WorldPos;
use crate::prefabs::ArchetypeId;
use crate::reconcile::VisualHost;
use bevy_ecs::prelude::*;
use std::collections::HashSet;

// ============================================================================
// COMPONENTS
// ============================================================================

/// Which archetype a visual was instantiated from.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct Archetype(pub ArchetypeId);

/// World-space placement of a visual.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub translation: WorldPos,
}

/// Number of times a visual has been moved since it was created.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveCount(pub u32);

// ============================================================================
// SCENE
// ============================================================================

/// ECS-backed [`VisualHost`]. Handles are ECS entities.
#[derive(Default)]
pub struct EcsScene {
    world: World,
    /// Archetypes this scene can build; `None` accepts any.
    catalog: Option<HashSet<ArchetypeId>>,
}

impl EcsScene {
    /// Scene that accepts every archetype.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene that only builds the listed archetypes and declines the rest.
    pub fn with_catalog(archetypes: impl IntoIterator<Item = ArchetypeId>) -> Self {
        Self {
            world: World::new(),
            catalog: Some(archetypes.into_iter().collect()),
        }
    }

    /// Number of live visuals.
    pub fn visual_count(&mut self) -> usize {
        let mut query = self.world.query::<&Archetype>();
        query.iter(&self.world).count()
    }

    /// Number of live visuals built from `archetype`.
    pub fn count_archetype(&mut self, archetype: &str) -> usize {
        let mut query = self.world.query::<&Archetype>();
        query
            .iter(&self.world)
            .filter(|a| a.0.as_str() == archetype)
            .count()
    }

    /// Number of live visuals whose archetype name starts with `prefix`.
    pub fn count_prefix(&mut self, prefix: &str) -> usize {
        let mut query = self.world.query::<&Archetype>();
        query
            .iter(&self.world)
            .filter(|a| a.0.as_str().starts_with(prefix))
            .count()
    }

    pub fn position_of(&self, entity: Entity) -> Option<WorldPos> {
        self.world.get::<Transform>(entity).map(|t| t.translation)
    }

    pub fn archetype_of(&self, entity: Entity) -> Option<&ArchetypeId> {
        self.world.get::<Archetype>(entity).map(|a| &a.0)
    }

    pub fn move_count(&self, entity: Entity) -> Option<u32> {
        self.world.get::<MoveCount>(entity).map(|m| m.0)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.world.entities().contains(entity)
    }
}

impl VisualHost for EcsScene {
    type Handle = Entity;

    fn instantiate(&mut self, archetype: &ArchetypeId, position: WorldPos) -> Option<Entity> {
        if let Some(catalog) = &self.catalog {
            if !catalog.contains(archetype) {
                return None;
            }
        }
        let entity = self
            .world
            .spawn((
                Archetype(archetype.clone()),
                Transform {
                    translation: position,
                },
                MoveCount::default(),
            ))
            .id();
        Some(entity)
    }

    fn set_position(&mut self, handle: &Entity, position: WorldPos) {
        if let Some(mut transform) = self.world.get_mut::<Transform>(*handle) {
            transform.translation = position;
        }
        if let Some(mut moves) = self.world.get_mut::<MoveCount>(*handle) {
            moves.0 += 1;
        }
    }

    fn destroy(&mut self, handle: Entity) {
        self.world.despawn(handle);
    }
}
