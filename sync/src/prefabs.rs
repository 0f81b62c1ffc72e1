//! Archetype selection.
//!
//! Maps what the server says an entity *is* to which visual the host should
//! instantiate. Fallbacks are written as ordered tables so each policy can be
//! read (and tested) on its own rather than buried in nested conditionals.

use crate::snapshot::{EdgeKind, EdgeOrientation, HazardKind, TileKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque name of a visual archetype; the host resolves it to a prefab or scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchetypeId(pub String);

impl ArchetypeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArchetypeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// ============================================================================
// PREFAB TABLE (CONFIGURATION)
// ============================================================================

/// Floor archetype slots. Unset slots fall through the fallback table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorSlots {
    pub default: Option<ArchetypeId>,
    pub inside: Option<ArchetypeId>,
    pub outside: Option<ArchetypeId>,
    pub kitchen: Option<ArchetypeId>,
    pub garage: Option<ArchetypeId>,
    pub safe: Option<ArchetypeId>,
    pub spawn: Option<ArchetypeId>,
}

/// Vertical and horizontal archetypes for one edge kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientedSlots {
    pub vertical: Option<ArchetypeId>,
    pub horizontal: Option<ArchetypeId>,
}

impl OrientedSlots {
    pub fn get(&self, orientation: EdgeOrientation) -> Option<&ArchetypeId> {
        match orientation {
            EdgeOrientation::Vertical => self.vertical.as_ref(),
            EdgeOrientation::Horizontal => self.horizontal.as_ref(),
        }
    }
}

/// Single fallback archetype plus an optional pool to vary appearance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypePool {
    pub fallback: Option<ArchetypeId>,
    pub pool: Vec<ArchetypeId>,
}

impl ArchetypePool {
    /// Pick `pool[|hash| mod len]`, or the fallback when the pool is empty.
    pub fn pick(&self, hash: i64) -> Option<&ArchetypeId> {
        if self.pool.is_empty() {
            return self.fallback.as_ref();
        }
        let idx = (hash.unsigned_abs() % self.pool.len() as u64) as usize;
        self.pool.get(idx)
    }
}

/// Every archetype slot the synchronizer can fill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefabTable {
    pub floor: FloorSlots,
    pub wall: OrientedSlots,
    pub door_closed: OrientedSlots,
    pub door_open: OrientedSlots,
    pub fire: Option<ArchetypeId>,
    pub smoke: Option<ArchetypeId>,
    pub agents: ArchetypePool,
    pub victims: ArchetypePool,
}

impl PrefabTable {
    /// A table with every slot filled using conventional names.
    ///
    /// Agent and victim pools hold `count` skins each (`firefighter_0`, ...).
    pub fn with_standard_names(skins: usize) -> Self {
        let oriented = |base: &str| OrientedSlots {
            vertical: Some(ArchetypeId::new(format!("{base}_vertical"))),
            horizontal: Some(ArchetypeId::new(format!("{base}_horizontal"))),
        };
        let pool = |base: &str| ArchetypePool {
            fallback: Some(ArchetypeId::new(base)),
            pool: (0..skins).map(|i| ArchetypeId::new(format!("{base}_{i}"))).collect(),
        };
        Self {
            floor: FloorSlots {
                default: Some("floor_default".into()),
                inside: Some("floor_inside".into()),
                outside: Some("floor_outside".into()),
                kitchen: Some("floor_kitchen".into()),
                garage: Some("floor_garage".into()),
                safe: Some("floor_safe".into()),
                spawn: Some("floor_spawn".into()),
            },
            wall: oriented("wall"),
            door_closed: oriented("door_closed"),
            door_open: oriented("door_open"),
            fire: Some("fire".into()),
            smoke: Some("smoke".into()),
            agents: pool("firefighter"),
            victims: pool("victim"),
        }
    }
}

// ============================================================================
// FALLBACK TABLES
// ============================================================================

/// Named floor slot, used to express fallback chains as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorSlot {
    Inside,
    Outside,
    Kitchen,
    Garage,
    Safe,
    Spawn,
}

/// Ordered slots tried for a tile kind before the global default.
pub fn floor_fallback_chain(kind: TileKind) -> &'static [FloorSlot] {
    match kind {
        TileKind::Inside => &[FloorSlot::Inside],
        TileKind::Outside => &[FloorSlot::Outside],
        TileKind::Kitchen => &[FloorSlot::Kitchen],
        TileKind::Garage => &[FloorSlot::Garage],
        TileKind::Safe => &[FloorSlot::Safe, FloorSlot::Inside],
        TileKind::Spawn => &[FloorSlot::Spawn, FloorSlot::Inside],
        TileKind::Unknown => &[],
    }
}

impl FloorSlots {
    fn slot(&self, slot: FloorSlot) -> Option<&ArchetypeId> {
        match slot {
            FloorSlot::Inside => self.inside.as_ref(),
            FloorSlot::Outside => self.outside.as_ref(),
            FloorSlot::Kitchen => self.kitchen.as_ref(),
            FloorSlot::Garage => self.garage.as_ref(),
            FloorSlot::Safe => self.safe.as_ref(),
            FloorSlot::Spawn => self.spawn.as_ref(),
        }
    }
}

/// 32-bit FNV-1a over the key bytes, read as a signed value.
///
/// Stable across calls and processes, so a victim keeps the same skin for as
/// long as its key exists.
pub fn stable_hash(key: &str) -> i32 {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let mut hash = FNV_OFFSET;
    for byte in key.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as i32
}

// ============================================================================
// SELECTOR
// ============================================================================

/// Pure archetype selection over a [`PrefabTable`].
#[derive(Debug, Clone, Copy)]
pub struct PrefabSelector<'a> {
    table: &'a PrefabTable,
}

impl<'a> PrefabSelector<'a> {
    pub fn new(table: &'a PrefabTable) -> Self {
        Self { table }
    }

    /// Exact kind, then category fallback, then the global default.
    pub fn select_floor(&self, kind: TileKind) -> Option<ArchetypeId> {
        floor_fallback_chain(kind)
            .iter()
            .find_map(|slot| self.table.floor.slot(*slot))
            .or(self.table.floor.default.as_ref())
            .cloned()
    }

    /// `None` when the slot for this kind and orientation is unset.
    pub fn select_edge(&self, kind: EdgeKind, orientation: EdgeOrientation) -> Option<ArchetypeId> {
        let slots = match kind {
            EdgeKind::Wall => &self.table.wall,
            EdgeKind::DoorClosed => &self.table.door_closed,
            EdgeKind::DoorOpen => &self.table.door_open,
            EdgeKind::Unknown => return None,
        };
        slots.get(orientation).cloned()
    }

    pub fn select_hazard(&self, kind: HazardKind) -> Option<ArchetypeId> {
        match kind {
            HazardKind::Fire => self.table.fire.clone(),
            HazardKind::Smoke => self.table.smoke.clone(),
            HazardKind::Unknown => None,
        }
    }

    /// Skin chosen by `|id| mod pool_size`.
    pub fn select_agent(&self, id: i32) -> Option<ArchetypeId> {
        self.table.agents.pick(i64::from(id)).cloned()
    }

    /// Skin chosen by `|stable_hash(key)| mod pool_size`.
    pub fn select_victim(&self, key: &str) -> Option<ArchetypeId> {
        self.table.victims.pick(i64::from(stable_hash(key))).cloned()
    }
}
