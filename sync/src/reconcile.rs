//! Snapshot reconciliation.
//!
//! Two policies share one loop:
//!
//! - [`reconcile`] keeps visuals whose key survives, moves them in place,
//!   creates the newcomers and (optionally) destroys the keys that vanished.
//! - [`rebuild`] destroys the whole category and creates it again. Used where
//!   counts are small or an in-place update means nothing (a door flipping
//!   from closed to open is a different archetype, not a move).
//!
//! Neither function knows about the engine: visuals are created, moved and
//! destroyed through [`VisualHost`].

use crate::error::RegistryError;
use crate::grid::WorldPos;
use crate::prefabs::ArchetypeId;
use crate::registry::EntityRegistry;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::AddAssign;

/// Engine side of the synchronizer: owns the actual scene objects.
pub trait VisualHost {
    /// Opaque reference to one live visual.
    type Handle: Clone + Debug;

    /// Whether the host can build visuals at all, e.g. has a scene root.
    ///
    /// Snapshots are refused while this is false.
    fn is_attached(&self) -> bool {
        true
    }

    /// Create a visual of `archetype` at `position`.
    ///
    /// `None` means the host cannot produce this archetype; the item is
    /// skipped exactly as if no archetype had been selected.
    fn instantiate(
        &mut self,
        archetype: &ArchetypeId,
        position: WorldPos,
    ) -> Option<Self::Handle>;

    /// Move an existing visual without recreating it.
    fn set_position(&mut self, handle: &Self::Handle, position: WorldPos);

    /// Remove a visual from the scene.
    fn destroy(&mut self, handle: Self::Handle);
}

/// What happens to registry entries whose key is absent from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// Destroy them; afterwards the registry keys equal the snapshot keys.
    RemoveMissing,
    /// Leave them alone.
    Keep,
}

/// Counts of what one pass did to one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
    /// Items that produced no visual (no archetype, or the host declined).
    pub skipped: usize,
}

impl ReconcileStats {
    /// Whether the pass created or destroyed anything.
    pub fn churned(&self) -> bool {
        self.created > 0 || self.destroyed > 0
    }
}

impl AddAssign for ReconcileStats {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
        self.destroyed += rhs.destroyed;
        self.skipped += rhs.skipped;
    }
}

/// Identity-preserving reconciliation of one category.
///
/// Items are visited in input order. When a key repeats, the first occurrence
/// creates the visual and later ones move it, so the last position wins.
/// `select` is only consulted for keys the registry does not hold yet.
pub fn reconcile<V, K, T>(
    host: &mut V,
    registry: &mut EntityRegistry<K, V::Handle>,
    items: &[T],
    eviction: Eviction,
    mut key_of: impl FnMut(&T) -> K,
    mut pos_of: impl FnMut(&T) -> WorldPos,
    mut select: impl FnMut(&T, &K) -> Option<ArchetypeId>,
) -> Result<ReconcileStats, RegistryError>
where
    V: VisualHost,
    K: Eq + Hash + Clone + Debug,
{
    let mut stats = ReconcileStats::default();
    let mut seen: HashSet<K> = HashSet::with_capacity(items.len());

    for item in items {
        let key = key_of(item);
        let position = pos_of(item);

        if let Some(handle) = registry.get(&key) {
            host.set_position(handle, position);
            stats.updated += 1;
        } else {
            let handle = select(item, &key)
                .and_then(|archetype| host.instantiate(&archetype, position));
            match handle {
                Some(handle) => {
                    registry.insert(key.clone(), handle)?;
                    stats.created += 1;
                }
                None => stats.skipped += 1,
            }
        }

        if eviction == Eviction::RemoveMissing {
            seen.insert(key);
        }
    }

    if eviction == Eviction::RemoveMissing {
        for handle in registry.remove_missing(&seen) {
            host.destroy(handle);
            stats.destroyed += 1;
        }
    }

    Ok(stats)
}

/// Destroy every visual in `registry`. Returns how many were destroyed.
pub fn clear<V, K>(host: &mut V, registry: &mut EntityRegistry<K, V::Handle>) -> usize
where
    V: VisualHost,
    K: Eq + Hash + Clone + Debug,
{
    let handles = registry.remove_all();
    let count = handles.len();
    for handle in handles {
        host.destroy(handle);
    }
    count
}

/// Destroy the whole category, then create it again from `items`.
pub fn rebuild<V, K, T>(
    host: &mut V,
    registry: &mut EntityRegistry<K, V::Handle>,
    items: &[T],
    key_of: impl FnMut(&T) -> K,
    pos_of: impl FnMut(&T) -> WorldPos,
    select: impl FnMut(&T, &K) -> Option<ArchetypeId>,
) -> Result<ReconcileStats, RegistryError>
where
    V: VisualHost,
    K: Eq + Hash + Clone + Debug,
{
    let destroyed = clear(host, registry);
    let mut stats = reconcile(host, registry, items, Eviction::Keep, key_of, pos_of, select)?;
    stats.destroyed += destroyed;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Host that records every call; handles are sequential integers.
    #[derive(Default)]
    struct RecordingHost {
        next: u32,
        live: HashMap<u32, (ArchetypeId, WorldPos)>,
        created: usize,
        moved: usize,
        destroyed: usize,
        refuse: Option<ArchetypeId>,
    }

    impl VisualHost for RecordingHost {
        type Handle = u32;

        fn instantiate(&mut self, archetype: &ArchetypeId, position: WorldPos) -> Option<u32> {
            if self.refuse.as_ref() == Some(archetype) {
                return None;
            }
            self.next += 1;
            self.created += 1;
            self.live.insert(self.next, (archetype.clone(), position));
            Some(self.next)
        }

        fn set_position(&mut self, handle: &u32, position: WorldPos) {
            self.moved += 1;
            if let Some(entry) = self.live.get_mut(handle) {
                entry.1 = position;
            }
        }

        fn destroy(&mut self, handle: u32) {
            self.destroyed += 1;
            self.live.remove(&handle);
        }
    }

    #[derive(Clone, Copy)]
    struct Item {
        key: u32,
        x: f32,
    }

    fn at(x: f32) -> WorldPos {
        WorldPos::new(x, 0.0, 0.0)
    }

    fn run(
        host: &mut RecordingHost,
        registry: &mut EntityRegistry<u32, u32>,
        items: &[Item],
        eviction: Eviction,
    ) -> ReconcileStats {
        reconcile(
            host,
            registry,
            items,
            eviction,
            |item| item.key,
            |item| at(item.x),
            |_, _| Some("unit".into()),
        )
        .unwrap()
    }

    #[test]
    fn test_creates_new_keys() {
        let mut host = RecordingHost::default();
        let mut registry = EntityRegistry::new();
        let items = [Item { key: 1, x: 0.0 }, Item { key: 2, x: 1.0 }];

        let stats = run(&mut host, &mut registry, &items, Eviction::RemoveMissing);

        assert_eq!(stats.created, 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(host.live.len(), 2);
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let mut host = RecordingHost::default();
        let mut registry = EntityRegistry::new();
        let items = [Item { key: 1, x: 0.0 }, Item { key: 2, x: 1.0 }];

        run(&mut host, &mut registry, &items, Eviction::RemoveMissing);
        let before: HashMap<u32, u32> = registry.iter().map(|(k, h)| (*k, *h)).collect();
        let stats = run(&mut host, &mut registry, &items, Eviction::RemoveMissing);
        let after: HashMap<u32, u32> = registry.iter().map(|(k, h)| (*k, *h)).collect();

        assert!(!stats.churned());
        assert_eq!(stats.updated, 2);
        assert_eq!(before, after);
        assert_eq!(host.created, 2);
    }

    #[test]
    fn test_moves_in_place() {
        let mut host = RecordingHost::default();
        let mut registry = EntityRegistry::new();

        run(&mut host, &mut registry, &[Item { key: 7, x: 0.0 }], Eviction::RemoveMissing);
        let handle = *registry.get(&7).unwrap();
        run(&mut host, &mut registry, &[Item { key: 7, x: 5.0 }], Eviction::RemoveMissing);

        assert_eq!(registry.get(&7), Some(&handle));
        assert_eq!(host.live[&handle].1, at(5.0));
        assert_eq!(host.destroyed, 0);
    }

    #[test]
    fn test_evicts_missing_keys() {
        let mut host = RecordingHost::default();
        let mut registry = EntityRegistry::new();
        let first = [Item { key: 1, x: 0.0 }, Item { key: 2, x: 1.0 }];
        let second = [Item { key: 2, x: 1.0 }, Item { key: 3, x: 2.0 }];

        run(&mut host, &mut registry, &first, Eviction::RemoveMissing);
        let stats = run(&mut host, &mut registry, &second, Eviction::RemoveMissing);

        assert_eq!(stats, ReconcileStats { created: 1, updated: 1, destroyed: 1, skipped: 0 });
        let mut keys: Vec<u32> = registry.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, vec![2, 3]);
        assert_eq!(host.live.len(), 2);
    }

    #[test]
    fn test_keep_leaves_missing_keys() {
        let mut host = RecordingHost::default();
        let mut registry = EntityRegistry::new();

        run(&mut host, &mut registry, &[Item { key: 1, x: 0.0 }], Eviction::Keep);
        let stats = run(&mut host, &mut registry, &[Item { key: 2, x: 0.0 }], Eviction::Keep);

        assert_eq!(stats.destroyed, 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_keys_last_position_wins() {
        let mut host = RecordingHost::default();
        let mut registry = EntityRegistry::new();
        let items = [Item { key: 1, x: 0.0 }, Item { key: 1, x: 9.0 }];

        let stats = run(&mut host, &mut registry, &items, Eviction::RemoveMissing);

        assert_eq!(stats.created, 1);
        assert_eq!(stats.updated, 1);
        assert_eq!(registry.len(), 1);
        let handle = registry.get(&1).unwrap();
        assert_eq!(host.live[handle].1, at(9.0));
    }

    #[test]
    fn test_missing_archetype_skips_item() {
        let mut host = RecordingHost::default();
        let mut registry: EntityRegistry<u32, u32> = EntityRegistry::new();
        let items = [Item { key: 1, x: 0.0 }, Item { key: 2, x: 0.0 }];

        let stats = reconcile(
            &mut host,
            &mut registry,
            &items,
            Eviction::RemoveMissing,
            |item| item.key,
            |item| at(item.x),
            |item, _| (item.key == 2).then(|| "unit".into()),
        )
        .unwrap();

        assert_eq!(stats.skipped, 1);
        assert!(!registry.contains_key(&1));
        assert!(registry.contains_key(&2));
    }

    #[test]
    fn test_host_refusal_skips_item() {
        let mut host = RecordingHost {
            refuse: Some("unit".into()),
            ..Default::default()
        };
        let mut registry = EntityRegistry::new();

        let items = [Item { key: 1, x: 0.0 }];
        let stats = run(&mut host, &mut registry, &items, Eviction::RemoveMissing);

        assert_eq!(stats.skipped, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_select_not_called_for_known_keys() {
        let mut host = RecordingHost::default();
        let mut registry = EntityRegistry::new();
        let items = [Item { key: 1, x: 0.0 }];
        run(&mut host, &mut registry, &items, Eviction::RemoveMissing);

        let mut selections = 0;
        reconcile(
            &mut host,
            &mut registry,
            &items,
            Eviction::RemoveMissing,
            |item| item.key,
            |item| at(item.x),
            |_, _| {
                selections += 1;
                Some("unit".into())
            },
        )
        .unwrap();

        assert_eq!(selections, 0);
    }

    #[test]
    fn test_rebuild_replaces_everything() {
        let mut host = RecordingHost::default();
        let mut registry = EntityRegistry::new();
        let items = [Item { key: 1, x: 0.0 }, Item { key: 2, x: 1.0 }];
        run(&mut host, &mut registry, &items, Eviction::RemoveMissing);
        let old = *registry.get(&1).unwrap();

        let stats = rebuild(
            &mut host,
            &mut registry,
            &items,
            |item| item.key,
            |item| at(item.x),
            |_, _| Some("unit".into()),
        )
        .unwrap();

        assert_eq!(stats.destroyed, 2);
        assert_eq!(stats.created, 2);
        assert_ne!(registry.get(&1), Some(&old));
        assert_eq!(host.live.len(), 2);
    }

    #[test]
    fn test_clear_destroys_all() {
        let mut host = RecordingHost::default();
        let mut registry = EntityRegistry::new();
        run(&mut host, &mut registry, &[Item { key: 1, x: 0.0 }], Eviction::Keep);

        assert_eq!(clear(&mut host, &mut registry), 1);
        assert!(registry.is_empty());
        assert!(host.live.is_empty());
    }
}
