//! Insertion-ordered item pool with first-class tombstones.
//!
//! The merge engine's ordering invariant — in-place replacements keep their
//! ordinal position, renamed/added items append at the end — is a direct
//! consequence of this container rather than a side effect of null-vs-absent
//! semantics. Two distinct removal operations exist:
//!
//! - [`ItemPool::remove`] deletes a slot entirely (later items keep their
//!   relative order);
//! - [`ItemPool::clear_slot`] empties a slot but keeps its position, so a
//!   later [`ItemPool::place`] under the same identifier lands exactly where
//!   the original item was.

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::model::ItemId;

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// One pool slot: a live item or a position-preserving placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Slot<T> {
    Live(T),
    Tombstone,
}

impl<T> Slot<T> {
    fn live(&self) -> Option<&T> {
        match self {
            Self::Live(item) => Some(item),
            Self::Tombstone => None,
        }
    }
}

/// Outcome of [`ItemPool::place`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The identifier's slot held a tombstone; the item took its position.
    FilledSlot,
    /// The identifier was absent; the item was appended at the end.
    Appended,
    /// The identifier's slot holds a live item; nothing was placed.
    Occupied,
}

// ---------------------------------------------------------------------------
// ItemPool
// ---------------------------------------------------------------------------

/// Ordered, identifier-keyed item collection.
#[derive(Clone, Debug, Default)]
pub struct ItemPool<T> {
    slots: IndexMap<ItemId, Slot<T>>,
}

impl<T> ItemPool<T> {
    /// Empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: IndexMap::new(),
        }
    }

    /// Insert a new live item. Fails (without replacing) if the identifier
    /// already has a slot, live or tombstoned.
    ///
    /// # Errors
    /// Returns the item back when the identifier is already present.
    pub fn insert(&mut self, id: ItemId, item: T) -> Result<(), T> {
        match self.slots.entry(id) {
            Entry::Occupied(_) => Err(item),
            Entry::Vacant(v) => {
                v.insert(Slot::Live(item));
                Ok(())
            }
        }
    }

    /// Look up a live item.
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&T> {
        self.slots.get(id).and_then(Slot::live)
    }

    /// Returns `true` if a live item exists under `id`.
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Delete a slot entirely, preserving the relative order of the rest.
    pub fn remove(&mut self, id: &ItemId) -> Option<T> {
        match self.slots.shift_remove(id)? {
            Slot::Live(item) => Some(item),
            Slot::Tombstone => None,
        }
    }

    /// Empty a slot but keep its ordinal position. Returns the item that
    /// occupied it, or `None` if the slot was absent or already cleared.
    pub fn clear_slot(&mut self, id: &ItemId) -> Option<T> {
        let slot = self.slots.get_mut(id)?;
        match std::mem::replace(slot, Slot::Tombstone) {
            Slot::Live(item) => Some(item),
            Slot::Tombstone => None,
        }
    }

    /// Place an item under `id`: fill a tombstoned slot in place, append when
    /// absent, refuse when a live item is already there.
    pub fn place(&mut self, id: ItemId, item: T) -> Placement {
        match self.slots.entry(id) {
            Entry::Occupied(mut o) => match o.get() {
                Slot::Live(_) => Placement::Occupied,
                Slot::Tombstone => {
                    o.insert(Slot::Live(item));
                    Placement::FilledSlot
                }
            },
            Entry::Vacant(v) => {
                v.insert(Slot::Live(item));
                Placement::Appended
            }
        }
    }

    /// Iterate live items in order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &T)> {
        self.slots.iter().filter_map(|(id, s)| Some((id, s.live()?)))
    }

    /// Identifiers of live items, in order.
    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.iter().map(|(id, _)| id)
    }

    /// Number of live items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns `true` if the pool holds no live items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the pool, yielding live items in their final order.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.slots
            .into_values()
            .filter_map(|s| match s {
                Slot::Live(item) => Some(item),
                Slot::Tombstone => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
