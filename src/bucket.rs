//! Bucket and slot primitives: the per-bucket slot arrays the table routes into.

use crate::error::{Result, TableError};
use core::num::NonZeroU32;

/// One position in a bucket. A removed entry leaves a `Vacant` slot behind
/// which the next insert routed to the same bucket reuses.
#[derive(Debug)]
pub(crate) enum Slot<K, V> {
    Vacant,
    Occupied { key: K, value: V, hash: NonZeroU32 },
}

impl<K, V> Slot<K, V> {
    #[inline]
    pub(crate) fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied { .. })
    }

    #[inline]
    pub(crate) fn entry(&self) -> Option<(&K, &V)> {
        match self {
            Slot::Occupied { key, value, .. } => Some((key, value)),
            Slot::Vacant => None,
        }
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self) -> Option<(&K, &mut V)> {
        match self {
            Slot::Occupied { key, value, .. } => Some((&*key, value)),
            Slot::Vacant => None,
        }
    }

    /// Vacate the slot and hand back what it held.
    #[inline]
    pub(crate) fn take(&mut self) -> Option<(K, V, NonZeroU32)> {
        match core::mem::replace(self, Slot::Vacant) {
            Slot::Occupied { key, value, hash } => Some((key, value, hash)),
            Slot::Vacant => None,
        }
    }
}

/// Slot array reached by `hash % capacity`.
///
/// Storage grows exactly one slot at a time and is never compacted; removal
/// only vacates.
#[derive(Debug)]
pub(crate) struct Bucket<K, V> {
    slots: Vec<Slot<K, V>>,
}

impl<K, V> Bucket<K, V> {
    pub(crate) const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    #[inline]
    pub(crate) fn slots(&self) -> &[Slot<K, V>] {
        &self.slots
    }

    #[inline]
    pub(crate) fn slots_mut(&mut self) -> &mut [Slot<K, V>] {
        &mut self.slots
    }

    /// Index of the live slot whose hash is `hash` and whose key satisfies
    /// `eq`. The stored hash is compared first so `eq` only runs on likely
    /// matches.
    pub(crate) fn position(&self, hash: NonZeroU32, mut eq: impl FnMut(&K) -> bool) -> Option<usize> {
        self.slots.iter().position(|slot| match slot {
            Slot::Occupied { key, hash: h, .. } => *h == hash && eq(key),
            Slot::Vacant => false,
        })
    }

    fn first_vacant(&self) -> Option<usize> {
        self.slots.iter().position(|slot| !slot.is_occupied())
    }

    pub(crate) fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_occupied()).count()
    }

    /// Make room for `additional` appended slots without touching existing
    /// ones. Failure leaves the bucket unchanged.
    pub(crate) fn reserve_exact(&mut self, additional: usize) -> Result<()> {
        self.slots
            .try_reserve_exact(additional)
            .map_err(|source| TableError::Alloc {
                what: "bucket slots",
                requested: additional,
                source,
            })
    }

    /// Store a new entry in the first vacant slot, or in one freshly appended
    /// slot. Does not look for an equal key. Returns the slot index.
    pub(crate) fn store(&mut self, key: K, value: V, hash: NonZeroU32) -> Result<usize> {
        let index = match self.first_vacant() {
            Some(index) => index,
            None => {
                self.reserve_exact(1)?;
                self.slots.push(Slot::Vacant);
                self.slots.len() - 1
            }
        };
        self.slots[index] = Slot::Occupied { key, value, hash };
        Ok(index)
    }

    /// Append an entry into capacity reserved beforehand with
    /// [`Bucket::reserve_exact`].
    #[inline]
    pub(crate) fn push_reserved(&mut self, key: K, value: V, hash: NonZeroU32) {
        debug_assert!(self.slots.len() < self.slots.capacity());
        self.slots.push(Slot::Occupied { key, value, hash });
    }

    /// Put an entry back into a slot that was vacated by [`Slot::take`].
    pub(crate) fn restore(&mut self, index: usize, key: K, value: V, hash: NonZeroU32) {
        debug_assert!(matches!(self.slots.get(index), Some(Slot::Vacant)));
        self.slots[index] = Slot::Occupied { key, value, hash };
    }

    /// Vacate every slot, keeping the slot storage for reuse.
    pub(crate) fn vacate_all(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Vacant;
        }
    }

    /// Move every live entry out, leaving the bucket empty.
    pub(crate) fn drain_occupied(&mut self) -> impl Iterator<Item = (K, V, NonZeroU32)> + '_ {
        self.slots.drain(..).filter_map(|mut slot| slot.take())
    }
}
