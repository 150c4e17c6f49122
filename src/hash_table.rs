//! HashTable: separately chained table with pluggable hash and equality
//! functions, power-of-two resizing and removal-safe cursors.

use crate::bucket::{Bucket, Slot};
use crate::cursor::{Cursor, CursorRegistry, Position};
use crate::error::{Result, TableError};
use crate::hash_funcs::hash_with;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::num::NonZeroU32;
use hashbrown::hash_map::DefaultHashBuilder;
use std::io;

/// Capacity of a fresh table, and the floor shrinking never goes below.
pub const MIN_CAPACITY: usize = 4;

type HashFn<K> = dyn Fn(&K) -> u32;
type EqualFn<K> = dyn Fn(&K, &K) -> bool;

/// Outcome of [`HashTable::insert`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertOutcome {
    /// The key was absent; a new entry was created.
    Inserted,
    /// An equal key was present; its value was replaced.
    Updated,
}

/// A mutable mapping from `K` to `V`.
///
/// Entries are routed by `hash_fn(key) % capacity` into buckets that are
/// scanned linearly. Capacity starts at [`MIN_CAPACITY`], doubles when an
/// insert finds `len >= capacity` and halves when a removal leaves
/// `len * 4 <= capacity`.
///
/// Besides the borrowing [`iter`](Self::iter), the table offers explicit
/// [`Cursor`]s which do not borrow it. While a cursor is open, entries may be
/// looked up and removed, but `insert` and `clear` panic and shrinking is
/// postponed.
pub struct HashTable<K, V> {
    directory: Vec<Bucket<K, V>>,
    len: usize,
    hash_fn: Box<HashFn<K>>,
    equal_fn: Box<EqualFn<K>>,
    cursors: CursorRegistry,
    #[cfg(test)]
    fail_next_resize: bool,
}

impl<K, V> HashTable<K, V> {
    /// Create an empty table with [`MIN_CAPACITY`] buckets.
    ///
    /// `hash_fn` and `equal_fn` must agree (equal keys hash equally) and must
    /// give the same answers for a key for as long as it is stored.
    pub fn new<H, E>(hash_fn: H, equal_fn: E) -> Self
    where
        H: Fn(&K) -> u32 + 'static,
        E: Fn(&K, &K) -> bool + 'static,
    {
        Self {
            directory: empty_directory(MIN_CAPACITY),
            len: 0,
            hash_fn: Box::new(hash_fn),
            equal_fn: Box::new(equal_fn),
            cursors: CursorRegistry::new(),
            #[cfg(test)]
            fail_next_resize: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.directory.len()
    }

    #[cfg(test)]
    pub(crate) fn occupied_slots(&self) -> usize {
        self.directory.iter().map(Bucket::occupied).sum()
    }

    /// Number of cursors currently open on this table.
    pub fn live_cursors(&self) -> usize {
        self.cursors.live()
    }

    // The unused-slot sentinel of the routing hash is 0; real keys hashing
    // to it are moved to 1.
    #[inline]
    fn route_hash(&self, key: &K) -> NonZeroU32 {
        NonZeroU32::new((self.hash_fn)(key)).unwrap_or(NonZeroU32::MIN)
    }

    #[inline]
    fn bucket_index(hash: NonZeroU32, capacity: usize) -> usize {
        hash.get() as usize % capacity
    }

    fn locate(&self, key: &K) -> Option<(usize, usize)> {
        let hash = self.route_hash(key);
        let b = Self::bucket_index(hash, self.capacity());
        let eq = &self.equal_fn;
        self.directory[b]
            .position(hash, |stored| eq(key, stored))
            .map(|s| (b, s))
    }

    fn slot_mut(&mut self, (b, s): (usize, usize)) -> &mut Slot<K, V> {
        &mut self.directory[b].slots_mut()[s]
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let (b, s) = self.locate(key)?;
        self.directory[b].slots()[s].entry().map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let at = self.locate(key)?;
        self.slot_mut(at).entry_mut().map(|(_, v)| v)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.locate(key).is_some()
    }

    /// Insert or update `key`.
    ///
    /// When an equal key is already stored, its value is replaced in place
    /// (the stored key is kept and `key` is dropped) and
    /// [`InsertOutcome::Updated`] is returned.
    ///
    /// # Panics
    /// If a cursor is open on the table.
    #[track_caller]
    pub fn insert(&mut self, key: K, value: V) -> Result<InsertOutcome> {
        let prev = self.insert_entry(key, value, false)?;
        Ok(match prev {
            Some(_) => InsertOutcome::Updated,
            None => InsertOutcome::Inserted,
        })
    }

    /// Insert or replace `key`, returning the evicted pair.
    ///
    /// Unlike [`insert`](Self::insert), both the stored key and value are
    /// replaced by the new ones, and the key is looked up before the load
    /// check so a replacement never grows the table. Returns `None` for a
    /// fresh insert.
    ///
    /// # Panics
    /// If a cursor is open on the table.
    #[track_caller]
    pub fn insert_returning_previous(&mut self, key: K, value: V) -> Result<Option<(K, V)>> {
        self.insert_entry(key, value, true)
    }

    #[track_caller]
    fn insert_entry(&mut self, key: K, value: V, replace_key: bool) -> Result<Option<(K, V)>> {
        self.cursors.assert_quiescent("insert into");

        if replace_key {
            if let Some(at) = self.locate(&key) {
                return Ok(Some(self.replace_at(at, key, value, true)));
            }
        }

        if self.len >= self.capacity() {
            self.resize(self.capacity() * 2)?;
        }

        if let Some(at) = self.locate(&key) {
            return Ok(Some(self.replace_at(at, key, value, replace_key)));
        }

        let hash = self.route_hash(&key);
        let b = Self::bucket_index(hash, self.capacity());
        self.directory[b].store(key, value, hash)?;
        self.len += 1;
        Ok(None)
    }

    // Swap the new value (and key, if asked) into an occupied slot and hand
    // back what was displaced. With `replace_key` unset the new key is the
    // one returned.
    fn replace_at(&mut self, at: (usize, usize), key: K, value: V, replace_key: bool) -> (K, V) {
        match self.slot_mut(at) {
            Slot::Occupied {
                key: stored_key,
                value: stored_value,
                ..
            } => {
                let old_value = core::mem::replace(stored_value, value);
                let old_key = if replace_key {
                    core::mem::replace(stored_key, key)
                } else {
                    key
                };
                (old_key, old_value)
            }
            Slot::Vacant => unreachable!("locate only returns occupied slots"),
        }
    }

    /// Remove `key`. Returns whether it was present.
    ///
    /// Allowed while cursors are open; shrinking is then postponed to a
    /// later removal. If a due shrink cannot allocate, the removal is undone
    /// and the error returned.
    pub fn remove(&mut self, key: &K) -> Result<bool> {
        Ok(self.remove_returning_previous(key)?.is_some())
    }

    /// Remove `key`, returning the stored pair if it was present.
    pub fn remove_returning_previous(&mut self, key: &K) -> Result<Option<(K, V)>> {
        match self.locate(key) {
            Some(at) => self.remove_at(at).map(Some),
            None => Ok(None),
        }
    }

    fn remove_at(&mut self, (b, s): (usize, usize)) -> Result<(K, V)> {
        let Some((key, value, hash)) = self.directory[b].slots_mut()[s].take() else {
            unreachable!("remove_at is only called on occupied slots");
        };
        self.len -= 1;

        let capacity = self.capacity();
        if capacity > MIN_CAPACITY && self.len * 4 <= capacity {
            if !self.cursors.is_quiescent() {
                log::debug!(
                    "shrink of hash table postponed: {} cursor(s) open ({} entries, {} buckets)",
                    self.cursors.live(),
                    self.len,
                    capacity
                );
            } else if let Err(e) = self.resize(capacity / 2) {
                // The resize left the directory untouched, so the vacated
                // slot is still where the entry came from.
                self.directory[b].restore(s, key, value, hash);
                self.len += 1;
                return Err(e);
            }
        }

        Ok((key, value))
    }

    /// Remove every entry. Slot storage is kept, capacity does not change.
    ///
    /// # Panics
    /// If a cursor is open on the table.
    #[track_caller]
    pub fn clear(&mut self) {
        self.cursors.assert_quiescent("clear");
        for bucket in &mut self.directory {
            bucket.vacate_all();
        }
        self.len = 0;
    }

    /// Rebuild the directory with `new_capacity` buckets.
    ///
    /// Every allocation is made before the first entry moves, so a failure
    /// leaves the table exactly as it was.
    fn resize(&mut self, new_capacity: usize) -> Result<()> {
        debug_assert!(self.cursors.is_quiescent());
        debug_assert!(new_capacity >= MIN_CAPACITY);

        let old_capacity = self.capacity();
        match self.try_resize(new_capacity) {
            Ok(()) => {
                log::debug!(
                    "resized hash table from {} to {} buckets ({} entries)",
                    old_capacity,
                    new_capacity,
                    self.len
                );
                Ok(())
            }
            Err(e) => {
                log::warn!(
                    "failed to resize hash table from {} to {} buckets: {}",
                    old_capacity,
                    new_capacity,
                    e
                );
                Err(e)
            }
        }
    }

    fn try_resize(&mut self, new_capacity: usize) -> Result<()> {
        #[cfg(test)]
        if core::mem::take(&mut self.fail_next_resize) {
            if let Err(source) = Vec::<u8>::new().try_reserve_exact(usize::MAX) {
                return Err(TableError::Alloc {
                    what: "buckets",
                    requested: new_capacity,
                    source,
                });
            }
        }

        let mut directory: Vec<Bucket<K, V>> = Vec::new();
        directory
            .try_reserve_exact(new_capacity)
            .map_err(|source| TableError::Alloc {
                what: "buckets",
                requested: new_capacity,
                source,
            })?;
        directory.resize_with(new_capacity, Bucket::new);

        let mut incoming: Vec<usize> = Vec::new();
        incoming
            .try_reserve_exact(new_capacity)
            .map_err(|source| TableError::Alloc {
                what: "rehash counters",
                requested: new_capacity,
                source,
            })?;
        incoming.resize(new_capacity, 0);
        for bucket in &self.directory {
            for slot in bucket.slots() {
                if let Slot::Occupied { hash, .. } = slot {
                    incoming[Self::bucket_index(*hash, new_capacity)] += 1;
                }
            }
        }
        for (bucket, &n) in directory.iter_mut().zip(&incoming) {
            if n > 0 {
                bucket.reserve_exact(n)?;
            }
        }

        let old = core::mem::replace(&mut self.directory, directory);
        for mut bucket in old {
            for (key, value, hash) in bucket.drain_occupied() {
                let b = Self::bucket_index(hash, new_capacity);
                self.directory[b].push_reserved(key, value, hash);
            }
        }
        debug_assert_eq!(
            self.directory.iter().map(Bucket::occupied).sum::<usize>(),
            self.len
        );
        Ok(())
    }

    /// Open a cursor positioned before the first entry.
    pub fn open_iterator(&mut self) -> Cursor {
        self.cursors.open()
    }

    /// Return a cursor to the table.
    ///
    /// # Panics
    /// If the cursor was opened on a different table.
    #[track_caller]
    pub fn close_iterator(&mut self, cursor: Cursor) {
        self.cursors.close(cursor);
    }

    /// Move the cursor to the next live entry and return it, or `None` once
    /// every bucket has been passed. Entries removed before the cursor
    /// reaches them are skipped.
    #[track_caller]
    pub fn advance(&mut self, cursor: &Cursor) -> Option<(&K, &V)> {
        let (mut b, mut s) = match self.cursors.position(cursor) {
            Position::BeforeFirst => (0, 0),
            Position::At { bucket, slot } => (bucket, slot + 1),
            Position::Exhausted => return None,
        };

        let next = loop {
            let Some(bucket) = self.directory.get(b) else {
                break Position::Exhausted;
            };
            match bucket.slots()[s.min(bucket.slots().len())..]
                .iter()
                .position(Slot::is_occupied)
            {
                Some(offset) => {
                    break Position::At {
                        bucket: b,
                        slot: s + offset,
                    }
                }
                None => {
                    b += 1;
                    s = 0;
                }
            }
        };

        self.cursors.set_position(cursor, next);
        match next {
            Position::At { bucket, slot } => self.directory[bucket].slots()[slot].entry(),
            _ => None,
        }
    }

    /// Replace the value under the cursor, returning the previous one.
    ///
    /// Does nothing and returns `None` if the cursor has not been advanced,
    /// is exhausted, or its entry has been removed; `value` is dropped in
    /// that case.
    #[track_caller]
    pub fn set_current_value(&mut self, cursor: &Cursor, value: V) -> Option<V> {
        match self.cursors.position(cursor) {
            Position::At { bucket, slot } => self
                .slot_mut((bucket, slot))
                .entry_mut()
                .map(|(_, v)| core::mem::replace(v, value)),
            _ => None,
        }
    }

    /// Remove the entry under the cursor. The cursor keeps its place and the
    /// next [`advance`](Self::advance) continues with the following entry.
    #[track_caller]
    pub fn remove_current(&mut self, cursor: &Cursor) -> Option<(K, V)> {
        let Position::At { bucket, slot } = self.cursors.position(cursor) else {
            return None;
        };
        let (key, value, _) = self.slot_mut((bucket, slot)).take()?;
        self.len -= 1;
        Some((key, value))
    }

    /// Keys of all live entries, in bucket order.
    pub fn keys(&self) -> Vec<&K> {
        self.iter().map(|(k, _)| k).collect()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.directory.iter(),
            slots: Default::default(),
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            remaining: self.len,
            buckets: self.directory.iter_mut(),
            slots: Default::default(),
        }
    }

    /// Write a slot-by-slot listing of the table for debugging. The format
    /// is not stable.
    pub fn dump<W: io::Write>(&self, mut out: W) -> io::Result<()>
    where
        K: fmt::Debug,
        V: fmt::Debug,
    {
        writeln!(out, "entries: {}", self.len)?;
        writeln!(out, "buckets: {}", self.capacity())?;
        for (b, bucket) in self.directory.iter().enumerate() {
            writeln!(out, "bucket {b:04}")?;
            for (s, slot) in bucket.slots().iter().enumerate() {
                match slot {
                    Slot::Occupied { key, value, hash } => {
                        writeln!(out, "  entry {s:02}  key={key:?} value={value:?} hash={hash}")?
                    }
                    Slot::Vacant => writeln!(out, "  entry {s:02}")?,
                }
            }
        }
        Ok(())
    }
}

impl<K, V> HashTable<K, V>
where
    K: Hash + Eq + 'static,
{
    /// Create a table hashing keys through their [`Hash`] impl with `build`
    /// and comparing them with `==`.
    pub fn with_build_hasher<S>(build: S) -> Self
    where
        S: BuildHasher + 'static,
    {
        Self::new(move |k: &K| hash_with(&build, k), |a: &K, b: &K| a == b)
    }

    pub fn with_default_hasher() -> Self {
        Self::with_build_hasher(DefaultHashBuilder::default())
    }
}

impl<K, V> Default for HashTable<K, V>
where
    K: Hash + Eq + 'static,
{
    fn default() -> Self {
        Self::with_default_hasher()
    }
}

impl<K, V> Drop for HashTable<K, V> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.cursors.is_quiescent(),
                "hash table dropped while {} cursor(s) are open",
                self.cursors.live()
            );
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HashTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

fn empty_directory<K, V>(capacity: usize) -> Vec<Bucket<K, V>> {
    let mut directory = Vec::with_capacity(capacity);
    directory.resize_with(capacity, Bucket::new);
    directory
}

/// Borrowing iterator over the live entries of a [`HashTable`].
pub struct Iter<'a, K, V> {
    buckets: core::slice::Iter<'a, Bucket<K, V>>,
    slots: core::slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            for slot in self.slots.by_ref() {
                if let Some(entry) = slot.entry() {
                    self.remaining -= 1;
                    return Some(entry);
                }
            }
            self.slots = self.buckets.next()?.slots().iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Borrowing iterator with mutable access to values.
pub struct IterMut<'a, K, V> {
    buckets: core::slice::IterMut<'a, Bucket<K, V>>,
    slots: core::slice::IterMut<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            for slot in self.slots.by_ref() {
                if let Some(entry) = slot.entry_mut() {
                    self.remaining -= 1;
                    return Some(entry);
                }
            }
            self.slots = self.buckets.next()?.slots_mut().iter_mut();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<'a, K, V> IntoIterator for &'a HashTable<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
