//! Cursors: explicit, removal-safe iteration handles and the registry that
//! tracks them.
//!
//! A [`Cursor`] is a linear handle. It is minted by
//! [`HashTable::open_iterator`] and the only valid way to dispose of it is
//! to hand it back through [`HashTable::close_iterator`]; dropping it
//! panics. Because `close_iterator` consumes the cursor, closing the same
//! cursor twice does not compile.
//!
//! While any cursor is registered the table is in its iterating state:
//! insert and clear panic, and removals leave the bucket layout alone.
//!
//! [`HashTable::open_iterator`]: crate::HashTable::open_iterator
//! [`HashTable::close_iterator`]: crate::HashTable::close_iterator

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, Ordering};
use slotmap::SlotMap;

slotmap::new_key_type! {
    struct CursorKey;
}

/// Where a cursor currently points.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Position {
    BeforeFirst,
    At { bucket: usize, slot: usize },
    Exhausted,
}

/// External iteration handle over a [`HashTable`](crate::HashTable).
///
/// Holds no borrow of the table, so the table may be queried and entries
/// removed while the cursor is open.
#[must_use = "a cursor must be returned with `close_iterator`"]
pub struct Cursor {
    owner: u64,
    key: CursorKey,
    // Keep !Send + !Sync in line with the table's single-owner design.
    _nosend: PhantomData<*mut ()>,
}

impl core::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cursor")
            .field("owner", &self.owner)
            .field("key", &self.key)
            .finish()
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        // Fail fast on a leaked cursor; it would pin the table in its
        // iterating state forever. Skip while unwinding to avoid an abort.
        if !std::thread::panicking() {
            panic!("Cursor dropped without close_iterator");
        }
    }
}

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Per-table registry of open cursors and their positions.
#[derive(Debug)]
pub(crate) struct CursorRegistry {
    owner: u64,
    positions: SlotMap<CursorKey, Position>,
}

impl CursorRegistry {
    pub(crate) fn new() -> Self {
        Self {
            owner: NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed),
            positions: SlotMap::with_key(),
        }
    }

    /// Number of open cursors.
    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub(crate) fn is_quiescent(&self) -> bool {
        self.positions.is_empty()
    }

    /// Panic unless no cursor is open. `op` names the refused operation.
    #[inline]
    #[track_caller]
    pub(crate) fn assert_quiescent(&self, op: &str) {
        assert!(
            self.is_quiescent(),
            "cannot {op} a hash table while {} cursor(s) are open",
            self.live()
        );
    }

    pub(crate) fn open(&mut self) -> Cursor {
        let key = self.positions.insert(Position::BeforeFirst);
        log::trace!("cursor opened; {} live", self.live());
        Cursor {
            owner: self.owner,
            key,
            _nosend: PhantomData,
        }
    }

    #[track_caller]
    pub(crate) fn close(&mut self, cursor: Cursor) {
        self.check_owner(&cursor);
        let removed = self.positions.remove(cursor.key);
        assert!(removed.is_some(), "cursor closed more than once");
        core::mem::forget(cursor);
        log::trace!("cursor closed; {} live", self.live());
    }

    #[track_caller]
    pub(crate) fn position(&self, cursor: &Cursor) -> Position {
        self.check_owner(cursor);
        match self.positions.get(cursor.key) {
            Some(&pos) => pos,
            None => panic!("cursor is not open on this hash table"),
        }
    }

    #[track_caller]
    pub(crate) fn set_position(&mut self, cursor: &Cursor, pos: Position) {
        self.check_owner(cursor);
        match self.positions.get_mut(cursor.key) {
            Some(slot) => *slot = pos,
            None => panic!("cursor is not open on this hash table"),
        }
    }

    #[inline]
    #[track_caller]
    fn check_owner(&self, cursor: &Cursor) {
        assert!(
            cursor.owner == self.owner,
            "cursor belongs to a different hash table"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_close_track_live_count() {
        let mut r = CursorRegistry::new();
        assert!(r.is_quiescent());
        let a = r.open();
        let b = r.open();
        assert_eq!(r.live(), 2);
        assert_eq!(r.position(&a), Position::BeforeFirst);
        r.close(a);
        assert_eq!(r.live(), 1);
        r.close(b);
        assert!(r.is_quiescent());
    }

    #[test]
    fn positions_are_per_cursor() {
        let mut r = CursorRegistry::new();
        let a = r.open();
        let b = r.open();
        r.set_position(&a, Position::At { bucket: 2, slot: 1 });
        assert_eq!(r.position(&a), Position::At { bucket: 2, slot: 1 });
        assert_eq!(r.position(&b), Position::BeforeFirst);
        r.close(a);
        r.close(b);
    }

    #[test]
    fn assert_quiescent_panics_with_open_cursor() {
        let mut r = CursorRegistry::new();
        let c = r.open();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            r.assert_quiescent("insert into");
        }));
        assert!(res.is_err(), "expected a panic while a cursor is open");
        r.close(c);
        r.assert_quiescent("insert into");
    }

    #[test]
    fn foreign_cursor_is_rejected() {
        let mut mine = CursorRegistry::new();
        let mut other = CursorRegistry::new();
        let c = other.open();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            mine.position(&c);
        }));
        assert!(res.is_err(), "expected a panic for a foreign cursor");
        other.close(c);
        assert!(mine.is_quiescent());
    }

    #[test]
    fn dropping_an_open_cursor_panics() {
        let mut r = CursorRegistry::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let c = r.open();
            drop(c);
        }));
        assert!(res.is_err(), "expected leaked cursor to panic");
    }
}
