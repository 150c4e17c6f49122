//! bucketed-map: a single-threaded, separately chained hash table with
//! pluggable hash/equality functions and cursors that tolerate removal.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a small associative container whose only non-trivial invariants
//!   are the resize protocol and the interplay between open cursors and
//!   mutation, each kept in its own layer.
//! - Layers:
//!   - Bucket / Slot: a growable array of `Occupied | Vacant` slots. Removal
//!     vacates in place; a later insert into the same bucket reuses the hole.
//!   - HashTable<K, V>: the directory of buckets, the live-entry count and
//!     the hash/equality functions. Routes `hash % capacity` and owns the
//!     grow/shrink policy.
//!   - CursorRegistry / Cursor: explicit iteration handles that do not borrow
//!     the table. The registry's size is the table's live-iterator count.
//!
//! Constraints
//! - Single-threaded: no locking; cursors are `!Send`/`!Sync`.
//! - Capacity is 4 at creation and only ever doubled or halved, never below 4.
//! - `len <= capacity`: an insert grows first when `len >= capacity`.
//! - A removal shrinks when `len * 4 <= capacity`, unless a cursor is open.
//!
//! Routing hash
//! - `hash_fn` returns a `u32`. Zero is reserved as the unused-slot sentinel,
//!   so a key hashing to zero is routed as if it hashed to one. Each slot
//!   stores its routing hash as a `NonZeroU32`; resizing reuses the stored
//!   hash and never calls `hash_fn` again.
//!
//! Resize protocol
//! - A fresh directory is allocated and every destination bucket reserves
//!   exactly the slots it will receive before any entry moves. Allocation
//!   failure therefore leaves the old directory untouched and is reported as
//!   [`TableError::Alloc`]; no partial resize is ever observed.
//!
//! Cursor policy
//! - While any cursor is open: lookups are allowed; removal is allowed and
//!   only vacates (no shrink), so cursor positions stay valid; `insert` and
//!   `clear` panic. A cursor visits each entry live at open time at most
//!   once, and skips entries removed before it reaches them.
//! - Cursors are linear: `close_iterator` consumes them, and dropping one
//!   without closing panics.
//! - Dropping a table with open cursors trips a debug assertion.
//!
//! Error policy
//! - Allocation failures are `Result`s. Contract violations (mutating with
//!   open cursors, foreign cursors) are panics. A missing key is `None` or
//!   `false`.

mod bucket;
pub mod cursor;
pub mod error;
pub mod hash_funcs;
pub mod hash_table;
mod hash_table_proptest;

// Public surface
pub use cursor::Cursor;
pub use error::{Result, TableError};
pub use hash_funcs::{equal_i32, equal_string, hash_i32, hash_string, hash_with};
pub use hash_table::{HashTable, InsertOutcome, Iter, IterMut, MIN_CAPACITY};
