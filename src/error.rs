//! Error type for fallible table operations.

use std::collections::TryReserveError;
use thiserror::Error;

/// Recoverable failures reported by [`HashTable`](crate::HashTable).
///
/// Misuse such as inserting while a cursor is open is not represented here;
/// those are programming errors and panic.
#[derive(Debug, Error)]
pub enum TableError {
    /// Reserving storage for `requested` more elements of `what` failed.
    /// The table is left exactly as it was before the call.
    #[error("cannot allocate {what}: {requested} more element(s) requested")]
    Alloc {
        what: &'static str,
        requested: usize,
        #[source]
        source: TryReserveError,
    },
}

pub type Result<T, E = TableError> = core::result::Result<T, E>;
