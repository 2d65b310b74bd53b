//! Bounded transposition table with least-recently-used eviction.
//!
//! Probing promotes the entry to most-recently-used, so entries that keep
//! proving useful survive while stale ones age out of the bounded map.

use std::num::NonZeroUsize;

use chess::ChessMove;
use lru::LruCache;

/// How a stored score relates to the true value of the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// The score is exact (the search closed the window).
    Exact,
    /// The score failed high: the true value is at least this.
    Lower,
    /// The score failed low: the true value is at most this.
    Upper,
}

/// One cached search result.
#[derive(Debug, Clone, Copy)]
pub struct TtEntry {
    /// Best move found for the position; never the null move.
    pub best_move: ChessMove,
    /// Score from the searching side's perspective.
    pub score: i32,
    /// Depth the entry was searched to.
    pub depth: i32,
    /// Score bound kind.
    pub bound: Bound,
}

/// Transposition table keyed by the 64-bit zobrist hash.
pub struct TranspositionTable {
    entries: LruCache<u64, TtEntry>,
}

impl TranspositionTable {
    /// Create a table sized for `mb` megabytes worth of entries.
    pub fn new(mb: usize) -> Self {
        Self {
            entries: LruCache::new(Self::capacity_for(mb)),
        }
    }

    /// Resize to `mb` megabytes, evicting oldest entries if shrinking.
    pub fn set_size_mb(&mut self, mb: usize) {
        self.entries.resize(Self::capacity_for(mb));
    }

    fn capacity_for(mb: usize) -> NonZeroUsize {
        let max_entries = (2 * 1024 * 1024 * mb) / std::mem::size_of::<TtEntry>();
        NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN)
    }

    /// Look up a position. A hit becomes the most-recently-used entry.
    pub fn probe(&mut self, hash: u64) -> Option<TtEntry> {
        self.entries.get(&hash).copied()
    }

    /// Insert or overwrite unconditionally; callers gate replacement.
    /// A full table evicts its least-recently-used entry.
    pub fn store(&mut self, hash: u64, entry: TtEntry) {
        self.entries.put(hash, entry);
    }

    /// Drop every entry, keeping the capacity.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
