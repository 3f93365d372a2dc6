//! Shared transposition table.
//!
//! Entries are two 64-bit words per slot with `key = real_key ^ value`, so
//! a torn concurrent write decodes to a different key and reads as a miss
//! rather than corrupt data. Under that invariant the words only need
//! relaxed atomic loads and stores; a torn pair costs a probe miss, never
//! an illegal read. There is deliberately no lock anywhere in this table.
//!
//! Slots live in 64-byte buckets of four; replacement prefers empty slots,
//! then stale generations, then shallower depths, and an upper-bound entry
//! overwriting its own key inherits the previous proven best move.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::board::types::Move;
use crate::board::zobrist::Hash;

use super::{Bound, Depth, Score};

const CACHE_LINE_SIZE: usize = 64;
const ENTRIES_PER_BUCKET: usize = 4;
const BUCKETS_PER_MIB: usize = (1 << 20) / CACHE_LINE_SIZE;

const GEN_BITS: u64 = 6;
const GEN_LIMIT: u8 = 1 << GEN_BITS;

// Value word layout, low to high.
const BOUND_SHIFT: u64 = 0; // 2 bits
const SCORE_SHIFT: u64 = 2; // 16 bits
const MOVE_SHIFT: u64 = 18; // 29 bits
const DEPTH_SHIFT: u64 = 47; // 8 bits
const GEN_SHIFT: u64 = 55; // 6 bits
const TT_PV_SHIFT: u64 = 61; // 1 bit
const WAS_EXACT_OR_LB_SHIFT: u64 = 62; // 1 bit

/// A decoded table entry; plain data, detached from the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableEntry {
    key: Hash,
    value: u64,
}

impl TableEntry {
    #[must_use]
    pub fn new(
        key: Hash,
        bound: Bound,
        score: Score,
        best_move: Move,
        depth: Depth,
        tt_pv: bool,
    ) -> Self {
        debug_assert!(Score::from(score as i16) == score, "score overflows i16");
        let mut value = 0u64;
        value |= bound.index() << BOUND_SHIFT;
        value |= u64::from(score as i16 as u16) << SCORE_SHIFT;
        value |= u64::from(best_move.data()) << MOVE_SHIFT;
        value |= u64::from((depth.clamp(0, 255)) as u8) << DEPTH_SHIFT;
        value |= u64::from(tt_pv) << TT_PV_SHIFT;
        value |= u64::from(bound != Bound::Upper) << WAS_EXACT_OR_LB_SHIFT;
        TableEntry {
            key: key ^ value,
            value,
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> Hash {
        self.key ^ self.value
    }

    #[inline]
    #[must_use]
    pub fn bound(&self) -> Bound {
        Bound::from_index((self.value >> BOUND_SHIFT) & 0x3)
    }

    #[inline]
    #[must_use]
    pub fn score(&self) -> Score {
        Score::from(((self.value >> SCORE_SHIFT) & 0xFFFF) as u16 as i16)
    }

    #[inline]
    #[must_use]
    pub fn best_move(&self) -> Move {
        Move::from_data(((self.value >> MOVE_SHIFT) & 0x1FFF_FFFF) as u32)
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> Depth {
        ((self.value >> DEPTH_SHIFT) & 0xFF) as Depth
    }

    #[inline]
    #[must_use]
    pub fn gen(&self) -> u8 {
        ((self.value >> GEN_SHIFT) & (u64::from(GEN_LIMIT) - 1)) as u8
    }

    #[inline]
    #[must_use]
    pub fn tt_pv(&self) -> bool {
        (self.value >> TT_PV_SHIFT) & 1 != 0
    }

    #[inline]
    #[must_use]
    pub fn was_exact_or_lb(&self) -> bool {
        (self.value >> WAS_EXACT_OR_LB_SHIFT) & 1 != 0
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key == 0 && self.value == 0
    }

    #[must_use]
    fn with_gen(self, gen: u8) -> Self {
        let key = self.key();
        let mut value = self.value & !(((u64::from(GEN_LIMIT)) - 1) << GEN_SHIFT);
        value |= u64::from(gen) << GEN_SHIFT;
        TableEntry {
            key: key ^ value,
            value,
        }
    }

    /// If this entry is an upper bound replacing an entry for the same key
    /// that once held an exact or lower bound, keep the old best move: a
    /// score-only tightening must not erase a proven cutoff move.
    #[must_use]
    fn merged_with(self, old: &TableEntry) -> Self {
        if self.bound() == Bound::Upper && old.was_exact_or_lb() && self.key() == old.key() {
            let key = self.key();
            let mut value = self.value & !(0x1FFF_FFFFu64 << MOVE_SHIFT);
            value |= u64::from(old.best_move().data()) << MOVE_SHIFT;
            value |= 1u64 << WAS_EXACT_OR_LB_SHIFT;
            TableEntry {
                key: key ^ value,
                value,
            }
        } else {
            self
        }
    }
}

#[repr(align(64))]
struct Bucket {
    slots: [(AtomicU64, AtomicU64); ENTRIES_PER_BUCKET],
}

impl Bucket {
    fn empty() -> Self {
        Bucket {
            slots: Default::default(),
        }
    }

    #[inline]
    fn load(&self, idx: usize) -> TableEntry {
        TableEntry {
            key: self.slots[idx].0.load(Ordering::Relaxed),
            value: self.slots[idx].1.load(Ordering::Relaxed),
        }
    }

    #[inline]
    fn store(&self, idx: usize, entry: TableEntry) {
        self.slots[idx].0.store(entry.key, Ordering::Relaxed);
        self.slots[idx].1.store(entry.value, Ordering::Relaxed);
    }
}

/// The shared table. All methods take `&self`; workers race benignly under
/// the XOR-key protocol.
pub struct TranspositionTable {
    current_gen: std::sync::atomic::AtomicU8,
    buckets: Vec<Bucket>,
}

impl TranspositionTable {
    /// Allocate with the given size in MiB.
    #[must_use]
    pub fn new(size_mib: usize) -> Self {
        let count = (size_mib * BUCKETS_PER_MIB).max(1);
        let mut buckets = Vec::with_capacity(count);
        buckets.resize_with(count, Bucket::empty);
        TranspositionTable {
            current_gen: std::sync::atomic::AtomicU8::new(0),
            buckets,
        }
    }

    #[inline]
    fn bucket_of(&self, key: Hash) -> &Bucket {
        let idx = (key % self.buckets.len() as u64) as usize;
        &self.buckets[idx]
    }

    pub fn clear(&self) {
        for bucket in &self.buckets {
            for idx in 0..ENTRIES_PER_BUCKET {
                bucket.store(idx, TableEntry { key: 0, value: 0 });
            }
        }
    }

    /// Drop all entries and reallocate to a new size.
    pub fn resize(&mut self, size_mib: usize) {
        let count = (size_mib * BUCKETS_PER_MIB).max(1);
        self.buckets.clear();
        self.buckets.resize_with(count, Bucket::empty);
    }

    /// Bump the generation; called at each top-level `go`.
    pub fn update_gen(&self) {
        let next = (self.current_gen.load(Ordering::Relaxed) + 1) % GEN_LIMIT;
        self.current_gen.store(next, Ordering::Relaxed);
    }

    #[must_use]
    pub fn gen(&self) -> u8 {
        self.current_gen.load(Ordering::Relaxed)
    }

    /// Probe for a key; on a hit the entry is re-stamped with the current
    /// generation.
    #[must_use]
    pub fn find(&self, key: Hash) -> Option<TableEntry> {
        let gen = self.gen();
        let bucket = self.bucket_of(key);
        for idx in 0..ENTRIES_PER_BUCKET {
            let entry = bucket.load(idx);
            if entry.key() == key && !entry.is_empty() {
                let stamped = entry.with_gen(gen);
                bucket.store(idx, stamped);
                return Some(stamped);
            }
        }
        None
    }

    /// Insert under the generation-aware replacement policy.
    pub fn insert(&self, entry: TableEntry) {
        const DEPTH_OFFSET: Depth = 2;
        let gen = self.gen();
        let bucket = self.bucket_of(entry.key());

        // Pick the weakest slot: a matching key short-circuits; otherwise
        // prefer empty, then stale-generation, then shallow entries.
        let mut worst_idx = 0;
        let mut worst = bucket.load(0);
        for idx in 0..ENTRIES_PER_BUCKET {
            let candidate = bucket.load(idx);
            if candidate.key() == entry.key() {
                worst_idx = idx;
                worst = candidate;
                break;
            }
            let candidate_current = candidate.gen() == gen && !candidate.is_empty();
            let worst_current = worst.gen() == gen && !worst.is_empty();
            let is_worse = (!candidate_current && worst_current)
                || (candidate.is_empty() && !worst.is_empty())
                || (candidate_current == worst_current && candidate.depth() < worst.depth());
            if is_worse {
                worst_idx = idx;
                worst = candidate;
            }
        }

        let should_replace = entry.bound() == Bound::Exact
            || entry.key() != worst.key()
            || entry.depth() + DEPTH_OFFSET >= worst.depth();
        if should_replace {
            bucket.store(worst_idx, entry.with_gen(gen).merged_with(&worst));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::{PieceType, Square};

    fn test_move() -> Move {
        Move::quiet(
            Square::from_name("e2").unwrap(),
            Square::from_name("e4").unwrap(),
            PieceType::Pawn,
        )
    }

    #[test]
    fn test_entry_round_trip() {
        let entry = TableEntry::new(0xDEAD_BEEF_1234_5678, Bound::Lower, -1234, test_move(), 17, true);
        assert_eq!(entry.key(), 0xDEAD_BEEF_1234_5678);
        assert_eq!(entry.bound(), Bound::Lower);
        assert_eq!(entry.score(), -1234);
        assert_eq!(entry.best_move(), test_move());
        assert_eq!(entry.depth(), 17);
        assert!(entry.tt_pv());
        assert!(entry.was_exact_or_lb());
    }

    #[test]
    fn test_xor_invariant_detects_torn_write() {
        let entry = TableEntry::new(42, Bound::Exact, 100, test_move(), 5, false);
        // Corrupting either word changes the recovered key.
        let torn = TableEntry {
            key: entry.key,
            value: entry.value ^ 0xFF00,
        };
        assert_ne!(torn.key(), 42);
    }

    #[test]
    fn test_find_after_insert() {
        let tt = TranspositionTable::new(1);
        let entry = TableEntry::new(991, Bound::Exact, 55, test_move(), 9, false);
        tt.insert(entry);
        let found = tt.find(991).expect("entry present");
        assert_eq!(found.score(), 55);
        assert_eq!(found.depth(), 9);
        assert!(tt.find(992).is_none());
    }

    #[test]
    fn test_generation_stamp_on_find(){
        let tt = TranspositionTable::new(1);
        tt.insert(TableEntry::new(7, Bound::Exact, 1, test_move(), 3, false));
        tt.update_gen();
        tt.update_gen();
        let found = tt.find(7).unwrap();
        assert_eq!(found.gen(), tt.gen());
        assert_eq!(found.key(), 7);
    }

    #[test]
    fn test_shallower_same_key_does_not_replace() {
        let tt = TranspositionTable::new(1);
        tt.insert(TableEntry::new(5, Bound::Lower, 10, test_move(), 20, false));
        // Depth 5 + 2 < 20: the deep entry survives a shallow non-exact one.
        tt.insert(TableEntry::new(5, Bound::Lower, -1, Move::null(), 5, false));
        assert_eq!(tt.find(5).unwrap().depth(), 20);
        // An exact entry always replaces.
        tt.insert(TableEntry::new(5, Bound::Exact, 77, test_move(), 1, false));
        assert_eq!(tt.find(5).unwrap().score(), 77);
    }

    #[test]
    fn test_upper_bound_merge_preserves_best_move() {
        let tt = TranspositionTable::new(1);
        tt.insert(TableEntry::new(5, Bound::Lower, 10, test_move(), 4, false));
        tt.insert(TableEntry::new(5, Bound::Upper, 3, Move::null(), 8, false));
        let found = tt.find(5).unwrap();
        assert_eq!(found.bound(), Bound::Upper);
        // The proven cutoff move from the lower-bound entry survives.
        assert_eq!(found.best_move(), test_move());
        assert!(found.was_exact_or_lb());
    }

    #[test]
    fn test_clear() {
        let tt = TranspositionTable::new(1);
        tt.insert(TableEntry::new(5, Bound::Exact, 10, test_move(), 4, false));
        tt.clear();
        assert!(tt.find(5).is_none());
    }

    #[test]
    fn test_gen_wraps_at_six_bits() {
        let tt = TranspositionTable::new(1);
        for _ in 0..GEN_LIMIT {
            tt.update_gen();
        }
        assert_eq!(tt.gen(), 0);
    }
}
