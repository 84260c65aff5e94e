/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Last-hit-per-diagonal stores for the seed filter.
//!
//! A seed pairing position `i` in the unique store with query position `j`
//! lies on diagonal `d = j - i`. Before a seed is extended, the filter
//! requires a prior hit on the same diagonal within the seed window; the
//! stores below remember the most recent `i` per diagonal.
//!
//! Two interchangeable implementations exist: a dense vector over every
//! possible diagonal (constant time, linear memory in the input length)
//! and a sparse sorted array with an ordered addition buffer that is
//! spliced in whenever it fills up. Sparse entries whose `i` falls out of
//! the current unique block are marked dead and swept out once their
//! share exceeds a configurable percentage.

use std::collections::BTreeMap;

/// Marker for an unset diagonal.
pub const DIAG_UNDEF: u64 = u64::MAX;

/// Dense store: one slot per diagonal.
#[derive(Debug)]
pub struct FullDiags {
    space: Vec<u64>,
}

impl FullDiags {
    pub fn new(num_diagonals: u64) -> Self {
        FullDiags {
            space: vec![DIAG_UNDEF; num_diagonals as usize],
        }
    }

    #[inline]
    pub fn get(&self, d: u64) -> u64 {
        self.space[d as usize]
    }

    /// Records hit `i` on diagonal `d`. A previous hit is kept while it is
    /// at least `i_min` (same unique block) and within one k-mer of `i`, so
    /// seed distances can keep growing.
    pub fn set(&mut self, d: u64, i: u64, i_min: u64, kmersize: u32) {
        let slot = &mut self.space[d as usize];
        if *slot == DIAG_UNDEF || *slot < i_min || *slot + kmersize as u64 - 1 < i {
            *slot = i;
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Diag {
    d: u64,
    i: u64,
}

/// Where a subsequent [`SparseDiags::store`] should write, as found by
/// [`SparseDiags::lookup`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Reuse this index of the sorted array (exact match or dead entry).
    Array(usize),
    /// Update the addition buffer entry for the diagonal.
    Buffered,
    /// No reusable place; insert into the addition buffer.
    None,
}

/// Sparse store: sorted array plus an ordered addition buffer.
#[derive(Debug)]
pub struct SparseDiags {
    space: Vec<Diag>,
    additions: BTreeMap<u64, u64>,
    additions_cap: usize,
    marked: usize,
    max_used: usize,
    clean_percent: u32,
}

impl SparseDiags {
    pub fn new(additions_cap: usize, clean_percent: u32) -> Self {
        SparseDiags {
            space: Vec::with_capacity(additions_cap),
            additions: BTreeMap::new(),
            additions_cap: additions_cap.max(1),
            marked: 0,
            max_used: 0,
            clean_percent,
        }
    }

    /// Index of the rightmost array entry with `d <= key`, if any.
    fn idx_last_leq(&self, key: u64) -> Option<usize> {
        let n = self.space.partition_point(|e| e.d <= key);
        n.checked_sub(1)
    }

    /// Returns the last hit on `d` (or [`DIAG_UNDEF`]) and the slot a new
    /// hit should go to.
    pub fn lookup(&self, d: u64) -> (u64, Slot) {
        let mut slot = Slot::None;
        let mut result = DIAG_UNDEF;
        if let Some(idx) = self.idx_last_leq(d) {
            let entry = self.space[idx];
            if entry.d == d {
                return (entry.i, Slot::Array(idx));
            }
            if entry.i == DIAG_UNDEF {
                // a dead predecessor can be rewritten in place without
                // breaking the order
                slot = Slot::Array(idx);
            }
        }
        if let Some(&i) = self.additions.get(&d) {
            result = i;
            slot = Slot::Buffered;
        }
        (result, slot)
    }

    /// Records hit `i` on diagonal `d` through the slot found by
    /// [`lookup`](Self::lookup).
    pub fn store(&mut self, d: u64, i: u64, i_min: u64, kmersize: u32, slot: Slot) {
        match slot {
            Slot::Array(idx) => {
                let entry = &mut self.space[idx];
                entry.d = d;
                if entry.i == DIAG_UNDEF || entry.i < i_min || entry.i + kmersize as u64 - 1 < i {
                    entry.i = i;
                }
            }
            Slot::Buffered => {
                let entry = self.additions.get_mut(&d).expect("buffered slot exists");
                if *entry == DIAG_UNDEF || *entry < i_min || *entry + kmersize as u64 - 1 < i {
                    *entry = i;
                }
            }
            Slot::None => {
                if self.additions.len() == self.additions_cap {
                    if self.space.len() / 100 * (self.clean_percent as usize) < self.marked {
                        self.clean();
                    }
                    self.merge_additions();
                }
                self.additions.insert(d, i);
            }
        }
    }

    /// Marks entries of the previous unique block as dead: diagonals above
    /// `d_cur` up to the one for `d_min` whose hits are at most `i_max`.
    pub fn mark_block(&mut self, i_max: u64, d_min: u64, d_cur: u64) {
        let Some(mut idx) = self.idx_last_leq(d_min) else {
            return;
        };
        loop {
            let entry = &mut self.space[idx];
            if entry.d <= d_cur || entry.i > i_max {
                break;
            }
            entry.i = DIAG_UNDEF;
            self.marked += 1;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
    }

    /// Drops dead entries from the sorted array.
    fn clean(&mut self) {
        self.space.retain(|e| e.i != DIAG_UNDEF);
        self.marked = 0;
    }

    /// Splices the addition buffer into the sorted array.
    fn merge_additions(&mut self) {
        if self.additions.is_empty() {
            return;
        }
        let old_len = self.space.len();
        let add_len = self.additions.len();
        self.space.resize(
            old_len + add_len,
            Diag {
                d: 0,
                i: DIAG_UNDEF,
            },
        );
        let mut dest = old_len + add_len;
        let mut src = old_len;
        let additions = std::mem::take(&mut self.additions);
        for (&d, &i) in additions.iter().rev() {
            while src > 0 && self.space[src - 1].d > d {
                self.space[dest - 1] = self.space[src - 1];
                dest -= 1;
                src -= 1;
            }
            self.space[dest - 1] = Diag { d, i };
            dest -= 1;
        }
        debug_assert_eq!(dest, src);
        if self.space.len() > self.max_used {
            self.max_used = self.space.len();
        }
    }

    /// High-water mark of the sorted array, for logging.
    pub fn max_used(&self) -> usize {
        self.max_used.max(self.space.len())
    }
}

/// The store actually used by a build, chosen by configuration.
#[derive(Debug)]
pub enum DiagStore {
    Full(FullDiags),
    Sparse(SparseDiags),
}

impl DiagStore {
    /// Returns the last hit on `d` and the write-back slot.
    pub fn lookup(&self, d: u64) -> (u64, Slot) {
        match self {
            DiagStore::Full(full) => (full.get(d), Slot::None),
            DiagStore::Sparse(sparse) => sparse.lookup(d),
        }
    }

    pub fn store(&mut self, d: u64, i: u64, i_min: u64, kmersize: u32, slot: Slot) {
        match self {
            DiagStore::Full(full) => full.set(d, i, i_min, kmersize),
            DiagStore::Sparse(sparse) => sparse.store(d, i, i_min, kmersize, slot),
        }
    }

    pub fn mark_block(&mut self, i_max: u64, d_min: u64, d_cur: u64) {
        if let DiagStore::Sparse(sparse) = self {
            sparse.mark_block(i_max, d_min, d_cur);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn full_keeps_recent_hit() {
        let mut diags = FullDiags::new(100);
        assert_eq!(diags.get(10), DIAG_UNDEF);
        diags.set(10, 50, 0, 8);
        assert_eq!(diags.get(10), 50);
        // within one kmer: the old hit survives so distances can grow
        diags.set(10, 55, 0, 8);
        assert_eq!(diags.get(10), 50);
        // further than one kmer: replaced
        diags.set(10, 60, 0, 8);
        assert_eq!(diags.get(10), 60);
        // stale hit from an older unique block: replaced
        diags.set(10, 61, 61, 8);
        assert_eq!(diags.get(10), 61);
    }

    #[test]
    fn sparse_buffer_and_merge() {
        let mut diags = SparseDiags::new(4, 20);
        for d in [30u64, 10, 20, 40] {
            let (i, slot) = diags.lookup(d);
            assert_eq!(i, DIAG_UNDEF);
            diags.store(d, d + 100, 0, 8, slot);
        }
        // buffered entries are visible before any merge
        let (i, slot) = diags.lookup(20);
        assert_eq!(i, 120);
        assert_eq!(slot, Slot::Buffered);
        // the fifth insertion forces a merge
        let (_, slot) = diags.lookup(50);
        diags.store(50, 160, 0, 8, slot);
        assert_eq!(diags.space.len(), 4);
        let ds: Vec<u64> = diags.space.iter().map(|e| e.d).collect();
        assert_eq!(ds, vec![10, 20, 30, 40]);
        let (i, _) = diags.lookup(30);
        assert_eq!(i, 130);
        let (i, _) = diags.lookup(50);
        assert_eq!(i, 160);
    }

    #[test]
    fn sparse_mark_and_clean() {
        let mut diags = SparseDiags::new(4, 0);
        for d in [10u64, 20, 30, 40] {
            let (_, slot) = diags.lookup(d);
            diags.store(d, d, 0, 8, slot);
        }
        // force the buffer into the array
        let (_, slot) = diags.lookup(50);
        diags.store(50, 50, 0, 8, slot);
        // mark hits <= 30 on diagonals below 35, not crossing d = 15
        diags.mark_block(30, 35, 15);
        assert_eq!(diags.marked, 2); // d = 30 and d = 20
        let (i, _) = diags.lookup(30);
        assert_eq!(i, DIAG_UNDEF);
        let (i, _) = diags.lookup(20);
        assert_eq!(i, DIAG_UNDEF);
        let (i, _) = diags.lookup(10);
        assert_eq!(i, 10);
        // fill the buffer again; with clean_percent 0 the next overflow
        // sweeps the dead entries before merging
        for d in [5u64, 15, 45] {
            let (_, slot) = diags.lookup(d);
            diags.store(d, d, 0, 8, slot);
        }
        let (_, slot) = diags.lookup(55);
        diags.store(55, 55, 0, 8, slot);
        assert!(diags.space.iter().all(|e| e.i != DIAG_UNDEF));
        assert!(diags.space.windows(2).all(|w| w[0].d < w[1].d));
    }

    #[test]
    fn dead_slot_is_reused_in_place() {
        let mut diags = SparseDiags::new(2, 100);
        for d in [10u64, 30] {
            let (_, slot) = diags.lookup(d);
            diags.store(d, d, 0, 8, slot);
        }
        let (_, slot) = diags.lookup(40);
        diags.store(40, 40, 0, 8, slot); // merges 10 and 30
        diags.mark_block(100, 35, 10); // kills d = 30
        let (i, slot) = diags.lookup(35);
        assert_eq!(i, DIAG_UNDEF);
        assert_eq!(slot, Slot::Array(1));
        diags.store(35, 99, 0, 8, slot);
        let (i, _) = diags.lookup(35);
        assert_eq!(i, 99);
        // order is intact
        assert!(diags.space.windows(2).all(|w| w[0].d < w[1].d));
    }
}
