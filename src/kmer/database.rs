/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A bounded position store for every k-mer code of the unique database.
//!
//! For each code over the alphabet the database keeps the absolute
//! positions at which the code occurs in the unique material, together with
//! the id of the owning unique fragment. It is optimised for many appends
//! followed by streamed scans: insertions go to a bounded buffer first and
//! are merged into the flat arrays in sorted batches.

use crate::encseq::Encseq;
use crate::error::{Error, Result};
use rdst::{RadixKey, RadixSort};
use sux::bits::BitFieldVec;
use sux::traits::{BitFieldSlice, BitFieldSliceMut};

/// Codes seen more often than `cutoff / DELETE_FACTOR` are suppressed.
const DELETE_FACTOR: u64 = 1;
/// Deleted codes are restored when a new batch drops them below
/// `cutoff / RESTORE_FACTOR` under a mean cutoff.
const RESTORE_FACTOR: u64 = 2;

/// A buffered k-mer: code and buffer-relative position packed into one
/// radix-sortable key, the owning unique id alongside.
#[derive(Clone, Copy, Debug)]
struct SbKmer {
    key: u64,
    id: u64,
}

impl SbKmer {
    #[inline]
    fn new(code: u64, relpos: u64, id: u64) -> Self {
        debug_assert!(relpos <= u32::MAX as u64);
        SbKmer {
            key: (code << 32) | relpos,
            id,
        }
    }

    #[inline]
    fn code(&self) -> u64 {
        self.key >> 32
    }

    #[inline]
    fn relpos(&self) -> u64 {
        self.key & 0xffff_ffff
    }
}

impl RadixKey for SbKmer {
    const LEVELS: usize = 8;

    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        (self.key >> (level * 8)) as u8
    }
}

/// A borrowed view on the positions of one code: an index range into the
/// database's flat arrays. Views stay valid until the next mutation of the
/// database; the build driver resets its window at every mutation point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KmerView {
    pub start: usize,
    pub count: usize,
}

/// The k-mer position database.
#[derive(Debug)]
pub struct KmerDatabase {
    num_codes: u64,
    kmer_size: u32,
    /// Running start of each code's run in `positions`; `num_codes + 1`
    /// entries, the last one is the total count.
    offset: Vec<u64>,
    /// Per-code number of k-mers ever seen; the extra last slot holds the
    /// overall total.
    seen_counts: Vec<u64>,
    positions: Vec<u64>,
    unique_ids: Vec<u64>,
    /// One bit per code, set while the code is suppressed by the cutoff.
    deleted: BitFieldVec<u64>,
    seen_codes: u64,
    min_occ: u64,
    min_code: u64,
    last_size: u64,
    cutoff: u64,
    min_cutoff: u64,
    mean_fraction: u64,
    cutoff_enabled: bool,
    mean_cutoff: bool,
    prune_enabled: bool,
    buffer: Vec<SbKmer>,
    sb_max: usize,
    sb_offset: u64,
    intervals: Vec<(u64, u64)>,
    interval_ids: Vec<u64>,
    intervals_kmer_count: u64,
}

impl KmerDatabase {
    /// Creates an empty database for `alphabet_size^kmer_size` codes with an
    /// insertion buffer of at most `sb_max` k-mers.
    pub fn new(
        alphabet_size: u32,
        kmer_size: u32,
        sb_max: usize,
        total_length: u64,
    ) -> Result<Self> {
        if kmer_size == 0 {
            return Err(Error::InvalidArgument("kmersize must be positive".into()));
        }
        let num_codes = (alphabet_size as u64)
            .checked_pow(kmer_size)
            .filter(|&n| n <= 1 << 34)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "kmersize {kmer_size} over an alphabet of {alphabet_size} needs too large a code table"
                ))
            })?;
        let initial = ((total_length / 100) as usize).max(sb_max);
        let mut positions = Vec::new();
        let mut unique_ids = Vec::new();
        positions.reserve(initial.min(1 << 20));
        unique_ids.reserve(initial.min(1 << 20));
        Ok(KmerDatabase {
            num_codes,
            kmer_size,
            offset: vec![0; num_codes as usize + 1],
            seen_counts: vec![0; num_codes as usize + 1],
            positions,
            unique_ids,
            deleted: BitFieldVec::new(1, num_codes as usize),
            seen_codes: 0,
            min_occ: 0,
            min_code: num_codes + 1,
            last_size: 0,
            cutoff: 0,
            min_cutoff: 0,
            mean_fraction: 0,
            cutoff_enabled: false,
            mean_cutoff: false,
            prune_enabled: false,
            buffer: Vec::with_capacity(sb_max),
            sb_max,
            sb_offset: 0,
            intervals: Vec::new(),
            interval_ids: Vec::new(),
            intervals_kmer_count: 0,
        })
    }

    /// Inserts a single k-mer directly into the flat arrays.
    ///
    /// This shifts every higher-code position; batched insertion through
    /// [`add_interval`](Self::add_interval) is the fast path.
    pub fn add_kmer(&mut self, code: u64, startpos: u64, id: u64) {
        debug_assert!(code < self.num_codes);
        let end = self.offset[code as usize + 1] as usize;
        if end > self.offset[code as usize] as usize {
            debug_assert!(self.positions[end - 1] < startpos);
            debug_assert!(self.unique_ids[end - 1] <= id);
        }
        self.positions.insert(end, startpos);
        self.unique_ids.insert(end, id);
        for off in self.offset[code as usize + 1..].iter_mut() {
            *off += 1;
        }
    }

    /// Enqueues all k-mers of the inclusive range `[start, end]`; ranges too
    /// large for the buffer are split and flushed eagerly.
    pub fn add_interval(&mut self, es: &Encseq, mut start: u64, end: u64, id: u64) {
        let kmersize = self.kmer_size as u64;
        debug_assert!(start + (kmersize - 1) <= end);
        if let Some(&(_, prev_end)) = self.intervals.last() {
            debug_assert!(start > prev_end);
        }

        let mut interval_size = end + 1 - (kmersize - 1) - start;

        if self.intervals_kmer_count != 0
            && interval_size + self.intervals_kmer_count >= self.sb_max as u64
        {
            self.flush(es);
        }

        // split intervals that do not fit the buffer on their own
        while interval_size > self.sb_max as u64 {
            let split_end = start + self.sb_max as u64 + (kmersize - 1) - 1;
            self.intervals.push((start, split_end));
            self.interval_ids.push(id);
            self.intervals_kmer_count += self.sb_max as u64;
            self.flush(es);
            interval_size -= self.sb_max as u64;
            start += self.sb_max as u64;
        }

        self.intervals.push((start, end));
        self.interval_ids.push(id);
        self.intervals_kmer_count += interval_size;
    }

    /// Materialises the pending intervals, sorts the buffer and merges it
    /// into the flat arrays.
    pub fn flush(&mut self, es: &Encseq) {
        if self.intervals.is_empty() {
            return;
        }
        self.buffer.clear();
        self.sb_offset = self.intervals[0].0;
        let kmersize = self.kmer_size;
        let intervals = std::mem::take(&mut self.intervals);
        let interval_ids = std::mem::take(&mut self.interval_ids);
        let mut iter = es.kmer_iter(kmersize, 0);
        for (&(start, end), &id) in intervals.iter().zip(&interval_ids) {
            iter.reset(start);
            for kc in iter.by_ref() {
                if kc.startpos > end + 1 - kmersize as u64 {
                    break;
                }
                if !kc.has_special {
                    self.add_kmer_to_sb(kc.code, kc.startpos, id);
                }
            }
        }
        self.intervals = intervals;
        self.intervals.clear();
        self.interval_ids = interval_ids;
        self.interval_ids.clear();
        self.intervals_kmer_count = 0;
        self.buffer.radix_sort_unstable();
        self.merge();
    }

    pub(crate) fn add_kmer_to_sb(&mut self, code: u64, startpos: u64, id: u64) {
        debug_assert!(self.buffer.len() < self.sb_max);
        self.buffer.push(SbKmer::new(code, startpos - self.sb_offset, id));
    }

    /// Accounts the sorted buffer in the seen counters, applies the deletion
    /// and restore protocol, and returns how many buffered k-mers survive.
    fn preprocess_buffer(&mut self) -> usize {
        let size_sb = self.buffer.len();
        let mut preprocessed = size_sb;
        let mut i = 0;
        while i < size_sb {
            let code = self.buffer[i].code() as usize;
            let mut run = 0u64;
            while i < size_sb && self.buffer[i].code() as usize == code {
                run += 1;
                i += 1;
            }
            if self.seen_counts[code] == 0 {
                self.seen_codes += 1;
            }
            self.seen_counts[code] += run;
            self.seen_counts[self.num_codes as usize] += run;
            if self.cutoff_enabled && self.deleted.get(code) != 0 {
                if self.mean_cutoff && self.seen_counts[code] < self.cutoff / RESTORE_FACTOR {
                    self.deleted.set(code, 0);
                } else {
                    preprocessed -= run as usize;
                }
            }
        }
        if self.mean_cutoff {
            self.cutoff = (self.mean_occ() / self.mean_fraction) * DELETE_FACTOR;
            if self.cutoff < self.min_cutoff {
                self.cutoff = self.min_cutoff;
            } else if self.cutoff < self.min_occ() {
                self.cutoff = self.min_occ();
            }
        }
        preprocessed
    }

    /// Merges the sorted buffer into the flat arrays with a single
    /// right-to-left sweep that shifts higher-code runs out of the way.
    pub(crate) fn merge(&mut self) {
        let size_sb = self.buffer.len();
        let mut preprocessed = self.preprocess_buffer();
        if preprocessed > 0 {
            let old_total = self.offset[self.num_codes as usize] as usize;
            let new_total = old_total + preprocessed;
            self.positions.resize(new_total, 0);
            self.unique_ids.resize(new_total, 0);

            let mut sb_idx = size_sb;
            let mut current_min_occ = u64::MAX;
            let mut current_min_code = 0u64;
            let mut code_plus = self.num_codes as usize;
            while code_plus > 0 && preprocessed != 0 {
                let code = code_plus - 1;
                let left = self.offset[code] as usize;
                let right = self.offset[code_plus] as usize;
                let mut occ = (right - left) as u64;
                let was_deleted = self.deleted.get(code) != 0;

                self.offset[code_plus] += preprocessed as u64;

                // add new positions from the buffer, last to first
                while preprocessed > 0 && sb_idx > 0 {
                    let kmer = self.buffer[sb_idx - 1];
                    if kmer.code() as usize != code {
                        break;
                    }
                    if !self.cutoff_enabled || !was_deleted {
                        let new_pos = right + preprocessed - 1;
                        self.positions[new_pos] = self.sb_offset + kmer.relpos();
                        self.unique_ids[new_pos] = kmer.id;
                        preprocessed -= 1;
                        occ += 1;
                        if code as u64 == self.min_code {
                            self.min_occ += 1;
                        }
                    }
                    sb_idx -= 1;
                }
                if occ != 0 && occ < current_min_occ {
                    current_min_occ = occ;
                    current_min_code = code as u64;
                }
                // shift the previously stored run of this code to the right
                if left < right && preprocessed > 0 {
                    self.positions.copy_within(left..right, left + preprocessed);
                    self.unique_ids.copy_within(left..right, left + preprocessed);
                }
                code_plus -= 1;
            }
            debug_assert_eq!(preprocessed, 0);
            if current_min_occ < self.min_occ || self.min_occ == 0 {
                self.min_occ = current_min_occ;
                self.min_code = current_min_code;
            }
        }
        self.buffer.clear();
        if self.prune_enabled
            && self.last_size + self.last_size / 10 <= self.offset[self.num_codes as usize]
        {
            self.prune();
            self.last_size = self.offset[self.num_codes as usize];
        }
    }

    /// Physically removes the position runs of codes over the cutoff.
    fn prune(&mut self) {
        let num_codes = self.num_codes as usize;
        let mut deleted_cnt = 0usize;
        let mut left = 0usize;
        let mut right = 0usize;
        let mut in_delete = false;
        for code in 0..num_codes {
            let current_left = self.offset[code] as usize;
            right = self.offset[code + 1] as usize;
            self.offset[code] -= deleted_cnt as u64;
            if self.seen_counts[code] > self.cutoff && self.deleted.get(code) == 0 {
                if !in_delete && deleted_cnt > 0 {
                    self.positions
                        .copy_within(left..current_left, left - deleted_cnt);
                    self.unique_ids
                        .copy_within(left..current_left, left - deleted_cnt);
                }
                in_delete = true;
                deleted_cnt += right - current_left;
                self.deleted.set(code, 1);
            } else if in_delete {
                left = current_left;
                in_delete = false;
            }
        }
        if !in_delete && deleted_cnt > 0 {
            self.positions.copy_within(left..right, left - deleted_cnt);
            self.unique_ids.copy_within(left..right, left - deleted_cnt);
        }
        self.offset[num_codes] -= deleted_cnt as u64;
        let total = self.offset[num_codes] as usize;
        self.positions.truncate(total);
        self.unique_ids.truncate(total);
    }

    /// The positions stored for `code`, or an empty view when the code is
    /// over the cutoff.
    pub fn get_startpos(&self, code: u64) -> KmerView {
        debug_assert!(code < self.num_codes);
        let start = self.offset[code as usize] as usize;
        let mut count = (self.offset[code as usize + 1] - self.offset[code as usize]) as usize;
        if self.mean_cutoff
            && count as u64 > self.min_cutoff
            && count as u64 > self.cutoff / DELETE_FACTOR
        {
            count = 0;
        } else if self.cutoff_enabled && !self.mean_cutoff && count as u64 > self.cutoff {
            count = 0;
        }
        KmerView { start, count }
    }

    /// Resolves a view into its position and unique-id slices.
    pub fn view_slices(&self, view: KmerView) -> (&[u64], &[u64]) {
        (
            &self.positions[view.start..view.start + view.count],
            &self.unique_ids[view.start..view.start + view.count],
        )
    }

    pub fn set_cutoff(&mut self, cutoff: u64) {
        debug_assert!(cutoff != 0);
        self.cutoff = cutoff;
        self.cutoff_enabled = true;
    }

    pub fn disable_cutoff(&mut self) {
        self.cutoff_enabled = false;
    }

    pub fn use_mean_cutoff(&mut self, mean_fraction: u64, min_cutoff: u64) {
        debug_assert!(mean_fraction != 0 && min_cutoff != 0);
        self.cutoff_enabled = true;
        self.mean_cutoff = true;
        self.mean_fraction = mean_fraction;
        self.min_cutoff = min_cutoff;
    }

    pub fn set_prune(&mut self) {
        debug_assert!(self.cutoff_enabled);
        self.prune_enabled = true;
    }

    pub fn disable_prune(&mut self) {
        self.prune_enabled = false;
    }

    pub fn cutoff_enabled(&self) -> bool {
        self.cutoff_enabled
    }

    pub fn prune_enabled(&self) -> bool {
        self.prune_enabled
    }

    pub(crate) fn is_deleted(&self, code: u64) -> bool {
        self.deleted.get(code as usize) != 0
    }

    /// Number of positions currently stored.
    pub fn kmer_count(&self) -> u64 {
        self.offset[self.num_codes as usize]
    }

    /// Mean number of occurrences over all codes seen so far.
    pub fn mean_occ(&self) -> u64 {
        if self.seen_codes == 0 {
            return 0;
        }
        self.seen_counts[self.num_codes as usize] / self.seen_codes
    }

    /// Smallest number of occurrences of any stored code.
    pub fn min_occ(&self) -> u64 {
        if self.offset[self.num_codes as usize] == 0 {
            return 0;
        }
        self.min_occ
    }

    /// Bytes of the deleted-code bitmap, packed 64 codes per word.
    fn deleted_bits_size(&self) -> usize {
        (self.num_codes as usize).div_ceil(64) * 8
    }

    /// Bytes currently allocated for the store.
    pub fn byte_size(&self) -> usize {
        self.positions.capacity() * 8
            + self.unique_ids.capacity() * 8
            + 2 * (self.num_codes as usize + 1) * 8
            + self.deleted_bits_size()
    }

    /// Bytes in use for the store.
    pub fn used_size(&self) -> usize {
        self.kmer_count() as usize * 8
            + 2 * (self.num_codes as usize + 1) * 8
            + self.deleted_bits_size()
    }

    /// Verifies offset monotonicity and per-code position ordering.
    pub fn consistency_check(&self) -> Result<()> {
        let mut start = 0u64;
        for code in 0..self.num_codes as usize {
            let end = self.offset[code + 1];
            if start > end {
                return Err(Error::Corrupt(format!(
                    "kmer database offset not monotone at code {code}"
                )));
            }
            for j in start as usize + 1..end as usize {
                if self.positions[j - 1] >= self.positions[j] {
                    return Err(Error::Corrupt(format!(
                        "kmer database positions not increasing at code {code}"
                    )));
                }
                if self.unique_ids[j - 1] > self.unique_ids[j] {
                    return Err(Error::Corrupt(format!(
                        "kmer database ids not sorted at code {code}"
                    )));
                }
            }
            start = end;
        }
        Ok(())
    }

    /// Compares the stored tables of two databases.
    pub fn compare(a: &KmerDatabase, b: &KmerDatabase) -> Result<()> {
        if a.num_codes != b.num_codes {
            return Err(Error::Corrupt(format!(
                "kmer databases differ in code count: {} vs {}",
                a.num_codes, b.num_codes
            )));
        }
        if a.offset != b.offset {
            return Err(Error::Corrupt("kmer databases differ in offsets".into()));
        }
        let total = a.kmer_count() as usize;
        if a.positions[..total] != b.positions[..total]
            || a.unique_ids[..total] != b.unique_ids[..total]
        {
            return Err(Error::Corrupt("kmer databases differ in positions".into()));
        }
        Ok(())
    }

    /// Logs the per-code frequencies, or every position in verbose mode.
    pub fn print(&self, verbose: bool) {
        for code in 0..self.num_codes as usize {
            let start = self.offset[code] as usize;
            let end = self.offset[code + 1] as usize;
            if start < end {
                if verbose {
                    log::info!("kmer {code}: {:?}", &self.positions[start..end]);
                } else {
                    log::info!("kmer {code}: {}", end - start);
                }
            }
        }
        log::info!("number of kmers: {}", self.kmer_count());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encseq::{Alphabet, EncseqBuilder};

    const K: u32 = 1;
    const ALPHABET_SIZE: u32 = 4;

    fn test_encseq() -> Encseq {
        // A C C T A G G T C T = 0 1 1 3 0 2 2 3 1 3
        let mut b = EncseqBuilder::new(Alphabet::Dna);
        b.add_sequence("t", b"acctaggtct").unwrap();
        b.build().unwrap()
    }

    #[test]
    fn buffer_sorting() {
        let es = test_encseq();
        let mut sb_test = KmerDatabase::new(ALPHABET_SIZE, K, 8, es.total_length()).unwrap();
        let unsorted_codes = [2u64, 0, 3, 1, 2, 2, 3, 0];
        let unsorted_starts = [2u64, 5, 9, 0, 3, 6, 15, 7];
        for (&code, &start) in unsorted_codes.iter().zip(&unsorted_starts) {
            sb_test.add_kmer_to_sb(code, start, 0);
        }
        sb_test.buffer.radix_sort_unstable();
        let codes = [0u64, 0, 1, 2, 2, 2, 3, 3];
        let starts = [5u64, 7, 0, 2, 3, 6, 9, 15];
        for (idx, kmer) in sb_test.buffer.iter().enumerate() {
            assert_eq!(kmer.code(), codes[idx]);
            assert_eq!(kmer.relpos(), starts[idx]);
        }
    }

    #[test]
    fn direct_adds() {
        let es = test_encseq();
        let mut kdb = KmerDatabase::new(ALPHABET_SIZE, K, 6, es.total_length()).unwrap();
        let seq = [0u64, 1, 1, 3, 0, 2, 2, 3, 1, 3];
        for (pos, &code) in seq.iter().enumerate() {
            kdb.add_kmer(code, pos as u64, 0);
        }
        kdb.consistency_check().unwrap();
        assert_eq!(&kdb.offset, &[0, 2, 5, 7, 10]);
        assert_eq!(&kdb.positions, &[0, 4, 1, 2, 8, 5, 6, 3, 7, 9]);
    }

    #[test]
    fn oversized_intervals() {
        let es = test_encseq();
        let max_nu_kmers = 6usize;
        let mut compare_kdb =
            KmerDatabase::new(ALPHABET_SIZE, K, max_nu_kmers, es.total_length()).unwrap();
        let seq = [0u64, 1, 1, 3, 0, 2, 2, 3, 1, 3];
        for (pos, &code) in seq.iter().enumerate() {
            compare_kdb.add_kmer(code, pos as u64, 0);
        }
        let mut kdb =
            KmerDatabase::new(ALPHABET_SIZE, K, max_nu_kmers, es.total_length()).unwrap();
        kdb.add_interval(&es, 0, max_nu_kmers as u64 + 1, 0);
        kdb.add_interval(&es, max_nu_kmers as u64 + 2, es.total_length(), 0);
        kdb.flush(&es);
        kdb.consistency_check().unwrap();
        KmerDatabase::compare(&kdb, &compare_kdb).unwrap();
    }

    #[test]
    fn merge_into_empty() {
        let es = test_encseq();
        let mut empty_kdb = KmerDatabase::new(ALPHABET_SIZE, K, 6, es.total_length()).unwrap();
        let sb_codes = [0u64, 0, 1, 2, 2, 3];
        let sb_starts = [14u64, 15, 11, 12, 13, 10];
        for (&code, &start) in sb_codes.iter().zip(&sb_starts) {
            empty_kdb.add_kmer_to_sb(code, start, 0);
        }
        empty_kdb.merge();
        empty_kdb.consistency_check().unwrap();
        assert_eq!(&empty_kdb.offset, &[0, 2, 3, 5, 6]);
        assert_eq!(&empty_kdb.positions, &sb_starts);
    }

    #[test]
    fn merge_into_filled() {
        let es = test_encseq();
        let mut kdb = KmerDatabase::new(ALPHABET_SIZE, K, 6, es.total_length()).unwrap();
        let mut compare_kdb = KmerDatabase::new(ALPHABET_SIZE, K, 6, es.total_length()).unwrap();
        let seq = [0u64, 1, 1, 3, 0, 2, 2, 3, 1, 3];
        for (pos, &code) in seq.iter().enumerate() {
            kdb.add_kmer(code, pos as u64, 0);
            compare_kdb.add_kmer(code, pos as u64, 0);
        }
        let sb_codes = [0u64, 0, 1, 2, 2, 3];
        let sb_starts = [14u64, 15, 11, 12, 13, 10];
        for (&code, &start) in sb_codes.iter().zip(&sb_starts) {
            compare_kdb.add_kmer(code, start, 0);
            kdb.add_kmer_to_sb(code, start, 0);
        }
        kdb.merge();
        kdb.consistency_check().unwrap();
        compare_kdb.consistency_check().unwrap();
        KmerDatabase::compare(&kdb, &compare_kdb).unwrap();
        assert_eq!(kdb.min_occ(), 4);
        for code in 0..4u64 {
            let view = kdb.get_startpos(code);
            let (pos, _) = kdb.view_slices(view);
            let (cpos, _) = compare_kdb.view_slices(compare_kdb.get_startpos(code));
            assert_eq!(pos, cpos);
        }
    }

    #[test]
    fn cutoff_suppresses_and_prunes() {
        // 30 a's: code 0 occurs at every position
        let mut b = EncseqBuilder::new(Alphabet::Dna);
        b.add_sequence("a", &[b'a'; 30]).unwrap();
        let es = b.build().unwrap();
        let mut kdb = KmerDatabase::new(ALPHABET_SIZE, 5, 16, es.total_length()).unwrap();
        kdb.set_cutoff(4);
        kdb.set_prune();
        kdb.add_interval(&es, 0, es.total_length() - 1, 0);
        kdb.flush(&es);
        assert!(kdb.is_deleted(0));
        assert_eq!(kdb.get_startpos(0).count, 0);
        kdb.consistency_check().unwrap();
    }

    #[test]
    fn cutoff_monotone() {
        let es = test_encseq();
        let mut plain = KmerDatabase::new(ALPHABET_SIZE, K, 16, es.total_length()).unwrap();
        let mut cut = KmerDatabase::new(ALPHABET_SIZE, K, 16, es.total_length()).unwrap();
        cut.set_cutoff(2);
        for kdb in [&mut plain, &mut cut] {
            kdb.add_interval(&es, 0, es.total_length() - 1, 0);
            kdb.flush(&es);
        }
        for code in 0..4u64 {
            assert!(cut.get_startpos(code).count <= plain.get_startpos(code).count);
        }
    }
}
