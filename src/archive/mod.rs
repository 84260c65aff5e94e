/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The fragment database: unique and link tables, separator and
//! description stores, and the query helpers over them.
//!
//! A [`Condenseq`] covers the original concatenation exactly once with
//! unique fragments (stored verbatim in the unique store), link fragments
//! (a reference into a unique plus an edit-script) and the separator
//! positions between sequences. Both tables are sorted by original start
//! position and append-only during a build.

mod extract;
mod gff3;
mod io;

pub use extract::SeqRange;

use crate::editscript::Editscript;
use crate::encseq::{Alphabet, Encseq};
use crate::error::{Error, Result};
use crate::intset::IntSet;
use std::borrow::Cow;
use std::path::PathBuf;

/// Width of fragment lengths, unique ids and unique offsets.
#[cfg(not(feature = "wide-lengths"))]
pub type CesLen = u32;
/// Width of fragment lengths, unique ids and unique offsets.
#[cfg(feature = "wide-lengths")]
pub type CesLen = u64;

/// Largest value fitting a [`CesLen`] slot.
pub const CES_LEN_MAX: u64 = CesLen::MAX as u64;

/// Converts a length into the configured width, failing instead of
/// truncating.
pub(crate) fn ces_len(value: u64) -> Result<CesLen> {
    if value > CES_LEN_MAX {
        return Err(Error::WidthOverflow(value));
    }
    Ok(value as CesLen)
}

/// A region stored verbatim.
#[derive(Clone, Debug)]
pub struct Unique {
    pub orig_startpos: u64,
    pub len: CesLen,
    /// Indices of the links referencing this unique.
    pub links: Vec<u32>,
}

/// A region stored as a reference plus an edit-script.
#[derive(Clone, Debug)]
pub struct Link {
    pub orig_startpos: u64,
    pub len: CesLen,
    pub unique_id: CesLen,
    pub unique_offset: CesLen,
    pub editscript: Editscript,
}

/// How sequence descriptions are indexed into the id blob.
#[derive(Clone, Debug)]
enum DescIndex {
    /// Every id occupies the same number of bytes, padded with NULs.
    ConstLen(u64),
    /// Cumulative end offsets of the variable-length ids.
    Sds(IntSet),
}

/// The archive.
#[derive(Debug)]
pub struct Condenseq {
    alphabet: Alphabet,
    orig_len: u64,
    orig_num_seq: u64,
    /// Positions of the separators in the original coordinate system;
    /// absent for single-sequence collections.
    ssptab: Option<IntSet>,
    desc_index: DescIndex,
    ids: Vec<u8>,
    uniques: Vec<Unique>,
    links: Vec<Link>,
    unique_es: Option<Encseq>,
    filename: Option<PathBuf>,
    ubuffer: Vec<u8>,
    dbuffer: String,
}

fn id_len_of(desc: &str) -> usize {
    desc.bytes()
        .position(|b| b.is_ascii_whitespace() || b == 0)
        .unwrap_or(desc.len())
}

impl Condenseq {
    /// A fresh archive for the collection `orig`, with separator and
    /// description stores filled and empty fragment tables.
    pub fn new(orig: &Encseq) -> Self {
        let orig_num_seq = orig.num_sequences();
        let orig_len = orig.total_length();

        let ssptab = if orig_num_seq > 1 {
            let seps = orig.sep_positions();
            let mut set = IntSet::best_new(*seps.last().unwrap(), seps.len() as u64);
            for &pos in seps {
                set.add(pos).expect("separator positions increase");
            }
            Some(set)
        } else {
            None
        };

        let (desc_index, ids) = Self::process_descriptions(orig);

        Condenseq {
            alphabet: orig.alphabet(),
            orig_len,
            orig_num_seq,
            ssptab,
            desc_index,
            ids,
            uniques: Vec::new(),
            links: Vec::new(),
            unique_es: None,
            filename: None,
            ubuffer: Vec::new(),
            dbuffer: String::new(),
        }
    }

    /// Chooses, by size, between a constant id length and an int-set
    /// indexed blob of variable-length ids.
    fn process_descriptions(orig: &Encseq) -> (DescIndex, Vec<u8>) {
        let num = orig.num_sequences();
        let idlens: Vec<usize> = (0..num)
            .map(|n| id_len_of(orig.description(n)))
            .collect();
        let maxlen = idlens.iter().copied().max().unwrap_or(0);
        let total: u64 = idlens.iter().map(|&l| l as u64).sum();
        let wasted: u64 = idlens.iter().map(|&l| (maxlen - l) as u64).sum();
        let sds_size = IntSet::best_memory_size(total, num) as u64;

        if wasted < sds_size {
            log::info!(
                "descriptions use const len {maxlen}, wasting {wasted} bytes (sds would use {sds_size})"
            );
            let mut ids = Vec::with_capacity(maxlen * num as usize);
            for (n, &idlen) in idlens.iter().enumerate() {
                ids.extend_from_slice(&orig.description(n as u64).as_bytes()[..idlen]);
                ids.resize(ids.len() + maxlen - idlen, 0);
            }
            (DescIndex::ConstLen(maxlen as u64), ids)
        } else {
            log::info!(
                "descriptions use an sds table of {sds_size} bytes (const len would waste {wasted})"
            );
            let mut set = IntSet::best_new(total, num);
            let mut ids = Vec::with_capacity(total as usize);
            for (n, &idlen) in idlens.iter().enumerate() {
                ids.extend_from_slice(&orig.description(n as u64).as_bytes()[..idlen]);
                set.add(ids.len() as u64).expect("offsets increase");
            }
            (DescIndex::Sds(set), ids)
        }
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Length of the original concatenation, separators included.
    pub fn total_length(&self) -> u64 {
        self.orig_len
    }

    pub fn num_sequences(&self) -> u64 {
        self.orig_num_seq
    }

    pub fn num_uniques(&self) -> u64 {
        self.uniques.len() as u64
    }

    pub fn num_links(&self) -> u64 {
        self.links.len() as u64
    }

    pub fn uniques(&self) -> &[Unique] {
        &self.uniques
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn total_unique_len(&self) -> u64 {
        self.uniques.iter().map(|u| u.len as u64).sum()
    }

    pub fn total_link_len(&self) -> u64 {
        self.links.iter().map(|l| l.len as u64).sum()
    }

    /// Number of uniques long enough to be reference targets.
    pub fn count_relevant_uniques(&self, min_align_len: u64) -> u64 {
        self.uniques
            .iter()
            .filter(|u| u.len as u64 >= min_align_len)
            .count() as u64
    }

    /// The sequence containing `pos`.
    pub fn pos_to_seqnum(&self, pos: u64) -> u64 {
        match &self.ssptab {
            Some(set) => set.idx_smallest_geq(pos),
            None => 0,
        }
    }

    /// Start of sequence `seqnum` in the original coordinate system.
    pub fn seqstartpos(&self, seqnum: u64) -> u64 {
        if seqnum == 0 {
            0
        } else {
            self.ssptab.as_ref().expect("more than one sequence").get(seqnum - 1) + 1
        }
    }

    /// Length of sequence `seqnum`, separators excluded.
    pub fn seqlength(&self, seqnum: u64) -> u64 {
        let start = self.seqstartpos(seqnum);
        let end = if seqnum < self.orig_num_seq - 1 {
            self.ssptab.as_ref().expect("more than one sequence").get(seqnum)
        } else {
            self.orig_len
        };
        end - start
    }

    /// The id of sequence `seqnum`.
    pub fn description(&self, seqnum: u64) -> Cow<'_, str> {
        debug_assert!(seqnum < self.orig_num_seq);
        match &self.desc_index {
            DescIndex::ConstLen(id_len) => {
                let start = (seqnum * id_len) as usize;
                let mut slice = &self.ids[start..start + *id_len as usize];
                while let [rest @ .., 0] = slice {
                    slice = rest;
                }
                String::from_utf8_lossy(slice)
            }
            DescIndex::Sds(set) => {
                let end = set.get(seqnum) as usize;
                let start = if seqnum == 0 {
                    0
                } else {
                    set.get(seqnum - 1) as usize
                };
                String::from_utf8_lossy(&self.ids[start..end])
            }
        }
    }

    /// Appends a unique fragment; abutting uniques coalesce into one
    /// entry. Coalescing past the configured length width is an error,
    /// not a truncation.
    pub(crate) fn add_unique(&mut self, orig_startpos: u64, len: CesLen) -> Result<()> {
        debug_assert!(len != 0);
        if let Some(last) = self.uniques.last_mut() {
            if last.orig_startpos + last.len as u64 == orig_startpos {
                last.len = last
                    .len
                    .checked_add(len)
                    .ok_or(Error::WidthOverflow(last.len as u64 + len as u64))?;
                return Ok(());
            }
            debug_assert!(last.orig_startpos + (last.len as u64) < orig_startpos);
        }
        if let Some(last) = self.links.last() {
            debug_assert!(last.orig_startpos + last.len as u64 <= orig_startpos);
        }
        self.uniques.push(Unique {
            orig_startpos,
            len,
            links: Vec::new(),
        });
        Ok(())
    }

    /// Appends a link fragment and registers it with its unique.
    pub(crate) fn add_link(&mut self, link: Link) -> Result<()> {
        if let Some(last) = self.links.last() {
            debug_assert!(last.orig_startpos + last.len as u64 <= link.orig_startpos);
        }
        if let Some(last) = self.uniques.last() {
            debug_assert!(last.orig_startpos + last.len as u64 <= link.orig_startpos);
        }
        let idx = u32::try_from(self.links.len())
            .map_err(|_| Error::WidthOverflow(self.links.len() as u64))?;
        self.uniques[link.unique_id as usize].links.push(idx);
        self.links.push(link);
        Ok(())
    }

    /// Index of the rightmost unique starting at or before `pos`.
    pub fn unique_at(&self, pos: u64) -> Option<usize> {
        self.uniques
            .partition_point(|u| u.orig_startpos <= pos)
            .checked_sub(1)
    }

    /// Index of the rightmost link starting at or before `pos`.
    pub fn link_at(&self, pos: u64) -> Option<usize> {
        self.links
            .partition_point(|l| l.orig_startpos <= pos)
            .checked_sub(1)
    }

    /// Shifts a range relative to unique `uid` into coordinates relative
    /// to the containing original sequence; returns the sequence number.
    pub fn unique_range_to_seqrange(&self, uid: u64, range: &mut SeqRange) -> u64 {
        let unique = &self.uniques[uid as usize];
        let seqnum = self.pos_to_seqnum(unique.orig_startpos);
        let seqstart = self.seqstartpos(seqnum);
        range.start += unique.orig_startpos - seqstart;
        range.end += unique.orig_startpos - seqstart;
        seqnum
    }

    /// The edit-script of link `lid`.
    pub fn link_editscript(&self, lid: u64) -> &Editscript {
        &self.links[lid as usize].editscript
    }

    pub(crate) fn attach_unique_store(&mut self, es: Encseq) {
        self.unique_es = Some(es);
    }

    pub(crate) fn set_filename(&mut self, path: PathBuf) {
        self.filename = Some(path);
    }

    pub fn filename(&self) -> Option<&PathBuf> {
        self.filename.as_ref()
    }

    /// The encoded unique store.
    pub fn unique_store(&self) -> &Encseq {
        self.unique_es
            .as_ref()
            .expect("the unique store is attached after build or load")
    }

    /// Start of unique `uid` inside the unique store.
    pub(crate) fn unique_startpos(&self, uid: u64) -> u64 {
        self.unique_store().seqstartpos(uid)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encseq::EncseqBuilder;

    fn two_seqs() -> Encseq {
        let mut b = EncseqBuilder::new(Alphabet::Dna);
        b.add_sequence("first desc here", b"acgtacgtac").unwrap();
        b.add_sequence("second", b"ttttt").unwrap();
        b.build().unwrap()
    }

    #[test]
    fn sequence_accessors() {
        let es = two_seqs();
        let ces = Condenseq::new(&es);
        assert_eq!(ces.total_length(), 16);
        assert_eq!(ces.num_sequences(), 2);
        assert_eq!(ces.seqstartpos(0), 0);
        assert_eq!(ces.seqstartpos(1), 11);
        assert_eq!(ces.seqlength(0), 10);
        assert_eq!(ces.seqlength(1), 5);
        assert_eq!(ces.pos_to_seqnum(0), 0);
        assert_eq!(ces.pos_to_seqnum(9), 0);
        assert_eq!(ces.pos_to_seqnum(10), 0); // the separator belongs before
        assert_eq!(ces.pos_to_seqnum(11), 1);
        assert_eq!(ces.description(0), "first");
        assert_eq!(ces.description(1), "second");
    }

    #[test]
    fn uniques_coalesce() {
        let es = two_seqs();
        let mut ces = Condenseq::new(&es);
        ces.add_unique(0, 4).unwrap();
        ces.add_unique(4, 6).unwrap();
        assert_eq!(ces.num_uniques(), 1);
        assert_eq!(ces.uniques()[0].len, 10);
        ces.add_unique(11, 5).unwrap();
        assert_eq!(ces.num_uniques(), 2);
    }

    #[test]
    fn binary_searches() {
        let es = two_seqs();
        let mut ces = Condenseq::new(&es);
        ces.add_unique(0, 4).unwrap();
        ces.add_unique(11, 5).unwrap();
        assert_eq!(ces.unique_at(0), Some(0));
        assert_eq!(ces.unique_at(10), Some(0));
        assert_eq!(ces.unique_at(12), Some(1));
        assert_eq!(ces.link_at(3), None);
    }

    #[test]
    fn width_guard() {
        assert!(ces_len(12).is_ok());
        #[cfg(not(feature = "wide-lengths"))]
        assert!(matches!(
            ces_len(u32::MAX as u64 + 1),
            Err(Error::WidthOverflow(_))
        ));
    }
}
