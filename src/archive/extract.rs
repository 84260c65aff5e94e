/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Reconstruction of arbitrary ranges of the original collection.

use super::Condenseq;
use crate::encseq::SEPARATOR;
use crate::error::{Error, Result};

/// An inclusive position range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeqRange {
    pub start: u64,
    pub end: u64,
}

impl SeqRange {
    pub fn new(start: u64, end: u64) -> Self {
        SeqRange { start, end }
    }

    /// Number of positions covered; ranges are never empty.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

impl Condenseq {
    /// Position of the next separator at or after `pos`, or 0 when `pos`
    /// lies in the last sequence (position 0 is never a separator).
    fn next_sep(&self, pos: u64) -> u64 {
        let seqidx = self.pos_to_seqnum(pos);
        if seqidx < self.orig_num_seq - 1 {
            self.ssptab.as_ref().expect("more than one sequence").get(seqidx)
        } else {
            0
        }
    }

    /// Copies unique bytes starting at `frompos` into `buf`, bounded by
    /// the unique's span and `topos`; returns the number of bytes.
    fn emit_unique(&self, id: usize, buf: &mut Vec<u8>, frompos: u64, topos: u64) -> usize {
        let unique = &self.uniques[id];
        debug_assert!(unique.orig_startpos <= frompos);
        let startoffset = frompos - unique.orig_startpos;
        debug_assert!(startoffset < unique.len as u64);
        let startpos = self.unique_startpos(id as u64) + startoffset;
        let unique_remaining = unique.len as u64 - startoffset;
        let target = topos - frompos + 1;
        let count = unique_remaining.min(target) as usize;
        let store = self.unique_store();
        buf.extend_from_slice(&store.codes()[startpos as usize..startpos as usize + count]);
        count
    }

    /// Replays link bytes starting at `frompos` into `buf` through the
    /// link's edit-script; returns the number of bytes.
    fn emit_link(
        &self,
        id: usize,
        buf: &mut Vec<u8>,
        scratch: &mut Vec<u8>,
        frompos: u64,
        topos: u64,
    ) -> Result<usize> {
        let link = &self.links[id];
        debug_assert!(link.orig_startpos <= frompos);
        let startoffset = frompos - link.orig_startpos;
        debug_assert!(startoffset < link.len as u64);
        let link_remaining = link.len as u64 - startoffset;
        let target = topos - frompos + 1;
        let endpos = if link_remaining < target {
            link.len as u64 - 1
        } else {
            startoffset + target - 1
        };
        let u_start = self.unique_startpos(link.unique_id as u64) + link.unique_offset as u64;
        let written = link.editscript.decode_v_range(
            self.unique_store(),
            u_start,
            startoffset,
            endpos,
            scratch,
        )?;
        buf.extend_from_slice(&scratch[..written]);
        Ok(written)
    }

    fn fill_ubuffer(&mut self, range: SeqRange) -> Result<usize> {
        if range.start > range.end || range.end >= self.orig_len {
            return Err(Error::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                len: self.orig_len,
            });
        }
        debug_assert!(!self.uniques.is_empty());
        debug_assert_eq!(self.uniques[0].orig_startpos, 0);

        let length = range.len() as usize;
        let mut buf = std::mem::take(&mut self.ubuffer);
        buf.clear();
        buf.reserve(length);
        let mut scratch = Vec::new();

        let mut nextsep = self.next_sep(range.start);

        let mut uid = self
            .unique_at(range.start)
            .expect("the archive starts with a unique");
        let mut unique = Some(uid);
        if self.uniques[uid].orig_startpos + self.uniques[uid].len as u64 <= range.start {
            uid += 1;
            unique = (uid < self.uniques.len()).then_some(uid);
        }

        let mut link = None;
        if !self.links.is_empty() {
            let mut lid = self.link_at(range.start).unwrap_or(0);
            if self.links[lid].orig_startpos + self.links[lid].len as u64 <= range.start {
                lid += 1;
                link = (lid < self.links.len()).then_some(lid);
            } else {
                link = Some(lid);
            }
        }

        while buf.len() < length {
            let cursor = range.start + buf.len() as u64;
            debug_assert!(
                (nextsep != 0 && nextsep == cursor) || unique.is_some() || link.is_some()
            );
            if nextsep != 0 && nextsep == cursor {
                buf.push(SEPARATOR);
                nextsep = self.next_sep(cursor + 1);
            } else if unique.is_some_and(|u| {
                link.is_none_or(|l| self.uniques[u].orig_startpos < self.links[l].orig_startpos)
            }) {
                let u = unique.unwrap();
                self.emit_unique(u, &mut buf, cursor, range.end);
                unique = (u + 1 < self.uniques.len()).then_some(u + 1);
            } else {
                let l = link.expect("a fragment covers the cursor");
                self.emit_link(l, &mut buf, &mut scratch, cursor, range.end)?;
                link = (l + 1 < self.links.len()).then_some(l + 1);
            }
        }
        debug_assert_eq!(buf.len(), length);
        self.ubuffer = buf;
        Ok(length)
    }

    /// Reconstructs the inclusive range in encoded form. The returned
    /// slice borrows an internal buffer that the next extraction reuses.
    pub fn extract_encoded_range(&mut self, range: SeqRange) -> Result<&[u8]> {
        let length = self.fill_ubuffer(range)?;
        Ok(&self.ubuffer[..length])
    }

    fn whole_seq_range(&self, seqnum: u64) -> SeqRange {
        let start = self.seqstartpos(seqnum);
        let end = if seqnum < self.orig_num_seq - 1 {
            // exclude the separator
            self.seqstartpos(seqnum + 1) - 2
        } else {
            self.orig_len - 1
        };
        SeqRange { start, end }
    }

    /// Reconstructs one whole sequence in encoded form.
    pub fn extract_encoded(&mut self, seqnum: u64) -> Result<&[u8]> {
        let range = self.whole_seq_range(seqnum);
        self.extract_encoded_range(range)
    }

    /// Reconstructs the inclusive range as characters, substituting
    /// `sepchar` for separators.
    pub fn extract_decoded_range(&mut self, range: SeqRange, sepchar: char) -> Result<&str> {
        let length = self.fill_ubuffer(range)?;
        let Condenseq {
            ubuffer,
            dbuffer,
            alphabet,
            ..
        } = self;
        dbuffer.clear();
        for &code in &ubuffer[..length] {
            dbuffer.push(if code == SEPARATOR {
                sepchar
            } else {
                alphabet.decode(code)
            });
        }
        Ok(&self.dbuffer)
    }

    /// Reconstructs one whole sequence as characters.
    pub fn extract_decoded(&mut self, seqnum: u64) -> Result<&str> {
        let range = self.whole_seq_range(seqnum);
        self.extract_decoded_range(range, '\0')
    }

    /// Invokes `callback` with the number of every sequence containing a
    /// region similar to unique `uid`: the unique's own sequence first,
    /// then one per referencing link. Returns the number of callbacks.
    pub fn each_redundant_seq<F>(&self, uid: u64, mut callback: F) -> Result<u64>
    where
        F: FnMut(u64) -> Result<()>,
    {
        let unique = &self.uniques[uid as usize];
        callback(self.pos_to_seqnum(unique.orig_startpos))?;
        let mut num_seqs = 1;
        for &lidx in &unique.links {
            let link = &self.links[lidx as usize];
            callback(self.pos_to_seqnum(link.orig_startpos))?;
            num_seqs += 1;
        }
        Ok(num_seqs)
    }

    /// Invokes `callback` once per region similar to the window `urange`
    /// (relative to unique `uid`), each extended left and right and
    /// clamped to its containing sequence. The unique's own region comes
    /// first. Returns the number of regions reported.
    pub fn each_redundant_range<F>(
        &self,
        uid: u64,
        urange: SeqRange,
        left_extend: u64,
        right_extend: u64,
        mut callback: F,
    ) -> Result<u64>
    where
        F: FnMut(u64, SeqRange) -> Result<()>,
    {
        debug_assert!(urange.start <= urange.end);
        let unique = &self.uniques[uid as usize];

        let seqnum = self.pos_to_seqnum(unique.orig_startpos);
        let seqstart = self.seqstartpos(seqnum);
        let seqend = seqstart + self.seqlength(seqnum) - 1;
        let extract = SeqRange {
            start: (unique.orig_startpos + urange.start)
                .saturating_sub(left_extend)
                .max(seqstart),
            end: (unique.orig_startpos + urange.end + right_extend).min(seqend),
        };
        debug_assert!(extract.start <= extract.end);
        callback(seqnum, extract)?;
        let mut num_ranges = 1;

        for &lidx in &unique.links {
            let link = &self.links[lidx as usize];
            let link_off = link.unique_offset as u64;
            let link_len = link.len as u64;
            // a link whose window misses the unique window is skipped; the
            // shifts below assume roughly similar source and target lengths
            if urange.end < link_off || urange.start > link_off + link_len - 1 {
                continue;
            }
            let seqnum = self.pos_to_seqnum(link.orig_startpos);
            let seqstart = self.seqstartpos(seqnum);
            let seqend = seqstart + self.seqlength(seqnum) - 1;

            let mut start = link.orig_startpos.saturating_sub(left_extend);
            if urange.start < link_off {
                start = start.saturating_sub(link_off - urange.start);
            } else {
                start += urange.start - link_off;
            }
            let start = start.max(seqstart);

            let mut end = link.orig_startpos + right_extend + link_len;
            if urange.end < link_off + link_len - 1 {
                end = end.saturating_sub((link_off + link_len - 1) - urange.end);
            } else {
                end += urange.end - (link_off + link_len - 1);
            }
            let end = end.min(seqend);

            debug_assert!(start <= end);
            callback(seqnum, SeqRange { start, end })?;
            num_ranges += 1;
        }
        Ok(num_ranges)
    }
}
