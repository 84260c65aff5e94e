/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The edit-script codec.
//!
//! An edit-script stores a pairwise alignment of a target `v` against a
//! source `u` in space proportional to the number of edit operations. The
//! payload is a packed array of fixed-width entries of
//! `⌈log2(A + 3)⌉` bits, where `A` is the alphabet cardinality: the values
//! `0..A-1` are alphabet symbols (`A - 1` doubling as the wildcard), `A`
//! is the deletion marker, `A + 1` opens a mismatch-or-deletion block and
//! `A + 2` an insertion block. Each block starts with its tag and an
//! unary-prefixed count of the matches preceding it; match runs at the
//! very end are kept in a separate 32-bit counter.

use crate::encseq::{Alphabet, Encseq, WILDCARD};
use crate::error::{Error, Result};
use crate::multieop::{Eop, Multieoplist};
use std::io::{Read, Write};
use sux::bits::BitFieldVec;
use sux::traits::{BitFieldSlice, BitFieldSliceCore};

/// Operation counts of a script, including the trailing matches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditscriptStats {
    pub matches: u64,
    pub mismatches: u64,
    pub insertions: u64,
    pub deletions: u64,
}

/// A packed edit-script. See the [module documentation](self).
#[derive(Clone, Debug)]
pub struct Editscript {
    space: BitFieldVec<u64>,
    trailing_matches: u32,
    /// The alphabet cardinality, which doubles as the deletion marker.
    del: u8,
    entry_size: u8,
}

fn bits_needed(value: u64) -> u8 {
    (u64::BITS - value.leading_zeros()) as u8
}

impl Editscript {
    /// An empty script for sequences over `alphabet`.
    pub fn new(alphabet: Alphabet) -> Self {
        Self::with_cardinality(alphabet.cardinality())
    }

    fn with_cardinality(cardinality: u32) -> Self {
        let entry_size = bits_needed(cardinality as u64 + 3);
        debug_assert!(entry_size <= 8);
        Editscript {
            space: BitFieldVec::new(entry_size as usize, 0),
            trailing_matches: 0,
            del: cardinality as u8,
            entry_size,
        }
    }

    /// Clears the content, keeping the entry width.
    pub fn reset(&mut self) {
        self.space = BitFieldVec::new(self.entry_size as usize, 0);
        self.trailing_matches = 0;
    }

    /// Builds a script from an alignment trace, reading target characters
    /// from `encseq` starting at `start`. The trace entries are walked in
    /// reverse, which is alignment order.
    pub fn from_trace(encseq: &Encseq, trace: &Multieoplist, start: u64) -> Result<Editscript> {
        let mut builder = EditscriptBuilder::new(encseq.alphabet());
        let mut vlen = 0u64;
        for (op, steps) in trace.iter_alignment() {
            for _ in 0..steps {
                match op {
                    Eop::Match => {
                        vlen += 1;
                        builder.add_match()?;
                    }
                    Eop::Mismatch => {
                        let c = encseq.get(start + vlen);
                        vlen += 1;
                        builder.add_mismatch(c);
                    }
                    Eop::Insertion => {
                        let c = encseq.get(start + vlen);
                        vlen += 1;
                        builder.add_insertion(c);
                    }
                    Eop::Deletion => builder.add_deletion(),
                }
            }
        }
        Ok(builder.finish())
    }

    #[inline]
    fn full_mask(&self) -> u64 {
        (1u64 << self.entry_size) - 1
    }

    #[inline]
    fn first_mask(&self) -> u64 {
        1u64 << (self.entry_size - 1)
    }

    #[inline]
    fn misdel_sym(&self) -> u64 {
        self.del as u64 + 1
    }

    #[inline]
    fn ins_sym(&self) -> u64 {
        self.del as u64 + 2
    }

    fn num_elems(&self) -> usize {
        self.space.len()
    }

    fn push_entry(&mut self, value: u64) {
        debug_assert!(value <= self.full_mask());
        self.space.push(value);
    }

    fn get_entry(&self, pos: &mut usize) -> u64 {
        let value = self.space.get(*pos);
        *pos += 1;
        value
    }

    /// Stores `value` as an unary-prefixed length: a single entry when it
    /// fits below the top bit, otherwise a run of full-mask entries whose
    /// one-bits count the following value entries.
    fn push_length(&mut self, value: u64) {
        if value < self.first_mask() {
            self.push_entry(value);
            return;
        }
        let mut num_elems = 0u32;
        let mut tmp = value;
        while tmp != 0 {
            num_elems += 1;
            tmp >>= self.entry_size;
        }
        let mut ones = (1u64 << num_elems) - 1;
        while ones & self.first_mask() != 0 {
            self.push_entry(self.full_mask());
            ones >>= self.entry_size;
        }
        if ones != 0 {
            while ones & self.first_mask() == 0 {
                ones <<= 1;
            }
        }
        self.push_entry(ones);
        let mut shift = num_elems * self.entry_size as u32;
        while num_elems != 0 {
            num_elems -= 1;
            shift -= self.entry_size as u32;
            self.push_entry((value >> shift) & self.full_mask());
        }
    }

    fn get_length(&self, pos: &mut usize) -> u64 {
        let first = self.get_entry(pos);
        if first & self.first_mask() == 0 {
            return first;
        }
        let mut num_elems = first;
        let mut elem = first;
        while elem == self.full_mask() {
            elem = self.get_entry(pos);
            if elem != 0 {
                num_elems = (num_elems << self.entry_size) | elem;
            }
        }
        while num_elems & 1 == 0 {
            num_elems >>= 1;
        }
        let mut value = 0u64;
        while num_elems != 0 {
            num_elems >>= 1;
            value = (value << self.entry_size) | self.get_entry(pos);
        }
        value
    }

    fn ops(&self) -> Ops<'_> {
        Ops {
            es: self,
            pos: 0,
            misdel: false,
            init: false,
            tail_done: false,
        }
    }

    /// Operation counts, computed by scanning.
    pub fn stats(&self) -> EditscriptStats {
        let mut stats = EditscriptStats::default();
        for op in self.ops() {
            match op {
                ScriptOp::MatchRun(n) => stats.matches += n,
                ScriptOp::Mismatch(_) => stats.mismatches += 1,
                ScriptOp::Deletion => stats.deletions += 1,
                ScriptOp::Insertion(_) => stats.insertions += 1,
            }
        }
        stats
    }

    /// Length of the source `u` spanned by this script.
    pub fn source_len(&self) -> u64 {
        let stats = self.stats();
        stats.matches + stats.mismatches + stats.deletions
    }

    /// Length of the target `v` produced by this script.
    pub fn target_len(&self) -> u64 {
        let stats = self.stats();
        stats.matches + stats.mismatches + stats.insertions
    }

    /// Number of `v` characters attributed to the source window
    /// `[srcfrom, srcfrom + srclen)`. Insertions at the left window edge
    /// are not counted.
    pub fn target_subseq_len(&self, srcfrom: u64, srclen: u64) -> u64 {
        let srcend = srcfrom + srclen;
        let mut upos = 0u64;
        let mut vlength = 0u64;
        for op in self.ops() {
            if upos >= srcend {
                break;
            }
            match op {
                ScriptOp::MatchRun(n) => {
                    if upos + n > srcfrom {
                        vlength += n;
                        if upos < srcfrom {
                            vlength -= srcfrom - upos;
                        }
                        if srcend < upos + n {
                            vlength -= (upos + n) - srcend;
                        }
                    }
                    upos += n;
                }
                ScriptOp::Mismatch(_) => {
                    if upos >= srcfrom {
                        vlength += 1;
                    }
                    upos += 1;
                }
                ScriptOp::Deletion => upos += 1,
                ScriptOp::Insertion(_) => {
                    if upos > srcfrom {
                        vlength += 1;
                    }
                }
            }
        }
        vlength
    }

    /// Writes the `v` characters attributed to the source window
    /// `[ufrom, uto]` (relative to `start` in the source encseq) into
    /// `buf` and returns their number.
    pub fn decode_u_range(
        &self,
        u: &Encseq,
        start: u64,
        ufrom: u64,
        uto: u64,
        buf: &mut Vec<u8>,
    ) -> Result<usize> {
        let ulow = start + ufrom;
        let uhigh = start + uto;
        let mut uidx = start;
        buf.clear();
        'outer: for op in self.ops() {
            match op {
                ScriptOp::MatchRun(n) => {
                    for _ in 0..n {
                        if uidx > uhigh {
                            break 'outer;
                        }
                        if uidx >= ulow {
                            buf.push(u.get(uidx));
                        }
                        uidx += 1;
                    }
                }
                ScriptOp::Mismatch(c) => {
                    if uidx > uhigh {
                        break 'outer;
                    }
                    if uidx >= ulow {
                        buf.push(c);
                    }
                    uidx += 1;
                }
                ScriptOp::Deletion => {
                    if uidx > uhigh {
                        break 'outer;
                    }
                    uidx += 1;
                }
                ScriptOp::Insertion(c) => {
                    if uidx > uhigh {
                        break 'outer;
                    }
                    if uidx > ulow {
                        buf.push(c);
                    }
                }
            }
        }
        if uidx <= uhigh {
            return Err(Error::Corrupt(
                "edit-script ends before the requested source window".into(),
            ));
        }
        Ok(buf.len())
    }

    /// Writes the `v` characters of the target window `[vfrom, vto]` into
    /// `buf`; exactly `vto - vfrom + 1` bytes are produced.
    pub fn decode_v_range(
        &self,
        u: &Encseq,
        start: u64,
        vfrom: u64,
        vto: u64,
        buf: &mut Vec<u8>,
    ) -> Result<usize> {
        let mut uidx = start;
        let mut vidx = 0u64;
        buf.clear();
        'outer: for op in self.ops() {
            match op {
                ScriptOp::MatchRun(n) => {
                    for _ in 0..n {
                        if vidx > vto {
                            break 'outer;
                        }
                        if vidx >= vfrom {
                            buf.push(u.get(uidx));
                        }
                        vidx += 1;
                        uidx += 1;
                    }
                }
                ScriptOp::Mismatch(c) => {
                    if vidx > vto {
                        break 'outer;
                    }
                    if vidx >= vfrom {
                        buf.push(c);
                    }
                    vidx += 1;
                    uidx += 1;
                }
                ScriptOp::Deletion => uidx += 1,
                ScriptOp::Insertion(c) => {
                    if vidx > vto {
                        break 'outer;
                    }
                    if vidx >= vfrom {
                        buf.push(c);
                    }
                    vidx += 1;
                }
            }
        }
        if buf.len() as u64 != vto - vfrom + 1 {
            return Err(Error::Corrupt(format!(
                "edit-script produced {} characters for a target window of {}",
                buf.len(),
                vto - vfrom + 1
            )));
        }
        Ok(buf.len())
    }

    /// Approximate heap footprint in bytes.
    pub fn size_in_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + (self.num_elems() * self.entry_size as usize).div_ceil(8)
    }

    /// Serialises the script in its wire form.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.entry_size])?;
        writer.write_all(&self.trailing_matches.to_ne_bytes())?;
        writer.write_all(&[self.del])?;
        let num_elems = self.num_elems();
        writer.write_all(&(num_elems as u32).to_ne_bytes())?;
        if num_elems != 0 {
            let mut word = 0u64;
            let mut bits = 0u32;
            for idx in 0..num_elems {
                let value = self.space.get(idx);
                word |= value << bits;
                if bits + self.entry_size as u32 >= 64 {
                    writer.write_all(&word.to_ne_bytes())?;
                    let consumed = 64 - bits;
                    word = if consumed < self.entry_size as u32 {
                        value >> consumed
                    } else {
                        0
                    };
                    bits = bits + self.entry_size as u32 - 64;
                } else {
                    bits += self.entry_size as u32;
                }
            }
            if bits > 0 {
                writer.write_all(&word.to_ne_bytes())?;
            }
        }
        Ok(())
    }

    /// Reads back a script written by [`write_to`](Self::write_to).
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Editscript> {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        let entry_size = byte[0];
        let mut four = [0u8; 4];
        reader.read_exact(&mut four)?;
        let trailing_matches = u32::from_ne_bytes(four);
        reader.read_exact(&mut byte)?;
        let del = byte[0];
        reader.read_exact(&mut four)?;
        let num_elems = u32::from_ne_bytes(four) as usize;
        if entry_size == 0 || entry_size > 8 || (del as u64 + 2) >= (1u64 << entry_size) {
            return Err(Error::Corrupt("bad edit-script header".into()));
        }
        let mut script = Editscript {
            space: BitFieldVec::new(entry_size as usize, 0),
            trailing_matches,
            del,
            entry_size,
        };
        if num_elems != 0 {
            let num_words = (num_elems * entry_size as usize).div_ceil(64);
            let mut words = Vec::with_capacity(num_words);
            let mut eight = [0u8; 8];
            for _ in 0..num_words {
                reader.read_exact(&mut eight)?;
                words.push(u64::from_ne_bytes(eight));
            }
            let mask = (1u64 << entry_size) - 1;
            for idx in 0..num_elems {
                let bitpos = idx * entry_size as usize;
                let word = bitpos / 64;
                let off = (bitpos % 64) as u32;
                let mut value = words[word] >> off;
                if off + entry_size as u32 > 64 {
                    value |= words[word + 1] << (64 - off);
                }
                script.space.push(value & mask);
            }
        }
        Ok(script)
    }
}

/// One decoded operation of a script scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScriptOp {
    MatchRun(u64),
    Mismatch(u8),
    Deletion,
    Insertion(u8),
}

struct Ops<'a> {
    es: &'a Editscript,
    pos: usize,
    misdel: bool,
    init: bool,
    tail_done: bool,
}

impl Iterator for Ops<'_> {
    type Item = ScriptOp;

    fn next(&mut self) -> Option<ScriptOp> {
        let es = self.es;
        let n = es.num_elems();
        if !self.init {
            self.init = true;
            if n != 0 {
                let tag = es.get_entry(&mut self.pos);
                debug_assert!(tag > es.del as u64);
                self.misdel = tag == es.misdel_sym();
                let len = es.get_length(&mut self.pos);
                return Some(ScriptOp::MatchRun(len));
            }
            self.tail_done = true;
            return Some(ScriptOp::MatchRun(es.trailing_matches as u64));
        }
        if self.pos < n {
            let elem = es.get_entry(&mut self.pos);
            if elem > es.del as u64 {
                self.misdel = elem == es.misdel_sym();
                let len = es.get_length(&mut self.pos);
                return Some(ScriptOp::MatchRun(len));
            }
            let del = es.del as u64;
            if self.misdel {
                if elem == del {
                    return Some(ScriptOp::Deletion);
                }
                let c = if elem == del - 1 { WILDCARD } else { elem as u8 };
                return Some(ScriptOp::Mismatch(c));
            }
            debug_assert!(elem != del, "insertion can not be deletion symbol");
            let c = if elem == del - 1 { WILDCARD } else { elem as u8 };
            return Some(ScriptOp::Insertion(c));
        }
        if !self.tail_done {
            self.tail_done = true;
            return Some(ScriptOp::MatchRun(es.trailing_matches as u64));
        }
        None
    }
}

/// Incremental construction of an [`Editscript`] from alignment columns.
#[derive(Debug)]
pub struct EditscriptBuilder {
    es: Editscript,
    last_op: u64,
}

impl EditscriptBuilder {
    pub fn new(alphabet: Alphabet) -> Self {
        EditscriptBuilder {
            es: Editscript::new(alphabet),
            last_op: 0,
        }
    }

    pub fn reset(&mut self) {
        self.es.reset();
        self.last_op = 0;
    }

    pub fn add_match(&mut self) -> Result<()> {
        self.last_op = 0;
        self.es.trailing_matches = self
            .es
            .trailing_matches
            .checked_add(1)
            .ok_or(Error::WidthOverflow(u32::MAX as u64 + 1))?;
        Ok(())
    }

    fn start_group(&mut self, tag: u64) {
        self.last_op = tag;
        self.es.push_entry(tag);
        let matches = self.es.trailing_matches as u64;
        self.es.push_length(matches);
        self.es.trailing_matches = 0;
    }

    pub fn add_mismatch(&mut self, c: u8) {
        let c = if c == WILDCARD { self.es.del - 1 } else { c };
        debug_assert!(c <= self.es.del);
        if self.last_op != self.es.misdel_sym() {
            self.start_group(self.es.misdel_sym());
        }
        self.es.push_entry(c as u64);
    }

    pub fn add_deletion(&mut self) {
        self.add_mismatch(self.es.del);
    }

    pub fn add_insertion(&mut self, c: u8) {
        let c = if c == WILDCARD { self.es.del - 1 } else { c };
        debug_assert!(c < self.es.del);
        if self.last_op != self.es.ins_sym() {
            self.start_group(self.es.ins_sym());
        }
        self.es.push_entry(c as u64);
    }

    pub fn finish(self) -> Editscript {
        self.es
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encseq::EncseqBuilder;

    const SEQ1: &[u8] = b"AAACCCGGGTTTACGTACGNANGA";
    const SEQ2: &[u8] = b"AATCCGGGGTATCGATGTGNAGNA";

    fn encseq(seq: &[u8]) -> Encseq {
        let mut builder = EncseqBuilder::new(Alphabet::Dna);
        builder.add_sequence("t", seq).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn entry_roundtrip() {
        let mut es = Editscript::new(Alphabet::Dna);
        assert_eq!(es.entry_size, 4);
        let max = es.full_mask();
        for value in 0..=max {
            es.push_entry(value);
        }
        let mut pos = 0;
        for value in 0..=max {
            assert_eq!(es.get_entry(&mut pos), value);
        }
    }

    #[test]
    fn length_roundtrip() {
        let mut es = Editscript::new(Alphabet::Dna);
        let max = es.full_mask();
        es.push_length(max);
        let mut get_pos = 0;
        assert_eq!(es.get_length(&mut get_pos), max);
        for value in 0..=max {
            let long = value | (value << es.entry_size);
            es.push_length(long);
            assert_eq!(es.get_length(&mut get_pos), long);
        }
        assert_eq!(get_pos, es.num_elems());
    }

    /// The alignment used throughout:
    ///
    /// ```text
    /// u: aaacccg-ggttt--acgtacgnang-a
    ///    || | || ||| |  |  |  | | | |
    /// v: aatc-cggggtatcga--tgtgna-gna
    /// ```
    fn test_trace() -> Multieoplist {
        let mut meops = Multieoplist::new();
        meops.add_match();
        meops.add_insertion();
        meops.add_match();
        meops.add_deletion();
        for _ in 0..2 {
            meops.add_match();
            meops.add_mismatch();
        }
        meops.add_mismatch();
        meops.add_match();
        meops.add_deletion();
        meops.add_deletion();
        meops.add_match();
        meops.add_insertion();
        meops.add_insertion();
        meops.add_match();
        meops.add_mismatch();
        for _ in 0..3 {
            meops.add_match();
        }
        meops.add_insertion();
        meops.add_match();
        meops.add_match();
        meops.add_deletion();
        meops.add_match();
        meops.add_mismatch();
        meops.add_match();
        meops.add_match();
        meops
    }

    fn built_script(v: &Encseq) -> Editscript {
        let mut b = EditscriptBuilder::new(Alphabet::Dna);
        b.add_match().unwrap();
        b.add_match().unwrap();
        b.add_mismatch(v.get(2));
        b.add_match().unwrap();
        b.add_deletion();
        b.add_match().unwrap();
        b.add_match().unwrap();
        b.add_insertion(v.get(6));
        b.add_match().unwrap();
        b.add_match().unwrap();
        b.add_match().unwrap();
        b.add_mismatch(v.get(10));
        b.add_match().unwrap();
        b.add_insertion(v.get(12));
        b.add_insertion(v.get(13));
        b.add_match().unwrap();
        b.add_deletion();
        b.add_deletion();
        b.add_match().unwrap();
        b.add_mismatch(v.get(16));
        b.add_mismatch(v.get(17));
        b.add_match().unwrap();
        b.add_mismatch(v.get(19));
        b.add_match().unwrap();
        b.add_deletion();
        b.add_match().unwrap();
        b.add_insertion(v.get(22));
        b.add_match().unwrap();
        b.finish()
    }

    #[test]
    fn decode_full_target() {
        let u = encseq(SEQ1);
        let v = encseq(SEQ2);
        let es = built_script(&v);
        assert_eq!(es.target_len(), 24);
        assert_eq!(es.source_len(), 24);
        let mut buf = Vec::new();
        let written = es.decode_v_range(&u, 0, 0, 23, &mut buf).unwrap();
        assert_eq!(written, 24);
        assert_eq!(buf.as_slice(), v.codes());
        let written = es.decode_u_range(&u, 0, 0, 23, &mut buf).unwrap();
        assert_eq!(written, 24);
        assert_eq!(buf.as_slice(), v.codes());
    }

    #[test]
    fn target_subseq_lengths() {
        let v = encseq(SEQ2);
        let es = built_script(&v);
        let starts = [0u64, 0, 11, 12, 13, 13];
        let ulengths = [13u64, 24, 2, 4, 2, 3];
        let vlengths = [15u64, 24, 4, 2, 0, 1];
        for idx in 0..starts.len() {
            assert_eq!(
                es.target_subseq_len(starts[idx], ulengths[idx]),
                vlengths[idx],
                "window {idx}"
            );
        }
    }

    #[test]
    fn decode_windows() {
        let u = encseq(SEQ1);
        let v = encseq(SEQ2);
        let es = built_script(&v);
        let mut buf = Vec::new();

        let written = es.decode_v_range(&u, 0, 0, 12, &mut buf).unwrap();
        assert_eq!(written, 13);
        assert_eq!(buf.as_slice(), &v.codes()[..13]);

        let written = es.decode_v_range(&u, 0, 13, 23, &mut buf).unwrap();
        assert_eq!(written, 11);
        assert_eq!(buf.as_slice(), &v.codes()[13..]);

        let written = es.decode_u_range(&u, 0, 0, 12, &mut buf).unwrap();
        assert_eq!(written, 15);
        assert_eq!(buf.as_slice(), &v.codes()[..15]);

        let written = es.decode_u_range(&u, 0, 12, 23, &mut buf).unwrap();
        assert_eq!(written, 10);
        assert_eq!(buf.as_slice(), &v.codes()[14..]);
    }

    #[test]
    fn from_trace_matches_builder() {
        let u = encseq(SEQ1);
        let v = encseq(SEQ2);
        let es = Editscript::from_trace(&v, &test_trace(), 0).unwrap();
        assert_eq!(es.target_len(), 24);
        assert_eq!(es.source_len(), 24);
        let mut buf = Vec::new();
        es.decode_v_range(&u, 0, 0, 23, &mut buf).unwrap();
        assert_eq!(buf.as_slice(), v.codes());

        let stats = es.stats();
        assert_eq!(
            stats,
            EditscriptStats {
                matches: 15,
                mismatches: 5,
                insertions: 4,
                deletions: 4,
            }
        );
    }

    #[test]
    fn io_roundtrip() {
        let u = encseq(SEQ1);
        let v = encseq(SEQ2);
        let es = built_script(&v);
        let mut wire = Vec::new();
        es.write_to(&mut wire).unwrap();
        let back = Editscript::read_from(&mut wire.as_slice()).unwrap();
        assert_eq!(back.stats(), es.stats());
        let mut buf = Vec::new();
        back.decode_v_range(&u, 0, 0, 23, &mut buf).unwrap();
        assert_eq!(buf.as_slice(), v.codes());
    }

    #[test]
    fn wildcards_survive() {
        let u = encseq(b"ACGT");
        let mut b = EditscriptBuilder::new(Alphabet::Dna);
        b.add_match().unwrap();
        b.add_mismatch(WILDCARD);
        b.add_match().unwrap();
        b.add_match().unwrap();
        let es = b.finish();
        let mut buf = Vec::new();
        es.decode_v_range(&u, 0, 0, 3, &mut buf).unwrap();
        assert_eq!(buf[1], WILDCARD);
    }
}
