/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A run-length compressed list of alignment operations.
//!
//! Each entry is one byte: the operation in the top two bits, the run
//! length in the low six. Adjacent same-type additions merge; runs that
//! overflow an entry split. The list is produced by the X-drop back-tracker
//! and consumed by the edit-script builder, which iterates the entries from
//! last to first: entry order is the reverse of alignment order.

use crate::error::{Error, Result};
use itertools::Itertools;
use std::fmt;
use std::io::{Read, Write};

/// An alignment operation. `Replacement` is an alias for [`Eop::Match`] in
/// the classic edit-operation nomenclature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eop {
    Match,
    Mismatch,
    Deletion,
    Insertion,
}

const STEPS_BITS: u32 = 6;
const STEPS_MASK: u8 = (1 << STEPS_BITS) - 1;

impl Eop {
    fn bits(self) -> u8 {
        match self {
            Eop::Match => 0,
            Eop::Mismatch => 1,
            Eop::Deletion => 2,
            Eop::Insertion => 3,
        }
    }

    fn from_bits(bits: u8) -> Eop {
        match bits {
            0 => Eop::Match,
            1 => Eop::Mismatch,
            2 => Eop::Deletion,
            _ => Eop::Insertion,
        }
    }
}

/// The run-length compressed operation list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Multieoplist {
    entries: Vec<u8>,
}

impl Multieoplist {
    pub fn new() -> Self {
        Multieoplist::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Multieoplist {
            entries: Vec::with_capacity(n),
        }
    }

    /// Appends `steps` operations of type `op`, merging with the last entry
    /// where possible.
    pub fn add_multi(&mut self, op: Eop, mut steps: u64) {
        if let Some(last) = self.entries.last_mut() {
            if *last >> STEPS_BITS == op.bits() {
                while steps != 0 && *last & STEPS_MASK < STEPS_MASK {
                    *last += 1;
                    steps -= 1;
                }
            }
        }
        while steps != 0 {
            let mut entry = op.bits() << STEPS_BITS;
            if steps < STEPS_MASK as u64 {
                entry += steps as u8;
                steps = 0;
            } else {
                entry |= STEPS_MASK;
                steps -= STEPS_MASK as u64;
            }
            self.entries.push(entry);
        }
    }

    pub fn add_match(&mut self) {
        self.add_multi(Eop::Match, 1);
    }

    /// Alias of [`add_match`](Self::add_match).
    pub fn add_replacement(&mut self) {
        self.add_multi(Eop::Match, 1);
    }

    pub fn add_mismatch(&mut self) {
        self.add_multi(Eop::Mismatch, 1);
    }

    pub fn add_deletion(&mut self) {
        self.add_multi(Eop::Deletion, 1);
    }

    pub fn add_insertion(&mut self) {
        self.add_multi(Eop::Insertion, 1);
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Removes a single operation from the last entry.
    pub fn remove_last(&mut self) {
        let last = self.entries.last_mut().expect("list is empty");
        if *last & STEPS_MASK == 1 {
            self.entries.pop();
        } else {
            *last -= 1;
        }
    }

    /// Total number of operations.
    pub fn length(&self) -> u64 {
        self.entries
            .iter()
            .map(|&e| (e & STEPS_MASK) as u64)
            .sum()
    }

    /// Operations consuming the source, i.e. everything but insertions.
    pub fn repdel_length(&self) -> u64 {
        self.entries
            .iter()
            .filter(|&&e| Eop::from_bits(e >> STEPS_BITS) != Eop::Insertion)
            .map(|&e| (e & STEPS_MASK) as u64)
            .sum()
    }

    /// Operations consuming the target, i.e. everything but deletions.
    pub fn repins_length(&self) -> u64 {
        self.entries
            .iter()
            .filter(|&&e| Eop::from_bits(e >> STEPS_BITS) != Eop::Deletion)
            .map(|&e| (e & STEPS_MASK) as u64)
            .sum()
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `idx`-th entry as `(operation, run length)`.
    pub fn entry(&self, idx: usize) -> (Eop, u64) {
        let e = self.entries[idx];
        (Eop::from_bits(e >> STEPS_BITS), (e & STEPS_MASK) as u64)
    }

    /// Iterates the entries in reverse entry order, which is alignment
    /// order.
    pub fn iter_alignment(&self) -> impl Iterator<Item = (Eop, u64)> + '_ {
        self.entries
            .iter()
            .rev()
            .map(|&e| (Eop::from_bits(e >> STEPS_BITS), (e & STEPS_MASK) as u64))
    }

    /// Appends the entries of `other`, in entry order when `forward`,
    /// reversed otherwise.
    pub fn combine(&mut self, other: &Multieoplist, forward: bool) {
        let n = other.num_entries();
        for idx in 0..n {
            let (op, steps) = other.entry(if forward { idx } else { n - idx - 1 });
            self.add_multi(op, steps);
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&(self.entries.len() as u64).to_ne_bytes())?;
        writer.write_all(&self.entries)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let num = crate::encseq::read_u64(reader)?;
        if num == 0 {
            return Err(Error::Corrupt("empty multieop list".into()));
        }
        let mut entries = vec![0u8; num as usize];
        reader.read_exact(&mut entries)?;
        Ok(Multieoplist { entries })
    }
}

impl fmt::Display for Multieoplist {
    /// Renders runs of equal type in alignment order, e.g. `[M 4, R 1]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        let runs = self
            .iter_alignment()
            .coalesce(|a, b| if a.0 == b.0 { Ok((a.0, a.1 + b.1)) } else { Err((a, b)) });
        for (idx, (op, steps)) in runs.enumerate() {
            let symbol = match op {
                Eop::Match => 'M',
                Eop::Mismatch => 'R',
                Eop::Deletion => 'D',
                Eop::Insertion => 'I',
            };
            write!(f, "{}{symbol} {steps}", if idx == 0 { "" } else { ", " })?;
        }
        write!(f, "]")
    }
}
