/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! K-mer codes and the k-mer position database.

mod database;
pub use database::{KmerDatabase, KmerView};

use crate::encseq::Encseq;

/// One window of the k-mer scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Kmercode {
    /// Integer code of the window, valid only when `has_special` is false.
    pub code: u64,
    /// Start of the window in the concatenation.
    pub startpos: u64,
    /// True when the window contains a wildcard or separator, or runs past
    /// the end of the data.
    pub has_special: bool,
}

/// A one-shot sliding k-mer iterator over an [`Encseq`].
///
/// One item is produced for every position of the underlying data, so the
/// driver can detect sequence boundaries through `has_special`; windows
/// overrunning the end of the data count as special as well.
#[derive(Debug)]
pub struct KmerIter<'a> {
    es: &'a Encseq,
    kmersize: u32,
    base: u64,
    top_power: u64,
    pos: u64,
    code: u64,
    specials: u32,
}

#[inline]
fn is_special(c: u8, base: u64) -> bool {
    c as u64 >= base
}

#[inline]
fn digit(c: u8, base: u64) -> u64 {
    if (c as u64) < base {
        c as u64
    } else {
        0
    }
}

impl<'a> KmerIter<'a> {
    pub fn new(es: &'a Encseq, kmersize: u32, start: u64) -> Self {
        debug_assert!(kmersize > 0);
        let base = es.alphabet().num_chars() as u64;
        let mut iter = KmerIter {
            es,
            kmersize,
            base,
            top_power: base.pow(kmersize - 1),
            pos: start,
            code: 0,
            specials: 0,
        };
        iter.warm_up();
        iter
    }

    /// Restarts the scan at `pos`.
    pub fn reset(&mut self, pos: u64) {
        self.pos = pos;
        self.warm_up();
    }

    fn warm_up(&mut self) {
        let len = self.es.total_length();
        let end = (self.pos + self.kmersize as u64).min(len);
        self.code = 0;
        self.specials = 0;
        for idx in self.pos..end {
            let c = self.es.get(idx);
            self.code = self
                .code
                .wrapping_mul(self.base)
                .wrapping_add(digit(c, self.base));
            self.specials += is_special(c, self.base) as u32;
        }
    }
}

impl Iterator for KmerIter<'_> {
    type Item = Kmercode;

    fn next(&mut self) -> Option<Kmercode> {
        let len = self.es.total_length();
        if self.pos >= len {
            return None;
        }
        let result = Kmercode {
            code: self.code,
            startpos: self.pos,
            has_special: self.specials > 0 || self.pos + self.kmersize as u64 > len,
        };
        let leaving = self.es.get(self.pos);
        self.code = self
            .code
            .wrapping_sub(digit(leaving, self.base).wrapping_mul(self.top_power))
            .wrapping_mul(self.base);
        let entering_pos = self.pos + self.kmersize as u64;
        if entering_pos < len {
            let entering = self.es.get(entering_pos);
            self.code = self.code.wrapping_add(digit(entering, self.base));
            self.specials += is_special(entering, self.base) as u32;
        }
        self.specials -= is_special(leaving, self.base) as u32;
        self.pos += 1;
        Some(result)
    }
}
