/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Gapped seed extension with an X-drop bound.
//!
//! Starting from an anchored pair of prefixes `u` and `v`, the aligner
//! runs a frontier dynamic program over antidiagonals with arbitrary
//! integer scores. Cells whose score falls more than the drop threshold
//! below the best score seen so far are abandoned; the extension stops
//! once a whole antidiagonal is abandoned. The caller extends left and
//! right of a seed separately, handing in reversed slices for the left
//! side.
//!
//! The per-cell operations are kept, so the best alignment can be
//! back-tracked without recomputation into a [`Multieoplist`] (in reverse
//! alignment order, the list's native orientation). Resources are
//! reusable: the build driver keeps a current and a best pair and swaps
//! them whenever an extension improves on the best.

use crate::encseq::{SEPARATOR, WILDCARD};
use crate::multieop::Multieoplist;

/// Scores of the four alignment operations. Match must be rewarded,
/// mismatches and gaps penalised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XdropScores {
    pub mat: i32,
    pub mis: i32,
    pub ins: i32,
    pub del: i32,
}

impl Default for XdropScores {
    fn default() -> Self {
        XdropScores {
            mat: 2,
            mis: -1,
            ins: -2,
            del: -2,
        }
    }
}

/// The outcome of one extension: how far it reached in `u` and `v`, and
/// its score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct XdropBest {
    /// Length of the aligned prefix of `u`.
    pub ivalue: u64,
    /// Length of the aligned prefix of `v`.
    pub jvalue: u64,
    pub score: i64,
}

const DEAD: i64 = i64::MIN;

const OP_START: u8 = 0;
const OP_MATCH: u8 = 1;
const OP_MISMATCH: u8 = 2;
const OP_DELETION: u8 = 3;
const OP_INSERTION: u8 = 4;

/// One antidiagonal of the dynamic program: cells for `i` in
/// `ilo .. ilo + scores.len()`, with `j = t - i`.
#[derive(Debug, Default)]
struct Frontier {
    ilo: usize,
    scores: Vec<i64>,
    ops: Vec<u8>,
}

impl Frontier {
    #[inline]
    fn score_at(&self, i: usize) -> Option<i64> {
        if i < self.ilo {
            return None;
        }
        match self.scores.get(i - self.ilo) {
            Some(&s) if s != DEAD => Some(s),
            _ => None,
        }
    }

    #[inline]
    fn ihi(&self) -> usize {
        self.ilo + self.scores.len() - 1
    }
}

/// Reusable state of one extension direction.
#[derive(Debug)]
pub struct XdropResources {
    scores: XdropScores,
    frontiers: Vec<Frontier>,
}

#[inline]
fn symbols_match(a: u8, b: u8) -> bool {
    a == b && a != WILDCARD && a != SEPARATOR
}

impl XdropResources {
    pub fn new(scores: XdropScores) -> Self {
        XdropResources {
            scores,
            frontiers: Vec::new(),
        }
    }

    pub fn scores(&self) -> XdropScores {
        self.scores
    }

    pub fn reset(&mut self) {
        self.frontiers.clear();
    }

    /// Aligns prefixes of `u` and `v`, abandoning cells scoring more than
    /// `xdrop_below` under the running best. Returns the best extension.
    pub fn extend(&mut self, u: &[u8], v: &[u8], xdrop_below: i64) -> XdropBest {
        self.reset();
        let m = u.len();
        let n = v.len();
        let mut best = XdropBest::default();
        self.frontiers.push(Frontier {
            ilo: 0,
            scores: vec![0],
            ops: vec![OP_START],
        });
        for t in 1..=m + n {
            let (ilo, ihi) = {
                let prev = &self.frontiers[t - 1];
                let mut ilo = prev.ilo;
                let mut ihi = prev.ihi() + 1;
                if t >= 2 {
                    let prev2 = &self.frontiers[t - 2];
                    ilo = ilo.min(prev2.ilo + 1);
                    ihi = ihi.max(prev2.ihi() + 1);
                }
                (ilo.max(t.saturating_sub(n)), ihi.min(m).min(t))
            };
            if ilo > ihi {
                break;
            }
            let mut frontier = Frontier {
                ilo,
                scores: Vec::with_capacity(ihi - ilo + 1),
                ops: Vec::with_capacity(ihi - ilo + 1),
            };
            for i in ilo..=ihi {
                let j = t - i;
                let mut score = DEAD;
                let mut op = OP_START;
                if i > 0 && j > 0 {
                    if let Some(prev2) = self.frontiers.get(t - 2) {
                        if let Some(s) = prev2.score_at(i - 1) {
                            let (bonus, diag_op) = if symbols_match(u[i - 1], v[j - 1]) {
                                (self.scores.mat as i64, OP_MATCH)
                            } else {
                                (self.scores.mis as i64, OP_MISMATCH)
                            };
                            score = s + bonus;
                            op = diag_op;
                        }
                    }
                }
                if i > 0 {
                    if let Some(s) = self.frontiers[t - 1].score_at(i - 1) {
                        let cand = s + self.scores.del as i64;
                        if cand > score {
                            score = cand;
                            op = OP_DELETION;
                        }
                    }
                }
                if j > 0 {
                    if let Some(s) = self.frontiers[t - 1].score_at(i) {
                        let cand = s + self.scores.ins as i64;
                        if cand > score {
                            score = cand;
                            op = OP_INSERTION;
                        }
                    }
                }
                if score != DEAD && score < best.score - xdrop_below {
                    score = DEAD;
                }
                if score != DEAD && score > best.score {
                    best = XdropBest {
                        ivalue: i as u64,
                        jvalue: j as u64,
                        score,
                    };
                }
                frontier.scores.push(score);
                frontier.ops.push(op);
            }
            // trim abandoned cells off both ends of the band
            while frontier
                .scores
                .last()
                .is_some_and(|&s| s == DEAD)
            {
                frontier.scores.pop();
                frontier.ops.pop();
            }
            let leading_dead = frontier.scores.iter().take_while(|&&s| s == DEAD).count();
            if leading_dead > 0 {
                frontier.scores.drain(..leading_dead);
                frontier.ops.drain(..leading_dead);
                frontier.ilo += leading_dead;
            }
            if frontier.scores.is_empty() {
                break;
            }
            self.frontiers.push(frontier);
        }
        best
    }

    /// Back-tracks the alignment ending at `best`, which must come from the
    /// latest [`extend`](Self::extend) on these resources.
    pub fn backtrack(&self, best: XdropBest) -> Multieoplist {
        let mut meops = Multieoplist::new();
        let mut i = best.ivalue as usize;
        let mut j = best.jvalue as usize;
        loop {
            let frontier = &self.frontiers[i + j];
            match frontier.ops[i - frontier.ilo] {
                OP_MATCH => {
                    meops.add_match();
                    i -= 1;
                    j -= 1;
                }
                OP_MISMATCH => {
                    meops.add_mismatch();
                    i -= 1;
                    j -= 1;
                }
                OP_DELETION => {
                    meops.add_deletion();
                    i -= 1;
                }
                OP_INSERTION => {
                    meops.add_insertion();
                    j -= 1;
                }
                _ => break,
            }
        }
        meops
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::multieop::Eop;

    fn codes(s: &[u8]) -> Vec<u8> {
        s.iter()
            .map(|&c| match c {
                b'a' => 0u8,
                b'c' => 1,
                b'g' => 2,
                b't' => 3,
                b'n' => WILDCARD,
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn identical_sequences_align_fully() {
        let u = codes(b"acgtacgtacgt");
        let mut res = XdropResources::new(XdropScores::default());
        let best = res.extend(&u, &u, 3);
        assert_eq!(best.ivalue, 12);
        assert_eq!(best.jvalue, 12);
        assert_eq!(best.score, 24);
        let meops = res.backtrack(best);
        assert_eq!(meops.length(), 12);
        assert_eq!(meops.repdel_length(), 12);
        assert!(meops.iter_alignment().all(|(op, _)| op == Eop::Match));
    }

    #[test]
    fn substitution_survives_the_drop() {
        let u = codes(b"acgtacgtacgtacgt");
        let mut v = u.clone();
        v[8] = codes(b"c")[0];
        let mut res = XdropResources::new(XdropScores::default());
        let best = res.extend(&u, &v, 3);
        assert_eq!(best.ivalue, 16);
        assert_eq!(best.jvalue, 16);
        assert_eq!(best.score, 15 * 2 - 1);
        let meops = res.backtrack(best);
        let ops: Vec<Eop> = meops.iter_alignment().map(|(op, _)| op).collect();
        assert_eq!(ops, vec![Eop::Match, Eop::Mismatch, Eop::Match]);
    }

    #[test]
    fn gap_in_target() {
        // u carries one extra symbol, alignment needs a deletion
        let u = codes(b"acgtaacgt");
        let v = codes(b"acgtacgt");
        let mut res = XdropResources::new(XdropScores::default());
        let best = res.extend(&u, &v, 4);
        assert_eq!(best.ivalue, 9);
        assert_eq!(best.jvalue, 8);
        assert_eq!(best.score, 8 * 2 - 2);
        let meops = res.backtrack(best);
        assert_eq!(meops.repdel_length(), 9);
        assert_eq!(meops.repins_length(), 8);
        assert_eq!(
            meops
                .iter_alignment()
                .filter(|&(op, _)| op == Eop::Deletion)
                .count(),
            1
        );
    }

    #[test]
    fn drop_stops_divergence() {
        let u = codes(b"acgtacgtgggggggg");
        let v = codes(b"acgtacgtcccccccc");
        let mut res = XdropResources::new(XdropScores::default());
        let best = res.extend(&u, &v, 3);
        assert_eq!(best.ivalue, 8);
        assert_eq!(best.jvalue, 8);
        assert_eq!(best.score, 16);
    }

    #[test]
    fn wildcards_never_match() {
        let u = codes(b"acgtnacgt");
        let v = codes(b"acgtnacgt");
        let mut res = XdropResources::new(XdropScores::default());
        let best = res.extend(&u, &v, 5);
        assert_eq!(best.ivalue, 9);
        assert_eq!(best.jvalue, 9);
        // the wildcard pair scores as a mismatch
        assert_eq!(best.score, 8 * 2 - 1);
    }

    #[test]
    fn empty_sides() {
        let mut res = XdropResources::new(XdropScores::default());
        let best = res.extend(&[], &[], 3);
        assert_eq!(best, XdropBest::default());
        let best = res.extend(&codes(b"acgt"), &[], 3);
        assert_eq!(best, XdropBest::default());
    }
}
