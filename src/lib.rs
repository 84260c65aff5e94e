/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]
#![allow(clippy::type_complexity)]

pub mod archive;
#[cfg(feature = "cli")]
pub mod cli;
pub mod creator;
pub mod diagonals;
pub mod editscript;
pub mod encseq;
pub mod error;
pub mod intset;
pub mod kmer;
pub mod multieop;
pub mod xdrop;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::archive::{Condenseq, Link, SeqRange, Unique};
    pub use crate::creator::{CondenseqCreator, CreatorConfig, Cutoff, Extension};
    pub use crate::editscript::{Editscript, EditscriptBuilder};
    pub use crate::encseq::{Alphabet, Encseq, EncseqBuilder, SEPARATOR, WILDCARD};
    pub use crate::error::{Error, Result};
    pub use crate::intset::IntSet;
    pub use crate::kmer::{KmerDatabase, KmerIter, Kmercode};
    pub use crate::multieop::{Eop, Multieoplist};
    pub use crate::xdrop::{XdropBest, XdropResources, XdropScores};
}
