/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The error taxonomy of the crate.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of building, loading and querying an archive.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration or CLI value is unusable (e.g. the seed window is not
    /// larger than the k-mer size).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An extraction range lies outside the original coordinate system.
    #[error("range {start}..={end} out of bounds, total length is {len}")]
    RangeOutOfBounds { start: u64, end: u64, len: u64 },

    /// A length does not fit the configured fragment width. Rebuilding with
    /// the `wide-lengths` feature raises the limit to 64 bits.
    #[error("length {0} exceeds the configured fragment width, rebuild with the wide-lengths feature")]
    WidthOverflow(u64),

    /// The initialisation phase ran out of input before the k-mer index
    /// reached its requested size.
    #[error("not enough kmers found for init, check input data or review initsize! (found {found}, need {required})")]
    InsufficientInput { found: u64, required: u64 },

    /// An on-disk structure is damaged or from an incompatible version.
    #[error("corrupt archive: {0}")]
    Corrupt(String),

    /// An underlying file-system error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A user callback asked an enumeration to stop.
    #[error("aborted by callback")]
    CallbackAbort,
}
