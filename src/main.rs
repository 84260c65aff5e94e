/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */
use anyhow::Result;

pub fn main() -> Result<()> {
    // Logger setup happens inside, after the verbosity flags are known
    condenseq::cli::main(std::env::args_os())
}
