/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The command line interface of the `condenseq` binary.

pub mod compress;
pub mod extract;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsString;

#[derive(Parser, Debug)]
#[command(
    name = "condenseq",
    version,
    about = "Compresses sequence collections into a condensed archive and extracts from it.",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compresses a sequence collection into a condenseq archive.
    Compress(compress::CliArgs),
    /// Decompresses a condenseq archive.
    Extract(extract::CliArgs),
}

/// Sets up `env_logger`; `RUST_LOG` overrides the chosen default level.
pub fn init_env_logger(verbose: bool) -> Result<()> {
    env_logger::builder()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .try_init()?;
    Ok(())
}

/// Dispatches the command line to the subcommands.
pub fn main<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    match cli.command {
        Commands::Compress(args) => {
            init_env_logger(args.verbose)?;
            compress::main(args)
        }
        Commands::Extract(args) => {
            init_env_logger(false)?;
            extract::main(args)
        }
    }
}
