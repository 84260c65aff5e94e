/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::creator::{CondenseqCreator, CreatorConfig, Cutoff, Extension};
use crate::encseq::{with_suffix, Alphabet, Encseq};
use crate::xdrop::XdropScores;
use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "compress", about = "Compresses a sequence collection into a condenseq archive.", long_about = None)]
pub struct CliArgs {
    /// The input: a FASTA file, or the basename of an already encoded
    /// collection.
    pub input: PathBuf,

    /// Path and basename of the files to store.
    #[arg(long, value_name = "NAME")]
    pub indexname: PathBuf,

    /// Treat the input as protein instead of DNA.
    #[arg(long)]
    pub protein: bool,

    /// Kmer size used for the seeds; the default depends on the alphabet.
    #[arg(long)]
    pub kmersize: Option<u32>,

    /// Size of the window in which to search for hit pairs of kmers; has
    /// to be larger than the kmer size.
    #[arg(long)]
    pub windowsize: Option<u32>,

    /// Length of the initial unique database in bases; should be larger
    /// than the alignment length.
    #[arg(long)]
    pub initsize: Option<u64>,

    /// Required minimal length of an xdrop alignment; should be larger
    /// than the window size.
    #[arg(long)]
    pub alignlength: Option<u64>,

    /// Ignore kmers found more often than this value when searching
    /// alignments. 0 disables cutoffs, leaving it unset uses a cutoff
    /// based on the mean number of occurrences.
    #[arg(long)]
    pub cutoff: Option<u64>,

    /// Divisor of the mean occurrence count for the mean based cutoff.
    #[arg(long, default_value_t = 2, conflicts_with = "cutoff")]
    pub fraction: u64,

    /// Keep every kmer in the database even when cutoffs apply.
    #[arg(long)]
    pub disable_prune: bool,

    /// Match score for the extension alignment.
    #[arg(long, default_value_t = 2)]
    pub mat: i32,

    /// Mismatch score for the extension alignment.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub mis: i32,

    /// Insertion score for the extension alignment.
    #[arg(long, default_value_t = -2, allow_negative_numbers = true)]
    pub ins: i32,

    /// Deletion score for the extension alignment.
    #[arg(long, default_value_t = -2, allow_negative_numbers = true)]
    pub del: i32,

    /// Xdrop score for the extension alignment.
    #[arg(long, default_value_t = 3, allow_negative_numbers = true)]
    pub xdrop: i64,

    /// Disable filtering of seeds entirely.
    #[arg(long, conflicts_with_all = ["diagonals", "full_diags", "no_diagonals"])]
    pub brute_force: bool,

    /// Use sparse diagonals (the default).
    #[arg(long)]
    pub diagonals: bool,

    /// Use full (time efficient, space inefficient) diagonals.
    #[arg(long, conflicts_with = "diagonals")]
    pub full_diags: bool,

    /// Disable diagonals; seeds pass a simple window filter instead.
    #[arg(long, conflicts_with_all = ["diagonals", "full_diags"])]
    pub no_diagonals: bool,

    /// Percentage of sparse diagonals that is allowed to be marked as
    /// deletable.
    #[arg(long, default_value_t = 20)]
    pub diags_clean: u32,

    /// Print the kmer database frequencies after the build.
    #[arg(long)]
    pub kdb: bool,

    /// Enable verbose output.
    #[arg(long)]
    pub verbose: bool,
}

fn load_input(path: &Path, alphabet: Alphabet) -> Result<Encseq> {
    if with_suffix(path, "esq").exists() {
        Encseq::load(path).with_context(|| format!("could not load encseq {}", path.display()))
    } else {
        let file =
            File::open(path).with_context(|| format!("could not open {}", path.display()))?;
        Encseq::from_fasta(alphabet, BufReader::new(file))
            .with_context(|| format!("could not parse FASTA {}", path.display()))
    }
}

pub fn main(args: CliArgs) -> Result<()> {
    let alphabet = if args.protein {
        Alphabet::Protein
    } else {
        Alphabet::Dna
    };
    let input = load_input(&args.input, alphabet)?;

    let mut config = CreatorConfig::for_alphabet(input.alphabet());
    if let Some(kmersize) = args.kmersize {
        config.kmersize = kmersize;
    }
    // unset sizes derive from the given ones: upwards from initsize
    // first, then the 5x/3x/3x cascade down from the kmer size
    let alignlength = args
        .alignlength
        .or_else(|| args.initsize.map(|initsize| initsize / 3));
    let windowsize = args
        .windowsize
        .or_else(|| alignlength.map(|len| ((len / 5) as u32).max(4)));
    config.windowsize = windowsize.unwrap_or(5 * config.kmersize);
    config.min_align_len = alignlength.unwrap_or(3 * config.windowsize as u64);
    config.initsize = args.initsize.unwrap_or(3 * config.min_align_len);
    config.cutoff = match args.cutoff {
        Some(0) => Cutoff::Disabled,
        Some(value) => Cutoff::Fixed(value),
        None => Cutoff::Mean,
    };
    config.mean_fraction = args.fraction;
    config.prune = !args.disable_prune;
    config.scores = XdropScores {
        mat: args.mat,
        mis: args.mis,
        ins: args.ins,
        del: args.del,
    };
    config.xdrop = args.xdrop;
    config.extension = if args.brute_force {
        Extension::BruteForce
    } else if args.full_diags {
        Extension::FullDiagonals
    } else if args.no_diagonals {
        Extension::Filter
    } else {
        Extension::SparseDiagonals
    };
    config.diags_clean_percent = args.diags_clean;
    config.log_kmer_db = args.kdb;

    let mut creator = CondenseqCreator::new(config)?;
    let ces = creator
        .create(&args.indexname, &input)
        .with_context(|| format!("could not compress {}", args.input.display()))?;
    log::info!(
        "stored {} uniques and {} links under {}",
        ces.num_uniques(),
        ces.num_links(),
        args.indexname.display()
    );
    Ok(())
}
