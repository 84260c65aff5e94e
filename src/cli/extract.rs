/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::archive::{Condenseq, SeqRange};
use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Fasta,
    Concat,
}

#[derive(Parser, Debug)]
#[command(name = "extract", about = "Decompresses a condenseq archive.", long_about = None)]
pub struct CliArgs {
    /// The basename of the archive.
    pub indexname: PathBuf,

    /// Only extract the sequence with this number.
    #[arg(long, value_name = "N", conflicts_with_all = ["seqrange", "range"])]
    pub seq: Option<u64>,

    /// Only extract this inclusive range of consecutive sequences,
    /// identified by their numbers.
    #[arg(long, num_args = 2, value_names = ["FIRST", "LAST"], conflicts_with = "range")]
    pub seqrange: Option<Vec<u64>>,

    /// Only extract this inclusive range of zero based positions of the
    /// whole collection (implies concatenated output).
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    pub range: Option<Vec<u64>>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputMode::Fasta)]
    pub output: OutputMode,

    /// Character printed for sequence separators in concatenated output.
    #[arg(long, default_value_t = '|')]
    pub sepchar: char,

    /// Line width of FASTA output; 0 prints each sequence on one line.
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Write a GFF3 description of the archive layout instead of
    /// sequences.
    #[arg(long)]
    pub gff3: bool,
}

pub fn main(args: CliArgs) -> Result<()> {
    let mut ces = Condenseq::load(&args.indexname)
        .with_context(|| format!("could not load archive {}", args.indexname.display()))?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if args.gff3 {
        ces.write_gff3(&mut out)?;
        return Ok(());
    }

    if let Some(range) = &args.range {
        ensure!(range[0] <= range[1], "range start is past its end");
        let text = ces.extract_decoded_range(SeqRange::new(range[0], range[1]), args.sepchar)?;
        writeln!(out, "{text}")?;
        return Ok(());
    }

    let (first, last) = if let Some(seq) = args.seq {
        (seq, seq)
    } else if let Some(seqrange) = &args.seqrange {
        (seqrange[0], seqrange[1])
    } else {
        (0, ces.num_sequences() - 1)
    };
    ensure!(
        first <= last && last < ces.num_sequences(),
        "sequence range {first}..={last} out of bounds ({} sequences)",
        ces.num_sequences()
    );

    for seqnum in first..=last {
        match args.output {
            OutputMode::Fasta => {
                let desc = ces.description(seqnum).into_owned();
                let seq = ces.extract_decoded(seqnum)?;
                writeln!(out, ">{desc}")?;
                if args.width == 0 {
                    writeln!(out, "{seq}")?;
                } else {
                    for chunk in seq.as_bytes().chunks(args.width) {
                        out.write_all(chunk)?;
                        writeln!(out)?;
                    }
                }
            }
            OutputMode::Concat => {
                if seqnum > first {
                    write!(out, "{}", args.sepchar)?;
                }
                let seq = ces.extract_decoded(seqnum)?;
                write!(out, "{seq}")?;
            }
        }
    }
    if args.output == OutputMode::Concat {
        writeln!(out)?;
    }
    Ok(())
}
