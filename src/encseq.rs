/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Encoded sequence collections.
//!
//! The archive treats the upstream sequence encoder as an external
//! collaborator; this module is the reference implementation of that
//! interface. An [`Encseq`] holds the concatenation of one or more
//! sequences over a fixed [`Alphabet`], encoded one symbol code per byte,
//! with a [`SEPARATOR`] byte between consecutive sequences, plus the
//! per-sequence descriptions. Wildcard characters (`N` for DNA, `X` for
//! protein) are all mapped to the [`WILDCARD`] code.
//!
//! A dedicated loader may use a denser packing on disk; the `.esq` format
//! written here stores the code bytes verbatim.

use crate::error::{Error, Result};
use crate::intset::IntSet;
use crate::kmer::KmerIter;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Code of the wildcard symbol class.
pub const WILDCARD: u8 = 254;
/// Code of the boundary symbol between two sequences.
pub const SEPARATOR: u8 = 255;

const ESQ_MAGIC: &[u8; 8] = b"cseESQ01";

/// A fixed biological alphabet.
///
/// The *character count* is the number of distinct non-wildcard symbols (4
/// for DNA); the *cardinality* additionally counts the wildcard class (5
/// for DNA) and is the value the edit-script codec derives its entry width
/// from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alphabet {
    Dna,
    Protein,
}

const DNA_CHARS: &[u8] = b"acgt";
const PROTEIN_CHARS: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";

impl Alphabet {
    /// Number of non-wildcard characters.
    pub fn num_chars(&self) -> u32 {
        match self {
            Alphabet::Dna => 4,
            Alphabet::Protein => 20,
        }
    }

    /// Cardinality including the wildcard class.
    pub fn cardinality(&self) -> u32 {
        self.num_chars() + 1
    }

    /// Maps a character to its code, [`WILDCARD`], or `None` for characters
    /// outside the alphabet.
    pub fn encode(&self, c: u8) -> Option<u8> {
        match self {
            Alphabet::Dna => match c.to_ascii_lowercase() {
                b'a' => Some(0),
                b'c' => Some(1),
                b'g' => Some(2),
                b't' | b'u' => Some(3),
                b'n' | b's' | b'y' | b'w' | b'r' | b'k' | b'v' | b'b' | b'd' | b'h' | b'm' => {
                    Some(WILDCARD)
                }
                _ => None,
            },
            Alphabet::Protein => {
                let u = c.to_ascii_uppercase();
                if let Some(idx) = PROTEIN_CHARS.iter().position(|&p| p == u) {
                    Some(idx as u8)
                } else {
                    match u {
                        b'X' | b'B' | b'Z' | b'U' | b'O' | b'*' => Some(WILDCARD),
                        _ => None,
                    }
                }
            }
        }
    }

    /// Maps a code back to its canonical character; [`WILDCARD`] decodes to
    /// the alphabet's wildcard letter.
    pub fn decode(&self, code: u8) -> char {
        let (chars, wildcard) = match self {
            Alphabet::Dna => (DNA_CHARS, 'n'),
            Alphabet::Protein => (PROTEIN_CHARS, 'X'),
        };
        if (code as usize) < chars.len() {
            chars[code as usize] as char
        } else {
            wildcard
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Alphabet::Dna => 0,
            Alphabet::Protein => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Alphabet::Dna),
            1 => Ok(Alphabet::Protein),
            t => Err(Error::Corrupt(format!("unknown alphabet tag {t}"))),
        }
    }

    /// Writes the alphabet table (`.al1` companion).
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        let (chars, wildcard) = match self {
            Alphabet::Dna => (DNA_CHARS, 'n'),
            Alphabet::Protein => (PROTEIN_CHARS, 'X'),
        };
        for &c in chars {
            writeln!(out, "{}{}", c as char, (c as char).to_ascii_uppercase())?;
        }
        writeln!(out, "{wildcard}")?;
        Ok(())
    }
}

/// An encoded, concatenated sequence collection.
#[derive(Clone, Debug)]
pub struct Encseq {
    alphabet: Alphabet,
    /// Symbol codes with a SEPARATOR byte between sequences.
    codes: Vec<u8>,
    /// Positions of the SEPARATOR bytes, one per internal boundary.
    sep_positions: Vec<u64>,
    descriptions: Vec<String>,
}

impl Encseq {
    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Length of the concatenation including separators.
    pub fn total_length(&self) -> u64 {
        self.codes.len() as u64
    }

    pub fn num_sequences(&self) -> u64 {
        self.sep_positions.len() as u64 + 1
    }

    /// The raw code bytes, separators included.
    pub fn codes(&self) -> &[u8] {
        &self.codes
    }

    /// Start of sequence `n` in the concatenation.
    pub fn seqstartpos(&self, n: u64) -> u64 {
        if n == 0 {
            0
        } else {
            self.sep_positions[n as usize - 1] + 1
        }
    }

    /// Length of sequence `n`, separators excluded.
    pub fn seqlength(&self, n: u64) -> u64 {
        let start = self.seqstartpos(n);
        let end = if (n as usize) < self.sep_positions.len() {
            self.sep_positions[n as usize]
        } else {
            self.total_length()
        };
        end - start
    }

    /// The encoded symbol at `pos`.
    pub fn get(&self, pos: u64) -> u8 {
        self.codes[pos as usize]
    }

    pub fn description(&self, n: u64) -> &str {
        &self.descriptions[n as usize]
    }

    pub fn sep_positions(&self) -> &[u64] {
        &self.sep_positions
    }

    /// Decodes the inclusive range `[from, to]`, replacing separators with
    /// `sepchar`.
    pub fn extract_decoded(&self, from: u64, to: u64, sepchar: char) -> String {
        self.codes[from as usize..=to as usize]
            .iter()
            .map(|&c| {
                if c == SEPARATOR {
                    sepchar
                } else {
                    self.alphabet.decode(c)
                }
            })
            .collect()
    }

    /// A one-shot k-mer code iterator starting at `start`.
    pub fn kmer_iter(&self, kmersize: u32, start: u64) -> KmerIter<'_> {
        KmerIter::new(self, kmersize, start)
    }

    /// Writes the `.esq`, `.ssp` and `.al1` companions for `basename`.
    pub fn store(&self, basename: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(with_suffix(basename, "esq"))?);
        out.write_all(ESQ_MAGIC)?;
        out.write_all(&[self.alphabet.tag()])?;
        out.write_all(&(self.codes.len() as u64).to_ne_bytes())?;
        out.write_all(&self.codes)?;
        out.write_all(&(self.descriptions.len() as u64).to_ne_bytes())?;
        for desc in &self.descriptions {
            out.write_all(&(desc.len() as u64).to_ne_bytes())?;
            out.write_all(desc.as_bytes())?;
        }

        let mut ssp = BufWriter::new(File::create(with_suffix(basename, "ssp"))?);
        ssp.write_all(&(self.sep_positions.len() as u64).to_ne_bytes())?;
        if !self.sep_positions.is_empty() {
            let mut set = IntSet::best_new(
                *self.sep_positions.last().unwrap(),
                self.sep_positions.len() as u64,
            );
            for &pos in &self.sep_positions {
                set.add(pos)?;
            }
            set.write_to(&mut ssp)?;
        }

        self.alphabet.to_file(&with_suffix(basename, "al1"))?;
        Ok(())
    }

    /// Loads the collection written by [`store`](Self::store).
    pub fn load(basename: &Path) -> Result<Self> {
        let mut input = BufReader::new(File::open(with_suffix(basename, "esq"))?);
        let mut magic = [0u8; 8];
        input.read_exact(&mut magic)?;
        if &magic != ESQ_MAGIC {
            return Err(Error::Corrupt("bad .esq magic".into()));
        }
        let mut tag = [0u8; 1];
        input.read_exact(&mut tag)?;
        let alphabet = Alphabet::from_tag(tag[0])?;
        let len = read_u64(&mut input)?;
        let mut codes = vec![0u8; len as usize];
        input.read_exact(&mut codes)?;
        let num_descs = read_u64(&mut input)?;
        let mut descriptions = Vec::with_capacity(num_descs as usize);
        for _ in 0..num_descs {
            let dlen = read_u64(&mut input)?;
            let mut buf = vec![0u8; dlen as usize];
            input.read_exact(&mut buf)?;
            descriptions.push(String::from_utf8_lossy(&buf).into_owned());
        }

        let mut ssp = BufReader::new(File::open(with_suffix(basename, "ssp"))?);
        let num_seps = read_u64(&mut ssp)?;
        let mut sep_positions = Vec::with_capacity(num_seps as usize);
        if num_seps > 0 {
            let set = IntSet::read_from(&mut ssp)?;
            if set.len() != num_seps {
                return Err(Error::Corrupt("separator count mismatch in .ssp".into()));
            }
            for idx in 0..num_seps {
                sep_positions.push(set.get(idx));
            }
        }
        if descriptions.len() as u64 != num_seps + 1 {
            return Err(Error::Corrupt(
                "description count does not match sequence count".into(),
            ));
        }
        Ok(Encseq {
            alphabet,
            codes,
            sep_positions,
            descriptions,
        })
    }

    /// Parses a FASTA stream into an encoded collection.
    pub fn from_fasta<R: BufRead>(alphabet: Alphabet, reader: R) -> Result<Self> {
        let mut builder = EncseqBuilder::new(alphabet);
        let mut desc: Option<String> = None;
        let mut seq = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if let Some(rest) = line.strip_prefix('>') {
                if let Some(d) = desc.take() {
                    builder.add_sequence(&d, &seq)?;
                    seq.clear();
                }
                desc = Some(rest.trim().to_owned());
            } else if desc.is_some() {
                seq.extend(line.trim().bytes());
            } else if !line.trim().is_empty() {
                return Err(Error::InvalidArgument(
                    "FASTA input does not start with a header line".into(),
                ));
            }
        }
        if let Some(d) = desc.take() {
            builder.add_sequence(&d, &seq)?;
        }
        builder.build()
    }
}

/// Incremental construction of an [`Encseq`].
#[derive(Debug)]
pub struct EncseqBuilder {
    alphabet: Alphabet,
    codes: Vec<u8>,
    sep_positions: Vec<u64>,
    descriptions: Vec<String>,
}

impl EncseqBuilder {
    pub fn new(alphabet: Alphabet) -> Self {
        EncseqBuilder {
            alphabet,
            codes: Vec::new(),
            sep_positions: Vec::new(),
            descriptions: Vec::new(),
        }
    }

    /// Encodes and appends one sequence.
    pub fn add_sequence(&mut self, desc: &str, seq: &[u8]) -> Result<()> {
        if seq.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "sequence {desc:?} is empty"
            )));
        }
        let mut codes = Vec::with_capacity(seq.len());
        for &c in seq {
            codes.push(self.alphabet.encode(c).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "character {:?} is not in the alphabet",
                    c as char
                ))
            })?);
        }
        self.add_encoded(desc, &codes);
        Ok(())
    }

    /// Appends one sequence that is already encoded.
    pub fn add_encoded(&mut self, desc: &str, codes: &[u8]) {
        debug_assert!(!codes.is_empty());
        debug_assert!(codes.iter().all(|&c| c != SEPARATOR));
        if !self.codes.is_empty() {
            self.sep_positions.push(self.codes.len() as u64);
            self.codes.push(SEPARATOR);
        }
        self.codes.extend_from_slice(codes);
        self.descriptions.push(desc.to_owned());
    }

    pub fn build(self) -> Result<Encseq> {
        if self.codes.is_empty() {
            return Err(Error::InvalidArgument("no sequences given".into()));
        }
        Ok(Encseq {
            alphabet: self.alphabet,
            codes: self.codes,
            sep_positions: self.sep_positions,
            descriptions: self.descriptions,
        })
    }
}

pub(crate) fn with_suffix(basename: &Path, suffix: &str) -> std::path::PathBuf {
    let mut name = basename.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    name.into()
}

pub(crate) fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_ne_bytes(buf))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_decode_dna() {
        let a = Alphabet::Dna;
        assert_eq!(a.encode(b'a'), Some(0));
        assert_eq!(a.encode(b'T'), Some(3));
        assert_eq!(a.encode(b'N'), Some(WILDCARD));
        assert_eq!(a.encode(b'!'), None);
        assert_eq!(a.decode(2), 'g');
        assert_eq!(a.decode(WILDCARD), 'n');
        assert_eq!(a.cardinality(), 5);
    }

    #[test]
    fn sequence_layout() -> Result<()> {
        let mut b = EncseqBuilder::new(Alphabet::Dna);
        b.add_sequence("one", b"acgta")?;
        b.add_sequence("two", b"ttt")?;
        let es = b.build()?;
        assert_eq!(es.total_length(), 9);
        assert_eq!(es.num_sequences(), 2);
        assert_eq!(es.seqstartpos(0), 0);
        assert_eq!(es.seqstartpos(1), 6);
        assert_eq!(es.seqlength(0), 5);
        assert_eq!(es.seqlength(1), 3);
        assert_eq!(es.get(5), SEPARATOR);
        assert_eq!(es.extract_decoded(3, 7, '|'), "ta|tt");
        Ok(())
    }

    #[test]
    fn fasta_roundtrip() -> Result<()> {
        let fasta: &[u8] = b">s1 first\nacgt\nacgt\n>s2\nggg\n";
        let es = Encseq::from_fasta(Alphabet::Dna, std::io::BufReader::new(fasta))?;
        assert_eq!(es.num_sequences(), 2);
        assert_eq!(es.seqlength(0), 8);
        assert_eq!(es.description(0), "s1 first");
        assert_eq!(es.extract_decoded(0, es.total_length() - 1, '|'), "acgtacgt|ggg");
        Ok(())
    }

    #[test]
    fn store_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let basename = dir.path().join("idx");
        let mut b = EncseqBuilder::new(Alphabet::Dna);
        b.add_sequence("one", b"acgtacgtnn")?;
        b.add_sequence("two", b"tttt")?;
        let es = b.build()?;
        es.store(&basename)?;
        let loaded = Encseq::load(&basename)?;
        assert_eq!(loaded.codes(), es.codes());
        assert_eq!(loaded.num_sequences(), 2);
        assert_eq!(loaded.description(1), "two");
        Ok(())
    }
}
