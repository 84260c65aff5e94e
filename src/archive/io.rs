/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The binary container (suffix `.cse`), format version 1.
//!
//! All integers are fixed-width in host byte order; portability across
//! machines is achieved by requiring the same width choices at build time
//! for reader and writer. The unique store and its companions are written
//! through the encseq layer and share the container's basename.

use super::{CesLen, Condenseq, DescIndex, Link, Unique};
use crate::encseq::{with_suffix, Encseq};
use crate::error::{Error, Result};
use crate::intset::IntSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Suffix of the container file.
pub const CONDENSEQ_SUFFIX: &str = "cse";

const CONDENSEQ_VERSION: i32 = 1;
const UWORD_UNDEF: u64 = u64::MAX;

pub(crate) trait ReadExt: Read {
    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_ne_bytes(buf))
    }

    fn read_ces_len(&mut self) -> Result<CesLen> {
        let mut buf = [0u8; std::mem::size_of::<CesLen>()];
        self.read_exact(&mut buf)?;
        Ok(CesLen::from_ne_bytes(buf))
    }
}

impl<R: Read> ReadExt for R {}

pub(crate) trait WriteExt: Write {
    fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_all(&value.to_ne_bytes())?;
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_all(&value.to_ne_bytes())?;
        Ok(())
    }

    fn write_ces_len(&mut self, value: CesLen) -> Result<()> {
        self.write_all(&value.to_ne_bytes())?;
        Ok(())
    }
}

impl<W: Write> WriteExt for W {}

impl Condenseq {
    /// Writes the container to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u64(self.orig_len)?;
        writer.write_i32(CONDENSEQ_VERSION)?;
        writer.write_u64(self.orig_num_seq)?;
        writer.write_u64(self.links.len() as u64)?;
        if self.links.is_empty() {
            log::warn!(
                "compression did not find any compressable similarities, maybe the input is \
                 too small or the chosen parameters should be reconsidered"
            );
        }
        writer.write_u64(self.uniques.len() as u64)?;
        for link in &self.links {
            writer.write_u64(link.orig_startpos)?;
            writer.write_ces_len(link.len)?;
            writer.write_ces_len(link.unique_id)?;
            writer.write_ces_len(link.unique_offset)?;
            link.editscript.write_to(writer)?;
        }
        for unique in &self.uniques {
            writer.write_u64(unique.orig_startpos)?;
            writer.write_ces_len(unique.len)?;
        }
        if self.orig_num_seq > 1 {
            self.ssptab
                .as_ref()
                .expect("separator table exists for multiple sequences")
                .write_to(writer)?;
        }
        match &self.desc_index {
            DescIndex::ConstLen(id_len) => writer.write_u64(*id_len)?,
            DescIndex::Sds(set) => {
                writer.write_u64(UWORD_UNDEF)?;
                set.write_to(writer)?;
            }
        }
        writer.write_u64(self.ids.len() as u64)?;
        writer.write_all(&self.ids)?;
        Ok(())
    }

    /// Reads a container written by [`write_to`](Self::write_to). The
    /// unique store is not attached yet.
    pub fn read_from<R: Read>(reader: &mut R, alphabet: crate::encseq::Alphabet) -> Result<Self> {
        let orig_len = reader.read_u64()?;
        let version = reader.read_i32()?;
        if version != CONDENSEQ_VERSION {
            return Err(Error::Corrupt(format!(
                "condenseq index is format version {version}, current is {CONDENSEQ_VERSION} \
                 -- please re-encode"
            )));
        }
        let orig_num_seq = reader.read_u64()?;
        let num_links = reader.read_u64()?;
        if num_links == 0 {
            log::warn!("the archive contains no links");
        }
        if num_links > u32::MAX as u64 {
            return Err(Error::Corrupt("too many link elements".into()));
        }
        let num_uniques = reader.read_u64()?;
        if num_uniques == 0 {
            return Err(Error::Corrupt("an archive needs at least one unique".into()));
        }

        let mut links = Vec::with_capacity(num_links as usize);
        for _ in 0..num_links {
            let orig_startpos = reader.read_u64()?;
            let len = reader.read_ces_len()?;
            let unique_id = reader.read_ces_len()?;
            let unique_offset = reader.read_ces_len()?;
            let editscript = crate::editscript::Editscript::read_from(reader)?;
            links.push(Link {
                orig_startpos,
                len,
                unique_id,
                unique_offset,
                editscript,
            });
        }
        let mut uniques = Vec::with_capacity(num_uniques as usize);
        for _ in 0..num_uniques {
            let orig_startpos = reader.read_u64()?;
            let len = reader.read_ces_len()?;
            uniques.push(Unique {
                orig_startpos,
                len,
                links: Vec::new(),
            });
        }

        for pair in links.windows(2) {
            if pair[0].orig_startpos + pair[0].len as u64 > pair[1].orig_startpos {
                return Err(Error::Corrupt("link table is not sorted".into()));
            }
        }
        for pair in uniques.windows(2) {
            if pair[0].orig_startpos + pair[0].len as u64 > pair[1].orig_startpos {
                return Err(Error::Corrupt("unique table is not sorted".into()));
            }
        }
        for link in &links {
            let unique = uniques
                .get(link.unique_id as usize)
                .ok_or_else(|| Error::Corrupt("link references missing unique".into()))?;
            if link.unique_offset as u64 + link.editscript.source_len() > unique.len as u64 {
                return Err(Error::Corrupt(
                    "link window exceeds its unique fragment".into(),
                ));
            }
        }

        let ssptab = if orig_num_seq > 1 {
            Some(IntSet::read_from(reader)?)
        } else {
            None
        };
        let id_len = reader.read_u64()?;
        let desc_index = if id_len == UWORD_UNDEF {
            DescIndex::Sds(IntSet::read_from(reader)?)
        } else {
            DescIndex::ConstLen(id_len)
        };
        let ids_total_len = reader.read_u64()?;
        let mut ids = vec![0u8; ids_total_len as usize];
        reader.read_exact(&mut ids)?;

        let mut ces = Condenseq {
            alphabet,
            orig_len,
            orig_num_seq,
            ssptab,
            desc_index,
            ids,
            uniques,
            links,
            unique_es: None,
            filename: None,
            ubuffer: Vec::new(),
            dbuffer: String::new(),
        };
        // rebuild the per-unique back-reference arrays
        for idx in 0..ces.links.len() {
            let uid = ces.links[idx].unique_id as usize;
            ces.uniques[uid].links.push(idx as u32);
        }
        Ok(ces)
    }

    /// Writes the container to `<basename>.cse`.
    pub fn store(&self, basename: &Path) -> Result<()> {
        let path = with_suffix(basename, CONDENSEQ_SUFFIX);
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        Ok(())
    }

    /// Loads an archive: the unique store from the encseq companions and
    /// the container from `<basename>.cse`.
    pub fn load(basename: &Path) -> Result<Self> {
        let unique_es = Encseq::load(basename)?;
        let path = with_suffix(basename, CONDENSEQ_SUFFIX);
        let mut reader = BufReader::new(File::open(path)?);
        let mut ces = Self::read_from(&mut reader, unique_es.alphabet())?;
        if ces.uniques.len() as u64 != unique_es.num_sequences() {
            return Err(Error::Corrupt(
                "unique store does not match the unique table".into(),
            ));
        }
        ces.attach_unique_store(unique_es);
        ces.set_filename(basename.to_path_buf());
        match &ces.desc_index {
            DescIndex::ConstLen(len) => log::info!("ids have const len {len}"),
            DescIndex::Sds(_) => log::info!("using sds table to access ids"),
        }
        Ok(ces)
    }
}
