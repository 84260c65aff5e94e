/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A compact set of strictly increasing integers.
//!
//! Values bounded by `maxelement` are split into a section (the high bits)
//! and a fractional part stored in a u8, u16 or u32 payload; a table of
//! cumulative section sizes restores the high bits on access. The factory
//! [`IntSet::best_new`] picks the variant that minimises total bytes for a
//! given `(maxelement, n)` pair, and a magic word on disk selects the
//! variant on read.

use crate::error::{Error, Result};
use std::io::{Read, Write};

const MAGIC_8: u64 = u64::from_le_bytes(*b"cseIS08\0");
const MAGIC_16: u64 = u64::from_le_bytes(*b"cseIS16\0");
const MAGIC_32: u64 = u64::from_le_bytes(*b"cseIS32\0");

/// The fractional-part payload of one int-set variant.
pub trait Stride: Copy + Default {
    const LOG_SECTION: u32;
    const MAGIC: u64;
    fn pack(low: u64) -> Self;
    fn unpack(self) -> u64;
    fn write_elem<W: Write>(self, writer: &mut W) -> std::io::Result<()>;
    fn read_elem<R: Read>(reader: &mut R) -> std::io::Result<Self>;
}

macro_rules! impl_stride {
    ($ty:ty, $log:expr, $magic:expr) => {
        impl Stride for $ty {
            const LOG_SECTION: u32 = $log;
            const MAGIC: u64 = $magic;

            #[inline]
            fn pack(low: u64) -> Self {
                low as $ty
            }

            #[inline]
            fn unpack(self) -> u64 {
                self as u64
            }

            fn write_elem<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
                writer.write_all(&self.to_ne_bytes())
            }

            fn read_elem<R: Read>(reader: &mut R) -> std::io::Result<Self> {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                reader.read_exact(&mut buf)?;
                Ok(<$ty>::from_ne_bytes(buf))
            }
        }
    };
}

impl_stride!(u8, 8, MAGIC_8);
impl_stride!(u16, 16, MAGIC_16);
impl_stride!(u32, 32, MAGIC_32);

/// One concrete variant; see [`IntSet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntSetRepr<T> {
    maxelement: u64,
    elements: Vec<T>,
    /// `sectionstart[s]` is the number of elements whose section is `< s`;
    /// sections past `current_section` are implicitly full.
    sectionstart: Vec<u64>,
    current_section: u64,
}

impl<T: Stride> IntSetRepr<T> {
    fn num_sections(maxelement: u64) -> u64 {
        (maxelement >> T::LOG_SECTION) + 1
    }

    pub fn new(maxelement: u64, n: u64) -> Self {
        IntSetRepr {
            maxelement,
            elements: Vec::with_capacity(n as usize),
            sectionstart: vec![0; Self::num_sections(maxelement) as usize + 1],
            current_section: 0,
        }
    }

    #[inline]
    fn section_start(&self, section: u64) -> u64 {
        if section <= self.current_section {
            self.sectionstart[section as usize]
        } else {
            self.elements.len() as u64
        }
    }

    pub fn add(&mut self, value: u64) -> Result<()> {
        if value > self.maxelement {
            return Err(Error::InvalidArgument(format!(
                "int-set value {value} exceeds maxelement {}",
                self.maxelement
            )));
        }
        if let Some(last) = self.last() {
            if value <= last {
                return Err(Error::InvalidArgument(format!(
                    "int-set values must increase strictly ({value} after {last})"
                )));
            }
        }
        let section = value >> T::LOG_SECTION;
        while self.current_section < section {
            self.current_section += 1;
            self.sectionstart[self.current_section as usize] = self.elements.len() as u64;
        }
        self.elements
            .push(T::pack(value & ((1u64 << T::LOG_SECTION) - 1)));
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.elements.len() as u64
    }

    fn last(&self) -> Option<u64> {
        if self.elements.is_empty() {
            None
        } else {
            Some(self.get(self.len() - 1))
        }
    }

    pub fn get(&self, idx: u64) -> u64 {
        debug_assert!(idx < self.len());
        // last section s with sectionstart[s] <= idx
        let mut low = 0u64;
        let mut high = Self::num_sections(self.maxelement);
        while high - low > 1 {
            let mid = (low + high) / 2;
            if self.section_start(mid) <= idx {
                low = mid;
            } else {
                high = mid;
            }
        }
        (low << T::LOG_SECTION) | self.elements[idx as usize].unpack()
    }

    /// Index of the smallest stored value `>= value`, or `len()` when no
    /// such value exists.
    pub fn idx_smallest_geq(&self, value: u64) -> u64 {
        if value > self.maxelement {
            return self.len();
        }
        let section = value >> T::LOG_SECTION;
        let low_bits = value & ((1u64 << T::LOG_SECTION) - 1);
        let start = self.section_start(section) as usize;
        let end = self.section_start(section + 1) as usize;
        let within = self.elements[start..end].partition_point(|e| e.unpack() < low_bits);
        (start + within) as u64
    }

    /// Bytes of the payload representation for `n` elements bounded by
    /// `maxelement`.
    pub fn memory_size(maxelement: u64, n: u64) -> usize {
        (Self::num_sections(maxelement) as usize + 1) * std::mem::size_of::<u64>()
            + n as usize * (T::LOG_SECTION as usize / 8)
    }

    fn size_of_rep(&self) -> usize {
        Self::memory_size(self.maxelement, self.len())
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&T::MAGIC.to_ne_bytes())?;
        writer.write_all(&self.maxelement.to_ne_bytes())?;
        writer.write_all(&self.len().to_ne_bytes())?;
        for &elem in &self.elements {
            elem.write_elem(writer)?;
        }
        writer.write_all(&self.current_section.to_ne_bytes())?;
        for &start in &self.sectionstart {
            writer.write_all(&start.to_ne_bytes())?;
        }
        Ok(())
    }

    fn read_body<R: Read>(reader: &mut R) -> Result<Self> {
        let maxelement = read_u64(reader)?;
        let n = read_u64(reader)?;
        let mut elements = Vec::with_capacity(n as usize);
        for _ in 0..n {
            elements.push(T::read_elem(reader)?);
        }
        let current_section = read_u64(reader)?;
        let num_sections = Self::num_sections(maxelement);
        if current_section > num_sections {
            return Err(Error::Corrupt("int-set section count out of range".into()));
        }
        let mut sectionstart = Vec::with_capacity(num_sections as usize + 1);
        for _ in 0..=num_sections {
            sectionstart.push(read_u64(reader)?);
        }
        Ok(IntSetRepr {
            maxelement,
            elements,
            sectionstart,
            current_section,
        })
    }
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_ne_bytes(buf))
}

/// The tagged int-set; the variant choice is an implementation detail of
/// [`best_new`](IntSet::best_new) and of the on-disk magic word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntSet {
    U8(IntSetRepr<u8>),
    U16(IntSetRepr<u16>),
    U32(IntSetRepr<u32>),
}

impl IntSet {
    /// Picks the variant with the smallest representation for `n` values
    /// bounded by `maxelement`.
    pub fn best_new(maxelement: u64, n: u64) -> IntSet {
        let s8 = IntSetRepr::<u8>::memory_size(maxelement, n);
        let s16 = IntSetRepr::<u16>::memory_size(maxelement, n);
        let s32 = IntSetRepr::<u32>::memory_size(maxelement, n);
        if s8 <= s16 && s8 <= s32 {
            IntSet::U8(IntSetRepr::new(maxelement, n))
        } else if s16 <= s32 {
            IntSet::U16(IntSetRepr::new(maxelement, n))
        } else {
            IntSet::U32(IntSetRepr::new(maxelement, n))
        }
    }

    /// The smallest representation size over all variants.
    pub fn best_memory_size(maxelement: u64, n: u64) -> usize {
        IntSetRepr::<u8>::memory_size(maxelement, n)
            .min(IntSetRepr::<u16>::memory_size(maxelement, n))
            .min(IntSetRepr::<u32>::memory_size(maxelement, n))
    }

    /// Appends `value`, which must be strictly larger than the last one.
    pub fn add(&mut self, value: u64) -> Result<()> {
        match self {
            IntSet::U8(s) => s.add(value),
            IntSet::U16(s) => s.add(value),
            IntSet::U32(s) => s.add(value),
        }
    }

    pub fn get(&self, idx: u64) -> u64 {
        match self {
            IntSet::U8(s) => s.get(idx),
            IntSet::U16(s) => s.get(idx),
            IntSet::U32(s) => s.get(idx),
        }
    }

    /// Index of the smallest stored value `>= value`, or `len()`.
    pub fn idx_smallest_geq(&self, value: u64) -> u64 {
        match self {
            IntSet::U8(s) => s.idx_smallest_geq(value),
            IntSet::U16(s) => s.idx_smallest_geq(value),
            IntSet::U32(s) => s.idx_smallest_geq(value),
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            IntSet::U8(s) => s.len(),
            IntSet::U16(s) => s.len(),
            IntSet::U32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes of the representation.
    pub fn size_of_rep(&self) -> usize {
        match self {
            IntSet::U8(s) => s.size_of_rep(),
            IntSet::U16(s) => s.size_of_rep(),
            IntSet::U32(s) => s.size_of_rep(),
        }
    }

    pub fn size_of_struct(&self) -> usize {
        std::mem::size_of::<Self>()
    }

    /// Magic-tagged serialisation.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            IntSet::U8(s) => s.write_to(writer),
            IntSet::U16(s) => s.write_to(writer),
            IntSet::U32(s) => s.write_to(writer),
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<IntSet> {
        let magic = read_u64(reader)?;
        match magic {
            MAGIC_8 => Ok(IntSet::U8(IntSetRepr::read_body(reader)?)),
            MAGIC_16 => Ok(IntSet::U16(IntSetRepr::read_body(reader)?)),
            MAGIC_32 => Ok(IntSet::U32(IntSetRepr::read_body(reader)?)),
            _ => Err(Error::Corrupt("unknown int-set magic".into())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_values(maxpos: u64, n: usize, seed: u64) -> Vec<u64> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut values: Vec<u64> = (0..n).map(|_| rng.random_range(0..=maxpos)).collect();
        values.sort_unstable();
        values.dedup();
        values
    }

    fn filled<T: Stride>(values: &[u64], maxpos: u64) -> IntSetRepr<T> {
        let mut set = IntSetRepr::<T>::new(maxpos, values.len() as u64);
        for &v in values {
            set.add(v).unwrap();
        }
        set
    }

    #[test]
    fn get_matches_input() {
        let maxpos = 1 << 20;
        let values = random_values(maxpos, 500, 7);
        let set = filled::<u8>(&values, maxpos);
        for (idx, &v) in values.iter().enumerate() {
            assert_eq!(set.get(idx as u64), v);
        }
    }

    #[test]
    fn geq_agrees_with_linear_search() {
        let maxpos = 100_000;
        let values = random_values(maxpos, 300, 11);
        let set = filled::<u16>(&values, maxpos);
        let mut rng = SmallRng::seed_from_u64(13);
        for _ in 0..1000 {
            let probe = rng.random_range(0..=maxpos + 10);
            let expected = values.iter().position(|&v| v >= probe);
            let got = set.idx_smallest_geq(probe);
            match expected {
                Some(idx) => assert_eq!(got, idx as u64, "probe {probe}"),
                None => assert_eq!(got, set.len(), "probe {probe}"),
            }
        }
    }

    #[test]
    fn strictly_increasing_enforced() {
        let mut set = IntSet::best_new(100, 3);
        set.add(5).unwrap();
        assert!(set.add(5).is_err());
        assert!(set.add(4).is_err());
        assert!(set.add(101).is_err());
        set.add(6).unwrap();
    }

    #[test]
    fn best_new_picks_smallest() {
        // few elements over a huge range: the wide payload avoids the large
        // section table
        assert!(matches!(IntSet::best_new(u32::MAX as u64, 4), IntSet::U32(_)));
        // many elements in a tiny range: narrow payload wins
        assert!(matches!(IntSet::best_new(1 << 10, 10_000), IntSet::U8(_)));
    }

    #[test]
    fn io_roundtrip_all_variants() {
        let maxpos = 1 << 18;
        let values = random_values(maxpos, 200, 17);
        let sets = [
            IntSet::U8(filled::<u8>(&values, maxpos)),
            IntSet::U16(filled::<u16>(&values, maxpos)),
            IntSet::U32(filled::<u32>(&values, maxpos)),
        ];
        for set in &sets {
            let mut buf = Vec::new();
            set.write_to(&mut buf).unwrap();
            let back = IntSet::read_from(&mut buf.as_slice()).unwrap();
            assert_eq!(&back, set);
            for idx in 0..set.len() {
                assert_eq!(back.get(idx), set.get(idx));
            }
        }
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let buf = vec![0u8; 64];
        assert!(matches!(
            IntSet::read_from(&mut buf.as_slice()),
            Err(Error::Corrupt(_))
        ));
    }
}
