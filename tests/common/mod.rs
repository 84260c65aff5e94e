/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use condenseq::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub fn random_dna(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..len)
        .map(|_| b"acgt"[rng.random_range(0..4)])
        .collect()
}

pub fn encseq_of(seqs: &[(&str, &[u8])]) -> Encseq {
    let mut builder = EncseqBuilder::new(Alphabet::Dna);
    for (desc, seq) in seqs {
        builder.add_sequence(desc, seq).unwrap();
    }
    builder.build().unwrap()
}

pub fn config(
    kmersize: u32,
    windowsize: u32,
    min_align_len: u64,
    initsize: u64,
    extension: Extension,
) -> CreatorConfig {
    let mut config = CreatorConfig::for_alphabet(Alphabet::Dna);
    config.kmersize = kmersize;
    config.windowsize = windowsize;
    config.min_align_len = min_align_len;
    config.initsize = initsize;
    config.extension = extension;
    config
}

/// Every single byte of the original must come back out of the archive.
pub fn assert_roundtrip(ces: &mut Condenseq, original: &Encseq) {
    let len = original.total_length();
    let got = ces
        .extract_encoded_range(SeqRange::new(0, len - 1))
        .unwrap();
    assert_eq!(got, original.codes());
    // single byte extraction agrees everywhere
    for pos in (0..len).step_by(97) {
        let byte = ces.extract_encoded_range(SeqRange::new(pos, pos)).unwrap()[0];
        assert_eq!(byte, original.codes()[pos as usize], "position {pos}");
    }
}

/// The fragments and separators must cover the coordinate space exactly
/// once.
pub fn assert_partition(ces: &Condenseq) {
    let mut covered = vec![false; ces.total_length() as usize];
    for unique in ces.uniques() {
        for pos in unique.orig_startpos..unique.orig_startpos + unique.len as u64 {
            assert!(!covered[pos as usize], "unique overlap at {pos}");
            covered[pos as usize] = true;
        }
    }
    for link in ces.links() {
        // every edit-script replays exactly the link's span
        assert_eq!(link.editscript.target_len(), link.len as u64);
        for pos in link.orig_startpos..link.orig_startpos + link.len as u64 {
            assert!(!covered[pos as usize], "link overlap at {pos}");
            covered[pos as usize] = true;
        }
    }
    for seqnum in 1..ces.num_sequences() {
        let sep = ces.seqstartpos(seqnum) - 1;
        assert!(!covered[sep as usize], "separator overlap at {sep}");
        covered[sep as usize] = true;
    }
    assert!(covered.iter().all(|&c| c), "coordinate space not covered");
}
