/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

mod common;

use common::*;
use condenseq::prelude::*;
use tempfile::TempDir;

fn workdir() -> TempDir {
    tempfile::Builder::new().prefix("condenseq_test").tempdir().unwrap()
}

#[test]
fn single_sequence_without_repeats() {
    let seq = random_dna(1000, 42);
    let es = encseq_of(&[("S1", &seq)]);
    let dir = workdir();
    let mut creator =
        CondenseqCreator::new(config(11, 20, 40, 100, Extension::SparseDiagonals)).unwrap();
    let mut ces = creator.create(&dir.path().join("s1"), &es).unwrap();

    assert_eq!(ces.num_uniques(), 1);
    assert_eq!(ces.uniques()[0].len, 1000);
    assert_eq!(ces.num_links(), 0);
    assert_partition(&ces);
    assert_roundtrip(&mut ces, &es);

    let mut gff = Vec::new();
    ces.write_gff3(&mut gff).unwrap();
    let text = String::from_utf8(gff).unwrap();
    assert_eq!(
        text.lines().filter(|l| l.contains("Name=unique")).count(),
        1
    );
    assert!(!text.contains("Name=link"));
}

#[test]
fn duplicate_sequence_produces_one_link() {
    let seq = random_dna(1000, 7);
    let es = encseq_of(&[("A", &seq), ("B", &seq)]);
    assert_eq!(es.total_length(), 2001);
    let dir = workdir();
    let mut creator = CondenseqCreator::new(config(11, 20, 40, 100, Extension::Filter)).unwrap();
    let mut ces = creator.create(&dir.path().join("dup"), &es).unwrap();

    assert_eq!(ces.num_uniques(), 1);
    assert!(ces.uniques()[0].len >= 1000);
    assert_eq!(ces.num_links(), 1);
    let link = &ces.links()[0];
    assert_eq!(link.orig_startpos, 1001);
    assert_eq!(link.len, 1000);
    assert_eq!(link.unique_offset, 0);
    let stats = link.editscript.stats();
    assert_eq!(stats.matches, 1000);
    assert_eq!(stats.mismatches + stats.insertions + stats.deletions, 0);
    // the unique back-references its link
    assert_eq!(ces.uniques()[0].links, vec![0]);
    assert_partition(&ces);

    let second = ces
        .extract_encoded_range(SeqRange::new(1001, 2000))
        .unwrap()
        .to_vec();
    let first = ces
        .extract_encoded_range(SeqRange::new(0, 999))
        .unwrap()
        .to_vec();
    assert_eq!(second, first);
    assert_roundtrip(&mut ces, &es);
}

#[test]
fn substitutions_are_stored_in_the_editscript() {
    let seq1 = random_dna(500, 11);
    let mut seq2 = seq1.clone();
    let offsets = [40usize, 85, 130, 175, 220, 265, 310, 355, 400, 445];
    for &off in &offsets {
        seq2[off] = match seq2[off] {
            b'a' => b'c',
            b'c' => b'g',
            b'g' => b't',
            _ => b'a',
        };
    }
    let es = encseq_of(&[("one", &seq1), ("two", &seq2)]);
    let dir = workdir();
    let mut creator = CondenseqCreator::new(config(9, 18, 30, 100, Extension::Filter)).unwrap();
    let mut ces = creator.create(&dir.path().join("subst"), &es).unwrap();

    assert_eq!(ces.num_links(), 1);
    let link = &ces.links()[0];
    let stats = link.editscript.stats();
    assert_eq!(stats.matches, 490);
    assert_eq!(stats.mismatches, 10);
    assert_eq!(stats.insertions, 0);
    assert_eq!(stats.deletions, 0);
    assert_eq!(link.editscript.target_len(), 500);
    assert_eq!(link.editscript.source_len(), 500);

    let decoded = ces
        .extract_encoded_range(SeqRange::new(501, 1000))
        .unwrap()
        .to_vec();
    let expected: Vec<u8> = seq2
        .iter()
        .map(|&c| Alphabet::Dna.encode(c).unwrap())
        .collect();
    assert_eq!(decoded, expected);
    assert_roundtrip(&mut ces, &es);
}

#[test]
fn diagonal_filter_seeds_after_a_gap() {
    let seq1 = random_dna(600, 3);
    let mut seq2 = seq1.clone();
    for slot in &mut seq2[60..64] {
        *slot = b'n';
    }
    let es = encseq_of(&[("ref", &seq1), ("quer", &seq2)]);
    let dir = workdir();
    let mut config = config(8, 24, 40, 100, Extension::SparseDiagonals);
    // the extension has to cross the wildcard patch
    config.xdrop = 6;
    let mut creator = CondenseqCreator::new(config).unwrap();
    let mut ces = creator.create(&dir.path().join("gap"), &es).unwrap();

    assert_eq!(ces.num_links(), 1);
    let stats = ces.links()[0].editscript.stats();
    assert_eq!(stats.mismatches, 4);
    assert_eq!(stats.matches, 596);
    assert_partition(&ces);
    assert_roundtrip(&mut ces, &es);
}

#[test]
fn full_diagonals_behave_like_sparse() {
    let seq1 = random_dna(600, 3);
    let mut seq2 = seq1.clone();
    for slot in &mut seq2[60..64] {
        *slot = b'n';
    }
    let es = encseq_of(&[("ref", &seq1), ("quer", &seq2)]);
    let dir = workdir();
    let mut config = config(8, 24, 40, 100, Extension::FullDiagonals);
    config.xdrop = 6;
    let mut creator = CondenseqCreator::new(config).unwrap();
    let mut ces = creator.create(&dir.path().join("fullgap"), &es).unwrap();
    assert_eq!(ces.num_links(), 1);
    assert_roundtrip(&mut ces, &es);
}

#[test]
fn short_sequences_become_plain_uniques() {
    let long1 = random_dna(600, 5);
    let short = random_dna(20, 6);
    let es = encseq_of(&[("a", &long1), ("tiny", &short), ("b", &long1)]);
    let dir = workdir();
    let mut creator = CondenseqCreator::new(config(11, 20, 40, 100, Extension::Filter)).unwrap();
    let mut ces = creator.create(&dir.path().join("short"), &es).unwrap();

    // the short sequence is a unique of its own, the copy becomes a link
    assert_eq!(ces.num_links(), 1);
    assert!(ces
        .uniques()
        .iter()
        .any(|u| u.orig_startpos == 601 && u.len == 20));
    let link = &ces.links()[0];
    assert_eq!(link.orig_startpos, 622);
    assert_eq!(link.len, 600);
    assert_partition(&ces);
    assert_roundtrip(&mut ces, &es);
}

#[test]
fn homopolymer_with_cutoff_roundtrips() {
    let seq = vec![b'a'; 2000];
    let es = encseq_of(&[("homopolymer", &seq)]);
    let dir = workdir();
    let mut config = config(5, 15, 40, 100, Extension::SparseDiagonals);
    config.cutoff = Cutoff::Fixed(4);
    config.prune = true;
    let mut creator = CondenseqCreator::new(config).unwrap();
    let mut ces = creator.create(&dir.path().join("homo"), &es).unwrap();

    assert_eq!(ces.num_uniques(), 1);
    assert_eq!(ces.num_links(), 0);
    assert_roundtrip(&mut ces, &es);
}

#[test]
fn brute_force_finds_the_duplicate() {
    let seq = random_dna(400, 21);
    let es = encseq_of(&[("A", &seq), ("B", &seq)]);
    let dir = workdir();
    let mut creator =
        CondenseqCreator::new(config(11, 20, 40, 100, Extension::BruteForce)).unwrap();
    let mut ces = creator.create(&dir.path().join("brute"), &es).unwrap();
    assert_eq!(ces.num_links(), 1);
    assert_eq!(ces.links()[0].len, 400);
    assert_roundtrip(&mut ces, &es);
}

#[test]
fn init_needs_enough_kmers() {
    let seq = random_dna(100, 9);
    let es = encseq_of(&[("tiny", &seq)]);
    let dir = workdir();
    let mut creator =
        CondenseqCreator::new(config(11, 20, 40, 1000, Extension::SparseDiagonals)).unwrap();
    let result = creator.create(&dir.path().join("tiny"), &es);
    assert!(matches!(
        result,
        Err(condenseq::Error::InsufficientInput { .. })
    ));
}
