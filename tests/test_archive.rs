/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

mod common;

use common::*;
use condenseq::prelude::*;
use std::fs;
use tempfile::TempDir;

fn workdir() -> TempDir {
    tempfile::Builder::new().prefix("condenseq_test").tempdir().unwrap()
}

/// Builds the standard two-copy archive used by most tests below.
fn duplicate_archive(dir: &TempDir) -> (Condenseq, Encseq) {
    let seq = random_dna(1000, 7);
    let es = encseq_of(&[("A first", &seq), ("B second", &seq)]);
    let mut creator = CondenseqCreator::new(config(11, 20, 40, 100, Extension::Filter)).unwrap();
    let ces = creator.create(&dir.path().join("dup"), &es).unwrap();
    (ces, es)
}

#[test]
fn separator_is_replaced_in_decoded_extraction() {
    let seq_a = random_dna(300, 1);
    let seq_b = random_dna(300, 2);
    let es = encseq_of(&[("a", &seq_a), ("b", &seq_b)]);
    let dir = workdir();
    let mut creator =
        CondenseqCreator::new(config(11, 20, 40, 100, Extension::SparseDiagonals)).unwrap();
    let mut ces = creator.create(&dir.path().join("sep"), &es).unwrap();

    let text = ces
        .extract_decoded_range(SeqRange::new(290, 310), '|')
        .unwrap();
    assert_eq!(text.len(), 21);
    assert_eq!(text.as_bytes()[300 - 290], b'|');
    assert_eq!(text, es.extract_decoded(290, 310, '|'));
}

#[test]
fn whole_sequence_extraction() {
    let dir = workdir();
    let (mut ces, es) = duplicate_archive(&dir);
    let expected0 = es.extract_decoded(0, 999, '\0');
    let expected1 = es.extract_decoded(1001, 2000, '\0');
    assert_eq!(ces.extract_decoded(0).unwrap(), expected0);
    assert_eq!(ces.extract_decoded(1).unwrap(), expected1);
    assert_eq!(ces.extract_encoded(1).unwrap().len(), 1000);
}

#[test]
fn store_load_roundtrip() {
    let dir = workdir();
    let (mut built, es) = duplicate_archive(&dir);
    let mut loaded = Condenseq::load(&dir.path().join("dup")).unwrap();

    assert_eq!(loaded.total_length(), built.total_length());
    assert_eq!(loaded.num_sequences(), 2);
    assert_eq!(loaded.num_uniques(), built.num_uniques());
    assert_eq!(loaded.num_links(), built.num_links());
    assert_eq!(loaded.description(0), built.description(0));
    assert_eq!(loaded.description(1), "B");

    // the back-references are rebuilt on load
    assert_eq!(loaded.uniques()[0].links, vec![0]);

    assert_roundtrip(&mut loaded, &es);
    let len = es.total_length();
    let from_built = built
        .extract_encoded_range(SeqRange::new(0, len - 1))
        .unwrap()
        .to_vec();
    let from_loaded = loaded
        .extract_encoded_range(SeqRange::new(0, len - 1))
        .unwrap()
        .to_vec();
    assert_eq!(from_built, from_loaded);
}

#[test]
fn version_mismatch_is_rejected() {
    let dir = workdir();
    let (_ces, _es) = duplicate_archive(&dir);
    let cse = dir.path().join("dup.cse");
    let mut bytes = fs::read(&cse).unwrap();
    // the version word follows the 8 byte total length
    bytes[8] = 2;
    fs::write(&cse, &bytes).unwrap();
    match Condenseq::load(&dir.path().join("dup")) {
        Err(condenseq::Error::Corrupt(msg)) => assert!(msg.contains("please re-encode")),
        other => panic!("expected a corrupt archive error, got {other:?}"),
    }
}

#[test]
fn out_of_bounds_ranges_are_rejected() {
    let dir = workdir();
    let (mut ces, _es) = duplicate_archive(&dir);
    assert!(matches!(
        ces.extract_encoded_range(SeqRange::new(0, 2001)),
        Err(condenseq::Error::RangeOutOfBounds { .. })
    ));
    assert!(matches!(
        ces.extract_encoded_range(SeqRange::new(5, 4)),
        Err(condenseq::Error::RangeOutOfBounds { .. })
    ));
}

#[test]
fn redundant_sequences_are_enumerated() {
    let dir = workdir();
    let (ces, _es) = duplicate_archive(&dir);
    let mut seqs = Vec::new();
    let count = ces
        .each_redundant_seq(0, |seqnum| {
            seqs.push(seqnum);
            Ok(())
        })
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(seqs, vec![0, 1]);
}

#[test]
fn redundant_ranges_are_enumerated() {
    let dir = workdir();
    let (ces, _es) = duplicate_archive(&dir);
    let mut regions = Vec::new();
    let count = ces
        .each_redundant_range(0, SeqRange::new(10, 50), 5, 5, |seqnum, range| {
            regions.push((seqnum, range.start, range.end));
            Ok(())
        })
        .unwrap();
    assert_eq!(count, 2);
    // the source region comes first, clamped to its sequence
    assert_eq!(regions[0], (0, 5, 55));
    // the link's region lies in the second sequence
    let (seqnum, start, end) = regions[1];
    assert_eq!(seqnum, 1);
    assert_eq!(start, 1006);
    assert!((1051..=1060).contains(&end));
}

#[test]
fn redundant_range_abort_propagates() {
    let dir = workdir();
    let (ces, _es) = duplicate_archive(&dir);
    let mut calls = 0;
    let result = ces.each_redundant_range(0, SeqRange::new(0, 10), 0, 0, |_, _| {
        calls += 1;
        Err(condenseq::Error::CallbackAbort)
    });
    assert!(matches!(result, Err(condenseq::Error::CallbackAbort)));
    assert_eq!(calls, 1);
}

#[test]
fn companion_files_are_written() {
    let dir = workdir();
    let (_ces, _es) = duplicate_archive(&dir);
    for suffix in ["cse", "fas", "esq", "ssp", "al1"] {
        let path = dir.path().join(format!("dup.{suffix}"));
        assert!(path.exists(), "missing companion {suffix}");
    }
    let fasta = fs::read_to_string(dir.path().join("dup.fas")).unwrap();
    assert!(fasta.starts_with(">0\n"));
    // one record per unique
    assert_eq!(fasta.matches('>').count(), 1);
}

#[test]
fn unique_ranges_map_into_sequences() {
    let dir = workdir();
    let (ces, _es) = duplicate_archive(&dir);
    let mut range = SeqRange::new(10, 20);
    let seqnum = ces.unique_range_to_seqrange(0, &mut range);
    assert_eq!(seqnum, 0);
    assert_eq!((range.start, range.end), (10, 20));
}
