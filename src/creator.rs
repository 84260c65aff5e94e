/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The build pipeline: scans an encoded collection left to right and
//! produces a [`Condenseq`] archive.
//!
//! An initial prefix of the input is copied verbatim into the unique
//! table and its k-mers indexed. From then on the driver queries the
//! k-mer database at every position, filters candidate seeds (brute
//! force, window filter, or diagonal filter), extends survivors with a
//! bidirectional X-drop alignment, and stores sufficiently long
//! alignments as links. The bases skipped since the last link become new
//! unique material and feed the index.

use crate::archive::{ces_len, Condenseq, Link, CES_LEN_MAX};
use crate::diagonals::{DiagStore, FullDiags, SparseDiags, DIAG_UNDEF};
use crate::editscript::Editscript;
use crate::encseq::{with_suffix, Encseq, EncseqBuilder};
use crate::error::{Error, Result};
use crate::kmer::{KmerDatabase, KmerIter, KmerView, Kmercode};
use crate::multieop::Multieoplist;
use crate::xdrop::{XdropBest, XdropResources, XdropScores};
use dsi_progress_logger::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Codes with more stored positions than the cutoff are skipped when
/// seeding; see [`KmerDatabase`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cutoff {
    Disabled,
    Fixed(u64),
    /// Derive the cutoff from the mean occurrence count divided by the
    /// configured fraction.
    Mean,
}

/// How candidate seeds are selected for extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extension {
    /// Extend at every stored position of the current k-mer.
    BruteForce,
    /// Require a second matching k-mer inside the seed window.
    Filter,
    /// Diagonal filter backed by the sparse store.
    SparseDiagonals,
    /// Diagonal filter backed by the dense store.
    FullDiagonals,
}

/// Floor for the mean-derived cutoff.
const MIN_POS_NUM_CUTOFF: u64 = 30;

/// Build parameters.
#[derive(Clone, Debug)]
pub struct CreatorConfig {
    pub kmersize: u32,
    /// Size of the window in which to search for seed pairs; must exceed
    /// the k-mer size.
    pub windowsize: u32,
    /// Number of k-mers the index holds before scanning starts.
    pub initsize: u64,
    /// Minimal length of an alignment worth storing as a link.
    pub min_align_len: u64,
    pub cutoff: Cutoff,
    pub mean_fraction: u64,
    pub prune: bool,
    pub scores: XdropScores,
    pub xdrop: i64,
    pub extension: Extension,
    /// Percentage of dead sparse diagonals tolerated before a sweep.
    pub diags_clean_percent: u32,
    /// Dump the k-mer database frequencies after the build.
    pub log_kmer_db: bool,
}

impl CreatorConfig {
    /// Defaults for the given alphabet: `kmersize` is the word length
    /// whose code space is about 100000, and window size, alignment
    /// length and initial database size cascade from it as 5x, 3x and 3x.
    pub fn for_alphabet(alphabet: crate::encseq::Alphabet) -> Self {
        let kmersize = match alphabet {
            // |A|^k ~= 100000
            crate::encseq::Alphabet::Dna => 8,
            crate::encseq::Alphabet::Protein => 4,
        };
        let windowsize = 5 * kmersize;
        let min_align_len = 3 * windowsize as u64;
        CreatorConfig {
            kmersize,
            windowsize,
            initsize: 3 * min_align_len,
            min_align_len,
            cutoff: Cutoff::Mean,
            mean_fraction: 2,
            prune: true,
            scores: XdropScores::default(),
            xdrop: 3,
            extension: Extension::SparseDiagonals,
            diags_clean_percent: 20,
            log_kmer_db: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kmersize < 2 {
            return Err(Error::InvalidArgument("kmersize must be at least 2".into()));
        }
        if self.windowsize <= self.kmersize {
            return Err(Error::InvalidArgument(
                "windowsize has to be larger than kmersize".into(),
            ));
        }
        if self.min_align_len < self.windowsize as u64 {
            return Err(Error::InvalidArgument(
                "alignlength should be at least the windowsize".into(),
            ));
        }
        if self.min_align_len > CES_LEN_MAX {
            return Err(Error::WidthOverflow(self.min_align_len));
        }
        if self.initsize < self.min_align_len {
            return Err(Error::InvalidArgument(
                "initsize should be larger than alignlength".into(),
            ));
        }
        if self.mean_fraction == 0 {
            return Err(Error::InvalidArgument("fraction must be positive".into()));
        }
        if self.diags_clean_percent > 100 {
            return Err(Error::InvalidArgument(
                "diags_clean is a percentage".into(),
            ));
        }
        if self.xdrop < 0 {
            return Err(Error::InvalidArgument("xdrop must not be negative".into()));
        }
        let scores = self.scores;
        if scores.mat <= 0 || scores.mat <= scores.mis || scores.ins >= 0 || scores.del >= 0 {
            return Err(Error::InvalidArgument(
                "scores need mat > 0, mat > mis, ins < 0, del < 0".into(),
            ));
        }
        Ok(())
    }
}

/// Ring buffer of the k-mer index views of the last `windowsize`
/// positions.
#[derive(Debug)]
struct Window {
    views: Vec<KmerView>,
    /// Per-slot resume indices of the window filter.
    idxs: Vec<usize>,
    next: usize,
    count: usize,
}

impl Window {
    fn new(size: usize) -> Self {
        Window {
            views: vec![KmerView::default(); size],
            idxs: vec![0; size],
            next: 0,
            count: 0,
        }
    }

    fn reset(&mut self) {
        self.next = 0;
        self.count = 0;
        for view in &mut self.views {
            view.count = 0;
        }
    }

    fn advance(&mut self, view: KmerView) {
        debug_assert!(self.next != 0 || self.count == 0 || self.count == self.views.len());
        self.views[self.next] = view;
        self.next += 1;
        if self.next == self.views.len() {
            self.next = 0;
        }
        if self.count < self.views.len() {
            self.count += 1;
        }
    }

    /// Slot of the `n`-th oldest entry; only meaningful on a full window.
    fn idx(&self, n: usize) -> usize {
        (self.next + n) % self.views.len()
    }

    /// The most recently pushed view.
    fn last(&self) -> KmerView {
        let idx = if self.next == 0 {
            self.count - 1
        } else {
            self.next - 1
        };
        self.views[idx]
    }
}

/// The best link found for the current position, in unclamped widths.
#[derive(Clone, Copy, Debug, Default)]
struct LinkCandidate {
    orig_startpos: u64,
    len: u64,
    unique_id: u64,
    unique_offset: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Cont,
    Eod,
    Reset,
}

/// The build driver. One instance can run several builds; all scratch
/// buffers are reused.
#[derive(Debug)]
pub struct CondenseqCreator {
    config: CreatorConfig,
    main_pos: u64,
    main_seqnum: u64,
    current_seq_start: u64,
    current_seq_len: u64,
    current_seq_pos: u64,
    current_orig_start: u64,
    window: Window,
    left_res: XdropResources,
    right_res: XdropResources,
    best_left_res: XdropResources,
    best_right_res: XdropResources,
    left_best: XdropBest,
    right_best: XdropBest,
    /// Reversed query prefix, cached per (seed start, midpoint).
    cur_bwd: Vec<u8>,
    cur_bwd_key: (u64, u64),
    /// Reversed unique prefix, rebuilt per extension.
    ubwd: Vec<u8>,
    xdrop_calls: u64,
    min_d: u64,
    max_d: u64,
}

impl CondenseqCreator {
    pub fn new(config: CreatorConfig) -> Result<Self> {
        config.validate()?;
        let windowsize = config.windowsize as usize;
        let scores = config.scores;
        Ok(CondenseqCreator {
            config,
            main_pos: 0,
            main_seqnum: 0,
            current_seq_start: 0,
            current_seq_len: 0,
            current_seq_pos: 0,
            current_orig_start: 0,
            window: Window::new(windowsize),
            left_res: XdropResources::new(scores),
            right_res: XdropResources::new(scores),
            best_left_res: XdropResources::new(scores),
            best_right_res: XdropResources::new(scores),
            left_best: XdropBest::default(),
            right_best: XdropBest::default(),
            cur_bwd: Vec::new(),
            cur_bwd_key: (u64::MAX, u64::MAX),
            ubwd: Vec::new(),
            xdrop_calls: 0,
            min_d: u64::MAX,
            max_d: 0,
        })
    }

    pub fn config(&self) -> &CreatorConfig {
        &self.config
    }

    /// Number of X-drop extensions performed by the last build.
    pub fn xdrop_calls(&self) -> u64 {
        self.xdrop_calls
    }

    fn reset_build_state(&mut self) {
        self.main_pos = 0;
        self.main_seqnum = 0;
        self.current_seq_start = 0;
        self.current_seq_len = 0;
        self.current_seq_pos = 0;
        self.current_orig_start = 0;
        self.window.reset();
        self.left_best = XdropBest::default();
        self.right_best = XdropBest::default();
        self.cur_bwd_key = (u64::MAX, u64::MAX);
        self.xdrop_calls = 0;
        self.min_d = u64::MAX;
        self.max_d = 0;
    }

    /// Builds the archive for `input` and writes the container plus its
    /// companions under `basename`.
    pub fn create(&mut self, basename: &Path, input: &Encseq) -> Result<Condenseq> {
        let config = &self.config;
        log::info!(
            "condenseq creator parameters: k: {}, win: {}, min algn: {}, init: {}",
            config.kmersize,
            config.windowsize,
            config.min_align_len,
            config.initsize
        );
        log::info!(
            "condenseq creator xdrop parameters: mat: {}, mis: {}, ins: {}, del: {}, xdrop: {}",
            config.scores.mat,
            config.scores.mis,
            config.scores.ins,
            config.scores.del,
            config.xdrop
        );

        let mut ces = Condenseq::new(input);
        let buffersize = config.initsize.saturating_mul(100).min(100_000) as usize;
        log::debug!("buffersize for kmer database: {buffersize}");
        let mut kdb = KmerDatabase::new(
            input.alphabet().num_chars(),
            config.kmersize,
            buffersize,
            input.total_length(),
        )?;
        let mut diags = match config.extension {
            Extension::FullDiagonals => Some(DiagStore::Full(FullDiags::new(input.total_length()))),
            Extension::SparseDiagonals => Some(DiagStore::Sparse(SparseDiags::new(
                config.initsize as usize,
                config.diags_clean_percent,
            ))),
            Extension::BruteForce | Extension::Filter => None,
        };

        self.reset_build_state();
        self.analyse(input, &mut ces, &mut kdb, &mut diags)?;

        log::info!("{} kmer positions in final kmer database", kdb.kmer_count());
        log::info!("{} xdrop calls", self.xdrop_calls);
        log::info!("{} uniques", ces.num_uniques());
        log::info!("{} links", ces.num_links());
        log::debug!("{} bytes in final kmer database", kdb.used_size());
        if self.min_d != u64::MAX {
            log::debug!(
                "min_d: {}, max_d: {} ({} diagonals)",
                self.min_d,
                self.max_d,
                self.max_d - self.min_d + 1
            );
        }
        if let Some(DiagStore::Sparse(sparse)) = &diags {
            log::debug!("sparse diagonals max used: {}", sparse.max_used());
        }

        ces.store(basename)?;
        self.write_unique_fasta(basename, input, &ces)?;
        let unique_es = Self::build_unique_store(input, &ces)?;
        unique_es.store(basename)?;
        ces.attach_unique_store(unique_es);
        ces.set_filename(basename.to_path_buf());

        if self.config.log_kmer_db {
            kdb.print(log::log_enabled!(log::Level::Debug));
        }
        Ok(ces)
    }

    /// The `.fas` companion: one FASTA entry per unique fragment.
    fn write_unique_fasta(&self, basename: &Path, input: &Encseq, ces: &Condenseq) -> Result<()> {
        let mut out = BufWriter::new(File::create(with_suffix(basename, "fas"))?);
        let verbose = log::log_enabled!(log::Level::Debug);
        for (idx, unique) in ces.uniques().iter().enumerate() {
            debug_assert!(unique.len != 0);
            if verbose {
                writeln!(
                    out,
                    ">unique{idx} start: {}, len: {}",
                    unique.orig_startpos, unique.len
                )?;
            } else {
                writeln!(out, ">{idx}")?;
            }
            let seq = input.extract_decoded(
                unique.orig_startpos,
                unique.orig_startpos + unique.len as u64 - 1,
                '\0',
            );
            writeln!(out, "{seq}")?;
        }
        Ok(())
    }

    /// The unique store: every unique fragment becomes one sequence of a
    /// fresh encoded collection.
    fn build_unique_store(input: &Encseq, ces: &Condenseq) -> Result<Encseq> {
        let mut builder = EncseqBuilder::new(input.alphabet());
        for (idx, unique) in ces.uniques().iter().enumerate() {
            let start = unique.orig_startpos as usize;
            builder.add_encoded(&idx.to_string(), &input.codes()[start..start + unique.len as usize]);
        }
        builder.build()
    }

    fn analyse(
        &mut self,
        es: &Encseq,
        ces: &mut Condenseq,
        kdb: &mut KmerDatabase,
        diags: &mut Option<DiagStore>,
    ) -> Result<()> {
        let mut iter = es.kmer_iter(self.config.kmersize, self.main_pos);
        self.init_kmer_db(es, ces, kdb, &mut iter)?;
        self.apply_cutoff_config(kdb);

        let mut pl = ProgressLogger::default();
        pl.item_name("position")
            .expected_updates(Some(es.total_length() as usize));
        pl.start("analysing data, searching hits");

        let mut state = State::Cont;
        'scan: while state == State::Cont {
            let Some(kmercode) = iter.next() else {
                break 'scan;
            };
            state = self.process_kmer(&kmercode, es, ces, kdb, diags, &mut iter)?;
            // the first kmer after a reset is handled inside the same
            // round, the position advance below belongs to it
            while state == State::Reset {
                let Some(kmercode) = iter.next() else {
                    break 'scan;
                };
                state = self.process_kmer(&kmercode, es, ces, kdb, diags, &mut iter)?;
            }
            if state == State::Cont {
                self.main_pos += 1;
                self.current_seq_pos += 1;
                pl.light_update();
            }
        }
        pl.done();
        if state != State::Eod {
            return Err(Error::Corrupt(
                "processing of kmers stopped, but end of data not reached".into(),
            ));
        }
        Ok(())
    }

    fn apply_cutoff_config(&self, kdb: &mut KmerDatabase) {
        match self.config.cutoff {
            Cutoff::Disabled => {}
            Cutoff::Fixed(value) => kdb.set_cutoff(value),
            Cutoff::Mean => kdb.use_mean_cutoff(self.config.mean_fraction, MIN_POS_NUM_CUTOFF),
        }
        if self.config.prune && !matches!(self.config.cutoff, Cutoff::Disabled) {
            kdb.set_prune();
        }
    }

    /// INIT phase: store whole prefixes as uniques until the index holds
    /// `initsize` k-mers. Cutoffs and pruning stay disabled here.
    fn init_kmer_db(
        &mut self,
        es: &Encseq,
        ces: &mut Condenseq,
        kdb: &mut KmerDatabase,
        iter: &mut KmerIter,
    ) -> Result<()> {
        let kmersize_m1 = (self.config.kmersize - 1) as u64;
        let mut state = self.skip_short_seqs(ces)?;
        if state == State::Cont {
            state = self.reset_to_current_seq(ces, iter);
        }
        while state != State::Eod && self.config.initsize > kdb.kmer_count() {
            let mut needed = self.config.initsize - kdb.kmer_count();
            let usable_seqlen = self.current_seq_len - kmersize_m1 - self.current_seq_pos;
            log::debug!(
                "init at pos {}, seq {}, missing {} kmers, have {}",
                self.main_pos,
                self.main_seqnum,
                needed,
                kdb.kmer_count()
            );
            if needed < self.config.min_align_len {
                needed = self.config.min_align_len;
            }
            if usable_seqlen >= needed {
                if usable_seqlen - needed < self.config.min_align_len {
                    // the leftover would be too short on its own, take the
                    // whole rest of the sequence
                    ces.add_unique(self.main_pos, ces_len(usable_seqlen + kmersize_m1)?)?;
                    self.add_kmers(es, ces, kdb, self.main_pos, self.main_pos + usable_seqlen);
                    self.main_seqnum += 1;
                    state = self.skip_short_seqs(ces)?;
                    if state == State::Cont {
                        state = self.reset_to_current_seq(ces, iter);
                    }
                } else {
                    let take = needed + kmersize_m1;
                    ces.add_unique(self.main_pos, ces_len(take)?)?;
                    self.add_kmers(es, ces, kdb, self.main_pos, self.main_pos + take);
                    self.main_pos += take;
                    self.current_seq_pos += take;
                    state = self.reset_pos(ces, iter, self.main_pos);
                }
            } else {
                ces.add_unique(self.main_pos, ces_len(usable_seqlen + kmersize_m1)?)?;
                self.add_kmers(
                    es,
                    ces,
                    kdb,
                    self.main_pos,
                    self.main_pos + usable_seqlen + kmersize_m1,
                );
                self.main_seqnum += 1;
                state = self.skip_short_seqs(ces)?;
                if state == State::Cont {
                    state = self.reset_to_current_seq(ces, iter);
                }
            }
            kdb.flush(es);
        }
        if state == State::Eod {
            return Err(Error::InsufficientInput {
                found: kdb.kmer_count(),
                required: self.config.initsize,
            });
        }
        if self.config.initsize > kdb.kmer_count() {
            return Err(Error::InsufficientInput {
                found: kdb.kmer_count(),
                required: self.config.initsize,
            });
        }
        log::debug!("filled kmer database at pos {}", self.main_pos);
        Ok(())
    }

    /// Sequences shorter than the alignment length become uniques without
    /// indexed k-mers.
    fn skip_short_seqs(&mut self, ces: &mut Condenseq) -> Result<State> {
        while self.main_seqnum < ces.num_sequences() {
            self.current_seq_len = ces.seqlength(self.main_seqnum);
            if self.current_seq_len >= self.config.min_align_len {
                break;
            }
            let start = ces.seqstartpos(self.main_seqnum);
            ces.add_unique(start, ces_len(self.current_seq_len)?)?;
            self.main_seqnum += 1;
        }
        Ok(if self.main_seqnum >= ces.num_sequences() {
            State::Eod
        } else {
            State::Cont
        })
    }

    fn reset_pos(&mut self, ces: &Condenseq, iter: &mut KmerIter, pos: u64) -> State {
        if pos >= ces.total_length() {
            return State::Eod;
        }
        self.current_orig_start = pos;
        self.main_pos = pos;
        self.current_seq_pos = self.main_pos - self.current_seq_start;
        self.window.reset();
        iter.reset(pos);
        State::Reset
    }

    fn reset_to_current_seq(&mut self, ces: &Condenseq, iter: &mut KmerIter) -> State {
        if self.main_seqnum >= ces.num_sequences() {
            return State::Eod;
        }
        self.current_seq_start = ces.seqstartpos(self.main_seqnum);
        self.reset_pos(ces, iter, self.current_seq_start)
    }

    /// Registers the k-mers of `[start, end)` for the newest unique,
    /// skipping ranges too short to seed an alignment.
    fn add_kmers(
        &self,
        es: &Encseq,
        ces: &Condenseq,
        kdb: &mut KmerDatabase,
        start: u64,
        end: u64,
    ) {
        debug_assert!(start < end);
        if start + self.config.min_align_len <= end {
            kdb.add_interval(es, start, end - 1, ces.num_uniques() - 1);
        }
    }

    /// Flushes the pending unique up to the end of the current sequence
    /// and moves to the next long-enough sequence.
    fn handle_seqend(
        &mut self,
        es: &Encseq,
        ces: &mut Condenseq,
        kdb: &mut KmerDatabase,
        iter: &mut KmerIter,
    ) -> Result<State> {
        let length = (self.current_seq_len - self.current_seq_pos)
            + (self.main_pos - self.current_orig_start);
        if length != 0 {
            ces.add_unique(self.current_orig_start, ces_len(length)?)?;
            if length >= self.config.min_align_len {
                self.add_kmers(
                    es,
                    ces,
                    kdb,
                    self.current_orig_start,
                    self.current_orig_start + length,
                );
            }
        }
        self.main_seqnum += 1;
        let state = self.skip_short_seqs(ces)?;
        if state == State::Cont {
            Ok(self.reset_to_current_seq(ces, iter))
        } else {
            Ok(state)
        }
    }

    fn process_kmer(
        &mut self,
        kmercode: &Kmercode,
        es: &Encseq,
        ces: &mut Condenseq,
        kdb: &mut KmerDatabase,
        diags: &mut Option<DiagStore>,
        iter: &mut KmerIter,
    ) -> Result<State> {
        if !kmercode.has_special {
            let view = kdb.get_startpos(kmercode.code);
            self.window.advance(view);
            self.extend_seed_kmer(es, ces, kdb, diags, iter)
        } else if self.current_seq_pos + self.config.kmersize as u64 > self.current_seq_len {
            // the special is the end of the current sequence
            let state = self.handle_seqend(es, ces, kdb, iter)?;
            self.window.reset();
            debug_assert!(state != State::Cont);
            Ok(state)
        } else {
            // a wildcard inside the sequence breaks the window
            self.window.reset();
            Ok(State::Cont)
        }
    }

    /// Runs the configured selector for the current position and, when it
    /// produced a long-enough alignment, stores the link.
    fn extend_seed_kmer(
        &mut self,
        es: &Encseq,
        ces: &mut Condenseq,
        kdb: &mut KmerDatabase,
        diags: &mut Option<DiagStore>,
        iter: &mut KmerIter,
    ) -> Result<State> {
        let mut link = LinkCandidate::default();
        self.left_best = XdropBest::default();
        self.right_best = XdropBest::default();
        match self.config.extension {
            Extension::BruteForce => self.extend_brute(es, ces, kdb, &mut link),
            Extension::Filter => self.extend_filter(es, ces, kdb, &mut link)?,
            Extension::SparseDiagonals | Extension::FullDiagonals => self.extend_diags(
                es,
                ces,
                kdb,
                diags.as_mut().expect("diagonal store is configured"),
                &mut link,
            ),
        }
        if link.len < self.config.min_align_len {
            return Ok(State::Cont);
        }
        debug_assert!(link.orig_startpos >= self.current_orig_start);
        debug_assert!(
            link.orig_startpos + link.len <= self.current_seq_start + self.current_seq_len
        );

        let mut linkops = self.backtrack_best();
        let mut state = State::Cont;

        if self.current_orig_start < link.orig_startpos {
            let leading = link.orig_startpos - self.current_orig_start;
            if leading <= self.config.kmersize as u64 {
                // absorb a short leading gap as insertions
                for _ in 0..leading {
                    linkops.add_insertion();
                }
                link.orig_startpos -= leading;
                link.len += leading;
            } else {
                ces.add_unique(self.current_orig_start, ces_len(leading)?)?;
                self.add_kmers(es, ces, kdb, self.current_orig_start, link.orig_startpos);
            }
        }

        // with a left-only extension the alignment may end before main_pos
        if self.main_pos < link.orig_startpos + link.len {
            state = self.reset_pos(ces, iter, link.orig_startpos + link.len);
        } else {
            self.current_orig_start = link.orig_startpos + link.len;
            self.window.reset();
        }

        let mut remaining = self
            .current_seq_len
            .wrapping_sub(self.current_seq_pos)
            .wrapping_add(self.current_orig_start)
            .wrapping_sub(self.main_pos);
        if remaining != 0 && remaining <= self.config.kmersize as u64 {
            // absorb a short sequence tail as insertions
            let mut extrameops = Multieoplist::new();
            for _ in 0..remaining {
                extrameops.add_insertion();
            }
            extrameops.combine(&linkops, true);
            linkops = extrameops;
            link.len += remaining;
            remaining = 0;
            state = self.reset_pos(ces, iter, link.orig_startpos + link.len);
        }

        let editscript = Editscript::from_trace(es, &linkops, link.orig_startpos)?;
        ces.add_link(Link {
            orig_startpos: link.orig_startpos,
            len: ces_len(link.len)?,
            unique_id: ces_len(link.unique_id)?,
            unique_offset: ces_len(link.unique_offset)?,
            editscript,
        })?;

        if state != State::Eod && remaining < self.config.min_align_len {
            state = self.handle_seqend(es, ces, kdb, iter)?;
        }
        Ok(state)
    }

    /// Combines the best right and left back-tracks into one trace.
    fn backtrack_best(&self) -> Multieoplist {
        let mut meops = if self.right_best.ivalue > 0 || self.right_best.jvalue > 0 {
            self.best_right_res.backtrack(self.right_best)
        } else {
            Multieoplist::new()
        };
        if self.left_best.ivalue > 0 || self.left_best.jvalue > 0 {
            let left = self.best_left_res.backtrack(self.left_best);
            meops.combine(&left, false);
        }
        meops
    }

    /// X-drop extension around the seed `(i, j)` inside the bounds of the
    /// containing unique and original sequence. Improves `best_link` when
    /// the combined alignment beats the current best.
    #[allow(clippy::too_many_arguments)]
    fn xdrop_at_seed(
        &mut self,
        es: &Encseq,
        i: u64,
        j: u64,
        seed_bounds: (u64, u64),
        match_bounds: (u64, u64),
        unique_id: u64,
        best_link: &mut LinkCandidate,
        best_match: &mut u64,
    ) {
        debug_assert!(match_bounds.0 <= i);
        debug_assert!(i + self.config.kmersize as u64 - 1 < match_bounds.1);
        let codes = es.codes();
        let mut left = XdropBest::default();
        let mut right = XdropBest::default();

        if seed_bounds.0 < j && match_bounds.0 < i {
            self.ubwd.clear();
            self.ubwd
                .extend(codes[match_bounds.0 as usize..i as usize].iter().rev());
            if self.cur_bwd_key != (seed_bounds.0, j) {
                self.cur_bwd_key = (seed_bounds.0, j);
                self.cur_bwd.clear();
                self.cur_bwd
                    .extend(codes[seed_bounds.0 as usize..j as usize].iter().rev());
            }
            self.xdrop_calls += 1;
            left = self
                .left_res
                .extend(&self.ubwd, &self.cur_bwd, self.config.xdrop);
        }
        if j < seed_bounds.1 {
            self.xdrop_calls += 1;
            right = self.right_res.extend(
                &codes[i as usize..match_bounds.1 as usize],
                &codes[j as usize..seed_bounds.1 as usize],
                self.config.xdrop,
            );
        }

        if left.jvalue + right.jvalue >= self.config.min_align_len
            && left.score + right.score > self.left_best.score + self.right_best.score
        {
            self.left_best = left;
            self.right_best = right;
            std::mem::swap(&mut self.best_left_res, &mut self.left_res);
            std::mem::swap(&mut self.best_right_res, &mut self.right_res);
            best_link.unique_offset = (i - left.ivalue) - match_bounds.0;
            best_link.len = left.jvalue + right.jvalue;
            best_link.unique_id = unique_id;
            // the left extension started at j - 1
            best_link.orig_startpos = j - left.jvalue;
            *best_match = i;
        }
    }

    /// Brute force: extend at every stored position of the current k-mer.
    fn extend_brute(
        &mut self,
        es: &Encseq,
        ces: &Condenseq,
        kdb: &KmerDatabase,
        best_link: &mut LinkCandidate,
    ) {
        let view = self.window.last();
        if view.count == 0 {
            return;
        }
        let j = self.main_pos;
        let seed_bounds = (
            self.current_orig_start,
            self.current_seq_start + self.current_seq_len,
        );
        let mut match_bounds = (0u64, 0u64);
        let mut best_match = u64::MAX;
        let (positions, ids) = kdb.view_slices(view);
        for (&i, &new_id) in positions.iter().zip(ids) {
            if match_bounds.1 < i || match_bounds.1 == 0 {
                let unique = &ces.uniques()[new_id as usize];
                match_bounds = (
                    unique.orig_startpos,
                    unique.orig_startpos + unique.len as u64,
                );
                debug_assert!(
                    match_bounds.0 <= i && i + self.config.kmersize as u64 <= match_bounds.1
                );
            }
            self.xdrop_at_seed(
                es,
                i,
                j,
                seed_bounds,
                match_bounds,
                new_id,
                best_link,
                &mut best_match,
            );
        }
    }

    /// Window filter: a subject position of the window's oldest k-mer
    /// must be matched by a second k-mer hit further into the window.
    fn extend_filter(
        &mut self,
        es: &Encseq,
        ces: &Condenseq,
        kdb: &KmerDatabase,
        best_link: &mut LinkCandidate,
    ) -> Result<()> {
        let windowsize = self.config.windowsize as usize;
        if self.window.count != windowsize {
            return Ok(());
        }
        let first_view = self.window.views[self.window.idx(0)];
        if first_view.count == 0 {
            return Ok(());
        }
        let querypos = self.main_pos - self.config.windowsize as u64 + 1;
        let seed_bounds = (
            self.current_orig_start,
            self.current_seq_start + self.current_seq_len,
        );
        debug_assert!(seed_bounds.0 <= querypos);
        if querypos > seed_bounds.1 - self.config.windowsize as u64 {
            return Err(Error::Corrupt(format!(
                "query position {querypos} not smaller than end ({}) - windowsize ({})",
                seed_bounds.1, self.config.windowsize
            )));
        }
        for idx in 0..windowsize {
            self.window.idxs[idx] = 0;
        }

        let mut match_bounds = (0u64, 0u64);
        let mut best_match = u64::MAX;
        let (first_positions, first_ids) = kdb.view_slices(first_view);
        for idx_cur in 0..first_view.count {
            let subjectpos = first_positions[idx_cur];
            let new_uid = first_ids[idx_cur];
            if match_bounds.1 <= subjectpos || match_bounds.1 == 0 {
                let unique = &ces.uniques()[new_uid as usize];
                match_bounds = (
                    unique.orig_startpos,
                    unique.orig_startpos + unique.len as u64,
                );
                debug_assert!(
                    match_bounds.0 <= subjectpos
                        && subjectpos + self.config.kmersize as u64 <= match_bounds.1
                );
            }
            // skip subject positions already covered by the best alignment
            if best_match != u64::MAX && subjectpos < best_match + self.right_best.ivalue {
                continue;
            }
            let mut found = false;
            for idx_win in (self.config.kmersize as usize..windowsize).rev() {
                if found {
                    break;
                }
                let win_view = self.window.views[self.window.idx(idx_win)];
                if win_view.count == 0 {
                    continue;
                }
                let (win_positions, _) = kdb.view_slices(win_view);
                // resume where the previous subject position left off,
                // subject positions only increase
                let mut prime_idx = self.window.idxs[idx_win];
                while !found && prime_idx < win_view.count {
                    let i_prime = win_positions[prime_idx];
                    if i_prime > subjectpos + self.config.windowsize as u64 {
                        break;
                    }
                    if i_prime > subjectpos + self.config.kmersize as u64 - 1 {
                        found = true;
                        self.xdrop_at_seed(
                            es,
                            subjectpos,
                            querypos,
                            seed_bounds,
                            match_bounds,
                            new_uid,
                            best_link,
                            &mut best_match,
                        );
                    }
                    prime_idx += 1;
                }
                self.window.idxs[idx_win] = prime_idx;
            }
        }
        Ok(())
    }

    /// Diagonal filter: a seed needs a prior hit on its diagonal within
    /// the window; the extension then starts at the midpoint of the pair.
    fn extend_diags(
        &mut self,
        es: &Encseq,
        ces: &Condenseq,
        kdb: &KmerDatabase,
        diags: &mut DiagStore,
        best_link: &mut LinkCandidate,
    ) {
        let view = self.window.last();
        if view.count == 0 {
            return;
        }
        let j = self.main_pos;
        let seed_bounds = (
            self.current_orig_start,
            self.current_seq_start + self.current_seq_len,
        );
        let mut match_bounds = (0u64, 0u64);
        let mut best_match = u64::MAX;
        let (positions, ids) = kdb.view_slices(view);
        for idx in 0..view.count {
            let i = positions[idx];
            let new_id = ids[idx];
            debug_assert!(i < j);
            let d = j - i;

            if match_bounds.1 < i || match_bounds.1 == 0 {
                if match_bounds.1 != 0 {
                    // hits of the previous unique block are dead now
                    diags.mark_block(match_bounds.1, j - match_bounds.1, d);
                }
                let unique = &ces.uniques()[new_id as usize];
                match_bounds = (
                    unique.orig_startpos,
                    unique.orig_startpos + unique.len as u64,
                );
                debug_assert!(
                    match_bounds.0 <= i && i + self.config.kmersize as u64 <= match_bounds.1
                );
            }

            let (i_prime, slot) = diags.lookup(d);
            if i_prime != DIAG_UNDEF
                && i_prime >= match_bounds.0
                && seed_bounds.0 + self.config.windowsize as u64 <= j
            {
                debug_assert!(i_prime < i);
                let distance = i - i_prime;
                if distance > self.config.kmersize as u64
                    && distance <= self.config.windowsize as u64
                {
                    let midpoint_offset = distance / 2;
                    // d = j - i = j' - i', so j' cannot overflow
                    let j_prime = d + i_prime;
                    let midpoint_j = j_prime + midpoint_offset;
                    let midpoint_i = i_prime + midpoint_offset;
                    // only extend outside of the current best alignment
                    if best_match == u64::MAX || midpoint_j > best_match + self.right_best.jvalue {
                        debug_assert!(midpoint_j >= seed_bounds.0);
                        debug_assert!(midpoint_j <= seed_bounds.1);
                        self.xdrop_at_seed(
                            es,
                            midpoint_i,
                            midpoint_j,
                            seed_bounds,
                            match_bounds,
                            new_id,
                            best_link,
                            &mut best_match,
                        );
                    }
                }
            }
            if d < self.min_d {
                self.min_d = d;
            }
            if d > self.max_d {
                self.max_d = d;
            }
            diags.store(d, i, match_bounds.0, self.config.kmersize, slot);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encseq::Alphabet;

    #[test]
    fn config_validation() {
        let mut config = CreatorConfig::for_alphabet(Alphabet::Dna);
        assert!(config.validate().is_ok());
        config.windowsize = config.kmersize;
        assert!(config.validate().is_err());

        let mut config = CreatorConfig::for_alphabet(Alphabet::Protein);
        assert!(config.validate().is_ok());
        config.scores.ins = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn window_ring() {
        let mut window = Window::new(3);
        for count in 1..=3 {
            window.advance(KmerView {
                start: count,
                count,
            });
            assert_eq!(window.count, count);
            assert_eq!(window.last().start, count);
        }
        window.advance(KmerView { start: 4, count: 4 });
        assert_eq!(window.count, 3);
        assert_eq!(window.last().start, 4);
        // oldest entry is now the second pushed
        assert_eq!(window.views[window.idx(0)].start, 2);
        window.reset();
        assert_eq!(window.count, 0);
    }
}
