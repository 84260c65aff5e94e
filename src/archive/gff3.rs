/*
 * SPDX-FileCopyrightText: 2024 The condenseq developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! GFF3 dump of the fragment tables.

use super::Condenseq;
use crate::error::Result;
use std::io::Write;

impl Condenseq {
    /// Writes one `experimental_feature` line per unique and link, with
    /// 1-based coordinates relative to the containing original sequence.
    /// Links carry a `Derives_from` attribute naming their unique.
    pub fn write_gff3<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "##gff-version 3")?;

        let mut seqid = String::new();
        let mut seqstart = 0u64;
        let mut seqend = 0u64;
        for (idx, unique) in self.uniques.iter().enumerate() {
            if seqend <= unique.orig_startpos {
                let seqnum = self.pos_to_seqnum(unique.orig_startpos);
                seqstart = self.seqstartpos(seqnum);
                seqend = seqstart + self.seqlength(seqnum);
                seqid = self.description(seqnum).into_owned();
            }
            writeln!(
                out,
                "{seqid}\tCondenseq\texperimental_feature\t{}\t{}\t.\t.\t.\tID=U{idx};Name=unique{idx}",
                unique.orig_startpos + 1 - seqstart,
                unique.orig_startpos + unique.len as u64 - seqstart,
            )?;
        }

        seqend = 0;
        for (idx, link) in self.links.iter().enumerate() {
            if seqend <= link.orig_startpos {
                let seqnum = self.pos_to_seqnum(link.orig_startpos);
                seqstart = self.seqstartpos(seqnum);
                seqend = seqstart + self.seqlength(seqnum);
                seqid = self.description(seqnum).into_owned();
            }
            writeln!(
                out,
                "{seqid}\tCondenseq\texperimental_feature\t{}\t{}\t.\t.\t.\tID=L{idx};Name=link{idx};Derives_from=U{}",
                link.orig_startpos + 1 - seqstart,
                link.orig_startpos + link.len as u64 - seqstart,
                link.unique_id,
            )?;
        }
        Ok(())
    }
}
