/*
    fluxread
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/read/summary.rs

    Aggregates the sector maps of decoded tracks into a per-disk report.

*/
use crate::{track::DecodedTrack, types::DiskCh};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display, Formatter},
};

#[derive(Clone, Debug, PartialEq)]
struct SectorMap {
    nsec: usize,
    good: Vec<bool>,
}

/// A record of the sectors recovered from each decoded track of a multi-track read.
///
/// Displayed as a grid with one column per cylinder and one row per head and sector: `.` marks
/// a recovered sector, `X` a missing one. A final line gives the total recovered.
#[derive(Clone, Debug, Default)]
pub struct ReadSummary {
    cyls: BTreeSet<u16>,
    heads: BTreeSet<u8>,
    tracks: BTreeMap<DiskCh, SectorMap>,
}

impl ReadSummary {
    /// Create a summary covering the cylinders and heads of `chs`.
    pub fn new(chs: impl IntoIterator<Item = DiskCh>) -> Self {
        let mut summary = ReadSummary::default();
        for ch in chs {
            summary.cyls.insert(ch.c());
            summary.heads.insert(ch.h());
        }
        summary
    }

    /// Record the sector map of a decoded track.
    pub fn record(&mut self, ch: DiskCh, track: &dyn DecodedTrack) {
        let nsec = track.nsec();
        self.cyls.insert(ch.c());
        self.heads.insert(ch.h());
        self.tracks.insert(
            ch,
            SectorMap {
                nsec,
                good: (0..nsec).map(|s| track.has_sec(s)).collect(),
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Return the number of sectors recorded across all tracks.
    pub fn total_sectors(&self) -> usize {
        self.tracks.values().map(|t| t.nsec).sum()
    }

    /// Return the number of recovered sectors across all tracks.
    pub fn good_sectors(&self) -> usize {
        self.tracks.values().map(|t| t.good.iter().filter(|&&g| g).count()).sum()
    }

    /// Return the percentage of sectors recovered, rounded down, or `None` if no sectors were
    /// recorded.
    pub fn percent_good(&self) -> Option<usize> {
        match self.total_sectors() {
            0 => None,
            total => Some(self.good_sectors() * 100 / total),
        }
    }
}

impl Display for ReadSummary {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.tracks.is_empty() {
            return Ok(());
        }

        write!(f, "Cyl-> ")?;
        let mut prev = None;
        for &c in &self.cyls {
            if prev == Some(c / 10) {
                write!(f, " ")?;
            }
            else {
                write!(f, "{}", c / 10)?;
            }
            prev = Some(c / 10);
        }
        writeln!(f)?;

        write!(f, "H. S: ")?;
        for &c in &self.cyls {
            write!(f, "{}", c % 10)?;
        }
        writeln!(f)?;

        for &head in &self.heads {
            let nsec = match self.tracks.iter().filter(|(ch, _)| ch.h() == head).map(|(_, t)| t.nsec).max() {
                Some(nsec) => nsec,
                None => continue,
            };
            for sec in 0..nsec {
                write!(f, "{}.{:>2}: ", head, sec)?;
                for &c in &self.cyls {
                    let cell = match self.tracks.get(&DiskCh::new(c, head)) {
                        Some(t) if sec < t.nsec => match t.good[sec] {
                            true => '.',
                            false => 'X',
                        },
                        _ => ' ',
                    };
                    write!(f, "{}", cell)?;
                }
                writeln!(f)?;
            }
        }

        if let Some(pct) = self.percent_good() {
            writeln!(
                f,
                "Found {} sectors of {} ({}%)",
                self.good_sectors(),
                self.total_sectors(),
                pct
            )?;
        }
        Ok(())
    }
}
