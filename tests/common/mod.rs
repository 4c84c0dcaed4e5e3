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

    tests/common/mod.rs

    Common support routines for tests: a scripted flux device, a decoder
    whose tracks complete after a fixed number of captures, and hashing
    helpers.
*/
#![allow(dead_code)]

use fluxread::prelude::*;

use bit_vec::BitVec;
use hex::encode;
use sha1::{Digest, Sha1};
use std::{cell::RefCell, path::Path, rc::Rc};

pub const SAMPLE_FREQ: f64 = 1_000_000.0;
/// 300 RPM at 1 tick per microsecond.
pub const REV_TICKS: u64 = 200_000;
/// A 4us flux interval, as in a stream of MFM zeros at 250 kbit/s.
pub const FLUX_INTERVAL: u32 = 4;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn compute_file_hash<P: AsRef<Path>>(path: P) -> String {
    let file_buf = std::fs::read(path).unwrap();
    compute_slice_hash(&file_buf)
}

pub fn compute_slice_hash(slice: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(slice);
    let result = hasher.finalize();

    encode(result)
}

/// A flux device that synthesizes evenly spaced flux and records every command it receives.
///
/// Each capture begins a quarter revolution before the index, offset by the number of the
/// capture, so that captures can be told apart by their first index offset.
#[derive(Debug, Default)]
pub struct MockDevice {
    pub seeks: Vec<(u16, u8)>,
    pub reads: Vec<(u32, u64)>,
    /// Fail every read after this many have succeeded.
    pub fail_after: Option<usize>,
}

impl MockDevice {
    pub fn new() -> Self {
        MockDevice::default()
    }

    pub fn failing_after(reads: usize) -> Self {
        MockDevice {
            fail_after: Some(reads),
            ..MockDevice::default()
        }
    }
}

impl FluxDevice for MockDevice {
    fn seek(&mut self, cyl: u16, head: u8) -> Result<(), FluxReadError> {
        self.seeks.push((cyl, head));
        Ok(())
    }

    fn read_track(&mut self, revs: u32, ticks: u64) -> Result<Flux, FluxReadError> {
        if let Some(limit) = self.fail_after {
            if self.reads.len() >= limit {
                return Err(FluxReadError::CommandError("ReadFlux: No Index".to_string()));
            }
        }
        self.reads.push((revs, ticks));

        let pre_index = REV_TICKS / 4 + self.reads.len() as u64;
        let by_revs = pre_index + revs as u64 * REV_TICKS;
        let duration = match (revs, ticks) {
            (0, ticks) => ticks,
            (_, 0) => by_revs,
            (_, ticks) => ticks.min(by_revs),
        };

        let index_list: Vec<u64> = match revs {
            0 => Vec::new(),
            _ => (0..=revs as u64)
                .map(|k| pre_index + k * REV_TICKS)
                .filter(|&t| t <= duration)
                .collect(),
        };
        let flux_ct = duration.div_ceil(FLUX_INTERVAL as u64) as usize;
        Ok(Flux::from_ticks(&index_list, &vec![FLUX_INTERVAL; flux_ct], SAMPLE_FREQ))
    }

    fn sample_freq(&self) -> f64 {
        SAMPLE_FREQ
    }

    fn sink_bytes(&mut self, _n: usize) -> Result<(), FluxReadError> {
        Ok(())
    }

    fn source_bytes(&mut self, _n: usize) -> Result<(), FluxReadError> {
        Ok(())
    }
}

/// A decoder for a 9 sector format spanning cylinders `0..cyls`.
///
/// Its tracks recover every sector once `complete_after` distinct captures have been decoded,
/// and are otherwise missing their last two sectors. Every PLL parameterization used is
/// recorded in `pll_log`.
pub struct MockDecoder {
    pub nsec: usize,
    pub cyls: u16,
    pub complete_after: Option<usize>,
    pub encoding: TrackDataEncoding,
    pub pll_log: Rc<RefCell<Vec<PllParams>>>,
}

impl MockDecoder {
    pub fn new(complete_after: Option<usize>) -> Self {
        MockDecoder {
            nsec: 9,
            cyls: 80,
            complete_after,
            encoding: TrackDataEncoding::Mfm,
            pll_log: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl TrackDecoder for MockDecoder {
    fn name(&self) -> &str {
        "mock.9"
    }

    fn decode_track(&self, ch: DiskCh, flux: &Flux, pll: &PllParams) -> Option<Box<dyn DecodedTrack>> {
        if ch.c() >= self.cyls || ch.h() > 1 {
            return None;
        }
        let mut track = MockTrack {
            nsec: self.nsec,
            complete_after: self.complete_after,
            encoding: self.encoding,
            captures: Vec::new(),
            pll_log: self.pll_log.clone(),
        };
        track.decode_raw(flux, pll);
        Some(Box::new(track))
    }
}

pub struct MockTrack {
    nsec: usize,
    complete_after: Option<usize>,
    encoding: TrackDataEncoding,
    captures: Vec<f64>,
    pll_log: Rc<RefCell<Vec<PllParams>>>,
}

impl MockTrack {
    fn complete(&self) -> bool {
        matches!(self.complete_after, Some(n) if self.captures.len() >= n)
    }
}

impl DecodedTrack for MockTrack {
    fn decode_raw(&mut self, flux: &Flux, pll: &PllParams) {
        self.pll_log.borrow_mut().push(*pll);
        let key = flux.index_list().first().copied().unwrap_or(-1.0);
        if !self.captures.contains(&key) {
            self.captures.push(key);
        }
    }

    fn nr_missing(&self) -> usize {
        match self.complete() {
            true => 0,
            false => self.nsec.min(2),
        }
    }

    fn nsec(&self) -> usize {
        self.nsec
    }

    fn has_sec(&self, index: usize) -> bool {
        index < self.nsec - self.nr_missing()
    }

    fn summary_string(&self) -> String {
        format!("{} sectors ({} missing)", self.nsec, self.nr_missing())
    }

    fn encoding(&self) -> TrackDataEncoding {
        self.encoding
    }

    /// A revolution of 0x4E gap bytes: 100,000 bitcells spanning 200ms at 250 kbit/s.
    fn raw_track(&self) -> MasterTrack {
        MasterTrack::from_bitrate(BitVec::from_bytes(&[0x4E; 12_500]), 250.0)
    }
}
