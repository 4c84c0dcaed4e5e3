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
*/

//! The `flux` module defines [Flux], a capture of flux transition timings as read from a
//! drive, and the [pll] clock recovery used to turn it into a bitstream.
//!
//! All timings in a [Flux] are expressed in ticks of the capturing device's sample clock.
//! Intervals are stored as `f64` so that a capture can be rescaled to a nominal rotation
//! speed without accumulating rounding error.

pub mod pll;

pub use pll::{Pll, PllLadder, PllParams};

#[doc(hidden)]
#[macro_export]
macro_rules! format_us {
    ($value:expr) => {
        format!("{:.4}μs", $value * 1_000_000.0)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! format_ms {
    ($value:expr) => {
        format!("{:.4}ms", $value * 1_000.0)
    };
}

/// A sequence of flux transition intervals covering one or more revolutions of a track.
#[derive(Clone, Debug, Default)]
pub struct Flux {
    /// Cumulative tick offsets of each index pulse from the start of the capture.
    index_list: Vec<f64>,
    /// Ticks between consecutive flux transitions.
    list: Vec<f64>,
    /// Ticks per second of the capturing device.
    sample_freq: f64,
    /// Nominal ticks per revolution, if known independently of the index pulses.
    ticks_per_rev: Option<f64>,
}

impl Flux {
    /// Create a new `Flux` from cumulative index offsets and flux intervals, both in ticks.
    pub fn new(index_list: Vec<f64>, list: Vec<f64>, sample_freq: f64) -> Self {
        Flux {
            index_list,
            list,
            sample_freq,
            ticks_per_rev: None,
        }
    }

    /// Create a new `Flux` from integer tick counts, as delivered by a device.
    pub fn from_ticks(index_list: &[u64], list: &[u32], sample_freq: f64) -> Self {
        Flux::new(
            index_list.iter().map(|&t| t as f64).collect(),
            list.iter().map(|&t| t as f64).collect(),
            sample_freq,
        )
    }

    /// Replace the index pulses of this capture with evenly spaced synthetic pulses, starting
    /// at `pre_index` ticks and repeating every `period` ticks. Pulses falling beyond the end
    /// of the captured flux are dropped.
    pub fn with_fake_index(mut self, pre_index: f64, period: f64) -> Self {
        let total = self.total_ticks();
        self.index_list.clear();
        if period > 0.0 {
            let mut offset = pre_index;
            while offset <= total {
                self.index_list.push(offset);
                offset += period;
            }
        }
        log::trace!(
            "Flux::with_fake_index(): Synthesized {} index pulses every {:.0} ticks",
            self.index_list.len(),
            period
        );
        self
    }

    /// Return the flux intervals, in ticks.
    pub fn intervals(&self) -> &[f64] {
        &self.list
    }

    /// Return the cumulative index pulse offsets, in ticks.
    pub fn index_list(&self) -> &[f64] {
        &self.index_list
    }

    /// Return the sample frequency of the capture in ticks per second.
    pub fn sample_freq(&self) -> f64 {
        self.sample_freq
    }

    /// Return the number of flux transitions in the capture.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Return a bool indicating if the capture holds no flux transitions.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Return the total duration of the capture in ticks.
    pub fn total_ticks(&self) -> f64 {
        self.list.iter().sum()
    }

    /// Override the nominal ticks per revolution. Passing `None` reverts to the value measured
    /// from the index pulses.
    pub fn set_ticks_per_rev(&mut self, ticks_per_rev: Option<f64>) {
        self.ticks_per_rev = ticks_per_rev;
    }

    /// Return the nominal ticks per revolution, or the mean spacing of the index pulses if no
    /// nominal value was set. Returns `None` if neither is available.
    pub fn ticks_per_rev(&self) -> Option<f64> {
        if let Some(tpr) = self.ticks_per_rev {
            return Some(tpr);
        }
        match self.index_list.len() {
            0 | 1 => None,
            n => Some((self.index_list[n - 1] - self.index_list[0]) / (n - 1) as f64),
        }
    }

    /// Return the time of one revolution in seconds, if it can be determined.
    pub fn time_per_rev(&self) -> Option<f64> {
        self.ticks_per_rev().map(|tpr| tpr / self.sample_freq)
    }

    /// Scale every interval, index offset and the nominal revolution length by `factor`.
    pub fn scale(&mut self, factor: f64) {
        log::trace!("Flux::scale(): Scaling flux by {:.6}", factor);
        self.list.iter_mut().for_each(|t| *t *= factor);
        self.index_list.iter_mut().for_each(|t| *t *= factor);
        if let Some(tpr) = self.ticks_per_rev.as_mut() {
            *tpr *= factor;
        }
    }

    /// Append another capture to the end of this one. The other capture's index offsets are
    /// shifted by this capture's total duration so that they remain cumulative.
    pub fn append(&mut self, other: Flux) {
        if other.sample_freq != self.sample_freq {
            log::warn!(
                "Flux::append(): Sample frequency mismatch: {} vs {}",
                self.sample_freq,
                other.sample_freq
            );
        }
        let offset = self.total_ticks();
        self.index_list.extend(other.index_list.iter().map(|t| t + offset));
        self.list.extend(other.list);
    }

    /// Discard the flux preceding the first index pulse, so that the capture begins at the
    /// index. The first index pulse is consumed; remaining offsets are rebased to it.
    pub fn cue_at_index(&mut self) {
        let first = match self.index_list.first() {
            Some(&first) => first,
            None => return,
        };

        let mut to_index = first;
        let mut cut = None;
        for (i, &t) in self.list.iter().enumerate() {
            to_index -= t;
            if to_index < 0.0 {
                cut = Some(i);
                break;
            }
        }

        match cut {
            Some(i) => {
                let mut cued = Vec::with_capacity(self.list.len() - i);
                cued.push(-to_index);
                cued.extend_from_slice(&self.list[i + 1..]);
                self.list = cued;
            }
            None => {
                // The capture ended before the index pulse.
                self.list.clear();
            }
        }

        self.index_list = self.index_list[1..].iter().map(|t| t - first).collect();
    }

    /// Return a one-line human readable summary of the capture.
    pub fn summary_string(&self) -> String {
        format!(
            "Raw Flux ({} flux in {:.2}ms)",
            self.list.len(),
            self.total_ticks() * 1000.0 / self.sample_freq
        )
    }
}
