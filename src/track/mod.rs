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

    src/track/mod.rs

    Defines the track representations handed to disk images, and the
    TrackDecoder and DecodedTrack traits implemented by disk format decoders.

*/
use crate::{
    bitstream::rotate_left,
    flux::{pll::PllDecodeResult, Flux, Pll, PllParams},
    types::{DiskCh, TrackDataEncoding},
};
use bit_vec::BitVec;

/// A single revolution of track bitcells, as produced by a format decoder or read from a
/// bitstream image. A `MasterTrack` is never modified once constructed.
#[derive(Clone, Debug)]
pub struct MasterTrack {
    bits: BitVec,
    time_per_rev: f64,
    splice: usize,
    encoding: TrackDataEncoding,
}

impl MasterTrack {
    /// Create a new `MasterTrack` from bitcells spanning `time_per_rev` seconds.
    pub fn new(bits: BitVec, time_per_rev: f64) -> Self {
        MasterTrack {
            bits,
            time_per_rev,
            splice: 0,
            encoding: TrackDataEncoding::Mfm,
        }
    }

    /// Create a new `MasterTrack` from bitcells recorded at `bitrate_kbps` kbit/s. Each data bit
    /// occupies two bitcells, so a revolution lasts `bits / (2000 * bitrate_kbps)` seconds.
    pub fn from_bitrate(bits: BitVec, bitrate_kbps: f64) -> Self {
        let time_per_rev = bits.len() as f64 / (2000.0 * bitrate_kbps);
        MasterTrack::new(bits, time_per_rev)
    }

    /// Set the bit offset nearest the index pulse.
    pub fn with_splice(self, splice: usize) -> Self {
        MasterTrack { splice, ..self }
    }

    pub fn with_encoding(self, encoding: TrackDataEncoding) -> Self {
        MasterTrack { encoding, ..self }
    }

    pub fn bits(&self) -> &BitVec {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn time_per_rev(&self) -> f64 {
        self.time_per_rev
    }

    pub fn splice(&self) -> usize {
        self.splice
    }

    pub fn encoding(&self) -> TrackDataEncoding {
        self.encoding
    }

    /// Return the bitcell rate of the track in bitcells per second.
    pub fn bitrate(&self) -> f64 {
        if self.time_per_rev > 0.0 {
            self.bits.len() as f64 / self.time_per_rev
        }
        else {
            0.0
        }
    }

    /// Return the track's bitcells rotated so that the stream begins at the index pulse:
    /// the final `splice` bits are moved to the front.
    pub fn index_aligned_bits(&self) -> BitVec {
        if self.bits.is_empty() {
            return BitVec::new();
        }
        let len = self.bits.len();
        let index = (len - self.splice % len) % len;
        rotate_left(&self.bits, index)
    }
}

/// A bitstream sampled directly from flux at a fixed nominal clock, without any format
/// decoding. Used when a raw capture must be stored in a bitstream image.
pub struct RawTrack {
    clock: f64,
    result: PllDecodeResult,
}

impl RawTrack {
    /// Sample `flux` with a bit cell period of `clock` seconds.
    pub fn new(clock: f64, flux: &Flux, pll: PllParams) -> Self {
        RawTrack {
            clock,
            result: Pll::new(clock, pll).decode(flux),
        }
    }

    /// Sample `flux` for a data rate of `bitrate_kbps` kbit/s. Two bitcells represent each data
    /// bit, so the bit cell period is `5e-4 / bitrate_kbps` seconds.
    pub fn from_bitrate(flux: &Flux, bitrate_kbps: f64) -> Self {
        RawTrack::new(5e-4 / bitrate_kbps, flux, PllParams::default())
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Return all sampled bitcells.
    pub fn bits(&self) -> &BitVec {
        &self.result.bits
    }

    /// Return the number of complete revolutions delimited by index pulses.
    pub fn revolution_ct(&self) -> usize {
        self.result.index_bits.len()
    }

    /// Return the bitcells of revolution `rev` and its duration in seconds. Revolution 0 begins
    /// at the start of the sampled flux. The final revolution extends to the end of the stream
    /// if no index pulse terminates it.
    pub fn get_revolution(&self, rev: usize) -> Option<(BitVec, f64)> {
        self.result.revolution(rev, self.clock)
    }
}

/// A track decoded by a disk format decoder.
///
/// Decoding is refined in place: each call to [DecodedTrack::decode_raw] may recover further
/// sectors from a capture, but never discards sectors already recovered.
pub trait DecodedTrack {
    /// Decode `flux` with the given clock recovery parameters, merging in any newly recovered
    /// sectors.
    fn decode_raw(&mut self, flux: &Flux, pll: &PllParams);
    /// Return the number of sectors not yet recovered.
    fn nr_missing(&self) -> usize;
    /// Return the number of sectors expected on the track.
    fn nsec(&self) -> usize;
    /// Return a bool indicating if the sector at `index` has been recovered.
    fn has_sec(&self, index: usize) -> bool;
    /// Return a one-line human readable summary of the decoded state.
    fn summary_string(&self) -> String;
    /// Return the data encoding of the track.
    fn encoding(&self) -> TrackDataEncoding {
        TrackDataEncoding::Mfm
    }
    /// Render the decoded track as a bitstream revolution.
    fn raw_track(&self) -> MasterTrack;
}

/// A decoder for one disk format family.
pub trait TrackDecoder {
    /// Return the name of the disk format.
    fn name(&self) -> &str;
    /// Decode the track at `ch` from `flux`. Returns `None` if the format does not define a
    /// track at `ch`.
    fn decode_track(&self, ch: DiskCh, flux: &Flux, pll: &PllParams) -> Option<Box<dyn DecodedTrack>>;
}

/// A track as presented to an image for storage.
#[derive(Copy, Clone)]
pub enum ImageTrack<'a> {
    /// A track decoded by a format decoder.
    Decoded(&'a dyn DecodedTrack),
    /// A finished bitstream revolution.
    Master(&'a MasterTrack),
    /// Undecoded flux; images sample their own revolution from it.
    Flux(&'a Flux),
}
