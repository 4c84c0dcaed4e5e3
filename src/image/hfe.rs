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

    src/image/hfe.rs

    A codec for the HFEv1 disk image format.

    HFE format images are an internal bitstream-level format used by the HxC disk emulator.
    A 512 byte header is followed by a 512 byte track lookup table (TLUT), then track
    data in 512 byte blocks. Each block holds 256 bytes of head 0 followed by 256
    bytes of head 1. Bits are stored LSB first within each byte.

*/
use crate::{
    bitstream::{mfm, reverse_bytes_in_place},
    image::{Image, ImageFormat},
    io::{Cursor, ReadSeek},
    track::{ImageTrack, MasterTrack, RawTrack},
    types::{DiskCh, TrackDataEncoding},
    FluxReadError,
    DEFAULT_BITRATE_KBPS,
};
use binrw::{binrw, BinRead, BinWrite};
use bit_vec::BitVec;
use std::collections::BTreeMap;

pub const HFE_SIGNATURE: &[u8; 8] = b"HXCPICFE";
pub const HFE_V3_SIGNATURE: &[u8; 8] = b"HXCHFEV3";
pub const HFE_BLOCK_SIZE: usize = 0x200;
const HFE_SIDE_BLOCK_SIZE: usize = 0x100;
const HFE_MAX_REVISION: u8 = 1;
/// Fill for unused header and TLUT bytes.
const HFE_FILL_BYTE: u8 = 0xFF;
/// Fill for unused track data and unformatted cylinders.
const HFE_PAD_BYTE: u8 = 0x88;
/// Value of the encoding and interface fields when unspecified.
const HFE_UNSPECIFIED: u8 = 0xFF;
/// Maximum number of cylinders that fit in a single-block TLUT.
const HFE_MAX_CYLINDERS: usize = HFE_BLOCK_SIZE / 4;
/// Block offset of the first track data block, following the header and TLUT blocks.
const HFE_DATA_BLOCK_BASE: usize = 2;

const BITRATE_REQUIRED_MSG: &str = "HFE: Requires bitrate to be specified (eg. filename.hfe::bitrate=500)";

#[derive(Debug)]
#[binrw]
#[brw(little)]
struct HfeFileHeader {
    signature: [u8; 8],    // “HXCPICFE”
    format_revision: u8,   // Revision 0
    number_of_tracks: u8,  // Number of track in the file
    number_of_sides: u8,   // Number of valid side (Not used by the emulator)
    track_encoding: u8,    // Track Encoding mode
    bit_rate: u16,         // Bitrate in Kbit/s. Ex : 250=250000bits/s
    rpm: u16,              // Rotation per minute (Not used by the emulator)
    interface_mode: u8,    // Floppy interface mode.
    reserved: u8,          // Reserved
    track_list_offset: u16, // Offset of the track list LUT in block of 512 bytes
}

#[derive(Debug)]
#[binrw]
#[brw(little)]
struct HfeTrackIndexEntry {
    offset: u16,
    len: u16,
}

/// Options accepted by an HFE image.
#[derive(Clone, Debug, Default)]
pub struct HfeOptions {
    bitrate: Option<u32>,
}

impl HfeOptions {
    pub const NAMES: &'static [&'static str] = &["bitrate"];

    /// Return the configured bitrate in kbit/s, if one has been set or detected.
    pub fn bitrate(&self) -> Option<u32> {
        self.bitrate
    }

    /// Set the bitrate from a string value. The value must be a positive integer.
    pub fn set_bitrate(&mut self, value: &str) -> Result<(), FluxReadError> {
        let invalid = || FluxReadError::ConfigError(format!("HFE: Invalid bitrate: '{}'", value));
        let bitrate: i64 = value.trim().parse().map_err(|_| invalid())?;
        if bitrate <= 0 || bitrate > u16::MAX as i64 {
            return Err(invalid());
        }
        self.bitrate = Some(bitrate as u32);
        Ok(())
    }
}

/// A single HFE track, held MSB first in memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HfeTrack {
    bits: BitVec,
}

impl HfeTrack {
    pub fn new(bits: BitVec) -> Self {
        HfeTrack { bits }
    }

    pub fn bits(&self) -> &BitVec {
        &self.bits
    }

    /// Create a track from bytes in HFE's LSB-first bit order.
    pub fn from_hfe_bytes(bytes: &[u8]) -> Self {
        let mut msb_bytes = bytes.to_vec();
        reverse_bytes_in_place(&mut msb_bytes);
        HfeTrack {
            bits: BitVec::from_bytes(&msb_bytes),
        }
    }

    /// Return the track as bytes in HFE's LSB-first bit order. A partial final byte is padded
    /// with zero bits.
    pub fn to_hfe_bytes(&self) -> Vec<u8> {
        let mut bytes = self.bits.to_bytes();
        reverse_bytes_in_place(&mut bytes);
        bytes
    }
}

/// An HFE image: a map of (cylinder, head) to track bitstreams at a single image-wide bitrate.
#[derive(Clone, Debug, Default)]
pub struct HfeImage {
    opts: HfeOptions,
    tracks: BTreeMap<DiskCh, HfeTrack>,
}

impl HfeImage {
    pub fn new() -> Self {
        HfeImage::default()
    }

    pub fn opts(&self) -> &HfeOptions {
        &self.opts
    }

    /// Return the image bitrate in kbit/s, if set.
    pub fn bitrate(&self) -> Option<u32> {
        self.opts.bitrate
    }

    /// Return the stored track at `ch` in its HFE representation.
    pub fn hfe_track(&self, ch: DiskCh) -> Option<&HfeTrack> {
        self.tracks.get(&ch)
    }

    /// Return the number of cylinders the image serializes, including unformatted ones.
    pub fn cylinders(&self) -> usize {
        self.tracks.keys().map(|ch| ch.c() as usize).max().map_or(1, |c| c + 1)
    }

    /// Return the number of sides the image serializes: 2 if any head 1 track is present.
    pub fn sides(&self) -> u8 {
        match self.tracks.keys().any(|ch| ch.h() == 1) {
            true => 2,
            false => 1,
        }
    }

    /// Read an HFE image from a reader.
    pub fn load<RS: ReadSeek>(mut image: RS) -> Result<HfeImage, FluxReadError> {
        let mut data = Vec::new();
        image.seek(std::io::SeekFrom::Start(0))?;
        image.read_to_end(&mut data)?;
        HfeImage::from_bytes(&data)
    }

    /// Parse an HFE image from its serialized bytes.
    pub fn from_bytes(data: &[u8]) -> Result<HfeImage, FluxReadError> {
        let mut cursor = Cursor::new(data);
        let file_header = HfeFileHeader::read(&mut cursor)
            .map_err(|_| FluxReadError::FormatParseError("HFE: Truncated file header".to_string()))?;

        if &file_header.signature == HFE_V3_SIGNATURE {
            return Err(FluxReadError::UnsupportedFormat("HFEv3 is not supported".to_string()));
        }
        if &file_header.signature != HFE_SIGNATURE || file_header.format_revision > HFE_MAX_REVISION {
            return Err(FluxReadError::FormatParseError("Not a valid HFE file".to_string()));
        }
        if file_header.number_of_tracks == 0 {
            return Err(FluxReadError::FormatParseError("HFE: Invalid #cyls".to_string()));
        }
        if !(1..=2).contains(&file_header.number_of_sides) {
            return Err(FluxReadError::FormatParseError("HFE: Invalid #sides".to_string()));
        }

        log::trace!(
            "HfeImage::from_bytes(): Got HFE header. Cylinders: {} Heads: {} Bitrate: {}",
            file_header.number_of_tracks,
            file_header.number_of_sides,
            file_header.bit_rate
        );

        let mut hfe = HfeImage::new();
        hfe.opts.set_bitrate(&file_header.bit_rate.to_string())?;

        let tlut_base = file_header.track_list_offset as u64 * HFE_BLOCK_SIZE as u64;
        cursor.set_position(tlut_base);
        let mut track_index_vec = Vec::with_capacity(file_header.number_of_tracks as usize);
        for _ in 0..file_header.number_of_tracks {
            let entry = HfeTrackIndexEntry::read(&mut cursor)
                .map_err(|_| FluxReadError::FormatParseError("HFE: Truncated track lookup table".to_string()))?;
            track_index_vec.push(entry);
        }

        for (cyl, entry) in track_index_vec.iter().enumerate() {
            log::trace!("HfeImage::from_bytes(): Cylinder {} index: {:?}", cyl, entry);
            for side in 0..file_header.number_of_sides {
                let mut todo = entry.len as usize / 2;
                let mut offset = entry.offset as usize;
                let mut track_data = Vec::with_capacity(todo);

                while todo > 0 {
                    let data_offset = offset * HFE_BLOCK_SIZE + side as usize * HFE_SIDE_BLOCK_SIZE;
                    let data_len = todo.min(HFE_SIDE_BLOCK_SIZE);
                    let block = data.get(data_offset..data_offset + data_len).ok_or_else(|| {
                        FluxReadError::FormatParseError(format!(
                            "HFE: Track data for cylinder {} side {} is truncated",
                            cyl, side
                        ))
                    })?;
                    track_data.extend_from_slice(block);
                    todo -= data_len;
                    offset += 1;
                }

                hfe.tracks
                    .insert(DiskCh::new(cyl as u16, side), HfeTrack::from_hfe_bytes(&track_data));
            }
        }

        Ok(hfe)
    }
}

impl Image for HfeImage {
    fn format(&self) -> ImageFormat {
        ImageFormat::Hfe
    }

    fn option_names(&self) -> &'static [&'static str] {
        HfeOptions::NAMES
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), FluxReadError> {
        match name {
            "bitrate" => self.opts.set_bitrate(value),
            _ => Err(FluxReadError::ConfigError(format!("HFE: Invalid file option: {}", name))),
        }
    }

    fn emit_track(&mut self, ch: DiskCh, track: ImageTrack) -> Result<(), FluxReadError> {
        if ch.h() > 1 {
            return Err(FluxReadError::UnsupportedFormat(format!(
                "HFE: Head {} is out of range",
                ch.h()
            )));
        }

        let (master, flux) = match track {
            ImageTrack::Decoded(decoded) => {
                let master = decoded.raw_track();
                let encoding = match decoded.encoding() {
                    TrackDataEncoding::Fm => TrackDataEncoding::Fm,
                    TrackDataEncoding::Mfm => master.encoding(),
                };
                (Some(master.with_encoding(encoding)), None)
            }
            ImageTrack::Master(master) => (Some(master.clone()), None),
            ImageTrack::Flux(flux) => (None, Some(flux)),
        };

        // HFE convention is that FM is recorded at double density.
        let is_fm = matches!(master.as_ref().map(|m| m.encoding()), Some(TrackDataEncoding::Fm));

        let bitrate = match self.opts.bitrate {
            Some(bitrate) => bitrate,
            None => {
                let master = master
                    .as_ref()
                    .ok_or_else(|| FluxReadError::ConfigError(BITRATE_REQUIRED_MSG.to_string()))?;
                let mut detected = (master.bitrate() / 2e3).round() as u32;
                if is_fm {
                    detected *= 2;
                }
                self.opts.set_bitrate(&detected.to_string())?;
                log::info!("HFE: Data bitrate detected: {} kbit/s", detected);
                detected
            }
        };

        let bits = match (master, flux) {
            (Some(master), _) => {
                // Rotate data to start at the index.
                let bits = master.index_aligned_bits();
                if is_fm {
                    mfm::double_rate(&bits)
                }
                else {
                    bits
                }
            }
            (None, Some(flux)) => {
                let mut flux = flux.clone();
                flux.cue_at_index();
                let raw = RawTrack::from_bitrate(&flux, bitrate as f64);
                raw.get_revolution(0).map(|(bits, _)| bits).unwrap_or_default()
            }
            (None, None) => BitVec::new(),
        };

        log::trace!("HfeImage::emit_track(): {} stored {} bitcells", ch, bits.len());
        self.tracks.insert(ch, HfeTrack::new(bits));
        Ok(())
    }

    fn get_track(&self, ch: DiskCh) -> Option<MasterTrack> {
        let track = self.tracks.get(&ch)?;
        let bitrate = self.opts.bitrate?;
        Some(MasterTrack::from_bitrate(track.bits.clone(), bitrate as f64))
    }

    fn track_chs(&self) -> Vec<DiskCh> {
        self.tracks.keys().copied().collect()
    }

    fn get_image(&mut self) -> Result<Vec<u8>, FluxReadError> {
        // An empty image has no bitrate to detect, so it takes the default.
        let bitrate = match self.opts.bitrate {
            Some(bitrate) => bitrate,
            None => {
                self.opts.bitrate = Some(DEFAULT_BITRATE_KBPS);
                DEFAULT_BITRATE_KBPS
            }
        };

        let n_cyl = self.cylinders();
        let n_side = self.sides();
        if n_cyl > HFE_MAX_CYLINDERS {
            return Err(FluxReadError::UnsupportedFormat(format!(
                "HFE: Too many cylinders: {} (maximum {})",
                n_cyl, HFE_MAX_CYLINDERS
            )));
        }

        // The track lookup table and track data are built up together.
        let mut tlut = Cursor::new(Vec::with_capacity(HFE_BLOCK_SIZE));
        let mut tdat: Vec<u8> = Vec::new();

        for cyl in 0..n_cyl {
            let s0 = self.tracks.get(&DiskCh::new(cyl as u16, 0));
            let s1 = self.tracks.get(&DiskCh::new(cyl as u16, 1));
            let block_offset = tdat.len() / HFE_BLOCK_SIZE + HFE_DATA_BLOCK_BASE;

            if s0.is_none() && s1.is_none() {
                // Dummy data for empty cylinders. Assumes 300RPM.
                let nr_bytes = 100 * bitrate as usize;
                log::trace!("HfeImage::get_image(): Cylinder {} is unformatted", cyl);
                Self::tlut_entry(block_offset, nr_bytes)?.write(&mut tlut)?;
                let padded = nr_bytes.next_multiple_of(HFE_BLOCK_SIZE);
                tdat.resize(tdat.len() + padded, HFE_PAD_BYTE);
                continue;
            }

            let sides = [
                s0.map(|t| t.to_hfe_bytes()).unwrap_or_default(),
                s1.map(|t| t.to_hfe_bytes()).unwrap_or_default(),
            ];
            let nr_bytes = sides.iter().map(|t| t.len()).max().unwrap_or(0);
            let nr_blocks = nr_bytes.div_ceil(HFE_SIDE_BLOCK_SIZE);
            Self::tlut_entry(block_offset, 2 * nr_bytes)?.write(&mut tlut)?;

            for block in 0..nr_blocks {
                for side in sides.iter() {
                    let start = (block * HFE_SIDE_BLOCK_SIZE).min(side.len());
                    let end = ((block + 1) * HFE_SIDE_BLOCK_SIZE).min(side.len());
                    tdat.extend_from_slice(&side[start..end]);
                    tdat.resize(tdat.len() + HFE_SIDE_BLOCK_SIZE - (end - start), HFE_PAD_BYTE);
                }
            }
        }

        let header = HfeFileHeader {
            signature: *HFE_SIGNATURE,
            format_revision: 0,
            number_of_tracks: n_cyl as u8,
            number_of_sides: n_side,
            track_encoding: HFE_UNSPECIFIED,
            bit_rate: bitrate as u16,
            rpm: 0,
            interface_mode: HFE_UNSPECIFIED,
            reserved: 1,
            track_list_offset: 1,
        };

        let mut out = Cursor::new(Vec::with_capacity(2 * HFE_BLOCK_SIZE + tdat.len()));
        header.write(&mut out)?;
        let mut out = out.into_inner();
        out.resize(HFE_BLOCK_SIZE, HFE_FILL_BYTE);

        let mut tlut = tlut.into_inner();
        tlut.resize(HFE_BLOCK_SIZE, HFE_FILL_BYTE);
        out.extend_from_slice(&tlut);
        out.extend_from_slice(&tdat);

        log::debug!(
            "HfeImage::get_image(): Wrote {} cylinders, {} sides at {} kbit/s: {} bytes",
            n_cyl,
            n_side,
            bitrate,
            out.len()
        );
        Ok(out)
    }
}

impl HfeImage {
    fn tlut_entry(block_offset: usize, len: usize) -> Result<HfeTrackIndexEntry, FluxReadError> {
        if block_offset > u16::MAX as usize || len > u16::MAX as usize {
            return Err(FluxReadError::UnsupportedFormat(format!(
                "HFE: Track data exceeds format limits (block {}, length {})",
                block_offset, len
            )));
        }
        Ok(HfeTrackIndexEntry {
            offset: block_offset as u16,
            len: len as u16,
        })
    }
}
