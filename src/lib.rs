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

//! # fluxread
//!
//! fluxread drives a flux-level floppy controller and turns what it reads into bitstream
//! disk images.
//!
//! A read proceeds in three stages:
//! * A [FluxDevice] produces raw [Flux] captures for a physical cylinder and head.
//! * A [RetryEngine] normalizes captures, runs them through a [TrackDecoder] and a ladder of
//!   PLL parameterizations, and re-reads or re-seeks until the track decodes or its retry
//!   budgets are spent.
//! * The result, either a decoded track or the raw flux, is handed to an [Image] such as the
//!   [HfeImage] codec, which serializes it into a portable container.
//!
//! The transport to the controller and the per-format sector decoders are supplied by the
//! caller through the [FluxDevice] and [TrackDecoder] traits.

pub mod bandwidth;
pub mod bitstream;
pub mod device;
pub mod flux;
pub mod image;
mod image_writer;
pub mod io;
pub mod prelude;
pub mod read;
pub mod track;
pub mod types;

use thiserror::Error;

/// The default data rate assumed for an image that has no tracks, in kbit/s.
pub const DEFAULT_BITRATE_KBPS: u32 = 250;

/// Error type for all fallible fluxread operations.
#[derive(Clone, Debug, Error)]
pub enum FluxReadError {
    #[error("An IO error occurred reading or writing the disk image: {0}")]
    IoError(String),
    #[error("A binary structure could not be read or written: {0}")]
    BinError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("The disk image format parser encountered an error: {0}")]
    FormatParseError(String),
    #[error("Command Failed: {0}")]
    CommandError(String),
}

impl From<std::io::Error> for FluxReadError {
    fn from(err: std::io::Error) -> Self {
        FluxReadError::IoError(err.to_string())
    }
}

impl From<binrw::Error> for FluxReadError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(io_err) => FluxReadError::IoError(io_err.to_string()),
            _ => FluxReadError::BinError(err.to_string()),
        }
    }
}

pub use crate::{
    device::FluxDevice,
    flux::{pll::Pll, pll::PllLadder, pll::PllParams, Flux},
    image::{hfe::HfeImage, split_file_options, FileOptions, Image, ImageFormat},
    image_writer::ImageWriter,
    read::{
        retry::{AcquireOutcome, AcquireResult, RetryEngine, RetryState},
        summary::ReadSummary,
        ReadSession,
        ReadSettings,
        Revs,
        TrackTarget,
    },
    track::{DecodedTrack, ImageTrack, MasterTrack, RawTrack, TrackDecoder},
    types::{DiskCh, TrackDataEncoding},
};
