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

    src/device.rs

    Defines the FluxDevice trait, the interface to a flux-level floppy
    controller. The transport and command protocol live behind this trait.
*/
use crate::{flux::Flux, FluxReadError};

/// A flux-level floppy controller with a drive selected.
///
/// Every method is a blocking round trip to the device. A failed command is reported as
/// [FluxReadError::CommandError] carrying a description of the failing command.
pub trait FluxDevice {
    /// Step the drive heads to physical cylinder `cyl` and select physical head `head`.
    fn seek(&mut self, cyl: u16, head: u8) -> Result<(), FluxReadError>;
    /// Capture flux from the selected track. The capture ends after `revs` index pulses, or
    /// after `ticks` sample ticks if `ticks` is non-zero, whichever comes first. A `revs` of 0
    /// captures by duration only.
    fn read_track(&mut self, revs: u32, ticks: u64) -> Result<Flux, FluxReadError>;
    /// Return the sample frequency of the device's flux timer in ticks per second.
    fn sample_freq(&self) -> f64;
    /// Send `n` bytes of dummy data to the device, for bandwidth measurement.
    fn sink_bytes(&mut self, n: usize) -> Result<(), FluxReadError>;
    /// Receive `n` bytes of dummy data from the device, for bandwidth measurement.
    fn source_bytes(&mut self, n: usize) -> Result<(), FluxReadError>;
}
