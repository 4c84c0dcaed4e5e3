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

    src/bandwidth.rs

    Host to device bandwidth measurement.
*/
use crate::{device::FluxDevice, FluxReadError};
use std::{
    fmt::{self, Display, Formatter},
    time::{Duration, Instant},
};

/// Bytes transferred in each direction by [measure_bandwidth].
pub const BANDWIDTH_TEST_BYTES: usize = 1_000_000;

/// Smallest flux interval, in microseconds, that requires a two-byte transmission code.
const TWO_BYTE_US: f64 = 249.0 / 72.0;

/// Result of a bandwidth measurement, in megabits per second.
#[derive(Copy, Clone, Debug)]
pub struct BandwidthReport {
    pub write_mbps: f64,
    pub read_mbps: f64,
}

impl BandwidthReport {
    /// The minimum bandwidth that must be sustained to stream the densest flux without
    /// overflowing the device.
    pub fn min_consistent_mbps() -> f64 {
        16.0 / TWO_BYTE_US
    }
}

impl Display for BandwidthReport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "Average Write Bandwidth: {:.3} Mbps", self.write_mbps)?;
        writeln!(f, "Average Read Bandwidth: {:.3} Mbps", self.read_mbps)?;
        write!(
            f,
            "Minimum *consistent* bandwidth required: {:.3} Mbps",
            BandwidthReport::min_consistent_mbps()
        )
    }
}

fn mbps(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    (bytes * 8) as f64 / (secs * 1_000_000.0)
}

/// Measure write and read bandwidth to `device` by streaming dummy data in each direction.
pub fn measure_bandwidth<D: FluxDevice + ?Sized>(device: &mut D) -> Result<BandwidthReport, FluxReadError> {
    let start = Instant::now();
    device.sink_bytes(BANDWIDTH_TEST_BYTES)?;
    let write_mbps = mbps(BANDWIDTH_TEST_BYTES, start.elapsed());

    let start = Instant::now();
    device.source_bytes(BANDWIDTH_TEST_BYTES)?;
    let read_mbps = mbps(BANDWIDTH_TEST_BYTES, start.elapsed());

    log::debug!(
        "measure_bandwidth(): write: {:.3} Mbps read: {:.3} Mbps",
        write_mbps,
        read_mbps
    );
    Ok(BandwidthReport { write_mbps, read_mbps })
}
