/*
    fluxread_cli
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
use crate::{args::GlobalOptions, load_image};
use anyhow::Error;

pub mod args;

pub(crate) fn run(_global: &GlobalOptions, params: &args::InfoParams) -> Result<(), Error> {
    let (format, image) = load_image(&params.in_file)?;

    let chs = image.track_chs();
    let cylinders = chs.iter().map(|ch| ch.c() + 1).max().unwrap_or(0);
    let heads = chs.iter().map(|ch| ch.h() + 1).max().unwrap_or(0);

    println!("Disk image type: {}", format);
    println!("Disk image info:");
    println!("{}", "-".repeat(79));
    println!("Cylinders: {}", cylinders);
    println!("Heads: {}", heads);

    let mut bitrate = None;
    for ch in chs {
        if let Some(track) = image.get_track(ch) {
            if bitrate.is_none() {
                bitrate = Some(track.bitrate() / 2e3);
            }
            println!(
                "{}: {} bitcells, {:.2}ms per revolution",
                ch,
                track.len(),
                track.time_per_rev() * 1000.0
            );
        }
    }
    if let Some(bitrate) = bitrate {
        println!("Bitrate: {:.0} kbit/s", bitrate);
    }

    Ok(())
}
