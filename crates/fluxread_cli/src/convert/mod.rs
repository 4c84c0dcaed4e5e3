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
pub mod args;

use crate::{args::GlobalOptions, load_image};
use anyhow::{bail, Error};
use fluxread::{ImageTrack, ImageWriter};

pub(crate) fn run(global: &GlobalOptions, params: &args::ConvertParams) -> Result<(), Error> {
    let (in_format, in_image) = load_image(&params.in_file)?;

    if !global.silent {
        println!("Input disk image type: {}", in_format);
    }

    let mut writer = match ImageWriter::create(&params.out_file, params.no_clobber) {
        Ok(writer) => writer,
        Err(e) => {
            bail!("Error creating output image: {}", e);
        }
    };

    if !global.silent {
        println!("Output disk image type: {}", writer.image().format());
    }

    for ch in in_image.track_chs() {
        if let Some(track) = in_image.get_track(ch) {
            log::debug!("convert::run(): Copying {} ({} bitcells)", ch, track.len());
            if let Err(e) = writer.image_mut().emit_track(ch, ImageTrack::Master(&track)) {
                writer.discard();
                bail!("Error converting track {}: {}", ch, e);
            }
        }
    }

    let out_path = writer.path().to_path_buf();
    match writer.finish() {
        Ok(_) => {
            println!("Output image saved to {}", out_path.display());
            Ok(())
        }
        Err(e) => {
            bail!("Error saving output image: {}", e);
        }
    }
}
