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

    src/image_writer.rs

    Implements an output helper for writing disk images to a file.

    The image is written when the writer is finished, or when it is dropped
    without being finished, so that tracks emitted before an error or an
    interrupted read are not lost.

*/
use crate::{
    image::{split_file_options, Image, ImageFormat},
    FluxReadError,
};
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

pub struct ImageWriter {
    image: Box<dyn Image>,
    path: PathBuf,
    no_clobber: bool,
    written: bool,
}

impl ImageWriter {
    /// Create a writer for `image`, to be written to `path`.
    pub fn new(image: Box<dyn Image>, path: impl Into<PathBuf>) -> Self {
        Self {
            image,
            path: path.into(),
            no_clobber: false,
            written: false,
        }
    }

    /// Create a writer from a file specification of the form `path[::opt=val...]`. The image
    /// format is chosen by the file extension and the options are applied to the new image.
    pub fn create(spec: &str, no_clobber: bool) -> Result<Self, FluxReadError> {
        let (name, opts) = split_file_options(spec);
        let format = ImageFormat::from_path(&name)
            .ok_or_else(|| FluxReadError::UnsupportedFormat(format!("{}: Unrecognized file extension", name)))?;

        if no_clobber && Path::new(&name).exists() {
            return Err(FluxReadError::IoError(format!("{}: File already exists", name)));
        }

        let mut image = format.new_image();
        opts.apply(&name, image.as_mut())?;
        log::debug!("ImageWriter::create(): Created {} image for {}", format, name);

        Ok(Self::new(image, name).with_no_clobber(no_clobber))
    }

    /// Refuse to overwrite an existing file when writing.
    pub fn with_no_clobber(mut self, no_clobber: bool) -> Self {
        self.no_clobber = no_clobber;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn image(&self) -> &dyn Image {
        self.image.as_ref()
    }

    pub fn image_mut(&mut self) -> &mut dyn Image {
        self.image.as_mut()
    }

    /// Serialize the image and write it to the target path.
    pub fn finish(mut self) -> Result<(), FluxReadError> {
        self.written = true;
        self.write()
    }

    /// Drop the image without writing it, leaving the target path untouched.
    pub fn discard(mut self) {
        log::debug!("ImageWriter::discard(): Discarding output for {}", self.path.display());
        self.written = true;
    }

    fn write(&mut self) -> Result<(), FluxReadError> {
        let data = self.image.get_image()?;

        let mut options = OpenOptions::new();
        options.write(true);
        if self.no_clobber {
            options.create_new(true);
        }
        else {
            options.create(true).truncate(true);
        }

        let mut file = options
            .open(&self.path)
            .map_err(|e| FluxReadError::IoError(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(&data)?;

        log::debug!(
            "ImageWriter::write(): Wrote {} bytes to {}",
            data.len(),
            self.path.display()
        );
        Ok(())
    }
}

impl Drop for ImageWriter {
    fn drop(&mut self) {
        if !self.written {
            self.written = true;
            if let Err(e) = self.write() {
                log::error!("ImageWriter::drop(): Failed to write {}: {}", self.path.display(), e);
            }
        }
    }
}
