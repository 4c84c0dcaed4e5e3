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

    src/image/mod.rs

    Defines the Image trait implemented by disk image containers, and parsing
    of inline file options of the form `path::option=value`.
*/
pub mod hfe;

use crate::{
    image::hfe::HfeImage,
    track::{ImageTrack, MasterTrack},
    types::DiskCh,
    FluxReadError,
};
use std::{
    fmt::{self, Display, Formatter},
    path::Path,
};
use strum::IntoEnumIterator;

/// A disk image container that tracks can be emitted into and serialized from.
///
/// An image holds at most one track per [DiskCh]; emitting a track for an address already
/// present replaces it.
pub trait Image {
    /// Return the container format of this image.
    fn format(&self) -> ImageFormat;
    /// Return the names of the options accepted by [Image::set_option].
    fn option_names(&self) -> &'static [&'static str];
    /// Set a named option from its string value, validating it.
    fn set_option(&mut self, name: &str, value: &str) -> Result<(), FluxReadError>;
    /// Store a track at `ch`.
    fn emit_track(&mut self, ch: DiskCh, track: ImageTrack) -> Result<(), FluxReadError>;
    /// Return the track stored at `ch`, if any.
    fn get_track(&self, ch: DiskCh) -> Option<MasterTrack>;
    /// Return the addresses of all stored tracks in cylinder-major order.
    fn track_chs(&self) -> Vec<DiskCh>;
    /// Serialize the image into its container format.
    fn get_image(&mut self) -> Result<Vec<u8>, FluxReadError>;
}

/// The supported image container formats.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::EnumIter)]
pub enum ImageFormat {
    Hfe,
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ImageFormat::Hfe => write!(f, "HFE"),
        }
    }
}

impl ImageFormat {
    /// Return the file extensions associated with the format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ImageFormat::Hfe => &["hfe"],
        }
    }

    /// Determine the image format from a file name's extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<ImageFormat> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        ImageFormat::iter().find(|fmt| fmt.extensions().contains(&ext.as_str()))
    }

    /// Create a new, empty image of this format.
    pub fn new_image(&self) -> Box<dyn Image> {
        match self {
            ImageFormat::Hfe => Box::new(HfeImage::new()),
        }
    }

    /// Parse an image of this format from its serialized bytes.
    pub fn load_image(&self, data: &[u8]) -> Result<Box<dyn Image>, FluxReadError> {
        match self {
            ImageFormat::Hfe => Ok(Box::new(HfeImage::from_bytes(data)?)),
        }
    }
}

/// Options attached to a file name, in the order they were given.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileOptions {
    opts: Vec<(String, String)>,
}

impl FileOptions {
    pub fn is_empty(&self) -> bool {
        self.opts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.opts.len()
    }

    /// Return the value of the last occurrence of option `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.opts.iter().rev().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.opts.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Apply every option to `image`. `file` names the image in error messages.
    pub fn apply(&self, file: &str, image: &mut dyn Image) -> Result<(), FluxReadError> {
        for (name, value) in self.iter() {
            if !image.option_names().contains(&name) {
                return Err(FluxReadError::ConfigError(format!(
                    "{}: Invalid file option: {}",
                    file, name
                )));
            }
            image.set_option(name, value)?;
        }
        Ok(())
    }
}

/// Split a file specification of the form `name::opt=val[:opt=val]...` into the file name and
/// its options. An option given without a value is set to `"true"`.
pub fn split_file_options(spec: &str) -> (String, FileOptions) {
    let mut parts = spec.split("::");
    let name = parts.next().unwrap_or_default().to_string();
    let mut opts = FileOptions::default();

    for term in parts.flat_map(|p| p.split(':')) {
        let (opt, val) = match term.split_once('=') {
            Some((opt, val)) => (opt, val),
            None => (term, "true"),
        };
        if !opt.is_empty() {
            opts.opts.push((opt.to_string(), val.to_string()));
        }
    }

    (name, opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_file_options() {
        let (name, opts) = split_file_options("disk.hfe::bitrate=500");
        assert_eq!(name, "disk.hfe");
        assert_eq!(opts.get("bitrate"), Some("500"));

        let (name, opts) = split_file_options("a/b.hfe::bitrate=300:flag::other=x");
        assert_eq!(name, "a/b.hfe");
        assert_eq!(opts.len(), 3);
        assert_eq!(opts.get("flag"), Some("true"));
        assert_eq!(opts.get("other"), Some("x"));

        let (name, opts) = split_file_options("plain.hfe");
        assert_eq!(name, "plain.hfe");
        assert!(opts.is_empty());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ImageFormat::from_path("disk.HFE"), Some(ImageFormat::Hfe));
        assert_eq!(ImageFormat::from_path("disk.scp"), None);
        assert_eq!(ImageFormat::from_path("disk"), None);
    }

    #[test]
    fn test_apply_rejects_unknown_option() {
        let (name, opts) = split_file_options("disk.hfe::speed=300");
        let mut image = ImageFormat::Hfe.new_image();
        match opts.apply(&name, image.as_mut()) {
            Err(FluxReadError::ConfigError(msg)) => assert_eq!(msg, "disk.hfe: Invalid file option: speed"),
            _ => panic!("Expected unknown option to be rejected"),
        }
    }
}
