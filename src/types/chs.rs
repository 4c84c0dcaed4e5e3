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

//! The `chs` module defines [DiskCh], the cylinder-head address of a single track.

use std::fmt::Display;

/// A structure representing a cylinder and head.
/// Track maps are keyed by `DiskCh`; ordering is cylinder-major, so iterating a sorted map
/// visits head 0 then head 1 of each cylinder in turn.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskCh {
    pub(crate) c: u16,
    pub(crate) h: u8,
}

impl From<(u16, u8)> for DiskCh {
    fn from((c, h): (u16, u8)) -> Self {
        Self { c, h }
    }
}

impl From<DiskCh> for (u16, u8) {
    fn from(ch: DiskCh) -> Self {
        (ch.c, ch.h)
    }
}

impl Display for DiskCh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}.{}", self.c, self.h)
    }
}

impl DiskCh {
    /// Create a new DiskCh structure from a Cylinder (c) and Head (h) specifier.
    pub fn new(c: u16, h: u8) -> Self {
        Self { c, h }
    }
    /// Return the cylinder (c) field.
    pub fn c(&self) -> u16 {
        self.c
    }
    /// Return the head (h) field.
    pub fn h(&self) -> u8 {
        self.h
    }
    /// Return a tuple of (cylinder, head).
    pub fn get(&self) -> (u16, u8) {
        (self.c, self.h)
    }
    /// Set the cylinder (c) field.
    pub fn set_c(&mut self, c: u16) {
        self.c = c;
    }
    /// Set the head (h) field.
    pub fn set_h(&mut self, h: u8) {
        self.h = h;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_ch_ordering_is_cylinder_major() {
        let mut map = BTreeMap::new();
        map.insert(DiskCh::new(1, 0), "c1h0");
        map.insert(DiskCh::new(0, 1), "c0h1");
        map.insert(DiskCh::new(0, 0), "c0h0");

        let order: Vec<_> = map.values().copied().collect();
        assert_eq!(order, vec!["c0h0", "c0h1", "c1h0"]);
    }

    #[test]
    fn test_ch_display() {
        assert_eq!(DiskCh::new(79, 1).to_string(), "T79.1");
    }
}
