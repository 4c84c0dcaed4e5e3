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

    src/bitstream/mod.rs

    Helpers for working with track bitstreams held in BitVecs.
*/

pub mod mfm;

use bit_vec::BitVec;

const fn reverse_bits(mut byte: u8) -> u8 {
    byte = (byte >> 4) | (byte << 4);
    byte = ((byte & 0x33) << 2) | ((byte & 0xCC) >> 2);
    byte = ((byte & 0x55) << 1) | ((byte & 0xAA) >> 1);
    byte
}

const fn generate_reverse_table() -> [u8; 256] {
    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = reverse_bits(i as u8);
        i += 1;
    }
    table
}

/// Lookup table mapping each byte to its bit-reversed value.
pub(crate) const REVERSE_TABLE: [u8; 256] = generate_reverse_table();

/// Reverse the bit order of every byte in `bytes` in place, converting between MSB-first and
/// LSB-first bit order.
pub fn reverse_bytes_in_place(bytes: &mut [u8]) {
    for byte in bytes.iter_mut() {
        *byte = REVERSE_TABLE[*byte as usize];
    }
}

/// Return a copy of `bits` rotated left by `shift` bits, so that bit `shift` becomes bit 0.
/// `shift` is taken modulo the length of the bitstream.
pub fn rotate_left(bits: &BitVec, shift: usize) -> BitVec {
    if bits.is_empty() {
        return BitVec::new();
    }
    let shift = shift % bits.len();
    bits.iter().skip(shift).chain(bits.iter().take(shift)).collect()
}
