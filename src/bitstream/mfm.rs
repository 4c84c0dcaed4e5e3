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

    src/bitstream/mfm.rs

    MFM encoding of byte data into bitcells.
*/
use bit_vec::BitVec;

/// MFM-encode `data`, producing two bitcells per data bit, MSB first.
///
/// A 1 data bit is encoded as `01`. A 0 data bit is encoded as `10` if the previous data bit was
/// 0, otherwise `00`. `prev_bit` supplies the data bit preceding the first byte.
pub fn encode(data: &[u8], prev_bit: bool) -> BitVec {
    let mut bitvec = BitVec::with_capacity(data.len() * 16);
    let mut previous_bit = prev_bit;

    for &byte in data {
        for i in 0..8 {
            let bit = (byte & (0x80 >> i)) != 0;
            if bit {
                // 1 is encoded as 01
                bitvec.push(false);
                bitvec.push(true);
            }
            else {
                // 0 is encoded as 10 if previous bit was 0, otherwise 00
                bitvec.push(!previous_bit);
                bitvec.push(false);
            }
            previous_bit = bit;
        }
    }

    bitvec
}

/// Re-encode a bitstream at double rate by MFM-encoding its bits as data.
/// The result holds exactly twice as many bits as `bits`.
pub fn double_rate(bits: &BitVec) -> BitVec {
    let mut doubled = encode(&bits.to_bytes(), false);
    doubled.truncate(bits.len() * 2);
    doubled
}
