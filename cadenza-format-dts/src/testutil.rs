// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test-only helpers for assembling DTS frames bit-by-bit.

use cadenza_core::io::BitReaderLtr;

use crate::common::{SYNC_CORE_BE16, SYNC_EXSS_BE16};

/// Writes MSB-first bit fields into a byte vector.
pub struct BitWriter {
    bytes: Vec<u8>,
    bit: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter { bytes: Vec::new(), bit: 0 }
    }

    /// Append the low `width` bits of `value`, most significant first.
    pub fn push(&mut self, value: u32, mut width: u32) {
        while width > 0 {
            if self.bit == 0 {
                self.bytes.push(0);
            }

            let free = 8 - self.bit;
            let take = free.min(width);
            let bits = (value >> (width - take)) & ((1 << take) - 1);

            let last = self.bytes.last_mut().unwrap();
            *last |= (bits as u8) << (free - take);

            self.bit = (self.bit + take) % 8;
            width -= take;
        }
    }

    /// Return the written bytes, the last one zero-padded.
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Assemble a canonical 16-bit big-endian Core frame of `len` bytes: sync word, header fields,
/// and zero padding.
pub fn core_frame(len: usize, nblks: u32, amode: u32, sfreq: u32, lff: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();

    bw.push(SYNC_CORE_BE16, 32);
    bw.push(1, 1); // normal frame
    bw.push(31, 5); // no deficit samples
    bw.push(0, 1); // no CRC
    bw.push(nblks, 7);
    bw.push(len as u32 - 1, 14); // frame size - 1
    bw.push(amode, 6);
    bw.push(sfreq, 4);
    bw.push(0, 15); // bit rate and flags
    bw.push(lff, 2);

    let mut bytes = bw.finish();
    bytes.resize(len, 0);
    bytes
}

/// Assemble a 16-bit big-endian ExSS frame of `len` bytes carrying one audio presentation and
/// one asset at 48 kHz with 5 coded channels and 2048 samples per frame.
pub fn exss_frame(len: usize, ext_ss_index: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();

    bw.push(SYNC_EXSS_BE16, 32);
    bw.push(0, 8); // user defined
    bw.push(ext_ss_index, 2);
    bw.push(0, 1); // narrow header form
    bw.push(31, 8); // header size - 1
    bw.push(len as u32 - 1, 16); // frame size - 1
    bw.push(1, 1); // static fields present
    bw.push(2, 2); // reference clock: 48 kHz
    bw.push(3, 3); // frame duration: 512 * 4
    bw.push(0, 1); // no timestamp
    bw.push(0, 3); // one audio presentation
    bw.push(0, 3); // one asset
    bw.push(1, ext_ss_index + 1); // active-substream mask: substream 0
    bw.push(0, 8); // active-asset mask
    bw.push(0, 1); // no mixing metadata
    bw.push(0, 16); // asset frame-size table
    bw.push(63, 9); // asset descriptor size - 1
    bw.push(0, 3); // asset index
    bw.push(0, 1); // no type descriptor
    bw.push(0, 1); // no language descriptor
    bw.push(0, 1); // no info text
    bw.push(0, 5); // bit resolution
    bw.push(12, 4); // sample rate: 48 kHz
    bw.push(4, 8); // channels - 1

    let mut bytes = bw.finish();
    bytes.resize(len, 0);
    bytes
}

/// Swap every adjacent byte pair, converting a canonical frame into its little-endian layout.
pub fn swap_pairs(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();

    for pair in out.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }

    out
}

/// Spread a canonical bitstream into 14-bit packed big-endian words. Each 14-bit group is
/// sign-extended to 16 bits, reproducing the raw `1f ff e8 00` sync byte pattern.
pub fn pack_14bit(data: &[u8]) -> Vec<u8> {
    let mut reader = BitReaderLtr::new(data);
    let mut out = Vec::with_capacity(data.len() * 8 / 7 + 2);

    while reader.bits_left() >= 14 {
        let group = reader.read_bits_leq32(14).unwrap() as u16;
        let word = if group & 0x2000 != 0 { group | 0xc000 } else { group };

        out.extend_from_slice(&word.to_be_bytes());
    }

    out
}
