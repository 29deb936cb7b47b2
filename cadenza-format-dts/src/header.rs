// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DTS frame-header normalization and decoding.

use std::borrow::Cow;

use cadenza_core::errors::{not_enough_bits_error, Error, Result};
use cadenza_core::formats::StreamFormat;
use cadenza_core::io::BitReaderLtr;

use crate::common::*;

/// The number of fixed Core header bits following the sync word.
const CORE_HEADER_BITS: u64 = 55;

/// The timing and format information decoded from one frame header.
#[derive(Clone, Debug)]
pub struct FrameInfo {
    /// The stream format to announce.
    pub format: StreamFormat,
    /// The number of samples per channel in one frame.
    pub sample_count: u32,
    /// The presentation duration of one frame in microseconds.
    pub duration_us: i64,
}

/// Convert a frame window into the canonical 16-bit big-endian layout.
///
/// Little-endian layouts are byte-swapped pairwise, and 14-bit packed layouts are densified by
/// dropping the two most significant bits of every 16-bit word and concatenating the remaining
/// 14-bit groups. A window that is already canonical is returned borrowed. At most one scratch
/// copy the size of the window is made.
pub fn normalize_header(window: &[u8]) -> Cow<'_, [u8]> {
    // A 16-bit big-endian Core window is already canonical.
    if window.first() == Some(&0x7f) {
        return Cow::Borrowed(window);
    }

    // The first byte of any little-endian layout: 16-bit Core, 14-bit Core, or ExSS.
    let le = matches!(window.first(), Some(&(0xfe | 0xff | 0x58)));

    let mut data: Cow<'_, [u8]> = if le {
        let mut swapped = window.to_vec();

        for pair in swapped.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }

        Cow::Owned(swapped)
    }
    else {
        Cow::Borrowed(window)
    };

    // After any swap, a 14-bit packed window starts with the first 14-bit sync byte. Re-pack it
    // in place: the output never catches up with the read position.
    if data.first() == Some(&0x1f) {
        let buf = data.to_mut();
        let n = buf.len() & !1;

        let mut acc = 0u32;
        let mut acc_bits = 0;
        let mut len = 0;

        for i in (0..n).step_by(2) {
            acc = (acc << 14) | u32::from(u16::from_be_bytes([buf[i], buf[i + 1]]) & 0x3fff);
            acc_bits += 14;

            while acc_bits >= 8 {
                acc_bits -= 8;
                buf[len] = (acc >> acc_bits) as u8;
                len += 1;
            }
        }

        buf.truncate(len);
    }

    data
}

/// Decode the header of a Core substream frame.
pub fn parse_core_frame(frame: &[u8], language: Option<&str>) -> Result<FrameInfo> {
    let window = normalize_header(frame);

    let mut bs = BitReaderLtr::new(&window);

    // Sync word.
    bs.ignore_bits(32)?;

    if bs.bits_left() < CORE_HEADER_BITS {
        return not_enough_bits_error();
    }

    // Frame type, deficit sample count, and CRC presence.
    bs.ignore_bits(7)?;

    // Number of PCM sample blocks, 32 samples per channel each.
    let nblks = bs.read_bits_leq32(7)?;
    let sample_count = (nblks + 1) * 32;

    // Primary frame size in bytes, informational only.
    let _fsize = bs.read_bits_leq32(14)? + 1;

    // Audio channel arrangement.
    let amode = bs.read_bits_leq32(6)? as usize;

    // Core sample frequency.
    let sfreq = bs.read_bits_leq32(4)? as usize;

    // Bit rate, mixing, and embedded-extension flags.
    bs.ignore_bits(15)?;

    // Low frequency effects flag. A non-zero value adds the LFE channel.
    let lff = bs.read_bits_leq32(2)?;

    let mut channels = CORE_CHANNEL_COUNTS.get(amode).copied().unwrap_or(0);

    if lff != 0 {
        channels += 1;
    }

    Ok(make_frame_info(CORE_SAMPLE_RATES[sfreq], channels, sample_count, language))
}

/// Decode the header of an Extension Substream frame.
pub fn parse_exss_frame(frame: &[u8], language: Option<&str>) -> Result<FrameInfo> {
    let window = normalize_header(frame);

    let mut bs = BitReaderLtr::new(&window);

    // Sync word and user-defined bits.
    bs.ignore_bits(32 + 8)?;

    let ext_ss_index = bs.read_bits_leq32(2)?;

    // The wide header form widens the header-size field to 12 bits and the per-asset frame-size
    // fields to 20 bits.
    let wide = bs.read_bit()?;
    let (header_size_bits, asset_size_bits) = if wide { (12, 20) } else { (8, 16) };

    let _header_size = bs.read_bits_leq32(header_size_bits)? + 1;
    let _frame_size = bs.read_bits_leq32(asset_size_bits)? + 1;

    let (sample_rate, channels, sample_count) = if bs.read_bit()? {
        match read_static_fields(&mut bs, ext_ss_index, asset_size_bits) {
            Ok(fields) => fields,
            // A truncated static-fields region is tolerated; the derived-value rules below
            // substitute the defaults.
            Err(Error::NotEnoughBits) => (0, 0, 0),
            Err(err) => return Err(err),
        }
    }
    else {
        (48000, 8, 0)
    };

    Ok(make_frame_info(sample_rate, channels, sample_count, language))
}

/// Read the ExSS static fields and the leading asset descriptor, returning the sample rate,
/// channel count, and samples per frame.
fn read_static_fields(
    bs: &mut BitReaderLtr<'_>,
    ext_ss_index: u32,
    asset_size_bits: u32,
) -> Result<(u32, u32, u32)> {
    let ref_clock = REF_CLOCKS[bs.read_bits_leq32(2)? as usize];

    // Frame duration in reference clock periods.
    let frame_duration = 512 * (bs.read_bits_leq32(3)? + 1);

    if bs.read_bit()? {
        // Timestamp.
        bs.ignore_bits(36)?;
    }

    let num_audio = bs.read_bits_leq32(3)? as usize + 1;
    let num_assets = bs.read_bits_leq32(3)? as usize + 1;

    // One active-substream mask per audio presentation.
    let mut active_masks = [0u32; 8];

    for mask in active_masks.iter_mut().take(num_audio) {
        *mask = bs.read_bits_leq32(ext_ss_index + 1)?;
    }

    // One active-asset mask per selected substream of every audio presentation.
    for mask in active_masks.iter().take(num_audio) {
        for substream in 0..=ext_ss_index {
            if mask & (1 << substream) != 0 {
                bs.ignore_bits(8)?;
            }
        }
    }

    if bs.read_bit()? {
        // Mixing metadata: adjustment level, then one speaker mask per mix output configuration.
        bs.ignore_bits(2)?;

        let mask_bits = (bs.read_bits_leq32(2)? + 1) << 2;
        let num_mix_configs = bs.read_bits_leq32(2)? as usize + 1;

        for _ in 0..num_mix_configs {
            bs.ignore_bits(mask_bits)?;
        }
    }

    // Per-asset frame-size table.
    bs.ignore_bits(num_assets as u32 * asset_size_bits)?;

    // Only the first asset contributes format information.
    let _descriptor_len = bs.read_bits_leq32(9)? + 1;
    let _asset_index = bs.read_bits_leq32(3)?;

    if bs.read_bit()? {
        // Asset type descriptor.
        bs.ignore_bits(4)?;
    }

    if bs.read_bit()? {
        // Language descriptor.
        bs.ignore_bits(24)?;
    }

    if bs.read_bit()? {
        // Additional textual information.
        let len = bs.read_bits_leq32(10)? + 1;
        bs.ignore_bits(len * 8)?;
    }

    // Bit resolution.
    bs.ignore_bits(5)?;

    let sample_rate = EXSS_SAMPLE_RATES[bs.read_bits_leq32(4)? as usize];
    let channels = bs.read_bits_leq32(8)? + 1;

    let sample_count = frame_duration * (sample_rate / ref_clock);

    Ok((sample_rate, channels, sample_count))
}

/// Apply the derived-value rules and assemble the frame information.
fn make_frame_info(
    sample_rate: u32,
    channels: u32,
    sample_count: u32,
    language: Option<&str>,
) -> FrameInfo {
    // Partial layouts render to the nearest of stereo, 5.1, or 7.1.
    let channels = match channels {
        2 | 6 | 8 => channels,
        n if n < 6 => 6,
        _ => 8,
    };

    let sample_rate = if sample_rate == 0 { 48000 } else { sample_rate };

    let duration_us = i64::from(sample_count) * 1_000_000 / i64::from(sample_rate);

    FrameInfo {
        format: StreamFormat {
            codec_tag: DTS_CODEC_TAG,
            sample_rate,
            channels,
            frame_samples: sample_count,
            bits_per_sample: 16,
            max_frame_len: MAX_FRAME_LEN,
            language: language.map(str::to_string),
        },
        sample_count,
        duration_us,
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use cadenza_core::errors::Error;

    use super::{normalize_header, parse_core_frame, parse_exss_frame};
    use crate::testutil::{core_frame, exss_frame, pack_14bit, swap_pairs, BitWriter};

    #[test]
    fn verify_normalize_be16_passthrough() {
        let window = [0x7f, 0xfe, 0x80, 0x01, 0xab, 0xcd];

        assert!(matches!(normalize_header(&window), Cow::Borrowed(w) if w == &window[..]));
    }

    #[test]
    fn verify_normalize_exss_passthrough() {
        let window = [0x64, 0x58, 0x20, 0x25, 0xab, 0xcd];

        assert!(matches!(normalize_header(&window), Cow::Borrowed(w) if w == &window[..]));
    }

    #[test]
    fn verify_normalize_le16() {
        let window = [0xfe, 0x7f, 0x01, 0x80, 0xcd, 0xab];
        let canonical = [0x7f, 0xfe, 0x80, 0x01, 0xab, 0xcd];

        assert_eq!(normalize_header(&window).as_ref(), &canonical[..]);
    }

    #[test]
    fn verify_normalize_exss_le16() {
        let window = [0x58, 0x64, 0x25, 0x20, 0xcd, 0xab];
        let canonical = [0x64, 0x58, 0x20, 0x25, 0xab, 0xcd];

        assert_eq!(normalize_header(&window).as_ref(), &canonical[..]);
    }

    // 0x7ffe8001abcdef sliced into 14-bit groups and sign-extended into 16-bit words yields
    // 0x1fff, 0xe800, 0x06af, 0x0def. The first two words reproduce the raw 14-bit sync bytes.
    #[test]
    fn verify_normalize_be14() {
        let window = [0x1f, 0xff, 0xe8, 0x00, 0x06, 0xaf, 0x0d, 0xef];
        let canonical = [0x7f, 0xfe, 0x80, 0x01, 0xab, 0xcd, 0xef];

        assert_eq!(normalize_header(&window).as_ref(), &canonical[..]);
    }

    #[test]
    fn verify_normalize_le14() {
        let window = [0xff, 0x1f, 0x00, 0xe8, 0xaf, 0x06, 0xef, 0x0d];
        let canonical = [0x7f, 0xfe, 0x80, 0x01, 0xab, 0xcd, 0xef];

        assert_eq!(normalize_header(&window).as_ref(), &canonical[..]);
    }

    #[test]
    fn verify_parse_core_frame() {
        // 48 kHz stereo, 6 blocks of 32 samples.
        let frame = core_frame(2048, 5, 1, 13, 0);

        let info = parse_core_frame(&frame, Some("eng")).unwrap();

        assert_eq!(info.format.sample_rate, 48000);
        assert_eq!(info.format.channels, 2);
        assert_eq!(info.format.frame_samples, 192);
        assert_eq!(info.format.bits_per_sample, 16);
        assert_eq!(info.format.language.as_deref(), Some("eng"));
        assert_eq!(info.sample_count, 192);
        assert_eq!(info.duration_us, 4000);
    }

    #[test]
    fn verify_parse_core_frame_channel_rendering() {
        // 2/1 surround plus LFE renders to 5.1.
        let info = parse_core_frame(&core_frame(1024, 7, 5, 13, 2), None).unwrap();

        assert_eq!(info.format.channels, 6);
        assert_eq!(info.format.frame_samples, 256);

        // Mono renders to 5.1 as well.
        let info = parse_core_frame(&core_frame(1024, 7, 0, 8, 0), None).unwrap();

        assert_eq!(info.format.channels, 6);
        assert_eq!(info.format.sample_rate, 44100);
    }

    #[test]
    fn verify_parse_core_frame_reserved_rate() {
        // A reserved sample-rate index falls back to 48 kHz.
        let info = parse_core_frame(&core_frame(1024, 7, 1, 0, 0), None).unwrap();

        assert_eq!(info.format.sample_rate, 48000);
    }

    #[test]
    fn verify_parse_core_frame_14bit() {
        let frame = pack_14bit(&core_frame(112, 5, 1, 13, 0));

        let info = parse_core_frame(&frame, None).unwrap();

        assert_eq!(info.format.sample_rate, 48000);
        assert_eq!(info.format.channels, 2);
        assert_eq!(info.sample_count, 192);
        assert_eq!(info.duration_us, 4000);
    }

    #[test]
    fn verify_parse_core_frame_le16() {
        let frame = swap_pairs(&core_frame(2048, 5, 1, 13, 0));

        let info = parse_core_frame(&frame, None).unwrap();

        assert_eq!(info.format.sample_rate, 48000);
        assert_eq!(info.format.channels, 2);
        assert_eq!(info.duration_us, 4000);
    }

    #[test]
    fn verify_parse_core_frame_not_enough_bits() {
        let frame = core_frame(2048, 5, 1, 13, 0);

        assert!(matches!(parse_core_frame(&frame[..8], None), Err(Error::NotEnoughBits)));
    }

    #[test]
    fn verify_parse_exss_frame() {
        // 48 kHz reference clock, 2048 samples, 5 coded channels rendering to 5.1.
        let frame = exss_frame(256, 0);

        let info = parse_exss_frame(&frame, None).unwrap();

        assert_eq!(info.format.sample_rate, 48000);
        assert_eq!(info.format.channels, 6);
        assert_eq!(info.format.frame_samples, 2048);
        assert_eq!(info.sample_count, 2048);
        assert_eq!(info.duration_us, 42666);
    }

    #[test]
    fn verify_parse_exss_frame_no_static_fields() {
        let mut bw = BitWriter::new();

        bw.push(super::SYNC_EXSS_BE16, 32);
        bw.push(0, 8); // user defined
        bw.push(0, 2); // extension substream index
        bw.push(0, 1); // narrow header form
        bw.push(31, 8); // header size - 1
        bw.push(255, 16); // frame size - 1
        bw.push(0, 1); // no static fields

        let mut frame = bw.finish();
        frame.resize(64, 0);

        let info = parse_exss_frame(&frame, None).unwrap();

        assert_eq!(info.format.sample_rate, 48000);
        assert_eq!(info.format.channels, 8);
        assert_eq!(info.sample_count, 0);
        assert_eq!(info.duration_us, 0);
    }

    #[test]
    fn verify_parse_exss_frame_truncated_static_fields() {
        let mut bw = BitWriter::new();

        bw.push(super::SYNC_EXSS_BE16, 32);
        bw.push(0, 8); // user defined
        bw.push(0, 2); // extension substream index
        bw.push(0, 1); // narrow header form
        bw.push(31, 8); // header size - 1
        bw.push(255, 16); // frame size - 1
        bw.push(1, 1); // static fields present
        bw.push(2, 2); // reference clock code

        // The frame ends before the static fields do; the decode completes with the defaults.
        let info = parse_exss_frame(&bw.finish(), None).unwrap();

        assert_eq!(info.format.sample_rate, 48000);
        assert_eq!(info.format.channels, 6);
        assert_eq!(info.sample_count, 0);
    }

    #[test]
    fn verify_parse_exss_frame_truncated_prefix() {
        let frame = exss_frame(256, 0);

        assert!(matches!(parse_exss_frame(&frame[..6], None), Err(Error::NotEnoughBits)));
    }
}
