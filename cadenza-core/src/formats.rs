// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `formats` module declares the stream format description and the traits connecting an
//! elementary-stream packetizer to its upstream container demuxer and downstream sink.

use bitflags::bitflags;

bitflags! {
    /// Flags describing a container packet or an emitted sample.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PacketFlags: u32 {
        /// The data starts at a stream synchronization point.
        const SYNC = 0x1;
    }
}

/// A description of an elementary audio stream.
///
/// A `StreamFormat` is a value type. Once announced to a [`StreamSink`] it is never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFormat {
    /// The private codec tag identifying the encoding.
    pub codec_tag: &'static str,
    /// The sample rate of the audio in Hz.
    pub sample_rate: u32,
    /// The number of audio channels.
    pub channels: u32,
    /// The number of samples per channel in one frame.
    pub frame_samples: u32,
    /// The number of bits per decoded audio sample.
    pub bits_per_sample: u32,
    /// The maximum length in bytes of one frame.
    pub max_frame_len: usize,
    /// The language of the stream, if known.
    pub language: Option<String>,
}

/// `StreamSink` receives the output of a [`Packetizer`].
///
/// For every re-assembled frame, `sample_data` is called one or more times, followed by exactly
/// one `sample_metadata` call finalizing the frame. `announce_format` is called at most once per
/// stream lifetime, always before the first frame is finalized.
pub trait StreamSink {
    /// Announce the format of the stream.
    fn announce_format(&mut self, format: StreamFormat);

    /// Append payload bytes belonging to the current frame.
    fn sample_data(&mut self, data: &[u8]);

    /// Finalize the current frame with its presentation time in microseconds, flags, total
    /// length in bytes, and byte offset of the frame start within the appended data.
    fn sample_metadata(&mut self, pts_us: i64, flags: PacketFlags, len: usize, offset: usize);
}

/// A `Packetizer` re-assembles the frames of one elementary stream from the arbitrarily chunked
/// byte stream supplied by a container demuxer.
pub trait Packetizer {
    /// Start a new container packet with the given presentation timestamp in microseconds.
    fn packet_started(&mut self, pts_us: i64, flags: PacketFlags);

    /// Consume one chunk of elementary stream data.
    ///
    /// `consume` never fails. Malformed data is dropped and the packetizer re-synchronizes at
    /// the next sync word.
    fn consume(&mut self, chunk: &[u8]);

    /// Signal the end of the current container packet.
    fn packet_finished(&mut self);

    /// Discard any partially assembled frame ahead of a stream discontinuity.
    fn seek(&mut self);
}
