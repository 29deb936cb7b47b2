// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The DTS elementary-stream packetizer.

use cadenza_core::errors::{limit_error, Result};
use cadenza_core::formats::{PacketFlags, Packetizer, StreamSink};

use log::{debug, warn};

use crate::common::*;
use crate::header::{parse_core_frame, parse_exss_frame, FrameInfo};

/// The length in bytes of a sync word.
const SYNC_LEN: usize = 4;

/// The number of Extension Substream header bytes captured after the sync word.
const EXSS_HEADER_LEN: usize = 6;

/// Options for a [`DtsPacketizer`].
#[derive(Clone, Debug, Default)]
pub struct DtsOptions {
    /// The language of the stream, carried through into the announced format.
    pub language: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    FindingFirstSync,
    FindingSubsequentSync,
    CheckingExssHeader,
    ReadingExss,
    CopyingFrame,
}

/// Fixed-capacity frame re-assembly buffer.
struct FrameBuffer {
    buf: Box<[u8]>,
    len: usize,
}

impl FrameBuffer {
    fn new() -> Self {
        FrameBuffer { buf: vec![0; MAX_FRAME_LEN].into_boxed_slice(), len: 0 }
    }

    /// Append one byte, or fail if the frame would exceed the maximum frame length.
    fn push(&mut self, byte: u8) -> Result<()> {
        if self.len == self.buf.len() {
            return limit_error("dts: maximum frame length exceeded");
        }

        self.buf[self.len] = byte;
        self.len += 1;

        Ok(())
    }

    /// Replace the contents with `bytes`.
    fn restart(&mut self, bytes: &[u8]) {
        self.buf[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
    }

    /// Drop the first `len` bytes, keeping the tail.
    fn shift_out(&mut self, len: usize) {
        self.buf.copy_within(len..self.len, 0);
        self.len -= len;
    }

    fn clear(&mut self) {
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Accumulates the substream index of consecutive Extension Substream headers within one frame.
struct ExssIndexQueue {
    ids: [u8; MAX_EXSS_IDS],
    len: usize,
}

impl ExssIndexQueue {
    fn new() -> Self {
        ExssIndexQueue { ids: [0; MAX_EXSS_IDS], len: 0 }
    }

    fn push(&mut self, id: u8) -> Result<()> {
        if self.len == MAX_EXSS_IDS {
            return limit_error("dts: too many extension substreams in one frame");
        }

        self.ids[self.len] = id;
        self.len += 1;

        Ok(())
    }

    fn clear(&mut self) {
        self.len = 0;
    }

    /// Keep only the newest index. It belongs to the frame that starts at the boundary.
    fn keep_last(&mut self) {
        self.ids[0] = self.ids[self.len - 1];
        self.len = 1;
    }

    /// True when the newest index repeats the oldest, marking a standalone frame boundary.
    fn is_boundary(&self) -> bool {
        self.len >= 2 && self.ids[self.len - 1] == self.ids[0]
    }
}

/// Streaming packetizer for DTS elementary streams.
///
/// One `DtsPacketizer` owns the re-assembly state of one elementary stream. Byte chunks of any
/// size are fed through [`Packetizer::consume`]; whole frames are forwarded to the owned
/// [`StreamSink`] in input order together with their presentation time. The stream format is
/// decoded from the first complete frame and announced exactly once per stream lifetime.
///
/// Malformed input never fails the caller: undecodable or oversized frames are dropped with a
/// warning and the packetizer re-synchronizes at the next sync word.
pub struct DtsPacketizer<S: StreamSink> {
    sink: S,
    language: Option<String>,
    state: State,
    frame: FrameBuffer,
    /// Rolling window of the last four input bytes, oldest in the most significant byte.
    sync_word: u32,
    /// The sync word that opened the frame being assembled. Meaningless until the first frame
    /// begins.
    first_sync: SyncKind,
    frame_kind: FrameKind,
    exss_header: [u8; EXSS_HEADER_LEN],
    exss_header_len: usize,
    exss_ids: ExssIndexQueue,
    /// Format and timing from the first successfully decoded header. `Some` once the format has
    /// been announced.
    info: Option<FrameInfo>,
    pts_us: i64,
}

impl<S: StreamSink> DtsPacketizer<S> {
    /// Instantiate a packetizer forwarding re-assembled frames to `sink`.
    pub fn new(options: DtsOptions, sink: S) -> Self {
        DtsPacketizer {
            sink,
            language: options.language,
            state: State::FindingFirstSync,
            frame: FrameBuffer::new(),
            sync_word: 0,
            first_sync: SyncKind::CoreBe16,
            frame_kind: FrameKind::StandaloneCore,
            exss_header: [0; EXSS_HEADER_LEN],
            exss_header_len: 0,
            exss_ids: ExssIndexQueue::new(),
            info: None,
            pts_us: 0,
        }
    }

    /// Consume the packetizer and return the owned sink.
    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Shift one byte into the sync register and classify the result.
    fn shift(&mut self, byte: u8) -> Option<SyncKind> {
        self.sync_word = (self.sync_word << 8) | u32::from(byte);
        SyncKind::from_word(self.sync_word)
    }

    /// Discard the frame being assembled and restart the sync search from scratch.
    fn restart_sync_search(&mut self) {
        self.state = State::FindingFirstSync;
        self.frame.clear();
        self.exss_header_len = 0;
        self.exss_ids.clear();
    }

    /// Seed the frame buffer with the sync word in the register and begin assembling a frame.
    fn begin_frame(&mut self, kind: SyncKind) {
        self.frame.restart(&self.sync_word.to_be_bytes());
        self.first_sync = kind;
        self.exss_header_len = 0;
        self.exss_ids.clear();

        if kind.is_exss() {
            // Provisional: revised if a Core sync precedes the next ExSS sync.
            self.frame_kind = FrameKind::StandaloneExss;
            self.state = State::CheckingExssHeader;
        }
        else {
            self.frame_kind = FrameKind::StandaloneCore;
            self.state = State::FindingSubsequentSync;
        }
    }

    fn find_first_sync(&mut self, chunk: &[u8], pos: &mut usize) {
        while *pos < chunk.len() {
            let byte = chunk[*pos];
            *pos += 1;

            if let Some(kind) = self.shift(byte) {
                debug!("dts: first sync {:#010x}", self.sync_word);
                self.begin_frame(kind);
                return;
            }
        }
    }

    fn find_subsequent_sync(&mut self, chunk: &[u8], pos: &mut usize) {
        while *pos < chunk.len() {
            let byte = chunk[*pos];
            *pos += 1;

            if self.frame.push(byte).is_err() {
                warn!("dts: no sync word within the maximum frame length");
                self.restart_sync_search();
                return;
            }

            let kind = match self.shift(byte) {
                Some(kind) => kind,
                None => continue,
            };

            if kind.is_exss() {
                // An ExSS sync extends a Core frame of the same endianness.
                if self.first_sync.is_core() && self.first_sync.is_le() == kind.is_le() {
                    self.frame_kind = FrameKind::CorePlusExss;
                }

                self.exss_header_len = 0;
                self.state = State::CheckingExssHeader;
                return;
            }

            if self.first_sync.is_exss() {
                warn!("dts: core sync inside an extension substream, resynchronizing");
                self.begin_frame(kind);
                return;
            }

            if kind == self.first_sync {
                self.frame_kind = FrameKind::StandaloneCore;
                self.state = State::CopyingFrame;
                return;
            }

            // A Core sync of a different storage layout is payload.
        }
    }

    fn check_exss_header(&mut self, chunk: &[u8], pos: &mut usize) {
        // Capture the first six header bytes following the sync word.
        while self.exss_header_len < EXSS_HEADER_LEN && *pos < chunk.len() {
            let byte = chunk[*pos];
            *pos += 1;

            if self.frame.push(byte).is_err() {
                warn!("dts: no sync word within the maximum frame length");
                self.restart_sync_search();
                return;
            }

            self.exss_header[self.exss_header_len] = byte;
            self.exss_header_len += 1;
        }

        if self.exss_header_len < EXSS_HEADER_LEN {
            return;
        }

        // Only the big-endian layout exposes the substream index for boundary tracking.
        if self.sync_word == SYNC_EXSS_BE16 {
            let id = (self.exss_header[1] >> 6) & 0x3;

            if self.exss_ids.push(id).is_err() {
                warn!("dts: too many extension substreams in one frame");
                self.restart_sync_search();
                return;
            }

            // A repeated substream index marks the start of the next standalone ExSS frame.
            if self.frame_kind == FrameKind::StandaloneExss && self.exss_ids.is_boundary() {
                self.exss_ids.keep_last();
                self.state = State::CopyingFrame;
                return;
            }
        }

        self.state = State::ReadingExss;
    }

    fn read_exss(&mut self, chunk: &[u8], pos: &mut usize) {
        while *pos < chunk.len() {
            let byte = chunk[*pos];
            *pos += 1;

            if self.frame.push(byte).is_err() {
                warn!("dts: no sync word within the maximum frame length");
                self.restart_sync_search();
                return;
            }

            let kind = match self.shift(byte) {
                Some(kind) => kind,
                None => continue,
            };

            if kind.is_exss() {
                self.exss_header_len = 0;
                self.state = State::CheckingExssHeader;
                return;
            }

            if self.frame_kind == FrameKind::CorePlusExss {
                // The next Core sync closes the frame.
                self.exss_ids.clear();
                self.state = State::CopyingFrame;
                return;
            }

            warn!("dts: core sync inside an extension substream, resynchronizing");
            self.first_sync = kind;
            self.state = State::FindingSubsequentSync;
            return;
        }
    }

    fn finish_frame(&mut self) {
        // The captured bytes of the next frame: its sync word, plus six header bytes when the
        // boundary was found by substream-index repetition.
        let next = match self.frame_kind {
            FrameKind::StandaloneExss => SYNC_LEN + EXSS_HEADER_LEN,
            _ => SYNC_LEN,
        };

        let frame_len = self.frame.len() - next;

        if self.info.is_none() {
            let decoded = match self.frame_kind {
                FrameKind::StandaloneExss => {
                    parse_exss_frame(&self.frame.bytes()[..frame_len], self.language.as_deref())
                }
                _ => parse_core_frame(&self.frame.bytes()[..frame_len], self.language.as_deref()),
            };

            match decoded {
                Ok(info) => {
                    debug!(
                        "dts: format {} hz, {} channels, {} samples per frame",
                        info.format.sample_rate, info.format.channels, info.sample_count
                    );

                    self.sink.announce_format(info.format.clone());
                    self.info = Some(info);
                }
                Err(err) => {
                    warn!("dts: dropping frame with undecodable header ({})", err);
                    self.continue_at_next_frame(frame_len);
                    return;
                }
            }
        }

        self.sink.sample_data(&self.frame.bytes()[..frame_len]);
        self.sink.sample_metadata(self.pts_us, PacketFlags::SYNC, frame_len, 0);

        if let Some(info) = &self.info {
            self.pts_us += info.duration_us;
        }

        self.continue_at_next_frame(frame_len);
    }

    /// Drop the finished frame, keep the already captured bytes of the next one, and resume the
    /// subsequent-sync search with the terminating sync opening the new frame.
    fn continue_at_next_frame(&mut self, frame_len: usize) {
        self.frame.shift_out(frame_len);

        if let Some(kind) = SyncKind::from_word(self.sync_word) {
            self.first_sync = kind;
        }

        self.state = State::FindingSubsequentSync;
    }
}

impl<S: StreamSink> Packetizer for DtsPacketizer<S> {
    fn packet_started(&mut self, pts_us: i64, _flags: PacketFlags) {
        self.pts_us = pts_us;
    }

    fn consume(&mut self, chunk: &[u8]) {
        let mut pos = 0;

        // A frame boundary found by the final byte of a chunk must still be emitted, hence the
        // extra condition.
        while pos < chunk.len() || self.state == State::CopyingFrame {
            match self.state {
                State::FindingFirstSync => self.find_first_sync(chunk, &mut pos),
                State::FindingSubsequentSync => self.find_subsequent_sync(chunk, &mut pos),
                State::CheckingExssHeader => self.check_exss_header(chunk, &mut pos),
                State::ReadingExss => self.read_exss(chunk, &mut pos),
                State::CopyingFrame => self.finish_frame(),
            }
        }
    }

    fn packet_finished(&mut self) {}

    fn seek(&mut self) {
        self.state = State::FindingFirstSync;
        self.frame.clear();
        self.sync_word = 0;
        self.exss_header_len = 0;
        self.exss_ids.clear();
    }
}
