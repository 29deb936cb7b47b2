// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Packetizer for DTS elementary audio streams.
//!
//! A DTS elementary stream is a sequence of audio frames, each introduced by a 32-bit sync word.
//! A frame is either a legacy Core substream, an Extension Substream (ExSS), or a Core substream
//! extended by one or more ExSS. Core substreams additionally come in four storage layouts:
//! 16-bit or 14-bit packed words, each big- or little-endian.
//!
//! [`DtsPacketizer`] re-assembles whole frames from chunked byte input, decodes the first frame's
//! header to announce a [`StreamFormat`][cadenza_core::formats::StreamFormat], and forwards each
//! frame payload with its presentation time to a [`StreamSink`][cadenza_core::formats::StreamSink].

mod common;
mod header;
mod packetizer;

#[cfg(test)]
mod testutil;

pub use common::{DTS_CODEC_TAG, DTS_MIME_TYPE};
pub use packetizer::{DtsOptions, DtsPacketizer};
