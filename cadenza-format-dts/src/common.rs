// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sync words, lookup tables, and classification helpers shared by the DTS frame layouts.

/// Sync word of a 16-bit big-endian Core substream.
pub const SYNC_CORE_BE16: u32 = 0x7ffe_8001;

/// Sync word of a 14-bit packed big-endian Core substream.
pub const SYNC_CORE_BE14: u32 = 0x1fff_e800;

/// Sync word of a 16-bit little-endian Core substream.
pub const SYNC_CORE_LE16: u32 = 0xfe7f_0180;

/// Sync word of a 14-bit packed little-endian Core substream.
pub const SYNC_CORE_LE14: u32 = 0xff1f_00e8;

/// Sync word of a 16-bit big-endian Extension Substream.
pub const SYNC_EXSS_BE16: u32 = 0x6458_2025;

/// Sync word of a 16-bit little-endian Extension Substream.
pub const SYNC_EXSS_LE16: u32 = 0x5864_2520;

/// The maximum length in bytes of one assembled frame.
pub const MAX_FRAME_LEN: usize = 32768;

/// The maximum number of Extension Substream indices accumulated within one frame.
pub const MAX_EXSS_IDS: usize = 4;

/// The private codec tag of DTS audio.
pub const DTS_CODEC_TAG: &str = "dtsc";

/// The MIME type of DTS audio.
pub const DTS_MIME_TYPE: &str = "audio/vnd.dts";

/// Channel counts indexed by the Core `AMODE` field, excluding the LFE channel.
pub const CORE_CHANNEL_COUNTS: [u32; 10] = [1, 2, 2, 2, 2, 3, 3, 4, 4, 5];

/// Sample rates in Hz indexed by the Core `SFREQ` field. Zero marks a reserved index.
pub const CORE_SAMPLE_RATES: [u32; 16] =
    [0, 8000, 16000, 32000, 0, 0, 11025, 22050, 44100, 0, 0, 12000, 24000, 48000, 0, 0];

/// Sample rates in Hz indexed by the ExSS asset sample-rate field.
pub const EXSS_SAMPLE_RATES: [u32; 16] = [
    8000, 16000, 32000, 64000, 128000, 22050, 44100, 88200, 176400, 352800, 12000, 24000, 48000,
    96000, 192000, 384000,
];

/// Reference clock rates in Hz indexed by the ExSS `RefClockCode` field. The last index is
/// reserved.
pub const REF_CLOCKS: [u32; 4] = [32000, 44100, 48000, u32::MAX];

/// The substream and storage layout identified by a sync word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncKind {
    /// 16-bit big-endian Core substream.
    CoreBe16,
    /// 16-bit little-endian Core substream.
    CoreLe16,
    /// 14-bit packed big-endian Core substream.
    CoreBe14,
    /// 14-bit packed little-endian Core substream.
    CoreLe14,
    /// 16-bit big-endian Extension Substream.
    ExssBe16,
    /// 16-bit little-endian Extension Substream.
    ExssLe16,
}

impl SyncKind {
    /// Classify a 32-bit sync register value, returning `None` for anything that is not a sync
    /// word.
    pub fn from_word(word: u32) -> Option<SyncKind> {
        match word {
            SYNC_CORE_BE16 => Some(SyncKind::CoreBe16),
            SYNC_CORE_LE16 => Some(SyncKind::CoreLe16),
            SYNC_CORE_BE14 => Some(SyncKind::CoreBe14),
            SYNC_CORE_LE14 => Some(SyncKind::CoreLe14),
            SYNC_EXSS_BE16 => Some(SyncKind::ExssBe16),
            SYNC_EXSS_LE16 => Some(SyncKind::ExssLe16),
            _ => None,
        }
    }

    /// Returns true if this is a Core substream sync word.
    pub fn is_core(&self) -> bool {
        !self.is_exss()
    }

    /// Returns true if this is an Extension Substream sync word.
    pub fn is_exss(&self) -> bool {
        matches!(self, SyncKind::ExssBe16 | SyncKind::ExssLe16)
    }

    /// Returns true if the substream is stored little-endian.
    pub fn is_le(&self) -> bool {
        matches!(self, SyncKind::CoreLe16 | SyncKind::CoreLe14 | SyncKind::ExssLe16)
    }
}

/// The combination of substreams making up one audio frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// A lone Core substream.
    StandaloneCore,
    /// A lone Extension Substream.
    StandaloneExss,
    /// A Core substream followed by one or more Extension Substreams.
    CorePlusExss,
}
