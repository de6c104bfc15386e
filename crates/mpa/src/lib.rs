//! Audio elementary-stream frame headers.
//!
//! Decoders for the frame headers this demultiplexer can lock onto:
//! MPEG-1/2 Layer I-III, AAC with ADTS transport, AC-3, and the magic-byte
//! matcher for HE-AAC LATM (which carries no self-describing header).
//! All parsers take an immutable byte slice and return `None` for anything
//! that is not a valid header; they never panic on short input.

pub mod ac3;
pub mod adts;
pub mod latm;
pub mod mpeg;

pub use ac3::Ac3Header;
pub use adts::AdtsHeader;
pub use latm::LatmSync;
pub use mpeg::MpegHeader;

/// The audio carriage selected from the PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioKind {
    /// MPEG-1/2 Layer I-III
    Mpeg,
    /// MPEG-2/4 AAC with ADTS headers
    AacAdts,
    /// HE-AAC in LATM/LOAS transport
    HeAacLatm,
    /// AC-3 (Dolby Digital)
    Ac3,
}

impl AudioKind {
    /// MIME type announced for the output stream
    pub fn mime(&self) -> &'static str {
        match self {
            AudioKind::Mpeg => "audio/mpeg",
            AudioKind::AacAdts => "audio/aac",
            AudioKind::HeAacLatm => "audio/aacp",
            AudioKind::Ac3 => "audio/ac3",
        }
    }
}

/// Two-byte frame-sync signature, captured when the stream first syncs.
///
/// The RDS scanner uses it to find audio frame starts inside a payload
/// chunk; the mask on the second byte absorbs the header bits that vary
/// from frame to frame (padding, private bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPattern {
    pub first: u8,
    pub second: u8,
    pub second_mask: u8,
}

impl SyncPattern {
    pub fn matches(&self, b0: u8, b1: u8) -> bool {
        b0 == self.first && (b1 & self.second_mask) == (self.second & self.second_mask)
    }
}

/// What the extractor needs to know about a freshly synced stream.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    /// Bitrate in kbit/s, 0 when the header does not carry one
    pub bitrate: u32,
    /// Samplerate in Hz
    pub samplerate: u32,
    /// Channel count
    pub channels: u8,
    /// Frame-sync signature for this stream
    pub sync: SyncPattern,
}
