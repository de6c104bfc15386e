//! MPEG-1/2 audio frame header (ISO/IEC 11172-3, 13818-3).

use crate::{FrameInfo, SyncPattern};

/// MPEG audio version from the header's version field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

/// MPEG audio layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    I,
    II,
    III,
}

/// Channel mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

/// Bitrates in kbit/s, indexed by bitrate index. Index 0 (free format) and
/// 15 (forbidden) stay zero and fail validation.
const BITRATE_V1: [[u32; 16]; 3] = [
    // Layer I
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0],
    // Layer II
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0],
    // Layer III
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0],
];

const BITRATE_V2: [[u32; 16]; 3] = [
    // Layer I
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0],
    // Layer II
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
    // Layer III
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
];

const SAMPLERATE: [[u32; 4]; 3] = [
    [44100, 48000, 32000, 0], // MPEG-1
    [22050, 24000, 16000, 0], // MPEG-2
    [11025, 12000, 8000, 0],  // MPEG-2.5
];

/// Parsed MPEG audio frame header
#[derive(Debug, Clone, Copy)]
pub struct MpegHeader {
    pub version: Version,
    pub layer: Layer,
    /// kbit/s
    pub bitrate: u32,
    /// Hz
    pub samplerate: u32,
    pub padding: bool,
    pub mode: Mode,
    /// Samples per frame
    pub samples: u32,
    /// Frame size in bytes including the header
    pub framesize: usize,
}

impl MpegHeader {
    /// Parse the 4-byte header at the start of `buf`. Returns `None` when
    /// the syncword, indices or derived rates are not a valid audio frame.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 4 {
            return None;
        }
        // 11-bit syncword
        if buf[0] != 0xFF || (buf[1] & 0xE0) != 0xE0 {
            return None;
        }

        let version = match (buf[1] >> 3) & 0x03 {
            0b11 => Version::Mpeg1,
            0b10 => Version::Mpeg2,
            0b00 => Version::Mpeg25,
            _ => return None,
        };
        let layer = match (buf[1] >> 1) & 0x03 {
            0b11 => Layer::I,
            0b10 => Layer::II,
            0b01 => Layer::III,
            _ => return None,
        };

        let bitrate_index = (buf[2] >> 4) as usize;
        let samplerate_index = ((buf[2] >> 2) & 0x03) as usize;
        let padding = (buf[2] & 0x02) != 0;
        let mode = match buf[3] >> 6 {
            0b00 => Mode::Stereo,
            0b01 => Mode::JointStereo,
            0b10 => Mode::DualChannel,
            _ => Mode::Mono,
        };

        let layer_row = match layer {
            Layer::I => 0,
            Layer::II => 1,
            Layer::III => 2,
        };
        let bitrate = match version {
            Version::Mpeg1 => BITRATE_V1[layer_row][bitrate_index],
            _ => BITRATE_V2[layer_row][bitrate_index],
        };
        let samplerate_row = match version {
            Version::Mpeg1 => 0,
            Version::Mpeg2 => 1,
            Version::Mpeg25 => 2,
        };
        let samplerate = SAMPLERATE[samplerate_row][samplerate_index];
        if bitrate == 0 || samplerate == 0 {
            return None;
        }

        let samples = match (layer, version) {
            (Layer::I, _) => 384,
            (Layer::II, _) => 1152,
            (Layer::III, Version::Mpeg1) => 1152,
            (Layer::III, _) => 576,
        };
        let framesize =
            (samples as usize / 8 * bitrate as usize * 1000) / samplerate as usize
                + padding as usize;

        Some(MpegHeader {
            version,
            layer,
            bitrate,
            samplerate,
            padding,
            mode,
            samples,
            framesize,
        })
    }

    pub fn channels(&self) -> u8 {
        if self.mode == Mode::Mono { 1 } else { 2 }
    }

    /// Frame-sync signature: the full first byte plus the version/layer
    /// bits of the second; the protection bit is masked out.
    pub fn sync_pattern(&self, buf: &[u8]) -> SyncPattern {
        SyncPattern {
            first: 0xFF,
            second: buf.get(1).copied().unwrap_or(0xF0),
            second_mask: 0xF0,
        }
    }

    pub fn frame_info(&self, buf: &[u8]) -> FrameInfo {
        FrameInfo {
            bitrate: self.bitrate,
            samplerate: self.samplerate,
            channels: self.channels(),
            sync: self.sync_pattern(buf),
        }
    }
}

impl std::fmt::Display for MpegHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let std = match self.version {
            Version::Mpeg1 => "MPEG-1",
            Version::Mpeg2 => "MPEG-2",
            Version::Mpeg25 => "MPEG-2.5",
        };
        let layer = match self.layer {
            Layer::I => 1,
            Layer::II => 2,
            Layer::III => 3,
        };
        let mode = match self.mode {
            Mode::Stereo => "Stereo",
            Mode::JointStereo => "Joint Stereo",
            Mode::DualChannel => "Dual",
            Mode::Mono => "Mono",
        };
        write!(
            f,
            "{} layer {}, {} kbps, {} Hz, {}",
            std, layer, self.bitrate, self.samplerate, mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// MPEG-1 Layer II, 192 kbit/s, 48 kHz, stereo, no padding.
    pub const L2_192_48: [u8; 4] = [0xFF, 0xFD, 0xA4, 0x00];

    #[test]
    fn test_layer2_192_48() {
        let h = MpegHeader::parse(&L2_192_48).unwrap();
        assert_eq!(h.version, Version::Mpeg1);
        assert_eq!(h.layer, Layer::II);
        assert_eq!(h.bitrate, 192);
        assert_eq!(h.samplerate, 48000);
        assert_eq!(h.mode, Mode::Stereo);
        assert_eq!(h.channels(), 2);
        assert_eq!(h.samples, 1152);
        assert_eq!(h.framesize, 576);
    }

    #[test]
    fn test_padding_extends_frame() {
        let mut hdr = L2_192_48;
        hdr[2] |= 0x02;
        let h = MpegHeader::parse(&hdr).unwrap();
        assert_eq!(h.framesize, 577);
    }

    #[test]
    fn test_bad_syncword_rejected() {
        assert!(MpegHeader::parse(&[0xFE, 0xFD, 0xB4, 0x00]).is_none());
        assert!(MpegHeader::parse(&[0xFF, 0x1D, 0xB4, 0x00]).is_none());
    }

    #[test]
    fn test_free_format_and_bad_rate_rejected() {
        // bitrate index 0
        assert!(MpegHeader::parse(&[0xFF, 0xFD, 0x04, 0x00]).is_none());
        // bitrate index 15
        assert!(MpegHeader::parse(&[0xFF, 0xFD, 0xF4, 0x00]).is_none());
        // samplerate index 3
        assert!(MpegHeader::parse(&[0xFF, 0xFD, 0xBC, 0x00]).is_none());
    }

    #[test]
    fn test_short_input_rejected() {
        assert!(MpegHeader::parse(&[0xFF, 0xFD]).is_none());
    }

    #[test]
    fn test_mpeg2_layer3() {
        // MPEG-2 (version bits 10), Layer III, bitrate index 8 (64), samplerate index 0 (22050)
        let h = MpegHeader::parse(&[0xFF, 0xF3, 0x80, 0xC0]).unwrap();
        assert_eq!(h.version, Version::Mpeg2);
        assert_eq!(h.layer, Layer::III);
        assert_eq!(h.bitrate, 64);
        assert_eq!(h.samplerate, 22050);
        assert_eq!(h.samples, 576);
        assert_eq!(h.mode, Mode::Mono);
        assert_eq!(h.channels(), 1);
    }
}
