use crc::{CRC_16_IBM_3740, Crc};
use tracing::trace;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Maximum RDS message size
pub const MAX_MESSAGE: usize = 255;

/// Reassembles RDS messages from a byte stream.
///
/// The caller feeds bytes in logical order (the scanner already undoes the
/// per-frame reversal). 0xFE starts a message, 0xFF ends it, and 0xFD is
/// an escape prefix so both markers can appear as data: 0xFD 0x01 decodes
/// to 0xFE and 0xFD 0x02 to 0xFF. The escape state survives chunk
/// boundaries because a pair can straddle two audio frames.
///
/// A completed message is only surfaced when the CRC-16 over all of it
/// (payload plus trailing big-endian CRC) comes out zero; everything else
/// is discarded without a word.
pub struct MessageAssembler {
    buf: [u8; MAX_MESSAGE],
    len: usize,
    escaped: bool,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self {
            buf: [0; MAX_MESSAGE],
            len: 0,
            escaped: false,
        }
    }

    /// Feed one byte. Returns the completed message when this byte closed
    /// one and it passed the CRC check.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if self.escaped {
            self.escaped = false;
            // 0xFD 0x01 -> 0xFE, 0xFD 0x02 -> 0xFF
            self.append(0xFD_u8.wrapping_add(byte));
            return None;
        }
        match byte {
            0xFE => {
                self.len = 0;
                None
            }
            0xFF => {
                let len = self.len;
                self.len = 0;
                let message = &self.buf[..len];
                if message_valid(message) {
                    Some(message)
                } else {
                    trace!("discarding {} byte RDS message with bad CRC-16", len);
                    None
                }
            }
            0xFD => {
                self.escaped = true;
                None
            }
            b => {
                self.append(b);
                None
            }
        }
    }

    fn append(&mut self, byte: u8) {
        if self.len == MAX_MESSAGE {
            // Runaway message without an end marker; start over.
            self.len = 0;
        }
        self.buf[self.len] = byte;
        self.len += 1;
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

fn message_valid(message: &[u8]) -> bool {
    message.len() > 2 && CRC16.checksum(message) == 0
}

/// Append the CRC-16 that makes a message self-checking. Used by the wire
/// encoder in tests and kept here next to the matching validation.
pub fn seal(mut message: Vec<u8>) -> Vec<u8> {
    let sum = CRC16.checksum(&message);
    message.extend_from_slice(&sum.to_be_bytes());
    message
}
