use bytes::{Buf, Bytes, BytesMut};
use memchr::memchr;
use tracing::warn;

use crate::packet::{SYNC_BYTE, TS_PACKET_SIZE};
use crate::{Result, TsError};

/// How many consecutive resynchronisation failures are tolerated before the
/// stream is considered lost.
pub const MAX_SYNC_ERRORS: u16 = 5;

/// Resynchronising packet framer.
///
/// Accepts byte chunks of arbitrary size (they rarely align with the 188-byte
/// packet grid when the upstream is an HTTP body) and yields exactly-188-byte
/// packets starting with the 0x47 sync byte. Bytes in front of a sync byte
/// are skipped with a warning; after [`MAX_SYNC_ERRORS`] consecutive skips
/// the framer gives up.
pub struct Framer {
    buf: BytesMut,
    sync_errors: u16,
}

impl Framer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4 * TS_PACKET_SIZE),
            sync_errors: 0,
        }
    }

    /// Append a chunk of raw stream bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of bytes currently buffered, waiting for a packet boundary.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Pull the next complete packet out of the buffer.
    ///
    /// Returns `Ok(None)` when fewer than 188 bytes remain; call `push` with
    /// more data and try again. Returns an error only when synchronisation
    /// was lost [`MAX_SYNC_ERRORS`] times in a row.
    pub fn next_packet(&mut self) -> Result<Option<Bytes>> {
        loop {
            if self.buf.is_empty() {
                return Ok(None);
            }
            if self.buf[0] != SYNC_BYTE {
                let skipped = match memchr(SYNC_BYTE, &self.buf) {
                    Some(pos) => {
                        self.buf.advance(pos);
                        pos
                    }
                    None => {
                        let len = self.buf.len();
                        self.buf.clear();
                        len
                    }
                };
                self.sync_errors += 1;
                warn!(
                    "Lost synchronisation - skipping {} bytes (loss counter {}, aborting at {})",
                    skipped, self.sync_errors, MAX_SYNC_ERRORS
                );
                if self.sync_errors > MAX_SYNC_ERRORS {
                    return Err(TsError::SyncLost(self.sync_errors));
                }
                continue;
            }
            if self.buf.len() < TS_PACKET_SIZE {
                self.buf.reserve(TS_PACKET_SIZE - self.buf.len());
                return Ok(None);
            }
            self.sync_errors = 0;
            return Ok(Some(self.buf.split_to(TS_PACKET_SIZE).freeze()));
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_with_pid(pid: u16) -> Vec<u8> {
        let mut data = vec![0u8; TS_PACKET_SIZE];
        data[0] = SYNC_BYTE;
        data[1] = (pid >> 8) as u8 & 0x1F;
        data[2] = (pid & 0xFF) as u8;
        data[3] = 0x10;
        data
    }

    #[test]
    fn test_emits_whole_packets() {
        let mut framer = Framer::new();
        let pkt = packet_with_pid(0x100);
        framer.push(&pkt);
        framer.push(&pkt);
        assert_eq!(framer.next_packet().unwrap().unwrap().as_ref(), &pkt[..]);
        assert_eq!(framer.next_packet().unwrap().unwrap().as_ref(), &pkt[..]);
        assert!(framer.next_packet().unwrap().is_none());
    }

    #[test]
    fn test_chunk_boundaries_do_not_matter() {
        let mut framer = Framer::new();
        let pkt = packet_with_pid(0x42);
        // Feed two packets one byte at a time.
        for &b in pkt.iter().chain(pkt.iter()) {
            framer.push(&[b]);
        }
        let mut count = 0;
        while let Some(out) = framer.next_packet().unwrap() {
            assert_eq!(out.as_ref(), &pkt[..]);
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_garbage_prefix_is_skipped() {
        let mut framer = Framer::new();
        let pkt = packet_with_pid(0x123);
        framer.push(&[0x00, 0x11, 0x22]);
        framer.push(&pkt);
        let out = framer.next_packet().unwrap().unwrap();
        assert_eq!(out.as_ref(), &pkt[..]);
    }

    #[test]
    fn test_sync_loss_is_fatal_after_five_attempts() {
        let mut framer = Framer::new();
        let mut result = Ok(None);
        for _ in 0..=MAX_SYNC_ERRORS {
            framer.push(&[0u8; TS_PACKET_SIZE]);
            result = framer.next_packet();
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(TsError::SyncLost(_))));
    }

    #[test]
    fn test_good_packet_resets_loss_counter() {
        let mut framer = Framer::new();
        let pkt = packet_with_pid(0x10);
        for _ in 0..20 {
            framer.push(&[0u8; 16]);
            framer.push(&pkt);
            let out = framer.next_packet().unwrap().unwrap();
            assert_eq!(out.as_ref(), &pkt[..]);
        }
    }
}
