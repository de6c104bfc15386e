use mpa::SyncPattern;

use crate::assembler::MessageAssembler;
use crate::radiotext::RadioText;
use crate::MSG_RADIOTEXT;

/// How many trailing bytes of the previous chunk are kept so a frame sync
/// right at a chunk start still has its padding available.
const CARRY: usize = 60;

/// Sync matches this close to the chunk start walk into the carry buffer.
const EARLY_WINDOW: usize = 32;

/// Finds RDS data in audio payload chunks.
///
/// The scanner looks for audio frame sync positions; the RDS bytes of a
/// frame sit directly in front of its sync header in reverse order, behind
/// a length byte and a 0xFD marker:
///
/// ```text
/// ... 53 57 52 31 0a fd ff fx ...
///     ^^^^^^^^^^^ ^  ^  ^^^^^
///     data,       |  |  frame sync
///     reversed    |  RDS marker
///                 length (0 = no data in this frame)
/// ```
///
/// Harvested bytes stream into a [`MessageAssembler`]; completed radiotext
/// messages update the [`RadioText`] buffer.
pub struct RdsScanner {
    assembler: MessageAssembler,
    radiotext: RadioText,
    carry: [u8; CARRY],
    carry_valid: bool,
}

impl RdsScanner {
    pub fn new() -> Self {
        Self {
            assembler: MessageAssembler::new(),
            radiotext: RadioText::new(),
            carry: [0; CARRY],
            carry_valid: false,
        }
    }

    /// Scan one outgoing payload chunk. Returns the new title when a
    /// radiotext change was completed inside this chunk.
    pub fn scan(&mut self, chunk: &[u8], sync: &SyncPattern) -> Option<String> {
        if chunk.len() < 2 {
            return None;
        }
        for i in 0..chunk.len() - 1 {
            if !sync.matches(chunk[i], chunk[i + 1]) {
                continue;
            }
            if i >= EARLY_WINDOW {
                self.harvest(chunk, i);
            } else if self.carry_valid {
                // The padding of this frame ended in the previous chunk.
                let mut joined = Vec::with_capacity(CARRY + i + 1);
                joined.extend_from_slice(&self.carry);
                joined.extend_from_slice(&chunk[..i + 1]);
                self.harvest(&joined, CARRY + i);
            }
        }
        if chunk.len() >= CARRY {
            self.carry.copy_from_slice(&chunk[chunk.len() - CARRY..]);
            self.carry_valid = true;
        }
        self.radiotext.take_changed()
    }

    /// Walk the reversed padding in front of the frame sync at `i`.
    fn harvest(&mut self, buf: &[u8], i: usize) {
        if i < 2 {
            return;
        }
        let marker = buf[i - 1];
        let length = buf[i - 2] as usize;
        if marker != 0xFD || length == 0 {
            return;
        }
        for j in 3..=length + 2 {
            if j > i {
                break;
            }
            if let Some(msg) = self.assembler.push(buf[i - j])
                && msg.get(4) == Some(&MSG_RADIOTEXT)
            {
                self.radiotext.apply(msg);
            }
        }
    }
}

impl Default for RdsScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::seal;

    const SYNC: SyncPattern = SyncPattern {
        first: 0xFF,
        second: 0xFD,
        second_mask: 0xF0,
    };

    fn encode_wire(msg: &[u8]) -> Vec<u8> {
        let mut wire = vec![0xFE];
        for &b in msg {
            match b {
                0xFD => wire.extend_from_slice(&[0xFD, 0x00]),
                0xFE => wire.extend_from_slice(&[0xFD, 0x01]),
                0xFF => wire.extend_from_slice(&[0xFD, 0x02]),
                b => wire.push(b),
            }
        }
        wire.push(0xFF);
        wire
    }

    fn radiotext_wire(text: &[u8]) -> Vec<u8> {
        let mut msg = vec![0u8; 9 + text.len()];
        msg[4] = MSG_RADIOTEXT;
        msg[7] = (text.len() + 1) as u8;
        msg[8] = 0;
        msg[9..].copy_from_slice(text);
        encode_wire(&seal(msg))
    }

    /// Append one audio "frame" whose padding carries `data`: the bytes in
    /// reverse, the length, the 0xFD marker, the frame sync, some payload.
    fn push_frame(chunk: &mut Vec<u8>, data: &[u8]) {
        chunk.extend(data.iter().rev());
        chunk.push(data.len() as u8);
        chunk.push(0xFD);
        chunk.push(0xFF);
        chunk.push(0xFD);
        chunk.extend_from_slice(&[0u8; 20]);
    }

    #[test]
    fn test_single_frame_radiotext() {
        let wire = radiotext_wire(b"SONG / ARTIST");
        let mut chunk = vec![0u8; 40];
        push_frame(&mut chunk, &wire);
        let mut scanner = RdsScanner::new();
        assert_eq!(scanner.scan(&chunk, &SYNC).unwrap(), "ARTIST - SONG");
    }

    #[test]
    fn test_message_spread_over_frames() {
        let wire = radiotext_wire(b"Abendkonzert");
        let mut chunk = vec![0u8; 40];
        for part in wire.chunks(5) {
            push_frame(&mut chunk, part);
        }
        let mut scanner = RdsScanner::new();
        assert_eq!(scanner.scan(&chunk, &SYNC).unwrap(), "Abendkonzert");
    }

    #[test]
    fn test_frame_start_at_chunk_boundary_uses_carry() {
        let wire = radiotext_wire(b"Carry Over");
        // First chunk ends with the reversed data + length + marker, the
        // sync itself only arrives in the next chunk.
        let mut chunk1 = vec![0u8; 80];
        chunk1.extend(wire.iter().rev());
        chunk1.push(wire.len() as u8);
        chunk1.push(0xFD);
        let mut chunk2 = vec![0xFF, 0xFD];
        chunk2.extend_from_slice(&[0u8; 70]);

        let mut scanner = RdsScanner::new();
        assert!(scanner.scan(&chunk1, &SYNC).is_none());
        assert_eq!(scanner.scan(&chunk2, &SYNC).unwrap(), "Carry Over");
    }

    #[test]
    fn test_zero_length_padding_is_ignored() {
        let mut chunk = vec![0u8; 40];
        push_frame(&mut chunk, &[]);
        let mut scanner = RdsScanner::new();
        assert!(scanner.scan(&chunk, &SYNC).is_none());
    }

    #[test]
    fn test_corrupted_message_yields_no_title() {
        let mut wire = radiotext_wire(b"Good Text");
        let n = wire.len();
        wire[n / 2] ^= 0x08; // damage the body, CRC-16 must catch it
        let mut chunk = vec![0u8; 40];
        push_frame(&mut chunk, &wire);
        let mut scanner = RdsScanner::new();
        assert!(scanner.scan(&chunk, &SYNC).is_none());
    }
}
