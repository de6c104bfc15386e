use tracing::{debug, warn};

use crate::crc::crc32;

/// Upper bound for an accumulated section. The 12-bit section length field
/// tops out well below this; anything larger is a corrupted accumulation.
pub const MAX_SECTION_BUF: usize = 5000;

/// Smallest section that can carry a CRC32: 8 header bytes plus the CRC.
const MIN_SECTION_LEN: usize = 12;

/// Reassembles PSI/SI sections from transport stream packet payloads.
///
/// One aggregator serves one table-carrying PID. Sections may fit in a
/// single packet (PAT, PMT, and chains of short sections), or span many
/// packets (EIT, SDT); the `payload_unit_start_indicator` and the pointer
/// field govern where a new section begins. Every reassembled section is
/// CRC32-validated before it reaches the sink; failures are dropped.
pub struct SectionAggregator {
    buffer: Vec<u8>,
    /// Total size of the in-flight section (declared length + 3 header bytes)
    target: usize,
    continuation: bool,
}

impl SectionAggregator {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            target: 0,
            continuation: false,
        }
    }

    /// Drop any in-flight accumulation, e.g. after a continuity break.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.target = 0;
        self.continuation = false;
    }

    /// Feed one packet payload. `unit_start` is the packet's
    /// payload_unit_start_indicator. Complete, CRC-valid sections are handed
    /// to `sink` in stream order.
    pub fn push(&mut self, payload: &[u8], unit_start: bool, sink: &mut dyn FnMut(&[u8])) {
        if unit_start {
            let Some(&pointer) = payload.first() else {
                self.reset();
                return;
            };
            let pointer = pointer as usize;
            if 1 + pointer > payload.len() {
                warn!("pointer field {} runs past the packet payload", pointer);
                self.reset();
                return;
            }
            if self.continuation {
                // Bytes in front of the pointer are the tail of the section
                // currently being accumulated.
                let tail = &payload[1..1 + pointer];
                let need = self.target - self.buffer.len();
                if tail.len() >= need {
                    self.buffer.extend_from_slice(&tail[..need]);
                    emit(&self.buffer, sink);
                }
                self.continuation = false;
            }
            self.buffer.clear();
            self.consume(&payload[1 + pointer..], sink);
        } else if self.continuation {
            let need = self.target - self.buffer.len();
            if payload.len() >= need {
                self.buffer.extend_from_slice(&payload[..need]);
                self.continuation = false;
                emit(&self.buffer, sink);
                // Trailing bytes may chain another section without a new
                // unit start; keep parsing them.
                let rest = payload[need..].to_vec();
                self.buffer.clear();
                self.consume(&rest, sink);
            } else if self.buffer.len() + payload.len() > MAX_SECTION_BUF {
                warn!(
                    "section exceeds the {} byte buffer, resetting",
                    MAX_SECTION_BUF
                );
                self.reset();
            } else {
                self.buffer.extend_from_slice(payload);
            }
        }
        // Without unit_start and without an accumulation in progress there is
        // nothing to anchor the payload to; it is skipped.
    }

    /// Walk zero or more sections packed back to back in `rest`. The last
    /// one may be incomplete, in which case accumulation starts.
    fn consume(&mut self, mut rest: &[u8], sink: &mut dyn FnMut(&[u8])) {
        while rest.len() >= 3 {
            if rest[0] == 0xFF {
                // Stuffing fills the remainder of the packet.
                return;
            }
            let section_length = (((rest[1] & 0x0F) as usize) << 8) | rest[2] as usize;
            let total = section_length + 3;
            if total > MAX_SECTION_BUF {
                warn!("declared section length {} is out of range", section_length);
                return;
            }
            if total <= rest.len() {
                emit(&rest[..total], sink);
                rest = &rest[total..];
            } else {
                self.buffer.extend_from_slice(rest);
                self.target = total;
                self.continuation = true;
                return;
            }
        }
    }
}

impl Default for SectionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn emit(section: &[u8], sink: &mut dyn FnMut(&[u8])) {
    if section.len() < MIN_SECTION_LEN {
        return;
    }
    if crc32(section) != 0 {
        debug!("dropping {} byte section with bad CRC32", section.len());
        return;
    }
    sink(section);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a syntactically valid section of `total` bytes (header + body
    /// + CRC32) with a recognisable fill pattern.
    fn make_section(table_id: u8, total: usize) -> Vec<u8> {
        assert!((MIN_SECTION_LEN..=4096).contains(&total));
        let section_length = total - 3;
        let mut sec = vec![0u8; total - 4];
        sec[0] = table_id;
        sec[1] = 0xB0 | ((section_length >> 8) as u8 & 0x0F);
        sec[2] = (section_length & 0xFF) as u8;
        for (i, b) in sec.iter_mut().enumerate().skip(3) {
            *b = (i % 251) as u8;
        }
        let sum = crc32(&sec);
        sec.extend_from_slice(&sum.to_be_bytes());
        sec
    }

    /// Split a section into TS packet payloads: the first carries the
    /// pointer field, the rest are 184-byte continuation payloads padded
    /// with stuffing.
    fn packetise(section: &[u8]) -> Vec<(Vec<u8>, bool)> {
        let mut packets = Vec::new();
        let mut first = vec![0u8]; // pointer field 0
        let take = section.len().min(183);
        first.extend_from_slice(&section[..take]);
        while first.len() < 184 {
            first.push(0xFF);
        }
        packets.push((first, true));
        let mut off = take;
        while off < section.len() {
            let take = (section.len() - off).min(184);
            let mut payload = section[off..off + take].to_vec();
            while payload.len() < 184 {
                payload.push(0xFF);
            }
            packets.push((payload, false));
            off += take;
        }
        packets
    }

    fn collect(agg: &mut SectionAggregator, packets: &[(Vec<u8>, bool)]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        for (payload, start) in packets {
            agg.push(payload, *start, &mut |s| out.push(s.to_vec()));
        }
        out
    }

    #[test]
    fn test_single_packet_section() {
        let section = make_section(0x00, 16);
        let mut agg = SectionAggregator::new();
        let out = collect(&mut agg, &packetise(&section));
        assert_eq!(out, vec![section]);
    }

    #[test]
    fn test_multi_packet_roundtrip() {
        for total in [12, 150, 184, 185, 200, 368, 1024, 4000, 4096] {
            let section = make_section(0x4E, total);
            let mut agg = SectionAggregator::new();
            let out = collect(&mut agg, &packetise(&section));
            assert_eq!(out, vec![section], "round trip failed for {total} bytes");
        }
    }

    #[test]
    fn test_chained_short_sections_in_one_packet() {
        let a = make_section(0x42, 20);
        let b = make_section(0x42, 30);
        let mut payload = vec![0u8]; // pointer field 0
        payload.extend_from_slice(&a);
        payload.extend_from_slice(&b);
        while payload.len() < 184 {
            payload.push(0xFF);
        }
        let mut agg = SectionAggregator::new();
        let out = collect(&mut agg, &[(payload, true)]);
        assert_eq!(out, vec![a, b]);
    }

    #[test]
    fn test_tail_completes_previous_section() {
        let section = make_section(0x42, 200);
        let next = make_section(0x42, 16);
        // First packet: pointer 0, first 183 bytes.
        let mut p1 = vec![0u8];
        p1.extend_from_slice(&section[..183]);
        p1.push(0xFF);
        // Second packet: unit start, the remaining 17 bytes in front of the
        // pointer, then a fresh section.
        let tail = &section[183..];
        let mut p2 = vec![tail.len() as u8];
        p2.extend_from_slice(tail);
        p2.extend_from_slice(&next);
        while p2.len() < 184 {
            p2.push(0xFF);
        }
        let mut agg = SectionAggregator::new();
        let out = collect(&mut agg, &[(p1, true), (p2, true)]);
        assert_eq!(out, vec![section, next]);
    }

    #[test]
    fn test_new_start_abandons_incomplete_section() {
        let long = make_section(0x4E, 400);
        let fresh = make_section(0x4E, 16);
        let mut p1 = vec![0u8];
        p1.extend_from_slice(&long[..183]);
        p1.push(0xFF);
        // Unit start with pointer 0: the 400-byte section is abandoned.
        let mut p2 = vec![0u8];
        p2.extend_from_slice(&fresh);
        while p2.len() < 184 {
            p2.push(0xFF);
        }
        let mut agg = SectionAggregator::new();
        let out = collect(&mut agg, &[(p1, true), (p2, true)]);
        assert_eq!(out, vec![fresh]);
    }

    #[test]
    fn test_corrupt_crc_is_dropped() {
        let mut section = make_section(0x00, 32);
        section[10] ^= 0x40;
        let mut agg = SectionAggregator::new();
        let out = collect(&mut agg, &packetise(&section));
        assert!(out.is_empty());
    }

    #[test]
    fn test_reset_discards_in_flight_data() {
        let section = make_section(0x4E, 400);
        let packets = packetise(&section);
        let mut agg = SectionAggregator::new();
        let mut out = Vec::new();
        agg.push(&packets[0].0, true, &mut |s| out.push(s.to_vec()));
        agg.reset();
        for (payload, start) in &packets[1..] {
            agg.push(payload, *start, &mut |s| out.push(s.to_vec()));
        }
        assert!(out.is_empty());
    }
}
