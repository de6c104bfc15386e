use crate::text::decode_text;
use crate::{Result, TsError};

/// Short event descriptor tag
pub const DESC_SHORT_EVENT: u8 = 0x4D;

/// EIT present/following table id for the actual transport stream
pub const TABLE_EIT_PRESENT_FOLLOWING: u8 = 0x4E;

/// Below this many bytes of event descriptor loop the text fragments are
/// glued together without a separator.
const TEXT_SEPARATOR_THRESHOLD: usize = 70;

/// Event Information Table (EIT)
#[derive(Debug, Clone)]
pub struct Eit {
    pub table_id: u8,
    /// Service id the events belong to
    pub service_id: u16,
    /// Transport stream id
    pub transport_stream_id: u16,
    pub events: Vec<EitEvent>,
}

/// One event out of the EIT event loop with its short-event text merged
#[derive(Debug, Clone)]
pub struct EitEvent {
    pub event_id: u16,
    /// 3-bit running status (4 = running)
    pub running_status: u8,
    /// Event name from the first short-event descriptor
    pub name: String,
    /// Concatenated descriptor texts
    pub text: String,
}

impl Eit {
    /// Parse an EIT from a complete, CRC-validated section.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 18 {
            return Err(TsError::InsufficientData {
                expected: 18,
                actual: data.len(),
            });
        }
        let table_id = data[0];
        let section_length = ((data[1] as u16 & 0x0F) << 8) | data[2] as u16;
        if data.len() < 3 + section_length as usize {
            return Err(TsError::InsufficientData {
                expected: 3 + section_length as usize,
                actual: data.len(),
            });
        }
        let service_id = ((data[3] as u16) << 8) | data[4] as u16;
        let transport_stream_id = ((data[8] as u16) << 8) | data[9] as u16;

        let events_end = 3 + section_length as usize - 4; // exclude CRC32
        let mut offset = 14; // past last_table_id
        let mut events = Vec::new();

        while offset + 12 <= events_end {
            let event_id = ((data[offset] as u16) << 8) | data[offset + 1] as u16;
            let running_status = (data[offset + 10] >> 5) & 0x07;
            let loop_length =
                ((data[offset + 10] as usize & 0x0F) << 8) | data[offset + 11] as usize;
            offset += 12;
            if offset + loop_length > events_end {
                return Err(TsError::ParseError(
                    "EIT descriptor loop runs past the section".to_string(),
                ));
            }

            let (name, text) = merge_short_events(&data[offset..offset + loop_length], loop_length);
            events.push(EitEvent {
                event_id,
                running_status,
                name,
                text,
            });
            offset += loop_length;
        }

        Ok(Eit {
            table_id,
            service_id,
            transport_stream_id,
            events,
        })
    }
}

/// Walk the descriptor loop of one event and merge all short-event
/// descriptors: the event name comes from the first one, the texts are
/// concatenated (with " ~ " between fragments once the loop is long enough
/// that the text was actually split).
fn merge_short_events(mut d: &[u8], loop_length: usize) -> (String, String) {
    let mut name = String::new();
    let mut texts: Vec<String> = Vec::new();

    while d.len() >= 2 {
        let tag = d[0];
        let len = d[1] as usize;
        if 2 + len > d.len() {
            break;
        }
        if tag == DESC_SHORT_EVENT && len >= 5 {
            let body = &d[2..2 + len];
            // 3 language bytes, then length-prefixed name and text
            let name_len = body[3] as usize;
            if 4 + name_len <= body.len() {
                if name.is_empty() {
                    name = decode_text(&body[4..4 + name_len]);
                }
                if let Some(&text_len) = body.get(4 + name_len) {
                    let start = 5 + name_len;
                    let text_len = text_len as usize;
                    if start + text_len <= body.len() && text_len > 0 {
                        texts.push(decode_text(&body[start..start + text_len]));
                    }
                }
            }
        }
        d = &d[2 + len..];
    }

    let text = if loop_length > TEXT_SEPARATOR_THRESHOLD {
        texts.join(" ~ ")
    } else {
        texts.concat()
    };
    (name, text)
}
