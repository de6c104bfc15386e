use crate::{Result, TsError};

/// ISO 639 language descriptor
pub const DESC_ISO639_LANGUAGE: u8 = 0x0A;
/// Maximum bitrate descriptor (units of 50 bytes/s)
pub const DESC_MAXIMUM_BITRATE: u8 = 0x0E;
/// DVB AC-3 descriptor
pub const DESC_AC3: u8 = 0x6A;
/// DVB AAC descriptor (carries the profile/level byte)
pub const DESC_AAC: u8 = 0x7C;

/// Elementary stream types this demultiplexer cares about. Everything that
/// is not a radio audio carriage collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    /// MPEG-1 audio (0x03)
    Mpeg1Audio,
    /// MPEG-2 audio (0x04)
    Mpeg2Audio,
    /// Private PES data (0x06) - AC-3 when the 0x6A descriptor is present
    PrivatePes,
    /// AAC with ADTS transport (0x0F)
    AdtsAac,
    /// MPEG-4 AAC with LATM transport (0x11)
    LatmAac,
    /// Anything else
    Other(u8),
}

impl From<u8> for StreamType {
    fn from(value: u8) -> Self {
        match value {
            0x03 => StreamType::Mpeg1Audio,
            0x04 => StreamType::Mpeg2Audio,
            0x06 => StreamType::PrivatePes,
            0x0F => StreamType::AdtsAac,
            0x11 => StreamType::LatmAac,
            other => StreamType::Other(other),
        }
    }
}

impl StreamType {
    /// MPEG audio frames carried directly in PES
    pub fn is_mpeg_audio(&self) -> bool {
        matches!(self, StreamType::Mpeg1Audio | StreamType::Mpeg2Audio)
    }
}

/// Program Map Table (PMT) - Table ID 0x02
#[derive(Debug, Clone)]
pub struct Pmt {
    /// Program number (the DVB service id)
    pub program_number: u16,
    /// Version number
    pub version_number: u8,
    /// PCR PID
    pub pcr_pid: u16,
    /// Elementary streams
    pub streams: Vec<PmtStream>,
}

/// Elementary stream entry in a PMT
#[derive(Debug, Clone)]
pub struct PmtStream {
    /// Stream type
    pub stream_type: StreamType,
    /// Elementary PID
    pub elementary_pid: u16,
    /// Raw ES info descriptor loop
    pub es_info: Vec<u8>,
}

impl PmtStream {
    /// Walk this entry's descriptor loop.
    pub fn descriptors(&self) -> DescriptorIter<'_> {
        DescriptorIter { rest: &self.es_info }
    }

    /// Find the first descriptor with the given tag.
    pub fn descriptor(&self, tag: u8) -> Option<Descriptor<'_>> {
        self.descriptors().find(|d| d.tag == tag)
    }
}

/// One descriptor out of an ES info loop
#[derive(Debug, Clone, Copy)]
pub struct Descriptor<'a> {
    pub tag: u8,
    pub data: &'a [u8],
}

/// Iterator over a raw descriptor loop
pub struct DescriptorIter<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = Descriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.len() < 2 {
            return None;
        }
        let tag = self.rest[0];
        let len = self.rest[1] as usize;
        if 2 + len > self.rest.len() {
            // Truncated descriptor; stop rather than mis-slice.
            self.rest = &[];
            return None;
        }
        let data = &self.rest[2..2 + len];
        self.rest = &self.rest[2 + len..];
        Some(Descriptor { tag, data })
    }
}

impl Pmt {
    /// Parse a PMT from a complete, CRC-validated section.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 16 {
            return Err(TsError::InsufficientData {
                expected: 16,
                actual: data.len(),
            });
        }
        let table_id = data[0];
        if table_id != 0x02 {
            return Err(TsError::InvalidTableId {
                expected: 0x02,
                actual: table_id,
            });
        }
        let section_length = ((data[1] as u16 & 0x0F) << 8) | data[2] as u16;
        if section_length < 13 {
            return Err(TsError::InvalidSectionLength(section_length));
        }
        if data.len() < 3 + section_length as usize {
            return Err(TsError::InsufficientData {
                expected: 3 + section_length as usize,
                actual: data.len(),
            });
        }

        let program_number = ((data[3] as u16) << 8) | data[4] as u16;
        let version_number = (data[5] >> 1) & 0x1F;
        let pcr_pid = ((data[8] as u16 & 0x1F) << 8) | data[9] as u16;
        let program_info_length = (((data[10] as u16 & 0x0F) << 8) | data[11] as u16) as usize;

        let streams_end = 3 + section_length as usize - 4; // exclude CRC32
        let mut offset = 12 + program_info_length;
        if offset > streams_end {
            return Err(TsError::ParseError(
                "program info length runs past the section".to_string(),
            ));
        }

        let mut streams = Vec::new();
        while offset + 5 <= streams_end {
            let stream_type = StreamType::from(data[offset]);
            let elementary_pid = ((data[offset + 1] as u16 & 0x1F) << 8) | data[offset + 2] as u16;
            let es_info_length =
                (((data[offset + 3] as u16 & 0x0F) << 8) | data[offset + 4] as u16) as usize;
            offset += 5;
            if offset + es_info_length > streams_end {
                return Err(TsError::ParseError(
                    "ES info length runs past the section".to_string(),
                ));
            }
            streams.push(PmtStream {
                stream_type,
                elementary_pid,
                es_info: data[offset..offset + es_info_length].to_vec(),
            });
            offset += es_info_length;
        }

        Ok(Pmt {
            program_number,
            version_number,
            pcr_pid,
            streams,
        })
    }
}
