use std::io::Write;

use mpa::{Ac3Header, AdtsHeader, AudioKind, FrameInfo, MpegHeader, SyncPattern};
use rds::RdsScanner;
use tracing::{info, warn};

use crate::config::CastConfig;
use crate::context::ProgrammeState;
use crate::pes::parse_pes;
use crate::shoutcast::ShoutcastWriter;

/// Audio bytes accumulated before a chunk is pushed downstream
pub const PAYLOAD_SIZE: usize = 2048;

/// Nominal bitrate announced for ADTS streams when neither the header nor
/// the PMT provides one.
const ADTS_FALLBACK_BITRATE: u32 = 16;

/// Recovers the audio elementary stream from the payload PID.
///
/// Unwraps PES packets, scans for a valid audio frame header to sync on,
/// then buffers the raw stream into [`PAYLOAD_SIZE`] chunks. Each outgoing
/// chunk passes through the RDS scanner before it reaches the writer.
pub struct AudioExtractor {
    /// PES stream id this session locked onto; 0 until the first header
    stream_id: u8,
    /// Bytes left in the current PES packet
    pes_remaining: usize,
    synced: bool,
    sync: Option<SyncPattern>,
    buf: Vec<u8>,
    rds: RdsScanner,
    pid: u16,
}

impl AudioExtractor {
    pub fn new() -> Self {
        Self {
            stream_id: 0,
            pes_remaining: 0,
            synced: false,
            sync: None,
            buf: Vec::new(),
            rds: RdsScanner::new(),
            pid: 0,
        }
    }

    /// The PID this extractor listens to, for log lines.
    pub fn set_pid(&mut self, pid: u16) {
        self.pid = pid;
    }

    pub fn synced(&self) -> bool {
        self.synced
    }

    /// Drop sync after a transport error or continuity break; the stream
    /// is re-acquired at the next valid frame header.
    pub fn lose_sync(&mut self) {
        self.synced = false;
        self.buf.clear();
    }

    /// Feed one TS packet payload belonging to the audio PID.
    pub fn handle<W: Write>(
        &mut self,
        data: &[u8],
        unit_start: bool,
        state: &mut ProgrammeState,
        writer: &mut ShoutcastWriter<W>,
        config: &CastConfig,
    ) -> crate::Result<()> {
        let mut es: &[u8] = if unit_start {
            let Some(pes) = parse_pes(data, self.pid) else {
                return Ok(());
            };
            if self.stream_id == 0 {
                self.stream_id = pes.stream_id;
            } else if pes.stream_id != self.stream_id {
                warn!(
                    "Ignoring additional audio stream ID 0x{:x} (pid: {})",
                    pes.stream_id, self.pid
                );
                return Ok(());
            }
            self.pes_remaining = pes.remaining;
            pes.payload
        } else {
            if self.stream_id == 0 {
                // No PES header seen yet, nothing to anchor this data to.
                return Ok(());
            }
            let take = data.len().min(self.pes_remaining);
            self.pes_remaining -= take;
            &data[..take]
        };

        // Hunt for a frame header until the stream is synced.
        while !self.synced && es.len() >= 4 {
            if let Some(info) = self.try_sync(es, state) {
                self.apply_sync(info, state);
                break;
            }
            es = &es[1..];
        }

        if self.synced && state.output_payload {
            self.buf.extend_from_slice(es);
        }

        while self.buf.len() > PAYLOAD_SIZE {
            {
                let chunk = &self.buf[..PAYLOAD_SIZE];
                if config.prefer_rds
                    && let Some(sync) = self.sync
                    && let Some(title) = self.rds.scan(chunk, &sync)
                {
                    if !state.found_rds {
                        state.found_rds = true;
                        info!("RDS: RDS data found, using RDS instead of EIT.");
                    }
                    info!("RDS: {}", title);
                    state.stream_title = title;
                }
                let written = writer.write_chunk(chunk, &state.stream_title)?;
                state.bytes_written += written as u64;
            }
            self.buf.drain(..PAYLOAD_SIZE);
        }
        Ok(())
    }

    /// Try to parse a frame header for the selected audio kind at the
    /// start of `es`.
    fn try_sync(&self, es: &[u8], state: &ProgrammeState) -> Option<FrameInfo> {
        match state.audio_kind? {
            AudioKind::Mpeg => MpegHeader::parse(es).map(|h| {
                info!("Synced to {} in PID {}", h, self.pid);
                h.frame_info(es)
            }),
            AudioKind::AacAdts => AdtsHeader::parse(es).map(|h| {
                info!(
                    "Synced to AAC, samplerate {} Hz, {} channels in PID {}",
                    h.samplerate,
                    h.channels(),
                    self.pid
                );
                h.frame_info(es)
            }),
            AudioKind::HeAacLatm => state.latm.filter(|l| l.matches(es)).map(|l| {
                info!(
                    "Synced to HE-AAC, guessed samplerate {} Hz, bitrate {} kbit/s in PID {}",
                    l.samplerate, l.bitrate, self.pid
                );
                l.frame_info()
            }),
            AudioKind::Ac3 => Ac3Header::parse(es).map(|h| {
                info!(
                    "Synced to AC-3, {} kbit/s, {} Hz, channels: {} in PID {}",
                    h.bitrate,
                    h.samplerate,
                    h.channel_name(),
                    self.pid
                );
                h.frame_info()
            }),
        }
    }

    fn apply_sync(&mut self, frame: FrameInfo, state: &mut ProgrammeState) {
        match state.audio_kind {
            Some(AudioKind::Mpeg) | Some(AudioKind::Ac3) => {
                state.bitrate = frame.bitrate;
                state.samplerate = frame.samplerate;
            }
            Some(AudioKind::AacAdts) => {
                state.samplerate = frame.samplerate;
                // ADTS has no bitrate field; a PMT maximum-bitrate
                // descriptor wins over the nominal fallback.
                if state.bitrate == 0 {
                    state.bitrate = ADTS_FALLBACK_BITRATE;
                }
            }
            Some(AudioKind::HeAacLatm) => {
                if state.samplerate == 0 {
                    state.samplerate = frame.samplerate;
                }
                if state.bitrate == 0 {
                    state.bitrate = frame.bitrate;
                }
            }
            None => {}
        }
        self.synced = true;
        self.sync = Some(frame.sync);
        self.buf.reserve(PAYLOAD_SIZE + ts::TS_PACKET_SIZE);
    }
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}
