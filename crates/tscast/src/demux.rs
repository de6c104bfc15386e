use std::collections::HashMap;
use std::io::Write;

use mpa::{AudioKind, LatmSync};
use tracing::{debug, info, warn};
use ts::eit::TABLE_EIT_PRESENT_FOLLOWING;
use ts::pmt::{DESC_AAC, DESC_AC3, DESC_ISO639_LANGUAGE, DESC_MAXIMUM_BITRATE, StreamType};
use ts::{Eit, Framer, PID_EIT, PID_PAT, PID_SDT, Pat, Pmt, Sdt, TsPacket};

use crate::cache::CachedParams;
use crate::channel::{Channel, ChannelKind, MAX_CHANNELS};
use crate::config::CastConfig;
use crate::context::ProgrammeState;
use crate::extractor::AudioExtractor;
use crate::shoutcast::ShoutcastWriter;

/// SDT table id for the actual transport stream
const TABLE_SDT_ACTUAL: u8 = 0x42;

/// Service types accepted as radio. 0x01 covers one broadcaster that
/// labels its radio service as SD television.
const RADIO_SERVICE_TYPES: [u8; 4] = [0x01, 0x02, 0x07, 0x0A];

/// PIDs at or below this value are reserved (PAT, CAT, NIT, SDT, EIT);
/// a PAT entry pointing there is not a usable PMT.
const LAST_RESERVED_PID: u16 = 0x11;

const MB: f64 = 1024.0 * 1024.0;

/// The complete pipeline from raw transport stream bytes to interleaved
/// audio output.
pub struct Demultiplexer<W: Write> {
    config: CastConfig,
    state: ProgrammeState,
    channels: HashMap<u16, Channel>,
    framer: Framer,
    extractor: AudioExtractor,
    writer: ShoutcastWriter<W>,
}

impl<W: Write> Demultiplexer<W> {
    pub fn new(out: W, config: CastConfig) -> Self {
        let writer = ShoutcastWriter::new(out, config.shoutcast, config.cgi_mode);
        let mut demux = Self {
            config,
            state: ProgrammeState {
                // Outside CGI mode there is no header to wait for.
                output_payload: !config.cgi_mode,
                ..Default::default()
            },
            channels: HashMap::new(),
            framer: Framer::new(),
            extractor: AudioExtractor::new(),
            writer,
        };
        info!("Subscribing to MPEG-TS PID 0, 17, 18 (PAT, SDT, EIT)");
        demux.subscribe(ChannelKind::Pat, PID_PAT);
        demux.subscribe(ChannelKind::Sdt, PID_SDT);
        demux.subscribe(ChannelKind::Eit, PID_EIT);
        demux
    }

    pub fn state(&self) -> &ProgrammeState {
        &self.state
    }

    /// Tear down the pipeline and hand back the output writer.
    pub fn into_output(self) -> W {
        self.writer.into_inner()
    }

    /// Pre-populate stream parameters from the on-disk cache so the
    /// response header can go out before the tables have been seen.
    pub fn preset(&mut self, params: &CachedParams) {
        if self.state.bitrate == 0 {
            self.state.bitrate = params.bitrate;
        }
        if self.state.samplerate == 0 {
            self.state.samplerate = params.samplerate;
        }
        if self.state.station_name.is_empty() {
            self.state.station_name = params.station_name.clone();
        }
        if self.state.audio_kind.is_none() {
            self.state.audio_kind = params.audio_kind;
        }
    }

    /// Feed a chunk of raw transport stream bytes of any size.
    ///
    /// This is the upstream contract: the HTTP client (or the stdin read
    /// loop) calls it per received chunk, and an `Err` tells it to stop
    /// the transfer.
    pub fn push(&mut self, data: &[u8]) -> crate::Result<()> {
        self.state.bytes_read += data.len() as u64;
        self.framer.push(data);
        while let Some(packet) = self.framer.next_packet()? {
            self.handle_packet(&packet)?;
        }
        Ok(())
    }

    /// Log the session totals at end of stream.
    pub fn finish(&self) {
        info!(
            "end of stream: read {:.2} MB, wrote {:.2} MB",
            self.state.bytes_read as f64 / MB,
            self.state.bytes_written as f64 / MB
        );
    }

    fn subscribe(&mut self, kind: ChannelKind, pid: u16) {
        if self.channels.contains_key(&pid) {
            debug!("PID {} already subscribed", pid);
            return;
        }
        if self.channels.len() >= MAX_CHANNELS {
            warn!("not subscribing PID {}: channel limit reached", pid);
            return;
        }
        if !matches!(pid, PID_PAT | PID_SDT | PID_EIT) {
            info!("Subscribing to MPEG-TS PID {} (Type {})", pid, kind.name());
        }
        if kind == ChannelKind::Payload {
            self.extractor.set_pid(pid);
        }
        self.channels.insert(pid, Channel::new(kind));
    }

    fn handle_packet(&mut self, raw: &[u8]) -> crate::Result<()> {
        let packet = match TsPacket::parse(raw) {
            Ok(p) => p,
            Err(e) => {
                warn!("dropping malformed packet: {}", e);
                return Ok(());
            }
        };
        if packet.transport_error {
            warn!("Warning, transport error in PID {}.", packet.pid);
            self.extractor.lose_sync();
            return Ok(());
        }
        if packet.scrambling_control != 0 {
            warn!("Warning: PID {} is scrambled.", packet.pid);
            return Ok(());
        }
        let Some(payload) = packet.payload else {
            return Ok(());
        };

        let Some(channel) = self.channels.get_mut(&packet.pid) else {
            return Ok(());
        };
        if !channel.continuity.check(packet.continuity_counter) {
            warn!("TS continuity error (pid: {})", packet.pid);
            if channel.kind == ChannelKind::Payload {
                self.extractor.lose_sync();
            } else {
                channel.aggregator.reset();
            }
        }
        let kind = channel.kind;
        let mut sections: Vec<Vec<u8>> = Vec::new();
        if kind != ChannelKind::Payload {
            channel
                .aggregator
                .push(payload, packet.payload_unit_start, &mut |s| {
                    sections.push(s.to_vec())
                });
        }

        match kind {
            ChannelKind::Pat => sections.iter().for_each(|s| self.handle_pat(s)),
            ChannelKind::Pmt => sections.iter().for_each(|s| self.handle_pmt(s)),
            ChannelKind::Sdt => sections.iter().for_each(|s| self.handle_sdt(s)),
            ChannelKind::Eit => sections.iter().for_each(|s| self.handle_eit(s)),
            ChannelKind::Payload => {
                self.extractor.handle(
                    payload,
                    packet.payload_unit_start,
                    &mut self.state,
                    &mut self.writer,
                    &self.config,
                )?;
            }
        }

        self.writer
            .maybe_emit_header(&mut self.state, self.extractor.synced())?;
        Ok(())
    }

    /// Learn the transport stream id and the candidate PMT PIDs.
    fn handle_pat(&mut self, section: &[u8]) {
        let pat = match Pat::parse(section) {
            Ok(pat) => pat,
            Err(e) => {
                debug!("PAT: {}", e);
                return;
            }
        };
        if self.state.transport_stream_id == Some(pat.transport_stream_id) {
            return;
        }
        self.state.transport_stream_id = Some(pat.transport_stream_id);
        info!(
            "PAT: transport stream {} carries {} programme(s)",
            pat.transport_stream_id,
            pat.programs.len()
        );
        for programme in &pat.programs {
            if programme.pmt_pid > LAST_RESERVED_PID && !self.state.payload_added {
                self.subscribe(ChannelKind::Pmt, programme.pmt_pid);
            }
        }
    }

    /// Select the audio elementary stream and learn the service id.
    fn handle_pmt(&mut self, section: &[u8]) {
        if self.state.payload_added {
            return;
        }
        let pmt = match Pmt::parse(section) {
            Ok(pmt) => pmt,
            Err(e) => {
                debug!("PMT: {}", e);
                return;
            }
        };
        let want_ac3 = self.config.want_ac3;

        for stream in &pmt.streams {
            let kind = match stream.stream_type {
                StreamType::Mpeg1Audio | StreamType::Mpeg2Audio if !want_ac3 => AudioKind::Mpeg,
                StreamType::AdtsAac if !want_ac3 => AudioKind::AacAdts,
                StreamType::LatmAac if !want_ac3 => AudioKind::HeAacLatm,
                StreamType::PrivatePes
                    if want_ac3 && stream.descriptor(DESC_AC3).is_some() =>
                {
                    AudioKind::Ac3
                }
                _ => continue,
            };

            for d in stream.descriptors() {
                match d.tag {
                    DESC_MAXIMUM_BITRATE if d.data.len() >= 3 => {
                        let raw = ((d.data[0] as u32 & 0x3F) << 16)
                            | ((d.data[1] as u32) << 8)
                            | d.data[2] as u32;
                        self.state.bitrate = raw * 50 * 8 / 1024;
                        debug!(
                            "PMT: maximum bitrate {} kbit/s on PID {}",
                            self.state.bitrate, stream.elementary_pid
                        );
                    }
                    DESC_AAC if kind == AudioKind::HeAacLatm && !d.data.is_empty() => {
                        let latm = LatmSync::from_profile(d.data[0]);
                        if self.state.samplerate == 0 {
                            self.state.samplerate = latm.samplerate;
                        }
                        self.state.latm = Some(latm);
                    }
                    DESC_ISO639_LANGUAGE if d.data.len() >= 3 => {
                        self.state.language =
                            Some(String::from_utf8_lossy(&d.data[..3]).into_owned());
                    }
                    _ => {}
                }
            }
            if kind == AudioKind::HeAacLatm && self.state.latm.is_none() {
                warn!(
                    "PMT: LATM stream on PID {} has no AAC descriptor, cannot derive frame sync",
                    stream.elementary_pid
                );
                continue;
            }

            self.state.audio_kind = Some(kind);
            self.state.service_id = Some(pmt.program_number);
            self.state.payload_added = true;
            info!(
                "PMT: selected {} stream on PID {} (service id {})",
                kind.mime(),
                stream.elementary_pid,
                pmt.program_number
            );
            self.subscribe(ChannelKind::Payload, stream.elementary_pid);
            break;
        }
    }

    /// Pick the running service's name out of the SDT.
    fn handle_sdt(&mut self, section: &[u8]) {
        let sdt = match Sdt::parse(section) {
            Ok(sdt) => sdt,
            Err(e) => {
                debug!("SDT: {}", e);
                return;
            }
        };
        if sdt.table_id != TABLE_SDT_ACTUAL {
            return;
        }
        let Some(service_id) = self.state.service_id else {
            return;
        };
        for service in &sdt.services {
            if service.service_id != service_id {
                continue;
            }
            // Status 4 is "running"; one broadcaster leaves 1 in place.
            if service.running_status != 4 && service.running_status != 1 {
                continue;
            }
            if service.service_type == 0xFF {
                continue;
            }
            if !RADIO_SERVICE_TYPES.contains(&service.service_type) {
                warn!(
                    "SDT: Warning: Stream (also) contains unknown service with id 0x{:02x}",
                    service.service_type
                );
                continue;
            }
            if service.service_name.is_empty() || self.state.station_name == service.service_name
            {
                continue;
            }
            info!(
                "SDT: Stream is station {} from network {}.",
                service.service_name, service.provider_name
            );
            self.state.station_name = service.service_name.clone();
        }
    }

    /// Publish the running event as the stream title, unless RDS has
    /// taken over.
    fn handle_eit(&mut self, section: &[u8]) {
        if self.state.found_rds {
            return;
        }
        let eit = match Eit::parse(section) {
            Ok(eit) => eit,
            Err(e) => {
                debug!("EIT: {}", e);
                return;
            }
        };
        if eit.table_id != TABLE_EIT_PRESENT_FOLLOWING {
            return;
        }
        if self.state.service_id != Some(eit.service_id) {
            return;
        }
        for event in &eit.events {
            if event.running_status != 4 || event.name.is_empty() {
                continue;
            }
            let title = if event.text.is_empty() {
                event.name.clone()
            } else {
                format!("{} - {}", event.name, event.text)
            };
            if title != self.state.stream_title {
                info!("EIT: Current transmission `{}'", event.name);
                self.state.stream_title = title;
            }
        }
    }
}
