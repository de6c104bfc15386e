use std::io::Write;

use tracing::info;

use crate::context::ProgrammeState;

/// Audio bytes between two metadata splices
pub const METAINT: usize = 8192;

/// Longest title that goes into a StreamTitle block
const MAX_TITLE_CHARS: usize = 2000;

/// Longest station name that goes into the icy-name header
const MAX_STATION_CHARS: usize = 120;

/// Writes the audio stream, splicing a length-prefixed `StreamTitle='…';`
/// block into it every [`METAINT`] payload bytes, and emits the one-shot
/// response header in CGI mode.
///
/// The splice bookkeeping runs even with shoutcast interleaving disabled
/// so the byte accounting stays identical either way.
pub struct ShoutcastWriter<W: Write> {
    out: W,
    shoutcast: bool,
    cgi_mode: bool,
    header_sent: bool,
    old_title: String,
    since_meta: usize,
}

impl<W: Write> ShoutcastWriter<W> {
    pub fn new(out: W, shoutcast: bool, cgi_mode: bool) -> Self {
        Self {
            out,
            shoutcast,
            cgi_mode,
            header_sent: false,
            old_title: String::new(),
            since_meta: 0,
        }
    }

    /// Emit the response header once station name, bitrate and samplerate
    /// are known and the audio stream is synced, then open the payload
    /// gate. Does nothing outside CGI mode.
    pub fn maybe_emit_header(
        &mut self,
        state: &mut ProgrammeState,
        synced: bool,
    ) -> std::io::Result<()> {
        if !self.cgi_mode || self.header_sent {
            return Ok(());
        }
        if state.station_name.is_empty() || state.bitrate == 0 || state.samplerate == 0 || !synced
        {
            return Ok(());
        }
        let header = if self.shoutcast {
            let name: String = state.station_name.chars().take(MAX_STATION_CHARS).collect();
            format!(
                "Content-Type: {}\nConnection: close\nicy-br: {}\nicy-sr: {}\nicy-name: {}\nicy-metaint: {}\n\n",
                state.mime(),
                state.bitrate * 1000,
                state.samplerate,
                name,
                METAINT
            )
        } else {
            format!("Content-Type: {}\nConnection: close\n\n", state.mime())
        };
        self.out.write_all(header.as_bytes())?;
        self.out.flush()?;
        self.header_sent = true;
        state.output_payload = true;
        info!(
            "Starting audio: {} at {} kbit/s, {} Hz",
            state.mime(),
            state.bitrate,
            state.samplerate
        );
        Ok(())
    }

    /// Write one payload chunk, splicing in a metadata block when the
    /// [`METAINT`] boundary falls inside it. Returns the number of bytes
    /// written, metadata included.
    pub fn write_chunk(&mut self, chunk: &[u8], title: &str) -> std::io::Result<usize> {
        if !self.shoutcast || self.since_meta + chunk.len() <= METAINT {
            self.out.write_all(chunk)?;
            self.since_meta += chunk.len();
            return Ok(chunk.len());
        }

        let first = METAINT - self.since_meta;
        let second = chunk.len() - first;
        let mut written = 0;

        if first > 0 {
            self.out.write_all(&chunk[..first])?;
            written += first;
        }

        // A zero length byte means "title unchanged".
        let meta = if title != self.old_title {
            let capped: String = title.chars().take(MAX_TITLE_CHARS).collect();
            self.old_title = title.to_string();
            format!("StreamTitle='{capped}';")
        } else {
            String::new()
        };
        let blocks = meta.len().div_ceil(16);
        let mut padded = meta.into_bytes();
        padded.resize(blocks * 16, 0);
        self.out.write_all(&[blocks as u8])?;
        self.out.write_all(&padded)?;
        written += 1 + padded.len();

        self.out.write_all(&chunk[first..])?;
        written += second;
        self.since_meta = second;
        self.out.flush()?;
        Ok(written)
    }

    /// Bytes of audio written since the last metadata splice.
    pub fn since_meta(&self) -> usize {
        self.since_meta
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
