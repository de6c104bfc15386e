use mpa::{AudioKind, LatmSync};

/// Everything known about the programme under observation.
///
/// The original design kept this in process-wide globals; here it is one
/// owned record threaded explicitly through the pipeline, mutated only by
/// the single demultiplexer thread.
#[derive(Debug, Default)]
pub struct ProgrammeState {
    /// Transport stream id from the first valid PAT
    pub transport_stream_id: Option<u16>,
    /// Service id from the PMT that provided the audio stream
    pub service_id: Option<u16>,
    /// Audio carriage selected from the PMT
    pub audio_kind: Option<AudioKind>,
    /// Bitrate in kbit/s
    pub bitrate: u32,
    /// Samplerate in Hz
    pub samplerate: u32,
    /// Station name from the SDT (or the parameter cache)
    pub station_name: String,
    /// Current now-playing title
    pub stream_title: String,
    /// ISO 639 language code from the PMT, when announced
    pub language: Option<String>,
    /// LATM frame matcher derived from the PMT AAC descriptor
    pub latm: Option<LatmSync>,
    /// An audio PID has been selected; further PAT/PMT updates are ignored
    pub payload_added: bool,
    /// Header information is complete, audio may be written
    pub output_payload: bool,
    /// RDS radiotext has been seen; EIT updates no longer touch the title
    pub found_rds: bool,
    /// Total bytes taken from the input
    pub bytes_read: u64,
    /// Total bytes handed to the output (audio and metadata)
    pub bytes_written: u64,
}

impl ProgrammeState {
    /// Mime type for the output, defaulting to MPEG audio until the PMT
    /// says otherwise.
    pub fn mime(&self) -> &'static str {
        self.audio_kind.map_or("audio/mpeg", |k| k.mime())
    }
}
