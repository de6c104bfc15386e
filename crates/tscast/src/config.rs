/// Selection knobs for one streaming session. All of them arrive from the
/// outside (command line or environment); nothing in the pipeline infers
/// defaults on its own.
#[derive(Debug, Clone, Copy)]
pub struct CastConfig {
    /// Pick the AC-3 elementary stream instead of MPEG/AAC audio.
    pub want_ac3: bool,
    /// Prefer RDS radiotext over EIT now-playing data once RDS is seen.
    pub prefer_rds: bool,
    /// Splice Shoutcast metadata blocks into the output.
    pub shoutcast: bool,
    /// Emit the HTTP response header block before the first audio byte and
    /// gate audio output on it (CGI mode). Without it audio flows from the
    /// first synced frame.
    pub cgi_mode: bool,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            want_ac3: false,
            prefer_rds: true,
            shoutcast: true,
            cgi_mode: false,
        }
    }
}
