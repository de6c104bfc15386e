use std::path::PathBuf;

use clap::Parser;

/// Extract the radio service from an MPEG transport stream on stdin and
/// write its audio as a Shoutcast-style stream to stdout.
#[derive(Parser, Debug)]
#[command(name = "tscast", version, about)]
pub struct Args {
    /// Prefer the AC-3 elementary stream over MPEG/AAC audio
    #[arg(long, env = "WANT_AC3")]
    pub ac3: bool,

    /// Use RDS radiotext for the stream title once the stream carries any
    #[arg(long, env = "PREFER_RDS", default_value_t = true, action = clap::ArgAction::Set)]
    pub rds: bool,

    /// Pass the audio through without Shoutcast metadata blocks
    #[arg(long)]
    pub no_shoutcast: bool,

    /// Emit the HTTP response header block before the audio (CGI mode).
    /// Implied by a QUERY_STRING in the environment.
    #[arg(long)]
    pub cgi: bool,

    /// Programme identifier, used as the parameter cache key
    #[arg(long, env = "PROGRAMMNO")]
    pub programme: Option<String>,

    /// Parameter cache location
    #[arg(long, default_value = "/var/tmp/tscast.cache")]
    pub cache_file: PathBuf,
}

impl Args {
    pub fn cgi_mode(&self) -> bool {
        self.cgi || std::env::var_os("QUERY_STRING").is_some()
    }
}
