mod cli;
mod logfmt;

use std::io::{Read, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use ts::TS_PACKET_SIZE;
use tscast::{CachedParams, CastConfig, CastError, Demultiplexer, cache};

/// Consecutive short reads tolerated before giving up on the input.
const MAX_SYNC_ERRORS: u16 = 5;

/// Grace period before retrying a short read.
const SHORT_READ_RETRY: Duration = Duration::from_millis(450);

enum Outcome {
    /// Clean end of the input stream
    Eof,
    /// A termination signal arrived
    Interrupted,
    /// The downstream listener went away
    Downstream(CastError),
    /// Unrecoverable pipeline failure
    Fatal(String),
}

fn main() -> ExitCode {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .event_format(logfmt::ApacheLogFormat)
        .with_writer(std::io::stderr)
        .init();

    let cgi_mode = args.cgi_mode();
    let config = CastConfig {
        want_ac3: args.ac3,
        prefer_rds: args.rds,
        shoutcast: !args.no_shoutcast,
        cgi_mode,
    };
    info!(
        "Streaming {} in {} mode.",
        if config.shoutcast {
            "with shoutcast StreamTitles"
        } else {
            "without shoutcast support, mpeg only"
        },
        if cgi_mode { "CGI" } else { "FILTER" }
    );

    // SIGPIPE stays at the Rust default (ignored), so a closed listener
    // shows up as a write error instead of killing the process.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = interrupted.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
            warn!("cannot install signal handler: {}", e);
        }
    }

    let stdout = std::io::stdout();
    let mut demux = Demultiplexer::new(stdout.lock(), config);

    if cgi_mode
        && let Some(programme) = &args.programme
        && let Some(params) = cache::fetch(&args.cache_file, programme, args.ac3)
    {
        info!("found cached parameters for programme {}", programme);
        demux.preset(&params);
    }

    let outcome = stream(&mut demux, &interrupted);
    demux.finish();

    if cgi_mode && let Some(programme) = &args.programme {
        let state = demux.state();
        if !state.station_name.is_empty() && state.bitrate > 0 && state.samplerate > 0 {
            let params = CachedParams {
                bitrate: state.bitrate,
                samplerate: state.samplerate,
                station_name: state.station_name.clone(),
                audio_kind: state.audio_kind,
            };
            if let Err(e) = cache::store(&args.cache_file, programme, args.ac3, &params) {
                warn!("cannot update parameter cache: {}", e);
            }
        }
    }

    match outcome {
        Outcome::Eof => {
            info!("no bytes left to read - EOF. Exiting.");
            ExitCode::SUCCESS
        }
        Outcome::Interrupted => {
            info!("Caught signal - closing cleanly.");
            ExitCode::SUCCESS
        }
        Outcome::Downstream(e) => {
            // The listener hanging up is how most sessions end.
            info!("write error on output, closing: {}", e);
            ExitCode::SUCCESS
        }
        Outcome::Fatal(reason) => {
            error!("{}", reason);
            ExitCode::FAILURE
        }
    }
}

/// Packet-sized read loop over stdin. Short reads get one retry after a
/// grace period; five consecutive failures end the session.
fn stream<W: Write>(demux: &mut Demultiplexer<W>, interrupted: &AtomicBool) -> Outcome {
    let mut stdin = std::io::stdin().lock();
    let mut buf = [0u8; TS_PACKET_SIZE];
    let mut sync_errors: u16 = 0;

    while !interrupted.load(Ordering::SeqCst) {
        let mut filled = match stdin.read(&mut buf) {
            Ok(0) => return Outcome::Eof,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Outcome::Fatal(format!("read from input failed: {}", e)),
        };
        if filled < TS_PACKET_SIZE {
            warn!(
                "short read, only got {} bytes instead of {}, trying to resync",
                filled, TS_PACKET_SIZE
            );
            std::thread::sleep(SHORT_READ_RETRY);
            match stdin.read(&mut buf[filled..]) {
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Outcome::Fatal(format!("read from input failed: {}", e)),
            }
            if filled < TS_PACKET_SIZE {
                sync_errors += 1;
                if sync_errors > MAX_SYNC_ERRORS {
                    return Outcome::Fatal(format!(
                        "lost synchronisation (sync loss counter of {} exceeded)",
                        MAX_SYNC_ERRORS
                    ));
                }
                continue;
            }
        }
        sync_errors = 0;

        match demux.push(&buf[..filled]) {
            Ok(()) => {}
            Err(e) if e.is_downstream() => return Outcome::Downstream(e),
            Err(e) => return Outcome::Fatal(e.to_string()),
        }
    }
    Outcome::Interrupted
}
