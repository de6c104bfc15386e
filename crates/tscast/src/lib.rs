//! Transport-stream to Shoutcast pipeline.
//!
//! One [`Demultiplexer`] owns the whole chain: the resynchronising framer,
//! the PID routing table, the PSI/SI table handlers that learn the service
//! layout and its metadata, the PES extractor that recovers the audio
//! elementary stream, the RDS scanner, and the metadata interleaver in
//! front of the output. Bytes go in through [`Demultiplexer::push`] in
//! chunks of any size; audio with spliced-in `StreamTitle` blocks comes
//! out on the supplied writer.
//!
//! The pipeline is strictly single-threaded: every component runs on the
//! caller's thread and the only suspension points are the blocking writes
//! on the output.

pub mod cache;
pub mod channel;
pub mod config;
pub mod context;
pub mod demux;
pub mod error;
pub mod extractor;
pub mod pes;
pub mod shoutcast;

pub use cache::CachedParams;
pub use config::CastConfig;
pub use context::ProgrammeState;
pub use demux::Demultiplexer;
pub use error::CastError;
pub use shoutcast::{METAINT, ShoutcastWriter};

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, CastError>;
