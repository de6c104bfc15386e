//! MPEG-2 Transport Stream parsing for DVB radio services
//!
//! This crate provides the byte-level building blocks of the demultiplexer:
//! a resynchronising 188-byte packet framer, PSI/SI section aggregation with
//! CRC32 validation, and parsers for the PAT, PMT, SDT and EIT tables.

pub mod crc;
pub mod eit;
pub mod error;
pub mod framer;
pub mod packet;
pub mod pat;
pub mod pmt;
pub mod sdt;
pub mod section;
pub mod text;

pub use crate::crc::crc32;
pub use eit::{Eit, EitEvent};
pub use error::TsError;
pub use framer::Framer;
pub use packet::{PID_EIT, PID_NULL, PID_PAT, PID_SDT, SYNC_BYTE, TS_PACKET_SIZE, TsPacket};
pub use pat::{Pat, PatProgram};
pub use pmt::{Descriptor, Pmt, PmtStream, StreamType};
pub use sdt::{Sdt, SdtService};
pub use section::SectionAggregator;

/// Result type for TS parsing operations
pub type Result<T> = std::result::Result<T, TsError>;
