use thiserror::Error;

/// Errors that can occur during TS parsing
#[derive(Error, Debug)]
pub enum TsError {
    #[error("Invalid packet size: expected 188 bytes, got {0}")]
    InvalidPacketSize(usize),

    #[error("Invalid sync byte: expected 0x47, got 0x{0:02x}")]
    InvalidSyncByte(u8),

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Invalid table ID: expected 0x{expected:02x}, got 0x{actual:02x}")]
    InvalidTableId { expected: u8, actual: u8 },

    #[error("Invalid section length: {0}")]
    InvalidSectionLength(u16),

    #[error("Lost synchronisation after {0} consecutive attempts")]
    SyncLost(u16),

    #[error("Parse error: {0}")]
    ParseError(String),
}
