use thiserror::Error;

/// Hard pipeline errors. Soft conditions (CRC failures, malformed
/// sections, continuity breaks) never surface here - they are logged and
/// the affected state is reset in place.
#[derive(Error, Debug)]
pub enum CastError {
    /// The downstream writer failed; usually the listener hung up.
    #[error("output write failed: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecoverable loss of transport stream synchronisation.
    #[error(transparent)]
    Ts(#[from] ts::TsError),
}

impl CastError {
    /// True when the error came from the output side. A closed listener is
    /// a normal way for a streaming session to end, not a failure of the
    /// pipeline itself.
    pub fn is_downstream(&self) -> bool {
        matches!(self, CastError::Io(_))
    }
}
