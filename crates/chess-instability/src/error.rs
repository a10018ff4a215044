//! Analyzer failure taxonomy.

use thiserror::Error;
use uci_client::EngineError;

use crate::cache::CacheError;

/// Every failure `analyse_instability` can surface.
///
/// Engine and cache failures are re-mapped into this flat set at the
/// analyzer boundary; nothing propagates verbatim.
#[derive(Error, Debug)]
pub enum InstabilityError {
    /// `depth` or the sample count is zero or above its configured
    /// maximum.
    #[error("invalid parameter: {0}")]
    Parameter(String),
    /// The FEN string is empty or whitespace-only.
    #[error("FEN must not be empty")]
    EmptyFen,
    /// The FEN string failed chess-rules validation.
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    /// The engine produced fewer usable samples than requested.
    #[error("insufficient samples: engine produced {have} of {want}")]
    InsufficientSamples { have: usize, want: u32 },
    /// The engine process was killed by the OS for resource exhaustion.
    #[error("engine killed by the OS: {0}")]
    Resource(String),
    /// The engine missed its time budget.
    #[error("engine timed out after {0} ms")]
    EngineTimeout(u64),
    /// The engine process died abnormally.
    #[error("engine crashed: {0}")]
    EngineCrash(String),
    /// The engine binary could not be started.
    #[error("failed to launch engine: {0}")]
    EngineLaunch(String),
    /// The engine process exited with a plain exit code mid-request.
    #[error("engine exited with code {0}")]
    EngineProcess(i32),
    /// The engine emitted output outside the protocol grammar.
    #[error("malformed engine output: {0}")]
    EngineParse(String),
    /// An option or search command could not be constructed.
    #[error("invalid option: {0}")]
    OptionValidation(String),
    /// The cache store failed transiently and retries were exhausted.
    #[error("cache store failure: {0}")]
    Database(String),
    /// The cache store reported structural corruption.
    #[error("cache store corruption: {0}")]
    DbCorruption(String),
}

impl From<EngineError> for InstabilityError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Launch(msg) => Self::EngineLaunch(msg),
            EngineError::InvalidFen(msg) => Self::InvalidFen(msg),
            EngineError::OptionValidation(msg) => Self::OptionValidation(msg),
            EngineError::Timeout(ms) => Self::EngineTimeout(ms),
            EngineError::Resource(msg) => Self::Resource(msg),
            EngineError::Crash(msg) => Self::EngineCrash(msg),
            EngineError::Process(code) => Self::EngineProcess(code),
            EngineError::Parse(msg) => Self::EngineParse(msg),
        }
    }
}

impl From<CacheError> for InstabilityError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Transient(msg) => Self::Database(msg),
            CacheError::Corruption(msg) => Self::DbCorruption(msg),
        }
    }
}
