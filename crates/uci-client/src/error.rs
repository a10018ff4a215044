//! Engine failure taxonomy.

use thiserror::Error;

/// Errors raised by engine clients.
///
/// The set is flat: every failure a client can hit is classified into
/// exactly one of these kinds, including I/O failures on the process
/// pipes (those re-check the child's exit status and are reported as
/// the matching process-level variant).
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine binary could not be started (missing, unreadable,
    /// or not executable).
    #[error("failed to launch engine: {0}")]
    Launch(String),
    /// The position failed chess-rules validation. Raised before any
    /// protocol traffic is written.
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    /// An option or search command could not be constructed.
    #[error("invalid option: {0}")]
    OptionValidation(String),
    /// No `bestmove` arrived within the requested time budget.
    #[error("engine produced no bestmove within {0} ms")]
    Timeout(u64),
    /// The engine process was killed by the OS for resource exhaustion.
    #[error("engine killed by the OS: {0}")]
    Resource(String),
    /// The engine process died abnormally mid-request.
    #[error("engine crashed: {0}")]
    Crash(String),
    /// The engine process exited with a plain exit code mid-request.
    #[error("engine exited with code {0}")]
    Process(i32),
    /// A received line violates the protocol grammar.
    #[error("malformed engine output: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let launch = EngineError::Launch("no such file".to_string());
        assert!(launch.to_string().contains("failed to launch"));

        let timeout = EngineError::Timeout(250);
        assert!(timeout.to_string().contains("250 ms"));

        let process = EngineError::Process(42);
        assert!(process.to_string().contains("42"));

        let parse = EngineError::Parse("info foo bar baz".to_string());
        assert!(parse.to_string().contains("info foo bar baz"));
    }
}
