//! Outbound UCI command construction.
//!
//! Everything written to an engine's stdin is assembled here so the wire
//! format can be tested without spawning a process.

use crate::EngineError;

/// Bounds for one `go` request.
///
/// Both fields may be set, either, or neither (neither means "search
/// until further notice"). Zero values are rejected when the command is
/// built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchLimits {
    /// Maximum search depth in plies.
    pub depth: Option<u32>,
    /// Wall-clock search budget in milliseconds.
    pub time_ms: Option<u64>,
}

impl SearchLimits {
    /// Depth-bounded search.
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            time_ms: None,
        }
    }

    /// Time-bounded search.
    pub fn time(time_ms: u64) -> Self {
        Self {
            depth: None,
            time_ms: Some(time_ms),
        }
    }

    /// Search bounded by both depth and time.
    pub fn depth_and_time(depth: u32, time_ms: u64) -> Self {
        Self {
            depth: Some(depth),
            time_ms: Some(time_ms),
        }
    }

    /// Unbounded search.
    pub fn infinite() -> Self {
        Self::default()
    }
}

/// Builds the `go` command for the given limits.
///
/// Exactly four forms exist: bare `go`, depth-only, movetime-only, and
/// both. A zero depth or zero time budget is a contract violation.
pub fn build_go_command(limits: &SearchLimits) -> Result<String, EngineError> {
    if limits.depth == Some(0) {
        return Err(EngineError::OptionValidation(
            "search depth must be positive".to_string(),
        ));
    }
    if limits.time_ms == Some(0) {
        return Err(EngineError::OptionValidation(
            "movetime must be positive".to_string(),
        ));
    }

    Ok(match (limits.depth, limits.time_ms) {
        (None, None) => "go".to_string(),
        (Some(d), None) => format!("go depth {}", d),
        (None, Some(t)) => format!("go movetime {}", t),
        (Some(d), Some(t)) => format!("go depth {} movetime {}", d, t),
    })
}

/// Builds the position-selection command. The FEN is used verbatim.
pub fn build_position_command(fen: &str) -> String {
    format!("position fen {}", fen)
}

/// Builds a `setoption` command.
///
/// Names and values travel on one protocol line, so an empty name or an
/// embedded newline cannot be expressed and is rejected.
pub fn build_setoption_command(name: &str, value: &str) -> Result<String, EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::OptionValidation(
            "option name must not be empty".to_string(),
        ));
    }
    if name.contains('\n') || value.contains('\n') {
        return Err(EngineError::OptionValidation(format!(
            "option '{}' contains a line break",
            name.trim()
        )));
    }
    Ok(format!("setoption name {} value {}", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_command_all_four_forms() {
        assert_eq!(build_go_command(&SearchLimits::infinite()).unwrap(), "go");
        assert_eq!(
            build_go_command(&SearchLimits::depth(12)).unwrap(),
            "go depth 12"
        );
        assert_eq!(
            build_go_command(&SearchLimits::time(1500)).unwrap(),
            "go movetime 1500"
        );
        assert_eq!(
            build_go_command(&SearchLimits::depth_and_time(8, 300)).unwrap(),
            "go depth 8 movetime 300"
        );
    }

    #[test]
    fn test_go_command_rejects_zero_bounds() {
        assert!(matches!(
            build_go_command(&SearchLimits::depth(0)),
            Err(EngineError::OptionValidation(_))
        ));
        assert!(matches!(
            build_go_command(&SearchLimits::time(0)),
            Err(EngineError::OptionValidation(_))
        ));
    }

    #[test]
    fn test_position_command_uses_fen_verbatim() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        assert_eq!(build_position_command(fen), format!("position fen {}", fen));
    }

    #[test]
    fn test_setoption_command_format() {
        assert_eq!(
            build_setoption_command("Hash", "128").unwrap(),
            "setoption name Hash value 128"
        );
    }

    #[test]
    fn test_setoption_rejects_empty_name() {
        assert!(matches!(
            build_setoption_command("", "1"),
            Err(EngineError::OptionValidation(_))
        ));
        assert!(matches!(
            build_setoption_command("   ", "1"),
            Err(EngineError::OptionValidation(_))
        ));
    }

    #[test]
    fn test_setoption_rejects_line_breaks() {
        assert!(matches!(
            build_setoption_command("Hash", "1\nquit"),
            Err(EngineError::OptionValidation(_))
        ));
    }
}
