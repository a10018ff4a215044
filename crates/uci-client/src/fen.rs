//! FEN legality gate.
//!
//! Position validation is delegated to the `chess` crate; this module
//! only translates its rejection into the engine error taxonomy.

use std::str::FromStr;

use chess::Board;

use crate::EngineError;

/// Checks that `fen` describes a legal position.
///
/// Runs before any protocol traffic so an illegal position never
/// reaches the engine process.
pub fn validate_fen(fen: &str) -> Result<(), EngineError> {
    Board::from_str(fen)
        .map(|_| ())
        .map_err(|e| EngineError::InvalidFen(format!("{}: {}", fen, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_startpos_is_valid() {
        assert!(validate_fen(STARTPOS).is_ok());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            validate_fen("this_is_not_a_fen"),
            Err(EngineError::InvalidFen(_))
        ));
        assert!(matches!(
            validate_fen("not/a/fen"),
            Err(EngineError::InvalidFen(_))
        ));
    }

    #[test]
    fn test_rejection_message_names_the_fen() {
        let err = validate_fen("not/a/fen").unwrap_err();
        assert!(err.to_string().contains("not/a/fen"));
    }
}
