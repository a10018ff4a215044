//! Position evaluation types.

/// Score reported by an engine for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawn score (100 = one pawn advantage), signed, unclamped.
    Centipawns(i32),
    /// Mate in N moves (positive = side to move wins).
    Mate(i32),
}

/// Evaluation parsed from one engine info line.
///
/// At most one score is present (`None` covers terminal positions with
/// nothing to report). The principal variation is order-preserving and
/// may be empty. Values are immutable once constructed; during a search
/// each later info line supersedes the previous evaluation for that
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Evaluation {
    /// Centipawn or mate score, if the engine reported one.
    pub score: Option<Score>,
    /// Predicted best line, as opaque move tokens.
    pub pv: Vec<String>,
}

impl Evaluation {
    /// Evaluation with a centipawn score and no line.
    pub fn centipawns(cp: i32) -> Self {
        Self {
            score: Some(Score::Centipawns(cp)),
            pv: Vec::new(),
        }
    }

    /// Evaluation with a mate score and no line.
    pub fn mate(moves: i32) -> Self {
        Self {
            score: Some(Score::Mate(moves)),
            pv: Vec::new(),
        }
    }

    /// Attach a principal variation.
    pub fn with_pv<I, S>(mut self, pv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pv = pv.into_iter().map(Into::into).collect();
        self
    }

    /// Centipawn score, if this evaluation carries one.
    pub fn score_cp(&self) -> Option<i32> {
        match self.score {
            Some(Score::Centipawns(cp)) => Some(cp),
            _ => None,
        }
    }

    /// Mate distance, if this evaluation carries one.
    pub fn mate_in(&self) -> Option<i32> {
        match self.score {
            Some(Score::Mate(m)) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centipawn_accessors() {
        let eval = Evaluation::centipawns(-150);
        assert_eq!(eval.score_cp(), Some(-150));
        assert_eq!(eval.mate_in(), None);
        assert!(eval.pv.is_empty());
    }

    #[test]
    fn test_mate_accessors() {
        let eval = Evaluation::mate(3).with_pv(["h1h8"]);
        assert_eq!(eval.score_cp(), None);
        assert_eq!(eval.mate_in(), Some(3));
        assert_eq!(eval.pv, vec!["h1h8"]);
    }

    #[test]
    fn test_default_has_no_score() {
        let eval = Evaluation::default();
        assert_eq!(eval.score, None);
        assert!(eval.pv.is_empty());
    }
}
