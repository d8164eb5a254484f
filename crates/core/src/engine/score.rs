//! Evaluation scores reported by analysis backends

use std::fmt;

/// Centipawn value a forced mate saturates to.
pub const MATE_CP: i32 = 10_000;

/// A single evaluation, from the perspective of the side to move in the
/// position it was computed for. Scores are only comparable among moves
/// evaluated from the same position under the same budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawns (positive = side to move is better).
    Cp(i32),
    /// Moves until forced mate (positive = side to move mates).
    Mate(i32),
}

impl Score {
    /// Collapses to a centipawn-equivalent value, saturating mates at
    /// [`MATE_CP`] so they dominate any material evaluation.
    pub fn to_cp(self) -> i32 {
        match self {
            Score::Cp(cp) => cp.clamp(-MATE_CP, MATE_CP),
            Score::Mate(m) => {
                if m > 0 {
                    MATE_CP
                } else {
                    -MATE_CP
                }
            }
        }
    }

    /// The same line seen from the opponent's side.
    pub fn flip(self) -> Score {
        match self {
            Score::Cp(cp) => Score::Cp(-cp),
            Score::Mate(m) => Score::Mate(-m),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => {
                let pawns = *cp as f32 / 100.0;
                if pawns >= 0.0 {
                    write!(f, "+{:.2}", pawns)
                } else {
                    write!(f, "{:.2}", pawns)
                }
            }
            Score::Mate(m) => write!(f, "M{}", m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mates_saturate() {
        assert_eq!(Score::Mate(3).to_cp(), MATE_CP);
        assert_eq!(Score::Mate(-2).to_cp(), -MATE_CP);
        // "mate 0": the side to move is mated.
        assert_eq!(Score::Mate(0).to_cp(), -MATE_CP);
    }

    #[test]
    fn flip_negates_perspective() {
        assert_eq!(Score::Cp(35).flip(), Score::Cp(-35));
        assert_eq!(Score::Mate(2).flip(), Score::Mate(-2));
        assert_eq!(Score::Cp(35).flip().to_cp(), -35);
    }

    #[test]
    fn display_formats() {
        assert_eq!(Score::Cp(127).to_string(), "+1.27");
        assert_eq!(Score::Cp(-50).to_string(), "-0.50");
        assert_eq!(Score::Mate(-4).to_string(), "M-4");
    }
}
