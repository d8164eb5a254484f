//! Move scoring and classification
//!
//! The evaluator does not compute scores itself; it orchestrates requests to
//! an [`Analyzer`] backend, enforces the time budget and retry policy, and
//! turns raw centipawn maps into classifications and acceptable-move sets.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::DrillConfig;
use crate::error::{Error, Result};
use crate::position::Position;

/// External analysis collaborator.
///
/// Returns a centipawn score per requested move, from the perspective of
/// the side to move in `fen`. All moves in one call must be scored under a
/// comparable budget; scores from different calls are not comparable.
pub trait Analyzer {
    fn evaluate(
        &mut self,
        fen: &str,
        moves: &[String],
        budget: Duration,
    ) -> Result<HashMap<String, i32>>;
}

/// A legal move paired with its evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMove {
    pub uci: String,
    pub score_cp: i32,
}

/// Quality classification of a played move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveClass {
    Acceptable,
    Blunder,
}

/// The legal moves judged good enough: everything scoring within the
/// tolerance band below the best move. Non-empty whenever the position has
/// any legal move, since the best move is always within tolerance of itself.
#[derive(Debug, Clone)]
pub struct AcceptableMoveSet {
    moves: Vec<ScoredMove>,
    best_score: i32,
}

impl AcceptableMoveSet {
    pub fn contains(&self, uci: &str) -> bool {
        self.moves.iter().any(|m| m.uci == uci)
    }

    pub fn uci_moves(&self) -> Vec<String> {
        self.moves.iter().map(|m| m.uci.clone()).collect()
    }

    pub fn best_score(&self) -> i32 {
        self.best_score
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredMove> {
        self.moves.iter()
    }
}

/// Every move within `tolerance_cp` of the best score. `scored` must be
/// sorted best-first, as returned by [`MoveEvaluator::score_moves`].
pub fn acceptable_set(scored: &[ScoredMove], tolerance_cp: i32) -> AcceptableMoveSet {
    let best_score = scored.first().map(|m| m.score_cp).unwrap_or(0);
    let moves = scored
        .iter()
        .filter(|m| best_score - m.score_cp <= tolerance_cp)
        .cloned()
        .collect();
    AcceptableMoveSet { moves, best_score }
}

/// Classifies the played move against the best available score. The
/// boundary is inclusive: a move exactly `tolerance_cp` below the best is
/// still acceptable.
pub fn classify(scored: &[ScoredMove], played_uci: &str, tolerance_cp: i32) -> Result<MoveClass> {
    let played = scored
        .iter()
        .find(|m| m.uci == played_uci)
        .ok_or_else(|| Error::IllegalMove(played_uci.to_string()))?;
    let best = scored[0].score_cp;
    if best - played.score_cp > tolerance_cp {
        Ok(MoveClass::Blunder)
    } else {
        Ok(MoveClass::Acceptable)
    }
}

/// Scores positions through an [`Analyzer`] with a bounded budget and a
/// single retry before unavailability surfaces to the caller.
pub struct MoveEvaluator<A: Analyzer> {
    analyzer: A,
    budget: Duration,
    retries: u32,
    tolerance_cp: i32,
}

impl<A: Analyzer> MoveEvaluator<A> {
    pub fn new(analyzer: A, config: &DrillConfig) -> Self {
        Self {
            analyzer,
            budget: config.eval_budget(),
            retries: config.eval_retries,
            tolerance_cp: config.tolerance_cp,
        }
    }

    pub fn tolerance_cp(&self) -> i32 {
        self.tolerance_cp
    }

    /// Scores every legal move of `position`, sorted best-first with ties
    /// broken by move text so ordering is reproducible. An incomplete score
    /// map counts as unavailability: partial scores are not comparable.
    ///
    /// Terminal positions (no legal moves) yield an empty list.
    pub fn score_moves(&mut self, position: &Position) -> Result<Vec<ScoredMove>> {
        let moves = position.legal_moves_uci();
        if moves.is_empty() {
            return Ok(Vec::new());
        }

        let fen = position.canonical();
        let mut attempt = 0;
        let scores = loop {
            match self.analyzer.evaluate(&fen, &moves, self.budget) {
                Ok(scores) => break scores,
                Err(Error::EvaluationUnavailable(reason)) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(%reason, attempt, "evaluation failed, retrying");
                }
                Err(e) => return Err(e),
            }
        };

        let mut scored = Vec::with_capacity(moves.len());
        for uci in moves {
            match scores.get(&uci) {
                Some(&score_cp) => scored.push(ScoredMove { uci, score_cp }),
                None => {
                    return Err(Error::EvaluationUnavailable(format!(
                        "backend returned no score for {}",
                        uci
                    )))
                }
            }
        }
        scored.sort_by(|a, b| {
            b.score_cp
                .cmp(&a.score_cp)
                .then_with(|| a.uci.cmp(&b.uci))
        });
        Ok(scored)
    }

    /// [`classify`] with the configured tolerance.
    pub fn classify_played(&self, scored: &[ScoredMove], played_uci: &str) -> Result<MoveClass> {
        classify(scored, played_uci, self.tolerance_cp)
    }

    /// [`acceptable_set`] with the configured tolerance.
    pub fn acceptable(&self, scored: &[ScoredMove]) -> AcceptableMoveSet {
        acceptable_set(scored, self.tolerance_cp)
    }
}
