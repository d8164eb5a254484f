//! Game ingestion
//!
//! Replays a finished game, evaluates every move the player under review
//! made, and records the ones that were blunders. A position whose
//! evaluation is unavailable is skipped and counted, never treated as "no
//! blunder"; it will be seen again the next time the game is ingested.

use crate::error::{Error, Result};
use crate::evaluator::{Analyzer, MoveClass, MoveEvaluator};
use crate::parser::ParsedGame;
use crate::position::{move_to_uci, Color, Position};
use crate::store::{Database, NewBlunder};

/// Totals for one scanned game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Player positions that were evaluated.
    pub positions_evaluated: u32,
    /// Blunders recorded (or re-recorded) in the store.
    pub blunders_recorded: u32,
    /// Player positions skipped because evaluation was unavailable.
    pub skipped: u32,
}

/// Scans finished games for blunders and feeds the record store.
pub struct BlunderScanner<'a, A: Analyzer> {
    evaluator: &'a mut MoveEvaluator<A>,
    store: &'a Database,
}

impl<'a, A: Analyzer> BlunderScanner<'a, A> {
    pub fn new(evaluator: &'a mut MoveEvaluator<A>, store: &'a Database) -> Self {
        Self { evaluator, store }
    }

    /// Replays `game` and records every blunder by `username`. Fails with
    /// [`Error::Pgn`] when the player is not in the game; stops early with
    /// a warning when the movetext goes bad.
    pub fn scan_game(
        &mut self,
        game: &ParsedGame,
        username: &str,
        now: u64,
    ) -> Result<ScanSummary> {
        let color = player_color(game, username)?;
        let source = game.summary();

        let mut summary = ScanSummary::default();
        let mut position = Position::start();

        for (ply, san_text) in game.moves.iter().enumerate() {
            let mv = match position.parse_move(san_text) {
                Ok(mv) => mv,
                Err(_) => {
                    tracing::warn!(ply, san = %san_text, "unparseable move, stopping scan");
                    break;
                }
            };

            let is_player_move = (ply % 2 == 0) == (color == Color::White);
            if is_player_move {
                match self.evaluator.score_moves(&position) {
                    Ok(scored) => {
                        summary.positions_evaluated += 1;
                        let played_uci = move_to_uci(&mv);

                        if self.evaluator.classify_played(&scored, &played_uci)?
                            == MoveClass::Blunder
                        {
                            let set = self.evaluator.acceptable(&scored);
                            let played_cp = scored
                                .iter()
                                .find(|m| m.uci == played_uci)
                                .map(|m| m.score_cp)
                                .unwrap_or(set.best_score());
                            let record = NewBlunder {
                                fen: position.canonical(),
                                played_uci,
                                played_san: san_text.trim().to_string(),
                                acceptable: set.uci_moves(),
                                cp_loss: (set.best_score() - played_cp).max(0),
                                source: Some(source.clone()),
                            };
                            self.store.record_blunder(&record, now)?;
                            summary.blunders_recorded += 1;
                        }
                    }
                    Err(Error::EvaluationUnavailable(reason)) => {
                        summary.skipped += 1;
                        tracing::warn!(ply, %reason, "evaluation unavailable, skipping position");
                    }
                    Err(e) => return Err(e),
                }
            }

            position = position.apply(mv)?;
        }

        Ok(summary)
    }
}

fn player_color(game: &ParsedGame, username: &str) -> Result<Color> {
    let played_by = |name: &Option<String>| {
        name.as_deref()
            .map(|n| n.eq_ignore_ascii_case(username))
            .unwrap_or(false)
    };
    if played_by(&game.white) {
        Ok(Color::White)
    } else if played_by(&game.black) {
        Ok(Color::Black)
    } else {
        Err(Error::Pgn(format!(
            "{} did not play in {}",
            username,
            game.summary()
        )))
    }
}
