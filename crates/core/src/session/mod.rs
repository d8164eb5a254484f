//! Drill sessions
//!
//! One sitting of reviews: a queue of due records walked through the phases
//! Idle -> Presenting -> AwaitingMove -> Evaluating -> Feedback and back.
//! The session is an explicit owned value handed to every operation; there
//! is no process-wide current session. Sessions are never persisted.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::evaluator::{Analyzer, MoveEvaluator};
use crate::position::{move_to_uci, Color, Position};
use crate::scheduler::{Outcome, ReviewSchedule};
use crate::store::{BlunderRecord, Database};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Presenting,
    AwaitingMove,
    /// Transient while a submitted move is being judged; a session never
    /// rests here between calls.
    Evaluating,
    Feedback,
}

/// What the player gets to see for the current record. The acceptable-move
/// set is deliberately absent until feedback.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub record_id: i64,
    pub fen: String,
    pub side_to_move: Color,
    /// The move originally played here, for context after the attempt.
    pub played_san: String,
    /// How often this blunder has been repeated in real games.
    pub frequency: u32,
}

/// Verdict on one submitted move.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub outcome: Outcome,
    /// The submitted move was in the acceptable set that was used.
    pub matched: bool,
    /// The verdict was judged against the stored snapshot because fresh
    /// evaluation was unavailable.
    pub provisional: bool,
    pub submitted_uci: String,
    /// The acceptable set the verdict was judged against.
    pub acceptable: Vec<String>,
}

/// An in-progress drill sitting. Owned by the caller, discarded at the end;
/// the store remains the single source of truth for statistics.
#[derive(Debug)]
pub struct DrillSession {
    queue: VecDeque<BlunderRecord>,
    current: Option<BlunderRecord>,
    pending: Option<Feedback>,
    phase: SessionPhase,
}

impl DrillSession {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current_record(&self) -> Option<&BlunderRecord> {
        self.current.as_ref()
    }

    /// Records still ahead, the current one included.
    pub fn remaining(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }
}

/// Orchestrates drill sessions against the store and the evaluator.
pub struct SessionController<'a, A: Analyzer> {
    store: &'a Database,
    evaluator: &'a mut MoveEvaluator<A>,
    schedule: ReviewSchedule,
}

impl<'a, A: Analyzer> SessionController<'a, A> {
    pub fn new(
        store: &'a Database,
        evaluator: &'a mut MoveEvaluator<A>,
        schedule: ReviewSchedule,
    ) -> Self {
        Self {
            store,
            evaluator,
            schedule,
        }
    }

    /// Pulls up to `limit` due records and opens the session on the first,
    /// or Idle when nothing is due.
    pub fn start(&mut self, limit: u32, now: u64) -> Result<DrillSession> {
        let mut queue: VecDeque<BlunderRecord> = self.store.fetch_due(now, limit)?.into();
        let current = queue.pop_front();
        let phase = if current.is_some() {
            SessionPhase::Presenting
        } else {
            SessionPhase::Idle
        };
        Ok(DrillSession {
            queue,
            current,
            pending: None,
            phase,
        })
    }

    /// Hands out the current position and moves to AwaitingMove. Returns
    /// None unless the session is in Presenting.
    pub fn present(&self, session: &mut DrillSession) -> Result<Option<Prompt>> {
        if session.phase != SessionPhase::Presenting {
            return Ok(None);
        }
        let Some(record) = session.current.as_ref() else {
            return Ok(None);
        };

        let position = Position::parse(&record.fen)?;
        let prompt = Prompt {
            record_id: record.id,
            fen: record.fen.clone(),
            side_to_move: position.turn(),
            played_san: record.played_san.clone(),
            frequency: record.frequency,
        };
        session.phase = SessionPhase::AwaitingMove;
        Ok(Some(prompt))
    }

    /// Judges a submitted move and enters Feedback.
    ///
    /// The acceptable set is recomputed fresh; if evaluation is unavailable
    /// the stored snapshot is used instead and the verdict is flagged
    /// provisional. An illegal or unparseable move fails with
    /// [`Error::IllegalMove`] and leaves the session in AwaitingMove, so
    /// the player can try again.
    pub fn submit(&mut self, session: &mut DrillSession, move_text: &str) -> Result<Feedback> {
        if session.phase != SessionPhase::AwaitingMove {
            return Err(Error::IllegalMove(
                "no drill position is awaiting a move".to_string(),
            ));
        }
        let Some(record) = session.current.as_ref() else {
            return Err(Error::IllegalMove(
                "no drill position is awaiting a move".to_string(),
            ));
        };

        let position = Position::parse(&record.fen)?;
        let mv = position.parse_move(move_text)?;
        let uci = move_to_uci(&mv);

        session.phase = SessionPhase::Evaluating;
        let (matched, provisional, acceptable) = match self.evaluator.score_moves(&position) {
            Ok(scored) => {
                let set = self.evaluator.acceptable(&scored);
                (set.contains(&uci), false, set.uci_moves())
            }
            Err(Error::EvaluationUnavailable(reason)) => {
                tracing::warn!(%reason, "fresh evaluation unavailable, using stored snapshot");
                (
                    record.acceptable.iter().any(|m| *m == uci),
                    true,
                    record.acceptable.clone(),
                )
            }
            Err(e) => {
                session.phase = SessionPhase::AwaitingMove;
                return Err(e);
            }
        };

        let outcome = if provisional {
            Outcome::Provisional
        } else if matched {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        };

        let feedback = Feedback {
            outcome,
            matched,
            provisional,
            submitted_uci: uci,
            acceptable,
        };
        session.pending = Some(feedback.clone());
        session.phase = SessionPhase::Feedback;
        Ok(feedback)
    }

    /// Leaves Feedback: reports the outcome to the store, then presents the
    /// next record or goes Idle when the queue is exhausted. A storage
    /// failure aborts the session cleanly to Idle (nothing was partially
    /// committed) and propagates.
    pub fn next(&mut self, session: &mut DrillSession, now: u64) -> Result<SessionPhase> {
        if session.phase != SessionPhase::Feedback {
            return Ok(session.phase);
        }

        let record = session.current.take();
        let feedback = session.pending.take();
        if let (Some(record), Some(feedback)) = (record, feedback) {
            if let Err(e) =
                self.store
                    .update_statistics(record.id, feedback.outcome, &self.schedule, now)
            {
                session.queue.clear();
                session.phase = SessionPhase::Idle;
                return Err(e);
            }
        }

        session.current = session.queue.pop_front();
        session.phase = if session.current.is_some() {
            SessionPhase::Presenting
        } else {
            SessionPhase::Idle
        };
        Ok(session.phase)
    }

    /// Abandons the session. An attempt only counts once a verdict was
    /// reached: from Feedback the pending outcome is still reported, from
    /// any earlier phase the in-flight record is left untouched.
    pub fn abandon(&mut self, session: &mut DrillSession, now: u64) -> Result<()> {
        let result = if session.phase == SessionPhase::Feedback {
            match (session.current.as_ref(), session.pending.as_ref()) {
                (Some(record), Some(feedback)) => self
                    .store
                    .update_statistics(record.id, feedback.outcome, &self.schedule, now)
                    .map(|_| ()),
                _ => Ok(()),
            }
        } else {
            Ok(())
        };

        session.queue.clear();
        session.current = None;
        session.pending = None;
        session.phase = SessionPhase::Idle;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DrillConfig;
    use crate::scheduler::Stage;
    use crate::store::NewBlunder;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Scores d1h5 as losing and the knight/bishop developments as strong,
    /// everything else clearly worse. Flips to unavailable on demand.
    struct StubAnalyzer {
        unavailable: bool,
    }

    impl Analyzer for StubAnalyzer {
        fn evaluate(
            &mut self,
            _fen: &str,
            moves: &[String],
            _budget: Duration,
        ) -> crate::error::Result<HashMap<String, i32>> {
            if self.unavailable {
                return Err(Error::EvaluationUnavailable("stub offline".into()));
            }
            let table: HashMap<&str, i32> =
                [("g1f3", 50), ("b1c3", 40), ("f1c4", 35), ("d1h5", -120)]
                    .into_iter()
                    .collect();
            Ok(moves
                .iter()
                .map(|m| (m.clone(), table.get(m.as_str()).copied().unwrap_or(-200)))
                .collect())
        }
    }

    fn fen_after_e4_e5() -> String {
        Position::start()
            .apply_uci("e2e4")
            .unwrap()
            .apply_uci("e7e5")
            .unwrap()
            .canonical()
    }

    fn seed_record(db: &Database) -> BlunderRecord {
        db.record_blunder(
            &NewBlunder {
                fen: fen_after_e4_e5(),
                played_uci: "d1h5".to_string(),
                played_san: "Qh5".to_string(),
                acceptable: vec!["g1f3".to_string(), "b1c3".to_string(), "f1c4".to_string()],
                cp_loss: 170,
                source: None,
            },
            0,
        )
        .unwrap()
    }

    fn evaluator(unavailable: bool) -> MoveEvaluator<StubAnalyzer> {
        MoveEvaluator::new(StubAnalyzer { unavailable }, &DrillConfig::default())
    }

    #[test]
    fn empty_store_starts_idle() {
        let db = Database::open_in_memory().unwrap();
        let mut eval = evaluator(false);
        let mut controller = SessionController::new(&db, &mut eval, ReviewSchedule::default());
        let mut session = controller.start(10, 100).unwrap();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(controller.present(&mut session).unwrap().is_none());
    }

    #[test]
    fn strong_alternative_is_correct() {
        let db = Database::open_in_memory().unwrap();
        let record = seed_record(&db);
        let mut eval = evaluator(false);
        let mut controller = SessionController::new(&db, &mut eval, ReviewSchedule::default());

        let mut session = controller.start(10, 100).unwrap();
        assert_eq!(session.phase(), SessionPhase::Presenting);

        let prompt = controller.present(&mut session).unwrap().unwrap();
        assert_eq!(prompt.record_id, record.id);
        assert_eq!(prompt.side_to_move, Color::White);
        assert_eq!(session.phase(), SessionPhase::AwaitingMove);

        // Nc3 is within tolerance of the best move.
        let feedback = controller.submit(&mut session, "Nc3").unwrap();
        assert_eq!(feedback.outcome, Outcome::Correct);
        assert!(feedback.matched);
        assert!(!feedback.provisional);
        assert_eq!(session.phase(), SessionPhase::Feedback);

        assert_eq!(controller.next(&mut session, 200).unwrap(), SessionPhase::Idle);
        let stored = db.fetch_record(record.id).unwrap();
        assert_eq!(stored.stats.stage, Stage::Learning);
        assert_eq!(stored.stats.attempts, 1);
        assert_eq!(stored.stats.last_outcome, Some(Outcome::Correct));
    }

    #[test]
    fn repeating_the_original_blunder_is_incorrect() {
        let db = Database::open_in_memory().unwrap();
        let record = seed_record(&db);
        let mut eval = evaluator(false);
        let mut controller = SessionController::new(&db, &mut eval, ReviewSchedule::default());

        let mut session = controller.start(10, 100).unwrap();
        controller.present(&mut session).unwrap().unwrap();

        // The historically played move is judged like any other.
        let feedback = controller.submit(&mut session, "Qh5").unwrap();
        assert_eq!(feedback.outcome, Outcome::Incorrect);
        assert!(!feedback.matched);
        assert!(feedback.acceptable.contains(&"g1f3".to_string()));
        assert!(!feedback.acceptable.contains(&"d1h5".to_string()));

        controller.next(&mut session, 200).unwrap();
        let stored = db.fetch_record(record.id).unwrap();
        assert_eq!(stored.stats.stage, Stage::Learning);
        assert_eq!(stored.stats.misses, 1);
        assert_eq!(stored.stats.due_at, 200);
    }

    #[test]
    fn illegal_input_keeps_the_session_alive() {
        let db = Database::open_in_memory().unwrap();
        seed_record(&db);
        let mut eval = evaluator(false);
        let mut controller = SessionController::new(&db, &mut eval, ReviewSchedule::default());

        let mut session = controller.start(10, 100).unwrap();
        controller.present(&mut session).unwrap().unwrap();

        assert!(matches!(
            controller.submit(&mut session, "Ke3"),
            Err(Error::IllegalMove(_))
        ));
        assert_eq!(session.phase(), SessionPhase::AwaitingMove);

        // A legal retry still works.
        let feedback = controller.submit(&mut session, "Nf3").unwrap();
        assert_eq!(feedback.outcome, Outcome::Correct);
    }

    #[test]
    fn snapshot_fallback_is_provisional_and_freezes_scheduling() {
        let db = Database::open_in_memory().unwrap();
        let record = seed_record(&db);
        let mut eval = evaluator(true);
        let mut controller = SessionController::new(&db, &mut eval, ReviewSchedule::default());

        let mut session = controller.start(10, 100).unwrap();
        controller.present(&mut session).unwrap().unwrap();

        let feedback = controller.submit(&mut session, "Nf3").unwrap();
        assert_eq!(feedback.outcome, Outcome::Provisional);
        assert!(feedback.provisional);
        assert!(feedback.matched);
        assert_eq!(feedback.acceptable, record.acceptable);

        controller.next(&mut session, 200).unwrap();
        let stored = db.fetch_record(record.id).unwrap();
        assert_eq!(stored.stats.attempts, 1);
        assert_eq!(stored.stats.last_outcome, Some(Outcome::Provisional));
        // Stage and due time are untouched by a provisional verdict.
        assert_eq!(stored.stats.stage, Stage::New);
        assert_eq!(stored.stats.due_at, record.stats.due_at);
    }

    #[test]
    fn abandoning_before_a_verdict_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let record = seed_record(&db);
        let before = db.fetch_record(record.id).unwrap();

        let mut eval = evaluator(false);
        let mut controller = SessionController::new(&db, &mut eval, ReviewSchedule::default());
        let mut session = controller.start(10, 100).unwrap();
        controller.present(&mut session).unwrap().unwrap();
        assert_eq!(session.phase(), SessionPhase::AwaitingMove);

        controller.abandon(&mut session, 150).unwrap();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.remaining(), 0);

        let after = db.fetch_record(record.id).unwrap();
        assert_eq!(after.stats, before.stats);
        assert_eq!(after.version, before.version);
    }

    #[test]
    fn abandoning_after_a_verdict_still_reports_it() {
        let db = Database::open_in_memory().unwrap();
        let record = seed_record(&db);
        let mut eval = evaluator(false);
        let mut controller = SessionController::new(&db, &mut eval, ReviewSchedule::default());

        let mut session = controller.start(10, 100).unwrap();
        controller.present(&mut session).unwrap().unwrap();
        controller.submit(&mut session, "Qh5").unwrap();
        assert_eq!(session.phase(), SessionPhase::Feedback);

        controller.abandon(&mut session, 150).unwrap();
        let stored = db.fetch_record(record.id).unwrap();
        assert_eq!(stored.stats.attempts, 1);
        assert_eq!(stored.stats.misses, 1);
    }

    #[test]
    fn queue_walks_in_due_order() {
        let db = Database::open_in_memory().unwrap();
        let fen = fen_after_e4_e5();
        let first = db
            .record_blunder(
                &NewBlunder {
                    fen: fen.clone(),
                    played_uci: "d1h5".to_string(),
                    played_san: "Qh5".to_string(),
                    acceptable: vec!["g1f3".to_string()],
                    cp_loss: 170,
                    source: None,
                },
                10,
            )
            .unwrap();
        let second = db
            .record_blunder(
                &NewBlunder {
                    fen,
                    played_uci: "g2g4".to_string(),
                    played_san: "g4".to_string(),
                    acceptable: vec!["g1f3".to_string()],
                    cp_loss: 260,
                    source: None,
                },
                20,
            )
            .unwrap();

        let mut eval = evaluator(false);
        let mut controller = SessionController::new(&db, &mut eval, ReviewSchedule::default());
        let mut session = controller.start(10, 100).unwrap();
        assert_eq!(session.remaining(), 2);

        let prompt = controller.present(&mut session).unwrap().unwrap();
        assert_eq!(prompt.record_id, first.id);
        controller.submit(&mut session, "Nf3").unwrap();
        assert_eq!(
            controller.next(&mut session, 110).unwrap(),
            SessionPhase::Presenting
        );

        let prompt = controller.present(&mut session).unwrap().unwrap();
        assert_eq!(prompt.record_id, second.id);
        controller.submit(&mut session, "Nf3").unwrap();
        assert_eq!(controller.next(&mut session, 120).unwrap(), SessionPhase::Idle);
    }
}
