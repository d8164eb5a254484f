//! Drill scheduling
//!
//! A leveled review policy rather than a calendar algorithm: each record
//! moves through discrete stages, and the interval to its next eligibility
//! grows with the stage it advances into. All transitions are pure functions
//! of (statistics, outcome, schedule, now); "due" is computed on read, never
//! by background timers.

use serde::{Deserialize, Serialize};

/// Review stage of a blunder record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    New,
    Learning,
    Reviewing,
    Mastered,
}

impl Stage {
    pub fn advance(self) -> Stage {
        match self {
            Stage::New => Stage::Learning,
            Stage::Learning => Stage::Reviewing,
            Stage::Reviewing => Stage::Mastered,
            Stage::Mastered => Stage::Mastered,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Stage::New => 0,
            Stage::Learning => 1,
            Stage::Reviewing => 2,
            Stage::Mastered => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Stage> {
        match value {
            0 => Some(Stage::New),
            1 => Some(Stage::Learning),
            2 => Some(Stage::Reviewing),
            3 => Some(Stage::Mastered),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::New => "new",
            Stage::Learning => "learning",
            Stage::Reviewing => "reviewing",
            Stage::Mastered => "mastered",
        }
    }
}

/// Verdict of a single drill attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
    /// Judged against a stored snapshot because fresh evaluation was
    /// unavailable.
    Provisional,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Correct => "correct",
            Outcome::Incorrect => "incorrect",
            Outcome::Provisional => "provisional",
        }
    }

    pub fn from_str(value: &str) -> Option<Outcome> {
        match value {
            "correct" => Some(Outcome::Correct),
            "incorrect" => Some(Outcome::Incorrect),
            "provisional" => Some(Outcome::Provisional),
            _ => None,
        }
    }
}

/// Intervals (seconds) until the next review, per stage advanced into.
/// Tunable policy, not an algorithmic constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSchedule {
    pub learning_interval_secs: u64,
    pub reviewing_interval_secs: u64,
    pub mastered_interval_secs: u64,
}

impl Default for ReviewSchedule {
    fn default() -> Self {
        Self {
            learning_interval_secs: 86_400,       // 1 day
            reviewing_interval_secs: 604_800,     // 1 week
            mastered_interval_secs: 2_592_000,    // 30 days, archive candidate
        }
    }
}

impl ReviewSchedule {
    pub fn interval_after(&self, stage: Stage) -> u64 {
        match stage {
            Stage::New => 0,
            Stage::Learning => self.learning_interval_secs,
            Stage::Reviewing => self.reviewing_interval_secs,
            Stage::Mastered => self.mastered_interval_secs,
        }
    }
}

/// Review statistics of one blunder record. Owned by the store; the
/// scheduler only derives successor values through [`apply_outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub attempts: u32,
    pub correct_streak: u32,
    pub misses: u32,
    pub stage: Stage,
    pub due_at: u64,
    pub last_outcome: Option<Outcome>,
}

impl ReviewStats {
    /// Starting state: no attempts, stage New, eligible immediately.
    pub fn initial(now: u64) -> Self {
        Self {
            attempts: 0,
            correct_streak: 0,
            misses: 0,
            stage: Stage::New,
            due_at: now,
            last_outcome: None,
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        self.stage != Stage::Mastered && self.due_at <= now
    }
}

/// The statistics-update rule. Returns the successor statistics; never
/// mutates in place.
///
/// - Correct: advance one stage, push the due time out by the new stage's
///   interval, extend the streak.
/// - Incorrect: back to Learning (never below), due immediately, streak
///   reset, lifetime miss counted.
/// - Provisional: the verdict came from a stale snapshot, so it counts the
///   attempt but moves neither stage nor due time.
pub fn apply_outcome(
    stats: &ReviewStats,
    outcome: Outcome,
    schedule: &ReviewSchedule,
    now: u64,
) -> ReviewStats {
    let mut next = stats.clone();
    next.attempts = stats.attempts + 1;
    next.last_outcome = Some(outcome);

    match outcome {
        Outcome::Correct => {
            next.stage = stats.stage.advance();
            next.correct_streak = stats.correct_streak + 1;
            next.due_at = now + schedule.interval_after(next.stage);
        }
        Outcome::Incorrect => {
            next.stage = Stage::Learning;
            next.correct_streak = 0;
            next.misses = stats.misses + 1;
            next.due_at = now;
        }
        Outcome::Provisional => {}
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> ReviewSchedule {
        ReviewSchedule::default()
    }

    #[test]
    fn correct_advances_through_all_stages() {
        let mut stats = ReviewStats::initial(0);
        for (expected_stage, expected_interval) in [
            (Stage::Learning, 86_400),
            (Stage::Reviewing, 604_800),
            (Stage::Mastered, 2_592_000),
        ] {
            stats = apply_outcome(&stats, Outcome::Correct, &schedule(), 1_000);
            assert_eq!(stats.stage, expected_stage);
            assert_eq!(stats.due_at, 1_000 + expected_interval);
        }
        // Mastered is terminal.
        let again = apply_outcome(&stats, Outcome::Correct, &schedule(), 2_000);
        assert_eq!(again.stage, Stage::Mastered);
        assert_eq!(again.attempts, 4);
    }

    #[test]
    fn incorrect_regresses_to_learning_never_below() {
        let reviewing = ReviewStats {
            stage: Stage::Reviewing,
            correct_streak: 2,
            ..ReviewStats::initial(0)
        };
        let missed = apply_outcome(&reviewing, Outcome::Incorrect, &schedule(), 500);
        assert_eq!(missed.stage, Stage::Learning);
        assert_eq!(missed.correct_streak, 0);
        assert_eq!(missed.misses, 1);
        assert_eq!(missed.due_at, 500);

        // Already at Learning: stays there, does not fall to New.
        let again = apply_outcome(&missed, Outcome::Incorrect, &schedule(), 600);
        assert_eq!(again.stage, Stage::Learning);
        assert_eq!(again.misses, 2);
    }

    #[test]
    fn reviewing_branches_on_outcome() {
        let reviewing = ReviewStats {
            stage: Stage::Reviewing,
            ..ReviewStats::initial(0)
        };
        assert_eq!(
            apply_outcome(&reviewing, Outcome::Correct, &schedule(), 0).stage,
            Stage::Mastered
        );
        assert_eq!(
            apply_outcome(&reviewing, Outcome::Incorrect, &schedule(), 0).stage,
            Stage::Learning
        );
    }

    #[test]
    fn provisional_counts_the_attempt_but_freezes_scheduling() {
        let stats = ReviewStats {
            stage: Stage::Reviewing,
            due_at: 42,
            correct_streak: 1,
            ..ReviewStats::initial(0)
        };
        let next = apply_outcome(&stats, Outcome::Provisional, &schedule(), 9_999);
        assert_eq!(next.attempts, 1);
        assert_eq!(next.last_outcome, Some(Outcome::Provisional));
        assert_eq!(next.stage, Stage::Reviewing);
        assert_eq!(next.due_at, 42);
        assert_eq!(next.correct_streak, 1);
    }

    #[test]
    fn mastered_records_are_never_due() {
        let mut stats = ReviewStats::initial(0);
        for _ in 0..3 {
            stats = apply_outcome(&stats, Outcome::Correct, &schedule(), 0);
        }
        assert_eq!(stats.stage, Stage::Mastered);
        assert!(!stats.is_due(u64::MAX));
    }

    #[test]
    fn new_records_are_due_immediately() {
        let stats = ReviewStats::initial(100);
        assert!(stats.is_due(100));
        assert!(!stats.is_due(99));
    }
}
