//! Blunder Drill Core Library
//!
//! Stores positions where a player went wrong and quizzes them on those
//! same positions later, accepting any move the engine judges good enough
//! rather than one canonical "best move". Review order follows a leveled
//! spaced-repetition policy driven by drill outcomes.

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod ingest;
pub mod parser;
pub mod position;
pub mod scheduler;
pub mod session;
pub mod store;

pub use config::DrillConfig;
pub use engine::{CloudAnalyzer, Score, UciEngine};
pub use error::{Error, Result};
pub use evaluator::{
    acceptable_set, classify, AcceptableMoveSet, Analyzer, MoveClass, MoveEvaluator, ScoredMove,
};
pub use ingest::{BlunderScanner, ScanSummary};
pub use parser::{parse_pgn_file, parse_pgn_string, ParsedGame};
pub use position::{move_to_uci, Color, Position};
pub use scheduler::{apply_outcome, Outcome, ReviewSchedule, ReviewStats, Stage};
pub use session::{DrillSession, Feedback, Prompt, SessionController, SessionPhase};
pub use store::{BlunderRecord, Database, NewBlunder};
