//! Store models

use serde::{Deserialize, Serialize};

use crate::scheduler::ReviewStats;

/// A stored blunder: one unique (position, played move) pair with its
/// acceptable-move snapshot and review statistics. Created by ingestion,
/// mutated only through the store's statistics-update contract, removed
/// only by explicit archiving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlunderRecord {
    pub id: i64,
    /// Canonical FEN of the position before the move.
    pub fen: String,
    /// The move actually played, UCI.
    pub played_uci: String,
    /// The same move as it appeared in the game score.
    pub played_san: String,
    /// Snapshot of the acceptable moves (UCI) at recording time. Drilling
    /// recomputes the set fresh and only falls back to this snapshot.
    pub acceptable: Vec<String>,
    /// How far below the best move the played move scored.
    pub cp_loss: i32,
    /// Where the blunder came from, e.g. "Alice vs Bob - 0-1".
    pub source: Option<String>,
    /// How often this exact blunder has been played.
    pub frequency: u32,
    pub stats: ReviewStats,
    pub archived: bool,
    /// Optimistic-lock counter, bumped on every statistics update.
    pub version: i64,
    pub created_at: u64,
}

/// Input for recording a freshly classified blunder.
#[derive(Debug, Clone)]
pub struct NewBlunder {
    pub fen: String,
    pub played_uci: String,
    pub played_san: String,
    pub acceptable: Vec<String>,
    pub cp_loss: i32,
    pub source: Option<String>,
}
