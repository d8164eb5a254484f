//! UCI chess engine backend
//!
//! Spawns an engine (Stockfish by default) as a subprocess and talks UCI
//! over its pipes. Candidate moves are scored by evaluating the position
//! after each move for the same fixed `movetime`, which keeps the scores
//! mutually comparable and bounds every blocking read.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use super::score::Score;
use crate::error::Error;
use crate::evaluator::Analyzer;

/// Error type for engine subprocess operations
#[derive(Debug)]
pub enum EngineError {
    /// Failed to start the engine process
    SpawnError(String),
    /// Failed to communicate with engine
    IoError(std::io::Error),
    /// Engine returned unexpected response
    ProtocolError(String),
    /// Engine not initialized
    NotInitialized,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::SpawnError(s) => write!(f, "Failed to start engine: {}", s),
            EngineError::IoError(e) => write!(f, "I/O error: {}", e),
            EngineError::ProtocolError(s) => write!(f, "Protocol error: {}", s),
            EngineError::NotInitialized => write!(f, "Engine not initialized"),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::IoError(error)
    }
}

/// Wrapper around a UCI engine subprocess
pub struct UciEngine {
    /// The child process
    process: Child,
    /// Stdin for sending commands
    stdin: ChildStdin,
    /// Stdout reader for receiving responses
    stdout: BufReader<ChildStdout>,
    /// Whether UCI handshake completed
    initialized: bool,
}

impl UciEngine {
    /// Creates a new engine instance from a binary path (or a bare name
    /// resolved via PATH, e.g. "stockfish").
    pub fn new(path: &str) -> Result<Self, EngineError> {
        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::SpawnError(e.to_string()))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::SpawnError("Failed to open stdin".into()))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::SpawnError("Failed to open stdout".into()))?;

        let mut engine = UciEngine {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            initialized: false,
        };

        engine.init_uci()?;

        Ok(engine)
    }

    /// Sends a command to the engine
    fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        writeln!(self.stdin, "{}", cmd)?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Reads a line from the engine
    fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(EngineError::ProtocolError(
                "engine closed its output stream".into(),
            ));
        }
        Ok(line.trim().to_string())
    }

    /// Reads lines until we get the expected response
    fn read_until(&mut self, expected: &str) -> Result<Vec<String>, EngineError> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(expected);
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }

    /// Initialize UCI protocol
    fn init_uci(&mut self) -> Result<(), EngineError> {
        self.send("uci")?;
        self.read_until("uciok")?;

        self.send("isready")?;
        self.read_until("readyok")?;

        self.initialized = true;
        Ok(())
    }

    /// Sets the position to analyze.
    ///
    /// * `fen` - FEN string, or None for the starting position
    /// * `moves` - moves (UCI) to play out from the position
    pub fn set_position(
        &mut self,
        fen: Option<&str>,
        moves: Option<&[String]>,
    ) -> Result<(), EngineError> {
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }

        let pos_str = match fen {
            Some(f) => format!("position fen {}", f),
            None => "position startpos".to_string(),
        };

        let cmd = match moves {
            Some(m) if !m.is_empty() => format!("{} moves {}", pos_str, m.join(" ")),
            _ => pos_str,
        };

        self.send(&cmd)?;
        Ok(())
    }

    /// Evaluates the current position with a fixed time budget, returning
    /// the final score from the perspective of the side to move.
    pub fn evaluate_current(&mut self, movetime_ms: u64) -> Result<Score, EngineError> {
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }

        self.send(&format!("go movetime {}", movetime_ms))?;

        let mut score = None;
        loop {
            let line = self.read_line()?;
            if line.starts_with("bestmove") {
                break;
            }
            if line.starts_with("info") {
                if let Some(s) = parse_score(&line) {
                    score = Some(s);
                }
            }
        }

        score.ok_or_else(|| EngineError::ProtocolError("no score before bestmove".into()))
    }

    /// Quit the engine cleanly
    pub fn quit(&mut self) -> Result<(), EngineError> {
        self.send("quit")?;
        // Give it a moment to exit
        std::thread::sleep(Duration::from_millis(100));
        let _ = self.process.kill(); // Kill if still running
        Ok(())
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        let _ = self.quit();
    }
}

impl Analyzer for UciEngine {
    /// Scores each candidate by playing it and evaluating the resulting
    /// position for the opponent, then flipping the sign back. Identical
    /// `movetime` per move keeps the scores comparable.
    fn evaluate(
        &mut self,
        fen: &str,
        moves: &[String],
        budget: Duration,
    ) -> crate::error::Result<HashMap<String, i32>> {
        let movetime_ms = (budget.as_millis() as u64).max(1);
        let mut scores = HashMap::with_capacity(moves.len());

        for mv in moves {
            self.set_position(Some(fen), Some(std::slice::from_ref(mv)))
                .map_err(|e| Error::EvaluationUnavailable(e.to_string()))?;
            let reply_score = self
                .evaluate_current(movetime_ms)
                .map_err(|e| Error::EvaluationUnavailable(e.to_string()))?;
            scores.insert(mv.clone(), reply_score.flip().to_cp());
        }

        Ok(scores)
    }
}

/// Extracts the last "score cp N" / "score mate N" from a UCI info line.
fn parse_score(line: &str) -> Option<Score> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut i = 0;

    while i < parts.len() {
        if parts[i] == "score" && i + 2 < parts.len() {
            match parts[i + 1] {
                "cp" => return parts[i + 2].parse().ok().map(Score::Cp),
                "mate" => return parts[i + 2].parse().ok().map(Score::Mate),
                _ => {}
            }
        }
        i += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cp_and_mate_scores() {
        assert_eq!(
            parse_score("info depth 12 seldepth 16 score cp 35 nodes 12345 pv e2e4"),
            Some(Score::Cp(35))
        );
        assert_eq!(
            parse_score("info depth 20 score mate -3 nodes 99"),
            Some(Score::Mate(-3))
        );
        assert_eq!(parse_score("info depth 5 nodes 100"), None);
    }

    #[test]
    #[ignore] // Requires stockfish installed
    fn engine_starts_and_scores_moves() {
        let mut engine = UciEngine::new("stockfish").unwrap();
        let start = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let moves = vec!["e2e4".to_string(), "f2f3".to_string()];
        let scores = engine
            .evaluate(start, &moves, Duration::from_millis(200))
            .unwrap();
        assert_eq!(scores.len(), 2);
        // 1.e4 should not score worse than 1.f3.
        assert!(scores["e2e4"] >= scores["f2f3"]);
    }
}
