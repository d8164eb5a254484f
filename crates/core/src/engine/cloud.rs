//! Lichess cloud evaluation backend
//!
//! Scores moves from cached cloud analysis instead of a local engine.
//! Coverage is best-effort: positions missing from the cloud database
//! surface as [`Error::EvaluationUnavailable`], which callers already
//! handle (skip during ingestion, snapshot fallback during drilling).

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::runtime::Runtime;

use super::score::Score;
use crate::error::{Error, Result};
use crate::evaluator::Analyzer;
use crate::position::{Color, Position};

const CLOUD_EVAL_URL: &str = "https://lichess.org/api/cloud-eval";

#[derive(Debug, Clone, Deserialize)]
pub struct CloudEval {
    pub fen: String,
    pub knodes: u64,
    pub depth: u8,
    pub pvs: Vec<PvLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PvLine {
    pub moves: String,
    pub cp: Option<i32>,
    pub mate: Option<i32>,
}

impl PvLine {
    /// Line score; cloud evaluations are reported from White's side.
    fn white_score(&self) -> Option<Score> {
        match (self.cp, self.mate) {
            (Some(cp), _) => Some(Score::Cp(cp)),
            (None, Some(m)) => Some(Score::Mate(m)),
            (None, None) => None,
        }
    }
}

pub struct CloudAnalyzer {
    client: Client,
    rt: Runtime,
}

impl CloudAnalyzer {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { client, rt })
    }

    async fn fetch_eval(&self, fen: &str) -> Result<CloudEval> {
        let response = self
            .client
            .get(CLOUD_EVAL_URL)
            .query(&[("fen", fen), ("multiPv", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::EvaluationUnavailable(format!(
                "cloud eval: HTTP {} for {}",
                response.status(),
                fen
            )));
        }

        Ok(response.json().await?)
    }
}

impl Analyzer for CloudAnalyzer {
    /// Scores each candidate from the cloud evaluation of the position
    /// after the move, converted back to the parent side's perspective.
    fn evaluate(
        &mut self,
        fen: &str,
        moves: &[String],
        budget: Duration,
    ) -> Result<HashMap<String, i32>> {
        let position = Position::parse(fen)?;
        let mut scores = HashMap::with_capacity(moves.len());

        for mv in moves {
            let child = position.apply_uci(mv)?;
            let child_fen = child.canonical();
            let eval = self
                .rt
                .block_on(async { tokio::time::timeout(budget, self.fetch_eval(&child_fen)).await })
                .map_err(|_| {
                    Error::EvaluationUnavailable(format!(
                        "cloud eval timed out after {}ms",
                        budget.as_millis()
                    ))
                })??;

            let white_score = eval
                .pvs
                .first()
                .and_then(PvLine::white_score)
                .ok_or_else(|| {
                    Error::EvaluationUnavailable(format!("cloud eval returned no line for {}", mv))
                })?;

            let child_side_cp = match child.turn() {
                Color::White => white_score.to_cp(),
                Color::Black => white_score.flip().to_cp(),
            };
            // The mover's score is the opposite of what the reply side sees.
            scores.insert(mv.clone(), -child_side_cp);
        }

        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_eval_deserializes() {
        let json = r#"{
            "fen": "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "knodes": 13683,
            "depth": 22,
            "pvs": [
                { "moves": "e2e4 e7e5 g1f3", "cp": 21 },
                { "moves": "d2d4 g8f6", "mate": null, "cp": 18 }
            ]
        }"#;
        let eval: CloudEval = serde_json::from_str(json).unwrap();
        assert_eq!(eval.depth, 22);
        assert_eq!(eval.pvs.len(), 2);
        assert_eq!(eval.pvs[0].white_score(), Some(Score::Cp(21)));
    }

    #[test]
    fn mate_lines_score_as_mate() {
        let line = PvLine {
            moves: "d8h4".to_string(),
            cp: None,
            mate: Some(-1),
        };
        assert_eq!(line.white_score(), Some(Score::Mate(-1)));
    }
}
