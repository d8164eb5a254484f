//! PGN parsing for blunder ingestion
//!
//! Keeps only what the scanner needs: the players, the result, and the
//! mainline moves. Movetext is replay-validated while parsing; a game whose
//! moves do not apply to the board is dropped with a warning rather than
//! ingested half-broken.

use pgn_reader::{RawTag, SanPlus, Skip, Visitor};
use shakmaty::Position as _;
use shakmaty::Chess;
use std::fs;
use std::io::Cursor;
use std::ops::ControlFlow;
use std::path::Path;

use crate::error::{Error, Result};

/// A parsed game, reduced to what ingestion consumes.
#[derive(Debug, Clone)]
pub struct ParsedGame {
    pub white: Option<String>,
    pub black: Option<String>,
    pub date: Option<String>,
    pub result: Option<String>,
    /// Mainline moves in SAN, validated to apply in sequence.
    pub moves: Vec<String>,
}

impl ParsedGame {
    pub fn ply_count(&self) -> usize {
        self.moves.len()
    }

    /// Short label used as the provenance of recorded blunders.
    pub fn summary(&self) -> String {
        let white = self.white.as_deref().unwrap_or("Unknown");
        let black = self.black.as_deref().unwrap_or("Unknown");
        let result = self.result.as_deref().unwrap_or("*");
        format!("{} vs {} - {}", white, black, result)
    }
}

#[derive(Default)]
struct GameTags {
    white: Option<String>,
    black: Option<String>,
    date: Option<String>,
    result: Option<String>,
}

struct GameMoves {
    tags: GameTags,
    moves: Vec<String>,
    board: Chess,
    valid: bool,
}

struct GameParser;

impl Visitor for GameParser {
    type Tags = GameTags;
    type Movetext = GameMoves;
    type Output = Option<ParsedGame>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(GameTags::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let value_str = value.decode_utf8_lossy().to_string();
        match String::from_utf8_lossy(name).as_ref() {
            "White" => tags.white = Some(value_str),
            "Black" => tags.black = Some(value_str),
            "Date" => tags.date = Some(value_str),
            "Result" => tags.result = Some(value_str),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(GameMoves {
            tags,
            moves: Vec::new(),
            board: Chess::default(),
            valid: true,
        })
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        if !movetext.valid {
            return ControlFlow::Continue(());
        }

        match san.san.to_move(&movetext.board) {
            Ok(mv) => match movetext.board.clone().play(mv) {
                Ok(board) => {
                    movetext.moves.push(san.san.to_string());
                    movetext.board = board;
                }
                Err(_) => movetext.valid = false,
            },
            Err(_) => movetext.valid = false,
        }

        ControlFlow::Continue(())
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        if movetext.valid {
            Some(ParsedGame {
                white: movetext.tags.white,
                black: movetext.tags.black,
                date: movetext.tags.date,
                result: movetext.tags.result,
                moves: movetext.moves,
            })
        } else {
            None
        }
    }
}

pub fn parse_pgn_file<P: AsRef<Path>>(path: P) -> Result<Vec<ParsedGame>> {
    let contents = fs::read_to_string(path)?;
    parse_pgn_string(&contents)
}

pub fn parse_pgn_string(pgn: &str) -> Result<Vec<ParsedGame>> {
    let mut parser = GameParser;
    let mut games = Vec::new();
    let mut dropped = 0u32;

    let mut reader = pgn_reader::Reader::new(Cursor::new(pgn.as_bytes()));
    loop {
        match reader.read_game(&mut parser) {
            Ok(Some(Some(game))) => games.push(game),
            Ok(Some(None)) => dropped += 1,
            Ok(None) => break,
            Err(e) => return Err(Error::Pgn(e.to_string())),
        }
    }

    if dropped > 0 {
        tracing::warn!(dropped, "dropped games with invalid movetext");
    }
    if games.is_empty() {
        return Err(Error::Pgn("no valid games found".to_string()));
    }
    Ok(games)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PGN: &str = r#"[Event "Test"]
[White "Alice"]
[Black "Bob"]
[Date "2024.03.01"]
[Result "1-0"]

1. e4 e5 2. Nf3 Nc6 3. Bb5 1-0
"#;

    #[test]
    fn parses_tags_and_moves() {
        let games = parse_pgn_string(SAMPLE_PGN).unwrap();
        assert_eq!(games.len(), 1);

        let game = &games[0];
        assert_eq!(game.white.as_deref(), Some("Alice"));
        assert_eq!(game.black.as_deref(), Some("Bob"));
        assert_eq!(game.result.as_deref(), Some("1-0"));
        assert_eq!(game.ply_count(), 5);
        assert_eq!(game.moves[0], "e4");
        assert_eq!(game.moves[4], "Bb5");
    }

    #[test]
    fn summary_labels_the_game() {
        let games = parse_pgn_string(SAMPLE_PGN).unwrap();
        assert_eq!(games[0].summary(), "Alice vs Bob - 1-0");
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(parse_pgn_string(""), Err(Error::Pgn(_))));
    }

    #[test]
    fn invalid_movetext_drops_the_game() {
        let broken = r#"[White "Alice"]
[Black "Bob"]

1. e4 e5 2. Ke3 1-0
"#;
        // The only game is invalid, so parsing reports no games.
        assert!(matches!(parse_pgn_string(broken), Err(Error::Pgn(_))));
    }

    #[test]
    fn variations_are_skipped() {
        let with_variation = r#"[White "Alice"]
[Black "Bob"]

1. e4 e5 (1... c5 2. Nf3) 2. Nf3 1-0
"#;
        let games = parse_pgn_string(with_variation).unwrap();
        assert_eq!(games[0].moves, vec!["e4", "e5", "Nf3"]);
    }
}
