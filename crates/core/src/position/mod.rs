//! Immutable chess position model
//!
//! Thin wrapper around shakmaty. A `Position` is identified by its canonical
//! FEN string (en passant normalized to legal captures only), which is the
//! lookup key used by the record store. Every operation returns a new value;
//! nothing mutates a position in place.

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::Position as _;
use shakmaty::{CastlingMode, Chess, EnPassantMode, File, Move, Role, Square};
use std::fmt;
use std::hash::{Hash, Hasher};

pub use shakmaty::Color;

use crate::error::{Error, Result};

/// A snapshot of board state: piece placement, side to move, castling
/// rights, en passant target and move counters.
#[derive(Debug, Clone)]
pub struct Position {
    inner: Chess,
}

impl Position {
    /// The standard starting position.
    pub fn start() -> Self {
        Self {
            inner: Chess::default(),
        }
    }

    /// Parses a FEN string.
    ///
    /// Fails with [`Error::MalformedPosition`] when the string violates FEN
    /// grammar or describes an impossible board (wrong field count, illegal
    /// piece density, side not to move already delivering check, ...).
    pub fn parse(fen: &str) -> Result<Self> {
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|e| Error::MalformedPosition(format!("{}: {}", e, fen)))?;
        let inner = parsed
            .into_position::<Chess>(CastlingMode::Standard)
            .map_err(|e| Error::MalformedPosition(format!("{}: {}", e, fen)))?;
        Ok(Self { inner })
    }

    /// Canonical FEN used as this position's identity key.
    pub fn canonical(&self) -> String {
        Fen::from_position(&self.inner, EnPassantMode::Legal).to_string()
    }

    pub fn turn(&self) -> Color {
        self.inner.turn()
    }

    pub fn is_check(&self) -> bool {
        self.inner.is_check()
    }

    pub fn is_checkmate(&self) -> bool {
        self.inner.is_checkmate()
    }

    pub fn is_stalemate(&self) -> bool {
        self.inner.is_stalemate()
    }

    /// Every rules-legal move: castling only with rights and a clear path,
    /// en passant only on the following move, one entry per promotion piece.
    pub fn legal_moves(&self) -> Vec<Move> {
        self.inner.legal_moves().into_iter().collect()
    }

    /// Legal moves as UCI text, the canonical move encoding.
    pub fn legal_moves_uci(&self) -> Vec<String> {
        self.legal_moves().iter().map(move_to_uci).collect()
    }

    /// Plays a move, returning the successor position. The original value is
    /// untouched. Fails with [`Error::IllegalMove`] if the move is not legal
    /// here.
    pub fn apply(&self, mv: Move) -> Result<Self> {
        let uci = move_to_uci(&mv);
        let inner = self
            .inner
            .clone()
            .play(mv)
            .map_err(|_| Error::IllegalMove(uci))?;
        Ok(Self { inner })
    }

    /// [`Position::apply`] for a move given as UCI text.
    pub fn apply_uci(&self, uci: &str) -> Result<Self> {
        self.apply(self.parse_move(uci)?)
    }

    /// Parses player input as either UCI ("g1f3") or SAN ("Nf3") and
    /// validates it against this position's legal moves.
    pub fn parse_move(&self, text: &str) -> Result<Move> {
        let text = text.trim();
        if let Ok(uci) = text.parse::<UciMove>() {
            if let Ok(mv) = uci.to_move(&self.inner) {
                return Ok(mv);
            }
        }
        let san: San = text
            .parse()
            .map_err(|_| Error::IllegalMove(text.to_string()))?;
        san.to_move(&self.inner)
            .map_err(|_| Error::IllegalMove(text.to_string()))
    }

    /// SAN rendering of a move in this position.
    pub fn san(&self, mv: Move) -> String {
        San::from_move(&self.inner, mv).to_string()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Converts a move to UCI text. Castling is encoded as the king's two-square
/// hop ("e1g1"), promotions carry the piece suffix ("e7e8q").
pub fn move_to_uci(mv: &Move) -> String {
    match *mv {
        Move::Normal {
            from,
            to,
            promotion,
            ..
        } => {
            let promo = match promotion {
                Some(Role::Queen) => "q",
                Some(Role::Rook) => "r",
                Some(Role::Bishop) => "b",
                Some(Role::Knight) => "n",
                _ => "",
            };
            format!("{}{}{}", from, to, promo)
        }
        Move::EnPassant { from, to, .. } => format!("{}{}", from, to),
        Move::Castle { king, rook } => {
            let file = if rook.file() > king.file() {
                File::G
            } else {
                File::C
            };
            format!("{}{}", king, Square::from_coords(file, king.rank()))
        }
        Move::Put { .. } => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_position_has_twenty_moves() {
        let pos = Position::start();
        assert_eq!(pos.legal_moves().len(), 20);
        assert_eq!(pos.turn(), Color::White);
    }

    #[test]
    fn canonical_round_trips() {
        let pos = Position::start();
        let reparsed = Position::parse(&pos.canonical()).unwrap();
        assert_eq!(pos, reparsed);

        // A middlegame position with partial castling rights.
        let fen = "r1bqk2r/pppp1ppp/2n2n2/2b1p3/2B1P3/2N2N2/PPPP1PPP/R1BQK2R w KQkq - 6 5";
        let pos = Position::parse(fen).unwrap();
        let reparsed = Position::parse(&pos.canonical()).unwrap();
        assert_eq!(pos, reparsed);
    }

    #[test]
    fn malformed_fen_is_rejected() {
        // Too few fields.
        assert!(matches!(
            Position::parse("8/8/8/8"),
            Err(Error::MalformedPosition(_))
        ));
        // Nine pieces on one rank.
        assert!(matches!(
            Position::parse("rnbqkbnrr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(Error::MalformedPosition(_))
        ));
        // No kings at all.
        assert!(matches!(
            Position::parse("8/8/8/8/8/8/8/8 w - - 0 1"),
            Err(Error::MalformedPosition(_))
        ));
    }

    #[test]
    fn apply_returns_new_value() {
        let pos = Position::start();
        let mv = pos.parse_move("e4").unwrap();
        let next = pos.apply(mv).unwrap();
        assert_eq!(next.turn(), Color::Black);
        // The original is unchanged.
        assert_eq!(pos, Position::start());
        assert_ne!(pos, next);
    }

    #[test]
    fn illegal_move_is_rejected() {
        let pos = Position::start();
        assert!(matches!(
            pos.parse_move("e2e5"),
            Err(Error::IllegalMove(_))
        ));
        assert!(matches!(pos.parse_move("Qh5"), Err(Error::IllegalMove(_))));
        assert!(matches!(pos.parse_move("zz9"), Err(Error::IllegalMove(_))));
    }

    #[test]
    fn every_legal_move_applies() {
        let pos = Position::start();
        for mv in pos.legal_moves() {
            let next = pos.apply(mv).unwrap();
            // Reachability sanity: the reply side always has moves from here.
            assert!(!next.legal_moves().is_empty());
        }
    }

    #[test]
    fn castling_is_legal_only_with_clear_path() {
        let fen = "r1bqk2r/pppp1ppp/2n2n2/2b1p3/2B1P3/2N2N2/PPPP1PPP/R1BQK2R w KQkq - 6 5";
        let pos = Position::parse(fen).unwrap();
        assert!(pos.legal_moves_uci().contains(&"e1g1".to_string()));
        // Queenside path is blocked.
        assert!(!pos.legal_moves_uci().contains(&"e1c1".to_string()));
    }

    #[test]
    fn en_passant_only_immediately_after_double_push() {
        let pos = Position::start()
            .apply_uci("e2e4")
            .unwrap()
            .apply_uci("a7a6")
            .unwrap()
            .apply_uci("e4e5")
            .unwrap()
            .apply_uci("d7d5")
            .unwrap();
        assert!(pos.legal_moves_uci().contains(&"e5d6".to_string()));

        // One move later the capture is gone.
        let later = pos
            .apply_uci("h2h3")
            .unwrap()
            .apply_uci("a6a5")
            .unwrap();
        assert!(!later.legal_moves_uci().contains(&"e5d6".to_string()));
    }

    #[test]
    fn promotions_are_enumerated_per_piece() {
        let pos = Position::parse("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let moves = pos.legal_moves_uci();
        for suffix in ["q", "r", "b", "n"] {
            assert!(moves.contains(&format!("a7a8{}", suffix)));
        }
    }

    #[test]
    fn parse_move_accepts_uci_and_san() {
        let pos = Position::start();
        let from_uci = pos.parse_move("g1f3").unwrap();
        let from_san = pos.parse_move("Nf3").unwrap();
        assert_eq!(move_to_uci(&from_uci), move_to_uci(&from_san));
    }
}
