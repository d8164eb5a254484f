//! Game parsing

pub mod pgn;

pub use pgn::{parse_pgn_file, parse_pgn_string, ParsedGame};
