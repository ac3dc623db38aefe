//! Plain-text console view.
//!
//! The board is drawn as one hexadecimal palette digit per cell, one line
//! per row. Commands are typed as `row col color`, where `color` is a
//! palette index or name; `board` redraws the board and `quit` (or a
//! row of `-1`) leaves.

use std::fmt::Write as _;

use place_core::{Board, PlaceColor, Tile};
use thiserror::Error;

/// A parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Paint { row: i32, col: i32, color: PlaceColor },
    Show,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected: row col color")]
    Usage,

    #[error("not a number: {0:?}")]
    NotANumber(String),

    #[error("{0}")]
    Color(#[from] place_core::DomainError),
}

/// Parses one input line.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    match parts.as_slice() {
        ["quit" | "exit" | "q"] | ["-1", ..] => Ok(ConsoleCommand::Quit),
        ["board" | "show"] => Ok(ConsoleCommand::Show),
        [row, col, color] => Ok(ConsoleCommand::Paint {
            row: parse_coord(row)?,
            col: parse_coord(col)?,
            color: color.parse()?,
        }),
        _ => Err(ParseError::Usage),
    }
}

fn parse_coord(s: &str) -> Result<i32, ParseError> {
    s.parse().map_err(|_| ParseError::NotANumber(s.to_string()))
}

/// Renders the board, one hex digit per cell.
pub fn render_board(board: &Board) -> String {
    let dim = usize::try_from(board.dim()).unwrap_or(0);
    let mut out = String::with_capacity(dim * (dim + 1));
    for row in board.rows() {
        for tile in row {
            let _ = write!(out, "{:x}", tile.color().index());
        }
        out.push('\n');
    }
    out
}

/// Describes an applied change, e.g. `alice set (1, 2) to RED`.
pub fn describe_change(tile: &Tile) -> String {
    let owner = if tile.owner().is_empty() {
        "someone"
    } else {
        tile.owner()
    };
    format!("{owner} set ({}, {}) to {}", tile.row(), tile.col(), tile.color())
}
