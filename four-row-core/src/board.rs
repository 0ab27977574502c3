use std::fmt;

use serde::{Deserialize, Serialize};

pub const ROWS: usize = 6;
pub const COLS: usize = 7;

/// One of the two piece markers. Doubles as the name of whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Piece {
    X,
    O,
}

impl Piece {
    pub fn other(self) -> Self {
        match self {
            Piece::X => Piece::O,
            Piece::O => Piece::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Piece::X => "X",
            Piece::O => "O",
        }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 6x7 grid with row 0 at the top. Occupied cells within a column always
/// form a contiguous run from the bottom, so a column is full exactly when
/// its top cell is occupied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    cells: [[Option<Piece>; COLS]; ROWS],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Piece> {
        self.cells[row][col]
    }

    /// A move is legal iff the column exists and its top cell is empty.
    pub fn is_valid_move(&self, col: usize) -> bool {
        col < COLS && self.cells[0][col].is_none()
    }

    /// Drop a piece into `col`, filling the lowest empty cell. Returns the
    /// row the piece landed in, or `None` when the move is illegal; callers
    /// are expected to check [`Board::is_valid_move`] first.
    pub fn apply_move(&mut self, col: usize, piece: Piece) -> Option<usize> {
        if !self.is_valid_move(col) {
            return None;
        }
        for row in (0..ROWS).rev() {
            if self.cells[row][col].is_none() {
                self.cells[row][col] = Some(piece);
                return Some(row);
            }
        }
        None
    }

    /// Row-major scan for four in a row. Each occupied cell is tested in
    /// the four directions right, down, down-right, down-left; the first
    /// run found decides the winner, which makes the scan deterministic.
    pub fn check_winner(&self) -> Option<Piece> {
        for row in 0..ROWS {
            for col in 0..COLS {
                let piece = match self.cells[row][col] {
                    Some(piece) => piece,
                    None => continue,
                };
                if col + 3 < COLS && (1..4).all(|i| self.cells[row][col + i] == Some(piece)) {
                    return Some(piece);
                }
                if row + 3 < ROWS && (1..4).all(|i| self.cells[row + i][col] == Some(piece)) {
                    return Some(piece);
                }
                if row + 3 < ROWS
                    && col + 3 < COLS
                    && (1..4).all(|i| self.cells[row + i][col + i] == Some(piece))
                {
                    return Some(piece);
                }
                if row + 3 < ROWS
                    && col >= 3
                    && (1..4).all(|i| self.cells[row + i][col - i] == Some(piece))
                {
                    return Some(piece);
                }
            }
        }
        None
    }

    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(|cell| cell.is_some())
    }

    /// Render the board in the pipe-delimited layout the client parses:
    /// a leading blank line, six grid rows, a `+---` separator, and a
    /// footer row of column indices. The exact bytes are a wire contract.
    pub fn render(&self) -> String {
        let mut out = String::from("\n");
        for row in &self.cells {
            out.push_str("| ");
            for (col, cell) in row.iter().enumerate() {
                if col > 0 {
                    out.push_str(" | ");
                }
                match cell {
                    Some(piece) => out.push_str(piece.as_str()),
                    None => out.push(' '),
                }
            }
            out.push_str(" |\n");
        }
        out.push_str(&"+---".repeat(COLS));
        out.push_str("+\n| ");
        for col in 0..COLS {
            if col > 0 {
                out.push_str(" | ");
            }
            out.push_str(&col.to_string());
        }
        out.push_str(" |\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied(board: &Board) -> usize {
        (0..ROWS)
            .flat_map(|row| (0..COLS).map(move |col| (row, col)))
            .filter(|&(row, col)| board.cell(row, col).is_some())
            .count()
    }

    #[test]
    fn move_validity_tracks_top_cell() {
        let mut board = Board::new();
        for col in 0..COLS {
            assert!(board.is_valid_move(col));
        }
        assert!(!board.is_valid_move(COLS));
        assert!(!board.is_valid_move(42));

        for i in 0..ROWS {
            let piece = if i % 2 == 0 { Piece::X } else { Piece::O };
            board.apply_move(2, piece).unwrap();
        }
        assert!(!board.is_valid_move(2));
        for col in (0..COLS).filter(|col| *col != 2) {
            assert!(board.is_valid_move(col));
        }
    }

    #[test]
    fn gravity_fills_lowest_empty_cell() {
        let mut board = Board::new();
        assert_eq!(board.apply_move(3, Piece::X), Some(ROWS - 1));
        assert_eq!(board.cell(ROWS - 1, 3), Some(Piece::X));
        assert_eq!(occupied(&board), 1);

        assert_eq!(board.apply_move(3, Piece::O), Some(ROWS - 2));
        assert_eq!(board.cell(ROWS - 2, 3), Some(Piece::O));
        assert_eq!(board.cell(ROWS - 1, 3), Some(Piece::X));
        assert_eq!(occupied(&board), 2);
    }

    #[test]
    fn apply_move_rejects_full_column() {
        let mut board = Board::new();
        for _ in 0..ROWS {
            board.apply_move(0, Piece::X).unwrap();
        }
        let before = board.clone();
        assert_eq!(board.apply_move(0, Piece::O), None);
        assert_eq!(board, before);
        assert_eq!(board.apply_move(COLS, Piece::O), None);
    }

    #[test]
    fn horizontal_run_wins() {
        let mut board = Board::new();
        for col in 1..=4 {
            board.apply_move(col, Piece::X).unwrap();
        }
        assert_eq!(board.check_winner(), Some(Piece::X));
    }

    #[test]
    fn vertical_run_wins() {
        let mut board = Board::new();
        for _ in 0..4 {
            board.apply_move(2, Piece::O).unwrap();
        }
        assert_eq!(board.check_winner(), Some(Piece::O));
    }

    #[test]
    fn down_right_diagonal_wins() {
        let mut board = Board::new();
        // Staircase: X at (5,6), (4,5), (3,4), (2,3) with O filler below.
        board.apply_move(6, Piece::X).unwrap();
        board.apply_move(5, Piece::O).unwrap();
        board.apply_move(5, Piece::X).unwrap();
        for _ in 0..2 {
            board.apply_move(4, Piece::O).unwrap();
        }
        board.apply_move(4, Piece::X).unwrap();
        for _ in 0..3 {
            board.apply_move(3, Piece::O).unwrap();
        }
        board.apply_move(3, Piece::X).unwrap();
        assert_eq!(board.check_winner(), Some(Piece::X));
    }

    #[test]
    fn down_left_diagonal_wins() {
        let mut board = Board::new();
        // Mirror staircase: X at (5,0), (4,1), (3,2), (2,3).
        board.apply_move(0, Piece::X).unwrap();
        board.apply_move(1, Piece::O).unwrap();
        board.apply_move(1, Piece::X).unwrap();
        for _ in 0..2 {
            board.apply_move(2, Piece::O).unwrap();
        }
        board.apply_move(2, Piece::X).unwrap();
        for _ in 0..3 {
            board.apply_move(3, Piece::O).unwrap();
        }
        board.apply_move(3, Piece::X).unwrap();
        assert_eq!(board.check_winner(), Some(Piece::X));
    }

    #[test]
    fn scan_finds_the_run_with_the_earliest_cell() {
        let mut board = Board::new();
        // X four across the bottom row, O four up column 0. The O run's top
        // cell sits in an earlier row, so the row-major scan reports O.
        for col in 3..=6 {
            board.apply_move(col, Piece::X).unwrap();
        }
        for _ in 0..4 {
            board.apply_move(0, Piece::O).unwrap();
        }
        assert_eq!(board.check_winner(), Some(Piece::O));
    }

    #[test]
    fn empty_board_has_no_winner() {
        assert_eq!(Board::new().check_winner(), None);
        assert!(!Board::new().is_full());
    }

    #[test]
    fn full_board_without_a_run_is_a_draw_shape() {
        let mut board = Board::new();
        // Column base pattern X X O O X X O, alternating up each column.
        // No direction ever lines up four of a kind.
        let base = [
            Piece::X,
            Piece::X,
            Piece::O,
            Piece::O,
            Piece::X,
            Piece::X,
            Piece::O,
        ];
        for (col, bottom) in base.iter().enumerate() {
            for level in 0..ROWS {
                let piece = if level % 2 == 0 { *bottom } else { bottom.other() };
                board.apply_move(col, piece).unwrap();
            }
        }
        assert!(board.is_full());
        assert_eq!(board.check_winner(), None);
    }

    #[test]
    fn render_matches_the_wire_format_for_an_empty_board() {
        let expected = "\n\
            |   |   |   |   |   |   |   |\n\
            |   |   |   |   |   |   |   |\n\
            |   |   |   |   |   |   |   |\n\
            |   |   |   |   |   |   |   |\n\
            |   |   |   |   |   |   |   |\n\
            |   |   |   |   |   |   |   |\n\
            +---+---+---+---+---+---+---+\n\
            | 0 | 1 | 2 | 3 | 4 | 5 | 6 |\n";
        assert_eq!(Board::new().render(), expected);
    }

    #[test]
    fn render_matches_the_wire_format_after_moves() {
        let mut board = Board::new();
        board.apply_move(3, Piece::X).unwrap();
        board.apply_move(3, Piece::O).unwrap();
        board.apply_move(0, Piece::X).unwrap();
        let expected = "\n\
            |   |   |   |   |   |   |   |\n\
            |   |   |   |   |   |   |   |\n\
            |   |   |   |   |   |   |   |\n\
            |   |   |   |   |   |   |   |\n\
            |   |   |   | O |   |   |   |\n\
            | X |   |   | X |   |   |   |\n\
            +---+---+---+---+---+---+---+\n\
            | 0 | 1 | 2 | 3 | 4 | 5 | 6 |\n";
        assert_eq!(board.render(), expected);
    }

    #[test]
    fn render_row_shape_holds_for_every_line() {
        let mut board = Board::new();
        board.apply_move(1, Piece::X).unwrap();
        board.apply_move(5, Piece::O).unwrap();
        let rendered = board.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), ROWS + 3);
        assert!(lines[0].is_empty());

        let grid_row = regex::Regex::new(r"^\|( [XO ] \|){7}$").unwrap();
        for line in &lines[1..=ROWS] {
            assert!(grid_row.is_match(line), "bad grid row: {line:?}");
        }
        let separator = regex::Regex::new(r"^(\+---){7}\+$").unwrap();
        assert!(separator.is_match(lines[ROWS + 1]));
        let footer = regex::Regex::new(r"^\|( \d \|){7}$").unwrap();
        assert!(footer.is_match(lines[ROWS + 2]));
    }
}
