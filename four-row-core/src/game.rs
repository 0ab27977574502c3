use crate::board::{Board, Piece};

/// Top-level status of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InProgress,
    Over(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win(Piece),
    Draw,
}

/// One game between the paired players: the grid, whose turn it is, and
/// whether the game has finished. Built fresh when a session starts and
/// again on every accepted rematch.
#[derive(Debug, Clone)]
pub struct GameState {
    pub board: Board,
    pub turn: Piece,
    pub phase: Phase,
}

impl GameState {
    pub fn new(starting: Piece) -> Self {
        Self {
            board: Board::new(),
            turn: starting,
            phase: Phase::InProgress,
        }
    }

    pub fn in_progress(&self) -> bool {
        matches!(self.phase, Phase::InProgress)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            Phase::InProgress => None,
            Phase::Over(outcome) => Some(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_game_is_empty_and_in_progress() {
        let game = GameState::new(Piece::O);
        assert!(game.in_progress());
        assert_eq!(game.outcome(), None);
        assert_eq!(game.turn, Piece::O);
        assert_eq!(game.board, Board::new());
    }

    #[test]
    fn finished_game_reports_its_outcome() {
        let mut game = GameState::new(Piece::X);
        game.phase = Phase::Over(Outcome::Win(Piece::X));
        assert!(!game.in_progress());
        assert_eq!(game.outcome(), Some(Outcome::Win(Piece::X)));

        game.phase = Phase::Over(Outcome::Draw);
        assert_eq!(game.outcome(), Some(Outcome::Draw));
    }
}
