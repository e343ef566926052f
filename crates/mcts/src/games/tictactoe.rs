//! Tic-tac-toe.
//!
//! Tic-tac-toe is a solved game where perfect play always results in a draw.
//! This makes it ideal for validating search:
//! - search should never lose against any opponent
//! - two search players should always draw
//! - search should take an immediate win when one exists

use arbor_core::{ArborError, BoardEncoding, GameState, Player, Result};
use std::fmt;
use std::str::FromStr;

/// A tic-tac-toe mark. X moves first.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn player(self) -> Player {
        match self {
            Mark::X => Player::First,
            Mark::O => Player::Second,
        }
    }

    pub fn for_player(player: Player) -> Self {
        match player {
            Player::First => Mark::X,
            Player::Second => Mark::O,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}

/// Tic-tac-toe action (cell index 0-8).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TicTacToeAction(pub u8);

impl TicTacToeAction {
    /// Get the row (0-2).
    pub fn row(self) -> u8 {
        self.0 / 3
    }

    /// Get the column (0-2).
    pub fn col(self) -> u8 {
        self.0 % 3
    }
}

impl fmt::Display for TicTacToeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row(), self.col())
    }
}

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Tic-tac-toe board state.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct TicTacToeState {
    /// Board: 9 cells, indexed 0-8 (row-major).
    /// ```text
    /// 0 | 1 | 2
    /// ---------
    /// 3 | 4 | 5
    /// ---------
    /// 6 | 7 | 8
    /// ```
    board: [Option<Mark>; 9],
    current: Mark,
    winner: Option<Mark>,
}

impl TicTacToeState {
    /// Create a new empty board with X to move.
    pub fn new() -> Self {
        Self {
            board: [None; 9],
            current: Mark::X,
            winner: None,
        }
    }

    /// Play `cells` in order from the empty board.
    ///
    /// # Errors
    /// `ArborError::IllegalAction` for an out-of-range or occupied cell, or a
    /// move after the game has ended.
    pub fn from_moves(cells: &[u8]) -> Result<Self> {
        let mut state = Self::new();
        for &cell in cells {
            state = state.try_apply(TicTacToeAction(cell))?;
        }
        Ok(state)
    }

    /// Apply `action` after checking that it is legal.
    pub fn try_apply(&self, action: TicTacToeAction) -> Result<Self> {
        let cell = action.0 as usize;
        if self.is_terminal() {
            return Err(ArborError::IllegalAction(format!(
                "{action} after the game has ended"
            )));
        }
        if cell >= 9 || self.board[cell].is_some() {
            return Err(ArborError::IllegalAction(format!("cell {cell} is not free")));
        }
        Ok(self.apply(action))
    }

    pub fn to_move(&self) -> Mark {
        self.current
    }

    pub fn winner(&self) -> Option<Mark> {
        self.winner
    }

    /// Get the mark in a cell, if any.
    pub fn get(&self, cell: usize) -> Option<Mark> {
        self.board.get(cell).copied().flatten()
    }

    fn line_winner(board: &[Option<Mark>; 9]) -> Option<Mark> {
        LINES.iter().find_map(|line| {
            let first = board[line[0]]?;
            (board[line[1]] == Some(first) && board[line[2]] == Some(first)).then_some(first)
        })
    }

    fn empty_cells(&self) -> usize {
        self.board.iter().filter(|c| c.is_none()).count()
    }
}

impl Default for TicTacToeState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState for TicTacToeState {
    type Action = TicTacToeAction;

    fn is_terminal(&self) -> bool {
        self.winner.is_some() || self.empty_cells() == 0
    }

    fn legal_actions(&self) -> Vec<TicTacToeAction> {
        if self.winner.is_some() {
            return Vec::new();
        }
        self.board
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(i, _)| TicTacToeAction(i as u8))
            .collect()
    }

    fn all_actions(&self) -> Vec<TicTacToeAction> {
        (0..9).map(TicTacToeAction).collect()
    }

    fn apply(&self, action: TicTacToeAction) -> Self {
        let mut next = self.clone();
        next.board[action.0 as usize] = Some(self.current);
        next.current = match self.current {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        };
        next.winner = Self::line_winner(&next.board);
        next
    }

    fn current_player(&self) -> Player {
        self.current.player()
    }

    fn reward(&self, player: Player) -> Result<f32> {
        match self.winner {
            Some(mark) if mark.player() == player => Ok(1.0),
            Some(_) => Ok(-1.0),
            None if self.empty_cells() == 0 => Ok(0.0),
            None => Err(ArborError::NotTerminal),
        }
    }

    fn max_remaining_plies(&self) -> usize {
        if self.winner.is_some() {
            0
        } else {
            self.empty_cells()
        }
    }

    /// 3x3 grid with X = 1, O = -1 and empty = 0.
    fn encode_board(&self) -> BoardEncoding {
        self.board
            .chunks(3)
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Some(Mark::X) => 1,
                        Some(Mark::O) => -1,
                        None => 0,
                    })
                    .collect()
            })
            .collect()
    }
}

/// Parses nine cells of `X`, `O` or `.` in row-major order. Whitespace and
/// `/` row separators are ignored. The side to move follows from the mark
/// counts.
impl FromStr for TicTacToeState {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self> {
        let cells: Vec<char> = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '/')
            .collect();
        if cells.len() != 9 {
            return Err(ArborError::InvalidPosition(format!(
                "expected 9 cells, got {}",
                cells.len()
            )));
        }

        let mut board = [None; 9];
        for (cell, c) in board.iter_mut().zip(&cells) {
            *cell = match c.to_ascii_uppercase() {
                'X' => Some(Mark::X),
                'O' => Some(Mark::O),
                '.' | '-' | '_' => None,
                other => {
                    return Err(ArborError::InvalidPosition(format!(
                        "unexpected cell '{other}'"
                    )))
                }
            };
        }

        let xs = board.iter().filter(|c| **c == Some(Mark::X)).count();
        let os = board.iter().filter(|c| **c == Some(Mark::O)).count();
        let current = match xs.checked_sub(os) {
            Some(0) => Mark::X,
            Some(1) => Mark::O,
            _ => {
                return Err(ArborError::InvalidPosition(format!(
                    "{xs} X marks and {os} O marks"
                )))
            }
        };

        let x_wins = LINES.iter().any(|l| l.iter().all(|&i| board[i] == Some(Mark::X)));
        let o_wins = LINES.iter().any(|l| l.iter().all(|&i| board[i] == Some(Mark::O)));
        if x_wins && o_wins {
            return Err(ArborError::InvalidPosition("both sides have a line".to_string()));
        }

        Ok(Self {
            board,
            current,
            winner: Self::line_winner(&board),
        })
    }
}

impl fmt::Display for TicTacToeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..3 {
            if row > 0 {
                writeln!(f, "-----------")?;
            }
            for col in 0..3 {
                if col > 0 {
                    write!(f, " | ")?;
                }
                match self.board[row * 3 + col] {
                    Some(mark) => write!(f, " {mark} ")?,
                    None => write!(f, "   ")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
