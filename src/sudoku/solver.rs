//! Backtracking solver over row, column and box candidate masks.

use super::{GRID_SIZE, Sudoku, box_index};

const ALL_DIGITS: u16 = 0b11_1111_1110;

struct SearchState {
    grid: Sudoku,
    rows: [u16; GRID_SIZE],
    cols: [u16; GRID_SIZE],
    boxes: [u16; GRID_SIZE],
    empties: Vec<(usize, usize)>,
}

impl SearchState {
    /// `None` when the givens already conflict
    fn new(start: &Sudoku) -> Option<Self> {
        if start.has_conflicts() {
            return None;
        }

        let mut state = Self {
            grid: start.clone(),
            rows: [0; GRID_SIZE],
            cols: [0; GRID_SIZE],
            boxes: [0; GRID_SIZE],
            empties: Vec::new(),
        };

        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                let value = start.get(row, col);
                if value == 0 {
                    state.empties.push((row, col));
                } else {
                    state.place(row, col, value);
                }
            }
        }

        Some(state)
    }

    fn candidates(&self, row: usize, col: usize) -> u16 {
        ALL_DIGITS & !(self.rows[row] | self.cols[col] | self.boxes[box_index(row, col)])
    }

    fn place(&mut self, row: usize, col: usize, value: u8) {
        let bit = 1u16 << value;
        self.rows[row] |= bit;
        self.cols[col] |= bit;
        self.boxes[box_index(row, col)] |= bit;
        self.grid.set(row, col, value);
    }

    fn remove(&mut self, row: usize, col: usize, value: u8) {
        let bit = !(1u16 << value);
        self.rows[row] &= bit;
        self.cols[col] &= bit;
        self.boxes[box_index(row, col)] &= bit;
        self.grid.set(row, col, 0);
    }

    /// Returns true once `found` reaches `stop_at`
    fn search(&mut self, position: usize, stop_at: usize, found: &mut Vec<Sudoku>) -> bool {
        let Some(&(row, col)) = self.empties.get(position) else {
            found.push(self.grid.clone());
            return found.len() >= stop_at;
        };

        let candidates = self.candidates(row, col);
        for value in 1..=GRID_SIZE as u8 {
            if candidates & (1 << value) == 0 {
                continue;
            }
            self.place(row, col, value);
            let done = self.search(position + 1, stop_at, found);
            self.remove(row, col, value);
            if done {
                return true;
            }
        }

        false
    }
}

/// Enumerate up to `stop_at` solutions
pub fn fill(start: &Sudoku, stop_at: usize) -> Vec<Sudoku> {
    let mut found = Vec::new();
    if stop_at == 0 {
        return found;
    }
    if let Some(mut state) = SearchState::new(start) {
        state.search(0, stop_at, &mut found);
    }
    found
}

/// Count solutions, stopping once `stop_at` have been found
pub fn count_solutions(start: &Sudoku, stop_at: usize) -> usize {
    fill(start, stop_at).len()
}

/// First solution in row-major search order
pub fn solve(start: &Sudoku) -> Option<Sudoku> {
    fill(start, 1).into_iter().next()
}
