pub mod solver;

use std::fmt;

use serde::Serialize;

use crate::error::{Result, SudokuError};

pub const GRID_SIZE: usize = 9;
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;

/// How empty cells are written in the line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyCell {
    #[default]
    Zeros,
    Points,
    /// 1-3 empties as spaces, longer runs as `s<N>s`
    Shortcuts,
}

/// A 9x9 grid, 0 marks an empty cell
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Sudoku {
    grid: [[u8; GRID_SIZE]; GRID_SIZE],
}

impl Sudoku {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.grid[row][col]
    }

    /// Values above 9 are ignored
    pub fn set(&mut self, row: usize, col: usize, value: u8) {
        if value as usize > GRID_SIZE {
            return;
        }
        self.grid[row][col] = value;
    }

    /// Parse a row-major line string.
    ///
    /// Digits `1-9` are givens, `0`, `.` and space are empty cells and
    /// `s<N>s` stands for N consecutive empty cells.
    pub fn from_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut sudoku = Self::new();
        let mut n = 0usize;
        let mut run: Option<String> = None;

        for c in line.chars() {
            if let Some(buffer) = run.as_mut() {
                if c == 's' {
                    let count: usize = buffer.parse().map_err(|_| {
                        SudokuError::InvalidGrid(format!("bad empty-run length '{}'", buffer))
                    })?;
                    n = n
                        .checked_add(count)
                        .filter(|total| *total <= CELL_COUNT)
                        .ok_or_else(|| {
                            SudokuError::InvalidGrid(format!("empty run of {} overflows the grid", count))
                        })?;
                    run = None;
                } else if c.is_ascii_digit() {
                    buffer.push(c);
                } else {
                    return Err(SudokuError::InvalidGrid(format!(
                        "unexpected '{}' inside empty-run shortcut",
                        c
                    )));
                }
                continue;
            }

            let value = match c {
                's' => {
                    run = Some(String::new());
                    continue;
                }
                '.' | ' ' | '0' => 0,
                '1'..='9' => c as u8 - b'0',
                other => {
                    return Err(SudokuError::InvalidGrid(format!(
                        "unexpected character '{}'",
                        other
                    )));
                }
            };

            if n >= CELL_COUNT {
                return Err(SudokuError::InvalidGrid("more than 81 cells".to_string()));
            }
            sudoku.grid[n / GRID_SIZE][n % GRID_SIZE] = value;
            n += 1;
        }

        if run.is_some() {
            return Err(SudokuError::InvalidGrid("unterminated empty-run shortcut".to_string()));
        }
        if n != CELL_COUNT {
            return Err(SudokuError::InvalidGrid(format!("expected 81 cells, got {}", n)));
        }

        Ok(sudoku)
    }

    pub fn to_line(&self, empty: EmptyCell) -> String {
        let mut result = String::with_capacity(CELL_COUNT);
        let mut void_count = 0usize;

        let flush = |result: &mut String, void_count: &mut usize| {
            if *void_count == 0 {
                return;
            }
            if *void_count > 3 {
                result.push_str(&format!("s{}s", void_count));
            } else {
                result.push_str(&" ".repeat(*void_count));
            }
            *void_count = 0;
        };

        for value in self.grid.iter().flatten().copied() {
            if value == 0 {
                match empty {
                    EmptyCell::Zeros => result.push('0'),
                    EmptyCell::Points => result.push('.'),
                    EmptyCell::Shortcuts => void_count += 1,
                }
            } else {
                flush(&mut result, &mut void_count);
                result.push(char::from(b'0' + value));
            }
        }
        flush(&mut result, &mut void_count);

        result
    }

    /// Boxed 9x9 rendering with `.` for empty cells
    pub fn to_grid_string(&self) -> String {
        let separator = "+-------+-------+-------+\n";
        let mut out = String::new();

        for (row, values) in self.grid.iter().enumerate() {
            if row % 3 == 0 {
                out.push_str(separator);
            }
            for (col, value) in values.iter().enumerate() {
                if col % 3 == 0 {
                    out.push_str("| ");
                }
                if *value == 0 {
                    out.push('.');
                } else {
                    out.push(char::from(b'0' + value));
                }
                out.push(' ');
            }
            out.push_str("|\n");
        }
        out.push_str(separator);

        out
    }

    pub fn given_count(&self) -> usize {
        self.grid.iter().flatten().filter(|v| **v != 0).count()
    }

    pub fn is_complete(&self) -> bool {
        self.grid.iter().flatten().all(|v| *v != 0)
    }

    /// Complete and no digit repeats in any row, column or box
    pub fn is_correct(&self) -> bool {
        self.is_complete() && !self.has_conflicts()
    }

    /// True when two givens in the same row, column or box share a digit
    pub fn has_conflicts(&self) -> bool {
        let mut rows = [0u16; GRID_SIZE];
        let mut cols = [0u16; GRID_SIZE];
        let mut boxes = [0u16; GRID_SIZE];

        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                let value = self.grid[row][col];
                if value == 0 {
                    continue;
                }
                let bit = 1u16 << value;
                let b = box_index(row, col);
                if rows[row] & bit != 0 || cols[col] & bit != 0 || boxes[b] & bit != 0 {
                    return true;
                }
                rows[row] |= bit;
                cols[col] |= bit;
                boxes[b] |= bit;
            }
        }

        false
    }
}

impl fmt::Display for Sudoku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line(EmptyCell::Zeros))
    }
}

pub(crate) fn box_index(row: usize, col: usize) -> usize {
    (row / 3) * 3 + col / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUZZLE: &str =
        "530070000600195000098000060800060003400803001700020006060000280000419005000080079";

    #[test]
    fn parses_zeros_points_and_spaces() {
        let sudoku = Sudoku::from_line(PUZZLE).unwrap();
        assert_eq!(sudoku.get(0, 0), 5);
        assert_eq!(sudoku.get(0, 2), 0);
        assert_eq!(sudoku.get(8, 8), 9);
        assert_eq!(sudoku.given_count(), 30);

        let dotted = PUZZLE.replace('0', ".");
        assert_eq!(Sudoku::from_line(&dotted).unwrap(), sudoku);
    }

    #[test]
    fn shortcut_format_compresses_long_runs() {
        let sudoku = Sudoku::from_line(PUZZLE).unwrap();
        let line = sudoku.to_line(EmptyCell::Shortcuts);
        assert!(line.starts_with("53  7s4s6  195"));
        assert_eq!(Sudoku::from_line(&line).unwrap(), sudoku);
    }

    #[test]
    fn trailing_empties_are_kept_by_shortcuts() {
        let mut sudoku = Sudoku::new();
        sudoku.set(0, 0, 1);
        let line = sudoku.to_line(EmptyCell::Shortcuts);
        assert_eq!(line, "1s80s");
        assert_eq!(Sudoku::from_line(&line).unwrap(), sudoku);
    }

    #[test]
    fn rejects_wrong_length_and_bad_characters() {
        assert!(Sudoku::from_line("123").is_err());
        assert!(Sudoku::from_line(&format!("{}1", PUZZLE)).is_err());
        assert!(Sudoku::from_line(&PUZZLE.replacen('5', "x", 1)).is_err());
        assert!(Sudoku::from_line("s12").is_err());
    }

    #[test]
    fn rejects_huge_empty_run() {
        let err = Sudoku::from_line("1s18446744073709551615s").unwrap_err();
        assert!(matches!(err, SudokuError::InvalidGrid(_)));
        assert!(Sudoku::from_line("s82s").is_err());
        assert!(Sudoku::from_line("1s81s").is_err());
        assert!(Sudoku::from_line("s81s").is_ok());
    }

    #[test]
    fn set_ignores_out_of_range_values() {
        let mut sudoku = Sudoku::new();
        sudoku.set(3, 3, 12);
        assert_eq!(sudoku.get(3, 3), 0);
    }

    #[test]
    fn detects_conflicting_givens() {
        let mut sudoku = Sudoku::new();
        sudoku.set(0, 0, 4);
        sudoku.set(1, 1, 4);
        assert!(sudoku.has_conflicts());

        let mut column = Sudoku::new();
        column.set(0, 5, 9);
        column.set(8, 5, 9);
        assert!(column.has_conflicts());

        assert!(!Sudoku::from_line(PUZZLE).unwrap().has_conflicts());
    }

    #[test]
    fn grid_string_has_box_separators() {
        let grid = Sudoku::from_line(PUZZLE).unwrap().to_grid_string();
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines.len(), 13);
        assert_eq!(lines[0], "+-------+-------+-------+");
        assert_eq!(lines[1], "| 5 3 . | . 7 . | . . . |");
    }
}
