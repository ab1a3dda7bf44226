use serde::Serialize;

use crate::sudoku::Sudoku;

/// 2D point in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn sum(&self) -> f32 {
        self.x + self.y
    }

    /// `y - x`, smallest at the top-right corner and largest at the bottom-left
    pub fn diff(&self) -> f32 {
        self.y - self.x
    }

    pub fn as_tuple(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// A 4-vertex polygon approximated from a contour
#[derive(Debug, Clone, PartialEq)]
pub struct Quadrilateral {
    pub points: [Point; 4],
    pub area: f64,
}

/// Grid corners in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CornerSet {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

impl CornerSet {
    /// Corners as an array in (top-left, top-right, bottom-left, bottom-right) order
    pub fn to_array(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_left, self.bottom_right]
    }
}

/// Location of a cell inside the 9x9 grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CellPosition {
    pub row: u8,
    pub col: u8,
}

impl CellPosition {
    pub fn from_index(index: usize) -> Self {
        Self {
            row: (index / 9) as u8,
            col: (index % 9) as u8,
        }
    }

    /// Row-major index, 0..81
    pub fn index(&self) -> usize {
        self.row as usize * 9 + self.col as usize
    }
}

/// Classification result for a single cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellReading {
    pub position: CellPosition,
    /// Recognized digit, `None` for a blank cell
    pub digit: Option<u8>,
    /// Probability of the winning class, 0.0 when the classifier was skipped
    pub confidence: f32,
    pub ink_ratio: f32,
}

impl CellReading {
    pub fn as_char(&self) -> char {
        match self.digit {
            Some(d) => char::from(b'0' + d),
            None => '0',
        }
    }
}

/// Everything recovered from one photograph
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub corners: CornerSet,
    pub grid_area: f64,
    /// Row-major, always 81 entries
    pub cells: Vec<CellReading>,
}

impl Extraction {
    /// The 81-character digit string, blanks rendered as `0`
    pub fn digits(&self) -> String {
        self.cells.iter().map(CellReading::as_char).collect()
    }

    pub fn cell(&self, row: u8, col: u8) -> Option<&CellReading> {
        self.cells.get(CellPosition { row, col }.index())
    }

    pub fn blank_count(&self) -> usize {
        self.cells.iter().filter(|c| c.digit.is_none()).count()
    }

    pub fn to_sudoku(&self) -> Sudoku {
        let mut sudoku = Sudoku::new();
        for cell in &self.cells {
            let value = cell.digit.unwrap_or(0);
            sudoku.set(cell.position.row as usize, cell.position.col as usize, value);
        }
        sudoku
    }
}
