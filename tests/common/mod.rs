mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from sudoscan for tests
pub use sudoscan::{
    BlankDetection, DigitClassifier, Extraction, ExtractorConfig, Sudoku, SudokuError, SudokuExtractor,
};
