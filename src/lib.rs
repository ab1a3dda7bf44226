pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod sudoku;

pub use detection::classifier::{ClassifierConfig, DigitClassifier, InputLayout, RtenClassifier};
pub use detection::{BlankDetection, ExtractorConfig, SudokuExtractor, load_image};
pub use error::SudokuError;
pub use models::{CellPosition, CellReading, CornerSet, Extraction, Point, Quadrilateral};
pub use pipeline::{
    BoundingBox, DebugConfig, MetadataValue, Pipeline, PipelineContext, PipelineData, PipelineStep,
};
pub use sudoku::{EmptyCell, Sudoku};
