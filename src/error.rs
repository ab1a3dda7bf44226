use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SudokuError {
    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// No 4-vertex contour with an area above the minimum was found.
    #[error("no valid puzzle area found (no quadrilateral contour larger than {min_area})")]
    NoGridFound { min_area: f64 },

    #[error("corner set is degenerate, no perspective transform exists")]
    DegenerateCorners,

    #[error("failed to load classifier model {path}: {source}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: rten::ModelLoadError,
    },

    #[error("classifier inference failed: {0}")]
    Inference(#[source] rten::RunError),

    #[error("unexpected classifier output: {0}")]
    ModelOutput(String),

    #[error("invalid sudoku grid: {0}")]
    InvalidGrid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SudokuError>;
