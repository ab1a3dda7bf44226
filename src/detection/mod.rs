pub mod preprocessing;
pub mod contours;
pub mod rectify;
pub mod cells;
pub mod classifier;
pub mod steps;

use anyhow::Context;
use image::{DynamicImage, GrayImage, ImageReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SudokuError;
use crate::models::{CellReading, CornerSet, Extraction, Point};
use crate::pipeline::{DebugConfig, Pipeline, PipelineData};
use crate::sudoku::CELL_COUNT;
use classifier::DigitClassifier;
use steps::*;

// Step counts of the standard pipeline up to the grid locator and the rectifier
const LOCATE_STEPS: usize = 4;
const RECTIFY_STEPS: usize = 5;

/// How empty cells are told apart from digits
#[derive(Debug, Clone, PartialEq)]
pub struct BlankDetection {
    /// When false every cell is forced into a digit class
    pub enabled: bool,
    /// Cells with less ink than this are blank and skip the classifier
    pub min_ink_ratio: f32,
    /// Frame ignored when measuring ink, in classifier-input pixels
    pub ink_margin: u32,
    /// Pixels darker than this count as ink
    pub dark_level: u8,
    /// Predictions below this probability are reported blank
    pub min_confidence: Option<f32>,
    /// Class 0 never occurs in a sudoku, so it reads as blank
    pub zero_is_blank: bool,
}

impl Default for BlankDetection {
    fn default() -> Self {
        Self {
            enabled: true,
            min_ink_ratio: 0.03,
            ink_margin: 4,
            dark_level: 128,
            min_confidence: None,
            zero_is_blank: true,
        }
    }
}

impl BlankDetection {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Extraction parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    pub blur_sigma: f32,
    pub threshold_block_size: u32,
    pub threshold_constant: i32,
    /// Smallest boundary area accepted as the puzzle
    pub min_area: f64,
    /// Polygon approximation tolerance as a fraction of the contour perimeter
    pub epsilon_ratio: f64,
    pub warp_size: u32,
    pub cell_input_size: u32,
    pub blank: BlankDetection,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            threshold_block_size: 11,
            threshold_constant: 2,
            min_area: 30.0,
            epsilon_ratio: 0.02,
            warp_size: rectify::WARP_SIZE,
            cell_input_size: cells::CELL_INPUT_SIZE,
            blank: BlankDetection::default(),
        }
    }
}

/// Decode an image file
pub fn load_image(path: &Path) -> Result<DynamicImage, SudokuError> {
    let decode = |source| SudokuError::ImageDecode {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(decode)
}

/// Main extraction orchestrator
pub struct SudokuExtractor {
    config: ExtractorConfig,
    classifier: Arc<dyn DigitClassifier>,
    debug: Option<DebugConfig>,
}

impl SudokuExtractor {
    pub fn new(config: ExtractorConfig, classifier: Arc<dyn DigitClassifier>) -> Self {
        Self {
            config,
            classifier,
            debug: None,
        }
    }

    /// Save every intermediate image under `dir` (must be empty or absent).
    /// Each later `locate`, `rectify` or `extract` call overwrites the images
    /// of the previous one.
    pub fn with_debug(mut self, dir: PathBuf) -> anyhow::Result<Self> {
        self.debug = Some(DebugConfig::new(dir)?);
        Ok(self)
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Build the full pipeline, photo in, 81 classified cells out
    pub fn build_pipeline(&self) -> Pipeline {
        let config = &self.config;
        let mut pipeline = Pipeline::new()
            .add_step(Arc::new(GrayscaleStep))
            .add_step(Arc::new(BlurStep { sigma: config.blur_sigma }))
            .add_step(Arc::new(ThresholdStep {
                block_size: config.threshold_block_size,
                constant: config.threshold_constant,
            }))
            .add_step(Arc::new(GridLocatorStep {
                epsilon_ratio: config.epsilon_ratio,
                min_area: config.min_area,
            }))
            .add_step(Arc::new(RectifyStep { size: config.warp_size }))
            .add_step(Arc::new(CellSplitStep))
            .add_step(Arc::new(CellResizeStep { size: config.cell_input_size }))
            .add_step(Arc::new(ClassifyStep::new(
                self.classifier.clone(),
                config.blank.clone(),
            )));

        if let Some(debug) = &self.debug {
            pipeline = pipeline.with_debug_config(debug.clone());
        }

        pipeline
    }

    /// Locate the puzzle boundary only: ordered corners and area
    pub fn locate(&self, img: &DynamicImage) -> anyhow::Result<(CornerSet, f64)> {
        let pipeline = self.build_pipeline();
        let located = pipeline.run_partial(img.clone(), LOCATE_STEPS)?;
        let item = single(located)?;
        Ok((corners_of(&item)?, item.get_double(GRID_AREA_KEY).unwrap_or(0.0)))
    }

    /// Locate and rectify, returning the square grayscale grid
    pub fn rectify(&self, img: &DynamicImage) -> anyhow::Result<GrayImage> {
        let pipeline = self.build_pipeline();
        let rectified = pipeline.run_partial(img.clone(), RECTIFY_STEPS)?;
        Ok(single(rectified)?.image.to_luma8())
    }

    /// Run the whole pipeline on a photo
    pub fn extract(&self, img: &DynamicImage) -> anyhow::Result<Extraction> {
        log::info!(
            "Extracting sudoku from {}x{} image using {}",
            img.width(),
            img.height(),
            self.classifier.name()
        );

        let pipeline = self.build_pipeline();
        let results = pipeline.run(img.clone())?;

        if results.len() != CELL_COUNT {
            anyhow::bail!("Expected {} cells, pipeline produced {}", CELL_COUNT, results.len());
        }

        let first = &results[0];
        let corners = corners_of(first)?;
        let grid_area = first.get_double(GRID_AREA_KEY).unwrap_or(0.0);

        let mut cells: Vec<CellReading> = results
            .iter()
            .map(|item| -> anyhow::Result<CellReading> {
                let position = item.cell.context("Classified item has no cell position")?;
                let digit = match item.get_bool(BLANK_KEY) {
                    Some(true) => None,
                    Some(false) => {
                        let digit = item.get_int(DIGIT_KEY).context("Classified cell has no digit")?;
                        Some(digit as u8)
                    }
                    None => anyhow::bail!("Cell r{}c{} was not classified", position.row, position.col),
                };
                Ok(CellReading {
                    position,
                    digit,
                    confidence: item.get_float(CONFIDENCE_KEY).unwrap_or(0.0),
                    ink_ratio: item.get_float(INK_RATIO_KEY).unwrap_or(0.0),
                })
            })
            .collect::<anyhow::Result<_>>()?;
        cells.sort_by_key(|c| c.position.index());

        let extraction = Extraction { corners, grid_area, cells };
        log::info!(
            "Recognized {} digits, {} blank cells",
            CELL_COUNT - extraction.blank_count(),
            extraction.blank_count()
        );

        Ok(extraction)
    }

    /// Load an image file and extract it
    pub fn extract_file(&self, path: &Path) -> anyhow::Result<Extraction> {
        let img = load_image(path)?;
        log::debug!("Image loaded: {}x{}", img.width(), img.height());
        self.extract(&img)
    }
}

fn single(mut data: Vec<PipelineData>) -> anyhow::Result<PipelineData> {
    if data.len() != 1 {
        anyhow::bail!("Expected a single image, got {}", data.len());
    }
    data.pop().context("Pipeline returned no data")
}

fn corners_of(item: &PipelineData) -> anyhow::Result<CornerSet> {
    let points: &[Point] = item.get_points(CORNERS_KEY).context("Missing grid corners")?;
    let points: [Point; 4] = points
        .try_into()
        .map_err(|_| anyhow::anyhow!("Expected 4 corners, got {}", points.len()))?;
    Ok(rectify::order_corners(&points))
}
