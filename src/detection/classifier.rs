use std::path::PathBuf;

use image::GrayImage;
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::{NdTensor, Tensor};

use crate::error::{Result, SudokuError};

/// Number of classes the digit model distinguishes (digits 0-9)
pub const CLASS_COUNT: usize = 10;

/// Per-class scores for one 28x28 cell
pub trait DigitClassifier: Send + Sync {
    /// Returns one probability per class, index = digit
    fn probabilities(&self, cell: &GrayImage) -> Result<Vec<f32>>;

    fn name(&self) -> &str {
        "digit classifier"
    }
}

/// Tensor layout the model expects for a single-channel image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InputLayout {
    /// `[1, 28, 28, 1]`
    #[default]
    Nhwc,
    /// `[1, 1, 28, 28]`
    Nchw,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model_path: PathBuf,
    pub layout: InputLayout,
    /// Feed white-on-black digits instead of the photo's dark-on-light
    pub invert: bool,
    /// Scale pixel values into 0..=1
    pub normalize: bool,
    /// The model emits logits rather than probabilities
    pub softmax: bool,
}

impl ClassifierConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            layout: InputLayout::default(),
            invert: false,
            normalize: true,
            softmax: false,
        }
    }
}

/// Index and value of the highest score
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|v| v / sum).collect()
}

/// Flatten a cell into model input values, row-major
pub fn cell_to_input(cell: &GrayImage, invert: bool, normalize: bool) -> Vec<f32> {
    cell.pixels()
        .map(|p| {
            let value = (if invert { 255 - p[0] } else { p[0] }) as f32;
            if normalize { value / 255.0 } else { value }
        })
        .collect()
}

/// Input tensor shape for a `width` x `height` single-channel cell
pub fn input_shape(layout: InputLayout, width: usize, height: usize) -> [usize; 4] {
    match layout {
        InputLayout::Nhwc => [1, height, width, 1],
        InputLayout::Nchw => [1, 1, height, width],
    }
}

/// Validate raw model scores, optionally turning logits into probabilities
pub fn check_scores(scores: Vec<f32>, apply_softmax: bool) -> Result<Vec<f32>> {
    if scores.len() != CLASS_COUNT {
        return Err(SudokuError::ModelOutput(format!(
            "expected {} class scores, got {}",
            CLASS_COUNT,
            scores.len()
        )));
    }
    Ok(if apply_softmax { softmax(&scores) } else { scores })
}

/// Digit classifier backed by an rten model file
pub struct RtenClassifier {
    model: Model,
    config: ClassifierConfig,
}

impl RtenClassifier {
    /// Load the model once; it is reused for all 81 cells
    pub fn load(config: ClassifierConfig) -> Result<Self> {
        log::debug!("Loading classifier model {}", config.model_path.display());
        let model = Model::load_file(&config.model_path).map_err(|source| SudokuError::ModelLoad {
            path: config.model_path.clone(),
            source,
        })?;
        Ok(Self { model, config })
    }

    fn input_tensor(&self, cell: &GrayImage) -> NdTensor<f32, 4> {
        // a single channel has the same element order in both layouts
        let shape = input_shape(self.config.layout, cell.width() as usize, cell.height() as usize);
        NdTensor::from_data(shape, cell_to_input(cell, self.config.invert, self.config.normalize))
    }
}

impl DigitClassifier for RtenClassifier {
    fn probabilities(&self, cell: &GrayImage) -> Result<Vec<f32>> {
        let input = self.input_tensor(cell);
        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(SudokuError::Inference)?;

        let scores = Tensor::<f32>::try_from(output)
            .map_err(|e| SudokuError::ModelOutput(e.to_string()))?
            .to_vec();

        check_scores(scores, self.config.softmax)
    }

    fn name(&self) -> &str {
        "rten model"
    }
}
