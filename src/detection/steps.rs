use crate::detection::classifier::{DigitClassifier, argmax};
use crate::detection::{BlankDetection, cells, contours, preprocessing, rectify};
use crate::error::SudokuError;
use crate::models::Point;
use crate::pipeline::{MetadataValue, PipelineContext, PipelineData, PipelineStep};
use anyhow::Result;
use image::DynamicImage;
use std::sync::Arc;

pub const CORNERS_KEY: &str = "corners";
pub const GRID_AREA_KEY: &str = "grid_area";
pub const INK_RATIO_KEY: &str = "ink_ratio";
pub const CONFIDENCE_KEY: &str = "confidence";
pub const DIGIT_KEY: &str = "digit";
pub const BLANK_KEY: &str = "blank";

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .iter()
            .map(|item| item.with_image(DynamicImage::ImageLuma8(preprocessing::to_grayscale(&item.image))))
            .collect())
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Apply Gaussian blur
pub struct BlurStep {
    pub sigma: f32,
}

impl PipelineStep for BlurStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let gray = item.image.to_luma8();
            let blurred = preprocessing::apply_blur(&gray, self.sigma);
            result.push(item.with_image(DynamicImage::ImageLuma8(blurred)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Gaussian Blur"
    }
}

/// Inverted adaptive mean threshold, ink becomes white
pub struct ThresholdStep {
    pub block_size: u32,
    pub constant: i32,
}

impl PipelineStep for ThresholdStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();
        for item in data {
            let gray = item.image.to_luma8();
            let binary = preprocessing::adaptive_threshold(&gray, self.block_size, self.constant);
            result.push(item.with_image(DynamicImage::ImageLuma8(binary)));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Adaptive Threshold"
    }
}

/// Find the puzzle boundary: the largest 4-vertex external contour
pub struct GridLocatorStep {
    pub epsilon_ratio: f64,
    pub min_area: f64,
}

impl PipelineStep for GridLocatorStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let binary = item.image.to_luma8();
            let quad = contours::largest_quadrilateral(&binary, self.epsilon_ratio, self.min_area)
                .ok_or(SudokuError::NoGridFound { min_area: self.min_area })?;
            let corners = rectify::order_corners(&quad.points);

            log::debug!(
                "Grid boundary area {:.0}, corners TL={:?} TR={:?} BL={:?} BR={:?}",
                quad.area,
                corners.top_left.as_tuple(),
                corners.top_right.as_tuple(),
                corners.bottom_left.as_tuple(),
                corners.bottom_right.as_tuple()
            );

            result.push(
                item.with_metadata(CORNERS_KEY, MetadataValue::Points(corners.to_array().to_vec()))
                    .with_metadata(GRID_AREA_KEY, MetadataValue::Double(quad.area)),
            );
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Grid Locator"
    }
}

/// Warp the original photo onto a square using the located corners
pub struct RectifyStep {
    pub size: u32,
}

impl PipelineStep for RectifyStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let points = item
                .get_points(CORNERS_KEY)
                .ok_or_else(|| anyhow::anyhow!("Missing {}", CORNERS_KEY))?;
            let corners: [Point; 4] = points
                .try_into()
                .map_err(|_| anyhow::anyhow!("Expected 4 corners, got {}", points.len()))?;
            // stored already ordered, re-ordering is a no-op for valid sets
            let corners = rectify::order_corners(&corners);

            let warped = rectify::rectify(&item.original, &corners, self.size)?;
            result.push(item.with_image(DynamicImage::ImageLuma8(warped)));
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Perspective Rectify"
    }
}

/// Split the rectified grid into 81 cells - one item becomes 81
pub struct CellSplitStep;

impl PipelineStep for CellSplitStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let grid = item.image.to_luma8();
            for cell in cells::split_cells(&grid) {
                result.push(PipelineData::from_cell(
                    DynamicImage::ImageLuma8(cell.image),
                    &item,
                    cell.position,
                    cell.bbox,
                ));
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Cell Split"
    }
}

/// Resize cells to the classifier input size
pub struct CellResizeStep {
    pub size: u32,
}

impl PipelineStep for CellResizeStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .iter()
            .map(|item| {
                let resized = cells::resize_cell(&item.image.to_luma8(), self.size);
                item.with_image(DynamicImage::ImageLuma8(resized))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Cell Resize"
    }
}

/// Classify each cell, marking blank cells instead of forcing a digit
pub struct ClassifyStep {
    classifier: Arc<dyn DigitClassifier>,
    blank: BlankDetection,
}

impl ClassifyStep {
    pub fn new(classifier: Arc<dyn DigitClassifier>, blank: BlankDetection) -> Self {
        Self { classifier, blank }
    }
}

impl PipelineStep for ClassifyStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let gray = item.image.to_luma8();
            let ink = cells::ink_ratio(&gray, self.blank.ink_margin, self.blank.dark_level);

            let (digit, confidence) = if self.blank.enabled && ink < self.blank.min_ink_ratio {
                (None, 0.0)
            } else {
                let probabilities = self.classifier.probabilities(&gray)?;
                let (class, confidence) = argmax(&probabilities)
                    .ok_or_else(|| SudokuError::ModelOutput("no class scores".to_string()))?;
                let low_confidence = self.blank.min_confidence.is_some_and(|min| confidence < min);
                let zero_blank = class == 0 && self.blank.zero_is_blank;
                if self.blank.enabled && (low_confidence || zero_blank) {
                    (None, confidence)
                } else {
                    (Some(class as u8), confidence)
                }
            };

            if let Some(cell) = item.cell {
                log::trace!(
                    "Cell r{}c{}: digit={:?} confidence={:.2} ink={:.3}",
                    cell.row, cell.col, digit, confidence, ink
                );
            }

            let mut new_item = item
                .with_metadata(INK_RATIO_KEY, MetadataValue::Float(ink))
                .with_metadata(CONFIDENCE_KEY, MetadataValue::Float(confidence))
                .with_metadata(BLANK_KEY, MetadataValue::Bool(digit.is_none()));
            if let Some(d) = digit {
                new_item = new_item.with_metadata(DIGIT_KEY, MetadataValue::Int(d as i32));
            }
            result.push(new_item);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Digit Classification"
    }
}
