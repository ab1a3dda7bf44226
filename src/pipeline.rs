use anyhow::{Context, Result};
use image::DynamicImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{CellPosition, Point};

/// Bounding box in the rectified grid or original image
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Data that flows through the pipeline
/// Each PipelineData is either the whole photo or one grid cell
#[derive(Clone)]
pub struct PipelineData {
    /// The working image (gray, binary, rectified or a cell)
    pub image: DynamicImage,

    /// The decoded photo, shared by every item split from it
    pub original: Arc<DynamicImage>,

    /// Region of the rectified grid this item covers (None means full image)
    pub bbox: Option<BoundingBox>,

    /// Grid position once the rectified image has been split into cells
    pub cell: Option<CellPosition>,

    /// Metadata for tracking properties (e.g., "grid_area", "digit", etc.)
    pub metadata: HashMap<String, MetadataValue>,
}

/// Metadata value types
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Bool(bool),
    Float(f32),
    Double(f64),
    Int(i32),
    Points(Vec<Point>),
}

impl PipelineData {
    /// Create PipelineData for a full image
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            image,
            original,
            bbox: None,
            cell: None,
            metadata: HashMap::new(),
        }
    }

    /// Create PipelineData for one cell split from a parent item
    pub fn from_cell(image: DynamicImage, parent: &PipelineData, cell: CellPosition, bbox: BoundingBox) -> Self {
        Self {
            image,
            original: parent.original.clone(),
            bbox: Some(bbox),
            cell: Some(cell),
            metadata: parent.metadata.clone(),
        }
    }

    /// Same item with a replaced working image
    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            image,
            original: self.original.clone(),
            bbox: self.bbox.clone(),
            cell: self.cell,
            metadata: self.metadata.clone(),
        }
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.metadata.get(key) {
            Some(MetadataValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.metadata.get(key) {
            Some(MetadataValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_double(&self, key: &str) -> Option<f64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Double(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.metadata.get(key) {
            Some(MetadataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_points(&self, key: &str) -> Option<&[Point]> {
        match self.metadata.get(key) {
            Some(MetadataValue::Points(v)) => Some(v.as_slice()),
            _ => None,
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

impl DebugConfig {
    /// Debug output rooted at `output_dir`, which must be empty or non-existent
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        Ok(Self { output_dir })
    }

    /// Save every item of a step into `<NN>_<step_name>/<MM>.png`
    fn save_step(&self, step_dir_name: &str, data: &[PipelineData]) -> Result<()> {
        let step_dir = self.output_dir.join(step_dir_name);
        std::fs::create_dir_all(&step_dir)
            .with_context(|| format!("Failed to create {}", step_dir.display()))?;

        for (idx, item) in data.iter().enumerate() {
            let filename = match item.cell {
                Some(cell) => format!("r{}c{}.png", cell.row, cell.col),
                None => format!("{:02}.png", idx + 1),
            };
            save_image(&item.image, &step_dir.join(filename))?;
        }

        log::debug!("Debug: saved {} images to {}/", data.len(), step_dir_name);
        Ok(())
    }
}

fn save_image(image: &DynamicImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .map_err(|e| anyhow::anyhow!("Failed to save debug image {}: {}", path.display(), e))
}

fn step_dir_name(index: usize, step_name: &str) -> String {
    format!("{:02}_{}", index, step_name.to_lowercase().replace(' ', "_"))
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Process data and return transformed data
    /// Steps can split data (1 → many), filter (many → fewer), or transform (many → many)
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>>;

    /// Human-readable name for this step (used in logs and debug folders)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(self, output_dir: PathBuf) -> Result<Self> {
        Ok(self.with_debug_config(DebugConfig::new(output_dir)?))
    }

    /// Enable debug mode with an already checked output directory.
    /// Files from an earlier run are overwritten.
    pub fn with_debug_config(mut self, debug: DebugConfig) -> Self {
        self.context.debug = Some(debug);
        self
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Helper method to add a step from a Box (for convenience)
    pub fn add_step_boxed(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.steps.push(Arc::from(step));
        self
    }

    /// Names of the steps in execution order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step sequentially on an input image
    pub fn run(&self, input: DynamicImage) -> Result<Vec<PipelineData>> {
        self.run_partial(input, self.steps.len())
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(&self, input: DynamicImage, num_steps: usize) -> Result<Vec<PipelineData>> {
        let mut data = vec![PipelineData::from_image(input)];

        if let Some(debug) = &self.context.debug {
            debug.save_step("00_input", &data)?;
        }

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            log::debug!("Running step {}: {} (processing {} items)", step_idx + 1, step.name(), data.len());

            data = step
                .process(data, &self.context)
                .with_context(|| format!("Step '{}' failed", step.name()))?;

            if let Some(debug) = &self.context.debug {
                debug.save_step(&step_dir_name(step_idx + 1, step.name()), &data)?;
            }

            log::debug!("  → {} items", data.len());
        }

        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    struct InvertStep;

    impl PipelineStep for InvertStep {
        fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
            Ok(data
                .into_iter()
                .map(|item| {
                    let mut image = item.image.clone();
                    image.invert();
                    item.with_image(image).with_metadata("inverted", MetadataValue::Bool(true))
                })
                .collect())
        }

        fn name(&self) -> &str {
            "Invert Colors"
        }
    }

    struct DuplicateStep;

    impl PipelineStep for DuplicateStep {
        fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
            Ok(data.iter().flat_map(|item| [item.clone(), item.clone()]).collect())
        }

        fn name(&self) -> &str {
            "Duplicate"
        }
    }

    fn input() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([10u8])))
    }

    #[test]
    fn steps_run_in_order_and_may_split() {
        let pipeline = Pipeline::new()
            .add_step_boxed(Box::new(InvertStep))
            .add_step_boxed(Box::new(DuplicateStep));

        let result = pipeline.run(input()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].image.to_luma8().get_pixel(0, 0)[0], 245);
        assert_eq!(result[1].get_bool("inverted"), Some(true));
    }

    #[test]
    fn run_partial_stops_early() {
        let pipeline = Pipeline::new()
            .add_step_boxed(Box::new(InvertStep))
            .add_step_boxed(Box::new(DuplicateStep));

        let result = pipeline.run_partial(input(), 1).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn debug_mode_writes_step_folders() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("debug");
        let pipeline = Pipeline::new()
            .add_step_boxed(Box::new(InvertStep))
            .with_debug(out.clone())
            .unwrap();

        pipeline.run(input()).unwrap();
        assert!(out.join("00_input/01.png").exists());
        assert!(out.join("01_invert_colors/01.png").exists());
    }

    #[test]
    fn debug_dir_must_be_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("stale.txt"), b"x").unwrap();
        assert!(Pipeline::new().with_debug(dir.path().to_path_buf()).is_err());
    }

    #[test]
    fn checked_debug_config_can_be_reused() {
        let dir = tempfile::TempDir::new().unwrap();
        let debug = DebugConfig::new(dir.path().join("debug")).unwrap();

        for _ in 0..2 {
            let pipeline = Pipeline::new()
                .add_step_boxed(Box::new(InvertStep))
                .with_debug_config(debug.clone());
            pipeline.run(input()).unwrap();
        }
        assert!(debug.output_dir.join("01_invert_colors/01.png").exists());
    }
}
