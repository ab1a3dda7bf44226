use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use sudoscan::sudoku::solver;
use sudoscan::{
    BlankDetection, ClassifierConfig, CornerSet, EmptyCell, Extraction, ExtractorConfig, InputLayout,
    RtenClassifier, SudokuExtractor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// 81 characters, blanks as 0
    Line,
    /// Boxed 9x9 grid
    Grid,
    Json,
}

#[derive(Parser)]
#[command(name = "sudoscan")]
#[command(about = "Read a sudoku grid from a photograph")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Digit classifier model (.rten), 28x28 single-channel input, 10 classes
    #[arg(short, long, env = "SUDOSCAN_MODEL", value_name = "MODEL")]
    model: PathBuf,

    /// Input tensor layout of the model
    #[arg(long, value_enum, default_value_t = InputLayout::Nhwc)]
    layout: InputLayout,

    /// Feed the model white digits on black
    #[arg(long)]
    invert: bool,

    /// Keep pixel values in 0..=255 instead of scaling to 0..=1
    #[arg(long)]
    raw_pixels: bool,

    /// Apply softmax to the model output (for models emitting logits)
    #[arg(long)]
    softmax: bool,

    /// Report predictions below this probability as blank
    #[arg(long, value_name = "P")]
    min_confidence: Option<f32>,

    /// Minimum fraction of dark pixels for a cell to hold a digit
    #[arg(long, default_value_t = 0.03, value_name = "RATIO")]
    blank_ink_ratio: f32,

    /// Classify every cell, even empty ones
    #[arg(long)]
    no_blank_detection: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Line)]
    format: OutputFormat,

    /// Also solve the recognized puzzle
    #[arg(long)]
    solve: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,
}

impl Cli {
    fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            layout: self.layout,
            invert: self.invert,
            normalize: !self.raw_pixels,
            softmax: self.softmax,
            ..ClassifierConfig::new(&self.model)
        }
    }

    fn extractor_config(&self) -> ExtractorConfig {
        let blank = if self.no_blank_detection {
            BlankDetection::disabled()
        } else {
            BlankDetection {
                min_ink_ratio: self.blank_ink_ratio,
                min_confidence: self.min_confidence,
                ..BlankDetection::default()
            }
        };
        ExtractorConfig {
            blank,
            ..ExtractorConfig::default()
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    digits: String,
    corners: &'a CornerSet,
    grid_area: f64,
    cells: &'a [sudoscan::CellReading],
    /// Absent without `--solve`, `null` when the grid has no solution
    #[serde(skip_serializing_if = "Option::is_none")]
    solution: Option<Option<String>>,
}

impl<'a> JsonReport<'a> {
    fn new(extraction: &'a Extraction, solve_requested: bool, solution: Option<String>) -> Self {
        Self {
            digits: extraction.digits(),
            corners: &extraction.corners,
            grid_area: extraction.grid_area,
            cells: &extraction.cells,
            solution: solve_requested.then_some(solution),
        }
    }
}

/// Solution as a line string, `None` when the grid has no solution
fn solve(extraction: &Extraction) -> Option<String> {
    let puzzle = extraction.to_sudoku();
    if puzzle.has_conflicts() {
        log::warn!("Recognized grid has conflicting digits");
        return None;
    }

    let solutions = solver::fill(&puzzle, 2);
    if solutions.len() > 1 {
        log::warn!("Recognized grid has more than one solution, showing the first");
    }
    solutions.into_iter().next().map(|s| s.to_line(EmptyCell::Zeros))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "sudoscan=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    log::debug!("Loading image: {:?}", args.image_path);

    let classifier = RtenClassifier::load(args.classifier_config())?;
    let mut extractor = SudokuExtractor::new(args.extractor_config(), Arc::new(classifier));
    if let Some(debug_dir) = &args.debug_out {
        extractor = extractor.with_debug(debug_dir.clone())?;
    }

    let extraction = extractor.extract_file(&args.image_path)?;
    let solution = if args.solve { solve(&extraction) } else { None };

    match args.format {
        OutputFormat::Line => {
            println!("{}", extraction.digits());
            if args.solve {
                println!("{}", solution.as_deref().unwrap_or("No solution"));
            }
        }
        OutputFormat::Grid => {
            print!("{}", extraction.to_sudoku().to_grid_string());
            if args.solve {
                match solution.as_deref().map(sudoscan::Sudoku::from_line) {
                    Some(Ok(solved)) => print!("\n{}", solved.to_grid_string()),
                    _ => println!("\nNo solution"),
                }
            }
        }
        OutputFormat::Json => {
            let report = JsonReport::new(&extraction, args.solve, solution);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
