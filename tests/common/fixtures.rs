use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use sudoscan::{DigitClassifier, ExtractorConfig, SudokuExtractor};

/// Classic puzzle, 0 = blank
pub const PUZZLE: &str =
    "530070000600195000098000060800060003400803001700020006060000280000419005000080079";
pub const SOLUTION: &str =
    "534678912672195348198342567859761423426853791713924856961537284287419635345286179";

/// Pip lattice centres inside a 50px cell (pixel ranges 7..17, 20..30, 33..43)
const LATTICE: [f32; 3] = [12.0, 25.0, 38.0];
const PIP_SIZE: f32 = 10.0;

/// Dice-style pip layout per digit, positions are `row * 3 + col` on the lattice
pub const PIP_PATTERNS: [&[usize]; 10] = [
    &[],
    &[4],
    &[0, 8],
    &[0, 4, 8],
    &[0, 2, 6, 8],
    &[0, 2, 4, 6, 8],
    &[0, 2, 3, 5, 6, 8],
    &[0, 2, 3, 4, 5, 6, 8],
    &[0, 1, 2, 3, 5, 6, 7, 8],
    &[0, 1, 2, 3, 4, 5, 6, 7, 8],
];

/// Where and how large the synthetic grid is drawn
pub struct GridLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub origin_x: u32,
    pub origin_y: u32,
    pub cell: u32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            canvas_width: 600,
            canvas_height: 600,
            origin_x: 60,
            origin_y: 60,
            cell: 50,
        }
    }
}

impl GridLayout {
    pub fn side(&self) -> u32 {
        self.cell * 9
    }
}

const INK: Rgb<u8> = Rgb([20, 20, 20]);

/// Render a sudoku photo: white paper, a 3px outer border, 1px inner lines
/// and each digit as a pip pattern in its cell.
pub fn render_sudoku(digits: &str, layout: &GridLayout) -> DynamicImage {
    let mut img = RgbImage::from_pixel(layout.canvas_width, layout.canvas_height, Rgb([245, 245, 240]));
    let (ox, oy, side) = (layout.origin_x as i32, layout.origin_y as i32, layout.side());
    let scale = layout.cell as f32 / 50.0;

    for k in 1..9 {
        let offset = (k * layout.cell) as i32;
        draw_filled_rect_mut(&mut img, Rect::at(ox + offset, oy).of_size(1, side), INK);
        draw_filled_rect_mut(&mut img, Rect::at(ox, oy + offset).of_size(side, 1), INK);
    }
    let border = 3;
    draw_filled_rect_mut(&mut img, Rect::at(ox, oy).of_size(side, border), INK);
    draw_filled_rect_mut(&mut img, Rect::at(ox, oy + side as i32 - border as i32).of_size(side, border), INK);
    draw_filled_rect_mut(&mut img, Rect::at(ox, oy).of_size(border, side), INK);
    draw_filled_rect_mut(&mut img, Rect::at(ox + side as i32 - border as i32, oy).of_size(border, side), INK);

    let pip = (PIP_SIZE * scale).round() as u32;
    for (index, c) in digits.chars().enumerate() {
        let digit = c.to_digit(10).unwrap_or(0) as usize;
        let (row, col) = ((index / 9) as i32, (index % 9) as i32);
        let cell_x = ox + col * layout.cell as i32;
        let cell_y = oy + row * layout.cell as i32;

        for pos in PIP_PATTERNS[digit] {
            let cx = cell_x as f32 + LATTICE[pos % 3] * scale;
            let cy = cell_y as f32 + LATTICE[pos / 3] * scale;
            let x = (cx - pip as f32 / 2.0).round() as i32;
            let y = (cy - pip as f32 / 2.0).round() as i32;
            draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(pip, pip), INK);
        }
    }

    DynamicImage::ImageRgb8(img)
}

/// Plain paper with nothing on it
pub fn render_blank_page(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([245, 245, 240])))
}

/// Reads the pip lattice of a classifier-sized cell back into a digit.
/// Unknown patterns, including empty cells, come out as class 0.
pub struct PipClassifier;

impl PipClassifier {
    fn lattice_mask(cell: &GrayImage) -> [bool; 9] {
        let size = cell.width() as f32;
        let mut mask = [false; 9];

        for (pos, dark) in mask.iter_mut().enumerate() {
            // a pip spans [c - 5, c + 5) in the 50px cell, so its centre is c - 0.5
            let to_cell = |c: f32| (c * size / 50.0 - 0.5).round() as i32;
            let cx = to_cell(LATTICE[pos % 3]);
            let cy = to_cell(LATTICE[pos / 3]);

            let mut sum = 0u32;
            let mut count = 0u32;
            for y in (cy - 1)..=(cy + 1) {
                for x in (cx - 1)..=(cx + 1) {
                    if x >= 0 && y >= 0 && (x as u32) < cell.width() && (y as u32) < cell.height() {
                        sum += cell.get_pixel(x as u32, y as u32)[0] as u32;
                        count += 1;
                    }
                }
            }
            *dark = count > 0 && sum / count < 128;
        }

        mask
    }

    pub fn read_digit(cell: &GrayImage) -> usize {
        let mask = Self::lattice_mask(cell);
        PIP_PATTERNS
            .iter()
            .enumerate()
            .find(|(_, pattern)| (0..9).all(|pos| mask[pos] == pattern.contains(&pos)))
            .map(|(digit, _)| digit)
            .unwrap_or(0)
    }
}

impl DigitClassifier for PipClassifier {
    fn probabilities(&self, cell: &GrayImage) -> sudoscan::error::Result<Vec<f32>> {
        let digit = Self::read_digit(cell);
        let mut probabilities = vec![0.01; 10];
        probabilities[digit] = 0.91;
        Ok(probabilities)
    }
}

/// Wraps a classifier and counts how many cells reached it
pub struct CountingClassifier<C> {
    pub inner: C,
    pub calls: AtomicUsize,
}

impl<C> CountingClassifier<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<C: DigitClassifier> DigitClassifier for CountingClassifier<C> {
    fn probabilities(&self, cell: &GrayImage) -> sudoscan::error::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.probabilities(cell)
    }
}

/// Always answers the same flat distribution, for models that cannot tell
pub struct UniformClassifier;

impl DigitClassifier for UniformClassifier {
    fn probabilities(&self, _cell: &GrayImage) -> sudoscan::error::Result<Vec<f32>> {
        Ok(vec![0.1; 10])
    }
}

pub fn pip_extractor(config: ExtractorConfig) -> SudokuExtractor {
    SudokuExtractor::new(config, Arc::new(PipClassifier))
}
