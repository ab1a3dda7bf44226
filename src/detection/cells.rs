use image::GrayImage;
use image::imageops::{self, FilterType};

use crate::models::CellPosition;
use crate::pipeline::BoundingBox;
use crate::sudoku::{CELL_COUNT, GRID_SIZE};

/// Side of the classifier input
pub const CELL_INPUT_SIZE: u32 = 28;

pub struct CellImage {
    pub position: CellPosition,
    pub bbox: BoundingBox,
    pub image: GrayImage,
}

/// Split a rectified grid into 81 equal cells, row-major.
/// A 450x450 grid yields 50x50 cells.
pub fn split_cells(grid: &GrayImage) -> Vec<CellImage> {
    let cell_w = grid.width() / GRID_SIZE as u32;
    let cell_h = grid.height() / GRID_SIZE as u32;

    (0..CELL_COUNT)
        .map(|index| {
            let position = CellPosition::from_index(index);
            let bbox = BoundingBox {
                x: position.col as u32 * cell_w,
                y: position.row as u32 * cell_h,
                width: cell_w,
                height: cell_h,
            };
            let image = imageops::crop_imm(grid, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
            CellImage { position, bbox, image }
        })
        .collect()
}

/// Resize a cell to the classifier input size
pub fn resize_cell(cell: &GrayImage, size: u32) -> GrayImage {
    imageops::resize(cell, size, size, FilterType::Triangle)
}

/// Fraction of pixels darker than `dark_level` inside the cell, ignoring a
/// `margin` wide frame where grid lines tend to bleed in
pub fn ink_ratio(cell: &GrayImage, margin: u32, dark_level: u8) -> f32 {
    let (width, height) = cell.dimensions();
    if width <= 2 * margin || height <= 2 * margin {
        return 0.0;
    }

    let mut dark = 0u32;
    let mut total = 0u32;
    for y in margin..height - margin {
        for x in margin..width - margin {
            if cell.get_pixel(x, y)[0] < dark_level {
                dark += 1;
            }
            total += 1;
        }
    }

    dark as f32 / total as f32
}
