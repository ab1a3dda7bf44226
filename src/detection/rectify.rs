use std::cmp::Ordering;

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

use crate::error::{Result, SudokuError};
use crate::models::{CornerSet, Point};

/// Side of the rectified square
pub const WARP_SIZE: u32 = 450;

// Ties on the primary key fall back to coordinates so the result never
// depends on input order.
fn compare_by(key: impl Fn(&Point) -> f32) -> impl Fn(&&Point, &&Point) -> Ordering {
    move |a, b| {
        key(a)
            .total_cmp(&key(b))
            .then(a.x.total_cmp(&b.x))
            .then(a.y.total_cmp(&b.y))
    }
}

/// Order 4 unordered corners as top-left, top-right, bottom-left, bottom-right.
///
/// Top-left has the smallest `x + y` and bottom-right the largest; top-right
/// has the smallest `y - x` and bottom-left the largest. Only meaningful for a
/// roughly axis-aligned convex quadrilateral.
pub fn order_corners(points: &[Point; 4]) -> CornerSet {
    let by_sum = compare_by(Point::sum);
    let by_diff = compare_by(Point::diff);

    // iterators over a non-empty array always yield a value
    let pick = |found: Option<&Point>| found.copied().unwrap_or_default();

    CornerSet {
        top_left: pick(points.iter().min_by(&by_sum)),
        bottom_right: pick(points.iter().max_by(&by_sum)),
        top_right: pick(points.iter().min_by(&by_diff)),
        bottom_left: pick(points.iter().max_by(&by_diff)),
    }
}

/// Projective transform from the grid corners onto a `size` x `size` square
pub fn grid_projection(corners: &CornerSet, size: u32) -> Result<Projection> {
    let s = size as f32;
    let from = corners.to_array().map(|p| p.as_tuple());
    let to = [(0.0, 0.0), (s, 0.0), (0.0, s), (s, s)];

    Projection::from_control_points(from, to).ok_or(SudokuError::DegenerateCorners)
}

/// Warp the color photo onto a square and convert it to grayscale.
/// The output is always `size` x `size`, whatever the input resolution.
pub fn rectify(img: &DynamicImage, corners: &CornerSet, size: u32) -> Result<GrayImage> {
    let projection = grid_projection(corners, size)?;
    let rgb = img.to_rgb8();

    let mut warped = RgbImage::new(size, size);
    warp_into(&rgb, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut warped);

    Ok(DynamicImage::ImageRgb8(warped).to_luma8())
}
