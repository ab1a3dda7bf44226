use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point as PixelPoint;

use crate::models::{Point, Quadrilateral};

/// Absolute shoelace area of a closed polygon
pub fn polygon_area(points: &[PixelPoint<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    (twice as f64 / 2.0).abs()
}

/// Outermost contours only (borders with no enclosing contour)
pub fn external_contours(binary: &GrayImage) -> Vec<Vec<PixelPoint<i32>>> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| c.points)
        .collect()
}

/// Simplify a closed contour, epsilon is a fraction of its perimeter.
///
/// The contour is split at the point farthest from its start and each half
/// is simplified as an open curve, then vertices lying within epsilon of the
/// line through their neighbours are dropped.
pub fn approximate(contour: &[PixelPoint<i32>], epsilon_ratio: f64) -> Vec<PixelPoint<i32>> {
    let epsilon = epsilon_ratio * arc_length(contour, true);
    if contour.len() < 3 || epsilon <= 0.0 {
        return contour.to_vec();
    }

    let start = contour[0];
    let far = contour
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| {
            let (dx, dy) = ((p.x - start.x) as i64, (p.y - start.y) as i64);
            dx * dx + dy * dy
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![start];
    }

    let mut ring = contour.to_vec();
    ring.push(start);

    let mut polygon = approximate_polygon_dp(&ring[..=far], epsilon, false);
    polygon.pop();
    polygon.extend(approximate_polygon_dp(&ring[far..], epsilon, false));
    polygon.pop();

    prune_collinear(polygon, epsilon)
}

fn distance_to_line(p: PixelPoint<i32>, a: PixelPoint<i32>, b: PixelPoint<i32>) -> f64 {
    let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        let (px, py) = ((p.x - a.x) as f64, (p.y - a.y) as f64);
        return (px * px + py * py).sqrt();
    }
    (dy * (p.x - a.x) as f64 - dx * (p.y - a.y) as f64).abs() / length
}

fn prune_collinear(mut polygon: Vec<PixelPoint<i32>>, epsilon: f64) -> Vec<PixelPoint<i32>> {
    let mut changed = true;
    while changed && polygon.len() > 3 {
        changed = false;
        let n = polygon.len();
        for i in 0..n {
            let prev = polygon[(i + n - 1) % n];
            let next = polygon[(i + 1) % n];
            if distance_to_line(polygon[i], prev, next) < epsilon {
                polygon.remove(i);
                changed = true;
                break;
            }
        }
    }
    polygon
}

/// Every external contour that simplifies to 4 vertices with area above `min_area`
pub fn find_quadrilaterals(binary: &GrayImage, epsilon_ratio: f64, min_area: f64) -> Vec<Quadrilateral> {
    external_contours(binary)
        .iter()
        .filter(|contour| contour.len() >= 4)
        .filter_map(|contour| {
            let polygon = approximate(contour, epsilon_ratio);
            if polygon.len() != 4 {
                return None;
            }
            let area = polygon_area(&polygon);
            if area <= min_area {
                return None;
            }
            let points = [0, 1, 2, 3].map(|i| Point::new(polygon[i].x as f32, polygon[i].y as f32));
            Some(Quadrilateral { points, area })
        })
        .collect()
}

/// The largest quadrilateral, taken to be the puzzle boundary
pub fn largest_quadrilateral(binary: &GrayImage, epsilon_ratio: f64, min_area: f64) -> Option<Quadrilateral> {
    find_quadrilaterals(binary, epsilon_ratio, min_area)
        .into_iter()
        .max_by(|a, b| a.area.total_cmp(&b.area))
}
