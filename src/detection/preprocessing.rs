use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::{box_filter, gaussian_blur_f32};

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise.
/// imageproc sizes the kernel from `sigma`, so sigma 1.0 gives 7 taps rather
/// than a fixed 5x5 window; the taps beyond radius 2 weigh under 0.5%.
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Inverted adaptive mean threshold.
///
/// A pixel becomes foreground (255) when `pixel <= mean - constant`, where
/// `mean` is taken over its `block_size` x `block_size` neighbourhood.
/// Dark ink on paper ends up white.
pub fn adaptive_threshold(img: &GrayImage, block_size: u32, constant: i32) -> GrayImage {
    let radius = (block_size.max(3)) / 2;
    let means = box_filter(img, radius, radius);

    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let threshold = means.get_pixel(x, y)[0] as i32 - constant;
        let value = if (pixel[0] as i32) <= threshold { 255 } else { 0 };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_line_becomes_foreground() {
        let mut img = GrayImage::from_pixel(40, 40, Luma([230u8]));
        for y in 0..40 {
            img.put_pixel(20, y, Luma([20u8]));
        }

        let binary = adaptive_threshold(&img, 11, 2);
        assert_eq!(binary.get_pixel(20, 10)[0], 255);
        assert_eq!(binary.get_pixel(5, 10)[0], 0);
    }

    #[test]
    fn blur_spreads_a_dot_over_its_neighbours() {
        let mut img = GrayImage::from_pixel(15, 15, Luma([0u8]));
        img.put_pixel(7, 7, Luma([255u8]));

        let blurred = apply_blur(&img, 1.0);
        let centre = blurred.get_pixel(7, 7)[0];
        assert!(centre < 255 && centre > blurred.get_pixel(8, 7)[0]);
        assert!(blurred.get_pixel(9, 7)[0] > 0);
        assert_eq!(blurred.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn uniform_image_has_no_foreground() {
        let img = GrayImage::from_pixel(30, 30, Luma([128u8]));
        let binary = adaptive_threshold(&img, 11, 2);
        assert!(binary.pixels().all(|p| p[0] == 0));
    }
}
