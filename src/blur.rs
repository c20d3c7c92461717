//! Laplacian-variance blur scoring on person crops.

use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma};
use imageproc::filter::filter3x3;
use std::path::Path;

use crate::coco::BBox;
use crate::error::{ReduceError, Result};
use crate::predicates::BlurScorer;

const LAPLACIAN: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

/// Scores a crop by the variance of its 3x3 Laplacian response
#[derive(Debug, Default, Clone, Copy)]
pub struct LaplacianScorer;

impl BlurScorer for LaplacianScorer {
    fn blur_scores(&self, image_path: &Path, bboxes: &[BBox]) -> Result<Vec<f64>> {
        let img = image::open(image_path)?;
        bboxes
            .iter()
            .map(|bbox| score_crop(&img, image_path, bbox))
            .collect()
    }
}

fn score_crop(img: &DynamicImage, image_path: &Path, bbox: &BBox) -> Result<f64> {
    let (width, height) = img.dimensions();

    let x0 = bbox.x.floor().clamp(0.0, f64::from(width)) as u32;
    let y0 = bbox.y.floor().clamp(0.0, f64::from(height)) as u32;
    let x1 = (bbox.x + bbox.width).ceil().clamp(0.0, f64::from(width)) as u32;
    let y1 = (bbox.y + bbox.height).ceil().clamp(0.0, f64::from(height)) as u32;
    if x1 <= x0 || y1 <= y0 {
        return Err(ReduceError::Image(format!(
            "bbox {:?} lies outside {}x{} image {}",
            bbox,
            width,
            height,
            image_path.display()
        )));
    }

    let crop = img.crop_imm(x0, y0, x1 - x0, y1 - y0).to_luma8();
    Ok(laplacian_variance(&crop))
}

// Border pixels mirror without repeating the edge (OpenCV's BORDER_REFLECT_101)
fn reflect(i: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= len {
        i = 2 * len - 2 - i;
    }
    i as u32
}

/// One pixel of reflect-101 border on every side
fn pad_reflect(gray: &GrayImage) -> GrayImage {
    let (w, h) = (i64::from(gray.width()), i64::from(gray.height()));
    GrayImage::from_fn(gray.width() + 2, gray.height() + 2, |x, y| {
        *gray.get_pixel(reflect(i64::from(x) - 1, w), reflect(i64::from(y) - 1, h))
    })
}

/// Variance of the 4-neighbour Laplacian over every pixel of `gray`
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }

    let response: ImageBuffer<Luma<f32>, Vec<f32>> =
        filter3x3::<_, f32, f32>(&pad_reflect(gray), &LAPLACIAN);

    // the padding ring only feeds its neighbours
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 1..=height {
        for x in 1..=width {
            let value = f64::from(response.get_pixel(x, y)[0]);
            sum += value;
            sum_sq += value * value;
        }
    }
    let n = f64::from(width) * f64::from(height);
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}
