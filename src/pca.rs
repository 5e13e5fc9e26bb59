//! Two-component PCA of embedding vectors and a PNG scatterplot.
//!
//! Power iteration with deflation on the centred sample matrix. With the
//! handful of chunk vectors one upload produces this is plenty.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use std::io::Cursor;

use crate::types::{NlpError, Result};

pub const MSG_TOO_FEW_SAMPLES: &str = "PCA requires at least 2 samples.";
pub const MSG_TOO_FEW_DIMS: &str = "Not enough embedding dimensions.";

const ITERATIONS: usize = 200;
const TOLERANCE: f64 = 1e-10;

const PLOT_WIDTH: u32 = 480;
const PLOT_HEIGHT: u32 = 360;
const MARGIN: u32 = 36;
const POINT_RADIUS: i64 = 5;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PcaOutcome {
    Projected {
        points: Vec<[f64; 2]>,
        explained_variance: [f64; 2],
    },
    Skipped {
        reason: String,
    },
}

impl PcaOutcome {
    fn skipped(reason: &str) -> Self {
        PcaOutcome::Skipped {
            reason: reason.to_string(),
        }
    }
}

/// Project `samples` onto their first two principal components.
///
/// Too few samples or dimensions is a `Skipped` outcome, not an error.
/// Samples of unequal length are an error.
pub fn project(samples: &[Vec<f32>]) -> Result<PcaOutcome> {
    if samples.len() < 2 {
        return Ok(PcaOutcome::skipped(MSG_TOO_FEW_SAMPLES));
    }
    let dims = samples[0].len();
    if dims < 2 {
        return Ok(PcaOutcome::skipped(MSG_TOO_FEW_DIMS));
    }
    if samples.iter().any(|s| s.len() != dims) {
        return Err(NlpError::Model("embedding vectors differ in length".into()));
    }

    let mut x = Array2::<f64>::zeros((samples.len(), dims));
    for (mut row, sample) in x.axis_iter_mut(Axis(0)).zip(samples) {
        for (dst, &v) in row.iter_mut().zip(sample) {
            *dst = v as f64;
        }
    }
    if let Some(mean) = x.mean_axis(Axis(0)) {
        x -= &mean;
    }
    let centred = x.clone();
    let denom = (samples.len() - 1) as f64;

    let mut components = Vec::with_capacity(2);
    let mut variances = [0.0; 2];
    for variance in variances.iter_mut() {
        let v = leading_direction(&x);
        let scores = x.dot(&v);
        *variance = scores.dot(&scores) / denom;
        // Deflate: remove this direction from every sample
        let outer = scores
            .view()
            .insert_axis(Axis(1))
            .dot(&v.view().insert_axis(Axis(0)));
        x -= &outer;
        components.push(v);
    }

    let points = centred
        .axis_iter(Axis(0))
        .map(|row| [row.dot(&components[0]), row.dot(&components[1])])
        .collect();

    Ok(PcaOutcome::Projected {
        points,
        explained_variance: variances,
    })
}

/// Unit vector maximising variance of `x`, or zeros when `x` has none left.
fn leading_direction(x: &Array2<f64>) -> Array1<f64> {
    let dims = x.ncols();

    // Start from the sample with the largest norm
    let start = x
        .axis_iter(Axis(0))
        .max_by(|a, b| a.dot(a).total_cmp(&b.dot(b)))
        .map(|row| row.to_owned())
        .unwrap_or_else(|| Array1::zeros(dims));
    let Some(mut v) = normalized(start) else {
        return Array1::zeros(dims);
    };

    for _ in 0..ITERATIONS {
        let next = x.t().dot(&x.dot(&v));
        let Some(next) = normalized(next) else {
            return Array1::zeros(dims);
        };
        let delta = (&next - &v).mapv(|d| d * d).sum();
        v = next;
        if delta < TOLERANCE {
            break;
        }
    }

    // Deterministic sign: largest loading positive
    let pivot = v
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if pivot < 0.0 {
        v.mapv_inplace(|c| -c);
    }
    v
}

fn normalized(v: Array1<f64>) -> Option<Array1<f64>> {
    let norm = v.dot(&v).sqrt();
    if norm < 1e-12 {
        None
    } else {
        Some(v / norm)
    }
}

/// Render projected points as a PNG scatterplot with axes.
pub fn render_scatter(points: &[[f64; 2]]) -> Result<Vec<u8>> {
    let mut img = RgbImage::from_pixel(PLOT_WIDTH, PLOT_HEIGHT, Rgb([255, 255, 255]));
    let axis = Rgb([120, 120, 120]);
    let dot = Rgb([31, 119, 180]);

    let (left, right) = (MARGIN, PLOT_WIDTH - MARGIN);
    let (top, bottom) = (MARGIN, PLOT_HEIGHT - MARGIN);
    for x in left..=right {
        img.put_pixel(x, bottom, axis);
    }
    for y in top..=bottom {
        img.put_pixel(left, y, axis);
    }

    let (min_x, max_x) = bounds(points.iter().map(|p| p[0]));
    let (min_y, max_y) = bounds(points.iter().map(|p| p[1]));
    let inner_w = (right - left - 2 * POINT_RADIUS as u32) as f64;
    let inner_h = (bottom - top - 2 * POINT_RADIUS as u32) as f64;

    for p in points {
        let px = left as f64 + POINT_RADIUS as f64 + scale(p[0], min_x, max_x) * inner_w;
        // Image y grows downwards
        let py = bottom as f64 - POINT_RADIUS as f64 - scale(p[1], min_y, max_y) * inner_h;
        draw_dot(&mut img, px.round() as i64, py.round() as i64, dot);
    }

    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| NlpError::Render(format!("failed to encode plot: {}", e)))?;
    Ok(buffer)
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

// Map into [0, 1]; a degenerate range lands in the middle
fn scale(v: f64, lo: f64, hi: f64) -> f64 {
    if !(hi - lo).is_normal() {
        0.5
    } else {
        (v - lo) / (hi - lo)
    }
}

fn draw_dot(img: &mut RgbImage, cx: i64, cy: i64, color: Rgb<u8>) {
    for dy in -POINT_RADIUS..=POINT_RADIUS {
        for dx in -POINT_RADIUS..=POINT_RADIUS {
            if dx * dx + dy * dy > POINT_RADIUS * POINT_RADIUS {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sample_is_skipped() {
        let outcome = project(&[vec![0.1, 0.2, 0.3]]).unwrap();
        assert_eq!(outcome, PcaOutcome::skipped(MSG_TOO_FEW_SAMPLES));
        assert_eq!(project(&[]).unwrap(), PcaOutcome::skipped(MSG_TOO_FEW_SAMPLES));
    }

    #[test]
    fn one_dimension_is_skipped() {
        let outcome = project(&[vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(outcome, PcaOutcome::skipped(MSG_TOO_FEW_DIMS));
    }

    #[test]
    fn ragged_samples_are_an_error() {
        assert!(project(&[vec![1.0, 2.0], vec![1.0]]).is_err());
    }

    #[test]
    fn recovers_dominant_axis() {
        // Points spread along x with a little y jitter
        let samples = vec![
            vec![-2.0, 0.1, 0.0],
            vec![-1.0, -0.1, 0.0],
            vec![0.0, 0.0, 0.0],
            vec![1.0, -0.1, 0.0],
            vec![2.0, 0.1, 0.0],
        ];
        let PcaOutcome::Projected { points, explained_variance } = project(&samples).unwrap() else {
            panic!("expected a projection");
        };
        assert_eq!(points.len(), 5);
        // First component is x, so scores are ordered like the inputs
        assert!(points.windows(2).all(|w| w[0][0] < w[1][0]));
        assert!((points[4][0] - 2.0).abs() < 1e-6);
        assert!(explained_variance[0] > 100.0 * explained_variance[1]);
    }

    #[test]
    fn two_samples_project_to_a_line() {
        let samples = vec![vec![1.0, 1.0], vec![3.0, 3.0]];
        let PcaOutcome::Projected { points, .. } = project(&samples).unwrap() else {
            panic!("expected a projection");
        };
        let expected = 2.0_f64.sqrt();
        assert!((points[0][0] + expected).abs() < 1e-6);
        assert!((points[1][0] - expected).abs() < 1e-6);
        assert!(points.iter().all(|p| p[1].abs() < 1e-6));
    }

    #[test]
    fn scatter_is_a_png() {
        let png = render_scatter(&[[0.0, 0.0], [1.0, 2.0], [-1.0, 0.5]]).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), PLOT_WIDTH);
    }

    #[test]
    fn scatter_handles_identical_points() {
        assert!(render_scatter(&[[1.0, 1.0], [1.0, 1.0]]).is_ok());
    }
}
