//! Sparse-to-dense LUT interpolation.
//!
//! Pure functions over in-memory grids; file parsing lives in the
//! calibration and noise modules. Two shapes of sparse input occur in EW
//! products: a regular grid (calibration LUT, same pixel set on every
//! line) and per-line vectors with possibly differing pixel sets (noise
//! LUT).

use crate::types::{EwError, EwResult};
use ndarray::Array2;

/// One sparse annotation line: gain or noise values at the given pixels.
#[derive(Debug, Clone)]
pub struct LineVector {
    pub line: usize,
    pub pixels: Vec<usize>,
    pub values: Vec<f32>,
}

/// Locate the knot segment for coordinate `t` and the interpolation weight
/// within it. The weight is unclamped, so callers get linear extrapolation
/// beyond the first/last knot (degree-1 spline semantics).
fn segment(knots: &[usize], t: f64) -> (usize, f64) {
    let n = knots.len();
    if n == 1 {
        return (0, 0.0);
    }
    let k = knots.partition_point(|&x| (x as f64) <= t);
    let seg = k.saturating_sub(1).min(n - 2);
    let x0 = knots[seg] as f64;
    let x1 = knots[seg + 1] as f64;
    (seg, (t - x0) / (x1 - x0))
}

fn check_increasing(knots: &[usize], what: &str) -> EwResult<()> {
    if knots.is_empty() {
        return Err(EwError::CalibrationParse(format!("empty {} axis", what)));
    }
    if knots.windows(2).any(|w| w[0] >= w[1]) {
        return Err(EwError::CalibrationParse(format!(
            "{} coordinates are not strictly increasing",
            what
        )));
    }
    Ok(())
}

/// Bilinear interpolation of a regular sparse grid onto a dense
/// `out_dims.0` x `out_dims.1` array. `values` is indexed
/// `[line_index, pixel_index]`. Output coordinates beyond the knot range
/// are extrapolated linearly from the nearest segment.
pub fn grid_to_full(
    lines: &[usize],
    pixels: &[usize],
    values: &Array2<f32>,
    out_dims: (usize, usize),
) -> EwResult<Array2<f32>> {
    check_increasing(lines, "line")?;
    check_increasing(pixels, "pixel")?;
    if values.dim() != (lines.len(), pixels.len()) {
        return Err(EwError::CalibrationParse(format!(
            "grid values are {:?}, expected {}x{}",
            values.dim(),
            lines.len(),
            pixels.len()
        )));
    }

    let (rows, cols) = out_dims;
    // Column segments do not depend on the row, compute them once.
    let col_seg: Vec<(usize, f64)> = (0..cols).map(|j| segment(pixels, j as f64)).collect();

    let mut full = Array2::zeros((rows, cols));
    for i in 0..rows {
        let (si, wi) = segment(lines, i as f64);
        let i1 = (si + 1).min(lines.len() - 1);
        for (j, &(sj, wj)) in col_seg.iter().enumerate() {
            let j1 = (sj + 1).min(pixels.len() - 1);
            let v00 = values[[si, sj]] as f64;
            let v01 = values[[si, j1]] as f64;
            let v10 = values[[i1, sj]] as f64;
            let v11 = values[[i1, j1]] as f64;
            let top = v00 * (1.0 - wj) + v01 * wj;
            let bottom = v10 * (1.0 - wj) + v11 * wj;
            full[[i, j]] = (top * (1.0 - wi) + bottom * wi) as f32;
        }
    }
    Ok(full)
}

/// Interpolate one sparse line to `width` samples. The weight is clamped,
/// values beyond the first/last pixel repeat the edge value.
fn line_to_full(pixels: &[usize], values: &[f32], width: usize) -> Vec<f32> {
    (0..width)
        .map(|j| {
            let (s, w) = segment(pixels, j as f64);
            let w = w.clamp(0.0, 1.0);
            let s1 = (s + 1).min(pixels.len() - 1);
            (values[s] as f64 * (1.0 - w) + values[s1] as f64 * w) as f32
        })
        .collect()
}

/// Dense surface from per-line vectors with per-line pixel sets. Each
/// vector is first interpolated along range, then lines are interpolated
/// along azimuth. This is what the noise LUT needs: its vectors may carry
/// a different number of samples on every line, so a regular-grid
/// interpolation does not apply.
pub fn vectors_to_full(vectors: &[LineVector], out_dims: (usize, usize)) -> EwResult<Array2<f32>> {
    if vectors.is_empty() {
        return Err(EwError::CalibrationParse("no annotation vectors".to_string()));
    }
    for v in vectors {
        if v.pixels.is_empty() || v.pixels.len() != v.values.len() {
            return Err(EwError::CalibrationParse(format!(
                "vector at line {} has {} pixels and {} values",
                v.line,
                v.pixels.len(),
                v.values.len()
            )));
        }
        check_increasing(&v.pixels, "pixel")?;
    }
    let lines: Vec<usize> = vectors.iter().map(|v| v.line).collect();
    check_increasing(&lines, "line")?;

    let (rows, cols) = out_dims;
    let dense_rows: Vec<Vec<f32>> = vectors
        .iter()
        .map(|v| line_to_full(&v.pixels, &v.values, cols))
        .collect();

    let mut full = Array2::zeros((rows, cols));
    for i in 0..rows {
        let (s, w) = segment(&lines, i as f64);
        let w = w.clamp(0.0, 1.0);
        let s1 = (s + 1).min(lines.len() - 1);
        let (above, below) = (&dense_rows[s], &dense_rows[s1]);
        for j in 0..cols {
            full[[i, j]] = (above[j] as f64 * (1.0 - w) + below[j] as f64 * w) as f32;
        }
    }
    Ok(full)
}
