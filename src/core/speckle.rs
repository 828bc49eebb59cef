//! Speckle filtering for display products.
//!
//! Applied to normalized band data before quantization; the calibrated dB
//! output is never filtered.

use crate::types::{EwError, EwResult};
use ndarray::Array2;

/// Available speckle filter types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeckleFilterType {
    /// Simple window averaging
    Mean,
    /// Rank filter
    Median,
    /// Adaptive Lee filter
    Lee,
}

/// Speckle filter parameters
#[derive(Debug, Clone)]
pub struct SpeckleFilterParams {
    /// Filter window size (must be odd)
    pub window_size: usize,
    /// Number of looks (for the Lee filter)
    pub num_looks: f32,
}

impl Default for SpeckleFilterParams {
    fn default() -> Self {
        Self {
            window_size: 5,
            num_looks: 1.0,
        }
    }
}

/// Windowed speckle filter over a 2D image
pub struct SpeckleFilter {
    params: SpeckleFilterParams,
}

impl SpeckleFilter {
    pub fn new() -> Self {
        Self {
            params: SpeckleFilterParams::default(),
        }
    }

    pub fn with_params(params: SpeckleFilterParams) -> Self {
        Self { params }
    }

    pub fn apply(&self, image: &Array2<f32>, filter_type: SpeckleFilterType) -> EwResult<Array2<f32>> {
        log::debug!("applying {:?} speckle filter", filter_type);

        let (height, width) = image.dim();
        if self.params.window_size % 2 == 0 {
            return Err(EwError::ShapeMismatch(
                "filter window size must be odd".to_string(),
            ));
        }
        if height < self.params.window_size || width < self.params.window_size {
            return Err(EwError::ShapeMismatch(format!(
                "image {}x{} is smaller than the {} pixel window",
                height, width, self.params.window_size
            )));
        }

        match filter_type {
            SpeckleFilterType::Mean => Ok(self.mean_filter(image)),
            SpeckleFilterType::Median => Ok(self.median_filter(image)),
            SpeckleFilterType::Lee => Ok(self.lee_filter(image)),
        }
    }

    fn window_values(&self, image: &Array2<f32>, i: usize, j: usize) -> Vec<f32> {
        let (height, width) = image.dim();
        let half = self.params.window_size / 2;
        let mut values = Vec::with_capacity(self.params.window_size * self.params.window_size);
        for wi in 0..self.params.window_size {
            for wj in 0..self.params.window_size {
                let ii = i as i64 + wi as i64 - half as i64;
                let jj = j as i64 + wj as i64 - half as i64;
                if ii >= 0 && ii < height as i64 && jj >= 0 && jj < width as i64 {
                    let v = image[[ii as usize, jj as usize]];
                    if v.is_finite() {
                        values.push(v);
                    }
                }
            }
        }
        values
    }

    fn mean_filter(&self, image: &Array2<f32>) -> Array2<f32> {
        let mut filtered = Array2::zeros(image.dim());
        for ((i, j), out) in filtered.indexed_iter_mut() {
            let values = self.window_values(image, i, j);
            *out = if values.is_empty() {
                image[[i, j]]
            } else {
                values.iter().sum::<f32>() / values.len() as f32
            };
        }
        filtered
    }

    fn median_filter(&self, image: &Array2<f32>) -> Array2<f32> {
        let mut filtered = Array2::zeros(image.dim());
        for ((i, j), out) in filtered.indexed_iter_mut() {
            let mut values = self.window_values(image, i, j);
            if values.is_empty() {
                *out = image[[i, j]];
                continue;
            }
            values.sort_by(|a, b| a.partial_cmp(b).unwrap());
            *out = values[values.len() / 2];
        }
        filtered
    }

    fn lee_filter(&self, image: &Array2<f32>) -> Array2<f32> {
        let cu2 = 1.0 / self.params.num_looks;
        let mut filtered = Array2::zeros(image.dim());
        for ((i, j), out) in filtered.indexed_iter_mut() {
            let center = image[[i, j]];
            let values = self.window_values(image, i, j);
            if values.is_empty() || !center.is_finite() {
                *out = center;
                continue;
            }
            let n = values.len() as f32;
            let mean = values.iter().sum::<f32>() / n;
            let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
            if mean.abs() < f32::EPSILON || variance <= 0.0 {
                *out = mean;
                continue;
            }
            let cv2 = variance / (mean * mean);
            let weight = (1.0 - cu2 / cv2).clamp(0.0, 1.0);
            *out = mean + weight * (center - mean);
        }
        filtered
    }
}

impl Default for SpeckleFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn test_mean_filter_constant_image() {
        let image = Array2::from_elem((10, 10), 3.5f32);
        let filtered = SpeckleFilter::new()
            .apply(&image, SpeckleFilterType::Mean)
            .unwrap();
        for &v in filtered.iter() {
            assert_abs_diff_eq!(v, 3.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_median_removes_outlier() {
        let mut image = Array2::from_elem((9, 9), 1.0f32);
        image[[4, 4]] = 100.0;
        let filtered = SpeckleFilter::new()
            .apply(&image, SpeckleFilterType::Median)
            .unwrap();
        assert_abs_diff_eq!(filtered[[4, 4]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_lee_preserves_constant_regions() {
        let image = Array2::from_elem((9, 9), 2.0f32);
        let filtered = SpeckleFilter::new()
            .apply(&image, SpeckleFilterType::Lee)
            .unwrap();
        for &v in filtered.iter() {
            assert_abs_diff_eq!(v, 2.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rejects_even_window() {
        let image = Array2::from_elem((10, 10), 1.0f32);
        let filter = SpeckleFilter::with_params(SpeckleFilterParams {
            window_size: 4,
            num_looks: 1.0,
        });
        assert!(filter.apply(&image, SpeckleFilterType::Mean).is_err());
    }

    #[test]
    fn test_rejects_small_image() {
        let image = Array2::from_elem((3, 3), 1.0f32);
        assert!(SpeckleFilter::new()
            .apply(&image, SpeckleFilterType::Mean)
            .is_err());
    }
}
