//! Product reader: Scene and Band.
//!
//! A Scene locates a product on construction and turns its measurement
//! rasters into calibrated backscatter bands (dB) on `read_data()`. Bands
//! are reached through an explicit polarization mapping; there are no
//! dynamic attributes.

use crate::core::calibrate::{self, CalibrationKind, CalibrationTable};
use crate::core::noise::NoiseTable;
use crate::io::annotation::{self, GridParameter, ProductAnnotation};
use crate::io::gcp;
use crate::io::locator::{BandFiles, SceneLayout};
use crate::types::{
    BandData, BandMask, EwError, EwResult, Georeference, Polarization, NODATA_DB,
};
use chrono::NaiveDateTime;
use gdal::Dataset;
use ndarray::Array2;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Display limits in dB, per polarization (from k-means cluster analysis
/// of a scene set).
const HH_DISPLAY_MAX_DB: f32 = 4.14398;
const HH_DISPLAY_MIN_DB: f32 = -29.15361;
const HV_DISPLAY_MAX_DB: f32 = -0.60151;
const HV_DISPLAY_MIN_DB: f32 = -32.06306;

/// Slope of the elevation-angle correction in dB per degree
/// (0.049 per degree in natural-log units).
const INCIDENCE_ANGLE_SLOPE_DB: f32 = 0.2128;

/// Column-mean thresholds for border detection, in raw DN amplitude
const HH_BORDER_THRESHOLD: f32 = 100.0;
const HV_BORDER_THRESHOLD: f32 = 40.0;
/// Columns checked from each edge during border detection
const BORDER_SEARCH_WIDTH: usize = 200;

/// One polarization's calibrated raster
#[derive(Debug, Clone)]
pub struct Band {
    pub polarization: Polarization,
    /// Calibrated backscatter in dB
    pub data: BandData,
    /// Pixels whose digital number was zero
    pub nodata_mask: BandMask,
    /// Whether thermal noise was subtracted during calibration
    pub noise_subtracted: bool,
    /// Per-column mean of the raw digital numbers, kept for border
    /// detection
    column_dn_means: Vec<f32>,
    display_min: f32,
    display_max: f32,
}

impl Band {
    /// (lines, samples) of the band raster
    pub fn dims(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Clip to the per-polarization display limits
    pub fn clip(&mut self) {
        let (lo, hi) = (self.display_min, self.display_max);
        self.data.mapv_inplace(|v| v.clamp(lo, hi));
    }

    /// Normalize to [0, 1] using the data range
    pub fn normalize(&mut self) {
        let min = self.data.iter().cloned().fold(f32::INFINITY, f32::min);
        self.data.mapv_inplace(|v| v - min);
        let max = self.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        if max > 0.0 {
            self.data.mapv_inplace(|v| v / max);
        }
    }

    /// Clip to the display limits and normalize to [0, 1]
    pub fn clip_normalize(&mut self) {
        self.clip();
        let (lo, hi) = (self.display_min, self.display_max);
        self.data.mapv_inplace(|v| (v - lo) / (hi - lo));
    }

    /// Undo `clip_normalize`: map [0, 1] back to the display range in dB
    pub fn extend(&mut self) {
        let (lo, hi) = (self.display_min, self.display_max);
        self.data.mapv_inplace(|v| v * (hi - lo) + lo);
    }

    /// Flatten the range-dependent brightness trend using the elevation
    /// angle surface (sea-ice use case).
    pub fn incidence_angle_correction(&mut self, elevation_angle: &Array2<f32>) {
        let min = elevation_angle
            .iter()
            .cloned()
            .fold(f32::INFINITY, f32::min);
        ndarray::Zip::from(&mut self.data)
            .and(elevation_angle)
            .for_each(|v, &e| *v += INCIDENCE_ANGLE_SLOPE_DB * (e - min));
    }

    fn border_threshold(&self) -> f32 {
        match self.polarization {
            Polarization::HH => HH_BORDER_THRESHOLD,
            Polarization::HV => HV_BORDER_THRESHOLD,
        }
    }

    /// Last dark column on the left edge and first dark column on the
    /// right edge, from the raw-DN column means.
    fn border_limits(&self) -> (Option<usize>, Option<usize>) {
        let means = &self.column_dn_means;
        let width = means.len();
        let window = BORDER_SEARCH_WIDTH.min(width);
        let threshold = self.border_threshold();

        let left = means[..window]
            .iter()
            .rposition(|&m| m < threshold);
        let right = means[width - window..]
            .iter()
            .position(|&m| m < threshold)
            .map(|i| width - window + i);
        (left, right)
    }
}

/// A Sentinel-1 EW scene: located on construction, calibrated by
/// `read_data()`, discarded after use.
pub struct Scene {
    layout: SceneLayout,
    calibration_kind: CalibrationKind,
    bands: HashMap<Polarization, Band>,
    annotations: HashMap<Polarization, ProductAnnotation>,
    georef: Option<Georeference>,
}

impl Scene {
    /// Locate a scene (directory or zip archive). The default gain LUT is
    /// gamma nought.
    pub fn new<P: AsRef<Path>>(scene_path: P) -> EwResult<Self> {
        Self::with_calibration(scene_path, CalibrationKind::Gamma0)
    }

    /// Locate a scene with an explicit gain LUT choice.
    pub fn with_calibration<P: AsRef<Path>>(
        scene_path: P,
        kind: CalibrationKind,
    ) -> EwResult<Self> {
        let layout = SceneLayout::locate(scene_path)?;
        Ok(Scene {
            layout,
            calibration_kind: kind,
            bands: HashMap::new(),
            annotations: HashMap::new(),
            georef: None,
        })
    }

    pub fn product_name(&self) -> &str {
        &self.layout.product_name
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.layout.timestamp
    }

    /// Polarizations present in the product, HH first
    pub fn polarizations(&self) -> Vec<Polarization> {
        self.layout.polarizations()
    }

    /// Read, calibrate and convert all available bands to dB, and read the
    /// shared georeference. Any parse or I/O failure is fatal to the call.
    pub fn read_data(&mut self) -> EwResult<()> {
        for pol in self.layout.polarizations() {
            let files = self.layout.band_files(pol)?;
            log::info!("reading {} band of {}", pol, self.layout.product_name);
            let (band, georef, annotation) = read_band(files, pol, self.calibration_kind)?;
            if self.georef.is_none() {
                self.georef = Some(georef);
            }
            self.annotations.insert(pol, annotation);
            self.bands.insert(pol, band);
        }
        Ok(())
    }

    /// Band of the given polarization; `MissingBand` if the product does
    /// not carry it or `read_data` has not produced it.
    pub fn band(&self, pol: Polarization) -> EwResult<&Band> {
        self.bands.get(&pol).ok_or(EwError::MissingBand(pol))
    }

    pub fn band_mut(&mut self, pol: Polarization) -> EwResult<&mut Band> {
        self.bands.get_mut(&pol).ok_or(EwError::MissingBand(pol))
    }

    pub fn hh(&self) -> EwResult<&Band> {
        self.band(Polarization::HH)
    }

    pub fn hv(&self) -> EwResult<&Band> {
        self.band(Polarization::HV)
    }

    /// Shared georeference of the scene's rasters
    pub fn georeference(&self) -> EwResult<&Georeference> {
        self.georef
            .as_ref()
            .ok_or_else(|| EwError::NotFound("no georeference (call read_data first)".to_string()))
    }

    /// Dense elevation-angle surface for a band, from the annotation
    /// geolocation grid.
    pub fn elevation_angle(&self, pol: Polarization) -> EwResult<Array2<f32>> {
        let dims = self.band(pol)?.dims();
        let annotation = self.annotations.get(&pol).ok_or(EwError::MissingBand(pol))?;
        annotation.parameter_surface(GridParameter::ElevationAngle, dims)
    }

    /// Dense incidence-angle surface for a band
    pub fn incidence_angle(&self, pol: Polarization) -> EwResult<Array2<f32>> {
        let dims = self.band(pol)?.dims();
        let annotation = self.annotations.get(&pol).ok_or(EwError::MissingBand(pol))?;
        annotation.parameter_surface(GridParameter::IncidenceAngle, dims)
    }

    /// Apply the elevation-angle correction to one band
    pub fn apply_incidence_angle_correction(&mut self, pol: Polarization) -> EwResult<()> {
        let elevation = self.elevation_angle(pol)?;
        self.band_mut(pol)?.incidence_angle_correction(&elevation);
        Ok(())
    }

    /// Detect the noisy columns next to the vertical scene borders.
    /// Returns `(x_min, x_max)` so that slicing columns `x_min..x_max`
    /// drops the border noise of every band read so far.
    pub fn detect_borders(&self) -> EwResult<(usize, usize)> {
        if self.bands.is_empty() {
            return Err(EwError::NotFound(
                "no bands read (call read_data first)".to_string(),
            ));
        }
        let width = self
            .bands
            .values()
            .next()
            .map(|b| b.dims().1)
            .unwrap_or(0);

        let mut x_min = 0;
        let mut x_max = width;
        for band in self.bands.values() {
            let (left, right) = band.border_limits();
            if let Some(l) = left {
                x_min = x_min.max(l);
            }
            if let Some(r) = right {
                x_max = x_max.min(r);
            }
        }
        Ok((x_min, x_max))
    }
}

fn read_band(
    files: &BandFiles,
    pol: Polarization,
    kind: CalibrationKind,
) -> EwResult<(Band, Georeference, ProductAnnotation)> {
    // Measurement raster: digital numbers as f32
    let dataset = Dataset::open(&files.measurement)?;
    let (width, height) = dataset.raster_size();
    let raster = dataset.rasterband(1)?;
    let buffer = raster.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
    let dn = Array2::from_shape_vec((height, width), buffer.data().to_vec()).map_err(|e| {
        EwError::ShapeMismatch(format!("raster buffer does not fit {}x{}: {}", height, width, e))
    })?;
    log::debug!("{} raster is {} x {} pixels", pol, width, height);

    let nodata_mask = dn.mapv(|v| v == 0.0);
    let column_dn_means: Vec<f32> = (0..width)
        .map(|j| dn.column(j).mean().unwrap_or(0.0))
        .collect();

    // Annotation: mode gate and geolocation grid
    let annotation_xml = fs::read_to_string(&files.annotation)?;
    let annotation = annotation::parse_annotation(&annotation_xml)?;
    annotation.require_ew()?;

    // Calibration LUT
    let calibration_xml = fs::read_to_string(&files.calibration)?;
    let table = CalibrationTable::parse(&calibration_xml)?;
    let gain = table.gain_surface(kind, (height, width))?;

    // Noise LUT is optional; without it the plain DN^2/gain^2 formula
    // applies.
    let noise = if files.noise.is_file() {
        let noise_xml = fs::read_to_string(&files.noise)?;
        let noise_table = NoiseTable::parse(&noise_xml)?;
        Some(noise_table.surface((height, width), table.first_dn())?)
    } else {
        log::warn!("no noise file for {} band, skipping noise subtraction", pol);
        None
    };
    let noise_subtracted = noise.is_some();

    let mut data = calibrate::calibrate_db(&dn, noise.as_ref(), &gain)?;
    ndarray::Zip::from(&mut data)
        .and(&nodata_mask)
        .for_each(|v, &masked| {
            if masked {
                *v = NODATA_DB;
            }
        });

    // Georeference: embedded raster GCPs, with the annotation geolocation
    // grid as the fallback.
    let (gcps, projection) = gcp::read_gcps(&dataset);
    let georef = if gcps.is_empty() {
        log::debug!("{} raster has no embedded GCPs, using the geolocation grid", pol);
        annotation.georeference((height, width))
    } else {
        let projection = if projection.is_empty() {
            annotation::wgs84_wkt().to_string()
        } else {
            projection
        };
        Georeference {
            gcps,
            projection,
            width,
            height,
        }
    };

    let (display_min, display_max) = match pol {
        Polarization::HH => (HH_DISPLAY_MIN_DB, HH_DISPLAY_MAX_DB),
        Polarization::HV => (HV_DISPLAY_MIN_DB, HV_DISPLAY_MAX_DB),
    };

    let band = Band {
        polarization: pol,
        data,
        nodata_mask,
        noise_subtracted,
        column_dn_means,
        display_min,
        display_max,
    };
    Ok((band, georef, annotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn test_band(data: Array2<f32>, pol: Polarization) -> Band {
        let dims = data.dim();
        let column_dn_means = vec![500.0; dims.1];
        Band {
            polarization: pol,
            data,
            nodata_mask: Array2::from_elem(dims, false),
            noise_subtracted: true,
            column_dn_means,
            display_min: HH_DISPLAY_MIN_DB,
            display_max: HH_DISPLAY_MAX_DB,
        }
    }

    #[test]
    fn test_clip_normalize_bounds() {
        let data = Array2::from_shape_fn((4, 4), |(i, j)| -35.0 + 3.0 * (i * 4 + j) as f32);
        let mut band = test_band(data, Polarization::HH);
        band.clip_normalize();
        for &v in band.data.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_extend_inverts_clip_normalize() {
        let data = Array2::from_elem((3, 3), -10.0f32);
        let mut band = test_band(data, Polarization::HH);
        band.clip_normalize();
        band.extend();
        for &v in band.data.iter() {
            assert_abs_diff_eq!(v, -10.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_incidence_angle_correction_is_zero_at_min() {
        let data = Array2::from_elem((2, 3), -20.0f32);
        let mut band = test_band(data, Polarization::HH);
        let elevation = Array2::from_shape_fn((2, 3), |(_, j)| 20.0 + j as f32);
        band.incidence_angle_correction(&elevation);
        assert_abs_diff_eq!(band.data[[0, 0]], -20.0, epsilon = 1e-5);
        assert_abs_diff_eq!(
            band.data[[0, 2]],
            -20.0 + 2.0 * INCIDENCE_ANGLE_SLOPE_DB,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_border_limits() {
        let data = Array2::from_elem((4, 300), 0.0f32);
        let mut band = test_band(data, Polarization::HH);
        // columns 0..5 and 295.. are dark
        for j in 0..5 {
            band.column_dn_means[j] = 10.0;
        }
        for j in 295..300 {
            band.column_dn_means[j] = 10.0;
        }
        let (left, right) = band.border_limits();
        assert_eq!(left, Some(4));
        assert_eq!(right, Some(295));
    }
}
