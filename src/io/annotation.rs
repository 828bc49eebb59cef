//! Annotation XML parsing: product header and geolocation grid.

use crate::core::interp;
use crate::types::{
    AcquisitionMode, EwError, EwResult, Georeference, GroundControlPoint,
};
use ndarray::Array2;
use serde::Deserialize;
use std::collections::HashMap;

/// Root `<product>` element of a band annotation file. Only the parts the
/// pipeline consumes are declared; everything else is skipped.
#[derive(Debug, Deserialize)]
pub struct ProductAnnotation {
    #[serde(rename = "adsHeader")]
    pub ads_header: AdsHeader,
    #[serde(rename = "geolocationGrid")]
    pub geolocation_grid: GeolocationGrid,
}

#[derive(Debug, Deserialize)]
pub struct AdsHeader {
    #[serde(rename = "missionId")]
    pub mission_id: String,
    #[serde(rename = "productType")]
    pub product_type: String,
    pub polarisation: String,
    pub mode: String,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "stopTime")]
    pub stop_time: String,
}

#[derive(Debug, Deserialize)]
pub struct GeolocationGrid {
    #[serde(rename = "geolocationGridPointList")]
    pub point_list: GeolocationGridPointList,
}

#[derive(Debug, Deserialize)]
pub struct GeolocationGridPointList {
    #[serde(rename = "@count", default)]
    pub count: usize,
    #[serde(rename = "geolocationGridPoint", default)]
    pub points: Vec<GeolocationGridPoint>,
}

#[derive(Debug, Deserialize)]
pub struct GeolocationGridPoint {
    #[serde(rename = "azimuthTime")]
    pub azimuth_time: String,
    #[serde(rename = "slantRangeTime")]
    pub slant_range_time: f64,
    pub line: usize,
    pub pixel: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
    #[serde(rename = "incidenceAngle")]
    pub incidence_angle: f64,
    #[serde(rename = "elevationAngle")]
    pub elevation_angle: f64,
}

/// Geolocation grid parameters that can be interpolated to full resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridParameter {
    Latitude,
    Longitude,
    Height,
    IncidenceAngle,
    ElevationAngle,
}

pub fn parse_annotation(xml_content: &str) -> EwResult<ProductAnnotation> {
    quick_xml::de::from_str(xml_content)
        .map_err(|e| EwError::CalibrationParse(format!("annotation XML: {}", e)))
}

impl ProductAnnotation {
    pub fn mode(&self) -> Option<AcquisitionMode> {
        AcquisitionMode::parse(&self.ads_header.mode)
    }

    /// The annotation-level EW gate
    pub fn require_ew(&self) -> EwResult<()> {
        match self.mode() {
            Some(AcquisitionMode::EW) => Ok(()),
            _ => Err(EwError::UnsupportedMode(format!(
                "annotation reports mode {}",
                self.ads_header.mode
            ))),
        }
    }

    /// Geolocation grid points as ground control points, in file order.
    /// Used as the georeference fallback when the measurement raster
    /// carries no embedded GCPs.
    pub fn gcps(&self) -> Vec<GroundControlPoint> {
        self.geolocation_grid
            .point_list
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| GroundControlPoint {
                id: (i + 1).to_string(),
                line: p.line as f64,
                pixel: p.pixel as f64,
                longitude: p.longitude,
                latitude: p.latitude,
                height: p.height,
            })
            .collect()
    }

    /// Georeference built from the geolocation grid
    pub fn georeference(&self, dims: (usize, usize)) -> Georeference {
        Georeference {
            gcps: self.gcps(),
            projection: wgs84_wkt().to_string(),
            width: dims.1,
            height: dims.0,
        }
    }

    /// Interpolate one grid parameter to a dense surface of `out_dims`.
    /// The grid must be rectangular (same pixel set on every annotated
    /// line); the per-line point count is derived from the data rather
    /// than assumed.
    pub fn parameter_surface(
        &self,
        param: GridParameter,
        out_dims: (usize, usize),
    ) -> EwResult<Array2<f32>> {
        let points = &self.geolocation_grid.point_list.points;
        if points.is_empty() {
            return Err(EwError::CalibrationParse(
                "empty geolocation grid".to_string(),
            ));
        }

        let mut lines: Vec<usize> = points.iter().map(|p| p.line).collect();
        lines.sort_unstable();
        lines.dedup();
        let mut pixels: Vec<usize> = points.iter().map(|p| p.pixel).collect();
        pixels.sort_unstable();
        pixels.dedup();

        if lines.len() * pixels.len() != points.len() {
            return Err(EwError::CalibrationParse(format!(
                "geolocation grid is not rectangular: {} points for {} lines x {} pixels",
                points.len(),
                lines.len(),
                pixels.len()
            )));
        }

        let line_index: HashMap<usize, usize> =
            lines.iter().enumerate().map(|(i, &l)| (l, i)).collect();
        let pixel_index: HashMap<usize, usize> =
            pixels.iter().enumerate().map(|(j, &p)| (p, j)).collect();

        let mut values = Array2::from_elem((lines.len(), pixels.len()), f32::NAN);
        for p in points {
            let value = match param {
                GridParameter::Latitude => p.latitude,
                GridParameter::Longitude => p.longitude,
                GridParameter::Height => p.height,
                GridParameter::IncidenceAngle => p.incidence_angle,
                GridParameter::ElevationAngle => p.elevation_angle,
            };
            values[[line_index[&p.line], pixel_index[&p.pixel]]] = value as f32;
        }
        if values.iter().any(|v| v.is_nan()) {
            return Err(EwError::CalibrationParse(
                "geolocation grid has duplicate or missing points".to_string(),
            ));
        }

        interp::grid_to_full(&lines, &pixels, &values, out_dims)
    }
}

/// WGS84 WKT used for annotation-derived GCPs (Sentinel-1 geolocation is
/// always geographic WGS84).
pub fn wgs84_wkt() -> &'static str {
    r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]]"#
}
