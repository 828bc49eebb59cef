use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued band data (calibrated backscatter, dB)
pub type BandData = Array2<f32>;

/// Boolean mask with band dimensions
pub type BandMask = Array2<bool>;

/// No-data sentinel for calibrated backscatter, in dB.
/// Below the display minima of both polarizations.
pub const NODATA_DB: f32 = -40.0;

/// Polarization channels of an EW GRD product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    HH,
    HV,
}

impl Polarization {
    /// Lowercase designator as it appears in SAFE filenames ("hh" / "hv")
    pub fn designator(&self) -> &'static str {
        match self {
            Polarization::HH => "hh",
            Polarization::HV => "hv",
        }
    }

    /// Detect the polarization from a SAFE filename
    pub fn from_filename(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("-hh-") {
            Some(Polarization::HH)
        } else if lower.contains("-hv-") {
            Some(Polarization::HV)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::HH => write!(f, "HH"),
            Polarization::HV => write!(f, "HV"),
        }
    }
}

/// Sentinel-1 acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionMode {
    IW, // Interferometric Wide swath
    EW, // Extra Wide swath
    SM, // StripMap
    WV, // Wave
}

impl AcquisitionMode {
    /// Parse the mode token of a product name ("EW" in S1A_EW_GRDM_...)
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_uppercase().as_str() {
            "IW" => Some(AcquisitionMode::IW),
            "EW" => Some(AcquisitionMode::EW),
            "WV" => Some(AcquisitionMode::WV),
            // stripmap beams are named S1..S6
            s if s.len() == 2
                && s.starts_with('S')
                && s[1..].chars().all(|c| c.is_ascii_digit()) =>
            {
                Some(AcquisitionMode::SM)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionMode::IW => write!(f, "IW"),
            AcquisitionMode::EW => write!(f, "EW"),
            AcquisitionMode::SM => write!(f, "SM"),
            AcquisitionMode::WV => write!(f, "WV"),
        }
    }
}

/// A single ground control point: pixel coordinates tied to a geographic
/// position. Line/pixel are f64 since decimation produces fractional
/// coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundControlPoint {
    pub id: String,
    pub line: f64,
    pub pixel: f64,
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

/// Georeference descriptor: the GCP set of a raster plus the raster's pixel
/// dimensions. Passed by value between reader and writer so that no GDAL
/// handle crosses the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Georeference {
    pub gcps: Vec<GroundControlPoint>,
    /// WKT of the GCP coordinate system (WGS84 for Sentinel-1 products)
    pub projection: String,
    /// Source raster width in pixels (range samples)
    pub width: usize,
    /// Source raster height in pixels (azimuth lines)
    pub height: usize,
}

impl Georeference {
    /// GCP set rescaled for an output decimated by `dec` in each axis.
    /// Geographic coordinates are unchanged.
    pub fn decimated(&self, dec: usize) -> Vec<GroundControlPoint> {
        let d = dec as f64;
        self.gcps
            .iter()
            .map(|g| GroundControlPoint {
                id: g.id.clone(),
                line: g.line / d,
                pixel: g.pixel / d,
                longitude: g.longitude,
                latitude: g.latitude,
                height: g.height,
            })
            .collect()
    }
}

/// Error types for EW product processing
#[derive(Debug, thiserror::Error)]
pub enum EwError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported acquisition mode: {0} (only EW products are supported)")]
    UnsupportedMode(String),

    #[error("calibration parse error: {0}")]
    CalibrationParse(String),

    #[error("missing band: {0}")]
    MissingBand(Polarization),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Result type for EW product operations
pub type EwResult<T> = Result<T, EwError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarization_from_filename() {
        assert_eq!(
            Polarization::from_filename("s1a-ew-grd-hh-20200107t033938-001.tiff"),
            Some(Polarization::HH)
        );
        assert_eq!(
            Polarization::from_filename("noise-s1a-ew-grd-hv-20200107t033938-001.xml"),
            Some(Polarization::HV)
        );
        assert_eq!(Polarization::from_filename("manifest.safe"), None);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(AcquisitionMode::parse("EW"), Some(AcquisitionMode::EW));
        assert_eq!(AcquisitionMode::parse("IW"), Some(AcquisitionMode::IW));
        assert_eq!(AcquisitionMode::parse("S3"), Some(AcquisitionMode::SM));
        assert_eq!(AcquisitionMode::parse("??"), None);
    }

    #[test]
    fn test_georeference_decimation() {
        let georef = Georeference {
            gcps: vec![GroundControlPoint {
                id: "1".to_string(),
                line: 100.0,
                pixel: 50.0,
                longitude: 15.5,
                latitude: 78.2,
                height: 0.0,
            }],
            projection: String::new(),
            width: 400,
            height: 200,
        };
        let scaled = georef.decimated(2);
        assert_eq!(scaled[0].line, 50.0);
        assert_eq!(scaled[0].pixel, 25.0);
        assert_eq!(scaled[0].longitude, 15.5);
        assert_eq!(scaled[0].latitude, 78.2);
    }
}
