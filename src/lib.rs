//! ewcal: Sentinel-1 EW calibrated backscatter to GeoTIFF converter
//!
//! Reads a zipped or unzipped EW scene, applies radiometric calibration
//! (and thermal noise subtraction) to produce HH/HV backscatter in dB,
//! and writes any 2D array back out as a GeoTIFF that keeps the scene's
//! ground control points, rescaled to the output resolution.

pub mod core;
pub mod io;
pub mod products;
pub mod types;

// Re-export the main types and entry points
pub use crate::core::calibrate::{CalibrationKind, CalibrationTable};
pub use crate::io::geotiff::{write_data_geotiff, write_multiband_geotiff};
pub use crate::io::locator::{scene_time, SceneLayout};
pub use crate::io::product::{Band, Scene};
pub use crate::types::{
    AcquisitionMode, EwError, EwResult, Georeference, GroundControlPoint, Polarization, NODATA_DB,
};
