//! I/O modules: archive layout, annotation parsing, product reading,
//! GeoTIFF writing and scene storage.

pub mod annotation;
pub mod gcp;
pub mod geotiff;
pub mod locator;
pub mod product;
pub mod storage;

pub use geotiff::{write_data_geotiff, write_multiband_geotiff};
pub use locator::{scene_time, BandFiles, SceneLayout};
pub use product::{Band, Scene};
