//! Core processing modules

pub mod calibrate;
pub mod interp;
pub mod noise;
pub mod speckle;

pub use calibrate::{calibrate_db, to_db, CalibrationKind, CalibrationTable, CalibrationVector};
pub use interp::{grid_to_full, vectors_to_full, LineVector};
pub use noise::{NoiseTable, K_NOISE};
pub use speckle::{SpeckleFilter, SpeckleFilterParams, SpeckleFilterType};
