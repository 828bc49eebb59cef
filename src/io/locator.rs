//! SAFE archive layout discovery.
//!
//! Locates measurement rasters and annotation/calibration/noise files of a
//! Sentinel-1 EW product, for both unpacked `.SAFE` directories and zip
//! archives. Zip members are extracted selectively into a temporary
//! directory that lives as long as the layout.

use crate::types::{AcquisitionMode, EwError, EwResult, Polarization};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipArchive;

/// Per-band file locations inside the product
#[derive(Debug, Clone)]
pub struct BandFiles {
    pub measurement: PathBuf,
    pub annotation: PathBuf,
    pub calibration: PathBuf,
    pub noise: PathBuf,
}

/// Located scene layout. Owns the temporary extraction directory when the
/// scene came from a zip archive, so the extracted members are removed
/// when the layout is dropped.
#[derive(Debug)]
pub struct SceneLayout {
    pub product_name: String,
    pub mode: AcquisitionMode,
    pub timestamp: Option<NaiveDateTime>,
    bands: HashMap<Polarization, BandFiles>,
    _temp_dir: Option<TempDir>,
}

impl SceneLayout {
    /// Locate a scene at `scene_path`, a `.SAFE` directory or a zip
    /// archive. Fails with `UnsupportedMode` for non-EW products before
    /// any extraction happens.
    pub fn locate<P: AsRef<Path>>(scene_path: P) -> EwResult<Self> {
        let scene_path = scene_path.as_ref();
        if scene_path.is_dir() {
            Self::from_directory(scene_path)
        } else if scene_path.is_file() {
            Self::from_zip(scene_path)
        } else {
            Err(EwError::NotFound(format!(
                "scene path does not exist: {}",
                scene_path.display()
            )))
        }
    }

    /// Available polarizations, HH first
    pub fn polarizations(&self) -> Vec<Polarization> {
        let mut pols: Vec<Polarization> = self.bands.keys().copied().collect();
        pols.sort_by_key(|p| *p != Polarization::HH);
        pols
    }

    pub fn band_files(&self, pol: Polarization) -> EwResult<&BandFiles> {
        self.bands.get(&pol).ok_or(EwError::MissingBand(pol))
    }

    fn from_directory(dir: &Path) -> EwResult<Self> {
        let product_name = product_name_of(dir);
        let mode = check_mode(&product_name)?;

        let measurement_dir = dir.join("measurement");
        if !measurement_dir.is_dir() {
            return Err(EwError::NotFound(format!(
                "no measurement folder in {}",
                dir.display()
            )));
        }

        let mut bands = HashMap::new();
        for entry in fs::read_dir(&measurement_dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_lowercase().ends_with(".tiff") && !name.to_lowercase().ends_with(".tif") {
                continue;
            }
            let pol = match Polarization::from_filename(&name) {
                Some(pol) => pol,
                None => continue,
            };
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let files = BandFiles {
                measurement: path.clone(),
                annotation: dir.join("annotation").join(format!("{}.xml", stem)),
                calibration: dir
                    .join("annotation")
                    .join("calibration")
                    .join(format!("calibration-{}.xml", stem)),
                noise: dir
                    .join("annotation")
                    .join("calibration")
                    .join(format!("noise-{}.xml", stem)),
            };
            for required in [&files.annotation, &files.calibration] {
                if !required.is_file() {
                    return Err(EwError::NotFound(format!(
                        "missing annotation file: {}",
                        required.display()
                    )));
                }
            }
            bands.insert(pol, files);
        }

        if bands.is_empty() {
            return Err(EwError::NotFound(format!(
                "no HH/HV measurement rasters in {}",
                measurement_dir.display()
            )));
        }

        log::info!(
            "located {} ({} band(s)) in directory {}",
            product_name,
            bands.len(),
            dir.display()
        );

        Ok(SceneLayout {
            timestamp: scene_time_of_name(&product_name),
            product_name,
            mode,
            bands,
            _temp_dir: None,
        })
    }

    fn from_zip(zip_path: &Path) -> EwResult<Self> {
        let file = File::open(zip_path)?;
        let mut archive = ZipArchive::new(file)?;

        let member_names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).map(|f| f.name().to_string()))
            .collect::<Result<_, _>>()?;

        // The product folder is the single top-level SAFE directory.
        let top = member_names
            .first()
            .and_then(|n| n.split('/').next())
            .map(|s| s.to_string())
            .ok_or_else(|| EwError::NotFound(format!("empty archive: {}", zip_path.display())))?;

        let product_name = top.trim_end_matches(".SAFE").to_string();
        // Fail on non-EW products before anything is extracted.
        let mode = check_mode(&product_name)?;

        let wanted: Vec<String> = member_names
            .iter()
            .filter(|n| {
                let lower = n.to_lowercase();
                (lower.contains("/measurement/") && lower.ends_with(".tiff"))
                    || (lower.contains("/annotation/") && lower.ends_with(".xml"))
            })
            .cloned()
            .collect();
        if wanted.is_empty() {
            return Err(EwError::NotFound(format!(
                "no measurement or annotation members in {}",
                zip_path.display()
            )));
        }

        let temp_dir = TempDir::new()?;
        for name in &wanted {
            let mut member = archive.by_name(name.as_str())?;
            let relative = member
                .enclosed_name()
                .map(|p| p.to_path_buf())
                .ok_or_else(|| EwError::NotFound(format!("unsafe member path: {}", name)))?;
            let target = temp_dir.path().join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            std::io::copy(&mut member, &mut out)?;
        }
        log::debug!(
            "extracted {} members of {} to {}",
            wanted.len(),
            zip_path.display(),
            temp_dir.path().display()
        );

        let product_root = temp_dir.path().join(&top);
        let mut layout = Self::from_directory(&product_root)?;
        layout._temp_dir = Some(temp_dir);
        Ok(layout)
    }
}

/// Acquisition timestamp encoded in a scene or band name. Convenient as a
/// sort key for scene listings.
pub fn scene_time<P: AsRef<Path>>(scene_path: P) -> Option<NaiveDateTime> {
    let name = scene_path.as_ref().file_name()?.to_string_lossy().into_owned();
    scene_time_of_name(&name)
}

fn scene_time_of_name(name: &str) -> Option<NaiveDateTime> {
    let token = name.split('_').nth(4)?;
    NaiveDateTime::parse_from_str(token, "%Y%m%dT%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(token, "%Y%m%dt%H%M%S"))
        .ok()
}

fn product_name_of(dir: &Path) -> String {
    dir.file_name()
        .map(|s| s.to_string_lossy().trim_end_matches(".SAFE").to_string())
        .unwrap_or_default()
}

/// Mode gate: the second underscore token of the product name carries the
/// acquisition mode. Unrecognized names pass through so synthetic products
/// remain usable; a recognized non-EW mode is rejected.
fn check_mode(product_name: &str) -> EwResult<AcquisitionMode> {
    match product_name.split('_').nth(1).and_then(AcquisitionMode::parse) {
        Some(AcquisitionMode::EW) | None => Ok(AcquisitionMode::EW),
        Some(mode) => Err(EwError::UnsupportedMode(format!(
            "{} is a {} product",
            product_name, mode
        ))),
    }
}
