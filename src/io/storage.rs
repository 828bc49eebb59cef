//! Scene storage helpers: file scenes into a `root/YYYY/MM/DD[/extra]`
//! tree keyed by their acquisition date.

use crate::io::locator::scene_time;
use crate::types::{EwError, EwResult};
use chrono::NaiveDateTime;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Folder for a given acquisition date, optionally created.
pub fn date_folder_for<P: AsRef<Path>>(
    date: NaiveDateTime,
    root_folder: P,
    ensure_existence: bool,
    extra_folder: &str,
) -> EwResult<PathBuf> {
    let mut folder = root_folder
        .as_ref()
        .join(date.format("%Y").to_string())
        .join(date.format("%m").to_string())
        .join(date.format("%d").to_string());
    if !extra_folder.is_empty() {
        folder = folder.join(extra_folder);
    }
    if ensure_existence {
        fs::create_dir_all(&folder)?;
    }
    Ok(folder)
}

/// Storage folder of a scene, derived from the timestamp in its name.
pub fn scene_folder_for<P: AsRef<Path>>(
    scene_name: &str,
    root_folder: P,
    ensure_existence: bool,
    extra_folder: &str,
) -> EwResult<PathBuf> {
    let base = scene_name.split('.').next().unwrap_or(scene_name);
    let date = scene_time(base).ok_or_else(|| {
        EwError::NotFound(format!("no timestamp in scene name: {}", scene_name))
    })?;
    date_folder_for(date, root_folder, ensure_existence, extra_folder)
}

/// Move (or copy) a downloaded scene archive into the storage tree.
/// Non-Sentinel-1 names and non-zip files are rejected.
pub fn arrange_scene<P: AsRef<Path>, Q: AsRef<Path>>(
    scene_path: P,
    root_folder: Q,
    copy: bool,
    extra_folder: &str,
) -> EwResult<PathBuf> {
    let scene_path = scene_path.as_ref();
    let scene_name = scene_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| EwError::NotFound(format!("no file name in {}", scene_path.display())))?;

    let mission = Regex::new(r"^S1[AB]").expect("static regex");
    if !mission.is_match(&scene_name) {
        return Err(EwError::NotFound(format!(
            "{} is not a Sentinel-1 product",
            scene_name
        )));
    }
    if !scene_name.to_lowercase().ends_with(".zip") {
        return Err(EwError::NotFound(format!(
            "{} is not a zip archive",
            scene_name
        )));
    }

    let folder = scene_folder_for(&scene_name, root_folder, true, extra_folder)?;
    let target = folder.join(&scene_name);
    if copy {
        fs::copy(scene_path, &target)?;
    } else if fs::rename(scene_path, &target).is_err() {
        // rename fails across filesystems
        fs::copy(scene_path, &target)?;
        fs::remove_file(scene_path)?;
    }
    Ok(target)
}

/// Whether a scene is already present in the storage tree.
pub fn is_available<P: AsRef<Path>>(scene_name: &str, root_folder: P) -> bool {
    let base = scene_name.split('.').next().unwrap_or(scene_name);
    match scene_folder_for(base, root_folder, false, "") {
        Ok(folder) => folder.join(scene_name).exists() || folder.join(base).exists(),
        Err(_) => false,
    }
}
