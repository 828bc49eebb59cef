//! GCP access through the GDAL C API.
//!
//! The safe `gdal` wrapper does not cover the GCP get/set surface this
//! crate needs, so both directions go through `gdal-sys` directly.

use crate::types::{EwError, EwResult, GroundControlPoint};
use gdal::Dataset;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};

/// Read the embedded GCP set and GCP projection of a dataset. A dataset
/// without GCPs yields an empty vector.
pub fn read_gcps(dataset: &Dataset) -> (Vec<GroundControlPoint>, String) {
    let handle = dataset.c_dataset();
    unsafe {
        let count = gdal_sys::GDALGetGCPCount(handle);
        let proj_ptr = gdal_sys::GDALGetGCPProjection(handle);
        let projection = if proj_ptr.is_null() {
            String::new()
        } else {
            CStr::from_ptr(proj_ptr).to_string_lossy().into_owned()
        };

        let list = gdal_sys::GDALGetGCPs(handle);
        let mut gcps = Vec::new();
        if !list.is_null() && count > 0 {
            for i in 0..count as usize {
                let gcp = &*list.add(i);
                let id = if gcp.pszId.is_null() {
                    (i + 1).to_string()
                } else {
                    CStr::from_ptr(gcp.pszId).to_string_lossy().into_owned()
                };
                gcps.push(GroundControlPoint {
                    id,
                    line: gcp.dfGCPLine,
                    pixel: gcp.dfGCPPixel,
                    longitude: gcp.dfGCPX,
                    latitude: gcp.dfGCPY,
                    height: gcp.dfGCPZ,
                });
            }
        }
        (gcps, projection)
    }
}

/// Attach a GCP set to a dataset opened for update.
pub fn write_gcps(
    dataset: &mut Dataset,
    gcps: &[GroundControlPoint],
    projection: &str,
) -> EwResult<()> {
    let ids: Vec<CString> = gcps
        .iter()
        .map(|g| CString::new(g.id.as_str()))
        .collect::<Result<_, _>>()
        .map_err(|e| {
            EwError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("GCP id contains NUL: {}", e),
            ))
        })?;
    let info = CString::new("").unwrap();
    let c_proj = CString::new(projection).map_err(|e| {
        EwError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("projection contains NUL: {}", e),
        ))
    })?;

    let list: Vec<gdal_sys::GDAL_GCP> = gcps
        .iter()
        .zip(ids.iter())
        .map(|(g, id)| gdal_sys::GDAL_GCP {
            pszId: id.as_ptr() as *mut c_char,
            pszInfo: info.as_ptr() as *mut c_char,
            dfGCPPixel: g.pixel,
            dfGCPLine: g.line,
            dfGCPX: g.longitude,
            dfGCPY: g.latitude,
            dfGCPZ: g.height,
        })
        .collect();

    let result = unsafe {
        gdal_sys::GDALSetGCPs(
            dataset.c_dataset(),
            list.len() as c_int,
            list.as_ptr(),
            c_proj.as_ptr(),
        )
    };
    if result != gdal_sys::CPLErr::CE_None {
        return Err(EwError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "GDALSetGCPs failed",
        )));
    }
    Ok(())
}
