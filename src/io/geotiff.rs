//! GeoTIFF writer with GCP-based georeferencing.
//!
//! Writes any 2D array (or a stack of them) with the GCPs of the source
//! scene rescaled to the output resolution. The output keeps geographic
//! coordinates intact, only pixel line/sample change with decimation.

use crate::io::gcp;
use crate::types::{EwError, EwResult, Georeference};
use gdal::raster::{Buffer, GdalType, RasterCreationOptions};
use gdal::DriverManager;
use ndarray::ArrayView2;
use num_traits::ToPrimitive;
use std::path::Path;

/// Write a single-band GeoTIFF.
///
/// `dec` is the integer decimation factor between the source raster and
/// `data` (`dec = 2` means `data` is downsampled by 2 in each axis).
/// Every GCP line/sample is divided by `dec` before embedding. Pixels
/// equal to `nodata_val` are flagged through the band no-data tag.
pub fn write_data_geotiff<T, P>(
    data: &ndarray::Array2<T>,
    output_path: P,
    georef: &Georeference,
    dec: usize,
    nodata_val: T,
) -> EwResult<()>
where
    T: GdalType + Copy + PartialEq + ToPrimitive,
    P: AsRef<Path>,
{
    write_multiband_geotiff(&[data.view()], output_path, georef, dec, nodata_val)
}

/// Write one band per array view, in slice order.
pub fn write_multiband_geotiff<T, P>(
    bands: &[ArrayView2<'_, T>],
    output_path: P,
    georef: &Georeference,
    dec: usize,
    nodata_val: T,
) -> EwResult<()>
where
    T: GdalType + Copy + PartialEq + ToPrimitive,
    P: AsRef<Path>,
{
    let output_path = output_path.as_ref();
    let (out_height, out_width) = validate_shapes(bands, georef, dec)?;

    let nodata = nodata_val.to_f64().ok_or_else(|| {
        EwError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no-data value is not representable as f64",
        ))
    })?;

    log::info!(
        "writing {} band(s) of {}x{} to {}",
        bands.len(),
        out_width,
        out_height,
        output_path.display()
    );

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut options = RasterCreationOptions::new();
    options.add_name_value("COMPRESS", "DEFLATE");
    let mut dataset = driver.create_with_band_type_with_options::<T, _>(
        output_path,
        out_width,
        out_height,
        bands.len(),
        &options,
    )?;

    gcp::write_gcps(&mut dataset, &georef.decimated(dec), &georef.projection)?;

    for (index, data) in bands.iter().enumerate() {
        let mut raster = dataset.rasterband(index + 1)?;
        raster.set_no_data_value(Some(nodata))?;
        let values: Vec<T> = data.iter().cloned().collect();
        let mut buffer = Buffer::new((out_width, out_height), values);
        raster.write((0, 0), (out_width, out_height), &mut buffer)?;
    }

    // dataset closes (and flushes) on drop
    Ok(())
}

/// Shape validation happens before any file is created.
fn validate_shapes<T>(
    bands: &[ArrayView2<'_, T>],
    georef: &Georeference,
    dec: usize,
) -> EwResult<(usize, usize)> {
    if dec == 0 {
        return Err(EwError::ShapeMismatch(
            "decimation factor must be at least 1".to_string(),
        ));
    }
    if bands.is_empty() {
        return Err(EwError::ShapeMismatch("no bands to write".to_string()));
    }

    let out_width = georef.width / dec;
    let out_height = georef.height / dec;
    if out_width == 0 || out_height == 0 {
        return Err(EwError::ShapeMismatch(format!(
            "decimation {} empties the {}x{} source raster",
            dec, georef.height, georef.width
        )));
    }

    for (index, band) in bands.iter().enumerate() {
        if band.dim() != (out_height, out_width) {
            return Err(EwError::ShapeMismatch(format!(
                "band {} is {:?}, expected {}x{} ({}x{} source decimated by {})",
                index + 1,
                band.dim(),
                out_height,
                out_width,
                georef.height,
                georef.width,
                dec
            )));
        }
    }
    Ok((out_height, out_width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroundControlPoint;
    use ndarray::Array2;

    fn georef(width: usize, height: usize) -> Georeference {
        Georeference {
            gcps: vec![GroundControlPoint {
                id: "1".to_string(),
                line: 0.0,
                pixel: 0.0,
                longitude: 15.0,
                latitude: 78.0,
                height: 0.0,
            }],
            projection: String::new(),
            width,
            height,
        }
    }

    #[test]
    fn test_validate_accepts_exact_decimation() {
        let data = Array2::<f32>::zeros((50, 100));
        let views = [data.view()];
        assert_eq!(
            validate_shapes(&views, &georef(200, 100), 2).unwrap(),
            (50, 100)
        );
    }

    #[test]
    fn test_validate_floors_odd_dimensions() {
        // output dimensions use floor division: 101 / 2 = 50
        let data = Array2::<f32>::zeros((50, 100));
        let views = [data.view()];
        assert!(validate_shapes(&views, &georef(201, 101), 2).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_shape() {
        let data = Array2::<f32>::zeros((50, 99));
        let views = [data.view()];
        assert!(matches!(
            validate_shapes(&views, &georef(200, 100), 2),
            Err(EwError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_dec() {
        let data = Array2::<f32>::zeros((10, 10));
        let views = [data.view()];
        assert!(matches!(
            validate_shapes(&views, &georef(10, 10), 0),
            Err(EwError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_band_list(){
        let views: [ArrayView2<'_, f32>; 0] = [];
        assert!(matches!(
            validate_shapes(&views, &georef(10, 10), 1),
            Err(EwError::ShapeMismatch(_))
        ));
    }
}
