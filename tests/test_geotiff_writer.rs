//! GeoTIFF writer tests: GCP rescaling, no-data handling, determinism
//! and the failure paths.

use approx::assert_abs_diff_eq;
use gdal::Dataset;
use ndarray::Array2;
use std::fs;

use ewcal::io::annotation::wgs84_wkt;
use ewcal::io::gcp::read_gcps;
use ewcal::types::{EwError, Georeference, GroundControlPoint};
use ewcal::{write_data_geotiff, write_multiband_geotiff};

const WIDTH: usize = 64;
const HEIGHT: usize = 48;

fn georef() -> Georeference {
    Georeference {
        gcps: vec![
            GroundControlPoint {
                id: "1".to_string(),
                line: 0.0,
                pixel: 0.0,
                longitude: 15.0,
                latitude: 78.0,
                height: 0.0,
            },
            GroundControlPoint {
                id: "2".to_string(),
                line: 40.0,
                pixel: 60.0,
                longitude: 15.5,
                latitude: 77.8,
                height: 12.0,
            },
        ],
        projection: wgs84_wkt().to_string(),
        width: WIDTH,
        height: HEIGHT,
    }
}

fn ramp() -> Array2<f32> {
    Array2::from_shape_fn((HEIGHT, WIDTH), |(i, j)| (i * WIDTH + j) as f32)
}

#[test]
fn test_write_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.tiff");
    let data = ramp();

    write_data_geotiff(&data, &path, &georef(), 1, -1.0f32).unwrap();

    let dataset = Dataset::open(&path).unwrap();
    assert_eq!(dataset.raster_size(), (WIDTH, HEIGHT));
    assert_eq!(dataset.raster_count(), 1);

    let band = dataset.rasterband(1).unwrap();
    let buffer = band
        .read_as::<f32>((0, 0), (WIDTH, HEIGHT), (WIDTH, HEIGHT), None)
        .unwrap();
    assert_abs_diff_eq!(buffer.data()[0], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(
        buffer.data()[WIDTH * HEIGHT - 1],
        (WIDTH * HEIGHT - 1) as f32,
        epsilon = 1e-3
    );

    let (gcps, projection) = read_gcps(&dataset);
    assert_eq!(gcps.len(), 2);
    assert!(projection.contains("WGS 84"));
    assert_abs_diff_eq!(gcps[1].line, 40.0, epsilon = 1e-9);
    assert_abs_diff_eq!(gcps[1].pixel, 60.0, epsilon = 1e-9);
    assert_abs_diff_eq!(gcps[1].longitude, 15.5, epsilon = 1e-9);
}

#[test]
fn test_gcp_rescaling_with_decimation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("decimated.tiff");
    let data = Array2::<f32>::zeros((HEIGHT / 2, WIDTH / 2));

    write_data_geotiff(&data, &path, &georef(), 2, -1.0f32).unwrap();

    let dataset = Dataset::open(&path).unwrap();
    assert_eq!(dataset.raster_size(), (WIDTH / 2, HEIGHT / 2));

    let (gcps, _) = read_gcps(&dataset);
    assert_eq!(gcps.len(), 2);
    // pixel coordinates are halved, geographic coordinates untouched
    assert_abs_diff_eq!(gcps[1].line, 20.0, epsilon = 1e-9);
    assert_abs_diff_eq!(gcps[1].pixel, 30.0, epsilon = 1e-9);
    assert_abs_diff_eq!(gcps[1].longitude, 15.5, epsilon = 1e-9);
    assert_abs_diff_eq!(gcps[1].latitude, 77.8, epsilon = 1e-9);
    assert_abs_diff_eq!(gcps[1].height, 12.0, epsilon = 1e-9);
}

#[test]
fn test_nodata_propagation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nodata.tiff");
    let mut data = ramp();
    data[[3, 4]] = -999.0;

    write_data_geotiff(&data, &path, &georef(), 1, -999.0f32).unwrap();

    let dataset = Dataset::open(&path).unwrap();
    let band = dataset.rasterband(1).unwrap();
    assert_eq!(band.no_data_value(), Some(-999.0));

    let buffer = band
        .read_as::<f32>((0, 0), (WIDTH, HEIGHT), (WIDTH, HEIGHT), None)
        .unwrap();
    assert_abs_diff_eq!(buffer.data()[3 * WIDTH + 4], -999.0, epsilon = 1e-6);
    // neighbours keep their values
    assert_abs_diff_eq!(
        buffer.data()[3 * WIDTH + 5],
        (3 * WIDTH + 5) as f32,
        epsilon = 1e-6
    );
}

#[test]
fn test_idempotent_output() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.tiff");
    let second = dir.path().join("second.tiff");
    let data = ramp();

    write_data_geotiff(&data, &first, &georef(), 1, -1.0f32).unwrap();
    write_data_geotiff(&data, &second, &georef(), 1, -1.0f32).unwrap();

    let a = fs::read(&first).unwrap();
    let b = fs::read(&second).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_multiband_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("multi.tiff");
    let hh = Array2::<f32>::from_elem((HEIGHT, WIDTH), -6.0);
    let hv = Array2::<f32>::from_elem((HEIGHT, WIDTH), -22.0);

    write_multiband_geotiff(&[hh.view(), hv.view()], &path, &georef(), 1, -40.0f32).unwrap();

    let dataset = Dataset::open(&path).unwrap();
    assert_eq!(dataset.raster_count(), 2);
    let buffer = dataset
        .rasterband(2)
        .unwrap()
        .read_as::<f32>((0, 0), (WIDTH, HEIGHT), (WIDTH, HEIGHT), None)
        .unwrap();
    assert_abs_diff_eq!(buffer.data()[0], -22.0, epsilon = 1e-6);
}

#[test]
fn test_u8_band_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bytes.tiff");
    let data = Array2::<u8>::from_elem((HEIGHT, WIDTH), 128);

    write_data_geotiff(&data, &path, &georef(), 1, 0u8).unwrap();

    let dataset = Dataset::open(&path).unwrap();
    let band = dataset.rasterband(1).unwrap();
    assert_eq!(band.no_data_value(), Some(0.0));
    let buffer = band
        .read_as::<u8>((0, 0), (WIDTH, HEIGHT), (WIDTH, HEIGHT), None)
        .unwrap();
    assert_eq!(buffer.data()[0], 128);
}

#[test]
fn test_shape_mismatch_is_rejected_before_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mismatch.tiff");
    // dec = 2 expects 24x32, give the full-size array instead
    let data = ramp();

    let result = write_data_geotiff(&data, &path, &georef(), 2, -1.0f32);
    assert!(matches!(result, Err(EwError::ShapeMismatch(_))));
    assert!(!path.exists());
}

#[test]
fn test_unwritable_path_fails() {
    let data = Array2::<f32>::zeros((HEIGHT, WIDTH));
    let result = write_data_geotiff(
        &data,
        "/nonexistent-folder/deeply/out.tiff",
        &georef(),
        1,
        -1.0f32,
    );
    assert!(result.is_err());
}
