//! End-to-end conversions: scene in, GeoTIFF out.

use crate::core::speckle::{SpeckleFilter, SpeckleFilterType};
use crate::io::geotiff::{write_data_geotiff, write_multiband_geotiff};
use crate::io::product::Scene;
use crate::types::{BandData, EwError, EwResult, Polarization, NODATA_DB};
use ndarray::Array2;
use std::path::Path;

/// Which bands go into an output product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandSelection {
    /// Every available polarization, HH first
    Both,
    Hh,
    Hv,
}

impl BandSelection {
    fn polarizations(&self, scene: &Scene) -> Vec<Polarization> {
        match self {
            BandSelection::Both => scene.polarizations(),
            BandSelection::Hh => vec![Polarization::HH],
            BandSelection::Hv => vec![Polarization::HV],
        }
    }
}

/// Write the calibrated backscatter (dB) of a scene as a float32 GeoTIFF,
/// one band per selected polarization, optionally followed by the
/// interpolated incidence angle as an extra band.
pub fn calibrated<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    selection: BandSelection,
    include_incidence_angle: bool,
) -> EwResult<()> {
    let mut scene = Scene::new(input_path)?;
    scene.read_data()?;
    let georef = scene.georeference()?.clone();

    let mut layers: Vec<BandData> = Vec::new();
    for pol in selection.polarizations(&scene) {
        layers.push(scene.band(pol)?.data.clone());
    }
    if include_incidence_angle {
        let pol = scene
            .polarizations()
            .first()
            .copied()
            .ok_or(EwError::MissingBand(Polarization::HH))?;
        layers.push(scene.incidence_angle(pol)?);
    }

    let views: Vec<_> = layers.iter().map(|l| l.view()).collect();
    write_multiband_geotiff(&views, output_path, &georef, 1, NODATA_DB)
}

/// Write one clip-normalized band as an 8-bit grayscale GeoTIFF.
/// Values occupy 1..=251; 0 is the no-data value.
pub fn grayscale<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    pol: Polarization,
    speckle_filter: Option<SpeckleFilterType>,
) -> EwResult<()> {
    let mut scene = Scene::new(input_path)?;
    scene.read_data()?;
    let georef = scene.georeference()?.clone();

    scene.band_mut(pol)?.clip_normalize();
    let band = scene.band(pol)?;
    let normalized = filtered(&band.data, speckle_filter)?;
    let image = quantize(&normalized, &band.nodata_mask);

    write_data_geotiff(&image, output_path, &georef, 1, 0u8)
}

/// Write an RGB GeoTIFF from the clip-normalized HH and HV bands plus
/// their scaled difference.
pub fn rgb<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    speckle_filter: Option<SpeckleFilterType>,
) -> EwResult<()> {
    let mut scene = Scene::new(input_path)?;
    scene.read_data()?;
    let georef = scene.georeference()?.clone();

    scene.band_mut(Polarization::HH)?.clip_normalize();
    scene.band_mut(Polarization::HV)?.clip_normalize();
    let hh = scene.band(Polarization::HH)?;
    let hv = scene.band(Polarization::HV)?;

    // band ratio, shifted into [0, 1]
    let mut ratio = &hv.data - &hh.data;
    ratio.mapv_inplace(|v| (v * 0.5 + 0.5).clamp(0.0, 1.0));

    let mask = &hh.nodata_mask | &hv.nodata_mask;
    let layers = [
        quantize(&filtered(&hh.data, speckle_filter)?, &mask),
        quantize(&filtered(&hv.data, speckle_filter)?, &mask),
        quantize(&filtered(&ratio, speckle_filter)?, &mask),
    ];
    let views: Vec<_> = layers.iter().map(|l| l.view()).collect();

    write_multiband_geotiff(&views, output_path, &georef, 1, 0u8)
}

fn filtered(
    data: &BandData,
    speckle_filter: Option<SpeckleFilterType>,
) -> EwResult<BandData> {
    match speckle_filter {
        Some(kind) => SpeckleFilter::new().apply(data, kind),
        None => Ok(data.clone()),
    }
}

/// Quantize [0, 1] data to u8 1..=251, stamping masked pixels with 0.
fn quantize(normalized: &BandData, nodata_mask: &ndarray::Array2<bool>) -> Array2<u8> {
    let mut out = Array2::zeros(normalized.dim());
    ndarray::Zip::from(&mut out)
        .and(normalized)
        .and(nodata_mask)
        .for_each(|o, &v, &masked| {
            *o = if masked {
                0
            } else {
                (v.clamp(0.0, 1.0) * 250.0) as u8 + 1
            };
        });
    out
}
