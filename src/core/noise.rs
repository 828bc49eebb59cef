//! Thermal noise LUT parsing and interpolation.
//!
//! Noise vectors are irregular: each annotation line can carry its own
//! pixel set, so the dense surface goes through the two-pass vector
//! interpolation instead of the regular-grid path.

use crate::core::calibrate::{extract_xml_value, iter_tag_blocks, parse_numbers};
use crate::core::interp::{self, LineVector};
use crate::types::{EwError, EwResult};
use ndarray::Array2;

/// Scale factor for noise records with pre-July-2015 units (ESA document
/// value). Applied together with the first dn value of the calibration LUT.
pub const K_NOISE: f32 = 56065.87;

/// Sparse thermal-noise LUT for one band
#[derive(Debug, Clone)]
pub struct NoiseTable {
    pub vectors: Vec<LineVector>,
}

impl NoiseTable {
    /// Parse a noise annotation file. Handles both the older
    /// `<noiseVector>/<noiseLut>` layout and the `<noiseRangeVector>/
    /// <noiseRangeLut>` layout of newer IPF versions.
    pub fn parse(xml_content: &str) -> EwResult<Self> {
        log::debug!("parsing noise XML ({} bytes)", xml_content.len());

        let mut vectors = parse_noise_vectors(xml_content, "noiseVector", "noiseLut")?;
        if vectors.is_empty() {
            vectors = parse_noise_vectors(xml_content, "noiseRangeVector", "noiseRangeLut")?;
        }
        if vectors.is_empty() {
            return Err(EwError::CalibrationParse(
                "no noise vectors found".to_string(),
            ));
        }

        log::info!("parsed {} noise vectors", vectors.len());
        Ok(NoiseTable { vectors })
    }

    /// Dense per-pixel noise surface matching `out_dims`.
    ///
    /// Records with incorrect units (before July 2015) have a maximum
    /// below 1 and are rescaled by `K_NOISE * dn0`, `dn0` being the first
    /// dn value of the band calibration file.
    pub fn surface(
        &self,
        out_dims: (usize, usize),
        first_dn: Option<f32>,
    ) -> EwResult<Array2<f32>> {
        let mut noise = interp::vectors_to_full(&self.vectors, out_dims)?;
        let max = noise.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        if max < 1.0 {
            if let Some(dn0) = first_dn {
                log::info!("noise LUT in legacy units (max {:.3e}), rescaling", max);
                noise.mapv_inplace(|v| v * K_NOISE * dn0);
            } else {
                log::warn!(
                    "noise LUT looks like legacy units (max {:.3e}) but no dn value is available",
                    max
                );
            }
        }
        Ok(noise)
    }
}

fn parse_noise_vectors(
    xml_content: &str,
    vector_tag: &str,
    lut_tag: &str,
) -> EwResult<Vec<LineVector>> {
    let mut vectors = Vec::new();
    for block in iter_tag_blocks(xml_content, vector_tag) {
        let line = extract_xml_value(block, "line")
            .ok_or_else(|| EwError::CalibrationParse("missing line".to_string()))?
            .parse::<usize>()
            .map_err(|e| EwError::CalibrationParse(format!("invalid line number: {}", e)))?;
        let pixels = parse_numbers::<usize>(
            &extract_xml_value(block, "pixel")
                .ok_or_else(|| EwError::CalibrationParse("missing pixel".to_string()))?,
        )?;
        let values = parse_numbers::<f32>(
            &extract_xml_value(block, lut_tag)
                .ok_or_else(|| EwError::CalibrationParse(format!("missing {}", lut_tag)))?,
        )?;
        if pixels.len() != values.len() {
            return Err(EwError::CalibrationParse(format!(
                "noise vector at line {} has {} pixels and {} values",
                line,
                pixels.len(),
                values.len()
            )));
        }
        vectors.push(LineVector {
            line,
            pixels,
            values,
        });
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const NOISE_XML: &str = r#"
    <noise>
      <noiseVectorList count="2">
        <noiseVector>
          <azimuthTime>2020-01-07T03:39:38.674828</azimuthTime>
          <line>0</line>
          <pixel count="3">0 100 200</pixel>
          <noiseLut count="3">2.0e+03 2.0e+03 2.0e+03</noiseLut>
        </noiseVector>
        <noiseVector>
          <azimuthTime>2020-01-07T03:39:48.674828</azimuthTime>
          <line>100</line>
          <pixel count="3">0 100 200</pixel>
          <noiseLut count="3">4.0e+03 4.0e+03 4.0e+03</noiseLut>
        </noiseVector>
      </noiseVectorList>
    </noise>
    "#;

    #[test]
    fn test_parse_and_interpolate() {
        let table = NoiseTable::parse(NOISE_XML).unwrap();
        assert_eq!(table.vectors.len(), 2);
        let noise = table.surface((101, 201), None).unwrap();
        assert_abs_diff_eq!(noise[[0, 0]], 2000.0, epsilon = 1e-2);
        assert_abs_diff_eq!(noise[[100, 200]], 4000.0, epsilon = 1e-2);
        assert_abs_diff_eq!(noise[[50, 100]], 3000.0, epsilon = 1e-1);
    }

    #[test]
    fn test_legacy_units_rescale() {
        let xml = NOISE_XML.replace("2.0e+03", "2.0e-06").replace("4.0e+03", "4.0e-06");
        let table = NoiseTable::parse(&xml).unwrap();
        let noise = table.surface((11, 11), Some(237.0)).unwrap();
        let expected = 2.0e-06 * K_NOISE * 237.0;
        assert_abs_diff_eq!(noise[[0, 0]], expected, epsilon = expected * 1e-4);
    }

    #[test]
    fn test_range_vector_layout() {
        let xml = NOISE_XML
            .replace("noiseVector>", "noiseRangeVector>")
            .replace("noiseVectorList", "noiseRangeVectorList")
            .replace("noiseLut", "noiseRangeLut");
        let table = NoiseTable::parse(&xml).unwrap();
        assert_eq!(table.vectors.len(), 2);
    }

    #[test]
    fn test_missing_vectors() {
        assert!(NoiseTable::parse("<noise></noise>").is_err());
    }
}
