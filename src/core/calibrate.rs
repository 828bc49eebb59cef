//! Radiometric calibration: parsing of the Sentinel-1 calibration LUT and
//! conversion of digital numbers to backscatter in dB.

use crate::core::interp::{self, LineVector};
use crate::types::{BandData, EwError, EwResult, NODATA_DB};
use ndarray::Array2;
use regex::Regex;

/// Calibration vector from the Sentinel-1 calibration XML
#[derive(Debug, Clone)]
pub struct CalibrationVector {
    pub azimuth_time: String,
    pub line: usize,
    pub pixels: Vec<usize>,
    pub sigma_nought: Vec<f32>,
    pub beta_nought: Vec<f32>,
    pub gamma: Vec<f32>,
    pub dn: Vec<f32>,
}

/// Which of the four LUTs of the calibration file is used as the gain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationKind {
    Sigma0,
    Beta0,
    Gamma0,
    Dn,
}

/// Sparse calibration LUT for one band
#[derive(Debug, Clone)]
pub struct CalibrationTable {
    pub vectors: Vec<CalibrationVector>,
    pub swath: String,
    pub polarisation: String,
}

impl CalibrationTable {
    /// Parse a calibration annotation file.
    pub fn parse(xml_content: &str) -> EwResult<Self> {
        log::debug!("parsing calibration XML ({} bytes)", xml_content.len());

        let vectors = parse_calibration_vectors(xml_content)?;
        if vectors.is_empty() {
            return Err(EwError::CalibrationParse(
                "no calibration vectors found".to_string(),
            ));
        }

        let swath = extract_xml_value(xml_content, "swath").unwrap_or_else(|| "EW".to_string());
        let polarisation =
            extract_xml_value(xml_content, "polarisation").unwrap_or_else(|| "HH".to_string());

        log::info!(
            "parsed {} calibration vectors for {}/{}",
            vectors.len(),
            swath,
            polarisation
        );

        Ok(CalibrationTable {
            vectors,
            swath,
            polarisation,
        })
    }

    /// First dn value of the LUT, used to rescale pre-2015 noise tables.
    pub fn first_dn(&self) -> Option<f32> {
        self.vectors.first().and_then(|v| v.dn.first().copied())
    }

    fn values_of(v: &CalibrationVector, kind: CalibrationKind) -> &[f32] {
        match kind {
            CalibrationKind::Sigma0 => &v.sigma_nought,
            CalibrationKind::Beta0 => &v.beta_nought,
            CalibrationKind::Gamma0 => &v.gamma,
            CalibrationKind::Dn => &v.dn,
        }
    }

    /// Dense per-pixel gain surface matching `out_dims`.
    ///
    /// Calibration vectors normally share one pixel set, which gives a
    /// regular grid and a plain bilinear interpolation. Files with
    /// per-vector pixel sets fall back to the two-pass vector
    /// interpolation.
    pub fn gain_surface(
        &self,
        kind: CalibrationKind,
        out_dims: (usize, usize),
    ) -> EwResult<Array2<f32>> {
        let first = self
            .vectors
            .first()
            .ok_or_else(|| EwError::CalibrationParse("empty calibration table".to_string()))?;

        let regular = self.vectors.iter().all(|v| v.pixels == first.pixels);
        if regular {
            let lines: Vec<usize> = self.vectors.iter().map(|v| v.line).collect();
            let mut values = Array2::zeros((self.vectors.len(), first.pixels.len()));
            for (i, v) in self.vectors.iter().enumerate() {
                let row = Self::values_of(v, kind);
                if row.len() != first.pixels.len() {
                    return Err(EwError::CalibrationParse(format!(
                        "calibration vector at line {} has {} values for {} pixels",
                        v.line,
                        row.len(),
                        first.pixels.len()
                    )));
                }
                for (j, &val) in row.iter().enumerate() {
                    values[[i, j]] = val;
                }
            }
            interp::grid_to_full(&lines, &first.pixels, &values, out_dims)
        } else {
            log::warn!("calibration vectors have differing pixel sets, using vector interpolation");
            let vectors: Vec<LineVector> = self
                .vectors
                .iter()
                .map(|v| LineVector {
                    line: v.line,
                    pixels: v.pixels.clone(),
                    values: Self::values_of(v, kind).to_vec(),
                })
                .collect();
            interp::vectors_to_full(&vectors, out_dims)
        }
    }
}

/// Calibrated backscatter in dB:
///
///     dB = 10 * log10( (DN^2 - noise) / gain^2 )
///
/// The linear ratio is clamped below at `1 / gain_max` before the
/// logarithm and non-finite results are replaced with [`NODATA_DB`].
pub fn calibrate_db(
    dn: &BandData,
    noise: Option<&BandData>,
    gain: &BandData,
) -> EwResult<BandData> {
    if gain.dim() != dn.dim() {
        return Err(EwError::ShapeMismatch(format!(
            "gain surface is {:?}, band is {:?}",
            gain.dim(),
            dn.dim()
        )));
    }
    if let Some(n) = noise {
        if n.dim() != dn.dim() {
            return Err(EwError::ShapeMismatch(format!(
                "noise surface is {:?}, band is {:?}",
                n.dim(),
                dn.dim()
            )));
        }
    }

    let gain_max = gain.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if !(gain_max > 0.0) {
        return Err(EwError::CalibrationParse(
            "gain surface has no positive values".to_string(),
        ));
    }
    let threshold = 1.0 / gain_max;

    let mut out = Array2::zeros(dn.dim());
    for ((i, j), v) in out.indexed_iter_mut() {
        let d = dn[[i, j]];
        let n = noise.map(|n| n[[i, j]]).unwrap_or(0.0);
        let g = gain[[i, j]];
        let linear = ((d * d - n) / (g * g)).max(threshold);
        let db = 10.0 * linear.log10();
        *v = if db.is_finite() { db } else { NODATA_DB };
    }
    Ok(out)
}

/// Convert a linear-scale array to dB, mapping non-positive input to
/// [`NODATA_DB`].
pub fn to_db(linear: &BandData) -> BandData {
    linear.mapv(|x| {
        if x > 0.0 {
            10.0 * x.log10()
        } else {
            NODATA_DB
        }
    })
}

fn parse_calibration_vectors(xml_content: &str) -> EwResult<Vec<CalibrationVector>> {
    let mut vectors = Vec::new();

    for block in iter_tag_blocks(xml_content, "calibrationVector") {
        vectors.push(parse_single_calibration_vector(block)?);
    }

    // regex fallback, in case the plain string search found nothing
    if vectors.is_empty() {
        let pattern = Regex::new(r"(?s)<calibrationVector>(.*?)</calibrationVector>")
            .map_err(|e| EwError::CalibrationParse(format!("regex error: {}", e)))?;
        for captures in pattern.captures_iter(xml_content) {
            if let Some(m) = captures.get(1) {
                vectors.push(parse_single_calibration_vector(m.as_str())?);
            }
        }
    }

    Ok(vectors)
}

fn parse_single_calibration_vector(vector_xml: &str) -> EwResult<CalibrationVector> {
    let azimuth_time = extract_xml_value(vector_xml, "azimuthTime")
        .ok_or_else(|| EwError::CalibrationParse("missing azimuthTime".to_string()))?;

    let line = extract_xml_value(vector_xml, "line")
        .ok_or_else(|| EwError::CalibrationParse("missing line".to_string()))?
        .parse::<usize>()
        .map_err(|e| EwError::CalibrationParse(format!("invalid line number: {}", e)))?;

    let pixels = parse_numbers::<usize>(&require_tag(vector_xml, "pixel")?)?;
    let sigma_nought = parse_numbers::<f32>(&require_tag(vector_xml, "sigmaNought")?)?;
    let beta_nought = parse_numbers::<f32>(&require_tag(vector_xml, "betaNought")?)?;
    let gamma = parse_numbers::<f32>(&require_tag(vector_xml, "gamma")?)?;
    let dn = parse_numbers::<f32>(&require_tag(vector_xml, "dn")?)?;

    if pixels.len() != sigma_nought.len()
        || pixels.len() != beta_nought.len()
        || pixels.len() != gamma.len()
        || pixels.len() != dn.len()
    {
        return Err(EwError::CalibrationParse(
            "calibration vector arrays have mismatched lengths".to_string(),
        ));
    }

    Ok(CalibrationVector {
        azimuth_time,
        line,
        pixels,
        sigma_nought,
        beta_nought,
        gamma,
        dn,
    })
}

fn require_tag(xml: &str, tag: &str) -> EwResult<String> {
    extract_xml_value(xml, tag)
        .ok_or_else(|| EwError::CalibrationParse(format!("missing {}", tag)))
}

/// Iterate the contents of every `<tag>...</tag>` block via plain string
/// search. Faster than a regex over multi-megabyte annotation files.
pub(crate) fn iter_tag_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut blocks = Vec::new();
    let mut pos = 0;
    while let Some(start) = xml[pos..].find(&open) {
        let content_start = pos + start + open.len();
        match xml[content_start..].find(&close) {
            Some(end) => {
                blocks.push(&xml[content_start..content_start + end]);
                pos = content_start + end + close.len();
            }
            None => break,
        }
    }
    blocks
}

/// Extract the text content of the first `<tag>` occurrence; tolerates
/// attributes on the tag.
pub(crate) fn extract_xml_value(xml_content: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"<{}(?:\s[^>]*)?>\s*([^<]*)\s*</{}>", tag, tag);
    if let Ok(re) = Regex::new(&pattern) {
        if let Some(cap) = re.captures(xml_content) {
            return Some(cap[1].trim().to_string());
        }
    }
    None
}

/// Parse space-separated numbers from annotation text.
pub(crate) fn parse_numbers<T>(input: &str) -> EwResult<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    input
        .split_whitespace()
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| EwError::CalibrationParse(format!("parse error: {}", e)))
        })
        .collect()
}
