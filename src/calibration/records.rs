//! Calibration table records

use super::{NumericCalibrator, SplinePoint, TextCalibration};
use crate::error::Location;

/// A numerical curve (`CAF/CAP` or `CCA/CCS`)
#[derive(Debug, Clone, PartialEq)]
pub struct CurveDefinition {
    pub name: String,
    pub description: Option<String>,
    pub engfmt: char,
    pub rawfmt: char,
    pub radix: char,
    pub unit: Option<String>,
    pub extrapolate: bool,
    pub points: Vec<SplinePoint>,
}

impl CurveDefinition {
    pub fn calibrator(&self) -> NumericCalibrator {
        NumericCalibrator::spline(self.points.clone(), self.extrapolate)
    }
}

/// A `TXF` textual calibration with its `TXP` points and ranges
#[derive(Debug, Clone, PartialEq)]
pub struct TextualDefinition {
    pub name: String,
    pub description: Option<String>,
    pub rawfmt: char,
    pub calibration: TextCalibration,
}

/// A `CUR` record: use `select` while `reference` holds `value`
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRecord {
    pub location: Location,
    pub position: i64,
    pub reference: String,
    pub value: i64,
    pub select: String,
}

/// A `PAF` alias set with its `PAS` values
#[derive(Debug, Clone, PartialEq)]
pub struct AliasDefinition {
    pub name: String,
    pub description: Option<String>,
    pub rawfmt: char,
    pub calibration: TextCalibration,
}

/// Inclusive range of accepted argument values
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

/// A `PRF` range set with its `PRV` ranges
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSet {
    pub name: String,
    pub description: Option<String>,
    /// Ranges apply to engineering (`E`) or raw (`R`) values
    pub inter: char,
    pub dspfmt: char,
    pub radix: char,
    pub ranges: Vec<ValueRange>,
}

impl RangeSet {
    pub fn applies_to_calibrated(&self) -> bool {
        self.inter == 'E'
    }

    /// Range values can only be compared for numeric display formats
    pub fn is_numeric(&self) -> bool {
        matches!(self.dspfmt, 'I' | 'U' | 'R')
    }
}
