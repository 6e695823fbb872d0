//! Calibration resolver
//!
//! Loads the calibration tables of the MIB and turns them into calibrators:
//!
//! - numeric calibrations: spline curves (`CAF/CAP`, `CCA/CCS`), polynomials
//!   (`MCF`) and logarithmic curves (`LGF`)
//! - textual calibrations (`TXF/TXP`, `PAF/PAS`) mapping raw values or ranges
//!   to labels
//! - context-selected calibrations (`CUR`), picking a numeric calibrator at
//!   runtime by comparing another parameter's raw value
//! - parameter range sets (`PRF/PRV`) restricting argument values

use crate::model::{Comparison, ParameterId};
use serde::Serialize;
use std::collections::HashMap;

pub mod loader;
pub mod records;

pub use records::{
    AliasDefinition, ContextRecord, CurveDefinition, RangeSet, TextualDefinition, ValueRange,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplinePoint {
    pub raw: f64,
    pub calibrated: f64,
}

/// Raw-to-engineering conversion of numeric values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NumericCalibrator {
    /// Piecewise linear curve through points sorted by raw value
    Spline {
        points: Vec<SplinePoint>,
        extrapolate: bool,
    },
    /// `a0 + a1·x + … + an·xⁿ`
    Polynomial { coefficients: Vec<f64> },
    /// `1 / (a0 + a1·ln x + … + a4·ln⁴ x)`
    Logarithmic { coefficients: [f64; 5] },
}

impl NumericCalibrator {
    pub fn spline(mut points: Vec<SplinePoint>, extrapolate: bool) -> Self {
        points.sort_by(|a, b| a.raw.total_cmp(&b.raw));
        Self::Spline {
            points,
            extrapolate,
        }
    }

    /// Engineering value of `raw`, `None` where the curve is undefined
    pub fn calibrate(&self, raw: f64) -> Option<f64> {
        match self {
            Self::Spline {
                points,
                extrapolate,
            } => spline_value(points, *extrapolate, raw),
            Self::Polynomial { coefficients } => Some(horner(coefficients, raw)),
            Self::Logarithmic { coefficients } => {
                if raw <= 0.0 {
                    return None;
                }
                let value = 1.0 / horner(coefficients, raw.ln());
                value.is_finite().then_some(value)
            }
        }
    }
}

fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn interpolate(a: &SplinePoint, b: &SplinePoint, x: f64) -> f64 {
    if b.raw == a.raw {
        return a.calibrated;
    }
    a.calibrated + (x - a.raw) * (b.calibrated - a.calibrated) / (b.raw - a.raw)
}

fn spline_value(points: &[SplinePoint], extrapolate: bool, x: f64) -> Option<f64> {
    let (first, last) = (points.first()?, points.last()?);
    if points.len() == 1 {
        return (x == first.raw || extrapolate).then_some(first.calibrated);
    }

    if x < first.raw {
        return extrapolate.then(|| interpolate(first, &points[1], x));
    }
    if x > last.raw {
        return extrapolate.then(|| interpolate(&points[points.len() - 2], last, x));
    }

    let upper = points.iter().position(|p| p.raw >= x)?;
    let b = &points[upper];
    if b.raw == x || upper == 0 {
        return Some(b.calibrated);
    }
    Some(interpolate(&points[upper - 1], b, x))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueEnumeration {
    pub value: i64,
    pub label: String,
}

/// Inclusive range of raw values sharing one label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueEnumerationRange {
    pub min: f64,
    pub max: f64,
    pub label: String,
}

/// Raw-value to label mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextCalibration {
    pub values: Vec<ValueEnumeration>,
    pub ranges: Vec<ValueEnumerationRange>,
}

impl TextCalibration {
    pub fn add_value(&mut self, value: i64, label: impl Into<String>) {
        self.values.push(ValueEnumeration {
            value,
            label: label.into(),
        });
    }

    pub fn add_range(&mut self, min: f64, max: f64, label: impl Into<String>) {
        self.ranges.push(ValueEnumerationRange {
            min,
            max,
            label: label.into(),
        });
    }

    /// Label of a raw value; point enumerations take precedence over ranges
    pub fn label_for(&self, raw: f64) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.value as f64 == raw)
            .map(|v| v.label.as_str())
            .or_else(|| {
                self.ranges
                    .iter()
                    .find(|r| r.min <= raw && raw <= r.max)
                    .map(|r| r.label.as_str())
            })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.ranges.is_empty()
    }
}

/// Numeric calibrator applicable when its context holds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextCalibrator {
    pub context: Comparison,
    pub calibrator: NumericCalibrator,
}

/// The first calibrator whose context parameter currently holds the
/// expected raw value
pub fn select_calibrator<F>(calibrators: &[ContextCalibrator], raw_value_of: F) -> Option<&NumericCalibrator>
where
    F: Fn(ParameterId) -> Option<i64>,
{
    calibrators
        .iter()
        .find(|c| {
            let expected = c.context.value.trim().parse::<i64>().ok();
            expected.is_some() && raw_value_of(c.context.parameter) == expected
        })
        .map(|c| &c.calibrator)
}

/// Every kind of calibration a parameter can reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CalibrationDefinition {
    Spline(NumericCalibrator),
    Polynomial(NumericCalibrator),
    Logarithmic(NumericCalibrator),
    TextEnumeration(TextCalibration),
    ContextSelected(Vec<ContextCalibrator>),
}

impl CalibrationDefinition {
    pub fn numeric(&self) -> Option<&NumericCalibrator> {
        match self {
            Self::Spline(c) | Self::Polynomial(c) | Self::Logarithmic(c) => Some(c),
            _ => None,
        }
    }
}

/// Calibrations loaded from the MIB, indexed by their identifier
#[derive(Debug, Clone, Default)]
pub struct CalibrationRegistry {
    /// `CAF/CAP` numerical curves
    pub(crate) curves: HashMap<String, CurveDefinition>,
    /// `MCF` polynomial coefficients
    pub(crate) polynomials: HashMap<String, Vec<f64>>,
    /// `LGF` logarithmic coefficients
    pub(crate) logarithmic: HashMap<String, [f64; 5]>,
    /// `TXF/TXP` textual calibrations
    pub(crate) textual: HashMap<String, TextualDefinition>,
    /// `CUR` context records per parameter, in POS order
    pub(crate) contexts: HashMap<String, Vec<ContextRecord>>,
    /// `CCA/CCS` decalibration curves
    pub(crate) decalibrations: HashMap<String, CurveDefinition>,
    /// `PAF/PAS` argument aliases
    pub(crate) aliases: HashMap<String, AliasDefinition>,
    /// `PRF/PRV` range sets
    pub(crate) range_sets: HashMap<String, RangeSet>,
}

impl CalibrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a telemetry calibration reference (PCF_CURTX / CUR_SELECT)
    ///
    /// Numeric references are searched in the polynomial, curve and
    /// logarithmic tables, in that order, then the textual table.
    pub fn resolve(&self, name: &str) -> Option<CalibrationDefinition> {
        if let Some(coefficients) = self.polynomials.get(name) {
            return Some(CalibrationDefinition::Polynomial(
                NumericCalibrator::Polynomial {
                    coefficients: coefficients.clone(),
                },
            ));
        }
        if let Some(curve) = self.curves.get(name) {
            return Some(CalibrationDefinition::Spline(curve.calibrator()));
        }
        if let Some(coefficients) = self.logarithmic.get(name) {
            return Some(CalibrationDefinition::Logarithmic(
                NumericCalibrator::Logarithmic {
                    coefficients: *coefficients,
                },
            ));
        }
        self.textual
            .get(name)
            .map(|t| CalibrationDefinition::TextEnumeration(t.calibration.clone()))
    }

    /// Numeric calibrator of a reference, ignoring textual calibrations
    pub fn numeric(&self, name: &str) -> Option<NumericCalibrator> {
        self.resolve(name)
            .and_then(|definition| definition.numeric().cloned())
    }

    /// Engineering format (R, I or U) of a `CAF` curve
    pub fn engineering_format(&self, name: &str) -> Option<char> {
        self.curves.get(name).map(|c| c.engfmt)
    }

    pub fn textual(&self, name: &str) -> Option<&TextualDefinition> {
        self.textual.get(name)
    }

    pub fn context_records(&self, parameter: &str) -> &[ContextRecord] {
        self.contexts
            .get(parameter)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_context(&self, parameter: &str) -> bool {
        !self.context_records(parameter).is_empty()
    }

    pub fn decalibration(&self, name: &str) -> Option<&CurveDefinition> {
        self.decalibrations.get(name)
    }

    pub fn alias_set(&self, name: &str) -> Option<&AliasDefinition> {
        self.aliases.get(name)
    }

    pub fn range_set(&self, name: &str) -> Option<&RangeSet> {
        self.range_sets.get(name)
    }
}
