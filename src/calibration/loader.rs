//! Calibration table loading
//!
//! Reads the calibration tables into the [`CalibrationRegistry`]. Telemetry
//! and commanding calibrations are loaded separately, each right before the
//! builder that consumes them.

use super::records::ValueRange;
use super::{
    AliasDefinition, CalibrationRegistry, ContextRecord, CurveDefinition, RangeSet, SplinePoint,
    TextCalibration, TextualDefinition,
};
use crate::constants::tables;
use crate::error::Result;
use crate::reader::Row;
use crate::session::Session;
use tracing::{debug, info};

mod caf {
    pub const NUMBR: usize = 0;
    pub const DESCR: usize = 1;
    pub const ENGFMT: usize = 2;
    pub const RAWFMT: usize = 3;
    pub const RADIX: usize = 4;
    pub const UNIT: usize = 5;
    pub const INTER: usize = 7;
}

mod cap {
    pub const NUMBR: usize = 0;
    pub const XVALS: usize = 1;
    pub const YVALS: usize = 2;
}

mod poly {
    pub const IDENT: usize = 0;
    pub const POL1: usize = 2;
    pub const POL5: usize = 6;
}

mod txf {
    pub const NUMBR: usize = 0;
    pub const DESCR: usize = 1;
    pub const RAWFMT: usize = 2;
}

mod txp {
    pub const NUMBR: usize = 0;
    pub const FROM: usize = 1;
    pub const TO: usize = 2;
    pub const ALTXT: usize = 3;
}

mod cur {
    pub const PNAME: usize = 0;
    pub const POS: usize = 1;
    pub const RLCHK: usize = 2;
    pub const VALPAR: usize = 3;
    pub const SELECT: usize = 4;
}

mod paf {
    pub const NUMBR: usize = 0;
    pub const DESCR: usize = 1;
    pub const RAWFMT: usize = 2;
}

mod pas {
    pub const NUMBR: usize = 0;
    pub const ALTXT: usize = 1;
    pub const ALVAL: usize = 2;
}

mod prf {
    pub const NUMBR: usize = 0;
    pub const DESCR: usize = 1;
    pub const INTER: usize = 2;
    pub const DSPFMT: usize = 3;
    pub const RADIX: usize = 4;
}

mod prv {
    pub const NUMBR: usize = 0;
    pub const MINVAL: usize = 1;
    pub const MAXVAL: usize = 2;
}

impl CalibrationRegistry {
    /// Load `CUR`, `CAF/CAP`, `TXF/TXP`, `MCF` and `LGF`
    pub fn load_telemetry(&mut self, session: &mut Session) -> Result<()> {
        self.load_context_records(session)?;

        session.scan(tables::CAF, |_, row| {
            let curve = read_curve_header(row)?;
            self.curves.insert(curve.name.clone(), curve);
            Ok(())
        })?;
        session.scan(tables::CAP, |_, row| {
            row.require(&[cap::NUMBR, cap::XVALS, cap::YVALS])?;
            let name = row.str(cap::NUMBR)?;
            let curve = self
                .curves
                .get_mut(name)
                .ok_or_else(|| row.reference(format!("CAP references unknown CAF '{}'", name)))?;
            curve.points.push(SplinePoint {
                raw: row.raw_value(cap::XVALS, curve.rawfmt, curve.radix)?,
                calibrated: row.raw_value(cap::YVALS, curve.engfmt, curve.radix)?,
            });
            Ok(())
        })?;

        self.load_textual(session)?;

        session.scan(tables::MCF, |_, row| {
            row.require(&[poly::IDENT, poly::POL1])?;
            let last = (poly::POL1..=poly::POL5)
                .filter(|&col| row.has(col))
                .max()
                .ok_or_else(|| row.data("polynomial calibration without coefficients"))?;
            let coefficients = (poly::POL1..=last)
                .map(|col| row.float_or(col, 0.0))
                .collect::<Result<Vec<f64>>>()?;
            self.polynomials
                .insert(row.str(poly::IDENT)?.to_string(), coefficients);
            Ok(())
        })?;

        session.scan(tables::LGF, |_, row| {
            row.require(&[poly::IDENT, poly::POL1])?;
            let mut coefficients = [0.0; 5];
            for (i, c) in coefficients.iter_mut().enumerate() {
                *c = row.float_or(poly::POL1 + i, 0.0)?;
            }
            self.logarithmic
                .insert(row.str(poly::IDENT)?.to_string(), coefficients);
            Ok(())
        })?;

        info!(
            "Loaded telemetry calibrations: {} curves, {} polynomials, {} logarithmic, {} textual",
            self.curves.len(),
            self.polynomials.len(),
            self.logarithmic.len(),
            self.textual.len()
        );
        Ok(())
    }

    /// Load `CCA/CCS`, `PAF/PAS` and `PRF/PRV`
    pub fn load_commanding(&mut self, session: &mut Session) -> Result<()> {
        session.scan(tables::CCA, |_, row| {
            let curve = read_curve_header(row)?;
            self.decalibrations.insert(curve.name.clone(), curve);
            Ok(())
        })?;
        session.scan(tables::CCS, |_, row| {
            row.require(&[cap::NUMBR, cap::XVALS, cap::YVALS])?;
            let name = row.str(cap::NUMBR)?;
            let curve = self
                .decalibrations
                .get_mut(name)
                .ok_or_else(|| row.reference(format!("CCS references unknown CCA '{}'", name)))?;
            // X values are engineering values, Y values raw
            curve.points.push(SplinePoint {
                raw: row.raw_value(cap::YVALS, curve.rawfmt, curve.radix)?,
                calibrated: row.raw_value(cap::XVALS, curve.engfmt, curve.radix)?,
            });
            Ok(())
        })?;

        session.scan(tables::PAF, |_, row| {
            row.require(&[paf::NUMBR])?;
            let rawfmt = row.flag_or(paf::RAWFMT, 'U');
            if !matches!(rawfmt, 'U' | 'I' | 'R') {
                return Err(row.data(format!("invalid PAF_RAWFMT '{}'", rawfmt)));
            }
            let name = row.str(paf::NUMBR)?.to_string();
            self.aliases.insert(
                name.clone(),
                AliasDefinition {
                    name,
                    description: row.opt_str(paf::DESCR).map(str::to_string),
                    rawfmt,
                    calibration: TextCalibration::default(),
                },
            );
            Ok(())
        })?;
        session.scan(tables::PAS, |_, row| {
            row.require(&[pas::NUMBR, pas::ALTXT, pas::ALVAL])?;
            let name = row.str(pas::NUMBR)?;
            let alias = self
                .aliases
                .get_mut(name)
                .ok_or_else(|| row.reference(format!("PAS references unknown PAF '{}'", name)))?;
            let label = row.str(pas::ALTXT)?;
            match alias.rawfmt {
                'U' => {
                    let value = i64::try_from(row.uint(pas::ALVAL)?).map_err(|_| {
                        row.data(format!("alias value of '{}' exceeds 63 bits", label))
                    })?;
                    alias.calibration.add_value(value, label);
                }
                'I' => alias.calibration.add_value(row.int(pas::ALVAL)?, label),
                _ => {
                    let value = row.float(pas::ALVAL)?;
                    alias.calibration.add_range(value, value, label);
                }
            }
            Ok(())
        })?;

        session.scan(tables::PRF, |_, row| {
            row.require(&[prf::NUMBR])?;
            let name = row.str(prf::NUMBR)?.to_string();
            self.range_sets.insert(
                name.clone(),
                RangeSet {
                    name,
                    description: row.opt_str(prf::DESCR).map(str::to_string),
                    inter: row.flag_or(prf::INTER, 'R'),
                    dspfmt: row.flag_or(prf::DSPFMT, 'U'),
                    radix: row.flag_or(prf::RADIX, 'D'),
                    ranges: Vec::new(),
                },
            );
            Ok(())
        })?;
        session.scan(tables::PRV, |_, row| {
            row.require(&[prv::NUMBR, prv::MINVAL])?;
            let name = row.str(prv::NUMBR)?;
            let set = self
                .range_sets
                .get_mut(name)
                .ok_or_else(|| row.reference(format!("PRV references unknown PRF '{}'", name)))?;
            if !set.is_numeric() {
                debug!("{}: range set '{}' is not numeric, value ignored", row.location(), name);
                return Ok(());
            }
            let min = row.raw_value(prv::MINVAL, set.dspfmt, set.radix)?;
            let max = if row.has(prv::MAXVAL) {
                row.raw_value(prv::MAXVAL, set.dspfmt, set.radix)?
            } else {
                min
            };
            set.ranges.push(ValueRange { min, max });
            Ok(())
        })?;

        info!(
            "Loaded command calibrations: {} decalibrations, {} alias sets, {} range sets",
            self.decalibrations.len(),
            self.aliases.len(),
            self.range_sets.len()
        );
        Ok(())
    }

    fn load_context_records(&mut self, session: &mut Session) -> Result<()> {
        session.scan(tables::CUR, |_, row| {
            row.require(&[cur::PNAME, cur::POS, cur::RLCHK, cur::VALPAR, cur::SELECT])?;
            let record = ContextRecord {
                location: row.location().clone(),
                position: row.int(cur::POS)?,
                reference: row.str(cur::RLCHK)?.to_string(),
                value: row.int(cur::VALPAR)?,
                select: row.str(cur::SELECT)?.to_string(),
            };
            self.contexts
                .entry(row.str(cur::PNAME)?.to_string())
                .or_default()
                .push(record);
            Ok(())
        })?;

        for records in self.contexts.values_mut() {
            records.sort_by_key(|r| r.position);
        }
        Ok(())
    }

    fn load_textual(&mut self, session: &mut Session) -> Result<()> {
        session.scan(tables::TXF, |_, row| {
            row.require(&[txf::NUMBR, txf::RAWFMT])?;
            let name = row.str(txf::NUMBR)?.to_string();
            self.textual.insert(
                name.clone(),
                TextualDefinition {
                    name,
                    description: row.opt_str(txf::DESCR).map(str::to_string),
                    rawfmt: row.flag_or(txf::RAWFMT, 'U'),
                    calibration: TextCalibration::default(),
                },
            );
            Ok(())
        })?;

        session.scan(tables::TXP, |_, row| {
            row.require(&[txp::NUMBR, txp::FROM, txp::TO])?;
            let name = row.str(txp::NUMBR)?;
            let textual = self
                .textual
                .get_mut(name)
                .ok_or_else(|| row.reference(format!("TXP references unknown TXF '{}'", name)))?;
            let label = row.string_or(txp::ALTXT, "");
            let (from, to) = (row.str(txp::FROM)?, row.str(txp::TO)?);

            if from == to && matches!(textual.rawfmt, 'I' | 'U') {
                textual.calibration.add_value(row.int(txp::FROM)?, label);
            } else {
                textual
                    .calibration
                    .add_range(row.float(txp::FROM)?, row.float(txp::TO)?, label);
            }
            Ok(())
        })?;
        Ok(())
    }
}

fn read_curve_header(row: &Row) -> Result<CurveDefinition> {
    row.require(&[caf::NUMBR])?;
    let engfmt = row.flag_or(caf::ENGFMT, 'R');
    if !matches!(engfmt, 'R' | 'I' | 'U') {
        return Err(row.data(format!("invalid engineering format '{}'", engfmt)));
    }
    let rawfmt = row.flag_or(caf::RAWFMT, 'U');
    if !matches!(rawfmt, 'R' | 'I' | 'U') {
        return Err(row.data(format!("invalid raw format '{}'", rawfmt)));
    }
    let radix = row.flag_or(caf::RADIX, 'D');

    Ok(CurveDefinition {
        name: row.str(caf::NUMBR)?.to_string(),
        description: row.opt_str(caf::DESCR).map(str::to_string),
        engfmt,
        rawfmt,
        radix,
        unit: row.opt_str(caf::UNIT).map(str::to_string),
        extrapolate: row.flag_or(caf::INTER, 'F') == 'P',
        points: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationDefinition, NumericCalibrator};
    use crate::fixtures::MibFixture;

    #[test]
    fn test_load_telemetry_calibrations() {
        let fixture = MibFixture::new()
            .row("caf", &["CAL1", "curve", "R", "U", "D", "V", "2", "F"])
            .row("cap", &["CAL1", "0", "0.5"])
            .row("cap", &["CAL1", "10", "5.5"])
            .row("mcf", &["POLY1", "poly", "1", "", "3"])
            .row("lgf", &["LOG1", "log", "2", "1"])
            .row("txf", &["TXT1", "text", "U"])
            .row("txp", &["TXT1", "0", "0", "OFF"])
            .row("txp", &["TXT1", "1", "5", "ON"])
            .row("cur", &["P1", "2", "MODE", "1", "POLY1"])
            .row("cur", &["P1", "1", "MODE", "0", "CAL1"])
            .write();
        let mut session = fixture.session();
        let mut registry = CalibrationRegistry::new();

        registry.load_telemetry(&mut session).unwrap();
        assert!(session.errors().is_empty());

        let spline = registry.numeric("CAL1").unwrap();
        assert_eq!(spline.calibrate(10.0), Some(5.5));
        assert_eq!(registry.engineering_format("CAL1"), Some('R'));

        match registry.resolve("POLY1").unwrap() {
            CalibrationDefinition::Polynomial(NumericCalibrator::Polynomial { coefficients }) => {
                assert_eq!(coefficients, vec![1.0, 0.0, 3.0]);
            }
            other => panic!("Expected polynomial, got {:?}", other),
        }
        match registry.resolve("LOG1").unwrap() {
            CalibrationDefinition::Logarithmic(NumericCalibrator::Logarithmic { coefficients }) => {
                assert_eq!(coefficients, [2.0, 1.0, 0.0, 0.0, 0.0]);
            }
            other => panic!("Expected logarithmic, got {:?}", other),
        }

        let text = &registry.textual("TXT1").unwrap().calibration;
        assert_eq!(text.values.len(), 1);
        assert_eq!(text.ranges.len(), 1);
        assert_eq!(text.label_for(3.0), Some("ON"));

        let contexts = registry.context_records("P1");
        assert_eq!(contexts[0].select, "CAL1");
        assert_eq!(contexts[1].select, "POLY1");
    }

    #[test]
    fn test_calibration_points_for_unknown_curve() {
        let fixture = MibFixture::new()
            .row("cap", &["NOPE", "0", "1"])
            .row("txp", &["NOPE", "0", "0", "X"])
            .write();
        let mut session = fixture.session();
        let mut registry = CalibrationRegistry::new();

        registry.load_telemetry(&mut session).unwrap();

        let lines: Vec<_> = session.errors().iter().map(|e| e.line()).collect();
        assert_eq!(lines, vec![Some(1), Some(1)]);
    }

    #[test]
    fn test_load_commanding_calibrations() {
        let fixture = MibFixture::new()
            .row("cca", &["DEC1", "decal", "R", "U", "H"])
            .row("ccs", &["DEC1", "1.5", "ff"])
            .row("paf", &["ALIAS1", "modes", "U"])
            .row("pas", &["ALIAS1", "SAFE", "0"])
            .row("pas", &["ALIAS1", "NOMINAL", "1"])
            .row("paf", &["ALIAS2", "levels", "R"])
            .row("pas", &["ALIAS2", "HALF", "0.5"])
            .row("prf", &["RANGE1", "volts", "E", "R"])
            .row("prv", &["RANGE1", "-5", "5"])
            .row("prv", &["RANGE1", "7"])
            .write();
        let mut session = fixture.session();
        let mut registry = CalibrationRegistry::new();

        registry.load_commanding(&mut session).unwrap();
        assert!(session.errors().is_empty());

        let curve = registry.decalibration("DEC1").unwrap();
        assert_eq!(curve.points[0].raw, 255.0);
        assert_eq!(curve.points[0].calibrated, 1.5);

        let modes = &registry.alias_set("ALIAS1").unwrap().calibration;
        assert_eq!(modes.values.len(), 2);
        let levels = &registry.alias_set("ALIAS2").unwrap().calibration;
        assert_eq!(levels.ranges[0].min, 0.5);

        let set = registry.range_set("RANGE1").unwrap();
        assert!(set.applies_to_calibrated());
        assert_eq!(set.ranges, vec![
            ValueRange { min: -5.0, max: 5.0 },
            ValueRange { min: 7.0, max: 7.0 }
        ]);
    }
}
