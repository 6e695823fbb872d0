//! Command parameters (`CPC`) and argument types
//!
//! The type of an argument follows the category of its command parameter:
//! decalibrated numbers (`C`), enumerations from alias sets (`T`), natural
//! types (`N`), parameter identifiers (`P`) and raw binary (`A`).

use super::CommandBuilder;
use super::records::{CdfRecord, CpcRecord};
use crate::calibration::{NumericCalibrator, SplinePoint, TextCalibration};
use crate::constants::{NAMESPACE_OBPID, PARAMETER_ID_TYPE_PREFIX, TIME_SCALE_MS, tables};
use crate::encoding::{self, EncodingDescriptor};
use crate::error::{MibError, Result, TypeError};
use crate::model::{AggregateMember, ArgumentType, ArgumentTypeId, EngType};
use crate::session::Session;
use std::collections::BTreeMap;
use tracing::{debug, info};

impl CommandBuilder {
    pub(crate) fn load_command_parameters(&mut self, session: &mut Session) -> Result<()> {
        session.scan(tables::CPC, |_, row| {
            let record = CpcRecord::from_row(row)?;
            if self.parameters.contains_key(&record.name) {
                return Err(row.data(format!("duplicate command parameter '{}'", record.name)));
            }
            self.parameters.insert(record.name.clone(), record);
            Ok(())
        })?;

        info!("Loaded {} command parameters", self.parameters.len());
        Ok(())
    }

    /// Type of the argument placed by `element`, created on first use
    pub(crate) fn argument_type_for(
        &mut self,
        session: &mut Session,
        parameter: &CpcRecord,
        element: &CdfRecord,
    ) -> Result<ArgumentTypeId> {
        if parameter.categ == 'P' {
            return self.parameter_id_type(session, parameter, element.vplb);
        }
        let key = (parameter.name.clone(), element.vplb);
        if let Some(id) = self.argument_types.get(&key) {
            return Ok(*id);
        }

        let atype = self.build_argument_type(session, parameter, element.vplb)?;
        debug!("Created argument type {}", atype.name);
        let id = session.db.add_argument_type(atype);
        self.argument_types.insert(key, id);
        Ok(id)
    }

    fn build_argument_type(
        &self,
        session: &Session,
        parameter: &CpcRecord,
        vplb: i32,
    ) -> Result<ArgumentType> {
        let data_error = |message: String| MibError::data(&parameter.location, message);

        if parameter.ptc == 12 {
            if parameter.categ != 'N' {
                return Err(data_error(format!(
                    "embedded packet argument '{}' cannot have CPC_CATEG '{}'",
                    parameter.name, parameter.categ
                )));
            }
            let members = AggregateMember::packet_header(parameter.pfc).ok_or_else(|| {
                MibError::type_error(
                    &parameter.location,
                    TypeError::InvalidCombination {
                        ptc: parameter.ptc,
                        pfc: parameter.pfc,
                        reason: "embedded packets are TM (PFC 0) or TC (PFC 1)".to_string(),
                    },
                )
            })?;
            return Ok(ArgumentType::new(&parameter.name, EngType::Aggregate { members }));
        }

        let encoding = resolve(parameter, vplb)?;
        let mut atype = match parameter.categ {
            'C' => self.decalibrated_type(parameter, encoding)?,
            'T' => self.enumerated_type(parameter, encoding)?,
            'N' => {
                let eng = natural_type(session, parameter, &encoding)?;
                let encoding = if parameter.ptc == 9 {
                    encoding::with_reference_clock(encoding, session.epoch().reference_fine_bytes())
                } else {
                    encoding
                };
                ArgumentType::new(&parameter.name, eng).with_encoding(encoding)
            }
            'A' => ArgumentType::new(&parameter.name, EngType::Binary).with_encoding(encoding),
            other => {
                return Err(data_error(format!(
                    "argument '{}' has unsupported CPC_CATEG '{}'",
                    parameter.name, other
                )));
            }
        };

        atype.unit = parameter.unit.clone();
        if let Some(reference) = &parameter.prfref {
            let ranges = self.calibrations.range_set(reference).ok_or_else(|| {
                MibError::reference(
                    &parameter.location,
                    format!("unknown range set '{}'", reference),
                )
            })?;
            atype.valid_ranges = ranges.ranges.clone();
            atype.ranges_calibrated = ranges.applies_to_calibrated();
        }
        Ok(atype)
    }

    /// Number mapped to raw values by a `CCA` curve
    fn decalibrated_type(
        &self,
        parameter: &CpcRecord,
        encoding: EncodingDescriptor,
    ) -> Result<ArgumentType> {
        let reference = parameter.ccaref.as_deref().ok_or_else(|| {
            MibError::data(
                &parameter.location,
                format!("calibrated argument '{}' has no CPC_CCAREF", parameter.name),
            )
        })?;
        let curve = self.calibrations.decalibration(reference).ok_or_else(|| {
            MibError::reference(
                &parameter.location,
                format!("unknown decalibration curve '{}'", reference),
            )
        })?;
        if !encoding.is_numeric() {
            return Err(MibError::data(
                &parameter.location,
                format!("calibrated argument '{}' needs a numeric encoding", parameter.name),
            ));
        }

        let eng = match curve.engfmt {
            'I' => EngType::Integer {
                signed: true,
                size_in_bits: 64,
            },
            'U' => EngType::Integer {
                signed: false,
                size_in_bits: 64,
            },
            _ => EngType::Float { size_in_bits: 64 },
        };
        // The decalibrator reads engineering values and yields raw ones
        let points = curve
            .points
            .iter()
            .map(|p| SplinePoint {
                raw: p.calibrated,
                calibrated: p.raw,
            })
            .collect();
        let mut atype = ArgumentType::new(&parameter.name, eng).with_encoding(encoding);
        atype.decalibrator = Some(NumericCalibrator::spline(points, curve.extrapolate));
        Ok(atype)
    }

    /// Enumeration built from a `PAF` alias set
    ///
    /// Integer encodings take the point values of the set, float encodings
    /// its (degenerate) ranges.
    fn enumerated_type(
        &self,
        parameter: &CpcRecord,
        encoding: EncodingDescriptor,
    ) -> Result<ArgumentType> {
        let data_error = |message: String| MibError::data(&parameter.location, message);
        let reference = parameter.pafref.as_deref().ok_or_else(|| {
            data_error(format!("textual argument '{}' has no CPC_PAFREF", parameter.name))
        })?;
        let aliases = self.calibrations.alias_set(reference).ok_or_else(|| {
            MibError::reference(&parameter.location, format!("unknown alias set '{}'", reference))
        })?;

        let consistent = if encoding.is_integer() {
            matches!(aliases.rawfmt, 'U' | 'I')
        } else if encoding.is_float() {
            aliases.rawfmt == 'R'
        } else {
            return Err(data_error(format!(
                "textual argument '{}' needs a numeric encoding",
                parameter.name
            )));
        };
        if !consistent {
            return Err(data_error(format!(
                "alias set '{}' with raw format '{}' does not match the encoding of '{}'",
                reference, aliases.rawfmt, parameter.name
            )));
        }

        Ok(ArgumentType::new(&parameter.name, EngType::Enumerated(aliases.calibration.clone()))
            .with_encoding(encoding))
    }

    /// Enumeration of every parameter with an on-board id, shared per PFC
    fn parameter_id_type(
        &mut self,
        session: &mut Session,
        parameter: &CpcRecord,
        vplb: i32,
    ) -> Result<ArgumentTypeId> {
        if parameter.ptc != 3 {
            return Err(MibError::data(
                &parameter.location,
                format!(
                    "parameter id argument '{}' must have PTC 3, not {}",
                    parameter.name, parameter.ptc
                ),
            ));
        }
        if let Some(id) = self.parameter_id_types.get(&parameter.pfc) {
            return Ok(*id);
        }

        // Parameters are in declaration order: the last owner of an id wins
        let mut owners = BTreeMap::new();
        for declared in session.db.parameters() {
            for alias in declared.aliases.iter().filter(|a| a.namespace == NAMESPACE_OBPID) {
                if let Ok(pid) = alias.name.parse::<i64>() {
                    owners.insert(pid, declared.name.clone());
                }
            }
        }
        let mut enumeration = TextCalibration::default();
        for (pid, name) in owners {
            enumeration.add_value(pid, name);
        }

        let name = format!("{}{}", PARAMETER_ID_TYPE_PREFIX, parameter.pfc);
        let atype = ArgumentType::new(name, EngType::Enumerated(enumeration))
            .with_encoding(resolve(parameter, vplb)?);
        let id = session.db.add_argument_type(atype);
        self.parameter_id_types.insert(parameter.pfc, id);
        Ok(id)
    }
}

/// Engineering type of an uncalibrated argument
fn natural_type(
    session: &Session,
    parameter: &CpcRecord,
    encoding: &EncodingDescriptor,
) -> Result<EngType> {
    let eng = match parameter.ptc {
        1 => EngType::Boolean,
        2..=5 => EngType::natural(encoding).ok_or_else(|| {
            MibError::data(
                &parameter.location,
                format!("no natural type for {:?}", encoding),
            )
        })?,
        6 | 7 => EngType::Binary,
        8 => EngType::String,
        9 => EngType::AbsoluteTime {
            epoch: session.epoch().clone(),
            scale: TIME_SCALE_MS,
        },
        10 => EngType::RelativeTime {
            scale: TIME_SCALE_MS,
        },
        _ => {
            return Err(MibError::type_error(
                &parameter.location,
                TypeError::UnknownType {
                    ptc: parameter.ptc,
                    pfc: parameter.pfc,
                },
            ));
        }
    };
    Ok(eng)
}

fn resolve(parameter: &CpcRecord, vplb: i32) -> Result<EncodingDescriptor> {
    encoding::resolve(parameter.ptc, parameter.pfc, vplb)
        .map_err(|e| MibError::type_error(&parameter.location, e))
}
