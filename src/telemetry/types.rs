//! Parameter type construction and memoisation
//!
//! Parameters declared with the same type attributes share one parameter
//! type. The attributes form a [`TypeKey`]; the first parameter with a given
//! key creates the type, later ones reuse it. Parameters with context
//! calibrations always get a type of their own since the calibrators are
//! attached to the type.

use super::TelemetryBuilder;
use super::records::PcfRecord;
use crate::calibration::CalibrationDefinition;
use crate::constants::TIME_SCALE_MS;
use crate::encoding::{self, EncodingDescriptor};
use crate::error::{MibError, Result, TypeError};
use crate::model::{AggregateMember, EngType, ParameterType, ParameterTypeId};
use crate::session::Session;
use std::collections::HashMap;
use tracing::debug;

/// Attributes of a PCF record that determine its parameter type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub ptc: i32,
    pub pfc: i32,
    pub categ: char,
    pub curtx: Option<String>,
    pub inter: Option<char>,
    pub vplb: i32,
    pub unit: Option<String>,
    /// Initial value, for constant parameters only
    pub constant: Option<String>,
}

impl TypeKey {
    pub fn from_record(record: &PcfRecord) -> Self {
        Self {
            ptc: record.ptc,
            pfc: record.pfc,
            categ: record.categ,
            curtx: record.curtx.clone(),
            inter: record.inter,
            vplb: record.vplb,
            unit: record.unit.clone(),
            constant: record.constant_value().map(str::to_string),
        }
    }

    /// Name of the type created for this key
    pub fn type_name(&self) -> String {
        let mut name = format!(
            "ptcpfc_{}_{}_{}_{}_{}_{}",
            self.ptc,
            self.pfc,
            self.categ,
            self.curtx.as_deref().unwrap_or_default(),
            self.inter.map(String::from).unwrap_or_default(),
            self.vplb
        );
        if let Some(unit) = &self.unit {
            name.push('_');
            name.extend(unit.chars().filter(|c| !matches!(c, '/' | '%')).map(|c| {
                if c.is_whitespace() { '_' } else { c }
            }));
        }
        name
    }
}

/// Parameter types already created, by key
#[derive(Debug, Clone, Default)]
pub struct TypeCache {
    types: HashMap<TypeKey, ParameterTypeId>,
}

impl TypeCache {
    pub fn get(&self, key: &TypeKey) -> Option<ParameterTypeId> {
        self.types.get(key).copied()
    }

    pub fn insert(&mut self, key: TypeKey, id: ParameterTypeId) {
        self.types.insert(key, id);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TelemetryBuilder {
    /// Type of the parameter declared by `record`, created on first use
    pub(crate) fn parameter_type_for(
        &mut self,
        session: &mut Session,
        record: &PcfRecord,
    ) -> Result<ParameterTypeId> {
        let key = TypeKey::from_record(record);
        let shared = !self.calibrations.has_context(&record.name);
        if shared && let Some(id) = self.types.get(&key) {
            return Ok(id);
        }

        let mut ptype = self.build_parameter_type(session, record)?;
        let base = key.type_name();
        ptype.name = if shared && session.db.parameter_type_by_name(&base).is_none() {
            base
        } else {
            session.db.unique_type_name(&base)
        };
        debug!("Created parameter type {} for {}", ptype.name, record.name);

        let id = session
            .db
            .add_parameter_type(ptype)
            .map_err(|e| MibError::data(&record.location, e.to_string()))?;
        if shared {
            self.types.insert(key, id);
        }
        Ok(id)
    }

    fn build_parameter_type(
        &self,
        session: &mut Session,
        record: &PcfRecord,
    ) -> Result<ParameterType> {
        let mut ptype = match record.categ {
            'N' => self.numeric_type(session, record)?,
            'S' => self.textual_type(session, record)?,
            'T' => {
                if record.ptc != 8 {
                    return Err(MibError::data(
                        &record.location,
                        format!("text parameter '{}' must have PTC 8, not {}", record.name, record.ptc),
                    ));
                }
                let encoding = resolve(record)?;
                let mut ptype = ParameterType::new("", EngType::String).with_encoding(encoding);
                ptype.initial_value = record.parval.clone();
                ptype
            }
            other => {
                return Err(MibError::data(
                    &record.location,
                    format!("invalid PCF_CATEG '{}'", other),
                ));
            }
        };

        ptype.unit = record.unit.clone();
        if let Some(value) = record.constant_value() {
            ptype.initial_value = Some(value.to_string());
        }
        Ok(ptype)
    }

    fn numeric_type(&self, session: &Session, record: &PcfRecord) -> Result<ParameterType> {
        let encoding = resolve(record)?;
        let calibrated =
            record.curtx.is_some() || self.calibrations.has_context(&record.name);
        let data_error = |message: String| MibError::data(&record.location, message);

        let eng = match record.ptc {
            1 if calibrated => {
                return Err(data_error(format!(
                    "calibration of boolean parameter '{}' is not supported",
                    record.name
                )));
            }
            1 => EngType::Boolean,
            2..=5 if calibrated => return self.calibrated_type(record, encoding),
            2..=5 => EngType::natural(&encoding)
                .ok_or_else(|| data_error(format!("no natural type for {:?}", encoding)))?,
            _ if calibrated => {
                return Err(data_error(format!(
                    "calibration of PTC {} parameter '{}' is not supported",
                    record.ptc, record.name
                )));
            }
            6 | 7 => EngType::Binary,
            8 => EngType::String,
            9 => {
                let epoch = session.epoch();
                let encoding = encoding::with_reference_clock(encoding, epoch.reference_fine_bytes());
                let eng = EngType::AbsoluteTime {
                    epoch: epoch.clone(),
                    scale: TIME_SCALE_MS,
                };
                return Ok(ParameterType::new("", eng).with_encoding(encoding));
            }
            10 => EngType::RelativeTime {
                scale: TIME_SCALE_MS,
            },
            12 => {
                let members = AggregateMember::packet_header(record.pfc).ok_or_else(|| {
                    data_error(format!("unsupported embedded header PFC {}", record.pfc))
                })?;
                EngType::Aggregate { members }
            }
            _ => {
                return Err(MibError::type_error(
                    &record.location,
                    TypeError::UnknownType {
                        ptc: record.ptc,
                        pfc: record.pfc,
                    },
                ));
            }
        };
        Ok(ParameterType::new("", eng).with_encoding(encoding))
    }

    /// Numeric type whose engineering representation follows its calibration
    fn calibrated_type(
        &self,
        record: &PcfRecord,
        encoding: EncodingDescriptor,
    ) -> Result<ParameterType> {
        let reference = record.curtx.as_deref().or_else(|| {
            self.calibrations
                .context_records(&record.name)
                .first()
                .map(|c| c.select.as_str())
        });
        let eng = match reference.and_then(|name| self.calibrations.engineering_format(name)) {
            Some('I') => EngType::Integer {
                signed: true,
                size_in_bits: 64,
            },
            Some('U') => EngType::Integer {
                signed: false,
                size_in_bits: 64,
            },
            _ => EngType::Float { size_in_bits: 64 },
        };

        let mut ptype = ParameterType::new("", eng).with_encoding(encoding);
        if let Some(curtx) = &record.curtx {
            let calibrator = self.calibrations.numeric(curtx).ok_or_else(|| {
                MibError::reference(
                    &record.location,
                    format!("unknown numeric calibration '{}'", curtx),
                )
            })?;
            ptype.calibrator = Some(calibrator);
        }
        Ok(ptype)
    }

    fn textual_type(&self, session: &mut Session, record: &PcfRecord) -> Result<ParameterType> {
        let encoding = resolve(record)?;
        let fallback = || {
            let eng = EngType::natural(&encoding).unwrap_or(EngType::Integer {
                signed: false,
                size_in_bits: 32,
            });
            ParameterType::new("", eng).with_encoding(encoding)
        };

        let Some(curtx) = &record.curtx else {
            if self.calibrations.has_context(&record.name) {
                session.limitation(format!(
                    "{}: textual context calibrations are not supported, '{}' uses an integer type",
                    record.location, record.name
                ));
            } else {
                session.report(MibError::data(
                    &record.location,
                    format!("textual parameter '{}' has no PCF_CURTX", record.name),
                ))?;
            }
            return Ok(fallback());
        };

        match self.calibrations.textual(curtx) {
            Some(textual) => {
                let mut ptype = fallback();
                ptype.apply_calibration(CalibrationDefinition::TextEnumeration(
                    textual.calibration.clone(),
                ));
                Ok(ptype)
            }
            None => {
                session.report(MibError::reference(
                    &record.location,
                    format!("unknown textual calibration '{}'", curtx),
                ))?;
                Ok(fallback())
            }
        }
    }
}

fn resolve(record: &PcfRecord) -> Result<EncodingDescriptor> {
    encoding::resolve(record.ptc, record.pfc, record.vplb)
        .map_err(|e| MibError::type_error(&record.location, e))
}
