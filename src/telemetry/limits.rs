//! Monitoring checks (`OCF`, `OCP`)
//!
//! Limits are attached to a copy of the parameter's type, so that parameters
//! sharing a type do not share alarms.

use super::TelemetryBuilder;
use super::records::{OcpRecord, ocf, ocp};
use crate::constants::tables;
use crate::error::{MibError, Result};
use crate::model::{
    AlarmLevel, AlarmRange, Comparison, EngType, EnumerationAlarmItem, ParameterId, ParameterType,
};
use crate::reader::Row;
use crate::session::Session;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// How OCP limit values are to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LimitCoding {
    /// Raw values of an enumerated parameter, mapped to labels
    RawLabels,
    /// Enumeration labels
    Labels,
    Numeric,
}

impl TelemetryBuilder {
    pub(crate) fn load_limits(&mut self, session: &mut Session) -> Result<()> {
        let mut checks: HashMap<String, Vec<OcpRecord>> = HashMap::new();
        session.scan(tables::OCP, |_, row| {
            let record = OcpRecord::from_row(row)?;
            checks
                .entry(row.str(ocp::NAME)?.to_string())
                .or_default()
                .push(record);
            Ok(())
        })?;
        for records in checks.values_mut() {
            records.sort_by_key(|r| r.position);
        }

        let mut alarmed = 0;
        session.scan(tables::OCF, |session, row| {
            if self.apply_limits(session, row, &checks)? {
                alarmed += 1;
            }
            Ok(())
        })?;

        info!("Attached limits to {} parameters", alarmed);
        Ok(())
    }

    /// Attach the checks of one OCF record; false when nothing was attached
    fn apply_limits(
        &self,
        session: &mut Session,
        row: &Row,
        checks: &HashMap<String, Vec<OcpRecord>>,
    ) -> Result<bool> {
        row.require(&[ocf::NAME, ocf::NBCHCK, ocf::NBOOL, ocf::INTER, ocf::CODIN])?;
        let name = row.str(ocf::NAME)?;
        let min_violations = row.int(ocf::NBCHCK)?;
        let nbool = row.int(ocf::NBOOL)?;
        let inter = row.flag_or(ocf::INTER, 'U');
        let codin = row.flag_or(ocf::CODIN, 'R');

        let parameter = session
            .db
            .parameter_by_name(name)
            .ok_or_else(|| row.reference(format!("OCF references unknown parameter '{}'", name)))?;
        if nbool == 1 && self.records.get(name).is_some_and(|r| r.uscon) {
            session.limitation(format!(
                "{}: status consistency check of '{}' is not supported",
                row.location(),
                name
            ));
            return Ok(false);
        }
        let records = checks
            .get(name)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| row.reference(format!("no OCP checks for parameter '{}'", name)))?;

        let ptype = session.db.type_of(parameter).clone();
        let coding = match (codin, &ptype.eng) {
            ('R' | 'I', EngType::Enumerated(_)) if inter == 'U' => LimitCoding::RawLabels,
            ('R' | 'I', EngType::Boolean) => {
                session.limitation(format!(
                    "{}: limits on boolean parameter '{}' are not supported",
                    row.location(),
                    name
                ));
                return Ok(false);
            }
            ('R' | 'I', eng) if eng.is_numeric() => LimitCoding::Numeric,
            ('A', EngType::Enumerated(_)) => LimitCoding::Labels,
            _ => {
                return Err(row.data(format!(
                    "OCF_CODIN '{}' does not apply to the type of '{}'",
                    codin, name
                )));
            }
        };

        let min_violations = u32::try_from(min_violations.max(1)).unwrap_or(u32::MAX);
        let alarmed = alarmed_type(session, &ptype, |session, alarmed| {
            for check in records {
                if !check.is_supported() {
                    session.limitation(format!(
                        "{}: limit check type '{}' is not supported",
                        check.location, check.kind
                    ));
                    continue;
                }
                let context = check_context(session, check)?;
                let level = if check.is_soft() {
                    AlarmLevel::Warning
                } else {
                    AlarmLevel::Critical
                };
                match coding {
                    LimitCoding::Numeric => {
                        let range = AlarmRange {
                            low: limit_value(check, check.low.as_deref())?,
                            high: limit_value(check, check.high.as_deref())?,
                            level,
                        };
                        let alarm = alarmed.numeric_alarm_mut(context.as_ref()).ok_or_else(|| {
                            MibError::data(&check.location, "numeric limit on an enumeration alarm")
                        })?;
                        alarm.min_violations = min_violations;
                        alarm.ranges.push(range);
                    }
                    LimitCoding::RawLabels | LimitCoding::Labels => {
                        let Some(label) = enumeration_label(alarmed, check, coding)? else {
                            warn!(
                                "{}: limit value {:?} has no label, skipped",
                                check.location, check.low
                            );
                            continue;
                        };
                        let added = alarmed.add_enumeration_alarm(EnumerationAlarmItem {
                            context,
                            label,
                            level,
                        });
                        if !added {
                            return Err(MibError::data(
                                &check.location,
                                "enumeration limit on a numeric alarm",
                            ));
                        }
                    }
                }
            }
            Ok(())
        })?;

        attach_type(session, parameter, alarmed, row)?;
        debug!("{}: limits attached to {}", row.location(), name);
        Ok(true)
    }
}

/// Copy of `ptype` under a parameter-specific name, filled by `fill`
fn alarmed_type<F>(session: &mut Session, ptype: &ParameterType, fill: F) -> Result<ParameterType>
where
    F: FnOnce(&mut Session, &mut ParameterType) -> Result<()>,
{
    let mut alarmed = ptype.clone();
    alarmed.name = session.db.unique_type_name(&ptype.name);
    fill(session, &mut alarmed)?;
    Ok(alarmed)
}

fn attach_type(
    session: &mut Session,
    parameter: ParameterId,
    ptype: ParameterType,
    row: &Row,
) -> Result<()> {
    let type_id = session
        .db
        .add_parameter_type(ptype)
        .map_err(|e| row.data(e.to_string()))?;
    session.db.parameter_mut(parameter).type_id = type_id;
    Ok(())
}

/// Condition under which a check applies: RLCHK raw value equals VALPAR
fn check_context(session: &Session, check: &OcpRecord) -> Result<Option<Comparison>> {
    let Some(rlchk) = &check.rlchk else {
        return Ok(None);
    };
    let parameter = session.db.parameter_by_name(rlchk).ok_or_else(|| {
        MibError::reference(
            &check.location,
            format!("unknown limit context parameter '{}'", rlchk),
        )
    })?;
    Ok(Some(Comparison::raw_equals(parameter, check.valpar)))
}

fn limit_value(check: &OcpRecord, value: Option<&str>) -> Result<Option<f64>> {
    value
        .map(|v| {
            v.trim().parse::<f64>().map_err(|_| {
                MibError::data(&check.location, format!("invalid limit value '{}'", v))
            })
        })
        .transpose()
}

fn enumeration_label(
    ptype: &ParameterType,
    check: &OcpRecord,
    coding: LimitCoding,
) -> Result<Option<String>> {
    let Some(value) = check.low.as_deref() else {
        return Err(MibError::data(&check.location, "limit check without OCP_LVALU"));
    };
    if coding == LimitCoding::Labels {
        return Ok(Some(value.to_string()));
    }
    let raw = value.trim().parse::<f64>().map_err(|_| {
        MibError::data(&check.location, format!("invalid raw limit value '{}'", value))
    })?;
    Ok(ptype
        .eng
        .enumeration()
        .and_then(|e| e.label_for(raw))
        .map(str::to_string))
}
