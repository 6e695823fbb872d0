//! Command verification (`CVE`, `CVS`, `CVP`)
//!
//! A verification stage (`CVS`) checks either PUS(1,x) acknowledgement
//! reports (source `R`) or expected telemetry values (source `V`, built from
//! the `CVE` expressions of the stage). `CVP` attaches stages to commands.

use super::CommandBuilder;
use super::constraints::use_calibrated;
use super::records::{cve, cvp, cvs};
use crate::constants::{PUS_VERIFIER_PREFIX, layout, tables};
use crate::error::{MibError, Result};
use crate::model::{
    Algorithm, AlgorithmId, AlgorithmInput, AlgorithmKind, CheckWindow, CommandEcho,
    CommandEntryItem, CommandId, Comparison, ComparisonOperator, EntryLocation, MatchCriteria,
    MissionDatabase, Verifier, VerifierCheck,
};
use crate::reader::Row;
use crate::session::Session;
use crate::telemetry::packets::pus1_parameters;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// What a verification stage waits for
#[derive(Debug, Clone, PartialEq)]
pub enum StageCheck {
    /// PUS(1,x) report matched by a shared acknowledgement algorithm
    Acknowledgement(AlgorithmId),
    Parameters(MatchCriteria),
}

/// A verification stage (`CVS`)
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationStage {
    /// Acceptance, Start, Completion or Progress_<type>
    pub stage: String,
    pub window: CheckWindow,
    pub check: StageCheck,
}

impl CommandBuilder {
    pub(crate) fn load_verifiers(&mut self, session: &mut Session) -> Result<()> {
        let (criteria, unsupported) = load_expressions(session)?;

        session.scan(tables::CVS, |session, row| {
            row.require(&[cvs::ID, cvs::TYPE, cvs::SOURCE, cvs::START, cvs::INTERVAL])?;
            let id = row.str(cvs::ID)?;
            if self.stages.contains_key(id) {
                return Err(row.data(format!("duplicate verification stage '{}'", id)));
            }
            let (stage, stage_code) = stage_name(row.flag_or(cvs::TYPE, ' '));
            let window = check_window(session, row)?;

            let check = match row.flag_or(cvs::SOURCE, ' ') {
                'R' => StageCheck::Acknowledgement(acknowledgement_algorithm(
                    session, &stage, stage_code,
                )?),
                'V' => match criteria.get(id) {
                    Some(comparisons) => match MatchCriteria::from_list(comparisons.clone()) {
                        Some(criteria) => StageCheck::Parameters(criteria),
                        None => return Err(row.data(format!("stage '{}' checks nothing", id))),
                    },
                    None if unsupported.contains(id) => {
                        debug!("{}: stage {} has no supported expression", row.location(), id);
                        self.unsupported_stages.insert(id.to_string());
                        return Ok(());
                    }
                    None => {
                        return Err(row.reference(format!(
                            "no CVE expression for verification stage '{}'",
                            id
                        )));
                    }
                },
                other => return Err(row.data(format!("invalid CVS_SOURCE '{}'", other))),
            };
            self.stages.insert(
                id.to_string(),
                VerificationStage {
                    stage,
                    window,
                    check,
                },
            );
            Ok(())
        })?;

        let mut attached = 0;
        session.scan(tables::CVP, |session, row| {
            row.require(&[cvp::TASK, cvp::CVSID])?;
            let task = row.str(cvp::TASK)?;
            if row.flag_or(cvp::TYPE, 'C') != 'C' {
                debug!("{}: skipping verification of sequence {}", row.location(), task);
                return Ok(());
            }
            let command = session.db.command_by_name(task).ok_or_else(|| {
                row.reference(format!("CVP references unknown command '{}'", task))
            })?;
            let id = row.str(cvp::CVSID)?;
            let Some(stage) = self.stages.get(id) else {
                if self.unsupported_stages.contains(id) {
                    debug!("{}: stage {} of {} is not supported", row.location(), id, task);
                    return Ok(());
                }
                return Err(row.reference(format!(
                    "CVP references unknown verification stage '{}'",
                    id
                )));
            };

            let check = match &stage.check {
                StageCheck::Acknowledgement(algorithm) => VerifierCheck::Algorithm {
                    algorithm: *algorithm,
                    echo: command_echo(&session.db, command),
                },
                StageCheck::Parameters(criteria) => VerifierCheck::Parameter(criteria.clone()),
            };
            session.db.command_mut(command).verifiers.push(Verifier {
                stage: stage.stage.clone(),
                window: stage.window,
                check,
            });
            attached += 1;
            Ok(())
        })?;

        info!(
            "Loaded {} verification stages, attached {} verifiers",
            self.stages.len(),
            attached
        );
        Ok(())
    }
}

/// Comparisons of each stage, and the stages with unsupported expressions
fn load_expressions(
    session: &mut Session,
) -> Result<(HashMap<String, Vec<Comparison>>, HashSet<String>)> {
    let mut criteria: HashMap<String, Vec<Comparison>> = HashMap::new();
    let mut unsupported = HashSet::new();

    session.scan(tables::CVE, |session, row| {
        row.require(&[cve::CVSID, cve::PARNAM])?;
        let id = row.str(cve::CVSID)?;
        let name = row.str(cve::PARNAM)?;
        let parameter = session.db.parameter_by_name(name).ok_or_else(|| {
            row.reference(format!("CVE references unknown parameter '{}'", name))
        })?;

        if row.flag_or(cve::CHECK, 'B') == 'S' {
            session.limitation(format!(
                "{}: status consistency check of stage {} is not supported",
                row.location(),
                id
            ));
            unsupported.insert(id.to_string());
            return Ok(());
        }
        if row.flag_or(cve::INTER, 'R') == 'C' {
            session.limitation(format!(
                "{}: tolerance relative to a command parameter in stage {} is not supported",
                row.location(),
                id
            ));
            unsupported.insert(id.to_string());
            return Ok(());
        }

        row.require(&[cve::VAL])?;
        let use_calibrated = use_calibrated(row, cve::INTER)?;
        let value = row.str(cve::VAL)?;
        let comparisons = match row.opt_float(cve::TOL)? {
            Some(tolerance) if tolerance != 0.0 => {
                let ptype = session.db.type_of(parameter);
                let numeric = if use_calibrated {
                    ptype.eng.is_numeric()
                } else {
                    ptype.encoding.as_ref().is_some_and(|e| e.is_numeric())
                };
                if !numeric {
                    return Err(row.data(format!(
                        "tolerance on non-numeric parameter '{}'",
                        name
                    )));
                }
                let expected = row.float(cve::VAL)?;
                let bound = |operator, value: f64| Comparison {
                    parameter,
                    operator,
                    value: value.to_string(),
                    use_calibrated,
                };
                vec![
                    bound(ComparisonOperator::LargerOrEqual, expected - tolerance),
                    bound(ComparisonOperator::SmallerOrEqual, expected + tolerance),
                ]
            }
            _ => vec![Comparison {
                parameter,
                operator: ComparisonOperator::Equality,
                value: value.to_string(),
                use_calibrated,
            }],
        };
        criteria.entry(id.to_string()).or_default().extend(comparisons);
        Ok(())
    })?;

    Ok((criteria, unsupported))
}

/// Stage name and PUS(1,x) report subtype of a `CVS_TYPE`
fn stage_name(kind: char) -> (String, u32) {
    match kind {
        'A' => ("Acceptance".to_string(), layout::ACCEPTANCE_REPORT),
        'S' => ("Start".to_string(), layout::START_REPORT),
        'C' => ("Completion".to_string(), layout::COMPLETION_REPORT),
        other => (format!("Progress_{}", other), layout::PROGRESS_REPORT),
    }
}

/// Window from `START` to `START + INTERVAL + UNCERTAINTY` seconds after release
fn check_window(session: &Session, row: &Row) -> Result<CheckWindow> {
    let start = row.int(cvs::START)?;
    let interval = row.int(cvs::INTERVAL)?;
    let uncertainty = row.int_or(cvs::UNCERTAINTY, session.config().tc.uncertainty_period)?;
    Ok(CheckWindow {
        start_ms: start * 1000,
        stop_ms: (start + interval + uncertainty.max(0)) * 1000,
    })
}

/// Shared algorithm matching the PUS(1,x) reports of one stage
fn acknowledgement_algorithm(
    session: &mut Session,
    stage: &str,
    stage_code: u32,
) -> Result<AlgorithmId> {
    let name = format!("{}{}", PUS_VERIFIER_PREFIX, stage);
    if let Some(id) = session.db.algorithm_by_name(&name) {
        return Ok(id);
    }

    let (apid, seqcount) = pus1_parameters(session)?;
    let mut algorithm = Algorithm::new(&name, AlgorithmKind::AcknowledgementCheck { stage_code });
    algorithm.inputs = vec![
        AlgorithmInput {
            parameter: apid,
            input_name: Some("received_apid".to_string()),
            mandatory: true,
        },
        AlgorithmInput {
            parameter: seqcount,
            input_name: Some("received_seqcount".to_string()),
            mandatory: true,
        },
    ];
    algorithm.triggers.push(seqcount);
    debug!("Created acknowledgement algorithm {}", name);
    session
        .db
        .add_algorithm(algorithm)
        .map_err(|e| MibError::structure(e.to_string()))
}

/// Locate the request id a command's acknowledgements echo
///
/// The APID argument is the one placed at bit 5 with an 11 bit encoding,
/// searched from the command up its chain of header templates.
pub fn command_echo(db: &MissionDatabase, command: CommandId) -> CommandEcho {
    let mut current = Some(command);
    let mut apid_argument = None;
    while let Some(id) = current {
        let candidate = db.command(id);
        apid_argument = candidate.container.entries.iter().find_map(|entry| {
            let EntryLocation::ContainerStart(bit) = entry.location else {
                return None;
            };
            let CommandEntryItem::Argument(name) = &entry.item else {
                return None;
            };
            let argument = candidate.argument(name)?;
            let bits = db
                .argument_type(argument.type_id)
                .encoding
                .as_ref()
                .and_then(|e| e.size_in_bits());
            (bit == i64::from(layout::APID_BIT_OFFSET) && bits == Some(layout::APID_BITS))
                .then(|| name.clone())
        });
        if apid_argument.is_some() {
            break;
        }
        current = candidate.base;
    }

    CommandEcho {
        apid_argument,
        seqcount_bit_offset: layout::SEQCOUNT_BIT_OFFSET,
        seqcount_bits: layout::SEQCOUNT_BITS,
    }
}
