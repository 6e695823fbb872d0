//! Transmission constraints (`PTV`)

use super::records::ptv;
use crate::constants::tables;
use crate::error::Result;
use crate::model::{
    CommandId, Comparison, ComparisonOperator, MatchCriteria, TransmissionConstraint,
};
use crate::reader::Row;
use crate::session::Session;
use tracing::info;

/// Attach to each command the parameter values required before release
///
/// All `PTV` rows of a command form one constraint: a single comparison or
/// the conjunction of several.
pub fn load_constraints(session: &mut Session) -> Result<()> {
    let mut constrained: Vec<(CommandId, Vec<Comparison>)> = Vec::new();

    session.scan(tables::PTV, |session, row| {
        row.require(&[ptv::CNAME, ptv::PARNAM, ptv::VAL])?;
        let name = row.str(ptv::CNAME)?;
        let command = session.db.command_by_name(name).ok_or_else(|| {
            row.reference(format!("PTV references unknown command '{}'", name))
        })?;
        let parameter_name = row.str(ptv::PARNAM)?;
        let parameter = session.db.parameter_by_name(parameter_name).ok_or_else(|| {
            row.reference(format!("PTV references unknown parameter '{}'", parameter_name))
        })?;

        let comparison = Comparison {
            parameter,
            operator: ComparisonOperator::Equality,
            value: row.str(ptv::VAL)?.to_string(),
            use_calibrated: use_calibrated(row, ptv::INTER)?,
        };
        match constrained.iter_mut().find(|(id, _)| *id == command) {
            Some((_, comparisons)) => comparisons.push(comparison),
            None => constrained.push((command, vec![comparison])),
        }
        Ok(())
    })?;

    let count = constrained.len();
    for (command, comparisons) in constrained {
        if let Some(criteria) = MatchCriteria::from_list(comparisons) {
            session
                .db
                .command_mut(command)
                .transmission_constraints
                .push(TransmissionConstraint {
                    criteria,
                    timeout_ms: 0,
                });
        }
    }
    info!("Added transmission constraints to {} commands", count);
    Ok(())
}

/// Interpretation flag of a checked value: `E`ngineering or `R`aw (default)
pub(crate) fn use_calibrated(row: &Row, col: usize) -> Result<bool> {
    match row.flag_or(col, 'R') {
        'R' => Ok(false),
        'E' => Ok(true),
        other => Err(row.data(format!("invalid value interpretation '{}'", other))),
    }
}
