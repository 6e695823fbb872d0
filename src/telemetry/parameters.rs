//! Parameters (`PCF`), synthetic parameter algorithms and context calibrations

use super::TelemetryBuilder;
use super::records::PcfRecord;
use crate::calibration::{CalibrationDefinition, ContextCalibrator};
use crate::constants::{NAMESPACE_OBPID, SYNTHETIC_DIR_NAME, tables};
use crate::error::{Location, MibError, Result};
use crate::model::{
    Algorithm, AlgorithmInput, AlgorithmKind, Comparison, DataSource, Parameter,
};
use crate::reader::decode_line;
use crate::session::Session;
use crate::synthetic::FormulaCompiler;
use std::fs;
use tracing::{debug, info};

impl TelemetryBuilder {
    pub(crate) fn load_parameters(&mut self, session: &mut Session) -> Result<()> {
        let default_vplb = session.config().tm.vbl_param_length_bytes;
        session.scan(tables::PCF, |session, row| {
            let record = PcfRecord::from_row(row, default_vplb)?;
            self.declare_parameter(session, record)
        })?;

        info!(
            "Loaded {} parameters ({} deduced, {} saved synthetic) using {} shared types",
            self.records.len(),
            self.deduced.len(),
            self.saved_synthetic.len(),
            self.types.len()
        );
        Ok(())
    }

    fn declare_parameter(&mut self, session: &mut Session, record: PcfRecord) -> Result<()> {
        let name = record.name.clone();
        if self.records.contains_key(&name)
            || self.deduced.contains_key(&name)
            || self.saved_synthetic.contains(&name)
        {
            return Err(MibError::data(
                &record.location,
                format!("duplicate parameter '{}'", name),
            ));
        }

        match record.ptc {
            13 => {
                debug!("Ignoring saved synthetic parameter {}", name);
                self.saved_synthetic.insert(name);
                return Ok(());
            }
            11 => {
                if record.related.is_none() {
                    return Err(MibError::data(
                        &record.location,
                        format!("deduced parameter '{}' has no PCF_RELATED", name),
                    ));
                }
                self.deduced.insert(name, record);
                return Ok(());
            }
            _ => {}
        }

        let type_id = self.parameter_type_for(session, &record)?;
        let mut parameter = Parameter::new(&name, type_id);
        parameter.description = record.description.clone();
        parameter.data_source = match record.natur {
            'R' => DataSource::Telemetered,
            'C' => DataSource::Constant,
            _ => DataSource::Derived,
        };

        let id = session
            .db
            .add_parameter(parameter)
            .map_err(|e| MibError::data(&record.location, e.to_string()))?;
        if let Some(pid) = record.pid {
            session
                .db
                .add_parameter_alias(id, NAMESPACE_OBPID, &pid.to_string());
        }
        if record.is_synthetic() {
            self.synthetic.push(name.clone());
        }
        self.records.insert(name, record);
        Ok(())
    }

    /// Turn the formula of every synthetic parameter into an algorithm
    pub(crate) fn compile_synthetic(&mut self, session: &mut Session) -> Result<()> {
        if self.synthetic.is_empty() {
            return Ok(());
        }
        let Some(compiler) = self.formula_compiler.clone() else {
            session.limitation(format!(
                "no formula compiler registered, {} synthetic parameters have no algorithm",
                self.synthetic.len()
            ));
            return Ok(());
        };

        for name in &self.synthetic {
            let Some(record) = self.records.get(name) else {
                continue;
            };
            let outcome = synthetic_algorithm(session, compiler.as_ref(), name, &record.location);
            session.recover(outcome)?;
        }
        Ok(())
    }

    /// Attach the `CUR` calibrators to the types of their parameters
    pub(crate) fn attach_context_calibrators(&mut self, session: &mut Session) -> Result<()> {
        let mut names: Vec<&String> = self.calibrations.contexts.keys().collect();
        names.sort();

        for name in names {
            let outcome = self.context_calibrators(session, name);
            session.recover(outcome)?;
        }
        Ok(())
    }

    fn context_calibrators(&self, session: &mut Session, name: &str) -> Result<()> {
        let records = self.calibrations.context_records(name);
        let Some(first) = records.first() else {
            return Ok(());
        };
        if self.records.get(name).is_some_and(|r| r.categ != 'N') {
            return Ok(());
        }
        let parameter = session.db.parameter_by_name(name).ok_or_else(|| {
            MibError::reference(
                &first.location,
                format!("CUR references unknown parameter '{}'", name),
            )
        })?;

        let mut calibrators = Vec::with_capacity(records.len());
        for record in records {
            let reference = session.db.parameter_by_name(&record.reference).ok_or_else(|| {
                MibError::reference(
                    &record.location,
                    format!("unknown context parameter '{}'", record.reference),
                )
            })?;
            let calibrator = self.calibrations.numeric(&record.select).ok_or_else(|| {
                MibError::reference(
                    &record.location,
                    format!("unknown numeric calibration '{}'", record.select),
                )
            })?;
            calibrators.push(ContextCalibrator {
                context: Comparison::raw_equals(reference, record.value),
                calibrator,
            });
        }

        let type_id = session.db.parameter(parameter).type_id;
        session
            .db
            .parameter_type_mut(type_id)
            .apply_calibration(CalibrationDefinition::ContextSelected(calibrators));
        Ok(())
    }
}

fn synthetic_algorithm(
    session: &mut Session,
    compiler: &dyn FormulaCompiler,
    name: &str,
    location: &Location,
) -> Result<()> {
    let path = session.config().path.join(SYNTHETIC_DIR_NAME).join(name);
    let source = fs::read(&path)
        .map(|bytes| decode_line(&bytes))
        .map_err(|e| {
            MibError::reference(
                location,
                format!("cannot read synthetic definition {}: {}", path.display(), e),
            )
        })?;
    let synthetic_error = |message: String| MibError::Synthetic {
        parameter: name.to_string(),
        message,
    };

    debug!("Compiling synthetic parameter {}", name);
    let formula = compiler
        .compile(name, &source, &session.db)
        .map_err(|e| synthetic_error(e.to_string()))?;
    let output = session
        .db
        .parameter_by_name(name)
        .ok_or_else(|| synthetic_error("output parameter not found".to_string()))?;

    let mut algorithm = Algorithm::new(name, AlgorithmKind::Synthetic);
    for input in &formula.inputs {
        let parameter = session
            .db
            .parameter_by_name(&input.parameter)
            .ok_or_else(|| synthetic_error(format!("unknown input parameter '{}'", input.parameter)))?;
        algorithm.inputs.push(AlgorithmInput {
            parameter,
            input_name: Some(input.parameter.clone()),
            mandatory: true,
        });
        if input.trigger {
            algorithm.triggers.push(parameter);
        }
    }
    algorithm.outputs.push(output);
    algorithm.source = Some(source);
    algorithm.evaluator = Some(formula.evaluator);

    session
        .db
        .add_algorithm(algorithm)
        .map_err(|e| synthetic_error(e.to_string()))?;
    Ok(())
}
