//! Telemetry Model Builder
//!
//! Reads the monitoring tables of the MIB and populates the telemetry part of
//! the [`MissionDatabase`](crate::model::MissionDatabase): parameter types and
//! parameters, synthetic parameter algorithms, the packet container
//! hierarchy, fixed and variable packet layouts and limit checks.
//!
//! Tables are consumed in dependency order: calibrations before parameters,
//! parameters before packets, packets before their layouts, and limits last
//! since they clone the final parameter types.

use crate::calibration::CalibrationRegistry;
use crate::error::Result;
use crate::model::ContainerId;
use crate::session::Session;
use crate::synthetic::FormulaCompiler;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

pub mod layout;
pub mod limits;
pub mod packets;
pub mod parameters;
pub mod records;
pub mod types;
pub mod variable;

#[cfg(test)]
mod tests;

pub use records::{OcpRecord, PcfRecord, PicRecord, PidRecord, VpdRecord};
pub use types::{TypeCache, TypeKey};

/// Builder of the telemetry model
///
/// The builder owns the intermediate state shared between tables (records
/// indexed by name or SPID, the type cache); the model itself lives in the
/// [`Session`].
#[derive(Default)]
pub struct TelemetryBuilder {
    pub(crate) calibrations: CalibrationRegistry,
    pub(crate) types: TypeCache,
    /// PCF records that produced a parameter, by name
    pub(crate) records: HashMap<String, PcfRecord>,
    /// Deduced (PTC 11) parameters, by name
    pub(crate) deduced: HashMap<String, PcfRecord>,
    /// Saved synthetic (PTC 13) parameters
    pub(crate) saved_synthetic: HashSet<String>,
    /// Synthetic parameters in declaration order
    pub(crate) synthetic: Vec<String>,
    pub(crate) identifications: Vec<PicRecord>,
    /// Valid PID records in declaration order
    pub(crate) packets: Vec<PidRecord>,
    /// TPCF names and sizes, by SPID
    pub(crate) packet_names: HashMap<i64, (Option<String>, Option<i64>)>,
    /// Container built for each SPID
    pub(crate) spid_containers: HashMap<i64, ContainerId>,
    /// Counter of nested VPD group containers
    pub(crate) nested_groups: usize,
    formula_compiler: Option<Arc<dyn FormulaCompiler>>,
}

impl TelemetryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formula_compiler(mut self, compiler: Option<Arc<dyn FormulaCompiler>>) -> Self {
        self.formula_compiler = compiler;
        self
    }

    /// Build the telemetry model into the session database
    pub fn build(&mut self, session: &mut Session) -> Result<()> {
        self.calibrations.load_telemetry(session)?;

        self.load_parameters(session)?;
        self.compile_synthetic(session)?;
        self.attach_context_calibrators(session)?;

        self.load_packets(session)?;
        self.load_fixed_layout(session)?;
        self.load_variable_layout(session)?;
        self.load_limits(session)?;

        info!(
            "Telemetry model: {} parameters, {} types, {} containers",
            session.db.parameters().len(),
            session.db.parameter_types().len(),
            session.db.containers().len()
        );
        Ok(())
    }
}
