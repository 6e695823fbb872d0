//! Command Model Builder
//!
//! Reads the commanding tables of the MIB and populates the command part of
//! the [`MissionDatabase`](crate::model::MissionDatabase): packet header
//! templates, argument types, commands with their fixed areas, fixed and
//! editable arguments and repeated groups, transmission constraints and
//! verifiers.
//!
//! The telemetry model must be built first: dynamic argument defaults,
//! transmission constraints and verifiers refer to telemetry parameters and
//! containers.

use crate::calibration::CalibrationRegistry;
use crate::error::Result;
use crate::model::ArgumentTypeId;
use crate::session::Session;
use std::collections::{HashMap, HashSet};
use tracing::info;

pub mod arguments;
pub mod constraints;
pub mod definitions;
pub mod headers;
pub mod records;
pub mod verifiers;

#[cfg(test)]
mod tests;

pub use headers::{HeaderArgument, HeaderTemplate};
pub use records::{CdfRecord, CpcRecord, ElementKind, ValueSource};
pub use verifiers::{StageCheck, VerificationStage, command_echo};

/// Builder of the command model
#[derive(Debug, Default)]
pub struct CommandBuilder {
    pub(crate) calibrations: CalibrationRegistry,
    /// Packet header templates (`TCP`), by name
    pub(crate) headers: HashMap<String, HeaderTemplate>,
    /// Header arguments (`PCPC`), by name
    pub(crate) header_arguments: HashMap<String, HeaderArgument>,
    /// Command parameters (`CPC`), by name
    pub(crate) parameters: HashMap<String, CpcRecord>,
    /// Elements of each command, sorted by bit position
    pub(crate) elements: HashMap<String, Vec<CdfRecord>>,
    /// Argument types by command parameter and size tag width
    pub(crate) argument_types: HashMap<(String, i32), ArgumentTypeId>,
    /// Parameter id enumerations, by PFC
    pub(crate) parameter_id_types: HashMap<i32, ArgumentTypeId>,
    /// Verification stages (`CVS`), by id
    pub(crate) stages: HashMap<String, VerificationStage>,
    /// Stages dropped because none of their expressions is supported
    pub(crate) unsupported_stages: HashSet<String>,
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the command model into the session database
    pub fn build(&mut self, session: &mut Session) -> Result<()> {
        self.load_headers(session)?;
        self.calibrations.load_commanding(session)?;
        self.load_command_parameters(session)?;
        self.load_elements(session)?;
        self.load_commands(session)?;
        constraints::load_constraints(session)?;
        self.load_verifiers(session)?;

        info!(
            "Command model: {} commands, {} argument types, {} algorithms",
            session.db.commands().len(),
            session.db.argument_types().len(),
            session.db.algorithms().len()
        );
        Ok(())
    }
}
