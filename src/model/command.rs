//! Telecommands, their arguments and verification

use super::{AlgorithmId, Alias, ArgumentTypeId, CommandId, ContainerId, EntryLocation, MatchCriteria, ParameterId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Argument {
    pub name: String,
    pub description: Option<String>,
    pub type_id: ArgumentTypeId,
    pub initial_value: Option<String>,
    /// Default taken from the current value of a telemetry parameter
    pub dynamic_default: Option<ParameterId>,
}

impl Argument {
    pub fn new(name: impl Into<String>, type_id: ArgumentTypeId) -> Self {
        Self {
            name: name.into(),
            description: None,
            type_id,
            initial_value: None,
            dynamic_default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentAssignment {
    pub argument: String,
    pub value: String,
}

impl ArgumentAssignment {
    pub fn new(argument: impl Into<String>, value: impl ToString) -> Self {
        Self {
            argument: argument.into(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CommandEntryItem {
    Argument(String),
    FixedValue {
        name: Option<String>,
        value: Vec<u8>,
        size_in_bits: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandEntry {
    pub location: EntryLocation,
    pub item: CommandEntryItem,
}

/// Binary layout of a command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandContainer {
    pub name: String,
    pub entries: Vec<CommandEntry>,
}

/// Arguments a command binds once and for all
///
/// They form the command's abstract base (named `<command>_abstract`): the
/// arguments are declared there and fixed by the assignments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixedArgumentSet {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub assignments: Vec<ArgumentAssignment>,
}

/// Time window relative to command release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckWindow {
    pub start_ms: i64,
    pub stop_ms: i64,
}

/// Where the echoed request id of a command lives in its binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandEcho {
    /// Argument holding the APID, when one was found in the header
    pub apid_argument: Option<String>,
    pub seqcount_bit_offset: u32,
    pub seqcount_bits: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VerifierCheck {
    /// A packet of the container is received
    Container(ContainerId),
    /// An algorithm matching acknowledgement reports returns true
    Algorithm {
        algorithm: AlgorithmId,
        echo: CommandEcho,
    },
    /// Telemetry parameters reach the expected values
    Parameter(MatchCriteria),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verifier {
    pub stage: String,
    pub window: CheckWindow,
    pub check: VerifierCheck,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransmissionConstraint {
    pub criteria: MatchCriteria,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaCommand {
    pub name: String,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub is_abstract: bool,
    /// Packet header template this command extends
    pub base: Option<CommandId>,
    pub fixed: Option<FixedArgumentSet>,
    pub arguments: Vec<Argument>,
    pub assignments: Vec<ArgumentAssignment>,
    pub container: CommandContainer,
    pub critical: bool,
    pub transmission_constraints: Vec<TransmissionConstraint>,
    pub verifiers: Vec<Verifier>,
    pub aliases: Vec<Alias>,
}

impl MetaCommand {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            container: CommandContainer {
                name: name.clone(),
                entries: Vec::new(),
            },
            name,
            description: None,
            long_description: None,
            is_abstract: false,
            base: None,
            fixed: None,
            arguments: Vec::new(),
            assignments: Vec::new(),
            critical: false,
            transmission_constraints: Vec::new(),
            verifiers: Vec::new(),
            aliases: Vec::new(),
        }
    }

    /// Argument declared by this command or its fixed set
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments
            .iter()
            .chain(self.fixed.iter().flat_map(|f| f.arguments.iter()))
            .find(|a| a.name == name)
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.argument(name).is_some()
    }

    /// Value bound to an argument by an assignment, if any
    pub fn assignment(&self, argument: &str) -> Option<&str> {
        self.assignments
            .iter()
            .chain(self.fixed.iter().flat_map(|f| f.assignments.iter()))
            .find(|a| a.argument == argument)
            .map(|a| a.value.as_str())
    }
}
