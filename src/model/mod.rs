//! Mission database populated by the compiler
//!
//! Model elements are stored in vectors and referenced by typed ids, so that
//! parameters can share one parameter type and containers, commands and
//! verifiers can point at each other without shared ownership. Name indices
//! give O(1) lookups by name and by alias.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

pub mod algorithm;
pub mod command;
pub mod container;
pub mod ids;
pub mod types;

pub use algorithm::{Algorithm, AlgorithmInput, AlgorithmKind};
pub use command::{
    Argument, ArgumentAssignment, CheckWindow, CommandContainer, CommandEcho, CommandEntry,
    CommandEntryItem, FixedArgumentSet, MetaCommand, TransmissionConstraint, Verifier,
    VerifierCheck,
};
pub use container::{
    Alias, Comparison, ComparisonOperator, ContainerEntry, EntryItem, EntryLocation,
    MatchCriteria, Repeat, RepeatCount, SequenceContainer,
};
pub use ids::{AlgorithmId, ArgumentTypeId, CommandId, ContainerId, ParameterId, ParameterTypeId};
pub use types::{
    AggregateMember, Alarm, AlarmLevel, AlarmRange, ArgumentType, EngType, EnumerationAlarmItem,
    NumericAlarm, ParameterType, RecordMember,
};

/// Name already taken by another element of the same kind
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("duplicate {kind} '{name}'")]
pub struct DuplicateName {
    pub kind: &'static str,
    pub name: String,
}

/// How a parameter obtains its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataSource {
    Telemetered,
    Derived,
    Constant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub description: Option<String>,
    pub type_id: ParameterTypeId,
    pub data_source: DataSource,
    pub aliases: Vec<Alias>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_id: ParameterTypeId) -> Self {
        Self {
            name: name.into(),
            description: None,
            type_id,
            data_source: DataSource::Telemetered,
            aliases: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct NameIndex {
    parameter_types: HashMap<String, ParameterTypeId>,
    parameters: HashMap<String, ParameterId>,
    containers: HashMap<String, ContainerId>,
    commands: HashMap<String, CommandId>,
    algorithms: HashMap<String, AlgorithmId>,
    argument_types: HashMap<String, ArgumentTypeId>,
    /// (namespace, alias) -> parameter
    parameter_aliases: HashMap<(String, String), ParameterId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MissionDatabase {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    parameter_types: Vec<ParameterType>,
    parameters: Vec<Parameter>,
    containers: Vec<SequenceContainer>,
    argument_types: Vec<ArgumentType>,
    commands: Vec<MetaCommand>,
    algorithms: Vec<Algorithm>,
    #[serde(skip)]
    index: NameIndex,
}

impl MissionDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    // Parameter types

    pub fn add_parameter_type(
        &mut self,
        ptype: ParameterType,
    ) -> Result<ParameterTypeId, DuplicateName> {
        if self.index.parameter_types.contains_key(&ptype.name) {
            return Err(DuplicateName {
                kind: "parameter type",
                name: ptype.name,
            });
        }
        let id = ParameterTypeId(self.parameter_types.len());
        self.index.parameter_types.insert(ptype.name.clone(), id);
        self.parameter_types.push(ptype);
        Ok(id)
    }

    pub fn parameter_type(&self, id: ParameterTypeId) -> &ParameterType {
        &self.parameter_types[id.0]
    }

    pub fn parameter_type_mut(&mut self, id: ParameterTypeId) -> &mut ParameterType {
        &mut self.parameter_types[id.0]
    }

    pub fn parameter_type_by_name(&self, name: &str) -> Option<ParameterTypeId> {
        self.index.parameter_types.get(name).copied()
    }

    pub fn parameter_types(&self) -> &[ParameterType] {
        &self.parameter_types
    }

    /// First name of the form `<base>_<n>` (n ≥ 1) not yet used by a type
    pub fn unique_type_name(&self, base: &str) -> String {
        (1..)
            .map(|n| format!("{}_{}", base, n))
            .find(|name| !self.index.parameter_types.contains_key(name))
            .unwrap_or_else(|| base.to_string())
    }

    // Parameters

    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<ParameterId, DuplicateName> {
        if self.index.parameters.contains_key(&parameter.name) {
            return Err(DuplicateName {
                kind: "parameter",
                name: parameter.name,
            });
        }
        let id = ParameterId(self.parameters.len());
        self.index.parameters.insert(parameter.name.clone(), id);
        for alias in &parameter.aliases {
            self.index
                .parameter_aliases
                .insert((alias.namespace.clone(), alias.name.clone()), id);
        }
        self.parameters.push(parameter);
        Ok(id)
    }

    pub fn parameter(&self, id: ParameterId) -> &Parameter {
        &self.parameters[id.0]
    }

    pub fn parameter_mut(&mut self, id: ParameterId) -> &mut Parameter {
        &mut self.parameters[id.0]
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<ParameterId> {
        self.index.parameters.get(name).copied()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Register an alias; a later registration of the same alias wins
    pub fn add_parameter_alias(&mut self, id: ParameterId, namespace: &str, alias: &str) {
        self.parameters[id.0].aliases.push(Alias {
            namespace: namespace.to_string(),
            name: alias.to_string(),
        });
        self.index
            .parameter_aliases
            .insert((namespace.to_string(), alias.to_string()), id);
    }

    pub fn parameter_by_alias(&self, namespace: &str, alias: &str) -> Option<ParameterId> {
        self.index
            .parameter_aliases
            .get(&(namespace.to_string(), alias.to_string()))
            .copied()
    }

    /// Type of a parameter
    pub fn type_of(&self, id: ParameterId) -> &ParameterType {
        self.parameter_type(self.parameter(id).type_id)
    }

    // Containers

    pub fn add_container(
        &mut self,
        container: SequenceContainer,
    ) -> Result<ContainerId, DuplicateName> {
        if self.index.containers.contains_key(&container.name) {
            return Err(DuplicateName {
                kind: "container",
                name: container.name,
            });
        }
        let id = ContainerId(self.containers.len());
        self.index.containers.insert(container.name.clone(), id);
        self.containers.push(container);
        Ok(id)
    }

    pub fn container(&self, id: ContainerId) -> &SequenceContainer {
        &self.containers[id.0]
    }

    pub fn container_mut(&mut self, id: ContainerId) -> &mut SequenceContainer {
        &mut self.containers[id.0]
    }

    pub fn container_by_name(&self, name: &str) -> Option<ContainerId> {
        self.index.containers.get(name).copied()
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.index.containers.contains_key(name)
    }

    pub fn containers(&self) -> &[SequenceContainer] {
        &self.containers
    }

    /// Containers whose base is `parent`
    pub fn children_of(&self, parent: ContainerId) -> impl Iterator<Item = ContainerId> + '_ {
        self.containers
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.base == Some(parent))
            .map(|(i, _)| ContainerId(i))
    }

    // Argument types

    /// Add an argument type, renaming it `<name>_<n>` if the name is taken
    pub fn add_argument_type(&mut self, mut atype: ArgumentType) -> ArgumentTypeId {
        if self.index.argument_types.contains_key(&atype.name) {
            atype.name = (1..)
                .map(|n| format!("{}_{}", atype.name, n))
                .find(|name| !self.index.argument_types.contains_key(name))
                .unwrap_or_else(|| atype.name.clone());
        }
        let id = ArgumentTypeId(self.argument_types.len());
        self.index.argument_types.insert(atype.name.clone(), id);
        self.argument_types.push(atype);
        id
    }

    pub fn argument_type_by_name(&self, name: &str) -> Option<ArgumentTypeId> {
        self.index.argument_types.get(name).copied()
    }

    pub fn argument_type(&self, id: ArgumentTypeId) -> &ArgumentType {
        &self.argument_types[id.0]
    }

    pub fn argument_types(&self) -> &[ArgumentType] {
        &self.argument_types
    }

    // Commands

    pub fn add_command(&mut self, command: MetaCommand) -> Result<CommandId, DuplicateName> {
        if self.index.commands.contains_key(&command.name) {
            return Err(DuplicateName {
                kind: "command",
                name: command.name,
            });
        }
        let id = CommandId(self.commands.len());
        self.index.commands.insert(command.name.clone(), id);
        self.commands.push(command);
        Ok(id)
    }

    pub fn command(&self, id: CommandId) -> &MetaCommand {
        &self.commands[id.0]
    }

    pub fn command_mut(&mut self, id: CommandId) -> &mut MetaCommand {
        &mut self.commands[id.0]
    }

    pub fn command_by_name(&self, name: &str) -> Option<CommandId> {
        self.index.commands.get(name).copied()
    }

    pub fn commands(&self) -> &[MetaCommand] {
        &self.commands
    }

    // Algorithms

    pub fn add_algorithm(&mut self, algorithm: Algorithm) -> Result<AlgorithmId, DuplicateName> {
        if self.index.algorithms.contains_key(&algorithm.name) {
            return Err(DuplicateName {
                kind: "algorithm",
                name: algorithm.name,
            });
        }
        let id = AlgorithmId(self.algorithms.len());
        self.index.algorithms.insert(algorithm.name.clone(), id);
        self.algorithms.push(algorithm);
        Ok(id)
    }

    pub fn algorithm(&self, id: AlgorithmId) -> &Algorithm {
        &self.algorithms[id.0]
    }

    pub fn algorithm_by_name(&self, name: &str) -> Option<AlgorithmId> {
        self.index.algorithms.get(name).copied()
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// Serialise the model as pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
