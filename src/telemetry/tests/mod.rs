//! Shared test utilities for telemetry builder tests

use super::TelemetryBuilder;
use super::records::pcf;
use crate::fixtures::MibDir;
use crate::model::{ContainerId, EntryItem, MissionDatabase, ParameterType, SequenceContainer};
use crate::session::Session;

pub mod limits_tests;
pub mod parameters_tests;

/// PCF columns of a raw numeric parameter
pub fn pcf_record<'a>(name: &'a str, ptc: &'a str, pfc: &'a str) -> Vec<(usize, &'a str)> {
    vec![
        (pcf::PNAME, name),
        (pcf::PTC, ptc),
        (pcf::PFC, pfc),
        (pcf::CATEG, "N"),
        (pcf::NATUR, "R"),
    ]
}

/// `pcf_record` with extra or overriding columns
pub fn pcf_with<'a>(
    name: &'a str,
    ptc: &'a str,
    pfc: &'a str,
    extra: &[(usize, &'a str)],
) -> Vec<(usize, &'a str)> {
    let mut columns = pcf_record(name, ptc, pfc);
    for &(col, value) in extra {
        columns.retain(|(c, _)| *c != col);
        columns.push((col, value));
    }
    columns
}

/// Run the builder on a non-strict session
pub fn build(dir: &MibDir) -> (TelemetryBuilder, Session) {
    let mut session = dir.session();
    let mut builder = TelemetryBuilder::new();
    builder.build(&mut session).unwrap();
    (builder, session)
}

pub fn type_of<'a>(db: &'a MissionDatabase, parameter: &str) -> &'a ParameterType {
    db.type_of(db.parameter_by_name(parameter).unwrap())
}

pub fn container<'a>(db: &'a MissionDatabase, name: &str) -> (ContainerId, &'a SequenceContainer) {
    let id = db.container_by_name(name).unwrap();
    (id, db.container(id))
}

/// Names of the parameters placed directly in a container, in entry order
pub fn entry_names(db: &MissionDatabase, name: &str) -> Vec<String> {
    let (_, container) = container(db, name);
    container
        .entries
        .iter()
        .filter_map(|e| match e.item {
            EntryItem::Parameter(id) => Some(db.parameter(id).name.clone()),
            _ => None,
        })
        .collect()
}
