//! Shared test utilities for command builder tests

use super::CommandBuilder;
use super::records::{ccf, cpc};
use crate::fixtures::{MibDir, MibFixture};
use crate::model::{ArgumentType, MetaCommand, MissionDatabase};
use crate::session::Session;
use crate::telemetry::TelemetryBuilder;
use crate::telemetry::records::pcf;

pub mod headers_tests;

/// TC packet header `TCHDR`: APID at bit 5, ack flags, type and subtype
pub fn with_header(fixture: MibFixture) -> MibFixture {
    fixture
        .row("tcp", &["TCHDR"])
        .row("pcpc", &["APID", "Application id", "U"])
        .row("pcpc", &["TYPE", "Service type"])
        .row("pcpc", &["STYPE", "Service subtype"])
        .row("pcpc", &["ACK", "Acknowledgement flags"])
        .row("pcdf", &["TCHDR", "version", "F", "3", "0", "", "0"])
        .row("pcdf", &["TCHDR", "packet type", "F", "1", "3", "", "1"])
        .row("pcdf", &["TCHDR", "secondary header", "F", "1", "4", "", "1"])
        .row("pcdf", &["TCHDR", "apid", "A", "11", "5", "APID"])
        .row("pcdf", &["TCHDR", "sequence flags", "F", "2", "16", "", "3"])
        .row("pcdf", &["TCHDR", "sequence count", "P", "14", "18", "SEQCOUNT"])
        .row("pcdf", &["TCHDR", "length", "P", "16", "32"])
        .row("pcdf", &["TCHDR", "pus version", "F", "4", "48", "", "2"])
        .row("pcdf", &["TCHDR", "ack", "K", "4", "52", "ACK"])
        .row("pcdf", &["TCHDR", "type", "T", "8", "56", "TYPE"])
        .row("pcdf", &["TCHDR", "subtype", "S", "8", "64", "STYPE"])
}

/// CPC columns of a plain (uncalibrated) command parameter
pub fn cpc_record<'a>(name: &'a str, ptc: &'a str, pfc: &'a str) -> Vec<(usize, &'a str)> {
    vec![(cpc::PNAME, name), (cpc::PTC, ptc), (cpc::PFC, pfc)]
}

/// `cpc_record` with extra columns
pub fn cpc_with<'a>(
    name: &'a str,
    ptc: &'a str,
    pfc: &'a str,
    extra: &[(usize, &'a str)],
) -> Vec<(usize, &'a str)> {
    let mut columns = cpc_record(name, ptc, pfc);
    columns.extend_from_slice(extra);
    columns
}

/// CCF columns of a command using `header`
pub fn ccf_record<'a>(name: &'a str, header: &'a str) -> Vec<(usize, &'a str)> {
    vec![(ccf::CNAME, name), (ccf::DESCR, "test command"), (ccf::PKTID, header)]
}

/// CCF columns of a `TCHDR` command with all discriminators
pub fn pus_command<'a>(
    name: &'a str,
    service: &'a str,
    subservice: &'a str,
) -> Vec<(usize, &'a str)> {
    let mut columns = ccf_record(name, "TCHDR");
    columns.extend_from_slice(&[
        (ccf::TYPE, service),
        (ccf::STYPE, subservice),
        (ccf::APID, "100"),
        (ccf::ACK, "9"),
    ]);
    columns
}

/// PCF columns of a raw telemetry parameter
pub fn pcf_record<'a>(name: &'a str, ptc: &'a str, pfc: &'a str) -> Vec<(usize, &'a str)> {
    vec![
        (pcf::PNAME, name),
        (pcf::PTC, ptc),
        (pcf::PFC, pfc),
        (pcf::CATEG, "N"),
        (pcf::NATUR, "R"),
    ]
}

/// Build telemetry then commands into `session`
pub fn build_into(session: &mut Session) -> crate::error::Result<CommandBuilder> {
    TelemetryBuilder::new().build(session)?;
    let mut builder = CommandBuilder::new();
    builder.build(session)?;
    Ok(builder)
}

/// Run both builders on a non-strict session
pub fn build(dir: &MibDir) -> (CommandBuilder, Session) {
    let mut session = dir.session();
    let builder = build_into(&mut session).unwrap();
    (builder, session)
}

pub fn command<'a>(db: &'a MissionDatabase, name: &str) -> &'a MetaCommand {
    let id = db
        .command_by_name(name)
        .unwrap_or_else(|| panic!("no command {}", name));
    db.command(id)
}

pub fn argument_type<'a>(db: &'a MissionDatabase, command_name: &str, argument: &str) -> &'a ArgumentType {
    let argument = command(db, command_name)
        .argument(argument)
        .unwrap_or_else(|| panic!("no argument {} in {}", argument, command_name));
    db.argument_type(argument.type_id)
}
