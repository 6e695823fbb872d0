//! Commands (`CCF`) and their elements (`CDF`)

use super::CommandBuilder;
use super::headers::HeaderTemplate;
use super::records::{CdfRecord, CpcRecord, ElementKind, ValueSource, ccf, cdf};
use crate::constants::{
    ABSTRACT_SUFFIX, BINARY_COMMAND_PREFIX, NAMESPACE_PUS, NO_HEADER, PARA_PUS_SUBTYPE,
    PARA_PUS_TYPE, PUS17_VERIFIER_NAME, layout, tables,
};
use crate::error::{MibError, Result};
use crate::model::{
    Alias, Argument, ArgumentAssignment, ArgumentType, CheckWindow, CommandEntry,
    CommandEntryItem, ComparisonOperator, ContainerId, EngType, EntryLocation, FixedArgumentSet,
    MatchCriteria, MetaCommand, MissionDatabase, ParameterId, RecordMember, Verifier,
    VerifierCheck,
};
use crate::reader::{Row, parse_hex_bytes};
use crate::session::Session;
use tracing::{debug, info};

impl CommandBuilder {
    pub(crate) fn load_elements(&mut self, session: &mut Session) -> Result<()> {
        let default_vplb = session.config().tc.vbl_param_length_bytes;
        session.scan(tables::CDF, |_, row| {
            let command = row.str(cdf::CNAME)?;
            if command.starts_with(BINARY_COMMAND_PREFIX) {
                debug!("{}: skipping element of binary command {}", row.location(), command);
                return Ok(());
            }
            let record = CdfRecord::from_row(row, default_vplb)?;
            if let Some(parameter) = &record.parameter {
                if record.is_argument() && !self.parameters.contains_key(parameter) {
                    return Err(row.reference(format!(
                        "CDF references unknown command parameter '{}'",
                        parameter
                    )));
                }
            }
            self.elements
                .entry(command.to_string())
                .or_default()
                .push(record);
            Ok(())
        })?;

        for records in self.elements.values_mut() {
            records.sort_by_key(|r| r.bit);
        }
        info!("Loaded elements of {} commands", self.elements.len());
        Ok(())
    }

    pub(crate) fn load_commands(&mut self, session: &mut Session) -> Result<()> {
        let rows = session.scan(tables::CCF, |session, row| self.define_command(session, row))?;
        info!("Read {} command definitions", rows);
        Ok(())
    }

    fn define_command(&mut self, session: &mut Session, row: &Row) -> Result<()> {
        row.require(&[ccf::CNAME, ccf::DESCR, ccf::PKTID])?;
        let name = row.str(ccf::CNAME)?;
        if name.starts_with(BINARY_COMMAND_PREFIX) {
            debug!("{}: skipping binary command {}", row.location(), name);
            return Ok(());
        }
        if session.db.command_by_name(name).is_some() {
            return Err(row.data(format!("duplicate command '{}'", name)));
        }

        let mut command = MetaCommand::new(name);
        command.description = row.opt_str(ccf::DESCR).map(str::to_string);
        command.long_description = row.opt_str(ccf::DESCR2).map(str::to_string);
        command.critical = row.flag_or(ccf::CRITICAL, 'N').eq_ignore_ascii_case(&'Y');

        let packet_id = row.str(ccf::PKTID)?;
        if packet_id != NO_HEADER {
            let header = self.headers.get(packet_id).cloned().ok_or_else(|| {
                row.reference(format!("CCF references unknown packet header '{}'", packet_id))
            })?;
            command.base = Some(header.command);
            bind_discriminators(session, row, &header, &mut command)?;
        }

        let elements = self.elements.get(name).cloned().unwrap_or_default();
        self.build_arguments(session, &mut command, &elements)?;

        if let (Some(service), Some(subservice)) =
            (row.opt_int(ccf::TYPE)?, row.opt_int(ccf::STYPE)?)
        {
            if session.config().generate_pus_namespace {
                command.aliases.push(Alias {
                    namespace: NAMESPACE_PUS.to_string(),
                    name: format!("TC({},{})", service, subservice),
                });
            }
            if (service, subservice) == (17, 1) {
                match report_container(&session.db, 17, 2) {
                    Some(container) => command.verifiers.push(Verifier {
                        stage: PUS17_VERIFIER_NAME.to_string(),
                        window: CheckWindow {
                            start_ms: 0,
                            stop_ms: layout::PUS17_TIMEOUT_MS,
                        },
                        check: VerifierCheck::Container(container),
                    }),
                    None => debug!("No TM(17,2) container for connection test {}", name),
                }
            }
        }

        debug!(
            "{}: command {} with {} arguments",
            row.location(),
            name,
            command.arguments.len()
        );
        session
            .db
            .add_command(command)
            .map_err(|e| row.data(e.to_string()))?;
        Ok(())
    }

    /// Place the elements of a command, expanding repeated groups
    fn build_arguments(
        &mut self,
        session: &mut Session,
        command: &mut MetaCommand,
        records: &[CdfRecord],
    ) -> Result<()> {
        let mut i = 0;
        while i < records.len() {
            let record = &records[i];
            i += 1;

            if !record.is_argument() {
                let value = match &record.value {
                    Some(value) => parse_hex_bytes(value, record.length_bits).ok_or_else(|| {
                        MibError::data(
                            &record.location,
                            format!("invalid hexadecimal value '{}'", value),
                        )
                    })?,
                    None => vec![0; record.length_bits.div_ceil(8) as usize],
                };
                command.container.entries.push(CommandEntry {
                    location: EntryLocation::PreviousEntry(0),
                    item: CommandEntryItem::FixedValue {
                        name: record.description.clone(),
                        value,
                        size_in_bits: record.length_bits,
                    },
                });
                continue;
            }

            let counter = self.place_argument(session, command, record)?;
            if record.group_size == 0 {
                continue;
            }
            let members = records.get(i..i + record.group_size).ok_or_else(|| {
                MibError::data(
                    &record.location,
                    format!(
                        "group '{}' of {} elements overruns command '{}'",
                        counter, record.group_size, command.name
                    ),
                )
            })?;

            if members.iter().any(|m| m.group_size > 0) {
                // Members are then placed one by one by the following iterations
                session.limitation(format!(
                    "{}: nested groups are not supported, group '{}' of command '{}' \
                     is fixed to one occurrence",
                    record.location, counter, command.name
                ));
                fix_count(command, &counter);
                continue;
            }
            self.place_group(session, command, &counter, members)?;
            i += record.group_size;
        }
        Ok(())
    }

    /// Place a single fixed or editable argument, returning its final name
    fn place_argument(
        &mut self,
        session: &mut Session,
        command: &mut MetaCommand,
        record: &CdfRecord,
    ) -> Result<String> {
        let mut argument = self.command_argument(session, record)?;
        argument.name = free_name(command, &argument.name);
        let name = argument.name.clone();

        if record.kind == ElementKind::Fixed {
            let value = self.fixed_value(record)?;
            let set_name = format!("{}{}", command.name, ABSTRACT_SUFFIX);
            let fixed = command.fixed.get_or_insert_with(|| FixedArgumentSet {
                name: set_name,
                arguments: Vec::new(),
                assignments: Vec::new(),
            });
            fixed.arguments.push(argument);
            fixed.assignments.push(ArgumentAssignment::new(&name, value));
        } else {
            command.arguments.push(argument);
        }

        command.container.entries.push(CommandEntry {
            location: EntryLocation::PreviousEntry(0),
            item: CommandEntryItem::Argument(name.clone()),
        });
        Ok(name)
    }

    /// Array argument repeating `members` as many times as `counter` says
    ///
    /// A single member is repeated directly; several members are first
    /// gathered in a record type.
    fn place_group(
        &mut self,
        session: &mut Session,
        command: &mut MetaCommand,
        counter: &str,
        members: &[CdfRecord],
    ) -> Result<()> {
        if let Some(area) = members.iter().find(|m| !m.is_argument()) {
            return Err(MibError::data(
                &area.location,
                format!("fixed area inside group '{}'", counter),
            ));
        }
        if let Some(fixed) = members.iter().find(|m| m.kind == ElementKind::Fixed) {
            return Err(MibError::data(
                &fixed.location,
                format!("fixed argument inside group '{}'", counter),
            ));
        }

        let mut fields = Vec::with_capacity(members.len());
        for member in members {
            let argument = self.command_argument(session, member)?;
            fields.push(RecordMember {
                name: argument.name,
                type_id: argument.type_id,
            });
        }

        let (name, element) = match fields.as_slice() {
            [single] => (single.name.clone(), single.type_id),
            _ => {
                let record = ArgumentType::new(
                    format!("{}_group_record", counter),
                    EngType::Record { members: fields },
                );
                (format!("{}_group", counter), session.db.add_argument_type(record))
            }
        };
        let array = session.db.add_argument_type(ArgumentType::new(
            format!("{}_array", name),
            EngType::Array {
                element,
                count_argument: counter.to_string(),
            },
        ));

        let name = free_name(command, &name);
        command.arguments.push(Argument::new(&name, array));
        command.container.entries.push(CommandEntry {
            location: EntryLocation::PreviousEntry(0),
            item: CommandEntryItem::Argument(name),
        });
        Ok(())
    }

    /// Argument of an element, named after its command parameter
    fn command_argument(&mut self, session: &mut Session, record: &CdfRecord) -> Result<Argument> {
        let parameter = self.command_parameter(record)?;
        let type_id = self.argument_type_for(session, &parameter, record)?;

        let mut argument = Argument::new(&parameter.name, type_id);
        argument.description = parameter
            .description
            .clone()
            .or_else(|| record.description.clone());
        if record.kind == ElementKind::Editable {
            match record.source {
                ValueSource::ParameterDefault => {
                    argument.initial_value = parameter.default_value.clone();
                }
                ValueSource::Telemetry => {
                    argument.dynamic_default = Some(dynamic_default(session, record)?);
                }
                ValueSource::Raw | ValueSource::Engineering => {
                    argument.initial_value = record.value.clone();
                }
            }
        }
        Ok(argument)
    }

    fn command_parameter(&self, record: &CdfRecord) -> Result<CpcRecord> {
        let name = record.parameter.as_deref().unwrap_or_default();
        self.parameters.get(name).cloned().ok_or_else(|| {
            MibError::reference(
                &record.location,
                format!("unknown command parameter '{}'", name),
            )
        })
    }

    /// Value bound to a fixed argument
    fn fixed_value(&self, record: &CdfRecord) -> Result<String> {
        let value = match record.source {
            ValueSource::ParameterDefault => record
                .parameter
                .as_deref()
                .and_then(|name| self.parameters.get(name))
                .and_then(|p| p.default_value.clone()),
            ValueSource::Telemetry => {
                return Err(MibError::data(
                    &record.location,
                    "fixed argument cannot take its value from telemetry",
                ));
            }
            ValueSource::Raw | ValueSource::Engineering => record.value.clone(),
        };
        value.ok_or_else(|| MibError::data(&record.location, "fixed argument without value"))
    }
}

/// Bind the header discriminators of a command
///
/// APID and acknowledgement flags stay editable, with the command value as
/// initial value, when the configuration allows overriding them.
fn bind_discriminators(
    session: &Session,
    row: &Row,
    header: &HeaderTemplate,
    command: &mut MetaCommand,
) -> Result<()> {
    let tc = &session.config().tc;
    let roles = [
        (header.apid.as_deref(), ccf::APID, true, tc.allow_apid_override),
        (header.packet_type.as_deref(), ccf::TYPE, true, false),
        (header.subtype.as_deref(), ccf::STYPE, true, false),
        (header.ack.as_deref(), ccf::ACK, false, tc.allow_ack_override),
    ];

    for (argument, col, required, editable) in roles {
        let Some(argument) = argument else {
            continue;
        };
        let value = match row.opt_int(col)? {
            Some(value) => value,
            None if required => {
                return Err(row.data(format!(
                    "command '{}' gives no value for header argument '{}'",
                    command.name, argument
                )));
            }
            None => continue,
        };

        if editable {
            let mut promoted = session
                .db
                .command(header.command)
                .argument(argument)
                .cloned()
                .ok_or_else(|| row.reference(format!("unknown header argument '{}'", argument)))?;
            promoted.initial_value = Some(value.to_string());
            command.arguments.push(promoted);
        } else {
            command
                .assignments
                .push(ArgumentAssignment::new(argument, value));
        }
    }
    Ok(())
}

fn dynamic_default(session: &Session, record: &CdfRecord) -> Result<ParameterId> {
    let name = record.tmid.as_deref().ok_or_else(|| {
        MibError::data(&record.location, "telemetry default without CDF_TMID")
    })?;
    session.db.parameter_by_name(name).ok_or_else(|| {
        MibError::reference(
            &record.location,
            format!("CDF_TMID references unknown parameter '{}'", name),
        )
    })
}

/// `base`, or `base_<n>` for the first n leaving no clash
fn free_name(command: &MetaCommand, base: &str) -> String {
    if !command.has_argument(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}_{}", base, n))
        .find(|name| !command.has_argument(name))
        .unwrap_or_else(|| base.to_string())
}

/// Fix the count of a group to one occurrence
fn fix_count(command: &mut MetaCommand, counter: &str) {
    let assignments = command
        .fixed
        .iter_mut()
        .flat_map(|f| f.assignments.iter_mut())
        .chain(command.assignments.iter_mut());
    for assignment in assignments {
        if assignment.argument == counter {
            assignment.value = "1".to_string();
            return;
        }
    }
    command
        .assignments
        .push(ArgumentAssignment::new(counter, 1));
}

/// Container of the TM packets of a PUS service and subservice
fn report_container(db: &MissionDatabase, service: i64, subservice: i64) -> Option<ContainerId> {
    let pus_type = db.parameter_by_name(PARA_PUS_TYPE)?;
    let pus_subtype = db.parameter_by_name(PARA_PUS_SUBTYPE)?;
    let restricts = |criteria: &MatchCriteria, parameter: ParameterId, value: i64| {
        criteria.comparisons().iter().any(|c| {
            c.parameter == parameter
                && c.operator == ComparisonOperator::Equality
                && c.value == value.to_string()
        })
    };

    db.containers()
        .iter()
        .find(|c| {
            c.restriction.as_ref().is_some_and(|r| {
                restricts(r, pus_type, service) && restricts(r, pus_subtype, subservice)
            })
        })
        .and_then(|c| db.container_by_name(&c.name))
}
