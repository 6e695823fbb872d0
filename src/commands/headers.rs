//! Packet header templates (`TCP`, `PCPC`, `PCDF`)
//!
//! Each header template becomes an abstract command that concrete commands
//! extend. Header fields are fixed bit patterns, spare bits or header
//! arguments; the arguments playing the APID, type, subtype and
//! acknowledgement roles are bound by every command using the header.

use super::CommandBuilder;
use super::records::{pcdf, pcpc, tcp};
use crate::constants::tables;
use crate::error::Result;
use crate::model::{
    Argument, ArgumentType, ArgumentTypeId, CommandEntry, CommandEntryItem, CommandId, EngType,
    EntryLocation, MetaCommand,
};
use crate::encoding::EncodingDescriptor;
use crate::reader::{Row, parse_hex_bytes};
use crate::session::Session;
use tracing::{debug, info};

/// A packet header template and the arguments holding its discriminators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTemplate {
    pub command: CommandId,
    pub apid: Option<String>,
    pub packet_type: Option<String>,
    pub subtype: Option<String>,
    pub ack: Option<String>,
}

impl HeaderTemplate {
    fn new(command: CommandId) -> Self {
        Self {
            command,
            apid: None,
            packet_type: None,
            subtype: None,
            ack: None,
        }
    }

    fn set_role(&mut self, role: char, argument: &str) {
        let slot = match role {
            'A' => &mut self.apid,
            'T' => &mut self.packet_type,
            'S' => &mut self.subtype,
            _ => &mut self.ack,
        };
        *slot = Some(argument.to_string());
    }
}

/// A header argument (`PCPC`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderArgument {
    pub description: String,
    pub signed: bool,
    /// Type and width fixed by the first `PCDF` record placing the argument
    pub layout: Option<(ArgumentTypeId, u32)>,
}

impl CommandBuilder {
    pub(crate) fn load_headers(&mut self, session: &mut Session) -> Result<()> {
        session.scan(tables::TCP, |session, row| {
            row.require(&[tcp::ID])?;
            let name = row.str(tcp::ID)?;
            if self.headers.contains_key(name) {
                return Err(row.data(format!("duplicate packet header '{}'", name)));
            }
            let mut command = MetaCommand::new(name);
            command.is_abstract = true;
            let id = session
                .db
                .add_command(command)
                .map_err(|e| row.data(e.to_string()))?;
            self.headers.insert(name.to_string(), HeaderTemplate::new(id));
            Ok(())
        })?;

        session.scan(tables::PCPC, |_, row| {
            row.require(&[pcpc::NAME, pcpc::DESC])?;
            let name = row.str(pcpc::NAME)?;
            if self.header_arguments.contains_key(name) {
                return Err(row.data(format!("duplicate header argument '{}'", name)));
            }
            let signed = match row.flag_or(pcpc::CODE, 'U') {
                'U' => false,
                'I' => true,
                other => return Err(row.data(format!("invalid PCPC_CODE '{}'", other))),
            };
            self.header_arguments.insert(
                name.to_string(),
                HeaderArgument {
                    description: row.str(pcpc::DESC)?.to_string(),
                    signed,
                    layout: None,
                },
            );
            Ok(())
        })?;

        session.scan(tables::PCDF, |session, row| self.header_field(session, row))?;

        info!("Loaded {} packet header templates", self.headers.len());
        Ok(())
    }

    fn header_field(&mut self, session: &mut Session, row: &Row) -> Result<()> {
        row.require(&[pcdf::TCNAME, pcdf::TYPE, pcdf::LEN, pcdf::BIT])?;
        let header_name = row.str(pcdf::TCNAME)?;
        let command = self
            .headers
            .get(header_name)
            .map(|h| h.command)
            .ok_or_else(|| row.reference(format!("PCDF references unknown header '{}'", header_name)))?;
        let size_in_bits = bits(row, pcdf::LEN)?;
        let location = EntryLocation::ContainerStart(row.int(pcdf::BIT)?);

        let item = match row.flag_or(pcdf::TYPE, ' ') {
            'F' => {
                let value = row.str(pcdf::VALUE)?;
                let bytes = parse_hex_bytes(value, size_in_bits)
                    .ok_or_else(|| row.data(format!("invalid hexadecimal value '{}'", value)))?;
                CommandEntryItem::FixedValue {
                    name: row.opt_str(pcdf::DESC).map(str::to_string),
                    value: bytes,
                    size_in_bits,
                }
            }
            'P' => CommandEntryItem::FixedValue {
                name: row.opt_str(pcdf::PNAME).map(str::to_string),
                value: vec![0; size_in_bits.div_ceil(8) as usize],
                size_in_bits,
            },
            role @ ('A' | 'T' | 'S' | 'K') => {
                let name = row.str(pcdf::PNAME)?;
                let argument = self.header_argument(session, row, name, size_in_bits)?;
                let header = session.db.command_mut(command);
                if !header.has_argument(name) {
                    header.arguments.push(argument);
                }
                if let Some(template) = self.headers.get_mut(header_name) {
                    template.set_role(role, name);
                }
                debug!("{}: header {} argument {} ({})", row.location(), header_name, name, role);
                CommandEntryItem::Argument(name.to_string())
            }
            other => return Err(row.data(format!("invalid PCDF_TYPE '{}'", other))),
        };

        session
            .db
            .command_mut(command)
            .container
            .entries
            .push(CommandEntry { location, item });
        Ok(())
    }

    /// Argument of a header field; its width must agree with earlier fields
    fn header_argument(
        &mut self,
        session: &mut Session,
        row: &Row,
        name: &str,
        size_in_bits: u32,
    ) -> Result<Argument> {
        let definition = self
            .header_arguments
            .get_mut(name)
            .ok_or_else(|| row.reference(format!("PCDF references unknown PCPC '{}'", name)))?;

        let type_id = match definition.layout {
            Some((type_id, bits)) if bits == size_in_bits => type_id,
            Some((_, bits)) => {
                return Err(row.data(format!(
                    "header argument '{}' has {} bits, {} elsewhere",
                    name, size_in_bits, bits
                )));
            }
            None => {
                let encoding = if definition.signed {
                    EncodingDescriptor::SignedInteger { size_in_bits }
                } else {
                    EncodingDescriptor::UnsignedInteger { size_in_bits }
                };
                let eng = EngType::Integer {
                    signed: definition.signed,
                    size_in_bits: if size_in_bits > 32 { 64 } else { 32 },
                };
                let type_id = session
                    .db
                    .add_argument_type(ArgumentType::new(name, eng).with_encoding(encoding));
                definition.layout = Some((type_id, size_in_bits));
                type_id
            }
        };

        let mut argument = Argument::new(name, type_id);
        argument.description = Some(definition.description.clone());
        Ok(argument)
    }
}

/// Width column that must be a non-negative bit count
pub(crate) fn bits(row: &Row, col: usize) -> Result<u32> {
    let value = row.int(col)?;
    u32::try_from(value).map_err(|_| row.data(format!("invalid bit length {}", value)))
}
