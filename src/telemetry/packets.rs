//! Packet container hierarchy (`PIC`, `PID`, `TPCF`)
//!
//! Every packet derives from the abstract root container `ccsds-pus`, which
//! exposes the APID, the sequence count and the PUS type/subtype. Packets
//! are grouped by (apid, type, subtype):
//!
//! - a group of one packet becomes one container restricted on the triple
//! - a larger group becomes an intermediate container restricted on the
//!   triple and exposing the PIC identification fields, with one leaf per
//!   packet restricted on its identification values

use super::TelemetryBuilder;
use super::records::{PicRecord, PidRecord, tpcf};
use crate::constants::{
    NAMESPACE_PUS, PARA_CCSDS_APID, PARA_CCSDS_SEQCOUNT, PARA_PUS_SUBTYPE, PARA_PUS_TYPE,
    PARA_PUS1_APID, PARA_PUS1_SEQCOUNT, ROOT_CONTAINER_NAME, layout, tables,
};
use crate::encoding::EncodingDescriptor;
use crate::error::{Location, MibError, Result};
use crate::model::{
    Alias, Comparison, ContainerEntry, ContainerId, EngType, EntryItem, EntryLocation,
    MatchCriteria, Parameter, ParameterId, ParameterType, SequenceContainer,
};
use crate::session::Session;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Root container and the discriminator parameters it exposes
#[derive(Debug, Clone, Copy)]
pub(crate) struct PacketRoot {
    pub container: ContainerId,
    pub apid: ParameterId,
    pub packet_type: ParameterId,
    pub subtype: ParameterId,
}

impl TelemetryBuilder {
    pub(crate) fn load_packets(&mut self, session: &mut Session) -> Result<()> {
        session.scan(tables::PIC, |_, row| {
            self.identifications.push(PicRecord::from_row(row)?);
            Ok(())
        })?;

        let mut spids = HashSet::new();
        session.scan(tables::PID, |_, row| {
            let record = PidRecord::from_row(row)?;
            if !record.valid {
                debug!("{}: packet {} is not valid, skipped", row.location(), record.spid);
                return Ok(());
            }
            if !spids.insert(record.spid) {
                return Err(row.data(format!("duplicate SPID {}", record.spid)));
            }
            self.packets.push(record);
            Ok(())
        })?;

        session.scan(tables::TPCF, |_, row| {
            row.require(&[tpcf::SPID])?;
            let name = row.opt_str(tpcf::NAME).map(sanitize_name);
            let size = row.opt_int(tpcf::SIZE)?;
            self.packet_names.insert(row.int(tpcf::SPID)?, (name, size));
            Ok(())
        })?;

        let root = match create_root_container(session) {
            Ok(root) => root,
            Err(e) => {
                session.report(e)?;
                return Ok(());
            }
        };

        for group in group_packets(&self.packets) {
            let outcome = self.create_packet_group(session, &root, &group);
            session.recover(outcome)?;
        }

        info!(
            "Built {} packet containers from {} PID records",
            self.spid_containers.len(),
            self.packets.len()
        );
        Ok(())
    }

    fn create_packet_group(
        &mut self,
        session: &mut Session,
        root: &PacketRoot,
        group: &[PidRecord],
    ) -> Result<()> {
        let Some(first) = group.first() else {
            return Ok(());
        };
        let (apid, packet_type, subtype) = first.group_key();
        let group_name = format!("pus_{}_{:02x}{:02x}", apid, packet_type, subtype);

        if let [packet] = group {
            let name = self.packet_container_name(session, packet, &group_name);
            let container =
                discriminated_container(session, root, &name, packet, packet.description.clone())?;
            self.register_packet(session, packet, container);
            return Ok(());
        }

        let pic = self
            .identification_for(packet_type, subtype, apid)
            .cloned()
            .ok_or_else(|| {
                MibError::reference(
                    &first.location,
                    format!(
                        "no PIC record for type {} subtype {} apid {} shared by {} packets",
                        packet_type,
                        subtype,
                        apid,
                        group.len()
                    ),
                )
            })?;

        let group_container = discriminated_container(session, root, &group_name, first, None)?;
        let pi1 = identification_field(
            session,
            group_container,
            &format!("{}_pi1", group_name),
            pic.pi1_offset,
            pic.pi1_width,
            &pic.location,
        )?;
        let pi2 = identification_field(
            session,
            group_container,
            &format!("{}_pi2", group_name),
            pic.pi2_offset,
            pic.pi2_width,
            &pic.location,
        )?;
        if pi1.is_none() && pi2.is_none() {
            return Err(MibError::data(
                &pic.location,
                format!(
                    "PIC for type {} subtype {} has no identification field to tell {} packets apart",
                    packet_type,
                    subtype,
                    group.len()
                ),
            ));
        }

        for packet in group {
            let mut comparisons = Vec::new();
            if let Some(pi1) = pi1 {
                comparisons.push(Comparison::raw_equals(pi1, packet.pi1));
            }
            if let Some(pi2) = pi2 {
                comparisons.push(Comparison::raw_equals(pi2, packet.pi2));
            }

            let default_name = format!("{}_spid_{}", group_name, packet.spid);
            let name = self.packet_container_name(session, packet, &default_name);
            let mut container = SequenceContainer::new(name)
                .with_base(group_container, MatchCriteria::from_list(comparisons));
            container.description = packet.description.clone();
            let id = session
                .db
                .add_container(container)
                .map_err(|e| MibError::data(&packet.location, e.to_string()))?;
            self.register_packet(session, packet, id);
        }
        Ok(())
    }

    /// PIC rule of a packet: the one for its APID, else the wildcard one
    pub(crate) fn identification_for(
        &self,
        packet_type: i64,
        subtype: i64,
        apid: i64,
    ) -> Option<&PicRecord> {
        let mut candidates = self
            .identifications
            .iter()
            .filter(|p| p.packet_type == packet_type && p.subtype == subtype);
        let exact = candidates.clone().find(|p| p.apid == Some(apid));
        exact.or_else(|| candidates.find(|p| p.apid.is_none()))
    }

    /// TPCF name of a packet, or `default`; `_spid_<spid>` added on clash
    fn packet_container_name(&self, session: &Session, packet: &PidRecord, default: &str) -> String {
        let name = self
            .packet_names
            .get(&packet.spid)
            .and_then(|(name, _)| name.clone())
            .unwrap_or_else(|| default.to_string());
        if session.db.has_container(&name) {
            format!("{}_spid_{}", name, packet.spid)
        } else {
            name
        }
    }

    fn register_packet(&mut self, session: &mut Session, packet: &PidRecord, container: ContainerId) {
        if let Some((_, Some(size))) = self.packet_names.get(&packet.spid)
            && let Ok(size) = u32::try_from(*size)
        {
            session.db.container_mut(container).size_in_bits = Some(8 * size);
        }
        self.spid_containers.insert(packet.spid, container);
    }
}

/// PID records grouped by (apid, type, subtype), in first-declaration order
fn group_packets(packets: &[PidRecord]) -> Vec<Vec<PidRecord>> {
    let mut index: HashMap<(i64, i64, i64), usize> = HashMap::new();
    let mut groups: Vec<Vec<PidRecord>> = Vec::new();
    for packet in packets {
        let slot = *index.entry(packet.group_key()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(packet.clone());
    }
    groups
}

fn create_root_container(session: &mut Session) -> Result<PacketRoot> {
    let tm = session.config().tm.clone();
    let apid = unsigned_parameter(session, PARA_CCSDS_APID, layout::APID_BITS)?;
    let seqcount = unsigned_parameter(session, PARA_CCSDS_SEQCOUNT, layout::SEQCOUNT_BITS)?;
    let packet_type = unsigned_parameter(session, PARA_PUS_TYPE, layout::PUS_TYPE_BITS)?;
    let subtype = unsigned_parameter(session, PARA_PUS_SUBTYPE, layout::PUS_TYPE_BITS)?;

    let mut root = SequenceContainer::new(ROOT_CONTAINER_NAME);
    root.is_abstract = true;
    for (parameter, bit) in [
        (apid, layout::APID_BIT_OFFSET),
        (seqcount, layout::SEQCOUNT_BIT_OFFSET),
        (packet_type, 8 * tm.type_offset),
        (subtype, 8 * tm.subtype_offset),
    ] {
        root.add_entry(ContainerEntry::new(
            EntryItem::Parameter(parameter),
            EntryLocation::ContainerStart(bit as i64),
        ));
    }

    let container = session
        .db
        .add_container(root)
        .map_err(|e| MibError::structure(e.to_string()))?;
    Ok(PacketRoot {
        container,
        apid,
        packet_type,
        subtype,
    })
}

/// Container derived from the root, restricted on the packet's discriminators
fn discriminated_container(
    session: &mut Session,
    root: &PacketRoot,
    name: &str,
    packet: &PidRecord,
    description: Option<String>,
) -> Result<ContainerId> {
    let criteria = MatchCriteria::from_list(vec![
        Comparison::raw_equals(root.apid, packet.apid),
        Comparison::raw_equals(root.packet_type, packet.packet_type),
        Comparison::raw_equals(root.subtype, packet.subtype),
    ]);
    let mut container = SequenceContainer::new(name).with_base(root.container, criteria);
    container.description = description;

    if packet.packet_type == 1 {
        let (apid, seqcount) = pus1_parameters(session)?;
        let start = 8 * session.config().tm.pus1_data_offset as i64;
        container.add_entry(ContainerEntry::new(
            EntryItem::Parameter(apid),
            EntryLocation::ContainerStart(start + layout::APID_BIT_OFFSET as i64),
        ));
        container.add_entry(ContainerEntry::new(
            EntryItem::Parameter(seqcount),
            EntryLocation::ContainerStart(start + layout::SEQCOUNT_BIT_OFFSET as i64),
        ));
    }
    if session.config().generate_pus_namespace {
        container.aliases.push(Alias {
            namespace: NAMESPACE_PUS.to_string(),
            name: format!("TM({},{})", packet.packet_type, packet.subtype),
        });
    }

    session
        .db
        .add_container(container)
        .map_err(|e| MibError::data(&packet.location, e.to_string()))
}

/// Parameter for a PIC identification field, added to the group container
///
/// A field is used when its offset is not negative; a used field needs a
/// positive width.
fn identification_field(
    session: &mut Session,
    container: ContainerId,
    name: &str,
    offset: i64,
    width: i64,
    location: &Location,
) -> Result<Option<ParameterId>> {
    if offset < 0 {
        return Ok(None);
    }
    let Some(width) = u32::try_from(width).ok().filter(|&w| w > 0) else {
        session.report(MibError::data(
            location,
            format!("identification field at byte {} has width {}", offset, width),
        ))?;
        return Ok(None);
    };

    let parameter = unsigned_parameter(session, name, width)?;
    session.db.container_mut(container).add_entry(ContainerEntry::new(
        EntryItem::Parameter(parameter),
        EntryLocation::ContainerStart(8 * offset),
    ));
    Ok(Some(parameter))
}

/// Echoed request id parameters of PUS(1,x) reports, created on first use
pub(crate) fn pus1_parameters(session: &mut Session) -> Result<(ParameterId, ParameterId)> {
    let apid = match session.db.parameter_by_name(PARA_PUS1_APID) {
        Some(id) => id,
        None => unsigned_parameter(session, PARA_PUS1_APID, layout::APID_BITS)?,
    };
    let seqcount = match session.db.parameter_by_name(PARA_PUS1_SEQCOUNT) {
        Some(id) => id,
        None => unsigned_parameter(session, PARA_PUS1_SEQCOUNT, layout::SEQCOUNT_BITS)?,
    };
    Ok((apid, seqcount))
}

/// Generated parameter with an unsigned integer encoding of `bits` bits
pub(crate) fn unsigned_parameter(
    session: &mut Session,
    name: &str,
    bits: u32,
) -> Result<ParameterId> {
    let type_name = format!("mib-ptype-uint{}", bits);
    let type_id = match session.db.parameter_type_by_name(&type_name) {
        Some(id) => id,
        None => {
            let eng = EngType::Integer {
                signed: false,
                size_in_bits: if bits > 32 { 64 } else { 32 },
            };
            let ptype = ParameterType::new(type_name, eng)
                .with_encoding(EncodingDescriptor::UnsignedInteger { size_in_bits: bits });
            session
                .db
                .add_parameter_type(ptype)
                .map_err(|e| MibError::structure(e.to_string()))?
        }
    };
    session
        .db
        .add_parameter(Parameter::new(name, type_id))
        .map_err(|e| MibError::structure(e.to_string()))
}

/// Container name from a TPCF name: whitespace and path separators replaced
fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' { '_' } else { c })
        .collect()
}
