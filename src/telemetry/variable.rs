//! Variable packet layout (`VPD`)
//!
//! A variable packet structure is a list of elements sorted by position. An
//! element with a group size is a counter: the following `GRPSIZE` elements
//! are repeated as many times as its value says (or `FIXREP` times when
//! set). A group of one element repeats that element; a larger group is
//! wrapped in a nested container which is repeated.
//!
//! The first element of a structure is placed at the end of the packet's
//! data field header, every later element relative to the previous one.

use super::TelemetryBuilder;
use super::records::VpdRecord;
use crate::constants::tables;
use crate::error::{MibError, Result};
use crate::model::{
    ContainerEntry, ContainerId, EntryItem, EntryLocation, Repeat, RepeatCount, SequenceContainer,
};
use crate::session::Session;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

impl TelemetryBuilder {
    pub(crate) fn load_variable_layout(&mut self, session: &mut Session) -> Result<()> {
        let used: HashSet<i64> = self.packets.iter().filter_map(|p| p.tpsd).collect();
        let mut structures: HashMap<i64, Vec<VpdRecord>> = HashMap::new();
        let mut order = Vec::new();
        let mut unknown = HashSet::new();

        session.scan(tables::VPD, |session, row| {
            let record = VpdRecord::from_row(row)?;
            if !used.contains(&record.tpsd) {
                if unknown.insert(record.tpsd) {
                    return Err(row.reference(format!(
                        "VPD structure {} is not used by any packet",
                        record.tpsd
                    )));
                }
                return Ok(());
            }
            // Resolved here so that an unknown name is reported on its own line
            self.entry_item(session, &record.name, &record.location)?;

            let records = structures.entry(record.tpsd).or_insert_with(|| {
                order.push(record.tpsd);
                Vec::new()
            });
            records.push(record);
            Ok(())
        })?;

        for records in structures.values_mut() {
            records.sort_by_key(|r| r.position);
        }

        let packets: Vec<_> = self
            .packets
            .iter()
            .filter_map(|p| p.tpsd.map(|tpsd| (tpsd, p.spid, p.dfhsize)))
            .collect();
        for tpsd in order {
            let Some(records) = structures.get(&tpsd) else {
                continue;
            };
            for &(_, spid, dfhsize) in packets.iter().filter(|(t, _, _)| *t == tpsd) {
                let Some(&container) = self.spid_containers.get(&spid) else {
                    debug!("Packet {} has no container, structure {} skipped", spid, tpsd);
                    continue;
                };
                let outcome = self.expand_group(session, container, 8 * dfhsize, records);
                session.recover(outcome)?;
            }
        }

        info!("Expanded {} variable packet structures", structures.len());
        Ok(())
    }

    /// Append the entries of `records` to `container`
    ///
    /// `start` is the bit position of the first entry in the container.
    /// Nothing is added to the model unless the whole structure expands.
    fn expand_group(
        &mut self,
        session: &mut Session,
        container: ContainerId,
        start: i64,
        records: &[VpdRecord],
    ) -> Result<()> {
        let parent = session.db.container(container).name.clone();
        let entries = self.collect_entries(session, &parent, start, records)?;
        for entry in entries {
            let entry = commit_entry(session, entry)?;
            session.db.container_mut(container).add_entry(entry);
        }
        Ok(())
    }

    fn collect_entries(
        &mut self,
        session: &Session,
        parent: &str,
        start: i64,
        records: &[VpdRecord],
    ) -> Result<Vec<PendingEntry>> {
        let mut entries = Vec::with_capacity(records.len());
        let mut i = 0;
        while i < records.len() {
            let record = &records[i];
            let location = if i == 0 {
                EntryLocation::ContainerStart(start + record.offset)
            } else {
                EntryLocation::PreviousEntry(record.offset)
            };
            let item = self.entry_item(session, &record.name, &record.location)?;
            entries.push(PendingEntry::Entry(ContainerEntry::new(item, location)));
            i += 1;

            if record.group_size == 0 {
                continue;
            }
            let size = record.group_size as usize;
            if i + size > records.len() {
                return Err(MibError::structure(format!(
                    "{}: group of {} elements counted by '{}' exceeds the {} remaining elements",
                    record.location,
                    size,
                    record.name,
                    records.len() - i
                )));
            }
            let repeat = Repeat {
                count: self.repeat_count(session, record)?,
                offset_bits: 0,
            };

            let next = &records[i];
            if size == 1 && next.group_size == 0 {
                let item = self.entry_item(session, &next.name, &next.location)?;
                let entry = ContainerEntry::new(item, EntryLocation::PreviousEntry(next.offset))
                    .with_repeat(repeat);
                entries.push(PendingEntry::Entry(entry));
            } else {
                self.nested_groups += 1;
                let name = format!("{}_{}", parent, self.nested_groups);
                if session.db.container_by_name(&name).is_some() {
                    return Err(MibError::structure(format!(
                        "{}: container '{}' already exists",
                        record.location, name
                    )));
                }
                let nested = self.collect_entries(session, &name, 0, &records[i..i + size])?;
                entries.push(PendingEntry::Nested {
                    name,
                    entries: nested,
                    repeat,
                });
            }
            i += size;
        }
        Ok(entries)
    }

    fn repeat_count(&self, session: &Session, counter: &VpdRecord) -> Result<RepeatCount> {
        if counter.fixed_repetitions > 0 {
            let count = u32::try_from(counter.fixed_repetitions).map_err(|_| {
                MibError::data(
                    &counter.location,
                    format!("invalid VPD_FIXREP {}", counter.fixed_repetitions),
                )
            })?;
            return Ok(RepeatCount::Fixed(count));
        }
        match self.entry_item(session, &counter.name, &counter.location)? {
            EntryItem::Parameter(id) => Ok(RepeatCount::Dynamic(id)),
            _ => Err(MibError::data(
                &counter.location,
                format!("group counter '{}' must be a concrete parameter", counter.name),
            )),
        }
    }
}

/// Entry of a structure being expanded, not yet added to the model
enum PendingEntry {
    Entry(ContainerEntry),
    Nested {
        name: String,
        entries: Vec<PendingEntry>,
        repeat: Repeat,
    },
}

fn commit_entry(session: &mut Session, entry: PendingEntry) -> Result<ContainerEntry> {
    match entry {
        PendingEntry::Entry(entry) => Ok(entry),
        PendingEntry::Nested {
            name,
            entries,
            repeat,
        } => {
            let mut container = SequenceContainer::new(name);
            for entry in entries {
                container.add_entry(commit_entry(session, entry)?);
            }
            let id = session
                .db
                .add_container(container)
                .map_err(|e| MibError::structure(e.to_string()))?;
            Ok(
                ContainerEntry::new(EntryItem::Container(id), EntryLocation::PreviousEntry(0))
                    .with_repeat(repeat),
            )
        }
    }
}
