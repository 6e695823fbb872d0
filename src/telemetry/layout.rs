//! Fixed packet layout (`PLF`)

use super::TelemetryBuilder;
use super::records::plf;
use crate::constants::{NAMESPACE_OBPID, tables};
use crate::error::{Location, MibError, Result};
use crate::model::{ContainerEntry, EntryItem, EntryLocation, Repeat, RepeatCount};
use crate::session::Session;
use tracing::{debug, warn};

impl TelemetryBuilder {
    pub(crate) fn load_fixed_layout(&mut self, session: &mut Session) -> Result<()> {
        let mut entries = 0;
        session.scan(tables::PLF, |session, row| {
            row.require(&[plf::NAME, plf::SPID, plf::OFFBY, plf::OFFBI])?;
            let name = row.str(plf::NAME)?;
            let spid = row.int(plf::SPID)?;

            let Some(&container) = self.spid_containers.get(&spid) else {
                warn!("{}: PLF references unknown packet {}, skipped", row.location(), spid);
                return Ok(());
            };
            if self.saved_synthetic.contains(name) {
                debug!("{}: saved synthetic parameter {} skipped", row.location(), name);
                return Ok(());
            }

            let location = 8 * row.int(plf::OFFBY)? + row.int(plf::OFFBI)?;
            let occurrences = row.int_or(plf::NBOCC, 1)?;
            let gap = row.int_or(plf::LGOCC, 0)?;
            let count = u32::try_from(occurrences)
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| row.data(format!("invalid PLF_NBOCC {}", occurrences)))?;
            let gap = u32::try_from(gap)
                .map_err(|_| row.data(format!("invalid PLF_LGOCC {}", gap)))?;

            let item = self.entry_item(session, name, row.location())?;
            let mut entry = ContainerEntry::new(item, EntryLocation::ContainerStart(location));
            if count > 1 {
                entry = entry.with_repeat(Repeat {
                    count: RepeatCount::Fixed(count),
                    offset_bits: gap,
                });
            }
            session.db.container_mut(container).add_entry(entry);
            entries += 1;
            Ok(())
        })?;

        debug!("Placed {} fixed layout entries", entries);
        Ok(())
    }

    /// Container entry item for a parameter name
    ///
    /// Deduced parameters become an indirection through their related
    /// parameter, whose value is an on-board parameter id.
    pub(crate) fn entry_item(
        &self,
        session: &Session,
        name: &str,
        location: &Location,
    ) -> Result<EntryItem> {
        if let Some(deduced) = self.deduced.get(name) {
            let related = deduced.related.as_deref().unwrap_or_default();
            let selector = session.db.parameter_by_name(related).ok_or_else(|| {
                MibError::reference(
                    location,
                    format!("deduced parameter '{}' relates to unknown '{}'", name, related),
                )
            })?;
            return Ok(EntryItem::IndirectParameter {
                selector,
                namespace: NAMESPACE_OBPID.to_string(),
            });
        }

        session
            .db
            .parameter_by_name(name)
            .map(EntryItem::Parameter)
            .ok_or_else(|| MibError::reference(location, format!("unknown parameter '{}'", name)))
    }
}
