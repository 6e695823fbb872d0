//! Telemetry table records
//!
//! Each record keeps the [`Location`] it was read from so that errors raised
//! while building the model point back at the table line.

use crate::error::{Location, Result};
use crate::reader::Row;
use regex::Regex;
use std::sync::LazyLock;

static PARAMETER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+$").expect("parameter name pattern"));

pub(crate) mod pcf {
    pub const PNAME: usize = 0;
    pub const DESCR: usize = 1;
    pub const PID: usize = 2;
    pub const UNIT: usize = 3;
    pub const PTC: usize = 4;
    pub const PFC: usize = 5;
    pub const RELATED: usize = 8;
    pub const CATEG: usize = 9;
    pub const NATUR: usize = 10;
    pub const CURTX: usize = 11;
    pub const INTER: usize = 12;
    pub const USCON: usize = 13;
    pub const PARVAL: usize = 15;
    pub const VPLB: usize = 24;
}

pub(crate) mod pic {
    pub const TYPE: usize = 0;
    pub const STYPE: usize = 1;
    pub const PI1_OFF: usize = 2;
    pub const PI1_WID: usize = 3;
    pub const PI2_OFF: usize = 4;
    pub const PI2_WID: usize = 5;
    pub const APID: usize = 6;
}

pub(crate) mod pid {
    pub const TYPE: usize = 0;
    pub const STYPE: usize = 1;
    pub const APID: usize = 2;
    pub const PI1_VAL: usize = 3;
    pub const PI2_VAL: usize = 4;
    pub const SPID: usize = 5;
    pub const DESCR: usize = 6;
    pub const TPSD: usize = 8;
    pub const DFHSIZE: usize = 9;
    pub const VALID: usize = 12;
}

pub(crate) mod tpcf {
    pub const SPID: usize = 0;
    pub const NAME: usize = 1;
    pub const SIZE: usize = 2;
}

pub(crate) mod plf {
    pub const NAME: usize = 0;
    pub const SPID: usize = 1;
    pub const OFFBY: usize = 2;
    pub const OFFBI: usize = 3;
    pub const NBOCC: usize = 4;
    pub const LGOCC: usize = 5;
}

pub(crate) mod vpd {
    pub const TPSD: usize = 0;
    pub const POS: usize = 1;
    pub const NAME: usize = 2;
    pub const GRPSIZE: usize = 3;
    pub const FIXREP: usize = 4;
    pub const OFFSET: usize = 13;
}

pub(crate) mod ocp {
    pub const NAME: usize = 0;
    pub const POS: usize = 1;
    pub const TYPE: usize = 2;
    pub const LVALU: usize = 3;
    pub const HVALU: usize = 4;
    pub const RLCHK: usize = 5;
    pub const VALPAR: usize = 6;
}

pub(crate) mod ocf {
    pub const NAME: usize = 0;
    pub const NBCHCK: usize = 1;
    pub const NBOOL: usize = 2;
    pub const INTER: usize = 3;
    pub const CODIN: usize = 4;
}

/// A monitoring parameter declaration (`PCF`)
#[derive(Debug, Clone, PartialEq)]
pub struct PcfRecord {
    pub location: Location,
    pub name: String,
    pub description: Option<String>,
    /// On-board parameter id
    pub pid: Option<i64>,
    pub unit: Option<String>,
    pub ptc: i32,
    pub pfc: i32,
    /// Parameter holding the on-board id of a deduced parameter's value
    pub related: Option<String>,
    pub categ: char,
    pub natur: char,
    pub curtx: Option<String>,
    pub inter: Option<char>,
    pub uscon: bool,
    pub parval: Option<String>,
    pub vplb: i32,
}

impl PcfRecord {
    pub fn from_row(row: &Row, default_vplb: i32) -> Result<Self> {
        row.require(&[pcf::PNAME, pcf::PTC, pcf::PFC, pcf::CATEG, pcf::NATUR])?;
        let name = row.str(pcf::PNAME)?;
        if !PARAMETER_NAME.is_match(name) {
            return Err(row.data(format!("invalid parameter name '{}'", name)));
        }

        Ok(Self {
            location: row.location().clone(),
            name: name.to_string(),
            description: row.opt_str(pcf::DESCR).map(str::to_string),
            pid: row.opt_int(pcf::PID)?,
            unit: row.opt_str(pcf::UNIT).map(str::to_string),
            ptc: row.i32(pcf::PTC)?,
            pfc: row.i32(pcf::PFC)?,
            related: row.opt_str(pcf::RELATED).map(str::to_string),
            categ: row.flag_or(pcf::CATEG, 'N'),
            natur: row.flag_or(pcf::NATUR, 'R'),
            curtx: row.opt_str(pcf::CURTX).map(str::to_string),
            inter: row.opt_str(pcf::INTER).and_then(|v| v.chars().next()),
            uscon: row.flag_or(pcf::USCON, 'N') == 'Y',
            parval: row.opt_str(pcf::PARVAL).map(str::to_string),
            vplb: row.i32_or(pcf::VPLB, default_vplb)?,
        })
    }

    /// Value of a constant parameter
    pub fn constant_value(&self) -> Option<&str> {
        if self.natur == 'C' {
            self.parval.as_deref()
        } else {
            None
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.natur == 'D'
    }
}

/// A packet identification rule (`PIC`)
#[derive(Debug, Clone, PartialEq)]
pub struct PicRecord {
    pub location: Location,
    pub packet_type: i64,
    pub subtype: i64,
    pub pi1_offset: i64,
    pub pi1_width: i64,
    pub pi2_offset: i64,
    pub pi2_width: i64,
    /// `None` matches every APID
    pub apid: Option<i64>,
}

impl PicRecord {
    pub fn from_row(row: &Row) -> Result<Self> {
        row.require(&[
            pic::TYPE,
            pic::STYPE,
            pic::PI1_OFF,
            pic::PI1_WID,
            pic::PI2_OFF,
            pic::PI2_WID,
        ])?;
        Ok(Self {
            location: row.location().clone(),
            packet_type: row.int(pic::TYPE)?,
            subtype: row.int(pic::STYPE)?,
            pi1_offset: row.int(pic::PI1_OFF)?,
            pi1_width: row.int(pic::PI1_WID)?,
            pi2_offset: row.int(pic::PI2_OFF)?,
            pi2_width: row.int(pic::PI2_WID)?,
            apid: row.opt_int(pic::APID)?,
        })
    }
}

/// A telemetry packet definition (`PID`)
#[derive(Debug, Clone, PartialEq)]
pub struct PidRecord {
    pub location: Location,
    pub packet_type: i64,
    pub subtype: i64,
    pub apid: i64,
    pub pi1: i64,
    pub pi2: i64,
    pub spid: i64,
    pub description: Option<String>,
    /// Variable packet structure, if any
    pub tpsd: Option<i64>,
    /// Data field header size in bytes
    pub dfhsize: i64,
    pub valid: bool,
}

impl PidRecord {
    pub fn from_row(row: &Row) -> Result<Self> {
        row.require(&[pid::TYPE, pid::STYPE, pid::APID, pid::SPID, pid::DFHSIZE])?;
        Ok(Self {
            location: row.location().clone(),
            packet_type: row.int(pid::TYPE)?,
            subtype: row.int(pid::STYPE)?,
            apid: row.int(pid::APID)?,
            pi1: row.int_or(pid::PI1_VAL, 0)?,
            pi2: row.int_or(pid::PI2_VAL, 0)?,
            spid: row.int(pid::SPID)?,
            description: row.opt_str(pid::DESCR).map(str::to_string),
            tpsd: row.opt_int(pid::TPSD)?.filter(|&t| t >= 0),
            dfhsize: row.int(pid::DFHSIZE)?,
            valid: row.flag_or(pid::VALID, 'Y') != 'N',
        })
    }

    /// Grouping key of packets sharing their PUS discriminators
    pub fn group_key(&self) -> (i64, i64, i64) {
        (self.apid, self.packet_type, self.subtype)
    }
}

/// A variable packet structure element (`VPD`)
#[derive(Debug, Clone, PartialEq)]
pub struct VpdRecord {
    pub location: Location,
    pub tpsd: i64,
    pub position: i64,
    pub name: String,
    /// Number of following elements repeated by this counter
    pub group_size: i64,
    pub fixed_repetitions: i64,
    /// Bits between the end of the previous element and this one
    pub offset: i64,
}

impl VpdRecord {
    pub fn from_row(row: &Row) -> Result<Self> {
        row.require(&[vpd::TPSD, vpd::POS, vpd::NAME])?;
        let group_size = row.int_or(vpd::GRPSIZE, 0)?;
        if group_size < 0 {
            return Err(row.data(format!("negative VPD_GRPSIZE {}", group_size)));
        }
        Ok(Self {
            location: row.location().clone(),
            tpsd: row.int(vpd::TPSD)?,
            position: row.int(vpd::POS)?,
            name: row.str(vpd::NAME)?.to_string(),
            group_size,
            fixed_repetitions: row.int_or(vpd::FIXREP, 0)?,
            offset: row.int_or(vpd::OFFSET, 0)?,
        })
    }
}

/// One limit check of a parameter (`OCP`)
#[derive(Debug, Clone, PartialEq)]
pub struct OcpRecord {
    pub location: Location,
    pub position: i64,
    pub kind: char,
    pub low: Option<String>,
    pub high: Option<String>,
    /// Parameter whose raw value selects when the check applies
    pub rlchk: Option<String>,
    pub valpar: i64,
}

impl OcpRecord {
    pub fn from_row(row: &Row) -> Result<Self> {
        row.require(&[ocp::NAME, ocp::POS, ocp::TYPE])?;
        Ok(Self {
            location: row.location().clone(),
            position: row.int(ocp::POS)?,
            kind: row.flag_or(ocp::TYPE, 'H'),
            low: row.opt_str(ocp::LVALU).map(str::to_string),
            high: row.opt_str(ocp::HVALU).map(str::to_string),
            rlchk: row.opt_str(ocp::RLCHK).map(str::to_string),
            valpar: row.int_or(ocp::VALPAR, 1)?,
        })
    }

    /// Soft limits raise warnings, every other kind is critical
    pub fn is_soft(&self) -> bool {
        self.kind == 'S'
    }

    /// Delta, event and consistency checks have no model counterpart
    pub fn is_supported(&self) -> bool {
        !matches!(self.kind, 'D' | 'E' | 'C')
    }
}
