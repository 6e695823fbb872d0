//! Command table records

use crate::error::{Location, Result};
use crate::reader::Row;

pub(crate) mod tcp {
    pub const ID: usize = 0;
}

pub(crate) mod pcpc {
    pub const NAME: usize = 0;
    pub const DESC: usize = 1;
    pub const CODE: usize = 2;
}

pub(crate) mod pcdf {
    pub const TCNAME: usize = 0;
    pub const DESC: usize = 1;
    pub const TYPE: usize = 2;
    pub const LEN: usize = 3;
    pub const BIT: usize = 4;
    pub const PNAME: usize = 5;
    pub const VALUE: usize = 6;
}

pub(crate) mod cpc {
    pub const PNAME: usize = 0;
    pub const DESCR: usize = 1;
    pub const PTC: usize = 2;
    pub const PFC: usize = 3;
    pub const UNIT: usize = 6;
    pub const CATEG: usize = 7;
    pub const PRFREF: usize = 8;
    pub const CCAREF: usize = 9;
    pub const PAFREF: usize = 10;
    pub const INTER: usize = 11;
    pub const DEFVAL: usize = 12;
    pub const CORR: usize = 13;
    pub const OBTID: usize = 14;
}

pub(crate) mod cdf {
    pub const CNAME: usize = 0;
    pub const ELTYPE: usize = 1;
    pub const DESCR: usize = 2;
    pub const ELLEN: usize = 3;
    pub const BIT: usize = 4;
    pub const GRPSIZE: usize = 5;
    pub const PNAME: usize = 6;
    pub const INTER: usize = 7;
    pub const VALUE: usize = 8;
    pub const TMID: usize = 9;
    pub const VPLB: usize = 11;
}

pub(crate) mod ccf {
    pub const CNAME: usize = 0;
    pub const DESCR: usize = 1;
    pub const DESCR2: usize = 2;
    pub const CRITICAL: usize = 4;
    pub const PKTID: usize = 5;
    pub const TYPE: usize = 6;
    pub const STYPE: usize = 7;
    pub const APID: usize = 8;
    pub const ACK: usize = 19;
}

pub(crate) mod ptv {
    pub const CNAME: usize = 0;
    pub const PARNAM: usize = 1;
    pub const INTER: usize = 2;
    pub const VAL: usize = 3;
}

pub(crate) mod cve {
    pub const CVSID: usize = 0;
    pub const PARNAM: usize = 1;
    pub const INTER: usize = 2;
    pub const VAL: usize = 3;
    pub const TOL: usize = 4;
    pub const CHECK: usize = 5;
}

pub(crate) mod cvs {
    pub const ID: usize = 0;
    pub const TYPE: usize = 1;
    pub const SOURCE: usize = 2;
    pub const START: usize = 3;
    pub const INTERVAL: usize = 4;
    pub const UNCERTAINTY: usize = 6;
}

pub(crate) mod cvp {
    pub const TASK: usize = 0;
    pub const TYPE: usize = 1;
    pub const CVSID: usize = 2;
}

/// A command parameter (`CPC`)
#[derive(Debug, Clone, PartialEq)]
pub struct CpcRecord {
    pub location: Location,
    pub name: String,
    pub description: Option<String>,
    pub ptc: i32,
    pub pfc: i32,
    pub unit: Option<String>,
    /// C(alibrated), T(extual), N(one), P(arameter id) or A(scii/binary)
    pub categ: char,
    pub prfref: Option<String>,
    pub ccaref: Option<String>,
    pub pafref: Option<String>,
    pub inter: char,
    pub default_value: Option<String>,
    pub correlate: bool,
    pub obtid: Option<i64>,
}

impl CpcRecord {
    pub fn from_row(row: &Row) -> Result<Self> {
        row.require(&[cpc::PNAME, cpc::PTC, cpc::PFC])?;
        Ok(Self {
            location: row.location().clone(),
            name: row.str(cpc::PNAME)?.to_string(),
            description: row.opt_str(cpc::DESCR).map(str::to_string),
            ptc: row.i32(cpc::PTC)?,
            pfc: row.i32(cpc::PFC)?,
            unit: row.opt_str(cpc::UNIT).map(str::to_string),
            categ: row.flag_or(cpc::CATEG, 'N'),
            prfref: row.opt_str(cpc::PRFREF).map(str::to_string),
            ccaref: row.opt_str(cpc::CCAREF).map(str::to_string),
            pafref: row.opt_str(cpc::PAFREF).map(str::to_string),
            inter: row.flag_or(cpc::INTER, 'R'),
            default_value: row.opt_str(cpc::DEFVAL).map(str::to_string),
            correlate: row.flag_or(cpc::CORR, 'Y') == 'Y',
            obtid: row.opt_int(cpc::OBTID)?,
        })
    }
}

/// Kind of a command element (`CDF_ELTYPE`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Constant bit pattern
    FixedArea,
    /// Argument whose value is bound by the command
    Fixed,
    Editable,
}

/// Origin of an element's value (`CDF_INTER`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Raw,
    Engineering,
    /// The default value of the command parameter
    ParameterDefault,
    /// The current value of the telemetry parameter named by `CDF_TMID`
    Telemetry,
}

/// A command element (`CDF`)
#[derive(Debug, Clone, PartialEq)]
pub struct CdfRecord {
    pub location: Location,
    pub kind: ElementKind,
    pub description: Option<String>,
    pub length_bits: u32,
    pub bit: i64,
    /// Number of following elements repeated as many times as this one's value
    pub group_size: usize,
    /// Command parameter, absent for fixed areas
    pub parameter: Option<String>,
    pub source: ValueSource,
    pub value: Option<String>,
    pub tmid: Option<String>,
    pub vplb: i32,
}

impl CdfRecord {
    pub fn from_row(row: &Row, default_vplb: i32) -> Result<Self> {
        row.require(&[cdf::CNAME, cdf::ELTYPE, cdf::ELLEN, cdf::BIT])?;
        let kind = match row.flag_or(cdf::ELTYPE, 'E') {
            'A' => ElementKind::FixedArea,
            'F' => ElementKind::Fixed,
            'E' => ElementKind::Editable,
            other => return Err(row.data(format!("unsupported CDF_ELTYPE '{}'", other))),
        };
        if kind != ElementKind::FixedArea && !row.has(cdf::PNAME) {
            return Err(row.data("argument element without CDF_PNAME"));
        }
        let source = match row.flag_or(cdf::INTER, 'R') {
            'R' => ValueSource::Raw,
            'E' => ValueSource::Engineering,
            'D' => ValueSource::ParameterDefault,
            'T' => ValueSource::Telemetry,
            other => return Err(row.data(format!("invalid CDF_INTER '{}'", other))),
        };
        let group_size = row.int_or(cdf::GRPSIZE, 0)?;
        let group_size = usize::try_from(group_size)
            .map_err(|_| row.data(format!("negative CDF_GRPSIZE {}", group_size)))?;
        let length_bits = row.int(cdf::ELLEN)?;
        let length_bits = u32::try_from(length_bits)
            .map_err(|_| row.data(format!("invalid CDF_ELLEN {}", length_bits)))?;

        Ok(Self {
            location: row.location().clone(),
            kind,
            description: row.opt_str(cdf::DESCR).map(str::to_string),
            length_bits,
            bit: row.int(cdf::BIT)?,
            group_size,
            parameter: row.opt_str(cdf::PNAME).map(str::to_string),
            source,
            value: row.opt_str(cdf::VALUE).map(str::to_string),
            tmid: row.opt_str(cdf::TMID).map(str::to_string),
            vplb: row.i32_or(cdf::VPLB, default_vplb)?,
        })
    }

    pub fn is_argument(&self) -> bool {
        self.kind != ElementKind::FixedArea
    }
}
