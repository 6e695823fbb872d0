//! Application constants for the MIB compiler
//!
//! This module contains table mnemonics, reserved names of generated model
//! elements, and default values used throughout the compiler.

// =============================================================================
// Table Files
// =============================================================================

/// Default extension of MIB table files
pub const DEFAULT_TABLE_EXTENSION: &str = "dat";

/// Default column separator
pub const DEFAULT_SEPARATOR: char = '\t';

/// Directory (under the MIB root) holding synthetic parameter definitions
pub const SYNTHETIC_DIR_NAME: &str = "synthetic";

/// Table mnemonics, used as file stems
pub mod tables {
    pub const VDF: &str = "vdf";

    // Telemetry calibrations
    pub const CAF: &str = "caf";
    pub const CAP: &str = "cap";
    pub const TXF: &str = "txf";
    pub const TXP: &str = "txp";
    pub const MCF: &str = "mcf";
    pub const LGF: &str = "lgf";
    pub const CUR: &str = "cur";

    // Telemetry parameters and packets
    pub const PCF: &str = "pcf";
    pub const PIC: &str = "pic";
    pub const PID: &str = "pid";
    pub const TPCF: &str = "tpcf";
    pub const PLF: &str = "plf";
    pub const VPD: &str = "vpd";
    pub const OCF: &str = "ocf";
    pub const OCP: &str = "ocp";

    // Commanding
    pub const TCP: &str = "tcp";
    pub const PCPC: &str = "pcpc";
    pub const PCDF: &str = "pcdf";
    pub const CCF: &str = "ccf";
    pub const CDF: &str = "cdf";
    pub const CPC: &str = "cpc";
    pub const CCA: &str = "cca";
    pub const CCS: &str = "ccs";
    pub const PAF: &str = "paf";
    pub const PAS: &str = "pas";
    pub const PRF: &str = "prf";
    pub const PRV: &str = "prv";
    pub const PTV: &str = "ptv";
    pub const CVS: &str = "cvs";
    pub const CVE: &str = "cve";
    pub const CVP: &str = "cvp";

    /// Every table read during a compilation pass
    pub const REQUIRED: &[&str] = &[
        VDF, CAF, CAP, TXF, TXP, MCF, LGF, CUR, PCF, PIC, PID, TPCF, PLF, VPD, OCF, OCP, TCP,
        PCPC, PCDF, CCF, CDF, CPC, CCA, CCS, PAF, PAS, PRF, PRV, PTV, CVS, CVE, CVP,
    ];
}

// =============================================================================
// Generated Model Names
// =============================================================================

/// Root telemetry container every packet derives from
pub const ROOT_CONTAINER_NAME: &str = "ccsds-pus";

pub const PARA_CCSDS_APID: &str = "ccsds_apid";
pub const PARA_CCSDS_SEQCOUNT: &str = "ccsds_seqcount";
pub const PARA_PUS_TYPE: &str = "pus_type";
pub const PARA_PUS_SUBTYPE: &str = "pus_stype";

/// Request identifier echoed in PUS(1,x) verification reports
pub const PARA_PUS1_APID: &str = "pus1_apid";
pub const PARA_PUS1_SEQCOUNT: &str = "pus1_seqcount";

/// Alias namespace of on-board parameter identifiers (PCF_PID)
pub const NAMESPACE_OBPID: &str = "OB:PID";

/// Alias namespace for PUS service/subservice names
pub const NAMESPACE_PUS: &str = "PUS";

/// Commands whose name starts with this prefix are ignored
pub const BINARY_COMMAND_PREFIX: &str = "BINCMD";

/// CCF_PKTID value of commands without a packet header
pub const NO_HEADER: &str = "NOHEADER";

/// Suffix of the generated base holding fixed arguments
pub const ABSTRACT_SUFFIX: &str = "_abstract";

/// Prefix of the shared enumeration used by parameter-id arguments
pub const PARAMETER_ID_TYPE_PREFIX: &str = "parameter_id_";

/// Name prefix of the shared acknowledgement verification algorithms
pub const PUS_VERIFIER_PREFIX: &str = "PUS_Verifier-";

/// Name of the connection test verifier attached to PUS(17,1)
pub const PUS17_VERIFIER_NAME: &str = "PUS17_Report";

// =============================================================================
// CCSDS / PUS Layout
// =============================================================================

pub mod layout {
    /// APID position inside the packet primary header
    pub const APID_BIT_OFFSET: u32 = 5;
    pub const APID_BITS: u32 = 11;

    /// Sequence count position inside the packet primary header
    pub const SEQCOUNT_BIT_OFFSET: u32 = 18;
    pub const SEQCOUNT_BITS: u32 = 14;

    /// Width of the PUS type and subtype discriminators
    pub const PUS_TYPE_BITS: u32 = 8;

    /// Default byte offsets of the PUS discriminators
    pub const DEFAULT_TYPE_OFFSET: u32 = 7;
    pub const DEFAULT_SUBTYPE_OFFSET: u32 = 8;
    pub const DEFAULT_PUS1_DATA_OFFSET: u32 = 16;

    /// Stage codes of PUS(1,x) reports, by verification stage
    pub const ACCEPTANCE_REPORT: u32 = 1;
    pub const START_REPORT: u32 = 3;
    pub const PROGRESS_REPORT: u32 = 5;
    pub const COMPLETION_REPORT: u32 = 7;

    /// Time allowed for the PUS(17,2) answer to a connection test
    pub const PUS17_TIMEOUT_MS: i64 = 15_000;
}

// =============================================================================
// Time Formats
// =============================================================================

/// Sizes in bits of PTC 9/10 time parameters, indexed by PFC
pub const TIME_SIZE_IN_BITS: [i32; 19] = [
    -1, 48, 64, 8, 16, 24, 32, 16, 24, 32, 40, 24, 32, 40, 48, 32, 40, 48, 56,
];

/// PTC 9 format code of the 64-bit absolute time
pub const TIME_PFC_64: i32 = 30;

/// Scale from decoded milliseconds to seconds
pub const TIME_SCALE_MS: f64 = 0.001;

// =============================================================================
// Defaults
// =============================================================================

pub const DEFAULT_SPACE_SYSTEM_NAME: &str = "MIB";
pub const DEFAULT_EPOCH: &str = "1970-01-01T00:00:00";
pub const TCO_EPOCH: &str = "TCO";
pub const DEFAULT_VBL_PARAM_LENGTH_BYTES: i32 = 1;
