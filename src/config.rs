//! Configuration management and validation.
//!
//! Provides the compilation options: MIB location, output naming, the time
//! epoch of absolute time parameters, PUS packet layout offsets and the
//! strict/non-strict error policy.

use crate::constants::{
    DEFAULT_EPOCH, DEFAULT_SEPARATOR, DEFAULT_SPACE_SYSTEM_NAME, DEFAULT_TABLE_EXTENSION,
    DEFAULT_VBL_PARAM_LENGTH_BYTES, TCO_EPOCH, layout,
};
use crate::error::{MibError, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Telemetry layout options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmConfig {
    /// Byte offset of the PUS service type in every TM packet
    pub type_offset: u32,

    /// Byte offset of the PUS service subtype in every TM packet
    pub subtype_offset: u32,

    /// Byte offset of the echoed request id in PUS(1,x) reports
    pub pus1_data_offset: u32,

    /// Default width in bytes of the size tag of variable length parameters
    pub vbl_param_length_bytes: i32,
}

impl Default for TmConfig {
    fn default() -> Self {
        Self {
            type_offset: layout::DEFAULT_TYPE_OFFSET,
            subtype_offset: layout::DEFAULT_SUBTYPE_OFFSET,
            pus1_data_offset: layout::DEFAULT_PUS1_DATA_OFFSET,
            vbl_param_length_bytes: DEFAULT_VBL_PARAM_LENGTH_BYTES,
        }
    }
}

/// Telecommand options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcConfig {
    /// Default width in bytes of the size tag of variable length arguments
    pub vbl_param_length_bytes: i32,

    /// Keep the header APID as an editable argument instead of fixing it
    pub allow_apid_override: bool,

    /// Keep the header acknowledgement flags as an editable argument
    pub allow_ack_override: bool,

    /// Default verification uncertainty in seconds (CVS_UNCERTAINTY)
    pub uncertainty_period: i64,
}

impl Default for TcConfig {
    fn default() -> Self {
        Self {
            vbl_param_length_bytes: DEFAULT_VBL_PARAM_LENGTH_BYTES,
            allow_apid_override: false,
            allow_ack_override: false,
            uncertainty_period: 0,
        }
    }
}

/// Epochs known by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommonEpoch {
    Tai,
    J2000,
    Unix,
    Gps,
}

/// Reference of absolute time parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TimeEpoch {
    Common(CommonEpoch),
    DateTime(NaiveDateTime),
    /// Times correlated by an on-board/ground time correlation service
    Correlated {
        service: String,
        fine_bytes: Option<u8>,
    },
}

impl TimeEpoch {
    /// Fine byte width of the reference clock, when times are correlated
    pub fn reference_fine_bytes(&self) -> Option<u8> {
        match self {
            TimeEpoch::Correlated { fine_bytes, .. } => *fine_bytes,
            _ => None,
        }
    }
}

/// Main configuration structure for a compilation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MibConfig {
    /// Directory containing the MIB table files
    pub path: PathBuf,

    /// Name of the generated space system
    pub space_system_name: String,

    /// `TAI`, `J2000`, `UNIX`, `GPS`, an ISO date-time or `TCO`
    pub epoch: String,

    /// Time correlation service, required with the `TCO` epoch
    pub tco_service: Option<String>,

    /// Fine byte width of the correlated reference clock
    pub tco_fine_bytes: Option<u8>,

    /// Abort on the first error instead of accumulating diagnostics
    pub strict: bool,

    pub separator: char,

    pub file_extension: String,

    /// Add `TM(t,s)`/`TC(t,s)` aliases in the PUS namespace
    pub generate_pus_namespace: bool,

    pub tm: TmConfig,

    pub tc: TcConfig,
}

impl Default for MibConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            space_system_name: DEFAULT_SPACE_SYSTEM_NAME.to_string(),
            epoch: DEFAULT_EPOCH.to_string(),
            tco_service: None,
            tco_fine_bytes: None,
            strict: false,
            separator: DEFAULT_SEPARATOR,
            file_extension: DEFAULT_TABLE_EXTENSION.to_string(),
            generate_pus_namespace: true,
            tm: TmConfig::default(),
            tc: TcConfig::default(),
        }
    }
}

impl MibConfig {
    /// Create a configuration for the MIB stored at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_space_system_name(mut self, name: impl Into<String>) -> Self {
        self.space_system_name = name.into();
        self
    }

    pub fn with_epoch(mut self, epoch: impl Into<String>) -> Self {
        self.epoch = epoch.into();
        self
    }

    pub fn with_tco(mut self, service: impl Into<String>, fine_bytes: Option<u8>) -> Self {
        self.epoch = TCO_EPOCH.to_string();
        self.tco_service = Some(service.into());
        self.tco_fine_bytes = fine_bytes;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_tm(mut self, tm: TmConfig) -> Self {
        self.tm = tm;
        self
    }

    pub fn with_tc(mut self, tc: TcConfig) -> Self {
        self.tc = tc;
        self
    }

    /// Path of the file holding `table`
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.path.join(format!("{}.{}", table, self.file_extension))
    }

    /// Interpret the `epoch` option
    pub fn resolve_epoch(&self) -> Result<TimeEpoch> {
        let epoch = self.epoch.trim();
        let common = match epoch.to_ascii_uppercase().as_str() {
            "TAI" => Some(CommonEpoch::Tai),
            "J2000" => Some(CommonEpoch::J2000),
            "UNIX" => Some(CommonEpoch::Unix),
            "GPS" => Some(CommonEpoch::Gps),
            _ => None,
        };
        if let Some(common) = common {
            return Ok(TimeEpoch::Common(common));
        }

        if epoch.eq_ignore_ascii_case(TCO_EPOCH) {
            let service = self.tco_service.clone().ok_or_else(|| {
                MibError::configuration("epoch TCO requires the tco_service option")
            })?;
            return Ok(TimeEpoch::Correlated {
                service,
                fine_bytes: self.tco_fine_bytes,
            });
        }

        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(epoch, format) {
                return Ok(TimeEpoch::DateTime(datetime));
            }
        }
        if let Ok(datetime) = DateTime::parse_from_rfc3339(epoch) {
            return Ok(TimeEpoch::DateTime(datetime.naive_utc()));
        }

        Err(MibError::configuration(format!(
            "cannot parse epoch '{}': expected TAI, J2000, UNIX, GPS, TCO or an ISO date-time",
            epoch
        )))
    }

    /// Validate option values before a compilation pass
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(MibError::configuration("the MIB path is not set"));
        }
        if self.space_system_name.trim().is_empty() {
            return Err(MibError::configuration("space_system_name must not be empty"));
        }
        if self.file_extension.is_empty() {
            return Err(MibError::configuration("file_extension must not be empty"));
        }
        if self.separator == '\n' || self.separator == '\r' {
            return Err(MibError::configuration(
                "the column separator cannot be a line terminator",
            ));
        }
        if self.tm.vbl_param_length_bytes < 1 {
            return Err(MibError::configuration(format!(
                "tm.vbl_param_length_bytes must be at least 1, got {}",
                self.tm.vbl_param_length_bytes
            )));
        }
        if self.tc.vbl_param_length_bytes < 0 {
            return Err(MibError::configuration(format!(
                "tc.vbl_param_length_bytes must not be negative, got {}",
                self.tc.vbl_param_length_bytes
            )));
        }
        self.resolve_epoch()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = MibConfig::new("/mib");

        assert_eq!(config.space_system_name, "MIB");
        assert_eq!(config.separator, '\t');
        assert!(!config.strict);
        assert_eq!(config.tm.vbl_param_length_bytes, 1);
        assert_eq!(config.table_path("pcf"), PathBuf::from("/mib/pcf.dat"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_named_and_datetime_epochs() {
        let config = MibConfig::new("/mib").with_epoch("gps");
        assert_eq!(
            config.resolve_epoch().unwrap(),
            TimeEpoch::Common(CommonEpoch::Gps)
        );

        let config = MibConfig::new("/mib").with_epoch("2000-01-01T12:00:00");
        match config.resolve_epoch().unwrap() {
            TimeEpoch::DateTime(dt) => {
                assert_eq!(dt.to_string(), "2000-01-01 12:00:00");
            }
            other => panic!("Expected date-time epoch, got {:?}", other),
        }
    }

    #[test]
    fn test_tco_epoch_requires_service() {
        let config = MibConfig::new("/mib").with_epoch("TCO");
        assert!(matches!(
            config.validate().unwrap_err(),
            MibError::Configuration { .. }
        ));

        let config = MibConfig::new("/mib").with_tco("tco0", Some(3));
        let epoch = config.resolve_epoch().unwrap();
        assert_eq!(epoch.reference_fine_bytes(), Some(3));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = MibConfig::new("/mib").with_epoch("yesterday");
        assert!(config.validate().is_err());

        let mut config = MibConfig::new("/mib");
        config.tm.vbl_param_length_bytes = 0;
        assert!(config.validate().is_err());

        assert!(MibConfig::default().validate().is_err());
    }

    #[test]
    fn test_load_partial_json_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"path": "/data/mib", "strict": true, "tm": {{"type_offset": 9}}}}"#
        )
        .unwrap();

        let config = MibConfig::from_json_file(file.path()).unwrap();

        assert_eq!(config.path, PathBuf::from("/data/mib"));
        assert!(config.strict);
        assert_eq!(config.tm.type_offset, 9);
        assert_eq!(config.tm.subtype_offset, layout::DEFAULT_SUBTYPE_OFFSET);
        assert_eq!(config.space_system_name, "MIB");
    }
}
