//! Error handling for MIB compilation.
//!
//! Provides error types carrying the table file and line that produced them,
//! so that diagnostics accumulated in non-strict mode can be traced back to
//! the offending record.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Position of a record inside a MIB table file (1-based line)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Failure of the encoding resolver for a (ptc, pfc) pair
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown parameter type (ptc,pfc): ({ptc},{pfc})")]
    UnknownType { ptc: i32, pfc: i32 },

    #[error("invalid size tag width {vplb} for variable length parameter")]
    InvalidSizeTag { vplb: i32 },

    #[error("invalid combination (ptc,pfc) ({ptc},{pfc}): {reason}")]
    InvalidCombination { ptc: i32, pfc: i32, reason: String },
}

#[derive(Error, Debug)]
pub enum MibError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table file not found: {path}")]
    TableNotFound { path: PathBuf },

    #[error("Missing table files in {root}: {}", .missing.join(", "))]
    MissingTables { root: PathBuf, missing: Vec<String> },

    #[error("{location}: missing column {column}")]
    MissingColumn { location: Location, column: usize },

    #[error("{location}: cannot parse '{value}' in column {column} as {expected}")]
    InvalidColumn {
        location: Location,
        column: usize,
        value: String,
        expected: &'static str,
    },

    #[error("{location}: {message}")]
    Reference { location: Location, message: String },

    #[error("{location}: {message}")]
    Data { location: Location, message: String },

    #[error("{location}: {source}")]
    Type {
        location: Location,
        #[source]
        source: TypeError,
    },

    #[error("{message}")]
    Structure { message: String },

    #[error("Synthetic parameter '{parameter}': {message}")]
    Synthetic { parameter: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl MibError {
    /// Create a reference error (a record naming an undeclared entity)
    pub fn reference(location: &Location, message: impl Into<String>) -> Self {
        Self::Reference {
            location: location.clone(),
            message: message.into(),
        }
    }

    /// Create a data error (a record whose values are not acceptable)
    pub fn data(location: &Location, message: impl Into<String>) -> Self {
        Self::Data {
            location: location.clone(),
            message: message.into(),
        }
    }

    pub fn type_error(location: &Location, source: TypeError) -> Self {
        Self::Type {
            location: location.clone(),
            source,
        }
    }

    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Table position of the record that caused the error, if any
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::MissingColumn { location, .. }
            | Self::InvalidColumn { location, .. }
            | Self::Reference { location, .. }
            | Self::Data { location, .. }
            | Self::Type { location, .. } => Some(location),
            _ => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.location().map(|l| l.line)
    }

    /// Errors that abort the pass regardless of the strict flag
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Json(_)
                | Self::TableNotFound { .. }
                | Self::MissingTables { .. }
                | Self::Configuration { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MibError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_display_includes_file_and_line() {
        let location = Location::new("pcf.dat", 12);
        let err = MibError::reference(&location, "unknown calibration 'CAL1'");

        assert_eq!(err.to_string(), "pcf.dat:12: unknown calibration 'CAL1'");
        assert_eq!(err.line(), Some(12));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_type_error_wrapped_with_location() {
        let location = Location::new("cpc.dat", 3);
        let err = MibError::type_error(&location, TypeError::UnknownType { ptc: 42, pfc: 1 });

        assert_eq!(
            err.to_string(),
            "cpc.dat:3: unknown parameter type (ptc,pfc): (42,1)"
        );
    }

    #[test]
    fn test_missing_tables_lists_every_table() {
        let err = MibError::MissingTables {
            root: PathBuf::from("/mib"),
            missing: vec!["pcf".to_string(), "cur".to_string()],
        };

        assert_eq!(err.to_string(), "Missing table files in /mib: pcf, cur");
        assert!(err.is_fatal());
        assert_eq!(err.location(), None);
    }
}
