//! Compilation session
//!
//! Holds the state shared by every stage of one compilation pass: the
//! configuration, the model under construction and the accumulated
//! diagnostics. All error handling goes through [`Session::recover`], which
//! implements the strict/non-strict policy in one place.

use crate::config::{MibConfig, TimeEpoch};
use crate::error::{MibError, Result};
use crate::model::MissionDatabase;
use crate::reader::{Row, TableReader};
use serde::Serialize;
use tracing::{debug, warn};

/// Result of a compilation pass
#[derive(Debug)]
pub struct CompileOutput {
    pub database: MissionDatabase,
    /// Errors accumulated in non-strict mode, in the order they occurred
    pub errors: Vec<MibError>,
    /// Structural limitations met while building the model
    pub warnings: Vec<String>,
}

impl CompileOutput {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Counters reported after a pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompileStats {
    pub parameter_types: usize,
    pub parameters: usize,
    pub containers: usize,
    pub commands: usize,
    pub algorithms: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl CompileOutput {
    pub fn stats(&self) -> CompileStats {
        CompileStats {
            parameter_types: self.database.parameter_types().len(),
            parameters: self.database.parameters().len(),
            containers: self.database.containers().len(),
            commands: self.database.commands().len(),
            algorithms: self.database.algorithms().len(),
            errors: self.errors.len(),
            warnings: self.warnings.len(),
        }
    }
}

pub struct Session {
    config: MibConfig,
    epoch: TimeEpoch,
    pub(crate) db: MissionDatabase,
    errors: Vec<MibError>,
    warnings: Vec<String>,
}

impl Session {
    pub fn new(config: MibConfig) -> Result<Self> {
        config.validate()?;
        let epoch = config.resolve_epoch()?;
        let db = MissionDatabase::new(config.space_system_name.clone());
        Ok(Self {
            config,
            epoch,
            db,
            errors: Vec::new(),
            warnings: Vec::new(),
        })
    }

    pub fn config(&self) -> &MibConfig {
        &self.config
    }

    pub fn epoch(&self) -> &TimeEpoch {
        &self.epoch
    }

    pub fn is_strict(&self) -> bool {
        self.config.strict
    }

    pub fn open(&self, table: &str) -> Result<TableReader> {
        TableReader::open(
            &self.config.path,
            table,
            &self.config.file_extension,
            self.config.separator,
        )
    }

    /// Read every record of `table`, handing row errors to [`Session::recover`]
    pub fn scan<F>(&mut self, table: &str, mut handle: F) -> Result<usize>
    where
        F: FnMut(&mut Session, &Row) -> Result<()>,
    {
        let mut reader = self.open(table)?;
        let mut rows = 0;
        while let Some(row) = reader.next_row()? {
            rows += 1;
            let outcome = handle(self, &row);
            self.recover(outcome)?;
        }
        debug!("Read {} records from {}", rows, reader.file_name());
        Ok(rows)
    }

    /// Apply the error policy to the outcome of one unit of work
    ///
    /// Fatal errors always propagate. Other errors propagate in strict mode
    /// and are recorded otherwise, letting the caller skip the unit.
    pub fn recover(&mut self, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => self.report(err),
        }
    }

    /// Record a non-fatal error, or return it in strict mode
    pub fn report(&mut self, err: MibError) -> Result<()> {
        if self.config.strict {
            return Err(err);
        }
        warn!("{}", err);
        self.errors.push(err);
        Ok(())
    }

    /// Record a structural limitation: the model is degraded but valid
    pub fn limitation(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn errors(&self) -> &[MibError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn finish(self) -> CompileOutput {
        CompileOutput {
            database: self.db,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;
    use std::fs;
    use tempfile::TempDir;

    fn session(dir: &TempDir, strict: bool) -> Session {
        Session::new(MibConfig::new(dir.path()).with_strict(strict)).unwrap()
    }

    #[test]
    fn test_non_strict_accumulates_and_continues() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pcf.dat"), "A\t1\nB\tx\nC\t3\n").unwrap();
        let mut session = session(&dir, false);

        let mut values = Vec::new();
        let rows = session
            .scan("pcf", |_, row| {
                values.push(row.int(1)?);
                Ok(())
            })
            .unwrap();

        assert_eq!(rows, 3);
        assert_eq!(values, vec![1, 3]);
        assert_eq!(session.errors().len(), 1);
        assert_eq!(session.errors()[0].line(), Some(2));
    }

    #[test]
    fn test_strict_aborts_on_first_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pcf.dat"), "A\tx\nB\ty\n").unwrap();
        let mut session = session(&dir, true);

        let result = session.scan("pcf", |_, row| row.int(1).map(|_| ()));
        match result.unwrap_err() {
            MibError::InvalidColumn { location, .. } => assert_eq!(location.line, 1),
            other => panic!("Expected InvalidColumn, got {:?}", other),
        }
        assert!(session.errors().is_empty());
    }

    #[test]
    fn test_fatal_errors_propagate_in_non_strict_mode() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, false);

        assert!(session.scan("missing", |_, _| Ok(())).is_err());
        let outcome = Err(MibError::configuration("broken"));
        assert!(session.recover(outcome).is_err());

        let outcome = Err(MibError::data(&Location::new("x.dat", 1), "bad"));
        assert!(session.recover(outcome).is_ok());
        session.limitation("status consistency checks are not supported");

        let output = session.finish();
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.warnings.len(), 1);
        assert!(!output.is_clean());
    }
}
