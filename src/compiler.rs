//! Compiler Driver
//!
//! Runs one compilation pass over a MIB directory: checks that every table
//! file is present, reads the database version, then builds the telemetry
//! model followed by the command model, which refers to it.

use crate::commands::CommandBuilder;
use crate::config::MibConfig;
use crate::constants::tables;
use crate::error::{MibError, Result};
use crate::session::{CompileOutput, Session};
use crate::synthetic::FormulaCompiler;
use crate::telemetry::TelemetryBuilder;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod vdf {
    pub const NAME: usize = 0;
    pub const COMMENT: usize = 1;
    pub const DOMAINID: usize = 2;
    pub const RELEASE: usize = 3;
    pub const ISSUE: usize = 4;
}

/// Database identification (`VDF`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseVersion {
    pub name: String,
    pub comment: Option<String>,
    pub domain_id: i64,
    pub release: i64,
    pub issue: i64,
}

impl DatabaseVersion {
    /// `release.issue`
    pub fn version(&self) -> String {
        format!("{}.{}", self.release, self.issue)
    }
}

pub struct MibCompiler {
    config: MibConfig,
    formula_compiler: Option<Arc<dyn FormulaCompiler>>,
}

impl MibCompiler {
    pub fn new(config: MibConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            formula_compiler: None,
        })
    }

    /// Register the compiler of synthetic parameter formulas
    pub fn with_formula_compiler(mut self, compiler: Arc<dyn FormulaCompiler>) -> Self {
        self.formula_compiler = Some(compiler);
        self
    }

    pub fn config(&self) -> &MibConfig {
        &self.config
    }

    /// Run a full pass
    ///
    /// In strict mode the first error aborts the pass and is returned. Otherwise
    /// rows in error are skipped and reported in [`CompileOutput::errors`];
    /// only fatal errors (missing files, I/O, configuration) end the pass.
    pub fn compile(&self) -> Result<CompileOutput> {
        info!("Compiling MIB at {}", self.config.path.display());
        check_tables(&self.config.path, &self.config.file_extension)?;

        let mut session = Session::new(self.config.clone())?;
        let version = read_version(&mut session)?;
        info!(
            "Database {} version {} (domain {})",
            version.name,
            version.version(),
            version.domain_id
        );
        session.db.version = Some(version.version());
        session.db.description = version.comment.clone();

        TelemetryBuilder::new()
            .with_formula_compiler(self.formula_compiler.clone())
            .build(&mut session)?;
        CommandBuilder::new().build(&mut session)?;

        let output = session.finish();
        if output.is_clean() {
            info!("Compilation finished without errors");
        } else {
            warn!(
                "Compilation finished with {} errors, the affected rows were skipped",
                output.errors.len()
            );
        }
        Ok(output)
    }
}

/// Fail with one error naming every required table missing from `root`
pub fn check_tables(root: &Path, extension: &str) -> Result<()> {
    if !root.is_dir() {
        return Err(MibError::TableNotFound {
            path: root.to_path_buf(),
        });
    }

    let missing: Vec<String> = tables::REQUIRED
        .iter()
        .filter(|table| !root.join(format!("{}.{}", table, extension)).is_file())
        .map(|table| table.to_string())
        .collect();
    if missing.is_empty() {
        debug!("All {} tables present in {}", tables::REQUIRED.len(), root.display());
        Ok(())
    } else {
        report_misnamed_tables(root, extension, &missing);
        Err(MibError::MissingTables {
            root: root.to_path_buf(),
            missing,
        })
    }
}

/// Warn about files that would be a missing table but for the case of their name
fn report_misnamed_tables(root: &Path, extension: &str, missing: &[String]) {
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        glob::Pattern::escape(extension)
    );
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..glob::MatchOptions::new()
    };
    let Ok(entries) = glob::glob_with(&pattern, options) else {
        return;
    };
    for path in entries.filter_map(|entry| entry.ok()) {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_ascii_lowercase()) else {
            continue;
        };
        if missing.contains(&stem) {
            warn!(
                "{} is not read: table files are named in lower case ({}.{})",
                path.display(),
                stem,
                extension
            );
        }
    }
}

/// Read `VDF`; the last record wins
fn read_version(session: &mut Session) -> Result<DatabaseVersion> {
    let mut version = None;
    session.scan(tables::VDF, |_, row| {
        row.require(&[vdf::NAME])?;
        version = Some(DatabaseVersion {
            name: row.str(vdf::NAME)?.to_string(),
            comment: row.opt_str(vdf::COMMENT).map(str::to_string),
            domain_id: row.int_or(vdf::DOMAINID, 0)?,
            release: row.int_or(vdf::RELEASE, 0)?,
            issue: row.int_or(vdf::ISSUE, 0)?,
        });
        Ok(())
    })?;

    version.ok_or_else(|| MibError::structure("the VDF table has no valid record"))
}
