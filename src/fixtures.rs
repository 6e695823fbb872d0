//! Shared test fixtures: MIB directories written to temporary storage

use crate::config::MibConfig;
use crate::constants::tables;
use crate::session::Session;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Builder of a MIB directory; every table file is written, empty unless
/// rows were added for it
#[derive(Debug, Default)]
pub struct MibFixture {
    rows: HashMap<String, Vec<String>>,
    files: Vec<(String, String)>,
}

impl MibFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, table: &str, fields: &[&str]) -> Self {
        self.rows
            .entry(table.to_string())
            .or_default()
            .push(fields.join("\t"));
        self
    }

    /// Record given as (column, value) pairs, other columns left empty
    pub fn record(self, table: &str, columns: &[(usize, &str)]) -> Self {
        let width = columns.iter().map(|(col, _)| col + 1).max().unwrap_or(0);
        let mut fields = vec![""; width];
        for &(col, value) in columns {
            fields[col] = value;
        }
        self.row(table, &fields)
    }

    /// Extra file relative to the MIB root
    pub fn file(mut self, relative: &str, content: &str) -> Self {
        self.files.push((relative.to_string(), content.to_string()));
        self
    }

    pub fn write(mut self) -> MibDir {
        let dir = TempDir::new().unwrap();
        self.rows
            .entry(tables::VDF.to_string())
            .or_insert_with(|| vec!["TESTMIB\tTest database\t0\t1\t2".to_string()]);

        for table in tables::REQUIRED {
            let mut content = self.rows.get(*table).cloned().unwrap_or_default().join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            fs::write(dir.path().join(format!("{}.dat", table)), content).unwrap();
        }
        for (relative, content) in &self.files {
            let path = dir.path().join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        MibDir { dir }
    }
}

pub struct MibDir {
    dir: TempDir,
}

impl MibDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> MibConfig {
        MibConfig::new(self.dir.path())
    }

    pub fn session(&self) -> Session {
        Session::new(self.config()).unwrap()
    }

    pub fn strict_session(&self) -> Session {
        Session::new(self.config().with_strict(true)).unwrap()
    }
}
