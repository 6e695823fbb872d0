//! MIB Compiler Library
//!
//! Compiles a SCOS-2000 mission information base (MIB), the set of
//! tab-separated tables describing the telemetry and telecommands of a
//! spacecraft, into a typed, bit-precise mission database.
//!
//! This library provides:
//! - A table reader with typed column access and file:line error context
//! - Resolution of PTC/PFC type codes into bit layouts
//! - Numeric, textual and context-selected calibrations
//! - The telemetry model: parameters, packet containers, variable packets, limits
//! - The command model: header templates, arguments, repeated groups, verifiers
//! - Strict and non-strict compilation with accumulated diagnostics
//!
//! ```no_run
//! use mib_compiler::{MibCompiler, MibConfig};
//!
//! let compiler = MibCompiler::new(MibConfig::new("/data/mib"))?;
//! let output = compiler.compile()?;
//! println!("{} commands", output.database.commands().len());
//! # Ok::<(), mib_compiler::MibError>(())
//! ```

pub mod calibration;
pub mod cli;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod model;
pub mod reader;
pub mod session;
pub mod synthetic;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod fixtures;

pub use compiler::{DatabaseVersion, MibCompiler};
pub use config::MibConfig;
pub use error::{Location, MibError, Result};
pub use model::MissionDatabase;
pub use session::{CompileOutput, CompileStats};
