//! Command-line interface
//!
//! Argument definitions, logging setup and the run loop of the
//! `mib_compiler` binary.

use crate::config::MibConfig;
use crate::error::MibError;
use crate::session::{CompileOutput, CompileStats};
use crate::{MibCompiler, Result};
use anyhow::Context;
use clap::Parser;
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Compile a SCOS-2000 MIB into a telemetry and telecommand mission database
#[derive(Parser, Debug, Clone)]
#[command(name = "mib_compiler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Compile SCOS-2000 MIB tables into a typed telemetry and telecommand database"
)]
pub struct Args {
    /// Directory containing the MIB table files
    #[arg(value_name = "MIB_PATH")]
    pub mib_path: PathBuf,

    /// JSON configuration file; command-line options override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the compiled database as JSON to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Name of the generated space system
    #[arg(short, long)]
    pub name: Option<String>,

    /// Epoch of absolute times: TAI, J2000, UNIX, GPS, TCO or an ISO date-time
    #[arg(long)]
    pub epoch: Option<String>,

    /// Abort on the first error
    #[arg(long)]
    pub strict: bool,

    /// Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only show errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.quiet
    }

    /// Configuration file values overridden by the command line
    pub fn to_config(&self) -> Result<MibConfig> {
        let mut config = match &self.config {
            Some(path) => MibConfig::from_json_file(path)?,
            None => MibConfig::default(),
        };
        config.path = self.mib_path.clone();
        if let Some(name) = &self.name {
            config.space_system_name = name.clone();
        }
        if let Some(epoch) = &self.epoch {
            config.epoch = epoch.clone();
        }
        if self.strict {
            config.strict = true;
        }
        Ok(config)
    }
}

/// Compile the MIB named by `args`, returning the output of the pass
pub fn run(args: &Args) -> anyhow::Result<CompileOutput> {
    let start_time = Instant::now();
    setup_logging(args);
    debug!("Command line arguments: {:?}", args);

    let config = args.to_config().with_context(|| match &args.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Invalid configuration".to_string(),
    })?;
    let compiler = MibCompiler::new(config).context("Invalid configuration")?;

    let progress = args.show_progress().then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Compiling {}", args.mib_path.display()));
        pb
    });

    let result = compiler.compile();
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    let output = result.map_err(|err| describe_failure(err, args))?;

    if let Some(path) = &args.output {
        let json = output
            .database
            .to_json()
            .context("Failed to serialise the mission database")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    if !args.quiet {
        print_diagnostics(&output);
        print_summary(&output.stats(), start_time.elapsed());
    }
    Ok(output)
}

fn describe_failure(err: MibError, args: &Args) -> anyhow::Error {
    let context = if err.is_fatal() {
        format!("Cannot compile {}", args.mib_path.display())
    } else {
        "Compilation aborted in strict mode".to_string()
    };
    anyhow::Error::new(err).context(context)
}

/// Set up structured logging on stderr
fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mib_compiler={}", log_level)));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .try_init();
    if result.is_ok() {
        debug!("Logging initialized at level: {}", log_level);
    }
}

fn print_diagnostics(output: &CompileOutput) {
    for warning in &output.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
    for error in &output.errors {
        eprintln!("{} {}", "error:".red().bold(), error);
    }
}

fn print_summary(stats: &CompileStats, elapsed: Duration) {
    println!();
    println!("{}", "MIB compilation summary".bright_green().bold());
    println!("  Parameter types: {}", stats.parameter_types.to_string().bright_cyan());
    println!("  Parameters:      {}", stats.parameters.to_string().bright_cyan());
    println!("  Containers:      {}", stats.containers.to_string().bright_cyan());
    println!("  Commands:        {}", stats.commands.to_string().bright_cyan());
    println!("  Algorithms:      {}", stats.algorithms.to_string().bright_cyan());

    let errors = if stats.errors == 0 {
        stats.errors.to_string().bright_green()
    } else {
        stats.errors.to_string().bright_red()
    };
    let warnings = if stats.warnings == 0 {
        stats.warnings.to_string().bright_green()
    } else {
        stats.warnings.to_string().bright_yellow()
    };
    println!("  Errors:          {}", errors);
    println!("  Warnings:        {}", warnings);
    println!("  Time:            {}", HumanDuration(elapsed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_arguments() {
        let args = Args::parse_from([
            "mib_compiler",
            "/data/mib",
            "--output",
            "db.json",
            "--name",
            "SAT",
            "--strict",
            "-vv",
        ]);

        assert_eq!(args.mib_path, PathBuf::from("/data/mib"));
        assert_eq!(args.output, Some(PathBuf::from("db.json")));
        assert!(args.strict);
        assert_eq!(args.get_log_level(), "debug");
        assert!(args.show_progress());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["mib_compiler", "/mib", "-q", "-v"]).is_err());

        let args = Args::parse_from(["mib_compiler", "/mib", "--quiet"]);
        assert_eq!(args.get_log_level(), "error");
        assert!(!args.show_progress());
    }

    #[test]
    fn test_command_line_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"path": "/elsewhere", "space_system_name": "FILE", "epoch": "GPS", "tc": {{"allow_ack_override": true}}}}"#
        )
        .unwrap();
        let config_path = file.path().to_string_lossy().to_string();

        let args = Args::parse_from([
            "mib_compiler",
            "/data/mib",
            "--config",
            &config_path,
            "--name",
            "CLI",
        ]);
        let config = args.to_config().unwrap();

        assert_eq!(config.path, PathBuf::from("/data/mib"));
        assert_eq!(config.space_system_name, "CLI");
        assert_eq!(config.epoch, "GPS");
        assert!(config.tc.allow_ack_override);
        assert!(!config.strict);
    }
}
