use clap::Parser;
use mib_compiler::cli::{self, Args};
use std::process;

fn main() {
    let args = Args::parse();

    if let Err(error) = cli::run(&args) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}
