//! Command-line entry point for plainledger

use std::io::{self, BufWriter};
use std::process;

use anyhow::Result;
use clap::Parser;
use plainledger_cli::{Cli, Dispatcher, Session};

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    if let Err(e) = run(&cli) {
        // The debug form lists each cause on its own line
        if cli.verbose {
            eprintln!("Error: {:?}", e);
        } else {
            eprintln!("Error: {:#}", e);
        }
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let session = Session::new(cli)?;
    let dispatcher = Dispatcher::new(session);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    dispatcher.execute(&cli.command, &mut out)
}
