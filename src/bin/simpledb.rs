//! `simpledb <filename>`: runs the command shell over a database file.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use simpledb::{Repl, Table};

fn main() -> ExitCode {
    // Initialize logger
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let filename = std::env::args_os().nth(1).context("Must supply a database filename.")?;

    let mut table = Table::open(&filename)
        .with_context(|| format!("Unable to open database file {:?}", filename))?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let session = Repl::new(stdin.lock(), stdout.lock()).run(&mut table);

    // Flush whatever the session produced, even when it failed.
    let closed = table.close();
    session.context("Shell terminated")?;
    closed.context("Unable to flush database file")?;
    Ok(())
}
