//! Session configuration
//!
//! The journal to read comes from `-f/--file`, falling back to the
//! `LEDGER_FILE` environment variable.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use log::info;
use plainledger_core::Journal;

use crate::cli::Cli;

/// Environment variable naming the default journal
pub const LEDGER_FILE_VAR: &str = "LEDGER_FILE";

/// Settings for one invocation
#[derive(Debug, Clone)]
pub struct Session {
    journal_path: PathBuf,
}

impl Session {
    /// Create a session from command-line arguments and the environment
    pub fn new(cli: &Cli) -> Result<Self> {
        let journal_path = resolve_journal_path(cli.file.as_deref(), env::var_os(LEDGER_FILE_VAR))?;
        info!("using journal {}", journal_path.display());
        Ok(Self { journal_path })
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    /// Read and parse the session's journal
    pub fn load_journal(&self) -> Result<Journal> {
        let journal = Journal::from_path(&self.journal_path)
            .with_context(|| format!("Failed to load journal {}", self.journal_path.display()))?;
        info!(
            "loaded {} transactions from {}",
            journal.transactions().len(),
            self.journal_path.display()
        );
        Ok(journal)
    }

    /// Date reports treat as today
    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Pick the journal path: the command line wins over the environment
fn resolve_journal_path(file: Option<&Path>, env_file: Option<OsString>) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(file.to_path_buf());
    }
    match env_file.filter(|value| !value.is_empty()) {
        Some(value) => Ok(PathBuf::from(value)),
        None => bail!("No journal file given; use -f/--file or set {}", LEDGER_FILE_VAR),
    }
}
