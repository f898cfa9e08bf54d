//! Shell completion generation for elastic-utils
//!
//! This module generates completion scripts for bash, zsh, fish, PowerShell
//! and elvish from the clap command definition.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

use crate::cli::CliArgs;
use crate::error::Result;

const BIN_NAME: &str = "elastic-utils";

/// Generate shell completion script on stdout
///
/// # Arguments
/// * `shell` - Shell type
///
/// # Returns
/// * `Result<()>` - Success or I/O error
pub fn generate_completion(shell: Shell) -> Result<()> {
    let script = render_completion(shell);
    let mut stdout = io::stdout().lock();
    stdout.write_all(script.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Render the completion script for `shell`.
pub fn render_completion(shell: Shell) -> String {
    let mut cmd = CliArgs::command();
    let mut buffer = Vec::new();
    generate(shell, &mut cmd, BIN_NAME, &mut buffer);
    String::from_utf8_lossy(&buffer).into_owned()
}
