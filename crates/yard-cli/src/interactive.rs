//! Interactive prompts for CLI commands
//!
//! Uses dialoguer for terminal-based confirmation.

use dialoguer::Confirm;

use crate::error::Result;

/// Ask before an irreversible operation. Defaults to no.
pub fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
