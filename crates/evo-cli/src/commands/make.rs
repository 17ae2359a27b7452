//! Make target passthrough and listing.

use std::process::Command;

use anyhow::{bail, Context, Result};
use evo_core::SessionSpec;

use crate::style::Palette;

/// One entry of `make list-targets-full`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeTarget {
    pub name: String,
    pub description: String,
}

/// Parse `<name> <description...>` lines. Lines with no description are
/// skipped.
pub fn parse_targets(listing: &str) -> Vec<MakeTarget> {
    listing
        .lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            let name = words.next()?;
            let description = words.collect::<Vec<_>>().join(" ");
            if description.is_empty() {
                return None;
            }
            Some(MakeTarget {
                name: name.to_string(),
                description,
            })
        })
        .collect()
}

/// Ask the makefile in `makefile_dir` for its documented targets.
pub fn list_targets(makefile_dir: &str) -> Result<Vec<MakeTarget>> {
    let output = Command::new("make")
        .args(["-s", "-C", makefile_dir, "list-targets-full"])
        .output()
        .context("failed to run make")?;
    if !output.status.success() {
        bail!(
            "make list-targets-full failed in {makefile_dir}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(parse_targets(&String::from_utf8_lossy(&output.stdout)))
}

pub fn run_list(makefile_dir: &str, palette: Palette) -> Result<i32> {
    let targets = list_targets(makefile_dir)?;
    let width = targets.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for target in &targets {
        let padded = format!("{:<width$}", target.name);
        println!("  {}  {}", palette.green(&padded), target.description);
    }
    Ok(0)
}

/// `make -C <makefile_dir> <target> [args...]` on a pseudo-terminal.
pub async fn run_target(makefile_dir: &str, target_and_args: &[String]) -> Result<i32> {
    if target_and_args.is_empty() {
        bail!("no make target given");
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let args = ["-C".to_string(), makefile_dir.to_string()]
        .into_iter()
        .chain(target_and_args.iter().cloned());
    super::run_interactive(SessionSpec::new("make", args, cwd)).await
}
