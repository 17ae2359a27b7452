//! `evo cm`: commit with a conventional, branch-prefixed message.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Select};
use evo_core::SessionSpec;
use tracing::debug;

use crate::style::Palette;

/// Conventional commit types offered when the message has none.
pub const CONVENTIONAL_TYPES: [&str; 12] = [
    "build", "ci", "docs", "feat", "fix", "perf", "refactor", "style", "test", "revert", "chore",
    "wip",
];

/// True if `message` already carries a `<type>: ` marker.
pub fn is_conventional(message: &str) -> bool {
    CONVENTIONAL_TYPES
        .iter()
        .any(|kind| message.contains(&format!("{kind}: ")))
}

/// The part after the first `/` of a branch like `feature/ABC-123`.
pub fn branch_prefix(branch: &str) -> Option<&str> {
    branch.split_once('/').map(|(_, rest)| rest)
}

/// Answer assumed when the final confirmation is just Enter: only an
/// explicit yes commits.
const COMMIT_BY_DEFAULT: bool = false;

/// Build the final message: `[<branch suffix> - ][<type>: ]<message>`.
pub fn compose_message(message: &str, kind: Option<&str>, branch: &str) -> String {
    let mut composed = match kind {
        Some(kind) => format!("{kind}: {message}"),
        None => message.to_string(),
    };
    if let Some(prefix) = branch_prefix(branch) {
        composed = format!("{prefix} - {composed}");
    }
    composed
}

/// Closest ancestor of `start` (inclusive) containing `.git`.
pub fn find_git_root(start: &Path) -> Result<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
        .context("no git repository found")
}

fn current_branch(repo: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["symbolic-ref", "--short", "HEAD"])
        .current_dir(repo)
        .output()
        .context("failed to run git")?;
    if !output.status.success() {
        bail!(
            "could not determine the current git branch: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn ask_for_type() -> Result<Option<&'static str>> {
    let conventional = Confirm::new()
        .with_prompt("Is this a conventional commit?")
        .default(false)
        .interact()
        .context("prompt failed")?;
    if !conventional {
        return Ok(None);
    }
    let index = Select::new()
        .with_prompt("Choose a type")
        .items(&CONVENTIONAL_TYPES)
        .default(0)
        .interact()
        .context("prompt failed")?;
    Ok(Some(CONVENTIONAL_TYPES[index]))
}

pub async fn run(message: &[String], no_verify: bool, palette: Palette) -> Result<i32> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let repo = find_git_root(&cwd)?;
    let branch = current_branch(&repo)?;
    debug!(repo = %repo.display(), branch = %branch, "preparing commit");

    let message = message.join(" ");
    let kind = if is_conventional(&message) {
        None
    } else {
        ask_for_type()?
    };
    let composed = compose_message(&message, kind, &branch);

    if no_verify {
        println!("{}", palette.red("Commit will not be verified."));
    }
    println!("Commit message is:\n> {}", palette.yellow(&composed));
    let confirmed = Confirm::new()
        .with_prompt("Confirm?")
        .default(COMMIT_BY_DEFAULT)
        .interact()
        .context("prompt failed")?;
    if !confirmed {
        println!("Commit cancelled.");
        return Ok(0);
    }

    let mut args = vec!["commit".to_string(), "-m".to_string(), composed];
    if no_verify {
        args.push("--no-verify".to_string());
    }
    super::run_interactive(SessionSpec::new("git", args, cwd)).await
}
