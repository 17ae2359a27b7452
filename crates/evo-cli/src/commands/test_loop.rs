//! `evo test-loop`: run one test and re-run it on demand.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use evo_core::{
    interrupted, Console, FileWatchTrigger, HotkeyTrigger, RestartPolicy, SessionSpec, Supervisor,
    TriggerSource,
};
use tracing::info;

use crate::config::{Config, TriggerKind};
use crate::finder::find_test_file;
use crate::style::Palette;

use super::INTERRUPTED_EXIT;

#[derive(Debug, Clone)]
pub struct TestLoopArgs {
    pub name: String,
    pub dir: Option<PathBuf>,
    pub hotkey: bool,
    pub overlap: bool,
}

/// `make -C <makefile_dir> test-file FILTER=<name>`, run from `dir`.
pub fn test_command(makefile_dir: &str, name: &str, dir: &Path) -> SessionSpec {
    SessionSpec::new(
        "make",
        [
            "-C".to_string(),
            makefile_dir.to_string(),
            "test-file".to_string(),
            format!("FILTER={}", name.trim()),
        ],
        dir,
    )
}

fn build_trigger(args: &TestLoopArgs, config: &Config, file: &Path) -> Box<dyn TriggerSource> {
    let use_hotkey = args.hotkey || config.test_loop.trigger == TriggerKind::Hotkey;
    if use_hotkey {
        Box::new(HotkeyTrigger::new(config.test_loop.hotkey.clone()))
    } else {
        Box::new(FileWatchTrigger::new(file, config.test_loop.debounce()))
    }
}

/// Line shown before each re-run.
pub fn restart_line(palette: Palette, cause: &str, restart: usize) -> String {
    format!(
        "{} {} (run #{})",
        palette.green("Restarting after"),
        palette.yellow(cause),
        restart + 1
    )
}

pub async fn run(args: TestLoopArgs, config: &Config, palette: Palette) -> Result<i32> {
    let dir = args.dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let dir = dir
        .canonicalize()
        .with_context(|| format!("cannot resolve directory {}", dir.display()))?;
    let name = args.name.trim();

    println!(
        "{} {} {} {}...",
        palette.yellow("Searching for test"),
        palette.blue(name),
        palette.yellow("in directory"),
        palette.blue(&dir.display().to_string()),
    );
    let Some(file) = find_test_file(&dir, name, &config.test_loop.test_dirs)? else {
        println!("{} {}", palette.red("No match found for:"), palette.blue(name));
        return Ok(1);
    };
    let shown = file.strip_prefix(&dir).unwrap_or(&file).display().to_string();
    println!("{} {} ({shown})", palette.green("Running test:"), palette.blue(name));

    let policy = if args.overlap {
        RestartPolicy::Overlap
    } else {
        config.test_loop.restart_policy()?
    };
    let mut trigger = build_trigger(&args, config, &file);
    let cause = trigger.describe();
    println!("{} {}", palette.green("Restarting on"), palette.yellow(&cause));

    let spec = test_command(&config.makefile_path, name, &dir);
    let mut supervisor = Supervisor::new(Console::stdio())
        .with_restart_policy(policy)
        .on_restart(move |restart| {
            // Overlapping runs may still hold the terminal in raw mode.
            let mut stdout = std::io::stdout();
            let _ = write!(stdout, "\r\n{}\r\n", restart_line(palette, &cause, restart));
            let _ = stdout.flush();
        });
    let report = supervisor
        .run_watch(&spec, trigger.as_mut(), interrupted())
        .await
        .context("test loop aborted")?;
    info!(
        sessions = report.sessions_started,
        restarts = report.restarts,
        "test loop stopped"
    );
    Ok(INTERRUPTED_EXIT)
}
