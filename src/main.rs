//! Shutter CLI - workspace project snapshot tool
//!
//! Usage: shutter <COMMAND>
//!
//! Commands:
//!   snapshot  Snapshot a project (and its unknown dependencies)
//!   watch     Watch the workspace and snapshot touched projects on exit
//!   projects  List known and ignored projects

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use shutter::session::{session, SessionOp};
use shutter::snapshot::LEDGER_FILE;
use shutter::{watch, Config, ProjectLedger, Snapshotter, WatchEvent, WatchOptions, Workspace};

/// Shutter - workspace project snapshot tool
#[derive(Parser, Debug)]
#[command(name = "shutter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format for CI
    #[arg(long, default_value = "false")]
    json: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Workspace root containing the project directories
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Snapshot a project and its not-yet-known dependencies
    Snapshot {
        /// Project to snapshot (directory name under the workspace root)
        project: Option<String>,

        /// Snapshot every project the ledger already knows
        #[arg(long)]
        all_known: bool,
    },

    /// Watch the workspace and snapshot touched projects on Ctrl+C
    Watch {},

    /// List known projects and the configured ignore list
    Projects {},
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Snapshot { project, all_known } => {
            cmd_snapshot(&cli.workspace, project.as_deref(), all_known, cli.json)
        }
        Commands::Watch {} => cmd_watch(&cli.workspace, cli.json),
        Commands::Projects {} => cmd_projects(&cli.workspace, cli.json),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn cmd_snapshot(workspace: &PathBuf, project: Option<&str>, all_known: bool, json: bool) -> Result<()> {
    let config = Config::load(workspace)?;
    let snapshotter = Snapshotter::new(&config)?;

    let archives = match (project, all_known) {
        (Some(name), false) => {
            if !Workspace::new(workspace).contains(name) {
                anyhow::bail!("project '{name}' not found in workspace {}", workspace.display());
            }
            vec![snapshotter.request_snapshot(name)]
        }
        (None, true) => {
            if !session().begin(SessionOp::Snapshot) {
                anyhow::bail!("a snapshot pass is already in progress");
            }
            let archives = snapshotter.snapshot_known_projects();
            session().end(SessionOp::Snapshot);
            archives
        }
        _ => anyhow::bail!("pass a project name or --all-known"),
    };

    snapshotter.wait_idle();

    if json {
        for archive in &archives {
            println!(
                "{}",
                serde_json::json!({
                    "event": "snapshot",
                    "archive": archive.display().to_string(),
                })
            );
        }
    } else {
        println!("📸 Shutter Snapshot");
        for archive in &archives {
            println!("✓ {}", archive.display());
        }
        if archives.is_empty() {
            println!("Nothing to snapshot.");
        }
    }

    Ok(())
}

fn cmd_watch(workspace: &PathBuf, json: bool) -> Result<()> {
    let config = Config::load(workspace)?;
    let snapshotter = Snapshotter::new(&config)?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_running = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_running.store(false, Ordering::SeqCst);
    })?;

    let options = WatchOptions {
        workspace_root: workspace.clone(),
        json,
    };

    watch(&snapshotter, options, running, |event| {
        if json {
            println!("{}", event.to_json());
        } else {
            match event {
                WatchEvent::Started { workspace } => {
                    println!("👀 Watching {workspace} (Ctrl+C to snapshot and exit)");
                }
                WatchEvent::ProjectTouched { project } => {
                    println!("  changed: {project}");
                }
                WatchEvent::SnapshotQueued { project, archive } => {
                    println!("📸 {project} → {archive}");
                }
                WatchEvent::Error { message } => {
                    eprintln!("error: {message}");
                }
                WatchEvent::Shutdown { snapshots } => {
                    println!("✓ {snapshots} snapshot(s) taken");
                }
            }
        }
    })?;

    Ok(())
}

fn cmd_projects(workspace: &PathBuf, json: bool) -> Result<()> {
    let config = Config::load(workspace)?;
    let ledger = ProjectLedger::open(&config.snapshot_root.join(LEDGER_FILE))?;
    let known = ledger.known_projects();
    let ignored: Vec<&str> = config.ignored_projects().collect();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "known": known,
                "ignored": ignored,
            })
        );
        return Ok(());
    }

    println!("Known projects ({}):", known.len());
    for name in &known {
        println!("  {name}");
    }
    if !ignored.is_empty() {
        println!("Ignored projects ({}):", ignored.len());
        for name in &ignored {
            println!("  {name}");
        }
    }

    Ok(())
}
