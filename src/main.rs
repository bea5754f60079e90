use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use cdj_playlist_sync::config::{resolve_db_path, ReconcileOptions};
use cdj_playlist_sync::db::SqliteStore;
use cdj_playlist_sync::error::{Error, LOCK_CONFLICT_HINT};
use cdj_playlist_sync::markers::DEFAULT_TOLERANCE_MS;
use cdj_playlist_sync::models::{
    CommitStatus, MismatchReason, MoveOutcome, ReorderReport, SyncOutcome, SyncReport,
};
use cdj_playlist_sync::paths::FieldPathGuesser;
use cdj_playlist_sync::progress::set_log_only;
use cdj_playlist_sync::reconcile::{apply_reorder, compare, sync_cues, Comparison};
use cdj_playlist_sync::safety::{backup_database, validate_backup_path};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXIT_DIFFERENCES: u8 = 1;
const EXIT_PLAYLIST_NOT_FOUND: u8 = 2;
const EXIT_LOCK_CONFLICT: u8 = 3;

#[derive(Parser)]
#[command(name = "cdj-playlist-sync")]
#[command(about = "Compare a rekordbox playlist with its transcoded copy and bring the copy in line")]
struct Args {
    /// Reference playlist
    #[arg(long)]
    base: String,

    /// Playlist to check (and fix) against the base
    #[arg(long)]
    candidate: String,

    /// Path to rekordbox master.db (defaults to the platform location)
    #[arg(long, env = "REKORDBOX_DB_PATH")]
    db: Option<PathBuf>,

    /// SQLCipher passphrase for the database
    #[arg(long, env = "REKORDBOX_DB_KEY", hide_env_values = true)]
    db_key: Option<String>,

    /// Hot cue pairing tolerance in milliseconds
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_MS)]
    tolerance_ms: u32,

    /// Skip the title-only matching pass
    #[arg(long)]
    no_title_fallback: bool,

    /// Report hot cue count and placement differences
    #[arg(long)]
    check_cues: bool,

    /// Reorder the candidate playlist to follow the base
    #[arg(long)]
    apply_order: bool,

    /// Copy base hot cues onto mismatched candidate tracks
    #[arg(long)]
    sync_cues: bool,

    /// Back up the database here before writing (name must contain "backup")
    #[arg(long)]
    backup: Option<PathBuf>,

    /// How long to wait on a locked database before giving up
    #[arg(long, default_value = "0")]
    busy_timeout_ms: u64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Hide progress bars (tail-friendly output)
    #[arg(long)]
    log_only: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    comparison: &'a Comparison,
    #[serde(skip_serializing_if = "Option::is_none")]
    reorder: Option<&'a ReorderReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cue_sync: Option<&'a SyncReport>,
}

fn print_comparison(cmp: &Comparison, args: &Args) {
    let result = &cmp.result;
    println!("\n=== Playlist Compare ===");
    println!("Base     : {} ({} tracks)", cmp.base_playlist, cmp.base_count);
    println!("Candidate: {} ({} tracks)\n", cmp.cand_playlist, cmp.cand_count);

    println!("✅ Matched in both ({}):", result.matches.len());
    for m in &result.matches {
        println!("  = {}  [{:?}]", m.base.label, m.pass);
    }
    println!();

    if !result.missing.is_empty() {
        println!("❌ Missing in Candidate ({}):", result.missing.len());
        for r in &result.missing {
            println!("  - {}", r.label);
        }
        println!();
    }

    if !result.extra.is_empty() {
        println!("➕ Additional in Candidate ({}):", result.extra.len());
        for r in &result.extra {
            println!("  + {}", r.label);
        }
        println!();
    }

    if args.check_cues {
        println!("=== Hot Cues (±{} ms) ===", args.tolerance_ms);
        if cmp.cue_mismatches.is_empty() {
            println!("  All matched tracks agree.");
        }
        for m in &cmp.cue_mismatches {
            match &m.reason {
                MismatchReason::CountMismatch { base, cand } => {
                    println!("  ~ {}: {} hot cues in base, {} in candidate", m.base.label, base, cand)
                }
                MismatchReason::PlacementMismatch {
                    unmatched_base,
                    unmatched_cand,
                } => println!(
                    "  ~ {}: base {:?} has no partner in candidate {:?}",
                    m.base.label, unmatched_base, unmatched_cand
                ),
            }
        }
        println!();
    }
}

fn print_commit(commit: &CommitStatus) {
    match commit {
        CommitStatus::Committed => println!("  Changes committed."),
        CommitStatus::NothingToCommit => println!("  Nothing to commit."),
        CommitStatus::LockConflict => println!("  Not committed: {LOCK_CONFLICT_HINT}"),
        CommitStatus::Failed(reason) => println!("  Not committed: {reason}"),
    }
}

fn print_reorder(report: &ReorderReport) {
    println!("=== Reorder ===");
    if report.moves.is_empty() {
        println!("  Already in base order.");
    }
    for m in &report.moves {
        match &m.outcome {
            MoveOutcome::Applied => println!("  {:>3} → {:<3} {}", m.from, m.to, m.label),
            MoveOutcome::Failed(reason) => println!("  ✗ {}: {}", m.label, reason),
        }
    }
    if !report.moves.is_empty() {
        let failed = report.failed();
        println!("  {} applied, {} failed.", report.moves.len() - failed, failed);
    }
    print_commit(&report.commit);
    if let Some(misaligned) = &report.misaligned {
        for m in misaligned {
            println!("  ! {} is at #{}, expected #{}", m.label, m.actual, m.expected);
        }
    }
    println!();
}

fn print_sync(report: &SyncReport) {
    println!("=== Hot Cue Sync ===");
    for r in &report.results {
        match &r.outcome {
            SyncOutcome::Cloned(counts) => println!(
                "  {}: {} removed, {} copied",
                r.label, counts.deleted, counts.created
            ),
            SyncOutcome::Skipped { reason } => println!("  - {}: skipped ({})", r.label, reason),
            SyncOutcome::Failed { reason } => println!("  ✗ {}: {}", r.label, reason),
        }
    }
    print_commit(&report.commit);
    println!();
}

fn run(args: &Args) -> Result<ExitCode> {
    let db_path = resolve_db_path(args.db.clone())?;
    info!(db = %db_path.display(), "opening library");
    let mut store = SqliteStore::open(
        &db_path,
        args.db_key.as_deref(),
        Duration::from_millis(args.busy_timeout_ms),
    )
    .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let options = ReconcileOptions {
        title_fallback: !args.no_title_fallback,
        tolerance_ms: args.tolerance_ms,
    };
    let guesser = FieldPathGuesser::new();

    let comparison = match compare(&store, &args.base, &args.candidate, &guesser, &options) {
        Ok(c) => c,
        Err(e @ Error::PlaylistNotFound(_)) => {
            eprintln!("{e}");
            return Ok(ExitCode::from(EXIT_PLAYLIST_NOT_FOUND));
        }
        Err(e) => return Err(e).context("Failed to compare playlists"),
    };

    if let Some(backup) = &args.backup {
        if args.apply_order || args.sync_cues {
            validate_backup_path(backup, &db_path)?;
            backup_database(store.connection(), backup)
                .with_context(|| format!("Failed to back up to {}", backup.display()))?;
        }
    }

    let reorder = if args.apply_order {
        Some(apply_reorder(&mut store, &comparison, &guesser, &options)?)
    } else {
        None
    };
    let reorder_blocked = reorder.as_ref().is_some_and(|r| r.commit.is_lock_conflict());

    // A lock conflict ends the apply phase
    let cue_sync = if args.sync_cues && !reorder_blocked {
        Some(sync_cues(&mut store, &comparison))
    } else {
        None
    };

    if args.json {
        let report = RunReport {
            comparison: &comparison,
            reorder: reorder.as_ref(),
            cue_sync: cue_sync.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_comparison(&comparison, args);
        if let Some(r) = &reorder {
            print_reorder(r);
        }
        if let Some(s) = &cue_sync {
            print_sync(s);
        }
    }

    let lock_conflict = reorder_blocked || cue_sync.as_ref().is_some_and(|s| s.commit.is_lock_conflict());
    if lock_conflict {
        eprintln!("{LOCK_CONFLICT_HINT}");
        return Ok(ExitCode::from(EXIT_LOCK_CONFLICT));
    }
    if comparison.result.is_aligned_set() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_DIFFERENCES))
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    set_log_only(args.log_only);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("cdj_playlist_sync=info".parse()?))
        .init();

    match run(&args) {
        Err(e) if e.downcast_ref::<Error>().is_some_and(Error::is_lock_conflict) => {
            eprintln!("{LOCK_CONFLICT_HINT}");
            Ok(ExitCode::from(EXIT_LOCK_CONFLICT))
        }
        other => other,
    }
}
