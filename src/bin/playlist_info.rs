//! Print the hot-cue span of every track in a playlist and the total set length.
//! Usage: playlist-info --playlist "Friday Warmup" [--db master.db]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use cdj_playlist_sync::config::resolve_db_path;
use cdj_playlist_sync::db::SqliteStore;
use cdj_playlist_sync::error::Error;
use cdj_playlist_sync::set_length::{analyze_playlist, format_ms, SpanOutcome};
use cdj_playlist_sync::store::TrackStore;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "playlist-info")]
#[command(about = "Estimate a playlist's set length from hot cues")]
struct Args {
    /// Playlist to analyze
    #[arg(long)]
    playlist: String,

    /// Path to rekordbox master.db (defaults to the platform location)
    #[arg(long, env = "REKORDBOX_DB_PATH")]
    db: Option<PathBuf>,

    /// SQLCipher passphrase for the database
    #[arg(long, env = "REKORDBOX_DB_KEY", hide_env_values = true)]
    db_key: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("cdj_playlist_sync=info".parse()?))
        .init();

    let db_path = resolve_db_path(args.db)?;
    let store = SqliteStore::open_read_only(&db_path, args.db_key.as_deref())
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let slots = match store.ordered_slots(&args.playlist) {
        Ok(slots) => slots,
        Err(e @ Error::PlaylistNotFound(_)) => {
            eprintln!("{e}");
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e).context("Failed to load playlist"),
    };
    let report = analyze_playlist(&slots);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Playlist '{}' found with {} songs.\n", args.playlist, slots.len());
    println!("=== Song Durations ===");
    for track in &report.tracks {
        match &track.outcome {
            SpanOutcome::Measured { span_ms } => println!(
                "#{} - '{}': {} ms ({}). BPM: {}, Key: {}",
                track.track_no,
                track.label,
                span_ms,
                format_ms(*span_ms),
                track.bpm,
                track.key.as_deref().unwrap_or("-")
            ),
            SpanOutcome::Skipped { reason } => {
                println!("Skipping '{}': {}.", track.label, reason)
            }
        }
    }

    println!("\n=== Total Set Duration ===");
    println!("{} ms ({})", report.total_ms, format_ms(report.total_ms));
    println!(
        "{} songs processed, {} skipped.",
        report.tracks.len(),
        report.skipped()
    );
    Ok(ExitCode::SUCCESS)
}
