//! ntfs-forensic — CLI front end over `ntfs_forensic_core::Volume`.
//!
//! Thin plumbing: argument parsing, log initialization, and textual
//! output. All the interesting decoding happens in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use ntfs_forensic_core::presentation::cli::{Cli, Commands};
use ntfs_forensic_core::{FileView, Volume};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let volume = Volume::mount(&cli.image)
        .with_context(|| format!("failed to mount NTFS volume at {}", cli.image))?;

    match cli.command {
        Commands::List { path } => run_list(&volume, path.as_deref())?,
        Commands::Extract { src, dst } => run_extract(&volume, &src, &dst)?,
        Commands::ExtractAll { dst } => run_extract_all(&volume, &dst)?,
        Commands::Search { pattern } => run_search(&volume, &pattern)?,
        Commands::Deleted => run_deleted(&volume)?,
        Commands::ExtractDeleted { dst } => run_extract_deleted(&volume, &dst)?,
        Commands::Info => run_info(&volume)?,
    }

    volume.close();
    Ok(())
}

fn run_list(volume: &Volume, path: Option<&str>) -> Result<()> {
    let views = volume
        .list_files(path)
        .with_context(|| format!("failed to list {}", path.unwrap_or("/")))?;

    for view in &views {
        print_view_line(view);
    }
    println!("\n{} entr{}", views.len(), if views.len() == 1 { "y" } else { "ies" });
    Ok(())
}

fn run_extract(volume: &Volume, src: &str, dst: &std::path::Path) -> Result<()> {
    volume
        .extract_file(src, dst)
        .with_context(|| format!("failed to extract {src}"))?;
    println!("extracted {src} -> {}", dst.display());
    Ok(())
}

fn run_extract_all(volume: &Volume, dst: &std::path::Path) -> Result<()> {
    volume
        .extract_all_files(dst)
        .with_context(|| format!("failed to extract all files to {}", dst.display()))?;
    println!("extracted all live files -> {}", dst.display());
    Ok(())
}

fn run_search(volume: &Volume, pattern: &str) -> Result<()> {
    let views = volume
        .search_files(pattern)
        .with_context(|| format!("failed to search for '{pattern}'"))?;
    for view in &views {
        print_view_line(view);
    }
    println!("\n{} match(es)", views.len());
    Ok(())
}

fn run_deleted(volume: &Volume) -> Result<()> {
    let views = volume
        .list_deleted_files()
        .context("failed to scan for deleted files")?;
    for view in &views {
        print_view_line(view);
    }
    println!("\n{} deleted record(s) recovered", views.len());
    Ok(())
}

fn run_extract_deleted(volume: &Volume, dst: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    let views = volume
        .list_deleted_files()
        .context("failed to scan for deleted files")?;

    let mut recovered = 0usize;
    for view in &views {
        let data = view.read_deleted_data(volume);
        let out_name = sanitize_output_name(&view.name, view.mft_reference);
        let out_path = dst.join(out_name);
        if let Err(e) = std::fs::write(&out_path, &data) {
            log::warn!("could not write {}: {e}", out_path.display());
            continue;
        }
        recovered += 1;
    }

    println!("recovered {recovered}/{} deleted file(s) -> {}", views.len(), dst.display());
    Ok(())
}

fn run_info(volume: &Volume) -> Result<()> {
    let info = volume.get_volume_info().context("volume not mounted")?;
    println!("bytes_per_sector:    {}", info.bytes_per_sector);
    println!("sectors_per_cluster: {}", info.sectors_per_cluster);
    println!("cluster_bytes:       {}", info.cluster_bytes);
    println!("total_sectors:       {}", info.total_sectors);
    println!("mft_lcn:             {}", info.mft_lcn);
    println!("partition_offset:    {}", info.partition_offset);
    Ok(())
}

fn print_view_line(view: &FileView) {
    let kind = if view.is_directory { "<DIR>" } else { "" };
    let deleted = if view.is_deleted { " (deleted)" } else { "" };
    println!(
        "{:>12}  {:<6} {}  {}{}",
        view.size,
        kind,
        format_ticks(view.modified_ticks),
        view.name,
        deleted
    );
}

/// Converts 100ns-tick NTFS timestamps (since 1601-01-01 UTC) to a
/// human-readable form; the core itself stores only the raw ticks.
fn format_ticks(ticks: u64) -> String {
    const TICKS_PER_SECOND: i64 = 10_000_000;
    const EPOCH_DIFFERENCE_SECONDS: i64 = 11_644_473_600;

    let ticks = ticks as i64;
    let unix_seconds = ticks / TICKS_PER_SECOND - EPOCH_DIFFERENCE_SECONDS;
    let nanos = (ticks % TICKS_PER_SECOND) * 100;

    match chrono::DateTime::from_timestamp(unix_seconds, nanos as u32) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{ticks} ticks"),
    }
}

/// Deleted entries may collide on name (the same name reused across
/// generations); disambiguate with the MFT index.
fn sanitize_output_name(name: &str, mft_reference: u64) -> String {
    if name.is_empty() {
        format!("deleted_{mft_reference}")
    } else {
        format!("{mft_reference}_{name}")
    }
}
