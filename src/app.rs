//! Application entry points behind the command-line flags.
//!
//! Orchestrates the conversion flow:
//! pick document → resume decision → convert → report

use crate::artifact::{ArtifactNamer, resolve_prefix};
use crate::checkpoint::{ArtifactPolicy, CheckpointRecord, CheckpointStore, Speed};
use crate::cli::Cli;
use crate::config::Config;
use crate::control::{
    CommandOutcome, HELP_TEXT, ListenerEvent, ShutdownController, spawn_command_listener,
};
use crate::driver::{ConversionReport, ConversionRequest, Driver, RunOutcome};
use crate::error::Result;
use crate::output::{clear_screen, format_elapsed};
use crate::pipeline::{DisplaySink, LogDisplay, TerminalDisplay};
use crate::synth::CommandSynthesizer;
use crate::sys::available_disk_mb;
use crate::text::{BoundaryCache, DocumentStats, format_count, format_file_size};
use owo_colors::OwoColorize;
use std::io::{BufRead, BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};

/// How to handle an incomplete run found for the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeChoice {
    Ask,
    Always,
    Never,
}

/// Per-invocation settings for a conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub document: PathBuf,
    pub prefix: Option<String>,
    pub resume: ResumeChoice,
    pub quiet: bool,
}

/// Fold command-line overrides into the loaded configuration.
pub fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }
    if let Some(lang) = &cli.language {
        config.synthesis.language = lang.clone();
    }
    if cli.slow {
        config.synthesis.slow = true;
    }
    if let Some(max_chars) = cli.max_chars {
        config.chunking.max_chars = max_chars;
    }
    if let Some(workers) = cli.workers {
        config.workers.max_workers = workers;
    }
    if cli.no_parallel {
        config.workers.parallel = false;
    }
    if let Some(ms) = cli.retry_delay {
        config.synthesis.retry_delay_ms = ms;
    }
}

/// Resolve which choice the flags ask for.
pub fn resume_choice(cli: &Cli) -> ResumeChoice {
    if cli.resume {
        ResumeChoice::Always
    } else if cli.fresh {
        ResumeChoice::Never
    } else if std::io::stdin().is_terminal() {
        ResumeChoice::Ask
    } else {
        ResumeChoice::Always
    }
}

fn open_store(config: &Config) -> Result<CheckpointStore> {
    Ok(
        CheckpointStore::open(config.state.resolve_directory().join("checkpoints"))?
            .with_prune_completed(config.state.prune_completed),
    )
}

fn boundary_cache(config: &Config) -> BoundaryCache {
    BoundaryCache::new(config.state.resolve_directory().join("boundaries"))
}

/// Print document statistics (`--info`).
pub fn show_info(config: &Config, document: &Path) -> Result<()> {
    let stats = DocumentStats::for_file(document, config.chunking.max_chars)?;
    println!("{}", document.display().bold());
    println!("  {}       {}", "Size:".dimmed(), format_file_size(stats.size_bytes));
    println!("  {} {}", "Characters:".dimmed(), format_count(stats.characters));
    println!("  {}      {}", "Words:".dimmed(), format_count(stats.words));
    println!("  {}      {}", "Lines:".dimmed(), format_count(stats.lines));
    println!(
        "  {}     ~{} (max {} chars each)",
        "Chunks:".dimmed(),
        format_count(stats.estimated_chunks),
        format_count(config.chunking.max_chars)
    );
    let output = &config.output.directory;
    let probe = if output.exists() {
        output.as_path()
    } else {
        Path::new(".")
    };
    if let Some(mb) = available_disk_mb(probe) {
        println!("  {}  {} MB free", "Disk:".dimmed(), format_count(mb as usize));
    }
    Ok(())
}

/// List saved runs (`--list`).
pub fn list_runs(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let records = store.list()?;
    if records.is_empty() {
        println!("No saved runs");
        return Ok(());
    }
    println!("Saved runs:");
    for record in &records {
        println!(
            "  {} {} [{}] {}/{} ({:.0}%)",
            record.run_key.as_str().dimmed(),
            record.document_path.display(),
            record.status,
            record.completed_chunks,
            record.total_chunks,
            record.progress_percent()
        );
    }
    Ok(())
}

/// Delete progress for one document, or everything (`--clean`).
pub fn clean(config: &Config, document: Option<&Path>) -> Result<()> {
    let store = open_store(config)?;
    let cache = boundary_cache(config);
    match document {
        Some(doc) => {
            let key = crate::keys::RunKey::for_document(doc);
            let report = store.purge(&key, ArtifactPolicy::Keep);
            let cache_removed = cache.remove(&key);
            if report.record_removed || cache_removed {
                println!("{}", format!("Removed progress for {}", doc.display()).green());
            } else {
                println!("No progress saved for {}", doc.display());
            }
        }
        None => {
            let records = store.clear_all()?;
            let caches = cache.clear_all();
            println!(
                "{}",
                format!("Removed {records} run record(s) and {caches} boundary cache(s)").green()
            );
        }
    }
    Ok(())
}

/// Remove finished or orphaned records (`--cleanup-stale`).
pub fn cleanup_stale(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let cache = boundary_cache(config);
    let removed = store.cleanup_stale()?;
    if removed.is_empty() {
        println!("No stale runs");
        return Ok(());
    }
    for record in &removed {
        cache.remove(&record.run_key);
        println!(
            "  removed {} ({})",
            record.document_path.display(),
            record.status
        );
    }
    println!("{}", format!("Removed {} stale run(s)", removed.len()).green());
    Ok(())
}

/// Delete progress for `document` and exit (`--delete-progress`).
pub fn delete_progress(config: &Config, document: &Path) -> Result<()> {
    clean(config, Some(document))
}

/// Ask a yes/no question; an empty answer takes `default`, EOF too.
pub fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    default: bool,
) -> std::io::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    write!(output, "{question} {hint} ")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(default);
    }
    Ok(match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}

fn describe_pending(record: &CheckpointRecord) {
    eprintln!(
        "{}",
        format!(
            "Found incomplete run: {}/{} chunks done",
            record.completed_chunks, record.total_chunks
        )
        .yellow()
    );
    eprintln!("  Output folder: {}", record.output_path.display());
    if let Some(prefix) = &record.name_prefix {
        eprintln!("  Prefix:        {prefix}");
    }
    eprintln!("  Language:      {} ({})", record.language, record.speed);
}

/// Completed chunks of `record` as (chunk number, artifact), ordered by the
/// number parsed back from each file name.
fn completed_listing(namer: &ArtifactNamer, record: &CheckpointRecord) -> Vec<(usize, PathBuf)> {
    let mut listing: Vec<(usize, PathBuf)> = record
        .artifacts
        .iter()
        .map(|(index, path)| {
            let number = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| namer.chunk_number(n))
                .unwrap_or(index + 1);
            (number, path.clone())
        })
        .collect();
    listing.sort_by_key(|(number, _)| *number);
    listing
}

fn describe_completed(driver: &Driver, record: &CheckpointRecord) {
    let listing = completed_listing(&driver.artifact_namer(record), record);
    if listing.is_empty() {
        return;
    }
    eprintln!("Previously completed chunks:");
    for (number, path) in &listing {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        eprintln!(
            "  {} Chunk {} ({})",
            "✅".green(),
            number,
            format_file_size(size)
        );
    }
    if let Some(next) = record.pending_indices().first() {
        eprintln!("Next chunk to process: #{}", next + 1);
    }
}

/// Decide whether to resume. Declining can purge old progress, and with a
/// second confirmation the old audio too.
fn decide_resume<R: BufRead, W: Write>(
    driver: &Driver,
    record: &CheckpointRecord,
    choice: ResumeChoice,
    document: &Path,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    match choice {
        ResumeChoice::Always => Ok(true),
        ResumeChoice::Never => Ok(false),
        ResumeChoice::Ask => {
            if confirm(input, output, "Resume where you left off?", true)? {
                return Ok(true);
            }
            if confirm(input, output, "Delete previous progress?", false)? {
                let policy = if confirm(
                    input,
                    output,
                    &format!(
                        "Also delete {} audio file(s) in {}?",
                        record.artifacts.len(),
                        record.output_path.display()
                    ),
                    false,
                )? {
                    ArtifactPolicy::Delete
                } else {
                    ArtifactPolicy::Keep
                };
                let report = driver.delete_progress(document, policy);
                writeln!(
                    output,
                    "Deleted progress ({} audio file(s) removed)",
                    report.artifacts_removed
                )?;
            }
            Ok(false)
        }
    }
}

fn print_feedback(event: &ListenerEvent) {
    match event {
        ListenerEvent::Applied(_, outcome) => match outcome {
            CommandOutcome::Paused => eprintln!("{}", "⏸  Paused. Type 'r' to resume.".yellow()),
            CommandOutcome::Resumed => eprintln!("{}", "▶  Resumed".green()),
            CommandOutcome::StopRequested => eprintln!(
                "{}",
                "Stopping after in-flight chunks finish...".yellow()
            ),
            CommandOutcome::ForceStopRequested => {
                eprintln!("{}", "Force stopping...".red())
            }
            CommandOutcome::DeleteRequested => {
                eprintln!("{}", "Stopping and deleting progress...".red())
            }
            CommandOutcome::ShowHelp => eprintln!("{HELP_TEXT}"),
            CommandOutcome::ClearScreen => clear_screen(),
            CommandOutcome::NoChange | CommandOutcome::Ignored => {}
        },
        ListenerEvent::Unknown(input) => eprintln!(
            "{}",
            format!("Unknown command '{input}'. Type 'h' for help.").dimmed()
        ),
    }
}

/// Run one conversion. Blocks until done or stopped via `controller`.
pub fn run_convert(
    config: Config,
    options: ConvertOptions,
    controller: ShutdownController,
) -> Result<ConversionReport> {
    config.validate()?;

    let synthesizer = CommandSynthesizer::from_config(&config.synthesis);
    let mut driver = Driver::from_config(&config, Box::new(synthesizer), controller.clone())?;
    if !config.workers.parallel {
        driver = driver.sequential();
    }

    let interactive = std::io::stdin().is_terminal();
    let mut stdin = BufReader::new(std::io::stdin());
    let mut resume = options.resume != ResumeChoice::Never;
    if let Some(record) = driver.pending_run(&options.document)? {
        if !options.quiet {
            describe_pending(&record);
        }
        resume = decide_resume(
            &driver,
            &record,
            options.resume,
            &options.document,
            &mut stdin,
            &mut std::io::stderr(),
        )?;
        if resume && !options.quiet {
            describe_completed(&driver, &record);
        }
    }

    if !options.quiet {
        let stats = DocumentStats::for_file(&options.document, config.chunking.max_chars)?;
        eprintln!(
            "Converting {} ({}, {} characters)",
            options.document.display().bold(),
            format_file_size(stats.size_bytes),
            format_count(stats.characters)
        );
    }

    let request = ConversionRequest {
        document: options.document.clone(),
        output_dir: config.output.directory.clone(),
        prefix: resolve_prefix(options.prefix.as_deref(), &config.output.directory),
        language: config.synthesis.language.clone(),
        speed: Speed::from_slow(config.synthesis.slow),
        max_chars: config.chunking.max_chars,
        resume,
    };

    if interactive && !options.quiet {
        eprintln!("{}", "Type 'h' for commands.".dimmed());
        let _listener =
            spawn_command_listener(stdin, controller.clone(), |event| print_feedback(&event))?;
    }

    let mut display: Box<dyn DisplaySink> = if std::io::stderr().is_terminal() && !options.quiet {
        Box::new(TerminalDisplay::new())
    } else {
        Box::new(LogDisplay::new())
    };

    let report = driver.convert(&request, display.as_mut())?;
    if !options.quiet {
        print_report(&report);
    }
    Ok(report)
}

fn print_report(report: &ConversionReport) {
    let progress = format!("{}/{}", report.completed_chunks, report.total_chunks);
    match report.outcome {
        RunOutcome::Completed => eprintln!(
            "{}",
            format!("Done: {progress} chunks in {}", report.output_dir.display()).green()
        ),
        RunOutcome::Incomplete => eprintln!(
            "{}",
            format!(
                "Finished with {} failed chunk(s) ({progress} done). Run again to retry.",
                report.failed_chunks.len()
            )
            .yellow()
        ),
        RunOutcome::Stopped => eprintln!(
            "{}",
            format!("Stopped at {progress}. Run again to resume.").yellow()
        ),
        RunOutcome::ForceStopped => eprintln!(
            "{}",
            format!("Force stopped at {progress}. In-flight chunks will be redone.").yellow()
        ),
        RunOutcome::Deleted => eprintln!("{}", "Progress deleted.".red()),
    }
    eprintln!(
        "  Session: {} | Total: {}",
        format_elapsed(report.session_elapsed),
        format_elapsed(report.total_elapsed)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Cursor;

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::try_parse_from([
            "chunkvox",
            "a.txt",
            "-o",
            "out",
            "-l",
            "fr",
            "--slow",
            "--max-chars",
            "900",
            "-w",
            "8",
            "--no-parallel",
            "--retry-delay",
            "1s",
        ])
        .unwrap();
        let mut config = Config::default();
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.output.directory, PathBuf::from("out"));
        assert_eq!(config.synthesis.language, "fr");
        assert!(config.synthesis.slow);
        assert_eq!(config.chunking.max_chars, 900);
        assert_eq!(config.workers.max_workers, 8);
        assert_eq!(config.workers.effective_workers(), 1);
        assert_eq!(config.synthesis.retry_delay_ms, 1000);
    }

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::try_parse_from(["chunkvox", "a.txt"]).unwrap();
        let mut config = Config::default();
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn explicit_resume_flags() {
        let cli = Cli::try_parse_from(["chunkvox", "a.txt", "--resume"]).unwrap();
        assert_eq!(resume_choice(&cli), ResumeChoice::Always);
        let cli = Cli::try_parse_from(["chunkvox", "a.txt", "--fresh"]).unwrap();
        assert_eq!(resume_choice(&cli), ResumeChoice::Never);
    }

    #[test]
    fn confirm_answers() {
        let mut out = Vec::new();
        assert!(confirm(&mut Cursor::new("y\n"), &mut out, "Go?", false).unwrap());
        assert!(!confirm(&mut Cursor::new("no\n"), &mut out, "Go?", true).unwrap());
        assert!(confirm(&mut Cursor::new("\n"), &mut out, "Go?", true).unwrap());
        assert!(!confirm(&mut Cursor::new(""), &mut out, "Go?", false).unwrap());
        assert!(String::from_utf8(out).unwrap().starts_with("Go? [y/N] "));
    }

    #[test]
    fn completed_listing_uses_numbers_from_file_names() {
        let mut record = CheckpointRecord::new(
            crate::keys::RunKey::for_document(Path::new("/books/a.txt")),
            "/books/a.txt",
            8,
            "/out",
            "en",
            Speed::Normal,
            Some("book".to_string()),
        );
        record.record_completed(3, PathBuf::from("/out/book 4.mp3"));
        record.record_completed(0, PathBuf::from("/out/book 1.mp3"));
        record.record_completed(5, PathBuf::from("/out/legacy.mp3"));
        let namer = ArtifactNamer::new("/out", Some("book".to_string()));

        let numbers: Vec<usize> = completed_listing(&namer, &record)
            .into_iter()
            .map(|(number, _)| number)
            .collect();
        assert_eq!(numbers, vec![1, 4, 6]);
    }
}
