use anyhow::{Context, Result};
use chunkvox::app::{
    ConvertOptions, apply_cli_overrides, clean, cleanup_stale, delete_progress, list_runs,
    resume_choice, run_convert, show_info,
};
use chunkvox::cli::{Cli, Commands};
use chunkvox::config::Config;
use chunkvox::control::ShutdownController;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "chunkvox",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    init_logging(cli.quiet, cli.verbose);
    tracing::debug!(version = %chunkvox::version_string(), "starting");

    let mut config = load_config(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli);

    if cli.list {
        list_runs(&config)?;
        return Ok(());
    }
    if cli.cleanup_stale {
        cleanup_stale(&config)?;
        return Ok(());
    }
    if cli.clean {
        clean(&config, cli.file.as_deref())?;
        return Ok(());
    }

    let document = if cli.interactive {
        let root = std::env::current_dir().context("cannot read current directory")?;
        let mut stdin = BufReader::new(std::io::stdin());
        match chunkvox::picker::pick_file(&root, &mut stdin, &mut std::io::stderr())? {
            Some(path) => path,
            None => return Ok(()),
        }
    } else if let Some(file) = cli.file.clone() {
        file
    } else {
        eprintln!("No input file given.");
        eprintln!("Usage: chunkvox <FILE>  (or -i to pick one)");
        std::process::exit(1);
    };

    if cli.info {
        show_info(&config, &document)?;
        return Ok(());
    }
    if cli.delete_progress {
        delete_progress(&config, &document)?;
        return Ok(());
    }

    let options = ConvertOptions {
        document,
        prefix: cli.prefix.clone(),
        resume: resume_choice(&cli),
        quiet: cli.quiet,
    };
    let controller = ShutdownController::new();
    let worker_controller = controller.clone();
    let mut conversion =
        tokio::task::spawn_blocking(move || run_convert(config, options, worker_controller));

    // Failed chunks are reported and kept for the next run; they do not
    // change the exit status.
    let joined = tokio::select! {
        joined = &mut conversion => joined,
        _ = tokio::signal::ctrl_c() => {
            chunkvox::output::clear_line();
            if !controller.interrupt() {
                // Still at the resume prompt: nothing to save, and the
                // blocked stdin read would never return.
                eprintln!("{}", "Interrupted".yellow());
                std::process::exit(0);
            }
            eprintln!("{}", "Interrupted, saving progress...".yellow());
            conversion.await
        }
    };
    joined.context("conversion task panicked")??;
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/chunkvox/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("cannot load config {}", path.display()))?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

/// Route `tracing` to stderr. `CHUNKVOX_LOG` wins over the verbosity flags.
fn init_logging(quiet: bool, verbose: u8) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("CHUNKVOX_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("chunkvox={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .ok();
}
