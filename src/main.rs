mod cli;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use cli::{Args, CallPeaksArgs, Commands, ConfigArgs};
use mass_peak_caller::settings::{self, Platform};
use mass_peak_caller::{call_peaks, list_experiments, ConfigOverrides, Configuration, FileFailure};
use mass_peak_caller::{RunOptions, RunTimestamp};

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config_path = args
        .config
        .unwrap_or_else(|| settings::config_path(Platform::current()));

    let (config, initialised) = settings::load_or_init(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    if let Some(path) = initialised {
        eprintln!(
            "No configuration file found at {}.\nWrote default configuration to that location.\nContinuing with default config.",
            path.display()
        );
    }

    match args.command {
        Commands::List => run_list(&config),
        Commands::CallPeaks(call) => run_call_peaks(&config, call),
        Commands::Config(overrides) => run_config(&config, &config_path, overrides),
    }
}

fn run_list(config: &Configuration) -> Result<()> {
    let experiments = list_experiments(config).context("scanning raw-data folder")?;
    for (label, key) in experiments.labels().iter().zip(experiments.keys()) {
        println!("{label}\t{key}");
    }
    Ok(())
}

fn run_call_peaks(config: &Configuration, args: CallPeaksArgs) -> Result<()> {
    let timestamp = RunTimestamp::now();
    let options = RunOptions {
        output_folder: args.output_folder,
        metadata_file: args.metadata_file,
        format: args.format.into(),
    };

    let report = call_peaks(config, &args.experiment, &options, &timestamp)
        .with_context(|| format!("calling peaks for '{}'", args.experiment))?;

    for failure in &report.failures {
        warn!("skipped {failure}");
    }
    write_failures(&mut std::io::stderr().lock(), &report.failures)?;
    println!(
        "{}: {} peaks from {} measurements ({} files skipped)",
        report.experiment,
        report.peaks.len(),
        report.measurements,
        report.failures.len()
    );
    for path in [
        &report.artifacts.peaks,
        &report.artifacts.summary,
        &report.artifacts.config,
    ] {
        println!("  {}", path.display());
    }
    Ok(())
}

/// One line per skipped file, shown whatever the log level.
fn write_failures(out: &mut impl Write, failures: &[FileFailure]) -> std::io::Result<()> {
    for failure in failures {
        let reason = if failure.is_name_mismatch() {
            "unexpected file name"
        } else {
            "unreadable"
        };
        writeln!(out, "skipped ({reason}) {failure}")?;
    }
    Ok(())
}

fn run_config(
    config: &Configuration,
    path: &std::path::Path,
    args: ConfigArgs,
) -> Result<()> {
    let overrides = ConfigOverrides::from(args);
    let updated = config.with_overrides(&overrides);
    updated.validate()?;
    if !overrides.is_empty() {
        settings::save(path, &updated)
            .with_context(|| format!("saving configuration to {}", path.display()))?;
    }
    println!("{}", serde_json::to_string_pretty(&updated)?);
    Ok(())
}
