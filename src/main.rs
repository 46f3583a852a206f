mod cli;
mod play;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use beatlane::audio::{decode, onset};
use beatlane::config::{self, Config};
use beatlane::{Chart, ChartGenerator, OnsetSet};
use cli::{ChartArgs, Cli, Command, PlayArgs};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.clone());

    match cli.command {
        Command::Chart(args) => run_chart(args, config),
        Command::Onsets { input } => run_onsets(&input, &config),
        Command::Play(args) => run_play(args, config),
    }
}

/// Explicit --config path, or auto-detect beatlane.toml / global config.
fn resolve_config(explicit: Option<PathBuf>) -> Config {
    let config_path = explicit.or_else(|| {
        let local = PathBuf::from("beatlane.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("beatlane").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("beatlane").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });

    match config_path {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    }
}

fn progress_bar(multi: &MultiProgress, label: String) -> ProgressBar {
    let pb = multi.add(ProgressBar::new(1000));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(label);
    pb
}

fn analyze_file(input: &Path, config: &Config, pb: &ProgressBar) -> Result<OnsetSet> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let buffer = decode::decode_audio(input)?;
    let onsets = onset::detect_by_band(&buffer, &config.analysis, |fraction| {
        pb.set_position((fraction * 1000.0) as u64);
        ControlFlow::Continue(())
    })?;
    pb.finish();
    Ok(onsets)
}

fn run_chart(args: ChartArgs, mut config: Config) -> Result<()> {
    // Merge: CLI values apply only when they differ from the CLI default
    if args.difficulty != 1.0 {
        config.chart.difficulty = args.difficulty;
    }
    if args.lanes != 4 {
        config.chart.lane_count = args.lanes;
    }
    if args.seed.is_some() {
        config.chart.seed = args.seed;
    }
    config.validate().context("Invalid chart settings")?;

    let multiple = args.inputs.len() > 1;
    let multi = MultiProgress::new();

    let written: Vec<PathBuf> = args
        .inputs
        .par_iter()
        .map(|input| -> Result<PathBuf> {
            let name = input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let pb = progress_bar(&multi, name);
            let onsets = analyze_file(input, &config, &pb)
                .with_context(|| format!("Failed to analyze {}", input.display()))?;

            let chart = ChartGenerator::new(config.chart.clone()).generate(&onsets);
            if chart.is_empty() {
                log::warn!("{}: no bass onsets found, chart is empty", input.display());
            }

            let path = output_path(input, args.output.as_deref(), multiple);
            write_chart(&chart, &path)?;
            Ok(path)
        })
        .collect::<Result<_>>()?;

    for path in written {
        log::info!("Wrote {}", path.display());
    }
    Ok(())
}

fn output_path(input: &Path, output: Option<&Path>, multiple: bool) -> PathBuf {
    let file_name = format!(
        "{}.chart.json",
        input.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default()
    );
    match output {
        Some(out) if !multiple && !out.is_dir() => out.to_path_buf(),
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

fn write_chart(chart: &Chart, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(chart)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write chart: {}", path.display()))
}

fn run_onsets(input: &Path, config: &Config) -> Result<()> {
    config.analysis.validate().context("Invalid analysis settings")?;
    let multi = MultiProgress::new();
    let pb = progress_bar(&multi, "analyzing".into());
    let onsets = analyze_file(input, config, &pb)?;
    for band in beatlane::Band::ALL {
        log::info!("{:>8}: {} onsets", band.name(), onsets.get(band).len());
    }
    println!("{}", serde_json::to_string_pretty(&onsets)?);
    Ok(())
}

fn run_play(args: PlayArgs, mut config: Config) -> Result<()> {
    if args.lanes != 4 {
        config.chart.lane_count = args.lanes;
    }
    config.chart.validate().context("Invalid lane settings")?;
    let lane_count = config.chart.lane_count;

    let text = std::fs::read_to_string(&args.chart)
        .with_context(|| format!("Failed to read chart: {}", args.chart.display()))?;
    let chart: Chart = serde_json::from_str(&text)
        .with_context(|| format!("Invalid chart JSON: {}", args.chart.display()))?;
    chart.validate(lane_count)?;

    let inputs = match (&args.script, args.autoplay) {
        (Some(script), _) => {
            let text = std::fs::read_to_string(script)
                .with_context(|| format!("Failed to read input script: {}", script.display()))?;
            play::parse_script(&text)?
        }
        (None, true) => play::autoplay_inputs(&chart, args.jitter_ms, args.seed),
        (None, false) => {
            log::warn!("No --script or --autoplay given; every note will be missed");
            Vec::new()
        }
    };

    log::info!("Playing {} notes with {} inputs", chart.len(), inputs.len());
    let options = play::SessionOptions {
        judge: &config.judge,
        lane_count,
        lane_subset: &args.lanes_subset,
        tick_rate: args.tick_rate,
        verbose: args.verbose,
    };
    let summary = play::run_session(chart, &inputs, &options)?;

    println!("Score:     {}", summary.score);
    println!("Max combo: {}", summary.max_combo);
    println!(
        "Perfect {} / Great {} / Good {} / Miss {}  ({} notes)",
        summary.counts.perfect,
        summary.counts.great,
        summary.counts.good,
        summary.counts.miss,
        summary.total_notes
    );
    println!("Accuracy:  {:.2}%", summary.accuracy() * 100.0);
    if summary.full_combo() {
        println!("FULL COMBO");
    }
    Ok(())
}
