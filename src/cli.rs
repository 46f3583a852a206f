use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "beatlane", about = "Generate rhythm-game charts from audio and play them back")]
pub struct Cli {
    /// Config file (defaults to ./beatlane.toml or the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze audio files and write a chart for each
    Chart(ChartArgs),
    /// Print detected onsets per frequency band as JSON
    Onsets {
        /// Input audio file (WAV, MP3, FLAC, OGG)
        input: PathBuf,
    },
    /// Play a chart offline against scripted or automatic input
    Play(PlayArgs),
}

#[derive(Args, Debug)]
pub struct ChartArgs {
    /// Input audio files (WAV, MP3, FLAC, OGG)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file, or directory when several inputs are given
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Difficulty from 0.0 (sparse) to 1.0 (every onset)
    #[arg(short, long, default_value_t = 1.0)]
    pub difficulty: f64,

    /// Seed for reproducible lane layouts
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of lanes
    #[arg(long, default_value_t = 4)]
    pub lanes: usize,
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Chart JSON written by `beatlane chart`
    pub chart: PathBuf,

    /// Input script: one `time lane[,lane...]` press per line, `#` comments
    #[arg(short, long, conflicts_with = "autoplay")]
    pub script: Option<PathBuf>,

    /// Press every note automatically
    #[arg(long)]
    pub autoplay: bool,

    /// Random timing error for autoplay, in milliseconds
    #[arg(long, default_value_t = 0.0)]
    pub jitter_ms: f64,

    /// Only judge these lanes (reduced-input mode)
    #[arg(long, value_delimiter = ',')]
    pub lanes_subset: Vec<usize>,

    /// Number of lanes the chart was generated with
    #[arg(long, default_value_t = 4)]
    pub lanes: usize,

    /// Seed for autoplay jitter
    #[arg(long)]
    pub seed: Option<u64>,

    /// Host update rate in ticks per second
    #[arg(long, default_value_t = 120)]
    pub tick_rate: u32,

    /// Print every judgment as it happens
    #[arg(short, long)]
    pub verbose: bool,
}
