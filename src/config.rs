use serde::Deserialize;
use std::path::Path;

use crate::audio::features::Band;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
}

/// Onset detection parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// FFT block size; must be a power of two
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
    /// Frames skipped at the start and averaged for the adaptive threshold
    #[serde(default = "default_history_frames")]
    pub history_frames: usize,
    #[serde(default = "default_threshold_multiplier")]
    pub threshold_multiplier: f32,
    #[serde(default = "default_threshold_floor")]
    pub threshold_floor: f32,
    /// Hops processed between progress reports
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
    #[serde(default)]
    pub min_interval: MinIntervals,
}

/// Minimum seconds between accepted onsets, per band.
#[derive(Debug, Clone, Deserialize)]
pub struct MinIntervals {
    #[serde(default = "default_bass_interval")]
    pub bass: f64,
    #[serde(default = "default_mid_interval")]
    pub mid_low: f64,
    #[serde(default = "default_mid_interval")]
    pub mid_high: f64,
    #[serde(default = "default_high_interval")]
    pub high: f64,
}

impl MinIntervals {
    pub fn get(&self, band: Band) -> f64 {
        match band {
            Band::Bass => self.bass,
            Band::MidLow => self.mid_low,
            Band::MidHigh => self.mid_high,
            Band::High => self.high,
        }
    }
}

/// Chart generation parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_lane_count")]
    pub lane_count: usize,
    /// Lanes used by notes within this many seconds are avoided for the next note
    #[serde(default = "default_recent_window")]
    pub recent_window: f64,
    #[serde(default = "default_min_lane_spacing")]
    pub min_lane_spacing: f64,
    /// 0.0 keeps ~30% of notes, 1.0 keeps all of them
    #[serde(default = "default_difficulty")]
    pub difficulty: f64,
    /// Fixed seed for reproducible lane layouts; entropy-seeded when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Judgment engine parameters, all in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_perfect")]
    pub perfect: f64,
    #[serde(default = "default_great")]
    pub great: f64,
    #[serde(default = "default_good")]
    pub good: f64,
    #[serde(default = "default_note_appear_time")]
    pub note_appear_time: f64,
    #[serde(default = "default_manual_offset")]
    pub manual_offset: f64,
    #[serde(default = "default_end_grace")]
    pub end_grace: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            hop_size: default_hop_size(),
            history_frames: default_history_frames(),
            threshold_multiplier: default_threshold_multiplier(),
            threshold_floor: default_threshold_floor(),
            progress_every: default_progress_every(),
            min_interval: MinIntervals::default(),
        }
    }
}

impl Default for MinIntervals {
    fn default() -> Self {
        Self {
            bass: default_bass_interval(),
            mid_low: default_mid_interval(),
            mid_high: default_mid_interval(),
            high: default_high_interval(),
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            lane_count: default_lane_count(),
            recent_window: default_recent_window(),
            min_lane_spacing: default_min_lane_spacing(),
            difficulty: default_difficulty(),
            seed: None,
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            perfect: default_perfect(),
            great: default_great(),
            good: default_good(),
            note_appear_time: default_note_appear_time(),
            manual_offset: default_manual_offset(),
            end_grace: default_end_grace(),
        }
    }
}

fn default_window_size() -> usize { 1024 }
fn default_hop_size() -> usize { 512 }
fn default_history_frames() -> usize { 10 }
fn default_threshold_multiplier() -> f32 { 1.5 }
fn default_threshold_floor() -> f32 { 0.001 }
fn default_progress_every() -> usize { 200 }
fn default_bass_interval() -> f64 { 0.12 }
fn default_mid_interval() -> f64 { 0.10 }
fn default_high_interval() -> f64 { 0.08 }
fn default_lane_count() -> usize { 4 }
fn default_recent_window() -> f64 { 0.2 }
fn default_min_lane_spacing() -> f64 { 0.1 }
fn default_difficulty() -> f64 { 1.0 }
fn default_perfect() -> f64 { 0.05 }
fn default_great() -> f64 { 0.10 }
fn default_good() -> f64 { 0.15 }
fn default_note_appear_time() -> f64 { 2.0 }
fn default_manual_offset() -> f64 { 0.05 }
fn default_end_grace() -> f64 { 1.0 }

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("analysis.window_size must be a power of two, got {0}")]
    WindowSize(usize),
    #[error("analysis.hop_size must be at least 1")]
    HopSize,
    #[error("chart.lane_count must be at least 1")]
    LaneCount,
    #[error("chart.difficulty must be a finite number, got {0}")]
    Difficulty(f64),
}

impl Config {
    /// Reject values that would otherwise panic deep inside analysis or generation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.validate()?;
        self.chart.validate()
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.window_size.is_power_of_two() {
            return Err(ConfigError::WindowSize(self.window_size));
        }
        if self.hop_size == 0 {
            return Err(ConfigError::HopSize);
        }
        Ok(())
    }
}

impl ChartConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lane_count == 0 {
            return Err(ConfigError::LaneCount);
        }
        if !self.difficulty.is_finite() {
            return Err(ConfigError::Difficulty(self.difficulty));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.analysis.window_size, 1024);
        assert_eq!(config.analysis.hop_size, 512);
        assert_eq!(config.analysis.min_interval.get(Band::Bass), 0.12);
        assert_eq!(config.analysis.min_interval.get(Band::High), 0.08);
        assert_eq!(config.chart.lane_count, 4);
        assert_eq!(config.chart.seed, None);
        assert_eq!(config.judge.good, 0.15);
        assert_eq!(config.judge.manual_offset, 0.05);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [chart]
            seed = 7
            lane_count = 6

            [judge]
            perfect = 0.03

            [analysis.min_interval]
            bass = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(config.chart.seed, Some(7));
        assert_eq!(config.chart.lane_count, 6);
        assert_eq!(config.chart.min_lane_spacing, 0.1);
        assert_eq!(config.judge.perfect, 0.03);
        assert_eq!(config.judge.great, 0.10);
        assert_eq!(config.analysis.min_interval.bass, 0.2);
        assert_eq!(config.analysis.min_interval.mid_low, 0.10);
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_unusable_analysis_sizes() {
        for size in [0, 1000, 1536] {
            let config: Config =
                toml::from_str(&format!("[analysis]\nwindow_size = {}", size)).unwrap();
            assert_eq!(config.validate(), Err(ConfigError::WindowSize(size)));
        }
        let config: Config = toml::from_str("[analysis]\nhop_size = 0").unwrap();
        assert_eq!(config.validate(), Err(ConfigError::HopSize));

        let config: Config = toml::from_str("[analysis]\nwindow_size = 2048").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_lanes_and_nan_difficulty() {
        let config: Config = toml::from_str("[chart]\nlane_count = 0").unwrap();
        assert_eq!(config.validate(), Err(ConfigError::LaneCount));

        let config: Config = toml::from_str("[chart]\ndifficulty = nan").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Difficulty(d)) if d.is_nan()));

        let config: Config = toml::from_str("[chart]\ndifficulty = inf").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Difficulty(_))));
    }
}
