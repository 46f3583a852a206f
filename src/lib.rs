//! beatlane - audio to rhythm-game charts, and real-time judgment of play against them.
//!
//! Pipeline: [`audio::decode`] → [`audio::onset::detect_by_band`] →
//! [`chart::ChartGenerator`] → [`judge::JudgmentEngine`].

pub mod audio;
pub mod chart;
pub mod config;
pub mod judge;

pub use audio::features::{Band, OnsetSet, SampleBuffer};
pub use chart::{Chart, ChartGenerator, Note};
pub use config::Config;
pub use judge::{GameEvent, JudgmentEngine, Judgment, ResultSummary};
