//! Onset times to playable lane charts.
//!
//! Lane choice and difficulty thinning draw from an injectable RNG. A generator
//! built from a [`ChartConfig`] with `seed` set is fully reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

use super::model::{Chart, Note};
use crate::audio::features::OnsetSet;
use crate::config::ChartConfig;

pub struct ChartGenerator<R = StdRng> {
    config: ChartConfig,
    rng: R,
}

impl ChartGenerator<StdRng> {
    pub fn new(config: ChartConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }
}

impl<R: Rng> ChartGenerator<R> {
    pub fn with_rng(config: ChartConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Onsets → cleaned chart → thinned to the configured difficulty.
    pub fn generate(&mut self, onsets: &OnsetSet) -> Chart {
        let chart = self.from_band_onsets(onsets);
        let level = self.config.difficulty;
        let chart = self.adjust_difficulty(&chart, level);
        log::info!(
            "Chart: {} notes from {} bass onsets (difficulty {:.2})",
            chart.len(),
            onsets.bass.len(),
            level
        );
        chart
    }

    /// Build a chart anchored on the bass onsets only; the other bands are ignored.
    pub fn from_band_onsets(&mut self, onsets: &OnsetSet) -> Chart {
        let notes = self.place_lanes(&onsets.bass);
        cleanup(notes, self.config.min_lane_spacing)
    }

    /// Assign a lane to each time in arrival order, avoiding lanes used by notes
    /// placed within the last `recent_window` seconds. With no lanes there is
    /// nowhere to place a note and the result is empty.
    pub fn place_lanes(&mut self, times: &[f64]) -> Vec<Note> {
        let lane_count = self.config.lane_count;
        if lane_count == 0 {
            log::warn!("Chart has zero lanes; dropping {} onsets", times.len());
            return Vec::new();
        }
        let window = self.config.recent_window;
        let mut notes: Vec<Note> = Vec::with_capacity(times.len());
        let mut busy = vec![false; lane_count];

        for &time in times {
            busy.iter_mut().for_each(|b| *b = false);
            for note in &notes {
                let age = time - note.time;
                if (0.0..window).contains(&age) && note.lane < lane_count {
                    busy[note.lane] = true;
                }
            }

            let free: Vec<usize> = (0..lane_count).filter(|&lane| !busy[lane]).collect();
            let lane = match free.choose(&mut self.rng) {
                Some(&lane) => lane,
                None => self.rng.gen_range(0..lane_count),
            };
            notes.push(Note::new(time, lane));
        }
        notes
    }

    /// Keep each note with probability `0.3 + 0.7 * level`; `level >= 1` returns the chart as is.
    /// A NaN level counts as full difficulty.
    pub fn adjust_difficulty(&mut self, chart: &Chart, level: f64) -> Chart {
        if level.is_nan() || level >= 1.0 {
            return chart.clone();
        }
        let keep = 0.3 + 0.7 * level.clamp(0.0, 1.0);
        let notes = chart
            .notes
            .iter()
            .filter(|_| self.rng.gen_bool(keep))
            .copied()
            .collect();
        Chart::new(notes)
    }
}

/// Sort by time, drop duplicate (10 ms bucket, lane) pairs, then drop notes closer
/// than `min_lane_spacing` to the previous kept note on the same lane. Idempotent.
pub fn cleanup(mut notes: Vec<Note>, min_lane_spacing: f64) -> Chart {
    notes.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut seen = HashSet::new();
    notes.retain(|n| seen.insert((time_bucket(n.time), n.lane)));

    let mut last_in_lane: HashMap<usize, f64> = HashMap::new();
    notes.retain(|n| match last_in_lane.get(&n.lane) {
        Some(&last) if n.time - last < min_lane_spacing => false,
        _ => {
            last_in_lane.insert(n.lane, n.time);
            true
        }
    });

    Chart::new(notes)
}

/// Time rounded to two decimal places, as an integer key.
fn time_bucket(time: f64) -> i64 {
    (time * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> ChartGenerator {
        ChartGenerator::new(ChartConfig { seed: Some(seed), ..Default::default() })
    }

    fn bass(times: Vec<f64>) -> OnsetSet {
        OnsetSet { bass: times, ..Default::default() }
    }

    fn assert_chart_invariants(chart: &Chart, lane_count: usize) {
        assert!(chart.validate(lane_count).is_ok());
        let mut buckets = HashSet::new();
        for note in &chart.notes {
            assert!(buckets.insert((time_bucket(note.time), note.lane)));
        }
        for lane in 0..lane_count {
            let times: Vec<f64> = chart.notes_in_lane(lane).map(|n| n.time).collect();
            assert!(times.windows(2).all(|w| w[1] - w[0] >= 0.1));
        }
    }

    #[test]
    fn same_seed_same_chart() {
        let onsets = bass((0..200).map(|i| i as f64 * 0.13).collect());
        let a = seeded(42).generate(&onsets);
        let b = seeded(42).generate(&onsets);
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);
    }

    #[test]
    fn only_bass_feeds_the_chart() {
        let onsets = OnsetSet {
            bass: Vec::new(),
            mid_low: vec![0.5, 1.0],
            mid_high: vec![0.7],
            high: vec![0.2, 0.9],
        };
        assert!(seeded(1).from_band_onsets(&onsets).is_empty());
    }

    #[test]
    fn recent_lanes_are_avoided() {
        for seed in 0..20 {
            let notes = seeded(seed).place_lanes(&[0.0, 0.05, 0.1, 0.15]);
            let lanes: HashSet<usize> = notes.iter().map(|n| n.lane).collect();
            assert_eq!(lanes.len(), 4, "seed {} reused a busy lane: {:?}", seed, notes);
        }
    }

    #[test]
    fn all_lanes_busy_falls_back_to_any_lane() {
        let notes = seeded(3).place_lanes(&[0.0, 0.01, 0.02, 0.03, 0.04]);
        assert_eq!(notes.len(), 5);
        assert!(notes.iter().all(|n| n.lane < 4));
    }

    #[test]
    fn notes_older_than_window_free_their_lane() {
        let config = ChartConfig { lane_count: 1, seed: Some(9), ..Default::default() };
        let notes = ChartGenerator::new(config).place_lanes(&[0.0, 0.5, 1.0]);
        assert!(notes.iter().all(|n| n.lane == 0));
    }

    #[test]
    fn zero_lanes_places_nothing() {
        let config = ChartConfig { lane_count: 0, seed: Some(2), ..Default::default() };
        let notes = ChartGenerator::new(config).place_lanes(&[0.0, 0.5, 1.0]);
        assert!(notes.is_empty());
    }

    #[test]
    fn cleanup_dedups_time_buckets_per_lane() {
        let chart = cleanup(
            vec![
                Note::new(1.004, 0),
                Note::new(1.001, 0),
                Note::new(1.002, 1),
            ],
            0.1,
        );
        assert_eq!(chart.notes, vec![Note::new(1.001, 0), Note::new(1.002, 1)]);
    }

    #[test]
    fn cleanup_enforces_lane_spacing() {
        let chart = cleanup(
            vec![
                Note::new(1.0, 1),
                Note::new(1.05, 1),
                Note::new(1.06, 2),
                Note::new(1.12, 1),
            ],
            0.1,
        );
        assert_eq!(
            chart.notes,
            vec![Note::new(1.0, 1), Note::new(1.06, 2), Note::new(1.12, 1)]
        );
    }

    #[test]
    fn generated_charts_hold_invariants_and_cleanup_is_idempotent() {
        let mut source = StdRng::seed_from_u64(1234);
        for round in 0..25 {
            let times: Vec<f64> = (0..300)
                .map(|_| (source.gen_range(0..6000) as f64) * 0.01)
                .collect();
            let chart = seeded(round).from_band_onsets(&bass(times));
            assert_chart_invariants(&chart, 4);

            let again = cleanup(chart.notes.clone(), 0.1);
            assert_eq!(again, chart);
        }
    }

    #[test]
    fn full_difficulty_is_identity() {
        let chart = Chart::new((0..50).map(|i| Note::new(i as f64 * 0.3, i % 4)).collect());
        assert_eq!(seeded(5).adjust_difficulty(&chart, 1.0), chart);
        assert_eq!(seeded(5).adjust_difficulty(&chart, 1.7), chart);
    }

    #[test]
    fn non_finite_difficulty_never_panics() {
        let chart = Chart::new((0..50).map(|i| Note::new(i as f64 * 0.3, i % 4)).collect());
        assert_eq!(seeded(5).adjust_difficulty(&chart, f64::NAN), chart);
        assert_eq!(seeded(5).adjust_difficulty(&chart, f64::INFINITY), chart);
        let thinned = seeded(5).adjust_difficulty(&chart, f64::NEG_INFINITY);
        assert!(thinned.len() <= chart.len());

        let config = ChartConfig { difficulty: f64::NAN, seed: Some(5), ..Default::default() };
        let onsets = bass((0..20).map(|i| i as f64 * 0.5).collect());
        assert_eq!(ChartGenerator::new(config).generate(&onsets).len(), 20);
    }

    #[test]
    fn difficulty_retention_rate() {
        let chart = Chart::new((0..20_000).map(|i| Note::new(i as f64 * 0.2, i % 4)).collect());
        let mut generator = seeded(77);

        let easiest = generator.adjust_difficulty(&chart, 0.0);
        let fraction = easiest.len() as f64 / chart.len() as f64;
        assert!((fraction - 0.3).abs() < 0.02, "kept {}", fraction);

        let medium = generator.adjust_difficulty(&chart, 0.5);
        let fraction = medium.len() as f64 / chart.len() as f64;
        assert!((fraction - 0.65).abs() < 0.02, "kept {}", fraction);

        // thinning preserves order
        assert!(medium.notes.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn custom_lane_count() {
        let config = ChartConfig { lane_count: 6, seed: Some(11), ..Default::default() };
        let times: Vec<f64> = (0..100).map(|i| i as f64 * 0.05).collect();
        let chart = ChartGenerator::new(config).from_band_onsets(&bass(times));
        assert_chart_invariants(&chart, 6);
        assert!(chart.notes.iter().any(|n| n.lane >= 4));
    }
}
