//! Multi-band spectral-flux onset detection.
//!
//! The analysis is resumable: [`OnsetAnalysis::step`] processes a bounded chunk of
//! hops and returns, so a cooperative host can interleave it with other work,
//! show progress, or drop it to cancel. [`detect_by_band`] drives it to completion.

use std::ops::ControlFlow;

use super::features::{Band, BandEnergy, FluxSample, OnsetSet, SampleBuffer};
use super::spectrum::SpectralFrontend;
use crate::config::{AnalysisConfig, ConfigError};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AnalysisError {
    #[error("onset analysis cancelled")]
    Cancelled,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Outcome of one analysis chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnalysisStep {
    /// More hops remain; fraction of hops processed so far.
    Progress(f32),
    Finished,
}

pub struct OnsetAnalysis<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    config: AnalysisConfig,
    frontend: Option<SpectralFrontend>,
    next_hop: usize,
    total_hops: usize,
    prev_energy: BandEnergy,
    flux: [Vec<FluxSample>; 4],
}

impl<'a> OnsetAnalysis<'a> {
    /// Panics if `config.window_size` is not a power of two.
    pub fn new(buffer: &'a SampleBuffer, config: AnalysisConfig) -> Self {
        let total_hops = if buffer.is_empty() {
            0
        } else {
            hop_count(buffer.samples.len(), config.window_size, config.hop_size)
        };
        let frontend = (total_hops > 0).then(|| SpectralFrontend::new(config.window_size));

        Self {
            samples: &buffer.samples,
            sample_rate: buffer.sample_rate,
            config,
            frontend,
            next_hop: 0,
            total_hops,
            prev_energy: BandEnergy::default(),
            flux: Default::default(),
        }
    }

    pub fn total_hops(&self) -> usize {
        self.total_hops
    }

    pub fn is_finished(&self) -> bool {
        self.next_hop >= self.total_hops
    }

    pub fn progress(&self) -> f32 {
        if self.total_hops == 0 {
            return 1.0;
        }
        self.next_hop as f32 / self.total_hops as f32
    }

    /// Flux series computed so far for one band.
    pub fn flux(&self, band: Band) -> &[FluxSample] {
        &self.flux[band.index()]
    }

    /// Process up to `progress_every` hops.
    pub fn step(&mut self) -> AnalysisStep {
        let Some(frontend) = self.frontend.as_mut() else {
            self.next_hop = self.total_hops;
            return AnalysisStep::Finished;
        };

        let chunk_end = (self.next_hop + self.config.progress_every.max(1)).min(self.total_hops);
        let window = self.config.window_size;

        for hop in self.next_hop..chunk_end {
            let start = hop * self.config.hop_size;
            let spectrum = frontend.compute(&self.samples[start..start + window]);
            let energy = BandEnergy::from_spectrum(&spectrum, self.sample_rate, window);
            let flux = energy.flux_since(&self.prev_energy);
            let time = start as f64 / self.sample_rate as f64;

            for band in Band::ALL {
                self.flux[band.index()].push(FluxSample {
                    time,
                    flux: flux[band.index()],
                });
            }
            self.prev_energy = energy;
        }
        self.next_hop = chunk_end;

        if self.is_finished() {
            AnalysisStep::Finished
        } else {
            AnalysisStep::Progress(self.progress())
        }
    }

    /// Run any remaining hops, then pick peaks in every band.
    pub fn finish(mut self) -> OnsetSet {
        while self.step() != AnalysisStep::Finished {}

        let mut onsets = OnsetSet::default();
        for band in Band::ALL {
            let peaks = pick_peaks(&self.flux[band.index()], &self.config);
            let times = enforce_min_interval(&peaks, self.config.min_interval.get(band));
            onsets.set(band, times);
        }

        log::info!(
            "Onsets over {} hops: bass={}, midLow={}, midHigh={}, high={}",
            self.total_hops,
            onsets.bass.len(),
            onsets.mid_low.len(),
            onsets.mid_high.len(),
            onsets.high.len()
        );
        onsets
    }
}

/// Analyze a whole buffer, reporting progress after every chunk.
///
/// Returning `ControlFlow::Break` from `progress` abandons the analysis.
/// An empty buffer yields an empty set without calling `progress`. An unusable
/// window or hop size is reported as [`AnalysisError::Config`].
pub fn detect_by_band<F>(
    buffer: &SampleBuffer,
    config: &AnalysisConfig,
    mut progress: F,
) -> Result<OnsetSet, AnalysisError>
where
    F: FnMut(f32) -> ControlFlow<()>,
{
    config.validate()?;
    let mut analysis = OnsetAnalysis::new(buffer, config.clone());
    log::debug!(
        "Analyzing {:.1}s of audio in {} hops",
        buffer.duration(),
        analysis.total_hops()
    );

    loop {
        match analysis.step() {
            AnalysisStep::Progress(fraction) => {
                if progress(fraction).is_break() {
                    log::info!("Onset analysis cancelled at {:.0}%", fraction * 100.0);
                    return Err(AnalysisError::Cancelled);
                }
            }
            AnalysisStep::Finished => break,
        }
    }
    if analysis.total_hops() > 0 {
        let _ = progress(1.0);
    }

    Ok(analysis.finish())
}

/// Adaptive-threshold peak picking over one band's flux series.
///
/// A frame is a peak when it exceeds `mean(previous history) * multiplier + floor`,
/// is strictly above its left neighbour and at least its right neighbour.
pub fn pick_peaks(flux: &[FluxSample], config: &AnalysisConfig) -> Vec<f64> {
    let history = config.history_frames.max(1);
    if flux.len() < history + 2 {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    for i in history..flux.len() - 1 {
        let local_mean =
            flux[i - history..i].iter().map(|s| s.flux).sum::<f32>() / history as f32;
        let threshold = local_mean * config.threshold_multiplier + config.threshold_floor;

        let value = flux[i].flux;
        if value > threshold && value > flux[i - 1].flux && value >= flux[i + 1].flux {
            peaks.push(flux[i].time);
        }
    }
    peaks
}

/// Drop any time closer than `min_interval` to the last accepted one.
pub fn enforce_min_interval(times: &[f64], min_interval: f64) -> Vec<f64> {
    let mut accepted: Vec<f64> = Vec::with_capacity(times.len());
    for &time in times {
        let far_enough = accepted.last().map_or(true, |&last| time - last >= min_interval);
        if far_enough {
            accepted.push(time);
        }
    }
    accepted
}

fn hop_count(len: usize, window: usize, hop: usize) -> usize {
    if len < window || hop == 0 {
        return 0;
    }
    (len - window) / hop + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f32]) -> Vec<FluxSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &flux)| FluxSample { time: i as f64 * 0.1, flux })
            .collect()
    }

    /// Silence with short 60 Hz bursts every `period` seconds.
    fn kick_track(sample_rate: u32, seconds: f32, period: f32) -> SampleBuffer {
        let len = (sample_rate as f32 * seconds) as usize;
        let burst = (sample_rate as f32 * 0.05) as usize;
        let every = (sample_rate as f32 * period) as usize;
        let samples = (0..len)
            .map(|i| {
                let phase = i % every;
                if phase < burst {
                    let t = i as f32 / sample_rate as f32;
                    (2.0 * std::f32::consts::PI * 60.0 * t).sin()
                } else {
                    0.0
                }
            })
            .collect();
        SampleBuffer::new(samples, sample_rate)
    }

    #[test]
    fn hop_counts() {
        assert_eq!(hop_count(1023, 1024, 512), 0);
        assert_eq!(hop_count(1024, 1024, 512), 1);
        assert_eq!(hop_count(1536, 1024, 512), 2);
        assert_eq!(hop_count(2047, 1024, 512), 2);
    }

    #[test]
    fn peak_requires_strict_left_and_allows_flat_right() {
        let config = AnalysisConfig { history_frames: 2, ..Default::default() };
        // index 3 rises strictly then plateaus into index 4: only index 3 fires
        let flux = series(&[0.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
        let peaks = pick_peaks(&flux, &config);
        assert_eq!(peaks.len(), 1);
        assert!((peaks[0] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn peak_must_clear_threshold_floor() {
        let config = AnalysisConfig { history_frames: 2, ..Default::default() };
        let flux = series(&[0.0, 0.0, 0.0, 0.0005, 0.0, 0.0]);
        assert!(pick_peaks(&flux, &config).is_empty());
    }

    #[test]
    fn lead_in_and_last_frame_never_peak() {
        let config = AnalysisConfig::default();
        let mut values = vec![0.0f32; 12];
        values[3] = 5.0;
        values[11] = 5.0;
        assert!(pick_peaks(&series(&values), &config).is_empty());
    }

    #[test]
    fn min_interval_drops_close_candidates() {
        let times = [0.0, 0.05, 0.12, 0.2, 0.25, 0.5];
        assert_eq!(enforce_min_interval(&times, 0.12), vec![0.0, 0.12, 0.25, 0.5]);
    }

    #[test]
    fn empty_buffer_yields_empty_set() {
        let mut calls = 0;
        let onsets = detect_by_band(&SampleBuffer::default(), &AnalysisConfig::default(), |_| {
            calls += 1;
            ControlFlow::Continue(())
        })
        .unwrap();
        assert!(onsets.is_empty());
        assert_eq!(calls, 0);
    }

    #[test]
    fn short_buffer_yields_empty_set() {
        let buffer = SampleBuffer::new(vec![0.3; 1000], 44100);
        let onsets = detect_by_band(&buffer, &AnalysisConfig::default(), |_| ControlFlow::Continue(()))
            .unwrap();
        assert!(onsets.is_empty());
    }

    #[test]
    fn detects_bass_kicks_and_respects_intervals() {
        let buffer = kick_track(22050, 4.0, 0.5);
        let config = AnalysisConfig::default();
        let onsets = detect_by_band(&buffer, &config, |_| ControlFlow::Continue(())).unwrap();

        // the first kick falls inside the lead-in
        assert!(onsets.bass.len() >= 6, "bass onsets: {:?}", onsets.bass);
        for band in Band::ALL {
            let min = config.min_interval.get(band);
            for pair in onsets.get(band).windows(2) {
                assert!(pair[1] - pair[0] >= min);
                assert!(pair[1] > pair[0]);
            }
        }
        for &t in &onsets.bass {
            let offset = t % 0.5;
            assert!(offset < 0.08 || offset > 0.45, "onset at {} not near a kick", t);
        }
    }

    #[test]
    fn progress_is_reported_per_chunk_and_ends_at_one() {
        let buffer = SampleBuffer::new(vec![0.0; 512 * 450 + 512], 44100);
        let config = AnalysisConfig::default();
        let mut reports = Vec::new();
        detect_by_band(&buffer, &config, |f| {
            reports.push(f);
            ControlFlow::Continue(())
        })
        .unwrap();
        // 450 hops in chunks of 200: two intermediate reports then completion
        assert_eq!(reports.len(), 3);
        assert!(reports.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(*reports.last().unwrap(), 1.0);
    }

    #[test]
    fn cancellation_stops_analysis() {
        let buffer = SampleBuffer::new(vec![0.0; 512 * 1000], 44100);
        let result = detect_by_band(&buffer, &AnalysisConfig::default(), |_| ControlFlow::Break(()));
        assert_eq!(result, Err(AnalysisError::Cancelled));
    }

    #[test]
    fn bad_window_size_is_an_error_not_a_panic() {
        let buffer = SampleBuffer::new(vec![0.1; 4096], 44100);
        let config = AnalysisConfig { window_size: 1000, ..Default::default() };
        let result = detect_by_band(&buffer, &config, |_| ControlFlow::Continue(()));
        assert_eq!(result, Err(AnalysisError::Config(ConfigError::WindowSize(1000))));

        let config = AnalysisConfig { hop_size: 0, ..Default::default() };
        let result = detect_by_band(&buffer, &config, |_| ControlFlow::Continue(()));
        assert_eq!(result, Err(AnalysisError::Config(ConfigError::HopSize)));
    }

    #[test]
    fn stepwise_analysis_matches_one_shot() {
        let buffer = kick_track(22050, 2.0, 0.4);
        let config = AnalysisConfig { progress_every: 7, ..Default::default() };
        let mut analysis = OnsetAnalysis::new(&buffer, config.clone());
        let mut steps = 0;
        while let AnalysisStep::Progress(_) = analysis.step() {
            steps += 1;
        }
        assert!(steps > 1);
        assert_eq!(analysis.flux(Band::Bass).len(), analysis.total_hops());
        let stepped = analysis.finish();
        let direct = detect_by_band(&buffer, &config, |_| ControlFlow::Continue(())).unwrap();
        assert_eq!(stepped, direct);
    }

    #[test]
    fn flux_times_strictly_increase() {
        let buffer = kick_track(22050, 1.0, 0.25);
        let mut analysis = OnsetAnalysis::new(&buffer, AnalysisConfig::default());
        while analysis.step() != AnalysisStep::Finished {}
        for band in Band::ALL {
            let flux = analysis.flux(band);
            assert!(flux.windows(2).all(|w| w[1].time > w[0].time));
            assert!(flux.iter().all(|s| s.flux >= 0.0));
        }
    }
}
