/// Extra compensation applied on top of reported hardware latency, in seconds.
pub const MANUAL_OFFSET: f64 = 0.05;

/// A playback collaborator's view of where the audio is.
pub trait PlaybackClock {
    /// Raw elapsed playback position in seconds. Must never decrease.
    fn position(&self) -> f64;

    /// Input-path hardware latency in seconds.
    fn input_latency(&self) -> f64 {
        0.0
    }

    /// Output-path hardware latency in seconds.
    fn output_latency(&self) -> f64 {
        0.0
    }
}

/// Maps a raw clock reading to chart time:
/// `chart_time = raw - (input_latency + output_latency) - manual_offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencyCompensation {
    pub input_latency: f64,
    pub output_latency: f64,
    pub manual_offset: f64,
}

impl LatencyCompensation {
    pub fn new(input_latency: f64, output_latency: f64) -> Self {
        Self {
            input_latency,
            output_latency,
            manual_offset: MANUAL_OFFSET,
        }
    }

    pub fn from_clock(clock: &impl PlaybackClock) -> Self {
        Self::new(clock.input_latency(), clock.output_latency())
    }

    pub fn with_manual_offset(mut self, manual_offset: f64) -> Self {
        self.manual_offset = manual_offset;
        self
    }

    /// Hardware latency estimate plus the manual offset.
    pub fn total(&self) -> f64 {
        self.input_latency + self.output_latency + self.manual_offset
    }

    pub fn chart_time(&self, raw: f64) -> f64 {
        raw - self.total()
    }

    /// Sample `clock` now and convert. Call this at the moment an input arrives.
    pub fn now(&self, clock: &impl PlaybackClock) -> f64 {
        self.chart_time(clock.position())
    }
}

impl Default for LatencyCompensation {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}
