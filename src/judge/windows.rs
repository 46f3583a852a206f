use serde::Serialize;

use crate::chart::ChartError;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum JudgeError {
    #[error("judge windows must satisfy 0 <= perfect <= great <= good, got {perfect}/{great}/{good}")]
    InvalidWindows { perfect: f64, great: f64, good: f64 },
    #[error("{name} must be a non-negative number of seconds, got {value}")]
    InvalidSetting { name: &'static str, value: f64 },
    #[error("chart rejected: {0}")]
    InvalidChart(#[from] ChartError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Perfect,
    Great,
    Good,
    Miss,
}

impl Judgment {
    /// Fixed award before the combo bonus.
    pub fn base_score(self) -> u64 {
        match self {
            Judgment::Perfect => 1000,
            Judgment::Great => 500,
            Judgment::Good => 100,
            Judgment::Miss => 0,
        }
    }

    pub fn is_hit(self) -> bool {
        self != Judgment::Miss
    }
}

impl std::fmt::Display for Judgment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Judgment::Perfect => "PERFECT",
            Judgment::Great => "GREAT",
            Judgment::Good => "GOOD",
            Judgment::Miss => "MISS",
        };
        f.write_str(name)
    }
}

/// Hit tolerances around a note's time, held in whole microseconds so that
/// boundary presses compare exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JudgeWindows {
    perfect: i64,
    great: i64,
    good: i64,
}

impl JudgeWindows {
    pub fn new(perfect: f64, great: f64, good: f64) -> Result<Self, JudgeError> {
        let ordered = perfect >= 0.0 && perfect <= great && great <= good && good.is_finite();
        if !ordered {
            return Err(JudgeError::InvalidWindows { perfect, great, good });
        }
        Ok(Self {
            perfect: to_micros(perfect),
            great: to_micros(great),
            good: to_micros(good),
        })
    }

    /// Widest window in microseconds; notes later than this are missed.
    pub fn good_micros(&self) -> i64 {
        self.good
    }

    /// Smallest window containing `distance_us`, or `None` when the press is out of range.
    pub fn classify(&self, distance_us: i64) -> Option<Judgment> {
        let distance = distance_us.abs();
        if distance <= self.perfect {
            Some(Judgment::Perfect)
        } else if distance <= self.great {
            Some(Judgment::Great)
        } else if distance <= self.good {
            Some(Judgment::Good)
        } else {
            None
        }
    }
}

impl Default for JudgeWindows {
    fn default() -> Self {
        Self {
            perfect: 50_000,
            great: 100_000,
            good: 150_000,
        }
    }
}

/// Seconds to whole microseconds, rounding to nearest.
pub fn to_micros(seconds: f64) -> i64 {
    (seconds * 1_000_000.0).round() as i64
}
