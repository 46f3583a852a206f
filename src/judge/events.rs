use serde::Serialize;

use super::windows::Judgment;

/// Notifications emitted by a [`super::JudgmentEngine`] for UI and effects.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    ScoreChanged {
        score: u64,
    },
    ComboChanged {
        combo: u32,
        max_combo: u32,
    },
    JudgmentRaised {
        note: usize,
        lane: usize,
        judgment: Judgment,
        /// Note time minus judged time, seconds; positive means early
        offset: f64,
    },
    SessionEnded(ResultSummary),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct JudgmentCounts {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
}

impl JudgmentCounts {
    pub fn record(&mut self, judgment: Judgment) {
        match judgment {
            Judgment::Perfect => self.perfect += 1,
            Judgment::Great => self.great += 1,
            Judgment::Good => self.good += 1,
            Judgment::Miss => self.miss += 1,
        }
    }

    pub fn get(&self, judgment: Judgment) -> u32 {
        match judgment {
            Judgment::Perfect => self.perfect,
            Judgment::Great => self.great,
            Judgment::Good => self.good,
            Judgment::Miss => self.miss,
        }
    }

    pub fn judged(&self) -> u32 {
        self.perfect + self.great + self.good + self.miss
    }
}

/// End-of-session result.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResultSummary {
    pub score: u64,
    pub max_combo: u32,
    pub counts: JudgmentCounts,
    pub total_notes: usize,
}

impl ResultSummary {
    /// `(perfect + 0.8 * great + 0.5 * good) / total_notes`, 0 for an empty chart.
    pub fn accuracy(&self) -> f64 {
        if self.total_notes == 0 {
            return 0.0;
        }
        let c = &self.counts;
        (c.perfect as f64 + 0.8 * c.great as f64 + 0.5 * c.good as f64) / self.total_notes as f64
    }

    /// Every note was hit.
    pub fn full_combo(&self) -> bool {
        self.total_notes > 0
            && self.counts.miss == 0
            && (self.counts.judged() as usize) == self.total_notes
    }
}
