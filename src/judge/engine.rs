//! Clock-driven judgment state machine for one play session.
//!
//! The host calls [`JudgmentEngine::tick`] once per update with the current
//! latency-corrected chart time, and [`JudgmentEngine::press`] for every input
//! with the time sampled when that input happened. Each note resolves exactly
//! once, `Pending -> Hit` or `Pending -> Missed`.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::events::{GameEvent, JudgmentCounts, ResultSummary};
use super::windows::{to_micros, JudgeError, JudgeWindows, Judgment};
use crate::chart::{Chart, Note};
use crate::config::JudgeConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteState {
    Pending,
    Hit(Judgment),
    Missed,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub counts: JudgmentCounts,
    pub playing: bool,
}

/// A discrete lane event from the input collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Press { lanes: Vec<usize> },
    Release { lanes: Vec<usize> },
}

/// A note visible to renderers after the latest tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveNote {
    pub index: usize,
    pub note: Note,
    /// Seconds until the note should be hit; negative once it has passed
    pub time_until: f64,
}

pub struct JudgmentEngine {
    chart: Chart,
    note_times: Vec<i64>,
    states: Vec<NoteState>,
    windows: JudgeWindows,
    appear: i64,
    end_grace: i64,
    lane_count: usize,
    lane_enabled: Vec<bool>,
    held: Vec<bool>,
    // first note index that may still be pending
    cursor: usize,
    active: Vec<usize>,
    last_tick: i64,
    ends_at: Option<i64>,
    session: SessionState,
    events: Sender<GameEvent>,
    receiver: Receiver<GameEvent>,
}

impl JudgmentEngine {
    /// Takes ownership of `chart` for the session. An empty chart is accepted;
    /// refusing to play one is up to the caller.
    pub fn new(chart: Chart, config: &JudgeConfig, lane_count: usize) -> Result<Self, JudgeError> {
        let windows = JudgeWindows::new(config.perfect, config.great, config.good)?;
        check_seconds("note_appear_time", config.note_appear_time)?;
        check_seconds("end_grace", config.end_grace)?;
        chart.validate(lane_count)?;

        let note_times = chart.notes.iter().map(|n| to_micros(n.time)).collect();
        let (events, receiver) = unbounded();

        let mut engine = Self {
            states: vec![NoteState::Pending; chart.len()],
            chart,
            note_times,
            windows,
            appear: to_micros(config.note_appear_time),
            end_grace: to_micros(config.end_grace),
            lane_count,
            lane_enabled: vec![true; lane_count],
            held: vec![false; lane_count],
            cursor: 0,
            active: Vec::new(),
            last_tick: i64::MIN,
            ends_at: None,
            session: SessionState::default(),
            events,
            receiver,
        };
        engine.restart();
        Ok(engine)
    }

    /// Reset every note to pending and start a fresh session.
    pub fn restart(&mut self) {
        self.states.iter_mut().for_each(|s| *s = NoteState::Pending);
        self.held.iter_mut().for_each(|h| *h = false);
        self.cursor = 0;
        self.active.clear();
        self.last_tick = i64::MIN;
        self.ends_at = None;
        self.session = SessionState {
            playing: true,
            ..SessionState::default()
        };
        log::debug!("Session started with {} notes", self.chart.len());
    }

    /// Event stream for this session. Clones share one queue.
    pub fn events(&self) -> Receiver<GameEvent> {
        self.receiver.clone()
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn state(&self) -> &SessionState {
        &self.session
    }

    pub fn is_playing(&self) -> bool {
        self.session.playing
    }

    pub fn note_state(&self, index: usize) -> Option<NoteState> {
        self.states.get(index).copied()
    }

    pub fn is_lane_held(&self, lane: usize) -> bool {
        self.held.get(lane).copied().unwrap_or(false)
    }

    /// Restrict judgment to `lanes` (reduced-input modes); `None` enables every lane.
    pub fn set_lane_filter(&mut self, lanes: Option<&[usize]>) {
        match lanes {
            None => self.lane_enabled.iter_mut().for_each(|e| *e = true),
            Some(lanes) => {
                for (lane, enabled) in self.lane_enabled.iter_mut().enumerate() {
                    *enabled = lanes.contains(&lane);
                }
            }
        }
    }

    /// Advance to `now`: expire notes past the good window and rebuild the active set.
    pub fn tick(&mut self, now: f64) {
        if !self.session.playing {
            return;
        }
        let now = to_micros(now);
        self.last_tick = now;
        self.active.clear();

        while self.cursor < self.states.len() && self.states[self.cursor] != NoteState::Pending {
            self.cursor += 1;
        }

        for index in self.cursor..self.states.len() {
            if self.states[index] != NoteState::Pending {
                continue;
            }
            let diff = self.note_times[index] - now;
            if diff >= self.appear {
                break;
            }
            if diff < -self.windows.good_micros() {
                self.resolve(index, Judgment::Miss, diff);
                continue;
            }
            self.active.push(index);
        }

        if self.ends_at.is_some_and(|end| now >= end) {
            self.finish();
        }
    }

    /// Notes visible as of the last tick, earliest first.
    pub fn active_notes(&self) -> impl Iterator<Item = ActiveNote> + '_ {
        self.active
            .iter()
            .filter(move |&&index| self.states[index] == NoteState::Pending)
            .map(move |&index| ActiveNote {
                index,
                note: self.chart.notes[index],
                time_until: (self.note_times[index] - self.last_tick) as f64 / 1_000_000.0,
            })
    }

    /// Judge a press on `lanes` at chart time `at`.
    ///
    /// Picks the pending note nearest in time among the eligible lanes (earlier
    /// chart index on ties). Returns `None` without side effects on the chart
    /// when no note is close enough.
    pub fn press(&mut self, lanes: &[usize], at: f64) -> Option<Judgment> {
        if !self.session.playing {
            return None;
        }
        for &lane in lanes {
            if let Some(held) = self.held.get_mut(lane) {
                *held = true;
            }
        }

        let now = to_micros(at);
        let mut nearest: Option<(usize, i64)> = None;
        for index in self.cursor..self.states.len() {
            if self.states[index] != NoteState::Pending {
                continue;
            }
            let diff = self.note_times[index] - now;
            if diff >= self.appear {
                break;
            }
            let lane = self.chart.notes[index].lane;
            if !self.lane_enabled[lane] || !lanes.contains(&lane) {
                continue;
            }
            if nearest.map_or(true, |(_, best)| diff.abs() < best.abs()) {
                nearest = Some((index, diff));
            }
        }

        let (index, diff) = nearest?;
        let judgment = self.windows.classify(diff)?;
        self.resolve(index, judgment, diff);
        Some(judgment)
    }

    pub fn release(&mut self, lanes: &[usize]) {
        for &lane in lanes {
            if let Some(held) = self.held.get_mut(lane) {
                *held = false;
            }
        }
    }

    pub fn handle_input(&mut self, event: &InputEvent, at: f64) -> Option<Judgment> {
        match event {
            InputEvent::Press { lanes } => self.press(lanes, at),
            InputEvent::Release { lanes } => {
                self.release(lanes);
                None
            }
        }
    }

    /// Playback reported completion at `now`; the session ends once ticks pass `now + end_grace`.
    pub fn playback_finished(&mut self, now: f64) {
        let end = to_micros(now) + self.end_grace;
        self.ends_at = Some(self.ends_at.map_or(end, |current| current.min(end)));
        log::debug!("Playback finished, session ends at {:.3}s", end as f64 / 1_000_000.0);
    }

    /// Halt immediately. No further ticks or presses are processed and no result is emitted.
    pub fn stop(&mut self) {
        if self.session.playing {
            self.session.playing = false;
            self.active.clear();
            log::debug!("Session stopped");
        }
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            score: self.session.score,
            max_combo: self.session.max_combo,
            counts: self.session.counts,
            total_notes: self.chart.len(),
        }
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    fn finish(&mut self) {
        self.session.playing = false;
        self.active.clear();
        let summary = self.summary();
        log::info!(
            "Session ended: score={}, max_combo={}, accuracy={:.1}%",
            summary.score,
            summary.max_combo,
            summary.accuracy() * 100.0
        );
        self.emit(GameEvent::SessionEnded(summary));
    }

    fn resolve(&mut self, index: usize, judgment: Judgment, diff: i64) {
        debug_assert_eq!(self.states[index], NoteState::Pending);
        let session = &mut self.session;

        if judgment.is_hit() {
            self.states[index] = NoteState::Hit(judgment);
            session.combo += 1;
            session.max_combo = session.max_combo.max(session.combo);
            session.score += judgment.base_score() + session.combo as u64 * 10;
        } else {
            self.states[index] = NoteState::Missed;
            session.combo = 0;
        }
        session.counts.record(judgment);

        let (score, combo, max_combo) = (session.score, session.combo, session.max_combo);
        self.emit(GameEvent::JudgmentRaised {
            note: index,
            lane: self.chart.notes[index].lane,
            judgment,
            offset: diff as f64 / 1_000_000.0,
        });
        self.emit(GameEvent::ComboChanged { combo, max_combo });
        if judgment.is_hit() {
            self.emit(GameEvent::ScoreChanged { score });
        }
    }

    fn emit(&self, event: GameEvent) {
        // the engine holds a receiver, so the channel never disconnects
        let _ = self.events.send(event);
    }
}

fn check_seconds(name: &'static str, value: f64) -> Result<(), JudgeError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(JudgeError::InvalidSetting { name, value })
    }
}
