//! Real-time judgment of lane presses against a chart.

pub mod clock;
pub mod engine;
pub mod events;
pub mod windows;

pub use clock::{LatencyCompensation, PlaybackClock};
pub use engine::{ActiveNote, InputEvent, JudgmentEngine, NoteState, SessionState};
pub use events::{GameEvent, JudgmentCounts, ResultSummary};
pub use windows::{JudgeError, JudgeWindows, Judgment};
