use serde::{Deserialize, Serialize};

/// A single note: when it should be hit and on which lane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Seconds from the start of playback
    pub time: f64,
    pub lane: usize,
}

impl Note {
    pub fn new(time: f64, lane: usize) -> Self {
        Self { time, lane }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ChartError {
    #[error("note {index} at {time:.3}s uses lane {lane}, but only {lane_count} lanes exist")]
    LaneOutOfRange {
        index: usize,
        time: f64,
        lane: usize,
        lane_count: usize,
    },
    #[error("note {index} at {time:.3}s is earlier than the note before it")]
    OutOfOrder { index: usize, time: f64 },
}

/// Notes ordered by time, as produced by [`crate::chart::ChartGenerator`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub notes: Vec<Note>,
}

impl Chart {
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Time of the last note, or 0 for an empty chart.
    pub fn end_time(&self) -> f64 {
        self.notes.last().map_or(0.0, |n| n.time)
    }

    /// Check lane range and time ordering, e.g. for charts loaded from disk.
    pub fn validate(&self, lane_count: usize) -> Result<(), ChartError> {
        for (index, note) in self.notes.iter().enumerate() {
            if note.lane >= lane_count {
                return Err(ChartError::LaneOutOfRange {
                    index,
                    time: note.time,
                    lane: note.lane,
                    lane_count,
                });
            }
            if index > 0 && note.time < self.notes[index - 1].time {
                return Err(ChartError::OutOfOrder { index, time: note.time });
            }
        }
        Ok(())
    }

    pub fn notes_in_lane(&self, lane: usize) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(move |n| n.lane == lane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let chart = Chart::new(vec![Note::new(1.5, 2)]);
        let json = serde_json::to_string(&chart).unwrap();
        assert_eq!(json, r#"{"notes":[{"time":1.5,"lane":2}]}"#);
        let back: Chart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chart);
    }

    #[test]
    fn validate_catches_bad_lane_and_order() {
        let chart = Chart::new(vec![Note::new(0.0, 0), Note::new(1.0, 4)]);
        assert!(matches!(
            chart.validate(4),
            Err(ChartError::LaneOutOfRange { index: 1, lane: 4, .. })
        ));

        let chart = Chart::new(vec![Note::new(1.0, 0), Note::new(0.5, 1)]);
        assert_eq!(
            chart.validate(4),
            Err(ChartError::OutOfOrder { index: 1, time: 0.5 })
        );

        assert!(Chart::default().validate(4).is_ok());
    }

    #[test]
    fn end_time() {
        assert_eq!(Chart::default().end_time(), 0.0);
        let chart = Chart::new(vec![Note::new(0.2, 0), Note::new(3.0, 1)]);
        assert_eq!(chart.end_time(), 3.0);
        assert_eq!(chart.notes_in_lane(1).count(), 1);
    }
}
