//! Offline session host: replays timed lane input against a chart with a
//! fixed-step update loop, the way a game frame loop would drive the engine.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use beatlane::chart::Chart;
use beatlane::config::JudgeConfig;
use beatlane::judge::{
    GameEvent, InputEvent, JudgmentEngine, LatencyCompensation, PlaybackClock, ResultSummary,
};

/// Seconds of playback after the last note before the track reports completion.
const TRACK_TAIL: f64 = 1.0;

/// One scripted input, in chart time.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedInput {
    pub time: f64,
    pub event: InputEvent,
}

/// Stand-in for the audio device: position is whatever the host loop says it is.
#[derive(Debug, Default)]
struct SimulatedClock {
    position: f64,
}

impl PlaybackClock for SimulatedClock {
    fn position(&self) -> f64 {
        self.position
    }
}

pub struct SessionOptions<'a> {
    pub judge: &'a JudgeConfig,
    pub lane_count: usize,
    pub lane_subset: &'a [usize],
    pub tick_rate: u32,
    pub verbose: bool,
}

/// Parse `time lane[,lane...] [up]` lines. Blank lines and `#` comments are skipped.
pub fn parse_script(text: &str) -> Result<Vec<TimedInput>> {
    let mut inputs = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(time), Some(lanes)) = (parts.next(), parts.next()) else {
            bail!("line {}: expected `time lane[,lane...]`", line_no + 1);
        };
        let time: f64 = time
            .parse()
            .with_context(|| format!("line {}: invalid time '{}'", line_no + 1, time))?;
        let lanes = lanes
            .split(',')
            .map(|l| l.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("line {}: invalid lane list '{}'", line_no + 1, lanes))?;

        let event = match parts.next() {
            None | Some("down") => InputEvent::Press { lanes },
            Some("up") => InputEvent::Release { lanes },
            Some(other) => bail!("line {}: unknown action '{}'", line_no + 1, other),
        };
        inputs.push(TimedInput { time, event });
    }
    inputs.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(inputs)
}

/// One press per note, offset by up to `jitter_ms` either way.
pub fn autoplay_inputs(chart: &Chart, jitter_ms: f64, seed: Option<u64>) -> Vec<TimedInput> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let jitter = jitter_ms.abs() / 1000.0;
    let mut inputs: Vec<TimedInput> = chart
        .notes
        .iter()
        .map(|note| {
            let error = if jitter > 0.0 { rng.gen_range(-jitter..=jitter) } else { 0.0 };
            TimedInput {
                time: note.time + error,
                event: InputEvent::Press { lanes: vec![note.lane] },
            }
        })
        .collect();
    inputs.sort_by(|a, b| a.time.total_cmp(&b.time));
    inputs
}

/// Run one session to completion and return its result.
pub fn run_session(chart: Chart, inputs: &[TimedInput], options: &SessionOptions) -> Result<ResultSummary> {
    if chart.is_empty() {
        bail!("Chart has no notes; nothing to play");
    }
    let track_end = chart.end_time() + TRACK_TAIL;

    let mut engine = JudgmentEngine::new(chart, options.judge, options.lane_count)?;
    if !options.lane_subset.is_empty() {
        engine.set_lane_filter(Some(options.lane_subset));
    }
    let events = engine.events();

    let mut clock = SimulatedClock::default();
    let latency = LatencyCompensation::from_clock(&clock).with_manual_offset(options.judge.manual_offset);
    let step = 1.0 / options.tick_rate.max(1) as f64;

    let mut pending = inputs.iter().peekable();
    let mut finished_reported = false;
    let mut summary = None;
    let mut frame: u64 = 0;

    while engine.is_playing() {
        frame += 1;
        let frame_time = frame as f64 * step;

        // inputs are judged at the clock reading of their own timestamp, not the frame's
        while let Some(input) = pending.next_if(|i| i.time + latency.total() <= frame_time) {
            clock.position = input.time + latency.total();
            engine.handle_input(&input.event, latency.now(&clock));
        }

        clock.position = frame_time;
        if !finished_reported && frame_time >= track_end + latency.total() {
            engine.playback_finished(latency.now(&clock));
            finished_reported = true;
        }
        engine.tick(latency.now(&clock));

        for event in events.try_iter() {
            match event {
                GameEvent::JudgmentRaised { note, lane, judgment, offset } if options.verbose => {
                    println!(
                        "{:>8.3}s  note {:>4}  lane {}  {:<7} {:+.1}ms",
                        clock.position, note, lane, judgment, offset * 1000.0
                    );
                }
                GameEvent::SessionEnded(result) => summary = Some(result),
                _ => {}
            }
        }
    }

    summary.context("Session stopped without a result")
}
