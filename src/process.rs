//! Process and event model.
//!
//! A simulated process is a named queue of events. Each event is an atomic
//! unit of work, either CPU or I/O, with an integer duration in ticks. The
//! front event of the queue is the *current* one; the engine decrements it
//! in place and pops it when it completes.

use std::collections::VecDeque;
use std::fmt;

use tracing::error;

use crate::types::{Pid, Tick};

/// The two kinds of work a process can demand. Every dispatcher matches
/// exhaustively on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The process needs a core.
    Cpu,
    /// The process blocks; the duration elapses without occupying a core.
    Io,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Cpu => f.write_str("Cpu"),
            EventKind::Io => f.write_str("Io"),
        }
    }
}

/// Parse an event kind from its canonical spelling (`"Cpu"` or `"Io"`,
/// case-sensitive). Unknown spellings are reported and yield `None`.
pub fn event_kind_try_from_str(s: &str) -> Option<EventKind> {
    match s {
        "Cpu" => Some(EventKind::Cpu),
        "Io" => Some(EventKind::Io),
        _ => {
            error!("unknown event kind: {s}");
            None
        }
    }
}

/// Smallest resource usage an event can report. Construction clamps up to
/// this so an idle-looking running core is distinguishable from a truly
/// idle one.
const MIN_RESOURCE_USAGE: f32 = 0.01;

/// An atomic unit of work.
///
/// `duration` is strictly positive until the tick the event completes;
/// `resource_usage` is in `(0, 1]` and feeds the per-core usage gauge
/// while the event runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub duration: Tick,
    pub resource_usage: f32,
}

impl Event {
    /// Construction clamps `duration` to at least one tick and
    /// `resource_usage` to at least [`MIN_RESOURCE_USAGE`]; both bounds
    /// are part of the event's contract and the aging passes rely on
    /// them.
    pub fn new(kind: EventKind, duration: Tick, resource_usage: f32) -> Self {
        Event {
            kind,
            duration: duration.max(1),
            resource_usage: resource_usage.max(MIN_RESOURCE_USAGE),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event {{ kind = {}, duration = {}, usage = {}% }}",
            self.kind,
            self.duration,
            (self.resource_usage * 100.0) as u64
        )
    }
}

/// A simulated process: identity, arrival tick, and its FIFO of events.
///
/// `start_time` is set exactly once, when the process first enters a ready
/// queue with a CPU event at the front; `finish_time` is set exactly once,
/// when its last event completes. Cloning a process copies its event queue
/// by value, which is what the engine's snapshot relies on.
#[derive(Debug, Clone)]
pub struct Process {
    pub name: String,
    pub pid: Pid,
    pub arrival: Tick,
    pub events: VecDeque<Event>,
    pub start_time: Option<Tick>,
    pub finish_time: Option<Tick>,
}

impl Process {
    pub fn new(name: impl Into<String>, pid: Pid, arrival: Tick, events: VecDeque<Event>) -> Self {
        Process {
            name: name.into(),
            pid,
            arrival,
            events,
            start_time: None,
            finish_time: None,
        }
    }

    /// The event currently being consumed, if any.
    pub fn current_event(&self) -> Option<&Event> {
        self.events.front()
    }

    /// Ticks spent between arrival and first acquisition of a ready slot.
    /// Zero until `start_time` is known.
    pub fn waiting_time(&self) -> Tick {
        self.start_time.map_or(0, |start| start - self.arrival)
    }

    /// Ticks between arrival and completion. Zero until the process
    /// finishes.
    pub fn turnaround_time(&self) -> Tick {
        self.finish_time.map_or(0, |finish| finish - self.arrival)
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Process {{ name: {}, pid: {}, arrival: {}, events: [",
            self.name, self.pid, self.arrival
        )?;
        for (idx, event) in self.events.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{event}")?;
        }
        write!(
            f,
            "], waiting time: {}, turnaround time: {} }}",
            self.waiting_time(),
            self.turnaround_time()
        )
    }
}
