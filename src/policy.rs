//! Scheduling policies.
//!
//! A policy is a capability object with a single `apply` method. The
//! engine invokes it once per idle core per `step()`, after the aging
//! passes and before its own fallback dispatch. A policy may promote a
//! process from a ready queue into an empty running slot and may rewrite
//! that process's front CPU event (Round-Robin uses this to carve out
//! quantum-sized slices).

use std::fmt;

use tracing::error;

use crate::engine::Scheduler;
use crate::process::{Event, EventKind};
use crate::types::{CoreId, Tick};

/// A scheduling decision procedure. Implementations must only fill
/// *empty* running slots; clobbering an occupied slot would leak the
/// process that was running there.
pub trait Policy {
    fn apply(&mut self, sched: &mut Scheduler);
}

/// Tags for the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    FirstComeFirstServed,
    RoundRobin,
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulePolicy::FirstComeFirstServed => f.write_str("First Come First Served"),
            SchedulePolicy::RoundRobin => f.write_str("Round Robin"),
        }
    }
}

/// Resolve a policy tag from its DSL spelling or common aliases.
/// Unknown spellings are reported and yield `None` (no change applied).
pub fn try_policy_from_str(s: &str) -> Option<SchedulePolicy> {
    match s {
        "FCFS" | "FIFO" | "FirstComeFirstServed" | "FirstInFirstOut" => {
            Some(SchedulePolicy::FirstComeFirstServed)
        }
        "RR" | "RoundRobin" => Some(SchedulePolicy::RoundRobin),
        _ => {
            error!("failed to deduce schedule policy from: {s}");
            None
        }
    }
}

/// Promote the head of each idle core's ready queue, first come first
/// served. Never touches event durations.
pub struct FirstComeFirstServed;

impl Policy for FirstComeFirstServed {
    fn apply(&mut self, sched: &mut Scheduler) {
        for core in (0..sched.threads_count()).map(CoreId) {
            if sched.running(core).is_some() {
                continue;
            }
            if let Some(process) = sched.ready_mut(core).pop_front() {
                *sched.running_mut(core) = Some(process);
            }
        }
    }
}

/// Default Round-Robin quantum, in ticks.
pub const DEFAULT_QUANTUM: Tick = 5;

/// Round-Robin: FCFS promotion plus quantum slicing.
///
/// When the promoted process's front CPU event is longer than the quantum,
/// the event is split: the remainder stays queued behind a synthetic
/// front event of exactly `quantum` ticks. The engine pops the synthetic
/// event when it expires and re-dispatches the process, which lands it at
/// the tail of the ready queue for its next turn.
pub struct RoundRobin {
    pub quantum: Tick,
}

impl RoundRobin {
    pub fn with_quantum(quantum: Tick) -> Self {
        RoundRobin { quantum }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        RoundRobin {
            quantum: DEFAULT_QUANTUM,
        }
    }
}

impl Policy for RoundRobin {
    fn apply(&mut self, sched: &mut Scheduler) {
        for core in (0..sched.threads_count()).map(CoreId) {
            if sched.running(core).is_some() {
                continue;
            }
            let mut process = match sched.ready_mut(core).pop_front() {
                Some(process) => process,
                None => continue,
            };

            let front = process
                .events
                .front_mut()
                .expect("ready queue only holds processes with a pending CPU event");
            assert!(front.kind == EventKind::Cpu);
            if front.duration > self.quantum {
                front.duration -= self.quantum;
                let slice = Event::new(EventKind::Cpu, self.quantum, front.resource_usage);
                process.events.push_front(slice);
            }

            *sched.running_mut(core) = Some(process);
        }
    }
}

/// Placeholder the engine swaps into the active slot for the duration of
/// a policy invocation, so the real policy can borrow the scheduler.
pub(crate) struct Inert;

impl Policy for Inert {
    fn apply(&mut self, _sched: &mut Scheduler) {}
}

/// A policy paired with its human-readable name and tag.
pub struct NamedSchedulePolicy {
    name: String,
    kind: SchedulePolicy,
    pub(crate) callback: Box<dyn Policy>,
}

impl NamedSchedulePolicy {
    pub fn new(name: impl Into<String>, kind: SchedulePolicy, callback: Box<dyn Policy>) -> Self {
        NamedSchedulePolicy {
            name: name.into(),
            kind,
            callback,
        }
    }

    /// First-Come-First-Served with its canonical name.
    pub fn first_come_first_served() -> Self {
        let kind = SchedulePolicy::FirstComeFirstServed;
        Self::new(kind.to_string(), kind, Box::new(FirstComeFirstServed))
    }

    /// Round-Robin with the given quantum and its canonical name.
    pub fn round_robin(quantum: Tick) -> Self {
        let kind = SchedulePolicy::RoundRobin;
        Self::new(
            kind.to_string(),
            kind,
            Box::new(RoundRobin::with_quantum(quantum)),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SchedulePolicy {
        self.kind
    }
}

impl fmt::Debug for NamedSchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedSchedulePolicy")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Construct the default flavor of a policy from its tag.
pub fn named_scheduler_from_policy(policy: SchedulePolicy) -> NamedSchedulePolicy {
    match policy {
        SchedulePolicy::FirstComeFirstServed => NamedSchedulePolicy::first_come_first_served(),
        SchedulePolicy::RoundRobin => NamedSchedulePolicy::round_robin(DEFAULT_QUANTUM),
    }
}
