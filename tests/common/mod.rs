#![allow(dead_code)]

use std::collections::VecDeque;

use schedsim::{Event, EventKind, NamedSchedulePolicy, Pid, Scheduler};

/// Initialize tracing from `RUST_LOG`.
///
/// `try_init()` is idempotent: the first call in the process succeeds,
/// subsequent calls are silently ignored.
pub fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn cpu(duration: u64) -> Event {
    Event::new(EventKind::Cpu, duration, 0.5)
}

pub fn io(duration: u64) -> Event {
    Event::new(EventKind::Io, duration, 0.1)
}

/// A single-core FCFS scheduler.
pub fn fcfs_scheduler() -> Scheduler {
    let mut sched = Scheduler::new(NamedSchedulePolicy::first_come_first_served());
    sched.set_threads_count(1);
    sched
}

/// A single-core Round-Robin scheduler with the given quantum.
pub fn rr_scheduler(quantum: u64) -> Scheduler {
    let mut sched = Scheduler::new(NamedSchedulePolicy::round_robin(quantum));
    sched.set_threads_count(1);
    sched
}

pub fn spawn(sched: &mut Scheduler, name: &str, pid: u64, arrival: u64, events: Vec<Event>) {
    sched.emplace_process(name, Pid(pid), arrival, VecDeque::from(events));
}

/// Step until `complete()`, panicking if the simulation does not settle
/// within `bound` ticks.
pub fn run_to_completion(sched: &mut Scheduler, bound: u64) {
    while !sched.complete() {
        assert!(
            sched.timer() < bound,
            "simulation still incomplete after {bound} ticks"
        );
        sched.step();
    }
}
