//! The multi-core scheduler engine.
//!
//! A discrete-time state machine: each `step()` advances one tick across
//! `threads_count` virtual cores, in ascending core order. Per core the
//! order is fixed: admit arrivals, age I/O, age the running event, invoke
//! the policy, fallback-dispatch, refresh metrics. The engine is
//! single-threaded by design and *simulates* parallelism; observers read
//! its state between `step()` calls.

use std::collections::VecDeque;
use std::mem;

use tracing::{debug, warn};

use crate::policy::{Inert, NamedSchedulePolicy};
use crate::process::{Event, EventKind, Process};
use crate::types::{CoreId, Pid, Tick};

/// Upper bound on virtual cores. `threads_count` selects how many are in
/// use.
pub const MAX_CORES: usize = 9;

/// The scheduler: owns every live process by value. A process is
/// reachable from exactly one of the running slots, the per-core queues,
/// or `finished`.
pub struct Scheduler {
    running: [Option<Process>; MAX_CORES],
    arrival: [VecDeque<Process>; MAX_CORES],
    ready: [VecDeque<Process>; MAX_CORES],
    waiting: [VecDeque<Process>; MAX_CORES],
    finished: Vec<Process>,

    schedule_policy: NamedSchedulePolicy,
    timer: Tick,
    cpu_usage: [f32; MAX_CORES],

    /// Spawn limits, mutated by the DSL interpreter before the run.
    pub max_processes: u64,
    pub max_events_per_process: u64,
    pub max_single_event_duration: u64,
    pub max_arrival_time: u64,
    threads_count: usize,

    /// Round-robin pointer balancing spawns across cores.
    next_thread: usize,

    throughput: f64,
    previous_finished_count: usize,

    /// Per-core clones of the processes as originally spawned, captured
    /// until the first `step()` and consumed by `restart()`.
    processes_backup: [VecDeque<Process>; MAX_CORES],
    valid_backup: bool,
}

impl Scheduler {
    pub fn new(schedule_policy: NamedSchedulePolicy) -> Self {
        Scheduler {
            running: Default::default(),
            arrival: Default::default(),
            ready: Default::default(),
            waiting: Default::default(),
            finished: Vec::new(),
            schedule_policy,
            timer: 0,
            cpu_usage: [0.0; MAX_CORES],
            max_processes: u64::MAX,
            max_events_per_process: u64::MAX,
            max_single_event_duration: u64::MAX,
            max_arrival_time: u64::MAX,
            threads_count: MAX_CORES,
            next_thread: 0,
            throughput: 0.0,
            previous_finished_count: 0,
            processes_backup: Default::default(),
            valid_backup: false,
        }
    }

    /// Queue a process on the next core in round-robin spawn order. No
    /// validity checks happen here; duplicate pids and empty event lists
    /// are caught (and dropped) at dispatch time.
    pub fn emplace_process(
        &mut self,
        name: impl Into<String>,
        pid: Pid,
        arrival: Tick,
        events: VecDeque<Event>,
    ) -> &Process {
        let core = self.next_thread;
        let process = Process::new(name, pid, arrival, events);
        if !self.valid_backup {
            self.processes_backup[core].push_back(process.clone());
        }
        self.arrival[core].push_back(process);
        self.next_thread = (self.next_thread + 1) % self.threads_count;
        self.arrival[core]
            .back()
            .expect("arrival queue cannot be empty right after a push")
    }

    /// Replace the active policy. Takes effect on the next `step()`.
    pub fn switch_schedule_policy(&mut self, policy: NamedSchedulePolicy) {
        debug!(policy = policy.name(), "switching schedule policy");
        self.schedule_policy = policy;
    }

    pub fn schedule_policy(&self) -> &NamedSchedulePolicy {
        &self.schedule_policy
    }

    /// True once no process is running or queued anywhere.
    pub fn complete(&self) -> bool {
        let any_running = self.running.iter().any(|slot| slot.is_some());
        let any_queued = (0..MAX_CORES).any(|core| {
            !self.arrival[core].is_empty()
                || !self.ready[core].is_empty()
                || !self.waiting[core].is_empty()
        });
        !any_running && !any_queued
    }

    /// Advance the simulation by one tick.
    pub fn step(&mut self) {
        self.valid_backup = true;

        for core in 0..self.threads_count {
            self.admit_arrivals(core);
            self.age_waiting(core);
            self.age_running(core);

            if self.running[core].is_none() {
                self.invoke_policy();
            }
            if self.running[core].is_none() {
                if let Some(process) = self.ready[core].pop_front() {
                    self.running[core] = Some(process);
                }
            }

            if let Some(event) = self.running[core].as_ref().and_then(Process::current_event) {
                self.cpu_usage[core] = event.resource_usage;
            }
            if self.complete() {
                self.cpu_usage = [0.0; MAX_CORES];
            }

            self.throughput = if self.timer != 0 {
                self.finished.len() as f64 / self.timer as f64
            } else {
                0.0
            };
            self.previous_finished_count = self.finished.len();
        }

        self.timer += 1;
    }

    /// Rewind to the originally spawned processes and tick zero.
    ///
    /// # Panics
    /// Panics when called before the first `step()`; there is no snapshot
    /// to restore yet, so doing so is driver misuse.
    pub fn restart(&mut self) {
        assert!(
            self.valid_backup,
            "restart() requires at least one prior step()"
        );

        self.timer = 0;
        self.next_thread = 0;
        self.throughput = 0.0;
        self.previous_finished_count = 0;
        self.finished.clear();
        self.cpu_usage = [0.0; MAX_CORES];

        for core in 0..MAX_CORES {
            self.running[core] = None;
            self.arrival[core].clear();
            self.ready[core].clear();
            self.waiting[core].clear();
            for process in &self.processes_backup[core] {
                self.arrival[core].push_back(process.clone());
            }
        }
    }

    /// Mean of `start_time - arrival` over finished processes that ever
    /// acquired a ready slot, integer-divided by the finished count.
    pub fn average_waiting_time(&self) -> Tick {
        if self.finished.is_empty() {
            return 0;
        }

        let total: Tick = self
            .finished
            .iter()
            .filter(|process| process.start_time.is_some())
            .map(Process::waiting_time)
            .sum();
        total / self.finished.len() as u64
    }

    /// Mean of `finish_time - arrival` over finished processes.
    pub fn average_turnaround_time(&self) -> Tick {
        if self.finished.is_empty() {
            return 0;
        }

        let total: Tick = self
            .finished
            .iter()
            .filter(|process| process.finish_time.is_some())
            .map(Process::turnaround_time)
            .sum();
        total / self.finished.len() as u64
    }

    /// Mean per-core resource usage across the cores in use.
    pub fn average_cpu_usage(&self) -> f64 {
        let total: f64 = self.cpu_usage[..self.threads_count]
            .iter()
            .map(|&usage| usage as f64)
            .sum();
        total / self.threads_count as f64
    }

    pub fn timer(&self) -> Tick {
        self.timer
    }

    /// Finished processes divided by elapsed ticks (0 at tick zero).
    pub fn throughput(&self) -> f64 {
        self.throughput
    }

    pub fn threads_count(&self) -> usize {
        self.threads_count
    }

    /// Select how many cores are in use, clamped into `1..=MAX_CORES`.
    pub fn set_threads_count(&mut self, count: u64) {
        let clamped = count.clamp(1, MAX_CORES as u64);
        if clamped != count {
            warn!(requested = count, used = clamped, "threads_count clamped");
        }
        self.threads_count = clamped as usize;
    }

    pub fn running(&self, core: CoreId) -> Option<&Process> {
        self.running[core.0].as_ref()
    }

    pub fn running_mut(&mut self, core: CoreId) -> &mut Option<Process> {
        &mut self.running[core.0]
    }

    pub fn arrival_queue(&self, core: CoreId) -> &VecDeque<Process> {
        &self.arrival[core.0]
    }

    pub fn ready_queue(&self, core: CoreId) -> &VecDeque<Process> {
        &self.ready[core.0]
    }

    pub fn ready_mut(&mut self, core: CoreId) -> &mut VecDeque<Process> {
        &mut self.ready[core.0]
    }

    pub fn waiting_queue(&self, core: CoreId) -> &VecDeque<Process> {
        &self.waiting[core.0]
    }

    pub fn finished(&self) -> &[Process] {
        &self.finished
    }

    pub fn cpu_usage(&self, core: CoreId) -> f32 {
        self.cpu_usage[core.0]
    }

    /// Swap the policy callback out of its slot so it can borrow the
    /// whole scheduler, then put it back.
    fn invoke_policy(&mut self) {
        let mut callback = mem::replace(&mut self.schedule_policy.callback, Box::new(Inert));
        callback.apply(self);
        self.schedule_policy.callback = callback;
    }

    /// Move processes whose arrival tick is now out of the arrival queue:
    /// valid ones dispatch by their first event, invalid ones (duplicate
    /// pid in this core's live set, or no events at all) are dropped with
    /// a warning. Insertion order is preserved among simultaneous
    /// arrivals.
    fn admit_arrivals(&mut self, core: usize) {
        let queue = mem::take(&mut self.arrival[core]);
        for process in queue {
            if process.arrival != self.timer {
                self.arrival[core].push_back(process);
                continue;
            }

            if !self.pid_is_unique(core, process.pid) {
                warn!(
                    name = process.name.as_str(),
                    pid = process.pid.0,
                    "pid is already in use, dropping process"
                );
                continue;
            }
            if process.events.is_empty() {
                warn!(
                    name = process.name.as_str(),
                    pid = process.pid.0,
                    "process has no events, dropping it"
                );
                continue;
            }

            self.dispatch_by_first_event(core, process);
        }
    }

    /// Tick down the front I/O event of every waiting process. Completed
    /// events re-dispatch the process by its new front event (a follow-up
    /// I/O event rejoins the tail of the waiting queue and is not aged
    /// again this tick); a drained event queue finishes the process.
    fn age_waiting(&mut self, core: usize) {
        let queue = mem::take(&mut self.waiting[core]);
        let mut to_dispatch = Vec::new();

        for mut process in queue {
            let event = process
                .events
                .front_mut()
                .expect("waiting processes always hold a pending I/O event");
            assert!(event.kind == EventKind::Io && event.duration > 0);

            event.duration -= 1;
            if event.duration > 0 {
                self.waiting[core].push_back(process);
                continue;
            }

            process.events.pop_front();
            if process.events.is_empty() {
                process.finish_time.get_or_insert(self.timer);
                self.finished.push(process);
            } else {
                to_dispatch.push(process);
            }
        }

        for process in to_dispatch {
            self.dispatch_by_first_event(core, process);
        }
    }

    /// Tick down the running CPU event; on completion, re-dispatch or
    /// finish the process and free the core.
    fn age_running(&mut self, core: usize) {
        let Some(mut process) = self.running[core].take() else {
            return;
        };

        let event = process
            .events
            .front_mut()
            .expect("running processes always hold a pending CPU event");
        assert!(event.kind == EventKind::Cpu && event.duration > 0);

        event.duration -= 1;
        if event.duration > 0 {
            self.running[core] = Some(process);
            return;
        }

        process.events.pop_front();
        if process.events.is_empty() {
            process.finish_time.get_or_insert(self.timer);
            self.finished.push(process);
        } else {
            self.dispatch_by_first_event(core, process);
        }
    }

    /// Route a process into ready or waiting depending on its front
    /// event. First entry into ready with a CPU event stamps
    /// `start_time`, exactly once.
    fn dispatch_by_first_event(&mut self, core: usize, mut process: Process) {
        let kind = process
            .current_event()
            .map(|event| event.kind)
            .expect("dispatch requires a non-empty event queue");
        match kind {
            EventKind::Cpu => {
                process.start_time.get_or_insert(self.timer);
                self.ready[core].push_back(process);
            }
            EventKind::Io => {
                self.waiting[core].push_back(process);
            }
        }
    }

    fn pid_is_unique(&self, core: usize, pid: Pid) -> bool {
        let running_clash = self.running[core]
            .as_ref()
            .is_some_and(|process| process.pid == pid);
        let queued_clash = self.ready[core]
            .iter()
            .chain(self.waiting[core].iter())
            .any(|process| process.pid == pid);
        !running_clash && !queued_clash
    }
}
