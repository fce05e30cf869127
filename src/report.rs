//! Run-summary export.
//!
//! Snapshots a scheduler's metrics and its finished processes into a
//! plain data structure and writes it as JSON, for comparing runs or
//! feeding external tooling. Sampled between `step()` calls like any
//! other observer.

use std::io::Write;

use serde_json::json;

use crate::engine::Scheduler;
use crate::types::Tick;

/// Per-process record in the summary.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub name: String,
    pub pid: u64,
    pub arrival: Tick,
    pub start_time: Option<Tick>,
    pub finish_time: Option<Tick>,
    pub waiting_time: Tick,
    pub turnaround_time: Tick,
}

/// Metrics and finished processes of one run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub policy: String,
    pub timer: Tick,
    pub threads_count: usize,
    pub throughput: f64,
    pub average_waiting_time: Tick,
    pub average_turnaround_time: Tick,
    pub average_cpu_usage: f64,
    pub finished: Vec<ProcessRecord>,
}

impl RunSummary {
    pub fn collect(sched: &Scheduler) -> Self {
        let finished = sched
            .finished()
            .iter()
            .map(|process| ProcessRecord {
                name: process.name.clone(),
                pid: process.pid.0,
                arrival: process.arrival,
                start_time: process.start_time,
                finish_time: process.finish_time,
                waiting_time: process.waiting_time(),
                turnaround_time: process.turnaround_time(),
            })
            .collect();

        RunSummary {
            policy: sched.schedule_policy().name().to_string(),
            timer: sched.timer(),
            threads_count: sched.threads_count(),
            throughput: sched.throughput(),
            average_waiting_time: sched.average_waiting_time(),
            average_turnaround_time: sched.average_turnaround_time(),
            average_cpu_usage: sched.average_cpu_usage(),
            finished,
        }
    }

    /// Write the summary as a single JSON document.
    pub fn write_json(&self, writer: &mut impl Write) -> std::io::Result<()> {
        let processes: Vec<_> = self
            .finished
            .iter()
            .map(|record| {
                json!({
                    "name": record.name,
                    "pid": record.pid,
                    "arrival": record.arrival,
                    "start_time": record.start_time,
                    "finish_time": record.finish_time,
                    "waiting_time": record.waiting_time,
                    "turnaround_time": record.turnaround_time,
                })
            })
            .collect();

        let summary = json!({
            "policy": self.policy,
            "timer": self.timer,
            "threads_count": self.threads_count,
            "throughput": self.throughput,
            "average_waiting_time": self.average_waiting_time,
            "average_turnaround_time": self.average_turnaround_time,
            "average_cpu_usage": self.average_cpu_usage,
            "finished": processes,
        });

        serde_json::to_writer_pretty(&mut *writer, &summary)?;
        writer.write_all(b"\n")
    }
}
