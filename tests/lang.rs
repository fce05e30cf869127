//! End-to-end behavior of the simulation DSL.

use schedsim::{
    CoreId, EventKind, Interpreter, NamedSchedulePolicy, Pid, SchedulePolicy, Scheduler,
    ScriptError,
};

mod common;
use common::run_to_completion;

fn fresh_scheduler() -> Scheduler {
    Scheduler::new(NamedSchedulePolicy::first_come_first_served())
}

fn eval_clean(source: &str, sched: &mut Scheduler) {
    let failed = Interpreter::eval(source, sched).expect("script should lex and parse");
    assert_eq!(failed, 0, "no statement should fail");
}

#[test]
fn constants_configure_the_scheduler() {
    common::setup();
    let mut sched = fresh_scheduler();
    eval_clean(
        r"
        max_processes = 100
        max_events_per_process = 10
        max_single_event_duration = 20
        max_arrival_time = 50
        threads_count = 4
        ",
        &mut sched,
    );

    assert_eq!(sched.max_processes, 100);
    assert_eq!(sched.max_events_per_process, 10);
    assert_eq!(sched.max_single_event_duration, 20);
    assert_eq!(sched.max_arrival_time, 50);
    assert_eq!(sched.threads_count(), 4);
}

#[test]
fn schedule_policy_switch_applies() {
    common::setup();
    let mut sched = fresh_scheduler();
    assert_eq!(
        sched.schedule_policy().kind(),
        SchedulePolicy::FirstComeFirstServed
    );

    eval_clean("schedule_policy = RoundRobin", &mut sched);
    assert_eq!(sched.schedule_policy().kind(), SchedulePolicy::RoundRobin);
    assert_eq!(sched.schedule_policy().name(), "Round Robin");

    // Aliases resolve too, via either assignment surface.
    eval_clean("schedule_policy :: FIFO", &mut sched);
    assert_eq!(
        sched.schedule_policy().kind(),
        SchedulePolicy::FirstComeFirstServed
    );
}

#[test]
fn unknown_policy_reports_and_changes_nothing() {
    common::setup();
    let mut sched = fresh_scheduler();
    let failed = Interpreter::eval("schedule_policy = Lottery", &mut sched).unwrap();
    assert_eq!(failed, 1);
    assert_eq!(
        sched.schedule_policy().kind(),
        SchedulePolicy::FirstComeFirstServed
    );
}

#[test]
fn spawn_process_queues_the_declared_process() {
    common::setup();
    let mut sched = fresh_scheduler();
    sched.set_threads_count(1);
    eval_clean(
        r#"spawn_process("worker", 7, 3, [(Cpu, 2), (Io, 4), ("Cpu", 1)])"#,
        &mut sched,
    );

    let queue = sched.arrival_queue(CoreId(0));
    assert_eq!(queue.len(), 1);
    let process = &queue[0];
    assert_eq!(process.name, "worker");
    assert_eq!(process.pid, Pid(7));
    assert_eq!(process.arrival, 3);

    let shape: Vec<(EventKind, u64)> = process
        .events
        .iter()
        .map(|e| (e.kind, e.duration))
        .collect();
    assert_eq!(
        shape,
        vec![
            (EventKind::Cpu, 2),
            (EventKind::Io, 4),
            (EventKind::Cpu, 1),
        ]
    );
    assert!(process
        .events
        .iter()
        .all(|e| e.resource_usage >= 0.01 && e.resource_usage <= 1.0));
}

#[test]
fn type_and_arity_errors_spawn_nothing() {
    common::setup();
    for source in [
        r#"spawn_process("A", "not-a-pid", 0, [(Cpu, 1)])"#,
        r#"spawn_process("A", 1, 0, [(Cpu, 1)], 9)"#,
        r#"spawn_process("A", 1, 0, [(Whirr, 1)])"#,
        r#"spawn_process("A", 1, 0, [(Cpu, "long")])"#,
        r#"spawn_process("A", 1, 0, 42)"#,
        r#"spawn_process(1, 1, 0, [(Cpu, 1)])"#,
    ] {
        let mut sched = fresh_scheduler();
        sched.set_threads_count(1);
        let failed = Interpreter::eval(source, &mut sched).unwrap();
        assert_eq!(failed, 1, "{source} should fail");
        assert!(
            sched.arrival_queue(CoreId(0)).is_empty(),
            "{source} must not spawn"
        );
    }
}

#[test]
fn event_kinds_are_case_sensitive() {
    common::setup();
    let mut sched = fresh_scheduler();
    sched.set_threads_count(1);
    let failed = Interpreter::eval(r#"spawn_process("A", 1, 0, [(cpu, 1)])"#, &mut sched).unwrap();
    assert_eq!(failed, 1);
    assert!(sched.arrival_queue(CoreId(0)).is_empty());
}

#[test]
fn a_failed_statement_does_not_stop_the_rest() {
    common::setup();
    let mut sched = fresh_scheduler();
    sched.set_threads_count(1);
    let failed = Interpreter::eval(
        r#"
        unknown_builtin()
        spawn_process("survivor", 1, 0, [(Cpu, 1)])
        "#,
        &mut sched,
    )
    .unwrap();

    assert_eq!(failed, 1);
    assert_eq!(sched.arrival_queue(CoreId(0)).len(), 1);
    assert_eq!(sched.arrival_queue(CoreId(0))[0].name, "survivor");
}

#[test]
fn unknown_constant_is_reported() {
    common::setup();
    let mut sched = fresh_scheduler();
    let failed = Interpreter::eval("max_quantum = 3", &mut sched).unwrap();
    assert_eq!(failed, 1);
}

#[test]
fn for_loop_repeats_its_body() {
    common::setup();
    let mut sched = fresh_scheduler();
    sched.set_threads_count(2);
    eval_clean(
        r"
        max_processes = 1000
        max_events_per_process = 4
        max_single_event_duration = 6
        max_arrival_time = 10
        for i in 0..6 {
            spawn_random_process()
        }
        ",
        &mut sched,
    );

    assert_eq!(sched.arrival_queue(CoreId(0)).len(), 3);
    assert_eq!(sched.arrival_queue(CoreId(1)).len(), 3);
}

#[test]
fn empty_range_loops_zero_times() {
    common::setup();
    let mut sched = fresh_scheduler();
    sched.set_threads_count(1);
    eval_clean("for i in 2..2 { spawn_random_process() }", &mut sched);
    assert!(sched.arrival_queue(CoreId(0)).is_empty());
}

#[test]
fn random_spawns_respect_limits_and_pid_uniqueness() {
    common::setup();
    let mut sched = fresh_scheduler();
    sched.set_threads_count(1);
    eval_clean(
        r"
        max_processes = 64
        max_events_per_process = 5
        max_single_event_duration = 8
        max_arrival_time = 12
        for i in 0..20 {
            spawn_random_process()
        }
        ",
        &mut sched,
    );

    let queue = sched.arrival_queue(CoreId(0));
    assert_eq!(queue.len(), 20);

    let mut pids = std::collections::HashSet::new();
    for process in queue {
        assert!(pids.insert(process.pid), "pids must be unique");
        assert!(process.pid.0 < 64);
        assert!(process.arrival < 12);
        assert!(!process.events.is_empty());
        assert!(process.events.len() < 5);
        for event in &process.events {
            assert!(event.duration >= 1 && event.duration < 8);
        }
    }
}

#[test]
fn same_seed_spawns_the_same_workload() {
    common::setup();
    let source = r"
        max_processes = 32
        max_events_per_process = 4
        max_single_event_duration = 9
        max_arrival_time = 7
        for i in 0..10 { spawn_random_process() }
    ";

    let mut first = fresh_scheduler();
    first.set_threads_count(1);
    Interpreter::eval_seeded(source, &mut first, 1234).unwrap();

    let mut second = fresh_scheduler();
    second.set_threads_count(1);
    Interpreter::eval_seeded(source, &mut second, 1234).unwrap();

    let shape = |sched: &Scheduler| -> Vec<(Pid, u64, Vec<u64>)> {
        sched
            .arrival_queue(CoreId(0))
            .iter()
            .map(|p| {
                (
                    p.pid,
                    p.arrival,
                    p.events.iter().map(|e| e.duration).collect(),
                )
            })
            .collect()
    };
    assert_eq!(shape(&first), shape(&second));
}

#[test]
fn lex_errors_abort_the_program() {
    common::setup();
    let mut sched = fresh_scheduler();
    let err = Interpreter::eval("spawn_random_process() ?", &mut sched).unwrap_err();
    assert!(matches!(err, ScriptError::Lex(_)));
    // Nothing ran: the failure happened before evaluation.
    assert!(sched.arrival_queue(CoreId(0)).is_empty());
}

#[test]
fn parse_errors_abort_with_a_location() {
    common::setup();
    let mut sched = fresh_scheduler();
    let err = Interpreter::eval("spawn_process(\n  \"A\",", &mut sched).unwrap_err();
    let ScriptError::Parse { line, .. } = err else {
        panic!("expected a parse error, got {err}");
    };
    assert_eq!(line, 2);
}

/// The doc scenario end to end: a script drives the scheduler through a
/// policy switch and a full run.
#[test]
fn scripted_run_to_completion() {
    common::setup();
    let mut sched = fresh_scheduler();
    eval_clean(
        r#"
        threads_count = 1
        schedule_policy = RR
        spawn_process("A", 1, 0, [(Cpu, 5)])
        spawn_process("B", 2, 0, [(Cpu, 3)])
        "#,
        &mut sched,
    );

    run_to_completion(&mut sched, 100);

    assert_eq!(sched.schedule_policy().kind(), SchedulePolicy::RoundRobin);
    let order: Vec<Pid> = sched.finished().iter().map(|p| p.pid).collect();
    // Default quantum 5: A runs to completion in one slice, then B.
    assert_eq!(order, vec![Pid(1), Pid(2)]);
    assert_eq!(sched.average_turnaround_time(), (5 + 8) / 2);
}
