//! schedsim - Interactive simulator of an operating-system process
//! scheduler.
//!
//! Models a configurable multi-core machine on which declared processes
//! arrive over simulated time, consume CPU and I/O events, and are
//! dispatched by a pluggable scheduling policy. Simulations are described
//! in a small DSL that is lexed, parsed, and interpreted to seed the
//! scheduler's initial state and parameters.
//!
//! # Architecture
//!
//! - **Engine**: discrete-time stepper over per-core arrival/ready/
//!   waiting/running queues, with live metrics and snapshot restart
//! - **Policies**: First-Come-First-Served and Round-Robin (quantum),
//!   behind a named-policy wrapper
//! - **Language**: lexer → parser (arena AST) → tree-walking interpreter
//!   whose builtins and constants mutate the scheduler
//!
//! # Usage
//!
//! ```rust,no_run
//! use schedsim::{Interpreter, NamedSchedulePolicy, Scheduler};
//!
//! let mut sched = Scheduler::new(NamedSchedulePolicy::first_come_first_served());
//! Interpreter::eval(
//!     r#"
//!     schedule_policy = RoundRobin
//!     spawn_process("worker", 1, 0, [(Cpu, 3), (Io, 2), (Cpu, 1)])
//!     "#,
//!     &mut sched,
//! )
//! .expect("script should evaluate");
//!
//! while !sched.complete() {
//!     sched.step();
//! }
//! println!("turnaround: {}", sched.average_turnaround_time());
//! ```

pub mod ast;
pub mod engine;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod policy;
pub mod process;
pub mod report;
pub mod token;
pub mod types;

// Re-export the main public types for convenience.
pub use ast::{Ast, Expression, ExpressionId, ExpressionKind, Statement, StatementKind};
pub use engine::{Scheduler, MAX_CORES};
pub use interp::{Interpreter, ScriptError, Value, DEFAULT_SEED};
pub use lexer::{LexError, LexErrorKind, Lexer};
pub use parser::{ParseError, ParseErrorKind, Parser};
pub use policy::{
    named_scheduler_from_policy, try_policy_from_str, FirstComeFirstServed, NamedSchedulePolicy,
    Policy, RoundRobin, SchedulePolicy, DEFAULT_QUANTUM,
};
pub use process::{event_kind_try_from_str, Event, EventKind, Process};
pub use report::{ProcessRecord, RunSummary};
pub use token::{Span, Token, TokenKind};
pub use types::{CoreId, Pid, Tick};
