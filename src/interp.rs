//! Tree-walking interpreter for the simulation DSL.
//!
//! Walks the parsed statements in order and applies their effects to a
//! scheduler: configuration constants, policy switches, and process
//! spawns. Lex and parse failures abort the whole program; a statement
//! that fails during evaluation is reported and skipped, so the worst
//! cumulative outcome is an under-populated scheduler.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tracing::error;

use crate::ast::{Ast, ExpressionId, ExpressionKind, StatementKind};
use crate::engine::Scheduler;
use crate::lexer::{line_col, LexError, Lexer};
use crate::parser::{ParseError, Parser};
use crate::policy::{named_scheduler_from_policy, try_policy_from_str};
use crate::process::{event_kind_try_from_str, Event, EventKind};
use crate::token::Token;
use crate::types::Pid;

/// Names a program can assign to with `name = value`.
const CONSTANT_NAMES: &str =
    "max_processes, max_events_per_process, max_single_event_duration, max_arrival_time, \
     threads_count, schedule_policy";

/// Default PRNG seed used when no seed is specified.
pub const DEFAULT_SEED: u64 = 42;

/// A whole-program failure: the source never reached evaluation.
#[derive(Debug)]
pub enum ScriptError {
    Lex(LexError),
    Parse {
        line: usize,
        column: usize,
        error: ParseError,
    },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Lex(error) => write!(f, "lex error at {error}"),
            ScriptError::Parse {
                line,
                column,
                error,
            } => write!(f, "parse error at {line}:{column}: {error}"),
        }
    }
}

impl std::error::Error for ScriptError {}

/// A value produced by expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    String(String),
    Number(u64),
    List(Vec<Value>),
}

impl Value {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<u64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }
}

/// Deterministic PRNG for the spawn builtins. One instance per
/// interpreter, seeded explicitly, so scripted runs are reproducible.
struct Rng {
    inner: SmallRng,
}

impl Rng {
    fn new(seed: u64) -> Self {
        Rng {
            inner: SmallRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw from `[min, max)`. Degenerate bounds yield `min`.
    fn range(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        min + self.inner.next_u64() % (max - min)
    }

    /// Uniform draw from `[0, 1)`.
    fn unit_f32(&mut self) -> f32 {
        (self.inner.next_u32() >> 8) as f32 / (1 << 24) as f32
    }
}

pub struct Interpreter<'src, 'sched> {
    ast: Ast<'src>,
    sched: &'sched mut Scheduler,
    rng: Rng,
    /// Pids handed out by `spawn_random_process` so far; uniqueness is
    /// per interpreter instance, which keeps runs and tests isolated.
    spawned_pids: HashSet<u64>,
}

impl<'src, 'sched> Interpreter<'src, 'sched> {
    /// Run a program against a scheduler with the default seed.
    ///
    /// Returns the number of statements that failed to evaluate (each is
    /// already reported); `Err` means the program never started because
    /// it did not lex or parse.
    pub fn eval(source: &str, sched: &mut Scheduler) -> Result<usize, ScriptError> {
        Self::eval_seeded(source, sched, DEFAULT_SEED)
    }

    /// Like [`Interpreter::eval`] with an explicit PRNG seed for the
    /// random-spawn builtins.
    pub fn eval_seeded(
        source: &str,
        sched: &mut Scheduler,
        seed: u64,
    ) -> Result<usize, ScriptError> {
        let tokens = Lexer::lex(source).map_err(ScriptError::Lex)?;
        let ast = Parser::parse(tokens).map_err(|error| {
            let (line, column) = line_col(source, error.span.start);
            ScriptError::Parse {
                line,
                column,
                error,
            }
        })?;

        let mut interpreter = Interpreter {
            ast,
            sched,
            rng: Rng::new(seed),
            spawned_pids: HashSet::new(),
        };
        Ok(interpreter.run())
    }

    fn run(&mut self) -> usize {
        let statements: Vec<ExpressionId> = self
            .ast
            .statements
            .iter()
            .map(|statement| {
                let StatementKind::Expression(id) = statement.kind;
                id
            })
            .collect();

        let mut failed = 0;
        for id in statements {
            if self.evaluate_expression(id).is_none() {
                failed += 1;
            }
        }
        failed
    }

    /// Evaluate one expression. `None` means the failure has been
    /// reported and the result is to be treated as `Nil`.
    fn evaluate_expression(&mut self, id: ExpressionId) -> Option<Value> {
        // Clone the node so recursion does not hold a borrow of the arena.
        let kind = self.ast.expression(id).kind.clone();
        match kind {
            ExpressionKind::Call { name, arguments } => self.call(name, &arguments),
            ExpressionKind::StringLiteral { literal } => {
                Some(Value::String(literal.lexeme.to_string()))
            }
            ExpressionKind::Number { token } => Some(Value::Number(parse_number(token.lexeme)?)),
            ExpressionKind::List { elements } | ExpressionKind::Tuple { elements } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate_expression(element)?);
                }
                Some(Value::List(values))
            }
            ExpressionKind::Variable { name } => Some(Value::String(name.lexeme.to_string())),
            ExpressionKind::Constant { name, value } => self.constant(name, value),
            ExpressionKind::Range { start, end } => {
                let start = parse_number(start.lexeme)?;
                let end = parse_number(end.lexeme)?;
                Some(Value::List(vec![Value::Number(start), Value::Number(end)]))
            }
            ExpressionKind::For {
                binding: _,
                range,
                body,
            } => self.for_loop(range, &body),
        }
    }

    /// Apply a configuration constant to the scheduler.
    fn constant(&mut self, name: Token<'src>, value: ExpressionId) -> Option<Value> {
        let value_kind = self.ast.expression(value).kind.clone();

        match name.lexeme {
            "schedule_policy" => {
                let ExpressionKind::Variable { name: policy_name } = value_kind else {
                    error!("`schedule_policy` expects a policy name, e.g. `FCFS` or `RoundRobin`");
                    return None;
                };
                let policy = try_policy_from_str(policy_name.lexeme)?;
                self.sched
                    .switch_schedule_policy(named_scheduler_from_policy(policy));
            }
            "max_processes" => self.sched.max_processes = self.constant_number(name, value_kind)?,
            "max_events_per_process" => {
                self.sched.max_events_per_process = self.constant_number(name, value_kind)?;
            }
            "max_single_event_duration" => {
                self.sched.max_single_event_duration = self.constant_number(name, value_kind)?;
            }
            "max_arrival_time" => {
                self.sched.max_arrival_time = self.constant_number(name, value_kind)?;
            }
            "threads_count" => {
                let count = self.constant_number(name, value_kind)?;
                self.sched.set_threads_count(count);
            }
            unknown => {
                error!("invalid constant for the current simulation: {unknown}");
                error!("available constants are: {CONSTANT_NAMES}");
                return None;
            }
        }

        Some(Value::Nil)
    }

    fn constant_number(&self, name: Token<'src>, kind: ExpressionKind<'src>) -> Option<u64> {
        let ExpressionKind::Number { token } = kind else {
            error!("constant `{}` expects a number", name.lexeme);
            return None;
        };
        parse_number(token.lexeme)
    }

    /// Evaluate the loop range, then the body once per iteration. The
    /// binding is not observable from the body; loops only repeat
    /// side-effectful statements.
    fn for_loop(&mut self, range: ExpressionId, body: &[ExpressionId]) -> Option<Value> {
        let range_value = self.evaluate_expression(range)?;
        let bounds = range_value.as_list().and_then(|values| match values {
            [Value::Number(start), Value::Number(end)] => Some((*start, *end)),
            _ => None,
        });
        let Some((start, end)) = bounds else {
            error!("`for` expects a range, e.g. `for i in 0..10`");
            return None;
        };

        for _ in start..end {
            for &expression in body {
                // A failing body statement is reported but does not stop
                // the remaining iterations.
                let _ = self.evaluate_expression(expression);
            }
        }

        Some(Value::Nil)
    }

    fn call(&mut self, name: Token<'src>, arguments: &[ExpressionId]) -> Option<Value> {
        match name.lexeme {
            "spawn_process" => self.spawn_process(arguments),
            "spawn_random_process" => self.spawn_random_process(arguments),
            unknown => {
                error!("call to `{unknown}` is not implemented");
                None
            }
        }
    }

    fn spawn_process(&mut self, arguments: &[ExpressionId]) -> Option<Value> {
        const NAME: &str = "spawn_process";
        const ARGC: usize = 4;
        if arguments.len() != ARGC {
            error!(
                "failed to interpret call to builtin `{NAME}`: expected {ARGC} arguments, \
                 {} were provided",
                arguments.len()
            );
            return None;
        }

        let name_value = self.evaluate_expression(arguments[0])?;
        let Some(process_name) = name_value.as_string() else {
            error!("mismatched type for argument #0 of builtin `{NAME}`: expected type `string`");
            return None;
        };
        let process_name = process_name.to_string();

        let pid_value = self.evaluate_expression(arguments[1])?;
        let Some(pid) = pid_value.as_number() else {
            error!("mismatched type for argument #1 of builtin `{NAME}`: expected type `int`");
            return None;
        };

        let arrival_value = self.evaluate_expression(arguments[2])?;
        let Some(arrival) = arrival_value.as_number() else {
            error!("mismatched type for argument #2 of builtin `{NAME}`: expected type `int`");
            return None;
        };

        let list_value = self.evaluate_expression(arguments[3])?;
        let Some(list) = list_value.as_list() else {
            error!(
                "mismatched type for argument #3 of builtin `{NAME}`: expected type \
                 `List<Tuple: Event>` (e.g. [(Cpu, 3), (Io, 2)])"
            );
            return None;
        };

        let events = list_as_events(list, &mut self.rng)?;
        self.sched
            .emplace_process(process_name, Pid(pid), arrival, events);

        Some(Value::Nil)
    }

    fn spawn_random_process(&mut self, arguments: &[ExpressionId]) -> Option<Value> {
        const NAME: &str = "spawn_random_process";
        if !arguments.is_empty() {
            error!(
                "failed to interpret call to builtin `{NAME}`: expected 0 arguments, \
                 {} were provided",
                arguments.len()
            );
            return None;
        }

        if self.spawned_pids.len() as u64 >= self.sched.max_processes {
            error!(
                "cannot spawn another random process: all {} pids are taken",
                self.sched.max_processes
            );
            return None;
        }
        let pid = loop {
            let candidate = self.rng.range(0, self.sched.max_processes);
            if !self.spawned_pids.contains(&candidate) {
                break candidate;
            }
        };
        self.spawned_pids.insert(pid);

        let arrival = self.rng.range(0, self.sched.max_arrival_time);

        let events_count = self.rng.range(1, self.sched.max_events_per_process);
        let mut events = VecDeque::new();
        for _ in 0..events_count {
            events.push_back(self.random_event());
        }

        self.sched
            .emplace_process("Process", Pid(pid), arrival, events);

        Some(Value::Nil)
    }

    fn random_event(&mut self) -> Event {
        let kind = if self.rng.range(0, 2) == 0 {
            EventKind::Cpu
        } else {
            EventKind::Io
        };
        let duration = self.rng.range(1, self.sched.max_single_event_duration);
        Event::new(kind, duration, self.rng.unit_f32())
    }
}

/// Convert an evaluated event list into a process's event queue. Each
/// element must be a `(kind, duration)` tuple; `resource_usage` is drawn
/// from the interpreter's PRNG.
fn list_as_events(list: &[Value], rng: &mut Rng) -> Option<VecDeque<Event>> {
    let mut events = VecDeque::with_capacity(list.len());
    for value in list {
        let Some([kind, duration]) = value.as_list().and_then(|tuple| <&[Value; 2]>::try_from(tuple).ok())
        else {
            error!("malformed event: expected a tuple (e.g. [(Cpu, 3), (Io, 2)])");
            return None;
        };
        let Some(kind) = kind.as_string() else {
            error!("malformed event: the kind must be `Cpu` or `Io`");
            return None;
        };
        let kind = event_kind_try_from_str(kind)?;
        let Some(duration) = duration.as_number() else {
            error!("malformed event: the duration must be an integer");
            return None;
        };

        events.push_back(Event::new(kind, duration, rng.unit_f32()));
    }

    Some(events)
}

fn parse_number(lexeme: &str) -> Option<u64> {
    match lexeme.parse() {
        Ok(number) => Some(number),
        Err(_) => {
            error!("failed to parse number from string: {lexeme}");
            None
        }
    }
}
