// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/eval.rs

// Explicit-control evaluator. A register machine that evaluates any
// expression one state transition at a time, keeping saved registers
// on a control stack and pending states on a resume stack instead of
// recursing on the host stack.

// <>

use std::env;
use std::mem;
use std::rc::Rc;

use super::context::Interpreter;
use super::core::{Closure, Pair, Value};
use super::env::Env;
use super::error::{EvalError, StackKind};
use super::symtab::{Symbol, SymbolTable};

/// Machine states; the resumable ones are also stored on the resume stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Examine the current expression
    Dispatch,

    /// Branch pair, environment
    IfDecide,

    /// Operator evaluated, no operands
    ApplyNoArgs,

    /// Whole form, environment
    CollectArgs,

    /// Remaining operands to evaluate
    CollectArgsStep,

    /// Accumulator, remaining operands, environment
    CollectArgsNext,

    /// Accumulator, then the evaluated operator
    LastArg,

    /// Operator in the value register, arguments in the accumulator
    Apply,

    /// Resume whatever state is on top of the resume stack
    Return,

    /// Sentinel at the bottom of the resume stack
    Done,
}

/// Saved register contents on the control stack
enum Saved {
    Expr(Value),
    Env(Env),
    Args(Vec<Value>),
    Proc(Value),
}

/// Capacity bounds for the two explicit stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub control: usize,
    pub resume: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            control: 1_000_000,
            resume: 1_000_000,
        }
    }
}

impl Limits {
    /// Reads `LLL_CONTROL_LIMIT` and `LLL_RESUME_LIMIT`, keeping the
    /// defaults for anything missing or unparseable
    pub fn from_env() -> Self {
        let mut limits = Self::default();

        for (var, slot) in [
            ("LLL_CONTROL_LIMIT", &mut limits.control),
            ("LLL_RESUME_LIMIT", &mut limits.resume),
        ] {
            if let Ok(text) = env::var(var) {
                match text.trim().parse::<usize>() {
                    Ok(n) => *slot = n,
                    Err(_) => log::warn!("ignoring {}={:?}: not a stack size", var, text),
                }
            }
        }

        limits
    }
}

/// Counters describing one completed evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// State transitions executed
    pub steps: u64,
    /// Deepest the control stack got
    pub peak_control: usize,
    /// Deepest the resume stack got, sentinel included
    pub peak_resume: usize,
}

/// Special form symbols, recognized by identity
#[derive(Debug, Clone)]
pub struct Specials {
    pub quote: Symbol,
    pub branch: Symbol,
    pub lambda: Symbol,
}

impl Specials {
    pub fn new(tbl: &mut SymbolTable) -> Self {
        Self {
            quote: tbl.intern("quote"),
            branch: tbl.intern("if"),
            lambda: tbl.intern("fn"),
        }
    }
}

/// Registers and stacks for one in-progress evaluation
///
/// Each evaluation owns its stacks outright; nothing here is shared
/// with any other evaluation.
pub struct EvalStack {
    op: Opcode,
    exp: Value,
    env: Env,
    val: Value,
    args: Vec<Value>,

    control: Vec<Saved>,
    resume: Vec<Opcode>,

    specials: Specials,
    limits: Limits,
    stats: EvalStats,
}

impl EvalStack {
    pub fn new(specials: Specials, limits: Limits) -> Self {
        Self {
            op: Opcode::Done,
            exp: Value::Nil,
            env: Env::new(),
            val: Value::Nil,
            args: vec![],
            control: vec![],
            resume: vec![],
            specials,
            limits,
            stats: EvalStats::default(),
        }
    }

    /// Loads an expression and environment, ready to iterate
    ///
    /// Fails if the stack is already in use.
    pub fn start(&mut self, expr: Value, env: Env) -> Result<(), EvalError> {
        if self.is_running() {
            return Err(EvalError::Internal(
                "evaluation stack already in use".to_string(),
            ));
        }

        self.exp = expr;
        self.env = env;
        self.val = Value::Nil;
        self.args.clear();
        self.stats = EvalStats::default();

        self.push_resume(Opcode::Done)?;
        self.op = Opcode::Dispatch;
        Ok(())
    }

    /// Whether an expression is loaded and not yet finished
    pub fn is_running(&self) -> bool {
        self.op != Opcode::Done || !self.resume.is_empty()
    }

    pub fn control_depth(&self) -> usize {
        self.control.len()
    }

    pub fn resume_depth(&self) -> usize {
        self.resume.len()
    }

    pub fn stats(&self) -> EvalStats {
        self.stats
    }

    /// Runs until the loaded expression is finished, returning its value
    pub fn run(&mut self, lisp: &mut Interpreter) -> Result<Value, EvalError> {
        while self.iter_once(lisp)? {}
        Ok(mem::take(&mut self.val))
    }

    /// Executes exactly one state transition
    ///
    /// Returns false once the machine has reached `Done`. On error the
    /// stacks are unwound so the machine can be started again.
    pub fn iter_once(&mut self, lisp: &mut Interpreter) -> Result<bool, EvalError> {
        if !self.is_running() {
            return Ok(false);
        }

        if cfg!(feature = "stkdbg") {
            log::trace!(
                "ENTER: {:?}; control: {}; resume: {}",
                self.op,
                self.control.len(),
                self.resume.len()
            );
        }

        match self.step(lisp) {
            Ok(next) => {
                self.stats.steps += 1;
                self.op = next;
                Ok(next != Opcode::Done || !self.resume.is_empty())
            }
            Err(err) => {
                self.unwind();
                Err(err)
            }
        }
    }

    fn step(&mut self, lisp: &mut Interpreter) -> Result<Opcode, EvalError> {
        match self.op {
            Opcode::Dispatch => self.dispatch(lisp),
            Opcode::IfDecide => {
                let branches = self.pop_expr()?;
                self.env = self.pop_env()?;

                let (then, other) = match branches.as_pair() {
                    Some(Pair {
                        head,
                        tail: Value::Pair(rest),
                    }) => (head, &rest.head),
                    _ => return Err(internal("malformed branch pair on control stack")),
                };

                self.exp = if self.val.truthy() {
                    then.clone()
                } else {
                    other.clone()
                };
                Ok(Opcode::Dispatch)
            }
            Opcode::ApplyNoArgs => {
                self.args = vec![];
                Ok(Opcode::Apply)
            }
            Opcode::CollectArgs => {
                let form = self.pop_expr()?;
                self.env = self.pop_env()?;

                let proc = mem::take(&mut self.val);
                self.save(Saved::Proc(proc))?;

                self.exp = match form.as_pair() {
                    Some(pair) => pair.tail.clone(),
                    None => return Err(internal("saved application form is not a pair")),
                };
                self.args = vec![];
                Ok(Opcode::CollectArgsStep)
            }
            Opcode::CollectArgsStep => {
                let (first, last) = match self.exp.as_pair() {
                    Some(pair) => (pair.head.clone(), pair.tail.is_nil()),
                    None => return Err(internal("operand list ran out early")),
                };

                let args = mem::take(&mut self.args);
                if last {
                    self.save(Saved::Args(args))?;
                    self.push_resume(Opcode::LastArg)?;
                } else {
                    self.save(Saved::Env(self.env.clone()))?;
                    self.save(Saved::Expr(self.exp.clone()))?;
                    self.save(Saved::Args(args))?;
                    self.push_resume(Opcode::CollectArgsNext)?;
                }

                self.exp = first;
                Ok(Opcode::Dispatch)
            }
            Opcode::CollectArgsNext => {
                self.args = self.pop_args()?;
                let remaining = self.pop_expr()?;
                self.env = self.pop_env()?;

                self.args.push(mem::take(&mut self.val));
                self.exp = match remaining.as_pair() {
                    Some(pair) => pair.tail.clone(),
                    None => return Err(internal("saved operand list is not a pair")),
                };
                Ok(Opcode::CollectArgsStep)
            }
            Opcode::LastArg => {
                self.args = self.pop_args()?;
                self.args.push(mem::take(&mut self.val));
                self.val = self.pop_proc()?;
                Ok(Opcode::Apply)
            }
            Opcode::Apply => self.apply(lisp),
            Opcode::Return => {
                let next = self
                    .resume
                    .pop()
                    .ok_or_else(|| internal("resume stack underflow"))?;
                if next == Opcode::Done && !self.control.is_empty() {
                    return Err(internal("control stack not empty at completion"));
                }
                Ok(next)
            }
            Opcode::Done => Ok(Opcode::Done),
        }
    }

    fn dispatch(&mut self, lisp: &Interpreter) -> Result<Opcode, EvalError> {
        let form = match &self.exp {
            Value::Nil => {
                self.val = Value::Nil;
                return Ok(Opcode::Return);
            }
            Value::Symbol(sym) => {
                self.val = match self.env.lookup(sym) {
                    Some(val) => val,
                    None => lisp
                        .global(sym)
                        .ok_or_else(|| EvalError::Unbound(sym.name().to_string()))?,
                };
                return Ok(Opcode::Return);
            }
            Value::Pair(pair) => Rc::clone(pair),
            other => {
                self.val = other.clone();
                return Ok(Opcode::Return);
            }
        };

        if let Value::Symbol(head) = &form.head {
            if *head == self.specials.quote {
                let [quoted] = operands::<1>(&form, "quote")?;
                self.val = quoted;
                return Ok(Opcode::Return);
            }

            if *head == self.specials.branch {
                let [test, _, _] = operands::<3>(&form, "if")?;
                let branches = match form.tail.as_pair() {
                    Some(pair) => pair.tail.clone(),
                    None => return Err(internal("checked if form lost its operands")),
                };

                self.save(Saved::Env(self.env.clone()))?;
                self.save(Saved::Expr(branches))?;
                self.push_resume(Opcode::IfDecide)?;

                self.exp = test;
                return Ok(Opcode::Dispatch);
            }

            if *head == self.specials.lambda {
                let [params, body] = operands::<2>(&form, "fn")?;
                self.val = Value::Closure(Rc::new(Closure {
                    params: param_list(&params)?,
                    body,
                    env: self.env.clone(),
                }));
                return Ok(Opcode::Return);
            }
        }

        if form.tail.is_nil() {
            self.push_resume(Opcode::ApplyNoArgs)?;
        } else {
            if form.tail.list_len().is_none() {
                return Err(EvalError::Syntax(format!(
                    "improper operand list in {}",
                    Value::Pair(Rc::clone(&form))
                )));
            }

            self.save(Saved::Env(self.env.clone()))?;
            self.save(Saved::Expr(Value::Pair(Rc::clone(&form))))?;
            self.push_resume(Opcode::CollectArgs)?;
        }

        self.exp = form.head.clone();
        Ok(Opcode::Dispatch)
    }

    fn apply(&mut self, lisp: &mut Interpreter) -> Result<Opcode, EvalError> {
        let args = mem::take(&mut self.args);

        match mem::take(&mut self.val) {
            Value::Primitive(prim) => {
                prim.check_arity(args.len())?;
                self.val = (prim.func)(lisp, &args)?;
                Ok(Opcode::Return)
            }
            Value::Closure(clos) => {
                if clos.params.len() != args.len() {
                    return Err(EvalError::Arity(format!(
                        "closure {} expects {} argument(s), got {}",
                        Value::Closure(Rc::clone(&clos)),
                        clos.params.len(),
                        args.len()
                    )));
                }

                self.env = clos.env.extend(Rc::clone(&clos.params), args)?;
                self.exp = clos.body.clone();

                // straight back to dispatch; no resume entry for the body
                Ok(Opcode::Dispatch)
            }
            other => Err(EvalError::Type(format!(
                "cannot apply {} {}",
                other.type_name(),
                other
            ))),
        }
    }

    /// Destroys all saved state after an error
    fn unwind(&mut self) {
        self.control.clear();
        self.resume.clear();
        self.args.clear();
        self.exp = Value::Nil;
        self.val = Value::Nil;
        self.env = Env::new();
        self.op = Opcode::Done;
    }

    fn save(&mut self, item: Saved) -> Result<(), EvalError> {
        if self.control.len() >= self.limits.control {
            return Err(EvalError::StackExhausted {
                stack: StackKind::Control,
                limit: self.limits.control,
            });
        }
        self.control.push(item);
        self.stats.peak_control = self.stats.peak_control.max(self.control.len());
        Ok(())
    }

    fn push_resume(&mut self, op: Opcode) -> Result<(), EvalError> {
        if self.resume.len() >= self.limits.resume {
            return Err(EvalError::StackExhausted {
                stack: StackKind::Resume,
                limit: self.limits.resume,
            });
        }
        self.resume.push(op);
        self.stats.peak_resume = self.stats.peak_resume.max(self.resume.len());
        Ok(())
    }

    fn pop_expr(&mut self) -> Result<Value, EvalError> {
        match self.control.pop() {
            Some(Saved::Expr(exp)) => Ok(exp),
            _ => Err(internal("expected a saved expression")),
        }
    }

    fn pop_env(&mut self) -> Result<Env, EvalError> {
        match self.control.pop() {
            Some(Saved::Env(env)) => Ok(env),
            _ => Err(internal("expected a saved environment")),
        }
    }

    fn pop_args(&mut self) -> Result<Vec<Value>, EvalError> {
        match self.control.pop() {
            Some(Saved::Args(args)) => Ok(args),
            _ => Err(internal("expected a saved argument accumulator")),
        }
    }

    fn pop_proc(&mut self) -> Result<Value, EvalError> {
        match self.control.pop() {
            Some(Saved::Proc(proc)) => Ok(proc),
            _ => Err(internal("expected a saved operator")),
        }
    }
}

fn internal(msg: &str) -> EvalError {
    EvalError::Internal(msg.to_string())
}

/// Splits a special form into exactly `N` operands
fn operands<const N: usize>(form: &Pair, name: &str) -> Result<[Value; N], EvalError> {
    let found = form.tail.to_vec().ok_or_else(|| {
        EvalError::Syntax(format!("improper operand list in '{}' form", name))
    })?;
    let count = found.len();
    found.try_into().map_err(|_| {
        EvalError::Syntax(format!(
            "'{}' takes {} operand(s), found {}",
            name, N, count
        ))
    })
}

/// Validates a lambda list: a proper list of plain symbols
fn param_list(params: &Value) -> Result<Rc<[Symbol]>, EvalError> {
    let items = params.to_vec().ok_or_else(|| {
        EvalError::Syntax(format!("parameter list {} is not a proper list", params))
    })?;

    items
        .iter()
        .map(|item| match item {
            Value::Symbol(sym) => Ok(sym.clone()),
            other => Err(EvalError::Syntax(format!(
                "parameter {} is not a symbol",
                other
            ))),
        })
        .collect()
}

/// Evaluates an expression in a freshly created stack
pub fn eval(lisp: &mut Interpreter, expr: &Value, env: &Env) -> Result<Value, EvalError> {
    eval_with_stats(lisp, expr, env).map(|(val, _)| val)
}

/// Like `eval`, also reporting step count and peak stack depths
pub fn eval_with_stats(
    lisp: &mut Interpreter,
    expr: &Value,
    env: &Env,
) -> Result<(Value, EvalStats), EvalError> {
    let mut stack = EvalStack::new(lisp.specials().clone(), lisp.limits());
    stack.start(expr.clone(), env.clone())?;
    let val = stack.run(lisp)?;
    Ok((val, stack.stats()))
}
