// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/env.rs

// Lexical environments as persistent chains of binding frames, plus
// the copy-on-write table of top-level bindings consulted when the
// chain has no answer.

// <>

use std::fmt;
use std::mem;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::core::{unlink, Link, Value};
use super::error::EvalError;
use super::symtab::Symbol;

/// Chain of binding frames, innermost first
///
/// Frames are never mutated once built. Extending shares the existing
/// chain with every closure that still refers to it.
#[derive(Clone, Default)]
pub struct Env(Option<Rc<Frame>>);

/// One set of positional bindings
struct Frame {
    names: Rc<[Symbol]>,
    values: Vec<Value>,
    next: Env,
}

impl Drop for Frame {
    fn drop(&mut self) {
        if self.next.drops_shallow() && self.values.iter().all(Value::drops_shallow) {
            return;
        }
        let mut pending: Vec<Link> = self.values.drain(..).map(Link::Value).collect();
        pending.push(Link::Env(mem::take(&mut self.next)));
        unlink(pending);
    }
}

impl Env {
    /// The empty chain
    pub fn new() -> Self {
        Env(None)
    }

    /// Returns a new environment with one frame in front of this one
    pub fn extend(&self, names: Rc<[Symbol]>, values: Vec<Value>) -> Result<Env, EvalError> {
        if names.len() != values.len() {
            return Err(EvalError::Arity(format!(
                "cannot bind {} name(s) to {} value(s)",
                names.len(),
                values.len()
            )));
        }

        Ok(Env(Some(Rc::new(Frame {
            names,
            values,
            next: self.clone(),
        }))))
    }

    /// Resolves a symbol by identity, innermost frame first
    pub fn lookup(&self, sym: &Symbol) -> Option<Value> {
        let mut env = self;
        while let Some(frame) = &env.0 {
            if let Some(idx) = frame.names.iter().position(|name| name == sym) {
                return Some(frame.values[idx].clone());
            }
            env = &frame.next;
        }
        None
    }

    /// Number of frames in the chain
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut env = self;
        while let Some(frame) = &env.0 {
            depth += 1;
            env = &frame.next;
        }
        depth
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// True when dropping this handle frees no frame
    pub(crate) fn drops_shallow(&self) -> bool {
        match &self.0 {
            Some(frame) => Rc::strong_count(frame) > 1,
            None => true,
        }
    }

    /// Detaches the innermost frame's values and the rest of the chain,
    /// if this handle was the frame's only owner
    pub(crate) fn take_frame(&mut self) -> Option<(Vec<Value>, Env)> {
        let frame = self.0.take()?;
        let mut frame = Rc::try_unwrap(frame).ok()?;
        Some((mem::take(&mut frame.values), mem::take(&mut frame.next)))
    }

    /// Whether both handles share the same innermost frame
    pub fn same_frame(&self, other: &Env) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Env(depth {})", self.depth())
    }
}

/// Top-level bindings, shared copy-on-write
///
/// Cloning is cheap; the first write after a clone copies the table,
/// so a saved handle is an exact snapshot.
#[derive(Clone, Default)]
pub struct Globals(Rc<FxHashMap<Symbol, Value>>);

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sym: &Symbol) -> Option<Value> {
        self.0.get(sym).cloned()
    }

    /// Binds or rebinds a top-level name
    pub fn define(&mut self, sym: Symbol, value: Value) {
        Rc::make_mut(&mut self.0).insert(sym, value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
