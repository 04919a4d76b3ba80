// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/context.rs

// The interpreter context: symbol table, top-level bindings, special
// form symbols, and stack limits, with the entry points that read and
// evaluate text against them.

// <>

use std::rc::Rc;

use super::core::{NativeFn, Primitive, Value};
use super::env::{Env, Globals};
use super::error::{Error, EvalError, ParseError};
use super::eval::{self, EvalStats, Limits, Specials};
use super::parser::{self, Reader};
use super::stdenv;
use super::symtab::{Symbol, SymbolTable};

/// Global context for reading and evaluating
pub struct Interpreter {
    /// Table associating symbol names with canonical symbols
    symtab: SymbolTable,

    /// Top-level bindings, consulted after the lexical chain
    globals: Globals,

    specials: Specials,
    limits: Limits,
}

impl Interpreter {
    /// Context with the standard primitives and default stack limits
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Context with the standard primitives and the given stack limits
    pub fn with_limits(limits: Limits) -> Self {
        let mut lisp = Self::bare(limits);
        stdenv::install(&mut lisp);
        log::debug!(
            "interpreter ready: {} top-level bindings, limits {:?}",
            lisp.globals.len(),
            limits
        );
        lisp
    }

    /// Context with no top-level bindings at all
    pub fn bare(limits: Limits) -> Self {
        let mut symtab = SymbolTable::with_capacity(256);
        let specials = Specials::new(&mut symtab);

        Self {
            symtab,
            globals: Globals::new(),
            specials,
            limits,
        }
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.symtab.intern(name)
    }

    /// Keyword value for `name`; the leading colon is added if missing
    pub fn keyword(&mut self, name: &str) -> Value {
        if name.starts_with(':') {
            Value::Keyword(self.symtab.intern(name))
        } else {
            Value::Keyword(self.symtab.intern(&format!(":{}", name)))
        }
    }

    /// The canonical true value, `:true`
    pub fn truth(&mut self) -> Value {
        self.keyword(":true")
    }

    /// Converts a host boolean to `:true` or Nil
    pub fn boolean(&mut self, b: bool) -> Value {
        if b {
            self.truth()
        } else {
            Value::Nil
        }
    }

    pub fn symtab(&mut self) -> &mut SymbolTable {
        &mut self.symtab
    }

    /// Binds or rebinds a top-level name
    pub fn define(&mut self, sym: Symbol, value: Value) {
        self.globals.define(sym, value);
    }

    pub fn global(&self, sym: &Symbol) -> Option<Value> {
        self.globals.get(sym)
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Registers a native procedure under a top-level name
    pub fn install(
        &mut self,
        name: &str,
        func: NativeFn,
        min: usize,
        max: Option<usize>,
    ) -> Result<(), EvalError> {
        let sym = self.symtab.intern(name);
        if sym.is_keyword() {
            return Err(EvalError::Type(format!(
                "cannot bind a procedure to keyword {}",
                sym
            )));
        }
        if max.map_or(false, |max| max < min) {
            return Err(EvalError::Arity(format!(
                "{} declares at most {} but at least {} argument(s)",
                name,
                max.unwrap_or_default(),
                min
            )));
        }

        log::debug!("installing primitive {}", name);
        let prim = Primitive {
            name: name.to_string(),
            func,
            min,
            max,
        };
        self.define(sym, Value::Primitive(Rc::new(prim)));
        Ok(())
    }

    pub fn specials(&self) -> &Specials {
        &self.specials
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Reads exactly one expression
    pub fn read(&mut self, code: &str) -> Result<Value, ParseError> {
        parser::parse(&mut self.symtab, code)
    }

    /// Evaluates a top-level form
    ///
    /// Top-level bindings made by a form that then fails are rolled
    /// back, so an error leaves the context exactly as it was.
    pub fn eval(&mut self, expr: &Value) -> Result<Value, EvalError> {
        self.eval_with_stats(expr).map(|(val, _)| val)
    }

    /// Evaluates in a given lexical environment; not rolled back on error
    pub fn eval_in(&mut self, expr: &Value, env: &Env) -> Result<Value, EvalError> {
        eval::eval(self, expr, env)
    }

    /// Like `eval`, also reporting the machine's step and depth counters
    pub fn eval_with_stats(&mut self, expr: &Value) -> Result<(Value, EvalStats), EvalError> {
        let saved = self.globals.clone();
        let out = eval::eval_with_stats(self, expr, &Env::new());

        if let Err(err) = &out {
            log::debug!("restoring top-level bindings after {}", err.kind());
            self.globals = saved;
        }
        out
    }

    /// Reads and evaluates every form in `code`, returning the last value
    ///
    /// Stops at the first error; forms before it keep their effects.
    pub fn run_str(&mut self, code: &str) -> Result<Value, Error> {
        let mut reader = Reader::new(code);
        let mut last = Value::Nil;

        while let Some(form) = reader.read(&mut self.symtab)? {
            last = self.eval(&form)?;
        }
        Ok(last)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn answer(_: &mut Interpreter, _: &[Value]) -> Result<Value, EvalError> {
        Ok(Value::Int(42))
    }

    #[test]
    fn bare_has_no_bindings() {
        let mut lisp = Interpreter::bare(Limits::default());
        assert!(lisp.globals().is_empty());

        let err = lisp.run_str("(cons 1 2)").unwrap_err();
        assert_eq!(err.to_string(), "unbound-name: unknown name 'cons'");
    }

    #[test]
    fn installs_primitives() {
        let mut lisp = Interpreter::bare(Limits::default());
        lisp.install("answer", answer, 0, Some(0)).unwrap();

        assert_eq!(lisp.run_str("(answer)").unwrap().to_string(), "42");
        assert_eq!(
            lisp.run_str("answer").unwrap().to_string(),
            "<#Primitive answer>"
        );
    }

    #[test]
    fn refuses_keyword_names() {
        let mut lisp = Interpreter::bare(Limits::default());
        let err = lisp.install(":answer", answer, 0, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(lisp.globals().is_empty());
    }

    #[test]
    fn keywords_and_truth() {
        let mut lisp = Interpreter::new();
        let a = lisp.keyword("true");
        let b = lisp.truth();
        assert!(a.identical(&b));
        assert_eq!(b.to_string(), ":true");
        assert!(lisp.boolean(false).is_nil());
    }

    #[test]
    fn defines_globals() {
        let mut lisp = Interpreter::new();
        let x = lisp.intern("x");
        lisp.define(x.clone(), Value::Int(3));

        assert_eq!(lisp.run_str("(+ x x)").unwrap().to_string(), "6");
        assert_eq!(lisp.global(&x).unwrap().to_string(), "3");
    }

    #[test]
    fn failed_forms_leave_no_trace() {
        let mut lisp = Interpreter::new();
        lisp.run_str("(module-set! 'x 1)").unwrap();

        let before = lisp.globals().len();
        let err = lisp
            .run_str("(list (module-set! 'x 2) (module-set! 'y 3) (undefined))")
            .unwrap_err();
        assert!(matches!(err, Error::Eval(EvalError::Unbound(_))));

        assert_eq!(lisp.globals().len(), before);
        assert_eq!(lisp.run_str("x").unwrap().to_string(), "1");
        assert!(lisp.run_str("y").is_err());
    }

    #[test]
    fn evaluates_in_a_given_environment() {
        let mut lisp = Interpreter::new();
        let n = lisp.intern("n");
        let env = Env::new()
            .extend(Rc::from(vec![n]), vec![Value::Int(20)])
            .unwrap();

        let expr = lisp.read("(* n 2)").unwrap();
        assert_eq!(lisp.eval_in(&expr, &env).unwrap().to_string(), "40");
        assert!(lisp.eval(&expr).is_err());
    }

    #[test]
    fn runs_every_form() {
        let mut lisp = Interpreter::new();
        let out = lisp
            .run_str("(module-set! 'sq (fn (x) (* x x))) ; square\n(sq 12)")
            .unwrap();
        assert_eq!(out.to_string(), "144");

        assert!(lisp.run_str("").unwrap().is_nil());
        assert!(matches!(lisp.run_str("(sq 2"), Err(Error::Parse(_))));
    }

    #[test]
    fn reports_stats() {
        let mut lisp = Interpreter::new();
        let expr = lisp.read("(+ 1 2)").unwrap();
        let (val, stats) = lisp.eval_with_stats(&expr).unwrap();

        assert_eq!(val.to_string(), "3");
        assert!(stats.steps > 0);
        assert!(stats.peak_control > 0);
        assert!(stats.peak_resume >= 1);
    }
}
