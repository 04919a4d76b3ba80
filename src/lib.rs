// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/lib.rs

// Library root. Source text is read into values, which are evaluated
// by a register machine with explicit stacks against a context of
// interned symbols and top-level bindings.

// <>

//! A small Lisp built around an explicit-control evaluator
//!
//! ```
//! let mut lisp = lll::Interpreter::new();
//! let out = lisp.run_str("((fn (x y) (cons x y)) 1 2)").unwrap();
//! assert_eq!(out.to_string(), "(1 . 2)");
//! ```

pub mod context;
pub mod core;
pub mod env;
pub mod error;
pub mod eval;
pub mod parser;
pub mod stdenv;
pub mod symtab;

pub use self::context::Interpreter;
pub use self::core::{NativeFn, Value};
pub use self::env::Env;
pub use self::error::{Error, ErrorKind, EvalError, ParseError};
pub use self::eval::{EvalStats, Limits};
pub use self::symtab::{Symbol, SymbolTable};
