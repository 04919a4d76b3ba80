// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/stdenv.rs

// Native procedures which are part of the standard environment and
// are installed into every new interpreter.

// <>

use std::cmp::Ordering;

use super::context::Interpreter;
use super::core::Value;
use super::error::EvalError;

/// Generates a slice of native procedure pointers along with names
/// and argument count ranges
///
/// Each entry is written `"name" min max [args] { body }`, where `max`
/// is a literal or `_` for no upper bound. Inside the body `args` is
/// the argument slice, already checked against the range, and the
/// interpreter is bound to the given name. Bodies return a
/// `Result<Value, EvalError>`.
#[macro_export]
macro_rules! lll_fn {
    ( const $array:ident; $lisp:ident;
      $( $name:literal $min:literal $max:tt [ $args:ident ] $body:block )+
    ) => {
        pub const $array: &[(&str, $crate::core::NativeFn, usize, Option<usize>)] =
            &[$(($name, |
                _lisp: &mut $crate::context::Interpreter,
                _args: &[$crate::core::Value],
              | -> Result<$crate::core::Value, $crate::error::EvalError> {
                    #[allow(unused_variables)]
                    let $lisp = _lisp;
                    let $args = _args;

                    $body
                },
                $min,
                $crate::lll_fn!(@max $max))),+];
    };

    (@max _) => { None };
    (@max $max:literal) => { Some($max) };
}

/// A number pulled out of a value for arithmetic
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(val: &Value, op: &str) -> Result<Num, EvalError> {
        match val {
            Value::Int(n) => Ok(Num::Int(*n)),
            Value::Float(n) => Ok(Num::Float(*n)),
            other => Err(EvalError::Type(format!(
                "{} expects numbers, got {} {}",
                op,
                other.type_name(),
                other
            ))),
        }
    }

    fn float(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(n) => n,
        }
    }

    fn value(self) -> Value {
        match self {
            Num::Int(n) => Value::Int(n),
            Num::Float(n) => Value::Float(n),
        }
    }
}

/// Integer and float versions of one binary operator
struct Arith {
    name: &'static str,
    int: fn(i64, i64) -> Result<i64, EvalError>,
    float: fn(f64, f64) -> f64,
}

impl Arith {
    fn apply(&self, lhs: Num, rhs: Num) -> Result<Num, EvalError> {
        match (lhs, rhs) {
            (Num::Int(a), Num::Int(b)) => (self.int)(a, b).map(Num::Int),
            (a, b) => Ok(Num::Float((self.float)(a.float(), b.float()))),
        }
    }

    /// Left fold over all arguments, starting from `init`
    fn fold(&self, init: Num, args: &[Value]) -> Result<Value, EvalError> {
        let mut acc = init;
        for arg in args {
            acc = self.apply(acc, Num::of(arg, self.name)?)?;
        }
        Ok(acc.value())
    }

    /// Folds from the first argument; a lone argument is combined with
    /// `unit` instead, as in negation and reciprocal
    fn fold_first(&self, unit: Num, args: &[Value]) -> Result<Value, EvalError> {
        match args {
            [only] => self.fold(unit, std::slice::from_ref(only)),
            [first, rest @ ..] => self.fold(Num::of(first, self.name)?, rest),
            [] => Err(EvalError::Arity(format!("{} needs an argument", self.name))),
        }
    }
}

fn overflow(name: &str) -> EvalError {
    EvalError::Arithmetic(format!("integer overflow in {}", name))
}

const ADD: Arith = Arith {
    name: "+",
    int: |a, b| a.checked_add(b).ok_or_else(|| overflow("+")),
    float: |a, b| a + b,
};

const SUB: Arith = Arith {
    name: "-",
    int: |a, b| a.checked_sub(b).ok_or_else(|| overflow("-")),
    float: |a, b| a - b,
};

const MUL: Arith = Arith {
    name: "*",
    int: |a, b| a.checked_mul(b).ok_or_else(|| overflow("*")),
    float: |a, b| a * b,
};

const DIV: Arith = Arith {
    name: "/",
    int: |a, b| {
        if b == 0 {
            return Err(EvalError::Arithmetic("division by zero".to_string()));
        }
        a.checked_div(b).ok_or_else(|| overflow("/"))
    },
    float: |a, b| a / b,
};

/// Checks that every adjacent pair of arguments satisfies `holds`
fn chain(
    lisp: &mut Interpreter,
    name: &str,
    args: &[Value],
    holds: fn(Ordering) -> bool,
) -> Result<Value, EvalError> {
    let nums = args
        .iter()
        .map(|arg| Num::of(arg, name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut ok = true;
    for pair in nums.windows(2) {
        let ord = match (pair[0], pair[1]) {
            (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.float().partial_cmp(&b.float()),
        };
        // NaN compares false under every operator
        if !ord.map_or(false, holds) {
            ok = false;
            break;
        }
    }
    Ok(lisp.boolean(ok))
}

lll_fn! {
    const ENVFNS;
    lisp;

    "cons" 2 2 [args] {
        Ok(Value::cons(args[0].clone(), args[1].clone()))
    }

    "list" 0 _ [args] {
        Ok(Value::list(args.iter().cloned()))
    }

    "nil?" 1 1 [args] {
        let empty = args[0].is_nil();
        Ok(lisp.boolean(empty))
    }

    "head" 1 1 [args] {
        match &args[0] {
            Value::Nil => Ok(Value::Nil),
            Value::Pair(p) => Ok(p.head.clone()),
            other => Err(EvalError::Type(format!(
                "cannot take head of {} {}",
                other.type_name(),
                other
            ))),
        }
    }

    "rest" 1 1 [args] {
        match &args[0] {
            Value::Nil => Ok(Value::Nil),
            Value::Pair(p) => Ok(p.tail.clone()),
            other => Err(EvalError::Type(format!(
                "cannot take rest of {} {}",
                other.type_name(),
                other
            ))),
        }
    }

    "empty?" 1 1 [args] {
        match &args[0] {
            Value::Nil => Ok(lisp.truth()),
            Value::Pair(_) => Ok(Value::Nil),
            other => Err(EvalError::Type(format!(
                "empty? expects a list, got {} {}",
                other.type_name(),
                other
            ))),
        }
    }

    "length" 1 1 [args] {
        let len = args[0].list_len().ok_or_else(|| {
            EvalError::Type(format!("length expects a proper list, got {}", args[0]))
        })?;
        Ok(Value::Int(len as i64))
    }

    "module-set!" 2 2 [args] {
        match &args[0] {
            Value::Symbol(sym) => {
                lisp.define(sym.clone(), args[1].clone());
                Ok(Value::Nil)
            }
            other => Err(EvalError::Type(format!(
                "module-set! binds symbols, not {} {}",
                other.type_name(),
                other
            ))),
        }
    }

    "+" 0 _ [args] {
        ADD.fold(Num::Int(0), args)
    }

    "*" 0 _ [args] {
        MUL.fold(Num::Int(1), args)
    }

    "-" 1 _ [args] {
        SUB.fold_first(Num::Int(0), args)
    }

    "/" 1 _ [args] {
        DIV.fold_first(Num::Int(1), args)
    }

    "%" 2 2 [args] {
        match (&args[0], &args[1]) {
            (Value::Int(_), Value::Int(0)) => {
                Err(EvalError::Arithmetic("remainder by zero".to_string()))
            }
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem(*b))),
            (a, b) => Err(EvalError::Type(format!(
                "% expects integers, got {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    "=" 1 _ [args] {
        chain(lisp, "=", args, Ordering::is_eq)
    }

    "<" 1 _ [args] {
        chain(lisp, "<", args, Ordering::is_lt)
    }

    ">" 1 _ [args] {
        chain(lisp, ">", args, Ordering::is_gt)
    }

    "<=" 1 _ [args] {
        chain(lisp, "<=", args, Ordering::is_le)
    }

    ">=" 1 _ [args] {
        chain(lisp, ">=", args, Ordering::is_ge)
    }

    "eq?" 2 2 [args] {
        let same = args[0].identical(&args[1]);
        Ok(lisp.boolean(same))
    }
}

/// Installs every standard native procedure into the interpreter
pub fn install(lisp: &mut Interpreter) {
    for &(name, func, min, max) in ENVFNS {
        if let Err(err) = lisp.install(name, func, min, max) {
            log::error!("could not install {}: {}", name, err);
        }
    }
}
