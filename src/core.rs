// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/core.rs

// The value model. Code and data share one tagged representation:
// atoms, pairs, closures, and native procedures. Also holds the list
// helpers every other module leans on and the printer.

// <>

use std::fmt;
use std::mem;
use std::rc::Rc;

use super::context::Interpreter;
use super::env::Env;
use super::error::EvalError;
use super::symtab::Symbol;

/// Signature shared by every native procedure
///
/// Arguments arrive in source order, already counted against the
/// procedure's declared arity.
pub type NativeFn = fn(&mut Interpreter, &[Value]) -> Result<Value, EvalError>;

/// Universal data representation for both code and data
#[derive(Clone, Default)]
pub enum Value {
    /// The one empty list; also the only false value
    #[default]
    Nil,
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Symbol(Symbol),
    Keyword(Symbol),
    Pair(Rc<Pair>),
    Closure(Rc<Closure>),
    Primitive(Rc<Primitive>),
}

/// Two-slot list building cell
pub struct Pair {
    pub head: Value,
    pub tail: Value,
}

impl Drop for Pair {
    fn drop(&mut self) {
        if self.head.drops_shallow() && self.tail.drops_shallow() {
            return;
        }
        unlink(vec![
            Link::Value(mem::take(&mut self.head)),
            Link::Value(mem::take(&mut self.tail)),
        ]);
    }
}

/// Something still to be torn down by `unlink`
pub(crate) enum Link {
    Value(Value),
    Env(Env),
}

/// Releases a value graph through a worklist
///
/// Uniquely owned pairs, closures, and environment frames are emptied
/// here rather than by their own destructors, so host stack use stays
/// constant however long or deep the graph is. Shared pieces only lose
/// one reference.
pub(crate) fn unlink(mut pending: Vec<Link>) {
    while let Some(link) = pending.pop() {
        match link {
            Link::Value(Value::Pair(cell)) => {
                if let Ok(mut pair) = Rc::try_unwrap(cell) {
                    pending.push(Link::Value(mem::take(&mut pair.head)));
                    pending.push(Link::Value(mem::take(&mut pair.tail)));
                }
            }
            Link::Value(Value::Closure(clos)) => {
                if let Ok(mut clos) = Rc::try_unwrap(clos) {
                    pending.push(Link::Value(mem::take(&mut clos.body)));
                    pending.push(Link::Env(mem::take(&mut clos.env)));
                }
            }
            Link::Value(_) => {}
            Link::Env(mut env) => {
                if let Some((values, next)) = env.take_frame() {
                    pending.extend(values.into_iter().map(Link::Value));
                    pending.push(Link::Env(next));
                }
            }
        }
    }
}

/// Function value: parameters and body plus the environment of its
/// creation, shared by every application
pub struct Closure {
    pub params: Rc<[Symbol]>,
    pub body: Value,
    pub env: Env,
}

impl Drop for Closure {
    fn drop(&mut self) {
        if self.body.drops_shallow() && self.env.drops_shallow() {
            return;
        }
        unlink(vec![
            Link::Value(mem::take(&mut self.body)),
            Link::Env(mem::take(&mut self.env)),
        ]);
    }
}

/// Native procedure with a declared argument count range
pub struct Primitive {
    pub name: String,
    pub func: NativeFn,
    pub min: usize,
    /// `None` means no upper bound
    pub max: Option<usize>,
}

impl Primitive {
    /// Verifies an argument count against the declared range
    pub fn check_arity(&self, argct: usize) -> Result<(), EvalError> {
        let too_many = self.max.map_or(false, |max| argct > max);
        if argct < self.min || too_many {
            let expected = match self.max {
                Some(max) if max == self.min => format!("{}", max),
                Some(max) => format!("{} to {}", self.min, max),
                None => format!("at least {}", self.min),
            };
            return Err(EvalError::Arity(format!(
                "{} expects {} argument(s), got {}",
                self.name, expected, argct
            )));
        }
        Ok(())
    }
}

impl Value {
    pub fn cons(head: Value, tail: Value) -> Value {
        Value::Pair(Rc::new(Pair { head, tail }))
    }

    pub fn string(text: &str) -> Value {
        Value::Str(Rc::from(text))
    }

    /// Builds a proper list holding `items` in order
    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        let items: Vec<Value> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, head| Value::cons(head, tail))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// True when dropping this handle frees no other pair or closure
    pub(crate) fn drops_shallow(&self) -> bool {
        match self {
            Value::Pair(p) => Rc::strong_count(p) > 1,
            Value::Closure(c) => Rc::strong_count(c) > 1,
            _ => true,
        }
    }

    pub fn truthy(&self) -> bool {
        !self.is_nil()
    }

    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Value::Pair(p) => Some(p),
            _ => None,
        }
    }

    /// Collects the elements of a proper list; `None` if improper
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        let mut out = vec![];
        let mut cur = self;
        loop {
            match cur {
                Value::Nil => return Some(out),
                Value::Pair(p) => {
                    out.push(p.head.clone());
                    cur = &p.tail;
                }
                _ => return None,
            }
        }
    }

    /// Length of a proper list; `None` if improper
    pub fn list_len(&self) -> Option<usize> {
        let mut len = 0;
        let mut cur = self;
        loop {
            match cur {
                Value::Nil => return Some(len),
                Value::Pair(p) => {
                    len += 1;
                    cur = &p.tail;
                }
                _ => return None,
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::Pair(_) => "pair",
            Value::Closure(_) => "closure",
            Value::Primitive(_) => "primitive",
        }
    }

    /// Identity comparison
    ///
    /// Symbols and keywords compare by interned instance, numbers and
    /// strings by content, and compound values by reference.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Primitive(a), Value::Primitive(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

fn write_string(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in text.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            '\x07' => write!(f, "\\a")?,
            _ => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

/// Pending printer work
enum Piece<'a> {
    Value(&'a Value),
    /// What follows a list element: more elements, a dotted tail, or `)`
    Rest(&'a Value),
    Text(&'static str),
}

fn write_float(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    let text = n.to_string();
    if n.is_finite() && !text.contains('.') {
        write!(f, "{}.0", text)
    } else {
        write!(f, "{}", text)
    }
}

fn write_atom(f: &mut fmt::Formatter<'_>, val: &Value) -> fmt::Result {
    match val {
        Value::Nil => write!(f, "()"),
        Value::Int(n) => write!(f, "{}", n),
        Value::Float(n) => write_float(f, *n),
        Value::Str(s) => write_string(f, s),
        Value::Symbol(s) | Value::Keyword(s) => write!(f, "{}", s),
        Value::Closure(c) => {
            write!(f, "<#Closure (")?;
            for (i, param) in c.params.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", param)?;
            }
            write!(f, ")>")
        }
        Value::Primitive(p) => write!(f, "<#Primitive {}>", p.name),
        Value::Pair(_) => Err(fmt::Error),
    }
}

// Nesting is kept on an explicit stack, in heads and tails alike
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending = vec![Piece::Value(self)];

        while let Some(piece) = pending.pop() {
            match piece {
                Piece::Value(Value::Pair(p)) => {
                    write!(f, "(")?;
                    pending.push(Piece::Rest(&p.tail));
                    pending.push(Piece::Value(&p.head));
                }
                Piece::Value(atom) => write_atom(f, atom)?,
                Piece::Rest(Value::Nil) => write!(f, ")")?,
                Piece::Rest(Value::Pair(next)) => {
                    write!(f, " ")?;
                    pending.push(Piece::Rest(&next.tail));
                    pending.push(Piece::Value(&next.head));
                }
                Piece::Rest(tail) => {
                    write!(f, " . ")?;
                    pending.push(Piece::Text(")"));
                    pending.push(Piece::Value(tail));
                }
                Piece::Text(text) => f.write_str(text)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtab::SymbolTable;

    fn nothing(_: &mut Interpreter, _: &[Value]) -> Result<Value, EvalError> {
        Ok(Value::Nil)
    }

    #[test]
    fn displays() {
        let mut tbl = SymbolTable::new();
        let list = Value::list([
            Value::list([Value::Int(42), Value::Keyword(tbl.intern(":true"))]),
            Value::string("the answer"),
            Value::Nil,
            Value::Float(2.0),
            Value::Symbol(tbl.intern("e")),
        ]);
        assert_eq!(list.to_string(), "((42 :true) \"the answer\" () 2.0 e)");
    }

    #[test]
    fn displays_improper_and_escaped() {
        let pair = Value::cons(Value::Int(1), Value::Int(2));
        assert_eq!(pair.to_string(), "(1 . 2)");

        let tail = Value::cons(Value::Int(1), Value::cons(Value::Int(2), Value::Int(3)));
        assert_eq!(tail.to_string(), "(1 2 . 3)");

        assert_eq!(Value::string("say \"hi\"\n").to_string(), "\"say \\\"hi\\\"\\n\"");
    }

    #[test]
    fn proper_lists() {
        let list = Value::list((1..=3).map(Value::Int));
        assert_eq!(list.list_len(), Some(3));
        assert_eq!(list.to_vec().unwrap().len(), 3);

        let improper = Value::cons(Value::Int(1), Value::Int(2));
        assert_eq!(improper.list_len(), None);
        assert!(improper.to_vec().is_none());

        assert_eq!(Value::Nil.list_len(), Some(0));
    }

    #[test]
    fn nil_is_the_only_empty_list() {
        assert!(Value::Nil.is_nil());
        // a pair holding two empty lists is still a pair
        let pair = Value::cons(Value::Nil, Value::Nil);
        assert!(!pair.is_nil());
        assert!(pair.truthy());
        assert!(Value::Int(0).truthy());
    }

    #[test]
    fn drops_long_lists() {
        let long = Value::list((0..1_000_000).map(Value::Int));
        assert_eq!(long.list_len(), Some(1_000_000));
        drop(long);

        let mut deep = Value::Nil;
        for _ in 0..1_000_000 {
            deep = Value::cons(deep, Value::Nil);
        }
        drop(deep);
    }

    #[test]
    fn drops_long_closure_chains() {
        let mut tbl = SymbolTable::new();
        let acc: Rc<[Symbol]> = Rc::from(vec![tbl.intern("acc")]);
        let body = Value::Symbol(acc[0].clone());

        // each closure captures a frame holding the one before it,
        // every other link wrapped in a pair
        let mut chain = Value::Nil;
        for i in 0..300_000 {
            let env = Env::new().extend(acc.clone(), vec![chain]).unwrap();
            let clos = Value::Closure(Rc::new(Closure {
                params: Rc::from(Vec::new()),
                body: body.clone(),
                env,
            }));
            chain = if i % 2 == 0 {
                Value::cons(clos, Value::Nil)
            } else {
                clos
            };
        }
        drop(chain);
    }

    #[test]
    fn prints_deep_heads() {
        let depth = 300_000;
        let mut deep = Value::Int(7);
        for _ in 0..depth {
            deep = Value::cons(deep, Value::Nil);
        }

        let text = deep.to_string();
        assert_eq!(text.len(), 2 * depth + 1);
        assert!(text.starts_with("(((("));
        assert!(text.ends_with("7))))"));
    }

    #[test]
    fn prints_floats_with_a_fraction() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(-0.5).to_string(), "-0.5");
        assert_eq!(Value::Float(1e20).to_string(), "100000000000000000000.0");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "inf");

        let mut tbl = SymbolTable::new();
        let text = Value::Float(1e20).to_string();
        let back = crate::parser::parse(&mut tbl, &text).unwrap();
        assert!(back.identical(&Value::Float(1e20)));
    }

    #[test]
    fn identity() {
        let a = Value::cons(Value::Int(1), Value::Nil);
        let b = Value::cons(Value::Int(1), Value::Nil);
        assert!(a.identical(&a.clone()));
        assert!(!a.identical(&b));
        assert!(Value::Int(3).identical(&Value::Int(3)));
        assert!(!Value::Int(3).identical(&Value::Float(3.0)));
    }

    #[test]
    fn arity_ranges() {
        let prim = Primitive {
            name: "pick".into(),
            func: nothing,
            min: 1,
            max: Some(2),
        };
        assert!(prim.check_arity(0).is_err());
        assert!(prim.check_arity(1).is_ok());
        assert!(prim.check_arity(2).is_ok());
        assert_eq!(
            prim.check_arity(3).unwrap_err().to_string(),
            "pick expects 1 to 2 argument(s), got 3"
        );

        let variadic = Primitive {
            name: "list".into(),
            func: nothing,
            min: 0,
            max: None,
        };
        assert!(variadic.check_arity(1000).is_ok());
    }
}
