// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/error.rs

// Error taxonomy shared by the reader, the evaluator, and the native
// procedures. Everything except an internal invariant violation is
// recoverable: it aborts the current top-level form only.

// <>

use std::fmt;

use thiserror::Error;

/// Which of the two explicit evaluator stacks ran out of room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Control,
    Resume,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackKind::Control => write!(f, "control"),
            StackKind::Resume => write!(f, "resume"),
        }
    }
}

/// Coarse classification of evaluation failures, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unbound,
    Arity,
    Type,
    Syntax,
    Arithmetic,
    StackExhausted,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unbound => "unbound-name",
            ErrorKind::Arity => "arity-mismatch",
            ErrorKind::Type => "type-error",
            ErrorKind::Syntax => "syntax-error",
            ErrorKind::Arithmetic => "arithmetic-error",
            ErrorKind::StackExhausted => "stack-exhaustion",
            ErrorKind::Internal => "internal-invariant",
        };
        write!(f, "{}", name)
    }
}

/// Failure raised while evaluating a form
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown name '{0}'")]
    Unbound(String),

    #[error("{0}")]
    Arity(String),

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Syntax(String),

    #[error("{0}")]
    Arithmetic(String),

    #[error("{stack} stack exceeded its limit of {limit} entries")]
    StackExhausted { stack: StackKind, limit: usize },

    /// The machine broke one of its own invariants; never user-triggerable
    #[error("{0}")]
    Internal(String),
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Unbound(_) => ErrorKind::Unbound,
            EvalError::Arity(_) => ErrorKind::Arity,
            EvalError::Type(_) => ErrorKind::Type,
            EvalError::Syntax(_) => ErrorKind::Syntax,
            EvalError::Arithmetic(_) => ErrorKind::Arithmetic,
            EvalError::StackExhausted { .. } => ErrorKind::StackExhausted,
            EvalError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Fatal errors indicate a bug in the machine itself
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

/// Failure raised while reading text into a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("unexpected character '{ch}' at byte {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unbalanced ')' at byte {0}")]
    UnbalancedClose(usize),

    #[error("invalid number '{text}' at byte {pos}")]
    InvalidNumber { text: String, pos: usize },

    #[error("invalid escape '\\{ch}' at byte {pos}")]
    InvalidEscape { ch: char, pos: usize },

    #[error("misplaced '.' at byte {0}")]
    MisplacedDot(usize),
}

impl ParseError {
    /// True when more input could complete the form
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParseError::UnexpectedEof(_))
    }
}

/// Any failure surfaced by the top-level entry points
#[derive(Debug, Error)]
pub enum Error {
    #[error("read error: {0}")]
    Parse(#[from] ParseError),

    #[error("{}: {}", .0.kind(), .0)]
    Eval(#[from] EvalError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
