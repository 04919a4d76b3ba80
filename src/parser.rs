// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/parser.rs

// Reader: turns source text into values. Nesting is tracked with an
// explicit stack of open lists, so input depth is limited by memory
// rather than by the host stack.

// <>

use std::iter;
use std::str;

use super::core::Value;
use super::error::ParseError;
use super::symtab::SymbolTable;

/// A list or quote still waiting for its contents
enum Open {
    List {
        items: Vec<Value>,
        /// Saw a `.`; the next value is the tail
        dot: bool,
        tail: Option<Value>,
    },
    Quote,
}

/// Reads successive top-level forms out of a source string
pub struct Reader<'a> {
    src: &'a str,
    chars: iter::Peekable<str::CharIndices<'a>>,
}

impl<'a> Reader<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    /// Byte offset of the next unread character
    pub fn position(&mut self) -> usize {
        match self.chars.peek() {
            Some(&(pos, _)) => pos,
            None => self.src.len(),
        }
    }

    /// Reads the next complete form; `Ok(None)` once input is exhausted
    pub fn read(&mut self, tbl: &mut SymbolTable) -> Result<Option<Value>, ParseError> {
        let mut open: Vec<Open> = vec![];

        loop {
            self.skip_space();

            let (pos, c) = match self.chars.peek() {
                Some(&next) => next,
                None if open.is_empty() => return Ok(None),
                None => return Err(ParseError::UnexpectedEof(self.src.len())),
            };

            let value = match c {
                '(' => {
                    self.chars.next();
                    open.push(Open::List {
                        items: vec![],
                        dot: false,
                        tail: None,
                    });
                    continue;
                }
                ')' => {
                    self.chars.next();
                    match open.pop() {
                        Some(Open::List { items, dot, tail }) => {
                            if dot && tail.is_none() {
                                return Err(ParseError::MisplacedDot(pos));
                            }
                            items
                                .into_iter()
                                .rev()
                                .fold(tail.unwrap_or_default(), |rest, item| {
                                    Value::cons(item, rest)
                                })
                        }
                        Some(Open::Quote) => return Err(ParseError::UnexpectedChar { ch: c, pos }),
                        None => return Err(ParseError::UnbalancedClose(pos)),
                    }
                }
                '\'' => {
                    self.chars.next();
                    open.push(Open::Quote);
                    continue;
                }
                '"' => {
                    self.chars.next();
                    self.read_string()?
                }
                _ => {
                    let token = self.read_token();
                    if token == "." {
                        match open.last_mut() {
                            Some(Open::List { items, dot, .. }) if !items.is_empty() && !*dot => {
                                *dot = true;
                                continue;
                            }
                            _ => return Err(ParseError::MisplacedDot(pos)),
                        }
                    }
                    atom(tbl, token, pos)?
                }
            };

            if let Some(done) = complete(&mut open, tbl, value, pos)? {
                return Ok(Some(done));
            }
        }
    }

    fn skip_space(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == ';' {
                while let Some((_, c)) = self.chars.next() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    /// Consumes a run of non-delimiter characters
    fn read_token(&mut self) -> &'a str {
        let start = self.position();
        while let Some(&(_, c)) = self.chars.peek() {
            if delimiter(c) {
                break;
            }
            self.chars.next();
        }
        let end = self.position();
        &self.src[start..end]
    }

    /// Reads the body of a string literal; the opening quote is consumed
    fn read_string(&mut self) -> Result<Value, ParseError> {
        let mut acc = String::new();
        loop {
            let (pos, c) = self
                .chars
                .next()
                .ok_or(ParseError::UnexpectedEof(self.src.len()))?;
            match c {
                '"' => return Ok(Value::string(&acc)),
                '\\' => {
                    let (_, esc) = self
                        .chars
                        .next()
                        .ok_or(ParseError::UnexpectedEof(self.src.len()))?;
                    acc.push(match esc {
                        '\\' => '\\',
                        '"' => '"',
                        'a' => '\x07',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        _ => return Err(ParseError::InvalidEscape { ch: esc, pos }),
                    });
                }
                _ => acc.push(c),
            }
        }
    }
}

fn delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';')
}

/// Hands a finished value to whatever is waiting for it
///
/// Returns the value itself once no list or quote is left open.
fn complete(
    open: &mut Vec<Open>,
    tbl: &mut SymbolTable,
    mut value: Value,
    pos: usize,
) -> Result<Option<Value>, ParseError> {
    loop {
        match open.last_mut() {
            None => return Ok(Some(value)),
            Some(Open::Quote) => {
                open.pop();
                let quote = Value::Symbol(tbl.intern("quote"));
                value = Value::list([quote, value]);
            }
            Some(Open::List { items, dot, tail }) => {
                if tail.is_some() {
                    // only ')' may follow a dotted tail
                    return Err(ParseError::MisplacedDot(pos));
                } else if *dot {
                    *tail = Some(value);
                } else {
                    items.push(value);
                }
                return Ok(None);
            }
        }
    }
}

/// Classifies a token as a number, keyword, or symbol
fn atom(tbl: &mut SymbolTable, token: &str, pos: usize) -> Result<Value, ParseError> {
    let mut chars = token.chars();
    let numeric = match (chars.next(), chars.next()) {
        (Some(c), _) if c.is_ascii_digit() => true,
        (Some('+' | '-'), Some(d)) if d.is_ascii_digit() => true,
        _ => false,
    };

    if numeric {
        process_num(token, pos)
    } else if token.starts_with(':') {
        Ok(Value::Keyword(tbl.intern(token)))
    } else {
        Ok(Value::Symbol(tbl.intern(token)))
    }
}

fn process_num(token: &str, pos: usize) -> Result<Value, ParseError> {
    if let Ok(n) = token.parse::<i64>() {
        Ok(Value::Int(n))
    } else if token.contains('.') {
        token
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ParseError::InvalidNumber {
                text: token.to_string(),
                pos,
            })
    } else {
        Err(ParseError::InvalidNumber {
            text: token.to_string(),
            pos,
        })
    }
}

/// Parses exactly one expression from `code`
pub fn parse(tbl: &mut SymbolTable, code: &str) -> Result<Value, ParseError> {
    let mut reader = Reader::new(code);
    let value = reader
        .read(tbl)?
        .ok_or(ParseError::UnexpectedEof(code.len()))?;

    reader.skip_space();
    let pos = reader.position();
    match code[pos..].chars().next() {
        None => Ok(value),
        Some(')') => Err(ParseError::UnbalancedClose(pos)),
        Some(ch) => Err(ParseError::UnexpectedChar { ch, pos }),
    }
}
