// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/main.rs

// Command line driver: an interactive loop, or a file run to
// completion.

// <>

use lll::{parser::Reader, Error, Interpreter, Limits};

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;

fn main() {
    if let Err(err) = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
    {
        eprintln!("logger unavailable: {}", err);
    }

    // lll file <filename> to run a file
    // lll or lll repl for the interactive loop
    let args: Vec<String> = env::args().collect();
    let limits = Limits::from_env();

    let status = match args.get(1).map(String::as_str) {
        Some("file") => match args.get(2) {
            Some(path) => run_file(path, limits),
            None => {
                eprintln!("usage: lll file <path>");
                2
            }
        },
        None | Some("repl") => repl(limits),
        Some(other) => {
            eprintln!("unknown command '{}'; expected 'repl' or 'file <path>'", other);
            2
        }
    };

    process::exit(status);
}

/// Evaluates every form in a file and prints the last value
fn run_file(path: &str, limits: Limits) -> i32 {
    log::info!("running {}", path);

    let code = match fs::read_to_string(path) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{}", Error::from(err));
            return 1;
        }
    };

    let mut lisp = Interpreter::with_limits(limits);
    match lisp.run_str(&code) {
        Ok(out) => {
            println!("{}", out);
            0
        }
        Err(err) => {
            log::error!("{}: {}", path, err);
            1
        }
    }
}

/// Reads forms from standard input until end of input
///
/// A form left open at the end of a line continues onto the next.
/// Recoverable errors are reported and the loop carries on.
fn repl(limits: Limits) -> i32 {
    let mut lisp = Interpreter::with_limits(limits);
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut buffer = String::new();

    loop {
        prompt(if buffer.is_empty() { "lll> " } else { "...  " });

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => {
                if !buffer.trim().is_empty() {
                    log::warn!("discarding incomplete input at end of stream");
                }
                println!();
                return 0;
            }
            Ok(_) => buffer.push_str(&line),
            Err(err) => {
                log::error!("{}", Error::from(err));
                return 1;
            }
        }

        match eval_buffer(&mut lisp, &buffer) {
            Ok(()) => buffer.clear(),
            Err(Error::Parse(err)) if err.is_incomplete() => continue,
            Err(Error::Eval(err)) if err.is_fatal() => {
                log::error!("{}: {}", err.kind(), err);
                return 1;
            }
            Err(err) => {
                log::warn!("{}", err);
                buffer.clear();
            }
        }
    }
}

/// Evaluates each complete form in `buffer`, printing every result
///
/// Reading is checked ahead of evaluation, so a form still open at the
/// end leaves everything unevaluated and can be retried with more text.
fn eval_buffer(lisp: &mut Interpreter, buffer: &str) -> Result<(), Error> {
    let mut forms = vec![];
    let mut reader = Reader::new(buffer);
    while let Some(form) = reader.read(lisp.symtab())? {
        forms.push(form);
    }

    for form in forms {
        let out = lisp.eval(&form)?;
        println!("  => {}", out);
    }
    Ok(())
}

fn prompt(text: &str) {
    print!("{}", text);
    if let Err(err) = io::stdout().flush() {
        log::warn!("could not flush prompt: {}", err);
    }
}
