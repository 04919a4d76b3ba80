// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// tests/programs.rs

// Whole programs run through the public entry points.

// <>

use lll::{Error, ErrorKind, Interpreter, Limits};

fn run(lisp: &mut Interpreter, code: &str) -> String {
    match lisp.run_str(code) {
        Ok(out) => out.to_string(),
        Err(err) => panic!("{} failed: {}", code, err),
    }
}

fn eval_kind(lisp: &mut Interpreter, code: &str) -> ErrorKind {
    match lisp.run_str(code) {
        Err(Error::Eval(err)) => err.kind(),
        other => panic!("{} should fail to evaluate, got {:?}", code, other.map(|v| v.to_string())),
    }
}

const PRELUDE: &str = "
(module-set! 'fact
  (fn (n) (if (= n 0) 1 (* n (fact (- n 1))))))

(module-set! 'map
  (fn (f xs)
    (if (empty? xs)
        ()
        (cons (f (head xs)) (map f (rest xs))))))

(module-set! 'fold
  (fn (f acc xs)
    (if (empty? xs)
        acc
        (fold f (f acc (head xs)) (rest xs)))))

(module-set! 'range
  (fn (lo hi)
    (if (>= lo hi) () (cons lo (range (+ lo 1) hi)))))
";

#[test]
fn factorial() {
    let mut lisp = Interpreter::new();
    run(&mut lisp, PRELUDE);
    assert_eq!(run(&mut lisp, "(fact 10)"), "3628800");
    assert_eq!(run(&mut lisp, "(fact 20)"), "2432902008176640000");
    assert_eq!(eval_kind(&mut lisp, "(fact 21)"), ErrorKind::Arithmetic);
}

#[test]
fn higher_order_functions() {
    let mut lisp = Interpreter::new();
    run(&mut lisp, PRELUDE);
    assert_eq!(
        run(&mut lisp, "(map (fn (x) (* x x)) (range 1 6))"),
        "(1 4 9 16 25)"
    );
    assert_eq!(run(&mut lisp, "(fold + 0 (range 0 101))"), "5050");
    assert_eq!(
        run(&mut lisp, "(fold (fn (acc x) (cons x acc)) () '(a b c))"),
        "(c b a)"
    );
}

#[test]
fn long_tail_loop() {
    let mut lisp = Interpreter::with_limits(Limits {
        control: 100,
        resume: 100,
    });
    run(&mut lisp, PRELUDE);
    run(
        &mut lisp,
        "(module-set! 'sum-to (fn (n acc) (if (= n 0) acc (sum-to (- n 1) (+ acc n)))))",
    );
    assert_eq!(run(&mut lisp, "(sum-to 200000 0)"), "20000100000");
}

#[test]
fn closures_capture_their_frame() {
    let mut lisp = Interpreter::new();
    run(
        &mut lisp,
        "(module-set! 'make-counter-from (fn (n) (fn (step) (+ n step))))
         (module-set! 'from-ten (make-counter-from 10))
         (module-set! 'from-hundred (make-counter-from 100))",
    );
    assert_eq!(run(&mut lisp, "(list (from-ten 1) (from-hundred 1))"), "(11 101)");
}

#[test]
fn errors_abort_only_the_failing_form() {
    let mut lisp = Interpreter::new();
    run(&mut lisp, "(module-set! 'kept 1)");

    assert_eq!(eval_kind(&mut lisp, "(head 'oops)"), ErrorKind::Type);
    assert_eq!(eval_kind(&mut lisp, "(nope)"), ErrorKind::Unbound);
    assert_eq!(eval_kind(&mut lisp, "((fn (a) a))"), ErrorKind::Arity);
    assert_eq!(eval_kind(&mut lisp, "(if)"), ErrorKind::Syntax);

    assert_eq!(run(&mut lisp, "kept"), "1");
}

#[test]
fn stack_exhaustion_is_recoverable() {
    let mut lisp = Interpreter::with_limits(Limits {
        control: 500,
        resume: 500,
    });
    run(&mut lisp, PRELUDE);

    assert_eq!(eval_kind(&mut lisp, "(range 0 10000)"), ErrorKind::StackExhausted);
    assert_eq!(run(&mut lisp, "(range 0 3)"), "(0 1 2)");
}

#[test]
fn read_errors_surface_as_parse_errors() {
    let mut lisp = Interpreter::new();
    assert!(matches!(lisp.run_str("(1 2"), Err(Error::Parse(e)) if e.is_incomplete()));
    assert!(matches!(lisp.run_str("'(1 2))"), Err(Error::Parse(_))));
}

#[test]
fn quoted_data_prints_back() {
    let mut lisp = Interpreter::new();
    assert_eq!(
        run(&mut lisp, "'(define \"str\\n\" :key 1.5 (nested . pair))"),
        "(define \"str\\n\" :key 1.5 (nested . pair))"
    );
}

#[test]
fn long_closure_chains_are_released() {
    let mut lisp = Interpreter::new();
    run(
        &mut lisp,
        "(module-set! 'build (fn (n acc) (if (= n 0) acc (build (- n 1) (fn () acc)))))",
    );
    run(&mut lisp, "(module-set! 'chain (build 300000 ()))");
    assert_eq!(run(&mut lisp, "(((chain)))"), "<#Closure ()>");

    run(&mut lisp, "(module-set! 'chain ())");
    assert_eq!(run(&mut lisp, "chain"), "()");
}

#[test]
fn deeply_nested_results_print() {
    let mut lisp = Interpreter::new();
    run(
        &mut lisp,
        "(module-set! 'nest (fn (n acc) (if (= n 0) acc (nest (- n 1) (list acc)))))",
    );

    let text = run(&mut lisp, "(nest 300000 :core)");
    assert_eq!(text.len(), 2 * 300000 + ":core".len());
    assert!(text.starts_with("((((") && text.ends_with(":core))))"));
}

#[test]
fn large_floats_read_back() {
    let mut lisp = Interpreter::new();
    let text = run(&mut lisp, "(* 10000000000.0 10000000000.0)");
    assert_eq!(text, "100000000000000000000.0");
    let check = format!("(= {} (* 10000000000.0 10000000000.0))", text);
    assert_eq!(run(&mut lisp, &check), ":true");
}
