//! First-class continuation behaviour: capture, escape, reuse, and
//! interaction with intrinsic argument evaluation.

use pretty_assertions::assert_eq;
use rill::{CollectConsole, Interpreter, NoConsole};

fn run(source: &str) -> String {
    let mut interpreter = Interpreter::with_defaults(source).unwrap();
    interpreter.execute(&mut NoConsole).unwrap();
    interpreter.value()
}

#[test]
fn invoking_inside_the_receiver_discards_the_rest_of_its_body() {
    assert_eq!(run("(callcc lambda (k) { [(k 1) 2] })"), "1");
}

#[test]
fn normal_return_from_the_receiver_is_the_call_value() {
    assert_eq!(run("(callcc lambda (k) { 7 })"), "7");
}

#[test]
fn resumes_into_pending_intrinsic_arguments() {
    // the capture happens while `add` still waits for its second argument
    assert_eq!(run("(add 1 (callcc lambda (k) { (k 2) }))"), "3");
}

#[test]
fn escapes_past_every_intermediate_frame() {
    let source = "letrec (
        f = lambda (n) { if (eq n 0) then (Out 99) else (f (sub n 1)) }
    ) { (add 1000 (callcc lambda (Out) { (f 5) })) }";
    assert_eq!(run(source), "1099");
}

#[test]
fn a_stored_continuation_can_be_invoked_after_capture() {
    // first pass binds the continuation; invoking it re-runs the letrec body
    // with the passed value sitting in the binding's cell
    let source = "letrec (r = (callcc lambda (k) { k })) {
        if (iscont r) then (r 5) else r
    }";
    assert_eq!(run(source), "5");
}

#[test]
fn reentry_replays_side_effects_after_the_capture_point() {
    let source = r#"letrec (k = (callcc lambda (c) { c })) {
        if (iscont k) then [ (put "first ") (k 1) ] else [ (put "second") k ]
    }"#;
    let mut console = CollectConsole::new();
    let mut interpreter = Interpreter::with_defaults(source).unwrap();
    interpreter.execute(&mut console).unwrap();
    assert_eq!(console.output(), "first second");
    assert_eq!(interpreter.value(), "1");
}

#[test]
fn continuations_are_recognised_by_iscont() {
    assert_eq!(run("(iscont (callcc lambda (k) { k }))"), "1");
    assert_eq!(run("(iscont 1)"), "0");
    assert_eq!(run("(isclo (callcc lambda (k) { lambda () { k } }))"), "1");
}
