//! End-to-end scenarios from spec.md §8, driven through the public
//! `Engine::eval` entry point the way a (not-yet-implemented) parser
//! would hand off a finished program, using [`support::ClosureBuilder`]
//! to stand in for that parser.

mod support;

use catena_core::cell::{Cell, Condition, Exclusive, Expr, Op, Value};
use catena_core::eval::Engine;
use support::ClosureBuilder;

#[test]
fn addition_evaluates_to_a_single_root() {
    let mut engine = Engine::new();
    let mut b = ClosureBuilder::new(&mut engine);
    let one = b.int(1);
    let two = b.int(2);
    let add = b.apply(Op::Add, [one, two]);
    let out = b.eval(vec![add]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(b.int_of(out[0]), 3);
}

#[test]
fn nondeterministic_choice_enumerates_both_alternates() {
    let mut engine = Engine::new();
    let mut b = ClosureBuilder::new(&mut engine);
    let one = b.int(1);
    let two = b.int(2);
    let choice = b.apply(Op::Alt, [one, two]);
    let three = b.int(3);
    let add = b.apply(Op::Add, [choice, three]);
    let out = b.eval(vec![add]).unwrap();
    let values: Vec<i64> = out.iter().map(|&id| b.int_of(id)).collect();
    assert_eq!(values, vec![4, 5]);
}

#[test]
fn division_by_zero_reduces_to_the_fail_value() {
    let mut engine = Engine::new();
    let mut b = ClosureBuilder::new(&mut engine);
    let five = b.int(5);
    let zero = b.int(0);
    let div = b.apply(Op::Div, [five, zero]);
    let out = b.eval(vec![div]).unwrap();
    assert_eq!(out.len(), 1);
    assert!(b.is_fail(out[0]));
}

#[test]
fn assert_on_a_false_predicate_fails() {
    let mut engine = Engine::new();
    let mut b = ClosureBuilder::new(&mut engine);
    let one = b.int(1);
    let two = b.int(2);
    let predicate = b.apply(Op::Eq, [one, two]);
    let value = b.int(42);
    let assertion = b.apply(Op::Assert, [value, predicate]);
    let out = b.eval(vec![assertion]).unwrap();
    assert_eq!(out.len(), 1);
    assert!(b.is_fail(out[0]));
}

#[test]
fn quote_application_pushes_a_value_through_a_single_step() {
    let mut engine = Engine::new();
    let mut b = ClosureBuilder::new(&mut engine);
    let quote = b.quote_fixed_left(Op::Add, 1);
    let ten = b.int(10);
    let ap = b.apply(Op::Ap, [ten, quote]);
    let out = b.eval(vec![ap]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(b.int_of(out[0]), 11);
}

#[test]
fn compose_then_apply_runs_the_left_quote_first() {
    let mut engine = Engine::new();
    let mut b = ClosureBuilder::new(&mut engine);
    let left = b.quote_fixed_left(Op::Add, 1);
    let right = b.quote_fixed_left(Op::Mul, 2);
    let composed = b.apply(Op::Compose, [left, right]);
    let three = b.int(3);
    let ap = b.apply(Op::Ap, [three, composed]);
    let out = b.eval(vec![ap]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(b.int_of(out[0]), 8);
}

#[test]
fn int_float_round_trip_preserves_the_input() {
    let mut engine = Engine::new();
    let mut b = ClosureBuilder::new(&mut engine);
    let seven = b.int(7);
    let to_f = b.apply(Op::ToFloat, [seven]);
    let trunc = b.apply(Op::Trunc, [to_f]);
    let out = b.eval(vec![trunc]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(b.int_of(out[0]), 7);
}

#[test]
fn incomplete_root_is_a_fatal_error_not_a_fail_value() {
    let mut engine = Engine::new();
    let partial = engine.arena_mut().alloc(Cell::new_expr(Expr::new(Op::Add, 2)));
    let err = engine.eval(vec![partial]).unwrap_err();
    assert!(matches!(err, catena_core::EvalError::Incomplete(_)));
}

#[test]
fn straight_line_user_function_expands_and_reduces() {
    use catena_core::builder::EntryBuilder;

    let mut engine = Engine::new();
    let mut eb = EntryBuilder::declare(&mut engine, "double", 1, 1);
    let p0 = eb.param(&mut engine, 0);
    let p1 = eb.param(&mut engine, 0);
    let sum = eb.apply(&mut engine, Op::Add, vec![p0, p1]);
    eb.ret(&mut engine, vec![sum], 0);
    let entry = eb.finish(&mut engine, false);

    let mut b = ClosureBuilder::new(&mut engine);
    let arg = b.int(21);
    let call = b.engine.call_entry(entry, [arg]);
    let out = b.eval(vec![call]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(b.int_of(out[0]), 42);
}

#[test]
fn assert_with_a_resolved_variable_predicate_records_a_condition() {
    let mut engine = Engine::new();
    let mut b = ClosureBuilder::new(&mut engine);
    let value = b.int(99);
    let dummy_entry = b.int(0);
    let predicate = b.engine.val(Value::var(Exclusive::Symbol, dummy_entry, 0));
    let assertion = b.apply(Op::Assert, [value, predicate]);
    let out = b.eval(vec![assertion]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(b.int_of(out[0]), 99);
    let result = b.engine.arena().get(out[0]).as_value().unwrap();
    assert_eq!(result.conditions.len(), 1);
    assert_eq!(
        result.conditions[0],
        Condition {
            entry: assertion,
            predicate,
        }
    );
}
