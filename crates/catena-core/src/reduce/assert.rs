//! `assert`, `seq`, `otherwise`: the three predicate-sequencing
//! primitives that sit between ordinary arithmetic and full user-
//! function partial evaluation.
//!
//! Grounded on `original_source/primitive.c`'s `OP(assert)`/`OP(seq)`/
//! `OP(otherwise)`, which all force a predicate/companion argument
//! before deciding whether the primary argument passes through, fails,
//! or is replaced. `assert`/`seq`'s concrete-result path also threads
//! [`crate::cell::Condition`] the way `primitive.c`'s own
//! `add_conditions`/`add_conditions_var` calls do: the result inherits
//! whatever conditions the forced predicate already carried, plus (when
//! the predicate itself is still a variable) a fresh `Condition` for
//! this assertion's own predicate cell, so a value built on top of a
//! deferred assertion keeps recording what gates it.

use crate::altset::AltSet;
use crate::cell::{CellId, Condition, Exclusive, Op, Symbol};
use crate::eval::Engine;
use crate::trace::TraceEvent;

use super::{accumulate, arg_value, install_result, install_variable_result};
use super::{reduce_expr_arg, AltTemplate, Request, Response};

pub fn reduce_assert_family(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let Some(op) = engine.arena.get(*cp).as_expr().map(|e| e.op) else {
        return Response::Fail;
    };
    match op {
        Op::Assert => reduce_assert(engine, cp, req),
        Op::Seq => reduce_seq(engine, cp, req),
        Op::Otherwise => reduce_otherwise(engine, cp, req),
        _ => unreachable!("assert-family handler registered for unrelated op"),
    }
}

fn entry_hint(engine: &Engine, cp: CellId) -> CellId {
    engine
        .arena
        .get(cp)
        .as_expr()
        .and_then(|e| e.entry)
        .unwrap_or(cp)
}

fn record(engine: &mut Engine, cp: CellId, op: Op, args: Vec<CellId>) {
    if !engine.config.trace_enabled {
        return;
    }
    let entry = entry_hint(engine, cp);
    engine.trace.record(TraceEvent {
        entry,
        index: 0,
        op,
        args,
    });
}

/// `assert(value, predicate)`: forces `predicate` under a symbol
/// request first; a concrete `False` is a hard FAIL, a variable
/// predicate records a deferred-assertion trace step but does not by
/// itself fail; `value` is then forced under the caller's own request
/// and, if concrete, passes through unchanged.
fn reduce_assert(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let template = AltTemplate::capture(engine, *cp);

    let (resp_pred, alt_pred) = reduce_expr_arg(engine, *cp, 1, Request::of(Exclusive::Symbol));
    if !resp_pred.is_success() {
        return resp_pred;
    }
    let predicate = arg_value(engine, *cp, 1);
    if !predicate.ty.is_var() && predicate.as_symbol() == Some(Symbol::False) {
        return Response::Fail;
    }

    let (resp_val, alt_val) = reduce_expr_arg(engine, *cp, 0, req);
    if !resp_val.is_success() {
        return resp_val;
    }
    let value = arg_value(engine, *cp, 0);

    let mut alt_set = AltSet::EMPTY;
    if !accumulate(&mut alt_set, &value) || !accumulate(&mut alt_set, &predicate) {
        return Response::Fail;
    }
    let pending = alt_val.map(|s| (0, s)).or_else(|| alt_pred.map(|s| (1, s)));

    let arg0 = engine.arena.get(*cp).as_expr().unwrap().args[0].unwrap();
    let arg1 = engine.arena.get(*cp).as_expr().unwrap().args[1].unwrap();
    if predicate.ty.is_var() {
        record(engine, *cp, Op::Assert, vec![arg0, arg1]);
    }

    if value.ty.is_var() {
        return install_variable_result(
            engine,
            cp,
            template,
            Op::Assert,
            value.ty.exclusive,
            alt_set,
            pending,
            vec![arg0, arg1],
            None,
        );
    }

    let mut result = value;
    result.alt_set = alt_set;
    result.add_conditions(&[&predicate]);
    if predicate.ty.is_var() {
        result.add_condition(Condition {
            entry: entry_hint(engine, *cp),
            predicate: arg1,
        });
    }
    install_result(engine, cp, template, result, pending)
}

/// `seq(a, b)`: structurally identical to [`reduce_assert`] but never
/// fails on a concrete, non-`True` `b` — `b` is forced purely to
/// surface its side conditions, then discarded in favor of `a`.
fn reduce_seq(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let template = AltTemplate::capture(engine, *cp);

    let (resp_b, alt_b) = reduce_expr_arg(engine, *cp, 1, Request::of(Exclusive::Symbol));
    if !resp_b.is_success() {
        return resp_b;
    }
    let b = arg_value(engine, *cp, 1);

    let (resp_a, alt_a) = reduce_expr_arg(engine, *cp, 0, req);
    if !resp_a.is_success() {
        return resp_a;
    }
    let a = arg_value(engine, *cp, 0);

    let mut alt_set = AltSet::EMPTY;
    if !accumulate(&mut alt_set, &a) || !accumulate(&mut alt_set, &b) {
        return Response::Fail;
    }
    let pending = alt_a.map(|s| (0, s)).or_else(|| alt_b.map(|s| (1, s)));

    let arg0 = engine.arena.get(*cp).as_expr().unwrap().args[0].unwrap();
    let arg1 = engine.arena.get(*cp).as_expr().unwrap().args[1].unwrap();
    if b.ty.is_var() {
        record(engine, *cp, Op::Seq, vec![arg0, arg1]);
    }

    if a.ty.is_var() {
        return install_variable_result(
            engine,
            cp,
            template,
            Op::Seq,
            a.ty.exclusive,
            alt_set,
            pending,
            vec![arg0, arg1],
            None,
        );
    }

    let mut result = a;
    result.alt_set = alt_set;
    result.add_conditions(&[&b]);
    if b.ty.is_var() {
        result.add_condition(Condition {
            entry: entry_hint(engine, *cp),
            predicate: arg1,
        });
    }
    install_result(engine, cp, template, result, pending)
}

/// `otherwise(a, b)`: forces `a`; a FAIL or an unresolved variable
/// adopts `b` as the result (with a deferred trace linking the two),
/// while a concrete success of `a` is itself a FAIL — the inverse
/// polarity of [`reduce_assert`].
fn reduce_otherwise(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let (resp_a, _) = reduce_expr_arg(engine, *cp, 0, req);
    match resp_a {
        Response::Delay => Response::Delay,
        Response::Fail => take_b_branch(engine, cp, req),
        Response::Success => {
            let a = arg_value(engine, *cp, 0);
            if a.ty.is_var() {
                take_b_branch(engine, cp, req)
            } else {
                Response::Fail
            }
        }
        Response::Retry => unreachable!("reduce() resolves Retry internally"),
    }
}

fn take_b_branch(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let (resp_b, _) = reduce_expr_arg(engine, *cp, 1, req);
    if !resp_b.is_success() {
        return resp_b;
    }
    let arg0 = engine.arena.get(*cp).as_expr().unwrap().args[0].unwrap();
    let arg1 = engine.arena.get(*cp).as_expr().unwrap().args[1].unwrap();
    record(engine, *cp, Op::Otherwise, vec![arg0, arg1]);

    let Some(expr) = engine.arena.get(*cp).as_expr() else {
        return Response::Fail;
    };
    let Some(adopted) = expr.args[1] else {
        return Response::Fail;
    };
    engine.arena.incref(adopted);
    let old = *cp;
    *cp = adopted;
    engine.arena.drop_cell(old);
    Response::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Exclusive, Op, Symbol, Value};
    use crate::reduce::reduce;

    #[test]
    fn assert_passes_through_on_true_predicate() {
        let mut engine = Engine::new();
        let value = engine.val(Value::int(42));
        let predicate = engine.val(Value::symbol(Symbol::True));
        let mut call = engine.func(Op::Assert, [value, predicate]);
        assert_eq!(reduce(&mut engine, &mut call, Request::ANY), Response::Success);
        assert_eq!(engine.arena().get(call).as_value().unwrap().as_int(), Some(42));
    }

    #[test]
    fn assert_fails_on_false_predicate() {
        let mut engine = Engine::new();
        let value = engine.val(Value::int(42));
        let predicate = engine.val(Value::symbol(Symbol::False));
        let mut call = engine.func(Op::Assert, [value, predicate]);
        assert_eq!(reduce(&mut engine, &mut call, Request::ANY), Response::Fail);
    }

    #[test]
    fn seq_keeps_a_regardless_of_b() {
        let mut engine = Engine::new();
        let a = engine.val(Value::int(7));
        let b = engine.val(Value::symbol(Symbol::False));
        let mut call = engine.func(Op::Seq, [a, b]);
        assert_eq!(reduce(&mut engine, &mut call, Request::ANY), Response::Success);
        assert_eq!(engine.arena().get(call).as_value().unwrap().as_int(), Some(7));
    }

    #[test]
    fn otherwise_adopts_b_when_a_fails() {
        let mut engine = Engine::new();
        let a = engine.val(Value::fail());
        let b = engine.val(Value::int(9));
        let mut call = engine.func(Op::Otherwise, [a, b]);
        assert_eq!(reduce(&mut engine, &mut call, Request::ANY), Response::Success);
        assert_eq!(engine.arena().get(call).as_value().unwrap().as_int(), Some(9));
    }

    #[test]
    fn otherwise_fails_when_a_succeeds_concretely() {
        let mut engine = Engine::new();
        let a = engine.val(Value::int(1));
        let b = engine.val(Value::int(9));
        let mut call = engine.func(Op::Otherwise, [a, b]);
        assert_eq!(reduce(&mut engine, &mut call, Request::ANY), Response::Fail);
    }

    #[test]
    fn assert_with_a_variable_predicate_tags_the_result_with_a_condition() {
        let mut engine = Engine::new();
        let value = engine.val(Value::int(42));
        let dummy_entry = engine.val(Value::int(0));
        let predicate = engine.val(Value::var(Exclusive::Symbol, dummy_entry, 0));
        let mut call = engine.func(Op::Assert, [value, predicate]);
        let original_cp = call;
        assert_eq!(reduce(&mut engine, &mut call, Request::ANY), Response::Success);
        let result = engine.arena().get(call).as_value().unwrap();
        assert_eq!(result.as_int(), Some(42));
        assert_eq!(result.conditions.len(), 1);
        assert_eq!(result.conditions[0].predicate, predicate);
        assert_eq!(result.conditions[0].entry, original_cp);
    }

    #[test]
    fn conditions_propagate_through_a_later_seq_over_the_same_value() {
        let mut engine = Engine::new();
        let value = engine.val(Value::int(42));
        let dummy_entry = engine.val(Value::int(0));
        let predicate = engine.val(Value::var(Exclusive::Symbol, dummy_entry, 0));
        let mut asserted = engine.func(Op::Assert, [value, predicate]);
        assert_eq!(reduce(&mut engine, &mut asserted, Request::ANY), Response::Success);

        let harmless = engine.val(Value::symbol(Symbol::True));
        let mut seqd = engine.func(Op::Seq, [asserted, harmless]);
        assert_eq!(reduce(&mut engine, &mut seqd, Request::ANY), Response::Success);
        let result = engine.arena().get(seqd).as_value().unwrap();
        assert_eq!(result.as_int(), Some(42));
        assert_eq!(result.conditions.len(), 1);
        assert_eq!(result.conditions[0].predicate, predicate);
    }
}
