//! Stack-shuffling primitives: `id`, `dup`, `swap`, `drop`, and `|`
//! (nondeterministic choice) — spec.md §4.E's control-op family — plus
//! [`reduce_dep`], the generic resolution step every multi-output
//! operator's secondary results share (GLOSSARY "Dep": "linked back to
//! its parent via the first argument").
//!
//! Grounded on `original_source/primitive.c`'s `OP(id)`/`OP(dup)`/
//! `OP(swap)`/`OP(drop)`/`OP(alt)`: none of these force their arguments
//! to a concrete type — they are zero-cost graph rewrites, which is why
//! they live apart from the five-step argument-forcing protocol in
//! [`super::arith`]/[`super::compare`].

use crate::altset::AltSet;
use crate::cell::{CellId, Expr, Op, Payload};
use crate::eval::Engine;
use crate::reduce::{Request, Response};

fn sole_arg(engine: &Engine, cp: CellId) -> Option<CellId> {
    engine.arena.get(cp).as_expr().and_then(|e| e.args[0])
}

/// `id`: spec.md §4.E. An `id` closure with no alt-set bias of its own
/// and no pending sibling alternate is purely a wrapper and collapses
/// to its argument directly (no forcing at all). Otherwise it forces
/// the argument under the caller's request and unions its own bias
/// into whatever value comes back, attaching its own sibling alternate
/// onto the result's chain.
pub fn reduce_id(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let Some(arg) = sole_arg(engine, *cp) else {
        return Response::Fail;
    };
    let cell = engine.arena.get(*cp);
    let own_alt_set = cell.as_expr().map_or(AltSet::EMPTY, |e| e.alt_set);
    let sibling = cell.alt;

    if own_alt_set.is_empty() && sibling.is_none() {
        engine.arena.incref(arg);
        let old = *cp;
        *cp = arg;
        engine.arena.drop_cell(old);
        return Response::Retry;
    }

    let mut local = arg;
    let response = crate::reduce::reduce(engine, &mut local, req);
    if !response.is_success() {
        return response;
    }
    let Some(mut value) = engine.arena.get(local).as_value().cloned() else {
        return Response::Fail;
    };
    if AltSet::conflict(value.alt_set, own_alt_set) {
        engine.arena.drop_cell(local);
        return Response::Fail;
    }
    value.alt_set = AltSet::union(value.alt_set, own_alt_set);
    let new_id = engine.val(value);
    if let Some(sib) = sibling {
        engine.arena.incref(sib);
        engine.arena.get_mut(new_id).alt = Some(sib);
    }
    engine.arena.drop_cell(local);
    let old = *cp;
    *cp = new_id;
    engine.arena.drop_cell(old);
    Response::Success
}

/// `drop a b`: keeps `a`, discards `b` — `WORD("drop", drop, 2, 1)` in
/// the original. A pure pointer rewrite; neither argument is forced.
pub fn reduce_drop(engine: &mut Engine, cp: &mut CellId, _req: Request) -> Response {
    let Some(expr) = engine.arena.get(*cp).as_expr() else {
        return Response::Fail;
    };
    let Some(kept) = expr.args[0] else {
        return Response::Fail;
    };
    let discarded = expr.args.get(1).copied().flatten();
    engine.arena.incref(kept);
    if let Some(discarded) = discarded {
        engine.arena.drop_cell(discarded);
    }
    let old = *cp;
    *cp = kept;
    engine.arena.drop_cell(old);
    Response::Retry
}

/// `dup a`: the primary result becomes `a` itself; the one pre-built
/// dep cell becomes a second, independently-refcounted handle on the
/// same `a` (spec.md §4.E: "creates a lazy dep that shares the first
/// argument").
pub fn reduce_dup(engine: &mut Engine, cp: &mut CellId, _req: Request) -> Response {
    let Some(expr) = engine.arena.get(*cp).as_expr().cloned() else {
        return Response::Fail;
    };
    let Some(arg) = expr.args[0] else {
        return Response::Fail;
    };
    let Some(&dep) = expr.deps.first() else {
        return Response::Fail;
    };

    engine.arena.incref(arg);
    engine.arena.rewrite(dep, Payload::Expr(id_expr(arg)));

    let old = *cp;
    *cp = engine.id(arg);
    engine.arena.drop_cell(old);
    Response::Retry
}

/// `swap a b`: the primary result becomes `b`, the dep becomes `a` —
/// the two outputs trade places (`WORD("swap", swap, 2, 2)`).
pub fn reduce_swap(engine: &mut Engine, cp: &mut CellId, _req: Request) -> Response {
    let Some(expr) = engine.arena.get(*cp).as_expr().cloned() else {
        return Response::Fail;
    };
    let (Some(a), Some(b)) = (expr.args[0], expr.args[1]) else {
        return Response::Fail;
    };
    let Some(&dep) = expr.deps.first() else {
        return Response::Fail;
    };

    engine.arena.incref(a);
    engine.arena.rewrite(dep, Payload::Expr(id_expr(a)));

    let old = *cp;
    *cp = engine.id(b);
    engine.arena.drop_cell(old);
    Response::Retry
}

/// `|`: splits into two `id`-wrapped alternates, each biased by one
/// branch of a freshly allocated alt-set field, linked head-to-tail via
/// `alt` (spec.md §4.E). Fails as an ordinary, recoverable `Response::Fail`
/// rather than panicking when the alt-id space is exhausted (spec.md's
/// "Alt-set width" note, SPEC_FULL.md's `[MODULE: altset]`): `Delay`
/// would be wrong here since nothing ever reclaims a field id mid-eval
/// (see [`crate::altset::AltIdAllocator::reset`]), so a starved `|` would
/// just re-enqueue forever until `delay_limit` gave up on it instead of
/// failing this one branch and letting the rest of the program proceed.
pub fn reduce_alt_op(engine: &mut Engine, cp: &mut CellId, _req: Request) -> Response {
    let Some(expr) = engine.arena.get(*cp).as_expr() else {
        return Response::Fail;
    };
    let (Some(lhs), Some(rhs)) = (expr.args[0], expr.args[1]) else {
        return Response::Fail;
    };
    let Some(field) = engine.alt_ids.try_alloc(1) else {
        return Response::Fail;
    };

    engine.arena.incref(lhs);
    let mut r0 = id_expr(lhs);
    r0.alt_set = AltSet::branch(field, 0);
    let r0 = engine.arena_mut().alloc(crate::cell::Cell::new_expr(r0));

    engine.arena.incref(rhs);
    let mut r1 = id_expr(rhs);
    r1.alt_set = AltSet::branch(field, 1);
    let r1 = engine.arena_mut().alloc(crate::cell::Cell::new_expr(r1));

    engine.arena.get_mut(r0).alt = Some(r1);

    let old = *cp;
    *cp = r0;
    engine.arena.drop_cell(old);
    Response::Retry
}

/// Resolves a `Dep` cell: forces its owner to run (which, on its first
/// dispatch, rewrites this very cell's payload via
/// [`crate::arena::Arena::rewrite`] before transforming itself), then
/// retries dispatch on whatever that rewrite installed.
pub fn reduce_dep(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let Some(owner) = sole_arg(engine, *cp) else {
        return Response::Fail;
    };
    let mut owner_local = owner;
    match crate::reduce::reduce(engine, &mut owner_local, Request::ANY) {
        Response::Delay => Response::Delay,
        Response::Fail => Response::Fail,
        Response::Success => {
            // The owner's handler already rewrote `*cp` in place via
            // `Arena::rewrite` during its own first dispatch; dispatch
            // again on whatever it installed.
            let _ = req;
            Response::Retry
        }
        Response::Retry => unreachable!("reduce() resolves Retry internally"),
    }
}

fn id_expr(arg: CellId) -> Expr {
    let mut expr = Expr::new(Op::Id, 1);
    expr.fill_next(arg);
    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Value;
    use crate::reduce::reduce;

    #[test]
    fn swap_exchanges_outputs() {
        let mut engine = Engine::new();
        let a = engine.val(Value::int(1));
        let b = engine.val(Value::int(2));
        let (mut owner, deps) = engine.func_multi(Op::Swap, [a, b], 1);
        let mut dep = deps[0];

        assert_eq!(reduce(&mut engine, &mut owner, Request::ANY), Response::Success);
        assert_eq!(engine.arena().get(owner).as_value().unwrap().as_int(), Some(2));

        assert_eq!(reduce(&mut engine, &mut dep, Request::ANY), Response::Success);
        assert_eq!(engine.arena().get(dep).as_value().unwrap().as_int(), Some(1));
    }

    #[test]
    fn dup_shares_the_same_argument_on_both_outputs() {
        let mut engine = Engine::new();
        let a = engine.val(Value::int(7));
        let (mut owner, deps) = engine.func_multi(Op::Dup, [a], 1);
        let mut dep = deps[0];

        assert_eq!(reduce(&mut engine, &mut owner, Request::ANY), Response::Success);
        assert_eq!(reduce(&mut engine, &mut dep, Request::ANY), Response::Success);
        assert_eq!(engine.arena().get(owner).as_value().unwrap().as_int(), Some(7));
        assert_eq!(engine.arena().get(dep).as_value().unwrap().as_int(), Some(7));
    }

    #[test]
    fn alt_produces_two_alternates() {
        let mut engine = Engine::new();
        let one = engine.val(Value::int(1));
        let two = engine.val(Value::int(2));
        let mut choice = engine.func(Op::Alt, [one, two]);
        assert_eq!(reduce(&mut engine, &mut choice, Request::ANY), Response::Success);
        let collapsed = reduce_alt_chain_for_test(&mut engine, choice);
        assert_eq!(collapsed, vec![1, 2]);
    }

    fn reduce_alt_chain_for_test(engine: &mut Engine, id: CellId) -> Vec<i64> {
        let full = crate::reduce::reduce_alt(engine, id);
        let mut out = vec![engine.arena().get(full).as_value().unwrap().as_int().unwrap()];
        let mut cursor = engine.arena().get(full).alt;
        while let Some(c) = cursor {
            out.push(engine.arena().get(c).as_value().unwrap().as_int().unwrap());
            cursor = engine.arena().get(c).alt;
        }
        out
    }

    #[test]
    fn alt_fails_instead_of_delaying_once_the_field_space_is_exhausted() {
        use crate::config::EngineConfig;

        let mut engine = Engine::with_config(EngineConfig::default().with_max_alt_ids(0));
        let one = engine.val(Value::int(1));
        let two = engine.val(Value::int(2));
        let mut choice = engine.func(Op::Alt, [one, two]);
        assert_eq!(reduce(&mut engine, &mut choice, Request::ANY), Response::Fail);
    }

    #[test]
    fn drop_keeps_first_argument() {
        let mut engine = Engine::new();
        let kept = engine.val(Value::int(9));
        let discarded = engine.val(Value::int(0));
        let mut closure = engine.func(Op::Drop, [kept, discarded]);
        assert_eq!(reduce(&mut engine, &mut closure, Request::ANY), Response::Success);
        assert_eq!(engine.arena().get(closure).as_value().unwrap().as_int(), Some(9));
    }
}
