//! User-function expansion, spec.md §4.H: turning a compiled [`Entry`]'s
//! body template into fresh cells at a call site.
//!
//! Grounded on `original_source/user_func.c`'s body-copying expansion and
//! `rt_types.h`'s `struct entry` (`rec`, `initial`, `parent`). The
//! retrieved pack stops short of the full substitution-based unification
//! machinery `user_func.c` builds around `initial_word` (rewriting every
//! recursive occurrence's call shape against the outermost one); rather
//! than port a partial reconstruction of that, this module keeps the
//! narrower guarantee spec.md §4.H step 2 actually requires of a caller —
//! a call that loops back into an entry still mid-expansion never
//! recurses unboundedly, and every such occurrence is attributed back to
//! the *same* outer call site rather than minted as a fresh unknown each
//! time:
//!
//! - [`crate::eval::Engine::expanding`] tracks which entries are
//!   mid-expansion on the current `reduce` pass (pushed in
//!   [`reduce_exec`], popped by [`crate::reduce::reduce`] once that
//!   pass's whole `Retry` chain — not just this one `expand_call` —
//!   resolves), so a cycle through two or more distinct entries that
//!   never leaves a single `reduce_loop` iteration is caught exactly
//!   like self-recursion is;
//! - [`Entry::initial`] records the `CellId` of the call that *first*
//!   opened this entry's current expansion; a reentrant call folds to a
//!   variable tagged with that id via `install_variable_result`'s
//!   `entry_override`, the narrowed form of unification this module
//!   implements (same entry handle in, same variable identity out,
//!   without substituting the recorded call shape).
//!
//! Ordinary recursion over concrete arguments doesn't hit either guard:
//! each body is built lazily (unreduced), so a recursive call unfolds
//! one frame per later force — each such force is its own top-level
//! `reduce` call, so `expanding` is empty again by the time it runs —
//! the same way any other lazy recursive evaluator terminates at its
//! base case.

use rustc_hash::FxHashMap;

use crate::altset::AltSet;
use crate::cell::{BodyOp, Cell, CellId, Entry, Exclusive, Expr, Op, Payload, TypeFlags, Value};
use crate::eval::Engine;

use super::{accumulate, arg_value, install_result, install_variable_result};
use super::{reduce_expr_arg, AltTemplate, Request, Response};

pub fn reduce_exec(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let Some(entry_id) = engine.arena.get(*cp).as_expr().and_then(|e| e.entry) else {
        return Response::Fail;
    };
    let being_compiled = engine
        .arena
        .get(entry_id)
        .as_entry()
        .map_or(true, Entry::is_being_compiled);
    let depth = engine.recursion_depth;
    let reentrant = engine
        .expanding
        .iter()
        .any(|&(id, pushed_at)| id == entry_id && pushed_at == depth);

    if being_compiled || reentrant {
        return reduce_as_variable(engine, cp, req, entry_id);
    }

    if let Some(entry) = engine.arena.get_mut(entry_id).as_entry_mut()
        && entry.initial.is_none()
    {
        entry.initial = Some(*cp);
    }
    engine.expanding.push((entry_id, depth));
    expand_call(engine, cp, entry_id)
}

/// Step 1's partial-evaluation fallback: every argument is forced (its
/// concrete value isn't needed, only that it resolves and contributes
/// its alt-set), and the call collapses to a fresh variable — tagged
/// with the entry's recorded `initial` call site when this is a
/// reentrant call, so every recursive occurrence unifies onto the same
/// variable identity rather than minting a fresh one per occurrence
/// (spec.md §4.H step 2).
fn reduce_as_variable(
    engine: &mut Engine,
    cp: &mut CellId,
    req: Request,
    entry_id: CellId,
) -> Response {
    let entry_override = engine.arena.get(entry_id).as_entry().and_then(|e| e.initial);
    let template = AltTemplate::capture(engine, *cp);
    let arity = engine.arena.get(*cp).as_expr().map_or(0, |e| e.args.len());

    let mut alt_set = AltSet::EMPTY;
    let mut pending = None;
    let mut arg_ids = Vec::with_capacity(arity);
    for idx in 0..arity {
        let (resp, alt) = reduce_expr_arg(engine, *cp, idx, Request::ANY);
        if !resp.is_success() {
            return resp;
        }
        if pending.is_none() {
            pending = alt.map(|s| (idx, s));
        }
        let value = arg_value(engine, *cp, idx);
        if !accumulate(&mut alt_set, &value) {
            return Response::Fail;
        }
        arg_ids.push(engine.arena.get(*cp).as_expr().unwrap().args[idx].unwrap());
    }

    let _ = req;
    install_variable_result(
        engine,
        cp,
        template,
        Op::Exec,
        Exclusive::Any,
        alt_set,
        pending,
        arg_ids,
        entry_override,
    )
}

fn id_expr(arg: CellId) -> Expr {
    let mut expr = Expr::new(Op::Id, 1);
    expr.fill_next(arg);
    expr
}

/// Steps 2-5: copies `entry`'s body into fresh cells bound to the call's
/// own argument cells, installs each [`crate::cell::BodyOp::Return`] as
/// a branch of an `alt` chain headed by the primary result, wires the
/// first return's extra values into the call's pre-built output deps,
/// and retries dispatch on the chain's head.
///
/// Simplification (documented in DESIGN.md): only the *first* return's
/// extra output values are wired into the call's deps. A later branch
/// producing a different number of outputs than the first is a
/// malformed body by construction (the compiler, out of scope, is
/// responsible for each branch agreeing on output arity) and isn't
/// re-validated here.
fn expand_call(engine: &mut Engine, cp: &mut CellId, entry_id: CellId) -> Response {
    let Some(body) = engine.arena.get(entry_id).as_entry().map(|e| e.body.clone()) else {
        return Response::Fail;
    };
    let Some(arg_ids) = engine.arena.get(*cp).as_expr().map(|e| {
        e.args
            .iter()
            .map(|a| a.expect("Exec cell must be fully applied before reduction"))
            .collect::<Vec<_>>()
    }) else {
        return Response::Fail;
    };
    let deps = engine
        .arena
        .get(*cp)
        .as_expr()
        .map_or_else(Default::default, |e| e.deps.clone());

    let return_count = body
        .iter()
        .filter(|op| matches!(op, BodyOp::Return { .. }))
        .count();
    if return_count == 0 {
        return Response::Fail;
    }

    // One fresh alt-set field per distinct static branch label, shared
    // by every Return that names it, allocated up front so a starved
    // allocator can bail before any cell is built. Exhaustion surfaces
    // as an ordinary `Response::Fail`, not `Delay`: nothing reclaims a
    // field id mid-eval (`AltIdAllocator::reset` is only safe once every
    // value using the old ids has fully reduced away), so `Delay` would
    // just re-enqueue this call forever instead of letting it fail and
    // the rest of the program proceed — spec.md §7 classes alt-set
    // exhaustion among the local, recoverable conditions.
    let mut field_for: FxHashMap<u32, u32> = FxHashMap::default();
    if return_count > 1 {
        for op in &body {
            if let BodyOp::Return { alt_id, .. } = op
                && !field_for.contains_key(alt_id)
            {
                let Some(field) = engine.alt_ids.try_alloc(1) else {
                    return Response::Fail;
                };
                field_for.insert(*alt_id, field);
            }
        }
    }

    let mut locals: Vec<Option<CellId>> = Vec::with_capacity(body.len());
    let mut returns: Vec<CellId> = Vec::with_capacity(return_count);
    let mut branch_used: FxHashMap<u32, u8> = FxHashMap::default();
    let mut first_extras_wired = false;

    for op in &body {
        match op {
            BodyOp::Param(n) => {
                let arg = arg_ids[*n as usize];
                engine.arena.incref(arg);
                locals.push(Some(arg));
            }
            BodyOp::Apply { op, args } => {
                let mut expr = Expr::new(*op, args.len());
                for &idx in args {
                    let operand = locals[idx].expect("body references a prior step");
                    engine.arena.incref(operand);
                    expr.fill_next(operand);
                }
                let id = engine.arena_mut().alloc(Cell::new_expr(expr));
                locals.push(Some(id));
            }
            BodyOp::Call { entry, args } => {
                let target_in = engine.arena.get(*entry).as_entry().map_or(0, |e| e.arity_in);
                let mut expr = Expr::new(Op::Exec, target_in as usize);
                for &idx in args {
                    let operand = locals[idx].expect("body references a prior step");
                    engine.arena.incref(operand);
                    expr.fill_next(operand);
                }
                engine.arena.incref(*entry);
                expr.entry = Some(*entry);
                let ready = expr.is_ready();
                let call_id = engine.arena_mut().alloc(Cell::new_expr(expr));
                let id = if ready {
                    call_id
                } else {
                    engine.arena.incref(call_id);
                    let mut quote = Value::list(smallvec::smallvec![call_id]);
                    quote.ty.flags = quote.ty.flags.set(TypeFlags::ROW);
                    engine.val(quote)
                };
                locals.push(Some(id));
            }
            BodyOp::Return { values, alt_id } => {
                let primary = locals[values[0]].expect("return references a prior step");
                engine.arena.incref(primary);

                if !first_extras_wired {
                    for (dep, &idx) in deps.iter().zip(values[1..].iter()) {
                        let value = locals[idx].expect("return references a prior step");
                        engine.arena.incref(value);
                        engine.arena.rewrite(*dep, Payload::Expr(id_expr(value)));
                    }
                    first_extras_wired = true;
                }

                let mut wrapped = id_expr(primary);
                if let Some(&field) = field_for.get(alt_id) {
                    let branch = branch_used.entry(*alt_id).or_insert(0);
                    wrapped.alt_set = AltSet::branch(field, (*branch).min(1));
                    *branch = (*branch + 1).min(1);
                }
                let id = engine.arena_mut().alloc(Cell::new_expr(wrapped));
                returns.push(id);
                locals.push(None);
            }
        }
    }

    for pair in returns.windows(2) {
        engine.arena.get_mut(pair[0]).alt = Some(pair[1]);
    }
    let chain = returns[0];

    let old = *cp;
    *cp = chain;
    engine.arena.drop_cell(old);
    Response::Retry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EntryBuilder;
    use crate::reduce::reduce;

    /// `loop() = loop()`: a nullary call whose only return is itself, with
    /// no base case at all. Every step here is a zero-cost `Retry`
    /// rewrite (the `Exec` expansion, then `id`'s transparent collapse),
    /// so it never leaves the first `reduce_loop` pass and never touches
    /// `recursion_depth` — exactly the case `engine.expanding`'s
    /// depth-paired reentrancy check exists to catch.
    #[test]
    fn unbounded_self_tail_recursion_terminates_via_reentrant_fallback() {
        let mut engine = Engine::new();
        let mut b = EntryBuilder::declare(&mut engine, "loop", 0, 1);
        let loop_id = b.id();
        let call = b.call(&mut engine, loop_id, vec![]);
        b.ret(&mut engine, vec![call], 0);
        let entry = b.finish(&mut engine, true);

        let mut cell = engine.call_entry(entry, Vec::<CellId>::new());
        let resp = reduce(&mut engine, &mut cell, Request::ANY);
        // Falls back to a variable rather than recursing forever.
        assert_eq!(resp, Response::Success);
        assert!(engine.arena().get(cell).as_value().unwrap().ty.is_var());
    }

    /// `double(n) = n + n`; `doubled_twice(n) = double(n) + double(n)`.
    /// Two genuinely nested (non-reentrant) calls to the same callee,
    /// each forced while computing the other's sibling operand — a
    /// regression check that ordinary call nesting still computes a
    /// concrete value after moving `expanding`'s push out of
    /// `expand_call` and into `reduce_exec`.
    #[test]
    fn nested_calls_to_the_same_callee_both_still_expand() {
        let mut engine = Engine::new();
        let mut d = EntryBuilder::declare(&mut engine, "double", 1, 1);
        let p0 = d.param(&mut engine, 0);
        let p1 = d.param(&mut engine, 0);
        let sum = d.apply(&mut engine, Op::Add, vec![p0, p1]);
        d.ret(&mut engine, vec![sum], 0);
        let double = d.finish(&mut engine, false);

        let mut o = EntryBuilder::declare(&mut engine, "doubled_twice", 1, 1);
        let n = o.param(&mut engine, 0);
        let call_a = o.call(&mut engine, double, vec![n]);
        let n2 = o.param(&mut engine, 0);
        let call_b = o.call(&mut engine, double, vec![n2]);
        let total = o.apply(&mut engine, Op::Add, vec![call_a, call_b]);
        o.ret(&mut engine, vec![total], 0);
        let doubled_twice = o.finish(&mut engine, false);

        let arg = engine.val(Value::int(5));
        let mut call = engine.call_entry(doubled_twice, [arg]);
        let resp = reduce(&mut engine, &mut call, Request::of(Exclusive::Int));
        assert_eq!(resp, Response::Success);
        assert_eq!(engine.arena().get(call).as_value().unwrap().as_int(), Some(20));
    }
}
