//! Row-polymorphic quotation composition and application: the `.`
//! (`compose`) and `ap` primitives, spec.md §4.F.
//!
//! Grounded on `original_source/primitive.c`'s `func_compose_ap` and the
//! `compose_in`/`compose_out` arity formulas it documents, reworked from
//! first principles per spec.md §9's invitation to drop the undocumented
//! `HACK force lists on tail calls` and the `pos`-field heuristics rather
//! than port them: the retrieved `original_source/` stops at
//! `primitive.c`/`user_func.c` and never includes the `compose()`/
//! `list_next()`/`placeholder_extend()` list-splice helpers those call
//! into, so there is nothing to port for the low-level list mechanics
//! either. What's reconstructed here keeps the properties spec.md §4.F
//! and §8 actually pin down:
//!
//! - a quote is a [`Value::list`] of single-hole transformer closures,
//!   each consuming one pushed value and producing one result (the shape
//!   a bracketed two-token word like `[1 +]` compiles to), so each
//!   operand's own `(in, out)` arity (`quote_arity` below) is always at
//!   most one open input — the generalization to arbitrary per-element
//!   arity that PoprC's quotations allow is the first-principles
//!   simplification DESIGN.md records for this module; `compose_in`/
//!   `compose_out` are still implemented and exercised against this
//!   arity, just over a narrower domain than PoprC's;
//! - `compose(left, right)` is concatenation of their element lists,
//!   padded first (`placeholder_extend`) to the arity `compose_in`/
//!   `compose_out` compute for the requested shape, so that applying the
//!   composed quote runs `left`'s elements then `right`'s in order — the
//!   row convention spec.md §8's worked example fixes (`(3+1)*2=8`);
//! - `ap` folds a pushed value through a quote's elements left to right,
//!   each element's result feeding the next, stopping (and returning a
//!   shorter residual quote) at the first still-open [`is_placeholder`]
//!   slot — this is how a quote that needs more than one pushed value
//!   curries instead of running early.

use smallvec::SmallVec;

use crate::altset::AltSet;
use crate::cell::{Cell, CellId, Exclusive, Expr, Op, TypeFlags, Value, ValuePayload};
use crate::eval::Engine;
use crate::shape;

use super::{accumulate, install_result, reduce_expr_arg, AltTemplate, Request, Response};

pub fn reduce_compose(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let Some(op) = engine.arena.get(*cp).as_expr().map(|e| e.op) else {
        return Response::Fail;
    };
    let row = op == Op::Compose;
    let template = AltTemplate::capture(engine, *cp);

    let (resp_right, alt_right) = reduce_expr_arg(engine, *cp, 1, Request::of(Exclusive::List));
    if !resp_right.is_success() {
        return resp_right;
    }

    if row {
        let (resp_left, alt_left) = reduce_expr_arg(engine, *cp, 0, Request::of(Exclusive::List));
        if !resp_left.is_success() {
            return resp_left;
        }
        return finish_compose(engine, cp, req, template, alt_left, alt_right);
    }

    let (resp_value, alt_value) = reduce_expr_arg(engine, *cp, 0, Request::ANY);
    if !resp_value.is_success() {
        return resp_value;
    }
    finish_ap(engine, cp, req, template, alt_value, alt_right)
}

/// A quote's `(in, out)` arity for composition purposes (spec.md §4.F's
/// `a_in`/`a_out`, `b_in`/`b_out`): a leading element that is either the
/// row placeholder itself or an unfilled transformer awaiting its one
/// push counts as one open input; every element after it is one output
/// slot once reduced.
fn quote_arity(engine: &Engine, items: &[CellId]) -> (u16, u16) {
    let Some(&first) = items.first() else {
        return (0, 0);
    };
    let needs_input = shape::is_placeholder(&engine.arena, first)
        || engine
            .arena
            .get(first)
            .as_expr()
            .is_some_and(|e| !e.is_ready());
    if needs_input {
        (1, (items.len() - 1) as u16)
    } else {
        (0, items.len() as u16)
    }
}

/// spec.md §4.F: `compose_in(req_in) = max(0, req_in − b_in) + b_out +
/// a_in` — the composed quote's required input arity so a caller
/// wanting `req_in` inputs out of the whole composition gets them.
fn compose_in(req_in: u16, b_in: u16, b_out: u16, a_in: u16) -> u16 {
    req_in.saturating_sub(b_in) + b_out + a_in
}

/// spec.md §4.F: `compose_out(a_in, out) = b_in + max(0, out − b_out) −
/// a_in` — the composed quote's resulting output arity for a caller
/// wanting `req_out` outputs.
fn compose_out(b_in: u16, req_out: u16, b_out: u16, a_in: u16) -> u16 {
    (b_in + req_out.saturating_sub(b_out)).saturating_sub(a_in)
}

/// A placeholder element: an empty, [`TypeFlags::ROW`]-flagged list
/// value, matching [`shape::is_placeholder`]'s definition — spec.md
/// §9's "row placeholder... standing for an unknown tail."
fn placeholder_element(engine: &mut Engine) -> CellId {
    let mut v = Value::list(SmallVec::new());
    v.ty.flags = v.ty.flags.set(TypeFlags::ROW);
    engine.val(v)
}

/// spec.md §4.F step 4: pads `items` with fresh placeholder elements,
/// prepended for missing inputs and appended for missing outputs, until
/// its own arity (per [`quote_arity`]) reaches at least `(target_in,
/// target_out)`.
fn placeholder_extend(
    engine: &mut Engine,
    items: &mut SmallVec<[CellId; 4]>,
    target_in: u16,
    target_out: u16,
) {
    let (have_in, have_out) = quote_arity(engine, items);
    for _ in have_in..target_in {
        let ph = placeholder_element(engine);
        items.insert(0, ph);
    }
    for _ in have_out..target_out {
        let ph = placeholder_element(engine);
        items.push(ph);
    }
}

fn arg_list_items(engine: &Engine, parent: CellId, idx: usize) -> Option<SmallVec<[CellId; 4]>> {
    let id = engine.arena.get(parent).as_expr()?.args[idx]?;
    engine.arena.get(id).as_value()?.as_list().cloned()
}

fn arg_alt_set(engine: &Engine, parent: CellId, idx: usize) -> Option<AltSet> {
    let id = engine.arena.get(parent).as_expr()?.args[idx]?;
    Some(engine.arena.get(id).as_value()?.alt_set)
}

/// An `id`-wrapped closure over `arg`, the same shape
/// [`crate::reduce::ops::control::reduce_dup`]/`reduce_swap` rewrite a
/// `Dep` cell's payload to once that dep's value is known.
fn id_expr(arg: CellId) -> Expr {
    let mut expr = Expr::new(Op::Id, 1);
    expr.fill_next(arg);
    expr
}

/// `compose`/`.`: concatenates two already-reduced quote lists, pads the
/// result to the arity the caller's `req` demands (spec.md §4.F steps
/// 1-4), and — if the composed closure owned any `deps` (spec.md §4.F
/// steps 5-7, i.e. this `compose` is itself feeding a multi-output
/// context such as `dup`/`swap`'s own rewrite) — peels one padded
/// element per dep off the front of the combined list and installs it
/// into that dep cell the same way `reduce_dup`/`reduce_swap` do,
/// leaving the remainder as the primary result.
///
/// Padding is applied to the post-concatenation list rather than to each
/// operand individually — `original_source/` never retrieved the
/// low-level list-splice helpers that would settle whether padding
/// happens before or after the splice, so this is a documented,
/// behavior-preserving choice (DESIGN.md) rather than a literal port.
fn finish_compose(
    engine: &mut Engine,
    cp: &mut CellId,
    req: Request,
    template: Option<AltTemplate>,
    alt_left: Option<CellId>,
    alt_right: Option<CellId>,
) -> Response {
    let (Some(left_items), Some(right_items)) =
        (arg_list_items(engine, *cp, 0), arg_list_items(engine, *cp, 1))
    else {
        return Response::Fail;
    };
    let (Some(left_alt_set), Some(right_alt_set)) =
        (arg_alt_set(engine, *cp, 0), arg_alt_set(engine, *cp, 1))
    else {
        return Response::Fail;
    };

    let mut alt_set = AltSet::EMPTY;
    if !AltSet::conflict(left_alt_set, right_alt_set) {
        alt_set = AltSet::union(left_alt_set, right_alt_set);
    } else {
        return Response::Fail;
    }
    let pending = alt_left.map(|s| (0, s)).or_else(|| alt_right.map(|s| (1, s)));

    let (a_in, _a_out) = quote_arity(engine, &left_items);
    let (b_in, b_out) = quote_arity(engine, &right_items);
    let target_in = compose_in(req.expected_in as u16, b_in, b_out, a_in);
    let target_out = compose_out(b_in, req.expected_out as u16, b_out, a_in);

    let mut combined: SmallVec<[CellId; 4]> =
        SmallVec::with_capacity(left_items.len() + right_items.len());
    for item in left_items.iter().chain(right_items.iter()) {
        engine.arena.incref(*item);
        combined.push(*item);
    }
    placeholder_extend(engine, &mut combined, target_in, target_out);

    let deps = engine
        .arena
        .get(*cp)
        .as_expr()
        .map(|e| e.deps.clone())
        .unwrap_or_default();

    let mut extras = SmallVec::<[CellId; 1]>::new();
    for _ in 0..deps.len() {
        if combined.is_empty() {
            break;
        }
        extras.push(combined.remove(0));
    }

    let mut value = Value::list(combined);
    value.alt_set = alt_set;
    let response = install_result(engine, cp, template, value, pending);
    if response.is_success() {
        for (dep, extra) in deps.into_iter().zip(extras) {
            engine.arena.rewrite(dep, crate::cell::Payload::Expr(id_expr(extra)));
        }
    } else {
        for extra in extras {
            engine.arena.drop_cell(extra);
        }
    }
    response
}

/// The result of folding a pushed value through a quote's elements.
enum Pipeline {
    /// Every element consumed; the pipeline collapsed to a final value.
    Value(CellId),
    /// Stopped at an open row slot (or a still-curried element); the
    /// residual quote, with the threaded value now occupying that slot,
    /// is itself the result, still awaiting further pushes.
    Residual(SmallVec<[CellId; 4]>),
    Fail,
    Delay,
}

/// Folds `pushed` through `items` left to right. Each element is forced
/// to be a single, independently-owned closure via [`crate::arena::Arena::unique`]
/// (incref'd first so `unique` always treats it as shared and hands back
/// an independent copy, leaving the original quote's own element, and
/// therefore the quote itself, untouched for its later teardown) before
/// the threaded value is moved into its open slot and it's forced.
fn apply_pipeline(engine: &mut Engine, pushed: CellId, items: SmallVec<[CellId; 4]>) -> Pipeline {
    let mut current = pushed;
    for (i, item) in items.iter().enumerate() {
        if shape::is_placeholder(&engine.arena, *item) {
            let mut residual = SmallVec::with_capacity(items.len() - i);
            residual.push(current);
            for rest in &items[i + 1..] {
                engine.arena.incref(*rest);
                residual.push(*rest);
            }
            return Pipeline::Residual(residual);
        }

        if engine.arena.get(*item).as_expr().is_none() {
            engine.arena.drop_cell(current);
            return Pipeline::Fail;
        }

        engine.arena.incref(*item);
        let unique_item = engine.arena.unique(*item);
        let filled = {
            let expr = engine
                .arena
                .get_mut(unique_item)
                .as_expr_mut()
                .expect("checked as_expr above");
            // `current`'s sole credit moves directly into this slot.
            expr.fill_next(current);
            expr.is_ready()
        };

        if !filled {
            let mut residual = SmallVec::with_capacity(items.len() - i);
            residual.push(unique_item);
            for rest in &items[i + 1..] {
                engine.arena.incref(*rest);
                residual.push(*rest);
            }
            return Pipeline::Residual(residual);
        }

        let mut next = unique_item;
        let resp = super::reduce(engine, &mut next, Request::ANY);
        match resp {
            Response::Success => current = next,
            Response::Fail => {
                engine.arena.drop_cell(next);
                return Pipeline::Fail;
            }
            Response::Delay => {
                engine.arena.drop_cell(next);
                return Pipeline::Delay;
            }
            Response::Retry => unreachable!("reduce() resolves Retry internally"),
        }
    }
    Pipeline::Value(current)
}

fn finish_ap(
    engine: &mut Engine,
    cp: &mut CellId,
    req: Request,
    template: Option<AltTemplate>,
    alt_value: Option<CellId>,
    alt_right: Option<CellId>,
) -> Response {
    let (Some(pushed_alt_set), Some(quote_alt_set)) =
        (arg_alt_set(engine, *cp, 0), arg_alt_set(engine, *cp, 1))
    else {
        return Response::Fail;
    };
    if AltSet::conflict(pushed_alt_set, quote_alt_set) {
        return Response::Fail;
    }
    let mut alt_set = AltSet::union(pushed_alt_set, quote_alt_set);
    let pending = alt_value.map(|s| (0, s)).or_else(|| alt_right.map(|s| (1, s)));

    let Some(items) = arg_list_items(engine, *cp, 1) else {
        return Response::Fail;
    };
    if items.is_empty() {
        return Response::Fail;
    }

    let pushed_id = engine.arena.get(*cp).as_expr().unwrap().args[0].unwrap();
    engine.arena.incref(pushed_id);

    match apply_pipeline(engine, pushed_id, items) {
        Pipeline::Value(final_id) => {
            let Some(mut result) = engine.arena.get(final_id).as_value().cloned() else {
                engine.arena.drop_cell(final_id);
                return Response::Fail;
            };
            // Clone above copied any child ids (e.g. a nested quote) by
            // value without claiming them; incref before dropping the
            // shell so they survive into `result`.
            if let ValuePayload::List(items) = &result.payload {
                for item in items.clone() {
                    engine.arena.incref(item);
                }
            }
            engine.arena.drop_cell(final_id);
            if !accumulate(&mut alt_set, &result) {
                return Response::Fail;
            }
            result.alt_set = alt_set;
            if !result.ty.satisfies(req.target_type) {
                return Response::Fail;
            }
            install_result(engine, cp, template, result, pending)
        }
        Pipeline::Residual(items) => {
            let mut value = Value::list(items);
            value.ty.flags = value.ty.flags.set(TypeFlags::ROW);
            value.alt_set = alt_set;
            install_result(engine, cp, template, value, pending)
        }
        Pipeline::Fail => Response::Fail,
        Pipeline::Delay => Response::Delay,
    }
}

/// Builds a single-hole transformer closure wrapping `op` applied to a
/// not-yet-pushed slot plus a fixed operand — the shape a bracketed
/// two-token word like `[1 +]` compiles to: `args[0]` stays open for
/// `ap`'s pushed value, `args[1]` is the literal already baked in.
pub fn transformer(engine: &mut Engine, op: Op, fixed_operand: CellId) -> CellId {
    engine.arena.incref(fixed_operand);
    let mut expr = Expr::new(op, 2);
    expr.fill_next(fixed_operand);
    expr.args.swap(0, 1);
    engine.arena_mut().alloc(Cell::new_expr(expr))
}

/// Wraps a single transformer closure as a one-element quote value, the
/// shape `compose`/`ap` expect for a bracketed word sequence.
pub fn quote(engine: &mut Engine, element: CellId) -> CellId {
    engine.arena.incref(element);
    engine.val(Value::list(smallvec::smallvec![element]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Value;
    use crate::reduce::reduce;

    fn quote_of(engine: &mut Engine, op: Op, operand: i64) -> CellId {
        let fixed = engine.val(Value::int(operand));
        let t = transformer(engine, op, fixed);
        quote(engine, t)
    }

    #[test]
    fn ap_applies_a_single_step_quote() {
        let mut engine = Engine::new();
        let q = quote_of(&mut engine, Op::Add, 1);
        let ten = engine.val(Value::int(10));
        let mut ap = engine.func(Op::Ap, [ten, q]);
        assert_eq!(reduce(&mut engine, &mut ap, Request::ANY), Response::Success);
        assert_eq!(engine.arena().get(ap).as_value().unwrap().as_int(), Some(11));
    }

    #[test]
    fn compose_then_ap_runs_left_quote_first() {
        let mut engine = Engine::new();
        let left = quote_of(&mut engine, Op::Add, 1);
        let right = quote_of(&mut engine, Op::Mul, 2);
        let mut composed = engine.func(Op::Compose, [left, right]);
        assert_eq!(
            reduce(&mut engine, &mut composed, Request::of(Exclusive::List)),
            Response::Success
        );
        let three = engine.val(Value::int(3));
        let mut ap = engine.func(Op::Ap, [three, composed]);
        assert_eq!(reduce(&mut engine, &mut ap, Request::ANY), Response::Success);
        assert_eq!(engine.arena().get(ap).as_value().unwrap().as_int(), Some(8));
    }

    #[test]
    fn ap_onto_empty_quote_fails() {
        let mut engine = Engine::new();
        let empty = engine.empty_list();
        let one = engine.val(Value::int(1));
        let mut ap = engine.func(Op::Ap, [one, empty]);
        assert_eq!(reduce(&mut engine, &mut ap, Request::ANY), Response::Fail);
    }

    #[test]
    fn quote_arity_reads_a_single_hole_element_as_one_in_zero_out() {
        let mut engine = Engine::new();
        let fixed = engine.val(Value::int(1));
        let t = transformer(&mut engine, Op::Add, fixed);
        let items: SmallVec<[CellId; 4]> = smallvec::smallvec![t];
        assert_eq!(quote_arity(&engine, &items), (1, 0));
    }

    #[test]
    fn compose_pads_the_combined_list_to_the_requested_arity() {
        let mut engine = Engine::new();
        let left = quote_of(&mut engine, Op::Add, 1);
        let right = quote_of(&mut engine, Op::Mul, 2);
        let mut composed = engine.func(Op::Compose, [left, right]);
        let req = Request::of(Exclusive::List).with_arity(1, 3);
        assert_eq!(reduce(&mut engine, &mut composed, req), Response::Success);
        let items = engine
            .arena()
            .get(composed)
            .as_value()
            .unwrap()
            .as_list()
            .unwrap()
            .clone();
        // two real transformer elements plus two appended output placeholders
        assert_eq!(items.len(), 4);
        assert!(shape::is_placeholder(engine.arena(), items[2]));
        assert!(shape::is_placeholder(engine.arena(), items[3]));
    }

    #[test]
    fn compose_with_a_dep_peels_the_leading_element_off_into_it() {
        let mut engine = Engine::new();
        let left = quote_of(&mut engine, Op::Add, 1);
        let right = quote_of(&mut engine, Op::Mul, 2);
        let (mut owner, deps) = engine.func_multi(Op::Compose, [left, right], 1);
        let dep = deps[0];

        let req = Request::of(Exclusive::List).with_arity(1, 3);
        assert_eq!(reduce(&mut engine, &mut owner, req), Response::Success);

        // the peeled-off leading element (the left quote's open `+1` hole)
        // now lives behind the dep as an `id`-wrapped closure.
        let dep_expr = engine.arena().get(dep).as_expr().cloned().unwrap();
        assert_eq!(dep_expr.op, Op::Id);
        assert!(dep_expr.args[0].is_some());

        // the primary result is the remainder: right's element plus the
        // two appended output placeholders.
        let primary = engine.arena().get(owner).as_value().unwrap().as_list().unwrap();
        assert_eq!(primary.len(), 3);
    }
}
