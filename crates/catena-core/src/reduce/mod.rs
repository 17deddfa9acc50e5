//! The reducer core: `reduce`/`reduce_arg`/`reduce_alt` and the
//! dispatch table every primitive and user-function handler plugs into.
//!
//! Grounded on `original_source/eval.c`'s `reduce`/`reduce_list`
//! functions for the control flow, and on `dfir_lang::graph::ops`'s
//! static operator table for how handlers are looked up by tag.

mod assert;
mod compose;
mod delay_queue;
mod funcall;
mod ops;
mod request;

pub use delay_queue::DelayQueue;
pub use request::{Request, Response};

use smallvec::SmallVec;
use tracing::trace;

use crate::altset::AltSet;
use crate::cell::{Cell, CellId, Op, Payload, Value};
use crate::error::EvalError;
use crate::eval::Engine;

/// `reduce(cp, request)` — spec.md §4.D. Follows `id` indirections and
/// operator rewrites (`Response::Retry`) in a loop; on `Fail`, falls
/// back to `*cp`'s own `alt` link if present, else installs the fail
/// sentinel.
///
/// Every nested call (argument forcing, alt-chain collapse, FAIL
/// fallback) passes back through this same entry point, so a depth
/// counter here bounds the native call stack the same way
/// `delay_limit` bounds the priority-queue loop in
/// [`crate::eval::Engine::eval`]: once `recursion_limit` is exceeded the
/// engine records a fatal [`EvalError::RecursionLimit`] (picked up by
/// `eval`) and every further `reduce` call short-circuits to `Fail`
/// instead of growing the stack further.
pub fn reduce(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    if engine.fatal.is_some() {
        return Response::Fail;
    }
    let limit = engine.config.recursion_limit;
    engine.recursion_depth += 1;
    if engine.recursion_depth > limit {
        engine.recursion_depth -= 1;
        engine.fatal.get_or_insert(EvalError::RecursionLimit { limit });
        return Response::Fail;
    }
    // Every entry `funcall::reduce_exec` starts expanding within this
    // call stays pushed on `engine.expanding` for the full duration of
    // this `reduce_loop` pass, including every further `Retry` it
    // dispatches through in the same iteration — not just the single
    // `expand_call` invocation that built it. That is what lets a
    // tail-recursive cycle through two or more distinct entries (which
    // never leaves `reduce_loop`'s own `loop`, so it never hits the
    // `recursion_depth` counter above) still be caught: by the time the
    // cycle loops back to an entry already on this list, `reduce_exec`
    // sees it and falls back to `reduce_as_variable` instead of
    // expanding forever (spec.md §4.H step 2's unification, narrowed to
    // variable identity — see `funcall.rs` and DESIGN.md).
    let expanding_base = engine.expanding.len();
    let response = reduce_loop(engine, cp, req);
    let popped: SmallVec<[(CellId, usize); 4]> =
        engine.expanding.drain(expanding_base..).collect();
    for (entry_id, _) in &popped {
        // Only clear `initial` once no outer, still-active frame is
        // waiting on this same entry's expansion — an entry can appear
        // more than once in `expanding` when genuine (non-reentrant)
        // recursion nests multiple frames deep.
        let still_active = engine.expanding.iter().any(|&(id, _)| id == *entry_id);
        if !still_active
            && let Some(entry) = engine.arena.get_mut(*entry_id).as_entry_mut()
        {
            entry.initial = None;
        }
    }
    engine.recursion_depth -= 1;
    response
}

fn reduce_loop(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    loop {
        let op = match &engine.arena.get(*cp).payload {
            Payload::Value(v) => {
                if v.is_fail() {
                    return Response::Fail;
                }
                return if v.ty.satisfies(req.target_type) {
                    Response::Success
                } else {
                    Response::Fail
                };
            }
            Payload::Expr(e) => e.op,
            Payload::Entry(_) => return Response::Fail,
        };

        let response = ops::operator_lookup(op)(engine, cp, req);
        trace!(target: "RDCE", cell = ?*cp, op = op.name(), ?response, "reduced");

        match response {
            Response::Retry => continue,
            Response::Fail => return fall_back_to_alt(engine, cp),
            other => return other,
        }
    }
}

/// On FAIL, tries `*cp`'s own `alt` chain before giving up (spec.md
/// §4.D step 3's "FAIL" outcome).
fn fall_back_to_alt(engine: &mut Engine, cp: &mut CellId) -> Response {
    let alt = engine.arena.get(*cp).alt;
    match alt {
        Some(next) => {
            engine.arena.incref(next);
            let old = *cp;
            *cp = next;
            engine.arena.drop_cell(old);
            reduce(engine, cp, Request::ANY)
        }
        None => {
            let fail_id = engine.val(Value::fail());
            let old = *cp;
            *cp = fail_id;
            engine.arena.drop_cell(old);
            Response::Fail
        }
    }
}

/// Forces argument `idx` of the expression cell `parent` under `req`,
/// writing any pointer rewrite (RETRY-driven) back into the argument
/// slot. Returns the response plus the forced value's own pending `alt`
/// sibling, if any, so the caller can build a deferred alternate of
/// itself (spec.md §4.E step 5, "inherit the cell's alt").
pub(crate) fn reduce_expr_arg(
    engine: &mut Engine,
    parent: CellId,
    idx: usize,
    req: Request,
) -> (Response, Option<CellId>) {
    let Some(Some(arg_id)) = engine
        .arena
        .get(parent)
        .as_expr()
        .map(|e| e.args.get(idx).copied().flatten())
    else {
        return (Response::Delay, None);
    };
    let mut local = arg_id;
    let response = reduce(engine, &mut local, req);
    if local != arg_id
        && let Some(expr) = engine.arena.get_mut(parent).as_expr_mut()
    {
        expr.args[idx] = Some(local);
    }
    let pending_alt = engine.arena.get(local).alt;
    (response, pending_alt)
}

/// Collapses an alt chain rooted at an already-reduced value `id`: its
/// `alt` link (if any) is itself an unreduced deferred closure that gets
/// forced here, recursively, so the chain linked off the returned id is
/// entirely live values (spec.md's `reduce_alt`). Dead alternates
/// (those that FAIL) are dropped and unlinked.
pub fn reduce_alt(engine: &mut Engine, id: CellId) -> CellId {
    let Some(mut next) = engine.arena.get(id).alt else {
        return id;
    };
    match reduce(engine, &mut next, Request::ANY) {
        Response::Success => {
            let collapsed = reduce_alt(engine, next);
            engine.arena.get_mut(id).alt = Some(collapsed);
            id
        }
        _ => {
            engine.arena.drop_cell(next);
            engine.arena.get_mut(id).alt = None;
            id
        }
    }
}

/// A template for building a deferred alternate of the closure currently
/// being reduced, with one argument slot replaced by the sibling
/// produced when that argument's value carried its own `alt`.
pub(crate) struct AltTemplate {
    pub op: Op,
    pub args: SmallVec<[Option<CellId>; 2]>,
    pub out: u8,
}

impl AltTemplate {
    pub fn capture(engine: &Engine, parent: CellId) -> Option<AltTemplate> {
        engine.arena.get(parent).as_expr().map(|e| AltTemplate {
            op: e.op,
            args: e.args.clone(),
            out: e.out,
        })
    }

    /// Builds the deferred closure with `idx`'s slot replaced by
    /// `sibling`, ref-counting every slot it retains.
    pub fn build_with_substitution(
        &self,
        engine: &mut Engine,
        idx: usize,
        sibling: CellId,
    ) -> CellId {
        let mut args = self.args.clone();
        args[idx] = Some(sibling);
        for arg in args.iter().flatten() {
            engine.arena.incref(*arg);
        }
        let arity = args.len();
        let mut expr = crate::cell::Expr::new(self.op, arity);
        expr.args = args;
        expr.out = self.out;
        if expr.args.iter().all(Option::is_some) {
            expr.flags.clear(crate::cell::ExprFlags::NEEDS_ARG);
        }
        engine.arena_mut().alloc(Cell::new_expr(expr))
    }
}

/// Installs `value` as the reduced content of `*cp`, dropping the old
/// closure, and attaches `pending_alt` (the first forced argument that
/// itself had more alternates, if any) as a deferred re-application of
/// the same operator — spec.md §4.E step 5.
pub(crate) fn install_result(
    engine: &mut Engine,
    cp: &mut CellId,
    parent_template: Option<AltTemplate>,
    value: Value,
    pending_alt: Option<(usize, CellId)>,
) -> Response {
    let new_id = engine.val(value);
    if let (Some(template), Some((idx, sibling))) = (parent_template, pending_alt) {
        let deferred = template.build_with_substitution(engine, idx, sibling);
        engine.arena.get_mut(new_id).alt = Some(deferred);
    }
    let old = *cp;
    *cp = new_id;
    engine.arena.drop_cell(old);
    Response::Success
}

/// Unions the accumulated alt-set with a newly forced value's, failing
/// if they conflict (spec.md §4.E step 3).
pub(crate) fn accumulate(acc: &mut AltSet, value: &Value) -> bool {
    if AltSet::conflict(*acc, value.alt_set) {
        return false;
    }
    *acc = AltSet::union(*acc, value.alt_set);
    true
}

/// Reads a clone of the already-forced value sitting in `parent`'s
/// `idx`th argument slot. Callers only reach here after
/// [`reduce_expr_arg`] returned `Success` for that slot, so the clone is
/// always a reduced value.
pub(crate) fn arg_value(engine: &Engine, parent: CellId, idx: usize) -> Value {
    let arg_id = engine
        .arena
        .get(parent)
        .as_expr()
        .and_then(|e| e.args.get(idx).copied().flatten())
        .expect("arg_value called on an unfilled or non-expr slot");
    engine
        .arena
        .get(arg_id)
        .as_value()
        .cloned()
        .unwrap_or_else(Value::fail)
}

/// Step 4 of the operator protocol ("variable dispatch"): when a forced
/// argument turns out to be a partial-evaluation placeholder, the
/// result is itself a fresh variable rather than a concrete value, and
/// the step is appended to the trace journal when tracing is enabled.
///
/// `entry_override`, when given, replaces the default "this cell's own
/// `entry` field, or itself" choice of `entry_hint` — `funcall`'s
/// reentrant fallback passes the entry's `initial` call site here, so
/// that every occurrence of a recursive call still being unified
/// against its outermost call collapses to a variable tagged with the
/// *same* entry handle rather than a fresh one per occurrence (spec.md
/// §4.H step 2's unification, narrowed to variable identity rather than
/// full substitution — see DESIGN.md).
pub(crate) fn install_variable_result(
    engine: &mut Engine,
    cp: &mut CellId,
    parent_template: Option<AltTemplate>,
    op: Op,
    result_type: crate::cell::Exclusive,
    alt_set: AltSet,
    pending_alt: Option<(usize, CellId)>,
    arg_ids: Vec<CellId>,
    entry_override: Option<CellId>,
) -> Response {
    let entry_hint = entry_override.unwrap_or_else(|| {
        engine
            .arena
            .get(*cp)
            .as_expr()
            .and_then(|e| e.entry)
            .unwrap_or(*cp)
    });
    let index = 0;
    if engine.config.trace_enabled {
        engine.trace.record(crate::trace::TraceEvent {
            entry: entry_hint,
            index,
            op,
            args: arg_ids,
        });
    }
    let mut value = Value::var(result_type, entry_hint, index);
    value.alt_set = alt_set;
    install_result(engine, cp, parent_template, value, pending_alt)
}
