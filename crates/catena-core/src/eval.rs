//! The top-level driver: owns every piece of process-wide state and
//! exposes the single `eval` entry point the parser/REPL collaborators
//! call through.
//!
//! Grounded on `original_source/eval.c`'s `eval()`/`cells_init()` and on
//! `dfir_rs::scheduled::graph::Hydroflow`, which plays the analogous
//! "owns the arena, owns the run loop, exposes one driver method" role
//! for its own reduction engine.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::altset::{AltIdAllocator, AltSet};
use crate::arena::Arena;
use crate::cell::{Cell, CellId, Entry, Exclusive, Expr, Op, Symbol, Value};
use crate::config::EngineConfig;
use crate::error::{EvalError, EvalResult};
use crate::io::{IoPort, NullIoPort};
use crate::reduce::{self, DelayQueue, Request, Response};
use crate::trace::{NullTraceSink, TraceSink};

/// Maps a primitive/user-function name to the compiled [`Entry`] or
/// built-in [`Op`] it names — `original_source/eval.c`'s module table,
/// generalized to hold both.
#[derive(Default)]
pub struct WordTable {
    entries: FxHashMap<String, CellId>,
}

impl WordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, entry: CellId) {
        self.entries.insert(name.into(), entry);
    }

    pub fn lookup(&self, name: &str) -> Option<CellId> {
        self.entries.get(name).copied()
    }
}

/// Owns the arena, the alt-id counter, the trace journal, the word
/// table, and the IO port: every piece of process-wide state spec.md §5
/// calls out as shared across the reducer call stack.
pub struct Engine {
    pub(crate) arena: Arena,
    pub(crate) alt_ids: AltIdAllocator,
    pub(crate) config: EngineConfig,
    pub words: WordTable,
    pub(crate) trace: Box<dyn TraceSink>,
    pub(crate) io: Box<dyn IoPort>,
    pub(crate) symbols: Symbols,
    /// Entries currently mid-expansion on the active `reduce` pass,
    /// paired with `recursion_depth` at the moment each was pushed
    /// (`initial_word`'s role in `original_source/user_func.c`, scoped
    /// here to the dynamic extent of the expansion rather than a single
    /// static pointer). [`crate::reduce::funcall::reduce_exec`] pushes an
    /// entry before copying its body; [`crate::reduce::reduce`] pops
    /// everything a call pushed once that call's whole pass resolves. The
    /// paired depth distinguishes the two ways a call can loop back into
    /// an entry already on this list: if `recursion_depth` hasn't moved
    /// since the push, the cycle never left a single `reduce_loop` pass
    /// (only reachable through the zero-cost `Retry` rewrites like `id`'s
    /// transparent collapse or `drop`, which never call `reduce` again)
    /// and genuinely could spin forever — that's reentrant. If depth has
    /// grown, the call reached here through ordinary nested argument
    /// forcing, each body built lazily and unfolding one frame per later
    /// force the way any other lazy recursive evaluator terminates at its
    /// base case — not reentrant, even though the same entry is still on
    /// the list.
    pub(crate) expanding: Vec<(CellId, usize)>,
    /// Current nesting depth of [`crate::reduce::reduce`] calls on the
    /// native Rust stack, checked against `config.recursion_limit` on
    /// every call so pathologically deep recursion fails gracefully
    /// instead of overflowing the stack.
    pub(crate) recursion_depth: usize,
    /// Set once a fatal, boundary-crossing condition (recursion-limit
    /// exhaustion so far) is detected mid-reduction; [`Engine::eval`]
    /// drains it into an `Err` at its next opportunity instead of
    /// treating the in-flight `Response::Fail` as ordinary reduction
    /// failure.
    pub(crate) fatal: Option<EvalError>,
}

/// The persistent, process-wide symbol cells (`SYM_False`, `SYM_True`,
/// `SYM_IO`, `SYM_Dict` in the original) allocated once at construction.
#[derive(Clone, Copy)]
pub(crate) struct Symbols {
    pub false_: CellId,
    pub true_: CellId,
    pub io: CellId,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut arena = Arena::new();
        let false_ = arena.alloc_persistent(Cell::new_value(Value::symbol(Symbol::False)));
        let true_ = arena.alloc_persistent(Cell::new_value(Value::symbol(Symbol::True)));
        let io = arena.alloc_persistent(Cell::new_value(Value::symbol(Symbol::Io)));
        Self {
            arena,
            alt_ids: AltIdAllocator::with_limit(config.max_alt_ids),
            config,
            words: WordTable::new(),
            trace: Box::new(NullTraceSink),
            io: Box::new(NullIoPort),
            symbols: Symbols { false_, true_, io },
            expanding: Vec::new(),
            recursion_depth: 0,
            fatal: None,
        }
    }

    pub fn set_trace_sink(&mut self, sink: impl TraceSink + 'static) {
        self.trace = Box::new(sink);
    }

    pub fn set_io_port(&mut self, port: impl IoPort + 'static) {
        self.io = Box::new(port);
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn io_symbol(&self) -> CellId {
        self.symbols.io
    }

    pub fn bool_symbol(&self, value: bool) -> CellId {
        if value {
            self.symbols.true_
        } else {
            self.symbols.false_
        }
    }

    // --- cell construction helpers (spec.md §6) ---

    pub fn val(&mut self, v: Value) -> CellId {
        self.arena.alloc(Cell::new_value(v))
    }

    pub fn float_val(&mut self, v: f64) -> CellId {
        self.val(Value::float(v))
    }

    pub fn var(&mut self, exclusive: Exclusive, entry: CellId, index: u32) -> CellId {
        self.val(Value::var(exclusive, entry, index))
    }

    pub fn empty_list(&mut self) -> CellId {
        self.val(Value::list(SmallVec::new()))
    }

    /// `id(arg)`: an `id`-tagged closure wrapping a single argument,
    /// used to carry an alt-set on an otherwise-transparent value
    /// (swap/dup results, per-return dep values in funcall expansion).
    pub fn id(&mut self, arg: CellId) -> CellId {
        self.arena.incref(arg);
        let mut expr = Expr::new(Op::Id, 1);
        expr.fill_next(arg);
        self.arena.alloc(Cell::new_expr(expr))
    }

    pub fn func(&mut self, op: Op, args: impl IntoIterator<Item = CellId>) -> CellId {
        let args: Vec<CellId> = args.into_iter().collect();
        let mut expr = Expr::new(op, args.len());
        for a in &args {
            self.arena.incref(*a);
            expr.fill_next(*a);
        }
        self.arena.alloc(Cell::new_expr(expr))
    }

    /// Builds a multi-output closure (`dup`, `swap`, a row-quote
    /// application) together with the `out` [`Op::Dep`] cells its
    /// handler will install its secondary results into. Returns the
    /// owner's id followed by each dep's id, in output order — this is
    /// the role the (external, out of scope) parser plays when it lays
    /// a word with `out > 1` onto the stack: every output beyond the
    /// first needs its own pre-existing, stable cell id for downstream
    /// consumers to hold before the owner has run (spec.md GLOSSARY
    /// "Dep").
    pub fn func_multi(
        &mut self,
        op: Op,
        args: impl IntoIterator<Item = CellId>,
        out: u8,
    ) -> (CellId, Vec<CellId>) {
        let owner = self.func(op, args);
        let mut deps = Vec::with_capacity(out as usize);
        for _ in 0..out {
            let dep = self.func(Op::Dep, [owner]);
            deps.push(dep);
        }
        if let Some(expr) = self.arena.get_mut(owner).as_expr_mut() {
            expr.out = out;
            expr.deps = deps.iter().copied().collect();
        }
        (owner, deps)
    }

    pub fn define_entry(&mut self, entry: Entry) -> CellId {
        self.arena.alloc(Cell::new_entry(entry))
    }

    /// Builds an `Exec` closure calling `entry` with `args`, the call-site
    /// shape [`crate::reduce::funcall`] expands (spec.md §4.H). `args`
    /// must match `entry`'s declared in-arity exactly; a shorter list is
    /// a curried/incomplete call and is the caller's responsibility to
    /// wrap as a row-quote (spec.md §4.H step 5), not this helper's. The
    /// pre-built output deps a multi-output entry needs are discarded
    /// here; use [`Engine::call_entry_multi`] to get them back.
    pub fn call_entry(&mut self, entry: CellId, args: impl IntoIterator<Item = CellId>) -> CellId {
        self.call_entry_multi(entry, args).0
    }

    /// As [`Engine::call_entry`], but also returns the entry's secondary
    /// output deps (one per declared output beyond the first), the way
    /// [`Engine::func_multi`] does for `dup`/`swap`.
    pub fn call_entry_multi(
        &mut self,
        entry: CellId,
        args: impl IntoIterator<Item = CellId>,
    ) -> (CellId, Vec<CellId>) {
        let extra_out = self
            .arena
            .get(entry)
            .as_entry()
            .map_or(0, |e| e.arity_out.saturating_sub(1)) as u8;
        self.arena.incref(entry);
        let (owner, deps) = self.func_multi(Op::Exec, args, extra_out);
        if let Some(expr) = self.arena.get_mut(owner).as_expr_mut() {
            expr.entry = Some(entry);
        }
        (owner, deps)
    }

    // --- arity, per spec.md §6 get_arity ---

    /// Computes a quotation's static arity without reducing it
    /// (`get_arity` in the original): the number of unfilled argument
    /// holes across the root closure is its in-arity, `out` its
    /// out-arity.
    pub fn get_arity(&self, id: CellId) -> (u16, u16) {
        match &self.arena.get(id).payload {
            crate::cell::Payload::Expr(e) => {
                let in_arity = e.args.iter().filter(|a| a.is_none()).count() as u16;
                (in_arity, u16::from(e.out) + 1)
            }
            crate::cell::Payload::Value(v) => {
                if let Some(items) = v.as_list() {
                    (0, items.len() as u16)
                } else {
                    (0, 1)
                }
            }
            crate::cell::Payload::Entry(e) => (e.arity_in, e.arity_out),
        }
    }

    // --- top-level driver ---

    /// Reduces every root under `T_ANY`, draining delayed cells at
    /// successively higher priority passes (one shared queue across all
    /// roots, so a cell that delays never blocks ones that don't) until
    /// each either succeeds, fails, or the configured delay budget is
    /// spent. Each root's alt chain is then collapsed and flattened into
    /// the output, enumerating every nondeterministic alternative.
    pub fn eval(&mut self, roots: Vec<CellId>) -> EvalResult<Vec<CellId>> {
        for &cp in &roots {
            let (in_arity, _) = self.get_arity(cp);
            if in_arity > 0 {
                return Err(EvalError::Incomplete(cp));
            }
        }

        let mut results: Vec<Option<CellId>> = vec![None; roots.len()];
        let mut queue: DelayQueue<(usize, CellId)> = DelayQueue::new();
        for (index, cp) in roots.into_iter().enumerate() {
            queue.push(0, (index, cp));
        }

        let mut passes = 0usize;
        while let Some((priority, (index, mut cp))) = queue.pop() {
            let req = Request::ANY.with_priority(priority);
            match reduce::reduce(self, &mut cp, req) {
                Response::Success | Response::Fail => {
                    results[index] = Some(reduce::reduce_alt(self, cp));
                }
                Response::Retry => unreachable!("reduce() resolves Retry internally"),
                Response::Delay => {
                    passes += 1;
                    if passes > self.config.delay_limit {
                        if self.alt_ids.is_exhausted() {
                            return Err(EvalError::AltIdsExhausted {
                                max: self.alt_ids.limit(),
                            });
                        }
                        return Err(EvalError::DelayLimit {
                            limit: self.config.delay_limit,
                        });
                    }
                    debug!(target: "RDCE", cell = ?cp, priority = priority + 1, "escalating priority after delay");
                    queue.push(priority + 1, (index, cp));
                }
            }
            if let Some(err) = self.fatal.take() {
                return Err(err);
            }
        }

        let mut out = Vec::new();
        for slot in results {
            let mut cursor = slot;
            while let Some(c) = cursor {
                out.push(c);
                cursor = self.arena.get(c).alt;
            }
        }
        Ok(out)
    }

    /// `check_free` (spec.md §4.A / §7): every live non-persistent cell
    /// at this point is a leak.
    pub fn check_free(&self) -> EvalResult<()> {
        let leaks = self.arena.leaked();
        if let Some(first) = leaks.first() {
            warn!(target: "LEAK", count = leaks.len(), "cells never reached refcount zero");
            return Err(EvalError::Leak(*first));
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_of_a_ready_closure_is_zero() {
        let mut engine = Engine::new();
        let one = engine.val(Value::int(1));
        let two = engine.val(Value::int(2));
        let add = engine.func(Op::Add, [one, two]);
        assert_eq!(engine.get_arity(add), (0, 1));
    }

    #[test]
    fn arity_of_a_partial_closure_counts_holes() {
        let mut engine = Engine::new();
        let one = engine.val(Value::int(1));
        let expr = Expr::new(Op::Add, 2);
        let mut expr = expr;
        expr.fill_next(one);
        let partial = engine.arena_mut().alloc(Cell::new_expr(expr));
        assert_eq!(engine.get_arity(partial), (1, 1));
    }

    #[test]
    fn eval_of_incomplete_closure_is_fatal() {
        let mut engine = Engine::new();
        let expr = Expr::new(Op::Add, 2);
        let partial = engine.arena_mut().alloc(Cell::new_expr(expr));
        let err = engine.eval(vec![partial]).unwrap_err();
        assert!(matches!(err, EvalError::Incomplete(_)));
    }

    #[test]
    fn delay_budget_exhaustion_reports_alt_ids_exhausted_once_the_allocator_is_also_spent() {
        // A malformed nested closure (an inner `Add` missing its second
        // argument, buried inside a fully-filled outer `Add`) delays
        // forever: nothing ever fills that hole, so every pass returns
        // `Response::Delay` unchanged and the loop just spends its
        // budget. With the alt-id allocator also exhausted at that
        // point, `eval` should name the more specific cause rather than
        // the generic delay-budget message.
        let mut engine = Engine::with_config(EngineConfig::default().with_delay_limit(3));
        let max = engine.config().max_alt_ids;
        engine.alt_ids.try_alloc(max).unwrap();
        assert!(engine.alt_ids.is_exhausted());

        let one = engine.val(Value::int(1));
        let mut inner = Expr::new(Op::Add, 2);
        inner.fill_next(one);
        let inner_id = engine.arena_mut().alloc(Cell::new_expr(inner));
        let two = engine.val(Value::int(2));
        let root = engine.func(Op::Add, [inner_id, two]);

        let err = engine.eval(vec![root]).unwrap_err();
        assert!(matches!(err, EvalError::AltIdsExhausted { max } if max == AltSet::FIELD_COUNT));
    }

    #[test]
    fn deep_left_nested_arithmetic_past_the_limit_is_a_recursion_error() {
        let mut engine = Engine::with_config(EngineConfig::default().with_recursion_limit(16));
        let one = engine.val(Value::int(1));
        let mut chain = one;
        for _ in 0..64 {
            let step = engine.val(Value::int(1));
            chain = engine.func(Op::Add, [chain, step]);
        }
        let err = engine.eval(vec![chain]).unwrap_err();
        assert!(matches!(err, EvalError::RecursionLimit { limit: 16 }));
    }
}
