//! Cell-shape contracts: predicates, arity queries, and traversal over a
//! cell's outgoing references. Grounded on `original_source/user_func.c`
//! and `primitive.c`'s `is_value`/`is_list`/`is_var`/`closure_in`-style
//! helpers, which every operator handler calls before touching a cell's
//! payload.

use crate::arena::Arena;
use crate::cell::{CellId, Payload};

pub fn is_value(arena: &Arena, id: CellId) -> bool {
    matches!(arena.get(id).payload, Payload::Value(_))
}

pub fn is_list(arena: &Arena, id: CellId) -> bool {
    arena
        .get(id)
        .as_value()
        .is_some_and(|v| v.as_list().is_some())
}

pub fn is_var(arena: &Arena, id: CellId) -> bool {
    arena.get(id).as_value().is_some_and(|v| v.ty.is_var())
}

pub fn is_fail(arena: &Arena, id: CellId) -> bool {
    arena.get(id).as_value().is_some_and(|v| v.is_fail())
}

pub fn is_row_list(arena: &Arena, id: CellId) -> bool {
    arena.get(id).as_value().is_some_and(|v| v.ty.is_row())
}

/// A list whose first element stands in for an unknown tail (a
/// placeholder), as opposed to an ordinary element — spec.md §9's "Row
/// polymorphism" design note.
pub fn is_placeholder(arena: &Arena, id: CellId) -> bool {
    is_row_list(arena, id)
        && arena
            .get(id)
            .as_value()
            .and_then(|v| v.as_list())
            .is_some_and(|items| items.is_empty())
}

pub fn is_user_func(arena: &Arena, id: CellId) -> bool {
    arena
        .get(id)
        .as_expr()
        .is_some_and(|e| matches!(e.op, crate::cell::Op::Exec))
}

/// Number of (possibly unfilled) argument slots an unreduced closure
/// expects — `closure_in` in the original.
pub fn closure_in(arena: &Arena, id: CellId) -> usize {
    arena.get(id).as_expr().map_or(0, |e| e.args.len())
}

/// Number of extra output `dep`s a closure produces beyond its primary
/// result — `closure_out` in the original.
pub fn closure_out(arena: &Arena, id: CellId) -> u8 {
    arena.get(id).as_expr().map_or(0, |e| e.out)
}

pub fn closure_args(arena: &Arena, id: CellId) -> Vec<Option<CellId>> {
    arena
        .get(id)
        .as_expr()
        .map(|e| e.args.to_vec())
        .unwrap_or_default()
}

pub fn list_size(arena: &Arena, id: CellId) -> usize {
    arena
        .get(id)
        .as_value()
        .and_then(|v| v.as_list())
        .map_or(0, |items| items.len())
}

pub fn function_in(arena: &Arena, entry_id: CellId) -> u16 {
    arena.get(entry_id).as_entry().map_or(0, |e| e.arity_in)
}

pub fn function_out(arena: &Arena, entry_id: CellId) -> u16 {
    arena.get(entry_id).as_entry().map_or(0, |e| e.arity_out)
}

/// Selects which outgoing edges [`traverse`] should visit. A small
/// hand-rolled flag set, for symmetry with the cell payloads' own
/// flag newtypes (mirroring `original_source/rt_types.h`'s `#define`d
/// bit flags) rather than pulling in a `bitflags!` dependency for one
/// four-bit selector.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TraverseMask(u8);

impl TraverseMask {
    pub const ALT: TraverseMask = TraverseMask(0x01);
    pub const ARGS: TraverseMask = TraverseMask(0x02);
    pub const DEPS: TraverseMask = TraverseMask(0x04);
    pub const LIST: TraverseMask = TraverseMask(0x08);

    pub fn contains(self, other: TraverseMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TraverseMask {
    type Output = TraverseMask;
    fn bitor(self, rhs: TraverseMask) -> TraverseMask {
        TraverseMask(self.0 | rhs.0)
    }
}

/// Visits every outgoing reference of `id` selected by `mask`, in the
/// order alt, args, list (matching `traverse(c, body, mask)` in the
/// original).
pub fn traverse(arena: &Arena, id: CellId, mask: TraverseMask, mut visit: impl FnMut(CellId)) {
    let cell = arena.get(id);
    if mask.contains(TraverseMask::ALT)
        && let Some(alt) = cell.alt
    {
        visit(alt);
    }
    if let Payload::Expr(expr) = &cell.payload {
        if mask.contains(TraverseMask::ARGS) {
            for arg in expr.args.iter().flatten() {
                visit(*arg);
            }
        }
        if mask.contains(TraverseMask::DEPS) {
            for dep in &expr.deps {
                visit(*dep);
            }
        }
    }
    if mask.contains(TraverseMask::LIST)
        && let Payload::Value(value) = &cell.payload
        && let Some(items) = value.as_list()
    {
        for item in items {
            visit(*item);
        }
    }
}
