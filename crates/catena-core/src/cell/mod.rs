//! The universal cell: the single node type every reduction operates on.
//!
//! Grounded on `original_source/rt_types.h`'s `struct cell`, a packed
//! union of `expr`/`value`/`entry` payloads sharing one fixed-size slot,
//! and on `dfir_lang`'s `GraphNode`/`slotmap`-keyed arena, which is the
//! same "uniform fixed-size node identified by a generational key" shape.
//! Per spec.md §9's design note, this is modeled as an enum-of-structs,
//! not an inheritance hierarchy.

mod entry;
mod expr;
mod op;
mod value;

pub use entry::{BodyOp, Entry, EntryFlags};
pub use expr::{Expr, ExprFlags};
pub use op::Op;
pub use value::{Condition, Exclusive, Symbol, TraceCell, TypeFlags, Value, ValuePayload, ValueType};

use crate::arena::RefCount;

slotmap::new_key_type! {
    /// A reference to a cell in the [`crate::arena::Arena`]. Generational,
    /// so a stale `CellId` from a freed slot is never silently aliased to
    /// an unrelated live cell.
    pub struct CellId;
}

/// The universal node. All three payload variants share this wrapper;
/// `size`/`pos` are carried on every variant the way they are in the
/// packed C `cell_t`, even though only `Expr` and list `Value`s use
/// `size` for anything (closures spanning more than one slot).
#[derive(Clone, Debug)]
pub struct Cell {
    /// Link to the next alternate in a choice chain. Counted like any
    /// other outgoing reference for `drop` purposes, but never itself
    /// contributes to *this* cell's `n` (spec.md §3: "weak link").
    pub alt: Option<CellId>,
    pub n: RefCount,
    pub size: u16,
    pub pos: u8,
    pub payload: Payload,
}

/// The tagged variant a cell holds. `op` in the original is folded into
/// this enum's discriminant plus, for `Expr`, the operator it names.
#[derive(Clone, Debug)]
pub enum Payload {
    Expr(Expr),
    Value(Value),
    Entry(Entry),
}

impl Cell {
    pub fn new_expr(expr: Expr) -> Self {
        Self {
            alt: None,
            n: 0,
            size: 1,
            pos: 0,
            payload: Payload::Expr(expr),
        }
    }

    pub fn new_value(value: Value) -> Self {
        Self {
            alt: None,
            n: 0,
            size: 1,
            pos: 0,
            payload: Payload::Value(value),
        }
    }

    pub fn new_entry(entry: Entry) -> Self {
        Self {
            alt: None,
            n: 0,
            size: 1,
            pos: 0,
            payload: Payload::Entry(entry),
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match &self.payload {
            Payload::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_expr_mut(&mut self) -> Option<&mut Expr> {
        match &mut self.payload {
            Payload::Expr(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_value_mut(&mut self) -> Option<&mut Value> {
        match &mut self.payload {
            Payload::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match &self.payload {
            Payload::Entry(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_entry_mut(&mut self) -> Option<&mut Entry> {
        match &mut self.payload {
            Payload::Entry(e) => Some(e),
            _ => None,
        }
    }
}
