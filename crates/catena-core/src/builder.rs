//! Ergonomic construction of compiled function bodies ([`Entry::body`]).
//!
//! The surface compiler that turns source text into [`BodyOp`] sequences
//! is out of scope (spec.md §1); what it hands the core is a finished
//! [`Entry`] sitting in an arena slot. This builder is the shape that
//! handoff takes in-process — for tests, and for an embedder wiring its
//! own front end straight against the core instead of going through the
//! (absent) parser collaborator. Grounded on `original_source/user_func.c`'s
//! two-phase "declare the entry, then fill in its body" compilation
//! (`ENTRY_COMPLETE` is only set once the body is known to be well-formed),
//! which is why [`EntryBuilder::declare`] and [`EntryBuilder::finish`] are
//! separate steps: a recursive function's own body needs to reference its
//! entry's [`CellId`] before that body exists.

use std::sync::Arc;

use crate::cell::{BodyOp, CellId, Entry, EntryFlags, Op};
use crate::eval::Engine;

/// Accumulates a function entry's body against a single forward-declared
/// arena slot. Until [`EntryBuilder::finish`] is called the entry's body
/// is empty, so [`crate::reduce::funcall`] treats any call through it as
/// "being compiled" (spec.md §4.H step 1) and won't attempt to expand it.
pub struct EntryBuilder {
    id: CellId,
}

impl EntryBuilder {
    /// Allocates the entry cell with an empty body and returns a builder
    /// addressing it. The returned [`CellId`] is stable immediately, so a
    /// recursive function can reference it in its own body via
    /// [`EntryBuilder::call`] before [`EntryBuilder::finish`] runs.
    pub fn declare(
        engine: &mut Engine,
        name: impl Into<Arc<str>>,
        arity_in: u16,
        arity_out: u16,
    ) -> Self {
        let id = engine.define_entry(Entry::new(name, arity_in, arity_out));
        Self { id }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    fn push(&mut self, engine: &mut Engine, op: BodyOp) -> usize {
        let entry = engine
            .arena_mut()
            .get_mut(self.id)
            .as_entry_mut()
            .expect("EntryBuilder::id must name an Entry cell");
        entry.body.push(op);
        entry.body.len() - 1
    }

    /// Appends a reference to the call's `n`th input parameter, returning
    /// its body-local index for use in later steps' `args`.
    pub fn param(&mut self, engine: &mut Engine, n: u16) -> usize {
        self.push(engine, BodyOp::Param(n))
    }

    /// Appends a primitive application over prior body-local indices.
    pub fn apply(&mut self, engine: &mut Engine, op: Op, args: Vec<usize>) -> usize {
        self.push(engine, BodyOp::Apply { op, args })
    }

    /// Appends a call to another (or, for recursion, the same) entry.
    pub fn call(&mut self, engine: &mut Engine, entry: CellId, args: Vec<usize>) -> usize {
        self.push(engine, BodyOp::Call { entry, args })
    }

    /// Appends a return. Calling this more than once declares a
    /// multi-branch function body; `alt_id` distinguishes which branch
    /// each return represents the way `|`'s two id-wrapped alternates do
    /// (spec.md §4.H step 4).
    pub fn ret(&mut self, engine: &mut Engine, values: Vec<usize>, alt_id: u32) -> usize {
        self.push(engine, BodyOp::Return { values, alt_id })
    }

    /// Marks the entry complete, optionally recursive, making it eligible
    /// for expansion by [`crate::reduce::funcall`]. An entry left
    /// unfinished (body populated but `COMPLETE` unset) is indistinguishable
    /// from one still being compiled, by design: half-built bodies must
    /// never be expanded at a call site.
    pub fn finish(self, engine: &mut Engine, recursive: bool) -> CellId {
        let entry = engine
            .arena_mut()
            .get_mut(self.id)
            .as_entry_mut()
            .expect("EntryBuilder::id must name an Entry cell");
        entry.flags = entry.flags.set(EntryFlags::COMPLETE);
        if recursive {
            entry.flags = entry.flags.set(EntryFlags::RECURSIVE);
        }
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Exclusive, Value};
    use crate::reduce::{reduce, Request, Response};

    /// `double(n) = n + n`, a straight-line (non-recursive) body.
    #[test]
    fn builds_a_straight_line_function() {
        let mut engine = Engine::new();
        let mut b = EntryBuilder::declare(&mut engine, "double", 1, 1);
        let p0 = b.param(&mut engine, 0);
        let p1 = b.param(&mut engine, 0);
        let sum = b.apply(&mut engine, Op::Add, vec![p0, p1]);
        b.ret(&mut engine, vec![sum], 0);
        let entry = b.finish(&mut engine, false);

        let arg = engine.val(Value::int(21));
        let mut call = engine.call_entry(entry, [arg]);
        let resp = reduce(&mut engine, &mut call, Request::of(Exclusive::Int));
        assert_eq!(resp, Response::Success);
        assert_eq!(engine.arena().get(call).as_value().unwrap().as_int(), Some(42));
    }
}
