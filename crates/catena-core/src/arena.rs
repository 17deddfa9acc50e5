//! The cell arena: the sole allocator backing every [`crate::cell::Cell`].
//!
//! Grounded on `dfir_lang`'s use of `slotmap` for `GraphNodeId`-keyed
//! storage — the same "uniform, generational, fixed-size slot" shape
//! spec.md §4.A asks for. `slotmap::SlotMap` already maintains the
//! free-list PoprC's `mem_t`/`op=null` linkage implements by hand, so
//! [`Arena::free`] simply removes the slot; there is no separate `Mem`
//! payload variant to model. The refcount discipline (`n`, `ref`/`drop`,
//! `unique`, `check_free`) is layered on top exactly as spec.md §4.A
//! specifies, since `slotmap` itself has no notion of shared ownership.

use slotmap::SlotMap;
use tracing::trace;

use crate::cell::{Cell, CellId, Payload};

/// `refcount_t` in the original: signed so the rollback protocol in
/// [`crate::reduce`] can detect over-drops (`n` falling below zero) as a
/// logic error rather than wrapping.
pub type RefCount = i16;

/// Sentinel `n` marking a cell as persistent: never counted, never
/// freed. (`PERSISTENT` in the original.)
pub const PERSISTENT: RefCount = RefCount::MIN;

/// The cell arena. Owns every live cell; all other structures address
/// cells only by [`CellId`].
#[derive(Default)]
pub struct Arena {
    slots: SlotMap<CellId, Cell>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a cell holding `cell`, with refcount zero (the caller is
    /// expected to `ref` it into whatever first holds it).
    pub fn alloc(&mut self, cell: Cell) -> CellId {
        self.slots.insert(cell)
    }

    /// Allocates a persistent cell: it is never reference-counted or
    /// freed. Used for process-wide constants (`True`, `False`, `IO`).
    pub fn alloc_persistent(&mut self, mut cell: Cell) -> CellId {
        cell.n = PERSISTENT;
        self.slots.insert(cell)
    }

    pub fn get(&self, id: CellId) -> &Cell {
        &self.slots[id]
    }

    pub fn get_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.slots[id]
    }

    pub fn try_get(&self, id: CellId) -> Option<&Cell> {
        self.slots.get(id)
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn is_persistent(&self, id: CellId) -> bool {
        self.slots.get(id).is_some_and(|c| c.n == PERSISTENT)
    }

    /// `ref(c)`: increments `n` unless persistent.
    pub fn incref(&mut self, id: CellId) -> CellId {
        if let Some(cell) = self.slots.get_mut(id)
            && cell.n != PERSISTENT
        {
            cell.n += 1;
        }
        id
    }

    /// `refn(c, k)`: adds `k` to `n` unless persistent.
    pub fn incref_n(&mut self, id: CellId, k: RefCount) {
        if let Some(cell) = self.slots.get_mut(id)
            && cell.n != PERSISTENT
        {
            cell.n += k;
        }
    }

    /// `drop(c)`: decrements `n`; once it would fall below zero, recurses
    /// into every outgoing reference (`alt`, argument vector, list
    /// spine) and returns the slot to the arena (`slotmap`'s own
    /// free-list handles reuse).
    pub fn drop_cell(&mut self, id: CellId) {
        let Some(cell) = self.slots.get_mut(id) else {
            return;
        };
        if cell.n == PERSISTENT {
            return;
        }
        cell.n -= 1;
        if cell.n >= 0 {
            return;
        }
        trace!(target: "FREE", cell = ?id, "reclaiming cell");
        let cell = self.slots.remove(id).expect("checked present above");
        if let Some(alt) = cell.alt {
            self.drop_cell(alt);
        }
        // `expr.deps` is deliberately left untouched here: like `alt`'s
        // sibling link, it's a weak back-reference for locating a dep
        // cell, not an owning edge. The owning edge runs the other way
        // (a `Dep` cell's own `args[0]` counts its owner), so an owner's
        // teardown must never cascade into dropping a dep that some
        // other, still-live holder may still be holding.
        match cell.payload {
            Payload::Expr(expr) => {
                for arg in expr.args.into_iter().flatten() {
                    self.drop_cell(arg);
                }
                if let Some(entry) = expr.entry {
                    self.drop_cell(entry);
                }
            }
            Payload::Value(value) => {
                if let crate::cell::ValuePayload::List(items) = value.payload {
                    for item in items {
                        self.drop_cell(item);
                    }
                }
            }
            Payload::Entry(entry) => {
                if let Some(parent) = entry.parent {
                    self.drop_cell(parent);
                }
            }
        }
    }

    /// Replaces `id`'s payload in place, preserving its identity (`n`,
    /// `alt`, `size`, `pos`) so every other holder of `id` observes the
    /// change without needing to revisit their own pointer. The
    /// displaced payload's outgoing references are dropped exactly as
    /// they would be on a normal teardown. This is the mechanism
    /// [`crate::reduce::ops::control::reduce_dep`] relies on: a `Dep`
    /// cell's id is handed out ahead of time and must stay stable while
    /// its owner installs the cell's eventual content into it.
    pub fn rewrite(&mut self, id: CellId, payload: Payload) {
        let old = std::mem::replace(&mut self.slots[id].payload, payload);
        self.drop_payload_refs(old);
    }

    fn drop_payload_refs(&mut self, payload: Payload) {
        match payload {
            Payload::Expr(expr) => {
                for arg in expr.args.into_iter().flatten() {
                    self.drop_cell(arg);
                }
                if let Some(entry) = expr.entry {
                    self.drop_cell(entry);
                }
            }
            Payload::Value(value) => {
                if let crate::cell::ValuePayload::List(items) = value.payload {
                    for item in items {
                        self.drop_cell(item);
                    }
                }
            }
            Payload::Entry(entry) => {
                if let Some(parent) = entry.parent {
                    self.drop_cell(parent);
                }
            }
        }
    }

    /// `unique(&c)`: if the cell has other holders (`n > 0` after this
    /// caller's own share), replaces it with a shallow copy (references
    /// re-`ref`-ed, not recursively copied) so in-place mutation is safe.
    /// Returns the id to mutate through.
    pub fn unique(&mut self, id: CellId) -> CellId {
        let cell = self.slots.get(id).expect("unique() of missing cell");
        if cell.n == PERSISTENT || cell.n <= 1 {
            return id;
        }
        let mut copy = cell.clone();
        copy.n = 0;
        if let Some(alt) = copy.alt {
            self.incref(alt);
        }
        match &copy.payload {
            Payload::Expr(expr) => {
                for arg in expr.args.iter().flatten().copied().collect::<Vec<_>>() {
                    self.incref(arg);
                }
                if let Some(entry) = expr.entry {
                    self.incref(entry);
                }
                // deps is a weak back-reference, not incref'd (see drop_cell).
            }
            Payload::Value(value) => {
                if let crate::cell::ValuePayload::List(items) = &value.payload {
                    for item in items.clone() {
                        self.incref(item);
                    }
                }
            }
            Payload::Entry(_) => {}
        }
        self.drop_cell(id);
        self.alloc(copy)
    }

    /// Every remaining non-persistent cell at this point is a leak
    /// (`check_free` in the original).
    pub fn leaked(&self) -> Vec<CellId> {
        self.slots
            .iter()
            .filter(|(_, c)| c.n != PERSISTENT)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Value;

    #[test]
    fn refcounting_frees_on_last_drop() {
        let mut arena = Arena::new();
        let id = arena.alloc(Cell::new_value(Value::int(1)));
        arena.incref(id);
        arena.incref(id);
        assert!(arena.contains(id));
        arena.drop_cell(id);
        assert!(arena.contains(id));
        arena.drop_cell(id);
        assert!(arena.contains(id));
        arena.drop_cell(id);
        assert!(!arena.contains(id));
    }

    #[test]
    fn persistent_cells_survive_any_number_of_drops() {
        let mut arena = Arena::new();
        let id = arena.alloc_persistent(Cell::new_value(Value::symbol(crate::cell::Symbol::True)));
        arena.drop_cell(id);
        arena.drop_cell(id);
        assert!(arena.contains(id));
        assert!(arena.leaked().is_empty());
    }

    #[test]
    fn drop_recurses_into_list_children() {
        let mut arena = Arena::new();
        let a = arena.alloc(Cell::new_value(Value::int(1)));
        arena.incref(a);
        let b = arena.alloc(Cell::new_value(Value::int(2)));
        arena.incref(b);
        let list = arena.alloc(Cell::new_value(Value::list(smallvec::smallvec![a, b])));
        arena.incref(list);
        arena.drop_cell(list);
        assert!(!arena.contains(list));
        assert!(!arena.contains(a));
        assert!(!arena.contains(b));
    }
}
