//! Compiled user functions (`entry` cells in the original).
//!
//! Grounded on `original_source/rt_types.h`'s `struct entry` (`rec`,
//! `flags`, `in`, `out`, `len`, `parent`, `initial`) and on
//! `original_source/user_func.c`'s expansion of a traced body into fresh
//! cells at call sites.

use std::sync::Arc;

use super::{CellId, Op};

/// One instruction in a compiled function body template. The body is a
/// small closure-construction IR (not yet cell pointers — those only
/// exist once the template is instantiated at a call site) ending in one
/// or more [`BodyOp::Return`]s linked by alternation, matching
/// `original_source/rt_types.h`'s `T_RETURN` cells.
#[derive(Clone, Debug)]
pub enum BodyOp {
    /// Reference to the call's `n`th input parameter.
    Param(u16),
    /// Apply a primitive or nested `Exec` to the given body-local operand
    /// indices (each either a `Param` or a prior `Op`'s result).
    Apply { op: Op, args: Vec<usize> },
    /// A call to another (or the same, for recursion) function entry.
    Call { entry: CellId, args: Vec<usize> },
    /// One of the function's returns: `values` indexes prior body steps,
    /// `alt_id` distinguishes which branch of a choice produced it.
    Return { values: Vec<usize>, alt_id: u32 },
}

/// `ENTRY_PRIMITIVE | ENTRY_TRACE | ENTRY_RECURSIVE | ENTRY_QUOTE |
/// ENTRY_ROW | ENTRY_MOV_VARS | ENTRY_COMPLETE` in the original.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct EntryFlags(u8);

impl EntryFlags {
    pub const RECURSIVE: EntryFlags = EntryFlags(0x04);
    pub const ROW: EntryFlags = EntryFlags(0x10);
    pub const COMPLETE: EntryFlags = EntryFlags(0x80);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, flag: EntryFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn set(mut self, flag: EntryFlags) -> Self {
        self.0 |= flag.0;
        self
    }
}

/// A compiled user function: header plus a body of trace cells ending in
/// one or more return cells (`entry_t` + its body in the original).
#[derive(Clone, Debug)]
pub struct Entry {
    pub name: Arc<str>,
    pub arity_in: u16,
    pub arity_out: u16,
    pub flags: EntryFlags,
    /// Populated by [`crate::builder::EntryBuilder`] before `flags` gains
    /// [`EntryFlags::COMPLETE`]; until then `is_being_compiled` reports
    /// true and expansion must not be attempted (spec.md §4.H step 1).
    pub body: Vec<BodyOp>,
    pub parent: Option<CellId>,
    /// The outermost recursive call site, used as the unification target
    /// (`initial_word` in spec.md §4.H step 2).
    pub initial: Option<CellId>,
}

impl Entry {
    pub fn new(name: impl Into<Arc<str>>, arity_in: u16, arity_out: u16) -> Self {
        Self {
            name: name.into(),
            arity_in,
            arity_out,
            flags: EntryFlags::empty(),
            body: Vec::new(),
            parent: None,
            initial: None,
        }
    }

    pub fn is_being_compiled(&self) -> bool {
        !self.flags.contains(EntryFlags::COMPLETE)
    }

    pub fn is_recursive(&self) -> bool {
        self.flags.contains(EntryFlags::RECURSIVE)
    }
}
