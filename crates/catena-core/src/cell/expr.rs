//! Unreduced closures: an operator plus a partially- or fully-filled
//! argument vector.
//!
//! Grounded on `original_source/rt_types.h`'s `struct expr` (`out`,
//! `flags`, `arg[]`) with the C bit flags turned into a small flag set.

use smallvec::SmallVec;

use super::{CellId, Op};
use crate::altset::AltSet;

/// `expr.flags`: `EXPR_NEEDS_ARG | EXPR_RECURSIVE | EXPR_TRACE |
/// EXPR_NO_UNIFY` in the original.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ExprFlags(u8);

impl ExprFlags {
    pub const NEEDS_ARG: ExprFlags = ExprFlags(0x01);
    pub const RECURSIVE: ExprFlags = ExprFlags(0x02);
    pub const TRACED: ExprFlags = ExprFlags(0x04);
    pub const NO_UNIFY: ExprFlags = ExprFlags(0x08);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, flag: ExprFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn set(&mut self, flag: ExprFlags) {
        self.0 |= flag.0;
    }

    pub fn clear(&mut self, flag: ExprFlags) {
        self.0 &= !flag.0;
    }

    pub fn union(self, other: ExprFlags) -> ExprFlags {
        ExprFlags(self.0 | other.0)
    }
}

/// An unreduced closure: an operator applied to a (possibly incomplete)
/// argument vector, plus the extra result `dep` cells a multi-output
/// operator (e.g. `swap`, `compose`) needs.
#[derive(Clone, Debug)]
pub struct Expr {
    pub op: Op,
    /// Number of additional output `dep`s beyond the primary result.
    pub out: u8,
    pub flags: ExprFlags,
    /// Left-to-right argument slots. `None` marks an unfilled hole;
    /// `NEEDS_ARG` is cleared exactly when no hole remains.
    pub args: SmallVec<[Option<CellId>; 2]>,
    /// For `Exec`: the function table entry being called.
    pub entry: Option<CellId>,
    /// A bias this closure must union into whatever value it eventually
    /// becomes, before even that value's own `alt_set` is unioned in.
    /// Carried by the `id`-wrapped branches `|` produces (spec.md §4.E's
    /// "each carrying a fresh alt-set field") and otherwise empty.
    pub alt_set: AltSet,
    /// The secondary-output `Dep` cells this closure owns, one per
    /// `out`, populated by whoever constructed a multi-output closure
    /// (`dup`, `swap`, `compose`) so its handler knows where to install
    /// each extra result (GLOSSARY "Dep").
    pub deps: SmallVec<[CellId; 1]>,
}

impl Expr {
    pub fn new(op: Op, arity_in: usize) -> Self {
        let mut flags = ExprFlags::empty();
        if arity_in > 0 {
            flags.set(ExprFlags::NEEDS_ARG);
        }
        Self {
            op,
            out: 0,
            flags,
            args: smallvec::smallvec![None; arity_in],
            entry: None,
            alt_set: AltSet::EMPTY,
            deps: SmallVec::new(),
        }
    }

    /// Fills the next empty argument slot, left to right. Returns `true`
    /// once the vector has no more holes (mirrors `fill_args`'s
    /// `EXPR_NEEDS_ARG` clearing).
    pub fn fill_next(&mut self, arg: CellId) -> bool {
        for slot in self.args.iter_mut() {
            if slot.is_none() {
                *slot = Some(arg);
                break;
            }
        }
        let full = self.args.iter().all(Option::is_some);
        if full {
            self.flags.clear(ExprFlags::NEEDS_ARG);
        }
        full
    }

    pub fn is_ready(&self) -> bool {
        !self.flags.contains(ExprFlags::NEEDS_ARG)
    }
}
