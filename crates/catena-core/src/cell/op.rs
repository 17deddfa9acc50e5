//! The `op` tag, discriminating a cell's variant and, for expression
//! cells, which primitive or user function it invokes.
//!
//! Grounded on `original_source/rt_types.h`'s `op` enum (`OP_##name`
//! generated from an op-list) and on `dfir_lang::graph::ops`'s static
//! `OPERATORS` table of named operators, which plays the same role as
//! PoprC's word table.

/// Discriminates a [`super::Payload`] variant and, for primitives, which
/// operator a cell invokes.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Op {
    /// A reduced value cell (see [`super::Value`]).
    Value,
    /// A call to a compiled user function (see [`super::Entry`]).
    Exec,

    // control / stack shuffling
    Id,
    Dup,
    Swap,
    Drop,
    /// `|`, nondeterministic choice.
    Alt,
    /// A multi-output operator's secondary result cell, linked back to
    /// its owner via its sole argument slot (GLOSSARY "Dep"). Never
    /// looked up by name; constructed only by [`crate::eval::Engine`]
    /// helpers alongside `dup`/`swap`/`compose`.
    Dep,

    // integer arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,

    // float arithmetic
    AddF,
    SubF,
    MulF,
    DivF,
    Log,
    Exp,
    Sin,
    Cos,
    Atan2,

    // comparisons / logic
    Eq,
    Lt,
    Gt,
    Not,

    // conversions
    ToFloat,
    Trunc,

    // composition
    Compose,
    Ap,

    // assertions / sequencing
    Assert,
    Seq,
    Otherwise,

    // IO
    Print,
}

impl Op {
    /// The name this operator is looked up by in the word table, matching
    /// the source-level token (e.g. `"+"`, `"swap"`).
    pub fn name(self) -> &'static str {
        use Op::*;
        match self {
            Value => "value",
            Exec => "exec",
            Id => "id",
            Dup => "dup",
            Swap => "swap",
            Drop => "drop",
            Alt => "|",
            Dep => "dep",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            BitAnd => "&",
            BitOr => "|bit",
            BitXor => "^",
            Shl => "<<",
            Shr => ">>",
            AddF => "+f",
            SubF => "-f",
            MulF => "*f",
            DivF => "/f",
            Log => "log",
            Exp => "exp",
            Sin => "sin",
            Cos => "cos",
            Atan2 => "atan2",
            Eq => "=",
            Lt => "<",
            Gt => ">",
            Not => "not",
            ToFloat => "->f",
            Trunc => "trunc",
            Compose => ".",
            Ap => "ap",
            Assert => "!",
            Seq => "seq",
            Otherwise => "otherwise",
            Print => "print",
        }
    }

    /// Static input/output arity for primitives with fixed shape.
    /// `Exec` and `Compose`/`Ap` have call-site-dependent arity and are
    /// not covered here (see [`crate::reduce::ops`] and
    /// [`crate::reduce::compose`]).
    pub fn fixed_arity(self) -> Option<(u8, u8)> {
        use Op::*;
        Some(match self {
            Id | Not | ToFloat | Trunc => (1, 1),
            // `drop a b` keeps `a`, discards `b` (PoprC's `WORD("drop", drop, 2, 1)`).
            Drop => (2, 1),
            Dup => (1, 2),
            Swap => (2, 2),
            Alt => (2, 1),
            // a dep's sole slot is its owner's id; it produces the owner's
            // secondary result in place rather than through a normal arg.
            Dep => (1, 0),
            Add | Sub | Mul | Div | Mod | BitAnd | BitOr | BitXor | Shl | Shr | AddF | SubF
            | MulF | DivF | Atan2 | Eq | Lt | Gt => (2, 1),
            Log | Exp | Sin | Cos => (1, 1),
            Assert | Seq | Otherwise => (2, 1),
            Print => (2, 1),
            Value | Exec | Compose | Ap => return None,
        })
    }
}
