//! The primitive operator table: one handler per [`Op`] tag, looked up
//! the same way a word-table entry is (spec.md §6's "static array of
//! {name, handler, in_arity, out_arity} tuples"), grounded directly on
//! `dfir_lang::graph::ops`'s static `OPERATORS` table and
//! `operator_lookup()`.

mod arith;
mod compare;
mod control;
mod io;

use crate::cell::{CellId, Op};
use crate::eval::Engine;

use super::{Request, Response};

pub type Handler = fn(&mut Engine, &mut CellId, Request) -> Response;

/// Maps an [`Op`] to the handler that implements its five-step
/// protocol. `Value` never reaches here (it is intercepted earlier in
/// [`super::reduce`]); `Exec`, `Compose`/`Ap`, and the assertion family
/// live in their own modules since their arity isn't fixed.
pub fn operator_lookup(op: Op) -> Handler {
    use Op::*;
    match op {
        Value => |_, _, _| Response::Fail,
        Exec => super::funcall::reduce_exec,
        Id => control::reduce_id,
        Dup => control::reduce_dup,
        Swap => control::reduce_swap,
        Drop => control::reduce_drop,
        Alt => control::reduce_alt_op,
        Dep => control::reduce_dep,
        Add | Sub | Mul | Div | Mod | BitAnd | BitOr | BitXor | Shl | Shr => {
            arith::reduce_int_binary
        }
        AddF | SubF | MulF | DivF | Log | Exp | Sin | Cos | Atan2 => arith::reduce_float,
        Eq | Lt | Gt => compare::reduce_compare,
        Not => compare::reduce_not,
        ToFloat | Trunc => arith::reduce_convert,
        Compose | Ap => super::compose::reduce_compose,
        Assert | Seq | Otherwise => super::assert::reduce_assert_family,
        Print => io::reduce_print,
    }
}
