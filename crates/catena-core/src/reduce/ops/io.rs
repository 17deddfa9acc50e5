//! The `print` primitive: a symbol-tagged IO effect.
//!
//! Grounded on `original_source/primitive_io.c`'s IO-threading
//! primitives, which take the process-wide `SYM_IO` token as witness
//! and hand back an equally-valid token, and on `rt_types.h`'s split
//! between the concrete payload kinds this renders (`val_int`,
//! `val_float`, symbols, lists) and the handle-only `T_IO` exclusive
//! kind itself.

use crate::cell::{CellId, Exclusive, Symbol, Value, ValuePayload};
use crate::eval::Engine;

use super::super::{accumulate, arg_value, reduce_expr_arg};
use super::super::{Request, Response};
use crate::altset::AltSet;

/// `value print io`: args[0] is the value to render, args[1] the `IO`
/// witness token; the result is that same token, threaded through for
/// the next effect in sequence.
pub fn reduce_print(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    if !matches!(req.target_type, Exclusive::Any | Exclusive::Io) {
        return Response::Fail;
    }

    let (resp_io, _) = reduce_expr_arg(engine, *cp, 1, Request::of(Exclusive::Io));
    if !resp_io.is_success() {
        return resp_io;
    }
    let io_token = arg_value(engine, *cp, 1);
    if io_token.as_symbol() != Some(Symbol::Io) {
        return Response::Fail;
    }

    let (resp_val, _) = reduce_expr_arg(engine, *cp, 0, Request::ANY);
    if !resp_val.is_success() {
        return resp_val;
    }
    let value = arg_value(engine, *cp, 0);
    if value.ty.is_var() {
        // Printing demands a concrete witness; an unresolved partial
        // evaluation placeholder cannot be rendered.
        return Response::Fail;
    }
    let mut alt_set = AltSet::EMPTY;
    if !accumulate(&mut alt_set, &value) || !accumulate(&mut alt_set, &io_token) {
        return Response::Fail;
    }

    let rendered = render(engine, &value);
    engine.io.write_value(&rendered);

    let old = *cp;
    *cp = engine.io_symbol();
    engine.arena.drop_cell(old);
    Response::Success
}

fn render(engine: &Engine, value: &Value) -> String {
    match &value.payload {
        ValuePayload::Int(v) => v.to_string(),
        ValuePayload::Float(v) => v.to_string(),
        ValuePayload::Symbol(Symbol::True) => "true".to_string(),
        ValuePayload::Symbol(Symbol::False) => "false".to_string(),
        ValuePayload::Symbol(Symbol::Io) => "io".to_string(),
        ValuePayload::Symbol(Symbol::Dict) => "dict".to_string(),
        ValuePayload::Str(s) => s.clone(),
        ValuePayload::List(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|id| {
                    engine
                        .arena
                        .get(*id)
                        .as_value()
                        .map(|v| render(engine, v))
                        .unwrap_or_else(|| "?".to_string())
                })
                .collect();
            format!("[{}]", rendered.join(", "))
        }
        ValuePayload::Var(_) => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Op;
    use crate::io::BufferIoPort;
    use crate::reduce::reduce;

    #[test]
    fn print_renders_value_and_threads_io() {
        let mut engine = Engine::new();
        engine.set_io_port(BufferIoPort::new());
        let value = engine.val(Value::int(42));
        let io = engine.io_symbol();
        let mut call = engine.func(Op::Print, [value, io]);
        assert_eq!(reduce(&mut engine, &mut call, Request::ANY), Response::Success);
        assert_eq!(call, engine.io_symbol());
    }

    #[test]
    fn print_without_io_witness_fails() {
        let mut engine = Engine::new();
        let value = engine.val(Value::int(1));
        let not_io = engine.val(Value::int(0));
        let mut call = engine.func(Op::Print, [value, not_io]);
        assert_eq!(reduce(&mut engine, &mut call, Request::ANY), Response::Fail);
    }
}
