//! Integer and float arithmetic, plus the `->f`/`trunc` conversions.
//!
//! Grounded on `original_source/primitive.c`'s `func_op2` (generic
//! two-argument numeric handler dispatching to `OP_add`/`OP_sub`/...)
//! and `func_op1` for the unary float functions.

use crate::altset::AltSet;
use crate::cell::{CellId, Exclusive, Op, Value};
use crate::eval::Engine;

use super::super::{accumulate, arg_value, install_result, install_variable_result};
use super::super::{reduce_expr_arg, AltTemplate, Request, Response};

fn current_op(engine: &Engine, cp: CellId) -> Option<Op> {
    engine.arena.get(cp).as_expr().map(|e| e.op)
}

pub fn reduce_int_binary(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let Some(op) = current_op(engine, *cp) else {
        return Response::Fail;
    };
    if !matches!(req.target_type, Exclusive::Any | Exclusive::Int) {
        return Response::Fail;
    }
    let template = AltTemplate::capture(engine, *cp);
    let arg_req = Request::of(Exclusive::Int);

    let (resp0, alt0) = reduce_expr_arg(engine, *cp, 0, arg_req);
    if !resp0.is_success() {
        return resp0;
    }
    let (resp1, alt1) = reduce_expr_arg(engine, *cp, 1, arg_req);
    if !resp1.is_success() {
        return resp1;
    }

    let lhs = arg_value(engine, *cp, 0);
    let rhs = arg_value(engine, *cp, 1);
    let mut alt_set = AltSet::EMPTY;
    if !accumulate(&mut alt_set, &lhs) || !accumulate(&mut alt_set, &rhs) {
        return Response::Fail;
    }
    let pending = alt0.map(|s| (0, s)).or_else(|| alt1.map(|s| (1, s)));

    if lhs.ty.is_var() || rhs.ty.is_var() {
        let arg_ids = vec![
            engine.arena.get(*cp).as_expr().unwrap().args[0].unwrap(),
            engine.arena.get(*cp).as_expr().unwrap().args[1].unwrap(),
        ];
        return install_variable_result(
            engine,
            cp,
            template,
            op,
            Exclusive::Int,
            alt_set,
            pending,
            arg_ids,
            None,
        );
    }

    let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) else {
        return Response::Fail;
    };
    let result = match op {
        Op::Add => a.checked_add(b),
        Op::Sub => a.checked_sub(b),
        Op::Mul => a.checked_mul(b),
        Op::Div => (b != 0).then(|| a.wrapping_div(b)),
        Op::Mod => (b != 0).then(|| a.wrapping_rem(b)),
        Op::BitAnd => Some(a & b),
        Op::BitOr => Some(a | b),
        Op::BitXor => Some(a ^ b),
        Op::Shl => Some(a.wrapping_shl((b & 63) as u32)),
        Op::Shr => Some(a.wrapping_shr((b & 63) as u32)),
        _ => unreachable!("int-binary handler registered for non-int-binary op"),
    };
    let Some(result) = result else {
        return Response::Fail;
    };
    let mut value = Value::int(result);
    value.alt_set = alt_set;
    value.add_conditions(&[&lhs, &rhs]);
    install_result(engine, cp, template, value, pending)
}

pub fn reduce_float(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let Some(op) = current_op(engine, *cp) else {
        return Response::Fail;
    };
    if !matches!(req.target_type, Exclusive::Any | Exclusive::Float) {
        return Response::Fail;
    }
    let template = AltTemplate::capture(engine, *cp);
    let arg_req = Request::of(Exclusive::Float);
    let arity = if matches!(op, Op::Log | Op::Exp | Op::Sin | Op::Cos) {
        1
    } else {
        2
    };

    let (resp0, alt0) = reduce_expr_arg(engine, *cp, 0, arg_req);
    if !resp0.is_success() {
        return resp0;
    }
    let mut alt_set = AltSet::EMPTY;
    let lhs = arg_value(engine, *cp, 0);
    if !accumulate(&mut alt_set, &lhs) {
        return Response::Fail;
    }

    let (rhs, alt1) = if arity == 2 {
        let (resp1, alt1) = reduce_expr_arg(engine, *cp, 1, arg_req);
        if !resp1.is_success() {
            return resp1;
        }
        let rhs = arg_value(engine, *cp, 1);
        if !accumulate(&mut alt_set, &rhs) {
            return Response::Fail;
        }
        (Some(rhs), alt1)
    } else {
        (None, None)
    };
    let pending = alt0.map(|s| (0, s)).or_else(|| alt1.map(|s| (1, s)));

    let is_var = lhs.ty.is_var() || rhs.as_ref().is_some_and(|v| v.ty.is_var());
    if is_var {
        let mut arg_ids = vec![engine.arena.get(*cp).as_expr().unwrap().args[0].unwrap()];
        if arity == 2 {
            arg_ids.push(engine.arena.get(*cp).as_expr().unwrap().args[1].unwrap());
        }
        return install_variable_result(
            engine,
            cp,
            template,
            op,
            Exclusive::Float,
            alt_set,
            pending,
            arg_ids,
            None,
        );
    }

    let Some(a) = lhs.as_float() else {
        return Response::Fail;
    };
    let result = match op {
        Op::AddF => a + rhs.as_ref().and_then(Value::as_float).unwrap(),
        Op::SubF => a - rhs.as_ref().and_then(Value::as_float).unwrap(),
        Op::MulF => a * rhs.as_ref().and_then(Value::as_float).unwrap(),
        Op::DivF => {
            let b = rhs.as_ref().and_then(Value::as_float).unwrap();
            if b == 0.0 {
                return Response::Fail;
            }
            a / b
        }
        Op::Log => a.ln(),
        Op::Exp => a.exp(),
        Op::Sin => a.sin(),
        Op::Cos => a.cos(),
        Op::Atan2 => a.atan2(rhs.as_ref().and_then(Value::as_float).unwrap()),
        _ => unreachable!("float handler registered for non-float op"),
    };
    let mut value = Value::float(result);
    value.alt_set = alt_set;
    value.add_conditions(&[&lhs]);
    if let Some(rhs) = &rhs {
        value.add_conditions(&[rhs]);
    }
    install_result(engine, cp, template, value, pending)
}

pub fn reduce_convert(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let Some(op) = current_op(engine, *cp) else {
        return Response::Fail;
    };
    let (want, template) = match op {
        Op::ToFloat => (Exclusive::Int, AltTemplate::capture(engine, *cp)),
        Op::Trunc => (Exclusive::Float, AltTemplate::capture(engine, *cp)),
        _ => unreachable!("convert handler registered for non-convert op"),
    };
    let result_type = if op == Op::ToFloat {
        Exclusive::Float
    } else {
        Exclusive::Int
    };
    if !matches!(req.target_type, Exclusive::Any) && req.target_type != result_type {
        return Response::Fail;
    }

    let (resp, alt) = reduce_expr_arg(engine, *cp, 0, Request::of(want));
    if !resp.is_success() {
        return resp;
    }
    let arg = arg_value(engine, *cp, 0);
    let mut alt_set = AltSet::EMPTY;
    if !accumulate(&mut alt_set, &arg) {
        return Response::Fail;
    }
    let pending = alt.map(|s| (0, s));

    if arg.ty.is_var() {
        let arg_id = engine.arena.get(*cp).as_expr().unwrap().args[0].unwrap();
        return install_variable_result(
            engine,
            cp,
            template,
            op,
            result_type,
            alt_set,
            pending,
            vec![arg_id],
            None,
        );
    }

    let mut value = match op {
        Op::ToFloat => Value::float(arg.as_int().unwrap() as f64),
        Op::Trunc => Value::int(arg.as_float().unwrap() as i64),
        _ => unreachable!(),
    };
    value.alt_set = alt_set;
    value.add_conditions(&[&arg]);
    install_result(engine, cp, template, value, pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Value;

    #[test]
    fn addition_reduces_to_sum() {
        let mut engine = Engine::new();
        let one = engine.val(Value::int(1));
        let two = engine.val(Value::int(2));
        let mut add = engine.func(Op::Add, [one, two]);
        let resp = super::super::super::reduce(&mut engine, &mut add, Request::ANY);
        assert_eq!(resp, Response::Success);
        assert_eq!(engine.arena().get(add).as_value().unwrap().as_int(), Some(3));
    }

    #[test]
    fn division_by_zero_fails() {
        let mut engine = Engine::new();
        let five = engine.val(Value::int(5));
        let zero = engine.val(Value::int(0));
        let mut div = engine.func(Op::Div, [five, zero]);
        let resp = super::super::super::reduce(&mut engine, &mut div, Request::ANY);
        assert_eq!(resp, Response::Fail);
        assert!(engine.arena().get(div).as_value().unwrap().is_fail());
    }

    #[test]
    fn int_float_round_trip_preserves_value() {
        let mut engine = Engine::new();
        let n = engine.val(Value::int(7));
        let mut to_f = engine.func(Op::ToFloat, [n]);
        assert_eq!(
            super::super::super::reduce(&mut engine, &mut to_f, Request::ANY),
            Response::Success
        );
        let mut trunc = engine.func(Op::Trunc, [to_f]);
        assert_eq!(
            super::super::super::reduce(&mut engine, &mut trunc, Request::ANY),
            Response::Success
        );
        assert_eq!(engine.arena().get(trunc).as_value().unwrap().as_int(), Some(7));
    }
}
