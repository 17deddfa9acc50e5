//! Comparisons and logical negation: integer operands, symbol
//! (`True`/`False`) results.
//!
//! Grounded on `original_source/primitive.c`'s `func_op2` family as
//! instantiated for `OP_eq`/`OP_lt`/`OP_gt`, which compare reduced
//! `val_int` payloads and store a `SYM_True`/`SYM_False` result the
//! same way the arithmetic ops store a numeric one.

use crate::altset::AltSet;
use crate::cell::{CellId, Exclusive, Op, Symbol, Value};
use crate::eval::Engine;

use super::super::{accumulate, arg_value, install_result, install_variable_result};
use super::super::{reduce_expr_arg, AltTemplate, Request, Response};

fn current_op(engine: &Engine, cp: CellId) -> Option<Op> {
    engine.arena.get(cp).as_expr().map(|e| e.op)
}

pub fn reduce_compare(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    let Some(op) = current_op(engine, *cp) else {
        return Response::Fail;
    };
    if !matches!(req.target_type, Exclusive::Any | Exclusive::Symbol) {
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
            Exclusive::Symbol,
            alt_set,
            pending,
            arg_ids,
            None,
        );
    }

    let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) else {
        return Response::Fail;
    };
    let truth = match op {
        Op::Eq => a == b,
        Op::Lt => a < b,
        Op::Gt => a > b,
        _ => unreachable!("compare handler registered for non-compare op"),
    };
    let mut value = Value::symbol(if truth { Symbol::True } else { Symbol::False });
    value.alt_set = alt_set;
    value.add_conditions(&[&lhs, &rhs]);
    install_result(engine, cp, template, value, pending)
}

pub fn reduce_not(engine: &mut Engine, cp: &mut CellId, req: Request) -> Response {
    if !matches!(req.target_type, Exclusive::Any | Exclusive::Symbol) {
        return Response::Fail;
    }
    let template = AltTemplate::capture(engine, *cp);
    let (resp, alt) = reduce_expr_arg(engine, *cp, 0, Request::of(Exclusive::Symbol));
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
            Op::Not,
            Exclusive::Symbol,
            alt_set,
            pending,
            vec![arg_id],
            None,
        );
    }

    let Some(sym) = arg.as_symbol() else {
        return Response::Fail;
    };
    let negated = match sym {
        Symbol::True => Symbol::False,
        Symbol::False => Symbol::True,
        _ => return Response::Fail,
    };
    let mut value = Value::symbol(negated);
    value.alt_set = alt_set;
    value.add_conditions(&[&arg]);
    install_result(engine, cp, template, value, pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::reduce;

    #[test]
    fn equal_ints_compare_true() {
        let mut engine = Engine::new();
        let a = engine.val(Value::int(2));
        let b = engine.val(Value::int(2));
        let mut eq = engine.func(Op::Eq, [a, b]);
        assert_eq!(reduce(&mut engine, &mut eq, Request::ANY), Response::Success);
        assert_eq!(
            engine.arena().get(eq).as_value().unwrap().as_symbol(),
            Some(Symbol::True)
        );
    }

    #[test]
    fn less_than_is_false_when_not_strictly_smaller() {
        let mut engine = Engine::new();
        let a = engine.val(Value::int(5));
        let b = engine.val(Value::int(2));
        let mut lt = engine.func(Op::Lt, [a, b]);
        assert_eq!(reduce(&mut engine, &mut lt, Request::ANY), Response::Success);
        assert_eq!(
            engine.arena().get(lt).as_value().unwrap().as_symbol(),
            Some(Symbol::False)
        );
    }

    #[test]
    fn not_negates_the_symbol() {
        let mut engine = Engine::new();
        let t = engine.val(Value::symbol(Symbol::True));
        let mut not_t = engine.func(Op::Not, [t]);
        assert_eq!(reduce(&mut engine, &mut not_t, Request::ANY), Response::Success);
        assert_eq!(
            engine.arena().get(not_t).as_value().unwrap().as_symbol(),
            Some(Symbol::False)
        );
    }
}
