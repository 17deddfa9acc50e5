//! A hand-rolled stand-in for the (out-of-scope) lexer/parser: given an
//! [`Engine`], builds closure trees directly as cells the way a real
//! front end would after tokenizing and resolving a word table, so
//! `tests/scenarios.rs` can stand up spec.md §8's scenarios without
//! reaching into `reduce`'s crate-private helpers.

use catena_core::cell::{Cell, Expr, Op, Symbol, Value};
use catena_core::error::EvalResult;
use catena_core::eval::Engine;
use catena_core::CellId;

pub struct ClosureBuilder<'e> {
    pub engine: &'e mut Engine,
}

impl<'e> ClosureBuilder<'e> {
    pub fn new(engine: &'e mut Engine) -> Self {
        Self { engine }
    }

    pub fn int(&mut self, v: i64) -> CellId {
        self.engine.val(Value::int(v))
    }

    pub fn float(&mut self, v: f64) -> CellId {
        self.engine.val(Value::float(v))
    }

    pub fn symbol(&mut self, s: Symbol) -> CellId {
        self.engine.val(Value::symbol(s))
    }

    pub fn apply(&mut self, op: Op, args: impl IntoIterator<Item = CellId>) -> CellId {
        self.engine.func(op, args)
    }

    pub fn list(&mut self, items: impl IntoIterator<Item = CellId>) -> CellId {
        self.engine.val(Value::list(items.into_iter().collect()))
    }

    /// `[n OP]`: a one-element quote wrapping a single-hole transformer
    /// closure with `n` bound as the left operand — the shape a
    /// bracketed two-token word compiles to. Mirrors the construction
    /// `reduce::compose`'s own tests use internally, reproduced here
    /// since that module is crate-private to integration tests.
    pub fn quote_fixed_left(&mut self, op: Op, fixed_operand: i64) -> CellId {
        let n = self.int(fixed_operand);
        let mut expr = Expr::new(op, 2);
        expr.fill_next(n);
        expr.args.swap(0, 1);
        let transformer = self.engine.arena_mut().alloc(Cell::new_expr(expr));
        self.list([transformer])
    }

    pub fn eval(&mut self, roots: Vec<CellId>) -> EvalResult<Vec<CellId>> {
        self.engine.eval(roots)
    }

    pub fn int_of(&self, id: CellId) -> i64 {
        self.engine
            .arena()
            .get(id)
            .as_value()
            .unwrap()
            .as_int()
            .unwrap()
    }

    pub fn is_fail(&self, id: CellId) -> bool {
        self.engine.arena().get(id).as_value().unwrap().is_fail()
    }
}
