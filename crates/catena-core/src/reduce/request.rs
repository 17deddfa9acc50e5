//! The type/arity context a cell is reduced under, and the four
//! outcomes a reduction step can produce.
//!
//! Grounded on `original_source/rt_types.h`'s `context_t`/`request_t`
//! bitfield and `eval.c`'s `REQ(...)` constructor macro.

use crate::cell::Exclusive;

/// `request.t` plus the arity/priority/inversion fields it carries
/// alongside the target type.
#[derive(Clone, Copy, Debug)]
pub struct Request {
    pub target_type: Exclusive,
    pub expected_in: u8,
    pub expected_out: u8,
    /// Whether a pending `assert`'s predicate may be left as DELAY
    /// rather than forced immediately — set by `assert`/`seq`/
    /// `otherwise` when forcing their secondary argument.
    pub delay_assert: bool,
    /// Priority pass this request belongs to; a handler returning
    /// [`Response::Delay`] is asking for a higher value on retry.
    pub priority: u32,
    /// Hint from an operator above that it would prefer its argument
    /// pre-inverted (used by `compose`'s row convention); opaque to
    /// everything but the handler that set it.
    pub inverse_hint: bool,
}

impl Request {
    pub const ANY: Request = Request {
        target_type: Exclusive::Any,
        expected_in: 0,
        expected_out: 1,
        delay_assert: false,
        priority: 0,
        inverse_hint: false,
    };

    pub fn of(target_type: Exclusive) -> Request {
        Request {
            target_type,
            ..Request::ANY
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Request {
        self.priority = priority;
        self
    }

    pub fn with_arity(mut self, expected_in: u8, expected_out: u8) -> Request {
        self.expected_in = expected_in;
        self.expected_out = expected_out;
        self
    }
}

/// The four outcomes every reduction step can produce (spec.md §3's
/// `Response` enum, `response_t` in the original).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Response {
    Success,
    Fail,
    /// The requested priority is below what this operator needs; `*cp`
    /// is left untouched and the caller should retry at a higher
    /// priority pass.
    Delay,
    /// The handler rewrote `*cp` into a different operator; the caller
    /// must loop back and re-dispatch.
    Retry,
}

impl Response {
    pub fn is_success(self) -> bool {
        matches!(self, Response::Success)
    }

    pub fn is_fail(self) -> bool {
        matches!(self, Response::Fail)
    }
}
