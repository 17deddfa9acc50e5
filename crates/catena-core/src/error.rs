//! Fatal, boundary-crossing errors.
//!
//! Ordinary reduction failure (`5 0 /` producing `fail`, an `assert`
//! rejecting its condition) is data, not an error — it flows back to the
//! caller as [`crate::reduce::Response::Fail`]. The variants here are
//! reserved for conditions that mean the engine itself cannot continue:
//! an internal invariant broken, a resource limit exhausted. Modeled with
//! `thiserror` at the crate boundary, the way `dfir_lang`'s
//! `Diagnostic`/`Diagnostics` (`dfir_lang/src/diagnostic.rs`) wraps
//! compiler-boundary failures for callers outside the compiler.

use crate::cell::CellId;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("reduction recursed past the configured limit ({limit})")]
    RecursionLimit { limit: usize },

    #[error("reduce loop exceeded its delay budget ({limit} passes)")]
    DelayLimit { limit: usize },

    /// Surfaced by [`crate::eval::Engine::eval`] in place of
    /// [`EvalError::DelayLimit`] when the delay budget is exhausted
    /// while [`crate::altset::AltIdAllocator`] is also exhausted — a more
    /// actionable diagnostic than the generic delay-budget message, since
    /// it names the actual resource that ran out. Ordinary per-operator
    /// alt-id exhaustion (`|`, a multi-branch function's Return fields)
    /// never reaches here: those fail locally as `Response::Fail`,
    /// per spec.md §7's classification of alt-set exhaustion as a local,
    /// recoverable condition rather than an engine-fatal one.
    #[error("alt-set id space exhausted ({max} fields in use)")]
    AltIdsExhausted { max: u32 },

    #[error("cell {0:?} leaked: refcount never reached zero and was never persistent")]
    Leak(CellId),

    #[error("function entry {0:?} referenced before its body finished compiling")]
    Incomplete(CellId),

    #[error("closure {0:?} has the wrong arity for operator {op}", op = .1.name())]
    ArityMismatch(CellId, crate::cell::Op),

    #[error("word table has no entry named {0:?}")]
    UnknownWord(String),
}

pub type EvalResult<T> = Result<T, EvalError>;
