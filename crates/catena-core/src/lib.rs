//! `catena-core`: the graph reduction engine for a concatenative,
//! point-free language with lazy, nondeterministic semantics.
//!
//! The surface lexer, parser, module loader, structured logging
//! *subsystem*, hardware/bytecode backends, and REPL shell are external
//! collaborators and are not implemented here (see [`crate::io`] and
//! [`crate::trace`] for the trait boundaries they plug into). This crate
//! consumes a DAG of unreduced closures and a word table, and exposes
//! [`eval::Engine::eval`] as its single reduction entry point.

pub mod altset;
pub mod arena;
pub mod builder;
pub mod cell;
pub mod config;
pub mod error;
pub mod eval;
pub mod io;
pub mod reduce;
pub mod shape;
pub mod trace;

pub use altset::AltSet;
pub use arena::{Arena, RefCount};
pub use cell::{Cell, CellId};
pub use config::EngineConfig;
pub use error::EvalError;
pub use eval::Engine;
pub use reduce::{Request, Response};
