//! The partial-evaluation trace journal.
//!
//! Grounded on `original_source/rt_types.h`'s `trace_cell_t` and
//! `ENTRY_TRACE`/`EXPR_TRACE`: when a closure carries a traced flag, each
//! primitive step it takes is appended to a side table instead of (or in
//! addition to) being reduced immediately, so an external codegen
//! backend can later replay the recorded steps against concrete
//! arguments. That backend is out of scope here (spec.md's Non-goals);
//! this module only owns the recording side, exposed behind a trait so
//! embedders can route entries wherever they like — mirroring how
//! `dfir_rs::scheduled` hands lifecycle events to a `tracing::Subscriber`
//! rather than hardcoding a sink.

use crate::cell::{CellId, Op};

/// One recorded primitive application in a traced closure's history.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceEvent {
    pub entry: CellId,
    pub index: u32,
    pub op: Op,
    pub args: Vec<CellId>,
}

/// Where [`crate::reduce`] sends [`TraceEvent`]s as it reduces a traced
/// closure. Implement this to feed an external specializer; the default
/// [`VecTraceSink`] just keeps them in memory for inspection or tests.
pub trait TraceSink {
    fn record(&mut self, event: TraceEvent);
}

/// An in-memory journal, handy for tests and for embedders who want to
/// inspect a run's trace after the fact rather than streaming it live.
#[derive(Default, Debug)]
pub struct VecTraceSink {
    events: Vec<TraceEvent>,
}

impl VecTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }
}

impl TraceSink for VecTraceSink {
    fn record(&mut self, event: TraceEvent) {
        tracing::trace!(target: "TRCE", entry = ?event.entry, op = event.op.name(), "recording trace step");
        self.events.push(event);
    }
}

/// A sink that discards every event — the default when
/// [`crate::config::EngineConfig::trace_enabled`] is `false`.
#[derive(Default, Debug)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn record(&mut self, _event: TraceEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_accumulates_in_order() {
        let mut sink = VecTraceSink::new();
        let entry = crate::arena::Arena::new().alloc(crate::cell::Cell::new_value(
            crate::cell::Value::int(0),
        ));
        sink.record(TraceEvent {
            entry,
            index: 0,
            op: Op::Add,
            args: vec![],
        });
        sink.record(TraceEvent {
            entry,
            index: 1,
            op: Op::Mul,
            args: vec![],
        });
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.events()[1].op, Op::Mul);
    }

    #[test]
    fn null_sink_discards() {
        let mut sink = NullTraceSink;
        let entry = crate::arena::Arena::new().alloc(crate::cell::Cell::new_value(
            crate::cell::Value::int(0),
        ));
        sink.record(TraceEvent {
            entry,
            index: 0,
            op: Op::Add,
            args: vec![],
        });
    }
}
