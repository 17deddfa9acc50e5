//! The `IO` token's external effects.
//!
//! Grounded on `original_source/rt_types.h`'s `SYM_IO` and `eval.c`'s
//! handling of `print`: one persistent symbol cell threads through a
//! computation the way a file handle does, and primitives that perform
//! output take it as an argument and hand back an equally-valid token.
//! The actual byte sink is an external collaborator (the REPL shell, in
//! the original); this module only defines the trait boundary primitive
//! handlers call through, following `dfir_rs::util`'s pattern of taking
//! an injectable I/O trait object rather than hardcoding `stdout`.

use std::fmt;

/// Where `print`-family primitives send their output. Implement this to
/// route engine output anywhere; [`NullIoPort`] and [`BufferIoPort`]
/// cover the common test and embedding cases.
pub trait IoPort {
    fn write_value(&mut self, rendered: &str);
}

/// Discards everything written to it. The default port when an embedder
/// has no use for `print` output but still wants `IO`-threading
/// primitives to succeed.
#[derive(Default, Debug)]
pub struct NullIoPort;

impl IoPort for NullIoPort {
    fn write_value(&mut self, _rendered: &str) {}
}

/// Collects everything written to it, newline-separated, for tests and
/// embedders that want to inspect output after a run completes.
#[derive(Default, Debug)]
pub struct BufferIoPort {
    buf: String,
}

impl BufferIoPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> &str {
        &self.buf
    }
}

impl IoPort for BufferIoPort {
    fn write_value(&mut self, rendered: &str) {
        if !self.buf.is_empty() {
            self.buf.push('\n');
        }
        self.buf.push_str(rendered);
    }
}

impl fmt::Display for BufferIoPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_port_joins_writes_with_newlines() {
        let mut port = BufferIoPort::new();
        port.write_value("1");
        port.write_value("2");
        assert_eq!(port.contents(), "1\n2");
    }

    #[test]
    fn null_port_accepts_writes_silently() {
        let mut port = NullIoPort;
        port.write_value("ignored");
    }
}
