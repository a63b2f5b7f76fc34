//! Progress and diagnostic output.
//!
//! Line-oriented, purely observational: nothing written here ever feeds
//! back into control flow or results, and discarding the output is safe.

use std::sync::{Arc, Mutex};

/// Line-oriented sink for progress/diagnostic text.
pub trait ProgressSink: Send + Sync {
    /// Emit one line.
    fn write_line(&self, line: &str);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn write_line(&self, _line: &str) {}
}

/// Writes lines to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn write_line(&self, line: &str) {
        println!("{line}");
    }
}

/// Routes lines through `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn write_line(&self, line: &str) {
        tracing::info!(target: "pulsebench", "{line}");
    }
}

/// Captures lines in memory. Clones share the same buffer, so tests can
/// keep a handle while the engine owns the sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Empty capturing sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("sink poisoned").clone()
    }
}

impl ProgressSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines.lock().expect("sink poisoned").push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_shares_buffer_across_clones() {
        let sink = MemorySink::new();
        let handle = sink.clone();
        sink.write_line("pilot: 64 op");
        handle.write_line("warmup stable");
        assert_eq!(sink.lines(), vec!["pilot: 64 op", "warmup stable"]);
    }

    #[test]
    fn null_sink_discards() {
        NullSink.write_line("anything");
    }
}
