use super::TraceCollector;
use crate::trace::key::DynamicKey;
use std::sync::atomic::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterPhase {
    Call,
    Return,
}

/// One call or return reported by an embedded interpreter's tracing hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterTraceInfo {
    pub phase: InterpreterPhase,
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl InterpreterTraceInfo {
    pub fn call(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            phase: InterpreterPhase::Call,
            function: function.into(),
            file: file.into(),
            line,
        }
    }

    /// A return carries no location; it always closes the innermost call.
    pub fn ret() -> Self {
        Self {
            phase: InterpreterPhase::Return,
            function: String::new(),
            file: String::new(),
            line: 0,
        }
    }

    /// Key the call is recorded under: `function (file:line)`.
    pub fn key(&self) -> DynamicKey {
        DynamicKey::new(format!("{} ({}:{})", self.function, self.file, self.line))
    }
}

impl TraceCollector {
    /// Route interpreter calls and returns into this collector.
    pub fn set_interpreter_tracing_enabled(&self, enabled: bool) {
        let was = self.interpreter_tracing.swap(enabled, Ordering::Release);
        if was != enabled {
            tracing::info!(label = %self.label, enabled, "interpreter tracing toggled");
        }
    }

    pub fn is_interpreter_tracing_enabled(&self) -> bool {
        self.interpreter_tracing.load(Ordering::Acquire)
    }

    /// Entry point for an interpreter's call/return hook.
    ///
    /// Calls push onto the thread's pending stack and returns pop from it
    /// whenever interpreter tracing is on, so enabling recording halfway
    /// through a call stack cannot unbalance later returns. Begin and End are
    /// only recorded while the collector itself is enabled.
    pub fn on_interpreter_event(&self, info: &InterpreterTraceInfo) {
        if !self.is_interpreter_tracing_enabled() {
            return;
        }
        let record = self.is_enabled();
        match info.phase {
            InterpreterPhase::Call => {
                let key = info.key();
                self.registry
                    .with_current(|buf| buf.push_interpreter_scope(&key, record));
            }
            InterpreterPhase::Return => {
                self.registry
                    .with_current(|buf| buf.pop_interpreter_scope(record));
            }
        }
    }

    /// Pending interpreter calls on the calling thread.
    pub fn interpreter_depth(&self) -> usize {
        self.registry
            .with_current(|buf| buf.interpreter_depth())
            .unwrap_or(0)
    }
}
