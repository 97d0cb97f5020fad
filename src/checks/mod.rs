//! The four validation stages.

pub mod coherence;
pub mod conformance;
pub mod failing;
pub mod syntax;

use crate::error::ReturnCode;

/// Outcome of one stage: its worst return code plus everything it printed.
#[derive(Debug)]
pub struct StageReport {
    pub name: &'static str,
    pub code: ReturnCode,
    pub lines: Vec<String>,
}

impl StageReport {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            code: ReturnCode::Success,
            lines: Vec::new(),
        }
    }

    pub fn record(&mut self, code: ReturnCode) {
        self.code = self.code.worst(code);
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}
