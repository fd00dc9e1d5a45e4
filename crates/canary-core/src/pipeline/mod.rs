//! Canary pass primitives.
//!
//! A pass moves through a fixed sequence of phases:
//! - `Scanning`: collect functions with a deployment preference and validate them
//! - `Synthesizing`: add the application, the role, and a group and alias per function
//! - `Rewriting`: point API Gateway integrations and invoke permissions at the aliases
//! - `Done`: the staged map is committed to the caller
//!
//! This module defines:
//! - `PassContext` (diagnostics collection while a pass runs)
//! - `PassReport` (what a pass added, rewrote, and reported)
//!
//! The orchestrator itself lives in `orchestrator`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::LogicalId;

pub mod orchestrator;

pub use orchestrator::CanaryOrchestrator;

/// Diagnostic code for a function with several matching version resources.
pub const AMBIGUOUS_VERSION_RESOURCE: &str = "version.ambiguous";
/// Diagnostic code for a canary function no API Gateway method integrates with.
pub const NO_EXPOSED_METHODS: &str = "methods.none";

/// Lifecycle of a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Scanning,
    Synthesizing,
    Rewriting,
    Done,
}

/// A structured, non-fatal finding of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

/// Mutable state shared by the phases of one pass.
#[derive(Debug, Clone)]
pub struct PassContext {
    pub phase: Phase,
    pub diagnostics: Vec<Diagnostic>,
}

impl Default for PassContext {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            diagnostics: Vec::new(),
        }
    }
}

impl PassContext {
    pub fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    pub fn push_info(
        &mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        data: impl IntoIterator<Item = (&'static str, String)>,
    ) {
        self.push(DiagnosticLevel::Info, code.into(), message.into(), data);
    }

    pub fn push_warning(
        &mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        data: impl IntoIterator<Item = (&'static str, String)>,
    ) {
        self.push(DiagnosticLevel::Warning, code.into(), message.into(), data);
    }

    fn push(
        &mut self,
        level: DiagnosticLevel,
        code: String,
        message: String,
        data: impl IntoIterator<Item = (&'static str, String)>,
    ) {
        self.diagnostics.push(Diagnostic {
            level,
            code,
            message,
            data: data.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        });
    }

    pub fn finish(self, added: Vec<LogicalId>, rewritten: Vec<LogicalId>) -> PassReport {
        PassReport {
            phase: self.phase,
            added,
            rewritten,
            diagnostics: self.diagnostics,
        }
    }
}

/// Result of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub phase: Phase,
    /// Logical ids the pass created, in insertion order.
    pub added: Vec<LogicalId>,
    /// Existing logical ids the pass replaced.
    pub rewritten: Vec<LogicalId>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PassReport {
    /// True when the pass left the map as it was.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.rewritten.is_empty()
    }

    pub fn warnings(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .count()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_collects_diagnostics_in_order() {
        let mut ctx = PassContext::default();
        ctx.enter(Phase::Scanning);
        ctx.push_warning(AMBIGUOUS_VERSION_RESOURCE, "two versions", [("function", "F".to_string())]);
        ctx.push_info(NO_EXPOSED_METHODS, "no methods", []);
        ctx.enter(Phase::Done);

        let report = ctx.finish(vec!["A".to_string()], vec![]);
        assert_eq!(report.phase, Phase::Done);
        assert_eq!(report.warnings(), 1);
        assert!(report.has_code(NO_EXPOSED_METHODS));
        assert_eq!(report.diagnostics[0].data.get("function").map(String::as_str), Some("F"));
        assert!(!report.is_noop());
    }

    #[test]
    fn report_serializes_lowercase_levels() {
        let mut ctx = PassContext::default();
        ctx.push_info("x", "y", []);
        let v = serde_json::to_value(ctx.finish(vec![], vec![])).unwrap();
        assert_eq!(v["phase"], "idle");
        assert_eq!(v["diagnostics"][0]["level"], "info");
        assert!(v["diagnostics"][0].get("data").is_none());
    }
}
