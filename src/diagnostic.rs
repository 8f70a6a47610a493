//! Non-fatal diagnostics collected during lowering.

use std::fmt;

use crate::ir::Symbol;

/// Severity levels for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single diagnostic message, optionally tied to a source-model node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    pub origin: Option<Symbol>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Some(origin) => write!(f, "{}: {} (at '{}')", self.severity, self.message, origin),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// An append-only sink for diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.items.push(diag);
    }

    pub fn warn(&mut self, origin: Option<Symbol>, message: impl Into<String>) {
        self.push(Diagnostic {
            message: message.into(),
            severity: Severity::Warning,
            origin,
        });
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_origin() {
        let d = Diagnostic {
            message: "condition is not statically known".into(),
            severity: Severity::Warning,
            origin: Some(Symbol::new("loop_7")),
        };
        assert_eq!(
            d.to_string(),
            "WARNING: condition is not statically known (at 'loop_7')"
        );
    }

    #[test]
    fn sink_collects_in_order() {
        let mut diags = Diagnostics::new();
        assert!(diags.is_empty());
        diags.warn(None, "first");
        diags.warn(None, "second");
        let msgs: Vec<_> = diags.items().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(msgs, ["first", "second"]);
    }
}
