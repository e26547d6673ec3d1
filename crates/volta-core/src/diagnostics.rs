//! Diagnostics accumulator threaded through compilation.
//!
//! Compilation can hit conditions that are worth reporting but must not stop
//! the build: a grid with no slack and no PV bus, a zero thermal rating, a
//! near-zero reactance that had to be regularized. Those accumulate here and
//! travel back to the caller next to the compiled circuit — there is no
//! process-wide logger. Hard structural errors do not go through this type;
//! they are returned as [`crate::error::VoltaError`].

use serde::Serialize;

/// Severity of a recorded issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but handled; compilation continued (e.g. regularized value).
    Warning,
    /// The element or step could not be completed as specified.
    Error,
}

/// One issue recorded during compilation.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Grouping key, e.g. "types", "rating", "numerics", "topology".
    pub category: String,
    pub message: String,
    /// The device or bus the issue refers to, e.g. "line L2-3".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}

/// Ordered collection of issues for one compilation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.issues.push(DiagnosticIssue {
            severity: Severity::Warning,
            category: category.into(),
            message: message.into(),
            entity: None,
        });
    }

    pub fn add_warning_for(
        &mut self,
        category: impl Into<String>,
        message: impl Into<String>,
        entity: impl Into<String>,
    ) {
        self.issues.push(DiagnosticIssue {
            severity: Severity::Warning,
            category: category.into(),
            message: message.into(),
            entity: Some(entity.into()),
        });
    }

    pub fn add_error(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.issues.push(DiagnosticIssue {
            severity: Severity::Error,
            category: category.into(),
            message: message.into(),
            entity: None,
        });
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Fold another run's issues into this one, preserving order.
    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in &self.issues {
            writeln!(f, "{}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_severity() {
        let mut diag = Diagnostics::new();
        diag.add_warning("types", "no slack bus declared");
        diag.add_warning_for("rating", "zero thermal rating", "line L1-2");
        diag.add_error("topology", "empty island");
        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.has_errors());
    }

    #[test]
    fn display_formats_entity() {
        let mut diag = Diagnostics::new();
        diag.add_warning_for("numerics", "reactance regularized", "vsc C1");
        let text = diag.to_string();
        assert!(text.contains("[warning:numerics]"));
        assert!(text.contains("(vsc C1)"));
    }

    #[test]
    fn merge_preserves_order() {
        let mut a = Diagnostics::new();
        a.add_warning("types", "first");
        let mut b = Diagnostics::new();
        b.add_warning("types", "second");
        a.merge(b);
        assert_eq!(a.issues[0].message, "first");
        assert_eq!(a.issues[1].message, "second");
    }

    #[test]
    fn serializes_to_json() {
        let mut diag = Diagnostics::new();
        diag.add_warning("types", "blackout grid");
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"severity\":\"warning\""));
    }
}
