//! Non-fatal findings collected during a translation run.
//!
//! A [`Diagnostics`] collector is created per run and threaded through the
//! pipeline by mutable reference. Nothing here aborts the translation: the
//! affected parameter or variable is skipped (or defaulted) and the finding is
//! reported to the caller afterwards.

use thiserror::Error;
use tracing::warn;

/// A single advisory finding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A switch-case id has no entry in the parameter table
    #[error("Could not find definition for ID '{id}'")]
    UnresolvedParameterId { id: String },

    /// Setter and getter exist but do not touch a common field
    #[error("Could not process ID '{id}'")]
    CouldNotProcessId { id: String },

    /// No declaration was found for a local variable; it defaults to `double`
    #[error("Could not find type of local variable {name}")]
    UnresolvedVariableType { name: String },

    /// A `loop->field` reference names something the parameter table does not own
    #[error("Unresolved {scope} variable '{name}' (declared as extra field)")]
    UnresolvedReference { scope: &'static str, name: String },

    /// A parameter table entry has a type flag outside the supported set
    #[error("Unsupported type flag '{flag}' for parameter '{name}'")]
    UnknownTypeFlag { flag: String, name: String },

    /// A default assignment could not be lifted because its value is not a literal
    #[error("Default value '{value}' for '{field}' is not a literal and stays in code")]
    IgnoredDefault { field: String, value: String },
}

/// Append-only collector for [`Diagnostic`]s.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding and log it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    /// All findings recorded so far.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Number of findings recorded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every finding out of the collector.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }

    /// Count the findings matching a predicate.
    pub fn count(&self, predicate: impl Fn(&Diagnostic) -> bool) -> usize {
        self.entries.iter().filter(|d| predicate(d)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_collector() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::CouldNotProcessId {
            id: "DIO_AREA".to_string(),
        });
        diags.push(Diagnostic::UnresolvedVariableType {
            name: "vt".to_string(),
        });
        assert_eq!(diags.len(), 2);

        let drained = diags.drain();
        assert_eq!(drained.len(), 2);
        assert!(diags.is_empty());
        assert_eq!(drained[0].to_string(), "Could not process ID 'DIO_AREA'");
    }
}
