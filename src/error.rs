//! Fatal semantic errors.
//!
//! Every error is raised at the point of detection, carries a [`Loc`], and
//! aborts the pass that produced it. There is no recovery mode: the first
//! violation wins.

use smol_str::SmolStr;
use thiserror::Error;

use crate::base::Loc;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error taxonomy of the semantic core.
#[derive(Debug, Error)]
pub enum Error {
    /// Two declarations claim the same FQN. Both locations are reported.
    #[error("{second}: symbol '{fqn}' is already declared at {first}")]
    SymbolConflict {
        fqn: SmolStr,
        first: Loc,
        second: Loc,
    },

    /// A name failed to resolve; carries up to five similar visible names.
    #[error("{loc}: unresolved symbol '{name}'{}", fmt_suggestions(suggestions))]
    UnresolvedSymbol {
        name: SmolStr,
        loc: Loc,
        suggestions: Vec<SmolStr>,
    },

    /// A contract was malformed, loosened, or violated by a value.
    #[error("{loc}: {message}")]
    ContractViolation { message: String, loc: Loc },

    /// Inheritance from an incompatible or non-inheritable category.
    #[error("{loc}: {message}")]
    InheritanceError { message: String, loc: Loc },

    /// The composition fixed-point stalled; names the first unmet dependency.
    #[error("{loc}: '{identifier}' has an unsatisfiable dependency on '{dependency}'")]
    UnsatisfiableDependency {
        identifier: SmolStr,
        dependency: SmolStr,
        loc: Loc,
    },

    /// An ill-formed connection between endpoints.
    #[error("{loc}: {message}")]
    ConnectionError { message: String, loc: Loc },

    /// Failure reading or writing a persisted translation unit.
    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A persisted translation unit could not be decoded.
    #[error("invalid cached form for '{path}': {message}")]
    Persist { path: String, message: String },
}

impl Error {
    pub fn contract_violation(loc: Loc, message: impl Into<String>) -> Self {
        Self::ContractViolation {
            message: message.into(),
            loc,
        }
    }

    pub fn inheritance(loc: Loc, message: impl Into<String>) -> Self {
        Self::InheritanceError {
            message: message.into(),
            loc,
        }
    }

    pub fn connection(loc: Loc, message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
            loc,
        }
    }
}

fn fmt_suggestions(suggestions: &[SmolStr]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    let joined = suggestions
        .iter()
        .map(SmolStr::as_str)
        .collect::<Vec<_>>()
        .join("', '");
    format!(", did you mean '{joined}'?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{Loc, SourceId};
    use text_size::TextSize;

    #[test]
    fn test_conflict_reports_both_locations() {
        let err = Error::SymbolConflict {
            fqn: "a.b".into(),
            first: Loc::new(SourceId::new(0), TextSize::new(4)),
            second: Loc::new(SourceId::new(1), TextSize::new(9)),
        };
        let text = err.to_string();
        assert!(text.contains("source#0@4"));
        assert!(text.contains("source#1@9"));
    }

    #[test]
    fn test_unresolved_with_suggestions() {
        let err = Error::UnresolvedSymbol {
            name: "Integre".into(),
            loc: Loc::default(),
            suggestions: vec!["Integer".into()],
        };
        assert!(err.to_string().contains("did you mean 'Integer'?"));
    }

    #[test]
    fn test_unresolved_without_suggestions() {
        let err = Error::UnresolvedSymbol {
            name: "x".into(),
            loc: Loc::default(),
            suggestions: vec![],
        };
        assert!(!err.to_string().contains("did you mean"));
    }
}
