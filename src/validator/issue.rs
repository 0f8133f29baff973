//! Validation outcomes (§4.5).
//!
//! [`ValidationIssue`] is deliberately shaped like an `OperationOutcome`
//! issue so a caller binding this crate to FHIR's wire format can render
//! one directly, without this crate knowing anything about that format.

use serde::{Deserialize, Serialize};

/// The severity of a single validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
}

/// A stable, machine-readable code for the rule that produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    CardinalityMinViolation,
    CardinalityMaxViolation,
    TypeMismatch,
    InvalidChoiceType,
    FixedValueMismatch,
    PatternValueMismatch,
    ReferenceTargetViolation,
    SlicingNoMatch,
    SlicingOrderViolation,
    ConstraintViolation,
}

/// One finding produced by validating a resource against a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub code: IssueCode,
    /// Dot-separated path to the offending element, e.g. `"Patient.name[0].family"`.
    pub path: String,
    pub message: String,
    pub diagnostics: Option<String>,
}

impl ValidationIssue {
    pub fn error(code: IssueCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Error,
            code,
            path: path.into(),
            message: message.into(),
            diagnostics: None,
        }
    }

    pub fn warning(code: IssueCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Warning,
            code,
            path: path.into(),
            message: message.into(),
            diagnostics: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == ValidationSeverity::Error
    }
}
