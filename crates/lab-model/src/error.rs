//! Error taxonomy for the lifecycle engine.
//!
//! Domain failures are values: every operation returns `Result<T, LabError>`
//! and callers branch on [`LabError::kind`] rather than on message text.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::enums::ActorRole;
use crate::result::ParameterIssue;

/// Errors raised while constructing model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid {kind}: {value:?}")]
    InvalidIdentifier { kind: &'static str, value: String },
}

/// Failure of a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LabError {
    /// Operation attempted from a state that does not permit it.
    #[error("{entity} {id} is {actual}; {operation} requires {expected}")]
    InvalidState {
        entity: &'static str,
        id: String,
        operation: &'static str,
        actual: String,
        expected: String,
    },

    /// Unparsable, non-finite or disallowed input.
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// Planning or collection cannot cover the requested volume.
    #[error("insufficient volume: {requested_ml} mL required, {available_ml} mL available")]
    InsufficientVolume { requested_ml: f64, available_ml: f64 },

    #[error("aliquot {aliquot} has {remaining_ml} mL remaining, {requested_ml} mL requested")]
    InsufficientAliquotVolume {
        aliquot: String,
        requested_ml: f64,
        remaining_ml: f64,
    },

    #[error("test {test_code} is not linked to aliquot {aliquot}")]
    TestNotLinked { aliquot: String, test_code: String },

    /// Recollection requested after a sibling test was signed off.
    #[error("cannot recollect for {test}: sibling test {sibling} is already validated")]
    ConflictingApproval { test: String, sibling: String },

    #[error("role {role} may not {operation}")]
    Unauthorized {
        role: ActorRole,
        operation: &'static str,
    },

    #[error("test {test} has {count} unacknowledged critical result(s)")]
    UnacknowledgedCritical { test: String, count: usize },

    /// Result submission blocked by one or more invalid parameters.
    #[error("result submission rejected with {} error(s)", .errors.len())]
    ValidationFailed { errors: Vec<ParameterIssue> },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The remote store did not complete the write.
    #[error("persistence failed: {0}")]
    Transport(String),
}

/// Stable tag for each [`LabError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabErrorKind {
    InvalidState,
    InvalidValue,
    InsufficientVolume,
    InsufficientAliquotVolume,
    TestNotLinked,
    ConflictingApproval,
    Unauthorized,
    UnacknowledgedCritical,
    ValidationFailed,
    NotFound,
    Transport,
}

impl fmt::Display for LabErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl LabError {
    pub fn kind(&self) -> LabErrorKind {
        match self {
            Self::InvalidState { .. } => LabErrorKind::InvalidState,
            Self::InvalidValue { .. } => LabErrorKind::InvalidValue,
            Self::InsufficientVolume { .. } => LabErrorKind::InsufficientVolume,
            Self::InsufficientAliquotVolume { .. } => LabErrorKind::InsufficientAliquotVolume,
            Self::TestNotLinked { .. } => LabErrorKind::TestNotLinked,
            Self::ConflictingApproval { .. } => LabErrorKind::ConflictingApproval,
            Self::Unauthorized { .. } => LabErrorKind::Unauthorized,
            Self::UnacknowledgedCritical { .. } => LabErrorKind::UnacknowledgedCritical,
            Self::ValidationFailed { .. } => LabErrorKind::ValidationFailed,
            Self::NotFound { .. } => LabErrorKind::NotFound,
            Self::Transport(_) => LabErrorKind::Transport,
        }
    }

    pub fn invalid_state(
        entity: &'static str,
        id: impl fmt::Display,
        operation: &'static str,
        actual: impl fmt::Display,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            entity,
            id: id.to_string(),
            operation,
            actual: actual.to_string(),
            expected: expected.into(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LabError>;
