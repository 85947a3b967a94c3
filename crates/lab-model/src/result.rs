use serde::{Deserialize, Serialize};

use crate::enums::{FlagKind, FlagSeverity, ValueStatus};
use crate::ids::ParameterCode;
use crate::reference::ReferenceRange;

/// A value captured for one parameter, with the interpretation applied to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResult {
    /// Value as entered (numeric values are normalised to the parameter precision).
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Range used to interpret the value, if one was defined.
    #[serde(default)]
    pub reference_range: Option<ReferenceRange>,
    pub status: ValueStatus,
}

/// A flag raised while scoring results, surfaced for escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFlag {
    pub parameter: ParameterCode,
    pub kind: FlagKind,
    pub severity: FlagSeverity,
    pub message: String,
}

impl ResultFlag {
    pub fn new(parameter: ParameterCode, kind: FlagKind, message: impl Into<String>) -> Self {
        Self {
            parameter,
            kind,
            severity: kind.severity(),
            message: message.into(),
        }
    }
}

/// An error or warning tied to one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterIssue {
    pub parameter: ParameterCode,
    pub message: String,
}

impl ParameterIssue {
    pub fn new(parameter: ParameterCode, message: impl Into<String>) -> Self {
        Self {
            parameter,
            message: message.into(),
        }
    }
}
