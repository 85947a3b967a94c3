use std::collections::BTreeMap;

use lab_model::{CapturedResult, FlagKind, ParameterCode, ParameterIssue, ResultFlag};
use serde::Serialize;

use crate::delta::DeltaCheck;

/// Aggregated outcome of scoring one result submission.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Interpreted values for every parameter that passed validation.
    pub results: BTreeMap<ParameterCode, CapturedResult>,
    /// Hard errors; any entry blocks the submission.
    pub errors: Vec<ParameterIssue>,
    pub warnings: Vec<ParameterIssue>,
    pub flags: Vec<ResultFlag>,
    pub deltas: Vec<DeltaCheck>,
    /// Defined parameters with no submitted value.
    pub missing: Vec<ParameterCode>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn critical_flags(&self) -> impl Iterator<Item = &ResultFlag> {
        self.flags.iter().filter(|f| f.kind == FlagKind::Critical)
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

/// Order flags most urgent first, then by parameter code.
pub fn triage(flags: &[ResultFlag]) -> Vec<ResultFlag> {
    let mut ordered = flags.to_vec();
    ordered.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.parameter.cmp(&b.parameter))
    });
    ordered
}
