//! Submission-level validation.
//!
//! Every defined parameter is scored independently and the outcomes are
//! aggregated:
//!
//! - unparsable, non-finite or disallowed values → **error** (blocks submission)
//! - values for parameters the catalog does not define → **error**
//! - defined parameters with no value → **warning** (partial capture)
//! - numeric parameters with no reference range → **warning**
//! - critical / delta / abnormal outcomes → **flags**

use std::collections::BTreeMap;

use lab_model::{
    CapturedResult, Demographics, FlagKind, LabError, ParameterCode, ParameterDefinition,
    ParameterIssue, ResultFlag, TestCode, ValueStatus, ValueType,
};

use crate::delta::{DEFAULT_DELTA_THRESHOLD_PERCENT, delta_check};
use crate::numeric::{format_value, validate_numeric};
use crate::report::ValidationReport;
use crate::text::validate_text;

/// Everything needed to score one submission.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub test_code: &'a TestCode,
    pub values: &'a BTreeMap<ParameterCode, String>,
    pub parameters: &'a [ParameterDefinition],
    pub demographics: Option<&'a Demographics>,
    /// Previous numeric results for the same patient, for delta checks.
    pub previous: Option<&'a BTreeMap<ParameterCode, f64>>,
}

/// Scores result submissions against catalog definitions.
#[derive(Debug, Clone, Copy)]
pub struct ResultValidator {
    delta_threshold_percent: f64,
}

impl Default for ResultValidator {
    fn default() -> Self {
        Self::new(DEFAULT_DELTA_THRESHOLD_PERCENT)
    }
}

impl ResultValidator {
    pub fn new(delta_threshold_percent: f64) -> Self {
        Self {
            delta_threshold_percent,
        }
    }

    pub fn delta_threshold_percent(&self) -> f64 {
        self.delta_threshold_percent
    }

    pub fn validate_all(&self, submission: &Submission<'_>) -> ValidationReport {
        let mut report = ValidationReport::default();

        for code in submission.values.keys() {
            if !submission.parameters.iter().any(|p| &p.code == code) {
                report.errors.push(ParameterIssue::new(
                    code.clone(),
                    format!("{code} is not defined for test {}", submission.test_code),
                ));
            }
        }

        for parameter in submission.parameters {
            let Some(raw) = submission.values.get(&parameter.code) else {
                report.missing.push(parameter.code.clone());
                report.warnings.push(ParameterIssue::new(
                    parameter.code.clone(),
                    "no result captured",
                ));
                continue;
            };
            if let Err(error) = self.score(submission, parameter, raw, &mut report) {
                report
                    .errors
                    .push(ParameterIssue::new(parameter.code.clone(), error.to_string()));
            }
        }

        tracing::debug!(
            test = %submission.test_code,
            scored = report.results.len(),
            errors = report.errors.len(),
            flags = report.flags.len(),
            "validated result submission"
        );
        report
    }

    fn score(
        &self,
        submission: &Submission<'_>,
        parameter: &ParameterDefinition,
        raw: &str,
        report: &mut ValidationReport,
    ) -> Result<(), LabError> {
        if parameter.value_type != ValueType::Numeric {
            let value = validate_text(raw, parameter)?;
            report.results.insert(
                parameter.code.clone(),
                CapturedResult {
                    value,
                    numeric: None,
                    unit: parameter.unit.clone(),
                    reference_range: None,
                    status: ValueStatus::Normal,
                },
            );
            return Ok(());
        }

        let assessment = validate_numeric(raw, parameter, submission.demographics)?;
        if let Some(warning) = &assessment.warning {
            report
                .warnings
                .push(ParameterIssue::new(parameter.code.clone(), warning.clone()));
        }

        let display = format_value(assessment.value, parameter);
        match assessment.status {
            status if status.is_critical() => report.flags.push(ResultFlag::new(
                parameter.code.clone(),
                FlagKind::Critical,
                format!(
                    "{} {display} is {status}; notify the ordering clinician",
                    parameter.name
                ),
            )),
            status if status.is_abnormal() => report.flags.push(ResultFlag::new(
                parameter.code.clone(),
                FlagKind::Abnormal,
                format!(
                    "{} {display} is {status} (reference {})",
                    parameter.name,
                    assessment
                        .range
                        .map(|r| r.describe())
                        .unwrap_or_default()
                ),
            )),
            _ => {}
        }

        if let Some(previous) = submission
            .previous
            .and_then(|prev| prev.get(&parameter.code))
        {
            let check = delta_check(
                submission.test_code,
                &parameter.code,
                assessment.value,
                *previous,
                self.delta_threshold_percent,
            );
            if check.requires_review {
                report.flags.push(ResultFlag::new(
                    parameter.code.clone(),
                    FlagKind::Delta,
                    format!(
                        "{} changed {:.1}% from previous {}",
                        parameter.name,
                        check.percent_change,
                        format_value(check.previous, parameter)
                    ),
                ));
            }
            report.deltas.push(check);
        }

        report.results.insert(
            parameter.code.clone(),
            CapturedResult {
                value: display,
                numeric: Some(assessment.value),
                unit: parameter.unit.clone(),
                reference_range: assessment.range,
                status: assessment.status,
            },
        );
        Ok(())
    }
}

/// Score a submission with the default delta threshold.
pub fn validate_all(
    test_code: &TestCode,
    values: &BTreeMap<ParameterCode, String>,
    parameters: &[ParameterDefinition],
    demographics: Option<&Demographics>,
    previous: Option<&BTreeMap<ParameterCode, f64>>,
) -> ValidationReport {
    ResultValidator::default().validate_all(&Submission {
        test_code,
        values,
        parameters,
        demographics,
        previous,
    })
}
