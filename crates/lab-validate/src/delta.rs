//! Delta checks against a patient's previous result.

use lab_model::{ParameterCode, TestCode};
use serde::Serialize;

/// Percent change above which a result needs review.
pub const DEFAULT_DELTA_THRESHOLD_PERCENT: f64 = 50.0;

/// Outcome of comparing a result with the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaCheck {
    pub test_code: TestCode,
    pub parameter_code: ParameterCode,
    pub current: f64,
    pub previous: f64,
    pub absolute_change: f64,
    pub percent_change: f64,
    pub requires_review: bool,
}

/// Compare `current` with `previous`.
///
/// A zero previous value counts as a 100% change. The review flag is
/// independent of the range-based status.
pub fn delta_check(
    test_code: &TestCode,
    parameter_code: &ParameterCode,
    current: f64,
    previous: f64,
    threshold_percent: f64,
) -> DeltaCheck {
    let absolute_change = (current - previous).abs();
    let percent_change = if previous == 0.0 {
        100.0
    } else {
        absolute_change / previous.abs() * 100.0
    };
    DeltaCheck {
        test_code: test_code.clone(),
        parameter_code: parameter_code.clone(),
        current,
        previous,
        absolute_change,
        percent_change,
        requires_review: percent_change > threshold_percent,
    }
}
