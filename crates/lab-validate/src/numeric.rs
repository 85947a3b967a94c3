//! Numeric result interpretation.
//!
//! Decision order: critical limits, then the resolved reference range, then
//! normal.

use lab_model::{Demographics, LabError, ParameterDefinition, ReferenceRange, Sex, ValueStatus};

/// Interpretation of one numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericAssessment {
    pub value: f64,
    pub status: ValueStatus,
    /// Range the value was compared against, if the catalog defines one.
    pub range: Option<ReferenceRange>,
    /// Set when the parameter has no reference range.
    pub warning: Option<String>,
}

/// Parse captured text into a finite number.
pub fn parse_numeric(raw: &str, parameter: &ParameterDefinition) -> Result<f64, LabError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LabError::invalid_value(
            parameter.code.as_str(),
            "value is required",
        ));
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(LabError::invalid_value(
            parameter.code.as_str(),
            format!("{trimmed} is not a finite number"),
        )),
        Err(_) => Err(LabError::invalid_value(
            parameter.code.as_str(),
            format!("{trimmed} is not a number"),
        )),
    }
}

/// Pick the reference range for the patient's demographic bucket.
///
/// The sex-specific range wins when the patient's sex is known and that
/// bucket defines at least one bound; otherwise the general range applies.
pub fn resolve_range(
    parameter: &ParameterDefinition,
    demographics: Option<&Demographics>,
) -> Option<ReferenceRange> {
    let bucket = match demographics.and_then(|d| d.sex) {
        Some(Sex::Male) => parameter.ranges.male,
        Some(Sex::Female) => parameter.ranges.female,
        None => None,
    };
    bucket
        .filter(ReferenceRange::is_defined)
        .or_else(|| parameter.ranges.general.filter(ReferenceRange::is_defined))
}

/// Validate raw numeric input against a parameter definition.
pub fn validate_numeric(
    raw: &str,
    parameter: &ParameterDefinition,
    demographics: Option<&Demographics>,
) -> Result<NumericAssessment, LabError> {
    let value = parse_numeric(raw, parameter)?;
    Ok(assess(value, parameter, demographics))
}

/// Interpret an already parsed, finite value.
pub fn assess(
    value: f64,
    parameter: &ParameterDefinition,
    demographics: Option<&Demographics>,
) -> NumericAssessment {
    let range = resolve_range(parameter, demographics);
    let critical = match (parameter.critical_low, parameter.critical_high) {
        (Some(limit), _) if value <= limit => Some(ValueStatus::CriticalLow),
        (_, Some(limit)) if value >= limit => Some(ValueStatus::CriticalHigh),
        _ => None,
    };
    let status = critical.unwrap_or_else(|| match range {
        Some(ReferenceRange { low: Some(low), .. }) if value < low => ValueStatus::Low,
        Some(ReferenceRange {
            high: Some(high), ..
        }) if value > high => ValueStatus::High,
        _ => ValueStatus::Normal,
    });
    let warning = range
        .is_none()
        .then(|| format!("no reference range defined for {}", parameter.code));
    NumericAssessment {
        value,
        status,
        range,
        warning,
    }
}

/// Render a value at the parameter's precision, or as-is without one.
pub fn format_value(value: f64, parameter: &ParameterDefinition) -> String {
    match parameter.precision {
        Some(precision) => format!("{value:.prec$}", prec = usize::from(precision)),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_model::ParameterCode;

    fn glucose() -> ParameterDefinition {
        ParameterDefinition::numeric(ParameterCode::new("GLU").unwrap(), "Glucose")
            .with_range(Some(70.0), Some(100.0))
            .with_critical(Some(40.0), Some(450.0))
    }

    #[test]
    fn decision_order_critical_then_range() {
        let p = glucose();
        assert_eq!(validate_numeric("55", &p, None).unwrap().status, ValueStatus::Low);
        assert_eq!(
            validate_numeric("35", &p, None).unwrap().status,
            ValueStatus::CriticalLow
        );
        assert_eq!(
            validate_numeric("40", &p, None).unwrap().status,
            ValueStatus::CriticalLow
        );
        assert_eq!(
            validate_numeric("85", &p, None).unwrap().status,
            ValueStatus::Normal
        );
        assert_eq!(
            validate_numeric("120", &p, None).unwrap().status,
            ValueStatus::High
        );
        assert_eq!(
            validate_numeric("450", &p, None).unwrap().status,
            ValueStatus::CriticalHigh
        );
    }

    #[test]
    fn bounds_are_inclusive_for_normal() {
        let p = glucose();
        assert_eq!(validate_numeric("70", &p, None).unwrap().status, ValueStatus::Normal);
        assert_eq!(validate_numeric("100", &p, None).unwrap().status, ValueStatus::Normal);
    }

    #[test]
    fn unparsable_and_non_finite_are_errors() {
        let p = glucose();
        for raw in ["", "  ", "abc", "NaN", "inf", "-infinity", "1e999"] {
            let error = validate_numeric(raw, &p, None).unwrap_err();
            assert!(
                matches!(error, LabError::InvalidValue { .. }),
                "{raw:?} should be invalid"
            );
        }
    }

    #[test]
    fn missing_range_is_normal_with_warning() {
        let p = ParameterDefinition::numeric(ParameterCode::new("X").unwrap(), "X");
        let assessment = validate_numeric("12345", &p, None).unwrap();
        assert_eq!(assessment.status, ValueStatus::Normal);
        assert!(assessment.range.is_none());
        assert!(assessment.warning.unwrap().contains("no reference range"));
    }

    #[test]
    fn precision_controls_display() {
        let p = glucose().with_precision(1);
        assert_eq!(format_value(5.0, &p), "5.0");
        assert_eq!(format_value(5.26, &p), "5.3");
        assert_eq!(format_value(5.25, &glucose()), "5.25");
    }
}
