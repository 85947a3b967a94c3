//! Text and enumerated result checks.

use lab_model::{LabError, ParameterDefinition};

/// Validate text input, returning the value to store.
///
/// Enumerated parameters match case-insensitively and store the catalog's
/// spelling.
pub fn validate_text(raw: &str, parameter: &ParameterDefinition) -> Result<String, LabError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LabError::invalid_value(
            parameter.code.as_str(),
            "value is required",
        ));
    }
    if !parameter.is_enumerated() {
        return Ok(trimmed.to_string());
    }
    parameter
        .allowed_values
        .iter()
        .find(|allowed| allowed.eq_ignore_ascii_case(trimmed))
        .cloned()
        .ok_or_else(|| {
            LabError::invalid_value(
                parameter.code.as_str(),
                format!(
                    "{trimmed} is not allowed; expected one of: {}",
                    parameter.allowed_values.join(", ")
                ),
            )
        })
}
