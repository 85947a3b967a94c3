//! Result Validator.
//!
//! Evaluates captured values against catalog definitions and prior results,
//! producing a status per parameter plus triage flags.

pub mod delta;
pub mod numeric;
pub mod report;
pub mod text;
pub mod validator;

pub use delta::{DEFAULT_DELTA_THRESHOLD_PERCENT, DeltaCheck, delta_check};
pub use numeric::{
    NumericAssessment, assess, format_value, parse_numeric, resolve_range, validate_numeric,
};
pub use report::{ValidationReport, triage};
pub use text::validate_text;
pub use validator::{ResultValidator, Submission, validate_all};
