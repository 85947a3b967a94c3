//! Reference catalog definitions.
//!
//! These are owned by the external catalog; the engine only reads them.

use serde::{Deserialize, Serialize};

use crate::enums::{Sex, ValueType};
use crate::ids::{ParameterCode, TestCode};

/// Expected interval for a parameter. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
}

impl ReferenceRange {
    pub fn new(low: Option<f64>, high: Option<f64>) -> Self {
        Self { low, high }
    }

    pub fn is_defined(&self) -> bool {
        self.low.is_some() || self.high.is_some()
    }

    /// Human readable form such as `70-100`, `>= 3.5` or `<= 200`.
    pub fn describe(&self) -> String {
        match (self.low, self.high) {
            (Some(low), Some(high)) => format!("{low}-{high}"),
            (Some(low), None) => format!(">= {low}"),
            (None, Some(high)) => format!("<= {high}"),
            (None, None) => "not defined".to_string(),
        }
    }
}

/// Reference ranges bucketed by demographic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSet {
    #[serde(default)]
    pub general: Option<ReferenceRange>,
    #[serde(default)]
    pub male: Option<ReferenceRange>,
    #[serde(default)]
    pub female: Option<ReferenceRange>,
}

/// Patient attributes used to pick a reference range bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub age_years: Option<u32>,
}

/// Definition of one result parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    pub code: ParameterCode,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub value_type: ValueType,
    #[serde(default)]
    pub ranges: RangeSet,
    #[serde(default)]
    pub critical_low: Option<f64>,
    #[serde(default)]
    pub critical_high: Option<f64>,
    #[serde(default)]
    pub allowed_values: Vec<String>,
    #[serde(default)]
    pub precision: Option<u8>,
}

impl ParameterDefinition {
    pub fn numeric(code: ParameterCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            unit: None,
            value_type: ValueType::Numeric,
            ranges: RangeSet::default(),
            critical_low: None,
            critical_high: None,
            allowed_values: Vec::new(),
            precision: None,
        }
    }

    pub fn select(code: ParameterCode, name: impl Into<String>, allowed: &[&str]) -> Self {
        Self {
            value_type: ValueType::Select,
            allowed_values: allowed.iter().map(|v| (*v).to_string()).collect(),
            ..Self::numeric(code, name)
        }
    }

    pub fn text(code: ParameterCode, name: impl Into<String>) -> Self {
        Self {
            value_type: ValueType::Text,
            ..Self::numeric(code, name)
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_range(mut self, low: Option<f64>, high: Option<f64>) -> Self {
        self.ranges.general = Some(ReferenceRange::new(low, high));
        self
    }

    #[must_use]
    pub fn with_sex_range(mut self, sex: Sex, low: Option<f64>, high: Option<f64>) -> Self {
        let range = Some(ReferenceRange::new(low, high));
        match sex {
            Sex::Male => self.ranges.male = range,
            Sex::Female => self.ranges.female = range,
        }
        self
    }

    #[must_use]
    pub fn with_critical(mut self, low: Option<f64>, high: Option<f64>) -> Self {
        self.critical_low = low;
        self.critical_high = high;
        self
    }

    #[must_use]
    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn is_enumerated(&self) -> bool {
        self.value_type == ValueType::Select || !self.allowed_values.is_empty()
    }
}

/// Definition of an orderable test and the specimen it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    pub code: TestCode,
    pub name: String,
    /// Specimen kind, e.g. `whole-blood`, `serum`, `urine`.
    pub specimen_kind: String,
    pub container_type: String,
    #[serde(default)]
    pub container_color: Option<String>,
    /// Minimum volume in mL needed to run the test.
    pub min_volume_ml: f64,
    /// Bench or analyser the aliquot is routed to.
    pub destination: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
}

impl TestDefinition {
    pub fn parameter(&self, code: &ParameterCode) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| &p.code == code)
    }
}
