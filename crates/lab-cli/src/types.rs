use std::collections::BTreeMap;

use lab_core::TestGroup;
use lab_model::{Demographics, ParameterCode, TestCode};
use serde::Deserialize;

/// Input of `labflow validate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsFile {
    pub test_code: TestCode,
    pub values: BTreeMap<ParameterCode, String>,
    #[serde(default)]
    pub demographics: Option<Demographics>,
    #[serde(default)]
    pub previous: Option<BTreeMap<ParameterCode, f64>>,
}

/// Input of `labflow plan`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub collected_volume_ml: f64,
    pub groups: Vec<TestGroup>,
}
