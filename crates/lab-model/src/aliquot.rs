use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::audit::AuditStamp;
use crate::enums::AliquotStatus;
use crate::ids::{AliquotId, OrderId, PatientId, SpecimenId, TestCode};

/// A consumption event against an aliquot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliquotUsage {
    pub stamp: AuditStamp,
    pub amount_ml: f64,
    pub test_codes: Vec<TestCode>,
}

/// A volume-bounded portion of a specimen allocated to one or more tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aliquot {
    pub id: AliquotId,
    pub specimen_id: SpecimenId,
    pub order_id: OrderId,
    pub patient_id: PatientId,
    /// 1-based position within the specimen's plan.
    pub sequence: u32,
    pub volume_ml: f64,
    pub remaining_volume_ml: f64,
    pub test_codes: BTreeSet<TestCode>,
    pub container_type: String,
    /// Purpose or destination bench.
    pub destination: String,
    pub status: AliquotStatus,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub usage: Vec<AliquotUsage>,
    #[serde(default)]
    pub disposed: Option<AuditStamp>,
}

impl Aliquot {
    pub fn serves(&self, code: &TestCode) -> bool {
        self.test_codes.contains(code)
    }

    pub fn consumed_ml(&self) -> f64 {
        self.usage.iter().map(|u| u.amount_ml).sum()
    }
}
