use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::audit::AuditStamp;
use crate::enums::{RejectionReason, SpecimenStatus, Sufficiency};
use crate::ids::{OrderId, PatientId, SpecimenId, TestCode};

/// Details recorded when a specimen is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub volume_ml: f64,
    pub container_type: String,
    #[serde(default)]
    pub container_color: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub sufficiency: Sufficiency,
    pub stamp: AuditStamp,
}

/// One entry in a specimen's rejection history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecimenRejection {
    pub stamp: AuditStamp,
    pub reasons: Vec<RejectionReason>,
    #[serde(default)]
    pub notes: Option<String>,
    pub recollection_required: bool,
}

/// A physical specimen and its recollection linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specimen {
    pub id: SpecimenId,
    pub order_id: OrderId,
    pub patient_id: PatientId,
    pub specimen_kind: String,
    pub test_codes: BTreeSet<TestCode>,
    /// Sum of the per-test minimum volumes.
    pub required_volume_ml: f64,
    /// Container types accepted for this draw; empty accepts any.
    #[serde(default)]
    pub container_types: Vec<String>,
    #[serde(default)]
    pub container_colors: Vec<String>,
    pub status: SpecimenStatus,
    #[serde(default)]
    pub collection: Option<CollectionRecord>,
    #[serde(default)]
    pub rejection_history: Vec<SpecimenRejection>,
    #[serde(default)]
    pub is_recollection: bool,
    /// First specimen of the chain; `None` on the original itself.
    #[serde(default)]
    pub original_specimen_id: Option<SpecimenId>,
    #[serde(default)]
    pub recollection_reason: Option<String>,
    /// 1 for the original draw, incremented for every recollection.
    pub recollection_attempt: u32,
    /// Set once a successor has been spawned; a specimen has at most one.
    #[serde(default)]
    pub successor_id: Option<SpecimenId>,
    #[serde(default)]
    pub storage_location: Option<String>,
    #[serde(default)]
    pub disposed: Option<AuditStamp>,
}

impl Specimen {
    pub fn new(
        id: SpecimenId,
        order_id: OrderId,
        patient_id: PatientId,
        specimen_kind: impl Into<String>,
    ) -> Self {
        Self {
            id,
            order_id,
            patient_id,
            specimen_kind: specimen_kind.into(),
            test_codes: BTreeSet::new(),
            required_volume_ml: 0.0,
            container_types: Vec::new(),
            container_colors: Vec::new(),
            status: SpecimenStatus::Pending,
            collection: None,
            rejection_history: Vec::new(),
            is_recollection: false,
            original_specimen_id: None,
            recollection_reason: None,
            recollection_attempt: 1,
            successor_id: None,
            storage_location: None,
            disposed: None,
        }
    }

    /// Add a test served by this specimen and its minimum volume.
    #[must_use]
    pub fn with_test(mut self, code: TestCode, min_volume_ml: f64) -> Self {
        if self.test_codes.insert(code) {
            self.required_volume_ml += min_volume_ml;
        }
        self
    }

    #[must_use]
    pub fn with_container(
        mut self,
        container_type: impl Into<String>,
        color: Option<String>,
    ) -> Self {
        let container_type = container_type.into();
        if !self.container_types.contains(&container_type) {
            self.container_types.push(container_type);
        }
        if let Some(color) = color
            && !self.container_colors.contains(&color)
        {
            self.container_colors.push(color);
        }
        self
    }

    /// Root of the recollection chain this specimen belongs to.
    pub fn root_id(&self) -> &SpecimenId {
        self.original_specimen_id.as_ref().unwrap_or(&self.id)
    }

    pub fn collected_volume_ml(&self) -> Option<f64> {
        self.collection.as_ref().map(|c| c.volume_ml)
    }

    /// Whether this is the current draw of its chain.
    pub fn is_active(&self) -> bool {
        self.successor_id.is_none()
            && !matches!(
                self.status,
                SpecimenStatus::Rejected | SpecimenStatus::Disposed
            )
    }

    pub fn accepts_container(&self, container_type: &str) -> bool {
        self.container_types.is_empty()
            || self
                .container_types
                .iter()
                .any(|c| c.eq_ignore_ascii_case(container_type))
    }
}
