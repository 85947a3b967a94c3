//! Aliquot planning and usage.
//!
//! Planning is all-or-nothing: either every merged group fits in the
//! collected volume and one aliquot is emitted per group, or the call fails
//! and nothing is produced.

use std::collections::BTreeSet;

use lab_model::{
    Aliquot, AliquotId, AliquotStatus, AliquotUsage, AuditStamp, LabError, Result, Specimen,
    TestCode,
};
use serde::{Deserialize, Serialize};

/// Tolerance for floating point volume comparisons (mL).
const VOLUME_EPSILON: f64 = 1e-9;

/// Tests that must be served from one specimen, as requested by a bench.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestGroup {
    pub test_codes: Vec<TestCode>,
    pub destination: String,
    pub required_volume_ml: f64,
    pub container_type: String,
}

/// Test groups sharing destination and container, merged into one aliquot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedGroup {
    pub destination: String,
    pub container_type: String,
    pub test_codes: BTreeSet<TestCode>,
    pub volume_ml: f64,
}

/// Merge groups by `(destination, container type)` keeping first-seen order.
pub fn merge_groups(groups: &[TestGroup]) -> Result<Vec<PlannedGroup>> {
    let mut merged: Vec<PlannedGroup> = Vec::new();
    for group in groups {
        if !group.required_volume_ml.is_finite() || group.required_volume_ml <= 0.0 {
            return Err(LabError::invalid_value(
                "requiredVolume",
                format!(
                    "group for {} requires {} mL",
                    group.destination, group.required_volume_ml
                ),
            ));
        }
        match merged.iter_mut().find(|m| {
            m.destination == group.destination && m.container_type == group.container_type
        }) {
            Some(existing) => {
                existing.test_codes.extend(group.test_codes.iter().cloned());
                existing.volume_ml += group.required_volume_ml;
            }
            None => merged.push(PlannedGroup {
                destination: group.destination.clone(),
                container_type: group.container_type.clone(),
                test_codes: group.test_codes.iter().cloned().collect(),
                volume_ml: group.required_volume_ml,
            }),
        }
    }
    Ok(merged)
}

/// Check merged groups against the available volume.
pub fn plan_volumes(available_ml: f64, groups: &[TestGroup]) -> Result<Vec<PlannedGroup>> {
    let merged = merge_groups(groups)?;
    let requested_ml: f64 = merged.iter().map(|g| g.volume_ml).sum();
    if requested_ml > available_ml + VOLUME_EPSILON {
        return Err(LabError::InsufficientVolume {
            requested_ml,
            available_ml,
        });
    }
    Ok(merged)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AliquotPlanner;

impl AliquotPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Split a collected specimen into planned aliquots.
    pub fn plan(&self, specimen: &Specimen, groups: &[TestGroup]) -> Result<Vec<Aliquot>> {
        if !specimen.status.holds_material() {
            return Err(LabError::invalid_state(
                "specimen",
                &specimen.id,
                "plan aliquots",
                specimen.status,
                "a collected specimen",
            ));
        }
        let available_ml = specimen.collected_volume_ml().unwrap_or(0.0);

        for code in groups.iter().flat_map(|g| &g.test_codes) {
            if !specimen.test_codes.contains(code) {
                return Err(LabError::invalid_value(
                    "testCodes",
                    format!("{code} is not served by specimen {}", specimen.id),
                ));
            }
        }

        let merged = plan_volumes(available_ml, groups).inspect_err(|_| {
            tracing::warn!(
                specimen = %specimen.id,
                available_ml,
                "aliquot plan exceeds collected volume"
            );
        })?;

        let aliquots: Vec<Aliquot> = merged
            .into_iter()
            .zip(1u32..)
            .map(|(group, sequence)| Aliquot {
                id: AliquotId::for_specimen(&specimen.id, sequence),
                specimen_id: specimen.id.clone(),
                order_id: specimen.order_id.clone(),
                patient_id: specimen.patient_id.clone(),
                sequence,
                volume_ml: group.volume_ml,
                remaining_volume_ml: group.volume_ml,
                test_codes: group.test_codes,
                container_type: group.container_type,
                destination: group.destination,
                status: AliquotStatus::Planned,
                location: None,
                usage: Vec::new(),
                disposed: None,
            })
            .collect();
        tracing::info!(specimen = %specimen.id, count = aliquots.len(), "aliquots planned");
        Ok(aliquots)
    }

    pub fn mark_in_use(&self, aliquot: &Aliquot) -> Result<Aliquot> {
        if aliquot.status != AliquotStatus::Planned {
            return Err(state_error(aliquot, "mark in use", "planned"));
        }
        let mut next = aliquot.clone();
        next.status = AliquotStatus::InUse;
        Ok(next)
    }

    /// Draw volume from an aliquot for the given tests.
    pub fn consume(
        &self,
        aliquot: &Aliquot,
        amount_ml: f64,
        test_codes: &[TestCode],
        stamp: &AuditStamp,
    ) -> Result<Aliquot> {
        if !aliquot.status.is_live() {
            return Err(state_error(aliquot, "consume", "planned or in-use"));
        }
        if !amount_ml.is_finite() || amount_ml <= 0.0 {
            return Err(LabError::invalid_value(
                "amount",
                format!("{amount_ml} is not a valid volume"),
            ));
        }
        if test_codes.is_empty() {
            return Err(LabError::invalid_value(
                "testCodes",
                "consumption must name at least one linked test",
            ));
        }
        if let Some(code) = test_codes.iter().find(|c| !aliquot.serves(c)) {
            return Err(LabError::TestNotLinked {
                aliquot: aliquot.id.to_string(),
                test_code: code.to_string(),
            });
        }
        if amount_ml > aliquot.remaining_volume_ml + VOLUME_EPSILON {
            return Err(LabError::InsufficientAliquotVolume {
                aliquot: aliquot.id.to_string(),
                requested_ml: amount_ml,
                remaining_ml: aliquot.remaining_volume_ml,
            });
        }

        let mut next = aliquot.clone();
        next.remaining_volume_ml = (aliquot.remaining_volume_ml - amount_ml).max(0.0);
        if next.remaining_volume_ml <= VOLUME_EPSILON {
            next.remaining_volume_ml = 0.0;
            next.status = AliquotStatus::Consumed;
        } else {
            next.status = AliquotStatus::InUse;
        }
        next.usage.push(AliquotUsage {
            stamp: stamp.clone(),
            amount_ml,
            test_codes: test_codes.to_vec(),
        });
        tracing::debug!(
            aliquot = %aliquot.id,
            amount_ml,
            remaining_ml = next.remaining_volume_ml,
            "aliquot consumed"
        );
        Ok(next)
    }

    pub fn dispose(&self, aliquot: &Aliquot, stamp: &AuditStamp) -> Result<Aliquot> {
        if aliquot.status == AliquotStatus::Disposed {
            return Err(state_error(aliquot, "dispose", "a non-disposed aliquot"));
        }
        let mut next = aliquot.clone();
        next.status = AliquotStatus::Disposed;
        next.disposed = Some(stamp.clone());
        Ok(next)
    }

    pub fn record_location(&self, aliquot: &Aliquot, location: &str) -> Result<Aliquot> {
        if aliquot.status == AliquotStatus::Disposed {
            return Err(state_error(aliquot, "record location", "a non-disposed aliquot"));
        }
        if location.trim().is_empty() {
            return Err(LabError::invalid_value("location", "location is required"));
        }
        let mut next = aliquot.clone();
        next.location = Some(location.trim().to_string());
        Ok(next)
    }
}

fn state_error(aliquot: &Aliquot, operation: &'static str, expected: &str) -> LabError {
    LabError::invalid_state("aliquot", &aliquot.id, operation, aliquot.status, expected)
}
