//! Specimen state machine.
//!
//! # Transitions
//!
//! ```text
//! pending ──collect──▶ collected ──accession──▶ accessioned
//!    │                    │  └──begin_processing──▶ processing ──store──▶ stored
//!    └──reject──▶ rejected ◀──reject (late)
//!                    │
//!                    └── recollection required ──▶ new pending successor
//! ```
//!
//! Every operation takes a snapshot and returns the post-transition
//! snapshot; the input is never mutated. Successor creation happens in the
//! same call as the rejection that triggers it.

use lab_model::{
    AuditStamp, CollectionRecord, LabError, RejectionReason, Result, Specimen, SpecimenId,
    SpecimenRejection, SpecimenStatus, Sufficiency,
};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MARGINAL_RATIO;

/// What the phlebotomist reports when drawing a specimen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRequest {
    pub volume_ml: f64,
    pub container_type: String,
    #[serde(default)]
    pub container_color: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionRequest {
    pub reasons: Vec<RejectionReason>,
    #[serde(default)]
    pub notes: Option<String>,
    pub recollection_required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    pub specimen: Specimen,
    pub sufficiency: Sufficiency,
}

/// Result of a rejection: the rejected specimen and, when a new draw is
/// needed, its pending successor.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub rejected: Specimen,
    pub successor: Option<Specimen>,
}

#[derive(Debug, Clone, Copy)]
pub struct SpecimenMachine {
    marginal_ratio: f64,
}

impl Default for SpecimenMachine {
    fn default() -> Self {
        Self::new(DEFAULT_MARGINAL_RATIO)
    }
}

impl SpecimenMachine {
    pub fn new(marginal_ratio: f64) -> Self {
        Self { marginal_ratio }
    }

    pub fn classify_volume(&self, required_ml: f64, collected_ml: f64) -> Sufficiency {
        if collected_ml >= required_ml {
            Sufficiency::Sufficient
        } else if collected_ml >= required_ml * self.marginal_ratio {
            Sufficiency::Marginal
        } else {
            Sufficiency::Insufficient
        }
    }

    /// Record a draw. The returned specimen is `collected` whatever the
    /// sufficiency; callers treat `Insufficient` as needing recollection.
    pub fn collect(
        &self,
        specimen: &Specimen,
        request: &CollectionRequest,
        stamp: &AuditStamp,
    ) -> Result<Collected> {
        expect_status(specimen, "collect", &[SpecimenStatus::Pending])?;
        if !request.volume_ml.is_finite() || request.volume_ml < 0.0 {
            return Err(LabError::invalid_value(
                "collectedVolume",
                format!("{} is not a valid volume", request.volume_ml),
            ));
        }
        if !specimen.accepts_container(&request.container_type) {
            return Err(LabError::invalid_value(
                "containerType",
                format!(
                    "{} is not accepted; expected one of: {}",
                    request.container_type,
                    specimen.container_types.join(", ")
                ),
            ));
        }

        let sufficiency = self.classify_volume(specimen.required_volume_ml, request.volume_ml);
        let mut next = specimen.clone();
        next.status = SpecimenStatus::Collected;
        next.collection = Some(CollectionRecord {
            volume_ml: request.volume_ml,
            container_type: request.container_type.clone(),
            container_color: request.container_color.clone(),
            notes: request.notes.clone(),
            sufficiency,
            stamp: stamp.clone(),
        });

        if sufficiency == Sufficiency::Insufficient {
            tracing::warn!(
                specimen = %specimen.id,
                required_ml = specimen.required_volume_ml,
                collected_ml = request.volume_ml,
                "insufficient specimen volume"
            );
        } else {
            tracing::info!(specimen = %specimen.id, %sufficiency, "specimen collected");
        }
        Ok(Collected {
            specimen: next,
            sufficiency,
        })
    }

    /// Reject a pending specimen, or a collected one before processing.
    pub fn reject(
        &self,
        specimen: &Specimen,
        request: &RejectionRequest,
        stamp: &AuditStamp,
    ) -> Result<Rejected> {
        expect_status(
            specimen,
            "reject",
            &[SpecimenStatus::Pending, SpecimenStatus::Collected],
        )?;
        if request.reasons.is_empty() {
            return Err(LabError::invalid_value(
                "reasons",
                "at least one rejection reason is required",
            ));
        }

        let mut rejected = specimen.clone();
        rejected.status = SpecimenStatus::Rejected;
        rejected.rejection_history.push(SpecimenRejection {
            stamp: stamp.clone(),
            reasons: request.reasons.clone(),
            notes: request.notes.clone(),
            recollection_required: request.recollection_required,
        });

        let successor = if request.recollection_required {
            Some(spawn_successor(&mut rejected, &request.reasons)?)
        } else {
            None
        };
        tracing::warn!(
            specimen = %specimen.id,
            reasons = %join_reasons(&request.reasons),
            successor = ?successor.as_ref().map(|s| s.id.as_str()),
            "specimen rejected"
        );
        Ok(Rejected {
            rejected,
            successor,
        })
    }

    /// Recollection discovered after the fact, e.g. during processing.
    ///
    /// Marks the specimen rejected (if it is not already) and spawns the
    /// successor. A specimen that already has a successor is refused.
    pub fn request_recollection(
        &self,
        specimen: &Specimen,
        reason: &RejectionReason,
        stamp: &AuditStamp,
    ) -> Result<Rejected> {
        expect_status(
            specimen,
            "request recollection",
            &[
                SpecimenStatus::Collected,
                SpecimenStatus::Accessioned,
                SpecimenStatus::Processing,
                SpecimenStatus::Stored,
                SpecimenStatus::Rejected,
            ],
        )?;
        let reasons = vec![reason.clone()];
        let mut rejected = specimen.clone();
        rejected.status = SpecimenStatus::Rejected;
        rejected.rejection_history.push(SpecimenRejection {
            stamp: stamp.clone(),
            reasons: reasons.clone(),
            notes: None,
            recollection_required: true,
        });
        let successor = spawn_successor(&mut rejected, &reasons)?;
        tracing::warn!(
            specimen = %specimen.id,
            successor = %successor.id,
            %reason,
            "recollection requested"
        );
        Ok(Rejected {
            rejected,
            successor: Some(successor),
        })
    }

    pub fn accession(&self, specimen: &Specimen) -> Result<Specimen> {
        expect_status(specimen, "accession", &[SpecimenStatus::Collected])?;
        Ok(with_status(specimen, SpecimenStatus::Accessioned))
    }

    pub fn begin_processing(&self, specimen: &Specimen) -> Result<Specimen> {
        expect_status(
            specimen,
            "begin processing",
            &[SpecimenStatus::Collected, SpecimenStatus::Accessioned],
        )?;
        Ok(with_status(specimen, SpecimenStatus::Processing))
    }

    pub fn store(&self, specimen: &Specimen, location: &str) -> Result<Specimen> {
        expect_status(
            specimen,
            "store",
            &[SpecimenStatus::Accessioned, SpecimenStatus::Processing],
        )?;
        if location.trim().is_empty() {
            return Err(LabError::invalid_value("location", "location is required"));
        }
        let mut next = with_status(specimen, SpecimenStatus::Stored);
        next.storage_location = Some(location.trim().to_string());
        Ok(next)
    }

    /// Terminal. Pending specimens have nothing to dispose of.
    pub fn dispose(&self, specimen: &Specimen, stamp: &AuditStamp) -> Result<Specimen> {
        if matches!(
            specimen.status,
            SpecimenStatus::Pending | SpecimenStatus::Disposed
        ) {
            return Err(LabError::invalid_state(
                "specimen",
                &specimen.id,
                "dispose",
                specimen.status,
                "a collected, rejected or stored specimen",
            ));
        }
        let mut next = with_status(specimen, SpecimenStatus::Disposed);
        next.disposed = Some(stamp.clone());
        tracing::info!(specimen = %specimen.id, "specimen disposed");
        Ok(next)
    }
}

/// Build the next draw of the chain and link `rejected` to it.
fn spawn_successor(rejected: &mut Specimen, reasons: &[RejectionReason]) -> Result<Specimen> {
    if let Some(existing) = &rejected.successor_id {
        return Err(LabError::invalid_state(
            "specimen",
            &rejected.id,
            "spawn recollection",
            format!("already succeeded by {existing}"),
            "no existing successor",
        ));
    }
    let root = rejected.root_id().clone();
    let attempt = rejected.recollection_attempt + 1;
    let mut successor = Specimen::new(
        SpecimenId::recollection(&root, attempt),
        rejected.order_id.clone(),
        rejected.patient_id.clone(),
        rejected.specimen_kind.clone(),
    );
    successor.test_codes = rejected.test_codes.clone();
    successor.required_volume_ml = rejected.required_volume_ml;
    successor.container_types = rejected.container_types.clone();
    successor.container_colors = rejected.container_colors.clone();
    successor.is_recollection = true;
    successor.original_specimen_id = Some(root);
    successor.recollection_reason = Some(join_reasons(reasons));
    successor.recollection_attempt = attempt;
    rejected.successor_id = Some(successor.id.clone());
    Ok(successor)
}

fn join_reasons(reasons: &[RejectionReason]) -> String {
    reasons
        .iter()
        .map(RejectionReason::label)
        .collect::<Vec<_>>()
        .join(", ")
}

fn with_status(specimen: &Specimen, status: SpecimenStatus) -> Specimen {
    let mut next = specimen.clone();
    next.status = status;
    next
}

fn expect_status(
    specimen: &Specimen,
    operation: &'static str,
    allowed: &[SpecimenStatus],
) -> Result<()> {
    if allowed.contains(&specimen.status) {
        return Ok(());
    }
    Err(LabError::invalid_state(
        "specimen",
        &specimen.id,
        operation,
        specimen.status,
        allowed
            .iter()
            .map(SpecimenStatus::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lab_model::{ActorRole, OrderId, PatientId, TestCode};

    fn stamp() -> AuditStamp {
        AuditStamp::new(
            "phleb-1",
            ActorRole::Phlebotomist,
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        )
    }

    fn specimen(required: f64) -> Specimen {
        Specimen::new(
            SpecimenId::new("ORD1-S1").unwrap(),
            OrderId::new("ORD1").unwrap(),
            PatientId::new("P1").unwrap(),
            "whole-blood",
        )
        .with_test(TestCode::new("CBC").unwrap(), required)
        .with_container("EDTA", Some("lavender".to_string()))
    }

    fn draw(volume_ml: f64) -> CollectionRequest {
        CollectionRequest {
            volume_ml,
            container_type: "EDTA".to_string(),
            container_color: Some("lavender".to_string()),
            notes: None,
        }
    }

    #[test]
    fn sufficiency_boundaries() {
        let machine = SpecimenMachine::default();
        let s = specimen(5.0);
        let class = |v| machine.collect(&s, &draw(v), &stamp()).unwrap().sufficiency;
        assert_eq!(class(3.0), Sufficiency::Insufficient);
        assert_eq!(class(4.0), Sufficiency::Marginal);
        assert_eq!(class(4.2), Sufficiency::Marginal);
        assert_eq!(class(5.0), Sufficiency::Sufficient);
        assert_eq!(class(6.0), Sufficiency::Sufficient);
    }

    #[test]
    fn collect_requires_pending() {
        let machine = SpecimenMachine::default();
        let collected = machine
            .collect(&specimen(5.0), &draw(5.0), &stamp())
            .unwrap()
            .specimen;
        assert_eq!(collected.status, SpecimenStatus::Collected);
        assert_eq!(collected.collected_volume_ml(), Some(5.0));

        let error = machine.collect(&collected, &draw(5.0), &stamp()).unwrap_err();
        assert_eq!(error.kind(), lab_model::LabErrorKind::InvalidState);
    }

    #[test]
    fn collect_rejects_bad_volume_and_wrong_tube() {
        let machine = SpecimenMachine::default();
        assert!(machine.collect(&specimen(5.0), &draw(f64::NAN), &stamp()).is_err());
        assert!(machine.collect(&specimen(5.0), &draw(-1.0), &stamp()).is_err());

        let mut request = draw(5.0);
        request.container_type = "SST".to_string();
        let error = machine.collect(&specimen(5.0), &request, &stamp()).unwrap_err();
        assert!(error.to_string().contains("SST"));
    }

    #[test]
    fn reject_without_recollection_ends_chain() {
        let machine = SpecimenMachine::default();
        let request = RejectionRequest {
            reasons: vec![RejectionReason::Hemolyzed],
            notes: Some("grossly hemolyzed".to_string()),
            recollection_required: false,
        };
        let outcome = machine.reject(&specimen(5.0), &request, &stamp()).unwrap();
        assert_eq!(outcome.rejected.status, SpecimenStatus::Rejected);
        assert!(outcome.successor.is_none());
        assert_eq!(outcome.rejected.rejection_history.len(), 1);
    }

    #[test]
    fn reject_requires_a_reason() {
        let machine = SpecimenMachine::default();
        let request = RejectionRequest {
            reasons: vec![],
            notes: None,
            recollection_required: true,
        };
        assert!(machine.reject(&specimen(5.0), &request, &stamp()).is_err());
    }

    #[test]
    fn processing_specimen_cannot_be_rejected_directly() {
        let machine = SpecimenMachine::default();
        let collected = machine
            .collect(&specimen(5.0), &draw(5.0), &stamp())
            .unwrap()
            .specimen;
        let processing = machine.begin_processing(&collected).unwrap();
        let request = RejectionRequest {
            reasons: vec![RejectionReason::Clotted],
            notes: None,
            recollection_required: true,
        };
        assert!(machine.reject(&processing, &request, &stamp()).is_err());

        let outcome = machine
            .request_recollection(&processing, &RejectionReason::Clotted, &stamp())
            .unwrap();
        assert_eq!(outcome.rejected.status, SpecimenStatus::Rejected);
        assert_eq!(outcome.successor.unwrap().recollection_attempt, 2);
    }

    #[test]
    fn recollection_is_spawned_once() {
        let machine = SpecimenMachine::default();
        let collected = machine
            .collect(&specimen(5.0), &draw(5.0), &stamp())
            .unwrap()
            .specimen;
        let first = machine
            .request_recollection(&collected, &RejectionReason::Clotted, &stamp())
            .unwrap();
        let again =
            machine.request_recollection(&first.rejected, &RejectionReason::Clotted, &stamp());
        assert!(again.is_err());
    }

    #[test]
    fn post_collection_lifecycle() {
        let machine = SpecimenMachine::default();
        let collected = machine
            .collect(&specimen(5.0), &draw(5.0), &stamp())
            .unwrap()
            .specimen;
        let accessioned = machine.accession(&collected).unwrap();
        assert!(machine.accession(&accessioned).is_err());
        let stored = machine.store(&accessioned, "fridge-2/rack-B").unwrap();
        assert_eq!(stored.storage_location.as_deref(), Some("fridge-2/rack-B"));
        let disposed = machine.dispose(&stored, &stamp()).unwrap();
        assert_eq!(disposed.status, SpecimenStatus::Disposed);
        assert!(machine.dispose(&disposed, &stamp()).is_err());
        assert!(machine.dispose(&specimen(5.0), &stamp()).is_err());
    }
}
