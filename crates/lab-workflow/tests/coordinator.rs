//! End-to-end coordinator scenarios against the in-memory store.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use lab_catalog::InMemoryCatalog;
use lab_core::{
    CollectionRequest, EngineConfig, RejectionRequest, ResultSubmission, TestRejectionRequest,
};
use lab_model::{
    ActorRole, AliquotStatus, AuditStamp, Demographics, FlagKind, LabErrorKind, OrderId,
    OrderTestId, ParameterCode, ParameterDefinition, PatientId, RejectionReason, RejectionType,
    Sex, SpecimenId, SpecimenStatus, TestCode, TestDefinition, TestStatus,
};
use lab_workflow::{Decided, Decision, InMemoryStore, StoreError, WorkflowCoordinator};
use proptest::prelude::*;

type Coordinator = WorkflowCoordinator<InMemoryCatalog, InMemoryStore>;

fn code(value: &str) -> TestCode {
    TestCode::new(value).unwrap()
}

fn stamp(role: ActorRole) -> AuditStamp {
    AuditStamp::new(
        format!("{role}-7"),
        role,
        Utc.with_ymd_and_hms(2026, 6, 1, 7, 45, 0).unwrap(),
    )
}

fn test_definition(
    test: &str,
    kind: &str,
    container: &str,
    volume: f64,
    destination: &str,
    parameters: Vec<ParameterDefinition>,
) -> TestDefinition {
    TestDefinition {
        code: code(test),
        name: test.to_string(),
        specimen_kind: kind.to_string(),
        container_type: container.to_string(),
        container_color: None,
        min_volume_ml: volume,
        destination: destination.to_string(),
        parameters,
    }
}

fn catalog() -> InMemoryCatalog {
    let glu = ParameterDefinition::numeric(ParameterCode::new("GLU").unwrap(), "Glucose")
        .with_unit("mg/dL")
        .with_range(Some(70.0), Some(100.0))
        .with_critical(Some(40.0), Some(450.0));
    let chol = ParameterDefinition::numeric(ParameterCode::new("CHOL").unwrap(), "Cholesterol")
        .with_range(None, Some(200.0));
    let hgb = ParameterDefinition::numeric(ParameterCode::new("HGB").unwrap(), "Hemoglobin")
        .with_range(Some(12.0), Some(17.0));
    InMemoryCatalog::from_tests([
        test_definition("GLU", "serum", "SST", 1.0, "chemistry", vec![glu]),
        test_definition("LIPID", "serum", "SST", 2.0, "chemistry", vec![chol]),
        test_definition("CBC", "whole-blood", "EDTA", 2.0, "hematology", vec![hgb]),
    ])
    .unwrap()
}

fn coordinator() -> Coordinator {
    WorkflowCoordinator::new(catalog(), InMemoryStore::new(), EngineConfig::default()).unwrap()
}

fn order_id(value: &str) -> OrderId {
    OrderId::new(value).unwrap()
}

fn place(coordinator: &mut Coordinator, order: &str, codes: &[&str]) {
    let codes: Vec<_> = codes.iter().map(|c| code(c)).collect();
    coordinator
        .place_order(order_id(order), PatientId::new("P-42").unwrap(), None, &codes)
        .unwrap();
}

fn draw(volume_ml: f64) -> CollectionRequest {
    CollectionRequest {
        volume_ml,
        container_type: "SST".to_string(),
        container_color: Some("gold".to_string()),
        notes: None,
    }
}

fn specimen_id(value: &str) -> SpecimenId {
    SpecimenId::new(value).unwrap()
}

fn test_id(order: &str, test: &str) -> OrderTestId {
    OrderTestId::for_order(&order_id(order), &code(test), 0)
}

fn values(pairs: &[(&str, &str)]) -> ResultSubmission {
    ResultSubmission {
        values: pairs
            .iter()
            .map(|(k, v)| (ParameterCode::new(*k).unwrap(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>(),
        notes: None,
        partial: false,
    }
}

#[test]
fn order_creates_specimens_per_tube() {
    let mut coordinator = coordinator();
    let placed = coordinator
        .place_order(
            order_id("O1"),
            PatientId::new("P-42").unwrap(),
            None,
            &[code("GLU"), code("LIPID"), code("CBC")],
        )
        .unwrap()
        .value;
    assert_eq!(placed.specimens.len(), 2);
    assert_eq!(placed.order.active_tests().count(), 3);
    assert_eq!(coordinator.store().writes(), 1);
    assert_eq!(coordinator.store().test_count(), 3);

    let again = coordinator.place_order(
        order_id("O1"),
        PatientId::new("P-42").unwrap(),
        None,
        &[code("GLU")],
    );
    assert!(again.is_err());

    let unknown = coordinator
        .place_order(order_id("O2"), PatientId::new("P-42").unwrap(), None, &[code("XYZ")])
        .unwrap_err();
    assert_eq!(unknown.kind(), LabErrorKind::NotFound);
}

#[test]
fn collection_plans_one_aliquot_per_bench_and_tube() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU", "LIPID"]);

    let outcome = coordinator
        .collect_and_plan(&specimen_id("O1-S1"), &draw(3.0), &stamp(ActorRole::Phlebotomist))
        .unwrap()
        .value;
    assert_eq!(outcome.specimen.status, SpecimenStatus::Collected);
    assert_eq!(outcome.aliquots.len(), 1);
    assert!((outcome.aliquots[0].volume_ml - 3.0).abs() < 1e-9);
    assert_eq!(outcome.tests.len(), 2);
    assert!(
        outcome
            .tests
            .iter()
            .all(|t| t.status == TestStatus::SampleCollected)
    );
}

#[test]
fn insufficient_draw_leaves_specimen_pending() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU", "LIPID"]);

    let error = coordinator
        .collect_and_plan(&specimen_id("O1-S1"), &draw(2.0), &stamp(ActorRole::Phlebotomist))
        .unwrap_err();
    assert_eq!(error.kind(), LabErrorKind::InsufficientVolume);
    assert_eq!(
        coordinator.specimen(&specimen_id("O1-S1")).unwrap().status,
        SpecimenStatus::Pending
    );
    assert!(coordinator.aliquots_for(&specimen_id("O1-S1")).is_empty());
}

#[test]
fn store_failure_rolls_back_the_whole_transition() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU", "LIPID"]);
    let before = coordinator.workspace().clone();

    coordinator
        .store_mut()
        .fail_next(StoreError::Timeout(Duration::from_secs(30)));
    let error = coordinator
        .collect_and_plan(&specimen_id("O1-S1"), &draw(3.0), &stamp(ActorRole::Phlebotomist))
        .unwrap_err();
    assert_eq!(error.kind(), LabErrorKind::Transport);
    assert_eq!(coordinator.workspace(), &before);
    assert_eq!(coordinator.store().writes(), 1);

    // The same operation succeeds once the store answers again.
    assert!(
        coordinator
            .collect_and_plan(&specimen_id("O1-S1"), &draw(3.0), &stamp(ActorRole::Phlebotomist))
            .is_ok()
    );
}

#[test]
fn demographics_are_persisted_and_rolled_back_with_the_order() {
    let mut coordinator = coordinator();
    let patient = PatientId::new("P-42").unwrap();
    let demographics = Demographics {
        sex: Some(Sex::Female),
        age_years: Some(54),
    };

    coordinator
        .store_mut()
        .fail_next(StoreError::Transport("link down".to_string()));
    let error = coordinator
        .place_order(order_id("O1"), patient.clone(), Some(demographics), &[code("GLU")])
        .unwrap_err();
    assert_eq!(error.kind(), LabErrorKind::Transport);
    assert!(coordinator.workspace().demographics(&patient).is_none());
    assert!(coordinator.order(&order_id("O1")).is_none());

    coordinator
        .place_order(order_id("O1"), patient.clone(), Some(demographics), &[code("GLU")])
        .unwrap();
    assert_eq!(coordinator.workspace().demographics(&patient), Some(&demographics));
    assert_eq!(coordinator.store().demographics(&patient), Some(&demographics));
    assert_eq!(coordinator.store().writes(), 1);
}

#[test]
fn restore_token_undoes_an_operation_locally() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU"]);
    let before = coordinator.workspace().clone();

    let outcome = coordinator
        .collect_and_plan(&specimen_id("O1-S1"), &draw(1.0), &stamp(ActorRole::Phlebotomist))
        .unwrap();
    assert_ne!(coordinator.workspace(), &before);
    coordinator.rollback(outcome.restore);
    assert_eq!(coordinator.workspace(), &before);
}

#[test]
fn resulting_and_approval_with_critical_acknowledgement() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU"]);
    coordinator
        .collect_and_plan(&specimen_id("O1-S1"), &draw(1.0), &stamp(ActorRole::Phlebotomist))
        .unwrap();
    let glu = test_id("O1", "GLU");

    let entered = coordinator
        .enter_and_score(&glu, &values(&[("GLU", "32")]), &stamp(ActorRole::Technician))
        .unwrap()
        .value;
    assert_eq!(entered.test.status, TestStatus::Resulted);
    assert_eq!(entered.report.critical_flags().count(), 1);

    let approve = Decision::Approve { notes: None };
    let blocked = coordinator
        .approve_or_reject(&glu, &approve, &stamp(ActorRole::Pathologist))
        .unwrap_err();
    assert_eq!(blocked.kind(), LabErrorKind::UnacknowledgedCritical);

    let unauthorized = coordinator
        .acknowledge_critical(&glu, &stamp(ActorRole::Technician))
        .unwrap_err();
    assert_eq!(unauthorized.kind(), LabErrorKind::Unauthorized);

    coordinator
        .acknowledge_critical(&glu, &stamp(ActorRole::Pathologist))
        .unwrap();
    let decided = coordinator
        .approve_or_reject(&glu, &approve, &stamp(ActorRole::Pathologist))
        .unwrap()
        .value;
    assert!(matches!(decided, Decided::Validated(ref t) if t.status == TestStatus::Validated));
    assert_eq!(
        coordinator.store().test(&glu).map(|t| t.status),
        Some(TestStatus::Validated)
    );
}

#[test]
fn invalid_results_are_not_persisted() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU"]);
    coordinator
        .collect_and_plan(&specimen_id("O1-S1"), &draw(1.0), &stamp(ActorRole::Phlebotomist))
        .unwrap();
    let writes = coordinator.store().writes();
    let glu = test_id("O1", "GLU");

    let error = coordinator
        .enter_and_score(&glu, &values(&[("GLU", "∞")]), &stamp(ActorRole::Technician))
        .unwrap_err();
    assert_eq!(error.kind(), LabErrorKind::ValidationFailed);
    assert_eq!(coordinator.store().writes(), writes);
    assert_eq!(
        coordinator.test(&glu).map(|t| t.status),
        Some(TestStatus::SampleCollected)
    );
}

#[test]
fn rejected_specimen_chains_and_successor_serves_tests() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU"]);
    let rejected = coordinator
        .reject_specimen(
            &specimen_id("O1-S1"),
            &RejectionRequest {
                reasons: vec![RejectionReason::Mislabeled],
                notes: None,
                recollection_required: true,
            },
            &stamp(ActorRole::Technician),
        )
        .unwrap()
        .value;
    let successor = rejected.successor.expect("successor");
    assert_eq!(successor.id.as_str(), "O1-S1-R2");
    assert_eq!(successor.recollection_attempt, 2);

    let collected = coordinator
        .collect_and_plan(&successor.id, &draw(1.0), &stamp(ActorRole::Phlebotomist))
        .unwrap()
        .value;
    assert_eq!(collected.tests.len(), 1);
    assert_eq!(collected.tests[0].specimen_id.as_ref(), Some(&successor.id));
}

#[test]
fn recollect_decision_releases_siblings_and_disposes_unused_aliquots() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU", "LIPID"]);
    coordinator
        .collect_and_plan(&specimen_id("O1-S1"), &draw(3.0), &stamp(ActorRole::Phlebotomist))
        .unwrap();
    let glu = test_id("O1", "GLU");
    coordinator
        .enter_and_score(&glu, &values(&[("GLU", "85")]), &stamp(ActorRole::Technician))
        .unwrap();

    let decision = Decision::Reject(TestRejectionRequest {
        kind: RejectionType::ReCollect,
        reason: RejectionReason::Hemolyzed,
        notes: None,
    });
    let decided = coordinator
        .approve_or_reject(&glu, &decision, &stamp(ActorRole::Pathologist))
        .unwrap()
        .value;
    let Decided::Rejected {
        superseded,
        successor,
        recollection,
    } = decided
    else {
        panic!("expected a rejection");
    };
    assert_eq!(superseded.status, TestStatus::Superseded);
    assert_eq!(successor.status, TestStatus::Pending);
    let recollection = recollection.expect("specimen recollected");
    assert_eq!(recollection.released.len(), 1);
    assert_eq!(recollection.released[0].test_code, code("LIPID"));
    assert_eq!(recollection.disposed_aliquots.len(), 1);
    assert_eq!(
        recollection.disposed_aliquots[0].status,
        AliquotStatus::Disposed
    );

    let book = coordinator.order(&order_id("O1")).unwrap();
    assert_eq!(book.active_tests().count(), 2);
    assert!(book.active_tests().all(|t| t.status == TestStatus::Pending));
}

#[test]
fn recollect_onto_collected_successor_keeps_the_test_workable() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU", "LIPID"]);
    coordinator
        .collect_and_plan(&specimen_id("O1-S1"), &draw(3.0), &stamp(ActorRole::Phlebotomist))
        .unwrap();
    let glu = test_id("O1", "GLU");
    let lipid = test_id("O1", "LIPID");
    coordinator
        .enter_and_score(&glu, &values(&[("GLU", "85")]), &stamp(ActorRole::Technician))
        .unwrap();
    coordinator
        .enter_and_score(&lipid, &values(&[("CHOL", "150")]), &stamp(ActorRole::Technician))
        .unwrap();
    let recollect = Decision::Reject(TestRejectionRequest {
        kind: RejectionType::ReCollect,
        reason: RejectionReason::Hemolyzed,
        notes: None,
    });
    coordinator
        .approve_or_reject(&glu, &recollect, &stamp(ActorRole::Pathologist))
        .unwrap();
    let redraw = specimen_id("O1-S1-R2");
    coordinator
        .collect_and_plan(&redraw, &draw(3.0), &stamp(ActorRole::Phlebotomist))
        .unwrap();

    let decided = coordinator
        .approve_or_reject(&lipid, &recollect, &stamp(ActorRole::Pathologist))
        .unwrap()
        .value;
    let Decided::Rejected {
        successor,
        recollection,
        ..
    } = decided
    else {
        panic!("expected a rejection");
    };
    assert!(recollection.is_none());
    assert_eq!(successor.id.as_str(), "O1:LIPID:R1");
    assert_eq!(successor.status, TestStatus::SampleCollected);
    assert_eq!(successor.specimen_id.as_ref(), Some(&redraw));
    assert_eq!(
        coordinator.store().test(&successor.id).map(|t| t.status),
        Some(TestStatus::SampleCollected)
    );

    let entered = coordinator
        .enter_and_score(&successor.id, &values(&[("CHOL", "160")]), &stamp(ActorRole::Technician))
        .unwrap()
        .value;
    assert_eq!(entered.test.status, TestStatus::Resulted);
}

#[test]
fn recollect_conflicts_with_validated_sibling() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU", "LIPID"]);
    coordinator
        .collect_and_plan(&specimen_id("O1-S1"), &draw(3.0), &stamp(ActorRole::Phlebotomist))
        .unwrap();
    let glu = test_id("O1", "GLU");
    let lipid = test_id("O1", "LIPID");
    coordinator
        .enter_and_score(&glu, &values(&[("GLU", "85")]), &stamp(ActorRole::Technician))
        .unwrap();
    coordinator
        .enter_and_score(&lipid, &values(&[("CHOL", "180")]), &stamp(ActorRole::Technician))
        .unwrap();
    coordinator
        .approve_or_reject(
            &glu,
            &Decision::Approve { notes: None },
            &stamp(ActorRole::Pathologist),
        )
        .unwrap();

    let error = coordinator
        .approve_or_reject(
            &lipid,
            &Decision::Reject(TestRejectionRequest {
                kind: RejectionType::ReCollect,
                reason: RejectionReason::Lipemic,
                notes: None,
            }),
            &stamp(ActorRole::Pathologist),
        )
        .unwrap_err();
    assert_eq!(error.kind(), LabErrorKind::ConflictingApproval);
    assert_eq!(
        coordinator.specimen(&specimen_id("O1-S1")).unwrap().status,
        SpecimenStatus::Collected
    );
}

#[test]
fn delta_check_uses_previous_validated_order() {
    let mut coordinator = coordinator();
    for (order, value) in [("O1", "100"), ("O2", "160")] {
        place(&mut coordinator, order, &["GLU"]);
        coordinator
            .collect_and_plan(
                &specimen_id(&format!("{order}-S1")),
                &draw(1.0),
                &stamp(ActorRole::Phlebotomist),
            )
            .unwrap();
        let id = test_id(order, "GLU");
        let entered = coordinator
            .enter_and_score(&id, &values(&[("GLU", value)]), &stamp(ActorRole::Technician))
            .unwrap()
            .value;
        if order == "O2" {
            assert!(entered.test.flags.iter().any(|f| f.kind == FlagKind::Delta));
            assert!((entered.report.deltas[0].percent_change - 60.0).abs() < 1e-9);
        } else {
            coordinator
                .approve_or_reject(
                    &id,
                    &Decision::Approve { notes: None },
                    &stamp(ActorRole::Pathologist),
                )
                .unwrap();
        }
    }
}

#[test]
fn aliquot_usage_through_the_coordinator() {
    let mut coordinator = coordinator();
    place(&mut coordinator, "O1", &["GLU", "LIPID"]);
    let planned = coordinator
        .collect_and_plan(&specimen_id("O1-S1"), &draw(3.5), &stamp(ActorRole::Phlebotomist))
        .unwrap()
        .value;
    let aliquot = planned.aliquots[0].id.clone();

    let used = coordinator
        .consume_aliquot(&aliquot, 1.0, &[code("GLU")], &stamp(ActorRole::Technician))
        .unwrap()
        .value;
    assert_eq!(used.status, AliquotStatus::InUse);
    let error = coordinator
        .consume_aliquot(&aliquot, 0.5, &[code("CBC")], &stamp(ActorRole::Technician))
        .unwrap_err();
    assert_eq!(error.kind(), LabErrorKind::TestNotLinked);
    coordinator
        .record_aliquot_location(&aliquot, "chem fridge 1")
        .unwrap();
    coordinator
        .dispose_aliquot(&aliquot, &stamp(ActorRole::Technician))
        .unwrap();
    assert_eq!(
        coordinator.aliquot(&aliquot).map(|a| a.status),
        Some(AliquotStatus::Disposed)
    );

    let specimen = specimen_id("O1-S1");
    coordinator.accession_specimen(&specimen).unwrap();
    coordinator.begin_specimen_processing(&specimen).unwrap();
    coordinator.store_specimen(&specimen, "freezer A").unwrap();
    let disposed = coordinator
        .dispose_specimen(&specimen, &stamp(ActorRole::Technician))
        .unwrap()
        .value;
    assert_eq!(disposed.status, SpecimenStatus::Disposed);
}

proptest! {
    #[test]
    fn collection_is_all_or_nothing(tenths in 0u32..60) {
        let volume = f64::from(tenths) / 10.0;
        let mut coordinator = coordinator();
        place(&mut coordinator, "O1", &["GLU", "LIPID"]);
        let before = coordinator.workspace().clone();

        let result = coordinator.collect_and_plan(
            &specimen_id("O1-S1"),
            &draw(volume),
            &stamp(ActorRole::Phlebotomist),
        );
        if volume >= 3.0 {
            let planned = result.unwrap().value;
            prop_assert_eq!(planned.aliquots.len(), 1);
            prop_assert_eq!(coordinator.store().writes(), 2);
        } else {
            let error = result.unwrap_err();
            prop_assert_eq!(error.kind(), LabErrorKind::InsufficientVolume);
            prop_assert_eq!(coordinator.workspace(), &before);
            prop_assert_eq!(coordinator.store().writes(), 1);
        }
    }
}
