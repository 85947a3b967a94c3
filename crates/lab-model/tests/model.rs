//! Tests for lab-model types.

use lab_model::{
    ActorRole, AuditStamp, FlagKind, OrderId, OrderTest, ParameterCode, PatientId, ResultFlag,
    Specimen, SpecimenId, SpecimenStatus, TestCode, TestStatus,
};

fn order() -> OrderId {
    OrderId::new("ORD-100").unwrap()
}

#[test]
fn specimen_required_volume_sums_distinct_tests() {
    let specimen = Specimen::new(
        SpecimenId::new("ORD-100-S1").unwrap(),
        order(),
        PatientId::new("P-7").unwrap(),
        "whole-blood",
    )
    .with_test(TestCode::new("CBC").unwrap(), 2.0)
    .with_test(TestCode::new("ESR").unwrap(), 1.5)
    .with_test(TestCode::new("CBC").unwrap(), 2.0)
    .with_container("EDTA", Some("lavender".to_string()));

    assert_eq!(specimen.test_codes.len(), 2);
    assert!((specimen.required_volume_ml - 3.5).abs() < f64::EPSILON);
    assert_eq!(specimen.status, SpecimenStatus::Pending);
    assert_eq!(specimen.recollection_attempt, 1);
    assert_eq!(specimen.root_id(), &specimen.id);
    assert!(specimen.accepts_container("edta"));
    assert!(!specimen.accepts_container("SST"));
}

#[test]
fn specimen_serializes_camel_case() {
    let specimen = Specimen::new(
        SpecimenId::new("S1").unwrap(),
        order(),
        PatientId::new("P-7").unwrap(),
        "serum",
    );
    let json = serde_json::to_value(&specimen).unwrap();
    assert_eq!(json["recollectionAttempt"], 1);
    assert_eq!(json["status"], "pending");
    assert_eq!(json["orderId"], "ORD-100");

    let round: Specimen = serde_json::from_value(json).unwrap();
    assert_eq!(round, specimen);
}

#[test]
fn order_test_successor_links_back() {
    let original = OrderTest::new(order(), TestCode::new("LFT").unwrap());
    assert_eq!(original.id.as_str(), "ORD-100:LFT");

    let retest = original.successor();
    assert!(retest.is_retest);
    assert_eq!(retest.retest_number, 1);
    assert_eq!(retest.retest_of_test_id.as_ref(), Some(&original.id));
    assert_eq!(retest.status, TestStatus::Pending);
    assert_eq!(retest.id.as_str(), "ORD-100:LFT:R1");

    let second = retest.successor();
    assert_eq!(second.retest_number, 2);
    assert_eq!(second.retest_of_test_id.as_ref(), Some(&retest.id));
}

#[test]
fn acknowledgement_clears_outstanding_criticals() {
    let mut test = OrderTest::new(order(), TestCode::new("K").unwrap());
    test.flags.push(ResultFlag::new(
        ParameterCode::new("K").unwrap(),
        FlagKind::Critical,
        "critical high",
    ));
    test.flags.push(ResultFlag::new(
        ParameterCode::new("NA").unwrap(),
        FlagKind::Abnormal,
        "low",
    ));
    assert_eq!(test.unacknowledged_criticals(), 1);

    test.critical_acknowledged = Some(AuditStamp::now("dr-lee", ActorRole::Pathologist));
    assert_eq!(test.unacknowledged_criticals(), 0);
}
