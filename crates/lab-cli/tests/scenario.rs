//! Scenario runs through the library half of the CLI.

use lab_catalog::InMemoryCatalog;
use lab_cli::scenario::{Scenario, run_scenario};
use lab_core::EngineConfig;
use lab_model::{ParameterCode, ParameterDefinition, TestCode, TestDefinition};

fn definition(
    code: &str,
    kind: &str,
    container: &str,
    volume: f64,
    destination: &str,
    parameter: ParameterDefinition,
) -> TestDefinition {
    TestDefinition {
        code: TestCode::new(code).unwrap(),
        name: code.to_string(),
        specimen_kind: kind.to_string(),
        container_type: container.to_string(),
        container_color: None,
        min_volume_ml: volume,
        destination: destination.to_string(),
        parameters: vec![parameter],
    }
}

fn catalog() -> InMemoryCatalog {
    let glu = ParameterDefinition::numeric(ParameterCode::new("GLU").unwrap(), "Glucose")
        .with_unit("mg/dL")
        .with_range(Some(70.0), Some(100.0))
        .with_critical(Some(40.0), Some(450.0));
    let hgb = ParameterDefinition::numeric(ParameterCode::new("HGB").unwrap(), "Hemoglobin")
        .with_range(Some(12.0), Some(17.0));
    InMemoryCatalog::from_tests([
        definition("GLU", "serum", "SST", 1.0, "chemistry", glu),
        definition("CBC", "whole-blood", "EDTA", 2.0, "hematology", hgb),
    ])
    .unwrap()
}

const MORNING_RUN: &str = r#"{
  "steps": [
    { "actor": "desk", "role": "administrator", "at": "2026-06-01T07:00:00Z",
      "action": "place-order", "order": "O1", "patient": "P1", "tests": ["GLU", "CBC"] },
    { "actor": "amy", "role": "phlebotomist", "at": "2026-06-01T07:10:00Z",
      "action": "collect", "specimen": "O1-S1",
      "collection": { "volumeMl": 2.0, "containerType": "SST" } },
    { "actor": "amy", "role": "phlebotomist", "at": "2026-06-01T07:11:00Z",
      "action": "collect", "specimen": "O1-S2",
      "collection": { "volumeMl": 3.0, "containerType": "SST" } },
    { "actor": "ops", "role": "administrator",
      "action": "fail-next-write", "message": "link down" },
    { "actor": "amy", "role": "phlebotomist", "at": "2026-06-01T07:12:00Z",
      "action": "collect", "specimen": "O1-S2",
      "collection": { "volumeMl": 3.0, "containerType": "EDTA" } },
    { "actor": "amy", "role": "phlebotomist", "at": "2026-06-01T07:13:00Z",
      "action": "collect", "specimen": "O1-S2",
      "collection": { "volumeMl": 3.0, "containerType": "EDTA" } },
    { "actor": "tom", "role": "technician", "at": "2026-06-01T08:00:00Z",
      "action": "start-processing", "test": "O1:GLU" },
    { "actor": "tom", "role": "technician", "at": "2026-06-01T08:20:00Z",
      "action": "enter-results", "test": "O1:GLU",
      "submission": { "values": { "GLU": "480" } } },
    { "actor": "dr-lee", "role": "pathologist", "at": "2026-06-01T08:30:00Z",
      "action": "decide", "test": "O1:GLU", "decision": { "decision": "approve" } },
    { "actor": "dr-lee", "role": "pathologist", "at": "2026-06-01T08:31:00Z",
      "action": "acknowledge-critical", "test": "O1:GLU" },
    { "actor": "tom", "role": "technician", "at": "2026-06-01T08:32:00Z",
      "action": "decide", "test": "O1:GLU", "decision": { "decision": "approve" } },
    { "actor": "dr-lee", "role": "pathologist", "at": "2026-06-01T08:33:00Z",
      "action": "decide", "test": "O1:GLU",
      "decision": { "decision": "approve", "notes": "called ward" } },
    { "actor": "tom", "role": "technician", "at": "2026-06-01T09:00:00Z",
      "action": "enter-results", "test": "O1:CBC",
      "submission": { "values": { "HGB": "14" } } },
    { "actor": "dr-lee", "role": "pathologist", "at": "2026-06-01T09:10:00Z",
      "action": "decide", "test": "O1:CBC",
      "decision": { "decision": "reject", "type": "re-collect", "reason": "clotted" } }
  ]
}"#;

#[test]
fn morning_run_totals() {
    let scenario: Scenario = serde_json::from_str(MORNING_RUN).unwrap();
    let report = run_scenario(catalog(), EngineConfig::default(), &scenario).unwrap();

    assert!(report.has_failures());
    insta::assert_json_snapshot!(report.totals, @r#"
    {
      "orders": 1,
      "specimens": 3,
      "recollections": 1,
      "rejectedSpecimens": 1,
      "aliquots": 2,
      "activeTests": 2,
      "validatedTests": 1,
      "supersededTests": 1,
      "criticalFlags": 1,
      "failedSteps": 4,
      "storeWrites": 9
    }
    "#);
}

#[test]
fn failed_steps_do_not_stop_the_run() {
    let scenario: Scenario = serde_json::from_str(MORNING_RUN).unwrap();
    let report = run_scenario(catalog(), EngineConfig::default(), &scenario).unwrap();

    let outcomes: Vec<(usize, bool)> = report.steps.iter().map(|s| (s.index, s.ok)).collect();
    assert_eq!(
        outcomes,
        vec![
            (1, true),
            (2, true),
            (3, false),
            (4, true),
            (5, false),
            (6, true),
            (7, true),
            (8, true),
            (9, false),
            (10, true),
            (11, false),
            (12, true),
            (13, true),
            (14, true),
        ]
    );
    assert!(report.steps[2].detail.contains("containerType"));
    assert!(report.steps[4].detail.contains("link down"));
    assert_eq!(
        report.steps[13].detail,
        "superseded by O1:CBC:R1, new specimen O1-S2-R2"
    );
}

#[test]
fn lenient_config_validates_without_acknowledgement() {
    let scenario: Scenario = serde_json::from_str(MORNING_RUN).unwrap();
    let config = EngineConfig {
        require_critical_ack: false,
        ..EngineConfig::default()
    };
    let report = run_scenario(catalog(), config, &scenario).unwrap();

    assert!(report.steps[8].ok);
    // The test is already validated when the later approvals arrive.
    assert!(!report.steps[11].ok);
    assert_eq!(report.totals.validated_tests, 1);
}

#[test]
fn aliquot_consumption_reports_used_and_remaining_volume() {
    let text = r#"{
      "steps": [
        { "actor": "desk", "role": "administrator",
          "action": "place-order", "order": "O1", "patient": "P1", "tests": ["GLU"] },
        { "actor": "amy", "role": "phlebotomist", "action": "collect", "specimen": "O1-S1",
          "collection": { "volumeMl": 2.0, "containerType": "SST" } },
        { "actor": "tom", "role": "technician", "action": "consume-aliquot",
          "aliquot": "O1-S1-A1", "amountMl": 0.25, "tests": ["GLU"] },
        { "actor": "tom", "role": "technician", "action": "consume-aliquot",
          "aliquot": "O1-S1-A1", "amountMl": 0.5, "tests": [] }
      ]
    }"#;
    let scenario: Scenario = serde_json::from_str(text).unwrap();
    let report = run_scenario(catalog(), EngineConfig::default(), &scenario).unwrap();

    assert!(report.steps[2].ok);
    assert_eq!(report.steps[2].detail, "0.25 mL used, 0.75 mL remaining");
    assert!(!report.steps[3].ok);
}

#[test]
fn unknown_action_is_rejected_at_parse_time() {
    let text = r#"{ "steps": [ { "actor": "x", "role": "technician", "action": "teleport" } ] }"#;
    assert!(serde_json::from_str::<Scenario>(text).is_err());
}
