//! Scripted workflows played through the coordinator.
//!
//! A scenario is a JSON list of steps, each performed by an actor in a role:
//!
//! ```json
//! {
//!   "steps": [
//!     { "actor": "desk", "role": "administrator", "action": "place-order",
//!       "order": "O1", "patient": "P1", "tests": ["GLU"] },
//!     { "actor": "amy", "role": "phlebotomist", "action": "collect",
//!       "specimen": "O1-S1", "collection": { "volumeMl": 1.0, "containerType": "SST" } }
//!   ]
//! }
//! ```
//!
//! A failing step is recorded and the run continues with the next one.

use chrono::{DateTime, Utc};
use lab_catalog::ReferenceCatalog;
use lab_core::{
    CollectionRequest, ConfigError, EngineConfig, RejectionRequest, ResultSubmission, flag_summary,
};
use lab_model::{
    ActorRole, AliquotId, AuditStamp, Demographics, LabError, OrderId, OrderTestId, PatientId,
    RejectionReason, SpecimenId, SpecimenStatus, TestCode, TestStatus,
};
use lab_workflow::{Decided, Decision, InMemoryStore, StoreError, WorkflowCoordinator};
use serde::{Deserialize, Serialize};

use crate::logging::redact_value;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub actor: String,
    pub role: ActorRole,
    /// Defaults to the time the step runs.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    PlaceOrder {
        order: OrderId,
        patient: PatientId,
        #[serde(default)]
        demographics: Option<Demographics>,
        tests: Vec<TestCode>,
    },
    Collect {
        specimen: SpecimenId,
        collection: CollectionRequest,
    },
    RejectSpecimen {
        specimen: SpecimenId,
        rejection: RejectionRequest,
    },
    Recollect {
        specimen: SpecimenId,
        reason: RejectionReason,
    },
    Accession {
        specimen: SpecimenId,
    },
    #[serde(rename_all = "camelCase")]
    ConsumeAliquot {
        aliquot: AliquotId,
        amount_ml: f64,
        tests: Vec<TestCode>,
    },
    StartProcessing {
        test: OrderTestId,
    },
    EnterResults {
        test: OrderTestId,
        submission: ResultSubmission,
    },
    AcknowledgeCritical {
        test: OrderTestId,
    },
    Decide {
        test: OrderTestId,
        decision: Decision,
    },
    /// Make the next store write fail, to exercise rollback.
    FailNextWrite {
        #[serde(default)]
        message: Option<String>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::PlaceOrder { .. } => "place-order",
            Action::Collect { .. } => "collect",
            Action::RejectSpecimen { .. } => "reject-specimen",
            Action::Recollect { .. } => "recollect",
            Action::Accession { .. } => "accession",
            Action::ConsumeAliquot { .. } => "consume-aliquot",
            Action::StartProcessing { .. } => "start-processing",
            Action::EnterResults { .. } => "enter-results",
            Action::AcknowledgeCritical { .. } => "acknowledge-critical",
            Action::Decide { .. } => "decide",
            Action::FailNextWrite { .. } => "fail-next-write",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub action: &'static str,
    pub actor: String,
    pub ok: bool,
    pub detail: String,
}

/// Final entity counts after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub orders: usize,
    pub specimens: usize,
    pub recollections: usize,
    pub rejected_specimens: usize,
    pub aliquots: usize,
    pub active_tests: usize,
    pub validated_tests: usize,
    pub superseded_tests: usize,
    pub critical_flags: usize,
    pub failed_steps: usize,
    pub store_writes: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub steps: Vec<StepReport>,
    pub totals: RunTotals,
}

impl ScenarioReport {
    pub fn has_failures(&self) -> bool {
        self.totals.failed_steps > 0
    }
}

/// Play every step of `scenario` against a fresh in-memory store.
pub fn run_scenario<C: ReferenceCatalog>(
    catalog: C,
    config: EngineConfig,
    scenario: &Scenario,
) -> Result<ScenarioReport, ConfigError> {
    let mut coordinator = WorkflowCoordinator::new(catalog, InMemoryStore::new(), config)?;
    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let span = tracing::info_span!("step", index, action = step.action.name());
        let _guard = span.enter();
        let result = perform(&mut coordinator, step);
        if let Err(error) = &result {
            tracing::warn!(%error, "step failed");
        }
        steps.push(StepReport {
            index: index + 1,
            action: step.action.name(),
            actor: step.actor.clone(),
            ok: result.is_ok(),
            detail: result.unwrap_or_else(|error| error.to_string()),
        });
    }
    let totals = totals(&coordinator, &steps);
    Ok(ScenarioReport { steps, totals })
}

fn perform<C: ReferenceCatalog>(
    coordinator: &mut WorkflowCoordinator<C, InMemoryStore>,
    step: &Step,
) -> Result<String, LabError> {
    let stamp = AuditStamp::new(step.actor.clone(), step.role, step.at.unwrap_or_else(Utc::now));
    match &step.action {
        Action::PlaceOrder {
            order,
            patient,
            demographics,
            tests,
        } => {
            let placed = coordinator
                .place_order(order.clone(), patient.clone(), *demographics, tests)?
                .value;
            Ok(format!(
                "{} test(s), specimens {}",
                placed.order.active_tests().count(),
                join(placed.specimens.iter().map(|s| s.id.as_str()))
            ))
        }
        Action::Collect {
            specimen,
            collection,
        } => {
            let outcome = coordinator
                .collect_and_plan(specimen, collection, &stamp)?
                .value;
            Ok(format!(
                "{}, aliquots {}",
                outcome.sufficiency,
                join(outcome.aliquots.iter().map(|a| a.id.as_str()))
            ))
        }
        Action::RejectSpecimen {
            specimen,
            rejection,
        } => {
            let outcome = coordinator
                .reject_specimen(specimen, rejection, &stamp)?
                .value;
            Ok(successor_detail(outcome.successor.as_ref().map(|s| s.id.as_str())))
        }
        Action::Recollect { specimen, reason } => {
            let outcome = coordinator
                .request_recollection(specimen, reason, &stamp)?
                .value;
            Ok(successor_detail(outcome.successor.as_ref().map(|s| s.id.as_str())))
        }
        Action::Accession { specimen } => {
            let next = coordinator.accession_specimen(specimen)?.value;
            Ok(next.status.to_string())
        }
        Action::ConsumeAliquot {
            aliquot,
            amount_ml,
            tests,
        } => {
            let next = coordinator
                .consume_aliquot(aliquot, *amount_ml, tests, &stamp)?
                .value;
            Ok(format!(
                "{} mL used, {} mL remaining",
                next.consumed_ml(),
                next.remaining_volume_ml
            ))
        }
        Action::StartProcessing { test } => {
            let next = coordinator.start_processing(test)?.value;
            Ok(next.status.to_string())
        }
        Action::EnterResults { test, submission } => {
            for (parameter, value) in &submission.values {
                tracing::trace!(
                    test = %test,
                    %parameter,
                    value = redact_value(value),
                    "submitted value"
                );
            }
            let entered = coordinator.enter_and_score(test, submission, &stamp)?.value;
            let flags = flag_summary(&entered.test)
                .into_iter()
                .map(|(kind, count)| format!("{count} {}", kind.as_str()))
                .collect::<Vec<_>>();
            if flags.is_empty() {
                Ok(entered.test.status.to_string())
            } else {
                Ok(format!("{}, {}", entered.test.status, flags.join(", ")))
            }
        }
        Action::AcknowledgeCritical { test } => {
            coordinator.acknowledge_critical(test, &stamp)?;
            Ok("acknowledged".to_string())
        }
        Action::Decide { test, decision } => {
            let decided = coordinator.approve_or_reject(test, decision, &stamp)?.value;
            Ok(match decided {
                Decided::Validated(test) => test.status.to_string(),
                Decided::Rejected {
                    successor,
                    recollection,
                    ..
                } => format!(
                    "superseded by {}{}",
                    successor.id,
                    recollection
                        .and_then(|r| r.successor)
                        .map(|s| format!(", new specimen {}", s.id))
                        .unwrap_or_default()
                ),
            })
        }
        Action::FailNextWrite { message } => {
            let message = message.clone().unwrap_or_else(|| "injected failure".to_string());
            coordinator
                .store_mut()
                .fail_next(StoreError::Transport(message));
            Ok("armed".to_string())
        }
    }
}

fn successor_detail(successor: Option<&str>) -> String {
    match successor {
        Some(id) => format!("rejected, successor {id}"),
        None => "rejected".to_string(),
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() { "-".to_string() } else { joined }
}

fn totals<C: ReferenceCatalog>(
    coordinator: &WorkflowCoordinator<C, InMemoryStore>,
    steps: &[StepReport],
) -> RunTotals {
    let workspace = coordinator.workspace();
    let mut totals = RunTotals {
        failed_steps: steps.iter().filter(|s| !s.ok).count(),
        store_writes: coordinator.store().writes(),
        ..RunTotals::default()
    };
    for specimen in workspace.specimens() {
        totals.specimens += 1;
        totals.aliquots += workspace.aliquots_for(&specimen.id).count();
        if specimen.is_recollection {
            totals.recollections += 1;
        }
        if specimen.status == SpecimenStatus::Rejected {
            totals.rejected_specimens += 1;
        }
    }
    for book in workspace.orders() {
        totals.orders += 1;
        for test in book.all() {
            match test.status {
                TestStatus::Validated => totals.validated_tests += 1,
                TestStatus::Superseded => totals.superseded_tests += 1,
                _ => {}
            }
            if test.is_active() {
                totals.active_tests += 1;
                totals.critical_flags += test.critical_flag_count();
            }
        }
    }
    totals
}
