//! The façade the surrounding application calls.
//!
//! Each mutating operation computes its transition against snapshots, applies
//! the resulting [`ChangeSet`] to the workspace, then persists it. If the
//! store fails the workspace is restored before the error is returned, so a
//! caller never observes a local state the store does not hold.

use std::collections::BTreeMap;

use lab_catalog::ReferenceCatalog;
use lab_core::{
    AliquotPlanner, CollectionRequest, ConfigError, EngineConfig, EnteredResults, OrderBook,
    Rejected, RejectionRequest, ResultContext, ResultSubmission, SpecimenMachine, TestOrchestrator,
    TestRejectionRequest, plan_specimens, test_groups_for,
};
use lab_model::{
    Aliquot, AliquotId, AliquotStatus, AuditStamp, Demographics, LabError, OrderId, OrderTest,
    OrderTestId, ParameterCode, PatientId, RejectionReason, Result, Specimen, SpecimenId,
    Sufficiency, TestCode, TestStatus,
};
use serde::{Deserialize, Serialize};

use crate::store::RecordStore;
use crate::workspace::{ChangeSet, RestoreToken, Workspace};

/// A post-transition value and the token that undoes it locally.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub restore: RestoreToken,
}

#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: OrderBook,
    pub specimens: Vec<Specimen>,
}

#[derive(Debug, Clone)]
pub struct CollectedAndPlanned {
    pub specimen: Specimen,
    pub sufficiency: Sufficiency,
    pub aliquots: Vec<Aliquot>,
    /// Tests moved to `sample-collected` by this collection.
    pub tests: Vec<OrderTest>,
}

#[derive(Debug, Clone)]
pub struct SpecimenRejected {
    pub rejected: Specimen,
    pub successor: Option<Specimen>,
    /// Tests returned to `pending` to wait for the next draw.
    pub released: Vec<OrderTest>,
    pub disposed_aliquots: Vec<Aliquot>,
}

/// A sign-off decision on a resulted test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum Decision {
    Approve {
        #[serde(default)]
        notes: Option<String>,
    },
    Reject(TestRejectionRequest),
}

#[derive(Debug, Clone)]
pub enum Decided {
    Validated(OrderTest),
    Rejected {
        superseded: OrderTest,
        successor: OrderTest,
        recollection: Option<SpecimenRejected>,
    },
}

pub struct WorkflowCoordinator<C, S> {
    catalog: C,
    store: S,
    config: EngineConfig,
    specimens: SpecimenMachine,
    planner: AliquotPlanner,
    orchestrator: TestOrchestrator,
    workspace: Workspace,
}

impl<C: ReferenceCatalog, S: RecordStore> WorkflowCoordinator<C, S> {
    pub fn new(
        catalog: C,
        store: S,
        config: EngineConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            specimens: SpecimenMachine::new(config.marginal_ratio),
            planner: AliquotPlanner::new(),
            orchestrator: TestOrchestrator::new(&config),
            catalog,
            store,
            config,
            workspace: Workspace::new(),
        })
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn specimen(&self, id: &SpecimenId) -> Option<Specimen> {
        self.workspace.specimen(id).cloned()
    }

    pub fn aliquot(&self, id: &AliquotId) -> Option<Aliquot> {
        self.workspace.aliquot(id).cloned()
    }

    pub fn aliquots_for(&self, specimen: &SpecimenId) -> Vec<Aliquot> {
        self.workspace.aliquots_for(specimen).cloned().collect()
    }

    pub fn order(&self, id: &OrderId) -> Option<OrderBook> {
        self.workspace.order(id).cloned()
    }

    pub fn test(&self, id: &OrderTestId) -> Option<OrderTest> {
        self.workspace.find_test(id).map(|(_, test)| test.clone())
    }

    /// Undo a previously returned outcome in the local workspace.
    pub fn rollback(&mut self, token: RestoreToken) {
        token.restore_into(&mut self.workspace);
    }

    /// Create the order's test records and its pending specimens.
    pub fn place_order(
        &mut self,
        order_id: OrderId,
        patient_id: PatientId,
        demographics: Option<Demographics>,
        codes: &[TestCode],
    ) -> Result<Outcome<PlacedOrder>> {
        if self.workspace.order(&order_id).is_some() {
            return Err(LabError::invalid_value(
                "orderId",
                format!("order {order_id} is already placed"),
            ));
        }
        if codes.is_empty() {
            return Err(LabError::invalid_value("tests", "an order needs at least one test"));
        }

        let mut book = OrderBook::new(order_id.clone(), patient_id.clone());
        for code in codes {
            if self.catalog.test(code).is_none() {
                return Err(LabError::not_found("test", code));
            }
            book.add(code.clone())?;
        }
        let specimens = plan_specimens(&order_id, &patient_id, codes, &self.catalog)?;

        let mut changes = ChangeSet {
            specimens: specimens.clone(),
            patients: demographics
                .map(|demographics| (patient_id, demographics))
                .into_iter()
                .collect(),
            ..ChangeSet::default()
        };
        changes.with_book(book.clone(), book.all().to_vec());
        let restore = self.commit(changes)?;
        tracing::info!(
            order = %order_id,
            tests = codes.len(),
            specimens = specimens.len(),
            "order placed"
        );
        Ok(Outcome {
            value: PlacedOrder {
                order: book,
                specimens,
            },
            restore,
        })
    }

    /// Collect a specimen and plan its aliquots as one unit.
    ///
    /// An insufficient draw fails with `InsufficientVolume` and leaves the
    /// specimen pending; the caller rejects it with recollection. A failed
    /// plan likewise leaves nothing applied.
    pub fn collect_and_plan(
        &mut self,
        specimen_id: &SpecimenId,
        request: &CollectionRequest,
        stamp: &AuditStamp,
    ) -> Result<Outcome<CollectedAndPlanned>> {
        let specimen = self.specimen_snapshot(specimen_id)?;
        let collected = self.specimens.collect(&specimen, request, stamp)?;
        if collected.sufficiency == Sufficiency::Insufficient {
            return Err(LabError::InsufficientVolume {
                requested_ml: specimen.required_volume_ml,
                available_ml: request.volume_ml,
            });
        }
        if let Some(live) = self
            .workspace
            .aliquots_for(specimen_id)
            .find(|a| a.status.is_live())
        {
            return Err(LabError::invalid_state(
                "specimen",
                specimen_id,
                "plan aliquots",
                format!("already planned ({})", live.id),
                "no live aliquot plan",
            ));
        }

        let groups = test_groups_for(&collected.specimen, &self.catalog)?;
        let aliquots = self.planner.plan(&collected.specimen, &groups)?;

        let mut book = self.book_snapshot(&specimen.order_id)?;
        let mut tests = Vec::new();
        for code in &collected.specimen.test_codes {
            if let Some(test) = book.active(code)
                && test.status == TestStatus::Pending
            {
                tests.push(
                    self.orchestrator
                        .mark_sample_collected(test, &collected.specimen)?,
                );
            }
        }
        for test in &tests {
            book.replace(test.clone())?;
        }

        let mut changes = ChangeSet {
            specimens: vec![collected.specimen.clone()],
            aliquots: aliquots.clone(),
            ..ChangeSet::default()
        };
        changes.with_book(book, tests.clone());
        let restore = self.commit(changes)?;
        Ok(Outcome {
            value: CollectedAndPlanned {
                specimen: collected.specimen,
                sufficiency: collected.sufficiency,
                aliquots,
                tests,
            },
            restore,
        })
    }

    pub fn reject_specimen(
        &mut self,
        specimen_id: &SpecimenId,
        request: &RejectionRequest,
        stamp: &AuditStamp,
    ) -> Result<Outcome<SpecimenRejected>> {
        let specimen = self.specimen_snapshot(specimen_id)?;
        let rejected = self.specimens.reject(&specimen, request, stamp)?;
        self.commit_specimen_rejection(rejected, stamp)
    }

    pub fn request_recollection(
        &mut self,
        specimen_id: &SpecimenId,
        reason: &RejectionReason,
        stamp: &AuditStamp,
    ) -> Result<Outcome<SpecimenRejected>> {
        let specimen = self.specimen_snapshot(specimen_id)?;
        let rejected = self.specimens.request_recollection(&specimen, reason, stamp)?;
        self.commit_specimen_rejection(rejected, stamp)
    }

    pub fn accession_specimen(&mut self, specimen_id: &SpecimenId) -> Result<Outcome<Specimen>> {
        let specimen = self.specimen_snapshot(specimen_id)?;
        let next = self.specimens.accession(&specimen)?;
        self.commit_specimen(next)
    }

    pub fn begin_specimen_processing(
        &mut self,
        specimen_id: &SpecimenId,
    ) -> Result<Outcome<Specimen>> {
        let specimen = self.specimen_snapshot(specimen_id)?;
        let next = self.specimens.begin_processing(&specimen)?;
        self.commit_specimen(next)
    }

    pub fn store_specimen(
        &mut self,
        specimen_id: &SpecimenId,
        location: &str,
    ) -> Result<Outcome<Specimen>> {
        let specimen = self.specimen_snapshot(specimen_id)?;
        let next = self.specimens.store(&specimen, location)?;
        self.commit_specimen(next)
    }

    pub fn dispose_specimen(
        &mut self,
        specimen_id: &SpecimenId,
        stamp: &AuditStamp,
    ) -> Result<Outcome<Specimen>> {
        let specimen = self.specimen_snapshot(specimen_id)?;
        let next = self.specimens.dispose(&specimen, stamp)?;
        self.commit_specimen(next)
    }

    pub fn mark_aliquot_in_use(&mut self, aliquot_id: &AliquotId) -> Result<Outcome<Aliquot>> {
        let aliquot = self.aliquot_snapshot(aliquot_id)?;
        let next = self.planner.mark_in_use(&aliquot)?;
        self.commit_aliquot(next)
    }

    pub fn consume_aliquot(
        &mut self,
        aliquot_id: &AliquotId,
        amount_ml: f64,
        test_codes: &[TestCode],
        stamp: &AuditStamp,
    ) -> Result<Outcome<Aliquot>> {
        let aliquot = self.aliquot_snapshot(aliquot_id)?;
        let next = self.planner.consume(&aliquot, amount_ml, test_codes, stamp)?;
        self.commit_aliquot(next)
    }

    pub fn dispose_aliquot(
        &mut self,
        aliquot_id: &AliquotId,
        stamp: &AuditStamp,
    ) -> Result<Outcome<Aliquot>> {
        let aliquot = self.aliquot_snapshot(aliquot_id)?;
        let next = self.planner.dispose(&aliquot, stamp)?;
        self.commit_aliquot(next)
    }

    pub fn record_aliquot_location(
        &mut self,
        aliquot_id: &AliquotId,
        location: &str,
    ) -> Result<Outcome<Aliquot>> {
        let aliquot = self.aliquot_snapshot(aliquot_id)?;
        let next = self.planner.record_location(&aliquot, location)?;
        self.commit_aliquot(next)
    }

    pub fn start_processing(&mut self, test_id: &OrderTestId) -> Result<Outcome<OrderTest>> {
        let (book, test) = self.test_snapshot(test_id)?;
        let next = self.orchestrator.start_processing(&test)?;
        self.commit_test(book, next)
    }

    /// Score a result submission and record it on the test.
    ///
    /// Delta checks compare against the patient's most recent validated
    /// result for the same test on another order.
    pub fn enter_and_score(
        &mut self,
        test_id: &OrderTestId,
        submission: &ResultSubmission,
        stamp: &AuditStamp,
    ) -> Result<Outcome<EnteredResults>> {
        let (mut book, test) = self.test_snapshot(test_id)?;
        let Some(specimen_id) = test.specimen_id.clone() else {
            return Err(LabError::invalid_state(
                "order test",
                &test.id,
                "enter results",
                test.status,
                "a collected specimen",
            ));
        };
        let specimen = self.specimen_snapshot(&specimen_id)?;
        let definition = self
            .catalog
            .test(&test.test_code)
            .ok_or_else(|| LabError::not_found("test", &test.test_code))?;
        let demographics = self.workspace.demographics(&book.patient_id).copied();
        let previous = self.previous_results(&book.patient_id, &test.test_code, &book.order_id);

        let entered = self.orchestrator.enter_results(
            &test,
            submission,
            &ResultContext {
                specimen: &specimen,
                definition,
                demographics: demographics.as_ref(),
                previous: (!previous.is_empty()).then_some(&previous),
            },
            stamp,
        )?;
        if entered.report.critical_flags().next().is_some() {
            tracing::warn!(
                test = %test.id,
                patient = %book.patient_id,
                "critical result needs escalation"
            );
        }

        book.replace(entered.test.clone())?;
        let mut changes = ChangeSet::default();
        changes.with_book(book, [entered.test.clone()]);
        let restore = self.commit(changes)?;
        Ok(Outcome {
            value: entered,
            restore,
        })
    }

    pub fn acknowledge_critical(
        &mut self,
        test_id: &OrderTestId,
        stamp: &AuditStamp,
    ) -> Result<Outcome<OrderTest>> {
        let (book, test) = self.test_snapshot(test_id)?;
        let next = self.orchestrator.acknowledge_critical(&test, stamp)?;
        self.commit_test(book, next)
    }

    /// Validate a resulted test, or reject it into a retest or recollection.
    pub fn approve_or_reject(
        &mut self,
        test_id: &OrderTestId,
        decision: &Decision,
        stamp: &AuditStamp,
    ) -> Result<Outcome<Decided>> {
        let (book, test) = self.test_snapshot(test_id)?;
        match decision {
            Decision::Approve { notes } => {
                let next = self.orchestrator.validate(&test, stamp, notes.as_deref())?;
                let outcome = self.commit_test(book, next)?;
                Ok(Outcome {
                    value: Decided::Validated(outcome.value),
                    restore: outcome.restore,
                })
            }
            Decision::Reject(request) => {
                let specimen = test
                    .specimen_id
                    .as_ref()
                    .and_then(|id| self.workspace.specimen(id))
                    .cloned();
                let rejected =
                    self.orchestrator
                        .reject(&book, test_id, request, specimen.as_ref(), stamp)?;

                let mut book = rejected.book;
                let mut successor = rejected.successor;
                if rejected.recollection.is_none()
                    && let Some(draw) = self.reusable_draw(specimen.as_ref(), &successor)
                {
                    successor = self.orchestrator.mark_sample_collected(&successor, &draw)?;
                    book.replace(successor.clone())?;
                }
                let mut changes = ChangeSet::default();
                let mut touched = vec![rejected.superseded.clone(), successor.clone()];
                let recollection = match rejected.recollection {
                    Some(specimen_outcome) => {
                        let summary = self.stage_specimen_rejection(
                            specimen_outcome,
                            stamp,
                            &mut book,
                            &mut changes,
                        )?;
                        touched.extend(summary.released.iter().cloned());
                        Some(summary)
                    }
                    None => None,
                };
                changes.with_book(book, touched);
                let restore = self.commit(changes)?;
                Ok(Outcome {
                    value: Decided::Rejected {
                        superseded: rejected.superseded,
                        successor,
                        recollection,
                    },
                    restore,
                })
            }
        }
    }

    /// The collected specimen a pending retest can move onto when a re-collect
    /// reuses an existing successor chain instead of spawning a new draw.
    fn reusable_draw(&self, rejected: Option<&Specimen>, test: &OrderTest) -> Option<Specimen> {
        if test.status != TestStatus::Pending {
            return None;
        }
        let mut current = self.workspace.specimen(rejected?.successor_id.as_ref()?)?;
        for _ in 0..self.workspace.specimens().count() {
            match &current.successor_id {
                Some(next) => current = self.workspace.specimen(next)?,
                None => break,
            }
        }
        (current.status.holds_material() && current.test_codes.contains(&test.test_code))
            .then(|| current.clone())
    }

    /// Most recent validated numeric results for the patient's test, from
    /// any order other than `exclude`.
    fn previous_results(
        &self,
        patient: &PatientId,
        code: &TestCode,
        exclude: &OrderId,
    ) -> BTreeMap<ParameterCode, f64> {
        self.workspace
            .orders()
            .filter(|book| &book.patient_id == patient && &book.order_id != exclude)
            .flat_map(OrderBook::all)
            .filter(|test| &test.test_code == code && test.status == TestStatus::Validated)
            .max_by_key(|test| test.validated.as_ref().map(|stamp| stamp.at))
            .map(|test| {
                test.results
                    .iter()
                    .filter_map(|(parameter, result)| {
                        result.numeric.map(|value| (parameter.clone(), value))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn commit_specimen_rejection(
        &mut self,
        rejected: Rejected,
        stamp: &AuditStamp,
    ) -> Result<Outcome<SpecimenRejected>> {
        let mut book = self.book_snapshot(&rejected.rejected.order_id)?;
        let mut changes = ChangeSet::default();
        let summary = self.stage_specimen_rejection(rejected, stamp, &mut book, &mut changes)?;
        changes.with_book(book, summary.released.iter().cloned());
        let restore = self.commit(changes)?;
        Ok(Outcome {
            value: summary,
            restore,
        })
    }

    /// Release waiting tests and dispose unused aliquots of a rejected specimen.
    fn stage_specimen_rejection(
        &self,
        outcome: Rejected,
        stamp: &AuditStamp,
        book: &mut OrderBook,
        changes: &mut ChangeSet,
    ) -> Result<SpecimenRejected> {
        let rejected_id = &outcome.rejected.id;
        let mut released = Vec::new();
        for test in book.active_tests() {
            if test.specimen_id.as_ref() == Some(rejected_id)
                && matches!(test.status, TestStatus::SampleCollected | TestStatus::InProgress)
                && test.results.is_empty()
            {
                released.push(self.orchestrator.release_sample(test)?);
            }
        }
        for test in &released {
            book.replace(test.clone())?;
        }

        let disposed_aliquots = self
            .workspace
            .aliquots_for(rejected_id)
            .filter(|a| a.status == AliquotStatus::Planned)
            .map(|a| self.planner.dispose(a, stamp))
            .collect::<Result<Vec<_>>>()?;

        changes.specimens.push(outcome.rejected.clone());
        changes.specimens.extend(outcome.successor.iter().cloned());
        changes.aliquots.extend(disposed_aliquots.iter().cloned());
        Ok(SpecimenRejected {
            rejected: outcome.rejected,
            successor: outcome.successor,
            released,
            disposed_aliquots,
        })
    }

    fn commit_specimen(&mut self, specimen: Specimen) -> Result<Outcome<Specimen>> {
        let restore = self.commit(ChangeSet {
            specimens: vec![specimen.clone()],
            ..ChangeSet::default()
        })?;
        Ok(Outcome {
            value: specimen,
            restore,
        })
    }

    fn commit_aliquot(&mut self, aliquot: Aliquot) -> Result<Outcome<Aliquot>> {
        let restore = self.commit(ChangeSet {
            aliquots: vec![aliquot.clone()],
            ..ChangeSet::default()
        })?;
        Ok(Outcome {
            value: aliquot,
            restore,
        })
    }

    fn commit_test(&mut self, mut book: OrderBook, test: OrderTest) -> Result<Outcome<OrderTest>> {
        book.replace(test.clone())?;
        let mut changes = ChangeSet::default();
        changes.with_book(book, [test.clone()]);
        let restore = self.commit(changes)?;
        Ok(Outcome {
            value: test,
            restore,
        })
    }

    /// Apply locally, then persist; restore the workspace if the store fails.
    fn commit(&mut self, changes: ChangeSet) -> Result<RestoreToken> {
        let restore = self.workspace.apply(&changes);
        if let Err(error) = self.store.persist(&changes) {
            tracing::warn!(%error, "persist failed, restoring local state");
            restore.restore_into(&mut self.workspace);
            return Err(LabError::Transport(error.to_string()));
        }
        tracing::debug!(
            specimens = changes.specimens.len(),
            aliquots = changes.aliquots.len(),
            tests = changes.tests.len(),
            "changes persisted"
        );
        Ok(restore)
    }

    fn specimen_snapshot(&self, id: &SpecimenId) -> Result<Specimen> {
        self.specimen(id)
            .ok_or_else(|| LabError::not_found("specimen", id))
    }

    fn aliquot_snapshot(&self, id: &AliquotId) -> Result<Aliquot> {
        self.aliquot(id)
            .ok_or_else(|| LabError::not_found("aliquot", id))
    }

    fn book_snapshot(&self, id: &OrderId) -> Result<OrderBook> {
        self.order(id).ok_or_else(|| LabError::not_found("order", id))
    }

    fn test_snapshot(&self, id: &OrderTestId) -> Result<(OrderBook, OrderTest)> {
        self.workspace
            .find_test(id)
            .map(|(book, test)| (book.clone(), test.clone()))
            .ok_or_else(|| LabError::not_found("order test", id))
    }
}
