//! Per-test result lifecycle.
//!
//! ```text
//! pending → sample-collected → in-progress → resulted → validated
//!                                               │
//!                                               └─ reject → superseded + successor
//! ```
//!
//! A rejected record never stays `rejected`: the rejection entry is appended
//! and the record is superseded in the same step that appends its successor
//! to the [`OrderBook`].

use std::collections::BTreeMap;

use lab_model::{
    ActorRole, AuditStamp, Demographics, FlagKind, LabError, OrderTest, OrderTestId, ParameterCode,
    RejectionReason, RejectionType, Result, Specimen, TestDefinition, TestRejection, TestStatus,
};
use lab_validate::{ResultValidator, Submission, ValidationReport};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::order_book::OrderBook;
use crate::specimen::{Rejected, SpecimenMachine};

/// Values captured by a technician for one test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSubmission {
    pub values: BTreeMap<ParameterCode, String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// More values will follow; keep the test in progress.
    #[serde(default)]
    pub partial: bool,
}

/// Read-only inputs for scoring a submission.
#[derive(Debug, Clone, Copy)]
pub struct ResultContext<'a> {
    pub specimen: &'a Specimen,
    pub definition: &'a TestDefinition,
    pub demographics: Option<&'a Demographics>,
    pub previous: Option<&'a BTreeMap<ParameterCode, f64>>,
}

#[derive(Debug, Clone)]
pub struct EnteredResults {
    pub test: OrderTest,
    pub report: ValidationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRejectionRequest {
    #[serde(rename = "type")]
    pub kind: RejectionType,
    pub reason: RejectionReason,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Outcome of rejecting a resulted test.
#[derive(Debug, Clone)]
pub struct RejectedTest {
    pub book: OrderBook,
    pub superseded: OrderTest,
    pub successor: OrderTest,
    /// Set when a re-collect spawned a new specimen.
    pub recollection: Option<Rejected>,
}

#[derive(Debug, Clone)]
pub struct TestOrchestrator {
    validator: ResultValidator,
    specimens: SpecimenMachine,
    validator_roles: Vec<ActorRole>,
    require_critical_ack: bool,
}

impl Default for TestOrchestrator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl TestOrchestrator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            validator: ResultValidator::new(config.delta_threshold_percent),
            specimens: SpecimenMachine::new(config.marginal_ratio),
            validator_roles: config.validator_roles.clone(),
            require_critical_ack: config.require_critical_ack,
        }
    }

    pub fn mark_sample_collected(
        &self,
        test: &OrderTest,
        specimen: &Specimen,
    ) -> Result<OrderTest> {
        expect_status(test, "mark sample collected", &[TestStatus::Pending])?;
        if !specimen.status.holds_material() {
            return Err(LabError::invalid_state(
                "specimen",
                &specimen.id,
                "serve a test",
                specimen.status,
                "a collected specimen",
            ));
        }
        if !specimen.test_codes.contains(&test.test_code) {
            return Err(LabError::invalid_value(
                "specimen",
                format!("{} does not serve {}", specimen.id, test.test_code),
            ));
        }
        let mut next = test.clone();
        next.status = TestStatus::SampleCollected;
        next.specimen_id = Some(specimen.id.clone());
        Ok(next)
    }

    pub fn start_processing(&self, test: &OrderTest) -> Result<OrderTest> {
        expect_status(test, "start processing", &[TestStatus::SampleCollected])?;
        let mut next = test.clone();
        next.status = TestStatus::InProgress;
        Ok(next)
    }

    /// Return a test to `pending` after its specimen was rejected.
    pub fn release_sample(&self, test: &OrderTest) -> Result<OrderTest> {
        expect_status(
            test,
            "release sample",
            &[TestStatus::SampleCollected, TestStatus::InProgress],
        )?;
        if !test.results.is_empty() {
            return Err(LabError::invalid_state(
                "order test",
                &test.id,
                "release sample",
                "holding captured results",
                "no captured results",
            ));
        }
        let mut next = test.clone();
        next.status = TestStatus::Pending;
        next.specimen_id = None;
        Ok(next)
    }

    /// Score and record a submission.
    ///
    /// Previously captured values are merged with the new ones and the whole
    /// set is re-scored. Any hard error rejects the submission outright.
    pub fn enter_results(
        &self,
        test: &OrderTest,
        submission: &ResultSubmission,
        context: &ResultContext<'_>,
        stamp: &AuditStamp,
    ) -> Result<EnteredResults> {
        expect_status(
            test,
            "enter results",
            &[TestStatus::SampleCollected, TestStatus::InProgress],
        )?;
        let specimen = context.specimen;
        if test.specimen_id.as_ref() != Some(&specimen.id) {
            return Err(LabError::invalid_value(
                "specimen",
                format!("{} is not the specimen of test {}", specimen.id, test.id),
            ));
        }
        if !specimen.status.holds_material() {
            return Err(LabError::invalid_state(
                "specimen",
                &specimen.id,
                "enter results",
                specimen.status,
                "a collected specimen",
            ));
        }
        if submission.values.is_empty() {
            return Err(LabError::invalid_value("values", "no values submitted"));
        }

        // Re-score numeric results from the parsed value; `value` is rounded for display.
        let mut values: BTreeMap<ParameterCode, String> = test
            .results
            .iter()
            .map(|(code, result)| {
                let raw = result
                    .numeric
                    .map_or_else(|| result.value.clone(), |n| n.to_string());
                (code.clone(), raw)
            })
            .collect();
        values.extend(submission.values.clone());

        let report = self.validator.validate_all(&Submission {
            test_code: &test.test_code,
            values: &values,
            parameters: &context.definition.parameters,
            demographics: context.demographics,
            previous: context.previous,
        });
        if report.has_errors() {
            tracing::warn!(
                test = %test.id,
                errors = report.error_count(),
                "result submission rejected"
            );
            return Err(LabError::ValidationFailed {
                errors: report.errors.clone(),
            });
        }

        let mut next = test.clone();
        let new_critical = report
            .critical_flags()
            .any(|flag| !test.flags.contains(flag));
        if new_critical {
            next.critical_acknowledged = None;
            tracing::warn!(
                test = %test.id,
                count = report.critical_flags().count(),
                "critical result requires acknowledgement"
            );
        }
        next.results = report.results.clone();
        next.flags = report.flags.clone();
        next.status = if submission.partial {
            TestStatus::InProgress
        } else {
            TestStatus::Resulted
        };
        if submission.notes.is_some() {
            next.technician_notes = submission.notes.clone();
        }
        next.entered = Some(stamp.clone());
        tracing::info!(
            test = %test.id,
            status = %next.status,
            flags = next.flags.len(),
            "results entered"
        );
        Ok(EnteredResults { test: next, report })
    }

    pub fn acknowledge_critical(&self, test: &OrderTest, stamp: &AuditStamp) -> Result<OrderTest> {
        self.authorize(stamp, "acknowledge critical results")?;
        if test.critical_flag_count() == 0 {
            return Err(LabError::invalid_state(
                "order test",
                &test.id,
                "acknowledge critical results",
                "without critical flags",
                "at least one critical flag",
            ));
        }
        let mut next = test.clone();
        next.critical_acknowledged = Some(stamp.clone());
        tracing::info!(test = %test.id, actor = %stamp.actor, "critical results acknowledged");
        Ok(next)
    }

    /// Sign off a resulted test.
    pub fn validate(
        &self,
        test: &OrderTest,
        stamp: &AuditStamp,
        notes: Option<&str>,
    ) -> Result<OrderTest> {
        expect_status(test, "validate", &[TestStatus::Resulted])?;
        self.authorize(stamp, "validate results")?;
        let outstanding = test.unacknowledged_criticals();
        if self.require_critical_ack && outstanding > 0 {
            return Err(LabError::UnacknowledgedCritical {
                test: test.id.to_string(),
                count: outstanding,
            });
        }
        let mut next = test.clone();
        next.status = TestStatus::Validated;
        next.validated = Some(stamp.clone());
        next.validation_notes = notes.map(str::to_string);
        tracing::info!(test = %test.id, actor = %stamp.actor, "test validated");
        Ok(next)
    }

    /// Reject a resulted test into a retest or a recollection.
    ///
    /// `specimen` is the specimen the results came from; it is only touched
    /// for re-collect, and only if it has not already been succeeded.
    pub fn reject(
        &self,
        book: &OrderBook,
        test_id: &OrderTestId,
        request: &TestRejectionRequest,
        specimen: Option<&Specimen>,
        stamp: &AuditStamp,
    ) -> Result<RejectedTest> {
        let test = book.require(test_id)?;
        expect_status(test, "reject", &[TestStatus::Resulted])?;
        self.authorize(stamp, "reject results")?;

        if request.kind == RejectionType::ReCollect
            && let Some(sibling) = book.validated_sibling(&test.test_code)
        {
            return Err(LabError::ConflictingApproval {
                test: test.id.to_string(),
                sibling: sibling.id.to_string(),
            });
        }

        let recollection = match request.kind {
            RejectionType::ReTest => None,
            RejectionType::ReCollect => {
                let specimen = specimen.ok_or_else(|| {
                    LabError::invalid_value("specimen", format!("test {} has no specimen", test.id))
                })?;
                if test.specimen_id.as_ref() != Some(&specimen.id) {
                    return Err(LabError::invalid_value(
                        "specimen",
                        format!("{} is not the specimen of test {}", specimen.id, test.id),
                    ));
                }
                if specimen.successor_id.is_some() {
                    None
                } else {
                    Some(
                        self.specimens
                            .request_recollection(specimen, &request.reason, stamp)?,
                    )
                }
            }
        };

        let mut superseded = test.clone();
        superseded.rejection_history.push(TestRejection {
            stamp: stamp.clone(),
            kind: request.kind,
            reason: request.reason.clone(),
            notes: request.notes.clone(),
        });
        superseded.status = TestStatus::Superseded;

        let mut successor = superseded.successor();
        match request.kind {
            RejectionType::ReTest => {
                successor.status = TestStatus::SampleCollected;
                successor.specimen_id = superseded.specimen_id.clone();
            }
            RejectionType::ReCollect => {
                successor.status = TestStatus::Pending;
                successor.specimen_id = None;
            }
        }

        let mut next_book = book.clone();
        next_book.supersede(superseded.clone(), successor.clone())?;
        tracing::warn!(
            test = %test.id,
            successor = %successor.id,
            kind = %request.kind,
            reason = %request.reason,
            "test rejected"
        );
        Ok(RejectedTest {
            book: next_book,
            superseded,
            successor,
            recollection,
        })
    }

    fn authorize(&self, stamp: &AuditStamp, operation: &'static str) -> Result<()> {
        if self.validator_roles.contains(&stamp.role) {
            Ok(())
        } else {
            Err(LabError::Unauthorized {
                role: stamp.role,
                operation,
            })
        }
    }
}

fn expect_status(test: &OrderTest, operation: &'static str, allowed: &[TestStatus]) -> Result<()> {
    if allowed.contains(&test.status) {
        return Ok(());
    }
    Err(LabError::invalid_state(
        "order test",
        &test.id,
        operation,
        test.status,
        allowed
            .iter()
            .map(TestStatus::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
    ))
}

/// Count of flags by kind, most severe first.
pub fn flag_summary(test: &OrderTest) -> Vec<(FlagKind, usize)> {
    [FlagKind::Critical, FlagKind::Delta, FlagKind::Abnormal]
        .into_iter()
        .map(|kind| (kind, test.flags.iter().filter(|f| f.kind == kind).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
}
