//! Lifecycle state machines for specimens, aliquots and ordered tests.
//!
//! Every operation is a pure function of its inputs: it takes entity
//! snapshots and returns the post-transition snapshots or a [`LabError`].
//! Persistence and rollback live one layer up, in the workflow crate.
//!
//! [`LabError`]: lab_model::LabError

pub mod aliquot;
pub mod config;
pub mod demand;
pub mod order_book;
pub mod orchestrator;
pub mod specimen;

pub use aliquot::{AliquotPlanner, PlannedGroup, TestGroup, merge_groups, plan_volumes};
pub use config::{ConfigError, DEFAULT_MARGINAL_RATIO, EngineConfig};
pub use demand::{plan_specimens, test_groups_for};
pub use order_book::OrderBook;
pub use orchestrator::{
    EnteredResults, RejectedTest, ResultContext, ResultSubmission, TestOrchestrator,
    TestRejectionRequest, flag_summary,
};
pub use specimen::{Collected, CollectionRequest, Rejected, RejectionRequest, SpecimenMachine};
