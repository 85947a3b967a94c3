//! Workflow coordination for the lab lifecycle engine.
//!
//! [`WorkflowCoordinator`] is built once from a catalog, a record store and
//! an [`EngineConfig`](lab_core::EngineConfig). It sequences the lifecycle
//! state machines and pairs every local transition with a remote write,
//! restoring the local workspace when the write fails.

pub mod coordinator;
pub mod store;
pub mod workspace;

pub use coordinator::{
    CollectedAndPlanned, Decided, Decision, Outcome, PlacedOrder, SpecimenRejected,
    WorkflowCoordinator,
};
pub use store::{InMemoryStore, RecordStore, StoreError};
pub use workspace::{ChangeSet, RestoreToken, Workspace};
