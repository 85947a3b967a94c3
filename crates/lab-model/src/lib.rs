//! Data model for the specimen and result lifecycle engine.
//!
//! Entities are plain values: lifecycle operations take a snapshot and
//! return the post-transition snapshot, so nothing here hands out shared
//! mutable references.

pub mod aliquot;
pub mod audit;
pub mod enums;
pub mod error;
pub mod ids;
pub mod reference;
pub mod result;
pub mod specimen;

pub use aliquot::{Aliquot, AliquotUsage};
pub use audit::AuditStamp;
pub use enums::{
    ActorRole, AliquotStatus, FlagKind, FlagSeverity, RejectionReason, RejectionType, Sex,
    SpecimenStatus, Sufficiency, TestStatus, ValueStatus, ValueType,
};
pub use error::{LabError, LabErrorKind, ModelError, Result};
pub use ids::{AliquotId, OrderId, OrderTestId, ParameterCode, PatientId, SpecimenId, TestCode};
pub use order_test::{OrderTest, TestRejection};
pub use reference::{Demographics, ParameterDefinition, RangeSet, ReferenceRange, TestDefinition};
pub use result::{CapturedResult, ParameterIssue, ResultFlag};
pub use specimen::{CollectionRecord, Specimen, SpecimenRejection};
