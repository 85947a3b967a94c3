//! Type-safe enumerations for lab lifecycle concepts.
//!
//! Statuses, roles and reasons travel to and from the remote store as
//! kebab-case strings; these enums keep them typed inside the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a physical specimen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecimenStatus {
    Pending,
    Collected,
    Rejected,
    Processing,
    Accessioned,
    Stored,
    Disposed,
}

impl SpecimenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecimenStatus::Pending => "pending",
            SpecimenStatus::Collected => "collected",
            SpecimenStatus::Rejected => "rejected",
            SpecimenStatus::Processing => "processing",
            SpecimenStatus::Accessioned => "accessioned",
            SpecimenStatus::Stored => "stored",
            SpecimenStatus::Disposed => "disposed",
        }
    }

    /// True once material is physically in the lab and usable for testing.
    pub fn holds_material(&self) -> bool {
        matches!(
            self,
            SpecimenStatus::Collected
                | SpecimenStatus::Accessioned
                | SpecimenStatus::Processing
                | SpecimenStatus::Stored
        )
    }
}

impl fmt::Display for SpecimenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an aliquot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AliquotStatus {
    Planned,
    InUse,
    Consumed,
    Disposed,
}

impl AliquotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliquotStatus::Planned => "planned",
            AliquotStatus::InUse => "in-use",
            AliquotStatus::Consumed => "consumed",
            AliquotStatus::Disposed => "disposed",
        }
    }

    /// Planned and in-use aliquots still count against the specimen's pool.
    pub fn is_live(&self) -> bool {
        matches!(self, AliquotStatus::Planned | AliquotStatus::InUse)
    }
}

impl fmt::Display for AliquotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an ordered test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    Pending,
    SampleCollected,
    InProgress,
    Resulted,
    Validated,
    Rejected,
    Superseded,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::SampleCollected => "sample-collected",
            TestStatus::InProgress => "in-progress",
            TestStatus::Resulted => "resulted",
            TestStatus::Validated => "validated",
            TestStatus::Rejected => "rejected",
            TestStatus::Superseded => "superseded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TestStatus::Validated | TestStatus::Superseded)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of the person performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorRole {
    Phlebotomist,
    Technician,
    Pathologist,
    Administrator,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Phlebotomist => "phlebotomist",
            ActorRole::Technician => "technician",
            ActorRole::Pathologist => "pathologist",
            ActorRole::Administrator => "administrator",
        }
    }

    /// Roles allowed to sign off results when no other policy is configured.
    pub fn can_validate(&self) -> bool {
        matches!(self, ActorRole::Pathologist | ActorRole::Administrator)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "phlebotomist" => Ok(ActorRole::Phlebotomist),
            "technician" | "lab-technician" => Ok(ActorRole::Technician),
            "pathologist" => Ok(ActorRole::Pathologist),
            "administrator" | "admin" => Ok(ActorRole::Administrator),
            _ => Err(format!("Unknown actor role: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sex {
    Male,
    Female,
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M" | "MALE" => Ok(Sex::Male),
            "F" | "FEMALE" => Ok(Sex::Female),
            _ => Err(format!("Unknown sex: {s}")),
        }
    }
}

/// Why a specimen or a result was rejected.
///
/// Shared by the specimen and the test rejection paths so both record the
/// same tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionReason {
    Hemolyzed,
    Clotted,
    InsufficientVolume,
    WrongContainer,
    Mislabeled,
    Contaminated,
    DelayedTransport,
    Lipemic,
    InstrumentError,
    QcFailure,
    ClinicallyImplausible,
    Other(String),
}

impl RejectionReason {
    pub fn label(&self) -> &str {
        match self {
            RejectionReason::Hemolyzed => "hemolyzed",
            RejectionReason::Clotted => "clotted",
            RejectionReason::InsufficientVolume => "insufficient-volume",
            RejectionReason::WrongContainer => "wrong-container",
            RejectionReason::Mislabeled => "mislabeled",
            RejectionReason::Contaminated => "contaminated",
            RejectionReason::DelayedTransport => "delayed-transport",
            RejectionReason::Lipemic => "lipemic",
            RejectionReason::InstrumentError => "instrument-error",
            RejectionReason::QcFailure => "qc-failure",
            RejectionReason::ClinicallyImplausible => "clinically-implausible",
            RejectionReason::Other(text) => text,
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RejectionReason {
    type Err = String;

    /// Unknown labels become `Other` so free-text reasons still round-trip.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("rejection reason cannot be empty".to_string());
        }
        let normalized = trimmed.to_lowercase().replace(['_', ' '], "-");
        Ok(match normalized.as_str() {
            "hemolyzed" | "haemolysed" => RejectionReason::Hemolyzed,
            "clotted" => RejectionReason::Clotted,
            "insufficient-volume" | "qns" => RejectionReason::InsufficientVolume,
            "wrong-container" | "wrong-tube" => RejectionReason::WrongContainer,
            "mislabeled" | "unlabeled" => RejectionReason::Mislabeled,
            "contaminated" => RejectionReason::Contaminated,
            "delayed-transport" => RejectionReason::DelayedTransport,
            "lipemic" => RejectionReason::Lipemic,
            "instrument-error" => RejectionReason::InstrumentError,
            "qc-failure" => RejectionReason::QcFailure,
            "clinically-implausible" => RejectionReason::ClinicallyImplausible,
            _ => RejectionReason::Other(trimmed.to_string()),
        })
    }
}

/// Branch taken when a resulted test is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionType {
    /// Re-run result capture on the same specimen.
    ReTest,
    /// Draw a new specimen first.
    ReCollect,
}

impl RejectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionType::ReTest => "re-test",
            RejectionType::ReCollect => "re-collect",
        }
    }
}

impl fmt::Display for RejectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the collected volume compares to what the ordered tests need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sufficiency {
    Sufficient,
    Marginal,
    Insufficient,
}

impl Sufficiency {
    pub fn is_usable(&self) -> bool {
        !matches!(self, Sufficiency::Insufficient)
    }
}

impl fmt::Display for Sufficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sufficiency::Sufficient => "sufficient",
            Sufficiency::Marginal => "marginal",
            Sufficiency::Insufficient => "insufficient",
        })
    }
}

/// Kind of value a parameter captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    Numeric,
    Select,
    Text,
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "numeric" | "number" => Ok(ValueType::Numeric),
            "select" | "enum" => Ok(ValueType::Select),
            "text" | "string" => Ok(ValueType::Text),
            _ => Err(format!("Unknown value type: {s}")),
        }
    }
}

/// Interpretation of a single captured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueStatus {
    Normal,
    Low,
    High,
    CriticalLow,
    CriticalHigh,
}

impl ValueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueStatus::Normal => "normal",
            ValueStatus::Low => "low",
            ValueStatus::High => "high",
            ValueStatus::CriticalLow => "critical-low",
            ValueStatus::CriticalHigh => "critical-high",
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, ValueStatus::CriticalLow | ValueStatus::CriticalHigh)
    }

    /// Outside the reference range but not at a critical limit.
    pub fn is_abnormal(&self) -> bool {
        matches!(self, ValueStatus::Low | ValueStatus::High)
    }
}

impl fmt::Display for ValueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagKind {
    Critical,
    Delta,
    Abnormal,
}

/// Triage severity, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagSeverity {
    Low,
    Medium,
    High,
}

impl FlagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagKind::Critical => "critical",
            FlagKind::Delta => "delta",
            FlagKind::Abnormal => "abnormal",
        }
    }

    pub fn severity(&self) -> FlagSeverity {
        match self {
            FlagKind::Critical => FlagSeverity::High,
            FlagKind::Delta => FlagSeverity::Medium,
            FlagKind::Abnormal => FlagSeverity::Low,
        }
    }
}
