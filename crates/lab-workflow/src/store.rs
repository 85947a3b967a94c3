//! The remote record store seam.

use std::collections::BTreeMap;
use std::time::Duration;

use lab_model::{
    Aliquot, AliquotId, Demographics, OrderTest, OrderTestId, PatientId, Specimen, SpecimenId,
};
use thiserror::Error;

use crate::workspace::ChangeSet;

/// Why a write did not complete. Always treated as "nothing was stored".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("write cancelled by caller")]
    Cancelled,
}

/// Persistence for the entities touched by one operation.
pub trait RecordStore {
    fn persist(&mut self, changes: &ChangeSet) -> Result<(), StoreError>;
}

/// Store kept in memory, with one-shot failure injection.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    specimens: BTreeMap<SpecimenId, Specimen>,
    aliquots: BTreeMap<AliquotId, Aliquot>,
    tests: BTreeMap<OrderTestId, OrderTest>,
    patients: BTreeMap<PatientId, Demographics>,
    pending_failure: Option<StoreError>,
    writes: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `persist` call with `error`.
    pub fn fail_next(&mut self, error: StoreError) {
        self.pending_failure = Some(error);
    }

    /// Number of successful `persist` calls.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn specimen(&self, id: &SpecimenId) -> Option<&Specimen> {
        self.specimens.get(id)
    }

    pub fn aliquot(&self, id: &AliquotId) -> Option<&Aliquot> {
        self.aliquots.get(id)
    }

    pub fn test(&self, id: &OrderTestId) -> Option<&OrderTest> {
        self.tests.get(id)
    }

    pub fn demographics(&self, patient: &PatientId) -> Option<&Demographics> {
        self.patients.get(patient)
    }

    pub fn specimen_count(&self) -> usize {
        self.specimens.len()
    }

    pub fn test_count(&self) -> usize {
        self.tests.len()
    }
}

impl RecordStore for InMemoryStore {
    fn persist(&mut self, changes: &ChangeSet) -> Result<(), StoreError> {
        if let Some(error) = self.pending_failure.take() {
            return Err(error);
        }
        for specimen in &changes.specimens {
            self.specimens.insert(specimen.id.clone(), specimen.clone());
        }
        for aliquot in &changes.aliquots {
            self.aliquots.insert(aliquot.id.clone(), aliquot.clone());
        }
        for test in &changes.tests {
            self.tests.insert(test.id.clone(), test.clone());
        }
        for (patient, demographics) in &changes.patients {
            self.patients.insert(patient.clone(), *demographics);
        }
        self.writes += 1;
        Ok(())
    }
}

impl<S: RecordStore + ?Sized> RecordStore for &mut S {
    fn persist(&mut self, changes: &ChangeSet) -> Result<(), StoreError> {
        (**self).persist(changes)
    }
}
