//! In-memory entity set and explicit snapshot/restore.
//!
//! Applying a [`ChangeSet`] yields a [`RestoreToken`] holding the prior
//! value of every key it touched (or `None` for keys it created). Restoring
//! the token puts the workspace back exactly as it was.

use std::collections::BTreeMap;

use lab_core::OrderBook;
use lab_model::{
    Aliquot, AliquotId, Demographics, OrderId, OrderTest, OrderTestId, PatientId, Specimen,
    SpecimenId,
};

/// Every entity written by one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub specimens: Vec<Specimen>,
    pub aliquots: Vec<Aliquot>,
    /// Updated order books.
    pub orders: Vec<OrderBook>,
    /// Test records changed or created within `orders`.
    pub tests: Vec<OrderTest>,
    pub patients: Vec<(PatientId, Demographics)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.specimens.is_empty()
            && self.aliquots.is_empty()
            && self.orders.is_empty()
            && self.tests.is_empty()
            && self.patients.is_empty()
    }

    /// Record an updated book and the test records that changed in it.
    pub fn with_book(&mut self, book: OrderBook, tests: impl IntoIterator<Item = OrderTest>) {
        self.tests.extend(tests);
        match self.orders.iter_mut().find(|b| b.order_id == book.order_id) {
            Some(slot) => *slot = book,
            None => self.orders.push(book),
        }
    }
}

/// Prior state of every key touched by an applied change set.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "dropping a restore token discards the only way back"]
pub struct RestoreToken {
    specimens: Vec<(SpecimenId, Option<Specimen>)>,
    aliquots: Vec<(AliquotId, Option<Aliquot>)>,
    orders: Vec<(OrderId, Option<OrderBook>)>,
    patients: Vec<(PatientId, Option<Demographics>)>,
}

impl RestoreToken {
    pub fn is_empty(&self) -> bool {
        self.specimens.is_empty()
            && self.aliquots.is_empty()
            && self.orders.is_empty()
            && self.patients.is_empty()
    }

    /// Put every touched entity back to its recorded prior state.
    pub fn restore_into(self, workspace: &mut Workspace) {
        for (id, prior) in self.specimens.into_iter().rev() {
            restore(&mut workspace.specimens, id, prior);
        }
        for (id, prior) in self.aliquots.into_iter().rev() {
            restore(&mut workspace.aliquots, id, prior);
        }
        for (id, prior) in self.orders.into_iter().rev() {
            restore(&mut workspace.orders, id, prior);
        }
        for (id, prior) in self.patients.into_iter().rev() {
            restore(&mut workspace.patients, id, prior);
        }
    }
}

fn restore<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, prior: Option<V>) {
    match prior {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workspace {
    specimens: BTreeMap<SpecimenId, Specimen>,
    aliquots: BTreeMap<AliquotId, Aliquot>,
    orders: BTreeMap<OrderId, OrderBook>,
    patients: BTreeMap<PatientId, Demographics>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn specimen(&self, id: &SpecimenId) -> Option<&Specimen> {
        self.specimens.get(id)
    }

    pub fn specimens(&self) -> impl Iterator<Item = &Specimen> {
        self.specimens.values()
    }

    pub fn aliquot(&self, id: &AliquotId) -> Option<&Aliquot> {
        self.aliquots.get(id)
    }

    pub fn aliquots_for<'a>(
        &'a self,
        specimen: &'a SpecimenId,
    ) -> impl Iterator<Item = &'a Aliquot> {
        self.aliquots
            .values()
            .filter(move |a| &a.specimen_id == specimen)
    }

    pub fn order(&self, id: &OrderId) -> Option<&OrderBook> {
        self.orders.get(id)
    }

    pub fn orders(&self) -> impl Iterator<Item = &OrderBook> {
        self.orders.values()
    }

    /// The book holding a test record, and the record itself.
    pub fn find_test(&self, id: &OrderTestId) -> Option<(&OrderBook, &OrderTest)> {
        self.orders
            .values()
            .find_map(|book| book.get(id).map(|test| (book, test)))
    }

    pub fn demographics(&self, patient: &PatientId) -> Option<&Demographics> {
        self.patients.get(patient)
    }

    /// Write a change set, returning what is needed to undo it.
    pub fn apply(&mut self, changes: &ChangeSet) -> RestoreToken {
        let mut token = RestoreToken::default();
        for specimen in &changes.specimens {
            let prior = self.specimens.insert(specimen.id.clone(), specimen.clone());
            token.specimens.push((specimen.id.clone(), prior));
        }
        for aliquot in &changes.aliquots {
            let prior = self.aliquots.insert(aliquot.id.clone(), aliquot.clone());
            token.aliquots.push((aliquot.id.clone(), prior));
        }
        for book in &changes.orders {
            let prior = self.orders.insert(book.order_id.clone(), book.clone());
            token.orders.push((book.order_id.clone(), prior));
        }
        for (patient, demographics) in &changes.patients {
            let prior = self.patients.insert(patient.clone(), *demographics);
            token.patients.push((patient.clone(), prior));
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_model::{SpecimenStatus, TestCode};

    fn specimen(id: &str) -> Specimen {
        Specimen::new(
            SpecimenId::new(id).unwrap(),
            OrderId::new("O1").unwrap(),
            PatientId::new("P1").unwrap(),
            "serum",
        )
    }

    #[test]
    fn restore_undoes_inserts_and_updates() {
        let mut workspace = Workspace::new();
        let seed = ChangeSet {
            specimens: vec![specimen("S1")],
            ..ChangeSet::default()
        };
        let _ = workspace.apply(&seed);
        let before = workspace.clone();

        let mut updated = specimen("S1");
        updated.status = SpecimenStatus::Rejected;
        let mut book = OrderBook::new(OrderId::new("O1").unwrap(), PatientId::new("P1").unwrap());
        book.add(TestCode::new("GLU").unwrap()).unwrap();
        let mut changes = ChangeSet {
            specimens: vec![updated, specimen("S1-R2")],
            ..ChangeSet::default()
        };
        changes.with_book(book, []);

        let token = workspace.apply(&changes);
        assert_eq!(
            workspace.specimen(&SpecimenId::new("S1").unwrap()).map(|s| s.status),
            Some(SpecimenStatus::Rejected)
        );
        token.restore_into(&mut workspace);
        assert_eq!(workspace, before);
    }

    #[test]
    fn repeated_key_in_one_change_set_restores_the_original() {
        let mut workspace = Workspace::new();
        let _ = workspace.apply(&ChangeSet {
            specimens: vec![specimen("S1")],
            ..ChangeSet::default()
        });
        let before = workspace.clone();

        let mut first = specimen("S1");
        first.status = SpecimenStatus::Collected;
        let mut second = specimen("S1");
        second.status = SpecimenStatus::Stored;
        let token = workspace.apply(&ChangeSet {
            specimens: vec![first, second],
            ..ChangeSet::default()
        });
        token.restore_into(&mut workspace);
        assert_eq!(workspace, before);
    }
}
