//! The ordered tests of one order.

use lab_model::{LabError, OrderId, OrderTest, OrderTestId, PatientId, Result, TestCode, TestStatus};
use serde::{Deserialize, Serialize};

/// All test records of an order, superseded ones included.
///
/// At most one non-superseded record exists per test code; [`OrderBook::add`]
/// and [`OrderBook::supersede`] are the only ways records enter the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    pub order_id: OrderId,
    pub patient_id: PatientId,
    tests: Vec<OrderTest>,
}

impl OrderBook {
    pub fn new(order_id: OrderId, patient_id: PatientId) -> Self {
        Self {
            order_id,
            patient_id,
            tests: Vec::new(),
        }
    }

    /// Order a test. Fails if an active record for the code already exists.
    pub fn add(&mut self, code: TestCode) -> Result<&OrderTest> {
        if let Some(existing) = self.active(&code) {
            return Err(LabError::invalid_state(
                "order test",
                &existing.id,
                "order",
                existing.status,
                "no active record for the same test",
            ));
        }
        self.tests.push(OrderTest::new(self.order_id.clone(), code));
        Ok(&self.tests[self.tests.len() - 1])
    }

    pub fn get(&self, id: &OrderTestId) -> Option<&OrderTest> {
        self.tests.iter().find(|t| &t.id == id)
    }

    pub fn require(&self, id: &OrderTestId) -> Result<&OrderTest> {
        self.get(id).ok_or_else(|| LabError::not_found("order test", id))
    }

    /// The current record for a test code.
    pub fn active(&self, code: &TestCode) -> Option<&OrderTest> {
        self.tests
            .iter()
            .find(|t| &t.test_code == code && t.is_active())
    }

    pub fn active_tests(&self) -> impl Iterator<Item = &OrderTest> {
        self.tests.iter().filter(|t| t.is_active())
    }

    pub fn all(&self) -> &[OrderTest] {
        &self.tests
    }

    /// Overwrite a record with its post-transition snapshot.
    pub fn replace(&mut self, test: OrderTest) -> Result<()> {
        let slot = self
            .tests
            .iter_mut()
            .find(|t| t.id == test.id)
            .ok_or_else(|| LabError::not_found("order test", &test.id))?;
        *slot = test;
        Ok(())
    }

    /// Retire `superseded` and append its successor in one step.
    pub fn supersede(&mut self, superseded: OrderTest, successor: OrderTest) -> Result<()> {
        if superseded.status != TestStatus::Superseded {
            return Err(LabError::invalid_state(
                "order test",
                &superseded.id,
                "supersede",
                superseded.status,
                "superseded",
            ));
        }
        if successor.retest_of_test_id.as_ref() != Some(&superseded.id)
            || successor.test_code != superseded.test_code
        {
            return Err(LabError::invalid_value(
                "retestOfTestId",
                format!("{} does not succeed {}", successor.id, superseded.id),
            ));
        }
        if self.get(&successor.id).is_some() {
            return Err(LabError::invalid_value(
                "id",
                format!("{} is already on the order", successor.id),
            ));
        }
        self.replace(superseded)?;
        self.tests.push(successor);
        Ok(())
    }

    /// Another active test of this order that is already validated.
    pub fn validated_sibling(&self, code: &TestCode) -> Option<&OrderTest> {
        self.active_tests()
            .find(|t| &t.test_code != code && t.status == TestStatus::Validated)
    }

    /// Every record for a test code, oldest first.
    pub fn chain(&self, code: &TestCode) -> Vec<&OrderTest> {
        let mut chain: Vec<_> = self.tests.iter().filter(|t| &t.test_code == code).collect();
        chain.sort_by_key(|t| t.retest_number);
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> OrderBook {
        OrderBook::new(OrderId::new("O1").unwrap(), PatientId::new("P1").unwrap())
    }

    #[test]
    fn duplicate_active_test_is_refused() {
        let mut book = book();
        book.add(TestCode::new("CBC").unwrap()).unwrap();
        assert!(book.add(TestCode::new("CBC").unwrap()).is_err());
        assert_eq!(book.active_tests().count(), 1);
    }

    #[test]
    fn supersede_requires_a_superseded_predecessor() {
        let mut book = book();
        let original = book.add(TestCode::new("CBC").unwrap()).unwrap().clone();
        let successor = original.successor();
        assert!(book.supersede(original.clone(), successor.clone()).is_err());

        let mut retired = original;
        retired.status = TestStatus::Superseded;
        book.supersede(retired, successor).unwrap();
        let code = TestCode::new("CBC").unwrap();
        assert_eq!(book.chain(&code).len(), 2);
        assert_eq!(book.active(&code).map(|t| t.retest_number), Some(1));
    }
}
