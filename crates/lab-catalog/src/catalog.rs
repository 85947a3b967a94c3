//! The catalog seam consumed by the engine.

use std::collections::BTreeMap;

use lab_model::{ParameterCode, ParameterDefinition, TestCode, TestDefinition};

use crate::error::CatalogError;

/// Read-only lookup of test and parameter definitions.
pub trait ReferenceCatalog {
    fn test(&self, code: &TestCode) -> Option<&TestDefinition>;

    fn parameters(&self, code: &TestCode) -> &[ParameterDefinition] {
        self.test(code).map_or(&[], |t| t.parameters.as_slice())
    }

    fn parameter(
        &self,
        test: &TestCode,
        parameter: &ParameterCode,
    ) -> Option<&ParameterDefinition> {
        self.test(test).and_then(|t| t.parameter(parameter))
    }

    /// Sum of the minimum volumes of the given tests. Unknown codes contribute nothing.
    fn required_volume<'a>(&self, codes: impl IntoIterator<Item = &'a TestCode>) -> f64
    where
        Self: Sized,
    {
        codes
            .into_iter()
            .filter_map(|code| self.test(code))
            .map(|t| t.min_volume_ml)
            .sum()
    }
}

/// Catalog held in memory, ordered by test code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tests: BTreeMap<TestCode, TestDefinition>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tests(
        tests: impl IntoIterator<Item = TestDefinition>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for test in tests {
            catalog.insert(test)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, test: TestDefinition) -> Result<(), CatalogError> {
        if self.tests.contains_key(&test.code) {
            return Err(CatalogError::DuplicateTest {
                code: test.code.to_string(),
            });
        }
        self.tests.insert(test.code.clone(), test);
        Ok(())
    }

    pub fn tests(&self) -> impl Iterator<Item = &TestDefinition> {
        self.tests.values()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl ReferenceCatalog for InMemoryCatalog {
    fn test(&self, code: &TestCode) -> Option<&TestDefinition> {
        self.tests.get(code)
    }
}
