//! Specimen demand derived from an order's tests.

use lab_catalog::ReferenceCatalog;
use lab_model::{LabError, OrderId, PatientId, Result, Specimen, SpecimenId, TestCode};

use crate::aliquot::TestGroup;

/// One pending specimen per `(specimen kind, container type)` among the
/// ordered tests, in first-seen order. Ids are `<order>-S<n>`.
pub fn plan_specimens<C: ReferenceCatalog>(
    order_id: &OrderId,
    patient_id: &PatientId,
    codes: &[TestCode],
    catalog: &C,
) -> Result<Vec<Specimen>> {
    let mut specimens: Vec<Specimen> = Vec::new();
    for code in codes {
        let definition = catalog
            .test(code)
            .ok_or_else(|| LabError::not_found("test", code))?;
        let slot = specimens.iter().position(|s| {
            s.specimen_kind == definition.specimen_kind
                && s.container_types.first() == Some(&definition.container_type)
        });
        let specimen = match slot {
            Some(index) => specimens.remove(index),
            None => {
                let id = SpecimenId::new(format!("{order_id}-S{}", specimens.len() + 1))
                    .map_err(|e| LabError::invalid_value("specimenId", e.to_string()))?;
                Specimen::new(
                    id,
                    order_id.clone(),
                    patient_id.clone(),
                    definition.specimen_kind.clone(),
                )
                .with_container(
                    definition.container_type.clone(),
                    definition.container_color.clone(),
                )
            }
        };
        let specimen = specimen.with_test(code.clone(), definition.min_volume_ml);
        match slot {
            Some(index) => specimens.insert(index, specimen),
            None => specimens.push(specimen),
        }
    }
    tracing::debug!(order = %order_id, count = specimens.len(), "specimen demand planned");
    Ok(specimens)
}

/// One aliquot request per test the specimen serves.
pub fn test_groups_for<C: ReferenceCatalog>(
    specimen: &Specimen,
    catalog: &C,
) -> Result<Vec<TestGroup>> {
    specimen
        .test_codes
        .iter()
        .map(|code| {
            let definition = catalog
                .test(code)
                .ok_or_else(|| LabError::not_found("test", code))?;
            Ok(TestGroup {
                test_codes: vec![code.clone()],
                destination: definition.destination.clone(),
                required_volume_ml: definition.min_volume_ml,
                container_type: definition.container_type.clone(),
            })
        })
        .collect()
}
