use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use comfy_table::Table;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use lab_catalog::{InMemoryCatalog, ReferenceCatalog, load_catalog_dir, load_catalog_json};
use lab_core::{EngineConfig, PlannedGroup, plan_volumes};
use lab_cli::scenario::{Scenario, ScenarioReport, run_scenario};
use lab_validate::{ResultValidator, Submission, ValidationReport};

use crate::cli::{CatalogArgs, PlanArgs, RunArgs, ValidateArgs};
use crate::summary::apply_table_style;
use crate::types::{PlanRequest, ResultsFile};

pub fn run_catalog(args: &CatalogArgs) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let mut table = Table::new();
    table.set_header(vec![
        "Test",
        "Name",
        "Specimen",
        "Container",
        "Volume (mL)",
        "Destination",
        "Parameters",
    ]);
    apply_table_style(&mut table);
    for test in catalog.tests() {
        table.add_row(vec![
            test.code.to_string(),
            test.name.clone(),
            test.specimen_kind.clone(),
            test.container_type.clone(),
            test.min_volume_ml.to_string(),
            test.destination.clone(),
            test.parameters.len().to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn run_validate(args: &ValidateArgs) -> Result<ValidationReport> {
    let catalog = load_catalog(&args.catalog)?;
    let config = load_config(args.config.as_deref())?;
    let input: ResultsFile = read_json(&args.results)?;
    let definition = catalog
        .test(&input.test_code)
        .ok_or_else(|| anyhow!("test {} is not in the catalog", input.test_code))?;
    let validator =
        ResultValidator::new(args.delta_threshold.unwrap_or(config.delta_threshold_percent));
    let report = validator.validate_all(&Submission {
        test_code: &input.test_code,
        values: &input.values,
        parameters: &definition.parameters,
        demographics: input.demographics.as_ref(),
        previous: input.previous.as_ref(),
    });
    info!(
        test = %input.test_code,
        errors = report.error_count(),
        flags = report.flags.len(),
        delta_threshold = validator.delta_threshold_percent(),
        "submission scored"
    );
    Ok(report)
}

pub fn run_plan(args: &PlanArgs) -> Result<Vec<PlannedGroup>> {
    let request: PlanRequest = read_json(&args.request)?;
    let plan = plan_volumes(request.collected_volume_ml, &request.groups)
        .context("plan aliquots")?;
    debug!(aliquots = plan.len(), "aliquot plan computed");
    Ok(plan)
}

pub fn run_workflow(args: &RunArgs) -> Result<ScenarioReport> {
    let catalog = load_catalog(&args.catalog)?;
    let config = load_config(args.config.as_deref())?;
    let scenario: Scenario = read_json(&args.scenario)?;
    info!(steps = scenario.steps.len(), "running scenario");
    run_scenario(catalog, config, &scenario).context("build coordinator")
}

fn load_catalog(path: &Path) -> Result<InMemoryCatalog> {
    let catalog = if path.is_dir() {
        load_catalog_dir(path)
    } else {
        load_catalog_json(path)
    }
    .with_context(|| format!("load catalog {}", path.display()))?;
    debug!(tests = catalog.len(), "catalog loaded");
    Ok(catalog)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).context("load engine config"),
        None => Ok(EngineConfig::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}
