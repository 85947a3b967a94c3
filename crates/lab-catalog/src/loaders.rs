//! Catalog loaders.
//!
//! Two on-disk forms are supported:
//!
//! - a JSON array of test definitions with nested parameters
//! - a pair of CSV files, `tests.csv` and `parameters.csv`
//!
//! # CSV columns
//!
//! `tests.csv`: `test_code, name, specimen_kind, container_type,
//! container_color, min_volume_ml, destination`
//!
//! `parameters.csv`: `test_code, parameter_code, name, unit, value_type,
//! precision, low, high, male_low, male_high, female_low, female_high,
//! critical_low, critical_high, allowed_values` where `allowed_values`
//! separates entries with `|`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use lab_model::{
    ParameterCode, ParameterDefinition, RangeSet, ReferenceRange, TestCode, TestDefinition,
    ValueType,
};

use crate::catalog::InMemoryCatalog;
use crate::error::CatalogError;

pub const TESTS_FILE: &str = "tests.csv";
pub const PARAMETERS_FILE: &str = "parameters.csv";

type Row = BTreeMap<String, String>;

/// Load a catalog from a JSON array of test definitions.
pub fn load_catalog_json(path: &Path) -> Result<InMemoryCatalog, CatalogError> {
    let text = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
    let tests: Vec<TestDefinition> =
        serde_json::from_str(&text).map_err(|source| CatalogError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    let catalog = InMemoryCatalog::from_tests(tests)?;
    tracing::debug!(path = %path.display(), tests = catalog.len(), "loaded JSON catalog");
    Ok(catalog)
}

/// Load a catalog from `tests.csv` and `parameters.csv` in `dir`.
pub fn load_catalog_dir(dir: &Path) -> Result<InMemoryCatalog, CatalogError> {
    let mut tests = load_tests_csv(&dir.join(TESTS_FILE))?;
    for (test_code, parameter) in load_parameters_csv(&dir.join(PARAMETERS_FILE))? {
        let Some(test) = tests.iter_mut().find(|t| t.code == test_code) else {
            return Err(CatalogError::UnknownTest {
                test: test_code.to_string(),
                parameter: parameter.code.to_string(),
            });
        };
        test.parameters.push(parameter);
    }
    let catalog = InMemoryCatalog::from_tests(tests)?;
    tracing::debug!(dir = %dir.display(), tests = catalog.len(), "loaded CSV catalog");
    Ok(catalog)
}

pub fn load_tests_csv(path: &Path) -> Result<Vec<TestDefinition>, CatalogError> {
    let mut tests = Vec::new();
    for (line, row) in read_csv_rows(path)? {
        let code = required(&row, "test_code", path, line)?;
        let min_volume_ml = parse_number(&row, "min_volume_ml", path, line)?
            .ok_or_else(|| CatalogError::row(path, line, "min_volume_ml is required"))?;
        if min_volume_ml <= 0.0 {
            return Err(CatalogError::row(path, line, "min_volume_ml must be positive"));
        }
        tests.push(TestDefinition {
            code: TestCode::new(code.clone())
                .map_err(|e| CatalogError::row(path, line, e.to_string()))?,
            name: optional(&row, "name").unwrap_or(code),
            specimen_kind: required(&row, "specimen_kind", path, line)?,
            container_type: required(&row, "container_type", path, line)?,
            container_color: optional(&row, "container_color"),
            min_volume_ml,
            destination: required(&row, "destination", path, line)?,
            parameters: Vec::new(),
        });
    }
    Ok(tests)
}

pub fn load_parameters_csv(
    path: &Path,
) -> Result<Vec<(TestCode, ParameterDefinition)>, CatalogError> {
    let mut parameters = Vec::new();
    for (line, row) in read_csv_rows(path)? {
        let test_code = TestCode::new(required(&row, "test_code", path, line)?)
            .map_err(|e| CatalogError::row(path, line, e.to_string()))?;
        let code = required(&row, "parameter_code", path, line)?;
        let value_type = match optional(&row, "value_type") {
            Some(raw) => raw
                .parse::<ValueType>()
                .map_err(|e| CatalogError::row(path, line, e))?,
            None => ValueType::Numeric,
        };
        let precision = match optional(&row, "precision") {
            Some(raw) => Some(raw.parse::<u8>().map_err(|_| {
                CatalogError::row(path, line, format!("invalid precision: {raw}"))
            })?),
            None => None,
        };
        let allowed_values = optional(&row, "allowed_values")
            .map(|raw| {
                raw.split('|')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let definition = ParameterDefinition {
            code: ParameterCode::new(code.clone())
                .map_err(|e| CatalogError::row(path, line, e.to_string()))?,
            name: optional(&row, "name").unwrap_or(code),
            unit: optional(&row, "unit"),
            value_type,
            ranges: RangeSet {
                general: range(&row, "low", "high", path, line)?,
                male: range(&row, "male_low", "male_high", path, line)?,
                female: range(&row, "female_low", "female_high", path, line)?,
            },
            critical_low: parse_number(&row, "critical_low", path, line)?,
            critical_high: parse_number(&row, "critical_high", path, line)?,
            allowed_values,
            precision,
        };
        parameters.push((test_code, definition));
    }
    Ok(parameters)
}

/// Read rows keyed by trimmed header, paired with their 1-based line number.
fn read_csv_rows(path: &Path) -> Result<Vec<(u64, Row)>, CatalogError> {
    let csv_error = |source| CatalogError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map_or(0, csv::Position::line);
        let mut row = BTreeMap::new();
        for (idx, value) in record.iter().enumerate() {
            let key = headers
                .get(idx)
                .unwrap_or("")
                .trim_matches('\u{feff}')
                .trim()
                .to_lowercase();
            row.insert(key, value.trim().to_string());
        }
        rows.push((line, row));
    }
    Ok(rows)
}

fn optional(row: &Row, key: &str) -> Option<String> {
    row.get(key).filter(|v| !v.is_empty()).cloned()
}

fn required(row: &Row, key: &str, path: &Path, line: u64) -> Result<String, CatalogError> {
    optional(row, key).ok_or_else(|| CatalogError::row(path, line, format!("{key} is required")))
}

fn parse_number(
    row: &Row,
    key: &str,
    path: &Path,
    line: u64,
) -> Result<Option<f64>, CatalogError> {
    let Some(raw) = optional(row, key) else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(CatalogError::row(
            path,
            line,
            format!("{key} is not a finite number: {raw}"),
        )),
    }
}

fn range(
    row: &Row,
    low_key: &str,
    high_key: &str,
    path: &Path,
    line: u64,
) -> Result<Option<ReferenceRange>, CatalogError> {
    let range = ReferenceRange::new(
        parse_number(row, low_key, path, line)?,
        parse_number(row, high_key, path, line)?,
    );
    Ok(range.is_defined().then_some(range))
}
