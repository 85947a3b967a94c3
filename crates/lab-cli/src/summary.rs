use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use lab_cli::scenario::ScenarioReport;
use lab_core::PlannedGroup;
use lab_model::{FlagSeverity, ValueStatus};
use lab_validate::{ValidationReport, triage};

pub fn print_validation(report: &ValidationReport) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Parameter"),
        header_cell("Value"),
        header_cell("Unit"),
        header_cell("Range"),
        header_cell("Status"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (code, result) in &report.results {
        table.add_row(vec![
            Cell::new(code),
            Cell::new(&result.value),
            Cell::new(result.unit.as_deref().unwrap_or("-")),
            Cell::new(
                result
                    .reference_range
                    .map(|r| r.describe())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            status_cell(result.status),
        ]);
    }
    for code in &report.missing {
        table.add_row(vec![
            Cell::new(code),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("missing"),
        ]);
    }
    println!("{table}");

    let flags = triage(&report.flags);
    if !flags.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![
            header_cell("Severity"),
            header_cell("Parameter"),
            header_cell("Message"),
        ]);
        apply_summary_table_style(&mut table);
        align_column(&mut table, 0, CellAlignment::Center);
        for flag in flags {
            table.add_row(vec![
                severity_cell(flag.severity),
                Cell::new(&flag.parameter),
                Cell::new(&flag.message),
            ]);
        }
        println!();
        println!("Flags:");
        println!("{table}");
    }
    if report.has_errors() {
        eprintln!("Errors:");
        for issue in &report.errors {
            eprintln!("- {}: {}", issue.parameter, issue.message);
        }
    }
}

pub fn print_plan(plan: &[PlannedGroup]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Destination"),
        header_cell("Container"),
        header_cell("Tests"),
        header_cell("Volume (mL)"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    let mut total = 0.0;
    for (index, group) in plan.iter().enumerate() {
        total += group.volume_ml;
        let tests = group
            .test_codes
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(&group.destination),
            Cell::new(&group.container_type),
            Cell::new(tests),
            Cell::new(format!("{:.2}", group.volume_ml)),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        Cell::new(format!("{total:.2}")).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
}

pub fn print_run(report: &ScenarioReport) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Step"),
        header_cell("Action"),
        header_cell("Actor"),
        header_cell("Result"),
        header_cell("Detail"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Center);
    for step in &report.steps {
        let result = if step.ok {
            Cell::new("✓").fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            Cell::new("✗").fg(Color::Red).add_attribute(Attribute::Bold)
        };
        table.add_row(vec![
            Cell::new(step.index),
            Cell::new(step.action),
            Cell::new(&step.actor),
            result,
            Cell::new(&step.detail),
        ]);
    }
    println!("{table}");

    let totals = &report.totals;
    let mut table = Table::new();
    table.set_header(vec![header_cell("Entity"), header_cell("Count")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (label, count, color) in [
        ("Orders", totals.orders, None),
        ("Specimens", totals.specimens, None),
        ("Recollections", totals.recollections, Some(Color::Yellow)),
        ("Rejected specimens", totals.rejected_specimens, Some(Color::Yellow)),
        ("Aliquots", totals.aliquots, None),
        ("Active tests", totals.active_tests, None),
        ("Validated tests", totals.validated_tests, Some(Color::Green)),
        ("Superseded tests", totals.superseded_tests, None),
        ("Critical flags", totals.critical_flags, Some(Color::Red)),
        ("Failed steps", totals.failed_steps, Some(Color::Red)),
        ("Store writes", totals.store_writes, None),
    ] {
        table.add_row(vec![Cell::new(label), count_cell(count, color)]);
    }
    println!();
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).fg(Color::DarkGrey)
}

fn count_cell(count: usize, color: Option<Color>) -> Cell {
    match color {
        Some(color) if count > 0 => Cell::new(count).fg(color).add_attribute(Attribute::Bold),
        _ if count == 0 => dim_cell(count),
        _ => Cell::new(count),
    }
}

fn status_cell(status: ValueStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        ValueStatus::Normal => cell.fg(Color::Green),
        ValueStatus::Low | ValueStatus::High => cell.fg(Color::Yellow),
        ValueStatus::CriticalLow | ValueStatus::CriticalHigh => {
            cell.fg(Color::Red).add_attribute(Attribute::Bold)
        }
    }
}

fn severity_cell(severity: FlagSeverity) -> Cell {
    match severity {
        FlagSeverity::High => Cell::new("high")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
        FlagSeverity::Medium => Cell::new("medium").fg(Color::Yellow),
        FlagSeverity::Low => Cell::new("low").fg(Color::Blue),
    }
}
