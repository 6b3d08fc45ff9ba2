//! Display formatting for report tables.
//!
//! Formatting always runs after aggregation: totals are computed from raw
//! numeric cells, then monetary columns are rewritten as currency strings.
//! A formatted column is text from that point on and is never re-aggregated.

use std::cmp::Ordering;

use crate::report::age::BandFamily;
use crate::report::{self, ReportBundle};
use crate::table::{Cell, ReportTable};

pub const CURRENCY_PREFIX: &str = "MWK";

/// `1234567.891` → `"MWK 1,234,567.89"`.
pub fn format_currency(value: f64) -> String {
    let negative = value < 0.0;
    let rounded = format!("{:.2}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((&rounded, "00"));
    let grouped = group_thousands(int_part);
    if negative {
        format!("{CURRENCY_PREFIX} -{grouped}.{frac_part}")
    } else {
        format!("{CURRENCY_PREFIX} {grouped}.{frac_part}")
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let chars: Vec<char> = digits.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out
}

/// English month name for 1..=12.
pub fn month_name(month: i64) -> Option<&'static str> {
    match month {
        1 => Some("January"),
        2 => Some("February"),
        3 => Some("March"),
        4 => Some("April"),
        5 => Some("May"),
        6 => Some("June"),
        7 => Some("July"),
        8 => Some("August"),
        9 => Some("September"),
        10 => Some("October"),
        11 => Some("November"),
        12 => Some("December"),
        _ => None,
    }
}

/// Rewrite the numeric cells of a monetary column as currency strings.
/// Placeholder and already-text cells pass through unchanged.
pub fn apply_currency(table: &mut ReportTable, column: &str) {
    if let Some(col) = table.column_index(column) {
        table.map_column(col, |cell| match cell.as_f64() {
            Some(value) => Cell::text(format_currency(value)),
            None => cell.clone(),
        });
    }
}

/// Append the synthesized "All Services:" grand-total row to the order
/// entries table. Sums are taken from the raw numeric cells, so this must
/// run before any currency formatting touches the table.
pub fn append_order_totals(table: &mut ReportTable) {
    let (Some(quantity_col), Some(paid_col), Some(expected_col), Some(balance_col), Some(overdue_col)) = (
        table.column_index(report::COL_TOTAL_QUANTITY),
        table.column_index(report::COL_TOTAL_PAID),
        table.column_index(report::COL_EXPECTED_PAID),
        table.column_index(report::COL_PATIENTS_WITH_BALANCE),
        table.column_index(report::COL_TOTAL_OVERDUE),
    ) else {
        return;
    };

    let quantity = table.sum_i64(quantity_col);
    let paid = table.sum_f64(paid_col);
    let expected = table.sum_f64(expected_col);
    let balance = table.sum_i64(balance_col);
    let overdue = table.sum_f64(overdue_col);

    table.push_row(vec![
        Cell::Empty,
        Cell::text("All Services:"),
        Cell::Int(quantity),
        Cell::Float(paid),
        Cell::Float(expected),
        Cell::Int(balance),
        Cell::Float(overdue),
    ]);
}

/// Impose the family's fixed categorical order on the band column, then
/// order by gender within each band. Labels outside the family sort last.
pub fn order_by_band_then_gender(
    table: &mut ReportTable,
    family: &BandFamily,
    band_column: &str,
    gender_column: &str,
) {
    let (Some(band_col), Some(gender_col)) = (
        table.column_index(band_column),
        table.column_index(gender_column),
    ) else {
        return;
    };
    table.sort_rows_by(|a, b| {
        let rank_a = family.rank(&a[band_col].render());
        let rank_b = family.rank(&b[band_col].render());
        rank_a
            .cmp(&rank_b)
            .then_with(|| a[gender_col].render().cmp(&b[gender_col].render()))
    });
}

/// Sort year descending, then month descending. Runs on the numeric month
/// values before the names are mapped in.
pub fn sort_year_month_desc(table: &mut ReportTable, year_column: &str, month_column: &str) {
    let (Some(year_col), Some(month_col)) = (
        table.column_index(year_column),
        table.column_index(month_column),
    ) else {
        return;
    };
    table.sort_rows_by(|a, b| {
        let year = cmp_i64(&b[year_col], &a[year_col]);
        year.then_with(|| cmp_i64(&b[month_col], &a[month_col]))
    });
}

fn cmp_i64(a: &Cell, b: &Cell) -> Ordering {
    a.as_i64().unwrap_or(i64::MIN).cmp(&b.as_i64().unwrap_or(i64::MIN))
}

/// Replace numeric month cells with month names. The mapping is total over
/// 1..=12; anything else is left untouched.
pub fn map_month_names(table: &mut ReportTable, column: &str) {
    if let Some(col) = table.column_index(column) {
        table.map_column(col, |cell| match cell.as_i64().and_then(month_name) {
            Some(name) => Cell::text(name),
            None => cell.clone(),
        });
    }
}

/// Render a float column with two decimals.
pub fn apply_two_decimals(table: &mut ReportTable, column: &str) {
    if let Some(col) = table.column_index(column) {
        table.map_column(col, |cell| match cell.as_f64() {
            Some(value) => Cell::text(format!("{value:.2}")),
            None => cell.clone(),
        });
    }
}

/// Run every per-report formatting pass over the freshly queried bundle.
pub fn format_bundle(bundle: &mut ReportBundle) {
    append_order_totals(&mut bundle.order_entries);
    apply_currency(&mut bundle.order_entries, report::COL_TOTAL_PAID);
    apply_currency(&mut bundle.order_entries, report::COL_EXPECTED_PAID);
    apply_currency(&mut bundle.order_entries, report::COL_TOTAL_OVERDUE);

    order_by_band_then_gender(
        &mut bundle.age_groups,
        &crate::report::age::ADOLESCENT,
        "Age Group",
        "Gender",
    );

    apply_currency(&mut bundle.service_profits, "Total Amount Paid");

    sort_year_month_desc(&mut bundle.services_per_month, "Year", "Month");
    map_month_names(&mut bundle.services_per_month, "Month");

    apply_two_decimals(&mut bundle.drugs_overview, "Avg Dose Strength");

    apply_currency(&mut bundle.daily_collections, "Amount Collected");
}
