//! End-to-end formatting scenarios over in-memory report tables.

use billing_analysis::format::{append_order_totals, apply_currency, map_month_names, sort_year_month_desc};
use billing_analysis::report;
use billing_analysis::table::{Cell, ReportTable};

/// The per-service scenario: A has 10 units at price 100 with 900 paid,
/// B has 5 units at price 50 with 250 paid.
fn two_service_orders() -> ReportTable {
    let mut table = report::order_entries_table();
    table.push_row(vec![
        Cell::Int(1),
        Cell::text("Service A"),
        Cell::Int(10),
        Cell::Float(900.0),
        Cell::Float(1000.0),
        Cell::Int(1),
        Cell::Float(100.0),
    ]);
    table.push_row(vec![
        Cell::Int(2),
        Cell::text("Service B"),
        Cell::Int(5),
        Cell::Float(250.0),
        Cell::Float(250.0),
        Cell::Int(0),
        Cell::Float(0.0),
    ]);
    table
}

#[test]
fn per_service_table_formats_and_totals_exactly() {
    let mut table = two_service_orders();
    append_order_totals(&mut table);
    apply_currency(&mut table, report::COL_TOTAL_PAID);
    apply_currency(&mut table, report::COL_EXPECTED_PAID);
    apply_currency(&mut table, report::COL_TOTAL_OVERDUE);

    let render = |row: usize, col: &str| {
        let idx = table.column_index(col).unwrap();
        table.cell(row, idx).render()
    };

    assert_eq!(render(0, report::COL_TOTAL_QUANTITY), "10");
    assert_eq!(render(0, report::COL_TOTAL_PAID), "MWK 900.00");
    assert_eq!(render(0, report::COL_EXPECTED_PAID), "MWK 1,000.00");
    assert_eq!(render(0, report::COL_TOTAL_OVERDUE), "MWK 100.00");

    assert_eq!(render(1, report::COL_TOTAL_QUANTITY), "5");
    assert_eq!(render(1, report::COL_TOTAL_PAID), "MWK 250.00");
    assert_eq!(render(1, report::COL_EXPECTED_PAID), "MWK 250.00");
    assert_eq!(render(1, report::COL_TOTAL_OVERDUE), "MWK 0.00");

    let totals = table.len() - 1;
    assert_eq!(render(totals, report::COL_SERVICE_NAME), "All Services:");
    assert_eq!(render(totals, report::COL_TOTAL_QUANTITY), "15");
    assert_eq!(render(totals, report::COL_TOTAL_PAID), "MWK 1,150.00");
    assert_eq!(render(totals, report::COL_EXPECTED_PAID), "MWK 1,250.00");
    assert_eq!(render(totals, report::COL_TOTAL_OVERDUE), "MWK 100.00");
}

#[test]
fn formatted_currency_cells_never_reenter_aggregation() {
    let mut table = two_service_orders();
    append_order_totals(&mut table);
    apply_currency(&mut table, report::COL_TOTAL_PAID);

    // Summing again after formatting must find nothing numeric left in the
    // column: the totals row was computed from raw values, once.
    let paid = table.column_index(report::COL_TOTAL_PAID).unwrap();
    assert_eq!(table.sum_f64(paid), 0.0);
}

#[test]
fn month_ordering_and_names_agree_with_calendar() {
    let mut table = ReportTable::new(["Service Name", "Year", "Month", "Services Used Per Month"]);
    for (year, month) in [(2023, 12), (2024, 11), (2024, 12), (2024, 1)] {
        table.push_row(vec![
            Cell::text("Consultation"),
            Cell::Int(year),
            Cell::Int(month),
            Cell::Int(1),
        ]);
    }

    sort_year_month_desc(&mut table, "Year", "Month");
    map_month_names(&mut table, "Month");

    let months: Vec<String> = table.rows().iter().map(|r| r[2].render()).collect();
    assert_eq!(months, vec!["December", "November", "January", "December"]);
    let years: Vec<String> = table.rows().iter().map(|r| r[1].render()).collect();
    assert_eq!(years, vec!["2024", "2024", "2024", "2023"]);
}
