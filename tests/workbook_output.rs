//! Full-workbook smoke test: every sheet the pipeline produces, written to
//! a temporary directory.

use billing_analysis::table::{Cell, ReportTable};
use billing_analysis::workbook::{write_workbook, SheetSpec, SummaryAppendix};
use tempfile::tempdir;

fn metric_table() -> ReportTable {
    let mut table = ReportTable::new(["Metric", "Count"]);
    for (label, count) in [
        ("Registered This Year", 120),
        ("Registered This Month", 14),
        ("Registered This Week", 5),
        ("Registered Today", 1),
    ] {
        table.push_row(vec![Cell::text(label), Cell::Int(count)]);
    }
    table
}

fn order_entries() -> ReportTable {
    let mut table = ReportTable::new([
        "Service ID",
        "Service Name",
        "Total Quantity",
        "Total Amount Paid",
        "Expected Total Amount Paid",
        "Patients With Outstanding Balance",
        "Total Amount Overdue",
    ]);
    table.push_row(vec![
        Cell::Int(1),
        Cell::text("Consultation"),
        Cell::Int(10),
        Cell::text("MWK 900.00"),
        Cell::text("MWK 1,000.00"),
        Cell::Int(1),
        Cell::text("MWK 100.00"),
    ]);
    table.push_row(vec![
        Cell::Empty,
        Cell::text("All Services:"),
        Cell::Int(10),
        Cell::text("MWK 900.00"),
        Cell::text("MWK 1,000.00"),
        Cell::Int(1),
        Cell::text("MWK 100.00"),
    ]);
    table
}

fn distribution() -> ReportTable {
    let mut table = ReportTable::new(["Age Category", "Gender", "Returning Patients"]);
    table.push_row(vec![Cell::text("under_five"), Cell::text("F"), Cell::Int(2)]);
    table.push_row(vec![Cell::text("adult"), Cell::text("M"), Cell::Int(3)]);
    table
}

fn frequency() -> ReportTable {
    let mut table = ReportTable::new(["Number of Visits", "Number of Patients"]);
    table.push_row(vec![Cell::Int(2), Cell::Int(4)]);
    table.push_row(vec![Cell::Int(3), Cell::Int(1)]);
    table
}

#[test]
fn writes_protected_multi_sheet_workbook() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("Consolidated_Report.xlsx");

    let metrics = metric_table();
    let orders = order_entries();
    let dist = distribution();
    let freq = frequency();

    let sheets = vec![
        SheetSpec {
            name: "Registered Patients",
            table: &metrics,
            appendix: None,
        },
        SheetSpec {
            name: "Order Entries",
            table: &orders,
            appendix: Some(SummaryAppendix {
                distribution: &dist,
                frequency: &freq,
                window_label: "2024-02-14 to 2024-03-15",
            }),
        },
    ];

    write_workbook(&path, &sheets, "test-sheet-password").unwrap();

    let bytes = std::fs::read(&path).unwrap();
    // An xlsx file is a zip container.
    assert_eq!(&bytes[..2], b"PK");
    assert!(bytes.len() > 1_000);
}

#[test]
fn empty_tables_still_produce_sheets() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("empty.xlsx");

    let empty = ReportTable::new(["Classification", "Patients"]);
    let sheets = vec![SheetSpec {
        name: "Patient Payment Mix",
        table: &empty,
        appendix: None,
    }];

    write_workbook(&path, &sheets, "pw").unwrap();
    assert!(path.exists());
}
