//! Workbook serialization.
//!
//! Each sheet renders as an explicit list of layout blocks (title band,
//! column headers, data rows, spacers, summary blocks). Row positions are
//! derived by walking the block list and accumulating each block's height,
//! so an appended summary always lands directly below whatever rows the
//! pipeline actually produced. Sheet protection is applied last.

use std::path::Path;

use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet};

use crate::table::{Cell, ReportTable};
use crate::AppResult;

const COLUMN_PADDING: usize = 2;
const BANNER_HEIGHT: f64 = 30.0;
/// The summary banners and their tables span columns A..C.
const SUMMARY_SPAN: u16 = 3;

/// One sheet of the output workbook.
pub struct SheetSpec<'a> {
    pub name: &'a str,
    pub table: &'a ReportTable,
    pub appendix: Option<SummaryAppendix<'a>>,
}

/// The freeform blocks appended below the Order Entries data rows.
pub struct SummaryAppendix<'a> {
    pub distribution: &'a ReportTable,
    pub frequency: &'a ReportTable,
    pub window_label: &'a str,
}

/// A renderable block with a known height. Offsets are never asserted;
/// they fall out of walking the list.
enum Block<'a> {
    Title(&'a str),
    Columns(&'a [String]),
    Rows(&'a ReportTable),
    Spacer,
    Banner(String),
    SummaryHeader([&'static str; 3], bool),
    DistributionRows(&'a ReportTable),
    FrequencyRows(&'a ReportTable),
    TotalInThirdColumn(i64),
}

impl Block<'_> {
    fn height(&self) -> u32 {
        match self {
            Block::Title(_)
            | Block::Columns(_)
            | Block::Spacer
            | Block::Banner(_)
            | Block::SummaryHeader(_, _)
            | Block::TotalInThirdColumn(_) => 1,
            Block::Rows(table) => table.len() as u32,
            Block::DistributionRows(table) => table.len() as u32,
            Block::FrequencyRows(table) => table.len() as u32,
        }
    }
}

/// Starting row of each block in the list.
fn block_offsets(blocks: &[Block<'_>]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(blocks.len());
    let mut row = 0_u32;
    for block in blocks {
        offsets.push(row);
        row += block.height();
    }
    offsets
}

fn sheet_blocks<'a>(spec: &'a SheetSpec<'a>) -> Vec<Block<'a>> {
    let mut blocks = vec![
        Block::Title(spec.name),
        Block::Columns(spec.table.columns()),
        Block::Rows(spec.table),
    ];
    if let Some(appendix) = &spec.appendix {
        blocks.push(Block::Spacer);
        blocks.push(Block::Banner(format!(
            "Returning Patients Distribution · {}",
            appendix.window_label
        )));
        blocks.push(Block::SummaryHeader(
            ["Distribution", "Count", "Total Patients"],
            true,
        ));
        blocks.push(Block::DistributionRows(appendix.distribution));
        blocks.push(Block::TotalInThirdColumn(distribution_total(
            appendix.distribution,
        )));
        blocks.push(Block::Spacer);
        blocks.push(Block::Banner("Frequency of The Returning Patients".to_string()));
        blocks.push(Block::SummaryHeader(
            [
                "Number of Visits",
                "Number of Patients",
                "Patients With More Visits",
            ],
            false,
        ));
        blocks.push(Block::FrequencyRows(appendix.frequency));
        blocks.push(Block::TotalInThirdColumn(frequency_total(appendix.frequency)));
    }
    blocks
}

/// Grand total of the distribution block: the count column summed.
fn distribution_total(distribution: &ReportTable) -> i64 {
    distribution
        .column_index("Returning Patients")
        .map(|col| distribution.sum_i64(col))
        .unwrap_or(0)
}

/// Grand total of the frequency block: the patient column summed.
fn frequency_total(frequency: &ReportTable) -> i64 {
    frequency
        .column_index("Number of Patients")
        .map(|col| frequency.sum_i64(col))
        .unwrap_or(0)
}

struct Formats {
    title: Format,
    header: Format,
    banner: Format,
    center: Format,
    center_bold: Format,
    left: Format,
}

impl Formats {
    fn new() -> Self {
        Formats {
            title: Format::new().set_bold().set_font_size(14),
            header: Format::new().set_bold(),
            banner: Format::new()
                .set_bold()
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::VerticalCenter)
                .set_text_wrap(),
            center: Format::new()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            center_bold: Format::new()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            left: Format::new()
                .set_align(FormatAlign::Left)
                .set_align(FormatAlign::VerticalCenter),
        }
    }
}

/// Write every sheet and protect each one with the shared password.
pub fn write_workbook(path: &Path, sheets: &[SheetSpec<'_>], password: &str) -> AppResult<()> {
    let mut workbook = Workbook::new();
    let formats = Formats::new();

    for spec in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(spec.name)?;
        render_sheet(worksheet, spec, &formats)?;
        worksheet.protect_with_password(password);
    }

    workbook.save(path)?;
    tracing::info!(path = %path.display(), sheets = sheets.len(), "workbook_written");
    Ok(())
}

fn render_sheet(
    worksheet: &mut Worksheet,
    spec: &SheetSpec<'_>,
    formats: &Formats,
) -> AppResult<()> {
    let blocks = sheet_blocks(spec);
    let offsets = block_offsets(&blocks);

    for (block, row) in blocks.iter().zip(offsets) {
        match block {
            Block::Title(text) => {
                let last_col = spec.table.width().saturating_sub(1) as u16;
                if last_col > 0 {
                    worksheet.merge_range(row, 0, row, last_col, text, &formats.title)?;
                } else {
                    worksheet.write_string_with_format(row, 0, *text, &formats.title)?;
                }
            }
            Block::Columns(columns) => {
                for (col, name) in columns.iter().enumerate() {
                    worksheet.write_string_with_format(row, col as u16, name, &formats.header)?;
                }
            }
            Block::Rows(table) => {
                for (i, data_row) in table.rows().iter().enumerate() {
                    for (col, cell) in data_row.iter().enumerate() {
                        write_cell(worksheet, row + i as u32, col as u16, cell)?;
                    }
                }
            }
            Block::Spacer => {}
            Block::Banner(text) => {
                worksheet.merge_range(row, 0, row, SUMMARY_SPAN - 1, text, &formats.banner)?;
                worksheet.set_row_height(row, BANNER_HEIGHT)?;
            }
            Block::SummaryHeader(headers, bold) => {
                let format = if *bold { &formats.center_bold } else { &formats.center };
                for (col, header) in headers.iter().enumerate() {
                    worksheet.write_string_with_format(row, col as u16, *header, format)?;
                }
            }
            Block::DistributionRows(table) => {
                for (i, dist_row) in table.rows().iter().enumerate() {
                    let label =
                        format!("{} ({})", dist_row[0].render(), dist_row[1].render());
                    worksheet.write_string_with_format(row + i as u32, 0, label, &formats.left)?;
                    if let Some(count) = dist_row[2].as_i64() {
                        worksheet.write_number_with_format(
                            row + i as u32,
                            1,
                            count as f64,
                            &formats.center,
                        )?;
                    }
                }
            }
            Block::FrequencyRows(table) => {
                for (i, freq_row) in table.rows().iter().enumerate() {
                    if let Some(visits) = freq_row[0].as_i64() {
                        worksheet.write_number_with_format(
                            row + i as u32,
                            0,
                            visits as f64,
                            &formats.center,
                        )?;
                    }
                    if let Some(patients) = freq_row[1].as_i64() {
                        worksheet.write_number_with_format(
                            row + i as u32,
                            1,
                            patients as f64,
                            &formats.center,
                        )?;
                    }
                }
            }
            Block::TotalInThirdColumn(total) => {
                worksheet.write_number_with_format(
                    row,
                    2,
                    *total as f64,
                    &formats.center_bold,
                )?;
            }
        }
    }

    for (col, width) in column_widths(spec).iter().enumerate() {
        worksheet.set_column_width(col as u16, *width as f64)?;
    }

    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> AppResult<()> {
    match cell {
        Cell::Int(v) => {
            worksheet.write_number(row, col, *v as f64)?;
        }
        Cell::Float(v) => {
            worksheet.write_number(row, col, *v)?;
        }
        Cell::Text(v) => {
            worksheet.write_string(row, col, v)?;
        }
        Cell::Empty => {}
    }
    Ok(())
}

/// Width of each column: the longest rendered value among the title (first
/// column only), headers and data rows, plus fixed padding. Summary blocks
/// do not participate in sizing.
fn column_widths(spec: &SheetSpec<'_>) -> Vec<usize> {
    let ncols = if spec.appendix.is_some() {
        spec.table.width().max(SUMMARY_SPAN as usize)
    } else {
        spec.table.width()
    };
    let mut widths = vec![0_usize; ncols];

    widths[0] = spec.name.chars().count();
    for (col, name) in spec.table.columns().iter().enumerate() {
        widths[col] = widths[col].max(name.chars().count());
    }
    for row in spec.table.rows() {
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(cell.render().chars().count());
        }
    }

    widths.iter().map(|w| w + COLUMN_PADDING).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_table(rows: usize) -> ReportTable {
        let mut table = ReportTable::new(["Service Name", "Total Quantity"]);
        for i in 0..rows {
            table.push_row(vec![Cell::text(format!("Service {i}")), Cell::Int(i as i64)]);
        }
        table
    }

    fn distribution() -> ReportTable {
        let mut table = ReportTable::new(["Age Category", "Gender", "Returning Patients"]);
        table.push_row(vec![Cell::text("adult"), Cell::text("F"), Cell::Int(4)]);
        table.push_row(vec![Cell::text("adult"), Cell::text("M"), Cell::Int(3)]);
        table
    }

    fn frequency() -> ReportTable {
        let mut table = ReportTable::new(["Number of Visits", "Number of Patients"]);
        table.push_row(vec![Cell::Int(2), Cell::Int(5)]);
        table.push_row(vec![Cell::Int(3), Cell::Int(2)]);
        table
    }

    #[test]
    fn offsets_accumulate_block_heights() {
        let table = data_table(4);
        let distribution = distribution();
        let frequency = frequency();
        let spec = SheetSpec {
            name: "Order Entries",
            table: &table,
            appendix: Some(SummaryAppendix {
                distribution: &distribution,
                frequency: &frequency,
                window_label: "2024-02-14 to 2024-03-15",
            }),
        };

        let blocks = sheet_blocks(&spec);
        let offsets = block_offsets(&blocks);

        // Title, headers, then four data rows.
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[1], 1);
        assert_eq!(offsets[2], 2);
        // Spacer directly after the data, banner after the spacer.
        assert_eq!(offsets[3], 6);
        assert_eq!(offsets[4], 7);
        // Distribution header, rows, total.
        assert_eq!(offsets[5], 8);
        assert_eq!(offsets[6], 9);
        assert_eq!(offsets[7], 11);
        // Second spacer, frequency banner, header, rows, total.
        assert_eq!(offsets[8], 12);
        assert_eq!(offsets[9], 13);
        assert_eq!(offsets[10], 14);
        assert_eq!(offsets[11], 15);
        assert_eq!(offsets[12], 17);
    }

    #[test]
    fn offsets_track_table_growth() {
        // Growing the data table shifts every appended block down by the
        // same amount; nothing is pinned to a magic row.
        for rows in [0, 1, 10] {
            let table = data_table(rows);
            let distribution = distribution();
            let frequency = frequency();
            let spec = SheetSpec {
                name: "Order Entries",
                table: &table,
                appendix: Some(SummaryAppendix {
                    distribution: &distribution,
                    frequency: &frequency,
                    window_label: "w",
                }),
            };
            let blocks = sheet_blocks(&spec);
            let offsets = block_offsets(&blocks);
            assert_eq!(offsets[3], 2 + rows as u32, "spacer follows {rows} data rows");
        }
    }

    #[test]
    fn summary_totals_sum_their_tables() {
        assert_eq!(distribution_total(&distribution()), 7);
        assert_eq!(frequency_total(&frequency()), 7);
    }

    #[test]
    fn widths_cover_title_headers_and_longest_cell() {
        let mut table = ReportTable::new(["A", "B"]);
        table.push_row(vec![Cell::text("a-very-long-service-name"), Cell::Int(1)]);
        let spec = SheetSpec {
            name: "T",
            table: &table,
            appendix: None,
        };
        let widths = column_widths(&spec);
        assert_eq!(widths[0], "a-very-long-service-name".len() + COLUMN_PADDING);
        assert_eq!(widths[1], 1 + COLUMN_PADDING);
    }

    #[test]
    fn workbook_writes_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.xlsx");
        let table = data_table(3);
        let distribution = distribution();
        let frequency = frequency();
        let sheets = vec![
            SheetSpec {
                name: "Popular Services",
                table: &table,
                appendix: None,
            },
            SheetSpec {
                name: "Order Entries",
                table: &table,
                appendix: Some(SummaryAppendix {
                    distribution: &distribution,
                    frequency: &frequency,
                    window_label: "2024-02-14 to 2024-03-15",
                }),
            },
        ];

        write_workbook(&path, &sheets, "secret").unwrap();
        let metadata = std::fs::metadata(&path).unwrap();
        assert!(metadata.len() > 0);
    }
}
