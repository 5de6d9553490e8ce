use prettytable::{Table, row};

/// One finished summary row. Producing these is where the core's contract
/// ends; rendering is a presentation concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub operator: String,
    pub flop: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Builds the printable summary table for the finished rows.
pub fn render(rows: &[ReportRow]) -> Table {
    let mut table = Table::new();
    table.set_titles(row!["Operator", "FLOP", "Bytes IN", "Bytes OUT"]);
    for r in rows {
        table.add_row(row![r.operator, r.flop, r.bytes_in, r.bytes_out]);
    }
    table
}

/// Accumulated (FLOP, bytes in, bytes out) over all rows.
pub fn totals(rows: &[ReportRow]) -> (u64, u64, u64) {
    rows.iter().fold((0, 0, 0), |(f, i, o), r| {
        (f + r.flop, i + r.bytes_in, o + r.bytes_out)
    })
}
