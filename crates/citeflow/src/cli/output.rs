//! Output formatting utilities for CLI commands

use citeflow_db::CiteflowDb;
use citeflow_ingest::FileOutcome;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};

/// Format elapsed milliseconds compactly
///
/// Examples:
/// - 850 -> "850ms"
/// - 1500 -> "1.5s"
/// - 125000 -> "2m05s"
pub fn format_elapsed(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let secs = ms / 1000;
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

/// Format a Unix-millis timestamp in local time
pub fn format_millis(millis: i64) -> String {
    match CiteflowDb::millis_to_datetime(millis) {
        Some(utc) => utc
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "-".to_string(),
    }
}

/// Format a count with thousands separators
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Display color for a file outcome
pub fn outcome_color(outcome: FileOutcome) -> Color {
    match outcome {
        FileOutcome::Completed => Color::Green,
        FileOutcome::AlreadyIngested => Color::DarkGrey,
        FileOutcome::Cancelled => Color::Yellow,
        FileOutcome::Corrupt
        | FileOutcome::Incomplete
        | FileOutcome::Unreadable
        | FileOutcome::LedgerUnavailable => Color::Red,
    }
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);
    table
}

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = new_table(headers);
    for row in rows {
        table.add_row(row);
    }
    println!("{}", table);
}

/// Print a table with custom cell colors
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = new_table(headers);
    for row in rows {
        let cells: Vec<Cell> = row
            .into_iter()
            .map(|(text, color)| match color {
                Some(c) => Cell::new(text).fg(c),
                None => Cell::new(text),
            })
            .collect();
        table.add_row(cells);
    }
    println!("{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0ms");
        assert_eq!(format_elapsed(850), "850ms");
        assert_eq!(format_elapsed(1500), "1.5s");
        assert_eq!(format_elapsed(125_000), "2m05s");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(30_000_000), "30,000,000");
    }

    #[test]
    fn test_format_millis_out_of_range() {
        assert_eq!(format_millis(i64::MAX), "-");
        assert_eq!(format_millis(0).len(), "1970-01-01 00:00:00".len());
    }

    #[test]
    fn test_failures_are_red() {
        assert_eq!(outcome_color(FileOutcome::Corrupt), Color::Red);
        assert_eq!(outcome_color(FileOutcome::Completed), Color::Green);
    }
}
