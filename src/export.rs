use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use error_stack::{Report, ResultExt};
use tracing::debug;

use crate::error::StorageError;
use crate::storage::Store;

pub const CSV_FILE: &str = "export.csv";
pub const HTML_FILE: &str = "export.html";

/// Rewrite the latest-price CSV and its HTML mirror. Existing symbols
/// keep their row position and new symbols append at the end; the CSV
/// is imported into a spreadsheet by cell reference, so row order is
/// part of the format.
pub fn write_latest_prices(
    store: &Store,
    csv_path: &Path,
    html_path: &Path,
    updates: &[(String, f64)],
) -> Result<(), Report<StorageError>> {
    let existing = match fs::read_to_string(csv_path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(Report::new(err)
                .change_context(StorageError::ReadFile { path: csv_path.display().to_string() }));
        }
    };

    let rows = merged_rows(&existing, updates)
        .change_context(StorageError::ParseFile { path: csv_path.display().to_string() })?;

    let csv_text = render_csv(&rows)
        .change_context(StorageError::WriteFile { path: csv_path.display().to_string() })?;
    store.write_atomic(csv_path, &csv_text)?;
    store.write_atomic(html_path, &render_html(&rows))
}

/// Merge fresh prices into the previously exported rows, first by
/// updating matching symbols in place, then appending the leftovers.
fn merged_rows(existing: &str, updates: &[(String, f64)]) -> Result<Vec<(String, f64)>, csv::Error> {
    let mut consumed = vec![false; updates.len()];
    let mut rows: Vec<(String, f64)> = Vec::new();

    let mut reader =
        csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(existing.as_bytes());
    for record in reader.records() {
        let record = record?;
        let symbol = record.get(0).unwrap_or_default().to_string();
        if symbol.is_empty() {
            continue;
        }
        let mut price = match record.get(1) {
            Some(cell) if !cell.is_empty() => cell.parse::<f64>().unwrap_or_else(|_| {
                debug!(symbol = %symbol, cell, "unreadable price cell, resetting to zero");
                0.0
            }),
            _ => 0.0,
        };
        if let Some(pos) = updates.iter().position(|(s, _)| *s == symbol) {
            price = updates[pos].1;
            consumed[pos] = true;
        }
        rows.push((symbol, price));
    }

    for (pos, (symbol, price)) in updates.iter().enumerate() {
        if !consumed[pos] {
            rows.push((symbol.clone(), *price));
        }
    }
    Ok(rows)
}

fn render_csv(rows: &[(String, f64)]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (symbol, price) in rows {
        let price = price.to_string();
        writer.write_record([symbol.as_str(), price.as_str()])?;
    }
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn render_html(rows: &[(String, f64)]) -> String {
    let mut out = String::from("<table>");
    for (symbol, price) in rows {
        out.push_str(&format!("<tr><td>{symbol}</td><td>{price}</td></tr>"));
    }
    out.push_str("</table>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updates(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn known_symbols_update_in_place_and_new_ones_append() {
        let existing = "TSCO,280.0\nBP,4.5\nAZN,110.0\n";
        let rows =
            merged_rows(existing, &updates(&[("BP", 4.75), ("BTCUSD", 42000.0)])).unwrap();
        assert_eq!(
            rows,
            vec![
                ("TSCO".to_string(), 280.0),
                ("BP".to_string(), 4.75),
                ("AZN".to_string(), 110.0),
                ("BTCUSD".to_string(), 42000.0),
            ]
        );
    }

    #[test]
    fn empty_file_takes_updates_in_order() {
        let rows = merged_rows("", &updates(&[("B", 2.0), ("A", 1.0)])).unwrap();
        assert_eq!(rows, vec![("B".to_string(), 2.0), ("A".to_string(), 1.0)]);
    }

    #[test]
    fn bare_symbols_and_garbage_prices_read_as_zero() {
        let rows = merged_rows("TSCO\nBP,oops\n", &[]).unwrap();
        assert_eq!(rows, vec![("TSCO".to_string(), 0.0), ("BP".to_string(), 0.0)]);
    }

    #[test]
    fn csv_and_html_share_row_content() {
        let rows = vec![("TSCO".to_string(), 281.5), ("BP".to_string(), 4.75)];
        assert_eq!(render_csv(&rows).unwrap(), "TSCO,281.5\nBP,4.75\n");
        assert_eq!(
            render_html(&rows),
            "<table><tr><td>TSCO</td><td>281.5</td></tr><tr><td>BP</td><td>4.75</td></tr></table>"
        );
    }

    #[test]
    fn files_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path(), true);
        let csv_path = dir.path().join(CSV_FILE);
        let html_path = dir.path().join(HTML_FILE);

        write_latest_prices(&store, &csv_path, &html_path, &updates(&[("TSCO", 280.0)])).unwrap();
        write_latest_prices(&store, &csv_path, &html_path, &updates(&[("TSCO", 281.5)])).unwrap();

        assert_eq!(fs::read_to_string(&csv_path).unwrap(), "TSCO,281.5\n");
        assert!(fs::read_to_string(&html_path).unwrap().contains("<td>281.5</td>"));
    }
}
