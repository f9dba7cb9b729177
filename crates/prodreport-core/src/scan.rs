//! Threshold scan over the calculation sheet

use crate::cell::CellValue;
use crate::grid::SheetGrid;
use crate::layout::ScanLayout;

/// Read a currency-or-plain amount.
///
/// Numbers pass through; text has the currency symbol removed, the decimal
/// comma turned into a dot and surrounding whitespace trimmed before
/// parsing. Dates, errors and blanks are not amounts.
pub fn parse_amount(value: &CellValue, currency_symbol: &str) -> Option<f64> {
    match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        CellValue::String(s) => {
            let stripped = if currency_symbol.is_empty() {
                s.clone()
            } else {
                s.replace(currency_symbol, "")
            };
            stripped.replace(',', ".").trim().parse::<f64>().ok()
        }
        _ => None,
    }
}

/// A label cell counts when it is neither blank nor a zero/false value
fn label_present(value: &CellValue) -> bool {
    match value {
        CellValue::Empty => false,
        CellValue::String(s) => !s.is_empty(),
        CellValue::Number(n) => *n != 0.0,
        CellValue::Boolean(b) => *b,
        _ => true,
    }
}

/// Collect the labels of every qualifying row in the scan window.
///
/// A row qualifies when its label cell is present, its marker cell is not
/// blank, and its amount parses to a value strictly above the threshold.
/// Rows failing any rule are skipped; order and duplicates are kept.
pub fn scan_qualifying_labels(grid: &SheetGrid, layout: &ScanLayout) -> Vec<String> {
    let mut labels = Vec::new();

    for row in layout.first_row..=layout.last_row {
        let label = grid.get(row, layout.label_col);
        if !label_present(label) {
            continue;
        }

        if grid.get(row, layout.marker_col).is_blank() {
            continue;
        }

        let Some(amount) = parse_amount(grid.get(row, layout.amount_col), &layout.currency_symbol)
        else {
            continue;
        };

        if amount > layout.threshold {
            labels.push(label.to_display_string());
        }
    }

    labels
}
