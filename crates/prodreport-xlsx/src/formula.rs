//! Reference arithmetic for formulas written out at another cell

use prodreport_core::{CellAddress, MAX_COLS, MAX_ROWS};
use regex::{Captures, Regex};

use crate::error::{XlsxError, XlsxResult};

/// Cell reference, whole-column range or whole-row range
const REFERENCE: &str = r"(\$?)([A-Z]{1,3})(\$?)([0-9]+)|(\$?)([A-Z]{1,3}):(\$?)([A-Z]{1,3})|(\$?)([0-9]+):(\$?)([0-9]+)";

/// Rewrite `formula` as if it were copied `rows` down and `cols` right.
///
/// Only relative coordinates move; `$`-anchored ones stay. Text in double
/// quotes and quoted sheet names are left alone. A reference pushed off the
/// sheet becomes `#REF!`.
pub(crate) fn shift_references(formula: &str, rows: i64, cols: i64) -> XlsxResult<String> {
    let pattern = Regex::new(REFERENCE).map_err(|e| XlsxError::Parse(e.to_string()))?;

    let mut out = String::with_capacity(formula.len());
    let mut rest = formula;
    while let Some(open) = rest.find(['"', '\'']) {
        out.push_str(&shift_segment(&pattern, &rest[..open], rows, cols));
        let close = open + quoted_len(&rest[open..]);
        out.push_str(&rest[open..close]);
        rest = &rest[close..];
    }
    out.push_str(&shift_segment(&pattern, rest, rows, cols));
    Ok(out)
}

/// Length of the quoted run at the start of `s`, quotes included.
/// A doubled quote is an escaped one.
fn quoted_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let quote = bytes[0];
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn shift_segment(pattern: &Regex, text: &str, rows: i64, cols: i64) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        // LOG10(, Table1, IZB1!A1 and the like are names, not references
        let before = text[..whole.start()].chars().next_back();
        let after = text[whole.end()..].chars().next();
        if before.is_some_and(is_name_char)
            || after.is_some_and(|c| is_name_char(c) || c == '(' || c == '!')
        {
            continue;
        }
        let Some(shifted) = shift_match(&caps, rows, cols) else { continue };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&shifted);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Replacement text for one match, `None` when it is not a valid reference
fn shift_match(caps: &Captures<'_>, rows: i64, cols: i64) -> Option<String> {
    let part = |i: usize| caps.get(i).map_or("", |m| m.as_str());
    let column_at = |i: usize| CellAddress::letters_to_column(part(i)).ok();
    let row_at = |i: usize| {
        part(i)
            .parse::<u32>()
            .ok()
            .filter(|r| (1..=MAX_ROWS).contains(r))
    };
    let letters = CellAddress::column_to_letters;

    let shifted = if caps.get(2).is_some() {
        let (col, row) = (column_at(2)?, row_at(4)?);
        moved(part(1), col, cols, MAX_COLS)
            .zip(moved(part(3), row, rows, MAX_ROWS))
            .map(|(c, r)| format!("{}{}{}{}", part(1), letters(c), part(3), r))
    } else if caps.get(6).is_some() {
        let (first, last) = (column_at(6)?, column_at(8)?);
        moved(part(5), first, cols, MAX_COLS)
            .zip(moved(part(7), last, cols, MAX_COLS))
            .map(|(a, b)| format!("{}{}:{}{}", part(5), letters(a), part(7), letters(b)))
    } else {
        let (first, last) = (row_at(10)?, row_at(12)?);
        moved(part(9), first, rows, MAX_ROWS)
            .zip(moved(part(11), last, rows, MAX_ROWS))
            .map(|(a, b)| format!("{}{}:{}{}", part(9), a, part(11), b))
    };
    Some(shifted.unwrap_or_else(|| "#REF!".to_string()))
}

/// One coordinate after the move; `None` once it leaves the sheet
fn moved(anchor: &str, value: u32, by: i64, max: u32) -> Option<u32> {
    if !anchor.is_empty() {
        return Some(value);
    }
    let value = i64::from(value) + by;
    (1..=i64::from(max))
        .contains(&value)
        .then_some(value as u32)
}
