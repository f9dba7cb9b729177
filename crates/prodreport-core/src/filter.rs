//! Row selection for the per-label render

use crate::cell::CellValue;

/// Keep the header row plus every row whose tag cell matches `label`.
///
/// `rows` is the lookup window as read, header first. `tag_offset` is the
/// zero-based position of the tag column inside each row. Kept rows are cut
/// to their first `width` cells, the columns the staging area receives.
pub fn filter_lookup_rows(
    rows: &[Vec<CellValue>],
    tag_offset: usize,
    label: &str,
    width: usize,
) -> Vec<Vec<CellValue>> {
    rows.iter()
        .enumerate()
        .filter(|(idx, row)| {
            *idx == 0
                || row
                    .get(tag_offset)
                    .map(|tag| tag.matches_label(label))
                    .unwrap_or(false)
        })
        .map(|(_, row)| {
            let mut kept: Vec<CellValue> = row.iter().take(width).cloned().collect();
            kept.resize(width, CellValue::Empty);
            kept
        })
        .collect()
}

/// Last row of the region to photograph.
///
/// `probe` holds the probe column's values for consecutive rows starting at
/// `first_probe_row`. The region never ends above `min_last_row`; any
/// filled probe cell further down pushes the end to its row. Zero and
/// `FALSE` count as unfilled.
pub fn picture_last_row(probe: &[CellValue], first_probe_row: u32, min_last_row: u32) -> u32 {
    probe
        .iter()
        .enumerate()
        .filter(|(_, value)| is_filled(value))
        .map(|(idx, _)| first_probe_row + idx as u32)
        .fold(min_last_row, u32::max)
}

fn is_filled(value: &CellValue) -> bool {
    match value {
        CellValue::Number(n) => *n != 0.0,
        CellValue::Boolean(b) => *b,
        other => !other.is_blank(),
    }
}
