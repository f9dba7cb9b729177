mod common;

use std::path::Path;

use common::{RecordingOffice, CALC, LOOKUP, STAGING};
use pretty_assertions::assert_eq;
use prodreport::{render_labels, PipelineError, RenderSummary};
use prodreport_core::{CellAddress, CellValue, RenderLayout, SheetGrid};

const REPORT: &str = "/srv/porocila/poročanje proizvodnje2025.xlsm";

fn lookup() -> SheetGrid {
    let mut grid = SheetGrid::new(LOOKUP);
    for col in 6..=13 {
        grid.set(1, col, format!("Stolpec {}", col));
    }
    grid.set(1, 27, "Oznaka");
    let tags = ["Linija 1", "Linija 3", "Linija 1", "Linija 3", "Linija 1", "Linija 9"];
    for (i, tag) in tags.iter().enumerate() {
        let row = i as u32 + 2;
        for col in 6..=13 {
            grid.set(row, col, f64::from(row * 100 + col));
        }
        grid.set(row, 27, *tag);
    }
    grid
}

fn staging() -> SheetGrid {
    let mut grid = SheetGrid::new(STAGING);
    for row in 1..=5 {
        for col in 20..=27 {
            grid.set(row, col, "staro");
        }
    }
    // formulas of the picture area that show something
    for row in 9..=12 {
        grid.set(row, 3, f64::from(row));
    }
    grid.set(30, 3, "izven");
    grid
}

fn calculation() -> SheetGrid {
    let mut grid = SheetGrid::new(CALC);
    grid.set(10, 1, "Linija 1");
    grid.set(12, 1, "Linija 3");
    grid.set(46, 1, "Skupaj");
    grid
}

fn office() -> RecordingOffice {
    RecordingOffice::new()
        .with_sheet(lookup())
        .with_sheet(staging())
        .with_sheet(calculation())
        .with_image(CALC, CellAddress::new(11, 1))
        .with_image(CALC, CellAddress::new(50, 1))
        .with_image(STAGING, CellAddress::new(2, 2))
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_pictures_go_below_their_labels() {
    let mut office = office();
    let summary = render_labels(
        &mut office,
        Path::new(REPORT),
        &labels(&["Linija 1", "Linija 7", "Linija 3"]),
        &RenderLayout::default(),
    )
    .unwrap();

    assert_eq!(
        summary,
        RenderSummary {
            removed: 1,
            placed: vec![("Linija 1".into(), 11), ("Linija 3".into(), 13)],
            skipped: vec!["Linija 7".into()],
        }
    );

    let anchors: Vec<_> = office
        .images
        .iter()
        .map(|(sheet, at)| format!("{}!{}", sheet, at))
        .collect();
    assert_eq!(
        anchors,
        vec![
            format!("{}!A50", CALC),
            format!("{}!B2", STAGING),
            format!("{}!A11", CALC),
            format!("{}!A13", CALC),
        ]
    );

    // B1:L12 photographed, 15 points per row
    assert_eq!(office.row_heights[&(CALC.to_string(), 11)], 180.0);
    assert_eq!(office.row_heights[&(CALC.to_string(), 13)], 180.0);
    assert_eq!(office.row_heights[&(CALC.to_string(), 7)], 16.5);
    assert_eq!(office.row_heights[&(CALC.to_string(), 44)], 16.5);
    assert!(!office.row_heights.contains_key(&(CALC.to_string(), 45)));
    assert_eq!(office.row_heights.len(), 38);

    assert_eq!(office.count("picture List2!B1:L12"), 3);
    assert_eq!(office.count("macro sortiraj"), 3);
    assert_eq!(
        office.calls[office.calls.len() - 3..].to_vec(),
        vec!["save", "close", "quit"]
    );
}

#[test]
fn test_staging_holds_only_the_last_label() {
    let mut office = office();
    render_labels(
        &mut office,
        Path::new(REPORT),
        &labels(&["Linija 1", "Linija 3"]),
        &RenderLayout::default(),
    )
    .unwrap();

    let staged = office.sheet(STAGING);
    assert_eq!(staged.get(1, 20), &CellValue::string("Stolpec 6"));
    // rows 3 and 5 of the lookup carry "Linija 3"
    assert_eq!(staged.get(2, 20), &CellValue::Number(306.0));
    assert_eq!(staged.get(3, 27), &CellValue::Number(513.0));
    assert!(staged.get(4, 20).is_empty());
    assert!(staged.get(5, 27).is_empty());

    assert!(office.calls.contains(&"clear List2!T2:AA5".to_string()));
    assert!(office.calls.contains(&"clear List2!T2:AA4".to_string()));
}

#[test]
fn test_no_labels_still_resets_the_zone() {
    let mut office = office();
    let summary = render_labels(
        &mut office,
        Path::new(REPORT),
        &[],
        &RenderLayout::default(),
    )
    .unwrap();

    assert_eq!(summary.removed, 1);
    assert!(summary.placed.is_empty());
    assert_eq!(office.row_heights.len(), 38);
    assert_eq!(office.count("save"), 1);
}

#[test]
fn test_failure_leaves_report_unsaved_and_quits() {
    let mut office = office();
    office.known_macros.clear();

    let err = render_labels(
        &mut office,
        Path::new(REPORT),
        &labels(&["Linija 1"]),
        &RenderLayout::default(),
    )
    .unwrap_err();

    assert!(matches!(err, PipelineError::Automation(_)));
    assert_eq!(office.count("save"), 0);
    assert_eq!(office.count("close"), 1);
    assert_eq!(office.count("quit"), 1);
    assert!(!prodreport_core::OfficeAutomation::is_running(&office));
}
