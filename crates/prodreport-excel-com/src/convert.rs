//! Cell values between the core model and the wire

use excel_com_protocol::{CellDate, CellError, CellValue as WireValue};
use prodreport_core::cell::serial::{from_excel_serial, to_excel_serial};
use prodreport_core::CellValue;

pub(crate) fn to_wire(value: &CellValue) -> WireValue {
    match value {
        CellValue::Empty => WireValue::Null,
        CellValue::Boolean(b) => WireValue::Bool(*b),
        CellValue::Number(n) => WireValue::Number(*n),
        CellValue::String(s) => WireValue::String(s.clone()),
        CellValue::DateTime(dt) => WireValue::Date(CellDate {
            serial: to_excel_serial(*dt),
        }),
        CellValue::Error(code) => WireValue::Error(CellError { code: code.clone() }),
    }
}

pub(crate) fn from_wire(value: WireValue) -> CellValue {
    match value {
        WireValue::Null => CellValue::Empty,
        WireValue::Bool(b) => CellValue::Boolean(b),
        WireValue::Number(n) => CellValue::Number(n),
        WireValue::String(s) => CellValue::String(s),
        WireValue::Date(d) => match from_excel_serial(d.serial) {
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::Number(d.serial),
        },
        WireValue::Error(e) => CellValue::Error(e.code),
    }
}
