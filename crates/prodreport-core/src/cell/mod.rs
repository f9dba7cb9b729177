//! Cell-related types

mod address;
pub mod serial;
mod value;

pub use address::{CellAddress, CellRange};
pub use value::CellValue;
