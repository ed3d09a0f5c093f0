//! # gridcalc-core
//!
//! Grid-side data structures for the gridcalc formula engine.
//!
//! This crate provides:
//! - [`CellAddress`] and [`CellRange`] - zero-based cell addressing with A1 parsing
//! - [`CellValue`] - the content stored in a cell (including formula text)
//! - [`Workbook`], [`Worksheet`] - a small in-memory grid with named sheets
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 42.0).unwrap();
//! sheet.set_cell_formula("A2", "=A1*2").unwrap();
//!
//! assert!(sheet.get_value_at(1, 0).is_formula());
//! ```

pub mod address;
pub mod error;
pub mod value;
pub mod workbook;
pub mod worksheet;

pub use address::{CellAddress, CellRange};
pub use error::{Error, Result};
pub use value::CellValue;
pub use workbook::Workbook;
pub use worksheet::{CellData, Worksheet};

/// Default number of rows in a new worksheet
pub const DEFAULT_ROWS: usize = 100;

/// Default number of columns in a new worksheet
pub const DEFAULT_COLS: usize = 26;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
