//! The grid the engine evaluates against
//!
//! [`GridHost`] is everything the engine needs from a spreadsheet: its sheets,
//! their dimensions and visibility flags, the stored content of each cell, and
//! a formatter for display strings. [`Workbook`] implements it directly.

use crate::format;
use crate::value::FormulaValue;
use gridcalc_core::{CellValue, Workbook};

/// Host-grid boundary
///
/// Sheet indices are zero-based positions in the host's sheet collection;
/// rows and columns are zero-based as well.
pub trait GridHost {
    fn sheet_count(&self) -> usize;

    fn sheet_name(&self, sheet: usize) -> Option<&str>;

    /// Index of the sheet with exactly this (case-sensitive) name
    fn sheet_index(&self, name: &str) -> Option<usize> {
        (0..self.sheet_count()).find(|&i| self.sheet_name(i) == Some(name))
    }

    /// Sheet that unqualified references resolve against
    fn selected_sheet(&self) -> usize;

    fn row_count(&self, sheet: usize) -> usize;

    fn column_count(&self, sheet: usize) -> usize;

    /// Stored content of a cell; formula cells return their source text
    fn cell_content(&self, sheet: usize, row: usize, col: usize) -> CellValue;

    /// Display format of a cell, if it has one
    fn cell_format(&self, _sheet: usize, _row: usize, _col: usize) -> Option<&str> {
        None
    }

    fn is_row_hidden(&self, _sheet: usize, _row: usize) -> bool {
        false
    }

    fn is_column_hidden(&self, _sheet: usize, _col: usize) -> bool {
        false
    }

    /// Render a value with a display format; see [`format::format_value`]
    fn format_value(&self, value: &FormulaValue, format: &str) -> String {
        format::format_value(value, format)
    }

    /// Called for identifiers that are neither functions nor cell references
    ///
    /// Returning a value substitutes it for the call; `None` makes the formula
    /// fail with an unknown function error.
    fn unknown_function(&self, _name: &str, _args: &[FormulaValue]) -> Option<FormulaValue> {
        None
    }
}

impl GridHost for Workbook {
    fn sheet_count(&self) -> usize {
        Workbook::sheet_count(self)
    }

    fn sheet_name(&self, sheet: usize) -> Option<&str> {
        self.worksheet(sheet).map(|ws| ws.name())
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        Workbook::sheet_index(self, name)
    }

    fn selected_sheet(&self) -> usize {
        Workbook::selected_sheet(self)
    }

    fn row_count(&self, sheet: usize) -> usize {
        self.worksheet(sheet).map_or(0, |ws| ws.row_count())
    }

    fn column_count(&self, sheet: usize) -> usize {
        self.worksheet(sheet).map_or(0, |ws| ws.column_count())
    }

    fn cell_content(&self, sheet: usize, row: usize, col: usize) -> CellValue {
        self.worksheet(sheet)
            .map(|ws| ws.get_value_at(row, col))
            .unwrap_or_default()
    }

    fn cell_format(&self, sheet: usize, row: usize, col: usize) -> Option<&str> {
        self.worksheet(sheet)?.cell_format_at(row, col)
    }

    fn is_row_hidden(&self, sheet: usize, row: usize) -> bool {
        self.worksheet(sheet).is_some_and(|ws| ws.is_row_hidden(row))
    }

    fn is_column_hidden(&self, sheet: usize, col: usize) -> bool {
        self.worksheet(sheet).is_some_and(|ws| ws.is_column_hidden(col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_workbook_host() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        let sheet = wb.worksheet_mut(1).unwrap();
        sheet.set_cell_value("B2", 5.0).unwrap();
        sheet.set_cell_format("B2", "n2").unwrap();
        sheet.set_column_hidden(3, true);

        let host: &dyn GridHost = &wb;
        assert_eq!(host.sheet_count(), 2);
        assert_eq!(host.sheet_index("Data"), Some(1));
        assert_eq!(host.sheet_index("data"), None);
        assert_eq!(host.sheet_name(0), Some("Sheet1"));
        assert_eq!(host.cell_content(1, 1, 1), CellValue::Number(5.0));
        assert_eq!(host.cell_content(7, 1, 1), CellValue::Empty);
        assert_eq!(host.cell_format(1, 1, 1), Some("n2"));
        assert!(host.is_column_hidden(1, 3));
        assert!(!host.is_row_hidden(1, 3));
        assert_eq!(host.unknown_function("FOO", &[]), None);
    }

    struct Single;

    impl GridHost for Single {
        fn sheet_count(&self) -> usize {
            1
        }
        fn sheet_name(&self, sheet: usize) -> Option<&str> {
            (sheet == 0).then_some("Only")
        }
        fn selected_sheet(&self) -> usize {
            0
        }
        fn row_count(&self, _sheet: usize) -> usize {
            10
        }
        fn column_count(&self, _sheet: usize) -> usize {
            10
        }
        fn cell_content(&self, _sheet: usize, row: usize, col: usize) -> CellValue {
            CellValue::Number((row * 10 + col) as f64)
        }
    }

    #[test]
    fn test_default_methods() {
        let host = Single;
        assert_eq!(host.sheet_index("Only"), Some(0));
        assert_eq!(host.sheet_index("Other"), None);
        assert_eq!(host.cell_format(0, 0, 0), None);
        assert_eq!(host.format_value(&FormulaValue::Number(0.5), "p0"), "50%");
    }
}
