//! Worksheet type

use ahash::AHashMap;
use std::collections::BTreeSet;

use crate::address::{CellAddress, CellRange};
use crate::error::Result;
use crate::value::CellValue;
use crate::{DEFAULT_COLS, DEFAULT_ROWS};

/// Stored content of a single cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellData {
    /// The cell content
    pub value: CellValue,
    /// Display format hint (e.g. "n2", "d")
    pub format: Option<String>,
}

/// A worksheet (single sheet in a workbook)
///
/// The grid has explicit dimensions; writing outside them grows the sheet.
#[derive(Debug)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Cell storage, keyed by (row, col)
    cells: AHashMap<(usize, usize), CellData>,
    /// Number of rows in the grid
    row_count: usize,
    /// Number of columns in the grid
    col_count: usize,
    hidden_rows: BTreeSet<usize>,
    hidden_cols: BTreeSet<usize>,
}

impl Worksheet {
    /// Create a new worksheet with the given name and default dimensions
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_size(name, DEFAULT_ROWS, DEFAULT_COLS)
    }

    /// Create a new worksheet with explicit dimensions
    pub fn with_size<S: Into<String>>(name: S, rows: usize, cols: usize) -> Self {
        Self {
            name: name.into(),
            cells: AHashMap::new(),
            row_count: rows,
            col_count: cols,
            hidden_rows: BTreeSet::new(),
            hidden_cols: BTreeSet::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sheet name
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    /// Number of rows in the grid
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Number of columns in the grid
    pub fn column_count(&self) -> usize {
        self.col_count
    }

    /// Resize the grid. Cells outside the new bounds are dropped.
    pub fn set_size(&mut self, rows: usize, cols: usize) {
        self.row_count = rows;
        self.col_count = cols;
        self.cells.retain(|&(r, c), _| r < rows && c < cols);
    }

    // === Cell Access ===

    /// Get cell value by indices
    pub fn get_value_at(&self, row: usize, col: usize) -> CellValue {
        self.cells
            .get(&(row, col))
            .map(|c| c.value.clone())
            .unwrap_or(CellValue::Empty)
    }

    /// Get cell value by address string (e.g., "A1")
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get a cell's display format
    pub fn cell_format_at(&self, row: usize, col: usize) -> Option<&str> {
        self.cells
            .get(&(row, col))
            .and_then(|c| c.format.as_deref())
    }

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value);
        Ok(())
    }

    /// Set a cell value by indices
    pub fn set_cell_value_at<V: Into<CellValue>>(&mut self, row: usize, col: usize, value: V) {
        self.grow_to(row, col);
        self.cells.entry((row, col)).or_default().value = value.into();
    }

    /// Set a cell formula by address string
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        self.set_cell_value(address, CellValue::formula(formula))
    }

    /// Set a cell's display format by address string
    pub fn set_cell_format(&mut self, address: &str, format: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.grow_to(addr.row, addr.col);
        self.cells.entry((addr.row, addr.col)).or_default().format = Some(format.to_string());
        Ok(())
    }

    /// Fill every cell of a range with values taken row by row
    pub fn fill_range<V: Into<CellValue>, I: IntoIterator<Item = V>>(
        &mut self,
        range: &CellRange,
        values: I,
    ) {
        let cells: Vec<_> = range.cells().collect();
        for ((row, col), value) in cells.into_iter().zip(values) {
            self.set_cell_value_at(row, col, value);
        }
    }

    /// Clear a cell
    pub fn clear_cell_at(&mut self, row: usize, col: usize) {
        self.cells.remove(&(row, col));
    }

    // === Visibility ===

    /// Check if a row is hidden
    pub fn is_row_hidden(&self, row: usize) -> bool {
        self.hidden_rows.contains(&row)
    }

    /// Hide or show a row
    pub fn set_row_hidden(&mut self, row: usize, hidden: bool) {
        if hidden {
            self.hidden_rows.insert(row);
        } else {
            self.hidden_rows.remove(&row);
        }
    }

    /// Check if a column is hidden
    pub fn is_column_hidden(&self, col: usize) -> bool {
        self.hidden_cols.contains(&col)
    }

    /// Hide or show a column
    pub fn set_column_hidden(&mut self, col: usize, hidden: bool) {
        if hidden {
            self.hidden_cols.insert(col);
        } else {
            self.hidden_cols.remove(&col);
        }
    }

    fn grow_to(&mut self, row: usize, col: usize) {
        self.row_count = self.row_count.max(row + 1);
        self.col_count = self.col_count.max(col + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_and_get() {
        let mut sheet = Worksheet::with_size("Data", 2, 2);
        sheet.set_cell_value("A1", 1.0).unwrap();
        sheet.set_cell_formula("B1", "=A1+1").unwrap();
        sheet.set_cell_format("B1", "n2").unwrap();

        assert_eq!(sheet.get_value("A1").unwrap(), CellValue::Number(1.0));
        assert_eq!(sheet.get_value_at(0, 1), CellValue::formula("=A1+1"));
        assert_eq!(sheet.cell_format_at(0, 1), Some("n2"));
        assert_eq!(sheet.get_value_at(1, 1), CellValue::Empty);
    }

    #[test]
    fn test_writes_grow_grid() {
        let mut sheet = Worksheet::with_size("Data", 2, 2);
        sheet.set_cell_value("E10", "x").unwrap();
        assert_eq!(sheet.row_count(), 10);
        assert_eq!(sheet.column_count(), 5);

        sheet.set_size(3, 3);
        assert_eq!(sheet.get_value_at(9, 4), CellValue::Empty);
    }

    #[test]
    fn test_fill_range_and_hidden() {
        let mut sheet = Worksheet::new("Data");
        sheet.fill_range(&CellRange::parse("A1:B2").unwrap(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(sheet.get_value_at(1, 0), CellValue::Number(3.0));

        sheet.set_row_hidden(1, true);
        sheet.set_column_hidden(0, true);
        assert!(sheet.is_row_hidden(1));
        assert!(sheet.is_column_hidden(0));
        sheet.set_row_hidden(1, false);
        assert!(!sheet.is_row_hidden(1));
    }
}
