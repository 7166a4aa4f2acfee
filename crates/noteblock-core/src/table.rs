use serde::{Deserialize, Serialize};

/// Row-major table grid. `cells.len() == rows * cols` holds for every value
/// this module hands out; every operation returns a whole new grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableRepr", rename_all = "camelCase")]
pub struct TableContent {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<String>,
    pub header_row: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableRepr {
    #[serde(default = "one")]
    rows: usize,
    #[serde(default = "one")]
    cols: usize,
    #[serde(default)]
    cells: Vec<String>,
    #[serde(default)]
    header_row: bool,
}

/// Upper bound on `rows * cols`; grids beyond it are refused on load and
/// cannot be grown into.
pub const MAX_CELLS: usize = 10_000;

fn one() -> usize {
    1
}

fn cell_count(rows: usize, cols: usize) -> Option<usize> {
    rows.checked_mul(cols).filter(|count| *count <= MAX_CELLS)
}

impl TryFrom<TableRepr> for TableContent {
    type Error = String;

    fn try_from(repr: TableRepr) -> Result<Self, Self::Error> {
        let rows = repr.rows.max(1);
        let cols = repr.cols.max(1);
        let count = cell_count(rows, cols)
            .ok_or_else(|| format!("table of {rows}x{cols} exceeds {MAX_CELLS} cells"))?;
        let mut cells = repr.cells;
        cells.resize(count, String::new());
        Ok(Self {
            rows,
            cols,
            cells,
            header_row: repr.header_row,
        })
    }
}

impl Default for TableContent {
    fn default() -> Self {
        Self::new(2, 2, true)
    }
}

impl TableContent {
    /// Empty grid; dimensions are clamped so the cell count stays within
    /// [`MAX_CELLS`].
    pub fn new(rows: usize, cols: usize, header_row: bool) -> Self {
        let cols = cols.clamp(1, MAX_CELLS);
        let rows = rows.clamp(1, MAX_CELLS / cols);
        Self {
            rows,
            cols,
            cells: vec![String::new(); rows * cols],
            header_row,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.rows >= 1 && self.cols >= 1 && self.cells.len() == self.rows * self.cols
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col).map(String::as_str)
    }

    pub fn row(&self, row: usize) -> Option<&[String]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        self.cells.get(start..start + self.cols)
    }

    pub fn with_cell(&self, row: usize, col: usize, text: impl Into<String>) -> Option<Self> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let mut next = self.clone();
        next.cells[row * self.cols + col] = text.into();
        Some(next)
    }

    /// Replaces all cells; rejected unless the length matches the grid.
    pub fn with_cells(&self, cells: Vec<String>) -> Option<Self> {
        if cells.len() != self.rows * self.cols {
            return None;
        }
        Some(Self {
            cells,
            ..self.clone()
        })
    }

    /// Inserts an empty row before `at` (clamped to the end). `None` once the
    /// grid would exceed [`MAX_CELLS`].
    pub fn with_row_inserted(&self, at: usize) -> Option<Self> {
        cell_count(self.rows + 1, self.cols)?;
        let at = at.min(self.rows);
        let mut cells = Vec::with_capacity((self.rows + 1) * self.cols);
        for row in 0..=self.rows {
            if row == at {
                cells.extend(std::iter::repeat(String::new()).take(self.cols));
            }
            if row < self.rows {
                let start = row * self.cols;
                cells.extend_from_slice(&self.cells[start..start + self.cols]);
            }
        }
        Some(Self {
            rows: self.rows + 1,
            cols: self.cols,
            cells,
            header_row: self.header_row,
        })
    }

    /// Inserts an empty column before `at` (clamped to the end). `None` once
    /// the grid would exceed [`MAX_CELLS`].
    pub fn with_column_inserted(&self, at: usize) -> Option<Self> {
        cell_count(self.rows, self.cols + 1)?;
        let at = at.min(self.cols);
        let cols = self.cols + 1;
        let mut cells = Vec::with_capacity(self.rows * cols);
        for row in 0..self.rows {
            for col in 0..cols {
                if col == at {
                    cells.push(String::new());
                } else {
                    let source = if col < at { col } else { col - 1 };
                    cells.push(self.cells[row * self.cols + source].clone());
                }
            }
        }
        Some(Self {
            rows: self.rows,
            cols,
            cells,
            header_row: self.header_row,
        })
    }

    /// Removes row `at`. `None` when it is the last row or out of range.
    pub fn without_row(&self, at: usize) -> Option<Self> {
        if self.rows <= 1 || at >= self.rows {
            return None;
        }
        let cells = self
            .cells
            .chunks(self.cols)
            .enumerate()
            .filter(|(row, _)| *row != at)
            .flat_map(|(_, chunk)| chunk.iter().cloned())
            .collect();
        Some(Self {
            rows: self.rows - 1,
            cols: self.cols,
            cells,
            header_row: self.header_row,
        })
    }

    /// Removes column `at`. `None` when it is the last column or out of range.
    pub fn without_column(&self, at: usize) -> Option<Self> {
        if self.cols <= 1 || at >= self.cols {
            return None;
        }
        let cells = self
            .cells
            .iter()
            .enumerate()
            .filter(|(ix, _)| ix % self.cols != at)
            .map(|(_, cell)| cell.clone())
            .collect();
        Some(Self {
            rows: self.rows,
            cols: self.cols - 1,
            cells,
            header_row: self.header_row,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{TableContent, MAX_CELLS};

    fn grid(rows: usize, cols: usize) -> TableContent {
        let mut table = TableContent::new(rows, cols, false);
        for (ix, cell) in table.cells.iter_mut().enumerate() {
            *cell = format!("{}{}", ix / cols, ix % cols);
        }
        table
    }

    #[test]
    fn add_row_at_end_keeps_existing_cells() {
        let table = grid(2, 2).with_row_inserted(2).expect("row");
        assert_eq!(table.rows, 3);
        assert_eq!(table.cells, vec!["00", "01", "10", "11", "", ""]);
    }

    #[test]
    fn add_row_in_middle_shifts_later_rows() {
        let table = grid(2, 2).with_row_inserted(1).expect("row");
        assert_eq!(table.cells, vec!["00", "01", "", "", "10", "11"]);
    }

    #[test]
    fn add_column_places_values_at_new_offsets() {
        let table = grid(2, 2).with_column_inserted(2).expect("column");
        assert_eq!(table.cols, 3);
        assert_eq!(table.cells, vec!["00", "01", "", "10", "11", ""]);
        assert_eq!(table.cell(1, 1), Some("11"));
    }

    #[test]
    fn add_column_at_front() {
        let table = grid(2, 2).with_column_inserted(0).expect("column");
        assert_eq!(table.cells, vec!["", "00", "01", "", "10", "11"]);
    }

    #[test]
    fn delete_row_and_column_keep_remaining_values() {
        let table = grid(3, 3);
        let table = table.without_row(1).expect("delete row");
        assert_eq!(table.cells, vec!["00", "01", "02", "20", "21", "22"]);
        let table = table.without_column(0).expect("delete column");
        assert_eq!(table.cells, vec!["01", "02", "21", "22"]);
        assert!(table.is_consistent());
    }

    #[test]
    fn last_row_and_column_cannot_be_deleted() {
        let table = grid(1, 3);
        assert!(table.without_row(0).is_none());
        let table = grid(3, 1);
        assert!(table.without_column(0).is_none());
    }

    #[test]
    fn interleaved_operations_stay_consistent() {
        let mut table = TableContent::default();
        for step in 0..20 {
            table = match step % 4 {
                0 => table.with_row_inserted(step).expect("row"),
                1 => table.with_column_inserted(0).expect("column"),
                2 => table.without_row(0).unwrap_or(table),
                _ => table.without_column(step).unwrap_or(table),
            };
            assert!(table.is_consistent(), "step {step}");
        }
    }

    #[test]
    fn deserialize_repairs_cell_count() {
        let table: TableContent =
            serde_json::from_str(r#"{"rows":2,"cols":2,"cells":["a"],"headerRow":true}"#)
                .expect("parse");
        assert!(table.is_consistent());
        assert_eq!(table.cell(0, 0), Some("a"));
        assert_eq!(table.cell(1, 1), Some(""));
    }

    #[test]
    fn oversized_stored_table_is_rejected() {
        let overflow = r#"{"rows":4294967296,"cols":4294967296,"cells":[]}"#;
        assert!(serde_json::from_str::<TableContent>(overflow).is_err());
        let huge = r#"{"rows":1000000000,"cols":2,"cells":[]}"#;
        assert!(serde_json::from_str::<TableContent>(huge).is_err());
    }

    #[test]
    fn growth_stops_at_cell_cap() {
        let table = TableContent::new(MAX_CELLS, 1, false);
        assert_eq!(table.cells.len(), MAX_CELLS);
        assert!(table.with_row_inserted(0).is_none());
        assert!(table.with_column_inserted(0).is_none());
        assert!(TableContent::new(usize::MAX, usize::MAX, false).is_consistent());
    }
}
