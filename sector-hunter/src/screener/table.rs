//! Columnar stock table, boolean masks and cohort views.
//!
//! A [`StockTable`] is the normalized form every classifier and signal reads.
//! Each declared column holds exactly one finite value per row; a column that
//! was never declared is absent, which predicates treat differently from a
//! column of zeros.

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::data::Column;

// ============================================================================
// Stock Table
// ============================================================================

/// Normalized per-sector table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockTable {
    codes: Vec<String>,
    names: Vec<String>,
    columns: BTreeMap<Column, Vec<f64>>,
}

impl StockTable {
    /// Create an empty table declaring `columns`.
    pub fn new(columns: impl IntoIterator<Item = Column>) -> Self {
        Self {
            codes: Vec::new(),
            names: Vec::new(),
            columns: columns.into_iter().map(|c| (c, Vec::new())).collect(),
        }
    }

    /// Append a row.
    ///
    /// Values for undeclared columns are ignored; declared columns missing
    /// from `values` receive 0.0.
    pub fn push(&mut self, code: impl Into<String>, name: impl Into<String>, values: &[(Column, f64)]) {
        self.codes.push(code.into());
        self.names.push(name.into());

        for (column, cells) in self.columns.iter_mut() {
            let value = values
                .iter()
                .rev()
                .find(|(c, _)| c == column)
                .map(|(_, v)| *v)
                .unwrap_or(0.0);
            cells.push(value);
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Values of a column, or `None` if the column is absent.
    pub fn column(&self, column: Column) -> Option<&[f64]> {
        self.columns.get(&column).map(Vec::as_slice)
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains_key(&column)
    }

    /// Declared columns in canonical order.
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.keys().copied()
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Owned copy of row `index`.
    pub fn row(&self, index: usize) -> Option<StockRow> {
        let code = self.codes.get(index)?;
        let values = self
            .columns
            .iter()
            .filter_map(|(column, cells)| cells.get(index).map(|v| (*column, *v)))
            .collect();

        Some(StockRow {
            code: code.clone(),
            name: self.names[index].clone(),
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = StockRow> + '_ {
        (0..self.len()).filter_map(|i| self.row(i))
    }

    /// New table with the given rows, in the given order. Out-of-range
    /// indices are skipped.
    pub fn select(&self, indices: &[usize]) -> StockTable {
        let indices: Vec<usize> = indices.iter().copied().filter(|&i| i < self.len()).collect();

        StockTable {
            codes: indices.iter().map(|&i| self.codes[i].clone()).collect(),
            names: indices.iter().map(|&i| self.names[i].clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|(column, cells)| (*column, indices.iter().map(|&i| cells[i]).collect()))
                .collect(),
        }
    }

    /// New table with the rows where `mask` is true.
    pub fn filter(&self, mask: &Mask) -> StockTable {
        self.select(&mask.indices())
    }

    /// Mask of `predicate` over one column; all-false if the column is absent.
    pub fn column_mask(&self, column: Column, predicate: impl Fn(f64) -> bool) -> Mask {
        match self.column(column) {
            Some(cells) => cells.iter().map(|&v| predicate(v)).collect(),
            None => Mask::none(self.len()),
        }
    }
}

impl Serialize for StockTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for row in self.rows() {
            seq.serialize_element(&row)?;
        }
        seq.end()
    }
}

/// One materialised table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockRow {
    pub code: String,
    pub name: String,
    #[serde(flatten)]
    pub values: BTreeMap<Column, f64>,
}

impl StockRow {
    pub fn get(&self, column: Column) -> Option<f64> {
        self.values.get(&column).copied()
    }
}

// ============================================================================
// Mask
// ============================================================================

/// One boolean per table row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mask(Vec<bool>);

impl Mask {
    /// All rows selected.
    pub fn all(len: usize) -> Self {
        Self(vec![true; len])
    }

    /// No rows selected.
    pub fn none(len: usize) -> Self {
        Self(vec![false; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    /// Element-wise AND. Positions beyond the shorter mask are false.
    pub fn and(&self, other: &Mask) -> Mask {
        let len = self.len().max(other.len());
        (0..len).map(|i| self.get(i) && other.get(i)).collect()
    }

    /// Number of selected rows.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }

    /// Selected row indices, ascending.
    pub fn indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
            .collect()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

impl From<Vec<bool>> for Mask {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

impl FromIterator<bool> for Mask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// Cohort
// ============================================================================

/// A filtered view over a table.
///
/// Holds row indices only; nothing is copied until [`Cohort::to_table`].
#[derive(Debug, Clone)]
pub struct Cohort<'a> {
    table: &'a StockTable,
    indices: Vec<usize>,
}

impl<'a> Cohort<'a> {
    /// View over every row.
    pub fn all(table: &'a StockTable) -> Self {
        Self {
            table,
            indices: (0..table.len()).collect(),
        }
    }

    /// View over the given rows, in the given order.
    pub fn from_indices(table: &'a StockTable, indices: Vec<usize>) -> Self {
        let indices = indices.into_iter().filter(|&i| i < table.len()).collect();
        Self { table, indices }
    }

    pub fn from_mask(table: &'a StockTable, mask: &Mask) -> Self {
        Self::from_indices(table, mask.indices())
    }

    pub fn table(&self) -> &'a StockTable {
        self.table
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = StockRow> + '_ {
        self.indices.iter().filter_map(|&i| self.table.row(i))
    }

    /// Codes of the member rows, in view order.
    pub fn codes(&self) -> Vec<&'a str> {
        let table = self.table;
        self.indices.iter().map(|&i| table.codes[i].as_str()).collect()
    }

    /// Materialise into an owned table.
    pub fn to_table(&self) -> StockTable {
        self.table.select(&self.indices)
    }

    /// Membership as a mask over the underlying table.
    pub fn mask(&self) -> Mask {
        let mut bits = vec![false; self.table.len()];
        for &i in &self.indices {
            bits[i] = true;
        }
        Mask(bits)
    }

    /// Rows in both views, keeping this view's order.
    pub fn intersect(&self, mask: &Mask) -> Cohort<'a> {
        Cohort {
            table: self.table,
            indices: self.indices.iter().copied().filter(|&i| mask.get(i)).collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StockTable {
        let mut table = StockTable::new([Column::ChangePct, Column::MarketCap]);
        table.push("000001", "A", &[(Column::ChangePct, 1.0), (Column::MarketCap, 30.0)]);
        table.push("000002", "B", &[(Column::ChangePct, 5.0), (Column::MarketCap, 10.0)]);
        table.push("000003", "C", &[(Column::ChangePct, 9.9)]);
        table
    }

    #[test]
    fn test_push_fills_declared_columns() {
        let table = sample();
        assert_eq!(table.len(), 3);
        assert_eq!(table.column(Column::MarketCap), Some(&[30.0, 10.0, 0.0][..]));
        assert!(table.column(Column::VolumeRatio).is_none());
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let table = sample();
        let picked = table.select(&[2, 0, 7]);
        assert_eq!(picked.codes(), &["000003".to_string(), "000001".to_string()]);
        assert_eq!(picked.column(Column::ChangePct), Some(&[9.9, 1.0][..]));
    }

    #[test]
    fn test_column_mask_absent_is_all_false() {
        let table = sample();
        let mask = table.column_mask(Column::Amplitude, |_| true);
        assert_eq!(mask, Mask::none(3));
    }

    #[test]
    fn test_mask_and_count() {
        let a = Mask::from(vec![true, true, false]);
        let b = Mask::from(vec![false, true, true]);
        let both = a.and(&b);
        assert_eq!(both.indices(), vec![1]);
        assert_eq!(both.count(), 1);
    }

    #[test]
    fn test_cohort_views() {
        let table = sample();
        let cohort = Cohort::from_indices(&table, vec![2, 1]);

        assert_eq!(cohort.codes(), vec!["000003", "000002"]);
        assert_eq!(cohort.mask().as_slice(), &[false, true, true]);

        let narrowed = cohort.intersect(&Mask::from(vec![true, true, false]));
        assert_eq!(narrowed.codes(), vec!["000002"]);
        assert_eq!(narrowed.to_table().len(), 1);
    }

    #[test]
    fn test_table_serializes_as_rows() {
        let table = sample().select(&[1]);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"code": "000002", "name": "B", "change_pct": 5.0, "market_cap": 10.0}])
        );
    }
}
