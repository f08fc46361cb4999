//! Numeric coercion of fused rows.
//!
//! | Column       | Cell fails to coerce |
//! |--------------|----------------------|
//! | market cap   | row dropped          |
//! | anything else| 0.0                  |
//!
//! Market cap is always declared: a table where no row carries it
//! normalizes to nothing. Any other column is declared only if at least one
//! input row carries it. Within a declared column, a row without the cell
//! counts as a failed coercion.

use serde_json::Value;
use tracing::debug;

use crate::data::Column;

use super::fusion::FusedTable;
use super::table::StockTable;

/// Coerce a raw cell to a finite float.
///
/// Accepts JSON numbers and numeric strings (surrounding whitespace and a
/// trailing `%` are tolerated). Placeholders such as `"-"` or `"N/A"`,
/// nulls, booleans and non-finite values yield `None`.
pub fn coerce(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            let s = s.strip_suffix('%').unwrap_or(s).trim_end();
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

/// Normalize a fused table into a [`StockTable`] for screening.
pub fn normalize(fused: &FusedTable) -> StockTable {
    normalize_requiring(fused, Column::MarketCap)
}

/// Normalize with `required` in place of market cap as the column whose
/// failure drops the row.
pub fn normalize_requiring(fused: &FusedTable, required: Column) -> StockTable {
    let declared: Vec<Column> = Column::ALL
        .into_iter()
        .filter(|&c| c == required || fused.has_column(c))
        .collect();

    let mut table = StockTable::new(declared.iter().copied());
    let mut dropped = 0usize;

    for row in fused.rows() {
        let cell = |column: Column| row.values.get(&column).and_then(coerce);

        if cell(required).is_none() {
            dropped += 1;
            continue;
        }

        let values: Vec<(Column, f64)> = declared
            .iter()
            .map(|&c| (c, cell(c).unwrap_or(0.0)))
            .collect();
        table.push(row.code.clone(), row.name.clone(), &values);
    }

    if dropped > 0 {
        debug!(dropped, kept = table.len(), column = %required, "Dropped rows without a usable value");
    }

    table
}
