//! Joins sector membership against the market snapshot.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::data::{Column, ConstituentSet, MarketSnapshot};

/// One joined row, cells still raw.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedRow {
    pub code: String,
    pub name: String,
    pub values: BTreeMap<Column, Value>,
}

/// Per-sector inner join of constituents and snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusedTable {
    rows: Vec<FusedRow>,
}

impl FusedTable {
    /// Every snapshot quote, in code order, without a sector column.
    pub fn from_snapshot(snapshot: &MarketSnapshot) -> Self {
        let rows = snapshot
            .sorted_quotes()
            .into_iter()
            .map(|quote| FusedRow {
                code: quote.code.clone(),
                name: quote.name.clone(),
                values: quote.values.clone(),
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[FusedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether any row carries `column`.
    pub fn has_column(&self, column: Column) -> bool {
        self.rows.iter().any(|r| r.values.contains_key(&column))
    }
}

/// Inner-join `constituents` against `snapshot`, broadcasting `sector_gain`
/// as [`Column::SectorPctChg`].
///
/// Codes without a snapshot quote are dropped. Unknown constituents
/// (`None`), an empty set or an empty snapshot all give an empty table.
pub fn fuse(
    constituents: Option<&ConstituentSet>,
    snapshot: &MarketSnapshot,
    sector_gain: f64,
) -> FusedTable {
    let Some(constituents) = constituents else {
        return FusedTable::default();
    };

    let rows = constituents
        .iter()
        .filter_map(|code| snapshot.get(code))
        .map(|quote| {
            let mut values = quote.values.clone();
            values.insert(Column::SectorPctChg, Value::from(sector_gain));
            FusedRow {
                code: quote.code.clone(),
                name: quote.name.clone(),
                values,
            }
        })
        .collect();

    FusedTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SpotQuote;

    fn snapshot() -> MarketSnapshot {
        [SpotQuote::new("000001", "平安银行").with(Column::ChangePct, 1.2)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_inner_join_broadcasts_sector_gain() {
        let members: ConstituentSet = ["000001", "000002"].into_iter().collect();
        let fused = fuse(Some(&members), &snapshot(), 4.5);

        assert_eq!(fused.len(), 1);
        let row = &fused.rows()[0];
        assert_eq!(row.code, "000001");
        assert_eq!(row.values[&Column::SectorPctChg], Value::from(4.5));
        assert_eq!(row.values[&Column::ChangePct], Value::from(1.2));
    }

    #[test]
    fn test_unknown_or_empty_inputs_give_empty_table() {
        let members: ConstituentSet = ["000001"].into_iter().collect();

        assert!(fuse(None, &snapshot(), 1.0).is_empty());
        assert!(fuse(Some(&ConstituentSet::new()), &snapshot(), 1.0).is_empty());
        assert!(fuse(Some(&members), &MarketSnapshot::new(), 1.0).is_empty());
    }

    #[test]
    fn test_from_snapshot_has_no_sector_column() {
        let table = FusedTable::from_snapshot(&snapshot());
        assert_eq!(table.len(), 1);
        assert!(!table.has_column(Column::SectorPctChg));
        assert!(table.has_column(Column::ChangePct));
    }
}
