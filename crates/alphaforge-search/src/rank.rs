//! Equivalence tables: per-symbol substitution groups ranked by historical
//! performance.
//!
//! Two static tables exist per process, one for fields and one for operators.
//! Each row is `{symbol, group, rank}`; every symbol belongs to exactly one
//! group per table. Tables are loaded once at startup and read-only for the
//! process lifetime.

use crate::error::SearchError;
use serde::Deserialize;
use std::path::Path;

/// One equivalence-table row.
#[derive(Debug, Clone, Deserialize)]
pub struct RankRow {
    /// Field tables use an `id` header, operator tables `name`.
    #[serde(alias = "id", alias = "name")]
    pub symbol: String,
    pub group: String,
    /// Historical performance rank of this symbol across evaluated alphas.
    pub rank: f64,
}

/// Read-only rank table for one symbol kind.
#[derive(Debug, Clone)]
pub struct RankTable {
    kind: &'static str,
    rows: Vec<RankRow>,
}

impl RankTable {
    pub fn new(kind: &'static str, rows: Vec<RankRow>) -> Self {
        Self { kind, rows }
    }

    /// Load a table from a CSV file with `id|name,group,rank` columns.
    /// Extra columns are ignored.
    pub fn load_csv(kind: &'static str, path: &Path) -> Result<Self, SearchError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.deserialize::<RankRow>() {
            rows.push(record?);
        }
        tracing::debug!(kind, rows = rows.len(), "loaded rank table");
        Ok(Self::new(kind, rows))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.rows.iter().any(|r| r.symbol == symbol)
    }

    /// Every other member of `symbol`'s group, ordered by descending rank.
    ///
    /// The symbol itself is excluded; an absent symbol is
    /// [`SearchError::UnknownSymbol`].
    pub fn alternatives(&self, symbol: &str) -> Result<Vec<String>, SearchError> {
        let group = self
            .rows
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| r.group.clone())
            .ok_or_else(|| SearchError::UnknownSymbol {
                symbol: symbol.to_string(),
                table: self.kind,
            })?;

        let mut members: Vec<&RankRow> = self
            .rows
            .iter()
            .filter(|r| r.group == group && r.symbol != symbol)
            .collect();
        members.sort_by(|a, b| b.rank.total_cmp(&a.rank));
        Ok(members.into_iter().map(|r| r.symbol.clone()).collect())
    }
}

/// The pair of process-wide tables driving field and operator substitution.
#[derive(Debug, Clone)]
pub struct RankTables {
    pub fields: RankTable,
    pub operators: RankTable,
}

impl RankTables {
    pub fn load(fields_path: &Path, operators_path: &Path) -> Result<Self, SearchError> {
        Ok(Self {
            fields: RankTable::load_csv("fields", fields_path)?,
            operators: RankTable::load_csv("operators", operators_path)?,
        })
    }
}
