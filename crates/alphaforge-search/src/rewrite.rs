//! Per-dimension candidate generation.
//!
//! A rewrite dimension is one axis of structural change: field substitution,
//! operator substitution, or trailing-parameter substitution. Each generator
//! takes the current expression tree plus one symbol and produces one
//! candidate per legal substitution, rendered back to canonical text.

use crate::error::SearchError;
use crate::rank::RankTable;
use alphaforge_expr::{
    rename_fields, rename_operators, Expr, OpCategory, OperatorRewrite,
};
use std::collections::HashMap;

/// Fixed menu of lookback windows for `ts_` operators.
pub const DAY_MENU: &[&str] = &["25", "63", "125", "250", "500"];

/// Fixed menu of grouping dimensions for `group_` operators.
pub const GROUP_MENU: &[&str] = &["market", "sector", "industry", "subindustry"];

/// One axis of structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Fields,
    Operators,
    Parameter,
}

/// A rewritten variant of a seed expression, with its lineage.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub expression: String,
    /// Which dimension produced this candidate.
    pub dimension: Dimension,
    /// The symbol that was substituted (or whose parameter was changed).
    pub symbol: String,
    /// Generation depth in a recursive expansion; 0 for direct rewrites.
    pub depth: usize,
}

impl Candidate {
    fn new(expression: String, dimension: Dimension, symbol: &str) -> Self {
        Self {
            expression,
            dimension,
            symbol: symbol.to_string(),
            depth: 0,
        }
    }
}

/// Field symbols eligible for substitution: first-encountered order,
/// duplicates collapsed, grouping identifiers (which parse as fields in
/// `group_` call arguments) excluded.
pub fn relevant_fields(expr: &Expr) -> Vec<String> {
    let mut seen = Vec::new();
    for field in expr.symbols().fields {
        if GROUP_MENU.contains(&field.as_str()) || seen.contains(&field) {
            continue;
        }
        seen.push(field);
    }
    seen
}

/// Operator symbols eligible for substitution, multiplicity retained.
pub fn relevant_operators(expr: &Expr) -> Vec<String> {
    expr.symbols().operators
}

/// One candidate per ranked alternative of `field`, each a global rename.
pub fn field_candidates(
    expr: &Expr,
    field: &str,
    table: &RankTable,
) -> Result<Vec<Candidate>, SearchError> {
    let alternatives = table.alternatives(field)?;
    Ok(alternatives
        .into_iter()
        .map(|alt| {
            let map = HashMap::from([(field.to_string(), alt)]);
            Candidate::new(rename_fields(expr, &map).render(), Dimension::Fields, field)
        })
        .collect())
}

/// One candidate per ranked alternative of `operator` (name swap only; the
/// trailing parameter is the [`Dimension::Parameter`] axis).
pub fn operator_candidates(
    expr: &Expr,
    operator: &str,
    table: &RankTable,
) -> Result<Vec<Candidate>, SearchError> {
    let alternatives = table.alternatives(operator)?;
    Ok(alternatives
        .into_iter()
        .map(|alt| {
            let rewrite = OperatorRewrite::new(operator, &alt);
            Candidate::new(
                rename_operators(expr, &rewrite).render(),
                Dimension::Operators,
                operator,
            )
        })
        .collect())
}

/// One candidate per menu entry for a windowed or grouped operator; other
/// operators have no trailing parameter to vary.
pub fn parameter_candidates(expr: &Expr, operator: &str) -> Vec<Candidate> {
    let menu: &[&str] = match OpCategory::of(operator) {
        OpCategory::TimeSeries => DAY_MENU,
        OpCategory::Group => GROUP_MENU,
        OpCategory::Other => return Vec::new(),
    };
    menu.iter()
        .map(|choice| {
            let rewrite = match OpCategory::of(operator) {
                OpCategory::TimeSeries => OperatorRewrite::new(operator, operator).with_day(choice),
                _ => OperatorRewrite::new(operator, operator).with_group(choice),
            };
            Candidate::new(
                rename_operators(expr, &rewrite).render(),
                Dimension::Parameter,
                operator,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::RankRow;
    use alphaforge_expr::parse;

    fn fields_table() -> RankTable {
        RankTable::new(
            "fields",
            vec![
                row("close", "price", 3.0),
                row("open", "price", 2.0),
                row("vwap", "price", 1.0),
            ],
        )
    }

    fn operators_table() -> RankTable {
        RankTable::new(
            "operators",
            vec![row("rank", "cs", 2.0), row("zscore", "cs", 1.0)],
        )
    }

    fn row(symbol: &str, group: &str, rank: f64) -> RankRow {
        RankRow {
            symbol: symbol.to_string(),
            group: group.to_string(),
            rank,
        }
    }

    fn texts(candidates: Vec<Candidate>) -> Vec<String> {
        candidates.into_iter().map(|c| c.expression).collect()
    }

    #[test]
    fn field_candidates_follow_rank_order() {
        let expr = parse("rank(close)").unwrap();
        let candidates = field_candidates(&expr, "close", &fields_table()).unwrap();
        assert_eq!(texts(candidates), vec!["rank(open)", "rank(vwap)"]);
    }

    #[test]
    fn operator_candidates_swap_names() {
        let expr = parse("rank(close)").unwrap();
        let candidates = operator_candidates(&expr, "rank", &operators_table()).unwrap();
        assert_eq!(texts(candidates), vec!["zscore(close)"]);
    }

    #[test]
    fn parameter_candidates_use_day_menu_for_ts_ops() {
        let expr = parse("ts_rank(volume, 10)").unwrap();
        let candidates = parameter_candidates(&expr, "ts_rank");
        assert_eq!(
            texts(candidates),
            vec![
                "ts_rank(volume, 25)",
                "ts_rank(volume, 63)",
                "ts_rank(volume, 125)",
                "ts_rank(volume, 250)",
                "ts_rank(volume, 500)",
            ]
        );
    }

    #[test]
    fn parameter_candidates_use_group_menu_for_group_ops() {
        let expr = parse("group_neutralize(rank(close), sector)").unwrap();
        let candidates = parameter_candidates(&expr, "group_neutralize");
        assert_eq!(
            texts(candidates),
            vec![
                "group_neutralize(rank(close), market)",
                "group_neutralize(rank(close), sector)",
                "group_neutralize(rank(close), industry)",
                "group_neutralize(rank(close), subindustry)",
            ]
        );
    }

    #[test]
    fn plain_operators_have_no_parameter_axis() {
        let expr = parse("rank(close)").unwrap();
        assert!(parameter_candidates(&expr, "rank").is_empty());
    }

    #[test]
    fn relevant_fields_drop_grouping_identifiers_and_duplicates() {
        let expr = parse("group_rank(close / close, industry)").unwrap();
        assert_eq!(relevant_fields(&expr), vec!["close"]);
    }

    #[test]
    fn relevant_operators_keep_multiplicity() {
        let expr = parse("rank(close) - rank(open)").unwrap();
        assert_eq!(relevant_operators(&expr), vec!["rank", "rank"]);
    }
}
