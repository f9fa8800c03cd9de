//! Exhaustive multi-dimension expansion.
//!
//! Enumerates every candidate reachable from a seed by applying the requested
//! dimensions in any interleaving: each dimension's direct rewrites are
//! emitted, then each rewrite is expanded again along the remaining
//! dimensions. The traversal runs on an explicit agenda rather than the call
//! stack, so deep dimension lists cannot overflow.
//!
//! Duplicates are retained on purpose: different rewrite paths can reach the
//! same expression, and callers that want a duplicate-free list apply
//! [`dedup_candidates`] afterwards. Candidate count grows multiplicatively
//! with table size and dimension count, so unattended runs should go through
//! [`complete_search_bounded`].

use crate::error::SearchError;
use crate::rank::RankTables;
use crate::rewrite::{
    field_candidates, operator_candidates, parameter_candidates, relevant_fields,
    relevant_operators, Candidate, Dimension,
};
use alphaforge_expr::{parse, Expr};

/// Hard candidate cap for [`complete_search_bounded`].
pub const COMPLETE_SEARCH_CAP: usize = 500;

enum Task {
    Emit(Vec<Candidate>),
    Expand {
        expression: String,
        dimensions: Vec<Dimension>,
        depth: usize,
    },
}

/// Every candidate reachable from `seed` along `dimensions`, in generation
/// order, duplicates retained.
pub fn complete_search(
    seed: &str,
    dimensions: &[Dimension],
    tables: &RankTables,
) -> Result<Vec<Candidate>, SearchError> {
    run(seed, dimensions, tables, None)
}

/// [`complete_search`] truncated at [`COMPLETE_SEARCH_CAP`] candidates.
pub fn complete_search_bounded(
    seed: &str,
    dimensions: &[Dimension],
    tables: &RankTables,
) -> Result<Vec<Candidate>, SearchError> {
    run(seed, dimensions, tables, Some(COMPLETE_SEARCH_CAP))
}

/// [`complete_search`] truncated at an explicit candidate count.
pub fn complete_search_limited(
    seed: &str,
    dimensions: &[Dimension],
    tables: &RankTables,
    limit: usize,
) -> Result<Vec<Candidate>, SearchError> {
    run(seed, dimensions, tables, Some(limit))
}

/// Drop later occurrences of expressions already seen, keeping the first.
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: Vec<String> = Vec::new();
    candidates
        .into_iter()
        .filter(|candidate| {
            if seen.contains(&candidate.expression) {
                false
            } else {
                seen.push(candidate.expression.clone());
                true
            }
        })
        .collect()
}

fn run(
    seed: &str,
    dimensions: &[Dimension],
    tables: &RankTables,
    limit: Option<usize>,
) -> Result<Vec<Candidate>, SearchError> {
    let mut output = Vec::new();
    let mut agenda = vec![Task::Expand {
        expression: seed.to_string(),
        dimensions: dimensions.to_vec(),
        depth: 0,
    }];

    while let Some(task) = agenda.pop() {
        match task {
            Task::Emit(candidates) => {
                output.extend(candidates);
                if let Some(limit) = limit {
                    if output.len() >= limit {
                        output.truncate(limit);
                        tracing::warn!(limit, "expansion capped, dropping remaining agenda");
                        break;
                    }
                }
            }
            Task::Expand {
                expression,
                dimensions,
                depth,
            } => {
                if dimensions.is_empty() {
                    continue;
                }
                let expr = parse(&expression)?;
                // Build this level's work in natural order, then push it
                // reversed so the agenda pops it in that same order.
                let mut pending = Vec::new();
                for (i, &dimension) in dimensions.iter().enumerate() {
                    let candidates = dimension_candidates(&expr, dimension, tables, depth)?;
                    let rest: Vec<Dimension> = dimensions
                        .iter()
                        .enumerate()
                        .filter(|&(j, _)| j != i)
                        .map(|(_, &d)| d)
                        .collect();
                    let expansions: Vec<Task> = candidates
                        .iter()
                        .map(|candidate| Task::Expand {
                            expression: candidate.expression.clone(),
                            dimensions: rest.clone(),
                            depth: depth + 1,
                        })
                        .collect();
                    pending.push(Task::Emit(candidates));
                    pending.extend(expansions);
                }
                while let Some(task) = pending.pop() {
                    agenda.push(task);
                }
            }
        }
    }

    Ok(output)
}

/// All direct rewrites of `expr` along one dimension. Symbols absent from
/// their table contribute nothing.
fn dimension_candidates(
    expr: &Expr,
    dimension: Dimension,
    tables: &RankTables,
    depth: usize,
) -> Result<Vec<Candidate>, SearchError> {
    let mut out = Vec::new();
    match dimension {
        Dimension::Fields => {
            for field in relevant_fields(expr) {
                match field_candidates(expr, &field, &tables.fields) {
                    Ok(candidates) => out.extend(candidates),
                    Err(SearchError::UnknownSymbol { .. }) => continue,
                    Err(err) => return Err(err),
                }
            }
        }
        Dimension::Operators => {
            for operator in relevant_operators(expr) {
                match operator_candidates(expr, &operator, &tables.operators) {
                    Ok(candidates) => out.extend(candidates),
                    Err(SearchError::UnknownSymbol { .. }) => continue,
                    Err(err) => return Err(err),
                }
            }
        }
        Dimension::Parameter => {
            for operator in relevant_operators(expr) {
                out.extend(parameter_candidates(expr, &operator));
            }
        }
    }
    for candidate in &mut out {
        candidate.depth = depth;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::{RankRow, RankTable};

    fn tables() -> RankTables {
        RankTables {
            fields: RankTable::new(
                "fields",
                vec![
                    row("close", "price", 3.0),
                    row("open", "price", 2.0),
                    row("vwap", "price", 1.0),
                ],
            ),
            operators: RankTable::new(
                "operators",
                vec![row("rank", "cs", 2.0), row("zscore", "cs", 1.0)],
            ),
        }
    }

    fn row(symbol: &str, group: &str, rank: f64) -> RankRow {
        RankRow {
            symbol: symbol.to_string(),
            group: group.to_string(),
            rank,
        }
    }

    fn texts(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.expression.as_str()).collect()
    }

    #[test]
    fn two_dimension_expansion_interleaves_and_keeps_duplicates() {
        let candidates = complete_search(
            "rank(close)",
            &[Dimension::Fields, Dimension::Operators],
            &tables(),
        )
        .unwrap();
        assert_eq!(
            texts(&candidates),
            vec![
                "rank(open)",
                "rank(vwap)",
                "zscore(open)",
                "zscore(vwap)",
                "zscore(close)",
                "zscore(open)",
                "zscore(vwap)",
            ]
        );
    }

    #[test]
    fn depth_tracks_rewrite_generation() {
        let candidates = complete_search(
            "rank(close)",
            &[Dimension::Fields, Dimension::Operators],
            &tables(),
        )
        .unwrap();
        let depths: Vec<usize> = candidates.iter().map(|c| c.depth).collect();
        assert_eq!(depths, vec![0, 0, 1, 1, 0, 1, 1]);
    }

    #[test]
    fn dedup_keeps_first_occurrences_in_order() {
        let candidates = complete_search(
            "rank(close)",
            &[Dimension::Fields, Dimension::Operators],
            &tables(),
        )
        .unwrap();
        assert_eq!(
            texts(&dedup_candidates(candidates)),
            vec![
                "rank(open)",
                "rank(vwap)",
                "zscore(open)",
                "zscore(vwap)",
                "zscore(close)",
            ]
        );
    }

    #[test]
    fn single_dimension_results_are_a_subset_of_multi_dimension_results() {
        let tables = tables();
        let narrow =
            complete_search("rank(close)", &[Dimension::Fields], &tables).unwrap();
        // One field symbol with two group alternatives: exactly two candidates.
        assert_eq!(texts(&narrow), vec!["rank(open)", "rank(vwap)"]);

        let wide = complete_search(
            "rank(close)",
            &[Dimension::Fields, Dimension::Operators],
            &tables,
        )
        .unwrap();
        assert!(wide.len() > narrow.len());
        let wide_texts = texts(&wide);
        for candidate in &narrow {
            assert!(wide_texts.contains(&candidate.expression.as_str()));
        }
    }

    #[test]
    fn limit_truncates_in_generation_order() {
        let candidates = complete_search_limited(
            "rank(close)",
            &[Dimension::Fields, Dimension::Operators],
            &tables(),
            3,
        )
        .unwrap();
        assert_eq!(
            texts(&candidates),
            vec!["rank(open)", "rank(vwap)", "zscore(open)"]
        );
    }

    #[test]
    fn bounded_variant_truncates_at_the_builtin_cap() {
        // 200 interchangeable fields make the two-dimension closure larger
        // than the cap (199 * 2 field rewrites + 1 + 199 = 598).
        let rows: Vec<RankRow> = (0..200)
            .map(|i| row(&format!("f{i}"), "g", f64::from(i)))
            .collect();
        let tables = RankTables {
            fields: RankTable::new("fields", rows),
            operators: RankTable::new(
                "operators",
                vec![row("rank", "cs", 2.0), row("zscore", "cs", 1.0)],
            ),
        };

        let full = complete_search(
            "rank(f0)",
            &[Dimension::Fields, Dimension::Operators],
            &tables,
        )
        .unwrap();
        assert!(full.len() > COMPLETE_SEARCH_CAP);

        let bounded = complete_search_bounded(
            "rank(f0)",
            &[Dimension::Fields, Dimension::Operators],
            &tables,
        )
        .unwrap();
        assert_eq!(bounded.len(), COMPLETE_SEARCH_CAP);
        assert_eq!(texts(&bounded), texts(&full[..COMPLETE_SEARCH_CAP]));
    }

    #[test]
    fn parameter_dimension_expands_windowed_operators() {
        let candidates =
            complete_search("ts_rank(volume, 10)", &[Dimension::Parameter], &tables())
                .unwrap();
        assert_eq!(
            texts(&candidates),
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
    fn no_dimensions_means_no_candidates() {
        assert!(complete_search("rank(close)", &[], &tables())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unknown_symbols_expand_to_nothing() {
        let candidates = complete_search(
            "sigmoid(cap)",
            &[Dimension::Fields, Dimension::Operators],
            &tables(),
        )
        .unwrap();
        assert!(candidates.is_empty());
    }
}
