//! Greedy per-dimension hill-climb ("best alpha").
//!
//! Dimensions are optimized in a fixed order (fields, then operators, then
//! trailing parameter). Within a dimension, each symbol's candidates are all
//! evaluated and the best of {incumbent, candidates} is adopted before the
//! next symbol is tried. A final fixed-iteration turnover pass bumps the
//! decay setting without further structural rewriting.

use crate::error::SearchError;
use crate::rank::RankTables;
use crate::rewrite::{
    field_candidates, operator_candidates, parameter_candidates, relevant_fields,
    relevant_operators, Dimension,
};
use alphaforge_brain::{Clock, EvalScheduler, PerformanceVector, SimulationApi};
use alphaforge_expr::parse;

/// Number of turnover-reduction rounds after the structural dimensions.
const TURNOVER_ROUNDS: usize = 3;

/// Evaluation seam used by the hill-climb.
///
/// A `None` result means the evaluation failed entirely; the candidate stays
/// comparable with metric 0 and simply never wins.
pub trait Evaluate {
    fn evaluate(&mut self, expression: &str) -> Option<PerformanceVector>;
    fn evaluate_with_decay(&mut self, expression: &str, decay: u32)
        -> Option<PerformanceVector>;
}

impl<A: SimulationApi, C: Clock> Evaluate for EvalScheduler<A, C> {
    fn evaluate(&mut self, expression: &str) -> Option<PerformanceVector> {
        EvalScheduler::evaluate(self, expression)
    }

    fn evaluate_with_decay(
        &mut self,
        expression: &str,
        decay: u32,
    ) -> Option<PerformanceVector> {
        EvalScheduler::evaluate_with_decay(self, expression, decay)
    }
}

/// Ranking metric for candidate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Sharpe magnitude (short side counts too).
    Sharpe,
    Fitness,
    Returns,
}

impl Metric {
    /// Score a result for ranking. Absent results and absent metrics are 0,
    /// never an error.
    pub fn score(self, result: Option<&PerformanceVector>) -> f64 {
        let Some(vector) = result else { return 0.0 };
        match self {
            Metric::Sharpe => vector.sharpe.map(f64::abs).unwrap_or(0.0),
            Metric::Fitness => vector.fitness.unwrap_or(0.0),
            Metric::Returns => vector.returns.unwrap_or(0.0),
        }
    }
}

/// Final expression and metrics of a hill-climb.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub expression: String,
    pub result: Option<PerformanceVector>,
    /// Decay adopted by the turnover pass (0 when the pass never fired).
    pub decay: u32,
}

pub struct GreedySearch<'a, E> {
    tables: &'a RankTables,
    evaluator: &'a mut E,
    metric: Metric,
}

impl<'a, E: Evaluate> GreedySearch<'a, E> {
    pub fn new(tables: &'a RankTables, evaluator: &'a mut E) -> Self {
        Self {
            tables,
            evaluator,
            metric: Metric::Sharpe,
        }
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Optimize `seed` across all three dimensions, then reduce turnover.
    pub fn run(
        &mut self,
        seed: &str,
        seed_result: Option<PerformanceVector>,
    ) -> Result<SearchOutcome, SearchError> {
        let mut best = seed.to_string();
        let mut best_result = seed_result;

        for dimension in [Dimension::Fields, Dimension::Operators, Dimension::Parameter] {
            (best, best_result) = self.optimize_dimension(dimension, best, best_result)?;
            tracing::info!(?dimension, best = %best, "dimension optimized");
        }

        let decay = self.reduce_turnover(&best, &mut best_result);
        Ok(SearchOutcome {
            expression: best,
            result: best_result,
            decay,
        })
    }

    fn optimize_dimension(
        &mut self,
        dimension: Dimension,
        seed: String,
        seed_result: Option<PerformanceVector>,
    ) -> Result<(String, Option<PerformanceVector>), SearchError> {
        let symbols = {
            let expr = parse(&seed)?;
            match dimension {
                Dimension::Fields => relevant_fields(&expr),
                Dimension::Operators | Dimension::Parameter => relevant_operators(&expr),
            }
        };

        let mut best = seed;
        let mut best_result = seed_result;

        for symbol in symbols {
            let expr = parse(&best)?;
            let candidates = match dimension {
                Dimension::Fields => {
                    match field_candidates(&expr, &symbol, &self.tables.fields) {
                        Ok(candidates) => candidates,
                        Err(SearchError::UnknownSymbol { .. }) => {
                            tracing::debug!(symbol, "no field alternatives");
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                }
                Dimension::Operators => {
                    match operator_candidates(&expr, &symbol, &self.tables.operators) {
                        Ok(candidates) => candidates,
                        Err(SearchError::UnknownSymbol { .. }) => {
                            tracing::debug!(symbol, "no operator alternatives");
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                }
                Dimension::Parameter => parameter_candidates(&expr, &symbol),
            };
            if candidates.is_empty() {
                continue;
            }

            // The incumbent sits at index 0 so a tie keeps it.
            let mut pool: Vec<(String, Option<PerformanceVector>)> =
                vec![(best.clone(), best_result.clone())];
            for candidate in candidates {
                let result = self.evaluator.evaluate(&candidate.expression);
                tracing::info!(
                    candidate = %candidate.expression,
                    score = self.metric.score(result.as_ref()),
                    "evaluated"
                );
                pool.push((candidate.expression, result));
            }

            let winner = index_of_max(pool.iter().map(|(_, r)| self.metric.score(r.as_ref())));
            let (expression, result) = pool.swap_remove(winner);
            best = expression;
            best_result = result;
        }

        Ok((best, best_result))
    }

    /// Fixed-iteration decay bump driven by the evaluated turnover. Stops as
    /// soon as turnover drops under 0.2 or a round reports no turnover.
    fn reduce_turnover(
        &mut self,
        expression: &str,
        result: &mut Option<PerformanceVector>,
    ) -> u32 {
        let mut decay = 0u32;
        for _ in 0..TURNOVER_ROUNDS {
            let Some(turnover) = result.as_ref().and_then(|r| r.turnover) else {
                break;
            };
            if turnover < 0.2 {
                break;
            }
            decay += if turnover > 0.7 {
                15
            } else if turnover > 0.5 {
                10
            } else if turnover > 0.2 {
                5
            } else {
                0
            };
            tracing::info!(turnover, decay, "re-evaluating with increased decay");
            *result = self.evaluator.evaluate_with_decay(expression, decay);
        }
        decay
    }
}

/// Index of the first occurrence of the maximum (stable tie-break).
fn index_of_max(scores: impl Iterator<Item = f64>) -> usize {
    let mut best_index = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (i, score) in scores.enumerate() {
        if score > best_score {
            best_score = score;
            best_index = i;
        }
    }
    best_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::{RankRow, RankTable};
    use std::collections::HashMap;

    /// Evaluator returning scripted sharpe/turnover per expression.
    struct ScriptedEvaluator {
        sharpe: HashMap<String, f64>,
        turnover: f64,
        calls: Vec<String>,
        decay_calls: Vec<u32>,
    }

    impl ScriptedEvaluator {
        fn new(scores: &[(&str, f64)]) -> Self {
            Self {
                sharpe: scores
                    .iter()
                    .map(|(e, s)| (e.to_string(), *s))
                    .collect(),
                turnover: 0.1,
                calls: Vec::new(),
                decay_calls: Vec::new(),
            }
        }

        fn vector(&self, expression: &str) -> Option<PerformanceVector> {
            self.sharpe.get(expression).map(|sharpe| PerformanceVector {
                expression: Some(expression.to_string()),
                sharpe: Some(*sharpe),
                turnover: Some(self.turnover),
                ..PerformanceVector::default()
            })
        }
    }

    impl Evaluate for ScriptedEvaluator {
        fn evaluate(&mut self, expression: &str) -> Option<PerformanceVector> {
            self.calls.push(expression.to_string());
            self.vector(expression)
        }

        fn evaluate_with_decay(
            &mut self,
            expression: &str,
            decay: u32,
        ) -> Option<PerformanceVector> {
            self.decay_calls.push(decay);
            self.vector(expression)
        }
    }

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

    #[test]
    fn seed_survives_when_every_candidate_is_worse() {
        let tables = tables();
        let mut evaluator = ScriptedEvaluator::new(&[
            ("rank(close)", 2.0),
            ("rank(open)", 1.0),
            ("rank(vwap)", 0.5),
            ("zscore(close)", 0.2),
        ]);
        let seed_result = evaluator.vector("rank(close)");
        let outcome = GreedySearch::new(&tables, &mut evaluator)
            .run("rank(close)", seed_result)
            .unwrap();
        assert_eq!(outcome.expression, "rank(close)");
        assert_eq!(outcome.result.unwrap().sharpe, Some(2.0));
    }

    #[test]
    fn adopts_improving_candidates_across_dimensions() {
        let tables = tables();
        let mut evaluator = ScriptedEvaluator::new(&[
            ("rank(close)", 0.5),
            ("rank(open)", 1.0),
            ("rank(vwap)", 0.9),
            ("zscore(open)", 1.4),
        ]);
        let seed_result = evaluator.vector("rank(close)");
        let outcome = GreedySearch::new(&tables, &mut evaluator)
            .run("rank(close)", seed_result)
            .unwrap();
        assert_eq!(outcome.expression, "zscore(open)");
    }

    #[test]
    fn sharpe_metric_ranks_by_magnitude() {
        let tables = tables();
        let mut evaluator = ScriptedEvaluator::new(&[
            ("rank(close)", 0.5),
            ("rank(open)", -1.8),
            ("rank(vwap)", 1.0),
        ]);
        let seed_result = evaluator.vector("rank(close)");
        let outcome = GreedySearch::new(&tables, &mut evaluator)
            .run("rank(close)", seed_result)
            .unwrap();
        // -1.8 has the largest magnitude; the operator swap fails to evaluate
        // and scores 0, so the field winner survives.
        assert_eq!(outcome.expression, "rank(open)");
    }

    #[test]
    fn ties_keep_the_first_and_thus_the_incumbent() {
        let tables = tables();
        let mut evaluator = ScriptedEvaluator::new(&[
            ("rank(close)", 1.0),
            ("rank(open)", 1.0),
            ("rank(vwap)", 1.0),
            ("zscore(close)", 1.0),
        ]);
        let seed_result = evaluator.vector("rank(close)");
        let outcome = GreedySearch::new(&tables, &mut evaluator)
            .run("rank(close)", seed_result)
            .unwrap();
        assert_eq!(outcome.expression, "rank(close)");
    }

    #[test]
    fn failed_evaluations_rank_zero_but_stay_comparable() {
        let tables = tables();
        // Only the seed ever evaluates; every candidate fails.
        let mut evaluator = ScriptedEvaluator::new(&[("rank(close)", 0.1)]);
        let seed_result = evaluator.vector("rank(close)");
        let outcome = GreedySearch::new(&tables, &mut evaluator)
            .run("rank(close)", seed_result)
            .unwrap();
        assert_eq!(outcome.expression, "rank(close)");
        assert!(evaluator.calls.contains(&"rank(open)".to_string()));
    }

    #[test]
    fn turnover_pass_bumps_decay_three_times() {
        let tables = tables();
        let mut evaluator = ScriptedEvaluator::new(&[("rank(close)", 2.0)]);
        evaluator.turnover = 0.8;
        let seed_result = evaluator.vector("rank(close)");
        let outcome = GreedySearch::new(&tables, &mut evaluator)
            .run("rank(close)", seed_result)
            .unwrap();
        // Turnover stays above 0.7, so each round adds 15.
        assert_eq!(evaluator.decay_calls, vec![15, 30, 45]);
        assert_eq!(outcome.decay, 45);
    }

    #[test]
    fn low_turnover_skips_the_decay_pass() {
        let tables = tables();
        let mut evaluator = ScriptedEvaluator::new(&[("rank(close)", 2.0)]);
        let seed_result = evaluator.vector("rank(close)");
        let outcome = GreedySearch::new(&tables, &mut evaluator)
            .run("rank(close)", seed_result)
            .unwrap();
        assert!(evaluator.decay_calls.is_empty());
        assert_eq!(outcome.decay, 0);
    }
}
