//! Structure-preserving rewrites over alpha expression trees.
//!
//! Both transformers are pure: they rebuild the tree and leave every node
//! outside their match untouched, so a single pass is equivalent to folding
//! the rename over the tree in either direction.

use crate::ast::{Arg, Expr};
use std::collections::HashMap;

/// Classification of an operator name by its prefix up to the first
/// underscore: `ts_rank` is [`OpCategory::TimeSeries`], `group_neutralize` is
/// [`OpCategory::Group`], everything else is [`OpCategory::Other`].
///
/// Windowed and grouped operators keep a rewritten name syntactically valid
/// only if their trailing parameter (lookback length or grouping dimension)
/// is adjusted to a value legal for the new operator, which is why the
/// category decides whether [`rename_operators`] may overwrite the last
/// argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCategory {
    TimeSeries,
    Group,
    Other,
}

impl OpCategory {
    pub fn of(name: &str) -> Self {
        match name.split('_').next() {
            Some("ts") => OpCategory::TimeSeries,
            Some("group") => OpCategory::Group,
            _ => OpCategory::Other,
        }
    }
}

/// Operator rename plus the optional trailing-argument overrides.
///
/// Built per substitution attempt and discarded after one pass.
#[derive(Debug, Clone, Default)]
pub struct OperatorRewrite {
    /// Old operator name to new operator name.
    pub rename: HashMap<String, String>,
    /// Replacement lookback window, applied to `ts_` calls with >= 2 args.
    pub day: Option<String>,
    /// Replacement grouping dimension, applied to `group_` calls with >= 2 args.
    pub group: Option<String>,
}

impl OperatorRewrite {
    pub fn new(old: &str, new: &str) -> Self {
        Self {
            rename: HashMap::from([(old.to_string(), new.to_string())]),
            day: None,
            group: None,
        }
    }

    pub fn with_day(mut self, day: &str) -> Self {
        self.day = Some(day.to_string());
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }
}

/// Rename every `Var` whose name is a key of `map`.
///
/// The rename is global: an expression referencing the same field twice is
/// rewritten consistently in both places.
pub fn rename_fields(expr: &Expr, map: &HashMap<String, String>) -> Expr {
    match expr {
        Expr::Var(name) => match map.get(name) {
            Some(new_name) => Expr::Var(new_name.clone()),
            None => expr.clone(),
        },
        Expr::Number(_) => expr.clone(),
        Expr::Neg(inner) => Expr::Neg(Box::new(rename_fields(inner, map))),
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op: *op,
            lhs: Box::new(rename_fields(lhs, map)),
            rhs: Box::new(rename_fields(rhs, map)),
        },
        Expr::Call { name, args } => Expr::Call {
            name: name.clone(),
            args: args
                .iter()
                .map(|arg| match arg {
                    Arg::Positional(e) => Arg::Positional(rename_fields(e, map)),
                    Arg::Keyword { key, value } => Arg::Keyword {
                        key: key.clone(),
                        value: rename_fields(value, map),
                    },
                })
                .collect(),
        },
    }
}

/// Rename every `Call` whose name is a key of the rewrite map, then apply the
/// trailing-argument override selected by the **old** name's [`OpCategory`].
///
/// The override only fires on calls with at least two arguments; a one
/// argument call changes name and nothing else.
pub fn rename_operators(expr: &Expr, rewrite: &OperatorRewrite) -> Expr {
    match expr {
        Expr::Var(_) | Expr::Number(_) => expr.clone(),
        Expr::Neg(inner) => Expr::Neg(Box::new(rename_operators(inner, rewrite))),
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op: *op,
            lhs: Box::new(rename_operators(lhs, rewrite)),
            rhs: Box::new(rename_operators(rhs, rewrite)),
        },
        Expr::Call { name, args } => {
            let mut new_args: Vec<Arg> = args
                .iter()
                .map(|arg| match arg {
                    Arg::Positional(e) => Arg::Positional(rename_operators(e, rewrite)),
                    Arg::Keyword { key, value } => Arg::Keyword {
                        key: key.clone(),
                        value: rename_operators(value, rewrite),
                    },
                })
                .collect();

            let Some(new_name) = rewrite.rename.get(name) else {
                return Expr::Call {
                    name: name.clone(),
                    args: new_args,
                };
            };

            if new_args.len() >= 2 {
                match OpCategory::of(name) {
                    OpCategory::TimeSeries => {
                        if let Some(day) = &rewrite.day {
                            *new_args.last_mut().unwrap() =
                                Arg::Positional(Expr::Number(day.clone()));
                        }
                    }
                    OpCategory::Group => {
                        if let Some(group) = &rewrite.group {
                            *new_args.last_mut().unwrap() =
                                Arg::Positional(Expr::Var(group.clone()));
                        }
                    }
                    OpCategory::Other => {}
                }
            }

            Expr::Call {
                name: new_name.clone(),
                args: new_args,
            }
        }
    }
}
