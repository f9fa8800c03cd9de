//! # Alphaforge Search
//!
//! Search strategies over the alpha-expression rewrite space.
//!
//! ## Layout
//! - [`rank`]: equivalence tables mapping each field/operator to its ranked
//!   substitution group.
//! - [`rewrite`]: the three rewrite dimensions and their candidate
//!   generators.
//! - [`greedy`]: per-dimension hill-climb with a turnover-reduction tail.
//! - [`complete`]: exhaustive multi-dimension expansion with an optional
//!   candidate cap.

pub mod complete;
pub mod error;
pub mod greedy;
pub mod rank;
pub mod rewrite;

pub use complete::{
    complete_search, complete_search_bounded, complete_search_limited, dedup_candidates,
    COMPLETE_SEARCH_CAP,
};
pub use error::SearchError;
pub use greedy::{Evaluate, GreedySearch, Metric, SearchOutcome};
pub use rank::{RankRow, RankTable, RankTables};
pub use rewrite::{
    field_candidates, operator_candidates, parameter_candidates, Candidate, Dimension,
    DAY_MENU, GROUP_MENU,
};
