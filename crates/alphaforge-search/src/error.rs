use alphaforge_expr::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Symbol absent from its equivalence table. Callers treat this as "no
    /// rewrite possible" for that symbol, not as a fatal error.
    #[error("unknown symbol `{symbol}` in {table} rank table")]
    UnknownSymbol {
        symbol: String,
        table: &'static str,
    },

    #[error("expression error: {0}")]
    Parse(#[from] ParseError),

    #[error("rank table error: {0}")]
    Csv(#[from] csv::Error),
}
