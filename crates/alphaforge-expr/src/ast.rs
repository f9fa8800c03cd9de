//! Alpha expression AST.
//!
//! Trees are immutable once built: the parser produces them, the rewrite
//! transformers rebuild them, and nothing mutates a shared subtree in place.
//! Candidates derived from the same seed therefore never alias.

use std::fmt;

/// One node of an alpha expression.
///
/// Number literals keep their raw spelling (`"10"` stays `"10"`, never
/// `"10.0"`) so that rendering a parsed tree reproduces the input bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Market-data field reference, e.g. `close`.
    Var(String),
    /// Numeric literal, stored as written.
    Number(String),
    /// Unary negation.
    Neg(Box<Expr>),
    /// Left-associative binary operation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Operator call with ordered arguments (keyword args keep their slot).
    Call { name: String, args: Vec<Arg> },
}

/// One argument of an operator call.
///
/// Positional and `key=value` arguments live in a single ordered list because
/// the operator transformer overwrites "the last argument" regardless of its
/// kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Positional(Expr),
    Keyword { key: String, value: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// Concrete-syntax token for this operator.
    pub fn token(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

/// Field and operator names referenced by an expression, in first-encountered
/// pre-order, duplicates retained (callers may need multiplicity).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Symbols {
    pub fields: Vec<String>,
    pub operators: Vec<String>,
}

impl Expr {
    /// Collect every field and operator name in the tree.
    pub fn symbols(&self) -> Symbols {
        let mut out = Symbols::default();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Symbols) {
        match self {
            Expr::Var(name) => out.fields.push(name.clone()),
            Expr::Number(_) => {}
            Expr::Neg(inner) => inner.collect_symbols(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_symbols(out);
                rhs.collect_symbols(out);
            }
            Expr::Call { name, args } => {
                out.operators.push(name.clone());
                for arg in args {
                    match arg {
                        Arg::Positional(e) => e.collect_symbols(out),
                        Arg::Keyword { value, .. } => value.collect_symbols(out),
                    }
                }
            }
        }
    }

    /// Render the canonical text form.
    ///
    /// Binary operations are fully parenthesized, call arguments are joined
    /// with `", "`. This is the form submitted to the platform and the form
    /// the parser is guaranteed to round-trip.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => f.write_str(name),
            Expr::Number(raw) => f.write_str(raw),
            Expr::Neg(inner) => write!(f, "-{inner}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.token()),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match arg {
                        Arg::Positional(e) => write!(f, "{e}")?,
                        Arg::Keyword { key, value } => write!(f, "{key}={value}")?,
                    }
                }
                f.write_str(")")
            }
        }
    }
}
