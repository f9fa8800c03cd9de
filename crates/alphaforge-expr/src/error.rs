use thiserror::Error;

/// Failure while lexing or parsing an alpha expression.
///
/// Malformed candidate text is surfaced to the caller and never silently
/// repaired.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected character `{found}` at byte {at}")]
    UnexpectedChar { found: char, at: usize },
    #[error("invalid number literal `{raw}`")]
    InvalidNumber { raw: String },
    #[error("unexpected token `{found}` (expected {expected})")]
    UnexpectedToken { found: String, expected: String },
    #[error("unexpected end of expression (expected {expected})")]
    UnexpectedEof { expected: String },
    #[error("trailing input after expression: `{found}`")]
    TrailingInput { found: String },
}
