//! Single-pass parser for the alpha expression grammar.
//!
//! Hand-rolled lexer plus recursive-descent parser with one token of
//! lookahead and no backtracking, so `parse(render(tree))` is stable for any
//! tree the parser or the transformers produce.
//!
//! Precedence, loosest to tightest: comparisons (`< <= > >=`), additive
//! (`+ -`), multiplicative (`* /`), unary minus, primary. All binary
//! operators are left-associative.

use crate::ast::{Arg, BinaryOp, Expr};
use crate::error::ParseError;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Plus,
    Minus,
    Star,
    Slash,
    Lt,
    Le,
    Gt,
    Ge,
    Comma,
    Assign,
    LParen,
    RParen,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => name.clone(),
            Token::Number(raw) => raw.clone(),
            Token::Plus => "+".to_string(),
            Token::Minus => "-".to_string(),
            Token::Star => "*".to_string(),
            Token::Slash => "/".to_string(),
            Token::Lt => "<".to_string(),
            Token::Le => "<=".to_string(),
            Token::Gt => ">".to_string(),
            Token::Ge => ">=".to_string(),
            Token::Comma => ",".to_string(),
            Token::Assign => "=".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_ascii_whitespace()) {
            self.chars.next();
        }
        let Some(&(at, ch)) = self.chars.peek() else {
            return Ok(Token::Eof);
        };
        match ch {
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => self.single(Token::Star),
            '/' => self.single(Token::Slash),
            ',' => self.single(Token::Comma),
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '=' => self.single(Token::Assign),
            '<' => {
                self.chars.next();
                if self.eat('=') {
                    Ok(Token::Le)
                } else {
                    Ok(Token::Lt)
                }
            }
            '>' => {
                self.chars.next();
                if self.eat('=') {
                    Ok(Token::Ge)
                } else {
                    Ok(Token::Gt)
                }
            }
            c if is_ident_start(c) => Ok(Token::Ident(self.read_while(is_ident_continue))),
            c if c.is_ascii_digit() || c == '.' => {
                let raw = self.read_number();
                // At least one digit; a bare `.` is not a literal.
                if !raw.chars().any(|c| c.is_ascii_digit()) {
                    return Err(ParseError::InvalidNumber { raw });
                }
                Ok(Token::Number(raw))
            }
            found => Err(ParseError::UnexpectedChar { found, at }),
        }
    }

    fn single(&mut self, tok: Token) -> Result<Token, ParseError> {
        self.chars.next();
        Ok(tok)
    }

    fn eat(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some((_, c)) if *c == expected) {
            self.chars.next();
            return true;
        }
        false
    }

    fn read_while(&mut self, keep: fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !keep(c) {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }

    fn read_number(&mut self) -> String {
        let mut out = String::new();
        let mut seen_dot = false;
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.chars.next();
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Parse alpha expression text into an [`Expr`].
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(source);
    let expr = parser.parse_compare()?;
    match parser.next_token()? {
        Token::Eof => Ok(expr),
        other => Err(ParseError::TrailingInput {
            found: other.describe(),
        }),
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            lookahead: None,
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        if let Some(tok) = self.lookahead.take() {
            return Ok(tok);
        }
        self.lexer.next_token()
    }

    fn peek_token(&mut self) -> Result<&Token, ParseError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token()?);
        }
        Ok(self.lookahead.as_ref().unwrap())
    }

    fn parse_compare(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_add_sub()?;
        loop {
            let op = match self.peek_token()? {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_add_sub()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_add_sub(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_mul_div()?;
        loop {
            let op = match self.peek_token()? {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_mul_div()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_mul_div(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_token()? {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.next_token()?;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek_token()?, Token::Minus) {
            self.next_token()?;
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.next_token()? {
            Token::Ident(name) => {
                if matches!(self.peek_token()?, Token::LParen) {
                    self.next_token()?;
                    let args = self.parse_args()?;
                    self.expect(Token::RParen)?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Token::Number(raw) => Ok(Expr::Number(raw)),
            Token::LParen => {
                let expr = self.parse_compare()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::Eof => Err(ParseError::UnexpectedEof {
                expected: "expression".to_string(),
            }),
            other => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                expected: "expression".to_string(),
            }),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.peek_token()?, Token::RParen) {
            return Ok(args);
        }
        loop {
            let expr = self.parse_compare()?;
            // `name=value` turns a just-parsed identifier into a keyword arg.
            if let Expr::Var(key) = &expr {
                if matches!(self.peek_token()?, Token::Assign) {
                    self.next_token()?;
                    let value = self.parse_compare()?;
                    args.push(Arg::Keyword {
                        key: key.clone(),
                        value,
                    });
                } else {
                    args.push(Arg::Positional(expr));
                }
            } else {
                args.push(Arg::Positional(expr));
            }

            match self.peek_token()? {
                Token::Comma => {
                    self.next_token()?;
                }
                Token::RParen => break,
                Token::Eof => {
                    return Err(ParseError::UnexpectedEof {
                        expected: "`,` or `)`".to_string(),
                    });
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        found: other.describe(),
                        expected: "`,` or `)`".to_string(),
                    });
                }
            }
        }
        Ok(args)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        let got = self.next_token()?;
        if got == expected {
            return Ok(());
        }
        if got == Token::Eof {
            return Err(ParseError::UnexpectedEof {
                expected: format!("`{}`", expected.describe()),
            });
        }
        Err(ParseError::UnexpectedToken {
            found: got.describe(),
            expected: format!("`{}`", expected.describe()),
        })
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_precedence() {
        let expr = parse("close + volume * vwap").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => assert!(matches!(
                *rhs,
                Expr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn comparisons_bind_loosest() {
        let expr = parse("close - open > 0.5 * vwap").unwrap();
        assert!(matches!(
            expr,
            Expr::Binary {
                op: BinaryOp::Gt,
                ..
            }
        ));
    }

    #[test]
    fn parses_call_with_keyword_args() {
        let expr = parse("winsorize(ts_backfill(close, 120), std=4)").unwrap();
        let Expr::Call { name, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(name, "winsorize");
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[1], Arg::Keyword { key, .. } if key == "std"));
    }

    #[test]
    fn number_keeps_raw_spelling() {
        let expr = parse("decay_linear(close, 10)").unwrap();
        assert_eq!(expr.render(), "decay_linear(close, 10)");
    }

    #[test]
    fn rejects_unmatched_paren() {
        let err = parse("rank(close").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn rejects_trailing_tokens() {
        let err = parse("close open").unwrap_err();
        assert!(matches!(err, ParseError::TrailingInput { .. }));
    }

    #[test]
    fn rejects_unknown_character() {
        let err = parse("close @ open").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedChar { found: '@', .. }));
    }

    #[test]
    fn round_trips_canonical_form() {
        let texts = [
            "((close - open) / vwap)",
            "-ts_rank(volume, 10)",
            "group_neutralize(rank((close / vwap)), industry)",
            "vec_choose(nws12_afterhsz_scl, nth=-1)",
            "((close < vwap) >= (open > low))",
        ];
        for text in texts {
            let first = parse(text).unwrap();
            let rendered = first.render();
            let second = parse(&rendered).unwrap();
            assert_eq!(first, second, "unstable round-trip for `{text}`");
            assert_eq!(rendered, second.render());
        }
    }
}
