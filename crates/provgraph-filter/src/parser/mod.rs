//! Parser for filter expressions.
//!
//! This module is organized into submodules by parsing category:
//! - `expr`: Python expression grammar with Python operator precedence
//! - `stmt`: statement forms (imports, assignments) that are parsed only so
//!   they can be rejected by name

mod expr;
mod stmt;

use crate::ast::Expr;
use crate::error::{ParseError, ParseResult, Span};
use crate::lexer::{Lexer, Token, TokenKind};

/// Parse one filter expression.
pub fn parse(source: &str, max_depth: usize) -> ParseResult<Expr> {
    Parser::new(source, max_depth)?.parse_filter()
}

// ==================== PARSER STATE ====================

/// Parser state.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    /// Create a new parser from source text.
    pub fn new(input: &str, max_depth: usize) -> ParseResult<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        })
    }

    /// Parse the whole input as a single expression or statement.
    pub fn parse_filter(&mut self) -> ParseResult<Expr> {
        if self.check(&TokenKind::Eof) {
            return Err(ParseError::unexpected_eof(self.peek().span, "expression"));
        }
        let expr = self.parse_statement()?;
        if self.check(&TokenKind::Semicolon) {
            return Err(ParseError::new(
                "only a single expression is allowed",
                self.peek().span,
            ));
        }
        if !self.check(&TokenKind::Eof) {
            let token = self.peek();
            return Err(ParseError::unexpected_token(
                token.span,
                "end of expression",
                &token.kind.name(),
            ));
        }
        Ok(expr)
    }
}

// ==================== TOKEN HELPERS ====================

impl Parser {
    pub(crate) fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    pub(crate) fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + n).min(last)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.name()))
        }
    }

    pub(crate) fn expect_name(&mut self) -> ParseResult<String> {
        match self.peek().kind.clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("name")),
        }
    }

    /// Error for the current token, which is not what the grammar expects.
    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            ParseError::unexpected_eof(token.span, expected)
        } else {
            ParseError::unexpected_token(token.span, expected, &token.kind.name())
        }
    }

    /// Span from `start` to the end of the last consumed token.
    pub(crate) fn span_from(&self, start: Span) -> Span {
        let end = self
            .pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or(start.end);
        Span::new(start.start, end.max(start.end), start.column)
    }

    /// Run `f` one nesting level deeper, failing past the depth limit.
    pub(crate) fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth >= self.max_depth {
            return Err(ParseError::new(
                format!(
                    "expression is nested too deeply (limit {})",
                    self.max_depth
                ),
                self.peek().span,
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Whether the current token can begin an expression.
    pub(crate) fn at_expression_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Name(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Imaginary(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::Not
                | TokenKind::Lambda
                | TokenKind::Await
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Tilde
                | TokenKind::Star
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::Ellipsis
        )
    }
}
