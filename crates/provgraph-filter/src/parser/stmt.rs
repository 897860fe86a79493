//! Statement forms.
//!
//! A filter is a single expression, but imports and assignments are still
//! parsed into nodes so the validator can reject them by name instead of
//! reporting a bare syntax error.

use super::Parser;
use crate::ast::*;
use crate::error::ParseResult;
use crate::lexer::TokenKind;

impl Parser {
    /// `import ...`, `from ... import ...`, assignment, or an expression.
    pub(crate) fn parse_statement(&mut self) -> ParseResult<Expr> {
        match self.peek().kind {
            TokenKind::Import => return self.parse_import(),
            TokenKind::From => return self.parse_from_import(),
            TokenKind::Yield => return self.parse_yield(),
            _ => {}
        }

        let start = self.peek().span;
        let first = self.parse_star_expressions()?;

        if let TokenKind::AugAssign(op) = self.peek().kind {
            self.advance();
            let value = self.parse_assigned_value()?;
            return Ok(Expr::new(
                ExprKind::AugAssign {
                    target: first.boxed(),
                    op,
                    value: value.boxed(),
                },
                self.span_from(start),
            ));
        }

        if !self.check(&TokenKind::Assign) {
            return Ok(first);
        }
        let mut targets = Vec::new();
        let mut value = first;
        while self.eat(&TokenKind::Assign) {
            targets.push(value);
            value = self.parse_assigned_value()?;
        }
        Ok(Expr::new(
            ExprKind::Assign {
                targets,
                value: value.boxed(),
            },
            self.span_from(start),
        ))
    }

    fn parse_assigned_value(&mut self) -> ParseResult<Expr> {
        if self.check(&TokenKind::Yield) {
            self.parse_yield()
        } else {
            self.parse_star_expressions()
        }
    }

    /// `import a.b as c, d`
    fn parse_import(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        let mut names = Vec::new();
        loop {
            names.push(self.parse_dotted_name()?);
            if self.eat(&TokenKind::As) {
                self.expect_name()?;
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let module = names.first().cloned().unwrap_or_default();
        Ok(Expr::new(
            ExprKind::Import { module, names },
            self.span_from(start),
        ))
    }

    /// `from .pkg.mod import a as b, (c, d)` or `from mod import *`
    fn parse_from_import(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        let mut module = String::new();
        while self.check(&TokenKind::Dot) || self.check(&TokenKind::Ellipsis) {
            let dots = if self.advance().kind == TokenKind::Ellipsis {
                "..."
            } else {
                "."
            };
            module.push_str(dots);
        }
        if matches!(self.peek().kind, TokenKind::Name(_)) {
            module.push_str(&self.parse_dotted_name()?);
        }
        self.expect(&TokenKind::Import)?;

        let mut names = Vec::new();
        if self.eat(&TokenKind::Star) {
            names.push("*".to_string());
        } else {
            let parenthesized = self.eat(&TokenKind::LParen);
            loop {
                names.push(self.expect_name()?);
                if self.eat(&TokenKind::As) {
                    self.expect_name()?;
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                if parenthesized && self.check(&TokenKind::RParen) {
                    break;
                }
            }
            if parenthesized {
                self.expect(&TokenKind::RParen)?;
            }
        }
        Ok(Expr::new(
            ExprKind::Import { module, names },
            self.span_from(start),
        ))
    }

    fn parse_dotted_name(&mut self) -> ParseResult<String> {
        let mut name = self.expect_name()?;
        while self.eat(&TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }
}
