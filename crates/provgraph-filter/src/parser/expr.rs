//! Expression parsing.
//!
//! Precedence, loosest first:
//! - lambda, conditional `a if b else c`
//! - `or`, `and`, `not`
//! - comparisons: `==` `!=` `<` `<=` `>` `>=` `in` `not in` `is` `is not`
//! - `|`, `^`, `&`, shifts, `+ -`, `* / // % @`
//! - unary `+ - ~`, `**`, `await`
//! - postfix: attribute, call, subscript
//!
//! `&` and `|` bind tighter than `==`, so `a == 1 & b == 2` parses as
//! `a == (1 & b) == 2`.

use super::Parser;
use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::lexer::{StrLiteral, TokenKind};

impl Parser {
    /// `expr (',' expr)* [',']`, a bare tuple when commas are present.
    pub(crate) fn parse_star_expressions(&mut self) -> ParseResult<Expr> {
        let start = self.peek().span;
        let first = self.parse_star_named_expression()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut elements = vec![first];
        while self.eat(&TokenKind::Comma) {
            if !self.at_expression_start() {
                break;
            }
            elements.push(self.parse_star_named_expression()?);
        }
        Ok(Expr::new(ExprKind::Tuple(elements), self.span_from(start)))
    }

    fn parse_star_named_expression(&mut self) -> ParseResult<Expr> {
        if self.check(&TokenKind::Star) {
            let start = self.advance().span;
            let value = self.parse_bitor()?;
            return Ok(Expr::new(
                ExprKind::Starred(value.boxed()),
                self.span_from(start),
            ));
        }
        self.parse_named_expression()
    }

    /// `NAME := expression` or a plain expression.
    pub(crate) fn parse_named_expression(&mut self) -> ParseResult<Expr> {
        if let TokenKind::Name(target) = &self.peek().kind {
            if self.peek_nth(1).kind == TokenKind::Walrus {
                let target = target.clone();
                let start = self.advance().span;
                self.advance();
                let value = self.parse_expression()?;
                return Ok(Expr::new(
                    ExprKind::NamedExpr {
                        target,
                        value: value.boxed(),
                    },
                    self.span_from(start),
                ));
            }
        }
        self.parse_expression()
    }

    /// Parse a full expression, including lambdas and conditionals.
    pub(crate) fn parse_expression(&mut self) -> ParseResult<Expr> {
        if self.check(&TokenKind::Lambda) {
            return self.nested(Self::parse_lambda);
        }
        let start = self.peek().span;
        let body = self.parse_disjunction()?;
        if !self.eat(&TokenKind::If) {
            return Ok(body);
        }
        let test = self.parse_disjunction()?;
        self.expect(&TokenKind::Else)?;
        let orelse = self.nested(Self::parse_expression)?;
        Ok(Expr::new(
            ExprKind::IfExp {
                test: test.boxed(),
                body: body.boxed(),
                orelse: orelse.boxed(),
            },
            self.span_from(start),
        ))
    }

    fn parse_lambda(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        let mut params = Vec::new();
        while !self.check(&TokenKind::Colon) {
            if self.eat(&TokenKind::Slash) {
                // positional-only marker
            } else {
                let star = self.eat(&TokenKind::Star) || self.eat(&TokenKind::DoubleStar);
                if let TokenKind::Name(name) = &self.peek().kind {
                    params.push(name.clone());
                    self.advance();
                    if self.eat(&TokenKind::Assign) {
                        self.parse_expression()?;
                    }
                } else if !star {
                    return Err(self.unexpected("parameter name"));
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Colon)?;
        let body = self.parse_expression()?;
        Ok(Expr::new(
            ExprKind::Lambda {
                params,
                body: body.boxed(),
            },
            self.span_from(start),
        ))
    }

    fn parse_disjunction(&mut self) -> ParseResult<Expr> {
        self.parse_bool_chain(TokenKind::Or, BoolOp::Or, Self::parse_conjunction)
    }

    fn parse_conjunction(&mut self) -> ParseResult<Expr> {
        self.parse_bool_chain(TokenKind::And, BoolOp::And, Self::parse_inversion)
    }

    fn parse_bool_chain(
        &mut self,
        token: TokenKind,
        op: BoolOp,
        operand: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let start = self.peek().span;
        let first = operand(self)?;
        if !self.check(&token) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&token) {
            values.push(operand(self)?);
        }
        Ok(Expr::new(
            ExprKind::BoolOp { op, values },
            self.span_from(start),
        ))
    }

    fn parse_inversion(&mut self) -> ParseResult<Expr> {
        if !self.check(&TokenKind::Not) {
            return self.parse_comparison();
        }
        self.nested(|p| {
            let start = p.advance().span;
            let operand = p.parse_inversion()?;
            Ok(Expr::new(
                ExprKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand: operand.boxed(),
                },
                p.span_from(start),
            ))
        })
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let start = self.peek().span;
        let left = self.parse_bitor()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.comparison_operator() {
            ops.push(op);
            comparators.push(self.parse_bitor()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::new(
            ExprKind::Compare {
                left: left.boxed(),
                ops,
                comparators,
            },
            self.span_from(start),
        ))
    }

    /// Consume a comparison operator, including the two-token forms.
    fn comparison_operator(&mut self) -> Option<CmpOp> {
        let op = match self.peek().kind {
            TokenKind::EqEq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::NotEq,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::LtEq => CmpOp::LtE,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::GtEq => CmpOp::GtE,
            TokenKind::In => CmpOp::In,
            TokenKind::Not if self.peek_nth(1).kind == TokenKind::In => {
                self.advance();
                CmpOp::NotIn
            }
            TokenKind::Is if self.peek_nth(1).kind == TokenKind::Not => {
                self.advance();
                CmpOp::IsNot
            }
            TokenKind::Is => CmpOp::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    pub(crate) fn parse_bitor(&mut self) -> ParseResult<Expr> {
        self.parse_binary(&[(TokenKind::Pipe, BinOp::BitOr)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> ParseResult<Expr> {
        self.parse_binary(&[(TokenKind::Caret, BinOp::BitXor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> ParseResult<Expr> {
        self.parse_binary(&[(TokenKind::Amp, BinOp::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> ParseResult<Expr> {
        self.parse_binary(
            &[
                (TokenKind::LShift, BinOp::LShift),
                (TokenKind::RShift, BinOp::RShift),
            ],
            Self::parse_sum,
        )
    }

    fn parse_sum(&mut self) -> ParseResult<Expr> {
        self.parse_binary(
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        self.parse_binary(
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::DoubleSlash, BinOp::FloorDiv),
                (TokenKind::Percent, BinOp::Mod),
                (TokenKind::At, BinOp::MatMul),
            ],
            Self::parse_factor,
        )
    }

    /// Left-associative binary operator level.
    fn parse_binary(
        &mut self,
        operators: &[(TokenKind, BinOp)],
        operand: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let start = self.peek().span;
        let mut left = operand(self)?;
        while let Some(op) = operators
            .iter()
            .find(|(token, _)| self.check(token))
            .map(|(_, op)| *op)
        {
            self.advance();
            let right = operand(self)?;
            left = Expr::new(
                ExprKind::BinOp {
                    left: left.boxed(),
                    op,
                    right: right.boxed(),
                },
                self.span_from(start),
            );
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.nested(|p| {
            let start = p.advance().span;
            let operand = p.parse_factor()?;
            Ok(Expr::new(
                ExprKind::UnaryOp {
                    op,
                    operand: operand.boxed(),
                },
                p.span_from(start),
            ))
        })
    }

    fn parse_power(&mut self) -> ParseResult<Expr> {
        let start = self.peek().span;
        let base = self.parse_await_primary()?;
        if !self.eat(&TokenKind::DoubleStar) {
            return Ok(base);
        }
        let exponent = self.nested(Self::parse_factor)?;
        Ok(Expr::new(
            ExprKind::BinOp {
                left: base.boxed(),
                op: BinOp::Pow,
                right: exponent.boxed(),
            },
            self.span_from(start),
        ))
    }

    fn parse_await_primary(&mut self) -> ParseResult<Expr> {
        if self.check(&TokenKind::Await) {
            let start = self.advance().span;
            let value = self.parse_primary()?;
            return Ok(Expr::new(
                ExprKind::Await(value.boxed()),
                self.span_from(start),
            ));
        }
        self.parse_primary()
    }

    /// Atom followed by any number of `.name`, `(args)` and `[index]`.
    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.peek().span;
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let attr = self.expect_name()?;
                expr = Expr::new(
                    ExprKind::Attribute {
                        value: expr.boxed(),
                        attr,
                    },
                    self.span_from(start),
                );
            } else if self.eat(&TokenKind::LParen) {
                let (args, keywords) = self.nested(Self::parse_call_arguments)?;
                expr = Expr::new(
                    ExprKind::Call {
                        func: expr.boxed(),
                        args,
                        keywords,
                    },
                    self.span_from(start),
                );
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.nested(Self::parse_slices)?;
                self.expect(&TokenKind::RBracket)?;
                expr = Expr::new(
                    ExprKind::Subscript {
                        value: expr.boxed(),
                        index: index.boxed(),
                    },
                    self.span_from(start),
                );
            } else {
                return Ok(expr);
            }
        }
    }

    /// Arguments after `(`, consuming the closing `)`.
    fn parse_call_arguments(&mut self) -> ParseResult<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let start = self.peek().span;
            if self.eat(&TokenKind::DoubleStar) {
                let value = self.parse_expression()?;
                keywords.push(Keyword {
                    arg: None,
                    value,
                    span: self.span_from(start),
                });
            } else if matches!(self.peek().kind, TokenKind::Name(_))
                && self.peek_nth(1).kind == TokenKind::Assign
            {
                let arg = self.expect_name()?;
                self.advance();
                let value = self.parse_expression()?;
                keywords.push(Keyword {
                    arg: Some(arg),
                    value,
                    span: self.span_from(start),
                });
            } else {
                let arg = self.parse_star_named_expression()?;
                if self.at_comprehension() {
                    args.push(self.parse_comprehension(
                        ComprehensionKind::Generator,
                        arg,
                        None,
                        start,
                    )?);
                } else {
                    args.push(arg);
                }
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok((args, keywords))
    }

    fn parse_slices(&mut self) -> ParseResult<Expr> {
        let start = self.peek().span;
        let first = self.parse_slice()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut elements = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RBracket) {
                break;
            }
            elements.push(self.parse_slice()?);
        }
        Ok(Expr::new(ExprKind::Tuple(elements), self.span_from(start)))
    }

    fn parse_slice(&mut self) -> ParseResult<Expr> {
        let start = self.peek().span;
        let lower = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(self.parse_star_named_expression()?)
        };
        if !self.eat(&TokenKind::Colon) {
            return match lower {
                Some(expr) => Ok(expr),
                None => Err(self.unexpected("subscript")),
            };
        }
        let upper = self.parse_optional_slice_part()?;
        let step = if self.eat(&TokenKind::Colon) {
            self.parse_optional_slice_part()?
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::Slice {
                lower: lower.map(Expr::boxed),
                upper,
                step,
            },
            self.span_from(start),
        ))
    }

    fn parse_optional_slice_part(&mut self) -> ParseResult<Option<Box<Expr>>> {
        if matches!(
            self.peek().kind,
            TokenKind::Colon | TokenKind::Comma | TokenKind::RBracket
        ) {
            Ok(None)
        } else {
            Ok(Some(self.parse_expression()?.boxed()))
        }
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let constant = match token.kind {
            TokenKind::Name(name) => {
                self.advance();
                return Ok(Expr::new(ExprKind::Name(name), token.span));
            }
            TokenKind::Str(_) => return self.parse_strings(),
            TokenKind::LParen => return self.nested(Self::parse_parenthesized),
            TokenKind::LBracket => return self.nested(Self::parse_list),
            TokenKind::LBrace => return self.nested(Self::parse_braced),
            TokenKind::True => Constant::Bool(true),
            TokenKind::False => Constant::Bool(false),
            TokenKind::None => Constant::None,
            TokenKind::Int(i) => Constant::Int(i),
            TokenKind::Float(f) => Constant::Float(f),
            TokenKind::Imaginary(f) => Constant::Imaginary(f),
            TokenKind::Ellipsis => Constant::Ellipsis,
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(Expr::new(ExprKind::Constant(constant), token.span))
    }

    /// Adjacent string literals concatenate, as in Python.
    fn parse_strings(&mut self) -> ParseResult<Expr> {
        let start = self.peek().span;
        let mut parts: Vec<StrLiteral> = Vec::new();
        while let TokenKind::Str(lit) = &self.peek().kind {
            parts.push(lit.clone());
            self.advance();
        }
        let span = self.span_from(start);

        let bytes = parts.iter().any(|p| p.bytes);
        if bytes && parts.iter().any(|p| !p.bytes) {
            return Err(ParseError::new(
                "cannot mix bytes and nonbytes literals",
                span,
            ));
        }
        let formatted = parts.iter().any(|p| p.formatted);
        let value: String = parts.into_iter().map(|p| p.value).collect();

        let kind = if formatted {
            ExprKind::FormattedString(value)
        } else if bytes {
            ExprKind::Constant(Constant::Bytes(value))
        } else {
            ExprKind::Constant(Constant::Str(value))
        };
        Ok(Expr::new(kind, span))
    }

    /// `()`, `(expr)`, `(a, b)`, `(x for ...)` or `(yield ...)`.
    fn parse_parenthesized(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        if self.eat(&TokenKind::RParen) {
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), self.span_from(start)));
        }
        if self.check(&TokenKind::Yield) {
            let expr = self.parse_yield()?;
            self.expect(&TokenKind::RParen)?;
            return Ok(expr);
        }

        let first = self.parse_star_named_expression()?;
        if self.at_comprehension() {
            let expr =
                self.parse_comprehension(ComprehensionKind::Generator, first, None, start)?;
            self.expect(&TokenKind::RParen)?;
            return Ok(expr);
        }
        if !self.check(&TokenKind::Comma) {
            self.expect(&TokenKind::RParen)?;
            return Ok(first);
        }

        let mut elements = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RParen) {
                break;
            }
            elements.push(self.parse_star_named_expression()?);
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::new(ExprKind::Tuple(elements), self.span_from(start)))
    }

    fn parse_list(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        if self.eat(&TokenKind::RBracket) {
            return Ok(Expr::new(ExprKind::List(Vec::new()), self.span_from(start)));
        }
        let first = self.parse_star_named_expression()?;
        if self.at_comprehension() {
            let expr = self.parse_comprehension(ComprehensionKind::List, first, None, start)?;
            self.expect(&TokenKind::RBracket)?;
            return Ok(expr);
        }
        let elements = self.parse_remaining_elements(first, &TokenKind::RBracket)?;
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::new(ExprKind::List(elements), self.span_from(start)))
    }

    /// `{}`, dict and set displays, and their comprehensions.
    fn parse_braced(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        if self.eat(&TokenKind::RBrace) {
            return Ok(Expr::new(
                ExprKind::Dict {
                    keys: Vec::new(),
                    values: Vec::new(),
                },
                self.span_from(start),
            ));
        }

        let (first_key, first_value) = if self.eat(&TokenKind::DoubleStar) {
            (None, self.parse_bitor()?)
        } else {
            let element = self.parse_star_named_expression()?;
            if !self.eat(&TokenKind::Colon) {
                if self.at_comprehension() {
                    let expr =
                        self.parse_comprehension(ComprehensionKind::Set, element, None, start)?;
                    self.expect(&TokenKind::RBrace)?;
                    return Ok(expr);
                }
                let elements = self.parse_remaining_elements(element, &TokenKind::RBrace)?;
                self.expect(&TokenKind::RBrace)?;
                return Ok(Expr::new(ExprKind::Set(elements), self.span_from(start)));
            }
            let value = self.parse_expression()?;
            (Some(element), value)
        };

        if let Some(key) = &first_key {
            if self.at_comprehension() {
                let expr = self.parse_comprehension(
                    ComprehensionKind::Dict,
                    key.clone(),
                    Some(first_value),
                    start,
                )?;
                self.expect(&TokenKind::RBrace)?;
                return Ok(expr);
            }
        }

        let mut keys = vec![first_key];
        let mut values = vec![first_value];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RBrace) {
                break;
            }
            if self.eat(&TokenKind::DoubleStar) {
                keys.push(None);
                values.push(self.parse_bitor()?);
            } else {
                keys.push(Some(self.parse_expression()?));
                self.expect(&TokenKind::Colon)?;
                values.push(self.parse_expression()?);
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::new(ExprKind::Dict { keys, values }, self.span_from(start)))
    }

    fn parse_remaining_elements(
        &mut self,
        first: Expr,
        close: &TokenKind,
    ) -> ParseResult<Vec<Expr>> {
        let mut elements = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check(close) {
                break;
            }
            elements.push(self.parse_star_named_expression()?);
        }
        Ok(elements)
    }

    fn at_comprehension(&self) -> bool {
        self.check(&TokenKind::For)
            || (self.check(&TokenKind::Async) && self.peek_nth(1).kind == TokenKind::For)
    }

    /// The `for ... in ... if ...` clauses after a comprehension's element.
    fn parse_comprehension(
        &mut self,
        kind: ComprehensionKind,
        element: Expr,
        value: Option<Expr>,
        start: crate::error::Span,
    ) -> ParseResult<Expr> {
        let mut generators = Vec::new();
        while self.at_comprehension() {
            let is_async = self.eat(&TokenKind::Async);
            self.expect(&TokenKind::For)?;
            let target = self.parse_targets()?;
            self.expect(&TokenKind::In)?;
            let iter = self.parse_disjunction()?;
            let mut ifs = Vec::new();
            while self.eat(&TokenKind::If) {
                ifs.push(self.parse_disjunction()?);
            }
            generators.push(Generator {
                target,
                iter,
                ifs,
                is_async,
            });
        }
        Ok(Expr::new(
            ExprKind::Comprehension {
                kind,
                element: element.boxed(),
                value: value.map(Expr::boxed),
                generators,
            },
            self.span_from(start),
        ))
    }

    /// Loop targets: `x`, `x, y`, `*rest`.
    fn parse_targets(&mut self) -> ParseResult<Expr> {
        let start = self.peek().span;
        let mut targets = Vec::new();
        loop {
            let target_start = self.peek().span;
            let target = if self.eat(&TokenKind::Star) {
                let inner = self.parse_bitor()?;
                Expr::new(ExprKind::Starred(inner.boxed()), self.span_from(target_start))
            } else {
                self.parse_bitor()?
            };
            targets.push(target);
            if !self.check(&TokenKind::Comma) || self.peek_nth(1).kind == TokenKind::In {
                self.eat(&TokenKind::Comma);
                break;
            }
            self.advance();
        }
        if targets.len() == 1 {
            if let Some(target) = targets.pop() {
                return Ok(target);
            }
        }
        Ok(Expr::new(ExprKind::Tuple(targets), self.span_from(start)))
    }

    /// `yield`, `yield expr` or `yield from expr`.
    pub(crate) fn parse_yield(&mut self) -> ParseResult<Expr> {
        let start = self.advance().span;
        self.eat(&TokenKind::From);
        let value = if self.at_expression_start() {
            Some(self.parse_star_expressions()?.boxed())
        } else {
            None
        };
        Ok(Expr::new(ExprKind::Yield(value), self.span_from(start)))
    }
}
