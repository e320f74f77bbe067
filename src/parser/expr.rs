//! Expression grammar: operator precedence, names, and aggregates.

use std::cell::Cell;

use super::{PResult, Parser};
use crate::ast::{Assoc, BinOp, CallClass, Expr, ExprKind, UnOp};
use crate::token::TokenKind;

fn logical_op(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::And => Some(BinOp::And),
        TokenKind::AndThen => Some(BinOp::AndThen),
        TokenKind::Or => Some(BinOp::Or),
        TokenKind::OrElse => Some(BinOp::OrElse),
        TokenKind::Xor => Some(BinOp::Xor),
        _ => None,
    }
}

fn relational_op(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::Eq => Some(BinOp::Eq),
        TokenKind::Ne => Some(BinOp::Ne),
        TokenKind::Lt => Some(BinOp::Lt),
        TokenKind::Le => Some(BinOp::Le),
        TokenKind::Gt => Some(BinOp::Gt),
        TokenKind::Ge => Some(BinOp::Ge),
        _ => None,
    }
}

fn adding_op(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::Plus => Some(BinOp::Add),
        TokenKind::Minus => Some(BinOp::Sub),
        TokenKind::Amp => Some(BinOp::Cat),
        _ => None,
    }
}

fn multiplying_op(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::Star => Some(BinOp::Mul),
        TokenKind::Slash => Some(BinOp::Div),
        TokenKind::Mod => Some(BinOp::Mod),
        TokenKind::Rem => Some(BinOp::Rem),
        _ => None,
    }
}

pub trait ExprParsing<'a> {
    fn parse_expression(&mut self) -> PResult<&'a Expr<'a>>;
    fn parse_relation(&mut self) -> PResult<&'a Expr<'a>>;
    fn parse_simple_expression(&mut self) -> PResult<&'a Expr<'a>>;
    fn parse_term(&mut self) -> PResult<&'a Expr<'a>>;
    fn parse_factor(&mut self) -> PResult<&'a Expr<'a>>;
    fn parse_primary(&mut self) -> PResult<&'a Expr<'a>>;
    fn parse_name(&mut self) -> PResult<&'a Expr<'a>>;
    fn parse_discrete_range(&mut self) -> PResult<&'a Expr<'a>>;
    fn parse_assoc_list(&mut self) -> PResult<Vec<Assoc<'a>>>;
    fn parse_choice(&mut self) -> PResult<&'a Expr<'a>>;
}

impl<'a, 'i> ExprParsing<'a> for Parser<'a, 'i> {
    /// expression ::= relation { logical-operator relation }
    ///
    /// The operator is recorded on the first step; a flat sequence cannot
    /// mix distinct logical operators without parentheses.
    fn parse_expression(&mut self) -> PResult<&'a Expr<'a>> {
        let loc = self.loc();
        let mut lhs = self.parse_relation()?;
        let Some(locked) = logical_op(self.cur().kind) else {
            return Ok(lhs);
        };
        while let Some(op) = logical_op(self.cur().kind) {
            if op != locked {
                return Err(self.fatal("mixed logical operators require parentheses"));
            }
            self.advance()?;
            let rhs = self.parse_relation()?;
            lhs = self.ctx.expr(
                loc,
                ExprKind::Binary {
                    op,
                    lhs,
                    rhs,
                    folded: Cell::new(None),
                },
            );
        }
        Ok(lhs)
    }

    /// relation ::= simple-expression [ relational-operator simple-expression
    ///            | [not] in range-or-mark ]
    fn parse_relation(&mut self) -> PResult<&'a Expr<'a>> {
        let loc = self.loc();
        let lhs = self.parse_simple_expression()?;
        if let Some(op) = relational_op(self.cur().kind) {
            self.advance()?;
            let rhs = self.parse_simple_expression()?;
            return Ok(self.ctx.expr(
                loc,
                ExprKind::Binary {
                    op,
                    lhs,
                    rhs,
                    folded: Cell::new(None),
                },
            ));
        }
        let negated = if self.check(TokenKind::Not) && self.peeked().kind == TokenKind::In {
            self.advance()?;
            true
        } else {
            false
        };
        if self.check(TokenKind::In) {
            self.advance()?;
            let mark = self.parse_discrete_range()?;
            return Ok(self.ctx.expr(
                loc,
                ExprKind::Membership {
                    operand: lhs,
                    mark,
                    negated,
                },
            ));
        }
        if negated {
            return Err(self.fatal("'in' expected after 'not'"));
        }
        Ok(lhs)
    }

    /// simple-expression ::= [+|-] term { (+|-|&) term }
    ///
    /// A leading sign applies to the whole first term.
    fn parse_simple_expression(&mut self) -> PResult<&'a Expr<'a>> {
        let loc = self.loc();
        let unary = if self.check(TokenKind::Plus) {
            self.advance()?;
            Some(UnOp::Plus)
        } else if self.check(TokenKind::Minus) {
            self.advance()?;
            Some(UnOp::Minus)
        } else {
            None
        };
        let mut lhs = self.parse_term()?;
        if let Some(op) = unary {
            lhs = self.ctx.expr(loc, ExprKind::Unary { op, operand: lhs });
        }
        while let Some(op) = adding_op(self.cur().kind) {
            self.advance()?;
            let rhs = self.parse_term()?;
            lhs = self.ctx.expr(
                loc,
                ExprKind::Binary {
                    op,
                    lhs,
                    rhs,
                    folded: Cell::new(None),
                },
            );
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> PResult<&'a Expr<'a>> {
        let loc = self.loc();
        let mut lhs = self.parse_factor()?;
        while let Some(op) = multiplying_op(self.cur().kind) {
            self.advance()?;
            let rhs = self.parse_factor()?;
            lhs = self.ctx.expr(
                loc,
                ExprKind::Binary {
                    op,
                    lhs,
                    rhs,
                    folded: Cell::new(None),
                },
            );
        }
        Ok(lhs)
    }

    /// factor ::= primary [** factor] | not primary | abs primary
    ///
    /// Exponentiation associates to the right; everything else in the
    /// expression grammar associates left.
    fn parse_factor(&mut self) -> PResult<&'a Expr<'a>> {
        let loc = self.loc();
        if self.match_(TokenKind::Not)? {
            let operand = self.parse_primary()?;
            return Ok(self.ctx.expr(loc, ExprKind::Unary { op: UnOp::Not, operand }));
        }
        if self.match_(TokenKind::Abs)? {
            let operand = self.parse_primary()?;
            return Ok(self.ctx.expr(loc, ExprKind::Unary { op: UnOp::Abs, operand }));
        }
        let base = self.parse_primary()?;
        if self.match_(TokenKind::StarStar)? {
            let exp = self.parse_factor()?;
            return Ok(self.ctx.expr(
                loc,
                ExprKind::Binary {
                    op: BinOp::Pow,
                    lhs: base,
                    rhs: exp,
                    folded: Cell::new(None),
                },
            ));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> PResult<&'a Expr<'a>> {
        let loc = self.loc();
        match self.cur().kind {
            TokenKind::IntLit => {
                let value = self.cur().ival;
                let big = self.cur().big.clone().map(|b| self.ctx.big(b));
                self.advance()?;
                Ok(self.ctx.expr(loc, ExprKind::Int { value, big }))
            }
            TokenKind::RealLit => {
                let value = self.cur().fval;
                self.advance()?;
                Ok(self.ctx.expr(loc, ExprKind::Real(value)))
            }
            TokenKind::CharLit => {
                let value = self.cur().ival as u8;
                self.advance()?;
                Ok(self.ctx.expr(loc, ExprKind::Char(value)))
            }
            TokenKind::StrLit => {
                let value = self.cur().sval;
                self.advance()?;
                Ok(self.ctx.expr(loc, ExprKind::Str(value)))
            }
            TokenKind::Null => {
                self.advance()?;
                Ok(self.ctx.expr(loc, ExprKind::Null))
            }
            TokenKind::New => {
                self.advance()?;
                let name = self.parse_name()?;
                let node = match name.kind {
                    ExprKind::Qualified { mark, operand } => ExprKind::Allocator {
                        mark,
                        init: Some(operand),
                    },
                    _ => ExprKind::Allocator { mark: name, init: None },
                };
                Ok(self.ctx.expr(loc, node))
            }
            TokenKind::LParen => self.parse_paren_or_aggregate(),
            TokenKind::Ident => self.parse_name(),
            found => Err(self.fatal(format!("expression expected, found {}", found.describe()))),
        }
    }

    /// name ::= identifier { .selector | .all | 'attribute [(args)]
    ///                     | '(expression) | (association-list) }
    fn parse_name(&mut self) -> PResult<&'a Expr<'a>> {
        let (ident, loc) = self.expect_ident()?;
        let mut e = self.ctx.expr(loc, ExprKind::Ident(ident));
        loop {
            match self.cur().kind {
                TokenKind::Dot => {
                    self.advance()?;
                    if self.match_(TokenKind::All)? {
                        e = self.ctx.expr(loc, ExprKind::Deref { prefix: e });
                    } else if self.check(TokenKind::StrLit) {
                        // Selected operator designator: PKG."+".
                        let selector = self.cur().sval;
                        self.advance()?;
                        e = self.ctx.expr(loc, ExprKind::Selected { prefix: e, selector });
                    } else {
                        let (selector, _) = self.expect_ident()?;
                        e = self.ctx.expr(loc, ExprKind::Selected { prefix: e, selector });
                    }
                }
                TokenKind::Tick => {
                    self.advance()?;
                    if self.check(TokenKind::LParen) {
                        self.advance()?;
                        let operand = self.parse_aggregate_operand()?;
                        self.expect(TokenKind::RParen)?;
                        e = self.ctx.expr(loc, ExprKind::Qualified { mark: e, operand });
                    } else {
                        let designator = match self.cur().kind {
                            TokenKind::Ident
                            | TokenKind::Range
                            | TokenKind::Digits
                            | TokenKind::Delta
                            | TokenKind::Access => self.cur().text,
                            found => {
                                return Err(self.fatal(format!(
                                    "attribute designator expected, found {}",
                                    found.describe()
                                )))
                            }
                        };
                        self.advance()?;
                        let args = if self.check(TokenKind::LParen) {
                            self.advance()?;
                            let mut args = vec![self.parse_expression()?];
                            while self.match_(TokenKind::Comma)? {
                                args.push(self.parse_expression()?);
                            }
                            self.expect(TokenKind::RParen)?;
                            args
                        } else {
                            Vec::new()
                        };
                        e = self.ctx.expr(
                            loc,
                            ExprKind::Attribute {
                                prefix: e,
                                designator,
                                args: self.ctx.exprs(args),
                            },
                        );
                    }
                }
                TokenKind::LParen => {
                    self.advance()?;
                    let args = self.parse_assoc_list()?;
                    self.expect(TokenKind::RParen)?;
                    let is_slice = args.len() == 1
                        && args[0].choices.is_empty()
                        && matches!(args[0].value.kind, ExprKind::Range { .. });
                    if is_slice {
                        e = self.ctx.expr(
                            loc,
                            ExprKind::Slice {
                                prefix: e,
                                range: args[0].value,
                            },
                        );
                    } else {
                        e = self.ctx.expr(
                            loc,
                            ExprKind::Call {
                                callee: e,
                                args: self.ctx.assocs(args),
                                class: Cell::new(CallClass::Unresolved),
                            },
                        );
                    }
                }
                _ => break,
            }
        }
        Ok(e)
    }

    /// discrete-range ::= simple-expression .. simple-expression
    ///                  | type-mark (possibly carrying 'RANGE)
    fn parse_discrete_range(&mut self) -> PResult<&'a Expr<'a>> {
        let loc = self.loc();
        let low = self.parse_simple_expression()?;
        if self.match_(TokenKind::DotDot)? {
            let high = self.parse_simple_expression()?;
            return Ok(self.ctx.expr(loc, ExprKind::Range { low, high }));
        }
        Ok(low)
    }

    fn parse_assoc_list(&mut self) -> PResult<Vec<Assoc<'a>>> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_assoc()?);
            if !self.match_(TokenKind::Comma)? {
                break;
            }
        }
        Ok(items)
    }

    /// choice ::= simple-expression [.. simple-expression] | others
    fn parse_choice(&mut self) -> PResult<&'a Expr<'a>> {
        let loc = self.loc();
        if self.match_(TokenKind::Others)? {
            return Ok(self.ctx.expr(loc, ExprKind::Others));
        }
        self.parse_discrete_range()
    }
}

impl<'a, 'i> Parser<'a, 'i> {
    /// One association: `choice {| choice} => expression` or a positional
    /// expression.
    fn parse_assoc(&mut self) -> PResult<Assoc<'a>> {
        let loc = self.loc();
        if self.check(TokenKind::Others) {
            let choice = self.parse_choice()?;
            self.expect(TokenKind::Arrow)?;
            let value = self.parse_expression()?;
            return Ok(Assoc {
                loc,
                choices: self.ctx.exprs(vec![choice]),
                value,
            });
        }
        let mut first = self.parse_expression()?;
        if self.match_(TokenKind::DotDot)? {
            let high = self.parse_simple_expression()?;
            first = self.ctx.expr(loc, ExprKind::Range { low: first, high });
        }
        if self.check(TokenKind::Bar) || self.check(TokenKind::Arrow) {
            let mut choices = vec![first];
            while self.match_(TokenKind::Bar)? {
                choices.push(self.parse_choice()?);
            }
            self.expect(TokenKind::Arrow)?;
            let value = self.parse_expression()?;
            return Ok(Assoc {
                loc,
                choices: self.ctx.exprs(choices),
                value,
            });
        }
        Ok(Assoc {
            loc,
            choices: self.ctx.exprs(Vec::new()),
            value: first,
        })
    }

    /// A parenthesized expression or an aggregate, told apart by whether
    /// any top-level `=>` or `,` appeared.
    pub(super) fn parse_paren_or_aggregate(&mut self) -> PResult<&'a Expr<'a>> {
        let loc = self.loc();
        self.expect(TokenKind::LParen)?;
        let items = self.parse_assoc_list()?;
        self.expect(TokenKind::RParen)?;
        if items.len() == 1 && items[0].choices.is_empty() {
            return Ok(items[0].value);
        }
        Ok(self.ctx.expr(
            loc,
            ExprKind::Aggregate {
                items: self.ctx.assocs(items),
            },
        ))
    }

    /// The operand of a qualified expression: either a plain expression or
    /// an aggregate, with the closing paren left for the caller.
    fn parse_aggregate_operand(&mut self) -> PResult<&'a Expr<'a>> {
        let loc = self.loc();
        let items = self.parse_assoc_list()?;
        if items.len() == 1 && items[0].choices.is_empty() {
            return Ok(items[0].value);
        }
        Ok(self.ctx.expr(
            loc,
            ExprKind::Aggregate {
                items: self.ctx.assocs(items),
            },
        ))
    }
}
