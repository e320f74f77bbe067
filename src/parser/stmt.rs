//! Statement grammar, including the tasking forms that later phases keep
//! inert.

use super::decl::DeclParsing;
use super::expr::ExprParsing;
use super::{PResult, Parser};
use crate::ast::{
    CaseAlt, Expr, Handler, IfArm, LoopScheme, SelectArm, Stmt, StmtKind,
};
use crate::token::TokenKind;

pub trait StmtParsing<'a> {
    fn parse_statement(&mut self) -> PResult<&'a Stmt<'a>>;
    fn parse_sequence(&mut self) -> PResult<Vec<&'a Stmt<'a>>>;
    fn parse_handlers(&mut self) -> PResult<Vec<Handler<'a>>>;
}

fn ends_sequence(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::End
            | TokenKind::Elsif
            | TokenKind::Else
            | TokenKind::When
            | TokenKind::Or
            | TokenKind::Exception
            | TokenKind::Eof
    )
}

impl<'a, 'i> StmtParsing<'a> for Parser<'a, 'i> {
    fn parse_statement(&mut self) -> PResult<&'a Stmt<'a>> {
        // <<name>> labels, then the `name :` prefix of loops and blocks.
        let mut label = None;
        while self.check(TokenKind::LtLt) {
            self.advance()?;
            let (name, _) = self.expect_ident()?;
            self.expect(TokenKind::GtGt)?;
            label = Some(name);
        }
        if self.check(TokenKind::Ident) && self.peeked().kind == TokenKind::Colon {
            label = Some(self.cur().text);
            self.advance()?;
            self.advance()?;
            if !matches!(
                self.cur().kind,
                TokenKind::Loop
                    | TokenKind::While
                    | TokenKind::For
                    | TokenKind::Declare
                    | TokenKind::Begin
            ) {
                return Err(self.fatal("loop or block expected after statement label"));
            }
        }
        let loc = self.loc();
        let kind = self.parse_statement_inner()?;
        Ok(self.ctx.labeled_stmt(loc, label, kind))
    }

    fn parse_sequence(&mut self) -> PResult<Vec<&'a Stmt<'a>>> {
        let mut stmts = Vec::new();
        while !ends_sequence(self.cur().kind) {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    /// exception-part ::= { when choice {| choice} => statements }
    fn parse_handlers(&mut self) -> PResult<Vec<Handler<'a>>> {
        let mut handlers = Vec::new();
        while self.check(TokenKind::When) {
            let loc = self.loc();
            self.advance()?;
            let mut choices = vec![self.parse_choice()?];
            while self.match_(TokenKind::Bar)? {
                choices.push(self.parse_choice()?);
            }
            self.expect(TokenKind::Arrow)?;
            let stmts = self.parse_sequence()?;
            handlers.push(Handler {
                loc,
                choices: self.ctx.exprs(choices),
                stmts: self.ctx.stmts(stmts),
            });
        }
        Ok(handlers)
    }
}

impl<'a, 'i> Parser<'a, 'i> {
    fn parse_statement_inner(&mut self) -> PResult<StmtKind<'a>> {
        match self.cur().kind {
            TokenKind::Null => {
                self.advance()?;
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Null)
            }
            TokenKind::Ident => self.parse_assignment_or_call(),
            TokenKind::If => self.parse_if(),
            TokenKind::Case => self.parse_case(),
            TokenKind::Loop | TokenKind::While | TokenKind::For => self.parse_loop(),
            TokenKind::Declare | TokenKind::Begin => self.parse_block(),
            TokenKind::Exit => self.parse_exit(),
            TokenKind::Return => {
                self.advance()?;
                let value = if self.check(TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Return { value })
            }
            TokenKind::Goto => {
                self.advance()?;
                let (target, _) = self.expect_ident()?;
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Goto { target })
            }
            TokenKind::Raise => {
                self.advance()?;
                let name = if self.check(TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_name()?)
                };
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Raise { name })
            }
            TokenKind::Delay => {
                self.advance()?;
                let amount = self.parse_expression()?;
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Delay { amount })
            }
            TokenKind::Abort => {
                self.advance()?;
                let mut tasks = vec![self.parse_name()?];
                while self.match_(TokenKind::Comma)? {
                    tasks.push(self.parse_name()?);
                }
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Abort {
                    tasks: self.ctx.exprs(tasks),
                })
            }
            TokenKind::Accept => self.parse_accept(),
            TokenKind::Select => self.parse_select(),
            TokenKind::Terminate => {
                // Only meaningful inside select alternatives; inert here.
                self.advance()?;
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Null)
            }
            found => Err(self.fatal(format!("statement expected, found {}", found.describe()))),
        }
    }

    /// Assignment and procedure call share a prefix: parse the name, then
    /// `:=` decides.
    fn parse_assignment_or_call(&mut self) -> PResult<StmtKind<'a>> {
        let target = self.parse_name()?;
        if self.match_(TokenKind::Assign)? {
            let value = self.parse_expression()?;
            self.expect(TokenKind::Semi)?;
            return Ok(StmtKind::Assign { target, value });
        }
        self.expect(TokenKind::Semi)?;
        Ok(StmtKind::Call(target))
    }

    fn parse_if(&mut self) -> PResult<StmtKind<'a>> {
        self.expect(TokenKind::If)?;
        let mut arms = Vec::new();
        let cond = self.parse_expression()?;
        self.expect(TokenKind::Then)?;
        let stmts = self.parse_sequence()?;
        arms.push(IfArm {
            cond,
            stmts: self.ctx.stmts(stmts),
        });
        while self.match_(TokenKind::Elsif)? {
            let cond = self.parse_expression()?;
            self.expect(TokenKind::Then)?;
            let stmts = self.parse_sequence()?;
            arms.push(IfArm {
                cond,
                stmts: self.ctx.stmts(stmts),
            });
        }
        let else_stmts = if self.match_(TokenKind::Else)? {
            let stmts = self.parse_sequence()?;
            Some(self.ctx.stmts(stmts))
        } else {
            None
        };
        self.expect(TokenKind::End)?;
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::Semi)?;
        Ok(StmtKind::If {
            arms: self.ctx.if_arms(arms),
            else_stmts,
        })
    }

    fn parse_case(&mut self) -> PResult<StmtKind<'a>> {
        self.expect(TokenKind::Case)?;
        let selector = self.parse_expression()?;
        self.expect(TokenKind::Is)?;
        let mut alts = Vec::new();
        while self.check(TokenKind::When) {
            let loc = self.loc();
            self.advance()?;
            let mut choices = vec![self.parse_choice()?];
            while self.match_(TokenKind::Bar)? {
                choices.push(self.parse_choice()?);
            }
            self.expect(TokenKind::Arrow)?;
            let stmts = self.parse_sequence()?;
            alts.push(CaseAlt {
                loc,
                choices: self.ctx.exprs(choices),
                stmts: self.ctx.stmts(stmts),
            });
        }
        self.expect(TokenKind::End)?;
        self.expect(TokenKind::Case)?;
        self.expect(TokenKind::Semi)?;
        Ok(StmtKind::Case {
            selector,
            alts: self.ctx.case_alts(alts),
        })
    }

    fn parse_loop(&mut self) -> PResult<StmtKind<'a>> {
        let scheme = match self.cur().kind {
            TokenKind::While => {
                self.advance()?;
                LoopScheme::While(self.parse_expression()?)
            }
            TokenKind::For => {
                self.advance()?;
                let (var, _) = self.expect_ident()?;
                self.expect(TokenKind::In)?;
                let reverse = self.match_(TokenKind::Reverse)?;
                let range = self.parse_discrete_range()?;
                LoopScheme::For {
                    var,
                    reverse,
                    range,
                    sym: std::cell::Cell::new(None),
                }
            }
            _ => LoopScheme::Forever,
        };
        self.expect(TokenKind::Loop)?;
        let body = self.parse_sequence()?;
        self.expect(TokenKind::End)?;
        self.expect(TokenKind::Loop)?;
        if self.check(TokenKind::Ident) {
            self.advance()?;
        }
        self.expect(TokenKind::Semi)?;
        Ok(StmtKind::Loop {
            scheme,
            body: self.ctx.stmts(body),
        })
    }

    fn parse_block(&mut self) -> PResult<StmtKind<'a>> {
        let decls = if self.match_(TokenKind::Declare)? {
            self.parse_declarative_part()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::Begin)?;
        let stmts = self.parse_sequence()?;
        let handlers = if self.match_(TokenKind::Exception)? {
            self.parse_handlers()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::End)?;
        if self.check(TokenKind::Ident) {
            self.advance()?;
        }
        self.expect(TokenKind::Semi)?;
        Ok(StmtKind::Block {
            decls: self.ctx.decls(decls),
            stmts: self.ctx.stmts(stmts),
            handlers: self.ctx.handlers(handlers),
        })
    }

    fn parse_exit(&mut self) -> PResult<StmtKind<'a>> {
        self.expect(TokenKind::Exit)?;
        let loop_name = if self.check(TokenKind::Ident) {
            let (name, _) = self.expect_ident()?;
            Some(name)
        } else {
            None
        };
        let when = if self.match_(TokenKind::When)? {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semi)?;
        Ok(StmtKind::Exit { loop_name, when })
    }

    fn parse_accept(&mut self) -> PResult<StmtKind<'a>> {
        self.expect(TokenKind::Accept)?;
        let (entry, _) = self.expect_ident()?;
        let params = if self.check(TokenKind::LParen) {
            self.parse_formal_part()?
        } else {
            Vec::new()
        };
        let body = if self.match_(TokenKind::Do)? {
            let stmts = self.parse_sequence()?;
            self.expect(TokenKind::End)?;
            if self.check(TokenKind::Ident) {
                self.advance()?;
            }
            Some(self.ctx.stmts(stmts))
        } else {
            None
        };
        self.expect(TokenKind::Semi)?;
        Ok(StmtKind::Accept {
            entry,
            params: self.ctx.params(params),
            body,
        })
    }

    fn parse_select(&mut self) -> PResult<StmtKind<'a>> {
        self.expect(TokenKind::Select)?;
        let mut arms = Vec::new();
        loop {
            let guard: Option<&'a Expr<'a>> = if self.match_(TokenKind::When)? {
                let cond = self.parse_expression()?;
                self.expect(TokenKind::Arrow)?;
                Some(cond)
            } else {
                None
            };
            let stmts = self.parse_sequence()?;
            arms.push(SelectArm {
                guard,
                stmts: self.ctx.stmts(stmts),
            });
            if !self.match_(TokenKind::Or)? {
                break;
            }
        }
        let else_stmts = if self.match_(TokenKind::Else)? {
            let stmts = self.parse_sequence()?;
            Some(self.ctx.stmts(stmts))
        } else {
            None
        };
        self.expect(TokenKind::End)?;
        self.expect(TokenKind::Select)?;
        self.expect(TokenKind::Semi)?;
        Ok(StmtKind::Select {
            arms: self.ctx.select_arms(arms),
            else_stmts,
        })
    }
}
