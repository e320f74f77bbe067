//! Recursive-descent parser.
//!
//! One token of lookahead plus one token of peek; initialization fetches
//! both. `advance` coalesces the keyword pairs `and then` and `or else`
//! into single tokens so the expression grammar never sees them apart.
//! Parse errors are fatal at first occurrence and surface as `Err(Diag)`.

mod decl;
mod expr;
mod stmt;

#[cfg(test)]
mod tests;

pub use decl::DeclParsing;
pub use expr::ExprParsing;
pub use stmt::StmtParsing;

use crate::arena_ctx::AstCtx;
use crate::ast::{CompilationUnit, ContextItem, ContextItemKind, Decl, DeclKind};
use crate::diag::{Diag, SourceLoc};
use crate::intern::{Interner, Symbol};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

pub type PResult<T> = Result<T, Diag>;

pub struct Parser<'a, 'i> {
    tokens: Vec<Token>,
    fetch_pos: usize,
    cur: Token,
    next: Token,
    pub(super) interner: &'i Interner,
    pub(super) ctx: AstCtx<'a>,
    /// Extra nodes produced by identifier-list expansion, drained by the
    /// enclosing declarative part.
    pub(super) pending_decls: Vec<&'a Decl<'a>>,
}

/// Lex and parse one source file into a compilation unit.
pub fn parse_source<'a>(
    source: &str,
    file_name: &str,
    interner: &mut Interner,
    ctx: AstCtx<'a>,
) -> PResult<&'a CompilationUnit<'a>> {
    let tokens = Lexer::new(source, file_name, interner).tokenize();
    let mut parser = Parser::new(tokens, interner, ctx)?;
    parser.parse_compilation_unit()
}

impl<'a, 'i> Parser<'a, 'i> {
    pub fn new(tokens: Vec<Token>, interner: &'i Interner, ctx: AstCtx<'a>) -> PResult<Self> {
        let placeholder = Token::new(TokenKind::Eof, SourceLoc::default(), Symbol::EMPTY);
        let mut parser = Parser {
            tokens,
            fetch_pos: 0,
            cur: placeholder.clone(),
            next: placeholder,
            interner,
            ctx,
            pending_decls: Vec::new(),
        };
        parser.advance()?;
        parser.advance()?;
        Ok(parser)
    }

    fn fetch(&mut self) -> Token {
        if self.fetch_pos < self.tokens.len() {
            let token = self.tokens[self.fetch_pos].clone();
            self.fetch_pos += 1;
            token
        } else {
            let loc = self.tokens.last().map(|t| t.loc).unwrap_or_default();
            Token::new(TokenKind::Eof, loc, Symbol::EMPTY)
        }
    }

    /// Shift the window one token. The current token is rewritten in place
    /// when a compound keyword pair lines up.
    pub(super) fn advance(&mut self) -> PResult<()> {
        self.cur = std::mem::replace(&mut self.next, Token::new(TokenKind::Eof, SourceLoc::default(), Symbol::EMPTY));
        self.next = self.fetch();
        if self.cur.kind == TokenKind::And && self.next.kind == TokenKind::Then {
            self.cur.kind = TokenKind::AndThen;
            self.next = self.fetch();
        } else if self.cur.kind == TokenKind::Or && self.next.kind == TokenKind::Else {
            self.cur.kind = TokenKind::OrElse;
            self.next = self.fetch();
        }
        if self.cur.kind == TokenKind::Error {
            return Err(Diag::at(
                self.interner,
                self.cur.loc,
                self.interner.resolve(self.cur.text),
            ));
        }
        Ok(())
    }

    pub(super) fn cur(&self) -> &Token {
        &self.cur
    }

    pub(super) fn peeked(&self) -> &Token {
        &self.next
    }

    pub(super) fn loc(&self) -> SourceLoc {
        self.cur.loc
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    pub(super) fn match_(&mut self, kind: TokenKind) -> PResult<bool> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(super) fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(kind) {
            let token = self.cur.clone();
            self.advance()?;
            Ok(token)
        } else {
            Err(self.fatal(format!(
                "expected {}, found {}",
                kind.describe(),
                self.cur.kind.describe()
            )))
        }
    }

    pub(super) fn expect_ident(&mut self) -> PResult<(Symbol, SourceLoc)> {
        let token = self.expect(TokenKind::Ident)?;
        Ok((token.text, token.loc))
    }

    pub(super) fn fatal(&self, message: impl AsRef<str>) -> Diag {
        Diag::at(self.interner, self.cur.loc, message)
    }

    /// The matching designator after `end`, checked when present. Operator
    /// functions repeat their string designator here.
    pub(super) fn end_designator(&mut self, name: Symbol) -> PResult<()> {
        let found = match self.cur.kind {
            TokenKind::Ident => self.cur.text,
            TokenKind::StrLit => self.cur.sval,
            _ => return Ok(()),
        };
        if !self.interner.eq_ci(found, name) {
            return Err(self.fatal(format!(
                "end designator '{}' does not match '{}'",
                self.interner.resolve(found),
                self.interner.resolve(name)
            )));
        }
        self.advance()?;
        Ok(())
    }

    /// context-clause  ::=  { with-clause | use-clause }
    /// compilation     ::=  context-clause  library-unit { library-unit }
    pub fn parse_compilation_unit(&mut self) -> PResult<&'a CompilationUnit<'a>> {
        let loc = self.loc();
        let mut context = Vec::new();
        loop {
            if self.check(TokenKind::With) {
                let item_loc = self.loc();
                self.advance()?;
                let mut names = vec![self.expect_ident()?.0];
                while self.match_(TokenKind::Comma)? {
                    names.push(self.expect_ident()?.0);
                }
                self.expect(TokenKind::Semi)?;
                context.push(ContextItem {
                    loc: item_loc,
                    kind: ContextItemKind::With(self.ctx.syms(names)),
                });
            } else if self.check(TokenKind::Use) {
                let item_loc = self.loc();
                self.advance()?;
                let mut names = vec![self.parse_name()?];
                while self.match_(TokenKind::Comma)? {
                    names.push(self.parse_name()?);
                }
                self.expect(TokenKind::Semi)?;
                context.push(ContextItem {
                    loc: item_loc,
                    kind: ContextItemKind::Use(self.ctx.exprs(names)),
                });
            } else {
                break;
            }
        }

        let mut units: Vec<&'a Decl<'a>> = Vec::new();
        while !self.check(TokenKind::Eof) {
            let decl = self
                .parse_declaration()?
                .ok_or_else(|| self.fatal("library unit expected"))?;
            match decl.kind {
                DeclKind::Subprogram { .. }
                | DeclKind::Package { .. }
                | DeclKind::Generic { .. } => units.push(decl),
                _ => return Err(Diag::at(self.interner, decl.loc, "not a library unit")),
            }
        }
        if units.is_empty() {
            return Err(self.fatal("empty compilation"));
        }

        Ok(self.ctx.arena.alloc(CompilationUnit {
            loc,
            context: self.ctx.context_items(context),
            units: self.ctx.decls(units),
        }))
    }
}
