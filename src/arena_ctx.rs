use crate::arena::Arena;
use crate::ast::{
    Assoc, Body, CaseAlt, Component, ContextItem, Decl, DeclKind, Expr, ExprKind, Handler, IfArm,
    Param, SelectArm, Stmt, StmtKind, SubtypeInd,
};
use crate::bignum::BigInt;
use crate::diag::SourceLoc;
use crate::intern::Symbol;

/// Allocation context threaded through the parser. Wraps the arena that
/// owns every AST node and provides typed builders for the node families.
#[derive(Clone, Copy)]
pub struct AstCtx<'a> {
    pub arena: &'a Arena,
}

impl<'a> AstCtx<'a> {
    pub fn new(arena: &'a Arena) -> Self {
        AstCtx { arena }
    }

    pub fn expr(&self, loc: SourceLoc, kind: ExprKind<'a>) -> &'a Expr<'a> {
        self.arena.alloc(Expr::new(loc, kind))
    }

    pub fn stmt(&self, loc: SourceLoc, kind: StmtKind<'a>) -> &'a Stmt<'a> {
        self.arena.alloc(Stmt::new(loc, kind))
    }

    pub fn labeled_stmt(&self, loc: SourceLoc, label: Option<Symbol>, kind: StmtKind<'a>) -> &'a Stmt<'a> {
        let mut stmt = Stmt::new(loc, kind);
        stmt.label = label;
        self.arena.alloc(stmt)
    }

    pub fn decl(&self, loc: SourceLoc, kind: DeclKind<'a>) -> &'a Decl<'a> {
        self.arena.alloc(Decl::new(loc, kind))
    }

    pub fn subtype_ind(&self, ind: SubtypeInd<'a>) -> &'a SubtypeInd<'a> {
        self.arena.alloc(ind)
    }

    pub fn body(&self, body: Body<'a>) -> &'a Body<'a> {
        self.arena.alloc(body)
    }

    pub fn big(&self, value: BigInt) -> &'a BigInt {
        self.arena.alloc(value)
    }

    pub fn exprs(&self, items: Vec<&'a Expr<'a>>) -> &'a [&'a Expr<'a>] {
        self.arena.alloc_slice(items)
    }

    pub fn stmts(&self, items: Vec<&'a Stmt<'a>>) -> &'a [&'a Stmt<'a>] {
        self.arena.alloc_slice(items)
    }

    pub fn decls(&self, items: Vec<&'a Decl<'a>>) -> &'a [&'a Decl<'a>] {
        self.arena.alloc_slice(items)
    }

    pub fn assocs(&self, items: Vec<Assoc<'a>>) -> &'a [Assoc<'a>] {
        self.arena.alloc_slice(items)
    }

    pub fn params(&self, items: Vec<Param<'a>>) -> &'a [Param<'a>] {
        self.arena.alloc_slice(items)
    }

    pub fn components(&self, items: Vec<Component<'a>>) -> &'a [Component<'a>] {
        self.arena.alloc_slice(items)
    }

    pub fn handlers(&self, items: Vec<Handler<'a>>) -> &'a [Handler<'a>] {
        self.arena.alloc_slice(items)
    }

    pub fn if_arms(&self, items: Vec<IfArm<'a>>) -> &'a [IfArm<'a>] {
        self.arena.alloc_slice(items)
    }

    pub fn case_alts(&self, items: Vec<CaseAlt<'a>>) -> &'a [CaseAlt<'a>] {
        self.arena.alloc_slice(items)
    }

    pub fn select_arms(&self, items: Vec<SelectArm<'a>>) -> &'a [SelectArm<'a>] {
        self.arena.alloc_slice(items)
    }

    pub fn syms(&self, items: Vec<Symbol>) -> &'a [Symbol] {
        self.arena.alloc_slice(items)
    }

    pub fn literals(&self, items: Vec<(Symbol, SourceLoc)>) -> &'a [(Symbol, SourceLoc)] {
        self.arena.alloc_slice(items)
    }

    pub fn context_items(&self, items: Vec<ContextItem<'a>>) -> &'a [ContextItem<'a>] {
        self.arena.alloc_slice(items)
    }
}
