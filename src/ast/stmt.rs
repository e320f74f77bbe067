use std::cell::Cell;

use crate::ast::decl::{Decl, Handler, Param};
use crate::ast::expr::Expr;
use crate::diag::SourceLoc;
use crate::intern::Symbol;
use crate::symtab::SymbolId;

/// A statement node. `label` carries either a `<<name>>` marker or the
/// `name :` prefix of a named loop or block.
#[derive(Debug)]
pub struct Stmt<'a> {
    pub loc: SourceLoc,
    pub label: Option<Symbol>,
    pub kind: StmtKind<'a>,
}

impl<'a> Stmt<'a> {
    pub fn new(loc: SourceLoc, kind: StmtKind<'a>) -> Self {
        Stmt {
            loc,
            label: None,
            kind,
        }
    }
}

#[derive(Debug)]
pub enum StmtKind<'a> {
    Null,
    Assign {
        target: &'a Expr<'a>,
        value: &'a Expr<'a>,
    },
    /// Procedure call; the expression is an `Ident`, `Selected`, or `Call`.
    Call(&'a Expr<'a>),
    If {
        arms: &'a [IfArm<'a>],
        else_stmts: Option<&'a [&'a Stmt<'a>]>,
    },
    Case {
        selector: &'a Expr<'a>,
        alts: &'a [CaseAlt<'a>],
    },
    Loop {
        scheme: LoopScheme<'a>,
        body: &'a [&'a Stmt<'a>],
    },
    Block {
        decls: &'a [&'a Decl<'a>],
        stmts: &'a [&'a Stmt<'a>],
        handlers: &'a [Handler<'a>],
    },
    Exit {
        loop_name: Option<Symbol>,
        when: Option<&'a Expr<'a>>,
    },
    Return {
        value: Option<&'a Expr<'a>>,
    },
    Goto {
        target: Symbol,
    },
    /// `raise;` re-raises inside a handler; `raise NAME;` otherwise.
    Raise {
        name: Option<&'a Expr<'a>>,
    },
    // Tasking statements are parsed and preserved but have no effect in
    // this implementation.
    Delay {
        amount: &'a Expr<'a>,
    },
    Abort {
        tasks: &'a [&'a Expr<'a>],
    },
    Accept {
        entry: Symbol,
        params: &'a [Param<'a>],
        body: Option<&'a [&'a Stmt<'a>]>,
    },
    Select {
        arms: &'a [SelectArm<'a>],
        else_stmts: Option<&'a [&'a Stmt<'a>]>,
    },
}

/// `if`/`elsif` arm: condition plus its statement sequence.
#[derive(Debug)]
pub struct IfArm<'a> {
    pub cond: &'a Expr<'a>,
    pub stmts: &'a [&'a Stmt<'a>],
}

/// One `when choices => statements` alternative of a case statement.
#[derive(Debug)]
pub struct CaseAlt<'a> {
    pub loc: SourceLoc,
    pub choices: &'a [&'a Expr<'a>],
    pub stmts: &'a [&'a Stmt<'a>],
}

#[derive(Debug)]
pub enum LoopScheme<'a> {
    Forever,
    While(&'a Expr<'a>),
    For {
        var: Symbol,
        reverse: bool,
        range: &'a Expr<'a>,
        /// Loop-variable symbol, committed during resolution.
        sym: Cell<Option<SymbolId>>,
    },
}

/// One alternative of a `select` statement (parse-only construct).
#[derive(Debug)]
pub struct SelectArm<'a> {
    pub guard: Option<&'a Expr<'a>>,
    pub stmts: &'a [&'a Stmt<'a>],
}
