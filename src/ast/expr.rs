use std::cell::Cell;

use crate::bignum::BigInt;
use crate::diag::SourceLoc;
use crate::intern::Symbol;
use crate::symtab::SymbolId;
use crate::types::TypeId;

/// Binary operators, in the order the grammar layers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    And,
    AndThen,
    Or,
    OrElse,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Cat,
    Mul,
    Div,
    Mod,
    Rem,
    Pow,
}

impl BinOp {
    /// The short-circuit forms evaluate their right operand conditionally.
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinOp::AndThen | BinOp::OrElse)
    }

    pub fn is_logical(self) -> bool {
        matches!(
            self,
            BinOp::And | BinOp::AndThen | BinOp::Or | BinOp::OrElse | BinOp::Xor
        )
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Minus,
    Not,
    Abs,
}

/// What a call-shaped node turned out to be once names were resolved.
/// The parser leaves `Unresolved`; the resolver commits one of the others
/// and the evaluator and emitter dispatch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    Unresolved,
    Subprogram,
    Index,
    Convert,
}

/// An expression node. The header fields are shared by every variant:
/// `ty` and `sym` start empty and are committed exactly once during
/// resolution.
#[derive(Debug)]
pub struct Expr<'a> {
    pub loc: SourceLoc,
    pub ty: Cell<Option<TypeId>>,
    pub sym: Cell<Option<SymbolId>>,
    pub kind: ExprKind<'a>,
}

impl<'a> Expr<'a> {
    pub fn new(loc: SourceLoc, kind: ExprKind<'a>) -> Self {
        Expr {
            loc,
            ty: Cell::new(None),
            sym: Cell::new(None),
            kind,
        }
    }

    /// Resolved type; only meaningful after analysis has run.
    pub fn type_id(&self) -> Option<TypeId> {
        self.ty.get()
    }
}

#[derive(Debug)]
pub enum ExprKind<'a> {
    /// Identifier reference, including enumeration literals.
    Ident(Symbol),
    /// Integer literal; `big` is present when the value exceeds 64 bits.
    Int { value: i64, big: Option<&'a BigInt> },
    Real(f64),
    /// Character literal as its ordinal position.
    Char(u8),
    /// String literal, undoubled.
    Str(Symbol),
    Null,
    /// The `others` choice in aggregates, case alternatives, and handlers.
    Others,

    Binary {
        op: BinOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
        /// Set when resolution folded the operation to a literal value.
        folded: Cell<Option<i64>>,
    },
    Unary {
        op: UnOp,
        operand: &'a Expr<'a>,
    },
    /// `prefix'Designator` or `prefix'Designator (args)`.
    Attribute {
        prefix: &'a Expr<'a>,
        designator: Symbol,
        args: &'a [&'a Expr<'a>],
    },
    /// `mark'(operand)`.
    Qualified {
        mark: &'a Expr<'a>,
        operand: &'a Expr<'a>,
    },
    /// `callee (assocs)` — a subprogram call, an array indexing, or a type
    /// conversion; see [`CallClass`].
    Call {
        callee: &'a Expr<'a>,
        args: &'a [Assoc<'a>],
        class: Cell<CallClass>,
    },
    /// `prefix (low .. high)`.
    Slice {
        prefix: &'a Expr<'a>,
        range: &'a Expr<'a>,
    },
    /// `prefix.selector`.
    Selected {
        prefix: &'a Expr<'a>,
        selector: Symbol,
    },
    /// `new mark` or `new mark'(init)`.
    Allocator {
        mark: &'a Expr<'a>,
        init: Option<&'a Expr<'a>>,
    },
    /// `prefix.all`.
    Deref {
        prefix: &'a Expr<'a>,
    },
    /// Parenthesized aggregate, positional and/or named.
    Aggregate {
        items: &'a [Assoc<'a>],
    },
    /// `low .. high`.
    Range {
        low: &'a Expr<'a>,
        high: &'a Expr<'a>,
    },
    /// `operand [not] in mark-or-range`.
    Membership {
        operand: &'a Expr<'a>,
        mark: &'a Expr<'a>,
        negated: bool,
    },
}

/// One association in a call argument list or aggregate: zero or more
/// choices (empty means positional) and the associated value.
#[derive(Debug)]
pub struct Assoc<'a> {
    pub loc: SourceLoc,
    pub choices: &'a [&'a Expr<'a>],
    pub value: &'a Expr<'a>,
}

/// A subtype indication: a type mark plus an optional constraint.
#[derive(Debug)]
pub struct SubtypeInd<'a> {
    pub loc: SourceLoc,
    pub mark: &'a Expr<'a>,
    pub constraint: Option<Constraint<'a>>,
}

#[derive(Debug)]
pub enum Constraint<'a> {
    /// `range low .. high`, or a bare range after a type mark.
    Range(&'a Expr<'a>),
    /// Index constraints: `(1 .. 10, 1 .. 20)`.
    Index(&'a [&'a Expr<'a>]),
    /// `digits n [range ..]`.
    Digits(&'a Expr<'a>, Option<&'a Expr<'a>>),
    /// `delta d [range ..]`.
    Delta(&'a Expr<'a>, Option<&'a Expr<'a>>),
    /// Discriminant constraint: `(name => value, ...)`.
    Discriminant(&'a [Assoc<'a>]),
}
