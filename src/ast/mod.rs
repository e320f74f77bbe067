pub mod decl;
pub mod expr;
pub mod stmt;

pub use decl::{
    Body, CompilationUnit, Component, ContextItem, ContextItemKind, Decl, DeclKind, Handler,
    Param, ParamMode, SubpKind, SubpSpec, TypeDef,
};
pub use expr::{Assoc, BinOp, CallClass, Constraint, Expr, ExprKind, SubtypeInd, UnOp};
pub use stmt::{CaseAlt, IfArm, LoopScheme, SelectArm, Stmt, StmtKind};
