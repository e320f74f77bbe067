//! Low-level IR emission.
//!
//! An alternative consumer of the resolved AST: instead of evaluating,
//! walk it and print a line-oriented IR to a string. One virtual register
//! per expression result; labels for control flow. Corners with no IR
//! counterpart (tasking, generics) emit a `; skip` line and continue —
//! emission is best-effort and never fatal.

use std::fmt::Write;

use crate::analysis::SemCtx;
use crate::ast::{
    BinOp, Body, CallClass, CompilationUnit, Decl, DeclKind, Expr, ExprKind, LoopScheme, Stmt,
    StmtKind, UnOp,
};
use crate::intern::Interner;
use crate::symtab::SymKind;

pub struct Emitter<'s, 'a, 'i> {
    sem: &'s SemCtx<'a>,
    interner: &'i Interner,
    out: String,
    next_reg: u32,
    next_label: u32,
    /// Innermost loop's (continue, break) labels, for exit statements.
    loop_labels: Vec<(u32, u32)>,
}

impl<'s, 'a, 'i> Emitter<'s, 'a, 'i> {
    pub fn new(sem: &'s SemCtx<'a>, interner: &'i Interner) -> Self {
        Emitter {
            sem,
            interner,
            out: String::new(),
            next_reg: 0,
            next_label: 0,
            loop_labels: Vec::new(),
        }
    }

    pub fn emit_unit(mut self, unit: &'a CompilationUnit<'a>, file_name: &str) -> String {
        let _ = writeln!(self.out, "unit \"{}\"", file_name);
        for &decl in unit.units {
            self.emit_library_decl(decl);
        }
        self.out
    }

    fn reg(&mut self) -> u32 {
        self.next_reg += 1;
        self.next_reg
    }

    fn label(&mut self) -> u32 {
        self.next_label += 1;
        self.next_label
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.out, "\t{}", text.as_ref());
    }

    fn name_of(&self, decl_sym: Option<crate::symtab::SymbolId>) -> String {
        match decl_sym {
            Some(id) => self.interner.resolve(self.sem.syms.get(id).name).to_ascii_lowercase(),
            None => String::from("?"),
        }
    }

    fn emit_library_decl(&mut self, decl: &'a Decl<'a>) {
        match &decl.kind {
            DeclKind::Subprogram {
                spec,
                body: Some(body),
                ..
            } => {
                let name = self.interner.resolve(spec.name).to_ascii_lowercase();
                let params: Vec<String> = spec
                    .params
                    .iter()
                    .map(|p| self.interner.resolve(p.name).to_ascii_lowercase())
                    .collect();
                let _ = writeln!(self.out, "func {}({})", name, params.join(", "));
                self.emit_body(body);
                self.line("ret");
                let _ = writeln!(self.out, "endfunc");
            }
            DeclKind::Package {
                visible,
                private_part,
                body,
                ..
            } => {
                for &d in visible.iter().chain(private_part.iter()) {
                    self.emit_library_decl(d);
                }
                if let Some(body) = body {
                    for &d in body.decls {
                        self.emit_library_decl(d);
                    }
                    if !body.stmts.is_empty() {
                        let _ = writeln!(self.out, "func {}.__elab()", self.name_of(decl.sym.get()));
                        for &s in body.stmts {
                            self.emit_stmt(s);
                        }
                        self.line("ret");
                        let _ = writeln!(self.out, "endfunc");
                    }
                }
            }
            DeclKind::Object { init, .. } => {
                let name = self.name_of(decl.sym.get());
                let _ = writeln!(self.out, "global {}", name);
                if let Some(init) = init {
                    let _ = writeln!(self.out, "func {}.__init()", name);
                    let r = self.emit_expr(init);
                    self.line(format!("store {}, %{}", name, r));
                    self.line("ret");
                    let _ = writeln!(self.out, "endfunc");
                }
            }
            DeclKind::Generic { .. } | DeclKind::Task { .. } => {
                let _ = writeln!(self.out, "; skip {}", describe_decl(decl));
            }
            _ => {}
        }
    }

    fn emit_body(&mut self, body: &'a Body<'a>) {
        for &d in body.decls {
            self.emit_local_decl(d);
        }
        for &s in body.stmts {
            self.emit_stmt(s);
        }
        for handler in body.handlers {
            let l = self.label();
            let _ = writeln!(self.out, "handler L{}", l);
            for &s in handler.stmts {
                self.emit_stmt(s);
            }
        }
    }

    fn emit_local_decl(&mut self, decl: &'a Decl<'a>) {
        match &decl.kind {
            DeclKind::Object { init, .. } => {
                let name = self.name_of(decl.sym.get());
                self.line(format!("local {}", name));
                if let Some(init) = init {
                    let r = self.emit_expr(init);
                    self.line(format!("store {}, %{}", name, r));
                }
            }
            DeclKind::Number { value, .. } => {
                let name = self.name_of(decl.sym.get());
                let r = self.emit_expr(value);
                self.line(format!("const.named {}, %{}", name, r));
            }
            DeclKind::Subprogram { body: Some(_), .. } => {
                // Nested bodies lift to their own functions.
                self.emit_library_decl(decl);
            }
            DeclKind::Type { .. }
            | DeclKind::Subtype { .. }
            | DeclKind::ExceptionDecl { .. }
            | DeclKind::UseClause { .. }
            | DeclKind::Pragma { .. }
            | DeclKind::Subprogram { .. } => {}
            _ => {
                let _ = writeln!(self.out, "\t; skip {}", describe_decl(decl));
            }
        }
    }

    fn emit_stmt(&mut self, stmt: &'a Stmt<'a>) {
        if let Some(label) = stmt.label {
            let _ = writeln!(
                self.out,
                "label {}",
                self.interner.resolve(label).to_ascii_lowercase()
            );
        }
        match &stmt.kind {
            StmtKind::Null => self.line("nop"),
            StmtKind::Assign { target, value } => {
                let v = self.emit_expr(value);
                self.emit_store(target, v);
            }
            StmtKind::Call(callee) => {
                self.emit_expr(callee);
            }
            StmtKind::If { arms, else_stmts } => {
                let end = self.label();
                for arm in *arms {
                    let next = self.label();
                    let c = self.emit_expr(arm.cond);
                    self.line(format!("brz %{}, L{}", c, next));
                    for &s in arm.stmts {
                        self.emit_stmt(s);
                    }
                    self.line(format!("br L{}", end));
                    let _ = writeln!(self.out, "label L{}", next);
                }
                if let Some(stmts) = *else_stmts {
                    for &s in stmts {
                        self.emit_stmt(s);
                    }
                }
                let _ = writeln!(self.out, "label L{}", end);
            }
            StmtKind::Case { selector, alts } => {
                let end = self.label();
                let sel = self.emit_expr(selector);
                for alt in *alts {
                    let next = self.label();
                    let body = self.label();
                    for &choice in alt.choices {
                        match choice.kind {
                            ExprKind::Others => {
                                self.line(format!("br L{}", body));
                            }
                            ExprKind::Range { low, high } => {
                                let a = self.emit_expr(low);
                                let b = self.emit_expr(high);
                                let t = self.reg();
                                self.line(format!(
                                    "%{} = inrange %{}, %{}, %{}",
                                    t, sel, a, b
                                ));
                                self.line(format!("brnz %{}, L{}", t, body));
                            }
                            _ => {
                                let c = self.emit_expr(choice);
                                let t = self.reg();
                                self.line(format!("%{} = cmp.eq %{}, %{}", t, sel, c));
                                self.line(format!("brnz %{}, L{}", t, body));
                            }
                        }
                    }
                    self.line(format!("br L{}", next));
                    let _ = writeln!(self.out, "label L{}", body);
                    for &s in alt.stmts {
                        self.emit_stmt(s);
                    }
                    self.line(format!("br L{}", end));
                    let _ = writeln!(self.out, "label L{}", next);
                }
                let _ = writeln!(self.out, "label L{}", end);
            }
            StmtKind::Loop { scheme, body } => {
                let head = self.label();
                let exit = self.label();
                match scheme {
                    LoopScheme::Forever => {
                        let _ = writeln!(self.out, "label L{}", head);
                        self.loop_labels.push((head, exit));
                        for &s in *body {
                            self.emit_stmt(s);
                        }
                        self.loop_labels.pop();
                        self.line(format!("br L{}", head));
                    }
                    LoopScheme::While(cond) => {
                        let _ = writeln!(self.out, "label L{}", head);
                        let c = self.emit_expr(cond);
                        self.line(format!("brz %{}, L{}", c, exit));
                        self.loop_labels.push((head, exit));
                        for &s in *body {
                            self.emit_stmt(s);
                        }
                        self.loop_labels.pop();
                        self.line(format!("br L{}", head));
                    }
                    LoopScheme::For {
                        var,
                        reverse,
                        range,
                        ..
                    } => {
                        let v = self.interner.resolve(*var).to_ascii_lowercase();
                        let (lo, hi) = self.emit_range(range);
                        if *reverse {
                            self.line(format!("store {}, %{}", v, hi));
                        } else {
                            self.line(format!("store {}, %{}", v, lo));
                        }
                        let _ = writeln!(self.out, "label L{}", head);
                        let cur = self.reg();
                        self.line(format!("%{} = load {}", cur, v));
                        let t = self.reg();
                        if *reverse {
                            self.line(format!("%{} = cmp.lt %{}, %{}", t, cur, lo));
                        } else {
                            self.line(format!("%{} = cmp.gt %{}, %{}", t, cur, hi));
                        }
                        self.line(format!("brnz %{}, L{}", t, exit));
                        self.loop_labels.push((head, exit));
                        for &s in *body {
                            self.emit_stmt(s);
                        }
                        self.loop_labels.pop();
                        let one = self.reg();
                        self.line(format!("%{} = const 1", one));
                        let next = self.reg();
                        let op = if *reverse { "sub" } else { "add" };
                        self.line(format!("%{} = {} %{}, %{}", next, op, cur, one));
                        self.line(format!("store {}, %{}", v, next));
                        self.line(format!("br L{}", head));
                    }
                }
                let _ = writeln!(self.out, "label L{}", exit);
            }
            StmtKind::Block {
                decls,
                stmts,
                handlers,
            } => {
                for &d in *decls {
                    self.emit_local_decl(d);
                }
                for &s in *stmts {
                    self.emit_stmt(s);
                }
                for handler in *handlers {
                    let l = self.label();
                    let _ = writeln!(self.out, "handler L{}", l);
                    for &s in handler.stmts {
                        self.emit_stmt(s);
                    }
                }
            }
            StmtKind::Exit { when, .. } => {
                let target = self.loop_labels.last().map(|&(_, exit)| exit);
                match (when, target) {
                    (Some(cond), Some(exit)) => {
                        let c = self.emit_expr(cond);
                        self.line(format!("brnz %{}, L{}", c, exit));
                    }
                    (None, Some(exit)) => self.line(format!("br L{}", exit)),
                    _ => self.line("; skip exit outside loop"),
                }
            }
            StmtKind::Return { value } => {
                match value {
                    Some(value) => {
                        let r = self.emit_expr(value);
                        self.line(format!("ret %{}", r));
                    }
                    None => self.line("ret"),
                };
            }
            StmtKind::Goto { target } => {
                self.line(format!(
                    "br {}",
                    self.interner.resolve(*target).to_ascii_lowercase()
                ));
            }
            StmtKind::Raise { name } => match name {
                Some(name) => {
                    let text = self.expr_name(name);
                    self.line(format!("raise {}", text));
                }
                None => self.line("reraise"),
            },
            StmtKind::Delay { .. }
            | StmtKind::Abort { .. }
            | StmtKind::Accept { .. }
            | StmtKind::Select { .. } => {
                self.line("; skip tasking statement");
            }
        }
    }

    fn emit_store(&mut self, target: &'a Expr<'a>, value_reg: u32) {
        match &target.kind {
            ExprKind::Ident(name) => {
                self.line(format!(
                    "store {}, %{}",
                    self.interner.resolve(*name).to_ascii_lowercase(),
                    value_reg
                ));
            }
            ExprKind::Call {
                callee,
                args,
                class,
            } if class.get() == CallClass::Index => {
                let base = self.emit_expr(callee);
                let idx = self.emit_expr(args[0].value);
                self.line(format!("store.elem %{}, %{}, %{}", base, idx, value_reg));
            }
            ExprKind::Selected { prefix, selector } => {
                let base = self.emit_expr(prefix);
                self.line(format!(
                    "store.field %{}, {}, %{}",
                    base,
                    self.interner.resolve(*selector).to_ascii_lowercase(),
                    value_reg
                ));
            }
            ExprKind::Deref { prefix } => {
                let base = self.emit_expr(prefix);
                self.line(format!("store.ind %{}, %{}", base, value_reg));
            }
            _ => self.line("; skip unsupported store target"),
        }
    }

    fn emit_expr(&mut self, e: &'a Expr<'a>) -> u32 {
        match &e.kind {
            ExprKind::Int { value, .. } => {
                let r = self.reg();
                self.line(format!("%{} = const {}", r, value));
                r
            }
            ExprKind::Real(v) => {
                let r = self.reg();
                self.line(format!("%{} = fconst {}", r, v));
                r
            }
            ExprKind::Char(c) => {
                let r = self.reg();
                self.line(format!("%{} = const {}", r, c));
                r
            }
            ExprKind::Str(s) => {
                let r = self.reg();
                self.line(format!(
                    "%{} = str \"{}\"",
                    r,
                    self.interner.resolve(*s).escape_default()
                ));
                r
            }
            ExprKind::Null => {
                let r = self.reg();
                self.line(format!("%{} = null", r));
                r
            }
            ExprKind::Ident(_) => {
                let r = self.reg();
                // Enumeration literals and folded constants load immediates.
                let imm = e
                    .sym
                    .get()
                    .and_then(|id| {
                        let entry = self.sem.syms.get(id);
                        if matches!(entry.kind, SymKind::EnumLiteral | SymKind::Constant) {
                            entry.value
                        } else {
                            None
                        }
                    });
                match imm {
                    Some(v) => self.line(format!("%{} = const {}", r, v)),
                    None => self.line(format!("%{} = load {}", r, self.expr_name(e))),
                }
                r
            }
            ExprKind::Binary {
                op,
                lhs,
                rhs,
                folded,
            } => {
                if let Some(v) = folded.get() {
                    let r = self.reg();
                    self.line(format!("%{} = const {}", r, v));
                    return r;
                }
                let a = self.emit_expr(lhs);
                let b = self.emit_expr(rhs);
                let r = self.reg();
                self.line(format!("%{} = {} %{}, %{}", r, binop_name(*op), a, b));
                r
            }
            ExprKind::Unary { op, operand } => {
                let a = self.emit_expr(operand);
                let r = self.reg();
                let name = match op {
                    UnOp::Plus => "mov",
                    UnOp::Minus => "neg",
                    UnOp::Not => "not",
                    UnOp::Abs => "abs",
                };
                self.line(format!("%{} = {} %{}", r, name, a));
                r
            }
            ExprKind::Attribute {
                prefix, designator, ..
            } => {
                let r = self.reg();
                self.line(format!(
                    "%{} = attr {}'{}",
                    r,
                    self.expr_name(prefix),
                    self.interner.resolve(*designator).to_ascii_lowercase()
                ));
                r
            }
            ExprKind::Qualified { operand, .. } => self.emit_expr(operand),
            ExprKind::Call {
                callee,
                args,
                class,
            } => match class.get() {
                CallClass::Index => {
                    let base = self.emit_expr(callee);
                    let idx = self.emit_expr(args[0].value);
                    let r = self.reg();
                    self.line(format!("%{} = load.elem %{}, %{}", r, base, idx));
                    r
                }
                CallClass::Convert => {
                    let v = self.emit_expr(args[0].value);
                    let r = self.reg();
                    let target = e
                        .ty
                        .get()
                        .map(|t| {
                            self.interner
                                .resolve(self.sem.types.get(t).name)
                                .to_ascii_lowercase()
                        })
                        .unwrap_or_default();
                    self.line(format!("%{} = cvt.{} %{}", r, target, v));
                    r
                }
                _ => {
                    let mut regs = Vec::new();
                    for a in args.iter() {
                        regs.push(format!("%{}", self.emit_expr(a.value)));
                    }
                    let r = self.reg();
                    self.line(format!(
                        "%{} = call {}({})",
                        r,
                        self.expr_name(callee),
                        regs.join(", ")
                    ));
                    r
                }
            },
            ExprKind::Slice { prefix, range } => {
                let base = self.emit_expr(prefix);
                let (lo, hi) = self.emit_range(range);
                let r = self.reg();
                self.line(format!("%{} = slice %{}, %{}, %{}", r, base, lo, hi));
                r
            }
            ExprKind::Selected { prefix, selector } => {
                let base = self.emit_expr(prefix);
                let r = self.reg();
                self.line(format!(
                    "%{} = load.field %{}, {}",
                    r,
                    base,
                    self.interner.resolve(*selector).to_ascii_lowercase()
                ));
                r
            }
            ExprKind::Allocator { init, .. } => {
                let r = self.reg();
                match init {
                    Some(init) => {
                        let v = self.emit_expr(init);
                        self.line(format!("%{} = new %{}", r, v));
                    }
                    None => self.line(format!("%{} = new", r)),
                }
                r
            }
            ExprKind::Deref { prefix } => {
                let base = self.emit_expr(prefix);
                let r = self.reg();
                self.line(format!("%{} = load.ind %{}", r, base));
                r
            }
            ExprKind::Aggregate { items } => {
                let mut regs = Vec::new();
                for item in *items {
                    regs.push(format!("%{}", self.emit_expr(item.value)));
                }
                let r = self.reg();
                self.line(format!("%{} = agg {}", r, regs.join(", ")));
                r
            }
            ExprKind::Range { low, high } => {
                let a = self.emit_expr(low);
                let b = self.emit_expr(high);
                let r = self.reg();
                self.line(format!("%{} = range %{}, %{}", r, a, b));
                r
            }
            ExprKind::Membership {
                operand,
                mark,
                negated,
            } => {
                let v = self.emit_expr(operand);
                let r = self.reg();
                let op = if *negated { "notin" } else { "in" };
                self.line(format!("%{} = {} %{}, {}", r, op, v, self.expr_name(mark)));
                r
            }
            ExprKind::Others => {
                let r = self.reg();
                self.line(format!("%{} = const 0 ; others", r));
                r
            }
        }
    }

    /// `(lo, hi)` registers of a range, type-mark, or 'RANGE expression.
    fn emit_range(&mut self, range: &'a Expr<'a>) -> (u32, u32) {
        if let ExprKind::Range { low, high } = &range.kind {
            let a = self.emit_expr(low);
            let b = self.emit_expr(high);
            return (a, b);
        }
        let a = self.reg();
        self.line(format!("%{} = attr {}'first", a, self.expr_name(range)));
        let b = self.reg();
        self.line(format!("%{} = attr {}'last", b, self.expr_name(range)));
        (a, b)
    }

    /// Flat spelling of a name expression for operands that take symbolic
    /// references.
    fn expr_name(&self, e: &'a Expr<'a>) -> String {
        match &e.kind {
            ExprKind::Ident(name) => self.interner.resolve(*name).to_ascii_lowercase(),
            ExprKind::Selected { prefix, selector } => format!(
                "{}.{}",
                self.expr_name(prefix),
                self.interner.resolve(*selector).to_ascii_lowercase()
            ),
            ExprKind::Attribute {
                prefix, designator, ..
            } => format!(
                "{}'{}",
                self.expr_name(prefix),
                self.interner.resolve(*designator).to_ascii_lowercase()
            ),
            _ => String::from("?"),
        }
    }
}

fn binop_name(op: BinOp) -> &'static str {
    match op {
        BinOp::And | BinOp::AndThen => "and",
        BinOp::Or | BinOp::OrElse => "or",
        BinOp::Xor => "xor",
        BinOp::Eq => "cmp.eq",
        BinOp::Ne => "cmp.ne",
        BinOp::Lt => "cmp.lt",
        BinOp::Le => "cmp.le",
        BinOp::Gt => "cmp.gt",
        BinOp::Ge => "cmp.ge",
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Cat => "cat",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Mod => "mod",
        BinOp::Rem => "rem",
        BinOp::Pow => "pow",
    }
}

fn describe_decl(decl: &Decl<'_>) -> &'static str {
    match decl.kind {
        DeclKind::Generic { .. } => "generic unit",
        DeclKind::Task { .. } => "task unit",
        DeclKind::ObjectRename { .. } => "renaming",
        _ => "declaration",
    }
}
