//! The resolver walks the AST post-order, annotating every expression
//! with its type and every name with its symbol, folding literal integer
//! arithmetic as it goes. The first error ends the analysis.

use super::SemCtx;
use crate::ast::{
    Assoc, BinOp, Body, CallClass, CompilationUnit, Component, Constraint, ContextItemKind, Decl,
    DeclKind, Expr, ExprKind, Handler, LoopScheme, Param, Stmt, StmtKind, SubpKind, SubtypeInd,
    TypeDef, UnOp,
};
use crate::diag::{Diag, SourceLoc};
use crate::intern::Symbol;
use crate::symtab::{SymKind, SymbolId, VIS_DIRECT};
use crate::types::{TypeComponent, TypeId, TypeKind};
use crate::value::{int_mod, int_pow, int_rem};

pub type RResult<T> = Result<T, Diag>;

pub struct Resolver<'s, 'a, 'i> {
    sem: &'s mut SemCtx<'a>,
    interner: &'i crate::intern::Interner,
    /// Expected return type of the enclosing function bodies.
    ret_stack: Vec<Option<TypeId>>,
    /// Enclosing declarative regions, for symbol parent links.
    parent_stack: Vec<SymbolId>,
}

impl<'s, 'a, 'i> Resolver<'s, 'a, 'i> {
    pub fn new(sem: &'s mut SemCtx<'a>, interner: &'i crate::intern::Interner) -> Self {
        Resolver {
            sem,
            interner,
            ret_stack: Vec::new(),
            parent_stack: Vec::new(),
        }
    }

    fn parent(&self) -> Option<SymbolId> {
        self.parent_stack.last().copied()
    }

    fn diag(&self, loc: SourceLoc, message: impl AsRef<str>) -> Diag {
        Diag::at(self.interner, loc, message)
    }

    fn undefined(&self, loc: SourceLoc, name: Symbol) -> Diag {
        self.diag(
            loc,
            format!("undefined identifier '{}'", self.interner.resolve(name)),
        )
    }

    pub fn analyze_unit(&mut self, unit: &'a CompilationUnit<'a>) -> RResult<()> {
        for item in unit.context {
            match &item.kind {
                // `with` names were loaded by the driver before this unit.
                ContextItemKind::With(_) => {}
                ContextItemKind::Use(names) => {
                    for &name in *names {
                        self.apply_use(name)?;
                    }
                }
            }
        }
        for &decl in unit.units {
            self.analyze_decl(decl)?;
        }
        Ok(())
    }

    fn apply_use(&mut self, name: &'a Expr<'a>) -> RResult<()> {
        name.ty.set(Some(self.sem.predef.void));
        if let ExprKind::Ident(pkg_name) = name.kind {
            if let Some(id) = self.sem.syms.lookup(self.interner, pkg_name) {
                if self.sem.syms.get(id).kind == SymKind::Package {
                    name.sym.set(Some(id));
                    self.sem.syms.use_import(id);
                    if !self.sem.use_packages.contains(&id) {
                        self.sem.use_packages.push(id);
                    }
                }
            }
            // A `use` of a package this compilation never loaded is
            // dropped, matching the silent-miss policy of `with`.
            return Ok(());
        }
        Err(self.diag(name.loc, "package name expected in use clause"))
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    pub fn analyze_decl(&mut self, decl: &'a Decl<'a>) -> RResult<()> {
        self.sem.elab_order += 1;
        match &decl.kind {
            DeclKind::Object {
                name,
                constant,
                ind,
                init,
            } => {
                let tid = self.resolve_subtype_ind(ind)?;
                if let Some(init) = *init {
                    let it = self.analyze_expr(init, Some(tid))?;
                    if !self.sem.types.compatible(it, tid, &self.sem.predef) {
                        return Err(self.diag(init.loc, "initial value has the wrong type"));
                    }
                }
                let kind = if *constant {
                    SymKind::Constant
                } else {
                    SymKind::Variable
                };
                let id = self.sem.syms.add(self.interner, *name, kind, self.parent());
                self.sem.syms.get_mut(id).ty = Some(tid);
                self.sem.syms.get_mut(id).decl = Some(decl);
                decl.sym.set(Some(id));
                if *constant {
                    let value = init.and_then(|e| self.static_int(e));
                    self.sem.syms.get_mut(id).value = value;
                }
                Ok(())
            }
            DeclKind::Number { name, value } => {
                let tid = self.analyze_expr(value, None)?;
                let id = self
                    .sem
                    .syms
                    .add(self.interner, *name, SymKind::Constant, self.parent());
                self.sem.syms.get_mut(id).ty = Some(tid);
                self.sem.syms.get_mut(id).decl = Some(decl);
                decl.sym.set(Some(id));
                let folded = self.static_int(value);
                self.sem.syms.get_mut(id).value = folded;
                Ok(())
            }
            DeclKind::ObjectRename { name, mark, target } => {
                let tid = self.resolve_type_mark(mark)?;
                self.analyze_expr(target, Some(tid))?;
                let id = self
                    .sem
                    .syms
                    .add(self.interner, *name, SymKind::Variable, self.parent());
                self.sem.syms.get_mut(id).ty = Some(tid);
                self.sem.syms.get_mut(id).decl = Some(decl);
                decl.sym.set(Some(id));
                Ok(())
            }
            DeclKind::Type {
                name,
                discriminants,
                def,
            } => self.analyze_type_decl(decl, *name, discriminants, def),
            DeclKind::Subtype { name, ind } => {
                let tid = self.resolve_subtype_ind(ind)?;
                let id = self
                    .sem
                    .syms
                    .add(self.interner, *name, SymKind::Type, self.parent());
                self.sem.syms.get_mut(id).ty = Some(tid);
                self.sem.syms.get_mut(id).decl = Some(decl);
                decl.sym.set(Some(id));
                Ok(())
            }
            DeclKind::ExceptionDecl { name } => {
                let id = self
                    .sem
                    .syms
                    .add(self.interner, *name, SymKind::Exception, self.parent());
                self.sem.syms.get_mut(id).decl = Some(decl);
                decl.sym.set(Some(id));
                self.sem.exceptions.push(id);
                Ok(())
            }
            DeclKind::Subprogram { .. } => self.analyze_subprogram(decl),
            DeclKind::Package { .. } => self.analyze_package(decl),
            DeclKind::Task { .. } => self.analyze_task(decl),
            DeclKind::Entry { name, params } => {
                let mut ptypes = Vec::new();
                for p in *params {
                    ptypes.push(self.resolve_type_mark(p.mark)?);
                }
                let id = self
                    .sem
                    .syms
                    .add(self.interner, *name, SymKind::Entry, self.parent());
                self.sem.syms.get_mut(id).param_types = ptypes;
                self.sem.syms.get_mut(id).decl = Some(decl);
                decl.sym.set(Some(id));
                Ok(())
            }
            DeclKind::UseClause { names } => {
                for &name in *names {
                    self.apply_use(name)?;
                }
                Ok(())
            }
            // Pragma arguments may name anything, including entities this
            // implementation never declares; they are accepted unchecked.
            DeclKind::Pragma { .. } => Ok(()),
            DeclKind::Generic { inner, .. } => {
                let name = match &inner.kind {
                    DeclKind::Subprogram { spec, .. } => spec.name,
                    DeclKind::Package { name, .. } => *name,
                    _ => {
                        return Err(
                            self.diag(decl.loc, "generic unit must be a subprogram or package")
                        )
                    }
                };
                let id = self
                    .sem
                    .syms
                    .add(self.interner, name, SymKind::Generic, self.parent());
                self.sem.syms.get_mut(id).decl = Some(decl);
                decl.sym.set(Some(id));
                Ok(())
            }
        }
    }

    fn analyze_type_decl(
        &mut self,
        decl: &'a Decl<'a>,
        name: Symbol,
        discriminants: &'a [Component<'a>],
        def: &'a TypeDef<'a>,
    ) -> RResult<()> {
        // A prior `type T;` in this scope is completed in place, so access
        // types declared in between keep pointing at the same descriptor.
        let existing = self.sem.syms.lookup(self.interner, name).filter(|&id| {
            let entry = self.sem.syms.get(id);
            entry.kind == SymKind::Type
                && entry.scope_level == self.sem.syms.scope_level()
                && entry
                    .ty
                    .map(|t| self.sem.types.get(t).incomplete)
                    .unwrap_or(false)
        });

        let (sym, tid) = match existing {
            Some(id) => (id, self.sem.syms.get(id).ty.unwrap()),
            None => {
                let tid = self.sem.types.new_type(TypeKind::Private, name);
                let id = self
                    .sem
                    .syms
                    .add(self.interner, name, SymKind::Type, self.parent());
                self.sem.syms.get_mut(id).ty = Some(tid);
                (id, tid)
            }
        };
        self.sem.syms.get_mut(sym).decl = Some(decl);
        decl.sym.set(Some(sym));
        self.sem.types.get_mut(tid).incomplete = false;

        match def {
            TypeDef::Incomplete => {
                self.sem.types.get_mut(tid).incomplete = true;
                Ok(())
            }
            TypeDef::Enumeration { literals } => {
                let mut ids = Vec::new();
                for (ordinal, &(lit, _)) in literals.iter().enumerate() {
                    let id = self
                        .sem
                        .syms
                        .add(self.interner, lit, SymKind::EnumLiteral, self.parent());
                    self.sem.syms.get_mut(id).ty = Some(tid);
                    self.sem.syms.get_mut(id).value = Some(ordinal as i64);
                    ids.push(id);
                }
                let high = literals.len() as i64 - 1;
                let desc = self.sem.types.get_mut(tid);
                desc.kind = TypeKind::Enumeration;
                desc.literals = ids;
                desc.low = 0;
                desc.high = high;
                Ok(())
            }
            TypeDef::Integer { range } => {
                let bounds = match range {
                    Some(r) => self.static_range(r, None)?,
                    None => (i32::MIN as i64, i32::MAX as i64),
                };
                let desc = self.sem.types.get_mut(tid);
                desc.kind = TypeKind::Integer;
                desc.low = bounds.0;
                desc.high = bounds.1;
                Ok(())
            }
            TypeDef::Float { digits, range } => {
                self.analyze_expr(digits, None)?;
                if let Some(r) = *range {
                    self.analyze_range_expr(r)?;
                }
                self.sem.types.get_mut(tid).kind = TypeKind::Float;
                Ok(())
            }
            TypeDef::Fixed { delta, range } => {
                self.analyze_expr(delta, None)?;
                if let Some(r) = *range {
                    self.analyze_range_expr(r)?;
                }
                self.sem.types.get_mut(tid).kind = TypeKind::Fixed;
                Ok(())
            }
            TypeDef::Array {
                indexes,
                unconstrained,
                elem,
            } => {
                if indexes.len() != 1 {
                    return Err(self.diag(decl.loc, "exactly one index dimension is supported"));
                }
                let (index_ty, low, high) = self.resolve_index(indexes[0], *unconstrained)?;
                let elem_ty = self.resolve_subtype_ind(elem)?;
                let desc = self.sem.types.get_mut(tid);
                desc.kind = TypeKind::Array;
                desc.elem = Some(elem_ty);
                desc.index = Some(index_ty);
                desc.low = low;
                desc.high = high;
                self.sem.types.freeze(tid);
                Ok(())
            }
            TypeDef::Record { components } => {
                self.sem.types.get_mut(tid).kind = TypeKind::Record;
                for (group, is_discriminant) in [(discriminants, true), (*components, false)] {
                    for comp in group {
                        let cty = self.resolve_subtype_ind(comp.ind)?;
                        if let Some(init) = comp.init {
                            self.analyze_expr(init, Some(cty))?;
                        }
                        let comp_kind = if is_discriminant {
                            SymKind::Discriminant
                        } else {
                            SymKind::Component
                        };
                        // Components live in the record, not the scope:
                        // their symbols are created hidden.
                        let id =
                            self.sem
                                .syms
                                .add(self.interner, comp.name, comp_kind, Some(sym));
                        self.sem.syms.get_mut(id).ty = Some(cty);
                        self.sem.syms.get_mut(id).vis &= !VIS_DIRECT;
                        let slot = TypeComponent {
                            name: comp.name,
                            ty: cty,
                            offset: 0,
                        };
                        let desc = self.sem.types.get_mut(tid);
                        if is_discriminant {
                            desc.discriminants.push(slot);
                        } else {
                            desc.components.push(slot);
                        }
                    }
                }
                self.sem.types.freeze(tid);
                Ok(())
            }
            TypeDef::Access { designated } => {
                let elem = self.resolve_subtype_ind(designated)?;
                let desc = self.sem.types.get_mut(tid);
                desc.kind = TypeKind::Access;
                desc.elem = Some(elem);
                Ok(())
            }
            TypeDef::Private { .. } => {
                self.sem.types.get_mut(tid).kind = TypeKind::Private;
                Ok(())
            }
            TypeDef::Derived { parent } => {
                let ptid = self.resolve_subtype_ind(parent)?;
                let root = self.sem.types.base_type(ptid);
                let kind = self.sem.types.kind(root);
                let (low, high) = {
                    let d = self.sem.types.get(ptid);
                    (d.low, d.high)
                };
                let (elem, index, literals, components) = {
                    let d = self.sem.types.get(root);
                    (d.elem, d.index, d.literals.clone(), d.components.clone())
                };
                let desc = self.sem.types.get_mut(tid);
                desc.kind = kind;
                desc.low = low;
                desc.high = high;
                desc.elem = elem;
                desc.index = index;
                desc.literals = literals;
                desc.components = components;
                desc.parent = Some(ptid);
                if matches!(kind, TypeKind::Array | TypeKind::Record) {
                    self.sem.types.freeze(tid);
                }
                Ok(())
            }
        }
    }

    /// One array index position: a range, a type mark, or a mark whose
    /// `range <>` box the parser already stripped.
    fn resolve_index(
        &mut self,
        index: &'a Expr<'a>,
        unconstrained: bool,
    ) -> RResult<(TypeId, i64, i64)> {
        match &index.kind {
            ExprKind::Range { low, high } => {
                let lt = self.analyze_expr(low, None)?;
                self.analyze_expr(high, Some(lt))?;
                index.ty.set(Some(lt));
                let index_ty = self.concrete_discrete(lt);
                let lo = self.static_int(low).unwrap_or(1);
                let hi = self.static_int(high).unwrap_or(0);
                Ok((index_ty, lo, hi))
            }
            _ => {
                let tid = self.resolve_type_mark(index)?;
                if unconstrained {
                    Ok((tid, 1, 0))
                } else {
                    let desc = self.sem.types.get(tid);
                    Ok((tid, desc.low, desc.high))
                }
            }
        }
    }

    fn analyze_subprogram(&mut self, decl: &'a Decl<'a>) -> RResult<()> {
        let DeclKind::Subprogram {
            spec,
            body,
            renames,
            instance_of,
            ..
        } = &decl.kind
        else {
            unreachable!();
        };

        let mut ptypes = Vec::new();
        for p in spec.params {
            ptypes.push(self.resolve_type_mark(p.mark)?);
        }
        let ret_ty = match spec.ret {
            Some(mark) => Some(self.resolve_type_mark(mark)?),
            None => None,
        };

        let kind = match spec.kind {
            SubpKind::Procedure => SymKind::Procedure,
            SubpKind::Function => SymKind::Function,
        };
        // A body completes a matching spec-only declaration in the same
        // region instead of introducing a second symbol.
        let completing = if body.is_some() {
            self.sem
                .syms
                .visible_homonyms(self.interner, spec.name)
                .into_iter()
                .find(|&id| {
                    let e = self.sem.syms.get(id);
                    e.kind == kind
                        && e.param_types.len() == ptypes.len()
                        && e.parent == self.parent()
                        && matches!(
                            e.decl,
                            Some(Decl {
                                kind: DeclKind::Subprogram {
                                    body: None,
                                    renames: None,
                                    instance_of: None,
                                    ..
                                },
                                ..
                            })
                        )
                })
        } else {
            None
        };
        let sym = match completing {
            Some(id) => id,
            None => self
                .sem
                .syms
                .add(self.interner, spec.name, kind, self.parent()),
        };
        self.sem.syms.get_mut(sym).ty = Some(ret_ty.unwrap_or(self.sem.predef.void));
        self.sem.syms.get_mut(sym).param_types = ptypes.clone();
        self.sem.syms.get_mut(sym).decl = Some(decl);
        decl.sym.set(Some(sym));

        if let Some(target) = *renames {
            self.analyze_expr(target, None)?;
            return Ok(());
        }
        if instance_of.is_some() {
            // Generic instantiations are accepted but never elaborated.
            return Ok(());
        }
        let Some(body) = *body else {
            return Ok(());
        };

        self.sem.syms.enter_scope();
        self.parent_stack.push(sym);
        self.ret_stack.push(ret_ty);
        let mut result = Ok(());
        for (p, &t) in spec.params.iter().zip(&ptypes) {
            let id = self
                .sem
                .syms
                .add(self.interner, p.name, SymKind::Parameter, Some(sym));
            self.sem.syms.get_mut(id).ty = Some(t);
            p.sym.set(Some(id));
            if let Some(default) = p.default {
                result = self.analyze_expr(default, Some(t)).map(|_| ());
                if result.is_err() {
                    break;
                }
            }
        }
        if result.is_ok() {
            result = self.analyze_body(body);
        }
        self.ret_stack.pop();
        self.parent_stack.pop();
        self.sem.syms.exit_scope();
        result
    }

    fn analyze_body(&mut self, body: &'a Body<'a>) -> RResult<()> {
        for &d in body.decls {
            self.analyze_decl(d)?;
        }
        for &s in body.stmts {
            self.analyze_stmt(s)?;
        }
        for h in body.handlers {
            self.analyze_handler(h)?;
        }
        Ok(())
    }

    fn analyze_handler(&mut self, handler: &'a Handler<'a>) -> RResult<()> {
        for &choice in handler.choices {
            match choice.kind {
                ExprKind::Others => {
                    choice.ty.set(Some(self.sem.predef.void));
                }
                ExprKind::Ident(name) => {
                    let id = self
                        .sem
                        .syms
                        .lookup(self.interner, name)
                        .ok_or_else(|| self.undefined(choice.loc, name))?;
                    if self.sem.syms.get(id).kind != SymKind::Exception {
                        return Err(self.diag(choice.loc, "exception name expected in handler"));
                    }
                    choice.sym.set(Some(id));
                    choice.ty.set(Some(self.sem.predef.void));
                }
                _ => return Err(self.diag(choice.loc, "exception name expected in handler")),
            }
        }
        for &s in handler.stmts {
            self.analyze_stmt(s)?;
        }
        Ok(())
    }

    fn analyze_package(&mut self, decl: &'a Decl<'a>) -> RResult<()> {
        let DeclKind::Package {
            name,
            is_body,
            visible,
            private_part,
            body,
            renames,
            instance_of,
        } = &decl.kind
        else {
            unreachable!();
        };

        if *is_body {
            let pkg = match self.sem.syms.lookup(self.interner, *name) {
                Some(id) if self.sem.syms.get(id).kind == SymKind::Package => id,
                _ => {
                    let id = self
                        .sem
                        .syms
                        .add(self.interner, *name, SymKind::Package, self.parent());
                    self.sem.syms.get_mut(id).decl = Some(decl);
                    id
                }
            };
            decl.sym.set(Some(pkg));
            // Spec declarations become directly visible again inside the
            // body.
            let members = self.sem.syms.members_of(pkg);
            let mut reopened = Vec::new();
            for &m in &members {
                if self.sem.syms.get(m).vis & VIS_DIRECT == 0 {
                    self.sem.syms.get_mut(m).vis |= VIS_DIRECT;
                    reopened.push(m);
                }
            }
            self.sem.syms.enter_scope();
            self.parent_stack.push(pkg);
            let result = match *body {
                Some(b) => self.analyze_body(b),
                None => Ok(()),
            };
            self.parent_stack.pop();
            self.sem.syms.exit_scope();
            for m in reopened {
                self.sem.syms.get_mut(m).vis &= !VIS_DIRECT;
            }
            return result;
        }

        let sym = self
            .sem
            .syms
            .add(self.interner, *name, SymKind::Package, self.parent());
        self.sem.syms.get_mut(sym).decl = Some(decl);
        decl.sym.set(Some(sym));

        if let Some(target) = *renames {
            self.analyze_expr(target, None)?;
            return Ok(());
        }
        if instance_of.is_some() {
            return Ok(());
        }

        self.sem.syms.enter_scope();
        self.parent_stack.push(sym);
        let mut result = Ok(());
        for &d in visible.iter().chain(private_part.iter()) {
            result = self.analyze_decl(d);
            if result.is_err() {
                break;
            }
        }
        self.parent_stack.pop();
        self.sem.syms.exit_scope();
        result
    }

    fn analyze_task(&mut self, decl: &'a Decl<'a>) -> RResult<()> {
        let DeclKind::Task {
            name,
            is_type,
            entries,
            body,
        } = &decl.kind
        else {
            unreachable!();
        };

        if let Some(body) = *body {
            // Task bodies are analyzed for well-formedness only.
            self.sem.syms.enter_scope();
            let result = self.analyze_body(body);
            self.sem.syms.exit_scope();
            return result;
        }

        let tid = self.sem.types.new_type(TypeKind::Task, *name);
        let kind = if *is_type {
            SymKind::TaskType
        } else {
            SymKind::Variable
        };
        let sym = self.sem.syms.add(self.interner, *name, kind, self.parent());
        self.sem.syms.get_mut(sym).ty = Some(tid);
        self.sem.syms.get_mut(sym).decl = Some(decl);
        decl.sym.set(Some(sym));
        self.parent_stack.push(sym);
        let mut result = Ok(());
        for &entry in *entries {
            result = self.analyze_decl(entry);
            if result.is_err() {
                break;
            }
        }
        self.parent_stack.pop();
        result
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn analyze_stmt(&mut self, stmt: &'a Stmt<'a>) -> RResult<()> {
        if let Some(label) = stmt.label {
            let id = self
                .sem
                .syms
                .add(self.interner, label, SymKind::Label, self.parent());
            self.sem.syms.get_mut(id).ty = Some(self.sem.predef.void);
        }
        match &stmt.kind {
            StmtKind::Null => Ok(()),
            StmtKind::Assign { target, value } => {
                let tl = self.analyze_expr(target, None)?;
                let tr = self.analyze_expr(value, Some(tl))?;
                if !self.sem.types.compatible(tr, tl, &self.sem.predef) {
                    return Err(self.diag(value.loc, "expression type does not match target"));
                }
                Ok(())
            }
            StmtKind::Call(callee) => {
                self.analyze_expr(callee, None)?;
                Ok(())
            }
            StmtKind::If { arms, else_stmts } => {
                for arm in *arms {
                    self.analyze_condition(arm.cond)?;
                    for &s in arm.stmts {
                        self.analyze_stmt(s)?;
                    }
                }
                if let Some(stmts) = *else_stmts {
                    for &s in stmts {
                        self.analyze_stmt(s)?;
                    }
                }
                Ok(())
            }
            StmtKind::Case { selector, alts } => {
                let st = self.analyze_expr(selector, None)?;
                for alt in *alts {
                    for &choice in alt.choices {
                        match choice.kind {
                            ExprKind::Others => {
                                choice.ty.set(Some(st));
                            }
                            ExprKind::Range { low, high } => {
                                self.analyze_expr(low, Some(st))?;
                                self.analyze_expr(high, Some(st))?;
                                choice.ty.set(Some(st));
                            }
                            _ => {
                                self.analyze_expr(choice, Some(st))?;
                            }
                        }
                    }
                    for &s in alt.stmts {
                        self.analyze_stmt(s)?;
                    }
                }
                Ok(())
            }
            StmtKind::Loop { scheme, body } => {
                match scheme {
                    LoopScheme::Forever => {}
                    LoopScheme::While(cond) => self.analyze_condition(cond)?,
                    LoopScheme::For {
                        var, range, sym, ..
                    } => {
                        let elem = self.analyze_iteration_range(range)?;
                        self.sem.syms.enter_scope();
                        let id =
                            self.sem
                                .syms
                                .add(self.interner, *var, SymKind::LoopVar, self.parent());
                        self.sem.syms.get_mut(id).ty = Some(elem);
                        sym.set(Some(id));
                        let mut result = Ok(());
                        for &s in *body {
                            result = self.analyze_stmt(s);
                            if result.is_err() {
                                break;
                            }
                        }
                        self.sem.syms.exit_scope();
                        return result;
                    }
                }
                for &s in *body {
                    self.analyze_stmt(s)?;
                }
                Ok(())
            }
            StmtKind::Block {
                decls,
                stmts,
                handlers,
            } => {
                self.sem.syms.enter_scope();
                let result = self.analyze_block_parts(decls, stmts, handlers);
                self.sem.syms.exit_scope();
                result
            }
            StmtKind::Exit { when, .. } => {
                if let Some(cond) = *when {
                    self.analyze_condition(cond)?;
                }
                Ok(())
            }
            StmtKind::Return { value } => {
                let expected = self.ret_stack.last().copied().flatten();
                if let Some(value) = *value {
                    self.analyze_expr(value, expected)?;
                }
                Ok(())
            }
            StmtKind::Goto { .. } => Ok(()),
            StmtKind::Raise { name } => {
                if let Some(name) = *name {
                    self.analyze_expr(name, None)?;
                    match name.sym.get() {
                        Some(id) if self.sem.syms.get(id).kind == SymKind::Exception => {}
                        _ => {
                            return Err(
                                self.diag(name.loc, "exception name expected after raise")
                            )
                        }
                    }
                }
                Ok(())
            }
            StmtKind::Delay { amount } => {
                self.analyze_expr(amount, Some(self.sem.predef.duration))?;
                Ok(())
            }
            StmtKind::Abort { tasks } => {
                for &t in *tasks {
                    self.analyze_expr(t, None)?;
                }
                Ok(())
            }
            StmtKind::Accept { params, body, .. } => {
                self.sem.syms.enter_scope();
                let mut result = self.install_accept_params(params);
                if result.is_ok() {
                    if let Some(stmts) = *body {
                        for &s in stmts {
                            result = self.analyze_stmt(s);
                            if result.is_err() {
                                break;
                            }
                        }
                    }
                }
                self.sem.syms.exit_scope();
                result
            }
            StmtKind::Select { arms, else_stmts } => {
                for arm in *arms {
                    if let Some(guard) = arm.guard {
                        self.analyze_condition(guard)?;
                    }
                    for &s in arm.stmts {
                        self.analyze_stmt(s)?;
                    }
                }
                if let Some(stmts) = *else_stmts {
                    for &s in stmts {
                        self.analyze_stmt(s)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn analyze_block_parts(
        &mut self,
        decls: &'a [&'a Decl<'a>],
        stmts: &'a [&'a Stmt<'a>],
        handlers: &'a [Handler<'a>],
    ) -> RResult<()> {
        for &d in decls {
            self.analyze_decl(d)?;
        }
        for &s in stmts {
            self.analyze_stmt(s)?;
        }
        for h in handlers {
            self.analyze_handler(h)?;
        }
        Ok(())
    }

    fn install_accept_params(&mut self, params: &'a [Param<'a>]) -> RResult<()> {
        for p in params {
            let t = self.resolve_type_mark(p.mark)?;
            let id = self
                .sem
                .syms
                .add(self.interner, p.name, SymKind::Parameter, self.parent());
            self.sem.syms.get_mut(id).ty = Some(t);
            p.sym.set(Some(id));
        }
        Ok(())
    }

    fn analyze_condition(&mut self, cond: &'a Expr<'a>) -> RResult<()> {
        let t = self.analyze_expr(cond, Some(self.sem.predef.boolean))?;
        if !self
            .sem
            .types
            .compatible(t, self.sem.predef.boolean, &self.sem.predef)
        {
            return Err(self.diag(cond.loc, "condition must be BOOLEAN"));
        }
        Ok(())
    }

    /// The element type a `for` loop variable takes from its range.
    fn analyze_iteration_range(&mut self, range: &'a Expr<'a>) -> RResult<TypeId> {
        let t = match &range.kind {
            ExprKind::Range { low, high } => {
                let lt = self.analyze_expr(low, None)?;
                self.analyze_expr(high, Some(lt))?;
                range.ty.set(Some(lt));
                lt
            }
            ExprKind::Ident(_) | ExprKind::Selected { .. } if self.names_a_type(range) => {
                self.resolve_type_mark(range)?
            }
            _ => self.analyze_expr(range, None)?,
        };
        Ok(self.concrete_discrete(t))
    }

    /// Universal integers become INTEGER once a value needs a home.
    fn concrete_discrete(&self, t: TypeId) -> TypeId {
        if self.sem.types.kind(self.sem.types.base_type(t)) == TypeKind::UniversalInteger {
            self.sem.predef.integer
        } else {
            t
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn analyze_expr(&mut self, e: &'a Expr<'a>, expected: Option<TypeId>) -> RResult<TypeId> {
        let t = self.analyze_expr_inner(e, expected)?;
        e.ty.set(Some(t));
        Ok(t)
    }

    fn analyze_expr_inner(&mut self, e: &'a Expr<'a>, expected: Option<TypeId>) -> RResult<TypeId> {
        match &e.kind {
            ExprKind::Int { .. } => Ok(self.sem.predef.universal_integer),
            ExprKind::Real(_) => Ok(self.sem.predef.universal_real),
            ExprKind::Str(_) => Ok(self.sem.predef.string),
            ExprKind::Char(c) => Ok(self.resolve_char_literal(*c, expected)),
            ExprKind::Null => {
                let t = expected
                    .filter(|&t| {
                        self.sem.types.kind(self.sem.types.base_type(t)) == TypeKind::Access
                    })
                    .unwrap_or(self.sem.predef.void);
                Ok(t)
            }
            ExprKind::Others => Ok(self.sem.predef.void),
            ExprKind::Ident(name) => self.analyze_ident(e, *name, expected),
            ExprKind::Binary {
                op,
                lhs,
                rhs,
                folded,
            } => self.analyze_binary(e, *op, lhs, rhs, folded, expected),
            ExprKind::Unary { op, operand } => {
                let t = self.analyze_expr(operand, expected)?;
                match op {
                    UnOp::Not => Ok(self.sem.predef.boolean),
                    _ => Ok(t),
                }
            }
            ExprKind::Attribute {
                prefix,
                designator,
                args,
            } => self.analyze_attribute(prefix, *designator, args),
            ExprKind::Qualified { mark, operand } => {
                let t = self.resolve_type_mark(mark)?;
                self.analyze_expr(operand, Some(t))?;
                Ok(t)
            }
            ExprKind::Call {
                callee,
                args,
                class,
            } => self.analyze_call(e, callee, args, class, expected),
            ExprKind::Slice { prefix, range } => {
                let pt = self.analyze_expr(prefix, None)?;
                let base = self.sem.types.base_type(pt);
                if self.sem.types.kind(base) != TypeKind::Array {
                    return Err(self.diag(prefix.loc, "slice requires an array"));
                }
                let index_ty = self.sem.types.get(base).index;
                if let ExprKind::Range { low, high } = range.kind {
                    self.analyze_expr(low, index_ty)?;
                    self.analyze_expr(high, index_ty)?;
                    range.ty.set(index_ty.or(Some(self.sem.predef.integer)));
                } else {
                    self.analyze_expr(range, index_ty)?;
                }
                Ok(pt)
            }
            ExprKind::Selected { prefix, selector } => self.analyze_selected(e, prefix, *selector),
            ExprKind::Allocator { mark, init } => {
                let designated = self.resolve_type_mark(mark)?;
                if let Some(init) = *init {
                    self.analyze_expr(init, Some(designated))?;
                }
                if let Some(want) = expected {
                    if self.sem.types.kind(self.sem.types.base_type(want)) == TypeKind::Access {
                        return Ok(want);
                    }
                }
                // No access type in sight: make an anonymous one.
                let name = self.sem.types.get(designated).name;
                let tid = self.sem.types.new_type(TypeKind::Access, name);
                self.sem.types.get_mut(tid).elem = Some(designated);
                Ok(tid)
            }
            ExprKind::Deref { prefix } => {
                let pt = self.analyze_expr(prefix, None)?;
                let base = self.sem.types.base_type(pt);
                if self.sem.types.kind(base) != TypeKind::Access {
                    return Err(self.diag(prefix.loc, "'.all' requires an access value"));
                }
                Ok(self
                    .sem
                    .types
                    .get(base)
                    .elem
                    .unwrap_or(self.sem.predef.void))
            }
            ExprKind::Aggregate { items } => self.analyze_aggregate(e, items, expected),
            ExprKind::Range { low, high } => {
                let lt = self.analyze_expr(low, expected)?;
                self.analyze_expr(high, Some(lt))?;
                Ok(lt)
            }
            ExprKind::Membership { operand, mark, .. } => {
                let ot = self.analyze_expr(operand, None)?;
                if self.names_a_type(mark) {
                    self.resolve_type_mark(mark)?;
                } else {
                    match mark.kind {
                        ExprKind::Range { low, high } => {
                            self.analyze_expr(low, Some(ot))?;
                            self.analyze_expr(high, Some(ot))?;
                            mark.ty.set(Some(ot));
                        }
                        _ => {
                            self.analyze_expr(mark, Some(ot))?;
                        }
                    }
                }
                Ok(self.sem.predef.boolean)
            }
        }
    }

    fn names_a_type(&self, e: &'a Expr<'a>) -> bool {
        if let ExprKind::Ident(name) = e.kind {
            if let Some(id) = self.sem.syms.lookup(self.interner, name) {
                return matches!(self.sem.syms.get(id).kind, SymKind::Type | SymKind::TaskType);
            }
        }
        false
    }

    fn resolve_char_literal(&mut self, c: u8, expected: Option<TypeId>) -> TypeId {
        if let Some(want) = expected {
            let base = self.sem.types.base_type(want);
            match self.sem.types.kind(base) {
                TypeKind::Character => return want,
                TypeKind::Enumeration => {
                    let spelled = format!("'{}'", c as char);
                    let found = self
                        .sem
                        .types
                        .get(base)
                        .literals
                        .iter()
                        .any(|&lit| self.interner.is_ci(self.sem.syms.get(lit).name, &spelled));
                    if found {
                        return want;
                    }
                }
                _ => {}
            }
        }
        self.sem.predef.character
    }

    fn analyze_ident(
        &mut self,
        e: &'a Expr<'a>,
        name: Symbol,
        expected: Option<TypeId>,
    ) -> RResult<TypeId> {
        // An expected enumeration type claims matching literal names first.
        if let Some(want) = expected {
            let base = self.sem.types.base_type(want);
            if matches!(
                self.sem.types.kind(base),
                TypeKind::Enumeration | TypeKind::Boolean
            ) {
                let lit = self
                    .sem
                    .types
                    .get(base)
                    .literals
                    .iter()
                    .copied()
                    .find(|&l| self.interner.eq_ci(self.sem.syms.get(l).name, name));
                if let Some(lit) = lit {
                    e.sym.set(Some(lit));
                    return Ok(want);
                }
            }
        }
        let id = self
            .sem
            .syms
            .lookup(self.interner, name)
            .ok_or_else(|| self.undefined(e.loc, name))?;
        e.sym.set(Some(id));
        Ok(self.sem.syms.get(id).ty.unwrap_or(self.sem.predef.void))
    }

    fn analyze_binary(
        &mut self,
        e: &'a Expr<'a>,
        op: BinOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
        folded: &std::cell::Cell<Option<i64>>,
        expected: Option<TypeId>,
    ) -> RResult<TypeId> {
        if op.is_logical() {
            self.analyze_expr(lhs, Some(self.sem.predef.boolean))?;
            self.analyze_expr(rhs, Some(self.sem.predef.boolean))?;
            return Ok(self.sem.predef.boolean);
        }
        if op.is_relational() {
            let tl = self.analyze_expr(lhs, None)?;
            let tr = self.analyze_expr(rhs, Some(tl))?;
            if !self.sem.types.compatible(tl, tr, &self.sem.predef) {
                return Err(self.diag(e.loc, "comparison operands have different types"));
            }
            return Ok(self.sem.predef.boolean);
        }
        if op == BinOp::Cat {
            let tl = self.analyze_expr(lhs, None)?;
            let tr = self.analyze_expr(rhs, None)?;
            let result = if self.sem.types.kind(self.sem.types.base_type(tl)) == TypeKind::Array {
                tl
            } else if self.sem.types.kind(self.sem.types.base_type(tr)) == TypeKind::Array {
                tr
            } else {
                self.sem.predef.string
            };
            return Ok(result);
        }

        // Arithmetic: both sides resolve under the same expected type, and
        // literal operands fold in place. A zero divisor suppresses the
        // fold so the check fires at run time instead.
        let tl = self.analyze_expr(lhs, expected)?;
        let tr = self.analyze_expr(rhs, expected)?;
        if let (Some(a), Some(b)) = (self.static_int(lhs), self.static_int(rhs)) {
            let value = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
                BinOp::Mul => a.checked_mul(b),
                BinOp::Div if b != 0 => a.checked_div(b),
                BinOp::Mod if b != 0 => Some(int_mod(a, b)),
                BinOp::Rem if b != 0 => Some(int_rem(a, b)),
                BinOp::Pow => int_pow(a, b),
                _ => None,
            };
            if let Some(value) = value {
                folded.set(Some(value));
                return Ok(self.sem.predef.universal_integer);
            }
        }

        let bl = self.sem.types.kind(self.sem.types.base_type(tl));
        let br = self.sem.types.kind(self.sem.types.base_type(tr));
        let result = match (bl, br) {
            (TypeKind::UniversalInteger, TypeKind::UniversalInteger) => tl,
            (TypeKind::UniversalInteger, _) | (TypeKind::UniversalReal, _) => tr,
            (_, TypeKind::UniversalInteger) | (_, TypeKind::UniversalReal) => tl,
            _ => {
                if !self.sem.types.compatible(tl, tr, &self.sem.predef) {
                    return Err(self.diag(e.loc, "operands have incompatible types"));
                }
                tl
            }
        };
        Ok(result)
    }

    fn analyze_attribute(
        &mut self,
        prefix: &'a Expr<'a>,
        designator: Symbol,
        args: &'a [&'a Expr<'a>],
    ) -> RResult<TypeId> {
        // The prefix is either a type mark or a value.
        let prefix_ty = if self.names_a_type(prefix) {
            self.resolve_type_mark(prefix)?
        } else {
            self.analyze_expr(prefix, None)?
        };
        let base = self.sem.types.base_type(prefix_ty);
        let desc_kind = self.sem.types.kind(base);
        let index_ty = self.sem.types.get(base).index;

        let interner = self.interner;
        let wk = self.sem.wk;
        let is = |what: Symbol| interner.eq_ci(designator, what);

        let arg_expected = if is(wk.image) || is(wk.pos) || is(wk.succ) || is(wk.pred) {
            Some(prefix_ty)
        } else if is(wk.val) {
            Some(self.sem.predef.integer)
        } else {
            None
        };
        for &arg in args {
            self.analyze_expr(arg, arg_expected)?;
        }

        let result = if is(wk.first) || is(wk.last) || is(wk.range) {
            if desc_kind == TypeKind::Array {
                index_ty.unwrap_or(self.sem.predef.integer)
            } else {
                prefix_ty
            }
        } else if is(wk.length) || is(wk.pos) || is(wk.count) || is(wk.size) {
            self.sem.predef.integer
        } else if is(wk.image) {
            self.sem.predef.string
        } else if is(wk.succ) || is(wk.pred) || is(wk.val) {
            prefix_ty
        } else {
            return Err(self.diag(
                prefix.loc,
                format!("unknown attribute '{}'", self.interner.resolve(designator)),
            ));
        };
        Ok(result)
    }

    fn analyze_selected(
        &mut self,
        e: &'a Expr<'a>,
        prefix: &'a Expr<'a>,
        selector: Symbol,
    ) -> RResult<TypeId> {
        // PACKAGE.ENTITY
        if let ExprKind::Ident(pname) = prefix.kind {
            if let Some(pid) = self.sem.syms.lookup(self.interner, pname) {
                if self.sem.syms.get(pid).kind == SymKind::Package {
                    prefix.sym.set(Some(pid));
                    prefix.ty.set(Some(self.sem.predef.void));
                    let member = self
                        .sem
                        .syms
                        .members_of(pid)
                        .into_iter()
                        .find(|&m| self.interner.eq_ci(self.sem.syms.get(m).name, selector));
                    let member = member.ok_or_else(|| {
                        self.diag(
                            e.loc,
                            format!(
                                "'{}' is not declared in package '{}'",
                                self.interner.resolve(selector),
                                self.interner.resolve(pname)
                            ),
                        )
                    })?;
                    e.sym.set(Some(member));
                    return Ok(self
                        .sem
                        .syms
                        .get(member)
                        .ty
                        .unwrap_or(self.sem.predef.void));
                }
            }
        }

        let pt = self.analyze_expr(prefix, None)?;
        let mut base = self.sem.types.base_type(pt);
        // Implicit dereference of an access-to-record prefix.
        if self.sem.types.kind(base) == TypeKind::Access {
            if let Some(elem) = self.sem.types.get(base).elem {
                base = self.sem.types.base_type(elem);
            }
        }
        if self.sem.types.kind(base) != TypeKind::Record {
            return Err(self.diag(prefix.loc, "selection requires a record value"));
        }
        let comp = {
            let desc = self.sem.types.get(base);
            desc.components
                .iter()
                .chain(desc.discriminants.iter())
                .find(|c| self.interner.eq_ci(c.name, selector))
                .map(|c| c.ty)
        };
        comp.ok_or_else(|| {
            self.diag(
                e.loc,
                format!("no component '{}'", self.interner.resolve(selector)),
            )
        })
    }

    fn analyze_call(
        &mut self,
        e: &'a Expr<'a>,
        callee: &'a Expr<'a>,
        args: &'a [Assoc<'a>],
        class: &std::cell::Cell<CallClass>,
        expected: Option<TypeId>,
    ) -> RResult<TypeId> {
        if let ExprKind::Ident(name) = callee.kind {
            let first = self
                .sem
                .syms
                .lookup(self.interner, name)
                .ok_or_else(|| self.undefined(callee.loc, name))?;
            let kind = self.sem.syms.get(first).kind;
            match kind {
                SymKind::Type => {
                    // A call shape over a type name is a conversion.
                    let target = self.sem.syms.get(first).ty.unwrap_or(self.sem.predef.void);
                    callee.sym.set(Some(first));
                    callee.ty.set(Some(target));
                    if args.len() != 1 || !args[0].choices.is_empty() {
                        return Err(self.diag(e.loc, "type conversion takes one argument"));
                    }
                    self.analyze_expr(args[0].value, None)?;
                    class.set(CallClass::Convert);
                    return Ok(target);
                }
                k if k.is_subprogram() => {
                    return self
                        .finish_subprogram_call(e, callee, name, first, args, class, expected);
                }
                _ => {
                    let pt = self.analyze_expr(callee, None)?;
                    return self.finish_indexing(e, callee, pt, args, class);
                }
            }
        }

        // Selected or computed callee.
        let pt = self.analyze_expr(callee, None)?;
        if let Some(sym) = callee.sym.get() {
            let kind = self.sem.syms.get(sym).kind;
            if kind.is_subprogram() {
                let name = self.sem.syms.get(sym).name;
                return self.finish_subprogram_call(e, callee, name, sym, args, class, expected);
            }
            if kind == SymKind::Type {
                if args.len() != 1 || !args[0].choices.is_empty() {
                    return Err(self.diag(e.loc, "type conversion takes one argument"));
                }
                self.analyze_expr(args[0].value, None)?;
                class.set(CallClass::Convert);
                return Ok(self.sem.syms.get(sym).ty.unwrap_or(self.sem.predef.void));
            }
        }
        self.finish_indexing(e, callee, pt, args, class)
    }

    /// A call whose callee turned out to denote an array: an indexed
    /// component.
    fn finish_indexing(
        &mut self,
        e: &'a Expr<'a>,
        callee: &'a Expr<'a>,
        prefix_ty: TypeId,
        args: &'a [Assoc<'a>],
        class: &std::cell::Cell<CallClass>,
    ) -> RResult<TypeId> {
        let base = self.sem.types.base_type(prefix_ty);
        if self.sem.types.kind(base) != TypeKind::Array {
            return Err(self.diag(callee.loc, "name is neither a subprogram nor an array"));
        }
        if args.len() != 1 || !args[0].choices.is_empty() {
            return Err(self.diag(e.loc, "exactly one index expected"));
        }
        let index_ty = self.sem.types.get(base).index;
        self.analyze_expr(args[0].value, index_ty)?;
        class.set(CallClass::Index);
        Ok(self
            .sem
            .types
            .get(base)
            .elem
            .unwrap_or(self.sem.predef.void))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_subprogram_call(
        &mut self,
        e: &'a Expr<'a>,
        callee: &'a Expr<'a>,
        name: Symbol,
        first: SymbolId,
        args: &'a [Assoc<'a>],
        class: &std::cell::Cell<CallClass>,
        expected: Option<TypeId>,
    ) -> RResult<TypeId> {
        class.set(CallClass::Subprogram);

        // Built-ins take anything; their arguments are checked against the
        // actual values by the evaluator.
        let (is_builtin, builtin_ty) = {
            let entry = self.sem.syms.get(first);
            (
                entry.decl.is_none() && entry.param_types.is_empty(),
                entry.ty.unwrap_or(self.sem.predef.void),
            )
        };
        if is_builtin {
            callee.sym.set(Some(first));
            callee.ty.set(Some(builtin_ty));
            for a in args {
                self.analyze_expr(a.value, None)?;
            }
            return Ok(builtin_ty);
        }

        let mut arg_types = Vec::with_capacity(args.len());
        for a in args {
            arg_types.push(self.analyze_expr(a.value, None)?);
        }
        let chosen = self
            .sem
            .syms
            .resolve_overload(
                self.interner,
                name,
                &arg_types,
                expected,
                &self.sem.types,
                &self.sem.predef,
            )
            .unwrap_or(first);
        callee.sym.set(Some(chosen));
        let result = self.sem.syms.get(chosen).ty.unwrap_or(self.sem.predef.void);
        callee.ty.set(Some(result));

        // Re-resolve each actual under its formal's type so literals land
        // correctly, then check the binding is complete.
        let param_types = self.sem.syms.get(chosen).param_types.clone();
        let (param_names, defaults): (Vec<Symbol>, Vec<bool>) = match self.sem.syms.get(chosen).decl
        {
            Some(Decl {
                kind: DeclKind::Subprogram { spec, .. },
                ..
            }) => (
                spec.params.iter().map(|p| p.name).collect(),
                spec.params.iter().map(|p| p.default.is_some()).collect(),
            ),
            _ => (Vec::new(), Vec::new()),
        };

        let mut bound = vec![false; param_types.len()];
        let mut positional = 0usize;
        for a in args {
            let slot = if a.choices.is_empty() {
                let i = positional;
                positional += 1;
                i
            } else if let ExprKind::Ident(pname) = a.choices[0].kind {
                a.choices[0].ty.set(Some(self.sem.predef.void));
                match param_names
                    .iter()
                    .position(|&n| self.interner.eq_ci(n, pname))
                {
                    Some(i) => i,
                    None => {
                        return Err(self.diag(
                            a.loc,
                            format!("no parameter named '{}'", self.interner.resolve(pname)),
                        ))
                    }
                }
            } else {
                return Err(self.diag(a.loc, "parameter name expected"));
            };
            if slot >= param_types.len() {
                return Err(self.diag(a.loc, "too many arguments"));
            }
            bound[slot] = true;
            let ft = param_types[slot];
            let at = self.analyze_expr(a.value, Some(ft))?;
            if !self.sem.types.compatible(at, ft, &self.sem.predef) {
                return Err(self.diag(a.value.loc, "argument type does not match parameter"));
            }
        }
        for (i, was_bound) in bound.iter().enumerate() {
            if !was_bound && !defaults.get(i).copied().unwrap_or(false) {
                return Err(self.diag(e.loc, "missing argument in call"));
            }
        }
        Ok(result)
    }

    fn analyze_aggregate(
        &mut self,
        e: &'a Expr<'a>,
        items: &'a [Assoc<'a>],
        expected: Option<TypeId>,
    ) -> RResult<TypeId> {
        let Some(want) = expected else {
            return Err(self.diag(e.loc, "aggregate requires a typed context"));
        };
        let base = self.sem.types.base_type(want);
        match self.sem.types.kind(base) {
            TypeKind::Record => {
                let comps: Vec<(Symbol, TypeId)> = {
                    let desc = self.sem.types.get(base);
                    desc.discriminants
                        .iter()
                        .chain(desc.components.iter())
                        .map(|c| (c.name, c.ty))
                        .collect()
                };
                let mut positional = 0usize;
                for item in items {
                    if item.choices.is_empty() {
                        let Some(&(_, cty)) = comps.get(positional) else {
                            return Err(self.diag(item.loc, "too many components in aggregate"));
                        };
                        positional += 1;
                        self.analyze_expr(item.value, Some(cty))?;
                    } else {
                        for &choice in item.choices {
                            let cty = match choice.kind {
                                ExprKind::Others => comps
                                    .get(positional)
                                    .or(comps.last())
                                    .map(|&(_, t)| t)
                                    .unwrap_or(self.sem.predef.void),
                                ExprKind::Ident(cname) => {
                                    match comps
                                        .iter()
                                        .find(|(n, _)| self.interner.eq_ci(*n, cname))
                                    {
                                        Some(&(_, t)) => t,
                                        None => {
                                            return Err(self.diag(
                                                choice.loc,
                                                format!(
                                                    "no component '{}'",
                                                    self.interner.resolve(cname)
                                                ),
                                            ))
                                        }
                                    }
                                }
                                _ => return Err(self.diag(choice.loc, "component name expected")),
                            };
                            choice.ty.set(Some(self.sem.predef.void));
                            self.analyze_expr(item.value, Some(cty))?;
                        }
                    }
                }
                Ok(want)
            }
            TypeKind::Array => {
                let elem = self
                    .sem
                    .types
                    .get(base)
                    .elem
                    .unwrap_or(self.sem.predef.void);
                let index = self.sem.types.get(base).index;
                for item in items {
                    for &choice in item.choices {
                        match choice.kind {
                            ExprKind::Others => {
                                choice.ty.set(Some(self.sem.predef.void));
                            }
                            ExprKind::Range { low, high } => {
                                self.analyze_expr(low, index)?;
                                self.analyze_expr(high, index)?;
                                choice.ty.set(index.or(Some(self.sem.predef.integer)));
                            }
                            _ => {
                                self.analyze_expr(choice, index)?;
                            }
                        }
                    }
                    self.analyze_expr(item.value, Some(elem))?;
                }
                Ok(want)
            }
            _ => Err(self.diag(e.loc, "aggregate type must be an array or record")),
        }
    }

    // =========================================================================
    // Type marks, subtypes, and static values
    // =========================================================================

    pub fn resolve_type_mark(&mut self, mark: &'a Expr<'a>) -> RResult<TypeId> {
        match &mark.kind {
            ExprKind::Ident(name) => {
                let id = self
                    .sem
                    .syms
                    .lookup(self.interner, *name)
                    .ok_or_else(|| self.undefined(mark.loc, *name))?;
                let (kind, ty) = {
                    let entry = self.sem.syms.get(id);
                    (entry.kind, entry.ty)
                };
                if !matches!(kind, SymKind::Type | SymKind::TaskType) {
                    return Err(self.diag(
                        mark.loc,
                        format!("'{}' is not a type", self.interner.resolve(*name)),
                    ));
                }
                let tid = ty.unwrap_or(self.sem.predef.void);
                mark.sym.set(Some(id));
                mark.ty.set(Some(tid));
                Ok(tid)
            }
            ExprKind::Selected { .. } => {
                let tid = self.analyze_expr(mark, None)?;
                match mark.sym.get() {
                    Some(id)
                        if matches!(
                            self.sem.syms.get(id).kind,
                            SymKind::Type | SymKind::TaskType
                        ) =>
                    {
                        Ok(tid)
                    }
                    _ => Err(self.diag(mark.loc, "type name expected")),
                }
            }
            _ => {
                self.analyze_expr(mark, None)?;
                Err(self.diag(mark.loc, "type name expected"))
            }
        }
    }

    /// A subtype indication derives a constrained descriptor from its base
    /// type: inherited element and index types, overridden bounds.
    pub fn resolve_subtype_ind(&mut self, ind: &'a SubtypeInd<'a>) -> RResult<TypeId> {
        let base = self.resolve_type_mark(ind.mark)?;
        match &ind.constraint {
            None => Ok(base),
            Some(Constraint::Range(r)) => {
                let (low, high) = self.static_range(r, Some(base))?;
                Ok(self.derive_scalar(base, low, high))
            }
            Some(Constraint::Index(ranges)) => {
                if ranges.len() != 1 {
                    return Err(self.diag(ind.loc, "exactly one index constraint is supported"));
                }
                let (low, high) = self.static_range(ranges[0], None)?;
                let (name, elem, index) = {
                    let src = self.sem.types.get(self.sem.types.base_type(base));
                    (src.name, src.elem, src.index)
                };
                let tid = self.sem.types.new_type(TypeKind::Array, name);
                let desc = self.sem.types.get_mut(tid);
                desc.base = Some(base);
                desc.elem = elem;
                desc.index = index;
                desc.low = low;
                desc.high = high;
                self.sem.types.freeze(tid);
                Ok(tid)
            }
            Some(Constraint::Digits(d, r)) => {
                self.analyze_expr(d, None)?;
                match *r {
                    Some(r) => {
                        let (low, high) = self.static_range(r, Some(base))?;
                        Ok(self.derive_scalar(base, low, high))
                    }
                    None => Ok(base),
                }
            }
            Some(Constraint::Delta(d, r)) => {
                self.analyze_expr(d, None)?;
                match *r {
                    Some(r) => {
                        let (low, high) = self.static_range(r, Some(base))?;
                        Ok(self.derive_scalar(base, low, high))
                    }
                    None => Ok(base),
                }
            }
            Some(Constraint::Discriminant(assocs)) => {
                let discs: Vec<(Symbol, TypeId)> = self
                    .sem
                    .types
                    .get(self.sem.types.base_type(base))
                    .discriminants
                    .iter()
                    .map(|d| (d.name, d.ty))
                    .collect();
                let mut positional = 0usize;
                for a in *assocs {
                    let dty = if a.choices.is_empty() {
                        let t = discs.get(positional).map(|&(_, t)| t);
                        positional += 1;
                        t
                    } else if let ExprKind::Ident(dname) = a.choices[0].kind {
                        a.choices[0].ty.set(Some(self.sem.predef.void));
                        discs
                            .iter()
                            .find(|(n, _)| self.interner.eq_ci(*n, dname))
                            .map(|&(_, t)| t)
                    } else {
                        None
                    };
                    self.analyze_expr(a.value, dty)?;
                }
                Ok(base)
            }
        }
    }

    fn derive_scalar(&mut self, base: TypeId, low: i64, high: i64) -> TypeId {
        let (kind, name, elem, index) = {
            let src = self.sem.types.get(self.sem.types.base_type(base));
            (src.kind, src.name, src.elem, src.index)
        };
        let tid = self.sem.types.new_type(kind, name);
        let desc = self.sem.types.get_mut(tid);
        desc.base = Some(base);
        desc.elem = elem;
        desc.index = index;
        desc.low = low;
        desc.high = high;
        tid
    }

    fn analyze_range_expr(&mut self, r: &'a Expr<'a>) -> RResult<()> {
        if let ExprKind::Range { low, high } = r.kind {
            let lt = self.analyze_expr(low, None)?;
            self.analyze_expr(high, Some(lt))?;
            r.ty.set(Some(lt));
        } else {
            self.analyze_expr(r, None)?;
        }
        Ok(())
    }

    /// Bounds of a range expression, a range attribute, or a type mark.
    /// Non-static bounds fall back to the base type's bounds.
    fn static_range(&mut self, r: &'a Expr<'a>, base: Option<TypeId>) -> RResult<(i64, i64)> {
        match &r.kind {
            ExprKind::Range { low, high } => {
                let lt = self.analyze_expr(low, base)?;
                self.analyze_expr(high, Some(lt))?;
                r.ty.set(Some(lt));
                let fallback = base.map(|b| {
                    let d = self.sem.types.get(self.sem.types.base_type(b));
                    (d.low, d.high)
                });
                let lo = self
                    .static_int(low)
                    .or(fallback.map(|f| f.0))
                    .unwrap_or(i32::MIN as i64);
                let hi = self
                    .static_int(high)
                    .or(fallback.map(|f| f.1))
                    .unwrap_or(i32::MAX as i64);
                Ok((lo, hi))
            }
            ExprKind::Attribute { .. } => {
                let t = self.analyze_expr(r, None)?;
                let d = self.sem.types.get(self.sem.types.base_type(t));
                Ok((d.low, d.high))
            }
            _ => {
                let tid = self.resolve_type_mark(r)?;
                let d = self.sem.types.get(tid);
                Ok((d.low, d.high))
            }
        }
    }

    /// Compile-time integer value of an already-analyzed expression.
    pub fn static_int(&self, e: &Expr<'a>) -> Option<i64> {
        match &e.kind {
            ExprKind::Int { value, big: None } => Some(*value),
            ExprKind::Binary { folded, .. } => folded.get(),
            ExprKind::Unary {
                op: UnOp::Minus,
                operand,
            } => self.static_int(operand).and_then(i64::checked_neg),
            ExprKind::Unary {
                op: UnOp::Plus,
                operand,
            } => self.static_int(operand),
            ExprKind::Unary {
                op: UnOp::Abs,
                operand,
            } => self.static_int(operand).map(i64::abs),
            ExprKind::Qualified { operand, .. } => self.static_int(operand),
            ExprKind::Char(c) => Some(*c as i64),
            ExprKind::Ident(_) => e.sym.get().and_then(|id| self.sem.syms.get(id).value),
            _ => None,
        }
    }
}
