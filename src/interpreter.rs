//! Tree-walking evaluator over the resolved AST.
//!
//! Statements report how control left them through [`Flow`]; exceptions
//! travel as the `Err` arm of every evaluator result and unwind until a
//! handler whose choice list names them (or `others`) runs. Call frames
//! are bounded; exhausting them raises STORAGE_ERROR like any other
//! runtime check.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::analysis::SemCtx;
use crate::ast::{
    Assoc, BinOp, CallClass, CompilationUnit, Decl, DeclKind, Expr, ExprKind, Handler,
    LoopScheme, ParamMode, Stmt, StmtKind, UnOp,
};
use crate::diag::SourceLoc;
use crate::intern::{Interner, Symbol};
use crate::symtab::{SymKind, SymbolId};
use crate::types::{TypeId, TypeKind};
use crate::value::{int_mod, int_pow, int_rem, ArrayVal, RecordVal, Value};

/// Call-stack bound; one more call raises STORAGE_ERROR.
pub const MAX_CALL_DEPTH: usize = 256;

/// An exception in flight: the resolved symbol when one exists, the name
/// always, and where it was raised.
#[derive(Debug, Clone)]
pub struct Raised {
    pub sym: Option<SymbolId>,
    pub name: Symbol,
    pub loc: SourceLoc,
}

/// How control left a statement.
#[derive(Debug)]
pub enum Flow {
    Normal,
    ExitLoop(Option<Symbol>),
    Return,
    Goto(Symbol),
}

type ExecResult = Result<Flow, Raised>;
type EvalResult = Result<Value, Raised>;

/// One binding frame: symbol to value, growable.
pub struct Frame {
    bindings: HashMap<SymbolId, Value>,
    ret: Value,
    has_returned: bool,
}

impl Frame {
    fn new() -> Self {
        Frame {
            bindings: HashMap::new(),
            ret: Value::None,
            has_returned: false,
        }
    }
}

/// An output sink tests can read back after the run.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub struct Interpreter<'s, 'a, 'i> {
    sem: &'s SemCtx<'a>,
    interner: &'i Interner,
    globals: Frame,
    stack: Vec<Frame>,
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
    /// The occurrence being handled, for bare `raise`.
    current_exception: Option<Raised>,
}

impl<'s, 'a, 'i> Interpreter<'s, 'a, 'i> {
    pub fn new(
        sem: &'s SemCtx<'a>,
        interner: &'i Interner,
        input: Box<dyn BufRead>,
        output: Box<dyn Write>,
    ) -> Self {
        Interpreter {
            sem,
            interner,
            globals: Frame::new(),
            stack: Vec::new(),
            input,
            output,
            current_exception: None,
        }
    }

    /// Elaborate the unit's library-level declarations without running
    /// anything else; used for `with`ed dependencies.
    pub fn elaborate_unit(&mut self, unit: &'a CompilationUnit<'a>) -> Result<(), Raised> {
        for &decl in unit.units {
            self.elaborate_decl(decl)?;
        }
        Ok(())
    }

    /// Elaborate the unit's library-level declarations, then run its main
    /// subprogram (the last library unit carrying a body).
    pub fn run_unit(&mut self, unit: &'a CompilationUnit<'a>) -> Result<(), Raised> {
        self.elaborate_unit(unit)?;
        let main = unit
            .units
            .iter()
            .rev()
            .find(|d| matches!(d.kind, DeclKind::Subprogram { body: Some(_), .. }));
        if let Some(&main) = main {
            self.call_declared(main, Vec::new(), main.loc)?;
        }
        Ok(())
    }

    /// Format a raised exception for the driver's fatal report.
    pub fn describe(&self, raised: &Raised) -> String {
        format!(
            "{}:{}:{}: unhandled exception {}",
            self.interner.resolve(raised.loc.file),
            raised.loc.line,
            raised.loc.col,
            self.interner.resolve(raised.name)
        )
    }

    fn raise(&self, name: Symbol, loc: SourceLoc) -> Raised {
        Raised {
            sym: self.sem.syms.lookup(self.interner, name),
            name,
            loc,
        }
    }

    fn constraint_error(&self, loc: SourceLoc) -> Raised {
        self.raise(self.sem.wk.constraint_error, loc)
    }

    fn program_error(&self, loc: SourceLoc) -> Raised {
        self.raise(self.sem.wk.program_error, loc)
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    fn bind(&mut self, sym: SymbolId, value: Value) {
        let frame = self.stack.last_mut().unwrap_or(&mut self.globals);
        frame.bindings.insert(sym, value);
    }

    fn lookup(&self, sym: SymbolId) -> Option<Value> {
        if let Some(frame) = self.stack.last() {
            if let Some(v) = frame.bindings.get(&sym) {
                return Some(v.clone());
            }
        }
        self.globals.bindings.get(&sym).cloned()
    }

    /// Mutate the innermost binding that owns the symbol; without one, a
    /// fresh global binding is created.
    fn assign_sym(&mut self, sym: SymbolId, value: Value) {
        if let Some(frame) = self.stack.last_mut() {
            if frame.bindings.contains_key(&sym) {
                frame.bindings.insert(sym, value);
                return;
            }
        }
        self.globals.bindings.insert(sym, value);
    }

    // =========================================================================
    // Elaboration
    // =========================================================================

    /// Create the run-time effect of a declaration: objects get bindings,
    /// package bodies run their initialization statements, everything
    /// else waits to be called.
    fn elaborate_decl(&mut self, decl: &'a Decl<'a>) -> Result<(), Raised> {
        match &decl.kind {
            DeclKind::Object { init, .. } => {
                let Some(sym) = decl.sym.get() else {
                    return Ok(());
                };
                let ty = self.sem.syms.get(sym).ty.unwrap_or(self.sem.predef.void);
                let value = match init {
                    Some(init) => self.eval_with_conversion(init, ty)?,
                    None => self.default_value(ty),
                };
                self.bind(sym, value);
                Ok(())
            }
            DeclKind::Number { value, .. } => {
                if let Some(sym) = decl.sym.get() {
                    let v = self.eval_expr(value)?;
                    self.bind(sym, v);
                }
                Ok(())
            }
            DeclKind::ObjectRename { .. } => Ok(()),
            DeclKind::Package {
                visible,
                private_part,
                body,
                ..
            } => {
                for &d in visible.iter().chain(private_part.iter()) {
                    self.elaborate_decl(d)?;
                }
                if let Some(body) = body {
                    for &d in body.decls {
                        self.elaborate_decl(d)?;
                    }
                    match self.exec_seq(body.stmts) {
                        Ok(_) => Ok(()),
                        Err(raised) => match self.find_handler(body.handlers, &raised) {
                            Some(handler) => {
                                self.run_handler(handler, raised).map(|_| ())
                            }
                            None => Err(raised),
                        },
                    }
                } else {
                    Ok(())
                }
            }
            // Types, subprograms, and the parse-only constructs have no
            // elaboration effect.
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn call_declared(
        &mut self,
        decl: &'a Decl<'a>,
        actuals: Vec<(SymbolId, Value)>,
        loc: SourceLoc,
    ) -> EvalResult {
        self.call_with_frame(decl, actuals, loc).map(|(v, _)| v)
    }

    /// Like `call_declared` but also hands the popped frame back, so the
    /// caller can copy `out`-mode parameters to their actuals.
    fn call_with_frame(
        &mut self,
        decl: &'a Decl<'a>,
        actuals: Vec<(SymbolId, Value)>,
        loc: SourceLoc,
    ) -> Result<(Value, Frame), Raised> {
        let DeclKind::Subprogram { body: Some(body), .. } = &decl.kind else {
            return Err(self.program_error(loc));
        };
        if self.stack.len() >= MAX_CALL_DEPTH {
            return Err(self.raise(self.sem.wk.storage_error, loc));
        }
        self.stack.push(Frame::new());
        let mut outcome: Result<(), Raised> = Ok(());
        for (sym, value) in actuals {
            self.bind(sym, value);
        }
        for &d in body.decls {
            if let Err(raised) = self.elaborate_local(d) {
                outcome = Err(raised);
                break;
            }
        }
        if outcome.is_ok() {
            outcome = match self.exec_seq(body.stmts) {
                Ok(_) => Ok(()),
                Err(raised) => match self.find_handler(body.handlers, &raised) {
                    Some(handler) => self.run_handler(handler, raised).map(|_| ()),
                    None => Err(raised),
                },
            };
        }
        let frame = self.stack.pop().expect("frame pushed above");
        outcome?;
        let ret = frame.ret.clone();
        Ok((ret, frame))
    }

    fn elaborate_local(&mut self, decl: &'a Decl<'a>) -> Result<(), Raised> {
        self.elaborate_decl(decl)
    }

    /// Resolve a call through a subprogram symbol: bind actuals to
    /// formals (positional fills in order, named associations match by
    /// parameter name, unbound formals take their declared defaults),
    /// execute, then copy back `out` parameters.
    fn call_subprogram(
        &mut self,
        sym: SymbolId,
        args: &'a [Assoc<'a>],
        loc: SourceLoc,
    ) -> EvalResult {
        let entry = self.sem.syms.get(sym);
        let Some(decl) = entry.decl else {
            return self.call_builtin(entry.name, args, loc);
        };
        let DeclKind::Subprogram { spec, body, renames, .. } = &decl.kind else {
            return Err(self.program_error(loc));
        };
        if let Some(target) = renames {
            if let Some(renamed) = target.sym.get() {
                return self.call_subprogram(renamed, args, loc);
            }
            return Err(self.program_error(loc));
        }
        if body.is_none() {
            // Spec-only declarations and generic instantiations have
            // nothing to execute.
            return Err(self.program_error(loc));
        }

        let params = spec.params;
        let mut slots: Vec<Option<Value>> = vec![None; params.len()];
        let mut positional = 0usize;
        for a in args {
            let slot = if a.choices.is_empty() {
                let i = positional;
                positional += 1;
                i
            } else if let ExprKind::Ident(pname) = a.choices[0].kind {
                params
                    .iter()
                    .position(|p| self.interner.eq_ci(p.name, pname))
                    .ok_or_else(|| self.program_error(a.loc))?
            } else {
                return Err(self.program_error(a.loc));
            };
            if slot >= params.len() {
                return Err(self.program_error(a.loc));
            }
            let formal_ty = self
                .sem
                .syms
                .get(sym)
                .param_types
                .get(slot)
                .copied()
                .unwrap_or(self.sem.predef.void);
            slots[slot] = Some(self.eval_with_conversion(a.value, formal_ty)?);
        }
        let mut actuals = Vec::with_capacity(params.len());
        for (i, p) in params.iter().enumerate() {
            let Some(psym) = p.sym.get() else {
                return Err(self.program_error(p.loc));
            };
            let value = match slots[i].take() {
                Some(v) => v,
                None => match p.default {
                    Some(default) => self.eval_expr(default)?,
                    None => {
                        let t = self
                            .sem
                            .syms
                            .get(psym)
                            .ty
                            .unwrap_or(self.sem.predef.void);
                        self.default_value(t)
                    }
                },
            };
            actuals.push((psym, value));
        }

        let (result, frame) = self.call_with_frame(decl, actuals, loc)?;

        // A function body that runs off its end never produced a result.
        if spec.kind == crate::ast::SubpKind::Function && !frame.has_returned {
            return Err(self.program_error(loc));
        }

        // Copy-back for out and in-out parameters whose actuals are names.
        let mut positional = 0usize;
        for a in args {
            let slot = if a.choices.is_empty() {
                let i = positional;
                positional += 1;
                i
            } else if let ExprKind::Ident(pname) = a.choices[0].kind {
                match params
                    .iter()
                    .position(|p| self.interner.eq_ci(p.name, pname))
                {
                    Some(i) => i,
                    None => continue,
                }
            } else {
                continue;
            };
            let p = &params[slot];
            if p.mode == ParamMode::In {
                continue;
            }
            if let Some(psym) = p.sym.get() {
                if let Some(v) = frame.bindings.get(&psym) {
                    self.assign_target(a.value, v.clone())?;
                }
            }
        }
        Ok(result)
    }

    // =========================================================================
    // Built-in text IO
    // =========================================================================

    fn call_builtin(&mut self, name: Symbol, args: &'a [Assoc<'a>], loc: SourceLoc) -> EvalResult {
        let wk = self.sem.wk;
        if self.interner.eq_ci(name, wk.put) || self.interner.eq_ci(name, wk.put_line) {
            for a in args {
                let v = self.eval_expr(a.value)?;
                let text = self.display_value(&v, a.value.ty.get());
                self.write_out(&text, loc)?;
            }
            if self.interner.eq_ci(name, wk.put_line) {
                self.write_out("\n", loc)?;
            }
            return Ok(Value::None);
        }
        if self.interner.eq_ci(name, wk.new_line) {
            let count = match args.first() {
                Some(a) => self.eval_expr(a.value)?.as_int().unwrap_or(1).max(0),
                None => 1,
            };
            for _ in 0..count {
                self.write_out("\n", loc)?;
            }
            return Ok(Value::None);
        }
        if self.interner.eq_ci(name, wk.get) || self.interner.eq_ci(name, wk.get_line) {
            let Some(target) = args.first() else {
                return Err(self.program_error(loc));
            };
            let mut line = String::new();
            let read = match self.input.read_line(&mut line) {
                Ok(n) => n,
                Err(_) => return Err(self.raise_named("DEVICE_ERROR", loc)),
            };
            if read == 0 {
                return Err(self.raise_named("END_ERROR", loc));
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            let value = if self.interner.eq_ci(name, wk.get_line) {
                Value::from_str(trimmed)
            } else {
                let target_ty = target.value.ty.get().unwrap_or(self.sem.predef.integer);
                let base = self.sem.types.base_type(target_ty);
                match self.sem.types.kind(base) {
                    TypeKind::Float | TypeKind::Fixed | TypeKind::UniversalReal => {
                        let parsed: f64 = trimmed
                            .trim()
                            .parse()
                            .map_err(|_| self.raise_named("DATA_ERROR", loc))?;
                        Value::Real {
                            ty: target_ty,
                            val: parsed,
                        }
                    }
                    _ => {
                        let parsed: i64 = trimmed
                            .trim()
                            .parse()
                            .map_err(|_| self.raise_named("DATA_ERROR", loc))?;
                        Value::int(target_ty, parsed)
                    }
                }
            };
            self.assign_target(target.value, value)?;
            return Ok(Value::None);
        }
        Err(self.program_error(loc))
    }

    fn raise_named(&self, name: &str, loc: SourceLoc) -> Raised {
        match self.interner.lookup(name) {
            Some(sym) => self.raise(sym, loc),
            None => self.program_error(loc),
        }
    }

    fn write_out(&mut self, text: &str, loc: SourceLoc) -> Result<(), Raised> {
        match self.output.write_all(text.as_bytes()) {
            Ok(()) => Ok(()),
            Err(_) => Err(self.raise_named("DEVICE_ERROR", loc)),
        }
    }

    /// Text form used by PUT: characters print themselves, strings print
    /// their bytes, discrete values print their ordinal, reals print
    /// shortest-form decimal.
    fn display_value(&self, v: &Value, ty: Option<TypeId>) -> String {
        match v {
            Value::Str(bytes) => String::from_utf8_lossy(&bytes.borrow()).into_owned(),
            Value::Int { ty: vty, val } => {
                let t = ty.unwrap_or(*vty);
                if self.sem.types.kind(self.sem.types.base_type(t)) == TypeKind::Character {
                    (*val as u8 as char).to_string()
                } else {
                    val.to_string()
                }
            }
            Value::Real { val, .. } => format_real(*val),
            Value::Array(arr) => {
                let arr = arr.borrow();
                let parts: Vec<String> = arr
                    .elems
                    .iter()
                    .map(|e| self.display_value(e, None))
                    .collect();
                format!("({})", parts.join(", "))
            }
            Value::Record(rec) => {
                let rec = rec.borrow();
                let parts: Vec<String> = rec
                    .fields
                    .iter()
                    .map(|(n, v)| {
                        format!("{} => {}", self.interner.resolve(*n), self.display_value(v, None))
                    })
                    .collect();
                format!("({})", parts.join(", "))
            }
            Value::Access { cell, .. } => {
                if cell.is_some() {
                    "access".to_string()
                } else {
                    "null".to_string()
                }
            }
            Value::Task(_) => "task".to_string(),
            Value::ExceptionOccurrence(name) => self.interner.resolve(*name).to_string(),
            Value::None => String::new(),
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Run a statement sequence. A pending goto is served by scanning the
    /// sequence for the target label; an unmatched label propagates to
    /// the enclosing sequence.
    fn exec_seq(&mut self, stmts: &'a [&'a Stmt<'a>]) -> ExecResult {
        let mut i = 0;
        while i < stmts.len() {
            match self.exec_stmt(stmts[i])? {
                Flow::Normal => i += 1,
                Flow::Goto(target) => {
                    let found = stmts.iter().position(|s| {
                        s.label
                            .map(|l| self.interner.eq_ci(l, target))
                            .unwrap_or(false)
                    });
                    match found {
                        Some(idx) => i = idx,
                        None => return Ok(Flow::Goto(target)),
                    }
                }
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &'a Stmt<'a>) -> ExecResult {
        match &stmt.kind {
            StmtKind::Null => Ok(Flow::Normal),
            StmtKind::Assign { target, value } => {
                let ty = target.ty.get().unwrap_or(self.sem.predef.void);
                let v = self.eval_with_conversion(value, ty)?;
                self.assign_target(target, v)?;
                Ok(Flow::Normal)
            }
            StmtKind::Call(callee) => {
                self.eval_expr(callee)?;
                Ok(Flow::Normal)
            }
            StmtKind::If { arms, else_stmts } => {
                for arm in *arms {
                    if self.eval_expr(arm.cond)?.is_true() {
                        return self.exec_seq(arm.stmts);
                    }
                }
                if let Some(stmts) = *else_stmts {
                    return self.exec_seq(stmts);
                }
                Ok(Flow::Normal)
            }
            StmtKind::Case { selector, alts } => {
                let v = self.eval_expr(selector)?;
                for alt in *alts {
                    for &choice in alt.choices {
                        if self.choice_matches(choice, &v)? {
                            return self.exec_seq(alt.stmts);
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Loop { scheme, body } => self.exec_loop(stmt.label, scheme, body),
            StmtKind::Block {
                decls,
                stmts,
                handlers,
            } => {
                for &d in *decls {
                    self.elaborate_decl(d)?;
                }
                match self.exec_seq(stmts) {
                    Ok(flow) => Ok(flow),
                    Err(raised) => match self.find_handler(handlers, &raised) {
                        Some(handler) => self.run_handler(handler, raised),
                        None => Err(raised),
                    },
                }
            }
            StmtKind::Exit { loop_name, when } => {
                if let Some(cond) = *when {
                    if !self.eval_expr(cond)?.is_true() {
                        return Ok(Flow::Normal);
                    }
                }
                Ok(Flow::ExitLoop(*loop_name))
            }
            StmtKind::Return { value } => {
                if let Some(value) = *value {
                    let v = self.eval_expr(value)?;
                    if let Some(frame) = self.stack.last_mut() {
                        frame.ret = v;
                        frame.has_returned = true;
                    }
                } else if let Some(frame) = self.stack.last_mut() {
                    frame.has_returned = true;
                }
                Ok(Flow::Return)
            }
            StmtKind::Goto { target } => Ok(Flow::Goto(*target)),
            StmtKind::Raise { name } => match name {
                Some(name) => {
                    let sym = name.sym.get();
                    let named = match &name.kind {
                        ExprKind::Ident(n) => *n,
                        ExprKind::Selected { selector, .. } => *selector,
                        _ => self.sem.wk.program_error,
                    };
                    Err(Raised {
                        sym,
                        name: named,
                        loc: stmt.loc,
                    })
                }
                None => match self.current_exception.clone() {
                    Some(mut raised) => {
                        raised.loc = stmt.loc;
                        Err(raised)
                    }
                    None => Err(self.program_error(stmt.loc)),
                },
            },
            // Tasking statements parse and resolve but do nothing here.
            StmtKind::Delay { amount } => {
                self.eval_expr(amount)?;
                Ok(Flow::Normal)
            }
            StmtKind::Abort { .. } => Ok(Flow::Normal),
            StmtKind::Accept { .. } => Ok(Flow::Normal),
            StmtKind::Select { .. } => Ok(Flow::Normal),
        }
    }

    fn exec_loop(
        &mut self,
        label: Option<Symbol>,
        scheme: &'a LoopScheme<'a>,
        body: &'a [&'a Stmt<'a>],
    ) -> ExecResult {
        match scheme {
            LoopScheme::Forever => loop {
                match self.loop_body(label, body)? {
                    LoopStep::Continue => {}
                    LoopStep::Done => return Ok(Flow::Normal),
                    LoopStep::Escape(flow) => return Ok(flow),
                }
            },
            LoopScheme::While(cond) => loop {
                if !self.eval_expr(cond)?.is_true() {
                    return Ok(Flow::Normal);
                }
                match self.loop_body(label, body)? {
                    LoopStep::Continue => {}
                    LoopStep::Done => return Ok(Flow::Normal),
                    LoopStep::Escape(flow) => return Ok(flow),
                }
            },
            LoopScheme::For {
                reverse,
                range,
                sym,
                ..
            } => {
                let Some(var_sym) = sym.get() else {
                    return Err(self.program_error(range.loc));
                };
                let var_ty = self
                    .sem
                    .syms
                    .get(var_sym)
                    .ty
                    .unwrap_or(self.sem.predef.integer);
                let (low, high) = self.range_bounds(range)?;
                let mut step = 0i64;
                let count = if high >= low { high - low + 1 } else { 0 };
                while step < count {
                    let v = if *reverse { high - step } else { low + step };
                    self.bind(var_sym, Value::int(var_ty, v));
                    match self.loop_body(label, body)? {
                        LoopStep::Continue => {}
                        LoopStep::Done => return Ok(Flow::Normal),
                        LoopStep::Escape(flow) => return Ok(flow),
                    }
                    step += 1;
                }
                Ok(Flow::Normal)
            }
        }
    }

    fn loop_body(
        &mut self,
        label: Option<Symbol>,
        body: &'a [&'a Stmt<'a>],
    ) -> Result<LoopStep, Raised> {
        match self.exec_seq(body)? {
            Flow::Normal => Ok(LoopStep::Continue),
            Flow::ExitLoop(None) => Ok(LoopStep::Done),
            Flow::ExitLoop(Some(target)) => {
                // A labelled exit unwinds until the loop wearing the label.
                if label
                    .map(|l| self.interner.eq_ci(l, target))
                    .unwrap_or(false)
                {
                    Ok(LoopStep::Done)
                } else {
                    Ok(LoopStep::Escape(Flow::ExitLoop(Some(target))))
                }
            }
            other => Ok(LoopStep::Escape(other)),
        }
    }

    // =========================================================================
    // Exception handling
    // =========================================================================

    fn find_handler(
        &self,
        handlers: &'a [Handler<'a>],
        raised: &Raised,
    ) -> Option<&'a Handler<'a>> {
        for handler in handlers {
            for &choice in handler.choices {
                let hit = match choice.kind {
                    ExprKind::Others => true,
                    _ => match (choice.sym.get(), raised.sym) {
                        (Some(a), Some(b)) => a == b,
                        _ => false,
                    },
                };
                if hit {
                    return Some(handler);
                }
            }
        }
        None
    }

    fn run_handler(&mut self, handler: &'a Handler<'a>, raised: Raised) -> ExecResult {
        let previous = self.current_exception.replace(raised);
        let result = self.exec_seq(handler.stmts);
        self.current_exception = previous;
        result
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn eval_expr(&mut self, e: &'a Expr<'a>) -> EvalResult {
        let ty = e.ty.get().unwrap_or(self.sem.predef.void);
        match &e.kind {
            ExprKind::Int { value, big } => {
                if big.is_some() {
                    // The literal exceeded 64 bits; nothing at run time
                    // can hold it.
                    return Err(self.constraint_error(e.loc));
                }
                Ok(Value::int(self.concrete_int(ty), *value))
            }
            ExprKind::Real(v) => Ok(Value::Real {
                ty: self.concrete_real(ty),
                val: *v,
            }),
            ExprKind::Char(c) => Ok(Value::int(ty, *c as i64)),
            ExprKind::Str(s) => Ok(Value::from_str(self.interner.resolve(*s))),
            ExprKind::Null => Ok(Value::Access { ty, cell: None }),
            ExprKind::Others => Err(self.program_error(e.loc)),
            ExprKind::Ident(_) => self.eval_ident(e),
            ExprKind::Binary {
                op,
                lhs,
                rhs,
                folded,
            } => {
                if let Some(v) = folded.get() {
                    return Ok(Value::int(self.concrete_int(ty), v));
                }
                self.eval_binary(e, *op, lhs, rhs)
            }
            ExprKind::Unary { op, operand } => self.eval_unary(e, *op, operand),
            ExprKind::Attribute {
                prefix,
                designator,
                args,
            } => self.eval_attribute(e, prefix, *designator, args),
            ExprKind::Qualified { operand, .. } => self.eval_with_conversion(operand, ty),
            ExprKind::Call {
                callee,
                args,
                class,
            } => match class.get() {
                CallClass::Subprogram => {
                    let Some(sym) = callee.sym.get() else {
                        return Err(self.program_error(e.loc));
                    };
                    self.call_subprogram(sym, args, e.loc)
                }
                CallClass::Index => {
                    let container = self.eval_expr(callee)?;
                    let index = self
                        .eval_expr(args[0].value)?
                        .as_int()
                        .ok_or_else(|| self.constraint_error(e.loc))?;
                    self.index_value(&container, index, e.loc)
                }
                CallClass::Convert => {
                    let v = self.eval_expr(args[0].value)?;
                    self.convert_value(v, ty, e.loc)
                }
                CallClass::Unresolved => Err(self.program_error(e.loc)),
            },
            ExprKind::Slice { prefix, range } => self.eval_slice(prefix, range, e.loc),
            ExprKind::Selected { prefix, selector } => self.eval_selected(e, prefix, *selector),
            ExprKind::Allocator { mark, init } => {
                let designated = mark.ty.get().unwrap_or(self.sem.predef.void);
                let inner = match init {
                    Some(init) => self.eval_with_conversion(init, designated)?,
                    None => self.default_value(designated),
                };
                Ok(Value::Access {
                    ty,
                    cell: Some(Rc::new(RefCell::new(inner))),
                })
            }
            ExprKind::Deref { prefix } => {
                let v = self.eval_expr(prefix)?;
                match v {
                    Value::Access {
                        cell: Some(cell), ..
                    } => Ok(cell.borrow().clone()),
                    Value::Access { cell: None, .. } => Err(self.constraint_error(e.loc)),
                    _ => Err(self.program_error(e.loc)),
                }
            }
            ExprKind::Aggregate { items } => self.eval_aggregate(e, items),
            ExprKind::Range { .. } => Err(self.program_error(e.loc)),
            ExprKind::Membership {
                operand,
                mark,
                negated,
            } => {
                let v = self.eval_expr(operand)?;
                let inside = self.value_in_range(&v, mark)?;
                Ok(Value::boolean(
                    self.sem.predef.boolean,
                    inside != *negated,
                ))
            }
        }
    }

    /// Evaluate under a target type, applying the implicit conversions a
    /// universal operand needs.
    fn eval_with_conversion(&mut self, e: &'a Expr<'a>, target: TypeId) -> EvalResult {
        let v = self.eval_expr(e)?;
        let base = self.sem.types.base_type(target);
        match (&v, self.sem.types.kind(base)) {
            (Value::Int { val, .. }, TypeKind::Float | TypeKind::Fixed | TypeKind::UniversalReal) => {
                Ok(Value::Real {
                    ty: target,
                    val: *val as f64,
                })
            }
            _ => Ok(v),
        }
    }

    fn eval_ident(&mut self, e: &'a Expr<'a>) -> EvalResult {
        let Some(sym) = e.sym.get() else {
            return Err(self.program_error(e.loc));
        };
        let entry_kind = self.sem.syms.get(sym).kind;
        let entry_ty = self.sem.syms.get(sym).ty.unwrap_or(self.sem.predef.void);
        match entry_kind {
            SymKind::EnumLiteral => {
                let ordinal = self.sem.syms.get(sym).value.unwrap_or(0);
                Ok(Value::int(entry_ty, ordinal))
            }
            SymKind::Function | SymKind::Procedure => {
                // A bare name naming a subprogram is a parameterless call.
                self.call_subprogram(sym, &[], e.loc)
            }
            SymKind::Constant => {
                if let Some(v) = self.lookup(sym) {
                    return Ok(v);
                }
                // Compile-time constant evaluated on demand.
                if let Some(v) = self.sem.syms.get(sym).value {
                    return Ok(Value::int(self.concrete_int(entry_ty), v));
                }
                match self.sem.syms.get(sym).decl {
                    Some(Decl {
                        kind: DeclKind::Object {
                            init: Some(init), ..
                        },
                        ..
                    })
                    | Some(Decl {
                        kind: DeclKind::Number { value: init, .. },
                        ..
                    }) => self.eval_expr(init),
                    _ => Ok(self.default_value(entry_ty)),
                }
            }
            SymKind::Exception => Ok(Value::ExceptionOccurrence(self.sem.syms.get(sym).name)),
            _ => {
                // Renamed objects read through to their target.
                if let Some(Decl {
                    kind: DeclKind::ObjectRename { target, .. },
                    ..
                }) = self.sem.syms.get(sym).decl
                {
                    return self.eval_expr(target);
                }
                match self.lookup(sym) {
                    Some(v) => Ok(v),
                    None => Ok(self.default_value(entry_ty)),
                }
            }
        }
    }

    fn eval_binary(
        &mut self,
        e: &'a Expr<'a>,
        op: BinOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    ) -> EvalResult {
        let bool_ty = self.sem.predef.boolean;

        // Short-circuit forms decide on the left value alone.
        if op == BinOp::AndThen {
            let l = self.eval_expr(lhs)?;
            if !l.is_true() {
                return Ok(Value::boolean(bool_ty, false));
            }
            let r = self.eval_expr(rhs)?;
            return Ok(Value::boolean(bool_ty, r.is_true()));
        }
        if op == BinOp::OrElse {
            let l = self.eval_expr(lhs)?;
            if l.is_true() {
                return Ok(Value::boolean(bool_ty, true));
            }
            let r = self.eval_expr(rhs)?;
            return Ok(Value::boolean(bool_ty, r.is_true()));
        }

        let l = self.eval_expr(lhs)?;
        let r = self.eval_expr(rhs)?;
        match op {
            BinOp::And => Ok(Value::boolean(bool_ty, l.is_true() && r.is_true())),
            BinOp::Or => Ok(Value::boolean(bool_ty, l.is_true() || r.is_true())),
            BinOp::Xor => Ok(Value::boolean(bool_ty, l.is_true() != r.is_true())),
            BinOp::Eq => Ok(Value::boolean(bool_ty, self.values_equal(&l, &r))),
            BinOp::Ne => Ok(Value::boolean(bool_ty, !self.values_equal(&l, &r))),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let ordering = self.compare_values(&l, &r, e.loc)?;
                let truth = match op {
                    BinOp::Lt => ordering.is_lt(),
                    BinOp::Le => ordering.is_le(),
                    BinOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                Ok(Value::boolean(bool_ty, truth))
            }
            BinOp::Cat => self.concatenate(&l, &r, e.loc),
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Rem
            | BinOp::Pow => self.arithmetic(e, op, l, r),
            BinOp::AndThen | BinOp::OrElse => unreachable!(),
        }
    }

    fn arithmetic(&mut self, e: &'a Expr<'a>, op: BinOp, l: Value, r: Value) -> EvalResult {
        let ty = e.ty.get().unwrap_or(self.sem.predef.integer);
        if let (Value::Int { val: a, .. }, Value::Int { val: b, .. }) = (&l, &r) {
            let (a, b) = (*a, *b);
            let result = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
                BinOp::Mul => a.checked_mul(b),
                BinOp::Div => {
                    if b == 0 {
                        return Err(self.constraint_error(e.loc));
                    }
                    a.checked_div(b)
                }
                BinOp::Mod => {
                    if b == 0 {
                        return Err(self.constraint_error(e.loc));
                    }
                    Some(int_mod(a, b))
                }
                BinOp::Rem => {
                    if b == 0 {
                        return Err(self.constraint_error(e.loc));
                    }
                    Some(int_rem(a, b))
                }
                BinOp::Pow => int_pow(a, b),
                _ => unreachable!(),
            };
            return match result {
                Some(v) => Ok(Value::int(self.concrete_int(ty), v)),
                None => Err(self.constraint_error(e.loc)),
            };
        }
        let (Some(a), Some(b)) = (l.as_real(), r.as_real()) else {
            return Err(self.program_error(e.loc));
        };
        let val = match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
            BinOp::Mod | BinOp::Rem => return Err(self.program_error(e.loc)),
            _ => unreachable!(),
        };
        Ok(Value::Real {
            ty: self.concrete_real(ty),
            val,
        })
    }

    fn eval_unary(&mut self, e: &'a Expr<'a>, op: UnOp, operand: &'a Expr<'a>) -> EvalResult {
        let v = self.eval_expr(operand)?;
        match op {
            UnOp::Plus => Ok(v),
            UnOp::Minus => match v {
                Value::Int { ty, val } => val
                    .checked_neg()
                    .map(|n| Value::int(ty, n))
                    .ok_or_else(|| self.constraint_error(e.loc)),
                Value::Real { ty, val } => Ok(Value::Real { ty, val: -val }),
                _ => Err(self.program_error(e.loc)),
            },
            UnOp::Abs => match v {
                Value::Int { ty, val } => val
                    .checked_abs()
                    .map(|n| Value::int(ty, n))
                    .ok_or_else(|| self.constraint_error(e.loc)),
                Value::Real { ty, val } => Ok(Value::Real {
                    ty,
                    val: val.abs(),
                }),
                _ => Err(self.program_error(e.loc)),
            },
            UnOp::Not => match v {
                Value::Int { .. } => Ok(Value::boolean(self.sem.predef.boolean, !v.is_true())),
                // Bitwise complement, elementwise, on boolean arrays.
                Value::Array(arr) => {
                    let src = arr.borrow();
                    let elems: Vec<Value> = src
                        .elems
                        .iter()
                        .map(|elem| match elem {
                            Value::Int { ty, val } => Value::int(*ty, (*val == 0) as i64),
                            other => other.clone(),
                        })
                        .collect();
                    Ok(Value::Array(Rc::new(RefCell::new(ArrayVal {
                        ty: src.ty,
                        low: src.low,
                        high: src.high,
                        elems,
                    }))))
                }
                _ => Err(self.program_error(e.loc)),
            },
        }
    }

    // =========================================================================
    // Attributes, aggregates, and the rest of the name forms
    // =========================================================================

    fn eval_attribute(
        &mut self,
        e: &'a Expr<'a>,
        prefix: &'a Expr<'a>,
        designator: Symbol,
        args: &'a [&'a Expr<'a>],
    ) -> EvalResult {
        let wk = self.sem.wk;
        let interner = self.interner;
        let is = |what: Symbol| interner.eq_ci(designator, what);
        let result_ty = e.ty.get().unwrap_or(self.sem.predef.integer);

        // A type prefix answers from the descriptor; a value prefix from
        // the value.
        let type_prefix = prefix
            .sym
            .get()
            .map(|s| matches!(self.sem.syms.get(s).kind, SymKind::Type | SymKind::TaskType))
            .unwrap_or(false);

        let subject_ty = prefix.ty.get().unwrap_or(self.sem.predef.void);
        let base = self.sem.types.base_type(subject_ty);

        if is(wk.first) || is(wk.last) || is(wk.length) {
            let (low, high) = if type_prefix {
                let d = self.sem.types.get(base);
                (d.low, d.high)
            } else {
                match self.eval_expr(prefix)? {
                    Value::Array(arr) => {
                        let a = arr.borrow();
                        (a.low, a.high)
                    }
                    Value::Str(bytes) => (1, bytes.borrow().len() as i64),
                    _ => {
                        let d = self.sem.types.get(base);
                        (d.low, d.high)
                    }
                }
            };
            let v = if is(wk.first) {
                low
            } else if is(wk.last) {
                high
            } else if high >= low {
                high - low + 1
            } else {
                0
            };
            return Ok(Value::int(result_ty, v));
        }
        if is(wk.size) {
            let v = self.sem.types.get(base).size as i64 * 8;
            return Ok(Value::int(result_ty, v));
        }
        if is(wk.pos) || is(wk.val) || is(wk.succ) || is(wk.pred) {
            let arg = match args.first() {
                Some(arg) => self.eval_expr(arg)?,
                None if !type_prefix => self.eval_expr(prefix)?,
                None => return Err(self.program_error(e.loc)),
            };
            let Some(ordinal) = arg.as_int() else {
                return Err(self.constraint_error(e.loc));
            };
            let v = if is(wk.succ) {
                ordinal + 1
            } else if is(wk.pred) {
                ordinal - 1
            } else {
                ordinal
            };
            if is(wk.succ) || is(wk.pred) {
                let d = self.sem.types.get(base);
                if d.low <= d.high && (v < d.low || v > d.high) {
                    return Err(self.constraint_error(e.loc));
                }
            }
            return Ok(Value::int(result_ty, v));
        }
        if is(wk.image) {
            let arg = match args.first() {
                Some(arg) => self.eval_expr(arg)?,
                None if !type_prefix => self.eval_expr(prefix)?,
                None => return Err(self.program_error(e.loc)),
            };
            let text = match arg {
                Value::Int { val, .. } => val.to_string(),
                Value::Real { val, .. } => format_real(val),
                other => self.display_value(&other, None),
            };
            return Ok(Value::from_str(&text));
        }
        if is(wk.count) {
            // Entry queues never fill in this single-threaded model.
            return Ok(Value::int(result_ty, 0));
        }
        Err(self.program_error(e.loc))
    }

    fn eval_selected(
        &mut self,
        e: &'a Expr<'a>,
        prefix: &'a Expr<'a>,
        selector: Symbol,
    ) -> EvalResult {
        // Package member?
        if let Some(member) = e.sym.get() {
            let kind = self.sem.syms.get(member).kind;
            match kind {
                SymKind::Function | SymKind::Procedure => {
                    return self.call_subprogram(member, &[], e.loc)
                }
                SymKind::EnumLiteral => {
                    let ty = self.sem.syms.get(member).ty.unwrap_or(self.sem.predef.void);
                    let ordinal = self.sem.syms.get(member).value.unwrap_or(0);
                    return Ok(Value::int(ty, ordinal));
                }
                SymKind::Variable | SymKind::Constant | SymKind::Parameter => {
                    if let Some(v) = self.lookup(member) {
                        return Ok(v);
                    }
                    if let Some(v) = self.sem.syms.get(member).value {
                        let ty = self.sem.syms.get(member).ty.unwrap_or(self.sem.predef.void);
                        return Ok(Value::int(self.concrete_int(ty), v));
                    }
                    let ty = self.sem.syms.get(member).ty.unwrap_or(self.sem.predef.void);
                    return Ok(self.default_value(ty));
                }
                SymKind::Exception => {
                    return Ok(Value::ExceptionOccurrence(self.sem.syms.get(member).name))
                }
                _ => {}
            }
        }

        // Record component (with implicit dereference).
        let mut v = self.eval_expr(prefix)?;
        if let Value::Access { cell, .. } = &v {
            let new_v = match cell {
                Some(cell) => cell.borrow().clone(),
                None => return Err(self.constraint_error(e.loc)),
            };
            v = new_v;
        }
        let Value::Record(rec) = v else {
            return Err(self.program_error(e.loc));
        };
        let rec = rec.borrow();
        for (name, value) in &rec.fields {
            if self.interner.eq_ci(*name, selector) {
                return Ok(value.clone());
            }
        }
        Err(self.program_error(e.loc))
    }

    fn eval_slice(
        &mut self,
        prefix: &'a Expr<'a>,
        range: &'a Expr<'a>,
        loc: SourceLoc,
    ) -> EvalResult {
        let v = self.eval_expr(prefix)?;
        let (low, high) = self.range_bounds(range)?;
        match v {
            Value::Str(bytes) => {
                let bytes = bytes.borrow();
                if high >= low && (low < 1 || high > bytes.len() as i64) {
                    return Err(self.constraint_error(loc));
                }
                let slice = if high >= low {
                    bytes[(low - 1) as usize..high as usize].to_vec()
                } else {
                    Vec::new()
                };
                Ok(Value::string(slice))
            }
            Value::Array(arr) => {
                let arr = arr.borrow();
                if high >= low && (low < arr.low || high > arr.high) {
                    return Err(self.constraint_error(loc));
                }
                let elems = if high >= low {
                    let from = (low - arr.low) as usize;
                    let to = (high - arr.low + 1) as usize;
                    arr.elems[from..to].to_vec()
                } else {
                    Vec::new()
                };
                Ok(Value::Array(Rc::new(RefCell::new(ArrayVal {
                    ty: arr.ty,
                    low,
                    high,
                    elems,
                }))))
            }
            _ => Err(self.program_error(loc)),
        }
    }

    fn eval_aggregate(&mut self, e: &'a Expr<'a>, items: &'a [Assoc<'a>]) -> EvalResult {
        let ty = e.ty.get().unwrap_or(self.sem.predef.void);
        let base = self.sem.types.base_type(ty);
        match self.sem.types.kind(base) {
            TypeKind::Record => {
                let comps: Vec<(Symbol, TypeId)> = {
                    let d = self.sem.types.get(base);
                    d.discriminants
                        .iter()
                        .chain(d.components.iter())
                        .map(|c| (c.name, c.ty))
                        .collect()
                };
                let mut fields: Vec<(Symbol, Value)> = comps
                    .iter()
                    .map(|&(n, t)| (n, self.default_value(t)))
                    .collect();
                let mut filled = vec![false; comps.len()];
                let mut positional = 0usize;
                for item in items {
                    if item.choices.is_empty() {
                        if positional >= comps.len() {
                            return Err(self.constraint_error(item.loc));
                        }
                        let v = self.eval_with_conversion(item.value, comps[positional].1)?;
                        fields[positional].1 = v;
                        filled[positional] = true;
                        positional += 1;
                    } else {
                        for &choice in item.choices {
                            match choice.kind {
                                ExprKind::Others => {
                                    for i in 0..comps.len() {
                                        if !filled[i] {
                                            let v = self
                                                .eval_with_conversion(item.value, comps[i].1)?;
                                            fields[i].1 = v;
                                            filled[i] = true;
                                        }
                                    }
                                }
                                ExprKind::Ident(cname) => {
                                    let idx = comps
                                        .iter()
                                        .position(|(n, _)| self.interner.eq_ci(*n, cname))
                                        .ok_or_else(|| self.constraint_error(choice.loc))?;
                                    let v =
                                        self.eval_with_conversion(item.value, comps[idx].1)?;
                                    fields[idx].1 = v;
                                    filled[idx] = true;
                                }
                                _ => return Err(self.constraint_error(choice.loc)),
                            }
                        }
                    }
                }
                Ok(Value::Record(Rc::new(RefCell::new(RecordVal {
                    ty,
                    fields,
                }))))
            }
            TypeKind::Array => {
                let desc = self.sem.types.get(base);
                let (mut low, mut high) = (desc.low, desc.high);
                let elem_ty = desc.elem.unwrap_or(self.sem.predef.void);
                let elem_is_char = self.sem.types.kind(self.sem.types.base_type(elem_ty))
                    == TypeKind::Character;
                // An unconstrained target sizes itself from the items.
                let positional_count = items.iter().filter(|i| i.choices.is_empty()).count();
                if high < low && positional_count > 0 {
                    low = 1;
                    high = positional_count as i64;
                }
                let count = if high >= low { (high - low + 1) as usize } else { 0 };
                let mut elems = vec![self.default_value(elem_ty); count];
                let mut positional = 0usize;
                for item in items {
                    if item.choices.is_empty() {
                        if positional >= count {
                            return Err(self.constraint_error(item.loc));
                        }
                        elems[positional] = self.eval_with_conversion(item.value, elem_ty)?;
                        positional += 1;
                    } else {
                        for &choice in item.choices {
                            match choice.kind {
                                ExprKind::Others => {
                                    for slot in elems.iter_mut().skip(positional) {
                                        *slot =
                                            self.eval_with_conversion(item.value, elem_ty)?;
                                    }
                                }
                                ExprKind::Range { low: lo, high: hi } => {
                                    let a = self
                                        .eval_expr(lo)?
                                        .as_int()
                                        .ok_or_else(|| self.constraint_error(choice.loc))?;
                                    let b = self
                                        .eval_expr(hi)?
                                        .as_int()
                                        .ok_or_else(|| self.constraint_error(choice.loc))?;
                                    for i in a..=b {
                                        if i < low || i > high {
                                            return Err(self.constraint_error(choice.loc));
                                        }
                                        elems[(i - low) as usize] =
                                            self.eval_with_conversion(item.value, elem_ty)?;
                                    }
                                }
                                _ => {
                                    let i = self
                                        .eval_expr(choice)?
                                        .as_int()
                                        .ok_or_else(|| self.constraint_error(choice.loc))?;
                                    if i < low || i > high {
                                        return Err(self.constraint_error(choice.loc));
                                    }
                                    elems[(i - low) as usize] =
                                        self.eval_with_conversion(item.value, elem_ty)?;
                                }
                            }
                        }
                    }
                }
                if elem_is_char {
                    let bytes: Vec<u8> = elems
                        .iter()
                        .map(|v| v.as_int().unwrap_or(b' ' as i64) as u8)
                        .collect();
                    return Ok(Value::string(bytes));
                }
                Ok(Value::Array(Rc::new(RefCell::new(ArrayVal {
                    ty,
                    low,
                    high,
                    elems,
                }))))
            }
            _ => Err(self.program_error(e.loc)),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn concrete_int(&self, ty: TypeId) -> TypeId {
        if self.sem.types.kind(self.sem.types.base_type(ty)) == TypeKind::UniversalInteger {
            self.sem.predef.integer
        } else {
            ty
        }
    }

    fn concrete_real(&self, ty: TypeId) -> TypeId {
        if self.sem.types.kind(self.sem.types.base_type(ty)) == TypeKind::UniversalReal {
            self.sem.predef.float
        } else {
            ty
        }
    }

    fn index_value(&self, container: &Value, index: i64, loc: SourceLoc) -> EvalResult {
        match container {
            Value::Str(bytes) => {
                let bytes = bytes.borrow();
                if index < 1 || index > bytes.len() as i64 {
                    return Err(self.constraint_error(loc));
                }
                Ok(Value::int(
                    self.sem.predef.character,
                    bytes[(index - 1) as usize] as i64,
                ))
            }
            Value::Array(arr) => {
                let arr = arr.borrow();
                if index < arr.low || index > arr.high {
                    return Err(self.constraint_error(loc));
                }
                Ok(arr.elems[(index - arr.low) as usize].clone())
            }
            _ => Err(self.program_error(loc)),
        }
    }

    fn convert_value(&self, v: Value, target: TypeId, loc: SourceLoc) -> EvalResult {
        let base = self.sem.types.base_type(target);
        match (v, self.sem.types.kind(base)) {
            (Value::Int { val, .. }, k) if k.is_discrete() => {
                self.range_check(val, target, loc)?;
                Ok(Value::int(target, val))
            }
            (Value::Real { val, .. }, k) if k.is_discrete() => {
                let rounded = val.round() as i64;
                self.range_check(rounded, target, loc)?;
                Ok(Value::int(target, rounded))
            }
            (Value::Int { val, .. }, k) if k.is_real() => Ok(Value::Real {
                ty: target,
                val: val as f64,
            }),
            (Value::Real { val, .. }, k) if k.is_real() => Ok(Value::Real { ty: target, val }),
            (v, _) => Ok(v),
        }
    }

    fn range_check(&self, val: i64, ty: TypeId, loc: SourceLoc) -> Result<(), Raised> {
        let d = self.sem.types.get(ty);
        if d.low <= d.high && (val < d.low || val > d.high) {
            return Err(self.constraint_error(loc));
        }
        Ok(())
    }

    fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Int { val: x, .. }, Value::Int { val: y, .. }) => x == y,
            (Value::Real { val: x, .. }, Value::Real { val: y, .. }) => x == y,
            (Value::Int { val: x, .. }, Value::Real { val: y, .. })
            | (Value::Real { val: y, .. }, Value::Int { val: x, .. }) => *x as f64 == *y,
            (Value::Str(x), Value::Str(y)) => *x.borrow() == *y.borrow(),
            (Value::Array(x), Value::Array(y)) => {
                let (x, y) = (x.borrow(), y.borrow());
                x.elems.len() == y.elems.len()
                    && x.elems
                        .iter()
                        .zip(y.elems.iter())
                        .all(|(a, b)| self.values_equal(a, b))
            }
            (Value::Record(x), Value::Record(y)) => {
                let (x, y) = (x.borrow(), y.borrow());
                x.fields.len() == y.fields.len()
                    && x.fields
                        .iter()
                        .zip(y.fields.iter())
                        .all(|((_, a), (_, b))| self.values_equal(a, b))
            }
            (
                Value::Access { cell: x, .. },
                Value::Access { cell: y, .. },
            ) => match (x, y) {
                (None, None) => true,
                (Some(x), Some(y)) => Rc::ptr_eq(x, y),
                _ => false,
            },
            (Value::ExceptionOccurrence(x), Value::ExceptionOccurrence(y)) => {
                self.interner.eq_ci(*x, *y)
            }
            (Value::None, Value::None) => true,
            _ => false,
        }
    }

    fn compare_values(
        &self,
        a: &Value,
        b: &Value,
        loc: SourceLoc,
    ) -> Result<std::cmp::Ordering, Raised> {
        match (a, b) {
            (Value::Int { val: x, .. }, Value::Int { val: y, .. }) => Ok(x.cmp(y)),
            (Value::Str(x), Value::Str(y)) => Ok(x.borrow().cmp(&y.borrow())),
            _ => {
                let (Some(x), Some(y)) = (a.as_real(), b.as_real()) else {
                    return Err(self.program_error(loc));
                };
                Ok(x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal))
            }
        }
    }

    fn concatenate(&self, l: &Value, r: &Value, loc: SourceLoc) -> EvalResult {
        let mut bytes = self.cat_bytes(l, loc)?;
        bytes.extend(self.cat_bytes(r, loc)?);
        Ok(Value::string(bytes))
    }

    fn cat_bytes(&self, v: &Value, loc: SourceLoc) -> Result<Vec<u8>, Raised> {
        match v {
            Value::Str(bytes) => Ok(bytes.borrow().clone()),
            Value::Int { ty, val } => {
                let base = self.sem.types.base_type(*ty);
                if self.sem.types.kind(base) == TypeKind::Character {
                    Ok(vec![*val as u8])
                } else {
                    Ok(val.to_string().into_bytes())
                }
            }
            Value::Array(arr) => {
                let arr = arr.borrow();
                Ok(arr
                    .elems
                    .iter()
                    .map(|e| e.as_int().unwrap_or(b'?' as i64) as u8)
                    .collect())
            }
            _ => Err(self.program_error(loc)),
        }
    }

    fn choice_matches(&mut self, choice: &'a Expr<'a>, v: &Value) -> Result<bool, Raised> {
        match &choice.kind {
            ExprKind::Others => Ok(true),
            ExprKind::Range { low, high } => {
                let (Some(x), Some(a), Some(b)) = (
                    v.as_int(),
                    self.eval_expr(low)?.as_int(),
                    self.eval_expr(high)?.as_int(),
                ) else {
                    return Ok(false);
                };
                Ok(a <= x && x <= b)
            }
            _ => {
                let c = self.eval_expr(choice)?;
                Ok(self.values_equal(&c, v))
            }
        }
    }

    fn value_in_range(&mut self, v: &Value, mark: &'a Expr<'a>) -> Result<bool, Raised> {
        match &mark.kind {
            ExprKind::Range { low, high } => {
                let (Some(x), Some(a), Some(b)) = (
                    v.as_int(),
                    self.eval_expr(low)?.as_int(),
                    self.eval_expr(high)?.as_int(),
                ) else {
                    return Ok(false);
                };
                Ok(a <= x && x <= b)
            }
            _ => {
                let tid = mark.ty.get().unwrap_or(self.sem.predef.void);
                let d = self.sem.types.get(tid);
                match v.as_int() {
                    Some(x) => Ok(d.low > d.high || (d.low <= x && x <= d.high)),
                    None => Ok(true),
                }
            }
        }
    }

    /// Bounds of a loop or slice range: an explicit range, a type mark,
    /// or a `'RANGE` attribute over an array type or value.
    fn range_bounds(&mut self, range: &'a Expr<'a>) -> Result<(i64, i64), Raised> {
        match &range.kind {
            ExprKind::Range { low, high } => {
                let a = self
                    .eval_expr(low)?
                    .as_int()
                    .ok_or_else(|| self.constraint_error(range.loc))?;
                let b = self
                    .eval_expr(high)?
                    .as_int()
                    .ok_or_else(|| self.constraint_error(range.loc))?;
                Ok((a, b))
            }
            ExprKind::Attribute { prefix, designator, .. }
                if self.interner.eq_ci(*designator, self.sem.wk.range) =>
            {
                let type_prefix = prefix
                    .sym
                    .get()
                    .map(|s| {
                        matches!(self.sem.syms.get(s).kind, SymKind::Type | SymKind::TaskType)
                    })
                    .unwrap_or(false);
                if type_prefix {
                    let tid = prefix.ty.get().unwrap_or(self.sem.predef.void);
                    let d = self.sem.types.get(self.sem.types.base_type(tid));
                    return Ok((d.low, d.high));
                }
                match self.eval_expr(prefix)? {
                    Value::Array(arr) => {
                        let a = arr.borrow();
                        Ok((a.low, a.high))
                    }
                    Value::Str(bytes) => Ok((1, bytes.borrow().len() as i64)),
                    _ => {
                        let tid = prefix.ty.get().unwrap_or(self.sem.predef.void);
                        let d = self.sem.types.get(self.sem.types.base_type(tid));
                        Ok((d.low, d.high))
                    }
                }
            }
            _ => {
                // A type mark iterates the whole type.
                let tid = range.ty.get().unwrap_or(self.sem.predef.void);
                let d = self.sem.types.get(self.sem.types.base_type(tid));
                Ok((d.low, d.high))
            }
        }
    }

    fn default_value(&self, ty: TypeId) -> Value {
        let base = self.sem.types.base_type(ty);
        match self.sem.types.kind(base) {
            TypeKind::Integer
            | TypeKind::Boolean
            | TypeKind::Character
            | TypeKind::Enumeration
            | TypeKind::UniversalInteger => Value::int(ty, 0),
            TypeKind::Float | TypeKind::Fixed | TypeKind::UniversalReal => {
                Value::Real { ty, val: 0.0 }
            }
            TypeKind::Access => Value::Access { ty, cell: None },
            TypeKind::Task => Value::Task(ty),
            TypeKind::Array => {
                let d = self.sem.types.get(base);
                let elem_ty = d.elem.unwrap_or(self.sem.predef.void);
                let count = if d.high >= d.low {
                    (d.high - d.low + 1) as usize
                } else {
                    0
                };
                let elem_is_char = self.sem.types.kind(self.sem.types.base_type(elem_ty))
                    == TypeKind::Character;
                if elem_is_char {
                    return Value::string(vec![b' '; count]);
                }
                let elems = vec![self.default_value(elem_ty); count];
                Value::Array(Rc::new(RefCell::new(ArrayVal {
                    ty,
                    low: d.low,
                    high: d.high,
                    elems,
                })))
            }
            TypeKind::Record => {
                let fields: Vec<(Symbol, Value)> = {
                    let d = self.sem.types.get(base);
                    d.discriminants
                        .iter()
                        .chain(d.components.iter())
                        .map(|c| (c.name, c.ty))
                        .collect::<Vec<_>>()
                }
                .into_iter()
                .map(|(n, t)| (n, self.default_value(t)))
                .collect();
                Value::Record(Rc::new(RefCell::new(RecordVal { ty, fields })))
            }
            _ => Value::None,
        }
    }

    // =========================================================================
    // Assignment targets
    // =========================================================================

    fn assign_target(&mut self, target: &'a Expr<'a>, v: Value) -> Result<(), Raised> {
        match &target.kind {
            ExprKind::Ident(_) => {
                let Some(sym) = target.sym.get() else {
                    return Err(self.program_error(target.loc));
                };
                // Write through renamings to the renamed object.
                if let Some(Decl {
                    kind: DeclKind::ObjectRename { target: renamed, .. },
                    ..
                }) = self.sem.syms.get(sym).decl
                {
                    return self.assign_target(renamed, v);
                }
                self.assign_sym(sym, v);
                Ok(())
            }
            ExprKind::Selected { prefix, selector } => {
                if let Some(member) = target.sym.get() {
                    if matches!(
                        self.sem.syms.get(member).kind,
                        SymKind::Variable | SymKind::Parameter
                    ) && prefix
                        .sym
                        .get()
                        .map(|p| self.sem.syms.get(p).kind == SymKind::Package)
                        .unwrap_or(false)
                    {
                        self.assign_sym(member, v);
                        return Ok(());
                    }
                }
                let mut holder = self.eval_expr(prefix)?;
                if let Value::Access { cell, .. } = &holder {
                    let new_holder = match cell {
                        Some(cell) => cell.borrow().clone(),
                        None => return Err(self.constraint_error(target.loc)),
                    };
                    holder = new_holder;
                }
                let Value::Record(rec) = holder else {
                    return Err(self.program_error(target.loc));
                };
                let mut rec = rec.borrow_mut();
                for (name, slot) in rec.fields.iter_mut() {
                    if self.interner.eq_ci(*name, *selector) {
                        *slot = v;
                        return Ok(());
                    }
                }
                Err(self.program_error(target.loc))
            }
            ExprKind::Call {
                callee,
                args,
                class,
            } if class.get() == CallClass::Index => {
                let container = self.eval_expr(callee)?;
                let index = self
                    .eval_expr(args[0].value)?
                    .as_int()
                    .ok_or_else(|| self.constraint_error(target.loc))?;
                match container {
                    Value::Str(bytes) => {
                        let mut bytes = bytes.borrow_mut();
                        if index < 1 || index > bytes.len() as i64 {
                            return Err(self.constraint_error(target.loc));
                        }
                        let b = v.as_int().unwrap_or(b' ' as i64) as u8;
                        bytes[(index - 1) as usize] = b;
                        Ok(())
                    }
                    Value::Array(arr) => {
                        let mut arr = arr.borrow_mut();
                        if index < arr.low || index > arr.high {
                            return Err(self.constraint_error(target.loc));
                        }
                        let slot = (index - arr.low) as usize;
                        arr.elems[slot] = v;
                        Ok(())
                    }
                    _ => Err(self.program_error(target.loc)),
                }
            }
            ExprKind::Slice { prefix, range } => {
                let container = self.eval_expr(prefix)?;
                let (low, high) = self.range_bounds(range)?;
                let Value::Str(bytes) = container else {
                    return Err(self.program_error(target.loc));
                };
                let src = match &v {
                    Value::Str(s) => s.borrow().clone(),
                    _ => return Err(self.program_error(target.loc)),
                };
                let mut bytes = bytes.borrow_mut();
                if low < 1 || high > bytes.len() as i64 || src.len() as i64 != high - low + 1 {
                    return Err(self.constraint_error(target.loc));
                }
                bytes[(low - 1) as usize..high as usize].copy_from_slice(&src);
                Ok(())
            }
            ExprKind::Deref { prefix } => {
                let holder = self.eval_expr(prefix)?;
                match holder {
                    Value::Access {
                        cell: Some(cell), ..
                    } => {
                        *cell.borrow_mut() = v;
                        Ok(())
                    }
                    Value::Access { cell: None, .. } => Err(self.constraint_error(target.loc)),
                    _ => Err(self.program_error(target.loc)),
                }
            }
            _ => Err(self.program_error(target.loc)),
        }
    }
}

enum LoopStep {
    Continue,
    Done,
    Escape(Flow),
}

/// Decimal text for a float without trailing zero noise.
fn format_real(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_real_keeps_one_decimal() {
        assert_eq!(format_real(4.0), "4.0");
        assert_eq!(format_real(3.14), "3.14");
        assert_eq!(format_real(-2.0), "-2.0");
    }

    #[test]
    fn shared_buf_collects_writes() {
        let buf = SharedBuf::default();
        let mut writer = buf.clone();
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        assert_eq!(buf.contents(), "hello world");
    }
}
