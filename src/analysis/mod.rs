//! Semantic analysis: context, name resolution, and type checking.

mod resolve;

pub use resolve::Resolver;

use crate::intern::{Interner, Symbol};
use crate::symtab::{SymKind, SymbolId, SymbolTable};
use crate::types::{Predefined, TypeTable};

/// Names the resolver and evaluator compare against, interned once so the
/// hot paths never touch the interner mutably.
#[derive(Debug, Clone, Copy)]
pub struct WellKnown {
    pub first: Symbol,
    pub last: Symbol,
    pub length: Symbol,
    pub size: Symbol,
    pub pos: Symbol,
    pub val: Symbol,
    pub succ: Symbol,
    pub pred: Symbol,
    pub image: Symbol,
    pub count: Symbol,
    pub range: Symbol,
    pub true_: Symbol,
    pub false_: Symbol,
    pub put: Symbol,
    pub put_line: Symbol,
    pub new_line: Symbol,
    pub get: Symbol,
    pub get_line: Symbol,
    pub constraint_error: Symbol,
    pub program_error: Symbol,
    pub storage_error: Symbol,
    pub numeric_error: Symbol,
    pub tasking_error: Symbol,
}

impl WellKnown {
    fn new(interner: &mut Interner) -> Self {
        WellKnown {
            first: interner.intern("FIRST"),
            last: interner.intern("LAST"),
            length: interner.intern("LENGTH"),
            size: interner.intern("SIZE"),
            pos: interner.intern("POS"),
            val: interner.intern("VAL"),
            succ: interner.intern("SUCC"),
            pred: interner.intern("PRED"),
            image: interner.intern("IMAGE"),
            count: interner.intern("COUNT"),
            range: interner.intern("RANGE"),
            true_: interner.intern("TRUE"),
            false_: interner.intern("FALSE"),
            put: interner.intern("PUT"),
            put_line: interner.intern("PUT_LINE"),
            new_line: interner.intern("NEW_LINE"),
            get: interner.intern("GET"),
            get_line: interner.intern("GET_LINE"),
            constraint_error: interner.intern("CONSTRAINT_ERROR"),
            program_error: interner.intern("PROGRAM_ERROR"),
            storage_error: interner.intern("STORAGE_ERROR"),
            numeric_error: interner.intern("NUMERIC_ERROR"),
            tasking_error: interner.intern("TASKING_ERROR"),
        }
    }
}

/// Everything one compilation shares across its units: the symbol table,
/// the type pool, the predefined entities, and the bookkeeping counters.
/// No process-wide state exists; two contexts never interact.
pub struct SemCtx<'a> {
    pub syms: SymbolTable<'a>,
    pub types: TypeTable,
    pub predef: Predefined,
    pub wk: WellKnown,
    /// Elaboration order counter, bumped per analyzed declaration.
    pub elab_order: u32,
    /// Packages named in `use` clauses, in first-seen order.
    pub use_packages: Vec<SymbolId>,
    /// Every declared exception, predefined ones first.
    pub exceptions: Vec<SymbolId>,
    /// Library units already analyzed, to keep `with` loading idempotent.
    pub loaded_units: Vec<Symbol>,
}

/// The exception names every context pre-declares.
const PREDEFINED_EXCEPTIONS: &[&str] = &[
    "CONSTRAINT_ERROR",
    "NUMERIC_ERROR",
    "PROGRAM_ERROR",
    "STORAGE_ERROR",
    "TASKING_ERROR",
    "USE_ERROR",
    "NAME_ERROR",
    "STATUS_ERROR",
    "MODE_ERROR",
    "END_ERROR",
    "DATA_ERROR",
    "DEVICE_ERROR",
    "LAYOUT_ERROR",
];

/// Text-IO subprograms bound directly into the evaluator.
const BUILTIN_PROCEDURES: &[&str] = &["PUT", "PUT_LINE", "NEW_LINE", "GET", "GET_LINE"];

impl<'a> SemCtx<'a> {
    pub fn new(interner: &mut Interner) -> Self {
        let mut types = TypeTable::new();
        let predef = types.install_predefined(interner);
        let wk = WellKnown::new(interner);
        let mut syms = SymbolTable::new();

        for (name, ty) in [
            ("BOOLEAN", predef.boolean),
            ("INTEGER", predef.integer),
            ("NATURAL", predef.natural),
            ("POSITIVE", predef.positive),
            ("FLOAT", predef.float),
            ("CHARACTER", predef.character),
            ("STRING", predef.string),
            ("DURATION", predef.duration),
        ] {
            let sym = interner.intern(name);
            let id = syms.add(interner, sym, SymKind::Type, None);
            syms.get_mut(id).ty = Some(ty);
        }

        // FALSE and TRUE are ordinary enumeration literals of BOOLEAN.
        let mut boolean_literals = Vec::new();
        for (ordinal, name) in ["FALSE", "TRUE"].iter().enumerate() {
            let sym = interner.intern(name);
            let id = syms.add(interner, sym, SymKind::EnumLiteral, None);
            syms.get_mut(id).ty = Some(predef.boolean);
            syms.get_mut(id).value = Some(ordinal as i64);
            boolean_literals.push(id);
        }
        types.get_mut(predef.boolean).literals = boolean_literals;

        let mut exceptions = Vec::new();
        for name in PREDEFINED_EXCEPTIONS {
            let sym = interner.intern(name);
            let id = syms.add(interner, sym, SymKind::Exception, None);
            exceptions.push(id);
        }

        for name in BUILTIN_PROCEDURES {
            let sym = interner.intern(name);
            let id = syms.add(interner, sym, SymKind::Procedure, None);
            syms.get_mut(id).ty = Some(predef.void);
        }

        SemCtx {
            syms,
            types,
            predef,
            wk,
            elab_order: 0,
            use_packages: Vec::new(),
            exceptions: Vec::new(),
            loaded_units: Vec::new(),
        }
        .with_exceptions(exceptions)
    }

    fn with_exceptions(mut self, exceptions: Vec<SymbolId>) -> Self {
        self.exceptions = exceptions;
        self
    }

    /// True when `sym` names a declared exception.
    pub fn is_exception(&self, sym: SymbolId) -> bool {
        self.syms.get(sym).kind == SymKind::Exception
    }
}
