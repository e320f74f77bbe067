//! Symbol table with hash-chained buckets and block-scoped visibility.
//!
//! Entries are never removed: leaving a scope clears the direct-visibility
//! bit of the symbols declared there but keeps them on their chains, so
//! later `use` imports and diagnostics can still reach them.

use crate::ast::Decl;
use crate::intern::{fold_hash, Interner, Symbol};
use crate::types::{Predefined, TypeId, TypeTable};

pub const BUCKETS: usize = 4096;

/// Direct visibility: reachable by its unqualified name at the current
/// scope.
pub const VIS_DIRECT: u8 = 0b01;
/// Use visibility: reachable because its package was named in a `use`
/// clause. Lower priority than direct visibility.
pub const VIS_USE: u8 = 0b10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymKind {
    Type,
    EnumLiteral,
    Exception,
    Procedure,
    Function,
    Package,
    Variable,
    Constant,
    Parameter,
    LoopVar,
    Component,
    Discriminant,
    Entry,
    TaskType,
    Label,
    Generic,
    GenericFormal,
}

impl SymKind {
    pub fn is_subprogram(self) -> bool {
        matches!(self, SymKind::Procedure | SymKind::Function)
    }
}

#[derive(Debug)]
pub struct SymbolEntry<'a> {
    pub name: Symbol,
    pub kind: SymKind,
    pub ty: Option<TypeId>,
    /// Defining declaration; absent for predefined and built-in entities.
    pub decl: Option<&'a Decl<'a>>,
    pub scope_level: u32,
    pub serial: u32,
    pub vis: u8,
    /// Next homonym on the same hash chain.
    pub next: Option<SymbolId>,
    /// Enclosing declarative region (package, subprogram, task).
    pub parent: Option<SymbolId>,
    /// Compile-time value of constants and enumeration literals.
    pub value: Option<i64>,
    /// Parameter types of subprograms, for overload scoring.
    pub param_types: Vec<TypeId>,
    pub id: u32,
}

pub struct SymbolTable<'a> {
    buckets: Vec<Option<SymbolId>>,
    entries: Vec<SymbolEntry<'a>>,
    scope_level: u32,
    serial: u32,
    /// Symbols of still-open scopes, innermost last.
    scope_stack: Vec<SymbolId>,
}

impl<'a> SymbolTable<'a> {
    pub fn new() -> Self {
        SymbolTable {
            buckets: vec![None; BUCKETS],
            entries: Vec::new(),
            scope_level: 0,
            serial: 0,
            scope_stack: Vec::new(),
        }
    }

    fn bucket_of(&self, interner: &Interner, name: Symbol) -> usize {
        fold_hash(interner.resolve(name)) as usize % BUCKETS
    }

    pub fn scope_level(&self) -> u32 {
        self.scope_level
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Install a new symbol, prepending it to its hash chain and marking
    /// it directly visible in the current scope.
    pub fn add(
        &mut self,
        interner: &Interner,
        name: Symbol,
        kind: SymKind,
        parent: Option<SymbolId>,
    ) -> SymbolId {
        let bucket = self.bucket_of(interner, name);
        let id = SymbolId(self.entries.len() as u32);
        self.serial += 1;
        self.entries.push(SymbolEntry {
            name,
            kind,
            ty: None,
            decl: None,
            scope_level: self.scope_level,
            serial: self.serial,
            vis: VIS_DIRECT,
            next: self.buckets[bucket],
            parent,
            value: None,
            param_types: Vec::new(),
            id: id.0,
        });
        self.buckets[bucket] = Some(id);
        self.scope_stack.push(id);
        id
    }

    pub fn get(&self, id: SymbolId) -> &SymbolEntry<'a> {
        &self.entries[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymbolEntry<'a> {
        &mut self.entries[id.index()]
    }

    pub fn enter_scope(&mut self) {
        self.scope_level += 1;
    }

    /// Hide everything declared in the departing scope. Entries stay on
    /// their chains.
    pub fn exit_scope(&mut self) {
        while let Some(&id) = self.scope_stack.last() {
            if self.get(id).scope_level < self.scope_level {
                break;
            }
            self.get_mut(id).vis &= !VIS_DIRECT;
            self.scope_stack.pop();
        }
        self.scope_level -= 1;
    }

    /// Plain lookup: the directly visible entry at the deepest scope wins;
    /// otherwise the first use-visible entry on the chain.
    pub fn lookup(&self, interner: &Interner, name: Symbol) -> Option<SymbolId> {
        let mut cursor = self.buckets[self.bucket_of(interner, name)];
        let mut use_visible = None;
        while let Some(id) = cursor {
            let entry = self.get(id);
            if interner.eq_ci(entry.name, name) {
                if entry.vis & VIS_DIRECT != 0 {
                    // Chains are prepend-ordered, so the first direct hit
                    // is the innermost declaration.
                    return Some(id);
                }
                if entry.vis & VIS_USE != 0 && use_visible.is_none() {
                    use_visible = Some(id);
                }
            }
            cursor = entry.next;
        }
        use_visible
    }

    /// All visible homonyms, for overload resolution: the direct entries
    /// at the deepest scope that has any, else every use-visible entry.
    pub fn visible_homonyms(&self, interner: &Interner, name: Symbol) -> Vec<SymbolId> {
        let mut direct: Vec<SymbolId> = Vec::new();
        let mut imported: Vec<SymbolId> = Vec::new();
        let mut cursor = self.buckets[self.bucket_of(interner, name)];
        while let Some(id) = cursor {
            let entry = self.get(id);
            if interner.eq_ci(entry.name, name) {
                if entry.vis & VIS_DIRECT != 0 {
                    direct.push(id);
                } else if entry.vis & VIS_USE != 0 {
                    imported.push(id);
                }
            }
            cursor = entry.next;
        }
        if direct.is_empty() {
            return imported;
        }
        let deepest = direct.iter().map(|&id| self.get(id).scope_level).max().unwrap();
        direct.retain(|&id| self.get(id).scope_level == deepest);
        direct
    }

    /// Score subprogram candidates against a call site. Arity agreement
    /// dominates; parameter and result compatibility refine. Candidates
    /// scoring zero are not returned, and ties break toward the earliest
    /// declaration.
    pub fn resolve_overload(
        &self,
        interner: &Interner,
        name: Symbol,
        arg_types: &[TypeId],
        expected: Option<TypeId>,
        types: &TypeTable,
        predef: &Predefined,
    ) -> Option<SymbolId> {
        let mut best: Option<(i32, u32, SymbolId)> = None;
        for id in self.visible_homonyms(interner, name) {
            let entry = self.get(id);
            if !entry.kind.is_subprogram() {
                continue;
            }
            let mut score = 0i32;
            if entry.param_types.len() == arg_types.len() {
                score += 1000;
                for (formal, actual) in entry.param_types.iter().zip(arg_types) {
                    if types.compatible(*formal, *actual, predef) {
                        score += 10;
                    }
                }
            }
            if let (Some(want), Some(ret)) = (expected, entry.ty) {
                if types.compatible(ret, want, predef) {
                    score += 10;
                }
            }
            if score == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_score, best_serial, _)) => {
                    score > best_score || (score == best_score && entry.serial < best_serial)
                }
            };
            if better {
                best = Some((score, entry.serial, id));
            }
        }
        best.map(|(_, _, id)| id)
    }

    /// Make the visible declarations of `pkg` use-visible. Importing the
    /// same package twice is idempotent.
    pub fn use_import(&mut self, pkg: SymbolId) {
        for entry in &mut self.entries {
            if entry.parent == Some(pkg) {
                entry.vis |= VIS_USE;
            }
        }
    }

    pub fn members_of(&self, parent: SymbolId) -> Vec<SymbolId> {
        (0..self.entries.len())
            .map(|i| SymbolId(i as u32))
            .filter(|&id| self.get(id).parent == Some(parent))
            .collect()
    }
}

impl<'a> Default for SymbolTable<'a> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    fn setup() -> (SymbolTable<'static>, Interner, TypeTable, Predefined) {
        let mut interner = Interner::new();
        let mut types = TypeTable::new();
        let predef = types.install_predefined(&mut interner);
        (SymbolTable::new(), interner, types, predef)
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let (mut table, mut interner, _, _) = setup();
        let name = interner.intern("Counter");
        let id = table.add(&interner, name, SymKind::Variable, None);
        let query = interner.intern("COUNTER");
        assert_eq!(table.lookup(&interner, query), Some(id));
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let (mut table, mut interner, _, _) = setup();
        let name = interner.intern("x");
        let outer = table.add(&interner, name, SymKind::Variable, None);
        table.enter_scope();
        let inner = table.add(&interner, name, SymKind::Variable, None);
        assert_eq!(table.lookup(&interner, name), Some(inner));
        table.exit_scope();
        assert_eq!(table.lookup(&interner, name), Some(outer));
    }

    #[test]
    fn scope_exit_hides_but_keeps_entries() {
        let (mut table, mut interner, _, _) = setup();
        table.enter_scope();
        let name = interner.intern("local");
        let id = table.add(&interner, name, SymKind::Variable, None);
        table.exit_scope();
        assert_eq!(table.lookup(&interner, name), None);
        assert_eq!(table.get(id).name, name);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn use_import_grants_lower_priority_visibility() {
        let (mut table, mut interner, _, _) = setup();
        let pkg_name = interner.intern("TEXT_IO");
        let pkg = table.add(&interner, pkg_name, SymKind::Package, None);
        let put = interner.intern("PUT");
        table.enter_scope();
        let inner_put = table.add(&interner, put, SymKind::Procedure, Some(pkg));
        table.exit_scope();
        assert_eq!(table.lookup(&interner, put), None);

        table.use_import(pkg);
        assert_eq!(table.lookup(&interner, put), Some(inner_put));

        // Direct visibility still wins over use visibility.
        let direct_put = table.add(&interner, put, SymKind::Procedure, None);
        assert_eq!(table.lookup(&interner, put), Some(direct_put));

        // Importing again changes nothing.
        table.use_import(pkg);
        assert_eq!(table.lookup(&interner, put), Some(direct_put));
    }

    #[test]
    fn overload_prefers_matching_arity() {
        let (mut table, mut interner, mut types, predef) = setup();
        let name = interner.intern("MAX");
        let one = table.add(&interner, name, SymKind::Function, None);
        let two = table.add(&interner, name, SymKind::Function, None);
        types.new_type(TypeKind::Integer, interner.intern("unused"));
        table.get_mut(one).param_types = vec![predef.integer];
        table.get_mut(one).ty = Some(predef.integer);
        table.get_mut(two).param_types = vec![predef.integer, predef.integer];
        table.get_mut(two).ty = Some(predef.integer);

        let picked = table.resolve_overload(
            &interner,
            name,
            &[predef.integer, predef.integer],
            None,
            &types,
            &predef,
        );
        assert_eq!(picked, Some(two));
    }

    #[test]
    fn overload_ties_break_by_declaration_order() {
        let (mut table, mut interner, types, predef) = setup();
        let name = interner.intern("F");
        let first = table.add(&interner, name, SymKind::Function, None);
        let second = table.add(&interner, name, SymKind::Function, None);
        table.get_mut(first).param_types = vec![predef.integer];
        table.get_mut(second).param_types = vec![predef.integer];
        let picked =
            table.resolve_overload(&interner, name, &[predef.integer], None, &types, &predef);
        assert_eq!(picked, Some(first));
    }

    #[test]
    fn overload_rejects_zero_scores() {
        let (mut table, mut interner, types, predef) = setup();
        let name = interner.intern("G");
        let only = table.add(&interner, name, SymKind::Function, None);
        table.get_mut(only).param_types = vec![predef.integer, predef.integer];
        let picked = table.resolve_overload(&interner, name, &[], None, &types, &predef);
        assert_eq!(picked, None);
        let _ = only;
    }

    #[test]
    fn homonyms_on_one_chain_stay_separate() {
        let (mut table, mut interner, _, _) = setup();
        let a = interner.intern("alpha");
        let b = interner.intern("beta");
        let ia = table.add(&interner, a, SymKind::Variable, None);
        let ib = table.add(&interner, b, SymKind::Variable, None);
        assert_eq!(table.lookup(&interner, a), Some(ia));
        assert_eq!(table.lookup(&interner, b), Some(ib));
    }
}
