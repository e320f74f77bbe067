//! Structural type descriptors.
//!
//! Every language type gets one descriptor owned by the [`TypeTable`] and
//! referenced by handle from AST nodes and symbols. Name equivalence is
//! the compatibility rule: two types are the same only when they are the
//! same descriptor, with narrow exceptions for the universal numeric
//! types, the string literal type, and derived-type adjacency.

use crate::intern::{Interner, Symbol};
use crate::symtab::SymbolId;

/// Handle into the [`TypeTable`] pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Integer,
    Boolean,
    Character,
    Float,
    Fixed,
    Enumeration,
    Array,
    Record,
    Access,
    Task,
    Private,
    UniversalInteger,
    UniversalReal,
    File,
    Void,
}

impl TypeKind {
    /// Kinds whose runtime representation is a 64-bit ordinal.
    pub fn is_discrete(self) -> bool {
        matches!(
            self,
            TypeKind::Integer
                | TypeKind::Boolean
                | TypeKind::Character
                | TypeKind::Enumeration
                | TypeKind::UniversalInteger
        )
    }

    pub fn is_real(self) -> bool {
        matches!(self, TypeKind::Float | TypeKind::Fixed | TypeKind::UniversalReal)
    }
}

/// A record component or discriminant slot, with its offset committed at
/// freeze time.
#[derive(Debug, Clone)]
pub struct TypeComponent {
    pub name: Symbol,
    pub ty: TypeId,
    pub offset: u32,
}

/// Implicit operations materialized when a composite type is frozen.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImplicitOps {
    pub equality: bool,
    pub assign: bool,
    pub default_init: bool,
}

#[derive(Debug)]
pub struct TypeDesc {
    pub kind: TypeKind,
    pub name: Symbol,
    /// Subtype chain toward the first-named type.
    pub base: Option<TypeId>,
    /// Derivation parent (`type T is new P`).
    pub parent: Option<TypeId>,
    /// Element type of arrays and designated type of access types.
    pub elem: Option<TypeId>,
    /// Index type of arrays.
    pub index: Option<TypeId>,
    pub low: i64,
    pub high: i64,
    pub components: Vec<TypeComponent>,
    pub discriminants: Vec<TypeComponent>,
    /// Enumeration literals in ordinal order.
    pub literals: Vec<SymbolId>,
    pub size: u32,
    pub align: u32,
    pub frozen: bool,
    /// Set between `type T;` and the completing full declaration.
    pub incomplete: bool,
    pub ops: ImplicitOps,
}

/// Handles for the types of package STANDARD, installed once per semantic
/// context.
#[derive(Debug, Clone, Copy)]
pub struct Predefined {
    pub void: TypeId,
    pub boolean: TypeId,
    pub integer: TypeId,
    pub natural: TypeId,
    pub positive: TypeId,
    pub float: TypeId,
    pub character: TypeId,
    pub string: TypeId,
    pub duration: TypeId,
    pub universal_integer: TypeId,
    pub universal_real: TypeId,
}

pub struct TypeTable {
    descs: Vec<TypeDesc>,
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable { descs: Vec::new() }
    }

    pub fn new_type(&mut self, kind: TypeKind, name: Symbol) -> TypeId {
        let id = TypeId(self.descs.len() as u32);
        self.descs.push(TypeDesc {
            kind,
            name,
            base: None,
            parent: None,
            elem: None,
            index: None,
            low: 0,
            high: -1,
            components: Vec::new(),
            discriminants: Vec::new(),
            literals: Vec::new(),
            size: 8,
            align: 8,
            frozen: false,
            incomplete: false,
            ops: ImplicitOps::default(),
        });
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeDesc {
        &self.descs[id.index()]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeDesc {
        &mut self.descs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// Walk `base` pointers to their fixed point.
    pub fn base_type(&self, id: TypeId) -> TypeId {
        let mut cur = id;
        while let Some(base) = self.get(cur).base {
            if base == cur {
                break;
            }
            cur = base;
        }
        cur
    }

    pub fn kind(&self, id: TypeId) -> TypeKind {
        self.get(id).kind
    }

    fn is_character_array(&self, id: TypeId) -> bool {
        let desc = self.get(self.base_type(id));
        desc.kind == TypeKind::Array
            && desc
                .elem
                .map(|e| self.get(self.base_type(e)).kind == TypeKind::Character)
                .unwrap_or(false)
    }

    /// Name equivalence with the standard exceptions: universal integers
    /// convert to any integer target, universal reals to float and fixed
    /// targets, the string literal type to any array of characters, and a
    /// derived type is compatible with its immediate parent both ways.
    pub fn compatible(&self, a: TypeId, b: TypeId, predef: &Predefined) -> bool {
        if a == b || self.base_type(a) == self.base_type(b) {
            return true;
        }
        let ka = self.get(self.base_type(a)).kind;
        let kb = self.get(self.base_type(b)).kind;
        match (ka, kb) {
            (TypeKind::UniversalInteger, k) | (k, TypeKind::UniversalInteger)
                if matches!(k, TypeKind::Integer | TypeKind::UniversalInteger) =>
            {
                return true;
            }
            (TypeKind::UniversalReal, k) | (k, TypeKind::UniversalReal)
                if matches!(k, TypeKind::Float | TypeKind::Fixed | TypeKind::UniversalReal) =>
            {
                return true;
            }
            _ => {}
        }
        if (self.base_type(a) == predef.string && self.is_character_array(b))
            || (self.base_type(b) == predef.string && self.is_character_array(a))
        {
            return true;
        }
        let pa = self.get(self.base_type(a)).parent;
        let pb = self.get(self.base_type(b)).parent;
        pa == Some(self.base_type(b)) || pb == Some(self.base_type(a))
    }

    /// Commit size, alignment, and component offsets. Composite types also
    /// gain their implicit equality, assignment, and default-init
    /// operations here.
    pub fn freeze(&mut self, id: TypeId) {
        if self.get(id).frozen {
            return;
        }
        match self.get(id).kind {
            TypeKind::Record => {
                let mut offset = 0u32;
                let mut max_align = 1u32;
                let count = self.get(id).components.len();
                for i in 0..count {
                    let comp_ty = self.get(id).components[i].ty;
                    let (size, align) = self.size_align(comp_ty);
                    offset = round_up(offset, align);
                    self.get_mut(id).components[i].offset = offset;
                    offset += size;
                    max_align = max_align.max(align);
                }
                let desc = self.get_mut(id);
                desc.align = max_align;
                desc.size = round_up(offset, max_align);
                desc.ops = ImplicitOps {
                    equality: true,
                    assign: true,
                    default_init: true,
                };
            }
            TypeKind::Array => {
                let elem = self.get(id).elem;
                let (elem_size, elem_align) = match elem {
                    Some(e) => self.size_align(e),
                    None => (8, 8),
                };
                let desc = self.get(id);
                let count = if desc.high >= desc.low {
                    (desc.high - desc.low + 1) as u32
                } else {
                    0
                };
                let desc = self.get_mut(id);
                desc.size = elem_size * count;
                desc.align = elem_align;
                desc.ops = ImplicitOps {
                    equality: true,
                    assign: true,
                    default_init: true,
                };
            }
            _ => {}
        }
        self.get_mut(id).frozen = true;
    }

    fn size_align(&self, id: TypeId) -> (u32, u32) {
        let desc = self.get(id);
        (desc.size, desc.align)
    }

    /// Create the descriptors of package STANDARD. Symbols for them are
    /// installed by the semantic context.
    pub fn install_predefined(&mut self, interner: &mut Interner) -> Predefined {
        let mut named = |table: &mut TypeTable, kind, name: &str| {
            let sym = interner.intern(name);
            table.new_type(kind, sym)
        };

        let void = named(self, TypeKind::Void, "VOID");
        self.get_mut(void).size = 0;
        self.get_mut(void).align = 1;

        let universal_integer = named(self, TypeKind::UniversalInteger, "universal_integer");
        self.get_mut(universal_integer).low = i64::MIN;
        self.get_mut(universal_integer).high = i64::MAX;
        let universal_real = named(self, TypeKind::UniversalReal, "universal_real");

        let boolean = named(self, TypeKind::Boolean, "BOOLEAN");
        self.get_mut(boolean).low = 0;
        self.get_mut(boolean).high = 1;
        self.get_mut(boolean).size = 1;
        self.get_mut(boolean).align = 1;

        let integer = named(self, TypeKind::Integer, "INTEGER");
        self.get_mut(integer).low = i32::MIN as i64;
        self.get_mut(integer).high = i32::MAX as i64;
        self.get_mut(integer).size = 4;
        self.get_mut(integer).align = 4;

        let natural = named(self, TypeKind::Integer, "NATURAL");
        self.get_mut(natural).base = Some(integer);
        self.get_mut(natural).low = 0;
        self.get_mut(natural).high = i32::MAX as i64;

        let positive = named(self, TypeKind::Integer, "POSITIVE");
        self.get_mut(positive).base = Some(integer);
        self.get_mut(positive).low = 1;
        self.get_mut(positive).high = i32::MAX as i64;

        let float = named(self, TypeKind::Float, "FLOAT");

        let character = named(self, TypeKind::Character, "CHARACTER");
        self.get_mut(character).low = 0;
        self.get_mut(character).high = 127;
        self.get_mut(character).size = 1;
        self.get_mut(character).align = 1;

        let string = named(self, TypeKind::Array, "STRING");
        self.get_mut(string).elem = Some(character);
        self.get_mut(string).index = Some(positive);
        self.get_mut(string).low = 1;
        self.get_mut(string).high = 0;

        let duration = named(self, TypeKind::Fixed, "DURATION");

        Predefined {
            void,
            boolean,
            integer,
            natural,
            positive,
            float,
            character,
            string,
            duration,
            universal_integer,
            universal_real,
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two() || align == 1);
    value.div_ceil(align.max(1)) * align.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (TypeTable, Predefined, Interner) {
        let mut interner = Interner::new();
        let mut table = TypeTable::new();
        let predef = table.install_predefined(&mut interner);
        (table, predef, interner)
    }

    #[test]
    fn name_equivalence_keeps_distinct_types_apart() {
        let (mut table, predef, mut interner) = setup();
        let apples = table.new_type(TypeKind::Integer, interner.intern("APPLES"));
        let pears = table.new_type(TypeKind::Integer, interner.intern("PEARS"));
        assert!(!table.compatible(apples, pears, &predef));
        assert!(table.compatible(apples, apples, &predef));
    }

    #[test]
    fn universal_integer_converts_to_any_integer() {
        let (mut table, predef, mut interner) = setup();
        let apples = table.new_type(TypeKind::Integer, interner.intern("APPLES"));
        assert!(table.compatible(predef.universal_integer, apples, &predef));
        assert!(table.compatible(apples, predef.universal_integer, &predef));
        assert!(table.compatible(predef.universal_integer, predef.integer, &predef));
        assert!(!table.compatible(predef.universal_integer, predef.boolean, &predef));
    }

    #[test]
    fn universal_real_converts_to_float_and_fixed() {
        let (table, predef, _) = setup();
        assert!(table.compatible(predef.universal_real, predef.float, &predef));
        assert!(table.compatible(predef.universal_real, predef.duration, &predef));
        assert!(!table.compatible(predef.universal_real, predef.integer, &predef));
    }

    #[test]
    fn subtype_shares_its_base() {
        let (table, predef, _) = setup();
        assert!(table.compatible(predef.natural, predef.integer, &predef));
        assert!(table.compatible(predef.positive, predef.natural, &predef));
        assert_eq!(table.base_type(predef.natural), predef.integer);
    }

    #[test]
    fn string_literal_type_converts_to_character_arrays() {
        let (mut table, predef, mut interner) = setup();
        let line = table.new_type(TypeKind::Array, interner.intern("LINE"));
        table.get_mut(line).elem = Some(predef.character);
        table.get_mut(line).index = Some(predef.positive);
        assert!(table.compatible(predef.string, line, &predef));
        let ints = table.new_type(TypeKind::Array, interner.intern("VEC"));
        table.get_mut(ints).elem = Some(predef.integer);
        assert!(!table.compatible(predef.string, ints, &predef));
    }

    #[test]
    fn derived_type_is_adjacent_to_parent_only() {
        let (mut table, predef, mut interner) = setup();
        let meters = table.new_type(TypeKind::Integer, interner.intern("METERS"));
        table.get_mut(meters).parent = Some(predef.integer);
        assert!(table.compatible(meters, predef.integer, &predef));
        assert!(table.compatible(predef.integer, meters, &predef));
        let miles = table.new_type(TypeKind::Integer, interner.intern("MILES"));
        table.get_mut(miles).parent = Some(meters);
        assert!(!table.compatible(miles, predef.integer, &predef));
    }

    #[test]
    fn record_freeze_lays_out_components() {
        let (mut table, predef, mut interner) = setup();
        let rec = table.new_type(TypeKind::Record, interner.intern("PAIR"));
        let flag = interner.intern("FLAG");
        let count = interner.intern("COUNT");
        table.get_mut(rec).components = vec![
            TypeComponent { name: flag, ty: predef.boolean, offset: 0 },
            TypeComponent { name: count, ty: predef.integer, offset: 0 },
        ];
        table.freeze(rec);
        let desc = table.get(rec);
        assert!(desc.frozen);
        assert_eq!(desc.components[0].offset, 0);
        // The 4-byte integer is rounded up past the 1-byte boolean.
        assert_eq!(desc.components[1].offset, 4);
        assert_eq!(desc.size, 8);
        assert_eq!(desc.align, 4);
        assert!(desc.ops.equality && desc.ops.assign && desc.ops.default_init);
    }

    #[test]
    fn array_freeze_multiplies_element_size() {
        let (mut table, predef, mut interner) = setup();
        let arr = table.new_type(TypeKind::Array, interner.intern("TEN"));
        table.get_mut(arr).elem = Some(predef.integer);
        table.get_mut(arr).index = Some(predef.integer);
        table.get_mut(arr).low = 1;
        table.get_mut(arr).high = 10;
        table.freeze(arr);
        assert_eq!(table.get(arr).size, 40);

        let empty = table.new_type(TypeKind::Array, interner.intern("NONE"));
        table.get_mut(empty).elem = Some(predef.integer);
        table.get_mut(empty).low = 1;
        table.get_mut(empty).high = 0;
        table.freeze(empty);
        assert_eq!(table.get(empty).size, 0);
    }

    #[test]
    fn freezing_twice_is_idempotent() {
        let (mut table, predef, mut interner) = setup();
        let arr = table.new_type(TypeKind::Array, interner.intern("V"));
        table.get_mut(arr).elem = Some(predef.integer);
        table.get_mut(arr).low = 0;
        table.get_mut(arr).high = 3;
        table.freeze(arr);
        let first = table.get(arr).size;
        table.freeze(arr);
        assert_eq!(table.get(arr).size, first);
    }
}
