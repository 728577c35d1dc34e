use super::{MappedStructureIndex, StructureIndex, TypeIndex};
use rustc_hash::FxHashMap;

/// The five built-in value types of the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fundamental {
    Int,
    Long,
    Double,
    Pointer,
    GcPointer,
}

impl Fundamental {
    pub const ALL: [Fundamental; 5] = [
        Fundamental::Int,
        Fundamental::Long,
        Fundamental::Double,
        Fundamental::Pointer,
        Fundamental::GcPointer,
    ];

    pub fn code(self) -> u8 {
        match self {
            Fundamental::Int => 0,
            Fundamental::Long => 1,
            Fundamental::Double => 2,
            Fundamental::Pointer => 3,
            Fundamental::GcPointer => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Fundamental::Int => "int",
            Fundamental::Long => "long",
            Fundamental::Double => "double",
            Fundamental::Pointer => "pointer",
            Fundamental::GcPointer => "gcpointer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDef {
    Fundamental(Fundamental),
    Structure(StructureIndex),
    MappedStructure(MappedStructureIndex),
    Array(TypeIndex),
}

/// Interned table of every type mentioned by a byte file. The fundamentals
/// occupy the first five slots so their indices line up with their codes;
/// derived types are appended in first-use order, which keeps the table
/// layout a pure function of the source.
#[derive(Debug)]
pub struct TypeTable {
    defs: Vec<TypeDef>,
    interned: FxHashMap<TypeDef, TypeIndex>,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = TypeTable {
            defs: Vec::new(),
            interned: FxHashMap::default(),
        };
        for fundamental in Fundamental::ALL {
            table.intern(TypeDef::Fundamental(fundamental));
        }
        table
    }

    pub fn fundamental(&self, fundamental: Fundamental) -> TypeIndex {
        TypeIndex(fundamental.code() as u32)
    }

    pub fn intern(&mut self, def: TypeDef) -> TypeIndex {
        if let Some(index) = self.interned.get(&def) {
            return *index;
        }

        let index = TypeIndex(self.defs.len() as u32);
        self.defs.push(def);
        self.interned.insert(def, index);
        index
    }

    pub fn get(&self, index: TypeIndex) -> TypeDef {
        self.defs[index.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        TypeTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fundamentals_sit_at_their_codes() {
        let table = TypeTable::new();
        for fundamental in Fundamental::ALL {
            let index = table.fundamental(fundamental);
            assert_eq!(table.get(index), TypeDef::Fundamental(fundamental));
            assert_eq!(index.0, fundamental.code() as u32);
        }
    }

    #[test]
    fn derived_types_are_interned_once() {
        let mut table = TypeTable::new();
        let int = table.fundamental(Fundamental::Int);

        let a = table.intern(TypeDef::Array(int));
        let b = table.intern(TypeDef::Array(int));
        assert_eq!(a, b);
        assert_eq!(table.len(), 6);

        let nested = table.intern(TypeDef::Array(a));
        assert_ne!(nested, a);
    }
}
