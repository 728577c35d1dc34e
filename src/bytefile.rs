//! The byte-file backend: the opaque target the assembler core drives.
//!
//! The core never inspects emitted bytes. It declares structures, functions,
//! constants and extern symbols through [`module::ByteFile`], records each
//! function's instructions through a [`builder::Builder`], and finally asks
//! the byte file to serialize itself. Every identifier handed back to the
//! core is one of the index newtypes below, each only meaningful inside the
//! byte file (or builder) that produced it.

pub mod builder;
pub mod module;
pub mod types;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructureIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalVariableIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternModuleIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternStructureIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternFunctionIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MappedStructureIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MappedFunctionIndex(pub u32);

/// Which function of a byte file a builder writes into. The entry point is
/// not addressable through a [`FunctionIndex`], it has a dedicated slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionTarget {
    EntryPoint,
    Function(FunctionIndex),
}
