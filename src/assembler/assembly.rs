//! The in-memory representation of one compile unit.
//!
//! Structures, functions and dependencies are kept in declaration order;
//! lookups are linear with first-match-wins semantics, which is also what
//! keeps diagnostics reproducible. Elements parsed from an imported module
//! carry an extern index against the importer's byte file, and a mapped
//! index once the importer actually references them.

use crate::bytefile::builder::Builder;
use crate::bytefile::module::ByteFile;
use crate::bytefile::{
    ExternFunctionIndex, ExternModuleIndex, ExternStructureIndex, FieldIndex, FunctionIndex,
    LabelIndex, LocalVariableIndex, MappedFunctionIndex, MappedStructureIndex, StructureIndex,
};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Assembly {
    pub byte_file: ByteFile,
    pub dependencies: Vec<ExternModule>,
    pub structures: Vec<Structure>,
    pub functions: Vec<Function>,
}

impl Assembly {
    pub fn new() -> Self {
        Assembly {
            byte_file: ByteFile::new(),
            dependencies: Vec::new(),
            structures: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn find_structure(&self, name: &str) -> Option<usize> {
        self.structures
            .iter()
            .position(|structure| structure.name == name)
    }

    pub fn has_structure(&self, name: &str) -> bool {
        self.find_structure(name).is_some()
    }

    pub fn find_function(&self, name: &str) -> Option<usize> {
        self.functions
            .iter()
            .position(|function| function.name == name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.find_function(name).is_some()
    }

    pub fn find_dependency(&self, path: &Path) -> Option<usize> {
        self.dependencies
            .iter()
            .position(|dependency| dependency.path == path)
    }

    pub fn has_dependency(&self, path: &Path) -> bool {
        self.find_dependency(path).is_some()
    }

    pub fn find_dependency_by_namespace(&self, namespace: &str) -> Option<usize> {
        self.dependencies
            .iter()
            .position(|dependency| dependency.namespace == namespace)
    }

    /// Moves every finished builder body into the byte file and serializes
    /// the artifact.
    pub fn generate(mut self, path: &Path) -> std::io::Result<()> {
        for function in &mut self.functions {
            if let Some(builder) = function.builder.take() {
                let target = builder.target();
                self.byte_file.set_function_body(target, builder.finish());
            }
        }
        self.byte_file.generate(path)
    }
}

impl Default for Assembly {
    fn default() -> Self {
        Assembly::new()
    }
}

#[derive(Debug)]
pub struct Structure {
    pub name: String,
    pub index: StructureIndex,
    pub fields: Vec<Field>,
    pub extern_index: Option<ExternStructureIndex>,
    pub mapped_index: Option<MappedStructureIndex>,
}

impl Structure {
    pub fn new(name: impl Into<String>, index: StructureIndex) -> Self {
        Structure {
            name: name.into(),
            index,
            fields: Vec::new(),
            extern_index: None,
            mapped_index: None,
        }
    }

    pub fn find_field(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.find_field(name).is_some()
    }
}

#[derive(Debug)]
pub struct Field {
    pub name: String,
    pub index: FieldIndex,
}

#[derive(Debug)]
pub struct Function {
    pub builder: Option<Builder>,

    pub name: String,
    // The entry point has no function index of its own
    pub index: Option<FunctionIndex>,
    pub labels: Vec<Label>,
    // Parameters occupy the first parameter_count slots
    pub local_variables: Vec<LocalVariable>,
    pub parameter_count: u16,
    pub has_result: bool,

    pub extern_index: Option<ExternFunctionIndex>,
    pub mapped_index: Option<MappedFunctionIndex>,
}

impl Function {
    pub fn find_label(&self, name: &str) -> Option<usize> {
        self.labels.iter().position(|label| label.name == name)
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.find_label(name).is_some()
    }

    pub fn find_local_variable(&self, name: &str) -> Option<usize> {
        self.local_variables
            .iter()
            .position(|variable| variable.name == name)
    }

    pub fn has_local_variable(&self, name: &str) -> bool {
        self.find_local_variable(name).is_some()
    }
}

#[derive(Debug)]
pub struct Label {
    pub name: String,
    // Reserved against the builder once all prototypes are known
    pub index: Option<LabelIndex>,
}

#[derive(Debug)]
pub struct LocalVariable {
    pub name: String,
    pub index: Option<LocalVariableIndex>,
}

/// Another compile unit pulled in through `import ... as ...` and exposed
/// under a namespace.
#[derive(Debug)]
pub struct ExternModule {
    pub path: PathBuf,
    pub namespace: String,
    pub index: ExternModuleIndex,
    pub assembly: Assembly,
}

/// A dotted identifier, split into a namespace part and the identifier the
/// parser is actually after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub namespace: String,
    pub identifier: String,
    pub full: String,
}

impl Name {
    /// Splits at the last dot: `ns.sub.Type` keeps `ns.sub` as the
    /// namespace. Used for type and function references.
    pub fn split_last(full: impl Into<String>) -> Self {
        let full = full.into();
        match full.rfind('.') {
            Some(at) => Name {
                namespace: full[..at].to_owned(),
                identifier: full[at + 1..].to_owned(),
                full,
            },
            None => Name {
                namespace: String::new(),
                identifier: full.clone(),
                full,
            },
        }
    }

    /// Splits at the second-to-last dot, so `ns.Struct.field` keeps
    /// `Struct.field` together. Used for field references.
    pub fn split_before_field(full: impl Into<String>) -> Self {
        let full = full.into();
        let Some(last) = full.rfind('.') else {
            return Name {
                namespace: String::new(),
                identifier: full.clone(),
                full,
            };
        };

        match full[..last].rfind('.') {
            Some(at) => Name {
                namespace: full[..at].to_owned(),
                identifier: full[at + 1..].to_owned(),
                full,
            },
            None => Name {
                namespace: String::new(),
                identifier: full.clone(),
                full,
            },
        }
    }

    pub fn has_namespace(&self) -> bool {
        !self.namespace.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_splits_at_the_last_dot() {
        let name = Name::split_last("std.io.Reader");
        assert_eq!(name.namespace, "std.io");
        assert_eq!(name.identifier, "Reader");
        assert_eq!(name.full, "std.io.Reader");

        let bare = Name::split_last("Reader");
        assert!(!bare.has_namespace());
        assert_eq!(bare.identifier, "Reader");
    }

    #[test]
    fn name_splits_before_the_field_part() {
        let name = Name::split_before_field("std.String32.length");
        assert_eq!(name.namespace, "std");
        assert_eq!(name.identifier, "String32.length");

        let local = Name::split_before_field("Pair.first");
        assert!(!local.has_namespace());
        assert_eq!(local.identifier, "Pair.first");
    }

    #[test]
    fn lookups_are_first_match_wins() {
        let mut assembly = Assembly::new();
        let index = assembly.byte_file.add_structure("Pair");
        assembly.structures.push(Structure::new("Pair", index));
        let duplicate = assembly.byte_file.add_structure("Pair");
        assembly.structures.push(Structure::new("Pair", duplicate));

        assert_eq!(assembly.find_structure("Pair"), Some(0));
        assert!(!assembly.has_structure("Single"));
    }
}
