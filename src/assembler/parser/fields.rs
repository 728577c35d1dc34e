use super::{LineOutcome, Parser};
use crate::assembler::assembly::{Field, Name};
use crate::assembler::tokens::TokenKind;
use crate::bytefile::types::Fundamental;
use crate::bytefile::{MappedStructureIndex, TypeIndex};
use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// A parsed type expression. `element_count` is `None` for a plain type,
/// `Some(0)` for the runtime-length array form and `Some(n)` for a sized
/// array. The element type is `None` when the name resolved to nothing.
#[derive(Debug)]
pub(crate) struct ParsedType {
    pub type_index: Option<TypeIndex>,
    pub name: Name,
    pub element_count: Option<u64>,
}

/// Where a structure reference landed: in this unit or in a dependency.
#[derive(Debug, Clone, Copy)]
pub(crate) enum StructureHandle {
    Local(usize),
    Extern { dependency: usize, structure: usize },
}

// Fundamental types shadow structures, they are checked first.
static FUNDAMENTALS: LazyLock<FxHashMap<&'static str, Fundamental>> = LazyLock::new(|| {
    let mut table = FxHashMap::default();
    for fundamental in Fundamental::ALL {
        table.insert(fundamental.name(), fundamental);
    }
    table
});

impl Parser {
    /// Pass 3 line dispatch.
    pub(crate) fn parse_fields_pass(&mut self) -> LineOutcome {
        if self.current().kind == TokenKind::ImportKeyword {
            return LineOutcome::Skipped;
        }
        if self.accept(TokenKind::StructKeyword).is_some() {
            return self.ignore_structure();
        }
        if self
            .accept_any(&[TokenKind::FuncKeyword, TokenKind::ProcKeyword])
            .is_some()
        {
            return self.ignore_function();
        }
        if self.peek_kind(1) == TokenKind::Colon {
            return self.ignore_label();
        }
        if self.current_structure.is_some() {
            return self.parse_field();
        }
        LineOutcome::Skipped
    }

    fn parse_field(&mut self) -> LineOutcome {
        let mut outcome = LineOutcome::Done;

        let Some(parsed) = self.parse_type() else {
            return LineOutcome::Failed;
        };
        if parsed.element_count == Some(0) {
            // The runtime-length form only makes sense as an instruction
            // operand
            self.error("Required array's length.");
            outcome = LineOutcome::Failed;
        }

        let Some(name_token) = self.accept(TokenKind::Identifier) else {
            if self.at_line_end() {
                self.error("Unexpected end-of-line.");
            } else {
                self.error("Invalid field name.");
            }
            return LineOutcome::Failed;
        };

        let Some(type_index) = parsed.type_index else {
            self.error(format!("Nonexistent type name '{}'.", parsed.name.full));
            return LineOutcome::Failed;
        };

        let structure = self
            .current_structure
            .expect("field lines are only dispatched inside a structure");
        if self.result.structures[structure].has_field(&name_token.word) {
            self.error(format!("Duplicated field name '{}'.", name_token.word));
            outcome = LineOutcome::Failed;
        }

        let result = &mut self.result;
        let index = result.byte_file.add_field(
            result.structures[structure].index,
            type_index,
            parsed.element_count.unwrap_or(0),
        );
        result.structures[structure].fields.push(Field {
            name: name_token.word,
            index,
        });

        outcome
    }

    /// Reads a type expression: a dotted name, optionally followed by an
    /// array part in brackets.
    pub(crate) fn parse_type(&mut self) -> Option<ParsedType> {
        let Some(word) = self.parse_dotted_word(true) else {
            if self.at_line_end() {
                self.error("Unexpected end-of-line.");
            } else if self.current().kind == TokenKind::LeftBracket {
                self.error("Required type name.");
            } else {
                self.error("Invalid type name.");
            }
            return None;
        };

        let name = Name::split_last(word);
        let type_index = self.resolve_type(&name);

        if self.accept(TokenKind::LeftBracket).is_none() {
            return Some(ParsedType {
                type_index,
                name,
                element_count: None,
            });
        }

        if self.accept(TokenKind::RightBracket).is_some() {
            return Some(ParsedType {
                type_index,
                name,
                element_count: Some(0),
            });
        }

        if self.accept(TokenKind::Decimal).is_some() {
            self.error("Array's length must be integer.");
            self.accept(TokenKind::RightBracket);
            return None;
        }

        if self.current().kind.is_integer() {
            let length = self.current().integer_value();
            self.cursor += 1;
            if self.accept(TokenKind::RightBracket).is_none() {
                self.error("Expected ']' after array's length.");
                return None;
            }
            return Some(ParsedType {
                type_index,
                name,
                element_count: Some(length),
            });
        }

        self.error("Expected ']' after '['.");
        None
    }

    pub(crate) fn resolve_type(&mut self, name: &Name) -> Option<TypeIndex> {
        if let Some(&fundamental) = FUNDAMENTALS.get(name.identifier.as_str()) {
            if name.has_namespace() {
                self.warning(format!(
                    "Fundamental type '{}' does not belong to a module.",
                    name.identifier
                ));
            }
            return Some(self.result.byte_file.fundamental_type(fundamental));
        }

        match self.find_structure_handle(name)? {
            StructureHandle::Local(index) => {
                let structure_index = self.result.structures[index].index;
                Some(self.result.byte_file.structure_type(structure_index))
            }
            StructureHandle::Extern {
                dependency,
                structure,
            } => Some(self.mapped_structure_type(dependency, structure)),
        }
    }

    pub(crate) fn find_structure_handle(&self, name: &Name) -> Option<StructureHandle> {
        if !name.has_namespace() {
            return self
                .result
                .find_structure(&name.identifier)
                .map(StructureHandle::Local);
        }

        let dependency = self.result.find_dependency_by_namespace(&name.namespace)?;
        let structure = self.result.dependencies[dependency]
            .assembly
            .find_structure(&name.identifier)?;
        Some(StructureHandle::Extern {
            dependency,
            structure,
        })
    }

    /// Maps an extern structure into this unit's byte file on first use.
    /// The mapped index sticks to the IR node, later references reuse it.
    pub(crate) fn ensure_mapped_structure(
        &mut self,
        dependency: usize,
        structure: usize,
    ) -> MappedStructureIndex {
        let result = &mut self.result;
        let module_index = result.dependencies[dependency].index;
        let node = &mut result.dependencies[dependency].assembly.structures[structure];

        match node.mapped_index {
            Some(mapped) => mapped,
            None => {
                let extern_index = node
                    .extern_index
                    .expect("extern structures are registered when the import loads");
                let mapped = result.byte_file.map_structure(module_index, extern_index);
                node.mapped_index = Some(mapped);
                mapped
            }
        }
    }

    pub(crate) fn mapped_structure_type(
        &mut self,
        dependency: usize,
        structure: usize,
    ) -> TypeIndex {
        let mapped = self.ensure_mapped_structure(dependency, structure);
        self.result.byte_file.mapped_structure_type(mapped)
    }
}
