//! Import resolution, pass 2 of the parser.
//!
//! `import "<path>" as <namespace>` locates another source unit, reruns the
//! whole pipeline on it one depth level down, and records the result as a
//! dependency of the current unit. Paths starting with `/` are system paths
//! probed against the import directories; everything else is relative to
//! the working directory. The canonical path doubles as the cycle guard:
//! a unit may never appear twice in its own dependency list or anywhere on
//! the active import chain.

use super::assembly::ExternModule;
use super::parser::{LineOutcome, Parser};
use super::tokens::TokenKind;
use crate::assembler::assemble_unit;
use crate::bytefile::module::ExternFieldShape;
use crate::bytefile::types::TypeDef;
use crate::settings;
use std::path::PathBuf;

impl Parser {
    /// Pass 2 line dispatch.
    pub(crate) fn parse_dependencies(&mut self) -> LineOutcome {
        if self.accept(TokenKind::ImportKeyword).is_some() {
            return self.parse_import();
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
        LineOutcome::Skipped
    }

    fn parse_import(&mut self) -> LineOutcome {
        let Some(path_token) = self.accept(TokenKind::StringLiteral) else {
            self.error("Expected import path string.");
            return LineOutcome::Failed;
        };
        if self.accept(TokenKind::AsKeyword).is_none() {
            self.error("Expected 'as' after import path.");
            return LineOutcome::Failed;
        }
        let Some(namespace) = self.parse_dotted_word(false) else {
            self.error("Expected namespace name.");
            return LineOutcome::Failed;
        };

        let raw_path = path_token.text().to_owned();
        let Some(resolved) = self.resolve_import_path(&raw_path) else {
            return LineOutcome::Failed;
        };

        if resolved == self.path
            || self.import_chain.contains(&resolved)
            || self.result.has_dependency(&resolved)
        {
            self.error(format!("Duplicated import '{raw_path}'."));
            return LineOutcome::Failed;
        }
        if self
            .result
            .find_dependency_by_namespace(&namespace)
            .is_some()
        {
            self.error(format!("Duplicated namespace '{namespace}'."));
            return LineOutcome::Failed;
        }

        let mut chain = self.import_chain.clone();
        chain.push(self.path.clone());
        let unit = assemble_unit(&resolved, self.depth + 1, self.import_dirs.clone(), chain);

        if unit.has_error {
            self.error(format!("Failed to compile imported module '{raw_path}'."));
            self.diagnostics.append_rendered(unit.messages, true);
            return LineOutcome::Failed;
        }
        self.diagnostics.append_rendered(unit.messages, false);

        let Some(sub) = unit.assembly else {
            self.error(format!("Failed to compile imported module '{raw_path}'."));
            return LineOutcome::Failed;
        };

        self.register_dependency(resolved, namespace, sub);
        LineOutcome::Done
    }

    /// Declares the dependency's whole public surface against this unit's
    /// byte file and stores the extern indices on the sub-assembly's nodes.
    /// Mapped indices are only allocated later, when a symbol is used.
    fn register_dependency(
        &mut self,
        path: PathBuf,
        namespace: String,
        mut sub: crate::assembler::assembly::Assembly,
    ) {
        let module_index = self.result.byte_file.add_extern_module(&path);

        for structure in &mut sub.structures {
            let entry = sub.byte_file.structure_entry(structure.index);
            let shape: Vec<ExternFieldShape> = entry
                .fields
                .iter()
                .map(|field| match sub.byte_file.type_def(field.type_index) {
                    TypeDef::Fundamental(fundamental) => {
                        ExternFieldShape::Fundamental(fundamental, field.element_count)
                    }
                    _ => ExternFieldShape::Aggregate(field.element_count),
                })
                .collect();

            structure.extern_index = Some(self.result.byte_file.add_extern_structure(
                module_index,
                &structure.name,
                shape,
            ));
        }

        for function in &mut sub.functions {
            if function.name == settings::ENTRY_POINT_NAME {
                continue;
            }
            function.extern_index = Some(self.result.byte_file.add_extern_function(
                module_index,
                &function.name,
                function.parameter_count,
                function.has_result,
            ));
        }

        self.result.dependencies.push(ExternModule {
            path,
            namespace,
            index: module_index,
            assembly: sub,
        });
    }

    fn resolve_import_path(&mut self, raw: &str) -> Option<PathBuf> {
        let system_relative = if let Some(stripped) = raw.strip_prefix('/') {
            Some(stripped.to_owned())
        } else if raw.starts_with("std/") {
            self.warning(format!(
                "Deprecated import path '{raw}'. Use '/{raw}' instead."
            ));
            Some(raw.to_owned())
        } else {
            None
        };

        let candidate = match system_relative {
            Some(relative) => {
                let found = self
                    .import_dirs
                    .iter()
                    .map(|dir| dir.join(&relative))
                    .find(|candidate| candidate.is_file());
                match found {
                    Some(candidate) => candidate,
                    None => {
                        self.error(format!("Failed to find import '{raw}'."));
                        return None;
                    }
                }
            }
            None => PathBuf::from(raw),
        };

        match candidate.canonicalize() {
            Ok(path) => Some(path),
            Err(_) => {
                self.error(format!("Failed to find import '{raw}'."));
                None
            }
        }
    }
}
