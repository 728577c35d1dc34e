//! The compilation pipeline for one unit: read, tokenize, parse, resolve.
//!
//! `depth` tracks how far down the import graph a unit sits and decides
//! which parser passes run. The root unit at depth 0 runs everything and is
//! the only unit that may (and must) declare an entry point; imported units
//! contribute prototypes, dependencies and fields but never instruction
//! bodies.

pub mod assembly;
pub mod diagnostics;
pub mod imports;
pub mod lexer;
pub mod parser;
pub mod tokens;

use crate::assembler::assembly::Assembly;
use crate::assembler::diagnostics::Diagnostics;
use crate::assembler::parser::Parser;
use crate::token_log;
use std::fs;
use std::path::{Path, PathBuf};

pub struct UnitOutput {
    /// None only when the source file could not be read at all
    pub assembly: Option<Assembly>,
    /// Rendered diagnostics of this unit, including nested import output
    pub messages: String,
    pub has_error: bool,
}

/// Compiles the root unit of a build.
pub fn assemble(path: &Path, import_dirs: &[PathBuf]) -> UnitOutput {
    assemble_unit(path, 0, import_dirs.to_vec(), Vec::new())
}

/// Compiles one unit at the given import depth. `import_chain` holds the
/// canonical paths of every unit currently being compiled above this one,
/// which is what turns an import cycle into a duplicate-import error
/// instead of unbounded recursion.
pub fn assemble_unit(
    path: &Path,
    depth: u32,
    import_dirs: Vec<PathBuf>,
    import_chain: Vec<PathBuf>,
) -> UnitOutput {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let display_path = canonical.display().to_string();

    let source = match fs::read_to_string(&canonical) {
        Ok(source) => source,
        Err(_) => {
            let mut diagnostics = Diagnostics::new(&display_path);
            diagnostics.error_without_line(format!("Failed to open '{display_path}' file."));
            return UnitOutput {
                assembly: None,
                messages: diagnostics.render(),
                has_error: true,
            };
        }
    };

    let (tokens, diagnostics) = lexer::tokenize(&source, &display_path);
    token_log!(&tokens);

    let parser = Parser::new(
        canonical,
        tokens,
        diagnostics,
        depth,
        import_dirs,
        import_chain,
    );
    let output = parser.parse();

    let has_error = output.diagnostics.has_error();
    UnitOutput {
        assembly: Some(output.assembly),
        messages: output.diagnostics.render(),
        has_error,
    }
}
