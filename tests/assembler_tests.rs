//! End-to-end tests that drive the whole pipeline from source text on disk,
//! the way the command line shell does.

use sbasm::assembler::{self, UnitOutput};
use sbasm::bytefile::builder::Instruction;
use sbasm::bytefile::module::Constant;
use std::fs;
use tempfile::TempDir;

/// Writes `main.sba` plus any extra files into a fresh directory and
/// assembles it with that directory on the system import path.
fn compile_with(source: &str, files: &[(&str, &str)]) -> (UnitOutput, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create import dirs");
        }
        fs::write(path, content).expect("write import file");
    }

    let main_path = dir.path().join("main.sba");
    fs::write(&main_path, source).expect("write main file");

    let unit = assembler::assemble(&main_path, &[dir.path().to_path_buf()]);
    (unit, dir)
}

fn compile(source: &str) -> UnitOutput {
    compile_with(source, &[]).0
}

fn entry_code(unit: &UnitOutput) -> Vec<Instruction> {
    let assembly = unit.assembly.as_ref().expect("assembly");
    let entry = assembly
        .functions
        .iter()
        .find(|function| function.name == "entrypoint")
        .expect("entry point");
    entry.builder.as_ref().expect("builder").code().to_vec()
}

#[test]
fn minimal_entry_point() {
    let unit = compile("proc entrypoint:\n  ret\n");
    assert!(!unit.has_error, "messages: {}", unit.messages);
    assert!(unit.messages.is_empty());
    assert_eq!(entry_code(&unit), vec![Instruction::Ret]);
}

#[test]
fn struct_with_fields_reaches_the_backend() {
    let unit = compile(
        "struct Pair:\n\
         int first\n\
         int second\n\
         proc entrypoint:\n\
         ret\n",
    );
    assert!(!unit.has_error, "messages: {}", unit.messages);

    let assembly = unit.assembly.as_ref().expect("assembly");
    let pair = &assembly.structures[0];
    assert_eq!(pair.name, "Pair");
    assert_eq!(pair.fields[0].name, "first");
    assert_eq!(pair.fields[1].name, "second");

    let entry = assembly.byte_file.structure_entry(pair.index);
    assert_eq!(entry.name, "Pair");
    assert_eq!(entry.fields.len(), 2);
    assert_eq!(entry.fields[0].element_count, 0);
}

#[test]
fn integer_literal_widths() {
    let unit = compile(
        "proc entrypoint:\n\
         push 42i\n\
         push 42\n\
         push 42l\n\
         push 4000000000\n\
         ret\n",
    );
    assert!(!unit.has_error, "messages: {}", unit.messages);
    assert_eq!(
        unit.assembly.as_ref().expect("assembly").byte_file.constants(),
        &[
            Constant::Int(42),
            Constant::Long(42),
            Constant::Long(4_000_000_000),
        ]
    );

    let unit = compile(
        "proc entrypoint:\n\
         push -2147483649i\n\
         ret\n",
    );
    assert!(!unit.has_error);
    assert!(unit.messages.contains("Overflowed integer literal"));
}

#[test]
fn import_and_call_through_a_namespace() {
    let util = "func add(a, b):\n\
                load a\n\
                load b\n\
                add\n\
                ret\n";
    let (unit, _dir) = compile_with(
        "import \"/util.sba\" as u\n\
         proc entrypoint:\n\
         push 1\n\
         push 2\n\
         call u.add\n\
         pop\n\
         ret\n",
        &[("util.sba", util)],
    );
    assert!(!unit.has_error, "messages: {}", unit.messages);

    let assembly = unit.assembly.as_ref().expect("assembly");
    assert_eq!(assembly.dependencies.len(), 1);
    assert_eq!(assembly.dependencies[0].namespace, "u");

    // The call mapped exactly one extern symbol into this unit
    assert_eq!(assembly.byte_file.mappings().len(), 1);
    assert!(
        entry_code(&unit)
            .iter()
            .any(|instruction| matches!(instruction, Instruction::Call(_)))
    );
}

#[test]
fn calling_a_missing_extern_function_is_an_error() {
    let (unit, _dir) = compile_with(
        "import \"/util.sba\" as u\n\
         proc entrypoint:\n\
         call u.add\n\
         ret\n",
        &[("util.sba", "func mul(a, b):\nret\n")],
    );
    assert!(unit.has_error);
    assert!(
        unit.messages
            .contains("Nonexistent function or procedure name 'add'.")
    );
}

#[test]
fn extern_structures_map_on_first_use() {
    let shapes = "struct Point:\n\
                  int x\n\
                  int y\n";
    let (unit, _dir) = compile_with(
        "import \"/shapes.sba\" as shapes\n\
         struct Segment:\n\
         shapes.Point from\n\
         shapes.Point to\n\
         proc entrypoint:\n\
         ret\n",
        &[("shapes.sba", shapes)],
    );
    assert!(!unit.has_error, "messages: {}", unit.messages);

    let assembly = unit.assembly.as_ref().expect("assembly");
    // Two fields, one mapped structure: the second use reused the mapping
    assert_eq!(assembly.byte_file.mappings().len(), 1);
    assert_eq!(
        assembly.dependencies[0].assembly.structures[0]
            .mapped_index
            .is_some(),
        true
    );
}

#[test]
fn namespaced_fundamental_types_warn_but_work() {
    let unit = compile(
        "struct S:\n\
         foo.int x\n\
         proc entrypoint:\n\
         ret\n",
    );
    assert!(!unit.has_error, "messages: {}", unit.messages);
    assert!(
        unit.messages
            .contains("Fundamental type 'int' does not belong to a module.")
    );
}

#[test]
fn duplicate_imports_and_namespaces_are_errors() {
    let util = "func add(a, b):\nret\n";

    let (unit, _dir) = compile_with(
        "import \"/util.sba\" as u\n\
         import \"/util.sba\" as v\n\
         proc entrypoint:\n\
         ret\n",
        &[("util.sba", util)],
    );
    assert!(unit.has_error);
    assert!(unit.messages.contains("Duplicated import '/util.sba'."));

    let (unit, _dir) = compile_with(
        "import \"/util.sba\" as u\n\
         import \"/other.sba\" as u\n\
         proc entrypoint:\n\
         ret\n",
        &[("util.sba", util), ("other.sba", "func mul(a, b):\nret\n")],
    );
    assert!(unit.has_error);
    assert!(unit.messages.contains("Duplicated namespace 'u'."));
}

#[test]
fn import_cycles_terminate_with_a_duplicate_import_error() {
    let (unit, dir) = compile_with(
        "import \"/b.sba\" as b\n\
         proc entrypoint:\n\
         ret\n",
        &[("b.sba", "import \"/main.sba\" as m\nfunc helper:\nret\n")],
    );
    drop(dir);

    assert!(unit.has_error);
    assert!(unit.messages.contains("Duplicated import '/main.sba'."));
    assert!(unit.messages.contains("Failed to compile imported module '/b.sba'."));
}

#[test]
fn imported_units_must_not_declare_an_entry_point() {
    let (unit, _dir) = compile_with(
        "import \"/util.sba\" as u\n\
         proc entrypoint:\n\
         ret\n",
        &[("util.sba", "proc entrypoint:\nret\n")],
    );
    assert!(unit.has_error);
    assert!(
        unit.messages
            .contains("Procedure 'entrypoint' cannot be declared in an imported module.")
    );
}

#[test]
fn missing_imports_are_fatal_for_the_unit() {
    let unit = compile(
        "import \"/nowhere.sba\" as n\n\
         proc entrypoint:\n\
         ret\n",
    );
    assert!(unit.has_error);
    assert!(unit.messages.contains("Failed to find import '/nowhere.sba'."));
}

#[test]
fn bare_std_import_form_is_deprecated() {
    let string32 = "struct String32:\n\
                    gcpointer data\n\
                    int length\n\
                    int bytes\n";
    let (unit, _dir) = compile_with(
        "import \"std/string.sba\" as std\n\
         proc entrypoint:\n\
         ret\n",
        &[("std/string.sba", string32)],
    );
    assert!(!unit.has_error, "messages: {}", unit.messages);
    assert!(unit.messages.contains("Deprecated import path 'std/string.sba'."));
}

#[test]
fn string32_desugars_into_field_stores() {
    let string32 = "struct String32:\n\
                    gcpointer data\n\
                    int length\n\
                    int bytes\n";
    let (unit, _dir) = compile_with(
        "import \"/std/string.sba\" as std\n\
         proc entrypoint:\n\
         string32 \"Hi\" to s\n\
         ret\n",
        &[("std/string.sba", string32)],
    );
    assert!(!unit.has_error, "messages: {}", unit.messages);

    let assembly = unit.assembly.as_ref().expect("assembly");
    let entry = &assembly.functions[0];
    assert_eq!(entry.local_variables.len(), 1);
    assert_eq!(entry.local_variables[0].name, "s");

    let code = entry_code(&unit);
    // One TStore per character plus one per field
    let tstores = code
        .iter()
        .filter(|instruction| matches!(instruction, Instruction::TStore))
        .count();
    assert_eq!(tstores, 2 + 3);
    assert!(code.iter().any(|i| matches!(i, Instruction::New(_))));
    assert!(code.iter().any(|i| matches!(i, Instruction::ANew(_))));

    // 'H' and 'i' are pushed as int constants alongside the lengths
    let constants = assembly.byte_file.constants();
    assert!(constants.contains(&Constant::Int('H' as u32)));
    assert!(constants.contains(&Constant::Int('i' as u32)));
    assert!(constants.contains(&Constant::Int(2)));
}

#[test]
fn string32_requires_the_standard_string_module() {
    let unit = compile(
        "proc entrypoint:\n\
         string32 \"Hi\" to s\n\
         ret\n",
    );
    assert!(unit.has_error);
    assert!(unit.messages.contains("Required '/std/string.sba' module."));
}

#[test]
fn errors_recover_per_line_and_accumulate() {
    let unit = compile(
        "proc entrypoint:\n\
         frobnicate\n\
         load ghost\n\
         jmp nowhere\n\
         ret\n",
    );
    assert!(unit.has_error);
    assert!(unit.messages.contains("Unknown mnemonic 'frobnicate'."));
    assert!(unit.messages.contains("Nonexistent local variable 'ghost'."));
    assert!(unit.messages.contains("Nonexistent label name 'nowhere'."));
}

#[test]
fn identical_sources_assemble_to_identical_bytes() {
    let source = "struct Pair:\n\
                  int first\n\
                  int second\n\
                  proc entrypoint:\n\
                  push 7\n\
                  store x\n\
                  load x\n\
                  pop\n\
                  ret\n";

    let render = || {
        let (unit, dir) = compile_with(source, &[]);
        assert!(!unit.has_error, "messages: {}", unit.messages);
        let out_path = dir.path().join("main.sbf");
        unit.assembly
            .expect("assembly")
            .generate(&out_path)
            .expect("generate");
        fs::read(out_path).expect("read artifact")
    };

    assert_eq!(render(), render());
}

#[test]
fn unreadable_input_is_fatal() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("missing.sba");
    let unit = assembler::assemble(&missing, &[]);
    assert!(unit.has_error);
    assert!(unit.assembly.is_none());
    assert!(unit.messages.contains("Failed to open"));
}
