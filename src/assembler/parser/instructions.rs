use super::fields::StructureHandle;
use super::{LineOutcome, Parser};
use crate::assembler::assembly::LocalVariable;
use crate::assembler::tokens::{Token, TokenKind};
use crate::bytefile::LocalVariableIndex;
use crate::bytefile::builder::CallTarget;
use crate::bytefile::types::Fundamental;
use crate::settings;

#[derive(Debug, Clone, Copy)]
enum JumpKind {
    Jmp,
    Je,
    Jne,
    Ja,
    Jae,
    Jb,
    Jbe,
}

#[derive(Debug, Clone, Copy)]
enum ArrayOp {
    New,
    GcNew,
    Push,
}

impl Parser {
    /// Pass 4 line dispatch.
    pub(crate) fn parse_instructions_pass(&mut self) -> LineOutcome {
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
            return self.bind_label();
        }
        if self.current_structure.is_some() {
            return LineOutcome::Skipped;
        }
        self.parse_instruction()
    }

    /// The label was reserved in the first pass; reaching its line again in
    /// the instruction pass pins it to the current offset.
    fn bind_label(&mut self) -> LineOutcome {
        let name = self.current().word.clone();
        self.cursor += 2;

        if let Some(function) = self.current_function {
            if let Some(builder) = self.result.functions[function].builder.as_mut() {
                builder.add_label(&name);
            }
        }
        LineOutcome::Done
    }

    fn parse_instruction(&mut self) -> LineOutcome {
        let Some(name_token) = self.accept(TokenKind::Identifier) else {
            if self.at_line_end() {
                return LineOutcome::Done;
            }
            self.error("Invalid mnemonic.");
            return LineOutcome::Failed;
        };
        let Some(function) = self.current_function else {
            self.error("Not belonged instruction.");
            return LineOutcome::Failed;
        };

        let mnemonic = name_token.word.to_lowercase();
        match mnemonic.as_str() {
            "nop" => {
                self.builder_mut(function).nop();
                LineOutcome::Done
            }

            "push" => self.parse_push(function),
            "pop" => {
                self.builder_mut(function).pop();
                LineOutcome::Done
            }
            "load" => self.parse_load(function),
            "store" => self.parse_store(function),
            "lea" => self.parse_lea(function),
            "flea" => self.parse_flea(function),
            "tload" => {
                self.builder_mut(function).tload();
                LineOutcome::Done
            }
            "tstore" => {
                self.builder_mut(function).tstore();
                LineOutcome::Done
            }
            "copy" => {
                self.builder_mut(function).copy();
                LineOutcome::Done
            }
            "swap" => {
                self.builder_mut(function).swap();
                LineOutcome::Done
            }

            "add" => {
                self.builder_mut(function).add();
                LineOutcome::Done
            }
            "sub" => {
                self.builder_mut(function).sub();
                LineOutcome::Done
            }
            "mul" => {
                self.builder_mut(function).mul();
                LineOutcome::Done
            }
            "imul" => {
                self.builder_mut(function).imul();
                LineOutcome::Done
            }
            "div" => {
                self.builder_mut(function).div();
                LineOutcome::Done
            }
            "idiv" => {
                self.builder_mut(function).idiv();
                LineOutcome::Done
            }
            "mod" => {
                self.builder_mut(function).modulo();
                LineOutcome::Done
            }
            "imod" => {
                self.builder_mut(function).imodulo();
                LineOutcome::Done
            }
            "neg" => {
                self.builder_mut(function).neg();
                LineOutcome::Done
            }
            "inc" => {
                self.builder_mut(function).inc();
                LineOutcome::Done
            }
            "dec" => {
                self.builder_mut(function).dec();
                LineOutcome::Done
            }

            "and" => {
                self.builder_mut(function).and();
                LineOutcome::Done
            }
            "or" => {
                self.builder_mut(function).or();
                LineOutcome::Done
            }
            "xor" => {
                self.builder_mut(function).xor();
                LineOutcome::Done
            }
            "not" => {
                self.builder_mut(function).not();
                LineOutcome::Done
            }
            "shl" => {
                self.builder_mut(function).shl();
                LineOutcome::Done
            }
            "sal" => {
                self.builder_mut(function).sal();
                LineOutcome::Done
            }
            "shr" => {
                self.builder_mut(function).shr();
                LineOutcome::Done
            }
            "sar" => {
                self.builder_mut(function).sar();
                LineOutcome::Done
            }

            "cmp" => {
                self.builder_mut(function).cmp();
                LineOutcome::Done
            }
            "icmp" => {
                self.builder_mut(function).icmp();
                LineOutcome::Done
            }
            "jmp" => self.parse_jump(function, JumpKind::Jmp),
            "je" => self.parse_jump(function, JumpKind::Je),
            "jne" => self.parse_jump(function, JumpKind::Jne),
            "ja" => self.parse_jump(function, JumpKind::Ja),
            "jae" => self.parse_jump(function, JumpKind::Jae),
            "jb" => self.parse_jump(function, JumpKind::Jb),
            "jbe" => self.parse_jump(function, JumpKind::Jbe),
            "call" => self.parse_call(function),
            "ret" => {
                self.builder_mut(function).ret();
                LineOutcome::Done
            }

            "toi" => {
                self.builder_mut(function).toi();
                LineOutcome::Done
            }
            "tol" => {
                self.builder_mut(function).tol();
                LineOutcome::Done
            }
            "tod" => {
                self.builder_mut(function).tod();
                LineOutcome::Done
            }
            "top" => {
                self.builder_mut(function).top();
                LineOutcome::Done
            }

            "null" => {
                self.builder_mut(function).null();
                LineOutcome::Done
            }
            "new" => self.parse_new(function, false),
            "delete" => {
                self.builder_mut(function).delete();
                LineOutcome::Done
            }
            "gcnull" => {
                self.builder_mut(function).gc_null();
                LineOutcome::Done
            }
            "gcnew" => self.parse_new(function, true),
            "apush" => self.parse_array_new(function, ArrayOp::Push),
            "anew" => self.parse_array_new(function, ArrayOp::New),
            "agcnew" => self.parse_array_new(function, ArrayOp::GcNew),
            "alea" => {
                self.builder_mut(function).a_lea();
                LineOutcome::Done
            }
            "count" => {
                self.builder_mut(function).count();
                LineOutcome::Done
            }

            "string32" => self.parse_string32(function),

            _ => {
                self.error(format!("Unknown mnemonic '{}'.", name_token.word));
                LineOutcome::Failed
            }
        }
    }

    fn parse_push(&mut self, function: usize) -> LineOutcome {
        let negative = self.accept(TokenKind::Minus).is_some();

        if self.current().kind.is_integer() {
            let token = self.current().clone();
            self.cursor += 1;
            self.push_integer_literal(function, &token, negative);
            return LineOutcome::Done;
        }

        if let Some(token) = self.accept(TokenKind::Decimal) {
            let value = if negative {
                -token.real_value()
            } else {
                token.real_value()
            };
            let constant = self.result.byte_file.add_double_constant(value);
            self.builder_mut(function).push_constant(constant);
            return LineOutcome::Done;
        }

        if negative {
            self.error("Expected number literal after '-'.");
            return LineOutcome::Failed;
        }

        if self.current().kind == TokenKind::Identifier {
            let name = self
                .parse_symbol_name()
                .expect("the current token is an identifier");
            let Some(handle) = self.find_structure_handle(&name) else {
                self.error(format!("Nonexistent structure name '{}'.", name.full));
                return LineOutcome::Failed;
            };
            let type_index = match handle {
                StructureHandle::Local(index) => {
                    let structure_index = self.result.structures[index].index;
                    self.result.byte_file.structure_type(structure_index)
                }
                StructureHandle::Extern {
                    dependency,
                    structure,
                } => self.mapped_structure_type(dependency, structure),
            };
            self.builder_mut(function).push_type(type_index);
            return LineOutcome::Done;
        }

        self.error("Expected literal or structure name.");
        LineOutcome::Failed
    }

    /// Picks the constant width for an integer literal. A suffix forces the
    /// width, otherwise the narrowest signed width that holds the value
    /// wins. Out-of-range suffixed literals keep their low bits and warn.
    fn push_integer_literal(&mut self, function: usize, token: &Token, negative: bool) {
        let value = token.integer_value();
        // Magnitude of the smallest 32 bit integer
        const I32_CEIL: u64 = i32::MAX as u64 + 1;

        if negative {
            let encoded_int = (value as i64).wrapping_neg() as i32 as u32;
            let encoded_long = (value as i64).wrapping_neg() as u64;
            match token.suffix.as_str() {
                "i" => {
                    if value > I32_CEIL {
                        self.warning(format!("Overflowed integer literal '{}'.", token.word));
                    }
                    self.push_int(function, encoded_int);
                }
                "l" => self.push_long(function, encoded_long),
                _ => {
                    if value <= I32_CEIL {
                        self.push_int(function, encoded_int);
                    } else {
                        self.push_long(function, encoded_long);
                    }
                }
            }
        } else {
            match token.suffix.as_str() {
                "i" => {
                    if value > u32::MAX as u64 {
                        self.warning(format!("Overflowed integer literal '{}'.", token.word));
                    }
                    self.push_int(function, value as u32);
                }
                "l" => self.push_long(function, value),
                _ => {
                    if value <= i32::MAX as u64 {
                        self.push_int(function, value as u32);
                    } else {
                        self.push_long(function, value);
                    }
                }
            }
        }
    }

    fn push_int(&mut self, function: usize, value: u32) {
        let constant = self.result.byte_file.add_int_constant(value);
        self.builder_mut(function).push_constant(constant);
    }

    fn push_long(&mut self, function: usize, value: u64) {
        let constant = self.result.byte_file.add_long_constant(value);
        self.builder_mut(function).push_constant(constant);
    }

    fn existing_local(&self, function: usize, name: &str) -> Option<LocalVariableIndex> {
        let slot = self.result.functions[function].find_local_variable(name)?;
        self.result.functions[function].local_variables[slot].index
    }

    fn parse_load(&mut self, function: usize) -> LineOutcome {
        let Some(name_token) = self.accept(TokenKind::Identifier) else {
            self.error("Expected parameter or local variable name.");
            return LineOutcome::Failed;
        };
        let Some(variable) = self.existing_local(function, &name_token.word) else {
            self.error(format!(
                "Nonexistent local variable '{}'.",
                name_token.word
            ));
            return LineOutcome::Failed;
        };

        self.builder_mut(function).load(variable);
        LineOutcome::Done
    }

    fn parse_lea(&mut self, function: usize) -> LineOutcome {
        let Some(name_token) = self.accept(TokenKind::Identifier) else {
            self.error("Expected parameter or local variable name.");
            return LineOutcome::Failed;
        };
        let Some(variable) = self.existing_local(function, &name_token.word) else {
            self.error(format!(
                "Nonexistent local variable '{}'.",
                name_token.word
            ));
            return LineOutcome::Failed;
        };

        self.builder_mut(function).lea(variable);
        LineOutcome::Done
    }

    fn parse_store(&mut self, function: usize) -> LineOutcome {
        let Some(name_token) = self.accept(TokenKind::Identifier) else {
            self.error("Expected parameter or local variable name.");
            return LineOutcome::Failed;
        };

        let variable = self.local_for_store(function, &name_token.word);
        self.builder_mut(function).store(variable);
        LineOutcome::Done
    }

    /// `store` to an unknown name allocates a new local on the spot.
    fn local_for_store(&mut self, function: usize, name: &str) -> LocalVariableIndex {
        if let Some(variable) = self.existing_local(function, name) {
            return variable;
        }

        let entry = &mut self.result.functions[function];
        let builder = entry
            .builder
            .as_mut()
            .expect("builders exist after the first pass");
        let variable = builder.add_local_variable();
        entry.local_variables.push(LocalVariable {
            name: name.to_owned(),
            index: Some(variable),
        });
        variable
    }

    fn parse_flea(&mut self, function: usize) -> LineOutcome {
        let Some(name) = self.parse_field_name() else {
            self.error("Expected structure field name.");
            return LineOutcome::Failed;
        };

        let Some((structure_name, field_name)) = name.identifier.split_once('.') else {
            self.error(format!("Invalid field name '{}'.", name.full));
            return LineOutcome::Failed;
        };
        let structure_name = crate::assembler::assembly::Name {
            namespace: name.namespace.clone(),
            identifier: structure_name.to_owned(),
            full: if name.namespace.is_empty() {
                structure_name.to_owned()
            } else {
                format!("{}.{}", name.namespace, structure_name)
            },
        };

        let Some(handle) = self.find_structure_handle(&structure_name) else {
            self.error(format!(
                "Nonexistent structure name '{}'.",
                structure_name.full
            ));
            return LineOutcome::Failed;
        };

        let field_index = match handle {
            StructureHandle::Local(index) => {
                let structure = &self.result.structures[index];
                match structure.find_field(field_name) {
                    Some(slot) => structure.fields[slot].index,
                    None => {
                        self.error(format!("Nonexistent field name '{field_name}'."));
                        return LineOutcome::Failed;
                    }
                }
            }
            StructureHandle::Extern {
                dependency,
                structure,
            } => {
                let node = &self.result.dependencies[dependency].assembly.structures[structure];
                let Some(slot) = node.find_field(field_name) else {
                    self.error(format!("Nonexistent field name '{field_name}'."));
                    return LineOutcome::Failed;
                };
                let field_index = node.fields[slot].index;
                // Referencing the field drags the structure into this unit
                self.ensure_mapped_structure(dependency, structure);
                field_index
            }
        };

        self.builder_mut(function).flea(field_index);
        LineOutcome::Done
    }

    fn parse_jump(&mut self, function: usize, kind: JumpKind) -> LineOutcome {
        let Some(name_token) = self.accept(TokenKind::Identifier) else {
            self.error("Expected label name.");
            return LineOutcome::Failed;
        };

        let entry = &self.result.functions[function];
        let Some(slot) = entry.find_label(&name_token.word) else {
            self.error(format!("Nonexistent label name '{}'.", name_token.word));
            return LineOutcome::Failed;
        };
        let label = entry.labels[slot]
            .index
            .expect("labels are reserved when builders are generated");

        let builder = self.builder_mut(function);
        match kind {
            JumpKind::Jmp => builder.jmp(label),
            JumpKind::Je => builder.je(label),
            JumpKind::Jne => builder.jne(label),
            JumpKind::Ja => builder.ja(label),
            JumpKind::Jae => builder.jae(label),
            JumpKind::Jb => builder.jb(label),
            JumpKind::Jbe => builder.jbe(label),
        }
        LineOutcome::Done
    }

    fn parse_call(&mut self, function: usize) -> LineOutcome {
        let Some(name) = self.parse_symbol_name() else {
            self.error("Expected function or procedure name.");
            return LineOutcome::Failed;
        };

        if !name.has_namespace() {
            let Some(callee) = self.result.find_function(&name.identifier) else {
                self.error(format!(
                    "Nonexistent function or procedure name '{}'.",
                    name.identifier
                ));
                return LineOutcome::Failed;
            };
            if self.result.functions[callee].name == settings::ENTRY_POINT_NAME {
                self.error("Noncallable function or procedure 'entrypoint'.");
                return LineOutcome::Failed;
            }
            let index = self.result.functions[callee]
                .index
                .expect("only the entry point has no function index");
            self.builder_mut(function).call(CallTarget::Local(index));
            return LineOutcome::Done;
        }

        let Some(dependency) = self.result.find_dependency_by_namespace(&name.namespace) else {
            self.error(format!("Nonexistent namespace '{}'.", name.namespace));
            return LineOutcome::Failed;
        };
        let Some(callee) = self.result.dependencies[dependency]
            .assembly
            .find_function(&name.identifier)
        else {
            self.error(format!(
                "Nonexistent function or procedure name '{}'.",
                name.identifier
            ));
            return LineOutcome::Failed;
        };

        let mapped = self.ensure_mapped_function(dependency, callee);
        self.builder_mut(function).call(CallTarget::Mapped(mapped));
        LineOutcome::Done
    }

    fn ensure_mapped_function(
        &mut self,
        dependency: usize,
        callee: usize,
    ) -> crate::bytefile::MappedFunctionIndex {
        let result = &mut self.result;
        let module_index = result.dependencies[dependency].index;
        let node = &mut result.dependencies[dependency].assembly.functions[callee];

        match node.mapped_index {
            Some(mapped) => mapped,
            None => {
                let extern_index = node
                    .extern_index
                    .expect("extern functions are registered when the import loads");
                let mapped = result.byte_file.map_function(module_index, extern_index);
                node.mapped_index = Some(mapped);
                mapped
            }
        }
    }

    fn parse_new(&mut self, function: usize, gc: bool) -> LineOutcome {
        let Some(parsed) = self.parse_type() else {
            return LineOutcome::Failed;
        };
        let Some(type_index) = parsed.type_index else {
            self.error(format!("Nonexistent type name '{}'.", parsed.name.full));
            return LineOutcome::Failed;
        };

        if parsed.element_count.is_some() {
            self.error("Array cannot be used here.");
            self.info(if gc {
                "Use 'agcnew' mnemonic instead."
            } else {
                "Use 'anew' mnemonic instead."
            });
            return LineOutcome::Failed;
        }

        if gc {
            self.builder_mut(function).gc_new(type_index);
        } else {
            self.builder_mut(function).new_object(type_index);
        }
        LineOutcome::Done
    }

    fn parse_array_new(&mut self, function: usize, op: ArrayOp) -> LineOutcome {
        let Some(parsed) = self.parse_type() else {
            return LineOutcome::Failed;
        };
        let Some(type_index) = parsed.type_index else {
            self.error(format!("Nonexistent type name '{}'.", parsed.name.full));
            return LineOutcome::Failed;
        };

        match parsed.element_count {
            None => {
                self.error("Only array can be used here.");
                self.info(match op {
                    ArrayOp::New => "Use 'new' mnemonic instead.",
                    ArrayOp::GcNew => "Use 'gcnew' mnemonic instead.",
                    ArrayOp::Push => "Use 'push' mnemonic instead.",
                });
                LineOutcome::Failed
            }
            // Zero length means the element count comes from the stack
            Some(0) => {
                let array_type = self.result.byte_file.make_array(type_index);
                let builder = self.builder_mut(function);
                match op {
                    ArrayOp::New => builder.a_new(array_type),
                    ArrayOp::GcNew => builder.agc_new(array_type),
                    ArrayOp::Push => builder.a_push(array_type),
                }
                LineOutcome::Done
            }
            Some(_) => {
                self.error("Array's length cannot be used here.");
                LineOutcome::Failed
            }
        }
    }

    /// Desugars `string32 "text" to name` into the builder calls that
    /// allocate a String32 from the standard library, fill its character
    /// array one element at a time, and seat the two length fields.
    fn parse_string32(&mut self, function: usize) -> LineOutcome {
        let Some(text_token) = self.accept(TokenKind::StringLiteral) else {
            self.error("Expected string literal after 'string32'.");
            return LineOutcome::Failed;
        };
        match self.accept(TokenKind::Identifier) {
            Some(token) if token.word == "to" => {}
            _ => {
                self.error("Expected 'to' after string literal.");
                return LineOutcome::Failed;
            }
        }
        let Some(target_token) = self.accept(TokenKind::Identifier) else {
            self.error("Expected local variable name after 'to'.");
            return LineOutcome::Failed;
        };

        let Some((dependency, structure)) = self.find_string32() else {
            self.error("Required '/std/string.sba' module.");
            return LineOutcome::Failed;
        };
        let string_type = self.mapped_structure_type(dependency, structure);

        let text = text_token.text().to_owned();
        let char_count = text.chars().count() as u32;
        let byte_count = text.len() as u32;

        self.builder_mut(function).new_object(string_type);
        let target = self.local_for_store(function, &target_token.word);
        self.builder_mut(function).store(target);

        // Field 0: the character array, one element per code point
        self.builder_mut(function).load(target);
        self.push_int(function, 0);
        self.push_int(function, char_count);
        let int_type = self
            .result
            .byte_file
            .fundamental_type(Fundamental::Int);
        let int_array = self.result.byte_file.make_array(int_type);
        self.builder_mut(function).a_new(int_array);
        for (slot, character) in text.chars().enumerate() {
            self.builder_mut(function).copy();
            self.push_int(function, slot as u32);
            self.push_int(function, character as u32);
            self.builder_mut(function).tstore();
        }
        self.builder_mut(function).tstore();

        // Field 1: length in characters
        self.builder_mut(function).load(target);
        self.push_int(function, 1);
        self.push_int(function, char_count);
        self.builder_mut(function).tstore();

        // Field 2: length in bytes
        self.builder_mut(function).load(target);
        self.push_int(function, 2);
        self.push_int(function, byte_count);
        self.builder_mut(function).tstore();

        LineOutcome::Done
    }

    fn find_string32(&self) -> Option<(usize, usize)> {
        self.result
            .dependencies
            .iter()
            .enumerate()
            .find_map(|(dependency, module)| {
                module
                    .assembly
                    .find_structure("String32")
                    .map(|structure| (dependency, structure))
            })
    }
}
