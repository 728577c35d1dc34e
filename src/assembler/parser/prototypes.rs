use super::{LineOutcome, Parser};
use crate::assembler::assembly::{Function, Label, LocalVariable, Structure};
use crate::assembler::tokens::TokenKind;
use crate::settings;

impl Parser {
    /// Pass 1 line dispatch. Field and instruction lines belong to later
    /// passes and are skipped without complaint.
    pub(crate) fn parse_prototypes(&mut self) -> LineOutcome {
        if self.current().kind == TokenKind::ImportKeyword {
            return LineOutcome::Skipped;
        }
        if self.accept(TokenKind::StructKeyword).is_some() {
            return self.parse_structure_declaration();
        }
        if let Some(keyword) =
            self.accept_any(&[TokenKind::FuncKeyword, TokenKind::ProcKeyword])
        {
            return self.parse_function_declaration(keyword.kind == TokenKind::FuncKeyword);
        }
        if self.peek_kind(1) == TokenKind::Colon {
            return self.parse_label_declaration();
        }
        LineOutcome::Skipped
    }

    fn parse_structure_declaration(&mut self) -> LineOutcome {
        let Some(name_token) = self.accept(TokenKind::Identifier) else {
            if self.at_line_end() {
                self.error("Unexpected end-of-line.");
            } else if self.current().kind == TokenKind::Colon {
                self.error("Required structure name.");
            } else {
                self.error("Invalid structure name.");
            }
            return LineOutcome::Failed;
        };

        if self.accept(TokenKind::Colon).is_none() {
            self.error("Expected ':' after structure name.");
            return LineOutcome::Failed;
        }

        let mut outcome = LineOutcome::Done;
        if self.result.has_structure(&name_token.word) {
            self.error(format!("Duplicated structure name '{}'.", name_token.word));
            outcome = LineOutcome::Failed;
        }

        let index = self.result.byte_file.add_structure(&name_token.word);
        self.result
            .structures
            .push(Structure::new(name_token.word, index));

        self.current_structure = Some(self.result.structures.len() - 1);
        self.current_function = None;
        outcome
    }

    fn parse_function_declaration(&mut self, has_result: bool) -> LineOutcome {
        let Some(name_token) = self.accept(TokenKind::Identifier) else {
            if self.at_line_end() {
                self.error("Unexpected end-of-line.");
            } else if self.current().kind == TokenKind::Colon {
                self.error("Required function or procedure name.");
            } else {
                self.error("Invalid function or procedure name.");
            }
            return LineOutcome::Failed;
        };

        let Some(opener) =
            self.accept_any(&[TokenKind::Colon, TokenKind::LeftParenthesis])
        else {
            self.error("Expected ':' after function or procedure name.");
            return LineOutcome::Failed;
        };

        let mut has_error = false;
        let mut parameters: Vec<String> = Vec::new();

        if opener.kind == TokenKind::LeftParenthesis {
            let mut before: Option<TokenKind> = None;
            loop {
                if self.at_line_end() {
                    self.error("Unexpected end-of-line.");
                    return LineOutcome::Failed;
                }
                if self.accept(TokenKind::RightParenthesis).is_some() {
                    break;
                }

                if let Some(parameter) = self.accept(TokenKind::Identifier) {
                    if before == Some(TokenKind::Identifier) {
                        self.error("Expected ',' after parameter name.");
                        has_error = true;
                    } else {
                        parameters.push(parameter.word);
                    }
                    before = Some(TokenKind::Identifier);
                } else if self.accept(TokenKind::Comma).is_some() {
                    match before {
                        None => {
                            self.error("Expected ')' after '('.");
                            has_error = true;
                        }
                        Some(TokenKind::Comma) => {
                            self.error("Expected parameter name after ','.");
                            has_error = true;
                        }
                        _ => {}
                    }
                    before = Some(TokenKind::Comma);
                } else {
                    match before {
                        None => self.error("Expected ')' after '('."),
                        Some(TokenKind::Identifier) => {
                            self.error("Expected ')' after parameter name.")
                        }
                        _ => self.error("Expected parameter name after ','."),
                    }
                    self.cursor += 1;
                    has_error = true;
                }
            }

            let mut sorted = parameters.clone();
            sorted.sort();
            if let Some(duplicate) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
                self.error(format!("Duplicated parameter name '{}'.", duplicate[0]));
                has_error = true;
            }

            if self.accept(TokenKind::Colon).is_none() {
                self.error("Expected ':' after ')'.");
                return LineOutcome::Failed;
            }
        }

        if self.result.has_function(&name_token.word) {
            self.error(format!(
                "Duplicated function or procedure name '{}'.",
                name_token.word
            ));
            has_error = true;
        }

        let mut index = None;
        if name_token.word == settings::ENTRY_POINT_NAME {
            if has_result {
                self.error("Invalid function name 'entrypoint'.");
                self.info("It can be used only for procedure.");
                has_error = true;
            }
            if self.depth > 0 {
                self.error("Procedure 'entrypoint' cannot be declared in an imported module.");
                has_error = true;
            }
        } else {
            index = Some(
                self.result
                    .byte_file
                    .add_function(parameters.len() as u16, has_result),
            );
        }

        let parameter_count = parameters.len() as u16;
        let local_variables = parameters
            .into_iter()
            .map(|name| LocalVariable { name, index: None })
            .collect();

        self.result.functions.push(Function {
            builder: None,
            name: name_token.word,
            index,
            labels: Vec::new(),
            local_variables,
            parameter_count,
            has_result,
            extern_index: None,
            mapped_index: None,
        });

        self.current_structure = None;
        self.current_function = Some(self.result.functions.len() - 1);

        if has_error {
            LineOutcome::Failed
        } else {
            LineOutcome::Done
        }
    }

    fn parse_label_declaration(&mut self) -> LineOutcome {
        let Some(name_token) = self.accept(TokenKind::Identifier) else {
            self.error("Invalid label name.");
            return LineOutcome::Failed;
        };
        let Some(function) = self.current_function else {
            self.error("Not belonged label.");
            return LineOutcome::Failed;
        };

        let mut outcome = LineOutcome::Done;
        if self.result.functions[function].has_label(&name_token.word) {
            self.error(format!("Duplicated label name '{}'.", name_token.word));
            outcome = LineOutcome::Failed;
        }

        self.result.functions[function].labels.push(Label {
            name: name_token.word,
            index: None,
        });
        self.cursor += 1; // the ':'
        outcome
    }
}

#[cfg(test)]
mod tests {
    use crate::assembler::lexer::tokenize;
    use crate::assembler::parser::Parser;
    use std::path::PathBuf;

    fn messages(source: &str) -> String {
        let (tokens, diagnostics) = tokenize(source, "test.sba");
        Parser::new(
            PathBuf::from("test.sba"),
            tokens,
            diagnostics,
            0,
            Vec::new(),
            Vec::new(),
        )
        .parse()
        .diagnostics
        .render()
    }

    #[test]
    fn duplicate_declarations_are_flagged_once_each() {
        let rendered = messages(
            "struct Pair:\n\
             struct Pair:\n\
             proc entrypoint:\n\
             ret\n",
        );
        assert_eq!(rendered.matches("Duplicated structure name 'Pair'.").count(), 1);

        let rendered = messages(
            "proc entrypoint:\n\
             ret\n\
             func f(a, a):\n\
             ret\n",
        );
        assert_eq!(rendered.matches("Duplicated parameter name 'a'.").count(), 1);

        let rendered = messages(
            "proc entrypoint:\n\
             L:\n\
             L:\n\
             ret\n",
        );
        assert_eq!(rendered.matches("Duplicated label name 'L'.").count(), 1);
    }

    #[test]
    fn entrypoint_must_be_a_procedure() {
        let rendered = messages("func entrypoint:\nret\n");
        assert!(rendered.contains("Invalid function name 'entrypoint'."));
        assert!(rendered.contains("It can be used only for procedure."));
    }

    #[test]
    fn labels_need_an_enclosing_function() {
        let rendered = messages("orphan:\nproc entrypoint:\nret\n");
        assert!(rendered.contains("Not belonged label."));
    }
}
