//! Multi-pass parser and resolver.
//!
//! The parser walks the token stream of one unit four times, each pass with
//! its own subset of productions enabled:
//!
//! 1. prototypes: structure, function and label declarations
//! 2. dependencies: `import` statements, loaded recursively
//! 3. fields: structure bodies
//! 4. instructions: function bodies, emitted through the builders
//!
//! Units pulled in through imports rerun the pipeline at a higher depth,
//! which cuts the pass list down: a direct import stops after fields, and
//! anything deeper only surfaces its prototypes. Line recovery is coarse on
//! purpose: a broken line abandons its production and parsing resumes at
//! the next newline, so one mistake harvests as many diagnostics as
//! possible without cascading.

mod fields;
mod instructions;
mod prototypes;

use super::assembly::{Assembly, Name};
use super::diagnostics::Diagnostics;
use super::tokens::{Token, TokenKind};
use crate::bytefile::FunctionTarget;
use crate::bytefile::builder::Builder;
use crate::settings;
use std::path::PathBuf;

/// What a pass-specific line handler did with the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// A production was recognized; stray tokens before the newline are an
    /// error.
    Done,
    /// A production was recognized but failed; the rest of the line is
    /// skipped without further complaints.
    Failed,
    /// The line belongs to another pass.
    Skipped,
}

pub struct ParseOutput {
    pub assembly: Assembly,
    pub diagnostics: Diagnostics,
}

pub struct Parser {
    pub(crate) path: PathBuf,
    pub(crate) tokens: Vec<Token>,
    pub(crate) cursor: usize,
    pub(crate) empty_token: Token,

    pub(crate) current_structure: Option<usize>,
    pub(crate) current_function: Option<usize>,

    pub(crate) result: Assembly,
    pub(crate) diagnostics: Diagnostics,

    pub(crate) depth: u32,
    pub(crate) import_dirs: Vec<PathBuf>,
    pub(crate) import_chain: Vec<PathBuf>,
}

impl Parser {
    pub fn new(
        path: PathBuf,
        tokens: Vec<Token>,
        diagnostics: Diagnostics,
        depth: u32,
        import_dirs: Vec<PathBuf>,
        import_chain: Vec<PathBuf>,
    ) -> Self {
        Parser {
            path,
            tokens,
            cursor: 0,
            empty_token: Token::empty(0),
            current_structure: None,
            current_function: None,
            result: Assembly::new(),
            diagnostics,
            depth,
            import_dirs,
            import_chain,
        }
    }

    pub fn parse(mut self) -> ParseOutput {
        if !self.run_pass(Self::parse_prototypes, true) {
            return self.into_output();
        }
        self.reset_state();

        // Depth decides how much of an imported unit its importer needs:
        // a transitive import only contributes prototypes.
        if self.depth >= 2 {
            return self.into_output();
        }

        if !self.run_pass(Self::parse_dependencies, false) {
            return self.into_output();
        }
        self.reset_state();

        if !self.run_pass(Self::parse_fields_pass, false) {
            return self.into_output();
        }
        self.reset_state();

        // A direct import never runs its instruction bodies, callers only
        // need the public surface.
        if self.depth >= 1 {
            return self.into_output();
        }

        self.run_pass(Self::parse_instructions_pass, false);
        self.into_output()
    }

    fn into_output(self) -> ParseOutput {
        ParseOutput {
            assembly: self.result,
            diagnostics: self.diagnostics,
        }
    }

    fn run_pass(&mut self, line_handler: fn(&mut Self) -> LineOutcome, is_first: bool) -> bool {
        let mut has_error = false;

        self.cursor = 0;
        while self.cursor < self.tokens.len() {
            self.empty_token.line = self.tokens[self.cursor].line;
            let outcome = line_handler(self);
            has_error |= self.next_line(outcome);
        }

        if is_first {
            if self.depth == 0 && !self.result.has_function(settings::ENTRY_POINT_NAME) {
                self.diagnostics
                    .error_without_line("There is no 'entrypoint' procedure.");
                has_error = true;
            }
            self.generate_builders();
        }

        !has_error
    }

    fn reset_state(&mut self) {
        self.cursor = 0;
        self.current_structure = None;
        self.current_function = None;
    }

    /// Once every prototype of the unit is known, each function gets its
    /// builder, every label is reserved against it and every parameter is
    /// bound to its argument slot.
    fn generate_builders(&mut self) {
        for function in &mut self.result.functions {
            let target = match function.index {
                Some(index) => FunctionTarget::Function(index),
                None => FunctionTarget::EntryPoint,
            };
            let mut builder = Builder::new(target, function.parameter_count);

            for label in &mut function.labels {
                label.index = Some(builder.reserve_label(&label.name));
            }
            for (slot, parameter) in function.local_variables.iter_mut().enumerate() {
                parameter.index = Some(builder.get_argument(slot as u16));
            }

            function.builder = Some(builder);
        }
    }

    // ------------------------------------------------------------------
    //         Cursor plumbing
    // ------------------------------------------------------------------

    pub(crate) fn token(&self, index: usize) -> &Token {
        self.tokens.get(index).unwrap_or(&self.empty_token)
    }

    pub(crate) fn current(&self) -> &Token {
        self.token(self.cursor)
    }

    pub(crate) fn peek_kind(&self, offset: usize) -> TokenKind {
        self.token(self.cursor + offset).kind
    }

    pub(crate) fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        if self.current().kind == kind {
            let token = self.current().clone();
            self.cursor += 1;
            Some(token)
        } else {
            None
        }
    }

    pub(crate) fn accept_any(&mut self, kinds: &[TokenKind]) -> Option<Token> {
        if kinds.contains(&self.current().kind) {
            let token = self.current().clone();
            self.cursor += 1;
            Some(token)
        } else {
            None
        }
    }

    pub(crate) fn at_line_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::None | TokenKind::NewLine)
    }

    /// Skips to the start of the next line. Tokens left over after a
    /// successful production are reported once; a failed production eats
    /// them silently. Returns whether this line counts as an error.
    fn next_line(&mut self, outcome: LineOutcome) -> bool {
        let stray_line = self.current().line;
        let mut has_stray_tokens = false;
        while !self.at_line_end() {
            self.cursor += 1;
            has_stray_tokens = true;
        }
        self.cursor += 1; // step over the newline

        if has_stray_tokens && outcome == LineOutcome::Done {
            self.diagnostics
                .error(stray_line, "Unexpected tokens before end-of-line.");
            return true;
        }
        outcome == LineOutcome::Failed
    }

    // ------------------------------------------------------------------
    //         Diagnostics
    // ------------------------------------------------------------------

    pub(crate) fn info(&mut self, text: impl Into<String>) {
        let line = self.current().line;
        self.diagnostics.info(line, text);
    }

    pub(crate) fn warning(&mut self, text: impl Into<String>) {
        let line = self.current().line;
        self.diagnostics.warning(line, text);
    }

    pub(crate) fn error(&mut self, text: impl Into<String>) {
        let line = self.current().line;
        self.diagnostics.error(line, text);
    }

    // ------------------------------------------------------------------
    //         Shared name plumbing
    // ------------------------------------------------------------------

    /// Reads `segment (. segment)*` and returns the joined dotted name.
    /// Consumes nothing when the leading segment is missing, and leaves a
    /// trailing dot unconsumed for the stray-token check to flag.
    pub(crate) fn parse_dotted_word(&mut self, allow_type_keywords: bool) -> Option<String> {
        let accepts = |kind: TokenKind| {
            kind == TokenKind::Identifier || (allow_type_keywords && kind.is_type_keyword())
        };

        if !accepts(self.current().kind) {
            return None;
        }
        let mut full = self.current().word.clone();
        self.cursor += 1;

        while self.current().kind == TokenKind::Dot && accepts(self.peek_kind(1)) {
            self.cursor += 1;
            full.push('.');
            full.push_str(&self.token(self.cursor).word.clone());
            self.cursor += 1;
        }

        Some(full)
    }

    pub(crate) fn parse_symbol_name(&mut self) -> Option<Name> {
        self.parse_dotted_word(false).map(Name::split_last)
    }

    pub(crate) fn parse_field_name(&mut self) -> Option<Name> {
        self.parse_dotted_word(false).map(Name::split_before_field)
    }

    // ------------------------------------------------------------------
    //         Context switching for later passes
    // ------------------------------------------------------------------

    // The declarations were all registered in the first pass, later passes
    // only move the structure/function cursor along.

    pub(crate) fn ignore_structure(&mut self) -> LineOutcome {
        let name = self.current().word.clone();
        self.current_structure = self.result.find_structure(&name);
        self.current_function = None;
        self.cursor += 2; // name and ':'
        LineOutcome::Done
    }

    pub(crate) fn ignore_function(&mut self) -> LineOutcome {
        let name = self.current().word.clone();
        self.current_structure = None;
        self.current_function = self.result.find_function(&name);

        while !self.at_line_end() {
            if self.accept(TokenKind::Colon).is_some() {
                break;
            }
            self.cursor += 1;
        }
        LineOutcome::Done
    }

    pub(crate) fn ignore_label(&mut self) -> LineOutcome {
        self.cursor += 2; // name and ':'
        LineOutcome::Done
    }

    pub(crate) fn builder_mut(&mut self, function: usize) -> &mut Builder {
        self.result.functions[function]
            .builder
            .as_mut()
            .expect("builders exist after the first pass")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::lexer::tokenize;

    fn parse_source(source: &str) -> ParseOutput {
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
    }

    #[test]
    fn declarations_survive_in_order() {
        let output = parse_source(
            "struct Pair:\n\
             int first\n\
             int second\n\
             proc entrypoint:\n\
             ret\n\
             func add(a, b):\n\
             ret\n",
        );

        assert!(!output.diagnostics.has_error());
        assert_eq!(output.assembly.structures[0].name, "Pair");
        assert_eq!(output.assembly.functions[0].name, "entrypoint");
        assert_eq!(output.assembly.functions[1].name, "add");
        assert_eq!(output.assembly.functions[1].parameter_count, 2);
    }

    #[test]
    fn missing_entrypoint_is_reported_once() {
        let output = parse_source("func helper:\nret\n");
        let rendered = output.diagnostics.render();
        assert_eq!(
            rendered
                .matches("There is no 'entrypoint' procedure.")
                .count(),
            1
        );
    }

    #[test]
    fn stray_tokens_after_a_production_are_one_error() {
        let output = parse_source("proc entrypoint: 5 5\nret\n");
        let rendered = output.diagnostics.render();
        assert_eq!(
            rendered
                .matches("Unexpected tokens before end-of-line.")
                .count(),
            1
        );
    }

    #[test]
    fn labels_reserve_in_pass_one_and_bind_in_pass_four() {
        let output = parse_source(
            "proc entrypoint:\n\
             start:\n\
             jmp exit\n\
             exit:\n\
             ret\n",
        );

        assert!(!output.diagnostics.has_error());
        let entry = &output.assembly.functions[0];
        assert_eq!(entry.labels.len(), 2);
        assert!(entry.labels.iter().all(|label| label.index.is_some()));
    }
}
