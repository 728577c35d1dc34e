//! Accumulating diagnostic sink for one compile unit.
//!
//! Every message is keyed by the unit's file path and, usually, a line
//! number. Messages are never fatal on their own: the pipeline keeps going
//! to harvest as much as it can from a broken unit, and the driver refuses
//! to emit an artifact once any error severity has been recorded.

use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub severity: Severity,
    pub line: Option<u32>,
    pub text: String,
}

#[derive(Debug)]
enum Entry {
    Message(Message),
    // Pre-rendered output of an imported unit, passed through verbatim
    Imported(String),
}

#[derive(Debug)]
pub struct Diagnostics {
    path: String,
    entries: Vec<Entry>,
    has_error: bool,
    has_warning: bool,
    has_info: bool,
}

impl Diagnostics {
    pub fn new(path: impl Into<String>) -> Self {
        Diagnostics {
            path: path.into(),
            entries: Vec::new(),
            has_error: false,
            has_warning: false,
            has_info: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn info(&mut self, line: u32, text: impl Into<String>) {
        self.push(Severity::Info, Some(line), text.into());
    }

    pub fn warning(&mut self, line: u32, text: impl Into<String>) {
        self.push(Severity::Warning, Some(line), text.into());
    }

    pub fn error(&mut self, line: u32, text: impl Into<String>) {
        self.push(Severity::Error, Some(line), text.into());
    }

    pub fn error_without_line(&mut self, text: impl Into<String>) {
        self.push(Severity::Error, None, text.into());
    }

    fn push(&mut self, severity: Severity, line: Option<u32>, text: String) {
        match severity {
            Severity::Info => self.has_info = true,
            Severity::Warning => self.has_warning = true,
            Severity::Error => self.has_error = true,
        }
        self.entries.push(Entry::Message(Message {
            severity,
            line,
            text,
        }));
    }

    /// Splices the rendered output of an imported unit into this sink,
    /// keeping its position between this unit's own messages.
    pub fn append_rendered(&mut self, rendered: String, had_error: bool) {
        if rendered.is_empty() {
            return;
        }
        self.has_error |= had_error;
        self.entries.push(Entry::Imported(rendered));
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn has_message(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Message(message) => Some(message),
            Entry::Imported(_) => None,
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                Entry::Message(message) => {
                    let _ = write!(out, "In file '{}':\n    {}: ", self.path, message.severity.label());
                    if let Some(line) = message.line {
                        let _ = write!(out, "Line {}, ", line);
                    }
                    out.push_str(&message.text);
                    out.push('\n');
                }
                Entry::Imported(rendered) => out.push_str(rendered),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_render_with_file_and_line() {
        let mut diagnostics = Diagnostics::new("main.sba");
        diagnostics.error(3, "Duplicated structure name 'Pair'.");

        assert_eq!(
            diagnostics.render(),
            "In file 'main.sba':\n    Error: Line 3, Duplicated structure name 'Pair'.\n"
        );
        assert!(diagnostics.has_error());
    }

    #[test]
    fn line_free_errors_omit_the_line_part() {
        let mut diagnostics = Diagnostics::new("main.sba");
        diagnostics.error_without_line("There is no 'entrypoint' procedure.");

        assert_eq!(
            diagnostics.render(),
            "In file 'main.sba':\n    Error: There is no 'entrypoint' procedure.\n"
        );
    }

    #[test]
    fn imported_output_is_spliced_verbatim() {
        let mut diagnostics = Diagnostics::new("main.sba");
        diagnostics.error(1, "Failed to compile imported module 'util.sba'.");
        diagnostics.append_rendered(
            "In file 'util.sba':\n    Error: Line 2, Unknown mnemonic 'reet'.\n".to_owned(),
            true,
        );

        let rendered = diagnostics.render();
        assert!(rendered.contains("In file 'main.sba'"));
        assert!(rendered.contains("In file 'util.sba'"));
        assert!(rendered.ends_with("Unknown mnemonic 'reet'.\n"));
    }
}
