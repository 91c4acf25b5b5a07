//! Compiler diagnostics.
//!
//! Template-author mistakes never abort the pipeline: they are recorded in
//! the context's error/warning bags and returned on `CompileResult`. The
//! `E###`/`W###` codes are stable identifiers the tooling keys on.

use serde::{Deserialize, Serialize};

use crate::ranges::{SourceRange, SourceRangeIndex};

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

/// Block expression without a positional argument.
pub const ERR_BLOCK_WITHOUT_PARAMS: &str = "E001";
/// A runtime-tag element reached the plain-element lowering path.
pub const ERR_RUNTIME_TAG_AS_ELEMENT: &str = "E002";
/// Runtime tag with an empty symbol.
pub const ERR_EMPTY_RUNTIME_TAG: &str = "E003";

/// Unknown binding fell back to runtime helper resolution.
pub const WARN_UNKNOWN_BINDING: &str = "W001";
/// Block param or let binding shadows a reserved runtime name.
pub const WARN_RESERVED_BINDING: &str = "W002";
/// `@index` used as a list key; downgraded to `@identity`.
pub const WARN_INDEX_KEY: &str = "W003";

fn hint_for(code: &str) -> Option<&'static str> {
    match code {
        ERR_BLOCK_WITHOUT_PARAMS => {
            Some("Block expressions take at least one positional argument, e.g. {{#if this.flag}}.")
        }
        WARN_UNKNOWN_BINDING => {
            Some("Declare the name in scope or pass it through the `bindings` option.")
        }
        WARN_RESERVED_BINDING => Some("Pick a name that does not collide with runtime identifiers."),
        WARN_INDEX_KEY => Some("Use key=\"@identity\" or a stable item property instead."),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_range: Option<SourceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

pub type CompilerError = Diagnostic;
pub type CompilerWarning = Diagnostic;

/// Rendering knobs surfaced through `CompileOptions.diagnostics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosticsOptions {
    /// Source lines of context above and below the offending line.
    pub context_lines: u32,
    /// Added to reported line numbers (templates embedded in larger files).
    pub base_offset: u32,
}

impl Default for DiagnosticsOptions {
    fn default() -> Self {
        DiagnosticsOptions {
            context_lines: 2,
            base_offset: 0,
        }
    }
}

impl Diagnostic {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            code: code.to_string(),
            message: message.into(),
            source_range: None,
            line: None,
            column: None,
            snippet: None,
            pointer: None,
            hint: hint_for(code).map(str::to_string),
            lexical_context: None,
            filename: None,
        }
    }

    /// Attach a source range and render snippet/pointer lines around it.
    pub fn with_range(
        mut self,
        range: SourceRange,
        source: &str,
        index: &SourceRangeIndex,
        opts: &DiagnosticsOptions,
        filename: Option<&str>,
    ) -> Self {
        let (line, column) = index.position_of(range.start);
        self.source_range = Some(range);
        self.line = Some(line + opts.base_offset);
        self.column = Some(column);
        self.filename = filename.map(str::to_string);

        let first = line.saturating_sub(opts.context_lines).max(1);
        let last = (line + opts.context_lines).min(index.line_count());
        let mut snippet = String::new();
        for l in first..=last {
            if let Some(text) = index.line_text(source, l) {
                if !snippet.is_empty() {
                    snippet.push('\n');
                }
                snippet.push_str(&format!("{:>4} | {}", l + opts.base_offset, text));
            }
        }
        if !snippet.is_empty() {
            self.snippet = Some(snippet);
        }

        let caret_width = range.len().max(1) as usize;
        self.pointer = Some(format!(
            "{}^{}",
            " ".repeat(column as usize),
            "~".repeat(caret_width.saturating_sub(1))
        ));
        self
    }

    pub fn with_lexical_context(mut self, context: impl Into<String>) -> Self {
        self.lexical_context = Some(context.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_snippet_and_pointer() {
        let source = "line one\n{{bogus}}\nline three";
        let index = SourceRangeIndex::new(source);
        let diag = Diagnostic::new(WARN_UNKNOWN_BINDING, "Unknown binding \"bogus\".").with_range(
            SourceRange::new(11, 16),
            source,
            &index,
            &DiagnosticsOptions::default(),
            Some("demo.hbs"),
        );

        assert_eq!(diag.line, Some(2));
        assert_eq!(diag.column, Some(2));
        assert_eq!(diag.filename.as_deref(), Some("demo.hbs"));
        let snippet = diag.snippet.unwrap();
        assert!(snippet.contains("{{bogus}}"));
        assert!(snippet.contains("line one"));
        assert_eq!(diag.pointer.as_deref(), Some("  ^~~~~"));
        assert!(diag.hint.is_some());
    }

    #[test]
    fn base_offset_shifts_lines() {
        let source = "{{x}}";
        let index = SourceRangeIndex::new(source);
        let opts = DiagnosticsOptions {
            context_lines: 0,
            base_offset: 10,
        };
        let diag = Diagnostic::new(WARN_UNKNOWN_BINDING, "m").with_range(
            SourceRange::new(2, 3),
            source,
            &index,
            &opts,
            None,
        );
        assert_eq!(diag.line, Some(11));
    }
}
