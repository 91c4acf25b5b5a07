//! Compilation context and the public compile entry points.
//!
//! One `CompilerContext` owns everything mutable for one compilation: the
//! feature flags, the scope tracker, the source-range index, the diagnostic
//! bags and the two counters. Nothing is global, so callers may compile
//! independent templates in parallel with disjoint contexts — that is the
//! whole concurrency model.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ast::{Loc, Template};
use crate::builder as b;
use crate::diagnostics::{Diagnostic, DiagnosticsOptions};
use crate::lower;
use crate::ranges::{SourceRange, SourceRangeIndex};
use crate::scope::{Binding, BindingKind, ScopeTracker};
use crate::serializer::{
    base64_encode, build_source_map, FormatOptions, MappingNode, Serializer, SourceMap,
    SourceMapOptions,
};
use crate::visitor::Visitor;

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Flags {
    /// Reactive-getter wrapping of paths and `$_maybeHelper` fallback.
    #[serde(rename = "IS_GLIMMER_COMPAT_MODE")]
    pub is_glimmer_compat_mode: bool,
    /// Route known helper calls through `$_maybeHelper`.
    #[serde(rename = "WITH_HELPER_MANAGER")]
    pub with_helper_manager: bool,
    /// Route modifier calls through `$_maybeModifier`.
    #[serde(rename = "WITH_MODIFIER_MANAGER")]
    pub with_modifier_manager: bool,
    /// Append the context to `$_maybeHelper` calls for unknown names.
    #[serde(rename = "WITH_EVAL_SUPPORT")]
    pub with_eval_support: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Flags {
            is_glimmer_compat_mode: true,
            with_helper_manager: false,
            with_modifier_manager: false,
            with_eval_support: false,
        }
    }
}

pub type ComponentNameFn<'a> = dyn Fn(&str) -> String + 'a;
pub type LexicalScopeHook<'a> = dyn Fn(&str) -> bool + 'a;

pub struct CompileOptions<'a> {
    pub flags: Flags,
    /// Pre-populated known-binding set.
    pub bindings: HashSet<String>,
    pub filename: Option<String>,
    pub format: FormatOptions,
    pub source_map: SourceMapOptions,
    pub diagnostics: DiagnosticsOptions,
    pub customize_component_name: Option<&'a ComponentNameFn<'a>>,
    pub lexical_scope: Option<&'a LexicalScopeHook<'a>>,
}

impl<'a> Default for CompileOptions<'a> {
    fn default() -> Self {
        CompileOptions {
            flags: Flags::default(),
            bindings: HashSet::new(),
            filename: None,
            format: FormatOptions::default(),
            source_map: SourceMapOptions::default(),
            diagnostics: DiagnosticsOptions::default(),
            customize_component_name: None,
            lexical_scope: None,
        }
    }
}

/// Serde-friendly option surface for the JSON/N-API boundary (hooks cannot
/// cross it).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptionsInput {
    pub flags: Flags,
    pub bindings: Vec<String>,
    pub filename: Option<String>,
    pub format: FormatOptions,
    pub source_map: SourceMapOptions,
    pub diagnostics: DiagnosticsOptions,
}

impl CompileOptionsInput {
    pub fn to_options(&self) -> CompileOptions<'_> {
        CompileOptions {
            flags: self.flags,
            bindings: self.bindings.iter().cloned().collect(),
            filename: self.filename.clone(),
            format: self.format.clone(),
            source_map: self.source_map.clone(),
            diagnostics: self.diagnostics.clone(),
            customize_component_name: None,
            lexical_scope: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub code: String,
    pub mapping_tree: MappingNode,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// Binding names that resolved as known during this compile.
    pub bindings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<SourceMap>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

pub struct CompilerContext<'a> {
    pub source: &'a str,
    pub flags: Flags,
    pub filename: Option<String>,
    pub diagnostics_options: DiagnosticsOptions,
    pub index: SourceRangeIndex,
    pub scope: ScopeTracker<'a>,
    pub customize_component_name: Option<&'a ComponentNameFn<'a>>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// Names that resolved as known bindings during this compile.
    pub used_bindings: HashSet<String>,
    /// Visited-node spans; guards against re-visiting shared AST nodes.
    pub seen_nodes: HashSet<(u32, u32, u8)>,
    /// Depth of the current numbered context chain (`ctx1`, `ctx2`, …).
    pub context_depth: u32,
    pub let_block_counter: u32,
}

impl<'a> CompilerContext<'a> {
    pub fn new(source: &'a str, options: &CompileOptions<'a>) -> Self {
        let mut scope = ScopeTracker::new(options.lexical_scope);
        for name in &options.bindings {
            scope.add_binding(Binding::new(BindingKind::Component, name.clone()));
        }
        CompilerContext {
            source,
            flags: options.flags,
            filename: options.filename.clone(),
            diagnostics_options: options.diagnostics.clone(),
            index: SourceRangeIndex::new(source),
            scope,
            customize_component_name: options.customize_component_name,
            errors: Vec::new(),
            warnings: Vec::new(),
            used_bindings: HashSet::new(),
            seen_nodes: HashSet::new(),
            context_depth: 0,
            let_block_counter: 0,
        }
    }

    pub fn range_of(&self, loc: Option<&Loc>) -> Option<SourceRange> {
        loc.map(|l| self.index.range_of(l))
    }

    pub fn error(&mut self, code: &str, message: impl Into<String>, range: Option<SourceRange>) {
        let diag = self.make_diagnostic(code, message, range);
        self.errors.push(diag);
    }

    pub fn warn(&mut self, code: &str, message: impl Into<String>, range: Option<SourceRange>) {
        let diag = self.make_diagnostic(code, message, range);
        self.warnings.push(diag);
    }

    fn make_diagnostic(
        &self,
        code: &str,
        message: impl Into<String>,
        range: Option<SourceRange>,
    ) -> Diagnostic {
        let diag = Diagnostic::new(code, message);
        match range {
            Some(r) => diag.with_range(
                r,
                self.source,
                &self.index,
                &self.diagnostics_options,
                self.filename.as_deref(),
            ),
            None => diag,
        }
    }

    /// Adds bindings for the closure's duration; removal happens on every
    /// exit path of this function, so enter/exit always pair up.
    pub fn with_bindings<R>(
        &mut self,
        bindings: Vec<Binding>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let names: Vec<String> = bindings.iter().map(|b| b.name.clone()).collect();
        for binding in bindings {
            self.scope.add_binding(binding);
        }
        let result = f(self);
        for name in names.iter().rev() {
            self.scope.remove_binding(name);
        }
        result
    }

    /// Enters the next numbered child context (`ctx1`, `ctx2`, …).
    pub fn with_child_ctx<R>(&mut self, f: impl FnOnce(&mut Self, String) -> R) -> R {
        self.context_depth += 1;
        let name = format!("ctx{}", self.context_depth);
        let result = f(self, name);
        self.context_depth -= 1;
        result
    }

    /// Slot closures restart the numbered chain under a plain `ctx`.
    pub fn with_slot_ctx<R>(&mut self, f: impl FnOnce(&mut Self, String) -> R) -> R {
        let saved = self.context_depth;
        self.context_depth = 0;
        let result = f(self, "ctx".to_string());
        self.context_depth = saved;
        result
    }

    pub fn next_let_block_id(&mut self) -> u32 {
        let id = self.let_block_counter;
        self.let_block_counter += 1;
        id
    }

    /// Records a resolved name for the bindings audit. Template-local frames
    /// (block params, let rewrites) are not import-pruning material.
    pub fn record_used_binding(&mut self, name: &str) {
        let track = match self.scope.resolve(name) {
            Some(binding) => matches!(
                binding.kind,
                BindingKind::Component | BindingKind::Helper | BindingKind::Modifier
            ),
            // Known without a frame: a lexical-scope hit.
            None => true,
        };
        if track {
            self.used_bindings.insert(name.to_string());
        }
    }

    /// Marks a span/kind pair as visited; false when it was already seen.
    pub fn mark_seen(&mut self, range: Option<SourceRange>, kind: u8) -> bool {
        match range {
            Some(r) => self.seen_nodes.insert((r.start, r.end, kind)),
            None => true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILE
// ═══════════════════════════════════════════════════════════════════════════════

pub fn compile(source: &str, template: &Template, options: &CompileOptions<'_>) -> CompileResult {
    let mut ctx = CompilerContext::new(source, options);

    let children = Visitor::new(&mut ctx).visit_template(template);
    let built = lower::build_children(&mut ctx, &children, "this");

    let mut serializer = Serializer::new(options.format.clone());
    match built.len() {
        0 => serializer.serialize_expr(&b::array(vec![])),
        1 => serializer.serialize_expr(&built.into_iter().next().unwrap()),
        _ => serializer.serialize_expr(&b::formatted_array(built)),
    }
    let (mut code, mapping_tree) = serializer.finish();

    let source_map = if options.source_map.enabled {
        let map = build_source_map(
            &mapping_tree,
            source,
            &ctx.index,
            options.filename.as_deref(),
            &options.source_map,
        );
        if options.source_map.inline {
            let json = serde_json::to_string(&map).unwrap_or_default();
            code.push_str(&format!(
                "\n//# sourceMappingURL=data:application/json;base64,{}",
                base64_encode(json.as_bytes())
            ));
        }
        Some(map)
    } else {
        None
    };

    let mut bindings: Vec<String> = ctx.used_bindings.into_iter().collect();
    bindings.sort();

    CompileResult {
        code,
        mapping_tree,
        errors: ctx.errors,
        warnings: ctx.warnings,
        bindings,
        source_map,
    }
}

/// One unit of work for `compile_batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInput {
    pub source: String,
    pub template: Template,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Compiles independent templates in parallel, one context each.
pub fn compile_batch(inputs: &[BatchInput], options: &CompileOptionsInput) -> Vec<CompileResult> {
    inputs
        .par_iter()
        .map(|input| {
            let mut opts = options.to_options();
            if input.filename.is_some() {
                opts.filename = input.filename.clone();
            }
            compile(&input.source, &input.template, &opts)
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// N-API SURFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON-in/JSON-out compile for the N-API bridge and plugin tests.
pub fn compile_json(source: &str, ast_json: &str, options_json: &str) -> Result<String, String> {
    let template: Template = serde_json::from_str(ast_json)
        .map_err(|e| format!("Template deserialization failed: {}", e))?;
    let options_input: CompileOptionsInput = if options_json.trim().is_empty() {
        CompileOptionsInput::default()
    } else {
        serde_json::from_str(options_json)
            .map_err(|e| format!("Options deserialization failed: {}", e))?
    };
    let options = options_input.to_options();
    let result = compile(source, &template, &options);
    serde_json::to_string(&result).map_err(|e| format!("Result serialization failed: {}", e))
}

#[cfg(feature = "napi")]
#[napi_derive::napi]
pub fn compile_template_native(
    source: String,
    ast_json: String,
    options_json: String,
) -> napi::Result<String> {
    compile_json(&source, &ast_json, &options_json).map_err(|e| {
        eprintln!("[FilamentNative] compile failed: {}", e);
        napi::Error::from_reason(e)
    })
}

#[cfg(feature = "napi")]
#[napi_derive::napi]
pub fn compile_batch_native(inputs_json: String, options_json: String) -> napi::Result<String> {
    let inputs: Vec<BatchInput> = serde_json::from_str(&inputs_json)
        .map_err(|e| napi::Error::from_reason(format!("Batch deserialization failed: {}", e)))?;
    let options: CompileOptionsInput = serde_json::from_str(&options_json)
        .map_err(|e| napi::Error::from_reason(format!("Options deserialization failed: {}", e)))?;
    let results = compile_batch(&inputs, &options);
    serde_json::to_string(&results).map_err(|e| napi::Error::from_reason(e.to_string()))
}
