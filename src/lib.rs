//! # Filament Template Compiler
//!
//! Compiles the Filament template dialect (elements, mustaches, block
//! expressions, modifiers, slots) into JavaScript expressions that build and
//! update a DOM tree against the runtime, with fine-grained reactivity.
//!
//! ## Pipeline Invariants
//!
//! 1. **Parse boundary**: lexical parsing happens upstream. The parsed tree
//!    enters through `ast` as serde structures; this crate never tokenizes
//!    template source.
//! 2. **Single traversal**: the visitor walks the tree once, producing the
//!    IR (`ir`). Every scope enter pairs with exactly one exit on every
//!    control-flow path; after a compile the tracker holds only the seeded
//!    bindings.
//! 3. **Reactivity lives in the lowerer**: the IR records what a value is,
//!    never whether it is wrapped. `lower` owns every compat-mode and
//!    reactive-getter rule.
//! 4. **One printer**: `serializer` is the only place generated text and
//!    source-map segments are produced; byte-identical output for identical
//!    input and options.
//! 5. **No global state**: counters, caches and scope live on
//!    `CompilerContext`. Parallel compiles of disjoint templates are safe by
//!    construction (`compile_batch`).
//! 6. **Author mistakes never throw**: they land in `CompileResult.errors`
//!    and `.warnings` with stable `E###`/`W###` codes.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod ast;
pub mod builder;
pub mod cache;
pub mod context;
pub mod diagnostics;
pub mod ir;
pub mod lower;
pub mod paths;
pub mod ranges;
pub mod scope;
pub mod serializer;
pub mod symbols;
pub mod visitor;

#[cfg(test)]
mod codegen_tests;

pub use cache::CompileCache;
pub use context::{
    compile, compile_batch, compile_json, BatchInput, CompileOptions, CompileOptionsInput,
    CompileResult, CompilerContext, Flags,
};
pub use diagnostics::{CompilerError, CompilerWarning, Diagnostic};
pub use ranges::SourceRange;
pub use serializer::{FormatOptions, MappingNode, SourceMap, SourceMapOptions};

#[cfg(feature = "napi")]
pub use context::{compile_batch_native, compile_template_native};

#[cfg(feature = "napi")]
#[napi]
pub fn compiler_bridge() -> String {
    "Filament Native Bridge Connected".to_string()
}
