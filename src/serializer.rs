//! JS AST printer with simultaneous source-map accumulation.
//!
//! One recursive pass over the builder tree produces the output text, a
//! mapping tree (generated position → template byte range, nested by node),
//! and — on demand — a V3 source map. Formatting is driven by per-node
//! `formatted` flags and the `FormatOptions`; serializing the same tree with
//! the same options twice yields byte-identical output.

use serde::{Deserialize, Serialize};

use crate::builder::{ArrowBody, JsExpr, JsStmt};
use crate::paths::is_safe_identifier;
use crate::ranges::{SourceRange, SourceRangeIndex};
use crate::symbols::PURE_FUNCTIONS;

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatOptions {
    pub enabled: bool,
    pub indent: u32,
    pub base_indent: u32,
    pub newline: String,
    pub emit_pure: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            enabled: false,
            indent: 2,
            base_indent: 0,
            newline: "\n".to_string(),
            emit_pure: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceMapOptions {
    pub enabled: bool,
    pub inline: bool,
    pub include_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAPPING TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// One generated span mapped back to a template byte range. Children nest in
/// emission order, mirroring the builder tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingNode {
    /// 0-based generated line.
    pub gen_line: u32,
    /// 0-based generated column.
    pub gen_column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<MappingNode>,
}

impl MappingNode {
    fn root() -> Self {
        MappingNode {
            gen_line: 0,
            gen_column: 0,
            source: None,
            name: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Serializer {
    opts: FormatOptions,
    out: String,
    line: u32,
    column: u32,
    indent_level: u32,
    /// Stack of open mapping nodes; index 0 is the root.
    mapping_stack: Vec<MappingNode>,
}

impl Serializer {
    pub fn new(opts: FormatOptions) -> Self {
        Serializer {
            opts,
            out: String::new(),
            line: 0,
            column: 0,
            indent_level: 0,
            mapping_stack: vec![MappingNode::root()],
        }
    }

    pub fn finish(mut self) -> (String, MappingNode) {
        while self.mapping_stack.len() > 1 {
            let node = self.mapping_stack.pop().unwrap();
            self.mapping_stack.last_mut().unwrap().children.push(node);
        }
        (self.out, self.mapping_stack.pop().unwrap())
    }

    pub fn serialize_expr(&mut self, expr: &JsExpr) {
        self.emit(expr);
    }

    pub fn serialize_stmts(&mut self, stmts: &[JsStmt]) {
        for (i, stmt) in stmts.iter().enumerate() {
            if i > 0 {
                self.newline();
            }
            self.emit_stmt(stmt);
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // low-level output
    // ───────────────────────────────────────────────────────────────────────

    fn write(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        if self.opts.enabled {
            let nl = self.opts.newline.clone();
            self.write(&nl);
            let pad = ((self.opts.base_indent + self.indent_level) * self.opts.indent) as usize;
            self.write(&" ".repeat(pad));
        } else {
            self.write(" ");
        }
    }

    fn open_mapping(&mut self, source: Option<SourceRange>, name: Option<String>) {
        self.mapping_stack.push(MappingNode {
            gen_line: self.line,
            gen_column: self.column,
            source,
            name,
            children: Vec::new(),
        });
    }

    fn close_mapping(&mut self) {
        let node = self.mapping_stack.pop().unwrap();
        self.mapping_stack.last_mut().unwrap().children.push(node);
    }

    // ───────────────────────────────────────────────────────────────────────
    // expressions
    // ───────────────────────────────────────────────────────────────────────

    fn emit(&mut self, expr: &JsExpr) {
        match expr {
            JsExpr::Num(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    self.write(&format!("{}", *n as i64));
                } else {
                    self.write(&format!("{}", n));
                }
            }
            JsExpr::Str {
                value,
                single,
                range,
            } => {
                if range.is_some() {
                    self.open_mapping(*range, None);
                }
                if *single {
                    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
                    self.write(&format!("'{}'", escaped));
                } else {
                    self.write(&serde_json::to_string(value).unwrap_or_default());
                }
                if range.is_some() {
                    self.close_mapping();
                }
            }
            JsExpr::Bool(b) => self.write(if *b { "true" } else { "false" }),
            JsExpr::Null => self.write("null"),
            JsExpr::Undefined => self.write("undefined"),
            JsExpr::Ident {
                name,
                mapping_name,
                range,
            }
            | JsExpr::RuntimeRef {
                name,
                mapping_name,
                range,
            } => {
                if range.is_some() || mapping_name.is_some() {
                    self.open_mapping(*range, mapping_name.clone());
                    self.write(name);
                    self.close_mapping();
                } else {
                    self.write(name);
                }
            }
            JsExpr::Member {
                object,
                property,
                computed,
                optional,
                range,
            } => {
                if range.is_some() {
                    self.open_mapping(*range, None);
                }
                self.emit_wrapped(object);
                if *computed {
                    if *optional {
                        self.write("?.");
                    }
                    self.write("[");
                    if property.chars().all(|c| c.is_ascii_digit()) && !property.is_empty() {
                        self.write(property);
                    } else {
                        self.write(&serde_json::to_string(property).unwrap_or_default());
                    }
                    self.write("]");
                } else {
                    self.write(if *optional { "?." } else { "." });
                    self.write(property);
                }
                if range.is_some() {
                    self.close_mapping();
                }
            }
            JsExpr::Call {
                callee,
                args,
                formatted,
                range,
            } => {
                if range.is_some() {
                    self.open_mapping(*range, None);
                }
                if self.opts.emit_pure && is_pure_callee(callee) {
                    self.write("/*#__PURE__*/");
                }
                self.emit_wrapped(callee);
                self.emit_list("(", args, ")", *formatted);
                if range.is_some() {
                    self.close_mapping();
                }
            }
            JsExpr::Arrow { params, body } => {
                self.write("(");
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.write(p);
                }
                self.write(") => ");
                match body {
                    ArrowBody::Expr(e) => {
                        if matches!(**e, JsExpr::Object { .. }) {
                            self.write("(");
                            self.emit(e);
                            self.write(")");
                        } else {
                            self.emit(e);
                        }
                    }
                    ArrowBody::Block(stmts) => self.emit_block(stmts),
                }
            }
            JsExpr::Array { items, formatted } => {
                self.emit_list("[", items, "]", *formatted);
            }
            JsExpr::Object { props, formatted } => {
                if props.is_empty() {
                    self.write("{}");
                    return;
                }
                self.write("{");
                if *formatted && self.opts.enabled {
                    self.indent_level += 1;
                    for (i, (key, value)) in props.iter().enumerate() {
                        if i > 0 {
                            self.write(",");
                        }
                        self.newline();
                        self.emit_object_key(key);
                        self.write(": ");
                        self.emit(value);
                    }
                    self.indent_level -= 1;
                    self.newline();
                } else {
                    for (i, (key, value)) in props.iter().enumerate() {
                        if i > 0 {
                            self.write(", ");
                        }
                        self.emit_object_key(key);
                        self.write(": ");
                        self.emit(value);
                    }
                }
                self.write("}");
            }
            JsExpr::Spread(inner) => {
                self.write("...");
                self.emit_wrapped(inner);
            }
            JsExpr::Binary { op, left, right } => {
                self.emit_wrapped(left);
                self.write(&format!(" {} ", op));
                self.emit_wrapped(right);
            }
            JsExpr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.emit_wrapped(test);
                self.write(" ? ");
                self.emit_wrapped(consequent);
                self.write(" : ");
                self.emit_wrapped(alternate);
            }
            JsExpr::Raw(code) => self.write(code),
            JsExpr::ReactiveGetter { value, range } => {
                if range.is_some() {
                    self.open_mapping(*range, None);
                }
                self.write("() => ");
                if matches!(**value, JsExpr::Object { .. }) {
                    self.write("(");
                    self.emit(value);
                    self.write(")");
                } else {
                    self.emit(value);
                }
                if range.is_some() {
                    self.close_mapping();
                }
            }
            JsExpr::Iife { body } => {
                self.write("(() => ");
                self.emit_block(body);
                self.write(")()");
            }
        }
    }

    /// Parenthesizes operands whose printed form would re-associate.
    fn emit_wrapped(&mut self, expr: &JsExpr) {
        let needs_parens = matches!(
            expr,
            JsExpr::Arrow { .. } | JsExpr::Conditional { .. } | JsExpr::Binary { .. }
        );
        if needs_parens {
            self.write("(");
            self.emit(expr);
            self.write(")");
        } else {
            self.emit(expr);
        }
    }

    fn emit_object_key(&mut self, key: &str) {
        if is_safe_identifier(key) {
            self.write(key);
        } else {
            self.write(&serde_json::to_string(key).unwrap_or_default());
        }
    }

    fn emit_list(&mut self, open: &str, items: &[JsExpr], close: &str, formatted: bool) {
        self.write(open);
        if items.is_empty() {
            self.write(close);
            return;
        }
        if formatted && self.opts.enabled {
            self.indent_level += 1;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    self.write(",");
                }
                self.newline();
                self.emit(item);
            }
            self.indent_level -= 1;
            self.newline();
        } else {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.emit(item);
            }
        }
        self.write(close);
    }

    fn emit_block(&mut self, stmts: &[JsStmt]) {
        self.write("{");
        self.indent_level += 1;
        for stmt in stmts {
            self.newline();
            self.emit_stmt(stmt);
        }
        self.indent_level -= 1;
        self.newline();
        self.write("}");
    }

    fn emit_stmt(&mut self, stmt: &JsStmt) {
        match stmt {
            JsStmt::VarDecl { kind, name, init } => {
                self.write(kind);
                self.write(" ");
                self.write(name);
                self.write(" = ");
                self.emit(init);
                self.write(";");
            }
            JsStmt::Return(value) => {
                self.write("return ");
                self.emit(value);
                self.write(";");
            }
            JsStmt::Expr(value) => {
                self.emit(value);
                self.write(";");
            }
        }
    }
}

fn is_pure_callee(callee: &JsExpr) -> bool {
    match callee {
        JsExpr::Ident { name, .. } | JsExpr::RuntimeRef { name, .. } => {
            PURE_FUNCTIONS.contains(name.as_str())
        }
        _ => false,
    }
}

/// Compact one-shot serialization with no formatting and no mappings; used
/// for values that end up inside raw code (let blocks, keys).
pub fn serialize_compact(expr: &JsExpr) -> String {
    let mut s = Serializer::new(FormatOptions::default());
    s.serialize_expr(expr);
    s.finish().0
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE MAP (V3)
// ═══════════════════════════════════════════════════════════════════════════════

const BASE64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn vlq_encode(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 0x1f) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0x20;
        }
        out.push(BASE64_CHARS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

pub fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        let b = [
            chunk[0],
            chunk.get(1).copied().unwrap_or(0),
            chunk.get(2).copied().unwrap_or(0),
        ];
        out.push(BASE64_CHARS[(b[0] >> 2) as usize] as char);
        out.push(BASE64_CHARS[(((b[0] & 0x03) << 4) | (b[1] >> 4)) as usize] as char);
        if chunk.len() > 1 {
            out.push(BASE64_CHARS[(((b[1] & 0x0f) << 2) | (b[2] >> 6)) as usize] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(BASE64_CHARS[(b[2] & 0x3f) as usize] as char);
        } else {
            out.push('=');
        }
    }
    out
}

struct Segment {
    gen_line: u32,
    gen_column: u32,
    src_line: u32,
    src_column: u32,
    name_index: Option<u32>,
}

fn collect_segments(
    node: &MappingNode,
    index: &SourceRangeIndex,
    names: &mut Vec<String>,
    segments: &mut Vec<Segment>,
) {
    if let Some(range) = node.source {
        let (line, column) = index.position_of(range.start);
        let name_index = node.name.as_ref().map(|n| {
            match names.iter().position(|existing| existing == n) {
                Some(i) => i as u32,
                None => {
                    names.push(n.clone());
                    names.len() as u32 - 1
                }
            }
        });
        segments.push(Segment {
            gen_line: node.gen_line,
            gen_column: node.gen_column,
            src_line: line - 1,
            src_column: column,
            name_index,
        });
    }
    for child in &node.children {
        collect_segments(child, index, names, segments);
    }
}

/// Serializes the mapping tree into a V3 source map.
pub fn build_source_map(
    tree: &MappingNode,
    source: &str,
    index: &SourceRangeIndex,
    filename: Option<&str>,
    opts: &SourceMapOptions,
) -> SourceMap {
    let mut names = Vec::new();
    let mut segments = Vec::new();
    collect_segments(tree, index, &mut names, &mut segments);
    segments.sort_by_key(|s| (s.gen_line, s.gen_column));

    let mut mappings = String::new();
    let mut current_line = 0u32;
    let mut prev_gen_col = 0i64;
    let mut prev_src_line = 0i64;
    let mut prev_src_col = 0i64;
    let mut prev_name = 0i64;
    let mut first_on_line = true;

    for seg in &segments {
        while current_line < seg.gen_line {
            mappings.push(';');
            current_line += 1;
            prev_gen_col = 0;
            first_on_line = true;
        }
        if !first_on_line {
            mappings.push(',');
        }
        first_on_line = false;
        vlq_encode(seg.gen_column as i64 - prev_gen_col, &mut mappings);
        prev_gen_col = seg.gen_column as i64;
        vlq_encode(0, &mut mappings);
        vlq_encode(seg.src_line as i64 - prev_src_line, &mut mappings);
        prev_src_line = seg.src_line as i64;
        vlq_encode(seg.src_column as i64 - prev_src_col, &mut mappings);
        prev_src_col = seg.src_column as i64;
        if let Some(name_index) = seg.name_index {
            vlq_encode(name_index as i64 - prev_name, &mut mappings);
            prev_name = name_index as i64;
        }
    }

    SourceMap {
        version: 3,
        file: filename.map(|f| format!("{}.js", f)),
        source_root: opts.source_root.clone(),
        sources: vec![filename.unwrap_or("template.hbs").to_string()],
        sources_content: if opts.include_content {
            Some(vec![source.to_string()])
        } else {
            None
        },
        names,
        mappings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder as b;

    fn compact(expr: &JsExpr) -> String {
        serialize_compact(expr)
    }

    #[test]
    fn emits_calls_and_members() {
        let e = b::call(
            b::runtime_ref("$_tag"),
            vec![
                b::string_single("div"),
                b::ident("$_edp"),
                b::ident("this"),
            ],
        );
        assert_eq!(compact(&e), "$_tag('div', $_edp, this)");
    }

    #[test]
    fn emits_optional_members() {
        let e = b::opt_member(b::opt_member(b::runtime_ref("a"), "b"), "c");
        assert_eq!(compact(&e), "a?.b?.c");
        let e = b::computed_member(b::ident("this"), "$args");
        assert_eq!(compact(&e), "this[\"$args\"]");
    }

    #[test]
    fn string_quoting_rules() {
        assert_eq!(compact(&b::string("a\"b")), "\"a\\\"b\"");
        assert_eq!(compact(&b::string_single("it's")), "'it\\'s'");
    }

    #[test]
    fn arrow_and_getter() {
        let e = b::arrow(vec!["ctx1"], b::array(vec![b::string("A")]));
        assert_eq!(compact(&e), "(ctx1) => [\"A\"]");
        let g = b::reactive_getter(b::member(b::ident("this"), "x"));
        assert_eq!(compact(&g), "() => this.x");
    }

    #[test]
    fn formatted_list_breaks_lines() {
        let opts = FormatOptions {
            enabled: true,
            ..Default::default()
        };
        let mut s = Serializer::new(opts);
        s.serialize_expr(&b::formatted_call(
            b::runtime_ref("$_tag"),
            vec![b::string_single("div"), b::ident("this")],
        ));
        let (code, _) = s.finish();
        assert_eq!(code, "$_tag(\n  'div',\n  this\n)");
    }

    #[test]
    fn pure_annotation_only_for_pure_callees() {
        let opts = FormatOptions {
            emit_pure: true,
            ..Default::default()
        };
        let mut s = Serializer::new(opts.clone());
        s.serialize_expr(&b::call(b::runtime_ref("$_tag"), vec![]));
        assert_eq!(s.finish().0, "/*#__PURE__*/$_tag()");

        let mut s = Serializer::new(opts);
        s.serialize_expr(&b::call(b::ident("local"), vec![]));
        assert_eq!(s.finish().0, "local()");
    }

    #[test]
    fn idempotent_serialization() {
        let e = b::formatted_call(
            b::runtime_ref("$_if"),
            vec![b::ident("c"), b::arrow(vec!["ctx1"], b::array(vec![]))],
        );
        let opts = FormatOptions {
            enabled: true,
            indent: 4,
            ..Default::default()
        };
        let mut s1 = Serializer::new(opts.clone());
        s1.serialize_expr(&e);
        let mut s2 = Serializer::new(opts);
        s2.serialize_expr(&e);
        assert_eq!(s1.finish().0, s2.finish().0);
    }

    #[test]
    fn mapping_tree_records_ranges() {
        let e = b::call(
            b::runtime_ref("$_tag"),
            vec![b::string_single_at("div", Some(SourceRange::new(1, 4)))],
        );
        let mut s = Serializer::new(FormatOptions::default());
        s.serialize_expr(&e);
        let (_, tree) = s.finish();
        let leaf = &tree.children[0];
        assert_eq!(leaf.source, Some(SourceRange::new(1, 4)));
        assert_eq!(leaf.gen_column, 6);
    }

    #[test]
    fn vlq_known_values() {
        let mut s = String::new();
        vlq_encode(0, &mut s);
        assert_eq!(s, "A");
        let mut s = String::new();
        vlq_encode(16, &mut s);
        assert_eq!(s, "gB");
        let mut s = String::new();
        vlq_encode(-1, &mut s);
        assert_eq!(s, "D");
    }

    #[test]
    fn base64_round_values() {
        assert_eq!(base64_encode(b"Man"), "TWFu");
        assert_eq!(base64_encode(b"Ma"), "TWE=");
        assert_eq!(base64_encode(b"M"), "TQ==");
    }

    #[test]
    fn source_map_segments() {
        let source = "{{x}}";
        let index = SourceRangeIndex::new(source);
        let tree = MappingNode {
            gen_line: 0,
            gen_column: 0,
            source: None,
            name: None,
            children: vec![MappingNode {
                gen_line: 0,
                gen_column: 5,
                source: Some(SourceRange::new(2, 3)),
                name: Some("x".into()),
                children: vec![],
            }],
        };
        let map = build_source_map(
            &tree,
            source,
            &index,
            Some("demo.hbs"),
            &SourceMapOptions {
                enabled: true,
                include_content: true,
                ..Default::default()
            },
        );
        assert_eq!(map.version, 3);
        assert_eq!(map.names, vec!["x".to_string()]);
        assert_eq!(map.sources, vec!["demo.hbs".to_string()]);
        assert_eq!(map.sources_content.unwrap()[0], source);
        // col 5, source 0, line 0, col 2, name 0
        assert_eq!(map.mappings, "KAAEA");
    }
}
