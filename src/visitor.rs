//! Parsed-tree traversal producing the compiler IR.
//!
//! One pass over the template syntax tree. Scope frames are pushed before
//! visiting the children that can see them and popped on the same exit path;
//! mustache/block/element semantics, attribute channeling, namespace
//! wrapping, the text-child optimization and let-block emission all live
//! here. Reactivity decisions are deferred to the lowerer — the visitor only
//! records getter intent where the surrounding context demands it
//! (attribute values and conditions).

use crate::ast::{
    AttrNode, AttrValue, Block, BlockStatement, ConcatPart, ElementModifierStatement,
    ElementNode as AstElement, Expression, Hash, MustacheStatement, PathExpression, Statement,
    Template, TextNode,
};
use crate::context::CompilerContext;
use crate::diagnostics::{
    ERR_BLOCK_WITHOUT_PARAMS, WARN_INDEX_KEY, WARN_RESERVED_BINDING,
};
use crate::ir::{
    Attribute, Child, ControlIr, ControlKind, ElementIr, Event, HelperValue, LiteralValue,
    PathPart, PathValue, Property, RuntimeTag, SerializedValue, Tag,
};
use crate::lower;
use crate::paths;
use crate::ranges::SourceRange;
use crate::scope::{Binding, BindingKind};
use crate::serializer::serialize_compact;
use crate::symbols::{self as sym, is_reserved_binding, NAMED_ENTITIES};

// node-kind tags for the seen set
const SEEN_ELEMENT: u8 = 1;
const SEEN_TEXT: u8 = 2;
const SEEN_MUSTACHE: u8 = 3;
const SEEN_BLOCK: u8 = 4;
const SEEN_SUBEXPR: u8 = 5;

enum MustacheOut {
    Value(SerializedValue),
    Control(ControlIr),
}

pub struct Visitor<'c, 'a> {
    ctx: &'c mut CompilerContext<'a>,
}

impl<'c, 'a> Visitor<'c, 'a> {
    pub fn new(ctx: &'c mut CompilerContext<'a>) -> Self {
        Visitor { ctx }
    }

    pub fn visit_template(&mut self, template: &Template) -> Vec<Child> {
        self.visit_children(&template.body)
    }

    fn visit_children(&mut self, body: &[Statement]) -> Vec<Child> {
        let mut out = Vec::new();
        for stmt in body {
            let (range, kind) = match stmt {
                Statement::ElementNode(el) => (self.ctx.range_of(el.loc.as_ref()), SEEN_ELEMENT),
                Statement::TextNode(t) => (self.ctx.range_of(t.loc.as_ref()), SEEN_TEXT),
                Statement::MustacheStatement(m) => {
                    (self.ctx.range_of(m.loc.as_ref()), SEEN_MUSTACHE)
                }
                Statement::BlockStatement(b) => (self.ctx.range_of(b.loc.as_ref()), SEEN_BLOCK),
                _ => (None, 0),
            };
            if !self.ctx.mark_seen(range, kind) {
                continue;
            }
            if let Some(child) = self.visit_statement(stmt) {
                out.push(child);
            }
        }
        out
    }

    fn visit_statement(&mut self, stmt: &Statement) -> Option<Child> {
        match stmt {
            Statement::TextNode(t) => self.visit_text(t),
            Statement::MustacheStatement(m) => match self.visit_mustache(m, false)? {
                MustacheOut::Value(v) => Some(Child::Expr { value: v }),
                MustacheOut::Control(c) => Some(Child::Control(Box::new(c))),
            },
            Statement::BlockStatement(b) => self.visit_block(b),
            Statement::ElementNode(el) => self.visit_element(el),
            Statement::CommentStatement(_) | Statement::MustacheCommentStatement(_) => None,
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // text
    // ───────────────────────────────────────────────────────────────────────

    fn visit_text(&mut self, text: &TextNode) -> Option<Child> {
        let decoded = decode_entities(&text.chars);
        if decoded.is_empty() {
            return None;
        }
        // Formatting whitespace between elements is dropped; meaningful
        // single-space separators survive.
        if decoded.trim().is_empty() && (decoded.contains('\n') || decoded.len() > 1) {
            return None;
        }
        Some(Child::Text { value: decoded })
    }

    // ───────────────────────────────────────────────────────────────────────
    // expressions
    // ───────────────────────────────────────────────────────────────────────

    fn visit_expression(&mut self, expr: &Expression, wrap: bool) -> SerializedValue {
        match expr {
            Expression::StringLiteral(l) => SerializedValue::string(l.value.clone()),
            Expression::NumberLiteral(l) => SerializedValue::Literal {
                value: LiteralValue::Num(l.value),
            },
            Expression::BooleanLiteral(l) => SerializedValue::bool(l.value),
            Expression::NullLiteral(_) => SerializedValue::Literal {
                value: LiteralValue::Null,
            },
            Expression::UndefinedLiteral(_) => SerializedValue::Literal {
                value: LiteralValue::Undefined,
            },
            Expression::PathExpression(p) => self.visit_path(p),
            Expression::SubExpression(s) => {
                let range = self.ctx.range_of(s.loc.as_ref());
                self.ctx.mark_seen(range, SEEN_SUBEXPR);
                let helper = self.visit_call(&s.path, &s.params, &s.hash);
                let value = SerializedValue::Helper(helper);
                if wrap {
                    SerializedValue::Getter {
                        value: Box::new(value),
                    }
                } else {
                    value
                }
            }
        }
    }

    fn visit_path(&mut self, path: &PathExpression) -> SerializedValue {
        let expression = paths::resolve_path(&self.ctx.scope, path);
        let head_replaced = !path.is_this
            && !path.is_data
            && self
                .ctx
                .scope
                .resolve(path.head())
                .map_or(false, |b| b.original_name.is_some());
        let (parts, root_range) = if head_replaced {
            (None, self.root_range_of(path))
        } else {
            self.path_parts(path)
        };
        SerializedValue::Path(PathValue {
            expression,
            is_arg: path.is_data,
            parts,
            root_range,
        })
    }

    /// Segment list with per-segment byte ranges, derived from the path's
    /// start offset. Bracket forms keep the names but drop the ranges.
    fn path_parts(
        &self,
        path: &PathExpression,
    ) -> (Option<Vec<PathPart>>, Option<SourceRange>) {
        let mut names: Vec<String> = Vec::new();
        if path.is_this {
            names.push("this".to_string());
            names.extend(path.parts.iter().cloned());
        } else if path.is_data {
            names.extend(path.parts.iter().cloned());
        } else if path.parts.is_empty() {
            names.push(path.original.clone());
        } else {
            names.extend(path.parts.iter().cloned());
        }
        if names.is_empty() {
            return (None, None);
        }

        let range = match self.ctx.range_of(path.loc.as_ref()) {
            Some(r) => r,
            None => {
                let parts = names
                    .into_iter()
                    .map(|name| PathPart { name, range: None })
                    .collect();
                return (Some(parts), None);
            }
        };

        // Validate that dotted segments reconstruct the original before
        // trusting computed offsets.
        let head_extra = if path.is_data { 1 } else { 0 };
        let expected: usize = names.iter().map(String::len).sum::<usize>()
            + names.len().saturating_sub(1)
            + head_extra;
        if path.original.contains('[') || expected != path.original.len() {
            let root_range = Some(SourceRange::new(
                range.start,
                range.start + (names[0].len() + head_extra) as u32,
            ));
            let parts = names
                .into_iter()
                .map(|name| PathPart { name, range: None })
                .collect();
            return (Some(parts), root_range);
        }

        let mut cursor = range.start;
        let mut parts = Vec::with_capacity(names.len());
        for (i, name) in names.into_iter().enumerate() {
            let len = name.len() as u32 + if i == 0 { head_extra as u32 } else { 0 };
            parts.push(PathPart {
                name,
                range: Some(SourceRange::new(cursor, cursor + len)),
            });
            cursor += len + 1;
        }
        let root_range = parts[0].range;
        (Some(parts), root_range)
    }

    fn root_range_of(&self, path: &PathExpression) -> Option<SourceRange> {
        let range = self.ctx.range_of(path.loc.as_ref())?;
        let head_len = path.head().len() as u32 + if path.is_data { 1 } else { 0 };
        Some(SourceRange::new(range.start, range.start + head_len))
    }

    fn visit_call(
        &mut self,
        path: &Expression,
        params: &[Expression],
        hash: &Hash,
    ) -> HelperValue {
        let (name, path_range) = match path {
            Expression::PathExpression(p) => (
                paths::resolve_path(&self.ctx.scope, p),
                self.ctx.range_of(p.loc.as_ref()),
            ),
            other => {
                let v = self.visit_expression(other, false);
                let built = lower::build_value(self.ctx, &v, "this", false);
                (serialize_compact(&built), other.loc().map(|l| self.ctx.index.range_of(l)))
            }
        };
        let positional = params
            .iter()
            .map(|p| self.visit_expression(p, false))
            .collect();
        let named = hash
            .pairs
            .iter()
            .map(|pair| (pair.key.clone(), self.visit_expression(&pair.value, false)))
            .collect();
        HelperValue {
            name,
            positional,
            named,
            path_range,
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // mustaches
    // ───────────────────────────────────────────────────────────────────────

    fn visit_mustache(
        &mut self,
        mustache: &MustacheStatement,
        reactive: bool,
    ) -> Option<MustacheOut> {
        let path = match &mustache.path {
            Expression::PathExpression(p) => p,
            other => {
                let value = self.visit_expression(other, reactive);
                return Some(MustacheOut::Value(value));
            }
        };

        let name = path.original.as_str();
        if (name == "yield" || name == "outlet") && !self.ctx.scope.has_local_binding(name) {
            return Some(MustacheOut::Control(self.visit_yield(mustache)));
        }

        if mustache.params.is_empty() && mustache.hash.pairs.is_empty() {
            let known = path.is_this
                || path.is_data
                || name.starts_with("$_")
                || self.ctx.scope.has_binding(path.head());
            if known {
                return Some(MustacheOut::Value(self.visit_path(path)));
            }
            let helper = SerializedValue::Helper(HelperValue {
                name: name.to_string(),
                positional: Vec::new(),
                named: Vec::new(),
                path_range: self.ctx.range_of(path.loc.as_ref()),
            });
            return Some(MustacheOut::Value(wrap_helper(helper, reactive, name)));
        }

        let helper = self.visit_call(&mustache.path, &mustache.params, &mustache.hash);
        Some(MustacheOut::Value(wrap_helper(
            SerializedValue::Helper(helper),
            reactive,
            name,
        )))
    }

    fn visit_yield(&mut self, mustache: &MustacheStatement) -> ControlIr {
        let key = self
            .hash_string_value(&mustache.hash, "to")
            .unwrap_or_else(|| "default".to_string());
        let block_params = mustache
            .params
            .iter()
            .map(|param| {
                let value = self.visit_expression(param, false);
                let built = lower::build_value(self.ctx, &value, "this", false);
                serialize_compact(&built)
            })
            .collect();
        let mut control = ControlIr::new(
            ControlKind::Yield,
            SerializedValue::Literal {
                value: LiteralValue::Null,
            },
        );
        control.block_params = block_params;
        control.key = Some(key);
        control.source_range = self.ctx.range_of(mustache.loc.as_ref());
        control
    }

    // ───────────────────────────────────────────────────────────────────────
    // blocks
    // ───────────────────────────────────────────────────────────────────────

    fn visit_block(&mut self, block: &BlockStatement) -> Option<Child> {
        let path = match &block.path {
            Expression::PathExpression(p) => p,
            _ => return None,
        };
        let range = self.ctx.range_of(block.loc.as_ref());
        if block.params.is_empty() {
            self.ctx.error(
                ERR_BLOCK_WITHOUT_PARAMS,
                format!("{{{{#{}}}}} requires at least one positional argument.", path.original),
                range,
            );
            return None;
        }

        let key = self.extract_key(&block.hash);
        let is_sync = hash_bool(&block.hash, "sync");

        let control = match path.original.as_str() {
            "if" => {
                let condition = self.block_condition(&block.params[0]);
                let children = self.visit_block_body(&block.program);
                let inverse = block.inverse.as_ref().map(|inv| self.visit_block_body(inv));
                let mut c = ControlIr::new(ControlKind::If, condition);
                c.children = children;
                c.inverse = inverse;
                c.source_range = range;
                c
            }
            "unless" => {
                let condition = self.block_condition(&block.params[0]);
                let children = block
                    .inverse
                    .as_ref()
                    .map(|inv| self.visit_block_body(inv))
                    .unwrap_or_default();
                let inverse = self.visit_block_body(&block.program);
                let mut c = ControlIr::new(ControlKind::If, condition);
                c.children = children;
                c.inverse = Some(inverse);
                c.source_range = range;
                c
            }
            "each" => {
                let condition = self.block_condition(&block.params[0]);
                let children = self.visit_block_body(&block.program);
                let mut c = ControlIr::new(ControlKind::Each, condition);
                c.children = children;
                c.block_params = block.program.block_params.clone();
                c.key = key;
                c.is_sync = is_sync;
                c.source_range = range;
                c
            }
            "let" => return self.visit_let_block(block),
            "in-element" => {
                let condition = self.visit_expression(&block.params[0], false);
                let children = self.visit_block_body(&block.program);
                let mut c = ControlIr::new(ControlKind::InElement, condition);
                c.children = children;
                c.source_range = range;
                c
            }
            _ => {
                // Generic block names invoke the named component with the
                // block body as its default slot.
                let condition = self.visit_path(path);
                let children = self.visit_block_body(&block.program);
                let mut c = ControlIr::new(ControlKind::Component, condition);
                c.children = children;
                c.block_params = block.program.block_params.clone();
                c.source_range = range;
                c
            }
        };
        Some(Child::Control(Box::new(control)))
    }

    /// Conditions ask for reactivity: helper conditions defer through a
    /// getter, plain paths stay direct.
    fn block_condition(&mut self, param: &Expression) -> SerializedValue {
        let value = self.visit_expression(param, false);
        match value {
            SerializedValue::Helper(_) => SerializedValue::Getter {
                value: Box::new(value),
            },
            other => other,
        }
    }

    fn visit_block_body(&mut self, body: &Block) -> Vec<Child> {
        self.check_reserved(&body.block_params);
        let bindings: Vec<Binding> = body
            .block_params
            .iter()
            .map(|p| Binding::new(BindingKind::BlockParam, p.clone()))
            .collect();
        self.scoped_children(bindings, &body.body)
    }

    /// Pushes bindings, visits, pops — one function, one exit path.
    fn scoped_children(&mut self, bindings: Vec<Binding>, body: &[Statement]) -> Vec<Child> {
        let names: Vec<String> = bindings.iter().map(|b| b.name.clone()).collect();
        for binding in bindings {
            self.ctx.scope.add_binding(binding);
        }
        let out = self.visit_children(body);
        for name in names.iter().rev() {
            self.ctx.scope.remove_binding(name);
        }
        out
    }

    fn check_reserved(&mut self, params: &[String]) {
        for param in params {
            if is_reserved_binding(param) {
                self.ctx.warn(
                    WARN_RESERVED_BINDING,
                    format!("Binding \"{}\" shadows a reserved runtime name.", param),
                    None,
                );
            }
        }
    }

    fn visit_let_block(&mut self, block: &BlockStatement) -> Option<Child> {
        let program = &block.program;
        let names = &program.block_params;
        self.check_reserved(names);
        let id = self.ctx.next_let_block_id();

        let mut decls = String::new();
        let mut bindings = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let rhs = block
                .params
                .get(i)
                .map(|p| self.visit_expression(p, false))
                .unwrap_or(SerializedValue::Literal {
                    value: LiteralValue::Undefined,
                });
            let var = format!("Let_{}_scope{}", name, id);
            let built = lower::build_value(self.ctx, &rhs, "this", false);
            let code = serialize_compact(&built);
            if rhs.is_primitive() {
                decls.push_str(&format!(" let {} = {};", var, code));
                bindings.push(Binding::new(BindingKind::LetBinding, name.clone()).renamed_to(var));
            } else {
                decls.push_str(&format!(" let {} = () => {};", var, code));
                bindings.push(
                    Binding::new(BindingKind::LetBinding, name.clone())
                        .renamed_to(format!("{}()", var)),
                );
            }
        }

        let binding_names: Vec<String> = bindings.iter().map(|b| b.name.clone()).collect();
        for binding in bindings {
            self.ctx.scope.add_binding(binding);
        }
        let children = self.visit_children(&program.body);
        let built = lower::build_children(self.ctx, &children, "this");
        for name in binding_names.iter().rev() {
            self.ctx.scope.remove_binding(name);
        }

        let serialized: Vec<String> = built.iter().map(serialize_compact).collect();
        let body = format!(
            "let self = this;{} return [{}];",
            decls,
            serialized.join(", ")
        );
        let code = format!("...(() => {{ {} }})()", rewrite_this_to_self(&body));
        Some(Child::Expr {
            value: SerializedValue::Raw { code },
        })
    }

    fn extract_key(&mut self, hash: &Hash) -> Option<String> {
        let pair = hash.pairs.iter().find(|p| p.key == "key")?;
        let key = match &pair.value {
            Expression::StringLiteral(s) => s.value.clone(),
            other => {
                let v = self.visit_expression(other, false);
                let built = lower::build_value(self.ctx, &v, "this", false);
                serialize_compact(&built)
            }
        };
        if key == "@index" {
            self.ctx.warn(
                WARN_INDEX_KEY,
                "\"@index\" is not a stable list key; falling back to \"@identity\".",
                self.ctx.range_of(pair.loc.as_ref()),
            );
            return Some("@identity".to_string());
        }
        Some(key)
    }

    fn hash_string_value(&mut self, hash: &Hash, key: &str) -> Option<String> {
        let pair = hash.pairs.iter().find(|p| p.key == key)?;
        match &pair.value {
            Expression::StringLiteral(s) => Some(s.value.clone()),
            other => {
                let v = self.visit_expression(other, false);
                let built = lower::build_value(self.ctx, &v, "this", false);
                Some(serialize_compact(&built))
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // elements
    // ───────────────────────────────────────────────────────────────────────

    fn visit_element(&mut self, el: &AstElement) -> Option<Child> {
        let source_range = self.ctx.range_of(el.loc.as_ref());
        // The opening `<` precedes the tag; renames never shift this span.
        let tag_range = source_range
            .map(|r| SourceRange::new(r.start + 1, r.start + 1 + el.tag.len() as u32));

        let mut tag = el.tag.clone();
        let component_like = tag.chars().next().map_or(false, |c| c.is_ascii_uppercase())
            || tag.contains('.')
            || tag.starts_with('@');
        if component_like {
            if let Some(hook) = self.ctx.customize_component_name {
                tag = hook(&tag);
            }
            if let Some(arg_name) = tag.strip_prefix('@') {
                tag = format!("{}.{}", sym::ARGS_ALIAS, arg_name);
            }
        }

        let mut ir = ElementIr::new(Tag::Static(tag));
        ir.source_range = source_range;
        ir.tag_range = tag_range;
        ir.self_closing = el.self_closing;
        ir.block_params = el.block_params.clone();
        self.check_reserved(&el.block_params);

        for attr in &el.attributes {
            self.process_attribute(&mut ir, attr);
        }
        for modifier in &el.modifiers {
            self.process_modifier(&mut ir, modifier);
        }

        let bindings: Vec<Binding> = el
            .block_params
            .iter()
            .map(|p| Binding::new(BindingKind::BlockParam, p.clone()))
            .collect();
        ir.children = self.scoped_children(bindings, &el.children);

        // `<foreignObject>` switches its subtree back to the HTML namespace.
        if el.tag == "foreignObject" && !ir.children.is_empty() {
            let mut provider = ElementIr::new(Tag::Runtime(RuntimeTag {
                symbol: sym::HTML_PROVIDER.to_string(),
            }));
            provider.namespace_wrapped = true;
            provider.children = std::mem::take(&mut ir.children);
            ir.children = vec![Child::Element(Box::new(provider))];
        }

        self.apply_text_child_optimization(&mut ir);

        // `<svg>` / `<math>` roots render under their namespace provider.
        if (el.tag == "svg" || el.tag == "math") && !ir.namespace_wrapped {
            let symbol = if el.tag == "svg" {
                sym::SVG_PROVIDER
            } else {
                sym::MATH_PROVIDER
            };
            ir.namespace_wrapped = true;
            let mut wrapper = ElementIr::new(Tag::Runtime(RuntimeTag {
                symbol: symbol.to_string(),
            }));
            wrapper.source_range = source_range;
            wrapper.children = vec![Child::Element(Box::new(ir))];
            return Some(Child::Element(Box::new(wrapper)));
        }

        Some(Child::Element(Box::new(ir)))
    }

    fn process_attribute(&mut self, ir: &mut ElementIr, attr: &AttrNode) {
        let name = attr.name.as_str();
        let range = self.ctx.range_of(attr.loc.as_ref());
        let name_range =
            range.map(|r| SourceRange::new(r.start, r.start + name.len() as u32));

        if name == sym::SPLAT_ATTRIBUTES {
            ir.attributes.push(Attribute {
                name: name.to_string(),
                value: SerializedValue::string(""),
                range,
                name_range,
            });
            return;
        }

        if name == "@oncreated" {
            let handler = match &attr.value {
                AttrValue::MustacheStatement(m) => self.oncreated_handler(m),
                other => self.visit_attr_value(other),
            };
            ir.events.push(Event {
                name: sym::EVENT_ON_CREATED.to_string(),
                handler,
                range,
            });
            return;
        }

        if name == "@textContent" {
            let handler = self.visit_attr_value(&attr.value);
            ir.events.push(Event {
                name: sym::EVENT_TEXT_CONTENT.to_string(),
                handler,
                range,
            });
            return;
        }

        if let Some(style_prop) = name.strip_prefix("style.") {
            let value = self.visit_attr_value(&attr.value);
            ir.events.push(Event {
                name: sym::EVENT_ON_CREATED.to_string(),
                handler: SerializedValue::Helper(HelperValue {
                    name: sym::ON_CREATED_HANDLER.to_string(),
                    positional: vec![
                        SerializedValue::Path(PathValue {
                            expression: sym::STYLE.to_string(),
                            is_arg: false,
                            parts: None,
                            root_range: None,
                        }),
                        SerializedValue::string(style_prop),
                        value,
                    ],
                    named: Vec::new(),
                    path_range: range,
                }),
                range,
            });
            return;
        }

        if name.starts_with('@') {
            let value = self.visit_attr_value(&attr.value);
            ir.attributes.push(Attribute {
                name: name.to_string(),
                value,
                range,
                name_range,
            });
            return;
        }

        let value = self.visit_attr_value(&attr.value);

        if name == "class" {
            // Class always rides the merging channel.
            ir.properties.push(Property {
                name: String::new(),
                value,
                range,
            });
            return;
        }

        let is_html_attr = sym::HTML_ATTRS.contains(name)
            || name.starts_with("aria-")
            || name.starts_with("data-");
        if is_html_attr {
            ir.attributes.push(Attribute {
                name: name.to_string(),
                value,
                range,
                name_range,
            });
            return;
        }

        let property_name = sym::PROPERTY_REMAP
            .get(name)
            .map(|s| s.to_string())
            .unwrap_or_else(|| name.to_string());
        let value = match value {
            SerializedValue::Literal {
                value: LiteralValue::Str(s),
            } if s.is_empty() => SerializedValue::bool(true),
            other => other,
        };
        ir.properties.push(Property {
            name: property_name,
            value,
            range,
        });
    }

    fn oncreated_handler(&mut self, mustache: &MustacheStatement) -> SerializedValue {
        let callee = self.visit_expression(&mustache.path, false);
        let mut positional = vec![callee];
        for param in &mustache.params {
            positional.push(self.visit_expression(param, false));
        }
        let named = mustache
            .hash
            .pairs
            .iter()
            .map(|pair| (pair.key.clone(), self.visit_expression(&pair.value, false)))
            .collect();
        SerializedValue::Helper(HelperValue {
            name: sym::ON_CREATED_HANDLER.to_string(),
            positional,
            named,
            path_range: mustache.path.loc().map(|l| self.ctx.index.range_of(l)),
        })
    }

    fn process_modifier(&mut self, ir: &mut ElementIr, modifier: &ElementModifierStatement) {
        let path = match &modifier.path {
            Expression::PathExpression(p) => p,
            _ => return,
        };
        let range = self.ctx.range_of(modifier.loc.as_ref());

        if path.original == "on" && !self.ctx.scope.has_local_binding("on") {
            let event_name = match modifier.params.first() {
                Some(Expression::StringLiteral(s)) => s.value.clone(),
                _ => return,
            };
            let mut positional = Vec::new();
            for param in modifier.params.iter().skip(1) {
                positional.push(self.visit_expression(param, false));
            }
            let named = modifier
                .hash
                .pairs
                .iter()
                .map(|pair| (pair.key.clone(), self.visit_expression(&pair.value, false)))
                .collect();
            ir.events.push(Event {
                name: event_name,
                handler: SerializedValue::Helper(HelperValue {
                    name: sym::ON_HANDLER.to_string(),
                    positional,
                    named,
                    path_range: self.ctx.range_of(path.loc.as_ref()),
                }),
                range,
            });
            return;
        }

        let name = paths::resolve_path(&self.ctx.scope, path);
        let positional = modifier
            .params
            .iter()
            .map(|p| self.visit_expression(p, false))
            .collect();
        let named = modifier
            .hash
            .pairs
            .iter()
            .map(|pair| (pair.key.clone(), self.visit_expression(&pair.value, false)))
            .collect();
        ir.events.push(Event {
            name: sym::EVENT_ON_CREATED.to_string(),
            handler: SerializedValue::Helper(HelperValue {
                name,
                positional,
                named,
                path_range: self.ctx.range_of(path.loc.as_ref()),
            }),
            range,
        });
    }

    fn visit_attr_value(&mut self, value: &AttrValue) -> SerializedValue {
        match value {
            AttrValue::TextNode(t) => SerializedValue::string(decode_entities(&t.chars)),
            AttrValue::MustacheStatement(m) => match self.visit_mustache(m, true) {
                Some(MustacheOut::Value(v)) => v,
                _ => SerializedValue::string(""),
            },
            AttrValue::ConcatStatement(concat) => {
                let parts = concat
                    .parts
                    .iter()
                    .map(|part| match part {
                        ConcatPart::TextNode(t) => {
                            SerializedValue::string(decode_entities(&t.chars))
                        }
                        ConcatPart::MustacheStatement(m) => match self.visit_mustache(m, false) {
                            Some(MustacheOut::Value(v)) => v,
                            _ => SerializedValue::string(""),
                        },
                    })
                    .collect();
                SerializedValue::Getter {
                    value: Box::new(SerializedValue::Concat { parts }),
                }
            }
        }
    }

    /// A lone text/value child of a plain lowercase element collapses into
    /// the text-content event channel.
    fn apply_text_child_optimization(&mut self, ir: &mut ElementIr) {
        let Tag::Static(tag) = &ir.tag else { return };
        if !tag.chars().next().map_or(false, |c| c.is_ascii_lowercase())
            || tag.starts_with(':')
            || tag.contains('.')
        {
            return;
        }
        if ir.children.len() != 1 {
            return;
        }
        let value = match &ir.children[0] {
            Child::Text { value } => SerializedValue::string(value.clone()),
            Child::Expr { value } => value.clone(),
            _ => return,
        };
        if value.mentions(sym::SLOT) || value.mentions("...") {
            return;
        }
        ir.children.clear();
        ir.events.push(Event {
            name: sym::EVENT_TEXT_CONTENT.to_string(),
            handler: value,
            range: None,
        });
        ir.has_stable_child = true;
    }
}

fn wrap_helper(value: SerializedValue, reactive: bool, name: &str) -> SerializedValue {
    if reactive && name != "has-block" && name != "has-block-params" {
        SerializedValue::Getter {
            value: Box::new(value),
        }
    } else {
        value
    }
}

fn hash_bool(hash: &Hash, key: &str) -> bool {
    hash.pairs.iter().any(|pair| {
        pair.key == key && matches!(&pair.value, Expression::BooleanLiteral(b) if b.value)
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// HTML ENTITIES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after.find(';') {
            Some(semi) if semi > 0 && semi <= 31 => match decode_entity(&after[..semi]) {
                Some(decoded) => {
                    out.push_str(&decoded);
                    rest = &after[semi + 1..];
                }
                None => {
                    out.push('&');
                    rest = after;
                }
            },
            _ => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let code = if let Some(hex) = numeric.strip_prefix(['x', 'X']) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            numeric.parse::<u32>().ok()?
        };
        return char::from_u32(code).map(|c| c.to_string());
    }
    NAMED_ENTITIES.get(entity).map(|s| s.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// LET-BLOCK REWRITING
// ═══════════════════════════════════════════════════════════════════════════════

/// `this.` → `self.` outside string literals. A character-wise scanner with
/// quote and backslash tracking; a blind replace would corrupt strings.
pub fn rewrite_this_to_self(code: &str) -> String {
    let bytes = code.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut in_string: Option<u8> = None;
    let mut escaped = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(quote) = in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == quote {
                in_string = None;
            }
            i += 1;
            continue;
        }
        match c {
            b'"' | b'\'' | b'`' => {
                in_string = Some(c);
                out.push(c);
                i += 1;
            }
            b't' if bytes[i..].starts_with(b"this.") && !prev_is_ident_byte(bytes, i) => {
                out.extend_from_slice(b"self.");
                i += 5;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| code.to_string())
}

fn prev_is_ident_byte(bytes: &[u8], i: usize) -> bool {
    if i == 0 {
        return false;
    }
    let p = bytes[i - 1];
    p.is_ascii_alphanumeric() || p == b'_' || p == b'$' || p == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_and_numeric_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&lt;div&gt;"), "<div>");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("&bogus; stays"), "&bogus; stays");
        assert_eq!(decode_entities("no entities"), "no entities");
    }

    #[test]
    fn this_to_self_skips_strings() {
        assert_eq!(rewrite_this_to_self("this.a + this.b"), "self.a + self.b");
        assert_eq!(
            rewrite_this_to_self("f(\"this.kept\", this.x)"),
            "f(\"this.kept\", self.x)"
        );
        assert_eq!(
            rewrite_this_to_self("'this.kept' + this.y"),
            "'this.kept' + self.y"
        );
        assert_eq!(rewrite_this_to_self("athis.x"), "athis.x");
        assert_eq!(rewrite_this_to_self("obj.this.x"), "obj.this.x");
        assert_eq!(
            rewrite_this_to_self("\"a\\\"this.b\" + this.c"),
            "\"a\\\"this.b\" + self.c"
        );
    }

    #[test]
    fn bare_this_is_untouched() {
        assert_eq!(
            rewrite_this_to_self("let self = this; $_tag('p', $_edp, this)"),
            "let self = this; $_tag('p', $_edp, this)"
        );
    }
}
