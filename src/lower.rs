//! IR to JS-AST lowering.
//!
//! Owns every reactivity and compat-mode rule: reactive-getter wrapping,
//! helper dispatch precedence, built-in helper shapes, element/component
//! call shapes, event and modifier shaping, slot emission and control-flow
//! lowering. The scope tracker is re-entered here for block params so helper
//! shadowing resolves identically to the visiting pass.

use crate::builder::{self as b, ArrowBody, JsExpr};
use crate::context::CompilerContext;
use crate::diagnostics::{
    ERR_EMPTY_RUNTIME_TAG, ERR_RUNTIME_TAG_AS_ELEMENT, WARN_UNKNOWN_BINDING,
};
use crate::ir::{
    Child, ControlIr, ControlKind, ElementIr, Event, HelperValue, LiteralValue, PathValue,
    SerializedValue, Tag,
};
use crate::paths::{extract_arg_name, is_safe_identifier, resolved_head};
use crate::scope::{Binding, BindingKind};
use crate::symbols as sym;

// ═══════════════════════════════════════════════════════════════════════════════
// CHILDREN
// ═══════════════════════════════════════════════════════════════════════════════

pub fn build_children(
    ctx: &mut CompilerContext<'_>,
    children: &[Child],
    ctx_name: &str,
) -> Vec<JsExpr> {
    children
        .iter()
        .map(|child| build_child(ctx, child, ctx_name))
        .collect()
}

pub fn build_child(ctx: &mut CompilerContext<'_>, child: &Child, ctx_name: &str) -> JsExpr {
    match child {
        Child::Text { value } => b::string(value.clone()),
        Child::Expr { value } => build_value(ctx, value, ctx_name, false),
        Child::Element(el) => build_element(ctx, el, ctx_name),
        Child::Control(c) => build_control(ctx, c, ctx_name),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn build_value(
    ctx: &mut CompilerContext<'_>,
    value: &SerializedValue,
    ctx_name: &str,
    wrap: bool,
) -> JsExpr {
    match value {
        SerializedValue::Literal { value } => match value {
            LiteralValue::Str(s) => b::string(s.clone()),
            LiteralValue::Num(n) => b::num(*n),
            LiteralValue::Bool(v) => b::boolean(*v),
            LiteralValue::Null => b::null(),
            LiteralValue::Undefined => b::undefined(),
        },
        SerializedValue::Raw { code } => b::raw(code.clone()),
        SerializedValue::Spread { expression } => b::spread(b::raw(expression.clone())),
        SerializedValue::Path(path) => build_path(ctx, path, ctx_name, wrap),
        SerializedValue::Getter { value } => {
            b::reactive_getter(build_value(ctx, value, ctx_name, false))
        }
        SerializedValue::Concat { parts } => {
            // The enclosing getter supplies reactivity; inner paths stay
            // unwrapped.
            let items = parts
                .iter()
                .map(|part| build_value(ctx, part, ctx_name, false))
                .collect();
            b::method_call(b::array(items), "join", vec![b::string_single("")])
        }
        SerializedValue::Helper(helper) => build_helper(ctx, helper, ctx_name),
    }
}

fn build_path(
    ctx: &mut CompilerContext<'_>,
    path: &PathValue,
    ctx_name: &str,
    wrap: bool,
) -> JsExpr {
    let head = resolved_head(&path.expression).to_string();
    let is_runtime = path.expression.starts_with("$_");
    // `Let_` heads are compiler-generated rewrites of let bindings.
    let known = path.is_arg
        || head == "this"
        || is_runtime
        || head.starts_with("Let_")
        || ctx.scope.has_binding(&head);

    if known && head != "this" && !path.is_arg && !is_runtime && !head.starts_with("Let_") {
        ctx.record_used_binding(&head);
    } else if !known {
        ctx.warn(
            WARN_UNKNOWN_BINDING,
            format!("Unknown binding \"{}\".", path.expression),
            path.root_range,
        );
        if ctx.flags.is_glimmer_compat_mode {
            let mut args = vec![b::string(path.expression.clone()), b::array(vec![])];
            if ctx.flags.with_eval_support {
                args.push(b::ident(ctx_name));
            }
            let call = b::call_at(b::runtime_ref(sym::MAYBE_HELPER), args, path.root_range);
            return if wrap { b::reactive_getter(call) } else { call };
        }
    }

    let chain = build_member_chain(path);
    if wrap && ctx.flags.is_glimmer_compat_mode {
        b::reactive_getter(chain)
    } else {
        chain
    }
}

fn build_member_chain(path: &PathValue) -> JsExpr {
    let parts = match &path.parts {
        Some(parts) if !parts.is_empty() => parts,
        // Legacy fallback: no segment info survived, so the resolved
        // expression is emitted verbatim as the reference.
        _ => {
            let mapping = extract_arg_name(&path.expression)
                .unwrap_or_else(|| resolved_head(&path.expression).to_string());
            return b::runtime_ref_mapped(path.expression.clone(), mapping, path.root_range);
        }
    };

    let root_is_this = !path.is_arg && parts[0].name == "this";
    let (root_text, mapping_name) = if path.is_arg {
        (sym::ARGS_ALIAS.to_string(), parts[0].name.clone())
    } else {
        (parts[0].name.clone(), parts[0].name.clone())
    };
    let root_range = path.root_range.or(parts[0].range);
    let mut expr = b::runtime_ref_mapped(root_text, mapping_name, root_range);

    // Segment count over the resolved form; the alias counts as the root.
    let tail: &[crate::ir::PathPart] = if path.is_arg { parts } else { &parts[1..] };
    let total_segments = tail.len() + 1;
    let chain_start = if path.is_arg { 2 } else { 1 };

    for (i, part) in tail.iter().enumerate() {
        let seg_index = i + 1;
        let optional =
            total_segments >= 3 && seg_index >= chain_start && !(root_is_this && seg_index == 1);
        expr = if is_safe_identifier(&part.name) {
            if optional {
                b::opt_member(expr, part.name.clone())
            } else {
                b::member(expr, part.name.clone())
            }
        } else if optional {
            b::computed_member_opt(expr, part.name.clone())
        } else {
            b::computed_member(expr, part.name.clone())
        };
        if let (Some(range), JsExpr::Member { range: slot, .. }) = (part.range, &mut expr) {
            *slot = Some(range);
        }
    }
    expr
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn build_helper(ctx: &mut CompilerContext<'_>, helper: &HelperValue, ctx_name: &str) -> JsExpr {
    let raw_name = helper.name.as_str();

    if raw_name == sym::ELEMENT_HELPER && !ctx.scope.has_binding(raw_name) {
        return element_helper_wrapper(ctx, helper, ctx_name);
    }

    // `@`-prefixed helper names reach into the args property and are known
    // by construction. The visitor resolves these early; the guard covers IR
    // handed straight to the lowerer.
    let name: String = if let Some(stripped) = raw_name.strip_prefix('@') {
        if is_safe_identifier(stripped) {
            format!("{}.{}", sym::ARGS_ALIAS, stripped)
        } else {
            format!("{}[\"{}\"]", sym::ARGS_ALIAS, stripped)
        }
    } else {
        raw_name.to_string()
    };

    let head = resolved_head(&name).to_string();
    let known = name == "this"
        || name.starts_with("this.")
        || name.starts_with("this[")
        || name.starts_with("$_")
        || head.starts_with("Let_")
        || ctx.scope.has_binding(&head);

    if !known {
        if name == "unless" {
            return build_unless(ctx, helper, ctx_name);
        }
        if let Some(symbol) = sym::BUILT_IN_HELPERS.get(name.as_str()) {
            return build_built_in(ctx, &name, symbol, helper, ctx_name);
        }
        ctx.warn(
            WARN_UNKNOWN_BINDING,
            format!("Unknown helper \"{}\".", name),
            helper.path_range,
        );
        let mut args = vec![
            b::string(name),
            b::array(build_positional(ctx, helper, ctx_name)),
        ];
        if !helper.named.is_empty() || ctx.flags.with_eval_support {
            args.push(build_named_object(ctx, helper, ctx_name));
        }
        if ctx.flags.with_eval_support {
            args.push(b::ident(ctx_name));
        }
        return b::call_at(b::runtime_ref(sym::MAYBE_HELPER), args, helper.path_range);
    }

    if !head.starts_with("this") && !head.starts_with("$_") && !head.starts_with("Let_") {
        ctx.record_used_binding(&head);
    }
    let fn_ref = b::runtime_ref_mapped(name, head, helper.path_range);

    if ctx.flags.with_helper_manager {
        return b::call(
            b::runtime_ref(sym::MAYBE_HELPER),
            vec![
                fn_ref,
                b::array(build_positional(ctx, helper, ctx_name)),
                build_named_object(ctx, helper, ctx_name),
            ],
        );
    }

    let mut args = build_positional(ctx, helper, ctx_name);
    if !helper.named.is_empty() {
        args.push(build_named_object(ctx, helper, ctx_name));
    }
    b::call_at(fn_ref, args, helper.path_range)
}

/// Positional arguments in the direct-call shape; paths stay unwrapped.
fn build_positional(
    ctx: &mut CompilerContext<'_>,
    helper: &HelperValue,
    ctx_name: &str,
) -> Vec<JsExpr> {
    helper
        .positional
        .iter()
        .map(|v| build_value(ctx, v, ctx_name, false))
        .collect()
}

fn build_named_object(
    ctx: &mut CompilerContext<'_>,
    helper: &HelperValue,
    ctx_name: &str,
) -> JsExpr {
    let props = helper
        .named
        .iter()
        .map(|(k, v)| (k.clone(), build_value(ctx, v, ctx_name, false)))
        .collect();
    b::object(props)
}

/// Argument filter for the reactive built-ins (`if`/`eq`/`not`/`or`/`and`).
fn reactive_arg(ctx: &mut CompilerContext<'_>, value: &SerializedValue, ctx_name: &str) -> JsExpr {
    match value {
        SerializedValue::Literal { .. }
        | SerializedValue::Path(_)
        | SerializedValue::Getter { .. }
        | SerializedValue::Spread { .. } => build_value(ctx, value, ctx_name, true),
        SerializedValue::Helper(_) | SerializedValue::Raw { .. } | SerializedValue::Concat { .. } => {
            b::reactive_getter(build_value(ctx, value, ctx_name, false))
        }
    }
}

fn build_unless(ctx: &mut CompilerContext<'_>, helper: &HelperValue, ctx_name: &str) -> JsExpr {
    let cond = helper
        .positional
        .first()
        .map(|v| reactive_arg(ctx, v, ctx_name))
        .unwrap_or_else(b::undefined);
    let when_true = helper
        .positional
        .get(2)
        .map(|v| reactive_arg(ctx, v, ctx_name))
        .unwrap_or_else(|| b::string(""));
    let when_false = helper
        .positional
        .get(1)
        .map(|v| reactive_arg(ctx, v, ctx_name))
        .unwrap_or_else(b::undefined);
    b::call_at(
        b::runtime_ref(sym::IF_HELPER),
        vec![cond, when_true, when_false],
        helper.path_range,
    )
}

fn build_built_in(
    ctx: &mut CompilerContext<'_>,
    name: &str,
    symbol: &str,
    helper: &HelperValue,
    ctx_name: &str,
) -> JsExpr {
    match name {
        "if" | "eq" | "not" | "or" | "and" => {
            let args = helper
                .positional
                .iter()
                .map(|v| reactive_arg(ctx, v, ctx_name))
                .collect();
            b::call_at(b::runtime_ref(symbol), args, helper.path_range)
        }
        "hash" => {
            // Every entry becomes a thunk; a getter produced upstream is
            // unwrapped first so evaluation is deferred exactly once.
            let props = helper
                .named
                .iter()
                .map(|(k, v)| {
                    let built = build_value(ctx, v, ctx_name, false);
                    let inner = match built {
                        JsExpr::ReactiveGetter { value, .. } => *value,
                        other => other,
                    };
                    (k.clone(), b::reactive_getter(inner))
                })
                .collect();
            b::call_at(
                b::runtime_ref(symbol),
                vec![b::object(props)],
                helper.path_range,
            )
        }
        "fn" => {
            let args = build_positional(ctx, helper, ctx_name);
            b::call_at(b::runtime_ref(symbol), args, helper.path_range)
        }
        "has-block" | "has-block-params" => {
            let bound = b::method_call(
                b::runtime_ref(symbol),
                "bind",
                vec![b::ident(ctx_name), b::ident(sym::LOCAL_SLOTS)],
            );
            if helper.positional.is_empty() {
                bound
            } else {
                b::call(bound, build_positional(ctx, helper, ctx_name))
            }
        }
        "debugger" => {
            let mut args = vec![b::ident(ctx_name)];
            args.extend(build_positional(ctx, helper, ctx_name));
            b::method_call(b::runtime_ref(symbol), "call", args)
        }
        "component" | "helper" | "modifier" => b::call_at(
            b::runtime_ref(symbol),
            vec![
                b::array(build_positional(ctx, helper, ctx_name)),
                build_named_object(ctx, helper, ctx_name),
            ],
            helper.path_range,
        ),
        _ => {
            let mut args = build_positional(ctx, helper, ctx_name);
            if !helper.named.is_empty() {
                args.push(build_named_object(ctx, helper, ctx_name));
            }
            b::call_at(b::runtime_ref(symbol), args, helper.path_range)
        }
    }
}

/// `{{element tagExpr}}`: a component wrapper rendering one default slot
/// with the dynamic tag.
fn element_helper_wrapper(
    ctx: &mut CompilerContext<'_>,
    helper: &HelperValue,
    ctx_name: &str,
) -> JsExpr {
    let tag = helper
        .positional
        .first()
        .map(|v| build_value(ctx, v, ctx_name, false))
        .unwrap_or_else(|| b::string_single("div"));
    let tag_code = crate::serializer::serialize_compact(&tag);
    b::raw(format!(
        "function () {{ const {args} = {get_args}(this, arguments); const {fw} = {get_fw}(this, arguments); const {slots} = {get_slots}(this, arguments); return {fin}({tag_fn}(() => {tag_code}, [[], [], [], {fw}], this, [{slot}('default', () => [], {slots}, this)]), this); }}",
        args = sym::ARGS_PROPERTY,
        get_args = sym::GET_ARGS,
        fw = sym::LOCAL_FW,
        get_fw = sym::GET_FW,
        slots = sym::LOCAL_SLOTS,
        get_slots = sym::GET_SLOTS,
        fin = sym::FINALIZE_COMPONENT,
        tag_fn = sym::TAG,
        tag_code = tag_code,
        slot = sym::SLOT,
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn build_element(ctx: &mut CompilerContext<'_>, el: &ElementIr, ctx_name: &str) -> JsExpr {
    match &el.tag {
        Tag::Runtime(_) => build_component(ctx, el, ctx_name),
        Tag::Static(tag) => {
            if is_component_tag(ctx, tag) {
                build_component(ctx, el, ctx_name)
            } else {
                build_plain_element(ctx, el, ctx_name)
            }
        }
    }
}

fn is_component_tag(ctx: &CompilerContext<'_>, tag: &str) -> bool {
    tag.chars().next().map_or(false, |c| c.is_ascii_uppercase())
        || tag.contains('.')
        || ctx.scope.has_local_binding(tag)
}

fn build_plain_element(ctx: &mut CompilerContext<'_>, el: &ElementIr, ctx_name: &str) -> JsExpr {
    let tag = match &el.tag {
        Tag::Static(tag) => tag.clone(),
        Tag::Runtime(_) => {
            ctx.error(
                ERR_RUNTIME_TAG_AS_ELEMENT,
                "Runtime tag reached the element lowering path.",
                el.source_range,
            );
            return b::raw("");
        }
    };

    let properties: Vec<JsExpr> = el
        .properties
        .iter()
        .map(|p| {
            b::array(vec![
                b::string_single(p.name.clone()),
                build_value(ctx, &p.value, ctx_name, true),
            ])
        })
        .collect();

    let attributes: Vec<JsExpr> = el
        .attributes
        .iter()
        .filter(|a| a.name != sym::SPLAT_ATTRIBUTES)
        .map(|a| {
            b::array(vec![
                b::string_single_at(a.name.clone(), a.name_range),
                build_value(ctx, &a.value, ctx_name, true),
            ])
        })
        .collect();

    let events: Vec<JsExpr> = el
        .events
        .iter()
        .map(|ev| build_event(ctx, ev, ctx_name))
        .collect();

    let has_splat = el.has_splat();
    let props = if properties.is_empty() && attributes.is_empty() && events.is_empty() && !has_splat
    {
        b::runtime_ref(sym::EMPTY_DOM_PROPS)
    } else {
        let mut channels = vec![b::array(properties), b::array(attributes), b::array(events)];
        if has_splat {
            channels.push(b::ident(sym::LOCAL_FW));
        }
        b::array(channels)
    };

    let mut args = vec![
        b::string_single_at(tag, el.tag_range),
        props,
        b::ident(ctx_name),
    ];

    let params: Vec<Binding> = el
        .block_params
        .iter()
        .map(|p| Binding::new(BindingKind::BlockParam, p.clone()))
        .collect();
    let children =
        ctx.with_bindings(params, |ctx| build_children(ctx, &el.children, ctx_name));
    if !children.is_empty() {
        args.push(b::formatted_array(children));
    }

    b::call_at(b::runtime_ref(sym::TAG), args, el.source_range)
}

fn build_event(ctx: &mut CompilerContext<'_>, ev: &Event, ctx_name: &str) -> JsExpr {
    let handler = match &ev.handler {
        SerializedValue::Helper(h) if h.name == sym::ON_CREATED_HANDLER => {
            let callee = h
                .positional
                .first()
                .map(|v| build_value(ctx, v, ctx_name, false))
                .unwrap_or_else(b::undefined);
            let mut args = vec![b::ident("$n")];
            for tail in h.positional.iter().skip(1) {
                args.push(build_value(ctx, tail, ctx_name, true));
            }
            b::arrow(vec!["$n"], b::call(callee, args))
        }
        SerializedValue::Helper(h) if h.name == sym::ON_HANDLER => {
            let callee = h
                .positional
                .first()
                .map(|v| build_value(ctx, v, ctx_name, false))
                .unwrap_or_else(b::undefined);
            let mut args = vec![b::ident("$e"), b::ident("$n")];
            for tail in h.positional.iter().skip(1) {
                args.push(build_value(ctx, tail, ctx_name, false));
            }
            b::arrow(vec!["$e", "$n"], b::call(callee, args))
        }
        SerializedValue::Helper(h) if ev.name == sym::EVENT_ON_CREATED => {
            build_modifier(ctx, h, ctx_name)
        }
        other => build_value(ctx, other, ctx_name, true),
    };
    b::array(vec![b::string_single(ev.name.clone()), handler])
}

fn build_modifier(ctx: &mut CompilerContext<'_>, h: &HelperValue, ctx_name: &str) -> JsExpr {
    let head = resolved_head(&h.name).to_string();
    let known = h.name.starts_with("this.")
        || h.name.starts_with("this[")
        || h.name.starts_with("$_")
        || ctx.scope.has_binding(&head);
    if known && !head.starts_with("this") && !head.starts_with("$_") {
        ctx.record_used_binding(&head);
    }

    if ctx.flags.with_modifier_manager {
        let name_or_ref = if known {
            b::runtime_ref_mapped(h.name.clone(), head, h.path_range)
        } else {
            b::string(h.name.clone())
        };
        let positional: Vec<JsExpr> = h
            .positional
            .iter()
            .map(|v| build_value(ctx, v, ctx_name, false))
            .collect();
        let named: Vec<(String, JsExpr)> = h
            .named
            .iter()
            .map(|(k, v)| (k.clone(), build_value(ctx, v, ctx_name, false)))
            .collect();
        return b::arrow(
            vec!["$n"],
            b::call(
                b::runtime_ref(sym::MAYBE_MODIFIER),
                vec![
                    name_or_ref,
                    b::ident("$n"),
                    b::array(positional),
                    b::object(named),
                ],
            ),
        );
    }

    let mut args = vec![b::ident("$n")];
    for v in &h.positional {
        args.push(build_value(ctx, v, ctx_name, false));
    }
    if !h.named.is_empty() {
        let named = h
            .named
            .iter()
            .map(|(k, v)| (k.clone(), build_value(ctx, v, ctx_name, false)))
            .collect();
        args.push(b::object(named));
    }
    b::arrow(
        vec!["$n"],
        b::call(b::runtime_ref_mapped(h.name.clone(), head, h.path_range), args),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENTS
// ═══════════════════════════════════════════════════════════════════════════════

fn build_component(ctx: &mut CompilerContext<'_>, el: &ElementIr, ctx_name: &str) -> JsExpr {
    let (tag_expr, dynamic) = match &el.tag {
        Tag::Runtime(rt) => {
            if rt.symbol.is_empty() {
                ctx.error(
                    ERR_EMPTY_RUNTIME_TAG,
                    "Runtime tag with an empty symbol.",
                    el.source_range,
                );
            }
            (b::runtime_ref(rt.symbol.clone()), true)
        }
        Tag::Static(tag) => {
            if !tag.contains('.') {
                ctx.used_bindings.insert(tag.clone());
            }
            (
                b::ident_mapped(tag.clone(), tag.clone(), el.tag_range),
                tag.contains('.'),
            )
        }
    };

    // @-arguments
    let mut arg_props: Vec<(String, JsExpr)> = el
        .attributes
        .iter()
        .filter(|a| a.name.starts_with('@'))
        .map(|a| {
            (
                a.name[1..].to_string(),
                build_value(ctx, &a.value, ctx_name, false),
            )
        })
        .collect();
    if ctx.flags.with_eval_support {
        arg_props.push(("$_scope".to_string(), b::arrow(vec![], b::ident(ctx_name))));
    }

    // Slots: `:name` children are named slots, everything else renders into
    // `default`.
    let mut default_children: Vec<Child> = Vec::new();
    let mut named_slots: Vec<(String, Vec<String>, Vec<Child>)> = Vec::new();
    for child in &el.children {
        if let Child::Element(slot_el) = child {
            if let Tag::Static(tag) = &slot_el.tag {
                if let Some(slot_name) = tag.strip_prefix(':') {
                    named_slots.push((
                        slot_name.to_string(),
                        slot_el.block_params.clone(),
                        slot_el.children.clone(),
                    ));
                    continue;
                }
            }
        }
        default_children.push(child.clone());
    }

    let mut slots = vec![(
        "default".to_string(),
        el.block_params.clone(),
        default_children,
    )];
    slots.extend(named_slots);

    let mut slot_props: Vec<(String, JsExpr)> = Vec::new();
    for (name, params, children) in slots {
        slot_props.push((format!("{}_", name), b::boolean(!params.is_empty())));
        let closure = ctx.with_slot_ctx(|ctx, slot_ctx| {
            let bindings = params
                .iter()
                .map(|p| Binding::new(BindingKind::BlockParam, p.clone()))
                .collect();
            ctx.with_bindings(bindings, |ctx| {
                let items = build_children(ctx, &children, &slot_ctx);
                let mut arrow_params = vec![slot_ctx];
                arrow_params.extend(params.iter().cloned());
                b::arrow_owned(arrow_params, b::array(items))
            })
        });
        slot_props.push((name, closure));
    }

    // Forwarded props triple.
    let has_splat = el.has_splat();
    let mut prop_items: Vec<JsExpr> = el
        .properties
        .iter()
        .map(|p| {
            b::array(vec![
                b::string_single(p.name.clone()),
                build_value(ctx, &p.value, ctx_name, true),
            ])
        })
        .collect();
    let mut attr_items: Vec<JsExpr> = el
        .attributes
        .iter()
        .filter(|a| !a.name.starts_with('@') && a.name != sym::SPLAT_ATTRIBUTES)
        .map(|a| {
            b::array(vec![
                b::string_single_at(a.name.clone(), a.name_range),
                build_value(ctx, &a.value, ctx_name, true),
            ])
        })
        .collect();
    let mut event_items: Vec<JsExpr> = el
        .events
        .iter()
        .map(|ev| build_event(ctx, ev, ctx_name))
        .collect();
    if has_splat {
        for (channel, items) in [
            (0u32, &mut prop_items),
            (1u32, &mut attr_items),
            (2u32, &mut event_items),
        ] {
            items.push(b::spread(b::computed_member(
                b::ident(sym::LOCAL_FW),
                channel.to_string(),
            )));
        }
    }
    let props_triple = b::array(vec![
        b::array(prop_items),
        b::array(attr_items),
        b::array(event_items),
    ]);

    let args_call = b::call(
        b::runtime_ref(sym::ARGS),
        vec![
            b::object(arg_props),
            b::object(slot_props),
            props_triple,
        ],
    );

    if dynamic {
        b::call_at(
            b::runtime_ref(sym::DYNAMIC_COMPONENT),
            vec![b::arrow(vec![], tag_expr), args_call, b::ident(ctx_name)],
            el.source_range,
        )
    } else {
        b::call_at(
            b::runtime_ref(sym::COMPONENT),
            vec![tag_expr, args_call, b::ident(ctx_name)],
            el.source_range,
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROL FLOW
// ═══════════════════════════════════════════════════════════════════════════════

pub fn build_control(ctx: &mut CompilerContext<'_>, control: &ControlIr, ctx_name: &str) -> JsExpr {
    match control.kind {
        ControlKind::If => {
            let cond = build_value(ctx, &control.condition, ctx_name, false);
            let when_true = build_branch(ctx, &control.children);
            let when_false = build_branch(ctx, control.inverse.as_deref().unwrap_or(&[]));
            b::call_at(
                b::runtime_ref(sym::IF),
                vec![cond, when_true, when_false, b::ident(ctx_name)],
                control.source_range,
            )
        }
        ControlKind::Each => build_each(ctx, control, ctx_name),
        ControlKind::Yield => {
            let name = control.key.clone().unwrap_or_else(|| "default".to_string());
            let params: Vec<JsExpr> = control
                .block_params
                .iter()
                .map(|p| b::raw(p.clone()))
                .collect();
            b::call_at(
                b::runtime_ref(sym::SLOT),
                vec![
                    b::string_single(name),
                    b::arrow(vec![], b::array(params)),
                    b::ident(sym::LOCAL_SLOTS),
                    b::ident(ctx_name),
                ],
                control.source_range,
            )
        }
        ControlKind::InElement => {
            let target = build_value(ctx, &control.condition, ctx_name, false);
            let body = ctx.with_child_ctx(|ctx, inner| {
                let items = build_children(ctx, &control.children, &inner);
                b::arrow_owned(vec![inner], b::formatted_array(items))
            });
            b::call_at(
                b::runtime_ref(sym::IN_ELEMENT),
                vec![target, body, b::ident(ctx_name)],
                control.source_range,
            )
        }
        ControlKind::Component => build_curly_component(ctx, control, ctx_name),
    }
}

fn build_branch(ctx: &mut CompilerContext<'_>, children: &[Child]) -> JsExpr {
    ctx.with_child_ctx(|ctx, outer| {
        if children.is_empty() {
            return b::arrow_owned(vec![outer], b::array(vec![]));
        }
        let body = ctx.with_child_ctx(|ctx, inner| {
            let items = build_children(ctx, children, &inner);
            b::call(
                b::runtime_ref(sym::UCW),
                vec![
                    b::arrow_owned(vec![inner], b::formatted_array(items)),
                    b::ident(outer.clone()),
                ],
            )
        });
        b::arrow_owned(vec![outer], body)
    })
}

fn build_each(ctx: &mut CompilerContext<'_>, control: &ControlIr, ctx_name: &str) -> JsExpr {
    let iter = build_value(ctx, &control.condition, ctx_name, false);
    let item = control
        .block_params
        .first()
        .cloned()
        .unwrap_or_else(|| sym::NOOP_PARAM.to_string());
    let index = control
        .block_params
        .get(1)
        .cloned()
        .unwrap_or_else(|| sym::INDEX_PARAM.to_string());

    let stable = has_stable_childs_for_control_node(&control.children);
    let bindings = vec![
        Binding::new(BindingKind::BlockParam, item.clone()),
        Binding::new(BindingKind::BlockParam, index.clone()),
    ];
    let callback = ctx.with_bindings(bindings, |ctx| {
        ctx.with_child_ctx(|ctx, outer| {
            if stable {
                let items = build_children(ctx, &control.children, &outer);
                b::arrow_owned(
                    vec![item.clone(), index.clone(), outer],
                    b::formatted_array(items),
                )
            } else {
                let body = ctx.with_child_ctx(|ctx, inner| {
                    let items = build_children(ctx, &control.children, &inner);
                    b::call(
                        b::runtime_ref(sym::UCW),
                        vec![
                            b::arrow_owned(vec![inner], b::formatted_array(items)),
                            b::ident(outer.clone()),
                        ],
                    )
                });
                b::arrow_owned(vec![item.clone(), index.clone(), outer], body)
            }
        })
    });
    // The callback itself binds the index param; rewriting starts at its
    // body so references become `.value` cell reads.
    let mut callback = callback;
    if let JsExpr::Arrow { body, .. } = &mut callback {
        match body {
            ArrowBody::Expr(e) => rewrite_index_refs(e, &index),
            ArrowBody::Block(stmts) => {
                for stmt in stmts.iter_mut() {
                    rewrite_index_stmt(stmt, &index);
                }
            }
        }
    }

    let key = match &control.key {
        Some(k) => b::string(k.clone()),
        None => b::null(),
    };
    let callee = if control.is_sync {
        sym::EACH_SYNC
    } else {
        sym::EACH
    };
    b::call_at(
        b::runtime_ref(callee),
        vec![iter, callback, key, b::ident(ctx_name)],
        control.source_range,
    )
}

/// Custom block names invoke the named component with the block body as its
/// default slot.
fn build_curly_component(
    ctx: &mut CompilerContext<'_>,
    control: &ControlIr,
    ctx_name: &str,
) -> JsExpr {
    let tag_expr = build_value(ctx, &control.condition, ctx_name, false);
    let mut slot_props = vec![(
        "default_".to_string(),
        b::boolean(!control.block_params.is_empty()),
    )];
    let closure = ctx.with_slot_ctx(|ctx, slot_ctx| {
        let bindings = control
            .block_params
            .iter()
            .map(|p| Binding::new(BindingKind::BlockParam, p.clone()))
            .collect();
        ctx.with_bindings(bindings, |ctx| {
            let items = build_children(ctx, &control.children, &slot_ctx);
            let mut params = vec![slot_ctx];
            params.extend(control.block_params.iter().cloned());
            b::arrow_owned(params, b::array(items))
        })
    });
    slot_props.push(("default".to_string(), closure));

    let args_call = b::call(
        b::runtime_ref(sym::ARGS),
        vec![
            b::object(vec![]),
            b::object(slot_props),
            b::array(vec![b::array(vec![]), b::array(vec![]), b::array(vec![])]),
        ],
    );
    b::call_at(
        b::runtime_ref(sym::COMPONENT),
        vec![tag_expr, args_call, b::ident(ctx_name)],
        control.source_range,
    )
}

/// True iff the control body can render without an unstable-child wrapper:
/// exactly one real child, an element without events and children (or one
/// explicitly marked stable).
pub fn has_stable_childs_for_control_node(children: &[Child]) -> bool {
    let real: Vec<&Child> = children
        .iter()
        .filter(|c| !matches!(c, Child::Text { value } if value.trim().is_empty()))
        .collect();
    if real.len() != 1 {
        return false;
    }
    match real[0] {
        Child::Element(el) => {
            (el.events.is_empty() && el.children.is_empty()) || el.has_stable_child
        }
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INDEX REWRITING
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrites references to an each-block index param to its `.value` cell
/// access across a whole JS subtree.
pub fn rewrite_index_refs(expr: &mut JsExpr, index_param: &str) {
    let rewrite_name = |name: &mut String| {
        if name == index_param {
            *name = format!("{}.value", index_param);
        } else if let Some(rest) = name.strip_prefix(&format!("{}.", index_param)) {
            *name = format!("{}.value.{}", index_param, rest);
        }
    };
    match expr {
        JsExpr::Ident { name, .. } | JsExpr::RuntimeRef { name, .. } => rewrite_name(name),
        JsExpr::Member { object, .. } => rewrite_index_refs(object, index_param),
        JsExpr::Call { callee, args, .. } => {
            rewrite_index_refs(callee, index_param);
            for arg in args {
                rewrite_index_refs(arg, index_param);
            }
        }
        JsExpr::Arrow { params, body } => {
            // A nested closure re-binding the name shadows the cell.
            if params.iter().any(|p| p == index_param) {
                return;
            }
            match body {
                ArrowBody::Expr(e) => rewrite_index_refs(e, index_param),
                ArrowBody::Block(stmts) => {
                    for stmt in stmts {
                        rewrite_index_stmt(stmt, index_param);
                    }
                }
            }
        }
        JsExpr::Array { items, .. } => {
            for item in items {
                rewrite_index_refs(item, index_param);
            }
        }
        JsExpr::Object { props, .. } => {
            for (_, value) in props {
                rewrite_index_refs(value, index_param);
            }
        }
        JsExpr::Spread(inner) => rewrite_index_refs(inner, index_param),
        JsExpr::Binary { left, right, .. } => {
            rewrite_index_refs(left, index_param);
            rewrite_index_refs(right, index_param);
        }
        JsExpr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            rewrite_index_refs(test, index_param);
            rewrite_index_refs(consequent, index_param);
            rewrite_index_refs(alternate, index_param);
        }
        JsExpr::ReactiveGetter { value, .. } => rewrite_index_refs(value, index_param),
        JsExpr::Iife { body } => {
            for stmt in body {
                rewrite_index_stmt(stmt, index_param);
            }
        }
        JsExpr::Num(_)
        | JsExpr::Str { .. }
        | JsExpr::Bool(_)
        | JsExpr::Null
        | JsExpr::Undefined
        | JsExpr::Raw(_) => {}
    }
}

fn rewrite_index_stmt(stmt: &mut crate::builder::JsStmt, index_param: &str) {
    match stmt {
        crate::builder::JsStmt::VarDecl { init, .. } => rewrite_index_refs(init, index_param),
        crate::builder::JsStmt::Return(e) | crate::builder::JsStmt::Expr(e) => {
            rewrite_index_refs(e, index_param)
        }
    }
}
