//! Dotted-path resolution against the scope state.
//!
//! Turns template paths (`@title`, `this.user.name`, `item.label`) into the
//! resolved JS form stored on the IR, applies the optional-chaining policy,
//! and hosts the identifier classification regexes.

use lazy_static::lazy_static;
use regex::Regex;

use crate::ast::PathExpression;
use crate::scope::ScopeTracker;
use crate::symbols;

lazy_static! {
    static ref SAFE_IDENT_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
    static ref ARG_NAME_RE: Regex =
        Regex::new(r#"this\[\$args\](?:\.([A-Za-z_$][A-Za-z0-9_$]*)|\["([^"]+)"\])"#).unwrap();
}

/// True when `name` can be emitted as a bare identifier / dotted member.
pub fn is_safe_identifier(name: &str) -> bool {
    SAFE_IDENT_RE.is_match(name)
}

/// Pulls the argument name out of a resolved `this[$args].x` /
/// `this[$args]["x"]` form.
pub fn extract_arg_name(expression: &str) -> Option<String> {
    let caps = ARG_NAME_RE.captures(expression)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Head identifier of a resolved expression (`this` for instance paths).
pub fn resolved_head(expression: &str) -> &str {
    if expression == "this" || expression.starts_with("this.") || expression.starts_with("this[") {
        return "this";
    }
    let end = expression
        .find(|c| c == '.' || c == '[' || c == '(')
        .unwrap_or(expression.len());
    &expression[..end]
}

/// Resolves a parsed path to its emitted string form. Scope bindings win
/// over everything; unknown heads pass through untouched (classifying them
/// is the lowerer's job).
pub fn resolve_path(scope: &ScopeTracker<'_>, path: &PathExpression) -> String {
    let resolved = if path.is_data {
        let head = path.parts.first().map(String::as_str).unwrap_or("");
        let mut out = if is_safe_identifier(head) {
            format!("{}.{}", symbols::ARGS_ALIAS, head)
        } else {
            format!("{}[\"{}\"]", symbols::ARGS_ALIAS, head)
        };
        for part in path.parts.iter().skip(1) {
            push_segment(&mut out, part);
        }
        out
    } else if path.is_this {
        path.original.clone()
    } else {
        let head = path.head().to_string();
        match scope.resolve(&head) {
            Some(binding) => match &binding.original_name {
                // Rewritten bindings (let blocks) substitute their
                // replacement for the head segment.
                Some(replacement) => {
                    let tail = &path.original[head.len()..];
                    format!("{}{}", replacement, tail)
                }
                None => path.original.clone(),
            },
            None => path.original.clone(),
        }
    };
    to_safe_js_path(&resolved)
}

fn push_segment(out: &mut String, segment: &str) {
    if is_safe_identifier(segment) {
        out.push('.');
        out.push_str(segment);
    } else if segment.chars().all(|c| c.is_ascii_digit()) {
        out.push('[');
        out.push_str(segment);
        out.push(']');
    } else {
        out.push_str("[\"");
        out.push_str(segment);
        out.push_str("\"]");
    }
}

/// Optional-chaining policy: paths with three or more dot segments get
/// `?.` on every interior access, then `this.` and `this[$args].` are
/// restored to plain access. Quoted segments and runtime symbols are left
/// alone.
pub fn to_safe_js_path(path: &str) -> String {
    if path.contains('"') || path.contains('\'') || path.starts_with("$_") {
        return path.to_string();
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() < 3 {
        return path.to_string();
    }
    let mut out = segments.join("?.");
    if out.starts_with("this?.") {
        out = out.replacen("this?.", "this.", 1);
    }
    let args_prefix = format!("{}?.", symbols::ARGS_ALIAS);
    if out.starts_with(&args_prefix) {
        out = out.replacen(&args_prefix, &format!("{}.", symbols::ARGS_ALIAS), 1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Binding, BindingKind};
    use serde_json::json;

    fn path(v: serde_json::Value) -> PathExpression {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn resolves_args() {
        let scope = ScopeTracker::new(None);
        let p = path(json!({ "original": "@title", "parts": ["title"], "data": true }));
        assert_eq!(resolve_path(&scope, &p), "this[$args].title");

        let odd = path(json!({ "original": "@data-id", "parts": ["data-id"], "data": true }));
        assert_eq!(resolve_path(&scope, &odd), "this[$args][\"data-id\"]");
    }

    #[test]
    fn this_paths_pass_through() {
        let scope = ScopeTracker::new(None);
        let p = path(json!({ "original": "this.a", "parts": ["a"], "this": true }));
        assert_eq!(resolve_path(&scope, &p), "this.a");
    }

    #[test]
    fn let_binding_head_is_replaced() {
        let mut scope = ScopeTracker::new(None);
        scope.add_binding(Binding::new(BindingKind::LetBinding, "color").renamed_to("Let_color_scope0()"));
        let p = path(json!({ "original": "color.hex", "parts": ["color", "hex"] }));
        assert_eq!(resolve_path(&scope, &p), "Let_color_scope0().hex");
    }

    #[test]
    fn optional_chaining_policy() {
        assert_eq!(to_safe_js_path("a.b"), "a.b");
        assert_eq!(to_safe_js_path("a.b.c"), "a?.b?.c");
        assert_eq!(to_safe_js_path("this.a.b.c"), "this.a?.b?.c");
        assert_eq!(
            to_safe_js_path("this[$args].x.y"),
            "this[$args].x?.y"
        );
        assert_eq!(to_safe_js_path("a.b[0].c"), "a?.b[0]?.c");
        assert_eq!(to_safe_js_path("x[\"a.b\"].c"), "x[\"a.b\"].c");
        assert_eq!(to_safe_js_path("$_tag.a.b"), "$_tag.a.b");
    }

    #[test]
    fn arg_name_extraction() {
        assert_eq!(extract_arg_name("this[$args].title"), Some("title".into()));
        assert_eq!(
            extract_arg_name("this[$args][\"data-id\"]"),
            Some("data-id".into())
        );
        assert_eq!(extract_arg_name("this.title"), None);
    }

    #[test]
    fn head_of_resolved_forms() {
        assert_eq!(resolved_head("this[$args].x"), "this");
        assert_eq!(resolved_head("item.name"), "item");
        assert_eq!(resolved_head("Let_x_scope0().y"), "Let_x_scope0");
        assert_eq!(resolved_head("$_tag"), "$_tag");
    }
}
