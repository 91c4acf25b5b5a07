//! Runtime symbol table for the Filament compiler.
//!
//! Every identifier the emitted code calls into is defined here, in one
//! place, so the compiler and the runtime agree on names and arities. The
//! `$_` prefix marks runtime imports, `$__` marks built-in helpers, and the
//! `$:`-prefixed names are internal IR markers that never reach the output
//! (template paths cannot contain `:`).

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

// ═══════════════════════════════════════════════════════════════════════════════
// RUNTIME SYMBOLS
// ═══════════════════════════════════════════════════════════════════════════════

/// DOM element constructor: `$_tag(tag, props, ctx, children?)`.
pub const TAG: &str = "$_tag";
/// Component constructor: `$_c(tag, $_args(...), ctx)`.
pub const COMPONENT: &str = "$_c";
/// Dynamic component constructor: `$_dc(() => tag, $_args(...), ctx)`.
pub const DYNAMIC_COMPONENT: &str = "$_dc";
/// Component argument packer: `$_args(args, slots, props)`.
pub const ARGS: &str = "$_args";
/// Property on the component instance holding named arguments.
pub const ARGS_PROPERTY: &str = "$args";
/// Resolved-path prefix for `@`-argument access.
pub const ARGS_ALIAS: &str = "this[$args]";
/// Shared empty `[props, attrs, events]` triple.
pub const EMPTY_DOM_PROPS: &str = "$_edp";

pub const IF: &str = "$_if";
pub const EACH: &str = "$_each";
pub const EACH_SYNC: &str = "$_eachSync";
/// Unstable child wrapper: reactivity + destruction scoping for a branch.
pub const UCW: &str = "$_ucw";
pub const SLOT: &str = "$_slot";
pub const IN_ELEMENT: &str = "$_inElement";

pub const MAYBE_HELPER: &str = "$_maybeHelper";
pub const MAYBE_MODIFIER: &str = "$_maybeModifier";

pub const GET_ARGS: &str = "$_getArgs";
pub const GET_FW: &str = "$_getFw";
pub const GET_SLOTS: &str = "$_getSlots";
pub const FINALIZE_COMPONENT: &str = "$_fin";

/// Forwarding triple local (`[props, attrs, events]`) in a component body.
pub const LOCAL_FW: &str = "$fw";
/// Slots object local in a component body.
pub const LOCAL_SLOTS: &str = "$slots";

/// Namespace providers; always invoked through the component path.
pub const SVG_PROVIDER: &str = "$_svgProvider";
pub const MATH_PROVIDER: &str = "$_mathProvider";
pub const HTML_PROVIDER: &str = "$_htmlProvider";

// ═══════════════════════════════════════════════════════════════════════════════
// BUILT-IN HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

pub const IF_HELPER: &str = "$__if";
pub const EQ: &str = "$__eq";
pub const NOT: &str = "$__not";
pub const OR: &str = "$__or";
pub const AND: &str = "$__and";
pub const HASH: &str = "$__hash";
pub const FN: &str = "$__fn";
pub const HAS_BLOCK: &str = "$__hasBlock";
pub const HAS_BLOCK_PARAMS: &str = "$__hasBlockParams";
pub const DEBUGGER: &str = "$__debugger";
pub const COMPONENT_HELPER: &str = "$__componentHelper";
pub const HELPER_HELPER: &str = "$__helperHelper";
pub const MODIFIER_HELPER: &str = "$__modifierHelper";
/// Style helper: `$__style(node, propertyName, value)`.
pub const STYLE: &str = "$__style";

// ═══════════════════════════════════════════════════════════════════════════════
// INTERNAL MARKERS (never emitted)
// ═══════════════════════════════════════════════════════════════════════════════

/// Event-type code for node-creation hooks.
pub const EVENT_ON_CREATED: &str = "0";
/// Event-type code for the text-content channel.
pub const EVENT_TEXT_CONTENT: &str = "1";
/// Helper-name marker for `@oncreated` handlers: `($n) => fn($n, tail...)`.
pub const ON_CREATED_HANDLER: &str = "$:onCreated";
/// Helper-name marker for `{{on}}` modifiers: `($e, $n) => fn($e, $n, tail...)`.
pub const ON_HANDLER: &str = "$:on";
/// Keyword helper producing an element wrapper component.
pub const ELEMENT_HELPER: &str = "element";

/// Default item param for `{{#each}}` blocks without block params.
pub const NOOP_PARAM: &str = "$noop";
/// Default index param for `{{#each}}` blocks without an index param.
pub const INDEX_PARAM: &str = "$index";

/// Splat-attributes marker as it appears in the attribute channel.
pub const SPLAT_ATTRIBUTES: &str = "...attributes";

lazy_static! {
    /// Template-visible helper names that resolve to built-in runtime helpers
    /// unless shadowed by a local binding.
    pub static ref BUILT_IN_HELPERS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("if", IF_HELPER);
        m.insert("eq", EQ);
        m.insert("not", NOT);
        m.insert("or", OR);
        m.insert("and", AND);
        m.insert("hash", HASH);
        m.insert("fn", FN);
        m.insert("has-block", HAS_BLOCK);
        m.insert("has-block-params", HAS_BLOCK_PARAMS);
        m.insert("debugger", DEBUGGER);
        m.insert("component", COMPONENT_HELPER);
        m.insert("helper", HELPER_HELPER);
        m.insert("modifier", MODIFIER_HELPER);
        m.insert("style", STYLE);
        m
    };

    /// Helpers whose positional arguments go through the reactive filter.
    pub static ref REACTIVE_HELPERS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("if");
        s.insert("eq");
        s.insert("not");
        s.insert("or");
        s.insert("and");
        s
    };

    /// Runtime calls safe to annotate with `/*#__PURE__*/`.
    pub static ref PURE_FUNCTIONS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert(TAG);
        s.insert(COMPONENT);
        s.insert(DYNAMIC_COMPONENT);
        s.insert(ARGS);
        s.insert(IF);
        s.insert(EACH);
        s.insert(EACH_SYNC);
        s.insert(SLOT);
        s.insert(IN_ELEMENT);
        s.insert(HASH);
        s.insert(FN);
        s
    };

    /// Names set through `setAttribute` rather than as DOM properties.
    pub static ref HTML_ATTRS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for name in [
            "id", "style", "href", "src", "alt", "title", "role", "type",
            "name", "placeholder", "target", "rel", "method", "action",
            "width", "height", "lang", "dir", "slot", "rows", "cols", "span",
            "min", "max", "step", "pattern", "accept", "autocomplete",
            "download", "loading", "media", "sizes", "srcset", "integrity",
            "crossorigin", "referrerpolicy", "part", "is", "list", "form",
            "wrap", "preload", "poster",
        ] {
            s.insert(name);
        }
        s
    };

    /// Attribute-name to DOM-property-name remaps for the property channel.
    pub static ref PROPERTY_REMAP: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("class", "className");
        m.insert("for", "htmlFor");
        m.insert("readonly", "readOnly");
        m.insert("tabindex", "tabIndex");
        m.insert("colspan", "colSpan");
        m.insert("rowspan", "rowSpan");
        m.insert("maxlength", "maxLength");
        m.insert("cellpadding", "cellPadding");
        m.insert("cellspacing", "cellSpacing");
        m.insert("usemap", "useMap");
        m.insert("frameborder", "frameBorder");
        m.insert("contenteditable", "contentEditable");
        m
    };

    /// Named HTML entities decoded in text nodes. Numeric forms are handled
    /// separately; unknown entities pass through verbatim.
    pub static ref NAMED_ENTITIES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("amp", "&");
        m.insert("lt", "<");
        m.insert("gt", ">");
        m.insert("quot", "\"");
        m.insert("apos", "'");
        m.insert("nbsp", "\u{a0}");
        m.insert("copy", "\u{a9}");
        m.insert("reg", "\u{ae}");
        m.insert("trade", "\u{2122}");
        m.insert("hellip", "\u{2026}");
        m.insert("mdash", "\u{2014}");
        m.insert("ndash", "\u{2013}");
        m.insert("lsquo", "\u{2018}");
        m.insert("rsquo", "\u{2019}");
        m.insert("ldquo", "\u{201c}");
        m.insert("rdquo", "\u{201d}");
        m.insert("laquo", "\u{ab}");
        m.insert("raquo", "\u{bb}");
        m.insert("times", "\u{d7}");
        m.insert("divide", "\u{f7}");
        m.insert("larr", "\u{2190}");
        m.insert("uarr", "\u{2191}");
        m.insert("rarr", "\u{2192}");
        m.insert("darr", "\u{2193}");
        m.insert("deg", "\u{b0}");
        m.insert("middot", "\u{b7}");
        m.insert("bull", "\u{2022}");
        m.insert("sect", "\u{a7}");
        m.insert("para", "\u{b6}");
        m
    };

    /// Identifiers that template bindings may not shadow.
    pub static ref RESERVED_BINDING_NAMES: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("this");
        s.insert("self");
        s.insert("ctx");
        s.insert(ARGS_PROPERTY);
        s.insert(LOCAL_FW);
        s.insert(LOCAL_SLOTS);
        s.insert(NOOP_PARAM);
        s.insert(INDEX_PARAM);
        s
    };
}

/// True when `name` is reserved for the runtime protocol.
pub fn is_reserved_binding(name: &str) -> bool {
    RESERVED_BINDING_NAMES.contains(name) || name.starts_with("$_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_helper_lookup() {
        assert_eq!(BUILT_IN_HELPERS.get("eq"), Some(&EQ));
        assert_eq!(BUILT_IN_HELPERS.get("has-block"), Some(&HAS_BLOCK));
        assert!(BUILT_IN_HELPERS.get("unless").is_none());
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved_binding("$_tag"));
        assert!(is_reserved_binding("this"));
        assert!(is_reserved_binding("$slots"));
        assert!(!is_reserved_binding("item"));
    }

    #[test]
    fn property_remap_covers_class() {
        assert_eq!(PROPERTY_REMAP.get("class"), Some(&"className"));
        assert_eq!(PROPERTY_REMAP.get("tabindex"), Some(&"tabIndex"));
    }
}
