//! Intermediate representation between the template visitor and the JS
//! lowerer.
//!
//! Two node kinds (`ElementIr`, `ControlIr`) and one value sum type
//! (`SerializedValue`). Built during a single traversal, consumed by the
//! lowerer, then dropped — the IR is never part of the public result.

use serde::{Deserialize, Serialize};

use crate::ranges::SourceRange;

// ═══════════════════════════════════════════════════════════════════════════════
// VALUES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPart {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathValue {
    /// Resolved JS form, optional chaining already applied.
    pub expression: String,
    pub is_arg: bool,
    /// Segment list including the root (`this`, the arg name, or the local
    /// head). Always populated by the visitor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<PathPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_range: Option<SourceRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperValue {
    /// Helper head: a resolved path form or a bare name; internal markers
    /// use a `$:` prefix.
    pub name: String,
    pub positional: Vec<SerializedValue>,
    pub named: Vec<(String, SerializedValue)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_range: Option<SourceRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SerializedValue {
    Literal { value: LiteralValue },
    Path(PathValue),
    Spread { expression: String },
    Raw { code: String },
    Helper(HelperValue),
    Getter { value: Box<SerializedValue> },
    Concat { parts: Vec<SerializedValue> },
}

impl SerializedValue {
    pub fn string(s: impl Into<String>) -> Self {
        SerializedValue::Literal {
            value: LiteralValue::Str(s.into()),
        }
    }

    pub fn bool(b: bool) -> Self {
        SerializedValue::Literal {
            value: LiteralValue::Bool(b),
        }
    }

    /// Literal and raw values can be stored directly in a let binding;
    /// everything else goes through a thunk.
    pub fn is_primitive(&self) -> bool {
        matches!(self, SerializedValue::Literal { .. })
    }

    /// Textual scan over the value tree; drives the text-child optimization
    /// guard (no slot or splat material may be folded into text content).
    pub fn mentions(&self, needle: &str) -> bool {
        match self {
            SerializedValue::Literal { value } => match value {
                LiteralValue::Str(s) => s.contains(needle),
                _ => false,
            },
            SerializedValue::Path(p) => p.expression.contains(needle),
            SerializedValue::Spread { expression } => {
                needle == "..." || expression.contains(needle)
            }
            SerializedValue::Raw { code } => code.contains(needle),
            SerializedValue::Helper(h) => {
                h.name.contains(needle)
                    || h.positional.iter().any(|p| p.mentions(needle))
                    || h.named.iter().any(|(_, v)| v.mentions(needle))
            }
            SerializedValue::Getter { value } => value.mentions(needle),
            SerializedValue::Concat { parts } => parts.iter().any(|p| p.mentions(needle)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODES
// ═══════════════════════════════════════════════════════════════════════════════

/// Dynamic roots (namespace providers) carry a runtime symbol instead of a
/// tag name and always take the component path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeTag {
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tag {
    Static(String),
    Runtime(RuntimeTag),
}

/// `[name, value, range?, nameRange?]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub value: SerializedValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_range: Option<SourceRange>,
}

/// `[name, value, range?]`; the empty-name entry is the class-merging
/// channel the runtime understands when splat attributes are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub value: SerializedValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
}

/// `[name, handler, range?]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub name: String,
    pub handler: SerializedValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<SourceRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Child {
    Text { value: String },
    Expr { value: SerializedValue },
    Element(Box<ElementIr>),
    Control(Box<ControlIr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementIr {
    pub tag: Tag,
    pub attributes: Vec<Attribute>,
    pub properties: Vec<Property>,
    pub events: Vec<Event>,
    pub block_params: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_param_ranges: Option<Vec<SourceRange>>,
    pub children: Vec<Child>,
    pub self_closing: bool,
    pub has_stable_child: bool,
    /// Set on elements re-parented under a namespace provider so the inner
    /// pass does not wrap them again.
    #[serde(default)]
    pub namespace_wrapped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_range: Option<SourceRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_range: Option<SourceRange>,
}

impl ElementIr {
    pub fn new(tag: Tag) -> Self {
        ElementIr {
            tag,
            attributes: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            block_params: Vec::new(),
            block_param_ranges: None,
            children: Vec::new(),
            self_closing: false,
            has_stable_child: false,
            namespace_wrapped: false,
            source_range: None,
            tag_range: None,
        }
    }

    pub fn has_splat(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| a.name == crate::symbols::SPLAT_ATTRIBUTES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlKind {
    If,
    Each,
    Yield,
    InElement,
    Component,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlIr {
    pub kind: ControlKind,
    pub condition: SerializedValue,
    pub children: Vec<Child>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverse: Option<Vec<Child>>,
    /// Serialized block-param names; for yields these are the serialized
    /// slot arguments.
    pub block_params: Vec<String>,
    /// List identity for `each`, slot name for `yield`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub is_sync: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_range: Option<SourceRange>,
}

impl ControlIr {
    pub fn new(kind: ControlKind, condition: SerializedValue) -> Self {
        ControlIr {
            kind,
            condition,
            children: Vec::new(),
            inverse: None,
            block_params: Vec::new(),
            key: None,
            is_sync: false,
            source_range: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_walks_nested_values() {
        let v = SerializedValue::Helper(HelperValue {
            name: "$__if".into(),
            positional: vec![SerializedValue::Raw {
                code: "$_slot('default')".into(),
            }],
            named: vec![],
            path_range: None,
        });
        assert!(v.mentions("$_slot"));
        assert!(!v.mentions("$_tag"));
    }

    #[test]
    fn splat_detection() {
        let mut el = ElementIr::new(Tag::Static("div".into()));
        assert!(!el.has_splat());
        el.attributes.push(Attribute {
            name: crate::symbols::SPLAT_ATTRIBUTES.into(),
            value: SerializedValue::string(""),
            range: None,
            name_range: None,
        });
        assert!(el.has_splat());
    }
}
