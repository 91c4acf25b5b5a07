//! Input syntax tree for the Filament template dialect.
//!
//! Lexical parsing happens upstream (in the JS toolchain); the parsed tree
//! crosses the boundary as JSON and deserializes into these types. Shapes
//! mirror the parser's node vocabulary one-to-one, so `serde_json` round-trips
//! without an adapter layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loc {
    pub start: Position,
    pub end: Position,
}

/// Root of one parsed template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    ElementNode(ElementNode),
    TextNode(TextNode),
    MustacheStatement(MustacheStatement),
    BlockStatement(BlockStatement),
    CommentStatement(CommentStatement),
    MustacheCommentStatement(CommentStatement),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    #[serde(default)]
    pub attributes: Vec<AttrNode>,
    #[serde(default)]
    pub modifiers: Vec<ElementModifierStatement>,
    #[serde(default)]
    pub children: Vec<Statement>,
    #[serde(default)]
    pub block_params: Vec<String>,
    #[serde(default)]
    pub self_closing: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub chars: String,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentStatement {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MustacheStatement {
    pub path: Expression,
    #[serde(default)]
    pub params: Vec<Expression>,
    #[serde(default)]
    pub hash: Hash,
    #[serde(default)]
    pub trusting: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStatement {
    pub path: Expression,
    #[serde(default)]
    pub params: Vec<Expression>,
    #[serde(default)]
    pub hash: Hash,
    pub program: Block,
    #[serde(default)]
    pub inverse: Option<Block>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

/// A block body (`program` or `inverse`) with its own params.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default)]
    pub block_params: Vec<String>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttrNode {
    pub name: String,
    pub value: AttrValue,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AttrValue {
    TextNode(TextNode),
    MustacheStatement(MustacheStatement),
    ConcatStatement(ConcatStatement),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcatStatement {
    #[serde(default)]
    pub parts: Vec<ConcatPart>,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConcatPart {
    TextNode(TextNode),
    MustacheStatement(MustacheStatement),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementModifierStatement {
    pub path: Expression,
    #[serde(default)]
    pub params: Vec<Expression>,
    #[serde(default)]
    pub hash: Hash,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hash {
    #[serde(default)]
    pub pairs: Vec<HashPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashPair {
    pub key: String,
    pub value: Expression,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    PathExpression(PathExpression),
    SubExpression(SubExpression),
    StringLiteral(StringLiteral),
    NumberLiteral(NumberLiteral),
    BooleanLiteral(BooleanLiteral),
    NullLiteral(NullLiteral),
    UndefinedLiteral(UndefinedLiteral),
}

impl Expression {
    pub fn loc(&self) -> Option<&Loc> {
        match self {
            Expression::PathExpression(p) => p.loc.as_ref(),
            Expression::SubExpression(s) => s.loc.as_ref(),
            Expression::StringLiteral(l) => l.loc.as_ref(),
            Expression::NumberLiteral(l) => l.loc.as_ref(),
            Expression::BooleanLiteral(l) => l.loc.as_ref(),
            Expression::NullLiteral(l) => l.loc.as_ref(),
            Expression::UndefinedLiteral(l) => l.loc.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathExpression {
    /// Source form of the path, e.g. `this.user.name` or `@title`.
    pub original: String,
    /// Tail segments (without the `this`/`@` head).
    #[serde(default)]
    pub parts: Vec<String>,
    /// True for `this` / `this.*` paths.
    #[serde(rename = "this", default)]
    pub is_this: bool,
    /// True for `@`-argument paths.
    #[serde(rename = "data", default)]
    pub is_data: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

impl PathExpression {
    /// Head segment as written in the template (`this`, `@name`, or a bare
    /// identifier).
    pub fn head(&self) -> &str {
        if self.is_this {
            "this"
        } else if self.is_data {
            self.parts.first().map(String::as_str).unwrap_or("")
        } else {
            self.parts
                .first()
                .map(String::as_str)
                .unwrap_or(self.original.as_str())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubExpression {
    pub path: Box<Expression>,
    #[serde(default)]
    pub params: Vec<Expression>,
    #[serde(default)]
    pub hash: Hash,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringLiteral {
    pub value: String,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberLiteral {
    pub value: f64,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanLiteral {
    pub value: bool,
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NullLiteral {
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndefinedLiteral {
    #[serde(default)]
    pub loc: Option<Loc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_element_with_mustache_child() {
        let tree: Template = serde_json::from_value(json!({
            "body": [{
                "type": "ElementNode",
                "tag": "div",
                "attributes": [{
                    "name": "class",
                    "value": {
                        "type": "MustacheStatement",
                        "path": {
                            "type": "PathExpression",
                            "original": "this.x",
                            "parts": ["x"],
                            "this": true
                        }
                    }
                }],
                "children": [{ "type": "TextNode", "chars": "Hi" }]
            }]
        }))
        .unwrap();

        let Statement::ElementNode(el) = &tree.body[0] else {
            panic!("expected element");
        };
        assert_eq!(el.tag, "div");
        assert_eq!(el.attributes.len(), 1);
        let AttrValue::MustacheStatement(m) = &el.attributes[0].value else {
            panic!("expected mustache attr value");
        };
        let Expression::PathExpression(p) = &m.path else {
            panic!("expected path");
        };
        assert!(p.is_this);
        assert_eq!(p.head(), "this");
    }

    #[test]
    fn path_head_variants() {
        let arg: PathExpression = serde_json::from_value(json!({
            "original": "@title",
            "parts": ["title"],
            "data": true
        }))
        .unwrap();
        assert_eq!(arg.head(), "title");
        assert!(arg.is_data);

        let local: PathExpression = serde_json::from_value(json!({
            "original": "item.name",
            "parts": ["item", "name"]
        }))
        .unwrap();
        assert_eq!(local.head(), "item");
    }
}
