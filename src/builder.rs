//! JS expression AST and its constructors.
//!
//! A small discriminated union covering exactly what the lowerer emits; no
//! control-flow statements exist because template control flow lowers to
//! expressions. Constructors are pure — all printing, formatting and
//! source-map policy lives in the serializer.

use crate::ranges::SourceRange;

#[derive(Debug, Clone, PartialEq)]
pub enum JsExpr {
    Num(f64),
    Str {
        value: String,
        /// `'…'` when set, `"…"` (JSON-escaped) otherwise.
        single: bool,
        range: Option<SourceRange>,
    },
    Bool(bool),
    Null,
    Undefined,
    Ident {
        name: String,
        mapping_name: Option<String>,
        range: Option<SourceRange>,
    },
    /// Identifier resolved against the runtime protocol; roots of member
    /// chains. Participates in the source-map `names` table.
    RuntimeRef {
        name: String,
        mapping_name: Option<String>,
        range: Option<SourceRange>,
    },
    Member {
        object: Box<JsExpr>,
        property: String,
        computed: bool,
        optional: bool,
        range: Option<SourceRange>,
    },
    Call {
        callee: Box<JsExpr>,
        args: Vec<JsExpr>,
        /// One argument per line when the formatter is enabled.
        formatted: bool,
        range: Option<SourceRange>,
    },
    Arrow {
        params: Vec<String>,
        body: ArrowBody,
    },
    Array {
        items: Vec<JsExpr>,
        formatted: bool,
    },
    Object {
        props: Vec<(String, JsExpr)>,
        formatted: bool,
    },
    Spread(Box<JsExpr>),
    Binary {
        op: String,
        left: Box<JsExpr>,
        right: Box<JsExpr>,
    },
    Conditional {
        test: Box<JsExpr>,
        consequent: Box<JsExpr>,
        alternate: Box<JsExpr>,
    },
    Raw(String),
    /// `() => value`; kept distinct from `Arrow` so built-in helper shaping
    /// can unwrap and re-wrap without doubling.
    ReactiveGetter {
        value: Box<JsExpr>,
        range: Option<SourceRange>,
    },
    /// `(() => { stmts })()`
    Iife {
        body: Vec<JsStmt>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Box<JsExpr>),
    Block(Vec<JsStmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsStmt {
    VarDecl {
        kind: &'static str,
        name: String,
        init: JsExpr,
    },
    Return(JsExpr),
    Expr(JsExpr),
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTRUCTORS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn num(value: f64) -> JsExpr {
    JsExpr::Num(value)
}

pub fn string(value: impl Into<String>) -> JsExpr {
    JsExpr::Str {
        value: value.into(),
        single: false,
        range: None,
    }
}

pub fn string_single(value: impl Into<String>) -> JsExpr {
    JsExpr::Str {
        value: value.into(),
        single: true,
        range: None,
    }
}

pub fn string_single_at(value: impl Into<String>, range: Option<SourceRange>) -> JsExpr {
    JsExpr::Str {
        value: value.into(),
        single: true,
        range,
    }
}

pub fn boolean(value: bool) -> JsExpr {
    JsExpr::Bool(value)
}

pub fn null() -> JsExpr {
    JsExpr::Null
}

pub fn undefined() -> JsExpr {
    JsExpr::Undefined
}

pub fn ident(name: impl Into<String>) -> JsExpr {
    JsExpr::Ident {
        name: name.into(),
        mapping_name: None,
        range: None,
    }
}

pub fn ident_mapped(
    name: impl Into<String>,
    mapping_name: impl Into<String>,
    range: Option<SourceRange>,
) -> JsExpr {
    JsExpr::Ident {
        name: name.into(),
        mapping_name: Some(mapping_name.into()),
        range,
    }
}

pub fn runtime_ref(name: impl Into<String>) -> JsExpr {
    JsExpr::RuntimeRef {
        name: name.into(),
        mapping_name: None,
        range: None,
    }
}

pub fn runtime_ref_mapped(
    name: impl Into<String>,
    mapping_name: impl Into<String>,
    range: Option<SourceRange>,
) -> JsExpr {
    JsExpr::RuntimeRef {
        name: name.into(),
        mapping_name: Some(mapping_name.into()),
        range,
    }
}

pub fn member(object: JsExpr, property: impl Into<String>) -> JsExpr {
    JsExpr::Member {
        object: Box::new(object),
        property: property.into(),
        computed: false,
        optional: false,
        range: None,
    }
}

pub fn opt_member(object: JsExpr, property: impl Into<String>) -> JsExpr {
    JsExpr::Member {
        object: Box::new(object),
        property: property.into(),
        computed: false,
        optional: true,
        range: None,
    }
}

pub fn computed_member(object: JsExpr, property: impl Into<String>) -> JsExpr {
    JsExpr::Member {
        object: Box::new(object),
        property: property.into(),
        computed: true,
        optional: false,
        range: None,
    }
}

pub fn computed_member_opt(object: JsExpr, property: impl Into<String>) -> JsExpr {
    JsExpr::Member {
        object: Box::new(object),
        property: property.into(),
        computed: true,
        optional: true,
        range: None,
    }
}

pub fn call(callee: JsExpr, args: Vec<JsExpr>) -> JsExpr {
    JsExpr::Call {
        callee: Box::new(callee),
        args,
        formatted: false,
        range: None,
    }
}

pub fn call_at(callee: JsExpr, args: Vec<JsExpr>, range: Option<SourceRange>) -> JsExpr {
    JsExpr::Call {
        callee: Box::new(callee),
        args,
        formatted: false,
        range,
    }
}

pub fn formatted_call(callee: JsExpr, args: Vec<JsExpr>) -> JsExpr {
    JsExpr::Call {
        callee: Box::new(callee),
        args,
        formatted: true,
        range: None,
    }
}

pub fn method_call(object: JsExpr, method: impl Into<String>, args: Vec<JsExpr>) -> JsExpr {
    call(member(object, method), args)
}

pub fn arrow(params: Vec<&str>, body: JsExpr) -> JsExpr {
    JsExpr::Arrow {
        params: params.into_iter().map(str::to_string).collect(),
        body: ArrowBody::Expr(Box::new(body)),
    }
}

pub fn arrow_owned(params: Vec<String>, body: JsExpr) -> JsExpr {
    JsExpr::Arrow {
        params,
        body: ArrowBody::Expr(Box::new(body)),
    }
}

pub fn arrow_block(params: Vec<&str>, body: Vec<JsStmt>) -> JsExpr {
    JsExpr::Arrow {
        params: params.into_iter().map(str::to_string).collect(),
        body: ArrowBody::Block(body),
    }
}

pub fn array(items: Vec<JsExpr>) -> JsExpr {
    JsExpr::Array {
        items,
        formatted: false,
    }
}

pub fn formatted_array(items: Vec<JsExpr>) -> JsExpr {
    JsExpr::Array {
        items,
        formatted: true,
    }
}

pub fn object(props: Vec<(String, JsExpr)>) -> JsExpr {
    JsExpr::Object {
        props,
        formatted: false,
    }
}

pub fn formatted_object(props: Vec<(String, JsExpr)>) -> JsExpr {
    JsExpr::Object {
        props,
        formatted: true,
    }
}

pub fn spread(value: JsExpr) -> JsExpr {
    JsExpr::Spread(Box::new(value))
}

pub fn binary(op: &str, left: JsExpr, right: JsExpr) -> JsExpr {
    JsExpr::Binary {
        op: op.to_string(),
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn conditional(test: JsExpr, consequent: JsExpr, alternate: JsExpr) -> JsExpr {
    JsExpr::Conditional {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    }
}

pub fn raw(code: impl Into<String>) -> JsExpr {
    JsExpr::Raw(code.into())
}

pub fn reactive_getter(value: JsExpr) -> JsExpr {
    JsExpr::ReactiveGetter {
        value: Box::new(value),
        range: None,
    }
}

pub fn iife(body: Vec<JsStmt>) -> JsExpr {
    JsExpr::Iife { body }
}

pub fn var_decl(kind: &'static str, name: impl Into<String>, init: JsExpr) -> JsStmt {
    JsStmt::VarDecl {
        kind,
        name: name.into(),
        init,
    }
}

pub fn ret(value: JsExpr) -> JsStmt {
    JsStmt::Return(value)
}

pub fn expr_stmt(value: JsExpr) -> JsStmt {
    JsStmt::Expr(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_call_shape() {
        let e = method_call(array(vec![string("a")]), "join", vec![string_single("")]);
        let JsExpr::Call { callee, .. } = &e else {
            panic!("expected call");
        };
        assert!(matches!(**callee, JsExpr::Member { .. }));
    }

    #[test]
    fn reactive_getter_is_distinct_from_arrow() {
        let g = reactive_getter(ident("x"));
        assert!(matches!(g, JsExpr::ReactiveGetter { .. }));
        assert!(!matches!(g, JsExpr::Arrow { .. }));
    }
}
