//! Lexical binding tracking for one compilation.
//!
//! A stack of frames, innermost-first resolution. Rebinding a name in a
//! higher frame shadows the lower one; `remove_binding` peels the top
//! occurrence only. When no frame knows a name, an optional host callback
//! (`lexicalScope`) gets the final say — that is how the surrounding JS
//! module scope leaks into the template without the compiler parsing JS.

use crate::ranges::SourceRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Component,
    Helper,
    Modifier,
    BlockParam,
    LetBinding,
    Arg,
    This,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: BindingKind,
    pub name: String,
    /// Replacement identifier for rewritten bindings (let blocks).
    pub original_name: Option<String>,
    pub source_range: Option<SourceRange>,
}

impl Binding {
    pub fn new(kind: BindingKind, name: impl Into<String>) -> Self {
        Binding {
            kind,
            name: name.into(),
            original_name: None,
            source_range: None,
        }
    }

    pub fn with_range(mut self, range: Option<SourceRange>) -> Self {
        self.source_range = range;
        self
    }

    pub fn renamed_to(mut self, replacement: impl Into<String>) -> Self {
        self.original_name = Some(replacement.into());
        self
    }
}

pub type LexicalScopeFn<'a> = dyn Fn(&str) -> bool + 'a;

pub struct ScopeTracker<'a> {
    bindings: Vec<Binding>,
    lexical_scope: Option<&'a LexicalScopeFn<'a>>,
}

impl<'a> std::fmt::Debug for ScopeTracker<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeTracker")
            .field("bindings", &self.bindings)
            .field("has_lexical_scope", &self.lexical_scope.is_some())
            .finish()
    }
}

impl<'a> ScopeTracker<'a> {
    pub fn new(lexical_scope: Option<&'a LexicalScopeFn<'a>>) -> Self {
        ScopeTracker {
            bindings: Vec::new(),
            lexical_scope,
        }
    }

    pub fn add_binding(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    /// Removes the top-most occurrence of `name`, restoring whatever it
    /// shadowed.
    pub fn remove_binding(&mut self, name: &str) {
        if let Some(pos) = self.bindings.iter().rposition(|b| b.name == name) {
            self.bindings.remove(pos);
        }
    }

    /// True when a frame holds `name` or the host's lexical scope claims it.
    pub fn has_binding(&self, name: &str) -> bool {
        if self.bindings.iter().any(|b| b.name == name) {
            return true;
        }
        match self.lexical_scope {
            Some(f) => f(name),
            None => false,
        }
    }

    /// True only for names bound by template frames (no host fallback).
    pub fn has_local_binding(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.name == name)
    }

    pub fn resolve(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().rev().find(|b| b.name == name)
    }

    pub fn get_all_binding_names(&self) -> Vec<String> {
        self.bindings.iter().map(|b| b.name.clone()).collect()
    }

    pub fn depth(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_and_removal() {
        let mut scope = ScopeTracker::new(None);
        scope.add_binding(Binding::new(BindingKind::BlockParam, "item"));
        scope.add_binding(Binding::new(BindingKind::LetBinding, "item").renamed_to("Let_item_0"));

        assert_eq!(
            scope.resolve("item").unwrap().original_name.as_deref(),
            Some("Let_item_0")
        );

        scope.remove_binding("item");
        assert!(scope.resolve("item").unwrap().original_name.is_none());
        scope.remove_binding("item");
        assert!(!scope.has_binding("item"));
    }

    #[test]
    fn lexical_fallback() {
        let known = |name: &str| name == "Icon";
        let scope = ScopeTracker::new(Some(&known));
        assert!(scope.has_binding("Icon"));
        assert!(!scope.has_local_binding("Icon"));
        assert!(!scope.has_binding("Other"));
    }

    #[test]
    fn remove_is_top_only() {
        let mut scope = ScopeTracker::new(None);
        scope.add_binding(Binding::new(BindingKind::BlockParam, "a"));
        scope.add_binding(Binding::new(BindingKind::BlockParam, "b"));
        scope.add_binding(Binding::new(BindingKind::BlockParam, "a"));
        scope.remove_binding("a");
        assert_eq!(scope.depth(), 2);
        assert!(scope.has_binding("a"));
    }
}
