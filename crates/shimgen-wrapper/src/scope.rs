//! Scope tree with collision-free name allocation.
//!
//! [`ScopeTree`] is an arena of scopes mirroring lexical nesting
//! (module → wrapper function → loop). Each scope records the symbols it
//! owns, the mapping from original names to the names actually used, and the
//! locals declared in it. Scopes are addressed by [`ScopeId`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use shimgen_naming::checker_for;
use shimgen_types::bind_c::{Local, ScopeId};
use shimgen_types::Target;

// ══════════════════════════════════════════════════════════════════════════════
// Scope Kind
// ══════════════════════════════════════════════════════════════════════════════

/// What kind of code context a scope represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// The wrapper module.
    Module,
    /// The body of one wrapper function.
    Function,
    /// The body of a fill loop.
    Loop,
}

// ══════════════════════════════════════════════════════════════════════════════
// Scope
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Scope {
    name: String,
    kind: ScopeKind,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    /// Names owned by this scope.
    symbols: BTreeSet<String>,
    /// Original name → name used in generated code.
    expected: BTreeMap<String, String>,
    locals: Vec<Local>,
}

// ══════════════════════════════════════════════════════════════════════════════
// ScopeTree
// ══════════════════════════════════════════════════════════════════════════════

/// Arena of scopes owned by the wrap of one module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeTree {
    target: Target,
    scopes: Vec<Scope>,
}

impl ScopeTree {
    /// Create a tree whose root module scope already owns `used`.
    pub fn new<'a>(target: Target, name: &str, used: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            target,
            scopes: vec![Scope {
                name: name.to_string(),
                kind: ScopeKind::Module,
                parent: None,
                children: Vec::new(),
                symbols: used.into_iter().map(str::to_string).collect(),
                expected: BTreeMap::new(),
                locals: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Open a scope nested inside `parent`.
    pub fn new_child(&mut self, parent: ScopeId, name: &str, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            name: name.to_string(),
            kind,
            parent: Some(parent),
            children: Vec::new(),
            symbols: BTreeSet::new(),
            expected: BTreeMap::new(),
            locals: Vec::new(),
        });
        self.scopes[parent.0].children.push(id);
        id
    }

    pub fn name(&self, id: ScopeId) -> &str {
        &self.scopes[id.0].name
    }

    pub fn kind(&self, id: ScopeId) -> ScopeKind {
        self.scopes[id.0].kind
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes[id.0].parent
    }

    pub fn children(&self, id: ScopeId) -> &[ScopeId] {
        &self.scopes[id.0].children
    }

    /// `id` followed by its ancestors up to the root.
    fn chain(&self, id: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(id), move |s| self.scopes[s.0].parent)
    }

    /// `id` and all of its descendants, pre-order.
    fn subtree(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(s) = stack.pop() {
            out.push(s);
            stack.extend(self.scopes[s.0].children.iter().rev());
        }
        out
    }

    /// Names a new symbol of `id` must not collide with: everything owned by
    /// the ancestors and everything already used inside `id`'s subtree.
    fn visible_symbols(&self, id: ScopeId) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        for s in self.chain(id).skip(1) {
            symbols.extend(self.scopes[s.0].symbols.iter().cloned());
        }
        for s in self.subtree(id) {
            symbols.extend(self.scopes[s.0].symbols.iter().cloned());
        }
        symbols
    }

    /// Allocate a name derived from `hint` that is unique within the scope
    /// chain and not reserved by the target language.
    pub fn fresh_name(&mut self, id: ScopeId, hint: &str) -> String {
        let symbols = self.visible_symbols(id);
        let name = checker_for(self.target).collision_free_name(hint, &symbols);
        self.scopes[id.0].symbols.insert(name.clone());
        name
    }

    /// Reserve the original name `name` in `id`. The name used in generated
    /// code is available through [`ScopeTree::expected_name`].
    pub fn insert_symbol(&mut self, id: ScopeId, name: &str) -> String {
        if let Some(existing) = self.scopes[id.0].expected.get(name) {
            return existing.clone();
        }
        let actual = self.fresh_name(id, name);
        self.scopes[id.0]
            .expected
            .insert(name.to_string(), actual.clone());
        actual
    }

    /// Name used in generated code for the original `name`, searching from
    /// `id` outwards.
    pub fn expected_name(&self, id: ScopeId, name: &str) -> Option<&str> {
        self.chain(id)
            .find_map(|s| self.scopes[s.0].expected.get(name))
            .map(String::as_str)
    }

    /// Declare a local in `id`.
    pub fn insert_variable(&mut self, id: ScopeId, local: Local) {
        let scope = &mut self.scopes[id.0];
        scope.symbols.insert(local.name.clone());
        scope.locals.push(local);
    }

    /// Look up a local by generated name, searching from `id` outwards.
    pub fn find(&self, id: ScopeId, name: &str) -> Option<&Local> {
        self.chain(id)
            .find_map(|s| self.scopes[s.0].locals.iter().find(|l| l.name == name))
    }

    /// Every local declared in `id` and its nested scopes, in declaration
    /// order per scope.
    pub fn locals(&self, id: ScopeId) -> Vec<Local> {
        self.subtree(id)
            .into_iter()
            .flat_map(|s| self.scopes[s.0].locals.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shimgen_types::ast::{ScalarKind, ValueType};

    fn tree() -> ScopeTree {
        ScopeTree::new(Target::Fortran, "geometry", ["geometry", "area"])
    }

    #[test]
    fn test_fresh_name_avoids_ancestors() {
        let mut t = tree();
        let f = t.new_child(t.root(), "bind_c_area", ScopeKind::Function);
        assert_eq!(t.fresh_name(f, "area"), "area_0001");
        assert_eq!(t.fresh_name(f, "bound_x"), "bound_x");
        assert_eq!(t.fresh_name(f, "bound_x"), "bound_x_0001");
    }

    #[test]
    fn test_siblings_are_independent() {
        let mut t = tree();
        let f = t.new_child(t.root(), "bind_c_f", ScopeKind::Function);
        let g = t.new_child(t.root(), "bind_c_g", ScopeKind::Function);
        assert_eq!(t.fresh_name(f, "bound_x"), "bound_x");
        assert_eq!(t.fresh_name(g, "bound_x"), "bound_x");
    }

    #[test]
    fn test_parent_avoids_children() {
        let mut t = tree();
        let f = t.new_child(t.root(), "bind_c_f", ScopeKind::Function);
        let l = t.new_child(f, "for", ScopeKind::Loop);
        assert_eq!(t.fresh_name(l, "elem"), "elem");
        assert_eq!(t.fresh_name(f, "elem"), "elem_0001");
    }

    #[test]
    fn test_expected_name_and_find() {
        let mut t = tree();
        let f = t.new_child(t.root(), "bind_c_f", ScopeKind::Function);
        let actual = t.insert_symbol(f, "real");
        assert_eq!(actual, "real_0001");
        assert_eq!(t.expected_name(f, "real"), Some("real_0001"));
        assert_eq!(t.insert_symbol(f, "real"), "real_0001");
        t.insert_variable(f, Local::owned(actual, ValueType::Scalar(ScalarKind::Float64)));
        assert!(t.find(f, "real_0001").is_some());
        assert!(t.find(t.root(), "real_0001").is_none());
    }

    #[test]
    fn test_locals_cover_nested_scopes() {
        let mut t = tree();
        let f = t.new_child(t.root(), "bind_c_f", ScopeKind::Function);
        let l = t.new_child(f, "for", ScopeKind::Loop);
        t.insert_variable(f, Local::index("idx"));
        t.insert_variable(l, Local::index("elem"));
        let names: Vec<_> = t.locals(f).into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["idx", "elem"]);
        assert_eq!(t.parent(l), Some(f));
        assert_eq!(t.kind(l), ScopeKind::Loop);
        assert_eq!(t.children(f), &[l]);
        assert_eq!(t.name(l), "for");
    }
}
