use std::collections::HashMap;

use super::types::Type;

/// Where an expression is being checked. Decides which path heads are
/// legal and which diagnostics an undeclared variable produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Invariant declared on an aggregate; `root` and `final` are allowed.
    IntraInvariant,
    /// Invariant of an anti-corruption translation; variables are the
    /// translation's attributes.
    InterInvariant,
    /// Right-hand side of a constructor assignment; variables are the
    /// constructor's parameters.
    ConstructorAssignment,
    /// Body of a parametric method such as `filter` or `map`.
    MethodLocal,
}

impl ScopeKind {
    pub fn allows_root(self) -> bool {
        matches!(self, ScopeKind::IntraInvariant | ScopeKind::ConstructorAssignment)
    }

    pub fn allows_query(self) -> bool {
        !matches!(self, ScopeKind::IntraInvariant | ScopeKind::ConstructorAssignment)
    }
}

/// Variables visible to an expression.
///
/// Scopes are persistent: binding a lambda variable creates a child that
/// borrows its parent, so leaving the lambda body cannot leak the binding
/// into sibling expressions.
#[derive(Debug, Default)]
pub struct ScopeVars<'p> {
    bindings: HashMap<String, Type>,
    parent: Option<&'p ScopeVars<'p>>,
}

impl<'p> ScopeVars<'p> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A root scope pre-populated with the given bindings. Later duplicates
    /// overwrite earlier ones.
    pub fn with_bindings<I>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (String, Type)>,
    {
        Self {
            bindings: bindings.into_iter().collect(),
            parent: None,
        }
    }

    /// Look up a variable, innermost binding first.
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        match self.bindings.get(name) {
            Some(ty) => Some(ty),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// A child scope with one more binding.
    ///
    /// Returns `Err` with the existing type if `name` is already visible.
    pub fn bind<'a>(&'a self, name: &str, ty: Type) -> Result<ScopeVars<'a>, &'a Type> {
        if let Some(existing) = self.lookup(name) {
            return Err(existing);
        }
        let mut bindings = HashMap::new();
        bindings.insert(name.to_string(), ty);
        Ok(ScopeVars {
            bindings,
            parent: Some(self),
        })
    }

    pub fn depth(&self) -> usize {
        match self.parent {
            Some(p) => 1 + p.depth(),
            None => 0,
        }
    }
}
