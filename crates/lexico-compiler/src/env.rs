//! Routine environment for the analyzer.
//!
//! [`RoutineEnv`] tracks which routine is being checked (the program body or
//! a subroutine), how deeply statements are nested inside blocks, and the
//! labels visible to `goto` in the current routine.

use std::collections::HashSet;

// ══════════════════════════════════════════════════════════════════════════════
// Scope Kind
// ══════════════════════════════════════════════════════════════════════════════

/// What kind of code context a scope represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Top level of the program body.
    Entry,
    /// Top level of a subroutine body.
    Subroutine,
    /// Inside an if/while/for body.
    Block,
}

// ══════════════════════════════════════════════════════════════════════════════
// RoutineEnv
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct RoutineEnv {
    scopes: Vec<ScopeKind>,
    /// Labels of the routine being checked; subroutines get their own set.
    labels: Vec<HashSet<String>>,
}

impl RoutineEnv {
    /// Start at the top level of the program body.
    pub fn new() -> Self {
        Self {
            scopes: vec![ScopeKind::Entry],
            labels: vec![HashSet::new()],
        }
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        if kind == ScopeKind::Subroutine {
            self.labels.push(HashSet::new());
        }
        self.scopes.push(kind);
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the entry scope");
        if self.scopes.pop() == Some(ScopeKind::Subroutine) {
            self.labels.pop();
        }
    }

    /// Whether the current statement sits inside an if/while/for body.
    pub fn in_block(&self) -> bool {
        self.current_scope_kind() == ScopeKind::Block
    }

    /// Whether the current statement is inside a subroutine body.
    pub fn in_subroutine(&self) -> bool {
        self.scopes.contains(&ScopeKind::Subroutine)
    }

    pub fn current_scope_kind(&self) -> ScopeKind {
        self.scopes.last().copied().unwrap_or(ScopeKind::Entry)
    }

    /// Define a label in the current routine.
    /// Returns `false` if the routine already has a label of that name.
    pub fn define_label(&mut self, name: &str) -> bool {
        match self.labels.last_mut() {
            Some(labels) => labels.insert(name.to_string()),
            None => false,
        }
    }

    /// Whether `name` is a label of the current routine.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.last().is_some_and(|labels| labels.contains(name))
    }
}

impl Default for RoutineEnv {
    fn default() -> Self {
        Self::new()
    }
}
