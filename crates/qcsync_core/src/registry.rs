//! Named statement templates.

use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;

/// Maps statement names to SQL templates.
///
/// Templates are not validated here; a bad template surfaces as an
/// executor error when it runs. Re-registering a name replaces the
/// previous template.
#[derive(Debug, Clone, Default)]
pub struct StatementRegistry {
    statements: HashMap<String, String>,
}

impl StatementRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template, returning the one it replaced.
    pub fn register(&mut self, name: impl Into<String>, template: impl Into<String>) -> Option<String> {
        self.statements.insert(name.into(), template.into())
    }

    /// Registers several templates, in iteration order.
    pub fn register_many<I, K, V>(&mut self, statements: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, template) in statements {
            self.register(name, template);
        }
    }

    /// Looks up a template.
    pub fn resolve(&self, name: &str) -> CoreResult<&str> {
        self.statements
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CoreError::unknown_statement(name))
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.statements.contains_key(name)
    }

    /// Number of registered statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.statements.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
