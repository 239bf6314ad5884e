//! Variable scope stack and macro frames.
//!
//! A `Vec` of case-insensitive-name, `;`-list-valued scope entries, plus a
//! second, independent LIFO stack for macro frames — not a scope, since it
//! shadows lookups during a macro's dynamic extent only.

use std::collections::HashMap;

fn normalize_name(name: &str) -> String {
    name.to_ascii_uppercase()
}

/// One lexical scope: the global scope, or one pushed per `function()`
/// call.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    vars: HashMap<String, String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(&normalize_name(name)).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(normalize_name(name), value.into());
    }

    pub fn unset(&mut self, name: &str) {
        self.vars.remove(&normalize_name(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(&normalize_name(name))
    }
}

/// A macro's dynamic bindings: parameter names plus `ARGC`/`ARGN`/`ARGVn`,
/// pushed for the duration of one macro invocation and popped on return.
/// Not a lexical scope — `set()` inside a macro body still targets the
/// caller's current scope.
pub type MacroFrame = HashMap<String, String>;

/// Owns the scope stack (index 0 is the always-present global scope) and
/// the macro frame stack.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
    macro_frames: Vec<MacroFrame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
            macro_frames: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn push_macro_frame(&mut self, frame: MacroFrame) {
        self.macro_frames.push(frame);
    }

    pub fn pop_macro_frame(&mut self) {
        self.macro_frames.pop();
    }

    /// Lookup order: innermost macro frame outward, then
    /// innermost lexical scope outward to the global scope.
    pub fn lookup(&self, name: &str) -> Option<String> {
        let key = normalize_name(name);
        for frame in self.macro_frames.iter().rev() {
            if let Some(v) = frame.get(&key) {
                return Some(v.clone());
            }
        }
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.get(&key) {
                return Some(v.to_string());
            }
        }
        None
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// `set(VAR value)`: writes to the innermost lexical scope.
    pub fn set_local(&mut self, name: &str, value: impl Into<String>) {
        self.scopes.last_mut().unwrap().set(name, value);
    }

    /// `set(VAR value PARENT_SCOPE)`: writes to the scope enclosing the
    /// current one. A no-op at global scope (there is no enclosing scope),
    /// matching real CMake's silent behavior.
    pub fn set_parent(&mut self, name: &str, value: impl Into<String>) {
        let len = self.scopes.len();
        if len >= 2 {
            self.scopes[len - 2].set(name, value);
        }
    }

    /// `unset(VAR)`: removes from the innermost scope only.
    pub fn unset_local(&mut self, name: &str) {
        self.scopes.last_mut().unwrap().unset(name);
    }

    pub fn unset_parent(&mut self, name: &str) {
        let len = self.scopes.len();
        if len >= 2 {
            self.scopes[len - 2].unset(name);
        }
    }

    pub fn global(&mut self) -> &mut Scope {
        &mut self.scopes[0]
    }

    /// Current macro frame, if one is active (innermost).
    pub fn current_macro_frame(&self) -> Option<&MacroFrame> {
        self.macro_frames.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut stack = ScopeStack::new();
        stack.set_local("Foo", "bar");
        assert_eq!(stack.lookup("FOO"), Some("bar".to_string()));
        assert_eq!(stack.lookup("foo"), Some("bar".to_string()));
    }

    #[test]
    fn nested_scope_shadows_outer() {
        let mut stack = ScopeStack::new();
        stack.set_local("X", "outer");
        stack.push_scope();
        stack.set_local("X", "inner");
        assert_eq!(stack.lookup("X"), Some("inner".to_string()));
        stack.pop_scope();
        assert_eq!(stack.lookup("X"), Some("outer".to_string()));
    }

    #[test]
    fn parent_scope_write_reaches_enclosing_scope() {
        let mut stack = ScopeStack::new();
        stack.push_scope();
        stack.set_parent("Y", "from_child");
        stack.pop_scope();
        assert_eq!(stack.lookup("Y"), Some("from_child".to_string()));
    }

    #[test]
    fn macro_frame_shadows_scope_during_dynamic_extent() {
        let mut stack = ScopeStack::new();
        stack.set_local("ARGC", "0");
        let mut frame = MacroFrame::new();
        frame.insert("ARGC".to_string(), "2".to_string());
        stack.push_macro_frame(frame);
        assert_eq!(stack.lookup("ARGC"), Some("2".to_string()));
        stack.pop_macro_frame();
        assert_eq!(stack.lookup("ARGC"), Some("0".to_string()));
    }

    #[test]
    fn undefined_variable_looks_up_to_none() {
        let stack = ScopeStack::new();
        assert!(!stack.is_defined("NOPE"));
        assert_eq!(stack.lookup("NOPE"), None);
    }
}
