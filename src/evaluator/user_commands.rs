//! User-defined `function()`/`macro()` registration and call-frame setup.
//!
//! Registers a callable AST subtree and clones its body per call, split
//! into two distinct kinds: `function()` pushes a lexical scope, `macro()`
//! pushes only a macro frame.

use std::collections::HashMap;

use crate::ast::types::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommandKind {
    Function,
    Macro,
}

#[derive(Debug, Clone)]
pub struct UserCommand {
    pub kind: UserCommandKind,
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

/// Registered by name (case-insensitive, matching command dispatch);
/// later definitions of the same name replace earlier ones, as in real
/// CMake.
#[derive(Debug, Default)]
pub struct UserCommandTable {
    commands: HashMap<String, UserCommand>,
}

impl UserCommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, command: UserCommand) {
        self.commands.insert(name.to_ascii_lowercase(), command);
    }

    pub fn get(&self, name: &str) -> Option<&UserCommand> {
        self.commands.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }
}

/// Builds the implicit `ARGC`/`ARGV`/`ARGN`/`ARGV<n>` bindings for one
/// call, given the formal parameter names and the actual call arguments.
/// `ARGN` holds arguments beyond the named parameters; `ARGV` holds all
/// arguments as one `;`-joined list regardless of how many are named.
pub fn build_call_bindings(params: &[String], call_args: &[String]) -> HashMap<String, String> {
    let mut bindings = HashMap::new();

    for (i, param) in params.iter().enumerate() {
        let value = call_args.get(i).cloned().unwrap_or_default();
        bindings.insert(param.to_ascii_uppercase(), value);
    }

    bindings.insert("ARGC".to_string(), call_args.len().to_string());
    bindings.insert("ARGV".to_string(), call_args.join(";"));

    let extra: Vec<String> = call_args
        .iter()
        .skip(params.len())
        .cloned()
        .collect();
    bindings.insert("ARGN".to_string(), extra.join(";"));

    for (i, value) in call_args.iter().enumerate() {
        bindings.insert(format!("ARGV{i}"), value.clone());
    }

    bindings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_case_insensitive_and_replaces() {
        let mut table = UserCommandTable::new();
        table.define(
            "MyFunc",
            UserCommand {
                kind: UserCommandKind::Function,
                params: vec![],
                body: vec![],
            },
        );
        assert!(table.contains("myfunc"));
        table.define(
            "myfunc",
            UserCommand {
                kind: UserCommandKind::Macro,
                params: vec!["X".to_string()],
                body: vec![],
            },
        );
        assert_eq!(table.get("MYFUNC").unwrap().kind, UserCommandKind::Macro);
        assert_eq!(table.get("MYFUNC").unwrap().params, vec!["X".to_string()]);
    }

    #[test]
    fn call_bindings_cover_named_argn_and_argv_indices() {
        let params = vec!["A".to_string(), "B".to_string()];
        let args = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let bindings = build_call_bindings(&params, &args);
        assert_eq!(bindings.get("A"), Some(&"1".to_string()));
        assert_eq!(bindings.get("B"), Some(&"2".to_string()));
        assert_eq!(bindings.get("ARGC"), Some(&"3".to_string()));
        assert_eq!(bindings.get("ARGN"), Some(&"3".to_string()));
        assert_eq!(bindings.get("ARGV"), Some(&"1;2;3".to_string()));
        assert_eq!(bindings.get("ARGV2"), Some(&"3".to_string()));
    }

    #[test]
    fn missing_call_args_bind_empty() {
        let params = vec!["A".to_string(), "B".to_string()];
        let args = vec!["only".to_string()];
        let bindings = build_call_bindings(&params, &args);
        assert_eq!(bindings.get("A"), Some(&"only".to_string()));
        assert_eq!(bindings.get("B"), Some(&"".to_string()));
    }
}
