//! Argument resolution: turns a command node's raw token-level
//! arguments into the flat `Vec<String>` handlers operate on, in either
//! "standard" mode (expand + split) or "literal" mode (macro call sites).

use crate::ast::types::{Arg, ArgKind};

use super::expand::expand_vars;
use super::scope::ScopeStack;

pub struct ResolvedArgs {
    pub values: Vec<String>,
    pub warnings: Vec<String>,
}

/// Standard resolution: expand variables, then split UNQUOTED arguments on
/// `;` outside `$<...>` generator-expression bracketing; QUOTED/BRACKET
/// arguments become exactly one value each.
pub fn resolve_args(args: &[Arg], scope: &ScopeStack) -> ResolvedArgs {
    let mut values = Vec::new();
    let mut warnings = Vec::new();

    for arg in args {
        let expanded = expand_vars(&arg.text, scope);
        if let Some(w) = expanded.warning {
            warnings.push(w);
        }

        match arg.kind {
            ArgKind::Quoted => values.push(strip_quotes(&expanded.value)),
            ArgKind::Bracket => values.push(strip_bracket_framing(&expanded.value)),
            ArgKind::Unquoted => {
                for fragment in split_unquoted_list(&expanded.value) {
                    if !fragment.is_empty() {
                        values.push(fragment);
                    }
                }
            }
        }
    }

    ResolvedArgs { values, warnings }
}

/// Literal resolution (macro call sites): no variable expansion, no list
/// splitting — framing is still stripped so callers see plain text.
pub fn resolve_args_literal(args: &[Arg]) -> Vec<String> {
    args.iter()
        .map(|arg| match arg.kind {
            ArgKind::Quoted => strip_quotes(&arg.text),
            ArgKind::Bracket => strip_bracket_framing(&arg.text),
            ArgKind::Unquoted => arg.text.clone(),
        })
        .collect()
}

fn strip_quotes(text: &str) -> String {
    text.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text)
        .to_string()
}

/// Strips a `[=*[ ... ]=*]` bracket argument's framing, returning the raw
/// payload (including the single leading newline the lexer keeps as part
/// of the framing, if the caller wants it trimmed separately).
fn strip_bracket_framing(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.first() != Some(&'[') {
        return text.to_string();
    }
    let mut eq_count = 0;
    let mut i = 1;
    while chars.get(i) == Some(&'=') {
        eq_count += 1;
        i += 1;
    }
    if chars.get(i) != Some(&'[') {
        return text.to_string();
    }
    let payload_start = i + 1;
    let close = format!("]{}]", "=".repeat(eq_count));
    let close_chars: Vec<char> = close.chars().collect();
    if chars.len() < close_chars.len() {
        return text.to_string();
    }
    let payload_end = chars.len() - close_chars.len();
    if payload_end < payload_start {
        return String::new();
    }
    chars[payload_start..payload_end].iter().collect()
}

/// Splits on `;` outside `$<...>` generator-expression bracketing — nested
/// `$<` increments a depth counter, `>` decrements, split only at depth 0.
fn split_unquoted_list(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '$' && chars.get(i + 1) == Some(&'<') {
            depth += 1;
            current.push('$');
            current.push('<');
            i += 2;
            continue;
        }
        if chars[i] == '>' && depth > 0 {
            depth -= 1;
            current.push('>');
            i += 1;
            continue;
        }
        if chars[i] == ';' && depth == 0 {
            fragments.push(std::mem::take(&mut current));
            i += 1;
            continue;
        }
        current.push(chars[i]);
        i += 1;
    }
    fragments.push(current);
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::ArgKind;

    fn unquoted(text: &str) -> Arg {
        Arg {
            kind: ArgKind::Unquoted,
            text: text.to_string(),
            line: 1,
            col: 1,
        }
    }

    #[test]
    fn splits_unquoted_list_on_semicolon() {
        let scope = ScopeStack::new();
        let resolved = resolve_args(&[unquoted("a;b;c")], &scope);
        assert_eq!(resolved.values, vec!["a", "b", "c"]);
    }

    #[test]
    fn preserves_genex_bracket_across_semicolons() {
        let scope = ScopeStack::new();
        let resolved = resolve_args(&[unquoted("$<$<CONFIG:Debug>:A;B>")], &scope);
        assert_eq!(resolved.values, vec!["$<$<CONFIG:Debug>:A;B>"]);
    }

    #[test]
    fn quoted_argument_becomes_one_value_even_with_semicolons() {
        let scope = ScopeStack::new();
        let quoted = Arg {
            kind: ArgKind::Quoted,
            text: "\"a;b\"".to_string(),
            line: 1,
            col: 1,
        };
        let resolved = resolve_args(&[quoted], &scope);
        assert_eq!(resolved.values, vec!["a;b"]);
    }

    #[test]
    fn bracket_argument_strips_framing() {
        let scope = ScopeStack::new();
        let bracket = Arg {
            kind: ArgKind::Bracket,
            text: "[=[a;b]=]".to_string(),
            line: 1,
            col: 1,
        };
        let resolved = resolve_args(&[bracket], &scope);
        assert_eq!(resolved.values, vec!["a;b"]);
    }

    #[test]
    fn literal_mode_skips_expansion_and_splitting() {
        let mut scope = ScopeStack::new();
        scope.set_local("X", "expanded");
        let args = [unquoted("${X};raw")];
        let literal = resolve_args_literal(&args);
        assert_eq!(literal, vec!["${X};raw"]);
        let _ = scope; // literal resolution never touches scope
    }

    #[test]
    fn empty_unquoted_fragments_are_dropped() {
        let scope = ScopeStack::new();
        let resolved = resolve_args(&[unquoted("a;;b")], &scope);
        assert_eq!(resolved.values, vec!["a", "b"]);
    }
}
