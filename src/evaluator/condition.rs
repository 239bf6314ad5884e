//! `if()` condition language: precedence-climbing boolean
//! grammar over an already-expanded argument list.
//!
//! A precedence-climbing parser over the `NOT > cmp > AND > OR` grammar
//! and its predicate/binary-operator set.

use std::collections::HashSet;

use crate::fs::FileSystem;

use super::scope::ScopeStack;

pub struct ConditionContext<'a> {
    pub scope: &'a ScopeStack,
    pub fs: &'a dyn FileSystem,
    pub base_dir: &'a str,
    pub known_commands: &'a HashSet<String>,
    pub known_targets: &'a HashSet<String>,
}

const PREDICATES: &[&str] = &[
    "DEFINED",
    "COMMAND",
    "TARGET",
    "POLICY",
    "EXISTS",
    "IS_DIRECTORY",
    "IS_SYMLINK",
    "IS_ABSOLUTE",
];

const BINARY_OPS: &[&str] = &[
    "STREQUAL",
    "EQUAL",
    "LESS",
    "GREATER",
    "LESS_EQUAL",
    "GREATER_EQUAL",
    "STRLESS",
    "STRLESS_EQUAL",
    "STRGREATER",
    "STRGREATER_EQUAL",
    "VERSION_LESS",
    "VERSION_LESS_EQUAL",
    "VERSION_EQUAL",
    "VERSION_GREATER",
    "VERSION_GREATER_EQUAL",
    "MATCHES",
    "IN_LIST",
    "PATH_EQUAL",
];

/// Evaluates a condition's already-resolved argument list, returning the
/// boolean result or a textual error for the diagnostics bus.
pub fn evaluate(tokens: &[String], ctx: &ConditionContext) -> Result<bool, String> {
    let mut parser = CondParser { tokens, pos: 0, ctx };
    let result = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!(
            "unexpected token '{}' in condition",
            parser.tokens[parser.pos]
        ));
    }
    Ok(result)
}

struct CondParser<'a, 'b> {
    tokens: &'a [String],
    pos: usize,
    ctx: &'a ConditionContext<'b>,
}

impl<'a, 'b> CondParser<'a, 'b> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn advance(&mut self) -> Option<&str> {
        let tok = self.tokens.get(self.pos).map(String::as_str);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek_upper_is(&self, word: &str) -> bool {
        self.peek()
            .map(|t| t.eq_ignore_ascii_case(word))
            .unwrap_or(false)
    }

    fn parse_or(&mut self) -> Result<bool, String> {
        let mut left = self.parse_and()?;
        while self.peek_upper_is("OR") {
            self.advance();
            let right = self.parse_and()?;
            left = left || right;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<bool, String> {
        let mut left = self.parse_cmp()?;
        while self.peek_upper_is("AND") {
            self.advance();
            let right = self.parse_cmp()?;
            left = left && right;
        }
        Ok(left)
    }

    fn parse_cmp(&mut self) -> Result<bool, String> {
        let left_value = self.parse_unary_value()?;
        if let Some(tok) = self.peek() {
            let upper = tok.to_ascii_uppercase();
            if BINARY_OPS.contains(&upper.as_str()) {
                self.advance();
                let right_value = self.parse_unary_value()?;
                return apply_binary_op(&upper, &left_value, &right_value, self.ctx);
            }
        }
        Ok(eval_truthy(&left_value, self.ctx.scope))
    }

    /// Parses a `unary` production but returns its *string value* rather
    /// than a bool when it's a bare token/parenthesized truthy result is
    /// not needed as a value — predicates and `NOT` resolve directly to a
    /// boolean, which we encode as `"TRUE"`/`"FALSE"` strings so `parse_cmp`
    /// can uniformly either compare two values or apply truthiness.
    fn parse_unary_value(&mut self) -> Result<String, String> {
        if self.peek_upper_is("NOT") {
            self.advance();
            let inner = self.parse_unary_value()?;
            let value = eval_truthy(&inner, self.ctx.scope);
            return Ok(bool_str(!value));
        }

        if let Some(tok) = self.peek() {
            let upper = tok.to_ascii_uppercase();
            if PREDICATES.contains(&upper.as_str()) {
                self.advance();
                let operand = self
                    .advance()
                    .ok_or_else(|| format!("{upper} requires an operand"))?
                    .to_string();
                return Ok(bool_str(eval_predicate(&upper, &operand, self.ctx)));
            }
        }

        self.parse_primary_value()
    }

    fn parse_primary_value(&mut self) -> Result<String, String> {
        if self.peek() == Some("(") {
            self.advance();
            let inner = self.parse_or()?;
            if self.peek() != Some(")") {
                return Err("expected ')' in condition".to_string());
            }
            self.advance();
            return Ok(bool_str(inner));
        }
        let tok = self
            .advance()
            .ok_or_else(|| "unexpected end of condition".to_string())?;
        Ok(tok.to_string())
    }
}

fn bool_str(b: bool) -> String {
    if b { "TRUE" } else { "FALSE" }.to_string()
}

fn eval_predicate(predicate: &str, operand: &str, ctx: &ConditionContext) -> bool {
    match predicate {
        "DEFINED" => {
            let name = operand.strip_prefix("ENV{").and_then(|s| s.strip_suffix('}'));
            match name {
                Some(env_name) => std::env::var(env_name).is_ok(),
                None => ctx.scope.is_defined(operand),
            }
        }
        "COMMAND" => ctx.known_commands.contains(&operand.to_ascii_lowercase()),
        "TARGET" => ctx.known_targets.contains(operand),
        "POLICY" => is_policy_id(operand),
        "EXISTS" => {
            let resolved = ctx.fs.resolve_path(ctx.base_dir, operand);
            ctx.fs.exists(&resolved)
        }
        "IS_DIRECTORY" => {
            let resolved = ctx.fs.resolve_path(ctx.base_dir, operand);
            ctx.fs.stat(&resolved).map(|s| s.is_directory).unwrap_or(false)
        }
        "IS_SYMLINK" => {
            let resolved = ctx.fs.resolve_path(ctx.base_dir, operand);
            ctx.fs.lstat(&resolved).map(|s| s.is_symlink).unwrap_or(false)
        }
        "IS_ABSOLUTE" => is_absolute_path(operand),
        _ => false,
    }
}

fn is_policy_id(s: &str) -> bool {
    s.len() == 7
        && s[..3].eq_ignore_ascii_case("CMP")
        && s[3..].chars().all(|c| c.is_ascii_digit())
}

fn is_absolute_path(s: &str) -> bool {
    s.starts_with('/')
        || (s.len() >= 3 && s.as_bytes()[1] == b':' && (s.as_bytes()[2] == b'/' || s.as_bytes()[2] == b'\\'))
        || s.starts_with("\\\\")
}

fn apply_binary_op(
    op: &str,
    left: &str,
    right: &str,
    ctx: &ConditionContext,
) -> Result<bool, String> {
    Ok(match op {
        "STREQUAL" => left == right,
        "STRLESS" => left < right,
        "STRLESS_EQUAL" => left <= right,
        "STRGREATER" => left > right,
        "STRGREATER_EQUAL" => left >= right,
        "EQUAL" => parse_num(left)? == parse_num(right)?,
        "LESS" => parse_num(left)? < parse_num(right)?,
        "GREATER" => parse_num(left)? > parse_num(right)?,
        "LESS_EQUAL" => parse_num(left)? <= parse_num(right)?,
        "GREATER_EQUAL" => parse_num(left)? >= parse_num(right)?,
        "VERSION_LESS" => compare_versions(left, right) == std::cmp::Ordering::Less,
        "VERSION_LESS_EQUAL" => compare_versions(left, right) != std::cmp::Ordering::Greater,
        "VERSION_EQUAL" => compare_versions(left, right) == std::cmp::Ordering::Equal,
        "VERSION_GREATER" => compare_versions(left, right) == std::cmp::Ordering::Greater,
        "VERSION_GREATER_EQUAL" => compare_versions(left, right) != std::cmp::Ordering::Less,
        "MATCHES" => regex_lite::Regex::new(right)
            .map(|re| re.is_match(left))
            .unwrap_or(false),
        "IN_LIST" => {
            let list_value = ctx.scope.lookup(right).unwrap_or_default();
            list_value.split(';').any(|item| item == left)
        }
        "PATH_EQUAL" => normalize_for_compare(left) == normalize_for_compare(right),
        _ => return Err(format!("unknown binary operator '{op}'")),
    })
}

fn parse_num(s: &str) -> Result<f64, String> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| format!("expected a number, got '{s}'"))
}

/// Splits on `.`, compares part-wise; all-digit parts compare numerically
/// (leading zeros stripped), otherwise lexicographically.
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let pa: Vec<&str> = a.split('.').collect();
    let pb: Vec<&str> = b.split('.').collect();
    for i in 0..pa.len().max(pb.len()) {
        let x = pa.get(i).copied().unwrap_or("0");
        let y = pb.get(i).copied().unwrap_or("0");
        let ord = if x.chars().all(|c| c.is_ascii_digit()) && y.chars().all(|c| c.is_ascii_digit())
        {
            let xn: u64 = x.trim_start_matches('0').parse().unwrap_or(0);
            let yn: u64 = y.trim_start_matches('0').parse().unwrap_or(0);
            xn.cmp(&yn)
        } else {
            x.cmp(y)
        };
        if ord != std::cmp::Ordering::Equal {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

fn normalize_for_compare(path: &str) -> String {
    let is_absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    let joined = stack.join("/");
    if is_absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Truthiness rules.
pub fn eval_truthy(token: &str, scope: &ScopeStack) -> bool {
    let upper = token.to_ascii_uppercase();
    match upper.as_str() {
        "ON" | "YES" | "TRUE" | "Y" | "1" => return true,
        "OFF" | "NO" | "FALSE" | "N" | "0" | "IGNORE" | "NOTFOUND" => return false,
        _ => {}
    }
    if upper.ends_with("-NOTFOUND") {
        return false;
    }
    if let Ok(n) = token.parse::<i64>() {
        return n != 0;
    }
    if let Ok(n) = token.parse::<f64>() {
        return n != 0.0;
    }
    if let Some(value) = scope.lookup(token) {
        return eval_truthy(&value, scope);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::InMemoryFs;

    fn ctx<'a>(
        scope: &'a ScopeStack,
        fs: &'a InMemoryFs,
        commands: &'a HashSet<String>,
        targets: &'a HashSet<String>,
    ) -> ConditionContext<'a> {
        ConditionContext {
            scope,
            fs,
            base_dir: "/project",
            known_commands: commands,
            known_targets: targets,
        }
    }

    fn eval(tokens: &[&str], scope: &ScopeStack) -> bool {
        let fs = InMemoryFs::new();
        let commands = HashSet::new();
        let targets = HashSet::new();
        let c = ctx(scope, &fs, &commands, &targets);
        let owned: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
        evaluate(&owned, &c).unwrap()
    }

    #[test]
    fn plain_truthy_literal() {
        let scope = ScopeStack::new();
        assert!(eval(&["TRUE"], &scope));
        assert!(!eval(&["FALSE"], &scope));
        assert!(!eval(&["NOTFOUND"], &scope));
    }

    #[test]
    fn precedence_not_over_and_over_or() {
        let scope = ScopeStack::new();
        assert!(eval(&["TRUE", "AND", "NOT", "FALSE"], &scope));
        // AND binds tighter than OR: (FALSE AND TRUE) OR FALSE is FALSE OR FALSE.
        assert!(!eval(&["FALSE", "AND", "TRUE", "OR", "FALSE"], &scope));
        assert!(eval(&["FALSE", "AND", "FALSE", "OR", "TRUE"], &scope));
    }

    #[test]
    fn streq_and_numeric_compare() {
        let scope = ScopeStack::new();
        assert!(eval(&["abc", "STREQUAL", "abc"], &scope));
        assert!(eval(&["2", "LESS", "10"], &scope));
    }

    #[test]
    fn version_compare_is_part_wise_numeric() {
        let scope = ScopeStack::new();
        assert!(eval(&["1.9", "VERSION_LESS", "1.10"], &scope));
        assert!(eval(&["1.0.0", "VERSION_EQUAL", "1.0"], &scope));
    }

    #[test]
    fn defined_predicate_checks_scope() {
        let mut scope = ScopeStack::new();
        scope.set_local("FOO", "1");
        assert!(eval(&["DEFINED", "FOO"], &scope));
        assert!(!eval(&["DEFINED", "BAR"], &scope));
    }

    #[test]
    fn parenthesized_grouping() {
        let scope = ScopeStack::new();
        assert!(eval(&["(", "TRUE", "OR", "FALSE", ")", "AND", "TRUE"], &scope));
    }

    #[test]
    fn matches_uses_regex() {
        let scope = ScopeStack::new();
        assert!(eval(&["hello123", "MATCHES", "^hello[0-9]+$"], &scope));
    }

    #[test]
    fn in_list_checks_membership_of_named_variable() {
        let mut scope = ScopeStack::new();
        scope.set_local("MYLIST", "a;b;c");
        assert!(eval(&["b", "IN_LIST", "MYLIST"], &scope));
        assert!(!eval(&["z", "IN_LIST", "MYLIST"], &scope));
    }
}
