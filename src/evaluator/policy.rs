//! Policy engine, grounded in upstream CMake's slot/legacy-key/
//! default-key fallback chain.
//!
//! Policies are pushed/popped alongside lexical scopes by
//! `cmake_policy(PUSH)`/`cmake_policy(POP)`; the effective value of a
//! policy walks depth-scoped slots down to 1, then a legacy mirror, then
//! a directory default, then falls back to `NEW` if a policy version
//! floor was declared, else empty (unset).

use super::scope::ScopeStack;

/// Normalizes a policy token to its canonical `CMP####` form (uppercased;
/// callers should already have validated the `CMP` + 4-digit shape via
/// `condition::eval_predicate`'s `POLICY` check).
fn canonical(id: &str) -> String {
    id.to_ascii_uppercase()
}

fn depth_slot_name(depth: usize, id: &str) -> String {
    format!("NOBIFY_POLICY_D{depth}_{}", canonical(id))
}

fn legacy_mirror_name(id: &str) -> String {
    format!("CMAKE_POLICY_{}", canonical(id))
}

fn default_name(id: &str) -> String {
    format!("CMAKE_POLICY_DEFAULT_{}", canonical(id))
}

/// Current policy stack depth, tracked by `cmake_policy(PUSH)`/`(POP)`
/// in the var named `NOBIFY_POLICY_STACK_DEPTH` (kept as a plain scope
/// variable so it participates in the same save/restore discipline as
/// everything else the evaluator threads through `ScopeStack`).
pub fn stack_depth(scope: &ScopeStack) -> usize {
    scope
        .lookup("NOBIFY_POLICY_STACK_DEPTH")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(1)
}

/// `cmake_policy(PUSH)`: increments the tracked depth. The caller is
/// responsible for also snapshotting/restoring the depth-scoped slots
/// that sit above the previous depth when popping (handled by ordinary
/// variable scoping, since each `SET` writes to a depth-specific key).
pub fn push(scope: &mut ScopeStack) {
    let depth = stack_depth(scope) + 1;
    scope.set_local("NOBIFY_POLICY_STACK_DEPTH", depth.to_string());
}

/// `cmake_policy(POP)`: decrements the tracked depth. Popping below 1 is
/// an error (mirrors real CMake's "no policies pushed" diagnostic).
pub fn pop(scope: &mut ScopeStack) -> Result<(), String> {
    let depth = stack_depth(scope);
    if depth <= 1 {
        return Err("cmake_policy(POP) called without a matching PUSH".to_string());
    }
    scope.set_local("NOBIFY_POLICY_STACK_DEPTH", (depth - 1).to_string());
    Ok(())
}

/// `cmake_policy(SET CMP#### NEW|OLD)`: writes both the depth-scoped slot
/// at the current depth and the legacy mirror, matching the original's
/// dual-write.
pub fn set(scope: &mut ScopeStack, id: &str, value: &str) {
    let depth = stack_depth(scope);
    scope.set_local(&depth_slot_name(depth, id), value);
    scope.set_local(&legacy_mirror_name(id), value);
}

/// Resolves a policy's effective value: walk depth-scoped slots from the
/// current depth down to 1, then the legacy mirror, then the directory
/// default, then `NEW` if `CMAKE_POLICY_VERSION` is set, else empty.
pub fn effective_value(scope: &ScopeStack, id: &str) -> String {
    let depth = stack_depth(scope);
    for d in (1..=depth).rev() {
        if let Some(v) = scope.lookup(&depth_slot_name(d, id)) {
            if !v.is_empty() {
                return v;
            }
        }
    }
    if let Some(v) = scope.lookup(&legacy_mirror_name(id)) {
        if !v.is_empty() {
            return v;
        }
    }
    if let Some(v) = scope.lookup(&default_name(id)) {
        if !v.is_empty() {
            return v;
        }
    }
    if scope.is_defined("CMAKE_POLICY_VERSION") {
        return "NEW".to_string();
    }
    String::new()
}

pub fn is_new(scope: &ScopeStack, id: &str) -> bool {
    effective_value(scope, id) == "NEW"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_policy_with_no_version_floor_is_empty() {
        let scope = ScopeStack::new();
        assert_eq!(effective_value(&scope, "CMP0054"), "");
    }

    #[test]
    fn policy_version_floor_defaults_unset_policies_to_new() {
        let mut scope = ScopeStack::new();
        scope.set_local("CMAKE_POLICY_VERSION", "3.20");
        assert!(is_new(&scope, "CMP0054"));
    }

    #[test]
    fn directory_default_beats_version_floor() {
        let mut scope = ScopeStack::new();
        scope.set_local("CMAKE_POLICY_VERSION", "3.20");
        scope.set_local("CMAKE_POLICY_DEFAULT_CMP0054", "OLD");
        assert_eq!(effective_value(&scope, "CMP0054"), "OLD");
    }

    #[test]
    fn explicit_set_beats_default() {
        let mut scope = ScopeStack::new();
        scope.set_local("CMAKE_POLICY_DEFAULT_CMP0054", "OLD");
        set(&mut scope, "CMP0054", "NEW");
        assert_eq!(effective_value(&scope, "CMP0054"), "NEW");
    }

    #[test]
    fn pop_without_push_is_an_error() {
        let mut scope = ScopeStack::new();
        assert!(pop(&mut scope).is_err());
    }

    #[test]
    fn push_then_set_is_scoped_to_that_depth() {
        let mut scope = ScopeStack::new();
        set(&mut scope, "CMP0054", "OLD");
        push(&mut scope);
        set(&mut scope, "CMP0054", "NEW");
        assert_eq!(effective_value(&scope, "CMP0054"), "NEW");
        pop(&mut scope).unwrap();
        // Depth 2's slot is out of range once popped back to depth 1;
        // the walk finds depth 1's own slot (still "OLD" from the first
        // `set()`) before it ever falls through to the legacy mirror.
        assert_eq!(effective_value(&scope, "CMP0054"), "OLD");
    }
}
