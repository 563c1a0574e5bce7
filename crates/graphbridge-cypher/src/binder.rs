//! Placeholder allocation and the final placeholder rewrite.
//!
//! Clause builders allocate `@p<N>` tokens (N = number of parameters bound so
//! far) through an explicit [`ParamBinder`]. Once the text is assembled,
//! [`postpare`] rewrites every exact `@name` token that has a binding into the
//! brace form `{name}` and rekeys the table to the sigil-free name.

use crate::value::{Expression, Params};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

pub const PLACEHOLDER_SIGIL: char = '@';

/// Parameter table under construction.
///
/// Remembers which names the caller supplied and which placeholders were
/// allocated here, so raw expressions merged later can neither replace a
/// caller value nor steal an allocated placeholder.
#[derive(Debug, Clone, Default)]
pub struct ParamBinder {
    params: Params,
    caller: BTreeSet<String>,
    allocated: BTreeSet<String>,
}

impl ParamBinder {
    pub fn new(initial: Params) -> Self {
        Self {
            params: initial,
            ..Self::default()
        }
    }

    /// Description parameters overlaid with caller parameters; the caller's
    /// names stay pinned for the rest of the compilation.
    pub fn with_caller(description: &Params, caller: &Params) -> Self {
        Self {
            params: merge_params(description, caller),
            caller: caller.keys().cloned().collect(),
            allocated: BTreeSet::new(),
        }
    }

    /// Allocate a fresh placeholder bound to `value` and return its token.
    pub fn bind(&mut self, value: Value) -> String {
        let mut n = self.params.len();
        loop {
            let name = format!("p{n}");
            let token = format!("{PLACEHOLDER_SIGIL}{name}");
            if !self.params.contains_key(&token) && !self.params.contains_key(&name) {
                self.params.insert(token.clone(), value);
                self.allocated.insert(token.clone());
                return token;
            }
            n += 1;
        }
    }

    /// Merge a raw expression's own parameters and return the text to splice.
    ///
    /// Caller-supplied names keep the caller's value. A name that clashes with
    /// an allocated placeholder holding a different value is moved to a fresh
    /// placeholder and the expression text is rewritten to match.
    pub fn merge_expression(&mut self, expr: &Expression) -> String {
        let mut clashing = Vec::new();
        for (name, value) in &expr.params {
            if self.caller.contains(name) {
                continue;
            }
            if self.allocated.contains(name) {
                if self.params.get(name) != Some(value) {
                    clashing.push((name.clone(), value.clone()));
                }
                continue;
            }
            if let Some(previous) = self.params.insert(name.clone(), value.clone()) {
                if &previous != value {
                    warn!(param = %name, "raw expression rebinds an existing parameter");
                }
            }
        }
        if clashing.is_empty() {
            return expr.text.clone();
        }

        let mut renames = BTreeMap::new();
        for (name, value) in clashing {
            let fresh = self.bind(value);
            warn!(param = %name, renamed = %fresh, "raw expression parameter collides with a placeholder");
            renames.insert(name, fresh);
        }
        rewrite_tokens(&expr.text, |token| renames.get(token).cloned())
    }

    /// Merge parameters without overriding names already bound.
    pub fn merge_missing(&mut self, params: &Params) {
        for (name, value) in params {
            self.params
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_params(self) -> Params {
        self.params
    }
}

/// `base` overlaid with `overrides`; `overrides` wins on collision.
pub fn merge_params(base: &Params, overrides: &Params) -> Params {
    let mut merged = base.clone();
    for (name, value) in overrides {
        merged.insert(name.clone(), value.clone());
    }
    merged
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Replace every exact `@name` token for which `replace` returns text.
///
/// A token is the sigil followed by the longest run of `[A-Za-z0-9_]`, and
/// only counts when the sigil does not directly follow an identifier
/// character, so `@p1` never matches inside `@p10` or `user@p1.org`.
fn rewrite_tokens(text: &str, replace: impl Fn(&str) -> Option<String>) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        let at_token =
            bytes[i] == PLACEHOLDER_SIGIL as u8 && (i == 0 || !is_ident_byte(bytes[i - 1]));
        if !at_token {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        while end < bytes.len() && is_ident_byte(bytes[end]) {
            end += 1;
        }
        if end > i + 1 {
            if let Some(replacement) = replace(&text[i..end]) {
                out.push_str(&text[last..i]);
                out.push_str(&replacement);
                last = end;
            }
        }
        i = end.max(i + 1);
    }
    out.push_str(&text[last..]);
    out
}

/// Rewrite bound `@name` tokens to `{name}` and strip the sigil from the keys.
pub fn postpare(cypher: &str, params: Params) -> (String, Params) {
    let out = rewrite_tokens(cypher, |token| {
        params
            .contains_key(token)
            .then(|| format!("{{{}}}", &token[PLACEHOLDER_SIGIL.len_utf8()..]))
    });

    let mut rekeyed = Params::new();
    let (sigiled, plain): (Vec<_>, Vec<_>) = params
        .into_iter()
        .partition(|(name, _)| name.starts_with(PLACEHOLDER_SIGIL));
    rekeyed.extend(plain);
    for (name, value) in sigiled {
        let stripped = name[PLACEHOLDER_SIGIL.len_utf8()..].to_string();
        if rekeyed.insert(stripped.clone(), value).is_some() {
            warn!(param = %stripped, "placeholder rewrite shadows a caller parameter");
        }
    }

    (out, rekeyed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bind_counts_from_current_size() {
        let mut binder = ParamBinder::new(Params::from([("limit".to_string(), json!(5))]));
        assert_eq!(binder.bind(json!("a")), "@p1");
        assert_eq!(binder.bind(json!("b")), "@p2");
        assert_eq!(binder.len(), 3);
    }

    #[test]
    fn bind_skips_taken_names() {
        let mut binder = ParamBinder::new(Params::from([("p0".to_string(), json!(1))]));
        assert_eq!(binder.bind(json!(2)), "@p1");
    }

    #[test]
    fn postpare_does_not_confuse_p1_with_p10() {
        let mut params = Params::new();
        for i in 0..11 {
            params.insert(format!("@p{i}"), json!(i));
        }
        let (text, params) = postpare("n.a=@p1 AND n.b=@p10", params);
        assert_eq!(text, "n.a={p1} AND n.b={p10}");
        assert_eq!(params.get("p10"), Some(&json!(10)));
        assert!(params.keys().all(|k| !k.starts_with('@')));
    }

    #[test]
    fn postpare_leaves_unbound_and_embedded_tokens() {
        let params = Params::from([("@p0".to_string(), json!("x"))]);
        let (text, _) = postpare("n.mail='a@p0.org' AND n.x=@p0 AND n.y=@other", params);
        assert_eq!(text, "n.mail='a@p0.org' AND n.x={p0} AND n.y=@other");
    }

    #[test]
    fn merged_expression_keeps_caller_value() {
        let caller = Params::from([("@min".to_string(), json!(21))]);
        let mut binder = ParamBinder::with_caller(&Params::new(), &caller);
        let text = binder.merge_expression(&Expression::new("n.age > @min").bind("@min", 18));
        assert_eq!(text, "n.age > @min");
        assert_eq!(binder.into_params().get("@min"), Some(&json!(21)));
    }

    #[test]
    fn merged_expression_moves_off_an_allocated_placeholder() {
        let mut binder = ParamBinder::default();
        assert_eq!(binder.bind(json!("first")), "@p0");
        let text = binder.merge_expression(
            &Expression::new("n.a = @p0 OR n.b = @p00").bind("@p0", json!("second")),
        );
        assert_eq!(text, "n.a = @p1 OR n.b = @p00");
        let params = binder.into_params();
        assert_eq!(params.get("@p0"), Some(&json!("first")));
        assert_eq!(params.get("@p1"), Some(&json!("second")));
    }

    #[test]
    fn merged_expression_may_reuse_an_identical_placeholder() {
        let mut binder = ParamBinder::default();
        binder.bind(json!(5));
        let text = binder.merge_expression(&Expression::new("n.x = @p0").bind("@p0", 5));
        assert_eq!(text, "n.x = @p0");
        assert_eq!(binder.len(), 1);
    }

    #[test]
    fn merge_params_prefers_overrides() {
        let base = Params::from([("a".to_string(), json!(1)), ("b".to_string(), json!(2))]);
        let overrides = Params::from([("a".to_string(), json!(9))]);
        let merged = merge_params(&base, &overrides);
        assert_eq!(merged.get("a"), Some(&json!(9)));
        assert_eq!(merged.get("b"), Some(&json!(2)));
    }
}
