use graphbridge_cypher::{Condition, CypherCompiler, Params, QueryDescription, QueryValue};
use proptest::prelude::*;
use serde_json::json;

fn column() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9_]{0,8}").unwrap()
}

fn value() -> impl Strategy<Value = QueryValue> {
    prop_oneof![
        any::<i64>().prop_map(|n| QueryValue::Scalar(json!(n))),
        proptest::string::string_regex("[A-Za-z ]{0,10}")
            .unwrap()
            .prop_map(|s| QueryValue::Scalar(json!(s))),
        proptest::collection::vec(any::<i32>(), 0..4)
            .prop_map(|v| QueryValue::List(v.into_iter().map(|n| json!(n)).collect())),
        Just(QueryValue::Null),
    ]
}

fn hash_pairs() -> impl Strategy<Value = Vec<(String, QueryValue)>> {
    proptest::collection::btree_map(column(), value(), 1..6)
        .prop_map(|m| m.into_iter().collect())
}

fn bound_values(pairs: &[(String, QueryValue)]) -> usize {
    pairs
        .iter()
        .map(|(_, v)| match v {
            QueryValue::Scalar(_) => 1,
            QueryValue::List(items) => items.len(),
            QueryValue::Null | QueryValue::Raw(_) => 0,
        })
        .sum()
}

proptest! {
    #[test]
    fn placeholders_round_trip_into_brace_form(pairs in hash_pairs()) {
        let expected = bound_values(&pairs);
        let q = QueryDescription::new()
            .label("Person")
            .filter(Condition::Hash(pairs));
        let compiled = CypherCompiler::default().build(&q, &Params::new()).unwrap();

        prop_assert_eq!(compiled.params.len(), expected);
        prop_assert!(!compiled.cypher.contains('@'));
        for name in compiled.params.keys() {
            prop_assert!(!name.starts_with('@'));
            let token = format!("{{{name}}}");
            prop_assert_eq!(compiled.cypher.matches(token.as_str()).count(), 1);
        }
    }

    #[test]
    fn hash_terms_are_parenthesized_only_when_combined(pairs in hash_pairs()) {
        let count = pairs.len();
        let q = QueryDescription::new().filter(Condition::Hash(pairs));
        let compiled = CypherCompiler::default().build(&q, &Params::new()).unwrap();

        let where_line = compiled
            .cypher
            .lines()
            .find(|l| l.starts_with("WHERE "))
            .unwrap()
            .to_string();
        let body = &where_line["WHERE ".len()..];
        if count == 1 {
            prop_assert!(!body.starts_with('('));
            prop_assert!(!body.contains(") AND ("));
        } else {
            prop_assert!(body.starts_with('('));
            prop_assert_eq!(body.matches(") AND (").count(), count - 1);
        }
    }
}
