use serde_json::{Map, Value};

use super::types::FilterOp;

/// Rewrite comparison suffixes (`gt`, `gte`, `lt`, `lte`, `in`) into storage
/// operator keys (`$gt`, ...).
///
/// Top-level keys are field names and are never renamed. Below that, every
/// object key at any depth that exactly equals a known suffix is renamed.
/// Values are never inspected, so data such as `"gte-lt course"` is untouched.
pub fn rewrite_operators(filter: Map<String, Value>) -> Map<String, Value> {
    filter
        .into_iter()
        .map(|(field, value)| (field, rewrite_value(value)))
        .collect()
}

fn rewrite_value(value: Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(key, child)| {
                    let key = match FilterOp::from_suffix(&key) {
                        Some(op) => op.key().to_string(),
                        None => key,
                    };
                    (key, rewrite_value(child))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(rewrite_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn rewrites_structural_operator_keys() {
        let out = rewrite_operators(obj(json!({
            "tuition": { "gte": "1000", "lt": "5000" },
            "careers": { "in": "Business" }
        })));
        assert_eq!(
            Value::Object(out),
            json!({
                "tuition": { "$gte": "1000", "$lt": "5000" },
                "careers": { "$in": "Business" }
            })
        );
    }

    #[test]
    fn leaves_values_containing_operator_text_alone() {
        let out = rewrite_operators(obj(json!({
            "tuition": { "gte": "1000" },
            "title": "gte-lt course",
            "description": "lte gt in"
        })));
        assert_eq!(out["title"], json!("gte-lt course"));
        assert_eq!(out["description"], json!("lte gt in"));
        assert_eq!(out["tuition"], json!({ "$gte": "1000" }));
    }

    #[test]
    fn top_level_field_names_are_not_operators() {
        let out = rewrite_operators(obj(json!({ "in": "x", "gt": { "lt": "1" } })));
        assert_eq!(Value::Object(out), json!({ "in": "x", "gt": { "$lt": "1" } }));
    }

    #[test]
    fn rewrites_at_any_depth() {
        let out = rewrite_operators(obj(json!({ "location": { "zip": { "gt": "0" } } })));
        assert_eq!(out["location"], json!({ "zip": { "$gt": "0" } }));
    }

    #[test]
    fn unknown_suffix_passes_through() {
        let out = rewrite_operators(obj(json!({ "tuition": { "between": "1" } })));
        assert_eq!(out["tuition"], json!({ "between": "1" }));
    }

    #[test]
    fn plain_equality_is_unchanged() {
        let input = obj(json!({ "housing": "true", "name": "Devworks" }));
        assert_eq!(rewrite_operators(input.clone()), input);
    }
}
