use serde_json::{Map, Value};

use super::operators::rewrite_operators;
use super::params::parse_query_string;
use super::types::{Projection, QueryDefaults, QueryPlan, SortKey};

/// Query-string keys that shape the query instead of filtering it
pub const RESERVED_KEYS: [&str; 4] = ["select", "sort", "page", "limit"];

pub const DEFAULT_SORT_FIELD: &str = "createdAt";

impl QueryPlan {
    /// Build a plan from a raw query string. Never fails: malformed paging
    /// input falls back to defaults, and a zero limit counts as missing.
    pub fn from_query_string(raw: &str, defaults: &QueryDefaults) -> Self {
        Self::from_params(parse_query_string(raw), defaults)
    }

    pub fn from_params(mut params: Map<String, Value>, defaults: &QueryDefaults) -> Self {
        let select = params.remove("select");
        let sort = params.remove("sort");
        let page = params.remove("page");
        let limit = params.remove("limit");

        let projection = match select.as_ref().and_then(directive_text) {
            Some(text) => parse_select(&text),
            None => Projection::All,
        };

        let sort = sort
            .as_ref()
            .and_then(directive_text)
            .map(|text| parse_sort(&text))
            .filter(|keys| !keys.is_empty())
            .unwrap_or_else(|| vec![SortKey::desc(DEFAULT_SORT_FIELD)]);

        let page = page
            .as_ref()
            .and_then(directive_text)
            .and_then(|text| parse_int(&text))
            .unwrap_or(1)
            .max(1) as u64;

        let mut limit = limit
            .as_ref()
            .and_then(directive_text)
            .and_then(|text| parse_int(&text))
            .filter(|&n| n != 0)
            .unwrap_or(defaults.default_limit as i64)
            .max(1) as u64;
        if let Some(max) = defaults.max_limit {
            if limit > max {
                tracing::debug!("Limit {} exceeds max {}, capping to max", limit, max);
                limit = max;
            }
        }

        Self {
            filter: rewrite_operators(params),
            projection,
            sort,
            page,
            limit,
        }
    }

    /// Plan that returns every record matching a single equality filter
    pub fn equals(field: &str, value: Value) -> Self {
        let mut filter = Map::new();
        filter.insert(field.to_string(), value);
        Self {
            filter,
            projection: Projection::All,
            sort: vec![SortKey::desc(DEFAULT_SORT_FIELD)],
            page: 1,
            limit: i64::MAX as u64,
        }
    }
}

/// Directive values may repeat (`select=a&select=b`); join them as one list
fn directive_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(directive_text).collect();
            if parts.is_empty() { None } else { Some(parts.join(",")) }
        }
        _ => None,
    }
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_select(text: &str) -> Projection {
    let mut fields: Vec<String> = Vec::new();
    for field in split_list(text) {
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }
    if fields.is_empty() { Projection::All } else { Projection::Fields(fields) }
}

fn parse_sort(text: &str) -> Vec<SortKey> {
    split_list(text)
        .filter_map(|token| match token.strip_prefix('-') {
            Some(field) if !field.is_empty() => Some(SortKey::desc(field)),
            Some(_) => None,
            None => Some(SortKey::asc(token)),
        })
        .collect()
}

/// Leading-integer parse: "2" -> 2, "3abc" -> 3, "-1" -> -1, "abc" -> None
fn parse_int(text: &str) -> Option<i64> {
    let s = text.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let n: i64 = digits[..end].parse().ok()?;
    Some(if negative { -n } else { n })
}
