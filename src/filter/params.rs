use serde_json::{Map, Value};

/// Parse a raw query string into a nested mapping using bracket notation.
///
/// `tuition[lte]=1000&careers[in]=Business` becomes
/// `{"tuition": {"lte": "1000"}, "careers": {"in": "Business"}}`.
/// Repeated keys and empty brackets (`a[]=1&a[]=2`) collect into arrays.
pub fn parse_query_string(raw: &str) -> Map<String, Value> {
    parse_query_pairs(
        url::form_urlencoded::parse(raw.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned())),
    )
}

pub fn parse_query_pairs<I>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut root = Map::new();
    for (key, value) in pairs {
        if key.is_empty() {
            continue;
        }
        let (head, path) = split_key(&key);
        insert_path(&mut root, head, &path, Value::String(value));
    }
    root
}

/// Split `a[b][c]` into ("a", ["b", "c"]). Malformed brackets keep the key literal.
fn split_key(key: &str) -> (String, Vec<String>) {
    let Some(open) = key.find('[') else {
        return (key.to_string(), vec![]);
    };
    if open == 0 || !key.ends_with(']') {
        return (key.to_string(), vec![]);
    }

    let head = key[..open].to_string();
    let mut segments = Vec::new();
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return (key.to_string(), vec![]);
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return (key.to_string(), vec![]);
    }
    (head, segments)
}

fn insert_path(map: &mut Map<String, Value>, key: String, path: &[String], value: Value) {
    match path.split_first() {
        None => merge_leaf(map, key, value),
        Some((segment, rest)) if segment.is_empty() => {
            // `key[]=v` appends; anything nested under [] is flattened into the list
            let leaf = if rest.is_empty() { value } else { nest(rest, value) };
            match map.get_mut(&key) {
                Some(Value::Array(items)) => items.push(leaf),
                Some(existing) => {
                    let previous = existing.take();
                    *existing = Value::Array(vec![previous, leaf]);
                }
                None => {
                    map.insert(key, Value::Array(vec![leaf]));
                }
            }
        }
        Some((segment, rest)) => {
            let entry = map.entry(key).or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                // scalar followed by nested key: the structured form wins
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, segment.clone(), rest, value);
            }
        }
    }
}

fn merge_leaf(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(Value::Object(_)) => {}
        Some(existing) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn nest(path: &[String], value: Value) -> Value {
    path.iter().rev().fold(value, |acc, segment| {
        let mut obj = Map::new();
        obj.insert(segment.clone(), acc);
        Value::Object(obj)
    })
}
