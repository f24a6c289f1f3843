//! JSON-pointer walk over the merged config document.

use serde_json::Value;

/// Every scalar leaf with its JSON pointer, in document order.
pub(crate) fn leaf_values(v: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    walk(v, String::new(), &mut out);
    out
}

fn walk<'v>(v: &'v Value, ptr: String, out: &mut Vec<(String, &'v Value)>) {
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                let token = k.replace('~', "~0").replace('/', "~1");
                walk(child, format!("{ptr}/{token}"), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk(child, format!("{ptr}/{i}"), out);
            }
        }
        _ if ptr.is_empty() => out.push(("/".to_string(), v)),
        _ => out.push((ptr, v)),
    }
}

/// `/a/b` covers `/a/b` and `/a/b/0`, never `/a/bc`.
pub(crate) fn pointer_covers(prefix: &str, leaf: &str) -> bool {
    leaf.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Last token of a pointer, unescaped.
pub(crate) fn leaf_key(ptr: &str) -> String {
    ptr.rsplit('/')
        .next()
        .unwrap_or("")
        .replace("~1", "/")
        .replace("~0", "~")
}
