//! Evaluation context: a JSON object addressed by dot-separated paths.

use serde_json::{Map, Value};

/// The mapping rules read from and actions write into.
pub type Context = Map<String, Value>;

/// Read the value at a dot-separated `path`.
///
/// Traverses objects by key and arrays by numeric index. Returns `None`
/// for any missing segment; never panics.
pub fn get_path<'a>(context: &'a Context, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = context.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at a dot-separated `path`, creating intermediate objects.
///
/// Any non-object node along the way is replaced by an empty object.
pub fn set_path(context: &mut Context, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };

    let mut current = context;
    for segment in parents {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just coerced to an object"),
        };
    }
    current.insert(last.to_string(), value);
}

/// Render a value as plain text for substring and pattern tests.
///
/// Strings are returned without quotes, `null` becomes the empty string,
/// everything else uses its JSON representation.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Strict equality with numeric normalisation (`1` equals `1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Merge `overlay` on top of `base`, recursing into nested objects.
///
/// Keys in `overlay` win; objects present on both sides are merged.
pub fn deep_merge(base: &mut Context, overlay: &Context) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
