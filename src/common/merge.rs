use serde_json::Value;

use crate::task::render_value;

/// Reduces one or more result arrays into a single array, collapsing objects
/// that share a value under `key` into one combined object.
///
/// Arrays are concatenated in the order given; when two objects carry the
/// same key value, later fields overwrite earlier ones (last-write-wins).
/// Output order is first occurrence of each key value. Records that are not
/// objects, or that lack the key field, pass through unmerged.
pub fn merge_by_key(
    key: &str,
    arrays: Vec<Vec<Value>>,
) -> Vec<Value> {
    let mut merged: Vec<(Option<String>, Value)> = Vec::new();

    for record in arrays.into_iter().flatten() {
        let key_value = record.as_object().and_then(|obj| obj.get(key)).map(render_value);

        let existing = key_value
            .as_ref()
            .and_then(|kv| merged.iter_mut().find(|(k, _)| k.as_ref() == Some(kv)));
        match existing {
            Some((_, target)) => merge_fields(target, record),
            None => merged.push((key_value, record)),
        }
    }

    merged.into_iter().map(|(_, record)| record).collect()
}

/// Groups records by the rendered value of their `key` field, preserving the
/// order in which each key value (and each record) first appears. Records
/// without the field are grouped under the empty key.
pub fn group_by_key(
    key: &str,
    records: Vec<Value>,
) -> Vec<(String, Vec<Value>)> {
    let mut groups: Vec<(String, Vec<Value>)> = Vec::new();

    for record in records {
        let key_value = record.get(key).map(render_value).unwrap_or_default();
        match groups.iter_mut().find(|(k, _)| *k == key_value) {
            Some((_, group)) => group.push(record),
            None => groups.push((key_value, vec![record])),
        }
    }

    groups
}

fn merge_fields(
    target: &mut Value,
    source: Value,
) {
    if let (Value::Object(target), Value::Object(source)) = (target, source) {
        for (field, value) in source {
            target.insert(field, value);
        }
    }
}
