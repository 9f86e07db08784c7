//! Conversion of `key: value` replies into JSON records.

use serde_json::{Map, Value};

/// One object from a reply: lower-cased keys, string or string-array values.
pub type Record = Map<String, Value>;

/// Delimiter keys for song listings (`playlistinfo`, `search`).
pub const SONG_DELIMITERS: &[&str] = &["file"];

/// Delimiter keys for `listplaylists`.
pub const PLAYLIST_DELIMITERS: &[&str] = &["playlist"];

fn insert(record: &mut Record, key: String, value: String) {
    match record.get_mut(&key) {
        Some(Value::Array(values)) => values.push(Value::String(value)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(value)]);
        }
        None => {
            record.insert(key, Value::String(value));
        }
    }
}

/// Fold a whole reply into a single record.
pub fn to_record(pairs: Vec<(String, String)>) -> Record {
    let mut record = Record::new();
    for (key, value) in pairs {
        insert(&mut record, key.to_lowercase(), value);
    }
    record
}

/// Split a reply into records, starting a new one at each delimiter key.
pub fn to_records(pairs: Vec<(String, String)>, delimiters: &[&str]) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Record::new();

    for (key, value) in pairs {
        let key = key.to_lowercase();
        if !current.is_empty() && delimiters.contains(&key.as_str()) {
            records.push(std::mem::take(&mut current));
        }
        insert(&mut current, key, value);
    }

    if !current.is_empty() {
        records.push(current);
    }
    records
}

/// Read a `0`/`1` flag from a `status` record.
pub fn flag(record: &Record, key: &str) -> bool {
    matches!(record.get(key), Some(Value::String(v)) if v == "1")
}
