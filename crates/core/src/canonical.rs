//! Deterministic JSON serialization for signature verification.
//!
//! The authority signs the SHA-256 digest of the result payload serialized
//! with lexicographically sorted keys and compact separators. This is a
//! byte-exact contract: any other key order or added whitespace produces a
//! different message and the signature will not verify, even when the two
//! forms carry the same data.

use serde_json::Value;

/// Serialize `value` into the canonical byte sequence the authority signs.
pub fn to_canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            out.push(b'{');
            // Sort explicitly rather than relying on serde_json's map type,
            // which changes ordering behavior with the preserve_order feature.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_json_string(key, out);
                out.push(b':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        // Scalars already serialize without padding.
        other => {
            // Serialization of a scalar into a Vec cannot fail.
            serde_json::to_writer(&mut *out, other).expect("scalar JSON serialization");
        }
    }
}

fn write_json_string(s: &str, out: &mut Vec<u8>) {
    serde_json::to_writer(&mut *out, s).expect("string JSON serialization");
}
