//! Deterministic text layout for encoded documents.
//!
//! Objects are written one key per line, indented by two spaces. Arrays and
//! everything nested inside them stay on a single line, so each element
//! definition and each lattice occupies exactly one line and diffs stay
//! readable.

use serde_json::Value;

const INDENT: &str = "  ";

pub(crate) fn to_string(value: &Value) -> String {
    let mut out = String::new();
    write_block(value, 0, &mut out);
    out.push('\n');
    out
}

fn write_block(value: &Value, level: usize, out: &mut String) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            out.push_str("{\n");
            for (i, (key, v)) in map.iter().enumerate() {
                push_indent(level + 1, out);
                push_key(key, out);
                write_block(v, level + 1, out);
                if i + 1 < map.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(level, out);
            out.push('}');
        }
        other => write_inline(other, out),
    }
}

fn write_inline(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_inline(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                push_key(key, out);
                write_inline(v, out);
            }
            out.push('}');
        }
        // Display on a scalar is its compact JSON form, strings quoted and escaped.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn push_key(key: &str, out: &mut String) {
    out.push_str(&Value::String(key.to_string()).to_string());
    out.push_str(": ");
}

fn push_indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}
