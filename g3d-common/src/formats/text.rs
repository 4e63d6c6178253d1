//! `.g3dj` text encoder
//!
//! JSON with a fixed, diff-friendly layout:
//! - every object starts on its own line, one key per line, indented two spaces per level
//! - arrays are inline; arrays longer than four items are opened and closed on their own lines
//! - [`Value::Rows`] arrays break after every `row_len` items
//! - floats use a fixed 6-digit precision in a 9-wide field
//!
//! Strings are ASCII-escaped, so the output is always plain ASCII.

use std::fmt::Write;

use super::value::{ToValue, Value};

const INDENT: &str = "  ";
const KEY_SEPARATOR: &str = ": ";
const ITEM_SEPARATOR: &str = ", ";
/// Arrays up to this length stay on one line
const INLINE_ARRAY_LIMIT: usize = 4;

/// Encode a model (or any lowered value) as `.g3dj` text
pub fn encode_text<T: ToValue + ?Sized>(value: &T) -> String {
    let mut writer = TextWriter::default();
    writer.write_value(&value.to_value(), 0);
    writer.out
}

#[derive(Default)]
struct TextWriter {
    out: String,
}

impl TextWriter {
    fn newline(&mut self, level: usize) {
        self.out.push('\n');
        for _ in 0..level {
            self.out.push_str(INDENT);
        }
    }

    fn write_value(&mut self, value: &Value, level: usize) {
        match value {
            Value::Int(v) => {
                let _ = write!(self.out, "{v}");
            }
            Value::Float(v) => self.out.push_str(&format_float(*v)),
            Value::Str(s) => escape_string(&mut self.out, s),
            Value::Array(items) => self.write_array(items, None, level),
            Value::Rows { items, row_len } => self.write_array(items, Some(*row_len), level),
            Value::Object(fields) => self.write_object(fields, level),
        }
    }

    fn write_object(&mut self, fields: &[(&'static str, Value)], level: usize) {
        self.newline(level);
        self.out.push('{');
        for (i, (key, value)) in fields.iter().enumerate() {
            self.newline(level + 1);
            escape_string(&mut self.out, key);
            self.out.push_str(KEY_SEPARATOR);
            self.write_value(value, level + 1);
            if i + 1 < fields.len() {
                self.out.push_str(ITEM_SEPARATOR);
            }
        }
        self.newline(level);
        self.out.push('}');
    }

    fn write_array(&mut self, items: &[Value], row_len: Option<usize>, level: usize) {
        let content_level = level + 1;
        let multiline = items.len() > INLINE_ARRAY_LIMIT;

        self.out.push_str("[ ");
        if multiline {
            self.newline(content_level);
        }
        for (i, item) in items.iter().enumerate() {
            match item {
                // Nested arrays never break into rows
                Value::Array(inner) | Value::Rows { items: inner, .. } => {
                    self.write_array(inner, None, content_level)
                }
                other => self.write_value(other, content_level),
            }
            if i + 1 < items.len() {
                self.out.push_str(ITEM_SEPARATOR);
            }
            if let Some(row_len) = row_len.filter(|&n| n > 0) {
                if (i + 1) % row_len == 0 {
                    self.newline(content_level);
                }
            }
        }
        if multiline {
            self.newline(level);
        }
        self.out.push_str(" ]");
    }
}

/// Fixed-precision float; non-finite values use the JavaScript spellings
pub fn format_float(value: f32) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        format!("{:9.6}", f64::from(value))
    }
}

/// Quote and escape a string using only ASCII
fn escape_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            ' '..='\u{7f}' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}
