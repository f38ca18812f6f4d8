//! JSON bridge.
//!
//! Rendering walks a field tree through the reader API; decoding (see
//! [`Blob::from_json`]) drives the writer from `serde_json` events.
//!
//! ## Rendering rules
//!
//! - integers print in decimal, BOOL as `true`/`false`
//! - FLOAT32 prints with six decimals (`1.500000`), FLOAT64 in exponent
//!   form with six decimals and a signed two digit exponent
//!   (`3.141593e+00`)
//! - non-finite floats, BINARY and INVALID fields print as `null`
//! - a TABLE prints as an object of its key/value pairs; a trailing key
//!   without a value maps to `null`
//! - containers nested [`MAX_DEPTH`] levels below the rendered field print
//!   as `null`

mod decode;

use crate::blob::Blob;
use crate::field::{Field, FieldType, MAX_DEPTH};
use std::fmt::Write;

/// Deepest indentation emitted by the pretty printer
const MAX_INDENT: usize = 16;

/// Formatter options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonConfig {
    /// Put every element on its own line, indented with tabs
    pub pretty: bool,
    /// Indentation level of the outermost value when pretty printing
    pub indent: usize,
}

impl JsonConfig {
    /// Compact output
    pub fn compact() -> Self {
        Self::default()
    }

    /// Pretty output starting at indentation level 0
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            indent: 0,
        }
    }

    /// Sets the starting indentation level
    pub fn indent(mut self, level: usize) -> Self {
        self.indent = level;
        self
    }
}

/// Renders `field` as compact JSON
pub fn to_json(field: Field<'_>) -> String {
    format_json(field, JsonConfig::compact())
}

/// Renders `field` as tab-indented JSON
pub fn to_json_pretty(field: Field<'_>) -> String {
    format_json(field, JsonConfig::pretty())
}

/// Renders `field` with explicit options
pub fn format_json(field: Field<'_>, config: JsonConfig) -> String {
    let mut formatter = Formatter {
        out: String::with_capacity(field.raw_len()),
        pretty: config.pretty,
        level: config.indent,
        depth: 0,
    };
    formatter.element(field);
    formatter.out
}

impl Blob {
    /// Renders the whole blob as compact JSON
    pub fn to_json(&self) -> String {
        to_json(self.head())
    }

    /// Renders the whole blob as tab-indented JSON
    pub fn to_json_pretty(&self) -> String {
        to_json_pretty(self.head())
    }
}

struct Formatter {
    out: String,
    pretty: bool,
    level: usize,
    /// Containers entered so far
    depth: usize,
}

impl Formatter {
    fn element(&mut self, field: Field<'_>) {
        match field.field_type() {
            FieldType::Bool => {
                self.out.push_str(if field.get_bool() { "true" } else { "false" });
            }
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64 => {
                let _ = write!(self.out, "{}", field.get_int());
            }
            FieldType::Float32 => {
                let value = field.get_real();
                if value.is_finite() {
                    let _ = write!(self.out, "{:.6}", value);
                } else {
                    self.out.push_str("null");
                }
            }
            FieldType::Float64 => {
                let value = field.get_real();
                if value.is_finite() {
                    self.out.push_str(&format_exponent(value));
                } else {
                    self.out.push_str("null");
                }
            }
            FieldType::String => self.string(field.get_string()),
            FieldType::Array | FieldType::Table if self.depth >= MAX_DEPTH => {
                self.out.push_str("null");
            }
            FieldType::Array => self.list(field, true),
            FieldType::Table => self.list(field, false),
            FieldType::Invalid | FieldType::Binary => self.out.push_str("null"),
        }
    }

    fn list(&mut self, field: Field<'_>, array: bool) {
        let (open, close) = if array { ('[', ']') } else { ('{', '}') };
        self.out.push(open);
        if field.first_child().is_none() {
            self.out.push(close);
            return;
        }

        self.level += 1;
        self.depth += 1;
        self.separator();

        let mut children = field.children();
        let mut first = true;
        while let Some(child) = children.next() {
            if !first {
                self.out.push(',');
                self.separator();
            }
            first = false;

            if array {
                self.element(child);
                continue;
            }

            self.string(child.get_string());
            self.out.push(':');
            if self.pretty {
                self.out.push(' ');
            }
            match children.next() {
                Some(value) => self.element(value),
                None => self.out.push_str("null"),
            }
        }

        self.level -= 1;
        self.depth -= 1;
        self.separator();
        self.out.push(close);
    }

    fn separator(&mut self) {
        if self.pretty {
            self.out.push('\n');
            for _ in 0..self.level.min(MAX_INDENT) {
                self.out.push('\t');
            }
        }
    }

    fn string(&mut self, value: &str) {
        self.out.push('"');
        for c in value.chars() {
            match c {
                '\u{8}' => self.out.push_str("\\b"),
                '\n' => self.out.push_str("\\n"),
                '\t' => self.out.push_str("\\t"),
                '\r' => self.out.push_str("\\r"),
                '"' | '\\' | '/' => {
                    self.out.push('\\');
                    self.out.push(c);
                }
                c if u32::from(c) < 0x20 => {
                    let _ = write!(self.out, "\\u{:04x}", u32::from(c));
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}

/// C `%e` rendering: six decimals, explicit exponent sign, at least two
/// exponent digits
fn format_exponent(value: f64) -> String {
    let formatted = format!("{:.6e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.unsigned_abs())
        }
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flat_array() {
        let mut blob = Blob::new();
        blob.put_bool(true).unwrap();
        blob.put_string("foo").unwrap();
        blob.put_int(-13).unwrap();
        blob.put_real(std::f64::consts::PI).unwrap();
        assert_eq!(blob.to_json(), r#"[true,"foo",-13,3.141593e+00]"#);
    }

    #[test]
    fn test_table() {
        let mut blob = Blob::new();
        let t = blob.open_table().unwrap();
        blob.put_string("one").unwrap();
        blob.put_int(1).unwrap();
        blob.put_string("two").unwrap();
        blob.put_int(2).unwrap();
        blob.close_table(t);

        let table = blob.head().first_child().unwrap();
        assert_eq!(to_json(table), r#"{"one":1,"two":2}"#);
        assert_eq!(blob.to_json(), r#"[{"one":1,"two":2}]"#);
    }

    #[test]
    fn test_number_formats() {
        assert_eq!(format_exponent(std::f64::consts::PI), "3.141593e+00");
        assert_eq!(format_exponent(-1.5e-7), "-1.500000e-07");
        assert_eq!(format_exponent(6.02214076e23), "6.022141e+23");
        assert_eq!(format_exponent(1e300), "1.000000e+300");
        assert_eq!(format_exponent(0.0), "0.000000e+00");

        let mut blob = Blob::new();
        blob.put_f32(1.5).unwrap();
        blob.put_int(5_000_000_000).unwrap();
        blob.put_int(i64::MIN).unwrap();
        blob.put_bool(false).unwrap();
        assert_eq!(
            blob.to_json(),
            "[1.500000,5000000000,-9223372036854775808,false]"
        );
    }

    #[test]
    fn test_non_finite_and_opaque_values_are_null() {
        let mut blob = Blob::new();
        blob.put_f64(f64::NAN).unwrap();
        blob.put_f32(f32::INFINITY).unwrap();
        blob.put_scalar(FieldType::Binary, &[1, 2, 3]).unwrap();
        assert_eq!(blob.to_json(), "[null,null,null]");
    }

    #[test]
    fn test_string_escaping() {
        let mut blob = Blob::new();
        blob.put_string("a\"b\\c/d\ne\tf\r\u{8}\u{1}ü").unwrap();
        assert_eq!(
            blob.to_json(),
            r#"["a\"b\\c\/d\ne\tf\r\b\u0001ü"]"#
        );
    }

    #[test]
    fn test_dangling_table_key() {
        let mut blob = Blob::new();
        let t = blob.open_table().unwrap();
        blob.put_string("k").unwrap();
        blob.put_int(1).unwrap();
        blob.put_string("orphan").unwrap();
        blob.close_table(t);
        assert_eq!(blob.to_json(), r#"[{"k":1,"orphan":null}]"#);
    }

    #[test]
    fn test_empty_containers() {
        let mut blob = Blob::new();
        let a = blob.open_array().unwrap();
        blob.close_array(a);
        let t = blob.open_table().unwrap();
        blob.close_table(t);
        assert_eq!(blob.to_json(), "[[],{}]");
        assert_eq!(Blob::new().to_json(), "[]");
        assert_eq!(Blob::new().to_json_pretty(), "[]");
    }

    fn nested_arrays(levels: usize) -> Blob {
        let mut blob = Blob::with_capacity(levels * 4 + 256).unwrap();
        let handles: Vec<_> = (0..levels).map(|_| blob.open_array().unwrap()).collect();
        for handle in handles.into_iter().rev() {
            blob.close_array(handle);
        }
        blob
    }

    #[test]
    fn test_nesting_limit() {
        let expected = format!("{}null{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));

        let shallow = nested_arrays(MAX_DEPTH - 1);
        assert_eq!(
            shallow.to_json(),
            format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH))
        );

        let blob = nested_arrays(200_000);
        let adopted = Blob::from_bytes(blob.as_bytes()).unwrap();
        assert_eq!(adopted.to_json(), expected);
        assert!(adopted.to_json_pretty().contains("null"));
    }

    #[test]
    fn test_pretty_output() {
        let mut blob = Blob::new();
        let t = blob.open_table().unwrap();
        blob.put_string("name").unwrap();
        blob.put_string("x").unwrap();
        blob.put_string("list").unwrap();
        let a = blob.open_array().unwrap();
        blob.put_int(1).unwrap();
        blob.put_int(2).unwrap();
        blob.close_array(a);
        blob.close_table(t);

        let expected = "[\n\t{\n\t\t\"name\": \"x\",\n\t\t\"list\": [\n\t\t\t1,\n\t\t\t2\n\t\t]\n\t}\n]";
        assert_eq!(blob.to_json_pretty(), expected);
    }

    #[test]
    fn test_pretty_indent_offset() {
        let mut blob = Blob::new();
        blob.put_int(7).unwrap();
        let json = format_json(blob.head(), JsonConfig::pretty().indent(2));
        assert_eq!(json, "[\n\t\t\t7\n\t\t]");
    }
}
