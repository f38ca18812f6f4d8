//! Read-side view of encoded fields.
//!
//! A [`Field`] is a borrowed window onto one TLV unit inside a buffer. It
//! never owns memory, so it cannot outlive the [`Blob`](crate::Blob) it was
//! taken from and cannot be held across a mutation that may relocate the
//! backing store.
//!
//! Child iteration is bounded twice: by the parent's declared padded length
//! and by the bytes actually present, so a corrupt length ends the walk
//! instead of reading out of bounds.

mod header;

pub use header::{align_up, FieldType, Header, FIELD_ALIGN, HEADER_SIZE, MAX_FIELD_LEN, TYPE_ANY};
pub(crate) use header::{fill_pad, set_raw_len};

use crate::ieee754::{unpack754_32, unpack754_64};

/// Deepest container nesting the recursive walkers (JSON rendering, dumps,
/// signatures) descend into; matches the nesting limit of the JSON decoder
pub const MAX_DEPTH: usize = 128;
use bytes::Buf;
use std::num::IntErrorKind;

/// Borrowed view of a single encoded field
#[derive(Clone, Copy)]
pub struct Field<'a> {
    /// Header plus payload plus padding, truncated to what is available
    bytes: &'a [u8],
}

impl<'a> Field<'a> {
    /// Views the field starting at `bytes[0]`, or `None` if there is no room
    /// for a header
    pub fn new(bytes: &'a [u8]) -> Option<Self> {
        (bytes.len() >= HEADER_SIZE).then(|| Self::from_slice(bytes))
    }

    /// Same as [`Field::new`] without the header check; a short slice reads
    /// as an invalid zero-length field
    pub(crate) fn from_slice(bytes: &'a [u8]) -> Self {
        let end = Header::read(bytes)
            .map(|h| h.padded_len().max(HEADER_SIZE))
            .unwrap_or(0)
            .min(bytes.len());
        Self {
            bytes: &bytes[..end],
        }
    }

    /// Decoded header word
    pub fn header(&self) -> Header {
        Header::read(self.bytes).unwrap_or_else(|| Header::new(FieldType::Invalid, HEADER_SIZE))
    }

    /// Type tag
    pub fn field_type(&self) -> FieldType {
        self.header().field_type()
    }

    /// Length including header, excluding padding
    pub fn raw_len(&self) -> usize {
        self.header().raw_len()
    }

    /// Length including header and padding
    pub fn padded_len(&self) -> usize {
        self.header().padded_len()
    }

    /// Payload length
    pub fn data_len(&self) -> usize {
        self.header().data_len()
    }

    /// Whole encoded field, padding included
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Payload bytes (between the header and `raw_len`)
    pub fn data(&self) -> &'a [u8] {
        let end = self.raw_len().min(self.bytes.len());
        self.bytes.get(HEADER_SIZE..end).unwrap_or(&[])
    }

    /// First child of a container; `None` for fields without payload
    pub fn first_child(&self) -> Option<Field<'a>> {
        if self.raw_len() <= HEADER_SIZE {
            return None;
        }
        self.child_at(HEADER_SIZE)
    }

    /// Sibling following `current`, which must be a child of `self`
    pub fn next_child(&self, current: &Field<'a>) -> Option<Field<'a>> {
        let offset = (current.bytes.as_ptr() as usize).checked_sub(self.bytes.as_ptr() as usize)?;
        self.child_at(offset + step(current))
    }

    fn child_at(&self, offset: usize) -> Option<Field<'a>> {
        if offset >= self.padded_len() {
            return None;
        }
        self.bytes.get(offset..).and_then(Field::new)
    }

    /// Iterator over direct children
    pub fn children(&self) -> Children<'a> {
        Children {
            parent: *self,
            next: self.first_child(),
        }
    }

    /// Iterator over `(key, value)` children of a table. A trailing key
    /// without a value is not yielded.
    pub fn pairs(&self) -> Pairs<'a> {
        Pairs {
            children: self.children(),
        }
    }

    /// Integer value; floats truncate toward zero, strings are parsed like
    /// C `%lli` (decimal, `0x` hex or leading-zero octal)
    pub fn get_int(&self) -> i64 {
        let mut data = self.data();
        match self.field_type() {
            FieldType::Int8 | FieldType::Bool if !data.is_empty() => i64::from(data.get_i8()),
            FieldType::Int16 if data.len() >= 2 => i64::from(data.get_i16()),
            FieldType::Int32 if data.len() >= 4 => i64::from(data.get_i32()),
            FieldType::Int64 if data.len() >= 8 => data.get_i64(),
            FieldType::Float32 | FieldType::Float64 => self.get_real() as i64,
            FieldType::String => scan_int(self.get_string()),
            _ => 0,
        }
    }

    /// Floating point value; integers convert, strings are parsed like C
    /// `%lf`
    pub fn get_real(&self) -> f64 {
        let mut data = self.data();
        match self.field_type() {
            FieldType::Float32 if data.len() >= 4 => f64::from(unpack754_32(data.get_u32())),
            FieldType::Float64 if data.len() >= 8 => unpack754_64(data.get_u64()),
            FieldType::Int8
            | FieldType::Int16
            | FieldType::Int32
            | FieldType::Int64
            | FieldType::Bool => self.get_int() as f64,
            FieldType::String => scan_real(self.get_string()),
            _ => 0.0,
        }
    }

    /// Non-zero integer value
    pub fn get_bool(&self) -> bool {
        self.get_int() != 0
    }

    /// String payload up to its terminating NUL; empty for other types or
    /// invalid UTF-8
    pub fn get_string(&self) -> &'a str {
        if self.field_type() != FieldType::String {
            return "";
        }
        let data = self.data();
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..end]).unwrap_or("")
    }
}

/// Distance to the next sibling. Never less than a header, so a zero
/// length in corrupt input cannot stall iteration.
fn step(field: &Field<'_>) -> usize {
    field.padded_len().max(HEADER_SIZE)
}

/// Byte-level equality over the padded length
impl PartialEq for Field<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.padded_len() == other.padded_len() && self.bytes == other.bytes
    }
}

impl Eq for Field<'_> {}

impl std::fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("type", &self.field_type())
            .field("raw_len", &self.raw_len())
            .field("padded_len", &self.padded_len())
            .finish()
    }
}

/// Typed access on fields that may be absent.
///
/// Looking up an optional child yields `Option<Field>`; these accessors let
/// callers read it directly, getting zero values when the field is missing.
pub trait OptionalField<'a> {
    /// Type tag, [`FieldType::Invalid`] when absent
    fn field_type(&self) -> FieldType;
    /// See [`Field::get_int`]; `0` when absent
    fn get_int(&self) -> i64;
    /// See [`Field::get_real`]; `0.0` when absent
    fn get_real(&self) -> f64;
    /// See [`Field::get_bool`]; `false` when absent
    fn get_bool(&self) -> bool;
    /// See [`Field::get_string`]; `""` when absent
    fn get_string(&self) -> &'a str;
}

impl<'a> OptionalField<'a> for Option<Field<'a>> {
    fn field_type(&self) -> FieldType {
        self.map_or(FieldType::Invalid, |f| f.field_type())
    }

    fn get_int(&self) -> i64 {
        self.map_or(0, |f| f.get_int())
    }

    fn get_real(&self) -> f64 {
        self.map_or(0.0, |f| f.get_real())
    }

    fn get_bool(&self) -> bool {
        self.map_or(false, |f| f.get_bool())
    }

    fn get_string(&self) -> &'a str {
        self.map_or("", |f| f.get_string())
    }
}

/// Iterator over the direct children of a field
#[derive(Debug, Clone)]
pub struct Children<'a> {
    parent: Field<'a>,
    next: Option<Field<'a>>,
}

impl<'a> Iterator for Children<'a> {
    type Item = Field<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.parent.next_child(&current);
        Some(current)
    }
}

/// Iterator over key/value children of a table
#[derive(Debug, Clone)]
pub struct Pairs<'a> {
    children: Children<'a>,
}

impl<'a> Iterator for Pairs<'a> {
    type Item = (Field<'a>, Field<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.children.next()?;
        let value = self.children.next()?;
        Some((key, value))
    }
}

/// Leading integer of `s` the way C `%lli` reads it; `0` if none
fn scan_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16, hex)
    } else if rest.len() > 1 && rest.starts_with('0') {
        (8, &rest[1..])
    } else {
        (10, rest)
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    let magnitude = match i128::from_str_radix(&digits[..end], radix) {
        Ok(v) => v,
        // saturate like strtoll
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => i128::MAX,
        Err(_) => 0,
    };
    let value = if negative { -magnitude } else { magnitude };
    value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Leading floating point number of `s` the way C `%lf` reads it; `0.0` if
/// none
fn scan_real(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    if end == digits_start || &s[digits_start..end] == "." {
        // no mantissa digits: accept inf/nan spellings, else nothing
        return s.parse::<f64>().unwrap_or(0.0);
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(field_type: FieldType, payload: &[u8]) -> Vec<u8> {
        let raw = HEADER_SIZE + payload.len();
        let mut out = Header::new(field_type, raw).to_bytes().to_vec();
        out.extend_from_slice(payload);
        out.resize(align_up(raw), 0);
        out
    }

    fn container(field_type: FieldType, children: &[Vec<u8>]) -> Vec<u8> {
        let payload: Vec<u8> = children.concat();
        encode(field_type, &payload)
    }

    #[test]
    fn test_scalar_getters() {
        let bytes = encode(FieldType::Int16, &(-300i16).to_be_bytes());
        let field = Field::new(&bytes).unwrap();
        assert_eq!(field.field_type(), FieldType::Int16);
        assert_eq!(field.get_int(), -300);
        assert_eq!(field.get_real(), -300.0);
        assert!(field.get_bool());

        let bytes = encode(FieldType::Int8, &[0xf3]);
        assert_eq!(Field::new(&bytes).unwrap().get_int(), -13);

        let bytes = encode(FieldType::Float64, &2.75f64.to_bits().to_be_bytes());
        let field = Field::new(&bytes).unwrap();
        assert_eq!(field.get_real(), 2.75);
        assert_eq!(field.get_int(), 2);
    }

    #[test]
    fn test_string_getters() {
        let bytes = encode(FieldType::String, b"0x1F\0");
        let field = Field::new(&bytes).unwrap();
        assert_eq!(field.get_string(), "0x1F");
        assert_eq!(field.get_int(), 31);

        let bytes = encode(FieldType::String, b" -2.5e1xyz\0");
        let field = Field::new(&bytes).unwrap();
        assert_eq!(field.get_real(), -25.0);
        assert_eq!(field.get_int(), -2);

        let bytes = encode(FieldType::Int32, &7i32.to_be_bytes());
        assert_eq!(Field::new(&bytes).unwrap().get_string(), "");
    }

    #[test]
    fn test_absent_field_defaults() {
        let missing: Option<Field<'_>> = None;
        assert_eq!(missing.field_type(), FieldType::Invalid);
        assert_eq!(missing.get_int(), 0);
        assert_eq!(missing.get_real(), 0.0);
        assert!(!missing.get_bool());
        assert_eq!(missing.get_string(), "");
    }

    #[test]
    fn test_children_walk() {
        let bytes = container(
            FieldType::Array,
            &[
                encode(FieldType::Int8, &[1]),
                encode(FieldType::String, b"abc\0"),
                encode(FieldType::Int32, &9i32.to_be_bytes()),
            ],
        );
        let root = Field::new(&bytes).unwrap();
        let values: Vec<FieldType> = root.children().map(|f| f.field_type()).collect();
        assert_eq!(values, vec![FieldType::Int8, FieldType::String, FieldType::Int32]);

        let first = root.first_child().unwrap();
        let second = root.next_child(&first).unwrap();
        assert_eq!(second.get_string(), "abc");
        let third = root.next_child(&second).unwrap();
        assert!(root.next_child(&third).is_none());
    }

    #[test]
    fn test_empty_container_has_no_children() {
        let bytes = encode(FieldType::Table, &[]);
        let root = Field::new(&bytes).unwrap();
        assert!(root.first_child().is_none());
        assert_eq!(root.children().count(), 0);
    }

    #[test]
    fn test_iteration_respects_declared_extent() {
        // parent claims one child; a second field follows in memory
        let mut bytes = container(FieldType::Array, &[encode(FieldType::Int8, &[1])]);
        bytes.extend(encode(FieldType::Int8, &[2]));
        let root = Field::new(&bytes).unwrap();
        assert_eq!(root.children().count(), 1);
    }

    #[test]
    fn test_iteration_survives_truncated_input() {
        let bytes = container(
            FieldType::Array,
            &[encode(FieldType::Int8, &[1]), encode(FieldType::Int8, &[2])],
        );
        let root = Field::new(&bytes[..10]).unwrap();
        assert_eq!(root.children().count(), 1);

        // zero-length child header must not stall the walk
        let mut bytes = Header::new(FieldType::Array, 12).to_bytes().to_vec();
        bytes.extend_from_slice(&[0; 8]);
        let root = Field::new(&bytes).unwrap();
        assert_eq!(root.children().count(), 2);
    }

    #[test]
    fn test_pairs() {
        let bytes = container(
            FieldType::Table,
            &[
                encode(FieldType::String, b"a\0"),
                encode(FieldType::Int8, &[1]),
                encode(FieldType::String, b"dangling\0"),
            ],
        );
        let root = Field::new(&bytes).unwrap();
        let pairs: Vec<(&str, i64)> = root
            .pairs()
            .map(|(k, v)| (k.get_string(), v.get_int()))
            .collect();
        assert_eq!(pairs, vec![("a", 1)]);
    }

    #[test]
    fn test_equality_is_bytewise() {
        let a = encode(FieldType::String, b"foo\0");
        let b = encode(FieldType::String, b"foo\0");
        let c = encode(FieldType::String, b"fop\0");
        let fa = Field::new(&a).unwrap();
        let fb = Field::new(&b).unwrap();
        let fc = Field::new(&c).unwrap();
        assert_eq!(fa, fa);
        assert_eq!(fa, fb);
        assert_eq!(fb, fa);
        assert_ne!(fa, fc);
    }

    #[test]
    fn test_scan_int() {
        assert_eq!(scan_int("42"), 42);
        assert_eq!(scan_int("  -17abc"), -17);
        assert_eq!(scan_int("010"), 8);
        assert_eq!(scan_int("0"), 0);
        assert_eq!(scan_int("nope"), 0);
        assert_eq!(scan_int("99999999999999999999"), i64::MAX);
        let huge = "9".repeat(40);
        assert_eq!(scan_int(&huge), i64::MAX);
        assert_eq!(scan_int(&format!("-{huge}")), i64::MIN);
        assert_eq!(scan_int(&format!("0x{}", "f".repeat(40))), i64::MAX);
    }

    #[test]
    fn test_scan_real() {
        assert_eq!(scan_real("3.5"), 3.5);
        assert_eq!(scan_real("1e3"), 1000.0);
        assert_eq!(scan_real("2e"), 2.0);
        assert_eq!(scan_real(".5"), 0.5);
        assert_eq!(scan_real("abc"), 0.0);
        assert!(scan_real("inf").is_infinite());
    }
}
