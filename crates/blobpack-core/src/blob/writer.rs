//! Append-only field writer.
//!
//! Every `put_*` call appends one field at the logical end of the buffer and
//! extends the root so it keeps covering all content. Containers are built
//! by opening them, appending their children, and closing them: closing
//! patches the container's length to reach the current end.

use super::Blob;
use crate::error::{Error, Result};
use crate::field::{align_up, fill_pad, set_raw_len, Field, FieldType, Header, HEADER_SIZE, MAX_FIELD_LEN};
use crate::ieee754::{pack754_32, pack754_64};
use bytes::BufMut;
use tracing::{trace, warn};

/// Base-relative position of a field inside a [`Blob`]
///
/// Offsets stay valid when the buffer grows and moves, unlike references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldOffset(u32);

impl FieldOffset {
    fn new(offset: usize) -> Self {
        // content never exceeds the 24-bit root length
        Self(offset as u32)
    }

    /// Byte offset from the buffer base
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

/// Handle to an open array or table, consumed by
/// [`Blob::close_array`] / [`Blob::close_table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "an open container must be closed to include its children"]
pub struct Container(FieldOffset);

impl Container {
    /// Position of the container header
    pub fn offset(self) -> FieldOffset {
        self.0
    }
}

impl Blob {
    /// Reserves and initializes a field with `payload_len` zeroed payload
    /// bytes at the end of the content, returning its offset
    fn new_field(&mut self, field_type: FieldType, payload_len: usize) -> Result<usize> {
        let raw_len = HEADER_SIZE + payload_len;
        if raw_len > MAX_FIELD_LEN {
            return Err(Error::size_limit(raw_len, MAX_FIELD_LEN));
        }

        let offset = self.size();
        let end = offset + align_up(raw_len);
        self.resize(end)?;

        self.buf[offset..end].fill(0);
        Header::new(field_type, raw_len).write(&mut self.buf, offset);
        set_raw_len(&mut self.buf, 0, end);
        Ok(offset)
    }

    /// Appends a field with the given tag and raw payload
    pub fn put_scalar(&mut self, field_type: FieldType, payload: &[u8]) -> Result<FieldOffset> {
        let offset = self.new_field(field_type, payload.len())?;
        let start = offset + HEADER_SIZE;
        self.buf[start..start + payload.len()].copy_from_slice(payload);
        fill_pad(&mut self.buf, offset);

        trace!(
            "Wrote {} field ({} payload bytes) at offset {}",
            field_type,
            payload.len(),
            offset
        );
        Ok(FieldOffset::new(offset))
    }

    /// Appends a NUL-terminated string
    pub fn put_string(&mut self, value: &str) -> Result<FieldOffset> {
        let offset = self.new_field(FieldType::String, value.len() + 1)?;
        let start = offset + HEADER_SIZE;
        self.buf[start..start + value.len()].copy_from_slice(value.as_bytes());
        Ok(FieldOffset::new(offset))
    }

    /// Appends an integer using the narrowest width that holds it
    pub fn put_int(&mut self, value: i64) -> Result<FieldOffset> {
        if let Ok(v) = i8::try_from(value) {
            self.put_fixed(FieldType::Int8, |mut out| out.put_i8(v))
        } else if let Ok(v) = i16::try_from(value) {
            self.put_fixed(FieldType::Int16, |mut out| out.put_i16(v))
        } else if let Ok(v) = i32::try_from(value) {
            self.put_fixed(FieldType::Int32, |mut out| out.put_i32(v))
        } else {
            self.put_fixed(FieldType::Int64, |mut out| out.put_i64(value))
        }
    }

    /// Appends a boolean as a one-byte 0/1 field
    pub fn put_bool(&mut self, value: bool) -> Result<FieldOffset> {
        self.put_fixed(FieldType::Bool, |mut out| out.put_u8(u8::from(value)))
    }

    /// Appends a float, as FLOAT32 when the value survives the narrowing
    /// exactly and as FLOAT64 otherwise
    pub fn put_real(&mut self, value: f64) -> Result<FieldOffset> {
        let narrow = value as f32;
        if f64::from(narrow) == value {
            self.put_f32(narrow)
        } else {
            self.put_f64(value)
        }
    }

    /// Appends a single precision float
    pub fn put_f32(&mut self, value: f32) -> Result<FieldOffset> {
        let word = pack754_32(value);
        self.put_fixed(FieldType::Float32, |mut out| out.put_u32(word))
    }

    /// Appends a double precision float
    pub fn put_f64(&mut self, value: f64) -> Result<FieldOffset> {
        let word = pack754_64(value);
        self.put_fixed(FieldType::Float64, |mut out| out.put_u64(word))
    }

    fn put_fixed(
        &mut self,
        field_type: FieldType,
        encode: impl FnOnce(&mut [u8]),
    ) -> Result<FieldOffset> {
        let len = field_type.fixed_len().unwrap_or(0);
        let offset = self.new_field(field_type, len)?;
        let start = offset + HEADER_SIZE;
        encode(&mut self.buf[start..start + len]);
        Ok(FieldOffset::new(offset))
    }

    /// Starts an array; children appended until [`Blob::close_array`]
    /// belong to it
    pub fn open_array(&mut self) -> Result<Container> {
        let offset = self.new_field(FieldType::Array, 0)?;
        Ok(Container(FieldOffset::new(offset)))
    }

    /// Finishes an array opened with [`Blob::open_array`]
    pub fn close_array(&mut self, container: Container) {
        self.close_container(container);
    }

    /// Starts a table; children appended until [`Blob::close_table`] belong
    /// to it and are expected to alternate key strings and values
    pub fn open_table(&mut self) -> Result<Container> {
        let offset = self.new_field(FieldType::Table, 0)?;
        Ok(Container(FieldOffset::new(offset)))
    }

    /// Finishes a table opened with [`Blob::open_table`]
    pub fn close_table(&mut self, container: Container) {
        self.close_container(container);
    }

    fn close_container(&mut self, container: Container) {
        let offset = container.offset().get();
        let end = self.head().raw_len();
        if offset == 0 || offset + HEADER_SIZE > end {
            // stale handle, e.g. one obtained before a reset
            warn!(
                "Ignoring close of container at offset {} outside content of {} bytes",
                offset, end
            );
            return;
        }
        set_raw_len(&mut self.buf, offset, end - offset);
    }

    /// Appends a deep copy of `field`, which may come from another buffer
    pub fn put_field(&mut self, field: Field<'_>) -> Result<FieldOffset> {
        let header = field.header();
        let offset = self.new_field(header.field_type(), header.data_len())?;

        let source = field.as_bytes();
        let len = source.len().min(align_up(header.raw_len()));
        self.buf[offset..offset + len].copy_from_slice(&source[..len]);
        fill_pad(&mut self.buf, offset);
        Ok(FieldOffset::new(offset))
    }

    /// Appends a deep copy of the field at `source` in this buffer
    pub fn put_copy(&mut self, source: FieldOffset) -> Result<FieldOffset> {
        let (header, len) = {
            let field = self
                .field(source)
                .ok_or_else(|| Error::malformed(source.get(), "no field at offset"))?;
            (field.header(), field.as_bytes().len())
        };

        let offset = self.new_field(header.field_type(), header.data_len())?;
        let len = len.min(align_up(header.raw_len()));
        self.buf.copy_within(source.get()..source.get() + len, offset);
        fill_pad(&mut self.buf, offset);
        Ok(FieldOffset::new(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::OptionalField;
    use crate::BlobConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_layout() {
        let mut blob = Blob::new();
        blob.put_string("foo").unwrap();
        assert_eq!(
            blob.as_bytes(),
            &[0x09, 0, 0, 0x0c, 0x02, 0, 0, 0x08, b'f', b'o', b'o', 0]
        );
    }

    #[test]
    fn test_roundtrip_scalars() {
        let mut blob = Blob::new();
        blob.put_bool(true).unwrap();
        blob.put_string("foo").unwrap();
        blob.put_int(-13).unwrap();
        blob.put_real(std::f64::consts::PI).unwrap();

        let root = blob.head();
        let mut children = root.children();
        let b = children.next();
        let s = children.next();
        let i = children.next();
        let r = children.next();
        assert!(children.next().is_none());

        assert_eq!(b.field_type(), FieldType::Bool);
        assert!(b.get_bool());
        assert_eq!(s.get_string(), "foo");
        assert_eq!(i.field_type(), FieldType::Int8);
        assert_eq!(i.get_int(), -13);
        assert_eq!(r.field_type(), FieldType::Float64);
        assert_eq!(r.get_real(), std::f64::consts::PI);
    }

    #[test]
    fn test_int_width_selection() {
        let cases = [
            (0i64, FieldType::Int8),
            (127, FieldType::Int8),
            (-128, FieldType::Int8),
            (128, FieldType::Int16),
            (-32768, FieldType::Int16),
            (70000, FieldType::Int32),
            (i64::from(i32::MIN), FieldType::Int32),
            (5_000_000_000, FieldType::Int64),
            (i64::MIN, FieldType::Int64),
        ];

        let mut blob = Blob::new();
        for (value, _) in cases {
            blob.put_int(value).unwrap();
        }
        let decoded: Vec<(i64, FieldType)> = blob
            .head()
            .children()
            .map(|f| (f.get_int(), f.field_type()))
            .collect();
        assert_eq!(decoded, cases.to_vec());
    }

    #[test]
    fn test_large_int_roundtrip() {
        let mut blob = Blob::new();
        let offset = blob.put_int(5_000_000_000).unwrap();
        let field = blob.field(offset).unwrap();
        assert_eq!(field.field_type(), FieldType::Int64);
        assert_eq!(field.get_int(), 5_000_000_000);
    }

    #[test]
    fn test_real_width_selection() {
        let mut blob = Blob::new();
        let narrow = blob.put_real(1.5).unwrap();
        let wide = blob.put_real(0.1).unwrap();
        assert_eq!(blob.field(narrow).unwrap().field_type(), FieldType::Float32);
        assert_eq!(blob.field(narrow).unwrap().get_real(), 1.5);
        assert_eq!(blob.field(wide).unwrap().field_type(), FieldType::Float64);
        assert_eq!(blob.field(wide).unwrap().get_real(), 0.1);
    }

    #[test]
    fn test_padding_is_zero() {
        let mut blob = Blob::new();
        blob.put_string("a").unwrap();
        blob.put_bool(false).unwrap();
        blob.put_int(300).unwrap();
        // "a\0" -> 6 raw bytes, bool -> 5, int16 -> 6; each padded to 8
        assert_eq!(blob.size(), 4 + 8 + 8 + 8);
        let bytes = blob.as_bytes();
        assert_eq!(&bytes[10..12], &[0, 0]);
        assert_eq!(&bytes[17..20], &[0, 0, 0]);
        assert_eq!(&bytes[26..28], &[0, 0]);
    }

    #[test]
    fn test_nested_containers() {
        let mut blob = Blob::new();
        let table = blob.open_table().unwrap();
        blob.put_string("list").unwrap();
        let array = blob.open_array().unwrap();
        blob.put_int(1).unwrap();
        blob.put_int(2).unwrap();
        blob.close_array(array);
        blob.put_string("name").unwrap();
        blob.put_string("x").unwrap();
        blob.close_table(table);
        blob.put_int(99).unwrap();

        let root = blob.head();
        let children: Vec<Field<'_>> = root.children().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].field_type(), FieldType::Table);
        assert_eq!(children[1].get_int(), 99);

        let pairs: Vec<(&str, FieldType)> = children[0]
            .pairs()
            .map(|(k, v)| (k.get_string(), v.field_type()))
            .collect();
        assert_eq!(pairs, vec![("list", FieldType::Array), ("name", FieldType::String)]);

        let list = children[0].children().nth(1).unwrap();
        let items: Vec<i64> = list.children().map(|f| f.get_int()).collect();
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn test_unclosed_container_is_empty() {
        let mut blob = Blob::new();
        let _open = blob.open_array().unwrap();
        blob.put_int(1).unwrap();

        // without the close the integer is a sibling, not a child
        let kinds: Vec<FieldType> = blob.head().children().map(|f| f.field_type()).collect();
        assert_eq!(kinds, vec![FieldType::Array, FieldType::Int8]);
    }

    #[test]
    fn test_offsets_survive_growth() {
        let mut blob = Blob::new();
        let first = blob.put_string("first").unwrap();
        let array = blob.open_array().unwrap();
        let capacity = blob.capacity();
        for i in 0..200 {
            blob.put_int(i).unwrap();
        }
        assert!(blob.capacity() > capacity);
        blob.close_array(array);

        assert_eq!(blob.field(first).unwrap().get_string(), "first");
        let list = blob.field(array.offset()).unwrap();
        assert_eq!(list.field_type(), FieldType::Array);
        let items: Vec<i64> = list.children().map(|f| f.get_int()).collect();
        assert_eq!(items, (0..200).collect::<Vec<i64>>());
    }

    #[test]
    fn test_stale_handle_after_reset_is_ignored() {
        let mut blob = Blob::new();
        blob.put_string("padding so the offset is large").unwrap();
        let table = blob.open_table().unwrap();
        blob.reset();
        blob.put_int(1).unwrap();
        let before = blob.as_bytes().to_vec();
        blob.close_table(table);
        assert_eq!(blob.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_put_field_copies_subtree() {
        let mut source = Blob::new();
        let table = source.open_table().unwrap();
        source.put_string("k").unwrap();
        source.put_real(2.5).unwrap();
        source.close_table(table);

        let mut target = Blob::new();
        target.put_int(7).unwrap();
        let original = source.field(table.offset()).unwrap();
        let copy = target.put_field(original).unwrap();

        assert_eq!(target.field(copy).unwrap(), original);
        assert_eq!(target.head().children().count(), 2);
    }

    #[test]
    fn test_put_copy_within_buffer() {
        let mut blob = Blob::new();
        let original = blob.put_string("copyme").unwrap();
        let copy = blob.put_copy(original).unwrap();
        assert_ne!(original, copy);
        assert_eq!(blob.field(original), blob.field(copy));
        assert_eq!(blob.field(copy).get_string(), "copyme");
    }

    #[test]
    fn test_size_limit_leaves_buffer_intact() {
        let mut blob = Blob::with_config(BlobConfig::new().max_size(BLOCK)).unwrap();
        blob.put_string("ok").unwrap();
        let before = blob.as_bytes().to_vec();

        let long = "x".repeat(BLOCK);
        assert!(matches!(
            blob.put_string(&long),
            Err(Error::SizeLimitExceeded { .. })
        ));
        assert_eq!(blob.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_reset_then_rebuild_is_identical() {
        fn build(blob: &mut Blob) {
            blob.put_bool(true).unwrap();
            let t = blob.open_table().unwrap();
            blob.put_string("one").unwrap();
            blob.put_int(1).unwrap();
            blob.close_table(t);
            for i in 0..64 {
                blob.put_real(f64::from(i) / 3.0).unwrap();
            }
        }

        let mut fresh = Blob::new();
        build(&mut fresh);

        let mut reused = Blob::new();
        reused.put_string("something else entirely").unwrap();
        reused.reset();
        build(&mut reused);

        assert_eq!(reused.size(), fresh.size());
        assert_eq!(reused.as_bytes(), fresh.as_bytes());
    }

    const BLOCK: usize = crate::blob::BLOCK_SIZE;
}
