//! Field header codec.
//!
//! Every field starts with a single 32-bit big-endian word:
//!
//! ```text
//!  31 30       24 23                      0
//! +--+-----------+-------------------------+
//! |N |   type    |        raw_len          |
//! +--+-----------+-------------------------+
//! ```
//!
//! - `N`: reserved "has inline name" flag, never set by the writer
//! - `type`: a [`FieldType`] tag
//! - `raw_len`: byte length of the field including this header, excluding
//!   the zero padding that aligns the next field to 4 bytes

/// Size of a field header in bytes
pub const HEADER_SIZE: usize = 4;

/// Alignment of every field relative to the buffer base
pub const FIELD_ALIGN: usize = 4;

/// Largest `raw_len` a header can describe (16 MiB - 1)
pub const MAX_FIELD_LEN: usize = LEN_MASK as usize;

const ID_MASK: u32 = 0x7f00_0000;
const ID_SHIFT: u32 = 24;
const LEN_MASK: u32 = 0x00ff_ffff;
const HAS_NAME: u32 = 0x8000_0000;

/// Type tags stored in a field header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// Absent or unrecognized field
    Invalid = 0,
    /// Opaque bytes
    Binary = 1,
    /// NUL-terminated string
    String = 2,
    /// 8-bit integer
    Int8 = 3,
    /// 16-bit big-endian integer
    Int16 = 4,
    /// 32-bit big-endian integer
    Int32 = 5,
    /// 64-bit big-endian integer
    Int64 = 6,
    /// Packed IEEE-754 single precision float
    Float32 = 7,
    /// Packed IEEE-754 double precision float
    Float64 = 8,
    /// Sequence of unnamed children
    Array = 9,
    /// Alternating key/value children
    Table = 10,
    /// One byte holding 0 or 1. Readers that only know the INT8 family
    /// see this tag as unknown, so booleans trade wire compatibility with
    /// them for `true`/`false` surviving a JSON round trip.
    Bool = 12,
}

/// Tag number reserved for the validator wildcard; never written to the wire
pub const TYPE_ANY: u8 = 11;

impl FieldType {
    /// Decode a tag number. Unknown tags map to [`FieldType::Invalid`];
    /// their fields can still be skipped because the length is independent.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FieldType::Binary,
            2 => FieldType::String,
            3 => FieldType::Int8,
            4 => FieldType::Int16,
            5 => FieldType::Int32,
            6 => FieldType::Int64,
            7 => FieldType::Float32,
            8 => FieldType::Float64,
            9 => FieldType::Array,
            10 => FieldType::Table,
            12 => FieldType::Bool,
            _ => FieldType::Invalid,
        }
    }

    /// Returns the tag number
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human-readable name used by the debug dump
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Invalid => "INVALID",
            FieldType::Binary => "BINARY",
            FieldType::String => "STRING",
            FieldType::Int8 => "INT8",
            FieldType::Int16 => "INT16",
            FieldType::Int32 => "INT32",
            FieldType::Int64 => "INT64",
            FieldType::Float32 => "FLOAT32",
            FieldType::Float64 => "FLOAT64",
            FieldType::Array => "ARRAY",
            FieldType::Table => "TABLE",
            FieldType::Bool => "BOOL",
        }
    }

    /// Array or table
    pub fn is_container(self) -> bool {
        matches!(self, FieldType::Array | FieldType::Table)
    }

    /// Any of the fixed-width integer tags
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64
        )
    }

    /// Either float width
    pub fn is_float(self) -> bool {
        matches!(self, FieldType::Float32 | FieldType::Float64)
    }

    /// Payload size of fixed-width scalars
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            FieldType::Int8 | FieldType::Bool => Some(1),
            FieldType::Int16 => Some(2),
            FieldType::Int32 | FieldType::Float32 => Some(4),
            FieldType::Int64 | FieldType::Float64 => Some(8),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Round `len` up to the field alignment
pub fn align_up(len: usize) -> usize {
    (len + FIELD_ALIGN - 1) & !(FIELD_ALIGN - 1)
}

/// A decoded field header word (host order)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header(u32);

impl Header {
    /// Builds a header, clamping `raw_len` to at least [`HEADER_SIZE`] and
    /// masking it to 24 bits
    pub fn new(field_type: FieldType, raw_len: usize) -> Self {
        let id = (u32::from(field_type.as_u8()) << ID_SHIFT) & ID_MASK;
        Header(id).with_raw_len(raw_len)
    }

    /// Reads the header at the start of `bytes`, or `None` if fewer than
    /// [`HEADER_SIZE`] bytes are available
    pub fn read(bytes: &[u8]) -> Option<Self> {
        let word: [u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
        Some(Header(u32::from_be_bytes(word)))
    }

    /// Wire representation
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        self.0.to_be_bytes()
    }

    /// The header word itself
    pub fn to_u32(self) -> u32 {
        self.0
    }

    /// Stores the header at `offset` in `buf`
    pub(crate) fn write(self, buf: &mut [u8], offset: usize) {
        buf[offset..offset + HEADER_SIZE].copy_from_slice(&self.to_bytes());
    }

    /// Type tag
    pub fn field_type(self) -> FieldType {
        FieldType::from_u8(((self.0 & ID_MASK) >> ID_SHIFT) as u8)
    }

    /// Whether the reserved inline-name bit is set
    pub fn has_name(self) -> bool {
        self.0 & HAS_NAME != 0
    }

    /// Length including the header
    pub fn raw_len(self) -> usize {
        (self.0 & LEN_MASK) as usize
    }

    /// Length including the trailing alignment padding
    pub fn padded_len(self) -> usize {
        align_up(self.raw_len())
    }

    /// Payload length
    pub fn data_len(self) -> usize {
        self.raw_len().saturating_sub(HEADER_SIZE)
    }

    /// Replaces the length bits, keeping the type and flag bits
    pub fn with_raw_len(self, len: usize) -> Self {
        let len = (len.max(HEADER_SIZE) as u32) & LEN_MASK;
        Header((self.0 & !LEN_MASK) | len)
    }

    /// Replaces the type bits, keeping the length and flag bits
    pub fn with_type(self, field_type: FieldType) -> Self {
        let id = (u32::from(field_type.as_u8()) << ID_SHIFT) & ID_MASK;
        Header((self.0 & !ID_MASK) | id)
    }
}

/// Patches the length of the header stored at `offset`
pub(crate) fn set_raw_len(buf: &mut [u8], offset: usize, len: usize) {
    if let Some(header) = Header::read(&buf[offset..]) {
        header.with_raw_len(len).write(buf, offset);
    }
}

/// Zeroes the slack between `raw_len` and `padded_len` of the field at
/// `offset`
pub(crate) fn fill_pad(buf: &mut [u8], offset: usize) {
    let Some(header) = Header::read(&buf[offset..]) else {
        return;
    };
    let start = (offset + header.raw_len()).min(buf.len());
    let end = (offset + header.padded_len()).min(buf.len());
    buf[start..end].fill(0);
}
