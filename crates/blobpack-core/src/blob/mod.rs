//! Growable blob buffer.
//!
//! A [`Blob`] owns one contiguous, zero-initialized byte region. Offset 0
//! always holds the root field (an ARRAY or TABLE) whose length covers
//! every byte written so far, so the meaningful content is exactly
//! `as_bytes()` and everything after it is zeroed slack.
//!
//! ## Growth
//!
//! Capacity grows in [`BLOCK_SIZE`] steps and may move the backing store.
//! Anything that needs to survive growth (open containers, fields written
//! earlier) is therefore addressed by base-relative [`FieldOffset`]s, never
//! by references; the borrow checker keeps [`Field`] views from being held
//! across a mutation.

mod writer;

pub use writer::{Container, FieldOffset};

use crate::error::{Error, Result};
use crate::field::{set_raw_len, Field, FieldType, Header, HEADER_SIZE, MAX_FIELD_LEN};
use bytes::Bytes;
use tracing::{debug, trace};

/// Allocation granularity of the buffer
pub const BLOCK_SIZE: usize = 256;

/// Default ceiling on the total buffer size
pub const DEFAULT_MAX_SIZE: usize = 10_000_000;

/// Configuration for a blob buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobConfig {
    /// Bytes allocated up front (at least [`BLOCK_SIZE`])
    pub initial_capacity: usize,
    /// Absolute ceiling on the buffer size; guards against runaway growth
    /// driven by corrupt or hostile input
    pub max_size: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            initial_capacity: BLOCK_SIZE,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

impl BlobConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial allocation
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the size ceiling
    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Ceiling actually enforced: the root length field is 24 bits wide
    fn limit(&self) -> usize {
        self.max_size.min(MAX_FIELD_LEN)
    }
}

/// Growable buffer holding one encoded field tree
#[derive(Clone)]
pub struct Blob {
    /// Backing store; its length is the capacity and it is always zeroed
    /// past the root's extent
    buf: Vec<u8>,
    config: BlobConfig,
}

impl Default for Blob {
    fn default() -> Self {
        Self::new()
    }
}

impl Blob {
    /// Creates an empty blob with the default configuration
    pub fn new() -> Self {
        let mut blob = Self {
            buf: vec![0; BLOCK_SIZE],
            config: BlobConfig::default(),
        };
        blob.init_root();
        blob
    }

    /// Creates an empty blob with room for at least `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_config(BlobConfig::new().initial_capacity(capacity))
    }

    /// Creates an empty blob with a custom configuration
    pub fn with_config(config: BlobConfig) -> Result<Self> {
        let capacity = config.initial_capacity.max(BLOCK_SIZE);
        if capacity > config.limit().max(BLOCK_SIZE) {
            return Err(Error::size_limit(capacity, config.limit()));
        }

        let buf = allocate(capacity)?;
        let mut blob = Self { buf, config };
        blob.init_root();
        Ok(blob)
    }

    /// Adopts a previously serialized buffer. The bytes are copied verbatim;
    /// only the root header is checked for plausibility.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_config(data, BlobConfig::default())
    }

    /// [`Blob::from_bytes`] with a custom configuration
    pub fn from_bytes_with_config(data: &[u8], config: BlobConfig) -> Result<Self> {
        let header = Header::read(data)
            .ok_or_else(|| Error::malformed(0, "buffer is shorter than a field header"))?;

        if !header.field_type().is_container() {
            return Err(Error::malformed(
                0,
                format!("root field has type {}, expected ARRAY or TABLE", header.field_type()),
            ));
        }
        if header.raw_len() < HEADER_SIZE {
            return Err(Error::malformed(
                0,
                format!("root length {} is shorter than its header", header.raw_len()),
            ));
        }
        if header.raw_len() > data.len() {
            return Err(Error::malformed(
                0,
                format!(
                    "root length {} exceeds the {} bytes supplied",
                    header.raw_len(),
                    data.len()
                ),
            ));
        }
        if data.len() > config.limit() {
            return Err(Error::size_limit(data.len(), config.limit()));
        }

        let capacity = data
            .len()
            .max(config.initial_capacity)
            .max(BLOCK_SIZE)
            .div_ceil(BLOCK_SIZE)
            * BLOCK_SIZE;
        let mut buf = allocate(capacity)?;
        // trailing bytes past the root stay zeroed
        let content = header.padded_len().min(data.len());
        buf[..content].copy_from_slice(&data[..content]);

        debug!(
            "Adopted {} byte blob ({} bytes of content)",
            data.len(),
            header.padded_len()
        );
        Ok(Self { buf, config })
    }

    /// Clears all content without releasing memory
    pub fn reset(&mut self) {
        trace!("Resetting blob ({} bytes allocated)", self.buf.len());
        self.buf.fill(0);
        self.init_root();
    }

    /// Ensures the buffer can hold at least `min_len` bytes, growing to the
    /// next [`BLOCK_SIZE`] boundary. On failure nothing is modified.
    pub fn resize(&mut self, min_len: usize) -> Result<()> {
        let limit = self.config.limit();
        if min_len == 0 || min_len > limit {
            return Err(Error::size_limit(min_len, limit));
        }
        if min_len <= self.buf.len() {
            return Ok(());
        }

        let new_size = min_len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        self.buf
            .try_reserve_exact(new_size - self.buf.len())
            .map_err(|_| Error::allocation_failure(new_size))?;
        debug!("Growing blob from {} to {} bytes", self.buf.len(), new_size);
        self.buf.resize(new_size, 0);
        Ok(())
    }

    /// Releases the buffer
    pub fn free(self) {
        drop(self);
    }

    /// Allocated bytes
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes of meaningful content, root header and padding included
    pub fn size(&self) -> usize {
        self.root_header().padded_len()
    }

    /// True when the root has no children
    pub fn is_empty(&self) -> bool {
        self.root_header().raw_len() <= HEADER_SIZE
    }

    /// The active configuration
    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    /// The root field
    pub fn head(&self) -> Field<'_> {
        Field::from_slice(&self.buf)
    }

    /// The field stored at `offset`, if it lies inside the content
    pub fn field(&self, offset: FieldOffset) -> Option<Field<'_>> {
        let offset = offset.get();
        if offset + HEADER_SIZE > self.size() {
            return None;
        }
        Field::new(&self.buf[offset..self.size()])
    }

    /// Meaningful content
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.size().min(self.buf.len())]
    }

    /// Copies the content into an immutable, cheaply cloneable byte string
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

    /// Consumes the blob, handing over its content without copying
    pub fn into_bytes(mut self) -> Bytes {
        let size = self.size().min(self.buf.len());
        self.buf.truncate(size);
        Bytes::from(self.buf)
    }

    fn root_header(&self) -> Header {
        self.head().header()
    }

    fn init_root(&mut self) {
        Header::new(FieldType::Array, HEADER_SIZE).write(&mut self.buf, 0);
    }

    /// Retags the root, keeping its length
    pub(crate) fn set_root_type(&mut self, field_type: FieldType) {
        self.root_header().with_type(field_type).write(&mut self.buf, 0);
    }

    /// Drops everything written after `size` bytes of content
    pub(crate) fn truncate_to(&mut self, size: usize) {
        let end = self.size();
        if size >= end {
            return;
        }
        let size = size.max(HEADER_SIZE);
        self.buf[size..end].fill(0);
        set_raw_len(&mut self.buf, 0, size);
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("root", &self.head())
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Zeroed allocation that reports failure instead of aborting
fn allocate(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| Error::allocation_failure(size))?;
    buf.resize(size, 0);
    Ok(buf)
}
