//! # blobpack-core
//!
//! A compact, self-describing binary container format.
//!
//! Every value is a field: a 4-byte big-endian header (type tag and length)
//! followed by its payload, padded to 4 bytes. Arrays and tables nest fields
//! inside their payload, so a whole message is one field tree that can be
//! walked in place without copying or parsing.
//!
//! This crate provides:
//! - A growable [`Blob`] buffer with a writer API for scalars and containers
//! - Borrowed [`Field`] views with typed getters and child iteration
//! - Signature validation of container layouts
//! - A JSON bridge in both directions
//!
//! ## Architecture
//!
//! - [`field`]: header codec and the read-side view
//! - [`blob`]: buffer management and the writer
//! - [`signature`]: structural validation
//! - [`json`]: JSON rendering and decoding
//! - [`dump`]: human-readable field dumps
//! - [`ieee754`]: portable float packing
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```
//! use blobpack_core::{validate, Blob, OptionalField};
//!
//! let mut blob = Blob::new();
//! blob.put_string("temperature")?;
//! let readings = blob.open_array()?;
//! blob.put_real(21.5)?;
//! blob.put_real(22.0)?;
//! blob.close_array(readings);
//!
//! assert!(validate(blob.head(), "s[f]"));
//! assert_eq!(blob.to_json(), r#"["temperature",[21.500000,22.000000]]"#);
//!
//! let name = blob.head().first_child();
//! assert_eq!(name.get_string(), "temperature");
//! # Ok::<(), blobpack_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod blob;
pub mod dump;
pub mod error;
pub mod field;
pub mod ieee754;
pub mod json;
pub mod signature;

// Re-export primary types for convenience
pub use blob::{Blob, BlobConfig, Container, FieldOffset, BLOCK_SIZE, DEFAULT_MAX_SIZE};
pub use error::{Error, Result};
pub use field::{Children, Field, FieldType, Header, OptionalField, Pairs, HEADER_SIZE, MAX_DEPTH};
pub use json::JsonConfig;
pub use signature::{parse, parse_values, validate, Policy, Signature};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
