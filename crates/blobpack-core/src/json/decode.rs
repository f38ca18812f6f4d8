//! JSON text to blob decoding.
//!
//! `serde_json` tokenizes; a [`DeserializeSeed`] visitor turns each value
//! into writer calls so no intermediate `serde_json::Value` tree is built.

use crate::blob::{Blob, BlobConfig};
use crate::error::{Error, Result};
use crate::field::FieldType;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use std::fmt;
use std::path::Path;
use tracing::{debug, trace};

/// Writes one JSON value into a blob.
///
/// At the root, an array or object fills the root container itself
/// (retagging it as a TABLE for objects) instead of nesting.
struct BlobSeed<'b> {
    blob: &'b mut Blob,
    root: bool,
}

impl<'b> BlobSeed<'b> {
    fn nested(blob: &'b mut Blob) -> Self {
        Self { blob, root: false }
    }
}

fn writer_error<E: de::Error>(err: Error) -> E {
    E::custom(err)
}

impl<'de> DeserializeSeed<'de> for BlobSeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for BlobSeed<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<(), E> {
        self.blob.put_bool(v).map(drop).map_err(writer_error)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<(), E> {
        self.blob.put_int(v).map(drop).map_err(writer_error)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<(), E> {
        let written = match i64::try_from(v) {
            Ok(v) => self.blob.put_int(v),
            // beyond INT64; keep the magnitude at reduced precision
            Err(_) => self.blob.put_real(v as f64),
        };
        written.map(drop).map_err(writer_error)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<(), E> {
        self.blob.put_real(v).map(drop).map_err(writer_error)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<(), E> {
        self.blob.put_string(v).map(drop).map_err(writer_error)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<(), E> {
        self.blob.put_int(0).map(drop).map_err(writer_error)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<(), E> {
        self.visit_unit()
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        let blob = self.blob;
        let container = if self.root {
            blob.set_root_type(FieldType::Array);
            None
        } else {
            Some(blob.open_array().map_err(writer_error)?)
        };

        while seq.next_element_seed(BlobSeed::nested(&mut *blob))?.is_some() {}

        if let Some(container) = container {
            blob.close_array(container);
        }
        Ok(())
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let blob = self.blob;
        let container = if self.root {
            blob.set_root_type(FieldType::Table);
            None
        } else {
            Some(blob.open_table().map_err(writer_error)?)
        };

        while let Some(key) = map.next_key::<String>()? {
            blob.put_string(&key).map_err(writer_error)?;
            map.next_value_seed(BlobSeed::nested(&mut *blob))?;
        }

        if let Some(container) = container {
            blob.close_table(container);
        }
        Ok(())
    }
}

impl Blob {
    /// Decodes JSON text into a new blob.
    ///
    /// A top-level array or object becomes the root container itself; any
    /// other value becomes the single child of an ARRAY root. JSON `null`
    /// is stored as the integer 0.
    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_json_with_config(text, BlobConfig::default())
    }

    /// Like [`Blob::from_json`], building into a buffer with `config`
    pub fn from_json_with_config(text: &str, config: BlobConfig) -> Result<Self> {
        let mut blob = Blob::with_config(config)?;
        blob.decode_json(text, true)?;
        debug!(
            "Decoded {} bytes of JSON into a {} byte blob",
            text.len(),
            blob.size()
        );
        Ok(blob)
    }

    /// Decodes a JSON file into a new blob
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_json(&text)
    }

    /// Appends the value described by `text` at the current write position,
    /// nesting containers as children. On error nothing is appended.
    pub fn put_json(&mut self, text: &str) -> Result<()> {
        self.decode_json(text, false)
    }

    fn decode_json(&mut self, text: &str, root: bool) -> Result<()> {
        let checkpoint = self.size();
        let root_type = self.head().field_type();

        let mut deserializer = serde_json::Deserializer::from_str(text);
        let decoded = BlobSeed { blob: self, root }
            .deserialize(&mut deserializer)
            .and_then(|()| deserializer.end());

        if let Err(e) = decoded {
            trace!("Rolling back JSON decode to {} bytes: {}", checkpoint, e);
            self.truncate_to(checkpoint);
            self.set_root_type(root_type);
            return Err(e.into());
        }
        Ok(())
    }
}
