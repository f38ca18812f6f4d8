//! Human-readable dumps of encoded fields.
//!
//! One line per field with its raw header, type and lengths; scalar payloads
//! follow as hex with an ASCII column. Offsets are relative to the parent
//! container. Containers nested [`MAX_DEPTH`] levels below the dumped field
//! print a single marker line instead of their children.
//!
//! ```text
//! [ field (0900001c) type=ARRAY offset=0 padded=28 raw=28 data=24 ]
//! 	[ field (02000008) type=STRING offset=4 padded=8 raw=8 data=4 ]
//! 		66 6f 6f 00                                      |foo.|
//! ```

use crate::blob::Blob;
use crate::field::{Field, MAX_DEPTH};
use std::fmt::{self, Write};
use tracing::{enabled, trace, Level};

/// Bytes per hex line
const BYTES_PER_LINE: usize = 16;

/// Dumps `field` and everything below it
pub fn dump_field(field: Field<'_>) -> String {
    let mut out = String::new();
    let _ = write_field(&mut out, field, 0, 0);
    out
}

/// Dumps the whole content of `blob`, starting at the root
pub fn dump_blob(blob: &Blob) -> String {
    dump_field(blob.head())
}

impl Blob {
    /// Emits [`dump_blob`] at trace level
    pub fn log_dump(&self) {
        if enabled!(Level::TRACE) {
            trace!("Blob content ({} bytes):\n{}", self.size(), dump_blob(self));
        }
    }
}

fn write_field(out: &mut String, field: Field<'_>, offset: usize, depth: usize) -> fmt::Result {
    indent(out, depth)?;
    let header = field.header();
    writeln!(
        out,
        "[ field ({:08x}) type={} offset={} padded={} raw={} data={} ]",
        header.to_u32(),
        field.field_type(),
        offset,
        field.padded_len(),
        field.raw_len(),
        field.data_len(),
    )?;

    if field.field_type().is_container() {
        if depth >= MAX_DEPTH {
            indent(out, depth + 1)?;
            writeln!(out, "[ ... nested deeper than {} levels ]", MAX_DEPTH)?;
            return Ok(());
        }
        let base = field.as_bytes().as_ptr() as usize;
        for child in field.children() {
            let child_offset = child.as_bytes().as_ptr() as usize - base;
            write_field(out, child, child_offset, depth + 1)?;
        }
        return Ok(());
    }

    for line in field.data().chunks(BYTES_PER_LINE) {
        indent(out, depth + 1)?;
        let mut hex = String::with_capacity(BYTES_PER_LINE * 3);
        for byte in line {
            write!(hex, "{:02x} ", byte)?;
        }
        let ascii: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        writeln!(out, "{:<width$} |{}|", hex, ascii, width = BYTES_PER_LINE * 3)?;
    }
    Ok(())
}

fn indent(out: &mut String, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        out.write_char('\t')?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dump_flat() {
        let mut blob = Blob::new();
        blob.put_string("foo").unwrap();
        blob.put_int(-13).unwrap();

        let expected = format!(
            "[ field (09000014) type=ARRAY offset=0 padded=20 raw=20 data=16 ]\n\
             \t[ field (02000008) type=STRING offset=4 padded=8 raw=8 data=4 ]\n\
             \t\t{:<48} |foo.|\n\
             \t[ field (03000005) type=INT8 offset=12 padded=8 raw=5 data=1 ]\n\
             \t\t{:<48} |.|\n",
            "66 6f 6f 00 ", "f3 "
        );
        assert_eq!(dump_blob(&blob), expected);
    }

    #[test]
    fn test_dump_nested_offsets() {
        let mut blob = Blob::new();
        blob.put_int(1).unwrap();
        let t = blob.open_table().unwrap();
        blob.put_string("k").unwrap();
        blob.put_bool(true).unwrap();
        blob.close_table(t);

        let dump = dump_blob(&blob);
        let lines: Vec<&str> = dump.lines().collect();
        assert!(lines[0].contains("type=ARRAY offset=0"));
        assert!(lines[3].starts_with("\t[ field (0a"));
        assert!(lines[3].contains("type=TABLE offset=12"));
        assert!(lines[4].starts_with("\t\t[ field"));
        assert!(lines[4].contains("type=STRING offset=4"));
        assert!(lines[6].contains("type=BOOL offset=12"));
    }

    #[test]
    fn test_dump_stops_at_nesting_limit() {
        let mut blob = Blob::with_capacity(200_000 * 4 + 256).unwrap();
        let handles: Vec<_> = (0..200_000).map(|_| blob.open_array().unwrap()).collect();
        for handle in handles.into_iter().rev() {
            blob.close_array(handle);
        }

        let dump = dump_blob(&blob);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), MAX_DEPTH + 2);
        assert!(lines[MAX_DEPTH].contains("type=ARRAY"));
        assert!(lines[MAX_DEPTH + 1].ends_with("[ ... nested deeper than 128 levels ]"));
    }

    #[test]
    fn test_dump_long_payload_wraps() {
        let mut blob = Blob::new();
        blob.put_string(&"x".repeat(20)).unwrap();
        let field = blob.head().first_child().unwrap();
        let dump = dump_field(field);
        // header line plus two hex lines for 21 bytes
        assert_eq!(dump.lines().count(), 3);
        assert!(dump.lines().nth(2).unwrap().ends_with("|xxxx.|"));
    }
}
